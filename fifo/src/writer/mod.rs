use super::core::*;
use crate::errors::FifoError;

/// Producer endpoint. One open handle holds one producer count on the
/// channel; dropping it (or calling [`close`](FifoWriter::close)) releases
/// the count.
pub struct FifoWriter {
    channel: FifoChannel,
    token: CancelToken,
}

impl FifoWriter {
    /// Opens a producer endpoint, blocking until a consumer is present.
    /// The endpoint carries a fresh cancellation token.
    pub fn open(channel: &FifoChannel) -> Result<FifoWriter, FifoError> {
        FifoWriter::open_with(channel, channel.cancel_token())
    }

    /// As [`open`](FifoWriter::open), but blocking calls on this endpoint
    /// watch `token`. Keep a clone to cancel them from another thread,
    /// including the open itself.
    pub fn open_with(channel: &FifoChannel, token: CancelToken) -> Result<FifoWriter, FifoError> {
        channel.open(Role::Producer, &token)?;
        Ok(FifoWriter {
            channel: channel.clone(),
            token,
        })
    }

    /// Writes the whole payload, blocking while it does not fit in the
    /// buffer. Returns the payload length; transfers are never partial.
    pub fn write(&self, payload: &[u8]) -> Result<usize, FifoError> {
        self.channel.write(payload, &self.token)
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Releases the endpoint. Equivalent to dropping the handle.
    pub fn close(self) {}
}

impl Drop for FifoWriter {
    fn drop(&mut self) {
        self.channel.release(Role::Producer);
    }
}
