use super::core::*;
use crate::errors::FifoError;

/// Consumer endpoint. One open handle holds one consumer count on the
/// channel; dropping it (or calling [`close`](FifoReader::close)) releases
/// the count.
pub struct FifoReader {
    channel: FifoChannel,
    token: CancelToken,
}

impl FifoReader {
    /// Opens a consumer endpoint, blocking until a producer is present.
    /// The endpoint carries a fresh cancellation token.
    pub fn open(channel: &FifoChannel) -> Result<FifoReader, FifoError> {
        FifoReader::open_with(channel, channel.cancel_token())
    }

    /// As [`open`](FifoReader::open), but blocking calls on this endpoint
    /// watch `token`. Keep a clone to cancel them from another thread,
    /// including the open itself.
    pub fn open_with(channel: &FifoChannel, token: CancelToken) -> Result<FifoReader, FifoError> {
        channel.open(Role::Consumer, &token)?;
        Ok(FifoReader {
            channel: channel.clone(),
            token,
        })
    }

    /// Reads exactly `want` bytes, blocking until they are buffered. An
    /// empty result means end of stream: no producers are attached and the
    /// buffer is empty. `read(0)` also returns an empty buffer, so callers
    /// that need the distinction ask for at least one byte.
    pub fn read(&self, want: usize) -> Result<Vec<u8>, FifoError> {
        self.channel.read(want, &self.token)
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Releases the endpoint. Equivalent to dropping the handle.
    pub fn close(self) {}
}

impl Drop for FifoReader {
    fn drop(&mut self) {
        self.channel.release(Role::Consumer);
    }
}
