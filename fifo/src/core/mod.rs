use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, trace};
use parking_lot::{Condvar, Mutex};
use serde_derive::{Deserialize, Serialize};

use crate::errors::FifoError;

mod cbuffer;

use self::cbuffer::CircularBuffer;

pub const DEFAULT_CAPACITY: usize = 50;
pub const DEFAULT_MAX_TRANSFER: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Producer,
    Consumer,
}

impl Role {
    #[inline]
    pub fn peer(self) -> Role {
        match self {
            Role::Producer => Role::Consumer,
            Role::Consumer => Role::Producer,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Producer => f.write_str("producer"),
            Role::Consumer => f.write_str("consumer"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FifoConfig {
    pub capacity: usize,
    pub max_transfer: usize,
}

impl Default for FifoConfig {
    fn default() -> FifoConfig {
        FifoConfig {
            capacity: DEFAULT_CAPACITY,
            max_transfer: DEFAULT_MAX_TRANSFER,
        }
    }
}

/// Counter snapshot taken under the channel lock.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStats {
    pub producers: usize,
    pub consumers: usize,
    pub producers_waiting_open: usize,
    pub consumers_waiting_open: usize,
    pub producers_waiting_write: usize,
    pub consumers_waiting_read: usize,
    pub buffered: usize,
}

struct State {
    buffer: CircularBuffer,
    producers: usize,
    consumers: usize,
    producers_waiting_open: usize,
    consumers_waiting_open: usize,
    producers_waiting_write: usize,
    consumers_waiting_read: usize,
}

impl State {
    #[inline]
    fn count(&self, role: Role) -> usize {
        match role {
            Role::Producer => self.producers,
            Role::Consumer => self.consumers,
        }
    }

    #[inline]
    fn count_mut(&mut self, role: Role) -> &mut usize {
        match role {
            Role::Producer => &mut self.producers,
            Role::Consumer => &mut self.consumers,
        }
    }

    #[inline]
    fn waiting_open(&self, role: Role) -> usize {
        match role {
            Role::Producer => self.producers_waiting_open,
            Role::Consumer => self.consumers_waiting_open,
        }
    }

    #[inline]
    fn waiting_open_mut(&mut self, role: Role) -> &mut usize {
        match role {
            Role::Producer => &mut self.producers_waiting_open,
            Role::Consumer => &mut self.consumers_waiting_open,
        }
    }
}

struct Shared {
    state: Mutex<State>,
    // One signal per role, shared between the open-wait and the io-wait.
    // Every wake is a broadcast; woken waiters re-check under the lock.
    write_ready: Condvar,
    read_ready: Condvar,
    capacity: usize,
    max_transfer: usize,
}

impl Shared {
    /// The condvar a role parks on, both while waiting for a peer to open
    /// and while waiting for space (producer) or data (consumer).
    #[inline]
    fn ready(&self, role: Role) -> &Condvar {
        match role {
            Role::Producer => &self.write_ready,
            Role::Consumer => &self.read_ready,
        }
    }

    /// Drops one endpoint of `role`. Close runs this, and a cancelled open
    /// runs it to undo its optimistic count increment, so a peer that
    /// rendezvoused against that count is woken here rather than stranded.
    fn retire(&self, st: &mut State, role: Role) {
        let count = st.count_mut(role);
        assert!(*count > 0);
        *count -= 1;
        if st.count(role) == 0 {
            // peers blocked in read or write must observe the departure
            self.ready(role.peer()).notify_all();
        }
        if st.producers == 0 && st.consumers == 0 {
            if !st.buffer.is_empty() {
                trace!("both sides closed, discarding {} buffered bytes", st.buffer.len());
            }
            st.buffer.clear();
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        debug!("fifo channel destroyed");
    }
}

/// A bounded byte FIFO with rendezvous open semantics.
///
/// All state sits behind one mutex. Opens of either role block until the
/// other role is present, writes block until the whole payload fits, reads
/// block until the whole request is available. Endpoints are reference
/// counted per role; when the count of one role reaches zero its peers are
/// woken (writes fail with [`FifoError::BrokenPipe`], reads drain and then
/// return empty), and when both counts reach zero the buffer is discarded.
///
/// The channel is cheaply cloneable and meant to be handed to each thread
/// that opens an endpoint on it.
#[derive(Clone)]
pub struct FifoChannel {
    shared: Arc<Shared>,
}

impl FifoChannel {
    pub fn new(config: FifoConfig) -> Result<FifoChannel, FifoError> {
        if config.capacity == 0 {
            return Err(FifoError::ZeroCapacity);
        }
        if config.max_transfer == 0 || config.max_transfer > config.capacity {
            return Err(FifoError::InvalidTransferLimit {
                limit: config.max_transfer,
                capacity: config.capacity,
            });
        }
        debug!(
            "fifo channel created (capacity={}, max_transfer={})",
            config.capacity, config.max_transfer
        );
        let buffer = CircularBuffer::new(config.capacity);
        let capacity = buffer.capacity();
        Ok(FifoChannel {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    buffer,
                    producers: 0,
                    consumers: 0,
                    producers_waiting_open: 0,
                    consumers_waiting_open: 0,
                    producers_waiting_write: 0,
                    consumers_waiting_read: 0,
                }),
                write_ready: Condvar::new(),
                read_ready: Condvar::new(),
                capacity,
                max_transfer: config.max_transfer,
            }),
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    #[inline]
    pub fn max_transfer(&self) -> usize {
        self.shared.max_transfer
    }

    /// Mints a fresh token for cancelling blocking calls on this channel.
    /// Tokens minted separately are independent of each other.
    pub fn cancel_token(&self) -> CancelToken {
        CancelToken {
            cancelled: Arc::new(AtomicBool::new(false)),
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn stats(&self) -> ChannelStats {
        let st = self.shared.state.lock();
        ChannelStats {
            producers: st.producers,
            consumers: st.consumers,
            producers_waiting_open: st.producers_waiting_open,
            consumers_waiting_open: st.consumers_waiting_open,
            producers_waiting_write: st.producers_waiting_write,
            consumers_waiting_read: st.consumers_waiting_read,
            buffered: st.buffer.len(),
        }
    }

    /// Registers one endpoint of `role` and blocks until the peer role is
    /// present. The count is incremented before waiting, so two endpoints
    /// opening concurrently see each other; cancellation rolls it back.
    pub(crate) fn open(&self, role: Role, token: &CancelToken) -> Result<(), FifoError> {
        if token.is_cancelled() {
            return Err(FifoError::Interrupted);
        }
        let sh = &*self.shared;
        let mut st = sh.state.lock();
        *st.count_mut(role) += 1;
        if st.waiting_open(role.peer()) > 0 {
            sh.ready(role.peer()).notify_all();
        }
        while st.count(role.peer()) == 0 {
            // a cancel that landed between the entry check and the lock is
            // caught here, before the park could miss its broadcast
            if token.is_cancelled() {
                sh.retire(&mut st, role);
                return Err(FifoError::Interrupted);
            }
            *st.waiting_open_mut(role) += 1;
            sh.ready(role).wait(&mut st);
            *st.waiting_open_mut(role) -= 1;
            if token.is_cancelled() {
                sh.retire(&mut st, role);
                return Err(FifoError::Interrupted);
            }
        }
        debug!(
            "{} opened (producers={}, consumers={})",
            role, st.producers, st.consumers
        );
        Ok(())
    }

    pub(crate) fn release(&self, role: Role) {
        let sh = &*self.shared;
        let mut st = sh.state.lock();
        sh.retire(&mut st, role);
        debug!(
            "{} closed (producers={}, consumers={})",
            role, st.producers, st.consumers
        );
    }

    /// Transfers the whole payload into the buffer, blocking while it does
    /// not fit. All-or-nothing: on success the returned length equals the
    /// payload length.
    pub(crate) fn write(&self, payload: &[u8], token: &CancelToken) -> Result<usize, FifoError> {
        let n = payload.len();
        let sh = &*self.shared;
        if n > sh.max_transfer {
            return Err(FifoError::TooLarge {
                requested: n,
                limit: sh.max_transfer,
            });
        }
        if token.is_cancelled() {
            return Err(FifoError::Interrupted);
        }
        let mut st = sh.state.lock();
        if st.consumers == 0 {
            return Err(FifoError::BrokenPipe);
        }
        while st.buffer.free_space() < n {
            if token.is_cancelled() {
                return Err(FifoError::Interrupted);
            }
            st.producers_waiting_write += 1;
            sh.write_ready.wait(&mut st);
            st.producers_waiting_write -= 1;
            if st.consumers == 0 {
                return Err(FifoError::BrokenPipe);
            }
            if token.is_cancelled() {
                return Err(FifoError::Interrupted);
            }
        }
        st.buffer.insert(payload);
        if st.consumers_waiting_read > 0 {
            sh.read_ready.notify_all();
        }
        Ok(n)
    }

    /// Transfers exactly `want` bytes out of the buffer, blocking until
    /// they are available. Returns an empty buffer for end-of-stream: no
    /// producers are attached and nothing is buffered.
    pub(crate) fn read(&self, want: usize, token: &CancelToken) -> Result<Vec<u8>, FifoError> {
        let sh = &*self.shared;
        if want > sh.max_transfer {
            return Err(FifoError::TooLarge {
                requested: want,
                limit: sh.max_transfer,
            });
        }
        if token.is_cancelled() {
            return Err(FifoError::Interrupted);
        }
        let mut st = sh.state.lock();
        if st.producers == 0 && st.buffer.is_empty() {
            return Ok(Vec::new());
        }
        while st.buffer.len() < want {
            if token.is_cancelled() {
                return Err(FifoError::Interrupted);
            }
            st.consumers_waiting_read += 1;
            sh.read_ready.wait(&mut st);
            st.consumers_waiting_read -= 1;
            // end-of-stream wins over cancellation on wake
            if st.producers == 0 && st.buffer.is_empty() {
                return Ok(Vec::new());
            }
            if token.is_cancelled() {
                return Err(FifoError::Interrupted);
            }
        }
        let mut out = vec![0u8; want];
        st.buffer.remove(&mut out);
        if st.producers_waiting_write > 0 {
            sh.write_ready.notify_all();
        }
        Ok(out)
    }
}

impl fmt::Debug for FifoChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FifoChannel")
            .field("capacity", &self.shared.capacity)
            .field("max_transfer", &self.shared.max_transfer)
            .finish_non_exhaustive()
    }
}

/// Cancels blocking channel calls. Minted by [`FifoChannel::cancel_token`];
/// clones share one flag, so any clone cancels every call that carries the
/// same token.
#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    shared: Arc<Shared>,
}

impl CancelToken {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        // taking the lock closes the window between a waiter's flag check
        // and its park
        let _st = self.shared.state.lock();
        self.shared.write_ready.notify_all();
        self.shared.read_ready.notify_all();
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
