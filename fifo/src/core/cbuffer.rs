/// Fixed-capacity byte ring. Indices wrap modulo capacity; `head` is the
/// next insert position and `tail` the next remove position.
///
/// Transfers are exact: callers check `free_space`/`len` first and a
/// violation asserts. The channel serializes access, so there is no
/// locking here.
pub struct CircularBuffer {
    data: Box<[u8]>,
    head: usize,
    tail: usize,
    count: usize,
}

impl CircularBuffer {
    pub fn new(capacity: usize) -> CircularBuffer {
        assert!(capacity > 0);
        CircularBuffer {
            data: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn free_space(&self) -> usize {
        self.data.len() - self.count
    }

    /// Copies the whole slice in at `head`, in at most two segments.
    pub fn insert(&mut self, bytes: &[u8]) {
        assert!(bytes.len() <= self.free_space());
        let cap = self.data.len();
        let first = bytes.len().min(cap - self.head);
        self.data[self.head..self.head + first].copy_from_slice(&bytes[..first]);
        self.data[..bytes.len() - first].copy_from_slice(&bytes[first..]);
        self.head = (self.head + bytes.len()) % cap;
        self.count += bytes.len();
    }

    /// Fills the whole slice from `tail`, in at most two segments.
    pub fn remove(&mut self, out: &mut [u8]) {
        let n = out.len();
        assert!(n <= self.count);
        let cap = self.data.len();
        let first = n.min(cap - self.tail);
        out[..first].copy_from_slice(&self.data[self.tail..self.tail + first]);
        out[first..].copy_from_slice(&self.data[..n - first]);
        self.tail = (self.tail + n) % cap;
        self.count -= n;
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.count = 0;
    }
}
