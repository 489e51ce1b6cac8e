//! Growable byte buffer with a processed-prefix cursor
//!
//! Output buffers use `processed` to track how much has been written to
//! the socket; input buffers only append and consume.

use corokit_core::constants::INITIAL_BUFFER_SIZE;

#[derive(Debug, Clone)]
pub struct GrowableBuffer {
    data: Vec<u8>,
    processed: usize,
}

impl Default for GrowableBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl GrowableBuffer {
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        GrowableBuffer {
            data: Vec::with_capacity(capacity),
            processed: 0,
        }
    }

    /// Grow by doubling until `n` more bytes fit
    pub fn ensure_space(&mut self, n: usize) {
        let needed = self.data.len() + n;
        let mut capacity = self.data.capacity().max(1);
        if capacity >= needed {
            return;
        }
        while capacity < needed {
            capacity *= 2;
        }
        self.data.reserve_exact(capacity - self.data.len());
    }

    pub fn append(&mut self, bytes: &[u8]) {
        self.ensure_space(bytes.len());
        self.data.extend_from_slice(bytes);
    }

    /// Drop the first `n` bytes, clamped to the length
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.data.len());
        self.data.drain(..n);
        self.processed = self.processed.saturating_sub(n);
    }

    /// Mark `n` more bytes as processed, clamped to the length
    pub fn advance(&mut self, n: usize) {
        self.processed = (self.processed + n).min(self.data.len());
    }

    /// Bytes not yet processed
    pub fn pending(&self) -> &[u8] {
        &self.data[self.processed..]
    }

    pub fn has_pending(&self) -> bool {
        self.processed < self.data.len()
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.processed = 0;
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_consume_restores_empty() {
        let mut buf = GrowableBuffer::new();
        buf.append(b"hello world");
        buf.advance(5);
        assert_eq!(buf.pending(), b" world");
        buf.consume(buf.len());
        assert!(buf.is_empty());
        assert_eq!(buf.processed(), 0);
    }

    #[test]
    fn test_consume_clamps() {
        let mut buf = GrowableBuffer::with_capacity(4);
        buf.append(b"abc");
        buf.advance(2);
        buf.consume(1);
        assert_eq!(buf.as_slice(), b"bc");
        assert_eq!(buf.processed(), 1);
        buf.consume(100);
        assert!(buf.is_empty());
        assert_eq!(buf.processed(), 0);
        buf.advance(10);
        assert_eq!(buf.processed(), 0);
    }

    #[test]
    fn test_growth_doubles() {
        let mut buf = GrowableBuffer::with_capacity(4);
        buf.append(b"abcd");
        buf.ensure_space(1);
        assert!(buf.capacity() >= 8);
        let before = buf.capacity();
        buf.ensure_space(1);
        assert_eq!(buf.capacity(), before);

        buf.append(&[7u8; 100]);
        assert_eq!(buf.len(), 104);
        assert!(buf.capacity() >= 104);
    }
}
