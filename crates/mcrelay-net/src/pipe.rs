//! A byte queue with exactly one outstanding drain operation at a time: a
//! single growable buffer, written until the sink backpressures so partial
//! writes pick up where the last one left off without re-copying
//! already-sent bytes.

use std::collections::VecDeque;
use std::io::{self, Write};

#[derive(Debug, Default)]
pub struct Pipe {
    buffer: VecDeque<u8>,
}

impl Pipe {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend(bytes.iter().copied());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Writes as much of the queue as `sink` accepts without blocking.
    /// Returns `Ok(true)` once the queue is fully drained, `Ok(false)` if
    /// the sink signaled backpressure (`WouldBlock`) with bytes still
    /// queued.
    pub fn drain_into(&mut self, sink: &mut impl Write) -> io::Result<bool> {
        let slice = self.buffer.make_contiguous();
        let mut written = 0;
        while written < slice.len() {
            match sink.write(&slice[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        self.buffer.drain(..written);
        Ok(self.buffer.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::Pipe;

    struct FlakySink {
        accepted: Vec<u8>,
        max_per_write: usize,
        would_block_after: Option<usize>,
        writes_done: usize,
    }

    impl std::io::Write for FlakySink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.would_block_after == Some(self.writes_done) {
                return Err(std::io::Error::from(std::io::ErrorKind::WouldBlock));
            }
            self.writes_done += 1;
            let n = buf.len().min(self.max_per_write);
            self.accepted.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn drains_fully_when_sink_accepts_everything() {
        let mut pipe = Pipe::new();
        pipe.push(b"hello world");
        let mut sink = FlakySink { accepted: Vec::new(), max_per_write: 1024, would_block_after: None, writes_done: 0 };
        assert!(pipe.drain_into(&mut sink).unwrap());
        assert!(pipe.is_empty());
        assert_eq!(sink.accepted, b"hello world");
    }

    #[test]
    fn partial_writes_leave_remainder_queued_for_next_drain() {
        let mut pipe = Pipe::new();
        pipe.push(b"abcdefgh");
        let mut sink = FlakySink { accepted: Vec::new(), max_per_write: 3, would_block_after: None, writes_done: 0 };
        assert!(pipe.drain_into(&mut sink).unwrap());
        assert_eq!(sink.accepted, b"abcdefgh");
    }

    #[test]
    fn would_block_stops_draining_without_losing_bytes() {
        let mut pipe = Pipe::new();
        pipe.push(b"abcdef");
        let mut sink =
            FlakySink { accepted: Vec::new(), max_per_write: 1024, would_block_after: Some(0), writes_done: 0 };
        assert!(!pipe.drain_into(&mut sink).unwrap());
        assert!(!pipe.is_empty());
        assert_eq!(sink.accepted, Vec::<u8>::new());

        sink.would_block_after = None;
        assert!(pipe.drain_into(&mut sink).unwrap());
        assert_eq!(sink.accepted, b"abcdef");
    }

    #[test]
    fn push_after_partial_drain_appends_without_reordering() {
        let mut pipe = Pipe::new();
        pipe.push(b"abc");
        let mut sink = FlakySink { accepted: Vec::new(), max_per_write: 2, would_block_after: Some(1), writes_done: 0 };
        assert!(!pipe.drain_into(&mut sink).unwrap());
        pipe.push(b"def");
        sink.would_block_after = None;
        assert!(pipe.drain_into(&mut sink).unwrap());
        assert_eq!(sink.accepted, b"abcdef");
    }
}
