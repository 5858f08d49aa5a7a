//! Received-message log
//!
//! Every message the session emits is appended, newline terminated, to one
//! text log. Readers drain it either whole or by a bounded prefix; the
//! bounded form lets the comparator consume exactly as much as it still
//! expects and leave anything after that for the next reader.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::common::{Error, Result};

use super::compare::MessageSource;

/// Terminator appended after every message
pub const RECORD_TERMINATOR: char = '\n';

#[derive(Debug, Default)]
struct LogState {
    text: String,
    closed: bool,
}

/// How long a drain may wait for the log to become non-empty
#[derive(Debug, Clone, Copy)]
enum Wait {
    No,
    Forever,
    Until(Instant, Duration),
}

/// Monitor-guarded text accumulator
#[derive(Debug, Default)]
pub struct MessageBuffer {
    state: Mutex<LogState>,
    appended: Condvar,
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        // Nothing panics while holding this lock, but a poisoned log is
        // still a consistent string.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one message and wake any blocked drainer
    pub fn append(&self, message: &str) {
        let mut state = self.lock();
        state.text.push_str(message);
        state.text.push(RECORD_TERMINATOR);
        self.appended.notify_all();
    }

    /// Remove buffered text
    ///
    /// With `block_if_empty`, waits until something has been appended.
    /// A `max_length` of zero, or one at least the buffered length, removes
    /// everything; otherwise exactly `max_length` characters are removed and
    /// the rest stays buffered.
    pub fn drain(&self, block_if_empty: bool, max_length: usize) -> Result<String> {
        let wait = if block_if_empty { Wait::Forever } else { Wait::No };
        self.drain_with(wait, max_length)
    }

    /// Blocking drain that gives up after `timeout`
    pub fn drain_timeout(&self, max_length: usize, timeout: Duration) -> Result<String> {
        self.drain_with(Wait::Until(Instant::now() + timeout, timeout), max_length)
    }

    fn drain_with(&self, wait: Wait, max_length: usize) -> Result<String> {
        let mut state = self.lock();

        while state.text.is_empty() {
            if state.closed && !matches!(wait, Wait::No) {
                return Err(Error::Interrupted {
                    remaining: String::new(),
                });
            }
            match wait {
                Wait::No => break,
                Wait::Forever => {
                    state = self
                        .appended
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Wait::Until(deadline, timeout) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(Error::ReceiveTimeout {
                            remaining: String::new(),
                            millis: timeout.as_millis() as u64,
                        });
                    }
                    state = self
                        .appended
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }

        Ok(take_prefix(&mut state.text, max_length))
    }

    /// Stop accepting waits; blocked drainers on an empty log are released
    /// with [`Error::Interrupted`]
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        self.appended.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Buffered length in characters
    pub fn len(&self) -> usize {
        self.lock().text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().text.is_empty()
    }
}

/// Split off the first `max_length` characters of `text`
fn take_prefix(text: &mut String, max_length: usize) -> String {
    if max_length == 0 {
        return std::mem::take(text);
    }
    match text.char_indices().nth(max_length) {
        Some((split, _)) => {
            let rest = text.split_off(split);
            std::mem::replace(text, rest)
        }
        None => std::mem::take(text),
    }
}

impl MessageSource for MessageBuffer {
    fn next_chunk(&self, max_length: usize, timeout: Option<Duration>) -> Result<String> {
        match timeout {
            Some(timeout) => self.drain_timeout(max_length, timeout),
            None => self.drain(true, max_length),
        }
    }
}

/// Receiving end handed to the session
///
/// Cheap to clone; every clone appends to the same buffer.
#[derive(Debug, Clone)]
pub struct MessageSink {
    buffer: Arc<MessageBuffer>,
}

impl MessageSink {
    pub fn new(buffer: Arc<MessageBuffer>) -> Self {
        Self { buffer }
    }

    /// Deliver one outbound protocol message
    pub fn send(&self, message: &str) {
        tracing::trace!(text = message, "session message");
        self.buffer.append(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_append_terminates_each_message() {
        let buffer = MessageBuffer::new();
        buffer.append("A");
        buffer.append("B");
        assert_eq!(buffer.drain(false, 0).unwrap(), "A\nB\n");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_non_blocking_drain_on_empty_returns_empty() {
        let buffer = MessageBuffer::new();
        assert_eq!(buffer.drain(false, 0).unwrap(), "");
    }

    #[test]
    fn test_bounded_drain_leaves_remainder() {
        let buffer = MessageBuffer::new();
        buffer.append("hello");
        assert_eq!(buffer.drain(false, 3).unwrap(), "hel");
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.drain(false, 0).unwrap(), "lo\n");
    }

    #[test]
    fn test_bounded_drain_larger_than_log_takes_all() {
        let buffer = MessageBuffer::new();
        buffer.append("ab");
        assert_eq!(buffer.drain(false, 10).unwrap(), "ab\n");
    }

    #[test]
    fn test_bounded_drain_counts_characters() {
        let buffer = MessageBuffer::new();
        buffer.append("żółw");
        assert_eq!(buffer.drain(false, 2).unwrap(), "żó");
        assert_eq!(buffer.drain(false, 0).unwrap(), "łw\n");
    }

    #[test]
    fn test_blocking_drain_waits_for_append() {
        let buffer = Arc::new(MessageBuffer::new());
        let writer = {
            let buffer = buffer.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                buffer.append("late");
            })
        };

        assert_eq!(buffer.drain(true, 0).unwrap(), "late\n");
        writer.join().unwrap();
    }

    #[test]
    fn test_drain_timeout_expires() {
        let buffer = MessageBuffer::new();
        let err = buffer
            .drain_timeout(0, Duration::from_millis(20))
            .unwrap_err();
        assert!(matches!(err, Error::ReceiveTimeout { millis: 20, .. }));
    }

    #[test]
    fn test_close_releases_blocked_drainer() {
        let buffer = Arc::new(MessageBuffer::new());
        let reader = {
            let buffer = buffer.clone();
            thread::spawn(move || buffer.drain(true, 0))
        };

        thread::sleep(Duration::from_millis(50));
        buffer.close();

        let err = reader.join().unwrap().unwrap_err();
        assert!(matches!(err, Error::Interrupted { .. }));
    }

    #[test]
    fn test_closed_buffer_still_yields_buffered_text() {
        let buffer = MessageBuffer::new();
        buffer.append("kept");
        buffer.close();
        assert_eq!(buffer.drain(true, 0).unwrap(), "kept\n");
        assert!(buffer.drain(false, 0).unwrap().is_empty());
    }

    #[test]
    fn test_sink_clones_share_buffer() {
        let buffer = Arc::new(MessageBuffer::new());
        let sink = MessageSink::new(buffer.clone());
        let other = sink.clone();
        sink.send("one");
        other.send("two");
        assert_eq!(buffer.drain(false, 0).unwrap(), "one\ntwo\n");
    }
}
