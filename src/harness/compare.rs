//! Fragmentation-tolerant comparison of received messages
//!
//! Messages arrive from another thread in whatever pieces the session
//! happened to emit them. The comparator never waits for "everything": it
//! repeatedly takes at most as many characters as it still expects and
//! checks them against the front of the outstanding text. A short chunk
//! just means more is on the way.

use std::time::Duration;

use crate::common::{Error, Result};

/// Something that yields received text in blocking, bounded chunks
pub trait MessageSource {
    /// Block until some text is available, then remove and return at most
    /// `max_length` characters of it
    fn next_chunk(&self, max_length: usize, timeout: Option<Duration>) -> Result<String>;
}

/// Verify that `source` delivers exactly `expected`
///
/// Fails fast with [`Error::MessageMismatch`] on the first chunk that does
/// not continue the expected text. Without a timeout this blocks until the
/// full text has arrived.
pub fn compare_received<S>(source: &S, expected: &str, timeout: Option<Duration>) -> Result<()>
where
    S: MessageSource + ?Sized,
{
    let mut remaining = expected;
    let mut received = String::with_capacity(expected.len());

    while !remaining.is_empty() {
        let chunk = source
            .next_chunk(remaining.chars().count(), timeout)
            .map_err(|e| e.with_remaining(remaining))?;

        if chunk.is_empty() {
            return Err(Error::Internal(
                "message source returned an empty chunk".to_string(),
            ));
        }

        received.push_str(&chunk);
        match remaining.strip_prefix(chunk.as_str()) {
            Some(rest) => remaining = rest,
            None => {
                tracing::debug!(expected, actual = %received, "received messages diverged");
                return Err(Error::message_mismatch(expected, &received));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Source replaying fixed fragments, honoring the length bound
    struct Fragments(Mutex<VecDeque<String>>);

    impl Fragments {
        fn new(parts: &[&str]) -> Self {
            Self(Mutex::new(parts.iter().map(|p| p.to_string()).collect()))
        }
    }

    impl MessageSource for Fragments {
        fn next_chunk(&self, max_length: usize, _timeout: Option<Duration>) -> Result<String> {
            let mut parts = self.0.lock().unwrap();
            let Some(mut part) = parts.pop_front() else {
                return Err(Error::Interrupted {
                    remaining: String::new(),
                });
            };
            if max_length > 0 {
                if let Some((split, _)) = part.char_indices().nth(max_length) {
                    let rest = part.split_off(split);
                    parts.push_front(rest);
                }
            }
            Ok(part)
        }
    }

    #[test]
    fn test_single_chunk() {
        let source = Fragments::new(&["A\nB\n"]);
        compare_received(&source, "A\nB\n", None).unwrap();
    }

    #[test]
    fn test_many_fragments() {
        let source = Fragments::new(&["A", "\n", "B\n"]);
        compare_received(&source, "A\nB\n", None).unwrap();
    }

    #[test]
    fn test_leaves_extra_text_unconsumed() {
        let source = Fragments::new(&["A\nB\nC\n"]);
        compare_received(&source, "A\n", None).unwrap();

        let rest = source.next_chunk(0, None);
        assert_eq!(rest.unwrap(), "B\nC\n");
    }

    #[test]
    fn test_mismatch_reports_expected_and_received_prefix() {
        let source = Fragments::new(&["A\n", "X\n"]);
        let err = compare_received(&source, "A\nB\n", None).unwrap_err();
        match err {
            Error::MessageMismatch { expected, actual } => {
                assert_eq!(expected, "A\nB\n");
                assert_eq!(actual, "A\nX\n");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_interruption_names_outstanding_text() {
        let source = Fragments::new(&["A\n"]);
        let err = compare_received(&source, "A\nB\n", None).unwrap_err();
        assert!(matches!(err, Error::Interrupted { remaining } if remaining == "B\n"));
    }

    #[test]
    fn test_empty_expectation_consumes_nothing() {
        let source = Fragments::new(&["A\n"]);
        compare_received(&source, "", None).unwrap();
        assert_eq!(source.next_chunk(0, None).unwrap(), "A\n");
    }
}
