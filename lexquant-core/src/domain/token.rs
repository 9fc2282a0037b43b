//! Token — the fundamental stream unit.

use std::time::Instant;

/// A single textual token emitted by the token source.
///
/// Tokens are created at emission time, handed to the consumer once, and not
/// retained. `sequence_id` is monotonically increasing across the lifetime of
/// the source, including across buffer reloads.
#[derive(Debug, Clone)]
pub struct Token {
    pub text: String,
    pub sequence_id: u64,
    pub emitted_at: Instant,
}

impl Token {
    pub fn new(text: impl Into<String>, sequence_id: u64) -> Self {
        Self {
            text: text.into(),
            sequence_id,
            emitted_at: Instant::now(),
        }
    }
}
