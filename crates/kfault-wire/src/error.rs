/// Errors that can occur while encoding or decoding frame payloads.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The attribute does not fit in the frame's remaining capacity.
    #[error("frame full: attribute needs {needed} bytes, {remaining} remaining")]
    FrameFull { needed: usize, remaining: usize },

    /// No attribute with the requested id exists in the payload.
    #[error("attribute {id} not found")]
    NotFound { id: u16 },

    /// An attribute was found but its value has the wrong width.
    #[error("attribute {id}: expected {expected} value bytes, got {got}")]
    BadLength {
        id: u16,
        expected: usize,
        got: usize,
    },

    /// The frame does not have the expected shape.
    #[error("malformed frame: {0}")]
    Malformed(&'static str),
}

pub type Result<T> = std::result::Result<T, WireError>;
