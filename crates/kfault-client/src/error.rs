use kfault_channel::ChannelError;
use kfault_wire::WireError;

/// Errors surfaced by the client API.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A caller-supplied value violates a kernel-declared bound.
    /// Always detected before any I/O and never retried.
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// Failure on the kernel channel or in the ack exchange.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Encoding failure while building a request frame.
    #[error(transparent)]
    Wire(#[from] WireError),
}

impl ClientError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        ClientError::InvalidArgument {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
