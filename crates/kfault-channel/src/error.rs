/// Errors that can occur on the kernel channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The running kernel does not support the kfault protocol family.
    /// Distinct from transient open failures so callers can report
    /// "feature absent" and treat it as fatal at startup.
    #[error("kfault channel unavailable: protocol family not supported by this kernel")]
    Unavailable,

    /// Binding the local netlink identity failed.
    #[error("failed to bind kfault netlink socket: {0}")]
    Bind(std::io::Error),

    /// The peer or frame violated the wire protocol.
    #[error("protocol violation: {0}")]
    Protocol(&'static str),

    /// A received frame filled the buffer exactly, meaning it was
    /// truncated by the transport.
    #[error("received frame fills the entire buffer (truncated)")]
    FrameTooBig,

    /// A frame arrived from a nonzero port id. Only the kernel (port
    /// id 0) may originate frames on this socket.
    #[error("spoofed frame from port id {port_id}")]
    SpoofedPeer { port_id: u32 },

    /// A send wrote fewer bytes than the frame declared; the request
    /// is considered undelivered.
    #[error("short write: wrote {wrote} of {expected} bytes")]
    ShortWrite { wrote: usize, expected: usize },

    /// One ack-wait attempt's readiness wait expired.
    #[error("timed out waiting for acknowledgement")]
    Timeout,

    /// The full ack-wait retry budget elapsed without a definitive
    /// acknowledgement. Repeated misses, not one long stall.
    #[error("retry budget exhausted waiting for acknowledgement")]
    ExhaustedRetries,

    /// The kernel acknowledged the request with a nonzero status.
    #[error("request rejected by kernel (errno {errno})")]
    Nack { errno: i32 },

    /// Transport-level I/O failure.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
