//! Kernel channel transport and request/acknowledgement engine.
//!
//! A [`Channel`] owns the netlink endpoint to the kfault subsystem and
//! vets every received frame (peer authenticity, structural validity)
//! before handing it to callers. The [`RequestEngine`] turns one-way
//! sends into correlated request/ack exchanges over the same socket,
//! draining unrelated notification traffic while it waits.
//!
//! The [`ChannelIo`] trait is the seam between the two: the engine
//! never touches a socket directly, so tests drive it with scripted
//! mock channels.

pub mod channel;
pub mod engine;
pub mod error;
pub mod io;

pub use channel::{Channel, RecvMode};
pub use engine::{RequestEngine, SequenceCounter, ACK_RETRY_LIMIT, ACK_WAIT_TIMEOUT};
pub use error::{ChannelError, Result};
pub use io::ChannelIo;
