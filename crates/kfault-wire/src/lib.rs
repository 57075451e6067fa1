//! Wire layer for the kfault kernel notification channel.
//!
//! The kernel's kfault subsystem speaks a small netlink protocol: every
//! message is a fixed-layout header followed by type-length-value
//! attributes, all native-endian. This crate owns that layout and
//! nothing else — no sockets, no I/O:
//! - A fixed-capacity [`Frame`] envelope matching the kernel header
//! - ABI constants and closed enums for commands, attributes,
//!   categories, levels and event ids ([`abi`])
//! - The attribute codec ([`attr`])
//! - Notification decoding ([`Notification`])

pub mod abi;
pub mod attr;
pub mod error;
pub mod frame;
pub mod notify;

pub use abi::{Category, Level, NETLINK_KFAULT};
pub use error::{Result, WireError};
pub use frame::{Frame, ALIGNTO, FRAME_CAPACITY, HEADER_SIZE};
pub use notify::{decode_notification, Notification};
