//! Decoding of unsolicited fault notifications.

use crate::abi::{cmd, event_name, notify_attr, Category, Level};
use crate::attr;
use crate::error::{Result, WireError};
use crate::frame::Frame;

/// One decoded fault/health event pushed by the kernel.
///
/// `Display` renders the line handed to the event log sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
    pub category: Category,
    pub level: Level,
    pub event: u32,
    /// Kernel-side occurrence counter for this event.
    pub count: u32,
}

/// Decode a `NOTIFY` frame into its fields.
///
/// Category, level and event are required; a missing count decodes as
/// zero (older kernels do not send it). Out-of-range category or level
/// values map to `Unknown`, never an error.
pub fn decode_notification(frame: &Frame) -> Result<Notification> {
    if frame.msg_type() != cmd::NOTIFY {
        return Err(WireError::Malformed("not a notification frame"));
    }

    let category = Category::from_raw(attr::get_u32(frame, notify_attr::CATEGORY)?);
    let level = Level::from_raw(attr::get_u32(frame, notify_attr::LEVEL)?);
    let event = attr::get_u32(frame, notify_attr::EVENT)?;
    let count = match attr::get_u32(frame, notify_attr::COUNT) {
        Ok(count) => count,
        Err(WireError::NotFound { .. }) => 0,
        Err(err) => return Err(err),
    };

    Ok(Notification {
        category,
        level,
        event,
        count,
    })
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "category={} level={} event={}({}) count={}",
            self.category,
            self.level,
            event_name(self.event),
            self.event,
            self.count
        )
    }
}
