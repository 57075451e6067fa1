use std::time::Duration;

use kfault_wire::Frame;

use crate::error::Result;

/// Transport seam between the request engine and the kernel channel.
///
/// The shared socket carries both correlated acks and unsolicited
/// notifications, so reads come in two phases: `peek_next` inspects
/// the head of the queue without consuming it, and `consume_next`
/// removes it. The engine peeks first and only consumes frames it has
/// decided about, so a notification a concurrent dispatch path wants
/// is never lost to the ack wait.
///
/// Both read methods return the received byte count, with `Ok(0)`
/// meaning "no data available right now".
pub trait ChannelIo {
    /// Write a frame; returns the byte count the transport accepted.
    fn send_frame(&mut self, frame: &Frame) -> Result<usize>;

    /// Wait until the channel is readable or the timeout expires.
    /// `Ok(false)` means the timeout expired.
    fn wait_readable(&mut self, timeout: Duration) -> Result<bool>;

    /// Non-blocking read that leaves the frame in the queue.
    fn peek_next(&mut self, frame: &mut Frame) -> Result<usize>;

    /// Non-blocking read that removes the frame from the queue.
    fn consume_next(&mut self, frame: &mut Frame) -> Result<usize>;
}
