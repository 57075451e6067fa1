use std::time::Duration;

use tracing::{debug, warn};

use kfault_wire::abi::{cmd, flags};
use kfault_wire::Frame;

use crate::error::{ChannelError, Result};
use crate::io::ChannelIo;

/// How many ack-wait attempts one request gets. Each drained foreign
/// frame or empty non-blocking read spends one attempt, so a flood of
/// notifications cannot starve the wait indefinitely.
pub const ACK_RETRY_LIMIT: u32 = 5;

/// Readiness timeout per ack-wait attempt.
pub const ACK_WAIT_TIMEOUT: Duration = Duration::from_millis(3000);

/// Monotonically increasing correlation id source.
///
/// Starts at 1 (0 is reserved for unsolicited traffic), wraps per
/// 32-bit arithmetic and skips 0 on wrap. Single-writer: owned by one
/// [`RequestEngine`], never shared.
#[derive(Debug)]
pub struct SequenceCounter {
    last: u32,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self { last: 0 }
    }

    pub fn next_id(&mut self) -> u32 {
        self.last = self.last.wrapping_add(1);
        if self.last == 0 {
            self.last = 1;
        }
        self.last
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Correlates requests with their acknowledgements on a socket that
/// also carries unsolicited notifications.
///
/// `send_request` stamps the frame with a fresh sequence id and the
/// request/ack flags, sends it, then peeks at incoming frames until
/// the matching error/ack envelope appears. Frames with a foreign
/// sequence are consumed and discarded — they are async notifications
/// or stale replies, not failures — but each drain spends one retry
/// attempt. Two back-to-back requests must not rely on reply order;
/// correlation is by sequence id alone.
#[derive(Debug, Default)]
pub struct RequestEngine {
    seq: SequenceCounter,
}

impl RequestEngine {
    pub fn new() -> Self {
        Self {
            seq: SequenceCounter::new(),
        }
    }

    /// Send `frame` as a request and wait for its acknowledgement.
    ///
    /// A short write fails immediately with
    /// [`ChannelError::ShortWrite`]; the ack wait is never entered for
    /// an undelivered request. A nonzero embedded ack status becomes
    /// [`ChannelError::Nack`].
    pub fn send_request<C: ChannelIo>(&mut self, channel: &mut C, frame: &mut Frame) -> Result<()> {
        let seq = self.seq.next_id();
        frame.set_flags(flags::REQUEST | flags::ACK);
        frame.set_sequence(seq);

        let wrote = channel.send_frame(frame)?;
        if wrote != frame.len() {
            return Err(ChannelError::ShortWrite {
                wrote,
                expected: frame.len(),
            });
        }

        Self::wait_ack(channel, seq)
    }

    fn wait_ack<C: ChannelIo>(channel: &mut C, seq: u32) -> Result<()> {
        let mut reply = Frame::zeroed();

        for _ in 0..ACK_RETRY_LIMIT {
            if !channel.wait_readable(ACK_WAIT_TIMEOUT)? {
                return Err(ChannelError::Timeout);
            }

            let received = channel.peek_next(&mut reply)?;
            if received == 0 {
                // Another watcher drained the queue between the
                // readiness wait and our read.
                continue;
            }

            if reply.sequence() != seq {
                debug!(
                    got = reply.sequence(),
                    want = seq,
                    "draining unrelated frame during ack wait"
                );
                channel.consume_next(&mut reply)?;
                continue;
            }

            if reply.msg_type() == cmd::ERROR {
                let status = reply
                    .error_status()
                    .ok_or(ChannelError::Protocol("ack frame too short for status"))?;
                channel.consume_next(&mut reply)?;
                if status == 0 {
                    return Ok(());
                }
                let errno = -status;
                warn!(errno, "request rejected by kernel");
                return Err(ChannelError::Nack { errno });
            }

            // A matching sequence with an unexpected type should not
            // occur per protocol; drain it so the wait cannot hang.
            warn!(
                seq,
                msg_type = reply.msg_type(),
                "unexpected reply type at matching sequence"
            );
            channel.consume_next(&mut reply)?;
        }

        Err(ChannelError::ExhaustedRetries)
    }
}
