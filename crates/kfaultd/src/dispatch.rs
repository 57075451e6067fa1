//! Notification dispatch loop and signal handling.
//!
//! SIGTERM/SIGINT request shutdown, SIGHUP requests a config reload.
//! Handlers only flip atomics; the loop observes them between poll
//! ticks, so an interrupted poll is at most one tick late.

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use kfault_channel::{ChannelError, ChannelIo};
use kfault_client::Client;
use kfault_wire::{decode_notification, Frame};

use crate::config::{self, DaemonConfig};
use crate::eventlog::EventLog;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);
static RELOAD: AtomicBool = AtomicBool::new(false);

/// How long each poll tick waits before re-checking the signal flags.
const TICK: Duration = Duration::from_secs(1);

extern "C" fn on_shutdown(_signum: libc::c_int) {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

extern "C" fn on_reload(_signum: libc::c_int) {
    RELOAD.store(true, Ordering::SeqCst);
}

/// Install the daemon's signal handlers.
pub fn install_signal_handlers() -> io::Result<()> {
    install(libc::SIGTERM, on_shutdown as usize)?;
    install(libc::SIGINT, on_shutdown as usize)?;
    install(libc::SIGHUP, on_reload as usize)?;
    Ok(())
}

fn install(signum: libc::c_int, handler: usize) -> io::Result<()> {
    // SAFETY: sigaction is valid when zero-initialized and the handler
    // pointer stays alive for the process lifetime.
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handler;
        libc::sigemptyset(&mut action.sa_mask);
        if libc::sigaction(signum, &action, std::ptr::null_mut()) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Run the dispatch loop until a shutdown signal arrives.
///
/// Each tick drains every queued notification from the channel into
/// the event log. Bad frames never stop the daemon; only a transport
/// failure ends the loop.
pub fn run<C: ChannelIo>(
    client: &mut Client<C>,
    log: &mut EventLog,
    config_path: &Path,
    mut config: DaemonConfig,
) -> io::Result<()> {
    let mut frame = Frame::zeroed();

    while !SHUTDOWN.swap(false, Ordering::SeqCst) {
        if RELOAD.swap(false, Ordering::SeqCst) {
            config = reload(client, log, config_path, config);
        }

        match client.channel_mut().wait_readable(TICK) {
            Ok(false) => continue,
            Ok(true) => {}
            Err(err) => {
                warn!(%err, "poll failed, stopping dispatch");
                return Err(io::Error::other(err));
            }
        }

        drain(client.channel_mut(), &mut frame, log)?;
    }

    info!("shutdown requested");
    Ok(())
}

/// Consume every queued frame, logging the decodable notifications.
///
/// A rejected frame (spoofed peer, malformed, oversized) or an
/// undecodable one is fatal to that read only: the offending frame is
/// already off the queue, so the drain logs it and moves on. Only a
/// transport-level I/O failure propagates.
fn drain<C: ChannelIo>(channel: &mut C, frame: &mut Frame, log: &mut EventLog) -> io::Result<()> {
    loop {
        match channel.consume_next(frame) {
            Ok(0) => return Ok(()),
            Ok(_) => match decode_notification(frame) {
                Ok(notification) => {
                    debug!(%notification, "fault event");
                    log.write(&notification)?;
                }
                Err(err) => warn!(%err, "discarding undecodable frame"),
            },
            Err(
                err @ (ChannelError::SpoofedPeer { .. }
                | ChannelError::Protocol(_)
                | ChannelError::FrameTooBig),
            ) => {
                warn!(%err, "discarding rejected frame");
            }
            Err(err) => {
                warn!(%err, "receive failed, stopping dispatch");
                return Err(io::Error::other(err));
            }
        }
    }
}

/// Re-read the config file and apply what can change at runtime: the
/// timestamp zone and the severity floor. A reload failure keeps the
/// previous configuration.
fn reload<C: ChannelIo>(
    client: &mut Client<C>,
    log: &mut EventLog,
    config_path: &Path,
    previous: DaemonConfig,
) -> DaemonConfig {
    info!(?config_path, "reloading configuration");
    let config = match config::load(config_path) {
        Ok(config) => config,
        Err(err) => {
            warn!(%err, "reload failed, keeping previous configuration");
            return previous;
        }
    };

    log.set_utc(config.use_utc);
    if config.filter_level != previous.filter_level {
        if let Err(err) = client.set_filter_level(config.filter_level) {
            warn!(%err, "could not apply new filter level");
        }
    }
    config
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::PathBuf;

    use super::*;
    use kfault_channel::Result as ChannelResult;
    use kfault_wire::abi::{cmd, event, notify_attr};
    use kfault_wire::attr;

    /// Scripted queue standing in for the kernel socket: each entry is
    /// either a received frame or the vetting error that read produced.
    struct ScriptedChannel {
        script: VecDeque<ChannelResult<Frame>>,
    }

    impl ScriptedChannel {
        fn new(script: Vec<ChannelResult<Frame>>) -> Self {
            Self {
                script: script.into(),
            }
        }
    }

    impl ChannelIo for ScriptedChannel {
        fn send_frame(&mut self, frame: &Frame) -> ChannelResult<usize> {
            Ok(frame.len())
        }

        fn wait_readable(&mut self, _timeout: Duration) -> ChannelResult<bool> {
            Ok(!self.script.is_empty())
        }

        fn peek_next(&mut self, _frame: &mut Frame) -> ChannelResult<usize> {
            Ok(0)
        }

        fn consume_next(&mut self, frame: &mut Frame) -> ChannelResult<usize> {
            match self.script.pop_front() {
                Some(Ok(next)) => {
                    *frame = next;
                    Ok(frame.len())
                }
                Some(Err(err)) => Err(err),
                None => Ok(0),
            }
        }
    }

    fn notify_frame(event: u32) -> Frame {
        let mut frame = Frame::new(cmd::NOTIFY);
        attr::put_u32(&mut frame, notify_attr::CATEGORY, 2).unwrap();
        attr::put_u32(&mut frame, notify_attr::LEVEL, 2).unwrap();
        attr::put_u32(&mut frame, notify_attr::EVENT, event).unwrap();
        frame
    }

    fn temp_log(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("kfaultd-dispatch-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn handlers_flip_their_flag() {
        on_reload(libc::SIGHUP);
        assert!(RELOAD.swap(false, Ordering::SeqCst));
        on_shutdown(libc::SIGTERM);
        assert!(SHUTDOWN.swap(false, Ordering::SeqCst));
    }

    #[test]
    fn handlers_install_without_error() {
        install_signal_handlers().unwrap();
    }

    #[test]
    fn drain_survives_rejected_frames() {
        let path = temp_log("rejected.log");
        let mut log = EventLog::open(&path, true).unwrap();
        let mut channel = ScriptedChannel::new(vec![
            Err(ChannelError::SpoofedPeer { port_id: 4321 }),
            Err(ChannelError::Protocol("malformed frame header")),
            Err(ChannelError::FrameTooBig),
            Ok(notify_frame(event::OOM)),
        ]);

        drain(&mut channel, &mut Frame::zeroed(), &mut log).unwrap();

        // The good frame behind the bad ones still got logged.
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains("event=oom(1004)"));
        assert!(channel.script.is_empty());
    }

    #[test]
    fn drain_skips_undecodable_frames() {
        let path = temp_log("undecodable.log");
        let mut log = EventLog::open(&path, true).unwrap();
        let mut channel = ScriptedChannel::new(vec![
            Ok(Frame::new(cmd::SUBSCRIBE)),
            Ok(notify_frame(event::MEM_LEAK)),
        ]);

        drain(&mut channel, &mut Frame::zeroed(), &mut log).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains("event=mem_leak(1006)"));
    }

    #[test]
    fn drain_stops_on_transport_failure() {
        let path = temp_log("transport.log");
        let mut log = EventLog::open(&path, true).unwrap();
        let mut channel = ScriptedChannel::new(vec![
            Err(ChannelError::Io(io::Error::from(io::ErrorKind::BrokenPipe))),
            Ok(notify_frame(event::OOM)),
        ]);

        let err = drain(&mut channel, &mut Frame::zeroed(), &mut log).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        // Nothing after the failure was read.
        assert_eq!(channel.script.len(), 1);
    }
}
