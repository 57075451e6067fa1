//! Append-only event log.
//!
//! Each notification becomes one timestamped line. The formatted
//! second is cached: bursts of events within the same second reuse the
//! rendered prefix and only the millisecond suffix is recomputed.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use chrono::{Local, TimeZone, Utc};

use kfault_wire::Notification;

pub struct EventLog {
    file: BufWriter<File>,
    use_utc: bool,
    cached_sec: i64,
    cached_prefix: String,
}

impl EventLog {
    /// Open `path` for appending, creating it if needed.
    pub fn open(path: &Path, use_utc: bool) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: BufWriter::new(file),
            use_utc,
            cached_sec: i64::MIN,
            cached_prefix: String::new(),
        })
    }

    /// Switch the timestamp zone. Invalidates the cached prefix.
    pub fn set_utc(&mut self, use_utc: bool) {
        if self.use_utc != use_utc {
            self.use_utc = use_utc;
            self.cached_sec = i64::MIN;
        }
    }

    /// Append one event line and flush it to disk.
    pub fn write(&mut self, notification: &Notification) -> io::Result<()> {
        let now = Utc::now();
        let sec = now.timestamp();
        let millis = now.timestamp_subsec_millis();

        if sec != self.cached_sec {
            self.cached_prefix = if self.use_utc {
                match Utc.timestamp_opt(sec, 0).single() {
                    Some(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
                    None => sec.to_string(),
                }
            } else {
                match Local.timestamp_opt(sec, 0).single() {
                    Some(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
                    None => sec.to_string(),
                }
            };
            self.cached_sec = sec;
        }

        writeln!(
            self.file,
            "{}.{:03} {}",
            self.cached_prefix, millis, notification
        )?;
        self.file.flush()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("use_utc", &self.use_utc)
            .finish()
    }
}
