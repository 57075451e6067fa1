//! Constants fixed by the kernel's kfault ABI.
//!
//! These values must match the kernel module bit for bit. Categories,
//! levels and events are closed enums with an explicit `Unknown`
//! variant so an out-of-range value from the kernel decodes to
//! something printable instead of faulting a table lookup.

/// Netlink protocol family number of the kfault channel.
pub const NETLINK_KFAULT: i32 = 31;

/// Message types (commands and replies).
pub mod cmd {
    /// Standard netlink error/acknowledgement reply.
    pub const ERROR: u16 = 0x2;
    /// Request channel statistics.
    pub const GET_STATUS: u16 = 0x10;
    /// Set channel configuration parameters.
    pub const SET_CHANNEL: u16 = 0x11;
    /// Subscribe to fault events.
    pub const SUBSCRIBE: u16 = 0x12;
    /// Unsolicited fault notification pushed by the kernel.
    pub const NOTIFY: u16 = 0x13;
}

/// Header flag bits (standard netlink NLM_F_* values).
pub mod flags {
    pub const REQUEST: u16 = 0x1;
    pub const ACK: u16 = 0x4;
}

/// Channel configuration attribute ids.
pub mod chan_attr {
    pub const UNSPEC: u16 = 0;
    pub const ENABLE: u16 = 1;
    pub const PORT_ID: u16 = 2;
    pub const FILTER_LEVEL: u16 = 3;
    pub const BACKLOG_LIMIT: u16 = 4;
    /// Current backlog depth. Read-only.
    pub const BACKLOG_DEPTH: u16 = 5;
    /// Dropped-packet counter. Read-only, cleared by writing.
    pub const PACKET_LOSS: u16 = 6;
    /// Statistics selection mask for `GET_STATUS`.
    pub const STAT_MASK: u16 = 7;

    /// Number of channel attribute ids (one past the highest).
    pub const COUNT: usize = 8;

    /// Bitmask position of an attribute id.
    pub const fn mask(id: u16) -> u32 {
        1 << id
    }

    /// Attributes that may be written via `SET_CHANNEL`. Everything
    /// else (backlog depth, the stat mask itself) is read-only.
    pub const SETTABLE: u32 = mask(ENABLE)
        | mask(PORT_ID)
        | mask(FILTER_LEVEL)
        | mask(BACKLOG_LIMIT)
        | mask(PACKET_LOSS);

    /// Human-readable name for diagnostics.
    pub fn name(id: u16) -> &'static str {
        match id {
            ENABLE => "enable",
            PORT_ID => "port_id",
            FILTER_LEVEL => "filter_level",
            BACKLOG_LIMIT => "backlog_limit",
            BACKLOG_DEPTH => "backlog_depth",
            PACKET_LOSS => "packet_loss",
            STAT_MASK => "stat_mask",
            _ => "unknown",
        }
    }
}

/// Subscription request attribute ids.
pub mod sub_attr {
    /// Category bitmask, u64.
    pub const TYPE_MASK: u16 = 1;
    /// Dense per-event bitmap, byte blob.
    pub const EVENT_BITMAP: u16 = 2;
    /// Severity floor, u32.
    pub const LEVEL: u16 = 3;
}

/// Notification payload attribute ids.
pub mod notify_attr {
    pub const CATEGORY: u16 = 1;
    pub const LEVEL: u16 = 2;
    pub const EVENT: u16 = 3;
    pub const COUNT: u16 = 4;
}

/// One past the highest valid category id.
pub const CATEGORY_MAX: u32 = 10;

/// All valid category mask bits (category ids 1..=9; bit 0 is unspec).
pub const CATEGORY_MASK_ALL: u64 = ((1 << CATEGORY_MAX) - 1) & !1;

/// Broad event class a notification belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Generic,
    Memory,
    Io,
    Filesystem,
    Sched,
    Net,
    Ras,
    Virt,
    Security,
    Unknown(u32),
}

impl Category {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Category::Generic,
            2 => Category::Memory,
            3 => Category::Io,
            4 => Category::Filesystem,
            5 => Category::Sched,
            6 => Category::Net,
            7 => Category::Ras,
            8 => Category::Virt,
            9 => Category::Security,
            other => Category::Unknown(other),
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            Category::Generic => 1,
            Category::Memory => 2,
            Category::Io => 3,
            Category::Filesystem => 4,
            Category::Sched => 5,
            Category::Net => 6,
            Category::Ras => 7,
            Category::Virt => 8,
            Category::Security => 9,
            Category::Unknown(raw) => raw,
        }
    }

    /// Subscription mask bit for this category.
    pub fn bit(self) -> u64 {
        1 << self.raw()
    }

    pub fn name(self) -> &'static str {
        match self {
            Category::Generic => "generic",
            Category::Memory => "mem",
            Category::Io => "io",
            Category::Filesystem => "fs",
            Category::Sched => "sched",
            Category::Net => "net",
            Category::Ras => "ras",
            Category::Virt => "virtual",
            Category::Security => "security",
            Category::Unknown(_) => "unknown",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "generic" => Some(Category::Generic),
            "mem" => Some(Category::Memory),
            "io" => Some(Category::Io),
            "fs" => Some(Category::Filesystem),
            "sched" => Some(Category::Sched),
            "net" => Some(Category::Net),
            "ras" => Some(Category::Ras),
            "virtual" => Some(Category::Virt),
            "security" => Some(Category::Security),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One past the highest valid severity level.
pub const LEVEL_MAX: u32 = 5;

/// Ordered severity of a notification or subscription floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Matches every severity (subscription floor only).
    All,
    Info,
    Warn,
    Error,
    Fatal,
    Unknown(u32),
}

impl Level {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Level::All,
            1 => Level::Info,
            2 => Level::Warn,
            3 => Level::Error,
            4 => Level::Fatal,
            other => Level::Unknown(other),
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            Level::All => 0,
            Level::Info => 1,
            Level::Warn => 2,
            Level::Error => 3,
            Level::Fatal => 4,
            Level::Unknown(raw) => raw,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Level::All => "all",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
            Level::Unknown(_) => "unknown",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "all" => Some(Level::All),
            "info" => Some(Level::Info),
            "warn" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "fatal" => Some(Level::Fatal),
            _ => None,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Event ids start at this offset; bitmap bit index = id - EVENT_BASE.
pub const EVENT_BASE: u32 = 1000;

/// Size of the subscription event bitmap, in bits.
pub const EVENT_MAX: u32 = 64;

/// Concrete event ids.
pub mod event {
    pub const SOFTLOCKUP: u32 = 1000;
    pub const RCU_STALL: u32 = 1001;
    pub const HUNG_TASK: u32 = 1002;
    pub const ALLOC_FAIL: u32 = 1003;
    pub const OOM: u32 = 1004;
    pub const BAD_MEM_STATE: u32 = 1005;
    pub const MEM_LEAK: u32 = 1006;
    pub const EXT4_ERROR: u32 = 1007;
}

/// Human-readable name of a concrete event id.
pub fn event_name(id: u32) -> &'static str {
    match id {
        event::SOFTLOCKUP => "softlockup",
        event::RCU_STALL => "rcu_stall",
        event::HUNG_TASK => "hung_task",
        event::ALLOC_FAIL => "alloc_fail",
        event::OOM => "oom",
        event::BAD_MEM_STATE => "bad_mem_state",
        event::MEM_LEAK => "mem_leak",
        event::EXT4_ERROR => "ext4_error",
        _ => "unknown",
    }
}
