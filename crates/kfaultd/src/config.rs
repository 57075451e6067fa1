//! Daemon configuration file.
//!
//! Line-oriented `key = value` format: whitespace is trimmed, `#`
//! lines and blank lines are skipped, values may be wrapped in single
//! or double quotes, unknown keys are ignored. A missing file is not
//! an error — the daemon runs with defaults.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use kfault_wire::abi::{Category, Level, CATEGORY_MASK_ALL};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid value for {key} at line {line}: {value:?}")]
    BadValue {
        key: &'static str,
        line: usize,
        value: String,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    /// Append-only event log destination.
    pub log_file: PathBuf,
    /// Render event timestamps in UTC instead of local time.
    pub use_utc: bool,
    /// Severity floor for the subscription.
    pub filter_level: Level,
    /// Category mask to subscribe to.
    pub categories: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("/var/log/kfaultd/events.log"),
            use_utc: false,
            filter_level: Level::Warn,
            categories: CATEGORY_MASK_ALL,
        }
    }
}

/// Load configuration from `path`, falling back to defaults for a
/// missing file and for any key the file does not mention.
pub fn load(path: &Path) -> Result<DaemonConfig> {
    let mut config = DaemonConfig::default();

    if !path.exists() {
        debug!(?path, "no config file, using defaults");
        return Ok(config);
    }

    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = unquote(value.trim());
        let lineno = index + 1;

        match key {
            "log_file" => config.log_file = PathBuf::from(value),
            "use_utc" => {
                config.use_utc = parse_bool(value).ok_or_else(|| ConfigError::BadValue {
                    key: "use_utc",
                    line: lineno,
                    value: value.to_string(),
                })?
            }
            "filter_level" => {
                config.filter_level =
                    Level::from_name(value).ok_or_else(|| ConfigError::BadValue {
                        key: "filter_level",
                        line: lineno,
                        value: value.to_string(),
                    })?
            }
            "categories" => {
                config.categories = parse_categories(value).ok_or_else(|| ConfigError::BadValue {
                    key: "categories",
                    line: lineno,
                    value: value.to_string(),
                })?
            }
            other => debug!(key = other, "ignoring unknown config key"),
        }
    }

    Ok(config)
}

/// Strip one pair of surrounding single or double quotes.
fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Comma-separated category names; "all" selects every category.
fn parse_categories(value: &str) -> Option<u64> {
    if value == "all" {
        return Some(CATEGORY_MASK_ALL);
    }
    let mut mask = 0u64;
    for name in value.split(',') {
        mask |= Category::from_name(name.trim())?.bit();
    }
    if mask == 0 {
        return None;
    }
    Some(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("kfaultd-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = load(Path::new("/nonexistent/kfaultd.conf")).unwrap();
        assert_eq!(config, DaemonConfig::default());
    }

    #[test]
    fn parses_all_keys() {
        let path = write_config(
            "full.conf",
            "# kfaultd config\n\
             log_file = \"/tmp/events.log\"\n\
             use_utc = true\n\
             filter_level = error\n\
             categories = mem, fs\n",
        );
        let config = load(&path).unwrap();
        assert_eq!(config.log_file, PathBuf::from("/tmp/events.log"));
        assert!(config.use_utc);
        assert_eq!(config.filter_level, Level::Error);
        assert_eq!(
            config.categories,
            Category::Memory.bit() | Category::Filesystem.bit()
        );
    }

    #[test]
    fn skips_comments_blanks_and_unknown_keys() {
        let path = write_config(
            "sparse.conf",
            "\n# comment\nnot a key value line\nmystery = 42\nuse_utc = 1\n",
        );
        let config = load(&path).unwrap();
        assert!(config.use_utc);
        assert_eq!(config.filter_level, Level::Warn);
    }

    #[test]
    fn single_quoted_values_unquoted() {
        let path = write_config("quoted.conf", "log_file = '/srv/log/kf.log'\n");
        let config = load(&path).unwrap();
        assert_eq!(config.log_file, PathBuf::from("/srv/log/kf.log"));
    }

    #[test]
    fn bad_level_is_an_error_with_line_number() {
        let path = write_config("bad.conf", "use_utc = 0\nfilter_level = loud\n");
        let err = load(&path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::BadValue {
                key: "filter_level",
                line: 2,
                ..
            }
        ));
    }

    #[test]
    fn unknown_category_rejected() {
        let path = write_config("cat.conf", "categories = mem,plasma\n");
        assert!(load(&path).is_err());
    }

    #[test]
    fn all_categories_keyword() {
        let path = write_config("all.conf", "categories = all\n");
        let config = load(&path).unwrap();
        assert_eq!(config.categories, CATEGORY_MASK_ALL);
    }
}
