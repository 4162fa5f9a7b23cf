//! File configuration for uploader defaults.
//!
//! The file is a flat list of `key = value` lines: strings are
//! double-quoted, integers bare, `#` starts a comment. Unknown keys and
//! out-of-range values are rejected.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::pipeline::{DEFAULT_ITEM_DELAY, DEFAULT_MAX_RATE_LIMIT_WAIT, RetryPolicy};

/// Values read from the configuration file. `None` means "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Directory for the database, snapshots and downloads.
    pub data_dir: Option<PathBuf>,
    /// Root of the local directory destination.
    pub destination_root: Option<PathBuf>,
    /// Credit used when the operator skips the credit step.
    pub default_credit: Option<String>,
    /// Watermark used when the operator skips the watermark step.
    pub default_watermark: Option<String>,
    /// Wait for each parameter reply (1..=600).
    pub prompt_timeout_secs: Option<u64>,
    /// Character budget of one index page (500..=4096).
    pub page_budget: Option<usize>,
    /// Pause between items to one destination in milliseconds (0..=60000).
    pub item_delay_ms: Option<u64>,
    /// Retries of a rate-limited step (0..=5).
    pub rate_limit_retries: Option<u32>,
    /// Longest single rate-limit wait honoured (1..=3600).
    pub max_rate_limit_wait_secs: Option<u64>,
    /// Optional download client connect timeout in seconds.
    pub download_connect_timeout_secs: Option<u64>,
    /// Optional download client read timeout in seconds.
    pub download_read_timeout_secs: Option<u64>,
    /// Optional database pool max connections (1..=20).
    pub db_max_connections: Option<u32>,
    /// Optional database busy timeout in milliseconds.
    pub db_busy_timeout_ms: Option<u32>,
}

impl FileConfig {
    /// Validates config values against runtime constraints.
    ///
    /// # Errors
    ///
    /// Names the first key whose value is out of range.
    pub fn validate(&self) -> Result<()> {
        validate_range("prompt_timeout_secs", self.prompt_timeout_secs, 1, 600)?;
        validate_range("page_budget", self.page_budget, 500, 4096)?;
        validate_range("item_delay_ms", self.item_delay_ms, 0, 60_000)?;
        validate_range("rate_limit_retries", self.rate_limit_retries, 0, 5)?;
        validate_range(
            "max_rate_limit_wait_secs",
            self.max_rate_limit_wait_secs,
            1,
            3600,
        )?;
        validate_range(
            "download_connect_timeout_secs",
            self.download_connect_timeout_secs,
            1,
            3600,
        )?;
        validate_range(
            "download_read_timeout_secs",
            self.download_read_timeout_secs,
            1,
            3600,
        )?;
        validate_range("db_max_connections", self.db_max_connections, 1, 20)?;
        validate_range("db_busy_timeout_ms", self.db_busy_timeout_ms, 0, 120_000)?;
        Ok(())
    }

    /// Pause between items, falling back to the built-in default.
    #[must_use]
    pub fn item_delay(&self) -> Duration {
        self.item_delay_ms
            .map_or(DEFAULT_ITEM_DELAY, Duration::from_millis)
    }

    /// Retry policy from the configured limits.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy::new(
            self.rate_limit_retries
                .unwrap_or(defaults.rate_limit_retries()),
            self.max_rate_limit_wait_secs
                .map_or(DEFAULT_MAX_RATE_LIMIT_WAIT, Duration::from_secs),
        )
    }
}

fn validate_range<T>(field: &str, value: Option<T>, min: T, max: T) -> Result<()>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    let Some(value) = value else {
        return Ok(());
    };
    if value < min || value > max {
        bail!("Invalid config value for `{field}`: {value}. Expected range: {min}..={max}");
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config, empty when no file exists.
    pub config: FileConfig,
    /// Indicates whether configuration was loaded from disk.
    pub loaded_from_file: bool,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/uploader/config.toml`
/// 2. `$HOME/.config/uploader/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("uploader")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("uploader")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from `explicit` when given, else from the default path if
/// a file exists there.
///
/// # Errors
///
/// Fails when an explicit file is missing, or any file cannot be read or
/// parsed.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config,
            loaded_from_file: true,
        });
    }

    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(path_ref) if path_ref.exists() => {
            let config = load_file_config(path_ref)?;
            Ok(LoadedConfig {
                path,
                config,
                loaded_from_file: true,
            })
        }
        _ => Ok(LoadedConfig {
            path,
            config: FileConfig::default(),
            loaded_from_file: false,
        }),
    }
}

/// Reads and parses one config file.
///
/// # Errors
///
/// Fails when the file cannot be read or holds invalid settings.
pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

/// Parses config text.
///
/// # Errors
///
/// Fails on bad syntax, unknown keys, wrong value types or out-of-range
/// values.
pub fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        let line_no = line_index + 1;

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let context = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "data_dir" => {
                cfg.data_dir = Some(PathBuf::from(
                    parse_string_literal(value).with_context(context)?,
                ));
            }
            "destination_root" => {
                cfg.destination_root = Some(PathBuf::from(
                    parse_string_literal(value).with_context(context)?,
                ));
            }
            "default_credit" => {
                cfg.default_credit = Some(parse_string_literal(value).with_context(context)?);
            }
            "default_watermark" => {
                cfg.default_watermark = Some(parse_string_literal(value).with_context(context)?);
            }
            "prompt_timeout_secs" => {
                cfg.prompt_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "page_budget" => {
                let parsed = parse_integer_u64(value).with_context(context)?;
                cfg.page_budget = Some(
                    usize::try_from(parsed)
                        .map_err(|_| anyhow::anyhow!("page_budget out of range for usize"))?,
                );
            }
            "item_delay_ms" => {
                cfg.item_delay_ms = Some(parse_integer_u64(value).with_context(context)?);
            }
            "rate_limit_retries" => {
                let parsed = parse_integer_u64(value).with_context(context)?;
                cfg.rate_limit_retries = Some(
                    u32::try_from(parsed)
                        .map_err(|_| anyhow::anyhow!("rate_limit_retries out of range for u32"))?,
                );
            }
            "max_rate_limit_wait_secs" => {
                cfg.max_rate_limit_wait_secs =
                    Some(parse_integer_u64(value).with_context(context)?);
            }
            "download_connect_timeout_secs" => {
                cfg.download_connect_timeout_secs =
                    Some(parse_integer_u64(value).with_context(context)?);
            }
            "download_read_timeout_secs" => {
                cfg.download_read_timeout_secs =
                    Some(parse_integer_u64(value).with_context(context)?);
            }
            "db_max_connections" => {
                let parsed = parse_integer_u64(value).with_context(context)?;
                cfg.db_max_connections = Some(
                    u32::try_from(parsed)
                        .map_err(|_| anyhow::anyhow!("db_max_connections out of range for u32"))?,
                );
            }
            "db_busy_timeout_ms" => {
                let parsed = parse_integer_u64(value).with_context(context)?;
                cfg.db_busy_timeout_ms = Some(
                    u32::try_from(parsed)
                        .map_err(|_| anyhow::anyhow!("db_busy_timeout_ms out of range for u32"))?,
                );
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_partial_fields() {
        let cfg = parse_config_str(
            r#"
default_credit = "Physics Team"
prompt_timeout_secs = 45
"#,
        )
        .expect("partial config should parse");
        assert_eq!(cfg.default_credit.as_deref(), Some("Physics Team"));
        assert_eq!(cfg.prompt_timeout_secs, Some(45));
        assert!(cfg.data_dir.is_none());
    }

    #[test]
    fn test_parse_config_paths() {
        let cfg = parse_config_str(
            r#"
data_dir = "/var/lib/uploader"
destination_root = "/srv/chats"
"#,
        )
        .unwrap();
        assert_eq!(cfg.data_dir, Some(PathBuf::from("/var/lib/uploader")));
        assert_eq!(cfg.destination_root, Some(PathBuf::from("/srv/chats")));
    }

    #[test]
    fn test_parse_config_supports_inline_comments() {
        let cfg = parse_config_str(
            r##"
page_budget = 3000 # smaller pages
default_watermark = "#1 Team" # hash inside a string is kept
"##,
        )
        .expect("config with comments should parse");
        assert_eq!(cfg.page_budget, Some(3000));
        assert_eq!(cfg.default_watermark.as_deref(), Some("#1 Team"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_keys() {
        let err = parse_config_str("unknown_key = 123").expect_err("unknown key error expected");
        assert!(err.to_string().contains("Unknown configuration key"));
        assert!(err.to_string().contains("unknown_key"));
    }

    #[test]
    fn test_parse_config_rejects_missing_equals() {
        let err = parse_config_str("page_budget 3000").expect_err("syntax error expected");
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_parse_config_rejects_unquoted_string() {
        let err = parse_config_str("default_credit = Team").expect_err("quote error expected");
        assert!(err.to_string().contains("default_credit"));
    }

    #[test]
    fn test_parse_config_rejects_numeric_values_with_trailing_tokens() {
        let err = parse_config_str("item_delay_ms = 4 trailing")
            .expect_err("expected trailing token error");
        assert!(err.to_string().contains("item_delay_ms"));
    }

    #[test]
    fn test_parse_config_rejects_out_of_range_values() {
        for line in [
            "prompt_timeout_secs = 0",
            "prompt_timeout_secs = 601",
            "page_budget = 499",
            "page_budget = 4097",
            "item_delay_ms = 60001",
            "rate_limit_retries = 6",
            "max_rate_limit_wait_secs = 0",
            "download_read_timeout_secs = 3601",
            "db_max_connections = 0",
            "db_busy_timeout_ms = 120001",
        ] {
            let key = line.split_once(' ').unwrap().0;
            let err = parse_config_str(line).expect_err(line);
            assert!(err.to_string().contains(key), "{line}: {err}");
        }
    }

    #[test]
    fn test_parse_config_rejects_negative_integer() {
        let err = parse_config_str("item_delay_ms = -1").expect_err("negative value");
        assert!(format!("{err:#}").contains("non-negative"));
    }

    #[test]
    fn test_retry_policy_from_config() {
        let cfg = parse_config_str(
            r#"
rate_limit_retries = 3
max_rate_limit_wait_secs = 60
"#,
        )
        .unwrap();
        let policy = cfg.retry_policy();
        assert_eq!(policy.rate_limit_retries(), 3);
        assert_eq!(policy.max_wait(), Duration::from_secs(60));
    }

    #[test]
    fn test_defaults_when_unset() {
        let cfg = FileConfig::default();
        assert_eq!(cfg.item_delay(), DEFAULT_ITEM_DELAY);
        assert_eq!(cfg.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_load_file_config_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "item_delay_ms = 0\n").unwrap();

        let loaded = load_config(Some(&path)).unwrap();
        assert!(loaded.loaded_from_file);
        assert_eq!(loaded.config.item_delay(), Duration::ZERO);
    }

    #[test]
    fn test_load_config_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
