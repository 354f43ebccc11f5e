//! Configuration record: TOML loading, defaults and range validation.
//!
//! Values outside their allowed range are not errors. `Config::validate`
//! puts them back to the default and reports one [`ValidationIssue`] per
//! correction so the caller can surface them.

use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use std::{
    fmt, fs, io,
    ops::RangeInclusive,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use thiserror::Error;

use crate::{
    duration,
    phase::{PhaseDurations, PhaseType},
};

const APP_DIR: &str = "tickadoro";
const MAX_MESSAGE_CHARS: usize = 32;
pub const BORDER_TYPES: &[&str] = &["rounded", "plain", "thick", "double"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// A value that was out of range and has been reset to its default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub key: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {}", self.key, self.message)
    }
}

// ============================================================================
// Data Models
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    #[serde(with = "duration::text")]
    pub tick_duration: Duration,
    /// Pause budget per phase.
    #[serde(with = "duration::text")]
    pub max_pause_duration: Duration,
    pub auto_start: bool,
    pub skipping: bool,
    pub pausing: bool,
    pub sound: bool,
    pub durations: PhaseDurations,
    pub progress_bar: ProgressBarConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_duration: Duration::from_millis(50),
            max_pause_duration: Duration::from_secs(5 * 60),
            auto_start: true,
            skipping: true,
            pausing: true,
            sound: true,
            durations: PhaseDurations::default(),
            progress_bar: ProgressBarConfig::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ProgressBarConfig {
    pub padding: u16,
    pub max_width: u16,
    pub border_type: String,
    pub focus_color: String,
    pub short_break_color: String,
    pub long_break_color: String,
    pub pause_color: String,
    pub focus_msg: String,
    pub short_break_msg: String,
    pub long_break_msg: String,
    pub pause_msg: String,
}

impl Default for ProgressBarConfig {
    fn default() -> Self {
        Self {
            padding: 5,
            max_width: 40,
            border_type: "thick".into(),
            focus_color: "red".into(),
            short_break_color: "green".into(),
            long_break_color: "cyan".into(),
            pause_color: "darkgray".into(),
            focus_msg: "Let's focus".into(),
            short_break_msg: "Stretch a little".into(),
            long_break_msg: "You earned it".into(),
            pause_msg: "Paused".into(),
        }
    }
}

impl ProgressBarConfig {
    pub fn color(&self, phase: PhaseType) -> &str {
        match phase {
            PhaseType::Focus => &self.focus_color,
            PhaseType::ShortBreak => &self.short_break_color,
            PhaseType::LongBreak => &self.long_break_color,
        }
    }

    pub fn message(&self, phase: PhaseType) -> &str {
        match phase {
            PhaseType::Focus => &self.focus_msg,
            PhaseType::ShortBreak => &self.short_break_msg,
            PhaseType::LongBreak => &self.long_break_msg,
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl Config {
    pub fn from_toml_str(path: &Path, raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(path, &raw)
    }

    /// Load from `explicit` if given, else from the first existing default
    /// location. Returns the config together with the file it came from;
    /// `None` means no file was found and the defaults are in use.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        if let Some(path) = explicit {
            return Ok((Self::from_file(path)?, Some(path.to_path_buf())));
        }

        match candidate_paths().into_iter().find(|p| p.is_file()) {
            Some(path) => Ok((Self::from_file(&path)?, Some(path))),
            None => Ok((Self::default(), None)),
        }
    }

    /// Like [`Config::load`], but a file that can't be read or parsed falls
    /// back to the defaults. The error is handed back for the caller to show.
    pub fn load_or_default(explicit: Option<&Path>) -> (Self, Option<PathBuf>, Option<ConfigError>) {
        match Self::load(explicit) {
            Ok((config, source)) => (config, source, None),
            Err(err) => (Self::default(), None, Some(err)),
        }
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Reset every out-of-range value to its default.
    pub fn validate(&mut self) -> Vec<ValidationIssue> {
        let defaults = Self::default();
        let mut issues = Vec::new();

        clamp_range(
            &mut issues,
            "tick_duration",
            &mut self.tick_duration,
            Duration::from_millis(1)..=Duration::from_secs(5),
            defaults.tick_duration,
            duration::format_std,
        );
        clamp_range(
            &mut issues,
            "max_pause_duration",
            &mut self.max_pause_duration,
            Duration::ZERO..=Duration::from_secs(1000 * 60),
            defaults.max_pause_duration,
            duration::format_std,
        );

        for (key, phase) in [
            ("durations.focus", PhaseType::Focus),
            ("durations.short_break", PhaseType::ShortBreak),
            ("durations.long_break", PhaseType::LongBreak),
        ] {
            clamp_range(
                &mut issues,
                key,
                self.durations.get_mut(phase),
                Duration::from_secs(1)..=Duration::from_secs(1000 * 60),
                defaults.durations.get(phase),
                duration::format_std,
            );
        }

        let bar = &mut self.progress_bar;
        let bar_defaults = defaults.progress_bar;

        clamp_range(&mut issues, "progress_bar.padding", &mut bar.padding, 0..=50, bar_defaults.padding, |v| v.to_string());
        clamp_range(&mut issues, "progress_bar.max_width", &mut bar.max_width, 10..=150, bar_defaults.max_width, |v| v.to_string());

        if !BORDER_TYPES.contains(&bar.border_type.as_str()) {
            issues.push(ValidationIssue {
                key: "progress_bar.border_type",
                message: format!("{:?} must be one of {}", bar.border_type, BORDER_TYPES.join(", ")),
            });
            bar.border_type = bar_defaults.border_type;
        }

        for (key, value, default) in [
            ("progress_bar.focus_color", &mut bar.focus_color, bar_defaults.focus_color),
            ("progress_bar.short_break_color", &mut bar.short_break_color, bar_defaults.short_break_color),
            ("progress_bar.long_break_color", &mut bar.long_break_color, bar_defaults.long_break_color),
            ("progress_bar.pause_color", &mut bar.pause_color, bar_defaults.pause_color),
        ] {
            if Color::from_str(value.as_str()).is_err() {
                issues.push(ValidationIssue {
                    key,
                    message: format!("{value:?} is not a color name, ANSI index or #rrggbb value"),
                });
                *value = default;
            }
        }

        for (key, value, default) in [
            ("progress_bar.focus_msg", &mut bar.focus_msg, bar_defaults.focus_msg),
            ("progress_bar.short_break_msg", &mut bar.short_break_msg, bar_defaults.short_break_msg),
            ("progress_bar.long_break_msg", &mut bar.long_break_msg, bar_defaults.long_break_msg),
            ("progress_bar.pause_msg", &mut bar.pause_msg, bar_defaults.pause_msg),
        ] {
            if value.chars().count() > MAX_MESSAGE_CHARS {
                issues.push(ValidationIssue {
                    key,
                    message: format!("must be at most {MAX_MESSAGE_CHARS} characters"),
                });
                *value = default;
            }
        }

        issues
    }
}

fn clamp_range<T: PartialOrd + Copy>(
    issues: &mut Vec<ValidationIssue>,
    key: &'static str,
    value: &mut T,
    range: RangeInclusive<T>,
    default: T,
    show: impl Fn(T) -> String,
) {
    if !range.contains(value) {
        issues.push(ValidationIssue {
            key,
            message: format!(
                "{} is outside {}..={}, using {}",
                show(*value),
                show(*range.start()),
                show(*range.end()),
                show(default)
            ),
        });
        *value = default;
    }
}

// ============================================================================
// Paths
// ============================================================================

/// Config file locations, searched in order.
pub fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(format!(".{APP_DIR}.toml")));
    }
    if let Some(config) = dirs::config_dir() {
        paths.push(config.join(APP_DIR).join("config.toml"));
    }
    paths
}

/// Directory for the snapshot log and the log file.
pub fn data_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<Config, ConfigError> {
        Config::from_toml_str(Path::new("test.toml"), raw)
    }

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(parse("").unwrap(), Config::default());
    }

    #[test]
    fn reads_durations_as_text() {
        let config = parse(
            r#"
            tick_duration = "20ms"
            max_pause_duration = "2m"
            auto_start = false

            [durations]
            focus = "50m"
            long_break = "1h"
            "#,
        )
        .unwrap();

        assert_eq!(config.tick_duration, Duration::from_millis(20));
        assert_eq!(config.max_pause_duration, Duration::from_secs(120));
        assert!(!config.auto_start);
        assert_eq!(config.durations.focus, Duration::from_secs(50 * 60));
        assert_eq!(config.durations.short_break, Duration::from_secs(5 * 60));
        assert_eq!(config.durations.long_break, Duration::from_secs(3600));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = parse("autostart = true").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn malformed_duration_is_a_parse_error() {
        assert!(matches!(parse(r#"tick_duration = "fast""#), Err(ConfigError::Parse { .. })));
        assert!(matches!(parse(r#"max_pause_duration = "-1m""#), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn missing_explicit_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn loads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "skipping = false\n").unwrap();

        let (config, source) = Config::load(Some(&path)).unwrap();
        assert!(!config.skipping);
        assert_eq!(source, Some(path));
    }

    #[test]
    fn unreadable_or_invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "autostart = true\n").unwrap();

        let (config, source, err) = Config::load_or_default(Some(&path));
        assert_eq!(config, Config::default());
        assert_eq!(source, None);
        assert!(matches!(err, Some(ConfigError::Parse { .. })));

        let (config, _, err) = Config::load_or_default(Some(&dir.path().join("absent.toml")));
        assert_eq!(config, Config::default());
        assert!(matches!(err, Some(ConfigError::Read { .. })));
    }

    #[test]
    fn default_config_is_valid() {
        let mut config = Config::default();
        assert!(config.validate().is_empty());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn out_of_range_values_reset_to_defaults() {
        let mut config = Config::default();
        config.tick_duration = Duration::from_secs(10);
        config.durations.focus = Duration::ZERO;
        config.durations.long_break = Duration::from_secs(1001 * 60);
        config.progress_bar.max_width = 5;

        let issues = config.validate();
        let keys: Vec<_> = issues.iter().map(|i| i.key).collect();
        assert_eq!(
            keys,
            vec![
                "tick_duration",
                "durations.focus",
                "durations.long_break",
                "progress_bar.max_width"
            ]
        );

        let defaults = Config::default();
        assert_eq!(config.tick_duration, defaults.tick_duration);
        assert_eq!(config.durations, defaults.durations);
        assert_eq!(config.progress_bar.max_width, defaults.progress_bar.max_width);
    }

    #[test]
    fn boundary_values_are_accepted() {
        let mut config = Config::default();
        config.max_pause_duration = Duration::ZERO;
        config.durations.focus = Duration::from_secs(1);
        config.durations.short_break = Duration::from_secs(1000 * 60);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn style_values_are_checked() {
        let mut config = Config::default();
        config.progress_bar.border_type = "dashed".into();
        config.progress_bar.focus_color = "not-a-color".into();
        config.progress_bar.short_break_color = "#00ff88".into();
        config.progress_bar.long_break_color = "12".into();
        config.progress_bar.pause_msg = "x".repeat(33);

        let issues = config.validate();
        let keys: Vec<_> = issues.iter().map(|i| i.key).collect();
        assert_eq!(
            keys,
            vec![
                "progress_bar.border_type",
                "progress_bar.focus_color",
                "progress_bar.pause_msg"
            ]
        );
        assert_eq!(config.progress_bar.border_type, "thick");
        assert_eq!(config.progress_bar.short_break_color, "#00ff88");
    }
}
