//! Session configuration, passed explicitly to whatever needs it.

use crate::lens::LensUnit;
use crate::snapshot::RememberMask;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Config {
    /// Number of history entries kept. Default: 20, within 5..=100.
    #[serde(default = "default_max_history_size")]
    pub max_history_size: usize,
    /// Quiet period after the last viewport change before it is committed to history. Default: 300,
    /// within 100..=2000.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// After navigating, viewport changes are ignored for this long. Default: 500.
    #[serde(default = "default_navigation_grace_ms")]
    pub navigation_grace_ms: u64,
    /// Longest edge of a thumbnail, in pixels. Default: 100, within 50..=256.
    #[serde(default = "default_max_thumbnail_size")]
    pub max_thumbnail_size: u32,
    /// Mask for newly captured views when none is given.
    #[serde(default)]
    pub default_remember_mask: RememberMask,
    #[serde(default)]
    pub default_lens_unit: LensUnit,
}

pub const HISTORY_SIZE_RANGE: std::ops::RangeInclusive<usize> = 5..=100;
pub const SETTLE_DELAY_RANGE_MS: std::ops::RangeInclusive<u64> = 100..=2000;
pub const THUMBNAIL_SIZE_RANGE: std::ops::RangeInclusive<u32> = 50..=256;

fn default_max_history_size() -> usize {
    20
}

fn default_settle_delay_ms() -> u64 {
    300
}

fn default_navigation_grace_ms() -> u64 {
    500
}

fn default_max_thumbnail_size() -> u32 {
    100
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_history_size: default_max_history_size(),
            settle_delay_ms: default_settle_delay_ms(),
            navigation_grace_ms: default_navigation_grace_ms(),
            max_thumbnail_size: default_max_thumbnail_size(),
            default_remember_mask: RememberMask::default(),
            default_lens_unit: LensUnit::default(),
        }
    }
}

fn clamp_logged<T: PartialOrd + Copy + std::fmt::Display>(
    name: &str,
    value: T,
    range: &std::ops::RangeInclusive<T>,
) -> T {
    let clamped = if value < *range.start() {
        *range.start()
    } else if value > *range.end() {
        *range.end()
    } else {
        value
    };
    if clamped != value {
        log::warn!("{name} = {value} out of range, using {clamped}");
    }
    clamped
}

impl Config {
    /// Pull every bounded value into its allowed range.
    #[must_use]
    pub fn sanitized(self) -> Self {
        Self {
            max_history_size: clamp_logged(
                "max_history_size",
                self.max_history_size,
                &HISTORY_SIZE_RANGE,
            ),
            settle_delay_ms: clamp_logged(
                "settle_delay_ms",
                self.settle_delay_ms,
                &SETTLE_DELAY_RANGE_MS,
            ),
            max_thumbnail_size: clamp_logged(
                "max_thumbnail_size",
                self.max_thumbnail_size,
                &THUMBNAIL_SIZE_RANGE,
            ),
            ..self
        }
    }
    #[must_use]
    pub fn settle_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.settle_delay_ms)
    }
    #[must_use]
    pub fn navigation_grace(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.navigation_grace_ms)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: Config = serde_json::from_str(r#"{ "settle_delay_ms": 250 }"#).unwrap();
        assert_eq!(config.settle_delay_ms, 250);
        assert_eq!(config.max_history_size, 20);
        assert_eq!(config.max_thumbnail_size, 100);
        assert_eq!(config.default_remember_mask, RememberMask::all());
        assert_eq!(config.default_lens_unit, LensUnit::FieldOfView);
    }
    #[test]
    fn sanitize_clamps() {
        let config = Config {
            max_history_size: 1000,
            settle_delay_ms: 5,
            max_thumbnail_size: 128,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(config.max_history_size, 100);
        assert_eq!(config.settle_delay_ms, 100);
        assert_eq!(config.max_thumbnail_size, 128);
    }
    #[test]
    fn default_is_already_sane() {
        assert_eq!(Config::default().sanitized(), Config::default());
    }
}
