//! User-tunable settings, stored as `settings.json` next to the results.

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    animation::{MAX_SPEED, MIN_SPEED},
    matcher::Leniency,
    scheduler::MASTERY_THRESHOLD,
};

pub const SETTINGS_FILE: &str = "settings.json";

/// Upper bound for the time-attack clock and its penalty.
const MAX_SECS: f64 = 3600.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub leniency: Leniency,
    pub animation_speed: f64,
    /// Chance of a pinyin check after a clean memory stage.
    pub pinyin_check_chance: f64,
    pub mastery_threshold: u32,
    pub shuffle_later_rounds: bool,
    pub time_limit_secs: f64,
    pub mistake_penalty_secs: f64,
    pub tick_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            leniency: Leniency::Normal,
            animation_speed: 1.0,
            pinyin_check_chance: 0.3,
            mastery_threshold: MASTERY_THRESHOLD,
            shuffle_later_rounds: true,
            time_limit_secs: 10.0,
            mistake_penalty_secs: 1.2,
            tick_ms: 100,
        }
    }
}

impl Settings {
    /// Reads `settings.json` from `dir`. A missing or broken file gives defaults.
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(SETTINGS_FILE);
        let settings = match std::fs::read_to_string(&path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                log::warn!("ignoring {}: {e}", path.display());
                Settings::default()
            }),
            Err(_) => Settings::default(),
        };
        settings.sanitized()
    }

    pub fn save(&self, dir: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(dir)?;
        std::fs::write(dir.join(SETTINGS_FILE), serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Pulls out-of-range values back to something usable.
    pub fn sanitized(mut self) -> Self {
        let defaults = Settings::default();
        self.animation_speed = if self.animation_speed.is_finite() {
            self.animation_speed.clamp(MIN_SPEED, MAX_SPEED)
        } else {
            defaults.animation_speed
        };
        if !(0.0..=1.0).contains(&self.pinyin_check_chance) {
            self.pinyin_check_chance = defaults.pinyin_check_chance;
        }
        self.mastery_threshold = self.mastery_threshold.max(1);
        if !(self.time_limit_secs.is_finite() && self.time_limit_secs > 0.0) {
            self.time_limit_secs = defaults.time_limit_secs;
        }
        self.time_limit_secs = self.time_limit_secs.min(MAX_SECS);
        if !(self.mistake_penalty_secs.is_finite() && self.mistake_penalty_secs >= 0.0) {
            self.mistake_penalty_secs = defaults.mistake_penalty_secs;
        }
        self.mistake_penalty_secs = self.mistake_penalty_secs.min(MAX_SECS);
        self.tick_ms = self.tick_ms.max(1);
        self
    }

    pub fn time_limit(&self) -> Duration {
        Duration::from_secs_f64(self.time_limit_secs)
    }

    pub fn mistake_penalty(&self) -> Duration {
        Duration::from_secs_f64(self.mistake_penalty_secs)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Settings::load(dir.path()), Settings::default());
    }

    #[test]
    pub fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"leniency": "strict", "animation_speed": 40}"#,
        )
        .unwrap();
        let settings = Settings::load(dir.path());
        assert_eq!(settings.leniency, Leniency::Strict);
        assert_eq!(settings.animation_speed, MAX_SPEED);
        assert_eq!(settings.pinyin_check_chance, 0.3);
    }

    #[test]
    pub fn round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            leniency: Leniency::Loose,
            pinyin_check_chance: 0.0,
            ..Settings::default()
        };
        settings.save(dir.path()).unwrap();
        assert_eq!(Settings::load(dir.path()), settings);
    }

    #[test]
    pub fn broken_values_are_repaired() {
        let settings = Settings {
            pinyin_check_chance: 3.0,
            mastery_threshold: 0,
            time_limit_secs: -1.0,
            tick_ms: 0,
            ..Settings::default()
        }
        .sanitized();
        assert_eq!(settings.pinyin_check_chance, 0.3);
        assert_eq!(settings.mastery_threshold, 1);
        assert_eq!(settings.time_limit(), Duration::from_secs(10));
        assert_eq!(settings.tick(), Duration::from_millis(1));
    }

    #[test]
    pub fn huge_times_are_capped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"time_limit_secs": 1e30, "mistake_penalty_secs": 1e300}"#,
        )
        .unwrap();
        let settings = Settings::load(dir.path());
        assert_eq!(settings.time_limit(), Duration::from_secs(3600));
        assert_eq!(settings.mistake_penalty(), Duration::from_secs(3600));
    }
}
