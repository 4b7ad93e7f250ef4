//! Tuning values shared by every player component.
//!
//! A [`GameConfig`] is built once (usually from a JSON file) and handed to each
//! [`PlayerController`](crate::state::PlayerController) at construction. Missing
//! fields fall back to their defaults, so a file only needs the values it changes.

use std::fs;
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating a [`GameConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config value `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Every tuning constant used by the player core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GameConfig {
    pub movement: MovementConfig,
    pub dragon: DragonTuning,
    pub effects: EffectConfig,
    pub items: ItemConfig,
}

/// Altitudes, speeds and gravity scales of the locomotion states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    /// Safe positions are only recorded above this altitude.
    pub ground_altitude: f32,
    /// Flying below this altitude becomes Falling.
    pub fall_altitude: f32,
    /// Anything below this altitude is recovered to the safe position.
    pub kill_plane_altitude: f32,
    /// Seconds between safe position samples.
    pub safe_position_interval: f32,
    pub launch_velocity: Vec3,
    pub run_speed: f32,
    pub flying_gravity_scale: f32,
    pub falling_gravity_scale: f32,
    /// Distance ahead of the dragon where projectiles are spawned.
    pub skill_anchor_distance: f32,
    /// Time scale applied while standing in an enemy ice zone.
    pub slow_time_scale: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            ground_altitude: 0.0,
            fall_altitude: -3.0,
            kill_plane_altitude: -10.0,
            safe_position_interval: 2.0,
            launch_velocity: Vec3::new(8.0, 6.0, 0.0),
            run_speed: 8.0,
            flying_gravity_scale: 0.3,
            falling_gravity_scale: 1.0,
            skill_anchor_distance: 1.5,
            slow_time_scale: 0.5,
        }
    }
}

/// Resource economy of a dragon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DragonTuning {
    pub skill_cooldown: f32,
    pub max_energy: i32,
    /// Energy units regained per second.
    pub energy_regen_rate: f32,
    /// Energy spent per skill use; 0 leaves skills gated by cooldown only.
    pub skill_energy_cost: i32,
    pub speed_angle: f32,
    pub max_speed_angle: f32,
    /// Experience needed per level, scaled by the current level.
    pub exp_per_level: i32,
}

impl Default for DragonTuning {
    fn default() -> Self {
        Self {
            skill_cooldown: 30.0,
            max_energy: 100,
            energy_regen_rate: 3.0,
            skill_energy_cost: 0,
            speed_angle: 10.0,
            max_speed_angle: 20.0,
            exp_per_level: 100,
        }
    }
}

/// Timed states and spawned effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectConfig {
    pub burn_duration: f32,
    pub burn_speed_factor: f32,
    /// Energy drained per second while burning.
    pub burn_energy_drain: f32,
    pub thunder_boost_duration: f32,
    pub thunder_boost_multiplier: f32,
    pub water_recovery_time: f32,
    pub water_drag: f32,
    pub water_gravity_scale: f32,
    pub water_energy_penalty: i32,
    pub ice_age_lifetime: f32,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            burn_duration: 3.0,
            burn_speed_factor: 0.6,
            burn_energy_drain: 5.0,
            thunder_boost_duration: 3.0,
            thunder_boost_multiplier: 1.8,
            water_recovery_time: 2.0,
            water_drag: 0.2,
            water_gravity_scale: 0.1,
            water_energy_penalty: 10,
            ice_age_lifetime: 15.0,
        }
    }
}

/// Effects of consumable items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemConfig {
    pub energy_item_cooldown_reduction: f32,
    pub speed_up_multiplier: f32,
}

impl Default for ItemConfig {
    fn default() -> Self {
        Self {
            energy_item_cooldown_reduction: 5.0,
            speed_up_multiplier: 1.5,
        }
    }
}

impl GameConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Reject values that would break the timers or the energy economy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: &'static str| {
            Err(ConfigError::Invalid { field, reason })
        };

        let durations = [
            ("movement.safe_position_interval", self.movement.safe_position_interval),
            ("dragon.skill_cooldown", self.dragon.skill_cooldown),
            ("dragon.energy_regen_rate", self.dragon.energy_regen_rate),
            ("effects.burn_duration", self.effects.burn_duration),
            ("effects.burn_energy_drain", self.effects.burn_energy_drain),
            ("effects.thunder_boost_duration", self.effects.thunder_boost_duration),
            ("effects.water_recovery_time", self.effects.water_recovery_time),
            ("effects.ice_age_lifetime", self.effects.ice_age_lifetime),
            ("items.energy_item_cooldown_reduction", self.items.energy_item_cooldown_reduction),
        ];
        for (field, value) in durations {
            if !value.is_finite() || value < 0.0 {
                return invalid(field, "must be finite and non-negative");
            }
        }

        let multipliers = [
            ("movement.slow_time_scale", self.movement.slow_time_scale),
            ("effects.thunder_boost_multiplier", self.effects.thunder_boost_multiplier),
            ("items.speed_up_multiplier", self.items.speed_up_multiplier),
        ];
        for (field, value) in multipliers {
            if !value.is_finite() || value <= 0.0 {
                return invalid(field, "must be positive");
            }
        }

        if self.movement.kill_plane_altitude >= self.movement.ground_altitude {
            return invalid("movement.kill_plane_altitude", "must be below ground_altitude");
        }
        if self.dragon.max_energy <= 0 {
            return invalid("dragon.max_energy", "must be positive");
        }
        if self.dragon.skill_energy_cost < 0 {
            return invalid("dragon.skill_energy_cost", "must not be negative");
        }
        if self.dragon.exp_per_level <= 0 {
            return invalid("dragon.exp_per_level", "must be positive");
        }
        if self.dragon.max_speed_angle < 0.0 {
            return invalid("dragon.max_speed_angle", "must not be negative");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_is_valid() {
        assert!(GameConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = GameConfig::from_json_str(
            r#"{ "dragon": { "skill_cooldown": 12.5 }, "movement": { "run_speed": 4.0 } }"#,
        )
        .unwrap();

        assert_eq!(config.dragon.skill_cooldown, 12.5);
        assert_eq!(config.dragon.max_energy, 100);
        assert_eq!(config.movement.run_speed, 4.0);
        assert_eq!(config.effects, EffectConfig::default());
    }

    #[test]
    fn test_launch_velocity_from_json() {
        let config =
            GameConfig::from_json_str(r#"{ "movement": { "launch_velocity": [1.0, 2.0, 0.0] } }"#)
                .unwrap();
        assert_eq!(config.movement.launch_velocity, Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_rejects_negative_duration() {
        let err = GameConfig::from_json_str(r#"{ "effects": { "burn_duration": -1.0 } }"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "effects.burn_duration",
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_bad_energy_and_scale() {
        let mut config = GameConfig::default();
        config.dragon.max_energy = 0;
        assert!(config.validate().is_err());

        let mut config = GameConfig::default();
        config.movement.slow_time_scale = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = GameConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = GameConfig::from_path("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
