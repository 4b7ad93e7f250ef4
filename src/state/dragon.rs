//! Dragon resource model.
//!
//! [`DragonProperty`] is the persisted part of a dragon (level, energy,
//! experience, element). [`Dragon`] wraps it with the runtime economy: skill
//! cooldown, energy regeneration and the steering speed stat.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::DragonTuning;

/// Flat string-keyed record a dragon is saved to and restored from.
pub type PropertyRecord = serde_json::Map<String, Value>;

/// Elemental affinity, which decides what a skill does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Element {
    Fire = 0,
    Ice = 1,
    Thunder = 2,
}

impl Element {
    pub const ALL: [Element; 3] = [Element::Fire, Element::Ice, Element::Thunder];

    /// Pick an element uniformly at random.
    pub fn random_with<R: Rng>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }

    pub fn index(self) -> i64 {
        self as i64
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fire => "fire",
            Self::Ice => "ice",
            Self::Thunder => "thunder",
        }
    }
}

impl TryFrom<i64> for Element {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Fire),
            1 => Ok(Self::Ice),
            2 => Ok(Self::Thunder),
            other => Err(other),
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted record could not be turned back into a [`DragonProperty`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedRecord {
    #[error("dragon record is missing field `{0}`")]
    Missing(&'static str),

    #[error("dragon record field `{field}` is not an integer: {value}")]
    NotNumeric { field: &'static str, value: String },

    #[error("dragon record field `{field}` is out of range: {value}")]
    OutOfRange { field: &'static str, value: i64 },
}

/// Skill activation was refused.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SkillError {
    #[error("skill is on cooldown for another {remaining:.1}s")]
    OnCooldown { remaining: f32 },

    #[error("skill needs {required} energy, only {available} left")]
    NotEnoughEnergy { required: i32, available: i32 },
}

/// The persisted part of a dragon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragonProperty {
    pub level: i32,
    pub energy: i32,
    pub exp: i32,
    pub element: Element,
}

impl Default for DragonProperty {
    /// A fresh level 1 dragon with a random element.
    fn default() -> Self {
        Self::random_with(&mut rand::thread_rng())
    }
}

impl DragonProperty {
    pub const LEVEL: &'static str = "level";
    pub const ENERGY: &'static str = "energy";
    pub const EXP: &'static str = "exp";
    pub const ELEMENT: &'static str = "element";

    /// A fresh level 1 dragon of the given element.
    pub fn new(element: Element) -> Self {
        Self {
            level: 1,
            energy: 100,
            exp: 0,
            element,
        }
    }

    /// A fresh level 1 dragon whose element is drawn from `rng`.
    pub fn random_with<R: Rng>(rng: &mut R) -> Self {
        Self::new(Element::random_with(rng))
    }

    /// Serialize to a flat record with integer fields.
    pub fn to_record(&self) -> PropertyRecord {
        let mut record = PropertyRecord::new();
        record.insert(Self::LEVEL.to_string(), Value::from(self.level));
        record.insert(Self::ENERGY.to_string(), Value::from(self.energy));
        record.insert(Self::EXP.to_string(), Value::from(self.exp));
        record.insert(Self::ELEMENT.to_string(), Value::from(self.element.index()));
        record
    }

    /// Parse a flat record. Fields may be integers or numeric strings.
    pub fn from_record(record: &PropertyRecord) -> Result<Self, MalformedRecord> {
        let level = read_i32(record, Self::LEVEL)?;
        if level < 1 {
            return Err(MalformedRecord::OutOfRange {
                field: Self::LEVEL,
                value: level.into(),
            });
        }

        let energy = read_i32(record, Self::ENERGY)?;
        if energy < 0 {
            return Err(MalformedRecord::OutOfRange {
                field: Self::ENERGY,
                value: energy.into(),
            });
        }

        let exp = read_i32(record, Self::EXP)?;
        if exp < 0 {
            return Err(MalformedRecord::OutOfRange {
                field: Self::EXP,
                value: exp.into(),
            });
        }

        let element = Element::try_from(read_int(record, Self::ELEMENT)?).map_err(|value| {
            MalformedRecord::OutOfRange {
                field: Self::ELEMENT,
                value,
            }
        })?;

        Ok(Self {
            level,
            energy,
            exp,
            element,
        })
    }

    /// Parse a record, falling back to a fresh random dragon when it is corrupt.
    pub fn from_record_or_default(record: &PropertyRecord) -> Self {
        match Self::from_record(record) {
            Ok(property) => property,
            Err(e) => {
                tracing::warn!("Discarding dragon record: {}", e);
                Self::default()
            }
        }
    }
}

fn read_int(record: &PropertyRecord, field: &'static str) -> Result<i64, MalformedRecord> {
    let value = record.get(field).ok_or(MalformedRecord::Missing(field))?;
    let not_numeric = || MalformedRecord::NotNumeric {
        field,
        value: value.to_string(),
    };

    match value {
        Value::Number(n) => n.as_i64().ok_or_else(not_numeric),
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| not_numeric()),
        _ => Err(not_numeric()),
    }
}

fn read_i32(record: &PropertyRecord, field: &'static str) -> Result<i32, MalformedRecord> {
    let value = read_int(record, field)?;
    i32::try_from(value).map_err(|_| MalformedRecord::OutOfRange { field, value })
}

/// Runtime resource model of one dragon.
#[derive(Debug, Clone, PartialEq)]
pub struct Dragon {
    property: DragonProperty,
    cooldown_remaining: f32,
    cooldown_duration: f32,
    energy_regen_rate: f32,
    regen_carry: f32,
    drain_carry: f32,
    max_energy: i32,
    skill_energy_cost: i32,
    speed_angle: f32,
    max_speed_angle: f32,
    exp_per_level: i32,
}

impl Dragon {
    pub fn new(property: DragonProperty, tuning: &DragonTuning) -> Self {
        let max_energy = tuning.max_energy.max(0);
        let mut property = property;
        property.energy = property.energy.clamp(0, max_energy);

        Self {
            property,
            cooldown_remaining: 0.0,
            cooldown_duration: tuning.skill_cooldown,
            energy_regen_rate: tuning.energy_regen_rate,
            regen_carry: 0.0,
            drain_carry: 0.0,
            max_energy,
            skill_energy_cost: tuning.skill_energy_cost,
            speed_angle: tuning.speed_angle,
            max_speed_angle: tuning.max_speed_angle,
            exp_per_level: tuning.exp_per_level,
        }
    }

    pub fn property(&self) -> &DragonProperty {
        &self.property
    }

    pub fn element(&self) -> Element {
        self.property.element
    }

    pub fn level(&self) -> i32 {
        self.property.level
    }

    pub fn energy(&self) -> i32 {
        self.property.energy
    }

    pub fn max_energy(&self) -> i32 {
        self.max_energy
    }

    pub fn cooldown_remaining(&self) -> f32 {
        self.cooldown_remaining
    }

    pub fn cooldown_duration(&self) -> f32 {
        self.cooldown_duration
    }

    pub fn is_skill_ready(&self) -> bool {
        self.cooldown_remaining <= 0.0
    }

    pub fn speed_angle(&self) -> f32 {
        self.speed_angle
    }

    pub fn max_speed_angle(&self) -> f32 {
        self.max_speed_angle
    }

    /// Spend a skill use, starting the cooldown.
    ///
    /// Cooldown is checked before energy. Energy is only deducted when the
    /// configured skill cost is above zero.
    pub fn consume_for_skill(&mut self) -> Result<(), SkillError> {
        if self.cooldown_remaining > 0.0 {
            return Err(SkillError::OnCooldown {
                remaining: self.cooldown_remaining,
            });
        }

        if self.skill_energy_cost > 0 {
            if self.property.energy < self.skill_energy_cost {
                return Err(SkillError::NotEnoughEnergy {
                    required: self.skill_energy_cost,
                    available: self.property.energy,
                });
            }
            self.property.energy -= self.skill_energy_cost;
        }

        self.cooldown_remaining = self.cooldown_duration;
        Ok(())
    }

    pub fn reduce_cooldown(&mut self, seconds: f32) {
        self.cooldown_remaining = (self.cooldown_remaining - seconds).max(0.0);
    }

    /// Multiply the steering speed stat. The caller re-applies the cap.
    pub fn apply_speed_boost(&mut self, multiplier: f32) {
        self.speed_angle *= multiplier;
    }

    pub fn clamp_speed_angle(&mut self) {
        self.speed_angle = self.speed_angle.min(self.max_speed_angle);
    }

    /// Remove energy, never going below zero. Fractions carry over to the
    /// next drain.
    pub fn drain_energy(&mut self, amount: f32) {
        self.drain_carry += amount.max(0.0);
        let whole = self.drain_carry.floor();
        self.drain_carry -= whole;
        self.property.energy = (self.property.energy - whole as i32).max(0);
    }

    /// Count down the cooldown and regenerate energy.
    pub fn tick(&mut self, delta_time: f32) {
        self.cooldown_remaining = (self.cooldown_remaining - delta_time).max(0.0);

        if self.property.energy >= self.max_energy {
            self.regen_carry = 0.0;
            return;
        }

        self.regen_carry += self.energy_regen_rate * delta_time;
        let gained = self.regen_carry.floor();
        if gained >= 1.0 {
            let room = self.max_energy - self.property.energy;
            if gained >= room as f32 {
                self.property.energy = self.max_energy;
                self.regen_carry = 0.0;
            } else {
                self.regen_carry -= gained;
                self.property.energy += gained as i32;
            }
        }
    }

    /// Add experience, levelling up as thresholds are crossed.
    ///
    /// Returns the number of levels gained. Experience saturates at
    /// `i32::MAX`, and levelling stops once the next threshold or level
    /// would not fit in an `i32`.
    pub fn gain_experience(&mut self, amount: i32) -> u32 {
        self.property.exp = self.property.exp.saturating_add(amount.max(0));

        let mut gained = 0;
        loop {
            let Some(needed) = self.property.level.checked_mul(self.exp_per_level) else {
                break;
            };
            if self.property.exp < needed {
                break;
            }
            let Some(next) = self.property.level.checked_add(1) else {
                break;
            };
            self.property.exp -= needed;
            self.property.level = next;
            gained += 1;
        }

        if gained > 0 {
            tracing::info!(
                level = self.property.level,
                "Dragon levelled up ({} level(s))",
                gained
            );
        }
        gained
    }
}
