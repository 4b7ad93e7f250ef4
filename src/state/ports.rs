//! Boundary traits the player core talks through.
//!
//! The engine supplies a [`PhysicsBody`] and an [`InputSource`]; the
//! networking layer supplies a [`PropertyStore`] and a [`Spawner`]. Each trait
//! has a small in-memory implementation that tools and tests can use directly.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use glam::Vec3;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Network identifier of a player entity.
pub type PlayerId = i64;

/// Handle of a networked object returned by a [`Spawner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpawnHandle(pub u64);

// ---------------------------------------------------------------------------
// Physics
// ---------------------------------------------------------------------------

/// Read/write access to the rigid body of a player.
pub trait PhysicsBody {
    fn position(&self) -> Vec3;
    fn set_position(&mut self, position: Vec3);
    fn velocity(&self) -> Vec3;
    fn set_velocity(&mut self, velocity: Vec3);
    /// Rotation about the Z axis, in degrees.
    fn rotation(&self) -> f32;
    fn set_rotation(&mut self, degrees: f32);
    fn gravity_scale(&self) -> f32;
    fn set_gravity_scale(&mut self, scale: f32);
}

/// Plain in-memory body. Integration is left to whoever owns it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KinematicBody {
    pub position: Vec3,
    pub velocity: Vec3,
    pub rotation: f32,
    pub gravity_scale: f32,
}

impl KinematicBody {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

impl PhysicsBody for KinematicBody {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    fn velocity(&self) -> Vec3 {
        self.velocity
    }

    fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    fn rotation(&self) -> f32 {
        self.rotation
    }

    fn set_rotation(&mut self, degrees: f32) {
        self.rotation = degrees;
    }

    fn gravity_scale(&self) -> f32 {
        self.gravity_scale
    }

    fn set_gravity_scale(&mut self, scale: f32) {
        self.gravity_scale = scale;
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Input polled once per tick.
pub trait InputSource {
    /// Skill button went down this tick.
    fn skill_requested(&self) -> bool;

    /// Launch button went down this tick.
    fn launch_requested(&self) -> bool {
        false
    }

    /// Steering axis in `[-1, 1]`; positive turns counter-clockwise.
    fn steer(&self) -> f32 {
        0.0
    }
}

/// Snapshot of one tick's input.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputFrame {
    pub skill: bool,
    pub launch: bool,
    pub steer: f32,
}

impl InputFrame {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn launch() -> Self {
        Self {
            launch: true,
            ..Self::default()
        }
    }

    pub fn skill() -> Self {
        Self {
            skill: true,
            ..Self::default()
        }
    }

    pub fn steer(steer: f32) -> Self {
        Self {
            steer,
            ..Self::default()
        }
    }

    /// Copy the current state of any input source.
    pub fn capture(source: &dyn InputSource) -> Self {
        Self {
            skill: source.skill_requested(),
            launch: source.launch_requested(),
            steer: source.steer().clamp(-1.0, 1.0),
        }
    }
}

impl InputSource for InputFrame {
    fn skill_requested(&self) -> bool {
        self.skill
    }

    fn launch_requested(&self) -> bool {
        self.launch
    }

    fn steer(&self) -> f32 {
        self.steer
    }
}

// ---------------------------------------------------------------------------
// Networked properties
// ---------------------------------------------------------------------------

/// A networked property write failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("property store unavailable: {0}")]
    Unavailable(String),

    #[error("property `{key}` could not be encoded: {reason}")]
    Encode { key: String, reason: String },
}

/// Per-entity custom properties replicated by the networking layer.
///
/// Writes become visible to other entities eventually; nothing is transactional.
pub trait PropertyStore {
    fn get_value(&self, entity: PlayerId, key: &str) -> Option<Value>;
    fn set_value(&mut self, entity: PlayerId, key: &str, value: Value) -> Result<(), StoreError>;
}

/// Typed access on top of [`PropertyStore`].
pub trait PropertyStoreExt: PropertyStore {
    /// Read `key`, returning `default` when absent or of the wrong shape.
    fn get<T: DeserializeOwned>(&self, entity: PlayerId, key: &str, default: T) -> T {
        self.get_value(entity, key)
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or(default)
    }

    fn set<T: Serialize>(&mut self, entity: PlayerId, key: &str, value: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(value).map_err(|e| StoreError::Encode {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.set_value(entity, key, value)
    }
}

impl<S: PropertyStore + ?Sized> PropertyStoreExt for S {}

/// In-process property store. Clones share the same table, so several
/// controllers built from one store see each other's properties.
#[derive(Debug, Clone, Default)]
pub struct MemoryPropertyStore {
    properties: Rc<RefCell<HashMap<(PlayerId, String), Value>>>,
}

impl MemoryPropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of properties stored across all entities.
    pub fn len(&self) -> usize {
        self.properties.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.borrow().is_empty()
    }

    /// Drop every property of one entity.
    pub fn remove_entity(&self, entity: PlayerId) {
        self.properties
            .borrow_mut()
            .retain(|(owner, _), _| *owner != entity);
    }
}

impl PropertyStore for MemoryPropertyStore {
    fn get_value(&self, entity: PlayerId, key: &str) -> Option<Value> {
        self.properties
            .borrow()
            .get(&(entity, key.to_string()))
            .cloned()
    }

    fn set_value(&mut self, entity: PlayerId, key: &str, value: Value) -> Result<(), StoreError> {
        self.properties
            .borrow_mut()
            .insert((entity, key.to_string()), value);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Spawning
// ---------------------------------------------------------------------------

/// Networked objects the player core asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prefab {
    Fireball,
    ThunderBoost,
    IceAge,
    BubbleShield,
    Rocket,
}

impl Prefab {
    /// Resource name the networking layer instantiates.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fireball => "Fireball",
            Self::ThunderBoost => "ThunderBoost",
            Self::IceAge => "IceAge",
            Self::BubbleShield => "BubbleShield",
            Self::Rocket => "Rocket",
        }
    }
}

impl fmt::Display for Prefab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Request to instantiate a networked object.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRequest {
    pub prefab: Prefab,
    pub position: Vec3,
    /// Rotation about the Z axis, in degrees.
    pub rotation: f32,
    pub owner: PlayerId,
    /// Seconds before the object removes itself, if it does.
    pub lifetime: Option<f32>,
}

/// Spawning failed on the networking side.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("failed to spawn {prefab}: {reason}")]
pub struct SpawnError {
    pub prefab: Prefab,
    pub reason: String,
}

/// Instantiates networked objects.
pub trait Spawner {
    fn spawn(&mut self, request: SpawnRequest) -> Result<SpawnHandle, SpawnError>;
}

/// Spawner that records every request. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingSpawner {
    log: Rc<RefCell<Vec<SpawnRequest>>>,
}

impl RecordingSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<SpawnRequest> {
        self.log.borrow().clone()
    }

    pub fn prefabs(&self) -> Vec<Prefab> {
        self.log.borrow().iter().map(|r| r.prefab).collect()
    }

    /// Forget every recorded request, for all clones.
    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }
}

impl Spawner for RecordingSpawner {
    fn spawn(&mut self, request: SpawnRequest) -> Result<SpawnHandle, SpawnError> {
        let mut log = self.log.borrow_mut();
        log.push(request);
        Ok(SpawnHandle(log.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_typed_get_and_set() {
        let mut store = MemoryPropertyStore::new();

        assert_eq!(store.get(1, "POS_X", 0.0f32), 0.0);
        store.set(1, "POS_X", &12.5f32).unwrap();
        assert_eq!(store.get(1, "POS_X", 0.0f32), 12.5);

        store.set(1, "PREV_POS", &Vec3::new(1.0, 2.0, 3.0)).unwrap();
        assert_eq!(store.get(1, "PREV_POS", Vec3::ZERO), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_wrong_shape_reads_default() {
        let mut store = MemoryPropertyStore::new();
        store.set(1, "POS_X", &"left").unwrap();
        assert_eq!(store.get(1, "POS_X", -1.0f32), -1.0);
    }

    #[test]
    fn test_clones_share_entities() {
        let mut a = MemoryPropertyStore::new();
        let b = a.clone();

        a.set(1, "POS_X", &3.0f32).unwrap();
        a.set(2, "POS_X", &4.0f32).unwrap();

        assert_eq!(b.get(1, "POS_X", 0.0f32), 3.0);
        assert_eq!(b.get(2, "POS_X", 0.0f32), 4.0);
        assert_eq!(b.len(), 2);

        b.remove_entity(1);
        assert_eq!(a.get(1, "POS_X", 0.0f32), 0.0);
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn test_recording_spawner_hands_out_handles() {
        let spawner = RecordingSpawner::new();
        let mut handle = spawner.clone();

        let request = SpawnRequest {
            prefab: Prefab::IceAge,
            position: Vec3::ZERO,
            rotation: 0.0,
            owner: 7,
            lifetime: Some(15.0),
        };
        assert_eq!(handle.spawn(request.clone()).unwrap(), SpawnHandle(1));
        assert_eq!(handle.spawn(request.clone()).unwrap(), SpawnHandle(2));

        assert_eq!(spawner.requests(), vec![request.clone(), request]);
        assert_eq!(spawner.prefabs(), vec![Prefab::IceAge, Prefab::IceAge]);

        spawner.clear();
        assert!(spawner.requests().is_empty());
        assert!(handle.prefabs().is_empty());
    }

    #[test]
    fn test_capture_clamps_steer() {
        let frame = InputFrame::capture(&InputFrame::steer(3.0));
        assert_eq!(frame.steer, 1.0);
        assert!(!frame.skill);
    }
}
