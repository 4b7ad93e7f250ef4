//! Player controller.
//!
//! [`PlayerController`] is the per-player orchestrator. It owns the movement
//! state machine and the dragon's resources, turns engine callbacks (ticks,
//! collisions, triggers) into state changes, and talks to the networking
//! layer through a [`PropertyStore`] and a [`Spawner`].
//!
//! # Tick order
//!
//! ```text
//! controllable? ─ no ──▶ (frozen)
//!      │ yes
//!      ▼
//! scale dt (slow) ─▶ input / skill ─▶ facing ─▶ state machine ─▶ dragon
//!      ─▶ clamp speed angle ─▶ safe position ─▶ kill plane ─▶ publish POS_X
//! ```

use std::fmt;
use std::str::FromStr;

use glam::Vec3;
use thiserror::Error;

use super::dragon::{Dragon, DragonProperty, Element, PropertyRecord, SkillError};
use super::machine::{StateMachine, StateMachineError};
use super::player::{
    BurningState, FallInWaterState, FallingState, FlyingState, PlayerBody, PlayerState,
    RunningState, ThunderBoostState, WaitingState,
};
use super::ports::{
    InputFrame, InputSource, PhysicsBody, PlayerId, Prefab, PropertyStore, PropertyStoreExt,
    SpawnHandle, SpawnRequest, Spawner,
};
use crate::config::{ConfigError, GameConfig};

/// Networked property holding the server-side X position.
pub const POS_X_KEY: &str = "POS_X";

/// Networked property holding the last safe position.
pub const PREV_POS_KEY: &str = "PREV_POS";

/// Category of a collider the player touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactTag {
    Platform,
    Water,
    /// Slowing zone left by an ice skill
    IceAge,
    /// Projectile of a fire skill
    Fireball,
    Other(String),
}

impl ContactTag {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Platform => "Platform",
            Self::Water => "Water",
            Self::IceAge => "IceAge",
            Self::Fireball => "Fireball",
            Self::Other(tag) => tag,
        }
    }
}

impl From<&str> for ContactTag {
    fn from(tag: &str) -> Self {
        match tag {
            "Platform" => Self::Platform,
            "Water" => Self::Water,
            "IceAge" => Self::IceAge,
            "Fireball" => Self::Fireball,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ContactTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A collision or trigger event reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub tag: ContactTag,
    /// Player that created the other object, for hazards.
    pub owner: Option<PlayerId>,
}

impl Contact {
    pub fn new(tag: impl Into<ContactTag>) -> Self {
        Self {
            tag: tag.into(),
            owner: None,
        }
    }

    /// A hazard created by `owner`.
    pub fn owned_by(tag: impl Into<ContactTag>, owner: PlayerId) -> Self {
        Self {
            tag: tag.into(),
            owner: Some(owner),
        }
    }
}

/// Consumable items a player can pick up and use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Shield,
    Energy,
    SpeedUp,
    Rocket,
    /// An item this version does not know; using it does nothing.
    Other(String),
}

impl Item {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Shield => "Shield",
            Self::Energy => "Energy",
            Self::SpeedUp => "SpeedUp",
            Self::Rocket => "Rocket",
            Self::Other(name) => name,
        }
    }
}

impl FromStr for Item {
    type Err = std::convert::Infallible;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Ok(match name {
            "Shield" => Self::Shield,
            "Energy" => Self::Energy,
            "SpeedUp" => Self::SpeedUp,
            "Rocket" => Self::Rocket,
            other => Self::Other(other.to_string()),
        })
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a controller cannot be built.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    StateMachine(#[from] StateMachineError),
}

/// Per-player orchestrator.
pub struct PlayerController<P> {
    id: PlayerId,
    machine: StateMachine<PlayerBody<P>, PlayerState>,
    body: PlayerBody<P>,
    store: Box<dyn PropertyStore>,
    spawner: Box<dyn Spawner>,
    state: PlayerState,
    controllable: bool,
    has_shield: bool,
    is_slow: bool,
    facing: f32,
    safe_timer: f32,
}

impl<P: PhysicsBody + 'static> PlayerController<P> {
    /// Build a controller parked in [`PlayerState::Waiting`].
    ///
    /// The configuration is validated first.
    pub fn new(
        id: PlayerId,
        physics: P,
        property: DragonProperty,
        config: GameConfig,
        store: Box<dyn PropertyStore>,
        spawner: Box<dyn Spawner>,
    ) -> Result<Self, ControllerError> {
        config.validate()?;

        let dragon = Dragon::new(property, &config.dragon);
        let mut body = PlayerBody::new(physics, dragon, config);

        let mut machine = StateMachine::new(&mut body, WaitingState);
        machine.add_state(FlyingState)?;
        machine.add_state(FallingState)?;
        machine.add_state(RunningState)?;
        machine.add_state(BurningState)?;
        machine.add_state(ThunderBoostState)?;
        machine.add_state(FallInWaterState)?;

        machine.on_state_changed(move |change| {
            tracing::debug!(player = id, "State changed: {} -> {}", change.from, change.to);
        });

        let state = machine.current_state();
        Ok(Self {
            id,
            machine,
            body,
            store,
            spawner,
            state,
            controllable: false,
            has_shield: false,
            is_slow: false,
            facing: 0.0,
            safe_timer: 0.0,
        })
    }

    // Accessors

    pub fn id(&self) -> PlayerId {
        self.id
    }

    /// Current state tag; always matches the state machine after a call returns.
    pub fn player_state(&self) -> PlayerState {
        self.state
    }

    pub fn state_machine(&self) -> &StateMachine<PlayerBody<P>, PlayerState> {
        &self.machine
    }

    pub fn body(&self) -> &PlayerBody<P> {
        &self.body
    }

    pub fn physics(&self) -> &P {
        self.body.physics()
    }

    pub fn physics_mut(&mut self) -> &mut P {
        self.body.physics_mut()
    }

    pub fn dragon(&self) -> &Dragon {
        self.body.dragon()
    }

    pub fn dragon_mut(&mut self) -> &mut Dragon {
        self.body.dragon_mut()
    }

    pub fn is_controllable(&self) -> bool {
        self.controllable
    }

    pub fn set_controllable(&mut self, controllable: bool) {
        self.controllable = controllable;
    }

    pub fn has_shield(&self) -> bool {
        self.has_shield
    }

    /// Called when the shield aura expires or is destroyed.
    pub fn clear_shield(&mut self) {
        self.has_shield = false;
    }

    pub fn is_slow(&self) -> bool {
        self.is_slow
    }

    /// Time scale the engine should run this player at.
    pub fn time_scale(&self) -> f32 {
        if self.is_slow {
            self.body.config().movement.slow_time_scale
        } else {
            1.0
        }
    }

    /// Facing angle in degrees, derived from velocity.
    pub fn facing(&self) -> f32 {
        self.facing
    }

    pub fn safe_position(&self) -> Vec3 {
        self.body.safe_position()
    }

    // Networked position

    /// X position as seen by the server.
    pub fn pos_x(&self) -> f32 {
        self.store.get(self.id, POS_X_KEY, 0.0)
    }

    pub fn set_pos_x(&mut self, x: f32) {
        if let Err(e) = self.store.set(self.id, POS_X_KEY, &x) {
            tracing::warn!(player = self.id, "Failed to publish {}: {}", POS_X_KEY, e);
        }
    }

    pub fn prev_pos(&self) -> Vec3 {
        self.store.get(self.id, PREV_POS_KEY, Vec3::ZERO)
    }

    pub fn set_prev_pos(&mut self, position: Vec3) {
        if let Err(e) = self.store.set(self.id, PREV_POS_KEY, &position) {
            tracing::warn!(player = self.id, "Failed to publish {}: {}", PREV_POS_KEY, e);
        }
    }

    // Persistence

    /// Save the dragon's persisted fields.
    pub fn dragon_record(&self) -> PropertyRecord {
        self.body.dragon().property().to_record()
    }

    /// Replace the dragon from a saved record, falling back to a fresh
    /// random dragon when the record is corrupt.
    pub fn load_dragon(&mut self, record: &PropertyRecord) {
        let property = DragonProperty::from_record_or_default(record);
        self.body.dragon = Dragon::new(property, &self.body.config.dragon);
    }

    // Per-tick

    /// Advance the player by `delta_time` seconds of wall time.
    pub fn tick(
        &mut self,
        delta_time: f32,
        input: &dyn InputSource,
    ) -> Result<(), StateMachineError> {
        if !self.controllable {
            return Ok(());
        }
        if !delta_time.is_finite() || delta_time < 0.0 {
            return Err(StateMachineError::InvalidDeltaTime(delta_time));
        }

        let dt = delta_time * self.time_scale();
        self.body.input = InputFrame::capture(input);

        if self.body.input.skill {
            // cooldown refusals are silent
            if let Err(e) = self.activate_skill() {
                tracing::trace!(player = self.id, "Skill refused: {}", e);
            }
        }

        if self.state != PlayerState::Running {
            let velocity = self.body.physics.velocity();
            self.facing = velocity.y.atan2(velocity.x).to_degrees();
            self.body.physics.set_rotation(self.facing);
        }

        let result = self.machine.update(&mut self.body, dt);
        self.sync_state();
        if result? && self.state == PlayerState::Waiting {
            // the state recovered the player on its own
            self.safe_timer = 0.0;
        }

        self.body.dragon.tick(dt);
        self.body.dragon.clamp_speed_angle();

        self.safe_timer += dt;
        let movement = &self.body.config.movement;
        let (interval, ground, kill_plane) = (
            movement.safe_position_interval,
            movement.ground_altitude,
            movement.kill_plane_altitude,
        );
        let position = self.body.physics.position();

        if self.safe_timer >= interval && self.state == PlayerState::Flying && position.y > ground
        {
            self.safe_timer = 0.0;
            self.body.safe_position = position;
            self.set_prev_pos(position);
        }

        if position.y < kill_plane {
            self.reset_position();
        }

        let x = self.body.physics.position().x;
        self.set_pos_x(x);
        Ok(())
    }

    // Engine callbacks

    pub fn on_collision_enter(&mut self, contact: &Contact) {
        if contact.tag == ContactTag::Platform {
            self.body.on_platform = true;
            self.force_state(PlayerState::Running);
        }
    }

    pub fn on_collision_exit(&mut self, contact: &Contact) {
        if contact.tag == ContactTag::Platform {
            self.body.on_platform = false;
        }
    }

    pub fn on_trigger_enter(&mut self, contact: &Contact) {
        match contact.tag {
            ContactTag::IceAge => {
                if self.is_foreign(contact) && !self.has_shield {
                    self.is_slow = true;
                }
            }
            ContactTag::Water => self.force_state(PlayerState::FallInWater),
            ContactTag::Fireball => {
                if self.is_foreign(contact) && !self.has_shield && self.state.is_locomotion() {
                    self.force_state(PlayerState::Burning);
                }
            }
            _ => {}
        }
    }

    pub fn on_trigger_exit(&mut self, contact: &Contact) {
        if contact.tag == ContactTag::IceAge && self.is_foreign(contact) {
            self.is_slow = false;
        }
    }

    // Actions

    /// Use the dragon's elemental skill.
    ///
    /// Returns the handle of the spawned object, or `None` if spawning failed
    /// on the networking side.
    pub fn activate_skill(&mut self) -> Result<Option<SpawnHandle>, SkillError> {
        self.body.dragon.consume_for_skill()?;

        let element = self.body.dragon.element();
        tracing::debug!(player = self.id, "Skill: {}", element);

        let handle = match element {
            Element::Fire => {
                let anchor = self.skill_anchor();
                self.spawn(Prefab::Fireball, anchor, self.facing, None)
            }
            Element::Thunder => {
                let position = self.body.physics.position();
                let handle = self.spawn(Prefab::ThunderBoost, position, 0.0, None);
                if self.state.is_locomotion() {
                    self.force_state(PlayerState::ThunderBoost);
                }
                handle
            }
            Element::Ice => {
                let position = self.body.physics.position();
                let lifetime = self.body.config.effects.ice_age_lifetime;
                self.spawn(Prefab::IceAge, position, 0.0, Some(lifetime))
            }
        };

        Ok(handle)
    }

    /// Apply a consumable item.
    pub fn use_item(&mut self, item: &Item) {
        tracing::debug!(player = self.id, "Use: {}", item);

        match item {
            Item::Shield => {
                let position = self.body.physics.position();
                self.spawn(Prefab::BubbleShield, position, 0.0, None);
                self.has_shield = true;
            }
            Item::Energy => {
                let reduction = self.body.config.items.energy_item_cooldown_reduction;
                self.body.dragon.reduce_cooldown(reduction);
            }
            Item::SpeedUp => {
                let multiplier = self.body.config.items.speed_up_multiplier;
                self.body.dragon.apply_speed_boost(multiplier);
            }
            Item::Rocket => {
                let anchor = self.skill_anchor();
                self.spawn(Prefab::Rocket, anchor, self.facing, None);
            }
            Item::Other(name) => {
                tracing::debug!(player = self.id, "Ignoring unknown item {}", name);
            }
        }
    }

    /// Teleport to the last safe position and park.
    pub fn reset_position(&mut self) {
        tracing::info!(
            player = self.id,
            "Resetting to safe position {:?}",
            self.body.safe_position
        );
        self.body.recover();
        self.safe_timer = 0.0;
        self.force_state(PlayerState::Waiting);
    }

    // Internals

    fn sync_state(&mut self) {
        self.state = self.machine.current_state();
    }

    fn force_state(&mut self, target: PlayerState) {
        if let Err(e) = self.machine.change_state(&mut self.body, target) {
            tracing::error!(player = self.id, "Transition to {} failed: {}", target, e);
            if cfg!(debug_assertions) {
                panic!("transition to unregistered state {}", target);
            }
        }
        self.sync_state();
    }

    /// Check whether a hazard was created by someone else.
    fn is_foreign(&self, contact: &Contact) -> bool {
        contact.owner != Some(self.id)
    }

    /// Point ahead of the dragon where projectiles appear.
    fn skill_anchor(&self) -> Vec3 {
        let distance = self.body.config.movement.skill_anchor_distance;
        let (sin, cos) = self.facing.to_radians().sin_cos();
        self.body.physics.position() + Vec3::new(cos, sin, 0.0) * distance
    }

    fn spawn(
        &mut self,
        prefab: Prefab,
        position: Vec3,
        rotation: f32,
        lifetime: Option<f32>,
    ) -> Option<SpawnHandle> {
        let request = SpawnRequest {
            prefab,
            position,
            rotation,
            owner: self.id,
            lifetime,
        };
        match self.spawner.spawn(request) {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(player = self.id, "{}", e);
                None
            }
        }
    }
}

impl<P: fmt::Debug> fmt::Debug for PlayerController<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerController")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("controllable", &self.controllable)
            .field("has_shield", &self.has_shield)
            .field("is_slow", &self.is_slow)
            .field("body", &self.body)
            .finish()
    }
}
