//! Dragon Flight State Library
//!
//! This crate provides the per-player core of a networked dragon flying game.
//!
//! # Overview
//!
//! The state module provides:
//!
//! - **Generic State Machine** - A registry of reusable states with exactly one
//!   current state, exit-before-enter transitions and change listeners.
//!
//! - **Player States** - Waiting, Flying, Falling, Running, Burning,
//!   ThunderBoost and FallInWater, each owning one physics mode.
//!
//! - **Dragon Resources** - Element, level, energy, experience and the skill
//!   cooldown economy, with a flat record for save/restore.
//!
//! - **Player Controller** - Turns engine ticks, collisions and triggers into
//!   state changes, and asks the networking layer to spawn skill objects.
//!
//! # Design Principles
//!
//! 1. **No engine, no transport** - Physics, input, networked properties and
//!    spawning are traits; adapters live with the engine.
//!
//! 2. **Configuration is a value** - Every constant comes from a [`GameConfig`]
//!    handed over at construction.
//!
//! 3. **Single-threaded ticks** - Timers are countdowns advanced by each tick's
//!    elapsed time; nothing is scheduled.
//!
//! # Example
//!
//! ```rust
//! use dragon_flight_state::GameConfig;
//! use dragon_flight_state::state::{
//!     Contact, DragonProperty, Element, InputFrame, KinematicBody, MemoryPropertyStore,
//!     PlayerController, PlayerState, RecordingSpawner,
//! };
//! use glam::Vec3;
//!
//! let spawner = RecordingSpawner::new();
//! let mut player = PlayerController::new(
//!     1,
//!     KinematicBody::at(Vec3::new(0.0, 5.0, 0.0)),
//!     DragonProperty::new(Element::Fire),
//!     GameConfig::default(),
//!     Box::new(MemoryPropertyStore::new()),
//!     Box::new(spawner.clone()),
//! )
//! .unwrap();
//! player.set_controllable(true);
//!
//! // Launch
//! player.tick(0.016, &InputFrame::launch()).unwrap();
//! assert_eq!(player.player_state(), PlayerState::Flying);
//!
//! // Land on a platform
//! player.on_collision_enter(&Contact::new("Platform"));
//! assert_eq!(player.player_state(), PlayerState::Running);
//!
//! // Breathe fire
//! player.tick(0.016, &InputFrame::skill()).unwrap();
//! assert_eq!(spawner.requests().len(), 1);
//! ```

pub mod config;
pub mod state;

pub use config::{ConfigError, GameConfig};
// Re-export everything from state module at crate root
pub use state::*;
