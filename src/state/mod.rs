//! Player state module.
//!
//! This module provides the per-player core of the game:
//!
//! - `machine` - Generic state machine engine
//! - `player` - Movement states and the body they operate on
//! - `dragon` - Element, persisted properties and the resource economy
//! - `ports` - Traits for physics, input, networked properties and spawning
//! - `controller` - The orchestrator tying them together
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        PlayerController                              │
//! │                                                                      │
//! │  engine callbacks ──▶ tick / contacts / skill / items                │
//! │                                                                      │
//! │  ┌──────────────────────────┐     ┌──────────────────────────────┐   │
//! │  │ StateMachine             │     │ PlayerBody (owner)           │   │
//! │  │                          │     │                              │   │
//! │  │ PlayerState → Box<State> │────▶│ PhysicsBody   Dragon         │   │
//! │  │ current, previous        │ &mut│ input         timers         │   │
//! │  │ listeners                │     │ safe position locomotion     │   │
//! │  └──────────────────────────┘     └──────────────────────────────┘   │
//! │                                                                      │
//! │  Box<dyn PropertyStore>  (POS_X, PREV_POS)                           │
//! │  Box<dyn Spawner>        (Fireball, IceAge, ThunderBoost, ...)       │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use dragon_flight_state::state::{
//!     machine::StateMachine,
//!     player::{PlayerBody, PlayerState, WaitingState, FlyingState},
//! };
//!
//! let mut machine = StateMachine::new(&mut body, WaitingState);
//! machine.add_state(FlyingState)?;
//! machine.change_state(&mut body, PlayerState::Flying)?;
//! machine.update(&mut body, 0.016)?;
//! ```

pub mod controller;
pub mod dragon;
pub mod machine;
pub mod player;
pub mod ports;

// Re-export commonly used types
pub use controller::{
    Contact, ContactTag, ControllerError, Item, PlayerController, POS_X_KEY, PREV_POS_KEY,
};
pub use dragon::{Dragon, DragonProperty, Element, MalformedRecord, PropertyRecord, SkillError};
pub use machine::{State, StateChange, StateMachine, StateMachineError};
pub use player::{
    BurningState, FallInWaterState, FallingState, FlyingState, PlayerBody, PlayerState,
    RunningState, ThunderBoostState, WaitingState,
};
pub use ports::{
    InputFrame, InputSource, KinematicBody, MemoryPropertyStore, PhysicsBody, PlayerId, Prefab,
    PropertyStore, PropertyStoreExt, RecordingSpawner, SpawnError, SpawnHandle, SpawnRequest,
    Spawner, StoreError,
};
