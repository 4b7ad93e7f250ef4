//! Generic state machine engine.
//!
//! A [`StateMachine`] holds a registry of reusable state objects keyed by an
//! identifier, tracks which one is current, and dispatches per-tick updates
//! to it. The owning entity is never stored inside the machine: it is handed
//! to every call as `&mut O`, so states can read and write the owner while the
//! machine stays free of domain data.
//!
//! # Transition order
//!
//! ```text
//!   change_state(B) while A is current
//!
//!   A.on_exit(owner) ──▶ current = B ──▶ B.on_enter(owner) ──▶ listeners(A → B)
//! ```
//!
//! A state asks for a transition by returning the target id from
//! [`State::on_update`]; the machine commits it after the update returns.
//! States never see the machine, so a re-entrant `update` is impossible.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// A single state in a [`StateMachine`].
///
/// States are strategy objects: they keep nothing between activations that
/// the owner does not also hold. Only [`State::id`] is required.
pub trait State<O, K> {
    /// Identifier this state is registered under.
    fn id(&self) -> K;

    /// Runs when the machine switches into this state.
    fn on_enter(&mut self, _owner: &mut O) {}

    /// Runs once per tick while this state is current.
    ///
    /// Returning `Some(id)` requests a transition to `id`.
    fn on_update(&mut self, _owner: &mut O, _delta_time: f32) -> Option<K> {
        None
    }

    /// Runs when the machine switches away from this state.
    fn on_exit(&mut self, _owner: &mut O) {}
}

/// Errors raised by the state machine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StateMachineError {
    #[error("state {0} is not registered")]
    UnknownState(String),

    #[error("state {0} is already registered")]
    DuplicateState(String),

    #[error("delta time must be finite and non-negative, got {0}")]
    InvalidDeltaTime(f32),
}

/// A committed transition, delivered to change listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange<K> {
    pub from: K,
    pub to: K,
    pub at: DateTime<Utc>,
}

type Listener<K> = Box<dyn FnMut(&StateChange<K>)>;

/// Registry of states with exactly one current state.
pub struct StateMachine<O, K> {
    states: HashMap<K, Box<dyn State<O, K>>>,
    current: K,
    previous: Option<K>,
    elapsed_in_state: f32,
    listeners: Vec<Listener<K>>,
}

impl<O, K> StateMachine<O, K>
where
    K: Copy + Eq + Hash + fmt::Debug,
{
    /// Create a machine with `initial` registered and entered.
    pub fn new<S>(owner: &mut O, initial: S) -> Self
    where
        S: State<O, K> + 'static,
    {
        let mut initial: Box<dyn State<O, K>> = Box::new(initial);
        let current = initial.id();
        initial.on_enter(owner);

        let mut states = HashMap::new();
        states.insert(current, initial);

        Self {
            states,
            current,
            previous: None,
            elapsed_in_state: 0.0,
            listeners: Vec::new(),
        }
    }

    /// Register a state so the machine can switch to it.
    pub fn add_state<S>(&mut self, state: S) -> Result<(), StateMachineError>
    where
        S: State<O, K> + 'static,
    {
        let id = state.id();
        if self.states.contains_key(&id) {
            return Err(StateMachineError::DuplicateState(format!("{:?}", id)));
        }
        self.states.insert(id, Box::new(state));
        Ok(())
    }

    /// Switch to the state registered under `id`.
    ///
    /// Returns `Ok(false)` when `id` is already current (no callbacks run)
    /// and `Ok(true)` when a transition was committed.
    pub fn change_state(&mut self, owner: &mut O, id: K) -> Result<bool, StateMachineError> {
        if !self.states.contains_key(&id) {
            return Err(StateMachineError::UnknownState(format!("{:?}", id)));
        }
        if id == self.current {
            return Ok(false);
        }

        let from = self.current;
        if let Some(outgoing) = self.states.get_mut(&from) {
            outgoing.on_exit(owner);
        }

        self.previous = Some(from);
        self.current = id;
        self.elapsed_in_state = 0.0;

        if let Some(incoming) = self.states.get_mut(&id) {
            incoming.on_enter(owner);
        }

        let change = StateChange {
            from,
            to: id,
            at: Utc::now(),
        };
        for listener in &mut self.listeners {
            listener(&change);
        }

        Ok(true)
    }

    /// Advance the current state by `delta_time` seconds.
    ///
    /// Commits the transition the state requested, if any. Returns whether a
    /// transition happened.
    pub fn update(&mut self, owner: &mut O, delta_time: f32) -> Result<bool, StateMachineError> {
        if !delta_time.is_finite() || delta_time < 0.0 {
            return Err(StateMachineError::InvalidDeltaTime(delta_time));
        }

        self.elapsed_in_state += delta_time;

        let requested = match self.states.get_mut(&self.current) {
            Some(state) => state.on_update(owner, delta_time),
            None => return Err(StateMachineError::UnknownState(format!("{:?}", self.current))),
        };

        match requested {
            Some(next) => self.change_state(owner, next),
            None => Ok(false),
        }
    }

    /// Register a listener fired after every committed transition.
    pub fn on_state_changed<F>(&mut self, listener: F)
    where
        F: FnMut(&StateChange<K>) + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Identifier of the current state.
    pub fn current_state(&self) -> K {
        self.current
    }

    /// Identifier of the state active before the last transition.
    pub fn previous_state(&self) -> Option<K> {
        self.previous
    }

    /// Seconds accumulated by `update` since the last transition.
    pub fn elapsed_in_state(&self) -> f32 {
        self.elapsed_in_state
    }

    pub fn contains(&self, id: K) -> bool {
        self.states.contains_key(&id)
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }
}

impl<O, K: fmt::Debug> fmt::Debug for StateMachine<O, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("current", &self.current)
            .field("previous", &self.previous)
            .field("elapsed_in_state", &self.elapsed_in_state)
            .field("states", &self.states.keys().collect::<Vec<_>>())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Light {
        Red,
        Green,
        Amber,
        Broken,
    }

    /// Owner that records every callback in order. Listeners can share the
    /// same log through `calls`.
    #[derive(Default)]
    struct Log {
        calls: Rc<RefCell<Vec<String>>>,
        go: bool,
    }

    impl Log {
        fn push(&self, call: String) {
            self.calls.borrow_mut().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn clear(&self) {
            self.calls.borrow_mut().clear();
        }
    }

    struct Lamp(Light);

    impl State<Log, Light> for Lamp {
        fn id(&self) -> Light {
            self.0
        }

        fn on_enter(&mut self, owner: &mut Log) {
            owner.push(format!("enter {:?}", self.0));
        }

        fn on_update(&mut self, owner: &mut Log, _dt: f32) -> Option<Light> {
            owner.push(format!("update {:?}", self.0));
            match self.0 {
                Light::Red if owner.go => Some(Light::Green),
                _ => None,
            }
        }

        fn on_exit(&mut self, owner: &mut Log) {
            owner.push(format!("exit {:?}", self.0));
        }
    }

    fn machine(log: &mut Log) -> StateMachine<Log, Light> {
        let mut machine = StateMachine::new(log, Lamp(Light::Red));
        machine.add_state(Lamp(Light::Green)).unwrap();
        machine.add_state(Lamp(Light::Amber)).unwrap();
        machine
    }

    #[test]
    fn test_initial_state_is_entered() {
        let mut log = Log::default();
        let machine = machine(&mut log);

        assert_eq!(machine.current_state(), Light::Red);
        assert_eq!(machine.previous_state(), None);
        assert_eq!(log.calls(), vec!["enter Red"]);
        assert_eq!(machine.state_count(), 3);
    }

    #[test]
    fn test_change_state_sets_current() {
        let mut log = Log::default();
        let mut machine = machine(&mut log);

        for target in [Light::Green, Light::Amber, Light::Red] {
            assert!(machine.change_state(&mut log, target).unwrap());
            assert_eq!(machine.current_state(), target);
        }
        assert_eq!(machine.previous_state(), Some(Light::Amber));
    }

    #[test]
    fn test_exit_runs_before_enter() {
        let mut log = Log::default();
        let mut machine = machine(&mut log);
        log.clear();

        machine.change_state(&mut log, Light::Green).unwrap();
        assert_eq!(log.calls(), vec!["exit Red", "enter Green"]);
    }

    #[test]
    fn test_change_to_current_is_noop() {
        let mut log = Log::default();
        let mut machine = machine(&mut log);
        log.clear();

        assert!(!machine.change_state(&mut log, Light::Red).unwrap());
        assert!(log.calls().is_empty());
    }

    #[test]
    fn test_unknown_state_leaves_current() {
        let mut log = Log::default();
        let mut machine = machine(&mut log);

        let err = machine.change_state(&mut log, Light::Broken).unwrap_err();
        assert_eq!(err, StateMachineError::UnknownState("Broken".to_string()));
        assert_eq!(machine.current_state(), Light::Red);
        assert!(!machine.contains(Light::Broken));
    }

    #[test]
    fn test_duplicate_state_rejected() {
        let mut log = Log::default();
        let mut machine = machine(&mut log);

        let err = machine.add_state(Lamp(Light::Green)).unwrap_err();
        assert_eq!(err, StateMachineError::DuplicateState("Green".to_string()));
        assert_eq!(machine.current_state(), Light::Red);
    }

    #[test]
    fn test_listeners_fire_once_after_enter() {
        let mut log = Log::default();
        let mut machine = machine(&mut log);
        log.clear();

        let sink = Rc::clone(&log.calls);
        machine.on_state_changed(move |change| {
            sink.borrow_mut()
                .push(format!("changed {:?}->{:?}", change.from, change.to));
        });

        machine.change_state(&mut log, Light::Green).unwrap();
        assert_eq!(
            log.calls(),
            vec!["exit Red", "enter Green", "changed Red->Green"]
        );

        log.clear();
        machine.change_state(&mut log, Light::Green).unwrap();
        assert!(log.calls().is_empty());

        machine.change_state(&mut log, Light::Amber).unwrap();
        assert_eq!(
            log.calls(),
            vec!["exit Green", "enter Amber", "changed Green->Amber"]
        );
    }

    #[test]
    fn test_update_dispatches_and_commits_request() {
        let mut log = Log::default();
        let mut machine = machine(&mut log);
        log.clear();

        assert!(!machine.update(&mut log, 0.5).unwrap());
        assert_eq!(machine.elapsed_in_state(), 0.5);

        log.go = true;
        assert!(machine.update(&mut log, 0.5).unwrap());
        assert_eq!(machine.current_state(), Light::Green);
        assert_eq!(machine.elapsed_in_state(), 0.0);
        assert_eq!(
            log.calls(),
            vec!["update Red", "update Red", "exit Red", "enter Green"]
        );
    }

    #[test]
    fn test_update_rejects_negative_delta() {
        let mut log = Log::default();
        let mut machine = machine(&mut log);
        log.clear();

        assert_eq!(
            machine.update(&mut log, -0.1),
            Err(StateMachineError::InvalidDeltaTime(-0.1))
        );
        assert!(machine.update(&mut log, f32::NAN).is_err());
        assert!(log.calls().is_empty());
        assert!(machine.update(&mut log, 0.0).is_ok());
    }
}
