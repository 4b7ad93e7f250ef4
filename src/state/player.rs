//! Player movement states.
//!
//! Each physics mode of a dragon is one [`State`] over a shared
//! [`PlayerBody`]. The body carries everything the states read and write:
//! the physics port, the dragon's resources, this tick's input and the effect
//! timers.
//!
//! # State Diagram
//!
//! ```text
//!                 launch
//! ┌─────────┐ ─────────────▶ ┌─────────┐  below fall altitude  ┌─────────┐
//! │ Waiting │                │ Flying  │ ─────────────────────▶│ Falling │
//! └─────────┘ ◀──────┐       └─────────┘                       └────┬────┘
//!      ▲             │         ▲     │ platform                     │
//!      │   recovered │   left  │     ▼                              │ kill plane
//!      │             │ platform│ ┌─────────┐                        │ (recover)
//!      │             │         └─│ Running │                        │
//!      │             │           └─────────┘                        │
//!      │      ┌─────────────┐                                       │
//!      │      │ FallInWater │◀── water (any state)                  │
//!      │      └─────────────┘                                       │
//!      └────────────────────────────────────────────────────────────┘
//!
//!   Burning, ThunderBoost: timed overlays that return to the last
//!   locomotion state (Flying, Falling or Running) when they expire.
//! ```

use std::fmt;

use glam::Vec3;

use super::dragon::Dragon;
use super::machine::State;
use super::ports::{InputFrame, PhysicsBody};
use crate::config::GameConfig;

/// Velocities below this length count as "at rest".
const REST_SPEED: f32 = 0.01;

/// Tag of the state a player is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlayerState {
    /// Parked, waiting for a launch
    #[default]
    Waiting,
    /// Free flight
    Flying,
    /// Lost altitude, gravity dominates
    Falling,
    /// Following a platform surface
    Running,
    /// Hit by an enemy fireball
    Burning,
    /// Thunder skill speed burst
    ThunderBoost,
    /// Landed in water, recovering
    FallInWater,
}

impl PlayerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Flying => "flying",
            Self::Falling => "falling",
            Self::Running => "running",
            Self::Burning => "burning",
            Self::ThunderBoost => "thunder_boost",
            Self::FallInWater => "fall_in_water",
        }
    }

    /// Check if this is one of the movement modes timed effects return to.
    pub fn is_locomotion(&self) -> bool {
        matches!(self, Self::Flying | Self::Falling | Self::Running)
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the player states operate on.
#[derive(Debug, Clone)]
pub struct PlayerBody<P> {
    pub(crate) physics: P,
    pub(crate) dragon: Dragon,
    pub(crate) config: GameConfig,
    pub(crate) input: InputFrame,
    pub(crate) on_platform: bool,
    pub(crate) safe_position: Vec3,
    pub(crate) locomotion: PlayerState,
    pub(crate) burn_remaining: f32,
    pub(crate) boost_remaining: f32,
    pub(crate) water_remaining: f32,
}

impl<P: PhysicsBody> PlayerBody<P> {
    pub fn new(physics: P, dragon: Dragon, config: GameConfig) -> Self {
        let safe_position = physics.position();
        Self {
            physics,
            dragon,
            config,
            input: InputFrame::default(),
            on_platform: false,
            safe_position,
            locomotion: PlayerState::Flying,
            burn_remaining: 0.0,
            boost_remaining: 0.0,
            water_remaining: 0.0,
        }
    }

    pub fn physics(&self) -> &P {
        &self.physics
    }

    pub fn physics_mut(&mut self) -> &mut P {
        &mut self.physics
    }

    pub fn dragon(&self) -> &Dragon {
        &self.dragon
    }

    pub fn dragon_mut(&mut self) -> &mut Dragon {
        &mut self.dragon
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn safe_position(&self) -> Vec3 {
        self.safe_position
    }

    pub fn is_on_platform(&self) -> bool {
        self.on_platform
    }

    /// Last locomotion state entered.
    pub fn locomotion(&self) -> PlayerState {
        self.locomotion
    }

    pub fn altitude(&self) -> f32 {
        self.physics.position().y
    }

    /// Move back to the safe position and stop.
    pub(crate) fn recover(&mut self) {
        self.physics.set_position(self.safe_position);
        self.physics.set_velocity(Vec3::ZERO);
    }

    fn scale_velocity(&mut self, factor: f32) {
        let velocity = self.physics.velocity();
        self.physics.set_velocity(velocity * factor);
    }
}

/// Rotate a velocity in the XY plane by `degrees`.
fn rotate_z(velocity: Vec3, degrees: f32) -> Vec3 {
    let (sin, cos) = degrees.to_radians().sin_cos();
    Vec3::new(
        velocity.x * cos - velocity.y * sin,
        velocity.x * sin + velocity.y * cos,
        velocity.z,
    )
}

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

/// Parked until the launch input arrives.
#[derive(Debug, Default)]
pub struct WaitingState;

impl<P: PhysicsBody> State<PlayerBody<P>, PlayerState> for WaitingState {
    fn id(&self) -> PlayerState {
        PlayerState::Waiting
    }

    fn on_enter(&mut self, body: &mut PlayerBody<P>) {
        body.physics.set_velocity(Vec3::ZERO);
        body.physics.set_gravity_scale(0.0);
        body.physics.set_rotation(0.0);
        body.input.launch = false;
        body.on_platform = false;
        body.burn_remaining = 0.0;
        body.boost_remaining = 0.0;
        body.water_remaining = 0.0;
    }

    fn on_update(&mut self, body: &mut PlayerBody<P>, _dt: f32) -> Option<PlayerState> {
        body.input.launch.then_some(PlayerState::Flying)
    }
}

/// Free flight, steered by the speed angle.
#[derive(Debug, Default)]
pub struct FlyingState;

impl<P: PhysicsBody> State<PlayerBody<P>, PlayerState> for FlyingState {
    fn id(&self) -> PlayerState {
        PlayerState::Flying
    }

    fn on_enter(&mut self, body: &mut PlayerBody<P>) {
        body.locomotion = PlayerState::Flying;
        body.physics
            .set_gravity_scale(body.config.movement.flying_gravity_scale);

        if body.physics.velocity().length() < REST_SPEED {
            body.physics
                .set_velocity(body.config.movement.launch_velocity);
        }
    }

    fn on_update(&mut self, body: &mut PlayerBody<P>, dt: f32) -> Option<PlayerState> {
        let steer = body.input.steer;
        if steer != 0.0 {
            let dragon = &body.dragon;
            let turn_rate = dragon.speed_angle().min(dragon.max_speed_angle());
            let velocity = rotate_z(body.physics.velocity(), steer * turn_rate * dt);
            body.physics.set_velocity(velocity);
        }

        if body.altitude() < body.config.movement.fall_altitude {
            return Some(PlayerState::Falling);
        }
        None
    }
}

/// Gravity takes over; recovers the player below the kill plane.
#[derive(Debug, Default)]
pub struct FallingState;

impl<P: PhysicsBody> State<PlayerBody<P>, PlayerState> for FallingState {
    fn id(&self) -> PlayerState {
        PlayerState::Falling
    }

    fn on_enter(&mut self, body: &mut PlayerBody<P>) {
        body.locomotion = PlayerState::Falling;
        body.physics
            .set_gravity_scale(body.config.movement.falling_gravity_scale);
    }

    fn on_update(&mut self, body: &mut PlayerBody<P>, _dt: f32) -> Option<PlayerState> {
        if body.altitude() < body.config.movement.kill_plane_altitude {
            tracing::info!(
                altitude = body.altitude(),
                "Fatal fall, recovering to safe position"
            );
            body.recover();
            return Some(PlayerState::Waiting);
        }
        None
    }
}

/// Running along a platform with orientation locked to the ground.
#[derive(Debug, Default)]
pub struct RunningState;

impl RunningState {
    fn ground_velocity(run_speed: f32) -> Vec3 {
        Vec3::new(run_speed, 0.0, 0.0)
    }
}

impl<P: PhysicsBody> State<PlayerBody<P>, PlayerState> for RunningState {
    fn id(&self) -> PlayerState {
        PlayerState::Running
    }

    fn on_enter(&mut self, body: &mut PlayerBody<P>) {
        body.locomotion = PlayerState::Running;
        body.physics.set_gravity_scale(0.0);
        body.physics.set_rotation(0.0);
        body.physics
            .set_velocity(Self::ground_velocity(body.config.movement.run_speed));
    }

    fn on_update(&mut self, body: &mut PlayerBody<P>, _dt: f32) -> Option<PlayerState> {
        if !body.on_platform {
            return Some(PlayerState::Flying);
        }

        body.physics.set_rotation(0.0);
        body.physics
            .set_velocity(Self::ground_velocity(body.config.movement.run_speed));
        None
    }
}

/// Slowed and losing energy until the burn wears off.
#[derive(Debug, Default)]
pub struct BurningState;

impl<P: PhysicsBody> State<PlayerBody<P>, PlayerState> for BurningState {
    fn id(&self) -> PlayerState {
        PlayerState::Burning
    }

    fn on_enter(&mut self, body: &mut PlayerBody<P>) {
        body.burn_remaining = body.config.effects.burn_duration;
        body.scale_velocity(body.config.effects.burn_speed_factor);
    }

    fn on_update(&mut self, body: &mut PlayerBody<P>, dt: f32) -> Option<PlayerState> {
        let burned = dt.min(body.burn_remaining);
        body.dragon
            .drain_energy(body.config.effects.burn_energy_drain * burned);
        body.burn_remaining -= dt;

        (body.burn_remaining <= 0.0).then_some(body.locomotion)
    }

    fn on_exit(&mut self, body: &mut PlayerBody<P>) {
        body.burn_remaining = 0.0;
    }
}

/// Short speed burst from the thunder skill.
#[derive(Debug, Default)]
pub struct ThunderBoostState;

impl<P: PhysicsBody> State<PlayerBody<P>, PlayerState> for ThunderBoostState {
    fn id(&self) -> PlayerState {
        PlayerState::ThunderBoost
    }

    fn on_enter(&mut self, body: &mut PlayerBody<P>) {
        body.boost_remaining = body.config.effects.thunder_boost_duration;
        body.physics.set_gravity_scale(0.0);
        body.scale_velocity(body.config.effects.thunder_boost_multiplier);
    }

    fn on_update(&mut self, body: &mut PlayerBody<P>, dt: f32) -> Option<PlayerState> {
        body.boost_remaining -= dt;
        (body.boost_remaining <= 0.0).then_some(body.locomotion)
    }

    fn on_exit(&mut self, body: &mut PlayerBody<P>) {
        body.boost_remaining = 0.0;
        let multiplier = body.config.effects.thunder_boost_multiplier;
        if multiplier > 0.0 {
            body.scale_velocity(multiplier.recip());
        }
    }
}

/// Sinking in water; returns to the safe position once recovered.
#[derive(Debug, Default)]
pub struct FallInWaterState;

impl<P: PhysicsBody> State<PlayerBody<P>, PlayerState> for FallInWaterState {
    fn id(&self) -> PlayerState {
        PlayerState::FallInWater
    }

    fn on_enter(&mut self, body: &mut PlayerBody<P>) {
        let effects = &body.config.effects;
        body.water_remaining = effects.water_recovery_time;
        let (drag, gravity, penalty) = (
            effects.water_drag,
            effects.water_gravity_scale,
            effects.water_energy_penalty,
        );

        body.scale_velocity(drag);
        body.physics.set_gravity_scale(gravity);
        body.dragon.drain_energy(penalty as f32);
        body.on_platform = false;
    }

    fn on_update(&mut self, body: &mut PlayerBody<P>, dt: f32) -> Option<PlayerState> {
        body.water_remaining -= dt;
        if body.water_remaining > 0.0 {
            return None;
        }

        body.recover();
        Some(PlayerState::Waiting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DragonTuning;
    use crate::state::dragon::{DragonProperty, Element};
    use crate::state::machine::StateMachine;
    use crate::state::ports::KinematicBody;

    type Body = PlayerBody<KinematicBody>;

    fn body_at(position: Vec3) -> Body {
        let config = GameConfig::default();
        let dragon = Dragon::new(DragonProperty::new(Element::Fire), &DragonTuning::default());
        PlayerBody::new(KinematicBody::at(position), dragon, config)
    }

    fn machine(body: &mut Body) -> StateMachine<Body, PlayerState> {
        let mut machine = StateMachine::new(body, WaitingState);
        machine.add_state(FlyingState).unwrap();
        machine.add_state(FallingState).unwrap();
        machine.add_state(RunningState).unwrap();
        machine.add_state(BurningState).unwrap();
        machine.add_state(ThunderBoostState).unwrap();
        machine.add_state(FallInWaterState).unwrap();
        machine
    }

    #[test]
    fn test_waiting_until_launch() {
        let mut body = body_at(Vec3::new(0.0, 5.0, 0.0));
        let mut machine = machine(&mut body);

        for _ in 0..10 {
            machine.update(&mut body, 0.1).unwrap();
        }
        assert_eq!(machine.current_state(), PlayerState::Waiting);
        assert_eq!(body.physics().velocity, Vec3::ZERO);

        body.input.launch = true;
        machine.update(&mut body, 0.1).unwrap();
        assert_eq!(machine.current_state(), PlayerState::Flying);
        assert_eq!(body.physics().velocity, body.config.movement.launch_velocity);
        assert_eq!(
            body.physics().gravity_scale,
            body.config.movement.flying_gravity_scale
        );
    }

    #[test]
    fn test_flying_steers_velocity() {
        let mut body = body_at(Vec3::new(0.0, 5.0, 0.0));
        let mut machine = machine(&mut body);
        body.physics_mut().velocity = Vec3::new(10.0, 0.0, 0.0);
        machine.change_state(&mut body, PlayerState::Flying).unwrap();

        // 10 deg/s for 1s
        body.input.steer = 1.0;
        machine.update(&mut body, 1.0).unwrap();

        let velocity = body.physics().velocity;
        assert!((velocity.length() - 10.0).abs() < 1e-4);
        assert!((velocity.y.atan2(velocity.x).to_degrees() - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_flying_loses_altitude_to_falling() {
        let mut body = body_at(Vec3::new(0.0, 5.0, 0.0));
        let mut machine = machine(&mut body);
        machine.change_state(&mut body, PlayerState::Flying).unwrap();

        body.physics_mut().position.y = -2.0;
        machine.update(&mut body, 0.1).unwrap();
        assert_eq!(machine.current_state(), PlayerState::Flying);

        body.physics_mut().position.y = -4.0;
        machine.update(&mut body, 0.1).unwrap();
        assert_eq!(machine.current_state(), PlayerState::Falling);
        assert_eq!(body.locomotion(), PlayerState::Falling);
    }

    #[test]
    fn test_falling_below_kill_plane_recovers() {
        let mut body = body_at(Vec3::new(3.0, 5.0, 0.0));
        let mut machine = machine(&mut body);
        machine.change_state(&mut body, PlayerState::Falling).unwrap();

        body.physics_mut().position = Vec3::new(40.0, -9.0, 0.0);
        machine.update(&mut body, 0.1).unwrap();
        assert_eq!(machine.current_state(), PlayerState::Falling);

        body.physics_mut().position = Vec3::new(40.0, -11.0, 0.0);
        body.physics_mut().velocity = Vec3::new(1.0, -20.0, 0.0);
        machine.update(&mut body, 0.1).unwrap();

        assert_eq!(machine.current_state(), PlayerState::Waiting);
        assert_eq!(body.physics().position, Vec3::new(3.0, 5.0, 0.0));
        assert_eq!(body.physics().velocity, Vec3::ZERO);
    }

    #[test]
    fn test_running_follows_ground_until_platform_lost() {
        let mut body = body_at(Vec3::ZERO);
        let mut machine = machine(&mut body);
        body.on_platform = true;
        body.physics_mut().rotation = 35.0;
        machine.change_state(&mut body, PlayerState::Running).unwrap();

        assert_eq!(body.physics().rotation, 0.0);
        machine.update(&mut body, 0.5).unwrap();
        assert_eq!(machine.current_state(), PlayerState::Running);
        assert_eq!(
            body.physics().velocity,
            Vec3::new(body.config.movement.run_speed, 0.0, 0.0)
        );

        body.on_platform = false;
        machine.update(&mut body, 0.1).unwrap();
        assert_eq!(machine.current_state(), PlayerState::Flying);
    }

    #[test]
    fn test_burning_returns_to_locomotion() {
        let mut body = body_at(Vec3::new(0.0, 5.0, 0.0));
        let mut machine = machine(&mut body);
        body.on_platform = true;
        machine.change_state(&mut body, PlayerState::Running).unwrap();
        machine.change_state(&mut body, PlayerState::Burning).unwrap();

        // 3s burn at 5 energy per second
        for _ in 0..2 {
            machine.update(&mut body, 1.0).unwrap();
        }
        assert_eq!(machine.current_state(), PlayerState::Burning);
        assert_eq!(body.dragon().energy(), 90);

        machine.update(&mut body, 1.5).unwrap();
        assert_eq!(machine.current_state(), PlayerState::Running);
        assert_eq!(body.dragon().energy(), 85);
    }

    #[test]
    fn test_thunder_boost_is_temporary() {
        let mut body = body_at(Vec3::new(0.0, 5.0, 0.0));
        let mut machine = machine(&mut body);
        body.physics_mut().velocity = Vec3::new(10.0, 0.0, 0.0);
        machine.change_state(&mut body, PlayerState::Flying).unwrap();

        machine.change_state(&mut body, PlayerState::ThunderBoost).unwrap();
        let boosted = body.physics().velocity.x;
        assert!((boosted - 18.0).abs() < 1e-4);
        assert_eq!(body.physics().gravity_scale, 0.0);

        machine.update(&mut body, 3.0).unwrap();
        assert_eq!(machine.current_state(), PlayerState::Flying);
        assert!((body.physics().velocity.x - 10.0).abs() < 1e-4);
        assert_eq!(
            body.physics().gravity_scale,
            body.config.movement.flying_gravity_scale
        );
    }

    #[test]
    fn test_water_recovers_to_waiting() {
        let mut body = body_at(Vec3::new(1.0, 4.0, 0.0));
        let mut machine = machine(&mut body);
        body.physics_mut().velocity = Vec3::new(10.0, -5.0, 0.0);
        body.physics_mut().position = Vec3::new(30.0, -1.0, 0.0);
        machine.change_state(&mut body, PlayerState::FallInWater).unwrap();

        assert_eq!(body.dragon().energy(), 90);
        assert_eq!(body.physics().velocity, Vec3::new(2.0, -1.0, 0.0));

        machine.update(&mut body, 1.0).unwrap();
        assert_eq!(machine.current_state(), PlayerState::FallInWater);

        machine.update(&mut body, 1.0).unwrap();
        assert_eq!(machine.current_state(), PlayerState::Waiting);
        assert_eq!(body.physics().position, Vec3::new(1.0, 4.0, 0.0));
    }

    #[test]
    fn test_state_tags() {
        assert!(PlayerState::Running.is_locomotion());
        assert!(!PlayerState::Burning.is_locomotion());
        assert!(!PlayerState::ThunderBoost.is_locomotion());
        assert_eq!(PlayerState::default(), PlayerState::Waiting);
        assert_eq!(PlayerState::FallInWater.to_string(), "fall_in_water");
    }
}
