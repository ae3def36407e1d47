//! Simulation configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PhysicsError, PhysicsResult};

/// Default fixed time step in seconds
pub const DEFAULT_TIME_STEP: f64 = 0.01;

/// Default friction (velocity-proportional damping), 0 = undamped
pub const DEFAULT_FRICTION: f64 = 0.0;

/// Default tolerance for treating an external position as unchanged
pub const DEFAULT_SYNC_EPSILON: f64 = 1e-6;

/// Default cap on physics steps run by a single tick
pub const DEFAULT_MAX_STEPS_PER_TICK: usize = 64;

/// Smallest accepted time step in seconds
pub const MIN_TIME_STEP: f64 = 1e-9;

/// Largest accepted time step in seconds
pub const MAX_TIME_STEP: f64 = 60.0;

/// Tunable parameters of the simulation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Fixed physics time step in seconds
    pub time_step: f64,
    /// Damping force per unit velocity
    pub friction: f64,
    /// External moves smaller than this are treated as round-trip noise
    pub sync_epsilon: f64,
    /// Steps a single tick may run before dropping the remaining backlog
    pub max_steps_per_tick: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            time_step: DEFAULT_TIME_STEP,
            friction: DEFAULT_FRICTION,
            sync_epsilon: DEFAULT_SYNC_EPSILON,
            max_steps_per_tick: DEFAULT_MAX_STEPS_PER_TICK,
        }
    }
}

impl SimulationConfig {
    pub fn with_friction(mut self, friction: f64) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_time_step(mut self, time_step: f64) -> Self {
        self.time_step = time_step;
        self
    }

    pub fn validate(&self) -> PhysicsResult<()> {
        check_time_step(self.time_step)?;
        check_friction(self.friction)?;
        if !self.sync_epsilon.is_finite() || self.sync_epsilon < 0.0 {
            return Err(PhysicsError::InvalidConfig(format!(
                "sync epsilon must be finite and non-negative, got {}",
                self.sync_epsilon
            )));
        }
        if self.max_steps_per_tick == 0 {
            return Err(PhysicsError::InvalidConfig(
                "max steps per tick must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The time step as a wall-clock duration, clamped to the accepted range
    pub fn time_step_duration(&self) -> Duration {
        let seconds = if self.time_step.is_nan() {
            MIN_TIME_STEP
        } else {
            self.time_step.clamp(MIN_TIME_STEP, MAX_TIME_STEP)
        };
        Duration::from_secs_f64(seconds)
    }
}

pub(crate) fn check_time_step(time_step: f64) -> PhysicsResult<()> {
    // Below a nanosecond the wall-clock cursor could not advance.
    if !(MIN_TIME_STEP..=MAX_TIME_STEP).contains(&time_step) {
        return Err(PhysicsError::InvalidConfig(format!(
            "time step must be between 1ns and {MAX_TIME_STEP}s, got {time_step}"
        )));
    }
    Ok(())
}

pub(crate) fn check_friction(friction: f64) -> PhysicsResult<()> {
    if !friction.is_finite() || friction < 0.0 {
        return Err(PhysicsError::InvalidConfig(format!(
            "friction must be finite and non-negative, got {friction}"
        )));
    }
    Ok(())
}
