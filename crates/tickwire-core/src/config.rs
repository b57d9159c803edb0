//! Deployment configuration
//!
//! Every tunable constant of the synchronization engine lives in
//! [`NetConfig`]. Nothing in the engine hard-codes capacities, rates or
//! the sequence modulus; roles receive a config at construction.
//!
//! Configs are plain serde structs and load from RON:
//!
//! ```
//! use tickwire_core::NetConfig;
//!
//! let config = NetConfig::from_ron_str("(tick_rate_hz: 60, prediction_capacity: 120)").unwrap();
//! assert_eq!(config.tick_rate_hz, 60);
//! assert_eq!(config.prediction_capacity, 120);
//! // unspecified fields keep their defaults
//! assert_eq!(config.send_interval, 3);
//! ```

use crate::{Error, Result, SequenceSpace, Vec2};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Movement tuning shared by prediction and the authoritative step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    /// Units per second
    pub speed: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self { speed: 3.0 }
    }
}

/// Combat tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Seconds without taking damage before leaving combat
    pub combat_timeout_secs: f32,
    /// Minimum seconds between two attacks
    pub attack_cooldown_secs: f32,
    /// Reach of a melee attack
    pub attack_reach: f32,
    /// Health of a freshly spawned entity
    pub max_health: u32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            combat_timeout_secs: 2.5,
            attack_cooldown_secs: 0.6,
            attack_reach: 1.0,
            max_health: 10,
        }
    }
}

/// Configuration of the synchronization engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// Modulus of command ids and entity ticks (2..=65536)
    pub sequence_modulus: u32,
    /// Fixed simulation rate of both client and server
    pub tick_rate_hz: u32,
    /// Capacity of the client's unacknowledged command buffer
    pub prediction_capacity: usize,
    /// Capacity of each remote entity's snapshot buffer
    pub remote_buffer_capacity: usize,
    /// Ticks between two resends of the prediction buffer
    pub send_interval: u32,
    /// Buffered time required before remote interpolation starts
    pub interpolation_delay_secs: f32,
    /// Where entities (re)spawn
    pub spawn_position: Vec2,
    pub movement: MovementConfig,
    pub combat: CombatConfig,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            sequence_modulus: 1024,
            tick_rate_hz: 30,
            prediction_capacity: 60,
            remote_buffer_capacity: 30,
            send_interval: 3,
            interpolation_delay_secs: 0.1,
            spawn_position: Vec2::ZERO,
            movement: MovementConfig::default(),
            combat: CombatConfig::default(),
        }
    }
}

impl NetConfig {
    /// Parse and validate a config from RON
    pub fn from_ron_str(content: &str) -> Result<Self> {
        let config: NetConfig = ron::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config from a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_ron_str(&content)
    }

    /// Check all invariants the engine relies on
    pub fn validate(&self) -> Result<()> {
        SequenceSpace::new(self.sequence_modulus)?;
        if self.tick_rate_hz == 0 {
            return Err(Error::InvalidConfig("tick_rate_hz must be positive".into()));
        }
        if self.prediction_capacity == 0 {
            return Err(Error::InvalidConfig(
                "prediction_capacity must be positive".into(),
            ));
        }
        if self.prediction_capacity >= (self.sequence_modulus / 2) as usize {
            return Err(Error::InvalidConfig(format!(
                "prediction_capacity {} must be below half the sequence modulus {}",
                self.prediction_capacity, self.sequence_modulus
            )));
        }
        if self.remote_buffer_capacity < 2 {
            return Err(Error::InvalidConfig(
                "remote_buffer_capacity must hold at least two snapshots".into(),
            ));
        }
        if self.send_interval == 0 {
            return Err(Error::InvalidConfig("send_interval must be positive".into()));
        }
        if !(self.interpolation_delay_secs >= 0.0) {
            return Err(Error::InvalidConfig(
                "interpolation_delay_secs must not be negative".into(),
            ));
        }
        if !(self.movement.speed >= 0.0) {
            return Err(Error::InvalidConfig("movement speed must not be negative".into()));
        }
        if !(self.combat.combat_timeout_secs > 0.0) || self.combat.max_health == 0 {
            return Err(Error::InvalidConfig(
                "combat timeout and max health must be positive".into(),
            ));
        }
        Ok(())
    }

    /// The sequence space described by `sequence_modulus`
    pub fn sequence_space(&self) -> Result<SequenceSpace> {
        SequenceSpace::new(self.sequence_modulus)
    }

    /// Duration of one simulation tick in seconds
    pub fn tick_duration(&self) -> f32 {
        1.0 / self.tick_rate_hz.max(1) as f32
    }

    /// Set the tick rate
    pub fn with_tick_rate(mut self, hz: u32) -> Self {
        self.tick_rate_hz = hz;
        self
    }

    /// Set the sequence modulus
    pub fn with_sequence_modulus(mut self, modulus: u32) -> Self {
        self.sequence_modulus = modulus;
        self
    }

    /// Set the prediction buffer capacity
    pub fn with_prediction_capacity(mut self, capacity: usize) -> Self {
        self.prediction_capacity = capacity;
        self
    }

    /// Set the remote snapshot buffer capacity
    pub fn with_remote_buffer_capacity(mut self, capacity: usize) -> Self {
        self.remote_buffer_capacity = capacity;
        self
    }

    /// Set the resend interval
    pub fn with_send_interval(mut self, ticks: u32) -> Self {
        self.send_interval = ticks;
        self
    }

    /// Set the interpolation buffering delay
    pub fn with_interpolation_delay(mut self, secs: f32) -> Self {
        self.interpolation_delay_secs = secs;
        self
    }
}
