use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

// Configuration for arena properties
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ArenaConfig {
    pub width: f32,
    pub height: f32,
}

// Parameters for agent behavior and geometry, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AgentConfig {
    /// Collision radius, shared by every agent. Also the wall-reflection margin.
    #[serde(default = "default_size")]
    pub size: f32,
    /// Speed cap for prey. Predators move at half this.
    #[serde(default = "default_base_speed")]
    pub base_speed: f32,
    /// Inclusive lower bound of the step budget rolled at each re-steer.
    #[serde(default = "default_min_steps")]
    pub min_steps: u32,
    /// Exclusive upper bound of the step budget.
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
}

// Configuration for timing
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    /// Sleep between two ticks of an agent thread, in milliseconds.
    #[serde(default = "default_pace_ms")]
    pub pace_ms: u64,
    /// Interval at which the driver polls for completed infections, in milliseconds.
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
    /// Wall-clock duration of a headless run, in seconds.
    pub run_time_s: f32,
    /// Interval between recorded snapshots, in seconds.
    #[serde(default = "default_record_interval_s")]
    pub record_interval_s: f32,
}

// Initial populations for the simulation, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct InitialConditions {
    pub num_prey: u32,
    pub num_predators: u32,
    #[serde(default)]
    pub seed: u64,
}

// Configuration for output settings, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub base_filename: String,
    #[serde(default)]
    pub save_positions: bool,
    #[serde(default)]
    pub save_snapshots: bool,
    #[serde(default)]
    pub save_positions_in_snapshot: bool,
}

fn default_size() -> f32 { 10.0 }
fn default_base_speed() -> f32 { 6.0 }
fn default_min_steps() -> u32 { 10 }
fn default_max_steps() -> u32 { 30 }
fn default_pace_ms() -> u64 { 20 }
fn default_poll_ms() -> u64 { 5 }
fn default_record_interval_s() -> f32 { 1.0 }

// Main simulation configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SimulationConfig {
    pub arena: ArenaConfig,
    pub agents: AgentConfig,
    pub timing: TimingConfig,
    pub initial_conditions: InitialConditions,
    pub output: OutputConfig,
}

impl SimulationConfig {
    /// Loads the simulation configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config: SimulationConfig = toml::from_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML from '{}': {}", path_ref.display(), e))?;

        config.validate()?;
        Ok(config)
    }

    /// Checks configuration invariants that the simulation core relies on.
    pub fn validate(&self) -> Result<()> {
        if self.arena.width <= 0.0 || self.arena.height <= 0.0 {
            anyhow::bail!("arena dimensions must be positive.");
        }
        if self.agents.size <= 0.0 {
            anyhow::bail!("agent size must be positive.");
        }
        if self.arena.width <= 2.0 * self.agents.size || self.arena.height <= 2.0 * self.agents.size {
            anyhow::bail!("arena must be larger than twice the agent size on both axes.");
        }
        // Velocity components are drawn from the non-zero integers in
        // [-speed, speed], so both speed caps must floor to at least 1.
        if self.agents.base_speed < 2.0 {
            anyhow::bail!("base_speed must be at least 2 so the predator speed cap is non-zero.");
        }
        if self.agents.max_steps <= self.agents.min_steps {
            anyhow::bail!("max_steps must be greater than min_steps.");
        }
        if self.timing.run_time_s <= 0.0 {
            anyhow::bail!("run_time_s must be positive.");
        }
        Ok(())
    }

    /// Converts the configuration into simulation parameters used at runtime.
    pub fn get_sim_params(&self) -> SimParams {
        SimParams {
            arena_width: self.arena.width,
            arena_height: self.arena.height,
            size: self.agents.size,
            prey_speed: self.agents.base_speed,
            predator_speed: self.agents.base_speed / 2.0,
            min_steps: self.agents.min_steps,
            max_steps: self.agents.max_steps,
            pace_ms: self.timing.pace_ms,
            poll_ms: self.timing.poll_ms,
            seed: self.initial_conditions.seed,
        }
    }
}

/// Simulation parameters derived from the configuration, used frequently during ticks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimParams {
    pub arena_width: f32,
    pub arena_height: f32,

    // Agent properties
    pub size: f32,
    pub prey_speed: f32,
    pub predator_speed: f32,
    pub min_steps: u32,
    pub max_steps: u32,

    // Time
    pub pace_ms: u64,
    pub poll_ms: u64,

    pub seed: u64,
}

impl SimParams {
    /// Parameters with the built-in defaults, handy for harnesses and tests.
    pub fn with_arena(width: f32, height: f32) -> Self {
        SimParams {
            arena_width: width,
            arena_height: height,
            size: default_size(),
            prey_speed: default_base_speed(),
            predator_speed: default_base_speed() / 2.0,
            min_steps: default_min_steps(),
            max_steps: default_max_steps(),
            pace_ms: default_pace_ms(),
            poll_ms: default_poll_ms(),
            seed: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> SimulationConfig {
        SimulationConfig {
            arena: ArenaConfig { width: 500.0, height: 500.0 },
            agents: AgentConfig {
                size: default_size(),
                base_speed: default_base_speed(),
                min_steps: default_min_steps(),
                max_steps: default_max_steps(),
            },
            timing: TimingConfig {
                pace_ms: default_pace_ms(),
                poll_ms: default_poll_ms(),
                run_time_s: 1.0,
                record_interval_s: 1.0,
            },
            initial_conditions: InitialConditions { num_prey: 5, num_predators: 1, seed: 7 },
            output: OutputConfig {
                base_filename: "out".to_string(),
                save_positions: false,
                save_snapshots: false,
                save_positions_in_snapshot: false,
            },
        }
    }

    #[test]
    fn predator_speed_is_half_base() {
        let params = base_config().get_sim_params();
        assert!((params.predator_speed - params.prey_speed / 2.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_degenerate_arena() {
        let mut config = base_config();
        config.arena.width = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_step_budget() {
        let mut config = base_config();
        config.agents.min_steps = 30;
        config.agents.max_steps = 10;
        assert!(config.validate().is_err());
    }
}
