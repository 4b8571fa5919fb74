//! Engine-wide configuration, following the teacher crate's
//! `SystemConfig`/`SystemConfigBuilder` pattern: sensible defaults, a fluent
//! builder, one `validate()` pass before construction.

use serde::{Deserialize, Serialize};

/// Default capacity reserved up front for the actor arena.
pub const DEFAULT_ACTOR_CAPACITY_HINT: usize = 64;

/// Default maximum number of distinct outcomes a single visible simcall may
/// report to the model checker (spec §4.H `get_max_consider`) before the
/// kernel refuses to enumerate further and treats the simcall as invisible.
pub const DEFAULT_MAX_CONSIDER: usize = 4096;

/// Engine-wide configuration.
///
/// # Examples
///
/// ```rust
/// use simkern::config::EngineConfig;
///
/// let config = EngineConfig::default();
/// assert_eq!(config.max_consider, simkern::config::DEFAULT_MAX_CONSIDER);
///
/// let config = EngineConfig::builder()
///     .with_actor_capacity_hint(256)
///     .with_model_checker(true)
///     .build()
///     .unwrap();
/// assert!(config.model_checker_active);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity hint passed to the actor arena's backing `Vec` on creation.
    pub actor_capacity_hint: usize,

    /// Upper bound on `Observer::get_max_consider()` outcomes the kernel
    /// will enumerate for a single visible simcall.
    pub max_consider: usize,

    /// Whether the engine is running as a model-checker application side
    /// (spec §6.3). When `true`, `Comm::start()` defers to the next
    /// scheduler round instead of starting eagerly (spec §4.E).
    pub model_checker_active: bool,

    /// Seed for the `random(a, b)` visible simcall's RNG (spec §4.H, §5).
    /// Fixed rather than sourced from OS entropy: determinism requires two
    /// runs of the same user code and resource model to produce
    /// bit-identical timelines, and that includes whatever `random()` rolls.
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            actor_capacity_hint: DEFAULT_ACTOR_CAPACITY_HINT,
            max_consider: DEFAULT_MAX_CONSIDER,
            model_checker_active: false,
            seed: 0,
        }
    }
}

impl EngineConfig {
    /// Start a fluent builder seeded with the defaults above.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Validate configuration values, mirroring the teacher's
    /// `SystemConfig::validate`.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_consider == 0 {
            return Err("max_consider must be > 0".to_string());
        }
        Ok(())
    }
}

/// Fluent builder for [`EngineConfig`].
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Set the actor arena capacity hint.
    pub fn with_actor_capacity_hint(mut self, hint: usize) -> Self {
        self.config.actor_capacity_hint = hint;
        self
    }

    /// Set the maximum number of simcall outcomes considered per transition.
    pub fn with_max_consider(mut self, max: usize) -> Self {
        self.config.max_consider = max;
        self
    }

    /// Toggle model-checker mode.
    pub fn with_model_checker(mut self, active: bool) -> Self {
        self.config.model_checker_active = active;
        self
    }

    /// Seed the `random(a, b)` RNG.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Validate and produce the final [`EngineConfig`].
    pub fn build(self) -> Result<EngineConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_max_consider_is_rejected() {
        let result = EngineConfig::builder().with_max_consider(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn builder_chains_all_options() {
        let config = EngineConfig::builder()
            .with_actor_capacity_hint(10)
            .with_max_consider(5)
            .with_model_checker(true)
            .build()
            .unwrap();
        assert_eq!(config.actor_capacity_hint, 10);
        assert_eq!(config.max_consider, 5);
        assert!(config.model_checker_active);
    }

    #[test]
    fn serializes_to_json() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.max_consider, config.max_consider);
    }
}
