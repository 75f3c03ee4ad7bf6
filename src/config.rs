//! Simulation configuration
//!
//! Built in code by hosts or loaded from YAML by the driver. Changing the
//! grid shape, the tape size, or the seed rebuilds the soup from scratch;
//! every other field can be swapped into a live run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How interaction partners are chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// Partner drawn from the ±2 toroidal neighborhood of the first cell.
    Spatial,
    /// Partner drawn uniformly from the rest of the grid.
    Global,
}

/// How `reset` fills the soup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedingMode {
    /// Uniform random bytes over [0, 255].
    Random,
    /// Uniform draw over the opcode alphabet plus the terminator.
    Balanced,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoupConfig {
    pub grid_width: usize,
    pub grid_height: usize,
    /// Per-cell tape size. Must be a power of two so the doubled
    /// interaction tape wraps with a bit mask.
    pub tape_size: usize,
    /// Probability per byte per epoch, in [0, 1].
    pub mutation_rate: f64,
    /// Interpreter cycle budget per interaction.
    pub instruction_limit: usize,
    pub topology: Topology,
    pub seeding: SeedingMode,
    pub seed: u32,
}

impl Default for SoupConfig {
    fn default() -> Self {
        Self {
            grid_width: 96,
            grid_height: 64,
            tape_size: 64,
            mutation_rate: 0.0002,
            instruction_limit: 8192,
            topology: Topology::Spatial,
            seeding: SeedingMode::Random,
            seed: 0,
        }
    }
}

/// Rejection reasons at construction or reconfiguration time. Nothing past
/// construction can fail.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("tape size {0} is not a power of two")]
    TapeSizeNotPowerOfTwo(usize),
    #[error("grid {width}x{height} with tape size {tape_size} holds no bytes")]
    EmptySoup {
        width: usize,
        height: usize,
        tape_size: usize,
    },
    #[error("mutation rate {0} is outside [0, 1]")]
    MutationRateOutOfRange(f64),
}

impl SoupConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_width == 0 || self.grid_height == 0 || self.tape_size == 0 {
            return Err(ConfigError::EmptySoup {
                width: self.grid_width,
                height: self.grid_height,
                tape_size: self.tape_size,
            });
        }
        if !self.tape_size.is_power_of_two() {
            return Err(ConfigError::TapeSizeNotPowerOfTwo(self.tape_size));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(ConfigError::MutationRateOutOfRange(self.mutation_rate));
        }
        Ok(())
    }

    /// Number of cells in the grid; one epoch is this many interactions.
    pub fn cell_count(&self) -> usize {
        self.grid_width * self.grid_height
    }

    /// Total soup buffer length in bytes.
    pub fn soup_len(&self) -> usize {
        self.cell_count() * self.tape_size
    }

    /// True when switching to `other` requires reallocating the buffers
    /// and reseeding.
    pub fn requires_reset(&self, other: &Self) -> bool {
        self.grid_width != other.grid_width
            || self.grid_height != other.grid_height
            || self.tape_size != other.tape_size
            || self.seed != other.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(SoupConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_non_power_of_two_tapes() {
        let config = SoupConfig {
            tape_size: 12,
            ..SoupConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::TapeSizeNotPowerOfTwo(12))
        );
    }

    #[test]
    fn rejects_empty_grids() {
        let config = SoupConfig {
            grid_width: 0,
            ..SoupConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptySoup { .. })
        ));
    }

    #[test]
    fn rejects_mutation_rates_outside_unit_interval() {
        let config = SoupConfig {
            mutation_rate: 1.5,
            ..SoupConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::MutationRateOutOfRange(1.5))
        );
        let config = SoupConfig {
            mutation_rate: -0.1,
            ..SoupConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn reset_trigger_tracks_shape_and_seed() {
        let base = SoupConfig::default();
        let mut other = base.clone();
        other.mutation_rate = 0.9;
        other.instruction_limit = 10;
        other.topology = Topology::Global;
        assert!(!base.requires_reset(&other));
        other.seed = 99;
        assert!(base.requires_reset(&other));
        let mut resized = base.clone();
        resized.tape_size = 128;
        assert!(base.requires_reset(&resized));
    }

    #[test]
    fn yaml_fills_missing_fields_with_defaults() {
        let config: SoupConfig = serde_yaml::from_str(
            "grid_width: 32\ntopology: global\nseeding: balanced\nseed: 7\n",
        )
        .unwrap();
        assert_eq!(config.grid_width, 32);
        assert_eq!(config.grid_height, SoupConfig::default().grid_height);
        assert_eq!(config.topology, Topology::Global);
        assert_eq!(config.seeding, SeedingMode::Balanced);
        assert_eq!(config.seed, 7);
    }

    #[test]
    fn yaml_round_trip_preserves_the_config() {
        let config = SoupConfig {
            tape_size: 16,
            mutation_rate: 0.01,
            topology: Topology::Global,
            ..SoupConfig::default()
        };
        let text = serde_yaml::to_string(&config).unwrap();
        let back: SoupConfig = serde_yaml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
