//! Configuration of [`TransitionBuffer`](super::TransitionBuffer).
use super::WeightNormalizer;
use crate::error::BufferError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of prioritized experience replay.
///
/// A transition with TD error $\delta$ gets priority
/// $(|\delta| + \epsilon)^\alpha$ and is sampled in proportion to it. The bias
/// is corrected by importance weights with exponent $\beta$.
///
/// # Examples
///
/// ```
/// use recall_core::{PerConfig, WeightNormalizer};
///
/// let config = PerConfig::default()
///     .alpha(0.6)
///     .beta(0.4)
///     .epsilon(1e-6)
///     .normalize(WeightNormalizer::All);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PerConfig {
    /// How strongly priorities follow TD errors. `0` means uniform sampling.
    pub alpha: f32,

    /// Exponent of importance weights, `0` for no correction and `1` for full
    /// correction. It can be changed on a live buffer with
    /// [`TransitionBuffer::set_beta`](super::TransitionBuffer::set_beta).
    pub beta: f32,

    /// Added to TD error magnitudes so that no transition starves.
    pub epsilon: f32,

    /// Normalization of importance weights.
    pub normalize: WeightNormalizer,
}

impl Default for PerConfig {
    fn default() -> Self {
        Self {
            alpha: 0.6,
            beta: 0.4,
            epsilon: f32::EPSILON,
            normalize: WeightNormalizer::All,
        }
    }
}

impl PerConfig {
    /// Sets the prioritization exponent `alpha`.
    ///
    /// # Arguments
    ///
    /// * `alpha` - The new value for the prioritization exponent
    ///
    /// # Returns
    ///
    /// The modified configuration
    pub fn alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    /// Sets the importance sampling exponent `beta`.
    ///
    /// # Arguments
    ///
    /// * `beta` - The new value for the importance sampling exponent
    ///
    /// # Returns
    ///
    /// The modified configuration
    pub fn beta(mut self, beta: f32) -> Self {
        self.beta = beta;
        self
    }

    /// Sets `epsilon`.
    ///
    /// # Arguments
    ///
    /// * `epsilon` - The new offset added to TD error magnitudes
    ///
    /// # Returns
    ///
    /// The modified configuration
    pub fn epsilon(mut self, epsilon: f32) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Sets the method for normalizing importance weights.
    ///
    /// # Arguments
    ///
    /// * `normalize` - The new normalization method
    ///
    /// # Returns
    ///
    /// The modified configuration
    pub fn normalize(mut self, normalize: WeightNormalizer) -> Self {
        self.normalize = normalize;
        self
    }

    /// Checks the ranges of the parameters.
    ///
    /// `epsilon` must be positive so that every priority is positive and
    /// importance weights stay finite.
    pub fn validate(&self) -> Result<(), BufferError> {
        if !(self.alpha >= 0.0 && self.alpha.is_finite()) {
            return Err(BufferError::InvalidParameter(format!("alpha = {}", self.alpha)));
        }
        validate_beta(self.beta)?;
        if !(self.epsilon > 0.0 && self.epsilon.is_finite()) {
            return Err(BufferError::InvalidParameter(format!(
                "epsilon = {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

pub(super) fn validate_beta(beta: f32) -> Result<(), BufferError> {
    if beta >= 0.0 && beta.is_finite() {
        Ok(())
    } else {
        Err(BufferError::InvalidParameter(format!("beta = {}", beta)))
    }
}

/// How a buffer hands out transitions. Fixed for the lifetime of the buffer.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum BufferMode {
    /// FIFO retrieval with [`pop`](super::TransitionBuffer::pop), for
    /// on-policy learners consuming each transition once.
    Sequential,

    /// Uniform sampling with replacement with
    /// [`sample`](super::TransitionBuffer::sample).
    Uniform,

    /// Priority-weighted sampling with
    /// [`sample_prioritized`](super::TransitionBuffer::sample_prioritized).
    Prioritized(PerConfig),
}

impl BufferMode {
    /// Name of the mode, used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            BufferMode::Sequential => "sequential",
            BufferMode::Uniform => "uniform",
            BufferMode::Prioritized(_) => "prioritized",
        }
    }
}

/// Configuration of [`TransitionBuffer`](super::TransitionBuffer).
///
/// # Examples
///
/// ```
/// use recall_core::{BufferMode, PerConfig, TransitionBufferConfig};
///
/// let config = TransitionBufferConfig::default()
///     .capacity(1000)
///     .seed(42)
///     .mode(BufferMode::Prioritized(PerConfig::default()));
///
/// // The sum tree needs a power-of-two number of leaves.
/// assert_eq!(config.effective_capacity(), 1024);
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TransitionBufferConfig {
    /// Maximum number of transitions. When the buffer is full, new
    /// transitions replace the oldest ones.
    pub capacity: usize,

    /// Random seed used for sampling transitions.
    pub seed: u64,

    /// Whether transitions carry the action taken at the next state, as
    /// required by SARSA-family learners.
    pub next_act: bool,

    /// Retrieval mode.
    pub mode: BufferMode,
}

impl Default for TransitionBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 10000,
            seed: 42,
            next_act: false,
            mode: BufferMode::Uniform,
        }
    }
}

impl TransitionBufferConfig {
    /// Sets the capacity of the buffer.
    ///
    /// # Arguments
    ///
    /// * `capacity` - The new maximum number of transitions
    ///
    /// # Returns
    ///
    /// The modified configuration
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the random seed for sampling.
    ///
    /// # Arguments
    ///
    /// * `seed` - The new random seed
    ///
    /// # Returns
    ///
    /// The modified configuration
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets whether transitions carry the next action.
    ///
    /// # Arguments
    ///
    /// * `next_act` - Whether the buffer stores next actions
    ///
    /// # Returns
    ///
    /// The modified configuration
    pub fn next_act(mut self, next_act: bool) -> Self {
        self.next_act = next_act;
        self
    }

    /// Sets the retrieval mode.
    ///
    /// # Arguments
    ///
    /// * `mode` - The new retrieval mode
    ///
    /// # Returns
    ///
    /// The modified configuration
    pub fn mode(mut self, mode: BufferMode) -> Self {
        self.mode = mode;
        self
    }

    /// Capacity of a buffer built from this configuration. In prioritized mode
    /// it is rounded up to a power of two, at least 2.
    pub fn effective_capacity(&self) -> usize {
        match self.mode {
            BufferMode::Prioritized(_) => self.capacity.max(2).next_power_of_two(),
            _ => self.capacity,
        }
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_effective_capacity() {
        let config = TransitionBufferConfig::default().capacity(5);
        assert_eq!(config.effective_capacity(), 5);

        let config = config.mode(BufferMode::Prioritized(PerConfig::default()));
        assert_eq!(config.effective_capacity(), 8);
        assert_eq!(config.clone().capacity(1).effective_capacity(), 2);
        assert_eq!(config.capacity(16).effective_capacity(), 16);
    }

    #[test]
    fn test_validate() {
        assert!(PerConfig::default().validate().is_ok());
        assert!(PerConfig::default().alpha(0.0).validate().is_ok());
        assert!(PerConfig::default().alpha(-1.0).validate().is_err());
        assert!(PerConfig::default().beta(f32::NAN).validate().is_err());
        assert!(PerConfig::default().epsilon(0.0).validate().is_err());
    }

    #[test]
    fn test_serde_config() -> Result<()> {
        let config = TransitionBufferConfig::default()
            .capacity(100)
            .seed(7)
            .next_act(true)
            .mode(BufferMode::Prioritized(
                PerConfig::default()
                    .alpha(0.7)
                    .beta(0.5)
                    .normalize(WeightNormalizer::Batch),
            ));

        let dir = TempDir::new("transition_buffer_config")?;
        let path = dir.path().join("transition_buffer_config.yaml");
        config.save(&path)?;
        let config_ = TransitionBufferConfig::load(&path)?;
        assert_eq!(config, config_);

        let config = TransitionBufferConfig::default().mode(BufferMode::Sequential);
        config.save(&path)?;
        assert_eq!(config, TransitionBufferConfig::load(&path)?);
        Ok(())
    }
}
