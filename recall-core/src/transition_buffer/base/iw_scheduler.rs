//! Scheduling the exponent of importance weights for PER.
use super::TransitionBuffer;
use crate::{error::BufferError, RandomSource};
use serde::{Deserialize, Serialize};

/// Linear annealing of the exponent $\beta$ of importance weights.
///
/// $\beta$ grows from `beta_0` to `beta_final` over `n_steps_final` steps and
/// stays there afterwards.
///
/// # Examples
///
/// ```
/// use recall_core::IwScheduler;
///
/// let mut scheduler = IwScheduler::new(0.4, 1.0, 3);
/// assert_eq!(scheduler.step(), 0.4);
/// assert_eq!(scheduler.step(), 0.6);
/// assert_eq!(scheduler.step(), 0.8);
/// assert_eq!(scheduler.step(), 1.0);
/// assert_eq!(scheduler.step(), 1.0);
/// ```
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct IwScheduler {
    /// Initial value of $\beta$.
    pub beta_0: f32,

    /// Final value of $\beta$.
    pub beta_final: f32,

    /// Steps at which $\beta$ reaches its final value.
    pub n_steps_final: usize,

    /// Current steps.
    pub n_steps: usize,
}

impl IwScheduler {
    /// Creates a scheduler.
    pub fn new(beta_0: f32, beta_final: f32, n_steps_final: usize) -> Self {
        Self {
            beta_0,
            beta_final,
            n_steps_final,
            n_steps: 0,
        }
    }

    /// Current value of $\beta$.
    pub fn beta(&self) -> f32 {
        if self.n_steps >= self.n_steps_final {
            self.beta_final
        } else {
            let d = (self.beta_final - self.beta_0) as f64;
            let r = self.n_steps as f64 / self.n_steps_final as f64;
            (self.beta_0 as f64 + d * r) as f32
        }
    }

    /// Returns the current value of $\beta$ and advances one step.
    pub fn step(&mut self) -> f32 {
        let beta = self.beta();
        self.n_steps += 1;
        beta
    }

    /// Sets the current $\beta$ on a prioritized buffer and advances one step.
    pub fn apply<S, A, R>(&mut self, buffer: &mut TransitionBuffer<S, A, R>) -> Result<f32, BufferError>
    where
        R: RandomSource,
    {
        let beta = self.beta();
        buffer.set_beta(beta)?;
        self.n_steps += 1;
        Ok(beta)
    }
}
