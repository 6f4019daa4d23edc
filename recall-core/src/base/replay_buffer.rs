//! Replay buffer interface.
//!
//! A trainer drives buffers through two seams: one for storing experiences
//! every environment step and one for drawing batches at optimization steps.
use anyhow::Result;

/// Interface for buffers that store experiences from environments.
///
/// # Examples
///
/// ```ignore
/// let tr = Transition::new(obs, act, reward, next_obs, 0.99);
/// buffer.push(tr)?;
/// assert!(buffer.len() <= buffer.capacity());
/// ```
pub trait ExperienceBufferBase {
    /// The type of items stored in the buffer.
    type Item;

    /// Pushes a new experience into the buffer, evicting the oldest one when
    /// the buffer is full.
    fn push(&mut self, tr: Self::Item) -> Result<()>;

    /// Returns the current number of experiences in the buffer.
    fn len(&self) -> usize;

    /// Returns `true` if the buffer holds no experience.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Interface for replay buffers that generate batches for training.
///
/// This trait is independent of [`ExperienceBufferBase`]: a learner only
/// needs batches and a way to feed TD errors back.
pub trait ReplayBufferBase {
    /// Configuration parameters for the replay buffer.
    type Config: Clone;

    /// The type of batch generated for training.
    type Batch;

    /// Builds a new replay buffer from the given configuration.
    fn build(config: &Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Constructs a batch of `size` experiences for training.
    fn batch(&mut self, size: usize) -> Result<Self::Batch>;

    /// Updates the priorities of experiences in the buffer.
    ///
    /// `ixs` are the sample indices carried by a batch and `td_errs` the
    /// corresponding TD errors. Buffers without priorities accept `None` for
    /// both and ignore the call.
    fn update_priority(&mut self, ixs: &Option<Vec<usize>>, td_errs: &Option<Vec<f32>>)
        -> Result<()>;
}
