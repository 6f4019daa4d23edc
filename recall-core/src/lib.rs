#![warn(missing_docs)]
//! Experience buffers for reinforcement learning.
//!
//! [`TransitionBuffer`] stores transitions in a fixed-capacity ring and serves
//! them FIFO, by uniform sampling, or by prioritized sampling backed by a sum
//! tree. [`MultiStepProcessor`] turns the steps of an agent loop into n-step
//! transitions with [`MultiStepAccumulator`].
pub mod error;

mod base;
pub use base::{
    ExperienceBufferBase, RandomSource, ReplayBufferBase, Step, StepProcessor, StepStatus,
};

mod multi_step;
pub use multi_step::{MultiStepAccumulator, PendingTransition};

mod transition_buffer;
pub use transition_buffer::{
    BufferMode, IwScheduler, MultiStepProcessor, MultiStepProcessorConfig, PerConfig, Transition,
    TransitionBatch, TransitionBuffer, TransitionBufferConfig, WeightNormalizer,
};
