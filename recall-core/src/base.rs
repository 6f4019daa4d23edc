//! Core interfaces.
mod random;
mod replay_buffer;
mod step;
pub use random::RandomSource;
pub use replay_buffer::{ExperienceBufferBase, ReplayBufferBase};
pub use step::{Step, StepProcessor, StepStatus};
