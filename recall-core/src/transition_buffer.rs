//! Transition buffer for on-policy and off-policy learners.
//!
//! This module provides a circular buffer that stores transitions of
//! arbitrary state and action types and hands them out in one of three modes.
//!
//! # Key Components
//!
//! - [`TransitionBuffer`]: The buffer, in sequential, uniform or prioritized mode
//! - [`TransitionBatch`]: Transitions gathered from the buffer
//! - [`MultiStepProcessor`]: Converts environment steps into n-step transitions
//! - [`IwScheduler`]: Anneals the exponent of importance weights
//!
//! # Examples
//!
//! ```
//! use recall_core::{
//!     BufferMode, IwScheduler, MultiStepProcessor, MultiStepProcessorConfig, PerConfig,
//!     ReplayBufferBase, ExperienceBufferBase, Step, StepProcessor, StepStatus,
//!     TransitionBuffer, TransitionBufferConfig,
//! };
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = TransitionBufferConfig::default()
//!     .capacity(1000)
//!     .mode(BufferMode::Prioritized(PerConfig::default()));
//! let mut buffer = TransitionBuffer::<f32, usize>::build(&config)?;
//! let mut processor =
//!     MultiStepProcessor::build(&MultiStepProcessorConfig::default().n_steps(3))?;
//! let mut scheduler = IwScheduler::new(0.4, 1.0, 100);
//!
//! processor.reset(0.0);
//! for t in 0..20 {
//!     let status = if t == 19 { StepStatus::Terminated } else { StepStatus::Running };
//!     let step = Step::new(t % 2, t as f32 + 1.0, 1.0, status);
//!     for tr in processor.process(step)? {
//!         buffer.push(tr)?;
//!     }
//! }
//! assert_eq!(buffer.len(), 20);
//!
//! scheduler.apply(&mut buffer)?;
//! let batch = buffer.batch(8)?;
//! let td_errs = vec![0.5; batch.len()];
//! buffer.update_priority(&batch.ix_sample, &Some(td_errs))?;
//! # Ok(())
//! # }
//! ```
mod base;
mod batch;
mod config;
mod step_proc;
pub use base::{IwScheduler, TransitionBuffer, WeightNormalizer};
pub use batch::{Transition, TransitionBatch};
pub use config::{BufferMode, PerConfig, TransitionBufferConfig};
pub use step_proc::{MultiStepProcessor, MultiStepProcessorConfig};
