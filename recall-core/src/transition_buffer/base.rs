//! Fixed-capacity circular transition buffer.
//!
//! The buffer stores transitions of arbitrary state and action types in
//! parallel columns and hands them out in one of three modes:
//! - FIFO retrieval for on-policy learners
//! - uniform experience replay
//! - prioritized experience replay (PER) backed by a sum tree
mod iw_scheduler;
mod sum_tree;
use super::{
    config::{validate_beta, BufferMode, PerConfig},
    Transition, TransitionBatch, TransitionBufferConfig,
};
use crate::{error::BufferError, ExperienceBufferBase, RandomSource, ReplayBufferBase};
use anyhow::{anyhow, Result};
pub use iw_scheduler::IwScheduler;
use log::{debug, info, trace};
use rand::rngs::StdRng;
use sum_tree::SumTree;
pub use sum_tree::WeightNormalizer;

/// State of prioritized experience replay.
struct PerState {
    sum_tree: SumTree,
    alpha: f32,
    beta: f32,
    epsilon: f32,
    normalize: WeightNormalizer,
}

impl PerState {
    fn new(capacity: usize, per_config: &PerConfig) -> Self {
        Self {
            sum_tree: SumTree::new(capacity),
            alpha: per_config.alpha,
            beta: per_config.beta,
            epsilon: per_config.epsilon,
            normalize: per_config.normalize,
        }
    }
}

enum Sampling {
    Sequential,
    Uniform,
    Prioritized(PerState),
}

impl Sampling {
    fn name(&self) -> &'static str {
        match self {
            Sampling::Sequential => "sequential",
            Sampling::Uniform => "uniform",
            Sampling::Prioritized(_) => "prioritized",
        }
    }
}

/// Writes `v` at `ix`, growing the column while the buffer fills for the
/// first time.
#[inline]
fn put<T>(column: &mut Vec<T>, ix: usize, v: T) {
    if ix == column.len() {
        column.push(v);
    } else {
        column[ix] = v;
    }
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// A fixed-capacity circular buffer of transitions.
///
/// Stored transitions occupy the slots `[begin, begin + len) mod capacity`.
/// [`append`](Self::append) writes at the end of this window; when the
/// buffer is full it overwrites the oldest transition.
///
/// The buffer works in the [`BufferMode`] it was built with:
///
/// | mode          | retrieval                                  | priorities |
/// |---------------|--------------------------------------------|------------|
/// | `Sequential`  | [`pop`](Self::pop)                         | no         |
/// | `Uniform`     | [`sample`](Self::sample)                   | no         |
/// | `Prioritized` | [`sample_prioritized`](Self::sample_prioritized) | yes  |
///
/// Calling the retrieval of another mode returns
/// [`BufferError::ModeMismatch`].
///
/// In prioritized mode the capacity is rounded up to a power of two, and
/// a new transition gets the largest priority seen so far so that it is
/// replayed soon after being stored.
///
/// # Interaction of objects
///
/// ```mermaid
/// graph LR
///     A[Agent loop]-->|"Step&lt;S, A&gt;"|B[MultiStepProcessor]
///     B -->|Transition|C[TransitionBuffer]
///     C -->|TransitionBatch|D[Learner]
///     D -->|TD errors|C
/// ```
///
/// # Examples
///
/// ```
/// use recall_core::{
///     BufferMode, PerConfig, Transition, TransitionBatch, TransitionBuffer,
///     TransitionBufferConfig,
/// };
///
/// let config = TransitionBufferConfig::default()
///     .capacity(6)
///     .mode(BufferMode::Prioritized(PerConfig::default()));
/// let mut buffer = TransitionBuffer::<[f32; 2], usize>::new(&config).unwrap();
/// assert_eq!(buffer.capacity(), 8);
///
/// for t in 0..10 {
///     let s = [t as f32, 0.0];
///     let s_next = [t as f32 + 1.0, 0.0];
///     buffer.append(Transition::new(s, t % 2, 1.0, s_next, 0.99)).unwrap();
/// }
///
/// let mut batch = TransitionBatch::with_capacity(4);
/// buffer.sample_prioritized(4, 0.4, &mut batch).unwrap();
/// let ixs = batch.ix_sample.clone().unwrap();
/// buffer.update_priorities(&ixs, &[0.5, 0.1, 2.0, 0.3]).unwrap();
/// ```
pub struct TransitionBuffer<S, A, R = StdRng> {
    capacity: usize,

    /// Slot of the oldest stored transition.
    begin: usize,

    /// Slot the next transition is written to.
    end: usize,

    /// Number of stored transitions.
    size: usize,

    obs: Vec<S>,
    act: Vec<A>,
    reward: Vec<f32>,
    next_obs: Vec<S>,
    next_discount: Vec<f32>,
    next_act: Option<Vec<A>>,

    rng: R,
    sampling: Sampling,
}

impl<S, A> TransitionBuffer<S, A, StdRng> {
    /// Builds a buffer sampling with [`StdRng`] seeded from `config.seed`.
    pub fn new(config: &TransitionBufferConfig) -> Result<Self, BufferError> {
        Self::with_rng(config, <StdRng as RandomSource>::seeded(config.seed))
    }
}

impl<S, A, R> TransitionBuffer<S, A, R>
where
    R: RandomSource,
{
    /// Builds a buffer drawing its samples from `rng`. `config.seed` is
    /// ignored.
    pub fn with_rng(config: &TransitionBufferConfig, rng: R) -> Result<Self, BufferError> {
        if config.capacity == 0 {
            return Err(BufferError::ZeroCapacity);
        }
        let capacity = config.effective_capacity();
        let sampling = match &config.mode {
            BufferMode::Sequential => Sampling::Sequential,
            BufferMode::Uniform => Sampling::Uniform,
            BufferMode::Prioritized(per_config) => {
                per_config.validate()?;
                Sampling::Prioritized(PerState::new(capacity, per_config))
            }
        };
        info!(
            "Construct transition buffer with capacity = {} in {} mode",
            capacity,
            config.mode.name()
        );

        Ok(Self {
            capacity,
            begin: 0,
            end: 0,
            size: 0,
            obs: Vec::with_capacity(capacity),
            act: Vec::with_capacity(capacity),
            reward: Vec::with_capacity(capacity),
            next_obs: Vec::with_capacity(capacity),
            next_discount: Vec::with_capacity(capacity),
            next_act: if config.next_act {
                Some(Vec::with_capacity(capacity))
            } else {
                None
            },
            rng,
            sampling,
        })
    }

    /// Maximum number of stored transitions.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of stored transitions.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if no transition is stored.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns `true` if the next append evicts the oldest transition.
    pub fn is_full(&self) -> bool {
        self.size == self.capacity
    }

    /// Name of the buffer's mode.
    pub fn mode(&self) -> &'static str {
        self.sampling.name()
    }

    /// Returns `true` if transitions carry the next action.
    pub fn stores_next_act(&self) -> bool {
        self.next_act.is_some()
    }

    fn mode_mismatch(&self, operation: &'static str) -> BufferError {
        BufferError::ModeMismatch {
            operation,
            mode: self.sampling.name(),
        }
    }

    fn check_batch_size(&self, batch_size: usize) -> Result<(), BufferError> {
        if batch_size == 0 {
            Err(BufferError::ZeroBatchSize)
        } else if batch_size > self.size {
            Err(BufferError::InsufficientTransitions {
                requested: batch_size,
                available: self.size,
            })
        } else {
            Ok(())
        }
    }

    /// Returns `true` if slot `ix` holds a stored transition.
    fn is_live(&self, ix: usize) -> bool {
        ix < self.capacity && (ix + self.capacity - self.begin) % self.capacity < self.size
    }

    /// Stores a transition and returns the slot it was written to.
    ///
    /// The transition must carry a next action if and only if the buffer was
    /// configured with `next_act`.
    pub fn append(&mut self, tr: Transition<S, A>) -> Result<usize, BufferError> {
        if tr.next_act.is_some() != self.next_act.is_some() {
            return Err(BufferError::NextActionMismatch {
                expected: self.next_act.is_some(),
            });
        }
        trace!("TransitionBuffer::append()");

        let ix = self.end;
        let Transition {
            obs,
            act,
            reward,
            next_obs,
            next_discount,
            next_act,
        } = tr;
        put(&mut self.obs, ix, obs);
        put(&mut self.act, ix, act);
        put(&mut self.reward, ix, reward);
        put(&mut self.next_obs, ix, next_obs);
        put(&mut self.next_discount, ix, next_discount);
        if let (Some(column), Some(a)) = (self.next_act.as_mut(), next_act) {
            put(column, ix, a);
        }

        if let Sampling::Prioritized(per_state) = &mut self.sampling {
            let max_p = per_state.sum_tree.max();
            per_state.sum_tree.update(ix, max_p);
        }

        self.end = (self.end + 1) % self.capacity;
        if self.size < self.capacity {
            self.size += 1;
        } else {
            if let Sampling::Sequential = self.sampling {
                debug!("Evicted an unconsumed transition at slot {}", self.begin);
            }
            self.begin = (self.begin + 1) % self.capacity;
        }
        debug_assert_eq!((self.begin + self.size) % self.capacity, self.end);

        Ok(ix)
    }

    /// Returns a copy of the transition stored at slot `ix`.
    pub fn transition(&self, ix: usize) -> Option<Transition<S, A>>
    where
        S: Clone,
        A: Clone,
    {
        if !self.is_live(ix) {
            return None;
        }
        Some(Transition {
            obs: self.obs[ix].clone(),
            act: self.act[ix].clone(),
            reward: self.reward[ix],
            next_obs: self.next_obs[ix].clone(),
            next_discount: self.next_discount[ix],
            next_act: self.next_act.as_ref().map(|a| a[ix].clone()),
        })
    }

    /// Copies the transitions at slots `ixs` into `out`.
    fn gather(&self, ixs: &[usize], out: &mut TransitionBatch<S, A>)
    where
        S: Clone,
        A: Clone,
    {
        out.clear();
        match (&self.next_act, &out.next_act) {
            (Some(_), None) => out.next_act = Some(Vec::with_capacity(ixs.len())),
            (None, Some(_)) => out.next_act = None,
            _ => {}
        }

        for &ix in ixs {
            out.obs.push(self.obs[ix].clone());
            out.act.push(self.act[ix].clone());
            out.reward.push(self.reward[ix]);
            out.next_obs.push(self.next_obs[ix].clone());
            out.next_discount.push(self.next_discount[ix]);
            if let (Some(src), Some(dst)) = (self.next_act.as_ref(), out.next_act.as_mut()) {
                dst.push(src[ix].clone());
            }
        }
    }

    /// Takes the oldest `batch_size` transitions in FIFO order and removes
    /// them from the buffer. Sequential mode only.
    pub fn pop(
        &mut self,
        batch_size: usize,
        out: &mut TransitionBatch<S, A>,
    ) -> Result<(), BufferError>
    where
        S: Clone,
        A: Clone,
    {
        if !matches!(self.sampling, Sampling::Sequential) {
            return Err(self.mode_mismatch("pop"));
        }
        self.check_batch_size(batch_size)?;

        let ixs = (0..batch_size)
            .map(|i| (self.begin + i) % self.capacity)
            .collect::<Vec<_>>();
        self.gather(&ixs, out);

        self.begin = (self.begin + batch_size) % self.capacity;
        self.size -= batch_size;
        debug_assert_eq!((self.begin + self.size) % self.capacity, self.end);
        Ok(())
    }

    /// Samples `batch_size` transitions uniformly with replacement. Uniform
    /// mode only.
    ///
    /// Indices are drawn from the window of stored transitions, so sampling
    /// stays uniform after the buffer wraps around.
    pub fn sample(
        &mut self,
        batch_size: usize,
        out: &mut TransitionBatch<S, A>,
    ) -> Result<(), BufferError>
    where
        S: Clone,
        A: Clone,
    {
        if !matches!(self.sampling, Sampling::Uniform) {
            return Err(self.mode_mismatch("sample"));
        }
        self.check_batch_size(batch_size)?;

        let (begin, size, capacity) = (self.begin, self.size, self.capacity);
        let rng = &mut self.rng;
        let ixs = (0..batch_size)
            .map(|_| (begin + rng.below(size)) % capacity)
            .collect::<Vec<_>>();
        self.gather(&ixs, out);
        out.ix_sample = Some(ixs);
        Ok(())
    }

    /// Samples `batch_size` transitions with probabilities proportional to
    /// their priorities. Prioritized mode only.
    ///
    /// `out.ix_sample` receives the slot indices to be passed to
    /// [`update_priorities`](Self::update_priorities) and `out.weight` the
    /// importance weights computed with exponent `beta`.
    pub fn sample_prioritized(
        &mut self,
        batch_size: usize,
        beta: f32,
        out: &mut TransitionBatch<S, A>,
    ) -> Result<(), BufferError>
    where
        S: Clone,
        A: Clone,
    {
        let per_state = match &self.sampling {
            Sampling::Prioritized(per_state) => per_state,
            _ => return Err(self.mode_mismatch("sample_prioritized")),
        };
        validate_beta(beta)?;
        self.check_batch_size(batch_size)?;

        let (ixs, ws) = per_state.sum_tree.sample(
            &mut self.rng,
            self.size,
            batch_size,
            beta,
            per_state.normalize,
        );
        self.gather(&ixs, out);
        out.ix_sample = Some(ixs);
        out.weight = Some(ws);
        Ok(())
    }

    /// Sets the priorities of the transitions at slots `ixs` from their TD
    /// errors, $p = (|\delta| + \epsilon)^\alpha$. Prioritized mode only.
    ///
    /// Either all priorities are updated or, on error, none of them. A
    /// priority that is not positive and finite is rejected, so importance
    /// weights stay finite.
    pub fn update_priorities(&mut self, ixs: &[usize], td_errs: &[f32]) -> Result<(), BufferError> {
        if ixs.len() != td_errs.len() {
            return Err(BufferError::LengthMismatch {
                ixs: ixs.len(),
                td_errs: td_errs.len(),
            });
        }
        let size = self.size;
        let mode = self.sampling.name();
        let per_state = match &mut self.sampling {
            Sampling::Prioritized(per_state) => per_state,
            _ => {
                return Err(BufferError::ModeMismatch {
                    operation: "update_priorities",
                    mode,
                })
            }
        };

        let (alpha, epsilon) = (per_state.alpha, per_state.epsilon);
        let priorities = ixs
            .iter()
            .zip(td_errs.iter())
            .map(|(&ix, &td_err)| {
                if ix >= size {
                    return Err(BufferError::IndexOutOfRange { index: ix, size });
                }
                let p = (td_err.abs() + epsilon).powf(alpha);
                if p.is_finite() && p > 0.0 {
                    Ok(p)
                } else {
                    Err(BufferError::InvalidPriority(p))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (&ix, p) in ixs.iter().zip(priorities) {
            per_state.sum_tree.update(ix, p);
        }
        Ok(())
    }

    /// Current exponent of importance weights, in prioritized mode.
    pub fn beta(&self) -> Option<f32> {
        match &self.sampling {
            Sampling::Prioritized(per_state) => Some(per_state.beta),
            _ => None,
        }
    }

    /// Sets the exponent of importance weights used by
    /// [`ReplayBufferBase::batch`]. Prioritized mode only.
    pub fn set_beta(&mut self, beta: f32) -> Result<(), BufferError> {
        validate_beta(beta)?;
        let mode = self.sampling.name();
        match &mut self.sampling {
            Sampling::Prioritized(per_state) => {
                per_state.beta = beta;
                Ok(())
            }
            _ => Err(BufferError::ModeMismatch {
                operation: "set_beta",
                mode,
            }),
        }
    }

    fn per_state(&self) -> Option<&PerState> {
        match &self.sampling {
            Sampling::Prioritized(per_state) => Some(per_state),
            _ => None,
        }
    }

    /// Priority of slot `ix`; `0` for slots never written.
    pub fn priority(&self, ix: usize) -> Option<f32> {
        let per_state = self.per_state()?;
        if ix < self.capacity {
            Some(per_state.sum_tree.priority(ix))
        } else {
            None
        }
    }

    /// Sum of the priorities of all slots.
    pub fn total_priority(&self) -> Option<f64> {
        self.per_state().map(|per_state| per_state.sum_tree.total())
    }

    /// Smallest priority among stored transitions.
    pub fn min_priority(&self) -> Option<f32> {
        let per_state = self.per_state()?;
        if self.size == 0 {
            None
        } else {
            Some(per_state.sum_tree.min(self.size))
        }
    }

    /// Priority given to newly stored transitions.
    pub fn max_priority(&self) -> Option<f32> {
        self.per_state().map(|per_state| per_state.sum_tree.max())
    }
}

impl<S, A, R> ExperienceBufferBase for TransitionBuffer<S, A, R>
where
    R: RandomSource,
{
    type Item = Transition<S, A>;

    fn len(&self) -> usize {
        self.size
    }

    fn push(&mut self, tr: Self::Item) -> Result<()> {
        self.append(tr)?;
        Ok(())
    }
}

impl<S, A, R> ReplayBufferBase for TransitionBuffer<S, A, R>
where
    S: Clone,
    A: Clone,
    R: RandomSource,
{
    type Config = TransitionBufferConfig;
    type Batch = TransitionBatch<S, A>;

    fn build(config: &Self::Config) -> Result<Self> {
        Ok(Self::with_rng(config, R::seeded(config.seed))?)
    }

    /// Retrieves a batch with the buffer's mode: FIFO in sequential mode,
    /// uniform sampling in uniform mode and prioritized sampling with the
    /// current `beta` in prioritized mode.
    fn batch(&mut self, size: usize) -> Result<Self::Batch> {
        let mut batch = TransitionBatch::with_capacity(size);
        match self.sampling {
            Sampling::Sequential => self.pop(size, &mut batch)?,
            Sampling::Uniform => self.sample(size, &mut batch)?,
            Sampling::Prioritized(ref per_state) => {
                let beta = per_state.beta;
                self.sample_prioritized(size, beta, &mut batch)?
            }
        }
        Ok(batch)
    }

    fn update_priority(&mut self, ixs: &Option<Vec<usize>>, td_errs: &Option<Vec<f32>>) -> Result<()> {
        if ixs.is_none() && td_errs.is_none() && self.per_state().is_none() {
            return Ok(());
        }
        let ixs = ixs
            .as_ref()
            .ok_or_else(|| anyhow!("ixs should be Some(_) in update_priority()"))?;
        let td_errs = td_errs
            .as_ref()
            .ok_or_else(|| anyhow!("td_errs should be Some(_) in update_priority()"))?;
        self.update_priorities(ixs, td_errs)?;
        Ok(())
    }
}
