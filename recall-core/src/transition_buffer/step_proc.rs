//! Conversion of environment steps into (multi-step) transitions.
use super::Transition;
use crate::{
    error::BufferError, MultiStepAccumulator, PendingTransition, Step, StepProcessor, StepStatus,
};
use anyhow::Result;
use log::debug;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`MultiStepProcessor`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct MultiStepProcessorConfig {
    /// Number of steps `n` of the bootstrapped return. `1` gives ordinary
    /// one-step transitions.
    pub n_steps: usize,

    /// Discount factor.
    pub discount: f32,
}

impl Default for MultiStepProcessorConfig {
    fn default() -> Self {
        Self {
            n_steps: 1,
            discount: 0.99,
        }
    }
}

impl MultiStepProcessorConfig {
    /// Sets the number of steps of the bootstrapped return.
    ///
    /// # Arguments
    ///
    /// * `n_steps` - The new number of steps `n`
    ///
    /// # Returns
    ///
    /// The modified configuration
    pub fn n_steps(mut self, n_steps: usize) -> Self {
        self.n_steps = n_steps;
        self
    }

    /// Sets the discount factor.
    ///
    /// # Arguments
    ///
    /// * `discount` - The new discount factor, in `[0, 1]`
    ///
    /// # Returns
    ///
    /// The modified configuration
    pub fn discount(mut self, discount: f32) -> Self {
        self.discount = discount;
        self
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

/// Turns [`Step`]s of a single environment into n-step transitions.
///
/// A transition starting at `s_t` is emitted once `s_t+n` is observed, with
/// reward $\sum_{k<n} \gamma^k r_{t+k}$ and bootstrap discount $\gamma^n$.
/// When an episode ends, the transitions of its last steps are emitted with
/// the final state as their next state. A terminal step zeroes the bootstrap
/// discount of all of them; a truncated one does not.
///
/// # Examples
///
/// ```
/// use recall_core::{
///     MultiStepProcessor, MultiStepProcessorConfig, Step, StepProcessor, StepStatus,
/// };
///
/// let config = MultiStepProcessorConfig::default().n_steps(2).discount(0.5);
/// let mut processor = MultiStepProcessor::<i32, u8>::build(&config).unwrap();
/// processor.reset(0);
///
/// assert!(processor.process(Step::new(0, 1, 1.0, StepStatus::Running)).unwrap().is_empty());
/// let trs = processor.process(Step::new(1, 2, 2.0, StepStatus::Running)).unwrap();
/// assert_eq!(trs.len(), 1);
/// assert_eq!((trs[0].obs, trs[0].next_obs), (0, 2));
/// assert_eq!(trs[0].reward, 2.0);
/// assert_eq!(trs[0].next_discount, 0.25);
/// ```
pub struct MultiStepProcessor<S, A> {
    discount: f32,
    accumulator: MultiStepAccumulator<S, A>,

    /// State the next step starts from.
    prev_obs: Option<S>,
}

impl<S, A> MultiStepProcessor<S, A>
where
    S: Clone,
    A: Clone,
{
    /// Number of steps of the bootstrapped return.
    pub fn n_steps(&self) -> usize {
        self.accumulator.horizon()
    }

    fn to_transition(p: &PendingTransition<S, A>, next_obs: &S, next_act: &Option<A>) -> Transition<S, A> {
        Transition {
            obs: p.state.clone(),
            act: p.action.clone(),
            reward: p.acc_reward,
            next_obs: next_obs.clone(),
            next_discount: p.acc_discount,
            next_act: next_act.clone(),
        }
    }
}

impl<S, A> StepProcessor<S, A> for MultiStepProcessor<S, A>
where
    S: Clone,
    A: Clone,
{
    type Config = MultiStepProcessorConfig;
    type Output = Vec<Transition<S, A>>;

    fn build(config: &Self::Config) -> Result<Self> {
        if !(0.0..=1.0).contains(&config.discount) {
            return Err(BufferError::InvalidParameter(format!("discount = {}", config.discount)).into());
        }
        Ok(Self {
            discount: config.discount,
            accumulator: MultiStepAccumulator::new(config.n_steps)?,
            prev_obs: None,
        })
    }

    fn reset(&mut self, init_obs: S) {
        self.accumulator.reset();
        self.prev_obs = Some(init_obs);
    }

    /// Appends a step and returns the transitions it completes.
    ///
    /// If the step ends the episode without `init_obs`, [`reset`](Self::reset)
    /// has to be called before the next step.
    fn process(&mut self, step: Step<S, A>) -> Result<Self::Output> {
        let obs = self.prev_obs.take().ok_or(BufferError::NotReset)?;
        let Step {
            act,
            obs: next_obs,
            reward,
            status,
            next_act,
            init_obs,
        } = step;
        let discount = match status {
            StepStatus::Terminated => 0.0,
            _ => self.discount,
        };
        self.accumulator.append(obs, act, reward, discount);

        if status.is_done() {
            let trs = self
                .accumulator
                .pending()
                .map(|p| Self::to_transition(p, &next_obs, &next_act))
                .collect::<Vec<_>>();
            debug!("Flushed {} transitions at the end of an episode ({:?})", trs.len(), status);
            self.accumulator.reset();
            self.prev_obs = init_obs;
            Ok(trs)
        } else {
            let trs = match self.accumulator.head() {
                Some(p) => vec![Self::to_transition(p, &next_obs, &next_act)],
                None => vec![],
            };
            self.prev_obs = Some(next_obs);
            Ok(trs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    const EPS: f32 = 1e-4;

    fn run(n_steps: usize, last: StepStatus) -> Vec<Transition<i32, i32>> {
        let config = MultiStepProcessorConfig::default().n_steps(n_steps).discount(0.9);
        let mut processor = MultiStepProcessor::build(&config).unwrap();
        processor.reset(0);

        let mut trs = vec![];
        for t in 0..4 {
            let status = if t == 3 { last } else { StepStatus::Running };
            let step = Step::new(t, t + 1, (t + 1) as f32, status).init_obs(100);
            trs.extend(processor.process(step).unwrap());
        }
        trs
    }

    #[test]
    fn test_serde_config() -> Result<()> {
        let config = MultiStepProcessorConfig::default().n_steps(3).discount(0.9);
        let dir = TempDir::new("multi_step_processor_config")?;
        let path = dir.path().join("multi_step_processor_config.yaml");
        config.save(&path)?;
        assert_eq!(config, MultiStepProcessorConfig::load(&path)?);
        Ok(())
    }

    #[test]
    fn test_not_reset() {
        let mut processor =
            MultiStepProcessor::<i32, i32>::build(&MultiStepProcessorConfig::default()).unwrap();
        let err = processor
            .process(Step::new(0, 1, 0.0, StepStatus::Running))
            .unwrap_err();
        assert_eq!(err.downcast_ref::<BufferError>(), Some(&BufferError::NotReset));
    }

    #[test]
    fn test_invalid_config() {
        let config = MultiStepProcessorConfig::default().n_steps(0);
        assert!(MultiStepProcessor::<i32, i32>::build(&config).is_err());
        let config = MultiStepProcessorConfig::default().discount(1.5);
        assert!(MultiStepProcessor::<i32, i32>::build(&config).is_err());
    }

    #[test]
    fn test_terminated_episode() {
        let trs = run(3, StepStatus::Terminated);
        assert_eq!(trs.len(), 4);

        assert_eq!((trs[0].obs, trs[0].act, trs[0].next_obs), (0, 0, 3));
        assert!((trs[0].reward - 5.23).abs() < EPS);
        assert!((trs[0].next_discount - 0.729).abs() < EPS);

        let expected = [(1, 7.94), (2, 6.6), (3, 4.0)];
        for (tr, (obs, reward)) in trs[1..].iter().zip(expected.iter()) {
            assert_eq!(tr.obs, *obs);
            assert_eq!(tr.next_obs, 4);
            assert!((tr.reward - reward).abs() < EPS);
            assert_eq!(tr.next_discount, 0.0);
        }
    }

    #[test]
    fn test_truncated_episode() {
        let trs = run(3, StepStatus::Truncated);
        assert_eq!(trs.len(), 4);
        let discounts: Vec<f32> = trs.iter().map(|tr| tr.next_discount).collect();
        for (d, expected) in discounts.iter().zip([0.729f32, 0.729, 0.81, 0.9].iter()) {
            assert!((d - expected).abs() < EPS);
        }
        assert!(trs[1..].iter().all(|tr| tr.next_obs == 4));
    }

    #[test]
    fn test_one_step() {
        let trs = run(1, StepStatus::Terminated);
        assert_eq!(trs.len(), 4);
        for (t, tr) in trs.iter().enumerate() {
            let t = t as i32;
            assert_eq!((tr.obs, tr.next_obs), (t, t + 1));
            assert_eq!(tr.reward, (t + 1) as f32);
        }
        assert_eq!(trs[2].next_discount, 0.9);
        assert_eq!(trs[3].next_discount, 0.0);
    }

    #[test]
    fn test_next_episode_starts_from_init_obs() {
        let config = MultiStepProcessorConfig::default().n_steps(2);
        let mut processor = MultiStepProcessor::<i32, i32>::build(&config).unwrap();
        processor.reset(0);
        processor
            .process(Step::new(0, 1, 1.0, StepStatus::Terminated).init_obs(10))
            .unwrap();
        processor.process(Step::new(5, 11, 1.0, StepStatus::Running)).unwrap();
        let trs = processor
            .process(Step::new(6, 12, 1.0, StepStatus::Running).next_act(7))
            .unwrap();
        assert_eq!(trs.len(), 1);
        assert_eq!((trs[0].obs, trs[0].act, trs[0].next_obs), (10, 5, 12));
        assert_eq!(trs[0].next_act, Some(7));

        // Without init_obs the processor waits for a reset.
        processor
            .process(Step::new(0, 13, 1.0, StepStatus::Truncated))
            .unwrap();
        assert!(processor.process(Step::new(0, 14, 1.0, StepStatus::Running)).is_err());
    }
}
