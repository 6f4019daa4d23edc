//! Environment step.

/// How an environment step ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepStatus {
    /// The episode continues.
    Running,

    /// The episode reached a terminal state; no value is bootstrapped from
    /// the next state.
    Terminated,

    /// The episode was cut off, e.g. by a time limit; the next state is not
    /// terminal and its value is still bootstrapped.
    Truncated,
}

impl StepStatus {
    /// Terminated or truncated.
    #[inline]
    pub fn is_done(&self) -> bool {
        !matches!(self, StepStatus::Running)
    }
}

/// Represents an action, next state and reward tuple `(a_t, s_t+1, r_t)`
/// with the status of the episode.
///
/// An agent loop emits a [`Step`] at every interaction with the environment.
/// The state `s_t` is kept by the [`StepProcessor`] that turns steps into
/// transitions.
#[derive(Clone, Debug)]
pub struct Step<S, A> {
    /// Action taken at `s_t`.
    pub act: A,

    /// State after the action, `s_t+1`.
    pub obs: S,

    /// Reward.
    pub reward: f32,

    /// Whether the episode ended with this step.
    pub status: StepStatus,

    /// Action the agent takes at `s_t+1`. Required by SARSA-family learners.
    pub next_act: Option<A>,

    /// Initial state of the next episode. When the step ends an episode and
    /// this is set, the processor starts the next episode without a reset.
    pub init_obs: Option<S>,
}

impl<S, A> Step<S, A> {
    /// Constructs a [`Step`] object.
    pub fn new(act: A, obs: S, reward: f32, status: StepStatus) -> Self {
        Self {
            act,
            obs,
            reward,
            status,
            next_act: None,
            init_obs: None,
        }
    }

    /// Sets the action taken at the next state.
    pub fn next_act(mut self, next_act: A) -> Self {
        self.next_act = Some(next_act);
        self
    }

    /// Sets the initial state of the next episode.
    pub fn init_obs(mut self, init_obs: S) -> Self {
        self.init_obs = Some(init_obs);
        self
    }

    /// Terminated or truncated.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.status.is_done()
    }
}

/// Process [`Step`] and output an item [`Self::Output`].
///
/// The output is typically a set of transitions to be pushed into a buffer
/// implementing [`ExperienceBufferBase`](crate::ExperienceBufferBase).
///
/// [`Self::Output`]: StepProcessor::Output
pub trait StepProcessor<S, A> {
    /// Configuration.
    type Config: Clone;

    /// The type of items produced by this trait.
    type Output;

    /// Build a processor.
    fn build(config: &Self::Config) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Starts an episode from its initial state.
    fn reset(&mut self, init_obs: S);

    /// Processes a [`Step`] object.
    fn process(&mut self, step: Step<S, A>) -> anyhow::Result<Self::Output>;
}
