//! Transitions and batches of transitions.

/// A transition `(s_t, a_t, r_t, s_t+n, gamma)` with an optional next action.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition<S, A> {
    /// State.
    pub obs: S,

    /// Action taken at `obs`.
    pub act: A,

    /// Reward, or the discounted sum of rewards for a multi-step transition.
    pub reward: f32,

    /// State the value is bootstrapped from.
    pub next_obs: S,

    /// Discount applied to the value of `next_obs`: the discount factor, `0`
    /// after a terminal step, or the compounded discount of a multi-step
    /// window.
    pub next_discount: f32,

    /// Action taken at `next_obs`, for SARSA-family learners.
    pub next_act: Option<A>,
}

impl<S, A> Transition<S, A> {
    /// Constructs a transition without the next action.
    pub fn new(obs: S, act: A, reward: f32, next_obs: S, next_discount: f32) -> Self {
        Self {
            obs,
            act,
            reward,
            next_obs,
            next_discount,
            next_act: None,
        }
    }

    /// Sets the action taken at the next state.
    pub fn with_next_act(mut self, next_act: A) -> Self {
        self.next_act = Some(next_act);
        self
    }
}

/// A batch of transitions gathered from a buffer.
///
/// The buffer only gathers. Turning the columns into tensors is up to the
/// learner. A batch can be reused across calls; retrieval clears it first and
/// keeps its allocations.
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionBatch<S, A> {
    /// States.
    pub obs: Vec<S>,

    /// Actions.
    pub act: Vec<A>,

    /// Rewards.
    pub reward: Vec<f32>,

    /// Next states.
    pub next_obs: Vec<S>,

    /// Discounts of the next states.
    pub next_discount: Vec<f32>,

    /// Next actions, if the buffer stores them.
    pub next_act: Option<Vec<A>>,

    /// Importance weights, in prioritized mode.
    pub weight: Option<Vec<f32>>,

    /// Slot indices of the sampled transitions, to be passed back with TD
    /// errors for priority updates.
    pub ix_sample: Option<Vec<usize>>,
}

impl<S, A> TransitionBatch<S, A> {
    /// Creates an empty batch able to hold `capacity` transitions without
    /// reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            obs: Vec::with_capacity(capacity),
            act: Vec::with_capacity(capacity),
            reward: Vec::with_capacity(capacity),
            next_obs: Vec::with_capacity(capacity),
            next_discount: Vec::with_capacity(capacity),
            next_act: None,
            weight: None,
            ix_sample: None,
        }
    }

    /// Returns the number of transitions in the batch.
    pub fn len(&self) -> usize {
        self.reward.len()
    }

    /// Returns `true` if the batch holds no transition.
    pub fn is_empty(&self) -> bool {
        self.reward.is_empty()
    }

    /// Removes all transitions, keeping the allocations.
    pub fn clear(&mut self) {
        self.obs.clear();
        self.act.clear();
        self.reward.clear();
        self.next_obs.clear();
        self.next_discount.clear();
        if let Some(next_act) = self.next_act.as_mut() {
            next_act.clear();
        }
        self.weight = None;
        self.ix_sample = None;
    }

    /// Returns the `i`-th transition of the batch.
    pub fn get(&self, i: usize) -> Option<Transition<S, A>>
    where
        S: Clone,
        A: Clone,
    {
        if i >= self.len() {
            return None;
        }
        Some(Transition {
            obs: self.obs[i].clone(),
            act: self.act[i].clone(),
            reward: self.reward[i],
            next_obs: self.next_obs[i].clone(),
            next_discount: self.next_discount[i],
            next_act: self.next_act.as_ref().map(|a| a[i].clone()),
        })
    }

    /// Decomposes the batch into
    /// `(obs, act, reward, next_obs, next_discount, next_act, ix_sample, weight)`.
    #[allow(clippy::type_complexity)]
    pub fn unpack(
        self,
    ) -> (
        Vec<S>,
        Vec<A>,
        Vec<f32>,
        Vec<S>,
        Vec<f32>,
        Option<Vec<A>>,
        Option<Vec<usize>>,
        Option<Vec<f32>>,
    ) {
        (
            self.obs,
            self.act,
            self.reward,
            self.next_obs,
            self.next_discount,
            self.next_act,
            self.ix_sample,
            self.weight,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{Transition, TransitionBatch};

    #[test]
    fn test_clear_keeps_next_act_column() {
        let mut batch = TransitionBatch::<i32, i32>::with_capacity(2);
        batch.next_act = Some(vec![]);
        batch.obs.push(1);
        batch.act.push(2);
        batch.reward.push(3.0);
        batch.next_obs.push(4);
        batch.next_discount.push(0.9);
        batch.next_act.as_mut().unwrap().push(5);
        batch.weight = Some(vec![1.0]);

        assert_eq!(
            batch.get(0),
            Some(Transition::new(1, 2, 3.0, 4, 0.9).with_next_act(5))
        );
        assert!(batch.get(1).is_none());

        batch.clear();
        assert!(batch.is_empty());
        assert_eq!(batch.next_act, Some(vec![]));
        assert!(batch.weight.is_none());
    }
}
