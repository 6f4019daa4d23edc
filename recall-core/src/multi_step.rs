//! Online accumulation of n-step discounted returns.
//!
//! [`MultiStepAccumulator`] keeps the last `n` steps of an episode in a ring.
//! Every appended reward is folded into all windows that are still open, so
//! the n-step return of a step is complete as soon as `n` steps have been
//! observed after it, without storing any window's reward history.
use crate::error::BufferError;

/// A step whose discounted return is being accumulated.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingTransition<S, A> {
    /// State the window starts from.
    pub state: S,

    /// Action taken at `state`.
    pub action: A,

    /// Discounted sum of the rewards observed since `state`.
    pub acc_reward: f32,

    /// Product of the discounts observed since `state`. This becomes the
    /// bootstrap discount of the transition, `0` once a terminal step is seen.
    pub acc_discount: f32,
}

/// Fixed-size ring compounding n-step returns.
///
/// Absolute step `t` of the current episode is stored at slot `t % n` and is
/// live while `t < step_count <= t + n`.
///
/// # Examples
///
/// ```
/// use recall_core::MultiStepAccumulator;
///
/// let mut acc = MultiStepAccumulator::new(2).unwrap();
/// acc.append("s0", 0, 1.0, 0.5);
/// assert!(acc.head().is_none());
/// acc.append("s1", 1, 2.0, 0.5);
///
/// let head = acc.head().unwrap();
/// assert_eq!(head.state, "s0");
/// assert_eq!(head.acc_reward, 2.0);
/// assert_eq!(head.acc_discount, 0.25);
/// ```
#[derive(Clone, Debug)]
pub struct MultiStepAccumulator<S, A> {
    horizon: usize,
    step_count: usize,
    slots: Vec<PendingTransition<S, A>>,
}

impl<S, A> MultiStepAccumulator<S, A> {
    /// Creates an accumulator over windows of `horizon` steps.
    pub fn new(horizon: usize) -> Result<Self, BufferError> {
        if horizon == 0 {
            return Err(BufferError::ZeroHorizon);
        }
        Ok(Self {
            horizon,
            step_count: 0,
            slots: Vec::with_capacity(horizon),
        })
    }

    /// Length `n` of the windows.
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Returns `true` when windows span more than one step.
    pub fn is_multi_step(&self) -> bool {
        self.horizon > 1
    }

    /// Number of steps appended since the last reset.
    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// Number of live windows.
    pub fn len(&self) -> usize {
        self.step_count.min(self.horizon)
    }

    /// Returns `true` if no window is live.
    pub fn is_empty(&self) -> bool {
        self.step_count == 0
    }

    /// Starts a new episode. Windows of the previous episode are dropped.
    pub fn reset(&mut self) {
        self.step_count = 0;
    }

    /// Appends a step and folds its reward into every open window.
    ///
    /// `discount` is the discount applied after this step, i.e. `0` for a
    /// terminal step.
    pub fn append(&mut self, state: S, action: A, reward: f32, discount: f32) {
        let n = self.horizon;
        let index = self.step_count % n;
        let pending = PendingTransition {
            state,
            action,
            acc_reward: reward,
            acc_discount: discount,
        };
        if index == self.slots.len() {
            self.slots.push(pending);
        } else {
            self.slots[index] = pending;
        }

        let open = self.step_count.min(n - 1);
        for i in 1..=open {
            let prev = &mut self.slots[(index + n - i) % n];
            prev.acc_reward += reward * prev.acc_discount;
            prev.acc_discount *= discount;
        }

        self.step_count += 1;
    }

    /// Returns the window starting at absolute step `step`, if it is live.
    pub fn get(&self, step: usize) -> Option<&PendingTransition<S, A>> {
        if step < self.step_count && self.step_count <= step + self.horizon {
            Some(&self.slots[step % self.horizon])
        } else {
            None
        }
    }

    /// Returns the oldest window once it spans `n` steps.
    ///
    /// The window is overwritten by the next [`append`](Self::append), so it
    /// has to be flushed before then.
    pub fn head(&self) -> Option<&PendingTransition<S, A>> {
        if self.step_count < self.horizon {
            return None;
        }
        self.get(self.step_count - self.horizon)
    }

    /// Iterates the live windows, oldest first.
    ///
    /// At the end of an episode all of them are flushed, including windows
    /// shorter than `n` steps.
    pub fn pending(&self) -> impl Iterator<Item = &PendingTransition<S, A>> + '_ {
        (self.step_count - self.len()..self.step_count).filter_map(move |step| self.get(step))
    }
}

#[cfg(test)]
mod tests {
    use super::MultiStepAccumulator;
    use crate::error::BufferError;

    const EPS: f32 = 1e-4;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn test_zero_horizon() {
        let acc = MultiStepAccumulator::<usize, usize>::new(0);
        assert_eq!(acc.err(), Some(BufferError::ZeroHorizon));
    }

    #[test]
    fn test_three_step_returns() {
        let mut acc = MultiStepAccumulator::new(3).unwrap();
        let mut heads = vec![];
        for (t, r) in [1.0f32, 2.0, 3.0, 4.0].iter().enumerate() {
            acc.append(t, t, *r, 0.9);
            if let Some(head) = acc.head() {
                heads.push((head.state, head.acc_reward, head.acc_discount));
            }
        }

        assert_eq!(heads.len(), 2);
        assert_eq!(heads[0].0, 0);
        assert!(approx(heads[0].1, 1.0 + 0.9 * 2.0 + 0.81 * 3.0));
        assert!(approx(heads[0].2, 0.729));
        assert_eq!(heads[1].0, 1);
        assert!(approx(heads[1].1, 2.0 + 0.9 * 3.0 + 0.81 * 4.0));
        assert!(approx(heads[1].2, 0.729));

        // Tail of the episode
        let tail: Vec<_> = acc
            .pending()
            .map(|p| (p.state, p.acc_reward, p.acc_discount))
            .collect();
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[1].0, 2);
        assert!(approx(tail[1].1, 3.0 + 0.9 * 4.0));
        assert!(approx(tail[1].2, 0.81));
        assert_eq!(tail[2].0, 3);
        assert!(approx(tail[2].1, 4.0));
        assert!(approx(tail[2].2, 0.9));
    }

    #[test]
    fn test_terminal_step_closes_windows() {
        let mut acc = MultiStepAccumulator::new(3).unwrap();
        acc.append(0, 0, 1.0, 0.9);
        acc.append(1, 1, 2.0, 0.0);

        let tail: Vec<_> = acc.pending().collect();
        assert_eq!(tail.len(), 2);
        // The terminal reward is still counted by the earlier window.
        assert!(approx(tail[0].acc_reward, 1.0 + 0.9 * 2.0));
        assert_eq!(tail[0].acc_discount, 0.0);
        assert!(approx(tail[1].acc_reward, 2.0));
        assert_eq!(tail[1].acc_discount, 0.0);
    }

    #[test]
    fn test_live_window() {
        let mut acc = MultiStepAccumulator::new(2).unwrap();
        assert!(acc.get(0).is_none());
        for t in 0..5 {
            acc.append(t, t, 1.0, 1.0);
        }
        assert!(acc.get(2).is_none());
        assert_eq!(acc.get(3).map(|p| p.state), Some(3));
        assert_eq!(acc.get(4).map(|p| p.state), Some(4));
        assert!(acc.get(5).is_none());
        assert_eq!(acc.head().map(|p| p.state), Some(3));
    }

    #[test]
    fn test_reset_does_not_leak() {
        let mut acc = MultiStepAccumulator::new(3).unwrap();
        acc.append(0, 0, 10.0, 0.5);
        acc.append(1, 1, 10.0, 0.5);
        acc.reset();
        assert!(acc.is_empty());
        assert!(acc.get(0).is_none());
        assert_eq!(acc.pending().count(), 0);

        acc.append(7, 7, 1.0, 0.5);
        let p = acc.get(0).unwrap();
        assert_eq!(p.state, 7);
        assert_eq!(p.acc_reward, 1.0);
        assert_eq!(p.acc_discount, 0.5);
    }

    #[test]
    fn test_single_step_horizon() {
        let mut acc = MultiStepAccumulator::new(1).unwrap();
        assert!(!acc.is_multi_step());
        acc.append(0, 0, 1.5, 0.9);
        let head = acc.head().unwrap();
        assert_eq!(head.acc_reward, 1.5);
        assert_eq!(head.acc_discount, 0.9);
        acc.append(1, 1, 2.5, 0.9);
        assert_eq!(acc.head().unwrap().acc_reward, 2.5);
        assert_eq!(acc.len(), 1);
    }
}
