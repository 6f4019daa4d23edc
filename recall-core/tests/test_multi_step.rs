use anyhow::Result;
use log::info;
use recall_core::{
    BufferMode, ExperienceBufferBase, MultiStepProcessor, MultiStepProcessorConfig, Step,
    StepProcessor, StepStatus, TransitionBatch, TransitionBuffer, TransitionBufferConfig,
};
use test_log::test;

type Obs = (u32, u32);

/// Runs episodes of `len` steps with reward 1 and stores the transitions.
fn collect(
    n_steps: usize,
    discount: f32,
    len: u32,
    n_episodes: u32,
    last: StepStatus,
) -> Result<TransitionBuffer<Obs, u32>> {
    let buffer_config = TransitionBufferConfig::default()
        .capacity(64)
        .mode(BufferMode::Sequential);
    let mut buffer = TransitionBuffer::new(&buffer_config)?;
    let processor_config = MultiStepProcessorConfig::default()
        .n_steps(n_steps)
        .discount(discount);
    let mut processor = MultiStepProcessor::build(&processor_config)?;

    processor.reset((0, 0));
    for episode in 0..n_episodes {
        for t in 0..len {
            let status = if t + 1 == len { last } else { StepStatus::Running };
            let step = Step::new(t, (episode, t + 1), 1.0, status).init_obs((episode + 1, 0));
            for tr in processor.process(step)? {
                buffer.push(tr)?;
            }
        }
    }
    info!("Collected {} transitions", buffer.len());
    Ok(buffer)
}

#[test]
fn test_every_step_yields_one_transition() -> Result<()> {
    for &n_steps in &[1, 2, 3, 7] {
        let buffer = collect(n_steps, 0.5, 5, 3, StepStatus::Terminated)?;
        assert_eq!(ExperienceBufferBase::len(&buffer), 15);
    }
    Ok(())
}

#[test]
fn test_terminated_episodes() -> Result<()> {
    let mut buffer = collect(3, 0.5, 5, 2, StepStatus::Terminated)?;
    let mut batch = TransitionBatch::with_capacity(10);
    buffer.pop(10, &mut batch)?;

    for episode in 0..2u32 {
        let trs: Vec<_> = (0..5)
            .map(|k| batch.get(episode as usize * 5 + k).unwrap())
            .collect();

        // Transitions come out in the order of their first state.
        for (t, tr) in trs.iter().enumerate() {
            assert_eq!(tr.obs, (episode, t as u32));
            assert_eq!(tr.act, t as u32);
        }
        for tr in &trs[..2] {
            assert_eq!(tr.reward, 1.75);
            assert_eq!(tr.next_discount, 0.125);
            assert_eq!(tr.next_obs, (episode, tr.obs.1 + 3));
        }
        let tail: Vec<_> = trs[2..].iter().map(|tr| tr.reward).collect();
        assert_eq!(tail, vec![1.75, 1.5, 1.0]);
        assert!(trs[2..].iter().all(|tr| tr.next_discount == 0.0));
        assert!(trs[2..].iter().all(|tr| tr.next_obs == (episode, 5)));
    }
    Ok(())
}

#[test]
fn test_truncated_episode_keeps_bootstrap() -> Result<()> {
    let mut buffer = collect(3, 0.5, 5, 1, StepStatus::Truncated)?;
    let mut batch = TransitionBatch::with_capacity(5);
    buffer.pop(5, &mut batch)?;
    assert_eq!(batch.next_discount, vec![0.125, 0.125, 0.125, 0.25, 0.5]);
    assert_eq!(batch.reward, vec![1.75, 1.75, 1.75, 1.5, 1.0]);
    Ok(())
}

#[test]
fn test_short_episode() -> Result<()> {
    let mut buffer = collect(7, 0.5, 2, 1, StepStatus::Terminated)?;
    let mut batch = TransitionBatch::with_capacity(2);
    buffer.pop(2, &mut batch)?;
    assert_eq!(batch.reward, vec![1.5, 1.0]);
    assert_eq!(batch.next_obs, vec![(0, 2), (0, 2)]);
    assert_eq!(batch.next_discount, vec![0.0, 0.0]);
    Ok(())
}
