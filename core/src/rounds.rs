//! Cooperative training rounds.
//!
//! Each round trains every example once and then hands control back to the
//! caller, which typically re-renders the activation report. Cancellation is
//! only observed between rounds; a round that has started always finishes.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::{
    metrics::{RoundMetrics, TrainStats},
    network::Network,
    volume::Vol,
};

/// Gradient-descent driver owned by the numeric library.
pub trait Trainer {
    fn train(&mut self, input: &Vol, label: usize) -> Result<TrainStats>;
    fn network(&self) -> &dyn Network;
}

#[derive(Clone, Debug)]
pub struct Example {
    pub input: Vol,
    pub label: usize,
}

impl Example {
    pub fn new(input: Vol, label: usize) -> Self {
        Self { input, label }
    }
}

/// Shared stop request, cheap to clone into observers or other threads.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundOutcome {
    Completed { rounds: usize },
    Cancelled { completed: usize },
}

#[derive(Clone, Debug)]
pub struct RoundReport {
    pub outcome: RoundOutcome,
    pub history: Vec<RoundMetrics>,
}

#[derive(Clone, Debug)]
pub struct RoundLoop {
    rounds: usize,
    cancel: CancelFlag,
}

impl RoundLoop {
    pub fn new(rounds: usize) -> Self {
        Self {
            rounds,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Runs up to `rounds` rounds over `dataset`, calling `on_round` after each one.
    pub fn run<T, F>(&self, trainer: &mut T, dataset: &[Example], mut on_round: F) -> Result<RoundReport>
    where
        T: Trainer + ?Sized,
        F: FnMut(&RoundMetrics, &dyn Network) -> Result<()>,
    {
        let mut history = Vec::with_capacity(self.rounds);

        for round in 1..=self.rounds {
            if self.cancel.is_cancelled() {
                let completed = round - 1;
                warn!(completed, requested = self.rounds, "training cancelled");
                return Ok(RoundReport {
                    outcome: RoundOutcome::Cancelled { completed },
                    history,
                });
            }

            let mut stats = Vec::with_capacity(dataset.len());
            for (index, example) in dataset.iter().enumerate() {
                let step = trainer
                    .train(&example.input, example.label)
                    .with_context(|| format!("training example {index} in round {round} failed"))?;
                stats.push(step);
            }

            let metrics = RoundMetrics::from_stats(round, &stats);
            info!(round, remaining = self.rounds - round, loss = metrics.mean_loss, "finished round");
            on_round(&metrics, trainer.network())?;
            history.push(metrics);
        }

        Ok(RoundReport {
            outcome: RoundOutcome::Completed {
                rounds: self.rounds,
            },
            history,
        })
    }
}

#[cfg(test)]
mod tests {
    use anyhow::bail;

    use super::*;
    use crate::network::{Layer, LayerKind};

    struct CountingTrainer {
        layers: Vec<Layer>,
        calls: Vec<usize>,
    }

    impl CountingTrainer {
        fn new() -> Self {
            Self {
                layers: vec![Layer::new(LayerKind::Input, Vol::zeros(1, 1, 1))],
                calls: Vec::new(),
            }
        }
    }

    impl Trainer for CountingTrainer {
        fn train(&mut self, _input: &Vol, label: usize) -> Result<TrainStats> {
            if label == 99 {
                bail!("bad label");
            }
            self.calls.push(label);
            Ok(TrainStats {
                loss: label as f32,
            })
        }

        fn network(&self) -> &dyn Network {
            &self.layers
        }
    }

    fn dataset() -> Vec<Example> {
        vec![
            Example::new(Vol::zeros(1, 1, 1), 1),
            Example::new(Vol::zeros(1, 1, 1), 3),
        ]
    }

    #[test]
    fn trains_every_example_each_round() {
        let mut trainer = CountingTrainer::new();
        let mut observed = Vec::new();

        let report = RoundLoop::new(3)
            .run(&mut trainer, &dataset(), |metrics, network| {
                assert_eq!(network.layers().len(), 1);
                observed.push(metrics.round);
                Ok(())
            })
            .unwrap();

        assert_eq!(report.outcome, RoundOutcome::Completed { rounds: 3 });
        assert_eq!(trainer.calls, [1, 3, 1, 3, 1, 3]);
        assert_eq!(observed, [1, 2, 3]);
        assert_eq!(report.history[0].mean_loss, 2.0);
        assert_eq!(report.history[0].examples, 2);
    }

    #[test]
    fn cancellation_stops_at_round_boundary() {
        let mut trainer = CountingTrainer::new();
        let rounds = RoundLoop::new(10);
        let cancel = rounds.cancel_flag();

        let report = rounds
            .run(&mut trainer, &dataset(), |metrics, _| {
                if metrics.round == 2 {
                    cancel.cancel();
                }
                Ok(())
            })
            .unwrap();

        assert_eq!(report.outcome, RoundOutcome::Cancelled { completed: 2 });
        assert_eq!(report.history.len(), 2);
        assert_eq!(trainer.calls.len(), 4);
    }

    #[test]
    fn pre_cancelled_loop_does_no_work() {
        let mut trainer = CountingTrainer::new();
        let cancel = CancelFlag::new();
        cancel.cancel();

        let report = RoundLoop::new(5)
            .with_cancel_flag(cancel)
            .run(&mut trainer, &dataset(), |_, _| Ok(()))
            .unwrap();

        assert_eq!(report.outcome, RoundOutcome::Cancelled { completed: 0 });
        assert!(trainer.calls.is_empty());
    }

    #[test]
    fn zero_rounds_complete_immediately() {
        let mut trainer = CountingTrainer::new();
        let report = RoundLoop::new(0)
            .run(&mut trainer, &dataset(), |_, _| Ok(()))
            .unwrap();

        assert_eq!(report.outcome, RoundOutcome::Completed { rounds: 0 });
        assert!(report.history.is_empty());
    }

    #[test]
    fn trainer_errors_propagate_with_context() {
        let mut trainer = CountingTrainer::new();
        let dataset = vec![Example::new(Vol::zeros(1, 1, 1), 99)];

        let err = RoundLoop::new(2)
            .run(&mut trainer, &dataset, |_, _| Ok(()))
            .unwrap_err();

        assert_eq!(err.to_string(), "training example 0 in round 1 failed");
        assert_eq!(err.root_cause().to_string(), "bad label");
    }
}
