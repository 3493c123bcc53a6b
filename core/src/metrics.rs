use serde::{Deserialize, Serialize};

/// What the trainer reports for a single example.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainStats {
    pub loss: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundMetrics {
    pub round: usize,
    pub examples: usize,
    pub mean_loss: f32,
}

impl RoundMetrics {
    pub fn from_stats(round: usize, stats: &[TrainStats]) -> Self {
        let mean_loss = if stats.is_empty() {
            0.0
        } else {
            stats.iter().map(|s| s.loss).sum::<f32>() / stats.len() as f32
        };

        Self {
            round,
            examples: stats.len(),
            mean_loss,
        }
    }
}
