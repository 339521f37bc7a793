//! Agent performance scoring.

use crate::domain::models::{AgentMetrics, PerformanceScore, ScoreWeights};

/// Combines success rate, responsiveness and reliability into a 0-100 score.
///
/// Each component is in `[0, 1]`; an agent with no history scores full
/// marks on that component.
#[derive(Debug, Clone, Default)]
pub struct PerformanceEvaluator {
    weights: ScoreWeights,
}

impl PerformanceEvaluator {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    pub const fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn calculate_score(&self, metrics: &AgentMetrics) -> PerformanceScore {
        let finished = metrics.tasks_completed + metrics.tasks_failed;
        let success_rate = if finished == 0 {
            1.0
        } else {
            metrics.tasks_completed as f64 / finished as f64
        };

        let responsiveness = if metrics.average_task_duration <= 0.0 {
            1.0
        } else {
            (self.weights.target_task_duration_ms / metrics.average_task_duration).clamp(0.0, 1.0)
        };

        let heartbeats = metrics.heartbeats_responded + metrics.heartbeats_missed;
        let reliability = if heartbeats == 0 {
            1.0
        } else {
            metrics.heartbeats_responded as f64 / heartbeats as f64
        };

        let overall_score = 100.0
            * (self.weights.success_rate * success_rate
                + self.weights.responsiveness * responsiveness
                + self.weights.reliability * reliability);

        PerformanceScore {
            success_rate,
            responsiveness,
            reliability,
            overall_score: overall_score.clamp(0.0, 100.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_fresh_agent_scores_full_marks() {
        let score = PerformanceEvaluator::default().calculate_score(&AgentMetrics::default());
        assert!(approx(score.overall_score, 100.0));
    }

    #[test]
    fn test_success_rate_weighted_forty_percent() {
        let metrics = AgentMetrics {
            tasks_completed: 0,
            tasks_failed: 4,
            ..AgentMetrics::default()
        };
        let score = PerformanceEvaluator::default().calculate_score(&metrics);
        assert!(approx(score.success_rate, 0.0));
        assert!(approx(score.overall_score, 60.0));
    }

    #[test]
    fn test_slow_and_unreliable_agent() {
        let metrics = AgentMetrics {
            tasks_completed: 3,
            tasks_failed: 1,
            average_task_duration: 120_000.0,
            heartbeats_responded: 1,
            heartbeats_missed: 3,
            ..AgentMetrics::default()
        };
        let score = PerformanceEvaluator::default().calculate_score(&metrics);
        assert!(approx(score.success_rate, 0.75));
        assert!(approx(score.responsiveness, 0.5));
        assert!(approx(score.reliability, 0.25));
        assert!(approx(score.overall_score, 100.0 * (0.4 * 0.75 + 0.3 * 0.5 + 0.3 * 0.25)));
    }

    #[test]
    fn test_custom_weights() {
        let evaluator = PerformanceEvaluator::new(ScoreWeights {
            success_rate: 1.0,
            responsiveness: 0.0,
            reliability: 0.0,
            target_task_duration_ms: 1.0,
        });
        let metrics = AgentMetrics {
            tasks_completed: 1,
            tasks_failed: 1,
            average_task_duration: 10.0,
            ..AgentMetrics::default()
        };
        assert!(approx(evaluator.calculate_score(&metrics).overall_score, 50.0));
    }
}
