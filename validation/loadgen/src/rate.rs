//! Aggregate target rate and the timer loop that reshapes it.

use crate::config::Scenario;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Current aggregate target rate (units/sec), shared between the rate
/// timer (sole writer) and every worker.
#[derive(Debug, Clone, Default)]
pub struct SharedRate(Arc<AtomicU64>);

impl SharedRate {
    pub fn new(rate: u64) -> Self {
        Self(Arc::new(AtomicU64::new(rate)))
    }

    pub fn load(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub fn store(&self, rate: u64) {
        self.0.store(rate, Ordering::Release);
    }
}

/// How the aggregate rate evolves over a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateShape {
    /// No rate at all; workers never pace.
    Unconstrained,
    Constant { rate: u64 },
    /// Toggles every step, starting at `normal`.
    Oscillating { normal: u64, spike: u64 },
    /// `start`, then `+step` per step, saturating at `max`.
    Ramping { start: u64, step: u64, max: u64 },
}

impl RateShape {
    pub fn for_scenario(scenario: Scenario, target: u64) -> Self {
        match scenario {
            Scenario::Burst => RateShape::Unconstrained,
            Scenario::Sustained => RateShape::Constant { rate: target },
            Scenario::Spike => RateShape::Oscillating {
                normal: target / 10,
                spike: target,
            },
            Scenario::Rampup => RateShape::Ramping {
                start: target / 10,
                step: target / 10,
                max: target,
            },
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(
            self,
            RateShape::Oscillating { .. } | RateShape::Ramping { .. }
        )
    }

    /// Rate after `step` timer transitions; step 0 is the starting rate.
    /// `None` for the unconstrained shape.
    pub fn rate_at_step(&self, step: u64) -> Option<u64> {
        match *self {
            RateShape::Unconstrained => None,
            RateShape::Constant { rate } => Some(rate),
            RateShape::Oscillating { normal, spike } => {
                Some(if step % 2 == 0 { normal } else { spike })
            }
            RateShape::Ramping { start, step: inc, max } => {
                Some(start.saturating_add(inc.saturating_mul(step)).min(max))
            }
        }
    }
}

/// Owns every write to a [`SharedRate`] for one run.
pub struct RateController {
    shape: RateShape,
    rate: SharedRate,
    step_interval: Duration,
}

impl RateController {
    /// Create the controller and the shared rate it drives, already set to
    /// the starting value.
    pub fn new(shape: RateShape, step_interval: Duration) -> (Self, SharedRate) {
        let rate = SharedRate::new(shape.rate_at_step(0).unwrap_or(0));
        let controller = Self {
            shape,
            rate: rate.clone(),
            step_interval,
        };
        (controller, rate)
    }

    pub fn shape(&self) -> RateShape {
        self.shape
    }

    /// Timer loop. Returns immediately for static shapes; otherwise applies
    /// one transition per step until the deadline or cancellation.
    ///
    /// Transitions only happen on ticks strictly before the deadline, so a
    /// trailing partial step keeps the last applied rate.
    pub async fn run(self, deadline: Instant, cancel: CancellationToken) {
        if !self.shape.is_dynamic() {
            return;
        }

        let mut ticker = interval_at(Instant::now() + self.step_interval, self.step_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut step = 0u64;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Rate controller cancelled");
                    return;
                }
                _ = sleep_until(deadline) => {
                    debug!("Rate controller reached deadline");
                    return;
                }
                _ = ticker.tick() => {
                    if Instant::now() >= deadline {
                        return;
                    }
                    step += 1;
                    let Some(next) = self.shape.rate_at_step(step) else {
                        return;
                    };
                    self.rate.store(next);
                    self.log_transition(step, next);
                }
            }
        }
    }

    fn log_transition(&self, step: u64, rate: u64) {
        match self.shape {
            RateShape::Oscillating { .. } if step % 2 == 1 => {
                info!(rate, "[SPIKE] Spike start");
            }
            RateShape::Oscillating { .. } => {
                info!(rate, "[SPIKE] Normal mode");
            }
            RateShape::Ramping { .. } => {
                info!(rate, "[RAMPUP] Rate increased");
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_for_each_scenario() {
        assert_eq!(
            RateShape::for_scenario(Scenario::Burst, 1000),
            RateShape::Unconstrained
        );
        assert_eq!(
            RateShape::for_scenario(Scenario::Sustained, 1000),
            RateShape::Constant { rate: 1000 }
        );
        assert_eq!(
            RateShape::for_scenario(Scenario::Spike, 1000),
            RateShape::Oscillating {
                normal: 100,
                spike: 1000
            }
        );
        assert_eq!(
            RateShape::for_scenario(Scenario::Rampup, 1000),
            RateShape::Ramping {
                start: 100,
                step: 100,
                max: 1000
            }
        );
    }

    #[test]
    fn test_oscillating_starts_low_and_alternates() {
        let shape = RateShape::for_scenario(Scenario::Spike, 500);
        let rates: Vec<_> = (0..6).map(|s| shape.rate_at_step(s).unwrap()).collect();
        assert_eq!(rates, vec![50, 500, 50, 500, 50, 500]);
    }

    #[test]
    fn test_ramping_monotonic_and_saturates() {
        let shape = RateShape::for_scenario(Scenario::Rampup, 1000);
        let rates: Vec<_> = (0..15).map(|s| shape.rate_at_step(s).unwrap()).collect();
        assert_eq!(rates[0], 100);
        assert_eq!(rates[9], 1000);
        assert!(rates.windows(2).all(|w| w[0] <= w[1]));
        assert!(rates.iter().all(|&r| r <= 1000));
        assert_eq!(*rates.last().unwrap(), 1000);
    }

    #[test]
    fn test_ramping_does_not_overflow() {
        let shape = RateShape::Ramping {
            start: 1,
            step: u64::MAX / 2,
            max: u64::MAX,
        };
        assert_eq!(shape.rate_at_step(u64::MAX), Some(u64::MAX));
    }

    #[test]
    fn test_small_target_rounds_to_zero() {
        let shape = RateShape::for_scenario(Scenario::Rampup, 5);
        assert_eq!(shape.rate_at_step(0), Some(0));
        assert_eq!(shape.rate_at_step(100), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_static_shape_returns_immediately() {
        let (controller, rate) = RateController::new(RateShape::Constant { rate: 42 }, Duration::from_secs(10));
        controller
            .run(Instant::now() + Duration::from_secs(3600), CancellationToken::new())
            .await;
        assert_eq!(rate.load(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_timer() {
        let (controller, rate) =
            RateController::new(RateShape::for_scenario(Scenario::Spike, 100), Duration::from_secs(10));
        let cancel = CancellationToken::new();
        let start = Instant::now();
        let handle = tokio::spawn(controller.run(start + Duration::from_secs(3600), cancel.clone()));

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(rate.load(), 100);
        cancel.cancel();
        handle.await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(16));

        // No further transitions after cancellation
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(rate.load(), 100);
    }
}
