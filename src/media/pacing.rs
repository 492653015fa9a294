//! Occupancy-driven pacing of jitter buffer output
//!
//! Each (stream, media type) pair has a [`Pacer`]. Once started it owns one
//! [`PacingTask`] that emits a [`PacingTick`] per period. On every tick the
//! worker re-evaluates the speed from buffer occupancy; a speed change cancels
//! the task and schedules a replacement at the new period before the tick's
//! frame is dequeued.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::codec::MediaKind;

/// Speed level and the multiplier applied to the base period
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedStep {
    pub speed: i8,
    pub multiplier: f64,
}

impl SpeedStep {
    const fn new(speed: i8, multiplier: f64) -> Self {
        Self { speed, multiplier }
    }
}

/// Target speed for the current buffer occupancy.
///
/// | occupancy | video      | audio       |
/// |-----------|------------|-------------|
/// | > 15      | 3 / 0.75   | 2 / 0.85    |
/// | 11–15     | 2 / 0.85   | 1 / 0.93    |
/// | 6–10      | 1 / 1.00   | 0 / 1.00    |
/// | ≤ 5       | 0 / 1.05   | −1 / 1.05   |
pub fn target_speed(kind: MediaKind, occupancy: usize) -> SpeedStep {
    match (kind, occupancy) {
        (MediaKind::Video, 16..) => SpeedStep::new(3, 0.75),
        (MediaKind::Video, 11..=15) => SpeedStep::new(2, 0.85),
        (MediaKind::Video, 6..=10) => SpeedStep::new(1, 1.00),
        (MediaKind::Video, _) => SpeedStep::new(0, 1.05),
        (MediaKind::Audio, 16..) => SpeedStep::new(2, 0.85),
        (MediaKind::Audio, 11..=15) => SpeedStep::new(1, 0.93),
        (MediaKind::Audio, 6..=10) => SpeedStep::new(0, 1.00),
        (MediaKind::Audio, _) => SpeedStep::new(-1, 1.05),
    }
}

/// Milliseconds between units at normal speed, `None` for a non-positive rate
pub fn base_period_ms(units_per_second: f64) -> Option<f64> {
    (units_per_second.is_finite() && units_per_second > 0.0).then(|| 1000.0 / units_per_second)
}

/// Delivery period for a base period scaled by `multiplier`
pub fn scaled_period(base_ms: f64, multiplier: f64) -> Duration {
    Duration::try_from_secs_f64(base_ms * multiplier / 1000.0).unwrap_or(Duration::from_millis(1))
}

/// Current pacing speed and period
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacingState {
    pub speed: i8,
    pub period: Duration,
}

/// Tick emitted by a pacing task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacingTick {
    pub stream_id: String,
    pub instance: u64,
    pub kind: MediaKind,
    /// Identifies the task that fired; ticks from replaced tasks are stale
    pub generation: u64,
}

/// A running periodic tick task; cancelled on drop
pub struct PacingTask {
    generation: u64,
    period: Duration,
    cancel: CancellationToken,
}

impl PacingTask {
    /// Spawn a task that sends `tick` every `period`, first after one period
    pub fn spawn(tick: PacingTick, period: Duration, ticks: mpsc::UnboundedSender<PacingTick>) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let generation = tick.generation;

        tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        if ticks.send(tick.clone()).is_err() {
                            break;
                        }
                    }
                }
            }
            debug!(stream_id = %tick.stream_id, kind = %tick.kind, generation = tick.generation, "Pacing task ended");
        });

        Self {
            generation,
            period,
            cancel,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for PacingTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Pacing controller for one media type of one stream
pub struct Pacer {
    kind: MediaKind,
    stream_id: String,
    instance: u64,
    started: bool,
    /// Set after an unconfigured-codec failure; cleared by a successful configure
    halted: bool,
    state: Option<PacingState>,
    task: Option<PacingTask>,
    next_generation: u64,
    ticks: mpsc::UnboundedSender<PacingTick>,
}

impl Pacer {
    pub fn new(
        kind: MediaKind,
        stream_id: impl Into<String>,
        instance: u64,
        ticks: mpsc::UnboundedSender<PacingTick>,
    ) -> Self {
        Self {
            kind,
            stream_id: stream_id.into(),
            instance,
            started: false,
            halted: false,
            state: None,
            task: None,
            next_generation: 0,
            ticks,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn state(&self) -> Option<PacingState> {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Whether `occupancy` crosses the playback-start threshold
    pub fn should_start(&self, occupancy: usize, threshold: usize) -> bool {
        !self.started && !self.halted && occupancy >= threshold
    }

    /// Start pacing at speed 0 and the unscaled base period
    pub fn start(&mut self, base_ms: f64) {
        self.started = true;
        let period = scaled_period(base_ms, 1.0);
        self.state = Some(PacingState { speed: 0, period });
        self.schedule(period);
    }

    /// Whether a tick came from the currently scheduled task
    pub fn is_current(&self, generation: u64) -> bool {
        self.task
            .as_ref()
            .is_some_and(|task| task.generation() == generation)
    }

    /// Re-evaluate speed for `occupancy`; reschedules and returns `true` on change
    pub fn retune(&mut self, occupancy: usize, base_ms: f64) -> bool {
        let target = target_speed(self.kind, occupancy);
        if self.state.is_some_and(|state| state.speed == target.speed) {
            return false;
        }

        let period = scaled_period(base_ms, target.multiplier);
        self.state = Some(PacingState {
            speed: target.speed,
            period,
        });
        self.schedule(period);
        true
    }

    /// Stop after an unconfigured-codec failure; playback must start again
    pub fn halt(&mut self) {
        self.cancel();
        self.started = false;
        self.halted = true;
    }

    /// Allow a halted pacer to start again
    pub fn clear_halt(&mut self) {
        self.halted = false;
    }

    /// Cancel the running task, if any
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel();
        }
    }

    fn schedule(&mut self, period: Duration) {
        self.cancel();
        self.next_generation += 1;
        let tick = PacingTick {
            stream_id: self.stream_id.clone(),
            instance: self.instance,
            kind: self.kind,
            generation: self.next_generation,
        };
        debug!(
            stream_id = %self.stream_id,
            kind = %self.kind,
            period_ms = period.as_secs_f64() * 1000.0,
            "Scheduling pacing task"
        );
        self.task = Some(PacingTask::spawn(tick, period, self.ticks.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn approx(a: Duration, ms: f64) -> bool {
        (a.as_secs_f64() * 1000.0 - ms).abs() < 1e-6
    }

    #[test]
    fn test_video_table_boundaries() {
        let speed = |n| target_speed(MediaKind::Video, n);
        assert_eq!(speed(0), SpeedStep::new(0, 1.05));
        assert_eq!(speed(5), SpeedStep::new(0, 1.05));
        assert_eq!(speed(6), SpeedStep::new(1, 1.00));
        assert_eq!(speed(10), SpeedStep::new(1, 1.00));
        assert_eq!(speed(11), SpeedStep::new(2, 0.85));
        assert_eq!(speed(15), SpeedStep::new(2, 0.85));
        assert_eq!(speed(16), SpeedStep::new(3, 0.75));
        assert_eq!(speed(60), SpeedStep::new(3, 0.75));
    }

    #[test]
    fn test_audio_table_boundaries() {
        let speed = |n| target_speed(MediaKind::Audio, n);
        assert_eq!(speed(5), SpeedStep::new(-1, 1.05));
        assert_eq!(speed(6), SpeedStep::new(0, 1.00));
        assert_eq!(speed(11), SpeedStep::new(1, 0.93));
        assert_eq!(speed(16), SpeedStep::new(2, 0.85));
    }

    #[test]
    fn test_base_period() {
        assert_eq!(base_period_ms(50.0), Some(20.0));
        assert_eq!(base_period_ms(0.0), None);
        assert_eq!(base_period_ms(f64::NAN), None);
        assert!(approx(scaled_period(20.0, 0.75), 15.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_ticks_until_cancelled() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let tick = PacingTick {
            stream_id: "s".into(),
            instance: 1,
            kind: MediaKind::Video,
            generation: 4,
        };
        let started = Instant::now();
        let task = PacingTask::spawn(tick.clone(), Duration::from_millis(20), tx);

        assert_eq!(rx.recv().await, Some(tick));
        assert!(started.elapsed() >= Duration::from_millis(20));

        task.cancel();
        let drained = time::timeout(Duration::from_secs(1), async {
            while rx.recv().await.is_some() {}
        })
        .await;
        assert!(drained.is_ok(), "task kept running after cancel");
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacer_start_and_retune() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut pacer = Pacer::new(MediaKind::Video, "s", 1, tx);
        let base = 1000.0 / 30.0;

        assert!(!pacer.should_start(29, 30));
        assert!(pacer.should_start(30, 30));
        pacer.start(base);

        let state = pacer.state().unwrap();
        assert_eq!(state.speed, 0);
        assert!(approx(state.period, base));
        assert!(pacer.is_current(1));
        assert!(!pacer.should_start(40, 30));

        assert!(pacer.retune(16, base));
        let state = pacer.state().unwrap();
        assert_eq!(state.speed, 3);
        assert!(approx(state.period, base * 0.75));
        assert!(!pacer.is_current(1));
        assert!(pacer.is_current(2));

        // Same speed: no reschedule
        assert!(!pacer.retune(40, base));
        assert!(pacer.is_current(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_halt_blocks_restart_until_cleared() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut pacer = Pacer::new(MediaKind::Audio, "s", 1, tx);
        pacer.start(1000.0 / 46.875);
        pacer.halt();

        assert!(!pacer.is_running());
        assert!(!pacer.is_started());
        assert!(!pacer.should_start(46, 23));

        pacer.clear_halt();
        assert!(pacer.should_start(46, 23));
    }

    proptest! {
        #[test]
        fn prop_speed_is_pure(occupancy in 0usize..200) {
            for kind in [MediaKind::Video, MediaKind::Audio] {
                prop_assert_eq!(target_speed(kind, occupancy), target_speed(kind, occupancy));
            }
        }

        #[test]
        fn prop_fuller_buffer_never_slower(a in 0usize..100, b in 0usize..100) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            for kind in [MediaKind::Video, MediaKind::Audio] {
                prop_assert!(target_speed(kind, hi).speed >= target_speed(kind, lo).speed);
                prop_assert!(target_speed(kind, hi).multiplier <= target_speed(kind, lo).multiplier);
            }
        }
    }
}
