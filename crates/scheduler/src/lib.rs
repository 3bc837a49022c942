use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};

pub const DEFAULT_TARGET_FPS: f32 = 60.0;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("target fps must be a positive finite number, got {0}")]
    InvalidTargetFps(f32),
    #[error("frame scheduler already started")]
    AlreadyRunning,
}

/// Counters owned by a running scheduler. Only `FrameScheduler::tick` mutates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameState {
    pub frame_count: u64,
    pub start_time: Instant,
    pub last_tick: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchedulerState {
    Uninitialized,
    Running(FrameState),
}

/// Numbers pushed to the FPS display after every accepted tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    /// Cumulative frames per second since the loop started.
    pub fps: u32,
    /// Milliseconds since the previous accepted tick, rounded.
    pub mspt: u32,
}

/// Everything the draw step needs to know about the tick being rendered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcceptedTick {
    pub now: Instant,
    pub elapsed: Duration,
    /// Frame counter before this tick increments it.
    pub frame_index: u64,
    /// Simulated clock: accepted ticks divided by the target rate.
    pub seconds: f32,
    pub stats: FrameStats,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickDecision {
    Skipped,
    Rendered(AcceptedTick),
}

impl TickDecision {
    pub fn is_rendered(&self) -> bool {
        matches!(self, TickDecision::Rendered(_))
    }
}

#[derive(Debug, Clone)]
pub struct FrameScheduler {
    target_fps: f32,
    interval: Duration,
    state: SchedulerState,
    last_stats: Option<FrameStats>,
}

impl FrameScheduler {
    pub fn new(target_fps: f32) -> Result<Self, SchedulerError> {
        if !target_fps.is_finite() || target_fps <= 0.0 {
            return Err(SchedulerError::InvalidTargetFps(target_fps));
        }
        Ok(Self {
            target_fps,
            interval: Duration::from_secs_f64(1.0 / f64::from(target_fps)),
            state: SchedulerState::Uninitialized,
            last_stats: None,
        })
    }

    /// Moves `Uninitialized -> Running`. Only valid once.
    pub fn start(&mut self, now: Instant) -> Result<(), SchedulerError> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }
        self.state = SchedulerState::Running(FrameState {
            frame_count: 0,
            start_time: now,
            last_tick: now,
        });
        tracing::debug!(
            target_fps = self.target_fps,
            interval_us = self.interval.as_micros() as u64,
            "frame scheduler running"
        );
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, SchedulerState::Running(_))
    }

    pub fn target_fps(&self) -> f32 {
        self.target_fps
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn frame_state(&self) -> Option<FrameState> {
        match self.state {
            SchedulerState::Running(state) => Some(state),
            SchedulerState::Uninitialized => None,
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_state().map_or(0, |state| state.frame_count)
    }

    /// Stats from the most recent accepted tick, if any.
    pub fn last_stats(&self) -> Option<FrameStats> {
        self.last_stats
    }

    /// Runs one refresh callback.
    ///
    /// Early refreshes are skipped without touching any state. Accepted ticks
    /// phase-lock `last_tick` to the target cadence, publish FPS stats, hand
    /// the tick to `draw`, and count the frame only when `draw` succeeds.
    pub fn tick<F, E>(&mut self, now: Instant, draw: F) -> Result<TickDecision, E>
    where
        F: FnOnce(&AcceptedTick) -> Result<(), E>,
    {
        let SchedulerState::Running(state) = &mut self.state else {
            return Ok(TickDecision::Skipped);
        };

        let elapsed = now.saturating_duration_since(state.last_tick);
        if elapsed < self.interval {
            return Ok(TickDecision::Skipped);
        }

        state.last_tick = now - phase_offset(elapsed, self.interval);

        let stats = FrameStats {
            fps: cumulative_fps(state.frame_count, now.saturating_duration_since(state.start_time)),
            mspt: (elapsed.as_secs_f64() * 1000.0).round() as u32,
        };
        self.last_stats = Some(stats);

        let tick = AcceptedTick {
            now,
            elapsed,
            frame_index: state.frame_count,
            seconds: (state.frame_count as f64 / f64::from(self.target_fps)) as f32,
            stats,
        };

        draw(&tick)?;
        state.frame_count = state.frame_count.saturating_add(1);
        Ok(TickDecision::Rendered(tick))
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self {
            target_fps: DEFAULT_TARGET_FPS,
            interval: Duration::from_secs_f64(1.0 / f64::from(DEFAULT_TARGET_FPS)),
            state: SchedulerState::Uninitialized,
            last_stats: None,
        }
    }
}

/// `elapsed mod interval`, the part of the overshoot carried into the next tick.
fn phase_offset(elapsed: Duration, interval: Duration) -> Duration {
    let remainder = elapsed.as_secs_f64() % interval.as_secs_f64();
    Duration::from_secs_f64(remainder).min(elapsed)
}

/// Frames since start over wall-clock since start, not a sliding window.
pub fn cumulative_fps(frame_count: u64, since_start: Duration) -> u32 {
    let millis = since_start.as_secs_f64() * 1000.0;
    if millis <= 0.0 {
        return 0;
    }
    (frame_count as f64 / millis * 1000.0).round() as u32
}

/// Source of refresh callbacks ("wait for the next display refresh").
///
/// Returning `None` ends the loop driven by [`drive`].
pub trait RefreshSignal {
    fn next_refresh(&mut self) -> Option<Instant>;
}

/// Pulls refreshes from `signal` until it ends or `on_refresh` fails.
/// Returns how many refreshes were delivered.
pub fn drive<S, F, E>(signal: &mut S, mut on_refresh: F) -> Result<u64, E>
where
    S: RefreshSignal + ?Sized,
    F: FnMut(Instant) -> Result<(), E>,
{
    let mut delivered = 0u64;
    while let Some(now) = signal.next_refresh() {
        on_refresh(now)?;
        delivered += 1;
    }
    Ok(delivered)
}

/// Sleeps the calling thread on a fixed cadence, like a vblank would.
#[derive(Debug, Clone)]
pub struct PacedRefresh {
    cadence: Duration,
    remaining: Option<u64>,
    next_deadline: Option<Instant>,
}

impl PacedRefresh {
    pub fn new(cadence: Duration) -> Self {
        Self {
            cadence,
            remaining: None,
            next_deadline: None,
        }
    }

    /// Stops after `count` refreshes.
    pub fn limit(mut self, count: u64) -> Self {
        self.remaining = Some(count);
        self
    }
}

impl RefreshSignal for PacedRefresh {
    fn next_refresh(&mut self) -> Option<Instant> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return None;
            }
            *remaining -= 1;
        }

        let now = Instant::now();
        let deadline = self.next_deadline.unwrap_or(now);
        if deadline > now {
            thread::sleep(deadline - now);
        }
        let fired = Instant::now();
        let next = deadline + self.cadence;
        // Late wakeups re-anchor instead of bursting to catch up.
        self.next_deadline = Some(if next < fired { fired + self.cadence } else { next });
        Some(fired)
    }
}

/// Scripted refresh timestamps for driving the loop without a clock.
#[derive(Debug, Clone, Default)]
pub struct SimulatedRefresh {
    pending: VecDeque<Instant>,
}

impl SimulatedRefresh {
    pub fn new<I>(timestamps: I) -> Self
    where
        I: IntoIterator<Item = Instant>,
    {
        Self {
            pending: timestamps.into_iter().collect(),
        }
    }

    /// Refreshes every `step` starting at `origin + step`.
    pub fn every(origin: Instant, step: Duration, count: u32) -> Self {
        Self::new((1..=count).map(|index| origin + step * index))
    }

    pub fn push(&mut self, at: Instant) {
        self.pending.push_back(at);
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl RefreshSignal for SimulatedRefresh {
    fn next_refresh(&mut self) -> Option<Instant> {
        self.pending.pop_front()
    }
}
