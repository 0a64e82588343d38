//! # Server Tick Loop
//!
//! Fixed-timestep loop that drives the [`TickScheduler`].
//!
//! Every tick runs the spawn and leash loops that are due; a slow tick is
//! counted as late and the loop catches up without sleeping.

use std::thread;
use std::time::{Duration, Instant};

use spawnkeep_core::TickScheduler;
use tracing::{debug, warn};

/// Tick timing statistics.
#[derive(Clone, Copy, Debug, Default)]
pub struct TickStats {
    /// Minimum tick duration observed.
    pub min_tick_us: u64,
    /// Maximum tick duration observed.
    pub max_tick_us: u64,
    /// Rolling average tick duration.
    pub avg_tick_us: u64,
    /// Ticks that took longer than the budget.
    pub late_ticks: u64,
    /// Ticks measured.
    pub total_ticks: u64,
    /// Scheduled tasks run.
    pub tasks_run: u64,
}

/// Fixed-timestep tick loop controller.
pub struct TickLoop {
    tick_duration: Duration,
    last_tick: Instant,
    accumulator: Duration,
    tick_count: u64,
    stats: TickStats,
}

impl TickLoop {
    /// Creates a loop running `tick_rate` ticks per second.
    #[must_use]
    pub fn new(tick_rate: u32) -> Self {
        let tick_duration = Duration::from_micros(1_000_000 / u64::from(tick_rate.max(1)));
        Self {
            tick_duration,
            last_tick: Instant::now(),
            accumulator: Duration::ZERO,
            tick_count: 0,
            stats: Self::fresh_stats(tick_duration),
        }
    }

    fn fresh_stats(tick_duration: Duration) -> TickStats {
        TickStats {
            min_tick_us: u64::MAX,
            avg_tick_us: tick_duration.as_micros() as u64,
            ..TickStats::default()
        }
    }

    /// Returns true if a tick is due.
    #[must_use]
    pub fn should_tick(&mut self) -> bool {
        let now = Instant::now();
        self.accumulator += now.duration_since(self.last_tick);
        self.last_tick = now;
        self.accumulator >= self.tick_duration
    }

    /// Runs one tick of `scheduler` and records its duration.
    pub fn step(&mut self, scheduler: &TickScheduler) -> usize {
        self.accumulator = self.accumulator.saturating_sub(self.tick_duration);
        self.tick_count += 1;
        let start = Instant::now();
        let ran = scheduler.tick();
        self.record(start.elapsed(), ran);
        ran
    }

    fn record(&mut self, duration: Duration, ran: usize) {
        let duration_us = duration.as_micros() as u64;
        let stats = &mut self.stats;
        stats.total_ticks += 1;
        stats.tasks_run += ran as u64;
        stats.min_tick_us = stats.min_tick_us.min(duration_us);
        stats.max_tick_us = stats.max_tick_us.max(duration_us);
        stats.avg_tick_us = (stats.avg_tick_us * 15 + duration_us) / 16;
        if duration > self.tick_duration {
            stats.late_ticks += 1;
            warn!(
                "Tick {} took {duration_us}us, budget {}us",
                self.tick_count,
                self.tick_duration.as_micros()
            );
        }
    }

    /// Sleeps until the next tick is due.
    pub fn wait_for_next_tick(&self) {
        let elapsed = self.last_tick.elapsed() + self.accumulator;
        if elapsed < self.tick_duration {
            thread::sleep(self.tick_duration - elapsed);
        }
    }

    /// Runs `ticks` ticks at the configured rate.
    pub fn run_for(&mut self, scheduler: &TickScheduler, ticks: u64) {
        let target = self.tick_count + ticks;
        while self.tick_count < target {
            while self.tick_count < target && self.should_tick() {
                self.step(scheduler);
            }
            if self.tick_count < target {
                self.wait_for_next_tick();
            }
        }
        debug!("Ran {ticks} ticks, {} tasks", self.stats.tasks_run);
    }

    /// Ticks executed so far.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Timing statistics.
    #[must_use]
    pub const fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// Target tick duration.
    #[must_use]
    pub const fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    /// Resets statistics.
    pub fn reset_stats(&mut self) {
        self.stats = Self::fresh_stats(self.tick_duration);
    }
}
