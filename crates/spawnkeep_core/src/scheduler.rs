//! # Task Scheduling
//!
//! Spawn and leash loops are periodic tasks handed to a host scheduler. The
//! only guarantee the registry relies on is that a single task never runs
//! re-entrantly with itself.
//!
//! [`TickScheduler`] is the reference scheduler: a tick counter driven by
//! the server loop. A task is taken out of its slot while it runs, so it may
//! schedule or cancel other tasks (or itself) without deadlocking.
//!
//! ```text
//! tick() ──> collect due slots ──> run each (no lock held) ──> reinsert
//!                                     │
//!                                     └─ Cancel / cancelled meanwhile ──> drop
//! ```

use std::collections::BTreeMap;

use parking_lot::Mutex;

/// What a task wants after a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskControl {
    /// Run again next period.
    Continue,
    /// Never run again.
    Cancel,
}

/// A periodic unit of work.
pub trait RepeatingTask: Send {
    /// Runs one invocation.
    fn run(&mut self) -> TaskControl;
}

/// Handle to a scheduled task, used to cancel it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskHandle(pub u64);

/// Host scheduler capability.
pub trait TaskScheduler: Send + Sync {
    /// Schedules `task` to run every `period_ticks`, first run on the next tick.
    fn schedule_repeating(
        &self,
        label: &str,
        period_ticks: u64,
        task: Box<dyn RepeatingTask>,
    ) -> TaskHandle;

    /// Cancels a task. Returns false if it was not scheduled.
    fn cancel(&self, handle: TaskHandle) -> bool;

    /// Returns true while the task is scheduled.
    fn is_scheduled(&self, handle: TaskHandle) -> bool;
}

struct Slot {
    label: String,
    period: u64,
    next_due: u64,
    /// `None` while the task is running.
    task: Option<Box<dyn RepeatingTask>>,
}

#[derive(Default)]
struct SchedulerState {
    now: u64,
    next_id: u64,
    slots: BTreeMap<u64, Slot>,
}

/// Deterministic tick-driven scheduler.
///
/// Tasks due on the same tick run in the order they were scheduled.
#[derive(Default)]
pub struct TickScheduler {
    state: Mutex<SchedulerState>,
}

impl TickScheduler {
    /// Creates an idle scheduler at tick 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current tick.
    #[must_use]
    pub fn now(&self) -> u64 {
        self.state.lock().now
    }

    /// Number of scheduled tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().slots.len()
    }

    /// Returns true if nothing is scheduled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Label of a scheduled task.
    #[must_use]
    pub fn label(&self, handle: TaskHandle) -> Option<String> {
        self.state
            .lock()
            .slots
            .get(&handle.0)
            .map(|slot| slot.label.clone())
    }

    /// Advances one tick and runs every task due on it.
    ///
    /// Returns the number of task invocations.
    pub fn tick(&self) -> usize {
        let due: Vec<(u64, Box<dyn RepeatingTask>)> = {
            let mut state = self.state.lock();
            state.now += 1;
            let now = state.now;
            state
                .slots
                .iter_mut()
                .filter(|(_, slot)| slot.next_due <= now)
                .filter_map(|(id, slot)| {
                    slot.next_due = now + slot.period;
                    slot.task.take().map(|task| (*id, task))
                })
                .collect()
        };

        let mut ran = 0;
        for (id, mut task) in due {
            // An earlier task this tick may have cancelled this one.
            if !self.is_scheduled(TaskHandle(id)) {
                continue;
            }

            let control = task.run();
            ran += 1;

            let mut state = self.state.lock();
            match (control, state.slots.get_mut(&id)) {
                (TaskControl::Continue, Some(slot)) => slot.task = Some(task),
                (TaskControl::Cancel, Some(_)) => {
                    state.slots.remove(&id);
                }
                // Cancelled while running.
                (_, None) => {}
            }
        }
        ran
    }

    /// Runs `ticks` ticks. Returns the total number of task invocations.
    pub fn advance(&self, ticks: u64) -> usize {
        (0..ticks).map(|_| self.tick()).sum()
    }
}

impl TaskScheduler for TickScheduler {
    fn schedule_repeating(
        &self,
        label: &str,
        period_ticks: u64,
        task: Box<dyn RepeatingTask>,
    ) -> TaskHandle {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        let next_due = state.now + 1;
        state.slots.insert(
            id,
            Slot {
                label: label.to_string(),
                period: period_ticks.max(1),
                next_due,
                task: Some(task),
            },
        );
        TaskHandle(id)
    }

    fn cancel(&self, handle: TaskHandle) -> bool {
        self.state.lock().slots.remove(&handle.0).is_some()
    }

    fn is_scheduled(&self, handle: TaskHandle) -> bool {
        self.state.lock().slots.contains_key(&handle.0)
    }
}
