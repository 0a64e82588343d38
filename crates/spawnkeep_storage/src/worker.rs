//! # Persistence Worker
//!
//! One thread owns the [`Storage`] and runs jobs in submission order.
//!
//! ```text
//!   main context ──submit──> [bounded queue] ──> [worker thread] ──> Storage
//!        ^                                              │
//!        └──────────── JobHandle (completion) ──────────┘
//! ```
//!
//! Submitting never blocks: a full queue is reported as
//! [`StorageError::Backpressure`]. [`PersistenceWorker::drain`] waits for
//! every job submitted before it. Dropping the worker finishes the queued
//! jobs and joins the thread.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error};

use crate::backend::Storage;
use crate::error::{StorageError, StorageResult};

type Job = Box<dyn FnOnce(&mut dyn Storage) + Send>;

/// Worker configuration.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Jobs that may wait in the queue.
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { queue_capacity: 256 }
    }
}

/// Worker counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Jobs accepted into the queue.
    pub submitted: u64,
    /// Jobs run to completion.
    pub completed: u64,
    /// Jobs refused because the queue was full.
    pub rejected: u64,
}

/// Completion slot shared by a job and its handle.
struct JobSlot<T> {
    done: AtomicBool,
    result: Mutex<Option<T>>,
    condvar: Condvar,
}

impl<T> JobSlot<T> {
    fn new() -> Self {
        Self {
            done: AtomicBool::new(false),
            result: Mutex::new(None),
            condvar: Condvar::new(),
        }
    }

    fn signal(&self, value: Option<T>) {
        let mut result = self.result.lock();
        *result = value;
        self.done.store(true, Ordering::Release);
        self.condvar.notify_all();
    }
}

/// Signals the slot when the job finishes, or when it is dropped unrun.
struct Completer<T> {
    slot: Arc<JobSlot<T>>,
    finished: bool,
}

impl<T> Completer<T> {
    fn finish(mut self, value: T) {
        self.slot.signal(Some(value));
        self.finished = true;
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if !self.finished {
            self.slot.signal(None);
        }
    }
}

/// Handle returned for every submitted job.
pub struct JobHandle<T> {
    slot: Arc<JobSlot<T>>,
    label: &'static str,
}

impl<T> std::fmt::Debug for JobHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("label", &self.label)
            .field("done", &self.is_done())
            .finish()
    }
}

impl<T> JobHandle<T> {
    /// Job label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Returns true once the job finished or was dropped.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.slot.done.load(Ordering::Acquire)
    }

    /// Waits up to `timeout`. Returns true if the job is done.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.slot.result.lock();
        while !self.is_done() {
            if self.slot.condvar.wait_until(&mut guard, deadline).timed_out() {
                return self.is_done();
            }
        }
        true
    }

    /// Blocks until the job is done and returns its result.
    ///
    /// # Errors
    ///
    /// [`StorageError::WorkerGone`] if the worker stopped before running it.
    pub fn wait(self) -> StorageResult<T> {
        {
            let mut guard = self.slot.result.lock();
            while !self.is_done() {
                self.slot.condvar.wait(&mut guard);
            }
        }
        self.take()
    }

    /// Waits up to `timeout` and returns the job's result.
    ///
    /// # Errors
    ///
    /// [`StorageError::Timeout`] if the job is still running,
    /// [`StorageError::WorkerGone`] if it was never run.
    pub fn wait_for(self, timeout: Duration) -> StorageResult<T> {
        if !self.wait_timeout(timeout) {
            return Err(StorageError::Timeout(timeout));
        }
        self.take()
    }

    fn take(self) -> StorageResult<T> {
        self.slot.result.lock().take().ok_or(StorageError::WorkerGone)
    }
}

/// Storage thread with a bounded job queue.
pub struct PersistenceWorker {
    sender: Option<Sender<Job>>,
    thread: Option<JoinHandle<()>>,
    submitted: AtomicU64,
    rejected: AtomicU64,
    completed: Arc<AtomicU64>,
}

impl PersistenceWorker {
    /// Starts the worker thread, moving `storage` onto it.
    ///
    /// # Errors
    ///
    /// [`StorageError::Unavailable`] if the thread cannot be spawned.
    pub fn start(storage: Box<dyn Storage>, config: &WorkerConfig) -> StorageResult<Self> {
        let (sender, receiver) = bounded::<Job>(config.queue_capacity.max(1));
        let completed = Arc::new(AtomicU64::new(0));
        let worker_completed = Arc::clone(&completed);

        let thread = thread::Builder::new()
            .name("spawnkeep-persistence".to_string())
            .spawn(move || {
                let mut storage = storage;
                for job in receiver.iter() {
                    job(storage.as_mut());
                    worker_completed.fetch_add(1, Ordering::Relaxed);
                }
                debug!("Persistence worker stopped");
            })?;

        Ok(Self {
            sender: Some(sender),
            thread: Some(thread),
            submitted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            completed,
        })
    }

    /// Queues a job without blocking.
    ///
    /// # Errors
    ///
    /// [`StorageError::Backpressure`] if the queue is full,
    /// [`StorageError::WorkerGone`] if the worker stopped.
    pub fn submit<T, F>(&self, label: &'static str, job: F) -> StorageResult<JobHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn Storage) -> T + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(StorageError::WorkerGone)?;
        let (boxed, handle) = Self::package(label, job);
        match sender.try_send(boxed) {
            Ok(()) => {
                self.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(handle)
            }
            Err(TrySendError::Full(_)) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                error!("Persistence queue full, rejected {label}");
                Err(StorageError::Backpressure)
            }
            Err(TrySendError::Disconnected(_)) => Err(StorageError::WorkerGone),
        }
    }

    /// Waits until every job submitted before this call has run.
    ///
    /// # Errors
    ///
    /// [`StorageError::WorkerGone`] if the worker stopped.
    pub fn drain(&self) -> StorageResult<()> {
        let sender = self.sender.as_ref().ok_or(StorageError::WorkerGone)?;
        let (marker, handle) = Self::package("drain", |_: &mut dyn Storage| ());
        sender.send(marker).map_err(|_| StorageError::WorkerGone)?;
        self.submitted.fetch_add(1, Ordering::Relaxed);
        handle.wait()
    }

    /// Jobs waiting in the queue.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.sender.as_ref().map_or(0, Sender::len)
    }

    /// Counters.
    #[must_use]
    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }

    fn package<T, F>(label: &'static str, job: F) -> (Job, JobHandle<T>)
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn Storage) -> T + Send + 'static,
    {
        let slot = Arc::new(JobSlot::new());
        let completer = Completer {
            slot: Arc::clone(&slot),
            finished: false,
        };
        let boxed: Job = Box::new(move |storage: &mut dyn Storage| {
            let value = job(storage);
            completer.finish(value);
        });
        (boxed, JobHandle { slot, label })
    }
}

impl Drop for PersistenceWorker {
    fn drop(&mut self) {
        // Closing the channel lets the thread finish the queue and exit.
        drop(self.sender.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Persistence worker panicked");
            }
        }
    }
}
