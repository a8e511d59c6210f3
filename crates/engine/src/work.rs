//! Two-pool work scheduler with phased shutdown and hierarchical scopes.
//!
//! A bounded compute pool runs classification and diff work; a single-worker
//! I/O pool serializes every report and artifact write, giving a total order
//! over disk output without per-write locking. The run has two phases:
//! *gathering*, while the structural walk is still discovering work and the
//! total is unknown, and *draining*, once the walk has finished and progress
//! can be shown as a fraction.
//!
//! Shutdown is ordered: when gathering has ended and outstanding compute
//! work reaches zero the compute pool is closed and joined; only then is the
//! I/O pool allowed to drain and stop. [`WorkManager::wait_done`] returns
//! after both pools have fully quiesced, waiting without a timeout.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};
use indicatif::{ProgressBar, ProgressStyle};

/// A unit of work accepted by either pool.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Submission interface handed to the comparator through the context.
///
/// [`WorkManager`] implements it directly; a reporting sink that needs to
/// observe directory boundaries wraps it in a [`ScopedQueue`] so the handles
/// of one subtree can be joined independently of the global drain.
pub trait WorkQueue: Send + Sync {
    /// Submits compute work and returns a joinable handle.
    fn submit(&self, title: String, work: Job) -> TaskHandle;
    /// Submits serialized I/O work (report records, artifact writes).
    fn io(&self, work: Job);
}

/// Completion handle for one submitted compute task.
#[derive(Clone)]
pub struct TaskHandle {
    state: Arc<HandleState>,
}

struct HandleState {
    done: Mutex<bool>,
    completed: Condvar,
}

impl TaskHandle {
    fn new() -> Self {
        Self {
            state: Arc::new(HandleState {
                done: Mutex::new(false),
                completed: Condvar::new(),
            }),
        }
    }

    /// Blocks until the task has run (or was abandoned by a panic).
    pub fn wait(&self) {
        let mut done = self.state.done.lock().expect("task handle mutex poisoned");
        while !*done {
            done = self
                .state
                .completed
                .wait(done)
                .expect("task handle mutex poisoned");
        }
    }

    fn complete(&self) {
        let mut done = self.state.done.lock().expect("task handle mutex poisoned");
        *done = true;
        self.state.completed.notify_all();
    }
}

/// Join object over the subset of work submitted within one directory scope.
#[derive(Default)]
pub struct TaskScope {
    pending: Mutex<Vec<TaskHandle>>,
}

impl TaskScope {
    /// Creates an empty scope.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Tracks one submitted task.
    pub fn add(&self, handle: TaskHandle) {
        self.pending
            .lock()
            .expect("task scope mutex poisoned")
            .push(handle);
    }

    /// Waits until every tracked task has completed, including tasks that
    /// running tasks submit into the scope while the join is in progress.
    pub fn join(&self) {
        loop {
            let batch = std::mem::take(
                &mut *self.pending.lock().expect("task scope mutex poisoned"),
            );
            if batch.is_empty() {
                return;
            }
            for handle in batch {
                handle.wait();
            }
        }
    }
}

/// A [`WorkQueue`] decorator that records every compute submission in a
/// [`TaskScope`].
pub struct ScopedQueue {
    inner: Arc<dyn WorkQueue>,
    scope: Arc<TaskScope>,
}

impl ScopedQueue {
    /// Wraps a queue so submissions are tracked by `scope`.
    #[must_use]
    pub fn new(inner: Arc<dyn WorkQueue>, scope: Arc<TaskScope>) -> Arc<Self> {
        Arc::new(Self { inner, scope })
    }
}

impl WorkQueue for ScopedQueue {
    fn submit(&self, title: String, work: Job) -> TaskHandle {
        let handle = self.inner.submit(title, work);
        self.scope.add(handle.clone());
        handle
    }

    fn io(&self, work: Job) {
        self.inner.io(work);
    }
}

struct Task {
    title: String,
    work: Job,
    handle: TaskHandle,
}

struct Shared {
    gathering: AtomicBool,
    scheduled: AtomicU64,
    todo_compute: AtomicU64,
    todo_io: AtomicU64,
    drain: Mutex<()>,
    drained: Condvar,
    progress: Option<ProgressBar>,
}

impl Shared {
    fn finish_compute_task(&self) {
        if let Some(progress) = &self.progress {
            progress.inc(1);
        }
        let remaining = self.todo_compute.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 {
            let _guard = self.drain.lock().expect("drain mutex poisoned");
            self.drained.notify_all();
        }
    }

    fn run_compute(&self, task: Task) {
        if let Some(progress) = &self.progress {
            progress.set_message(short_title(&task.title));
        }
        if catch_unwind(AssertUnwindSafe(task.work)).is_err() {
            tracing::error!(title = %task.title, "compute task panicked");
        }
        self.finish_compute_task();
        task.handle.complete();
    }

    fn run_io(&self, task: Task) {
        if catch_unwind(AssertUnwindSafe(task.work)).is_err() {
            tracing::error!(title = %task.title, "io task panicked");
        }
        self.todo_io.fetch_sub(1, Ordering::SeqCst);
        task.handle.complete();
    }
}

/// The two-pool scheduler.
pub struct WorkManager {
    shared: Arc<Shared>,
    compute_tx: Mutex<Option<Sender<Task>>>,
    io_tx: Mutex<Option<Sender<Task>>>,
    compute_workers: Mutex<Vec<JoinHandle<()>>>,
    io_worker: Mutex<Option<JoinHandle<()>>>,
}

impl WorkManager {
    /// Starts both pools. The compute pool is sized to the available
    /// parallelism minus one, leaving a core for the structural walk.
    #[must_use]
    pub fn new(show_progress: bool) -> Arc<Self> {
        let progress = show_progress.then(|| {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner} {pos} compared {wide_msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar
        });

        let shared = Arc::new(Shared {
            gathering: AtomicBool::new(true),
            scheduled: AtomicU64::new(0),
            todo_compute: AtomicU64::new(0),
            todo_io: AtomicU64::new(0),
            drain: Mutex::new(()),
            drained: Condvar::new(),
            progress,
        });

        let workers = thread::available_parallelism()
            .map(|cores| cores.get().saturating_sub(1).max(1))
            .unwrap_or(1);

        let (compute_tx, compute_rx) = unbounded::<Task>();
        let compute_workers = (0..workers)
            .map(|index| {
                let rx: Receiver<Task> = compute_rx.clone();
                let shared = Arc::clone(&shared);
                thread::Builder::new()
                    .name(format!("compare-{index}"))
                    .spawn(move || {
                        while let Ok(task) = rx.recv() {
                            shared.run_compute(task);
                        }
                    })
                    .expect("spawn compute worker")
            })
            .collect();

        let (io_tx, io_rx) = unbounded::<Task>();
        let io_worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("report-io".to_string())
                .spawn(move || {
                    while let Ok(task) = io_rx.recv() {
                        shared.run_io(task);
                    }
                })
                .expect("spawn io worker")
        };

        Arc::new(Self {
            shared,
            compute_tx: Mutex::new(Some(compute_tx)),
            io_tx: Mutex::new(Some(io_tx)),
            compute_workers: Mutex::new(compute_workers),
            io_worker: Mutex::new(Some(io_worker)),
        })
    }

    /// Total compute submissions so far; fixed once draining starts.
    #[must_use]
    pub fn scheduled(&self) -> u64 {
        self.shared.scheduled.load(Ordering::SeqCst)
    }

    /// Ends the gathering phase and blocks until both pools have fully
    /// quiesced. The compute pool is shut down first; the I/O pool drains
    /// whatever the compute tasks produced and is shut down second.
    pub fn wait_done(&self) {
        self.shared.gathering.store(false, Ordering::SeqCst);
        if let Some(progress) = &self.shared.progress {
            progress.set_length(self.scheduled());
            progress.set_style(
                ProgressStyle::with_template("{bar:30} {pos}/{len} {wide_msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
        }

        {
            let mut guard = self.shared.drain.lock().expect("drain mutex poisoned");
            while self.shared.todo_compute.load(Ordering::SeqCst) > 0 {
                guard = self
                    .shared
                    .drained
                    .wait(guard)
                    .expect("drain mutex poisoned");
            }
        }

        *self
            .compute_tx
            .lock()
            .expect("compute sender mutex poisoned") = None;
        let workers = std::mem::take(
            &mut *self
                .compute_workers
                .lock()
                .expect("compute workers mutex poisoned"),
        );
        for worker in workers {
            if worker.join().is_err() {
                tracing::error!("compute worker exited abnormally");
            }
        }

        *self.io_tx.lock().expect("io sender mutex poisoned") = None;
        let io_worker = self
            .io_worker
            .lock()
            .expect("io worker mutex poisoned")
            .take();
        if let Some(worker) = io_worker {
            if worker.join().is_err() {
                tracing::error!("io worker exited abnormally");
            }
        }

        if let Some(progress) = &self.shared.progress {
            progress.finish_and_clear();
        }
    }
}

impl WorkQueue for WorkManager {
    fn submit(&self, title: String, work: Job) -> TaskHandle {
        let handle = TaskHandle::new();
        self.shared.scheduled.fetch_add(1, Ordering::SeqCst);
        self.shared.todo_compute.fetch_add(1, Ordering::SeqCst);

        let task = Task {
            title,
            work,
            handle: handle.clone(),
        };
        let rejected = {
            let guard = self
                .compute_tx
                .lock()
                .expect("compute sender mutex poisoned");
            match guard.as_ref() {
                Some(sender) => sender.send(task).err().map(|error| error.0),
                None => Some(task),
            }
        };
        // A submission after shutdown has nowhere to queue; run it on the
        // caller so its handle still completes.
        if let Some(task) = rejected {
            self.shared.run_compute(task);
        }

        handle
    }

    fn io(&self, work: Job) {
        let handle = TaskHandle::new();
        self.shared.todo_io.fetch_add(1, Ordering::SeqCst);

        let task = Task {
            title: String::new(),
            work,
            handle,
        };
        let rejected = {
            let guard = self.io_tx.lock().expect("io sender mutex poisoned");
            match guard.as_ref() {
                Some(sender) => sender.send(task).err().map(|error| error.0),
                None => Some(task),
            }
        };
        if let Some(task) = rejected {
            self.shared.run_io(task);
        }
    }
}

fn short_title(title: &str) -> String {
    const WIDTH: usize = 60;
    let chars: Vec<char> = title.chars().collect();
    if chars.len() <= WIDTH {
        title.to_string()
    } else {
        chars[chars.len() - WIDTH..].iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn wait_done_drains_compute_and_io() {
        let manager = WorkManager::new(false);
        let compute_runs = Arc::new(AtomicUsize::new(0));
        let io_runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..32 {
            let compute_runs = Arc::clone(&compute_runs);
            let io_runs = Arc::clone(&io_runs);
            let manager_for_task = Arc::clone(&manager);
            manager.submit(
                "task".to_string(),
                Box::new(move || {
                    compute_runs.fetch_add(1, Ordering::SeqCst);
                    manager_for_task.io(Box::new(move || {
                        io_runs.fetch_add(1, Ordering::SeqCst);
                    }));
                }),
            );
        }

        manager.wait_done();
        assert_eq!(compute_runs.load(Ordering::SeqCst), 32);
        assert_eq!(io_runs.load(Ordering::SeqCst), 32);
        assert_eq!(manager.scheduled(), 32);
    }

    #[test]
    fn nested_submissions_are_drained_before_wait_done_returns() {
        let manager = WorkManager::new(false);
        let runs = Arc::new(AtomicUsize::new(0));

        let outer_runs = Arc::clone(&runs);
        let manager_for_task = Arc::clone(&manager);
        manager.submit(
            "outer".to_string(),
            Box::new(move || {
                let inner_runs = Arc::clone(&outer_runs);
                manager_for_task.submit(
                    "inner".to_string(),
                    Box::new(move || {
                        inner_runs.fetch_add(1, Ordering::SeqCst);
                    }),
                );
                outer_runs.fetch_add(1, Ordering::SeqCst);
            }),
        );

        manager.wait_done();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn io_writes_preserve_submission_order() {
        let manager = WorkManager::new(false);
        let log = Arc::new(Mutex::new(Vec::new()));

        for index in 0..64 {
            let log = Arc::clone(&log);
            manager.io(Box::new(move || {
                log.lock().expect("log mutex").push(index);
            }));
        }

        manager.wait_done();
        let log = log.lock().expect("log mutex");
        assert_eq!(*log, (0..64).collect::<Vec<_>>());
    }

    #[test]
    fn scope_join_covers_tasks_submitted_during_the_join() {
        let manager = WorkManager::new(false);
        let scope = TaskScope::new();
        let queue: Arc<dyn WorkQueue> =
            ScopedQueue::new(manager.clone() as Arc<dyn WorkQueue>, Arc::clone(&scope));

        let runs = Arc::new(AtomicUsize::new(0));
        let outer_runs = Arc::clone(&runs);
        let queue_for_task = Arc::clone(&queue);
        queue.submit(
            "outer".to_string(),
            Box::new(move || {
                let inner_runs = Arc::clone(&outer_runs);
                queue_for_task.submit(
                    "inner".to_string(),
                    Box::new(move || {
                        inner_runs.fetch_add(1, Ordering::SeqCst);
                    }),
                );
                outer_runs.fetch_add(1, Ordering::SeqCst);
            }),
        );

        scope.join();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        manager.wait_done();
    }

    #[test]
    fn a_panicking_task_does_not_block_quiescence() {
        let manager = WorkManager::new(false);
        let runs = Arc::new(AtomicUsize::new(0));

        manager.submit("boom".to_string(), Box::new(|| panic!("task failure")));
        let survivor_runs = Arc::clone(&runs);
        manager.submit(
            "survivor".to_string(),
            Box::new(move || {
                survivor_runs.fetch_add(1, Ordering::SeqCst);
            }),
        );

        manager.wait_done();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
