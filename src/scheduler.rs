//! One-shot job scheduling
//!
//! The client only needs three operations from a scheduler: schedule a named
//! job at an instant (replacing any job with the same name), cancel it, and
//! ask whether it exists. [`MemoryScheduler`] records jobs for hosts that
//! drive their own cron, and [`TimerScheduler`] runs a worker thread that
//! fires jobs on time and can persist its table across restarts.

use crate::credential::now_secs;
use crate::error::SchedulerError;
use fs2::FileExt;
use parking_lot::{Condvar, Mutex, MutexGuard, RwLock};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Longest the worker sleeps before re-reading the clock
const MAX_SLEEP: Duration = Duration::from_secs(3600);

/// Callback invoked with the job id when a job fires
pub type JobHandler = Arc<dyn Fn(&str) + Send + Sync>;

pub trait Scheduler: Send + Sync {
    /// Schedule `job_id` to run at `run_at` (epoch seconds), replacing any
    /// existing job with the same id
    fn schedule_once(&self, job_id: &str, run_at: u64) -> Result<(), SchedulerError>;

    /// Cancel `job_id`; cancelling a missing job is not an error
    fn cancel(&self, job_id: &str) -> Result<(), SchedulerError>;

    fn is_scheduled(&self, job_id: &str) -> bool {
        self.next_run(job_id).is_some()
    }

    fn next_run(&self, job_id: &str) -> Option<u64>;
}

/// Scheduler that only records jobs
#[derive(Debug, Default, Clone)]
pub struct MemoryScheduler {
    jobs: Arc<RwLock<HashMap<String, u64>>>,
}

impl MemoryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job_count(&self) -> usize {
        self.jobs.read().len()
    }
}

impl Scheduler for MemoryScheduler {
    fn schedule_once(&self, job_id: &str, run_at: u64) -> Result<(), SchedulerError> {
        self.jobs.write().insert(job_id.to_string(), run_at);
        Ok(())
    }

    fn cancel(&self, job_id: &str) -> Result<(), SchedulerError> {
        self.jobs.write().remove(job_id);
        Ok(())
    }

    fn next_run(&self, job_id: &str) -> Option<u64> {
        self.jobs.read().get(job_id).copied()
    }
}

/// Persisted job table owned by a single process
///
/// Ownership is an exclusive lock on `<table>.lock`, held for the lifetime of
/// the table and released when the lock file is closed.
struct JobTable {
    path: PathBuf,
    _lock: File,
}

impl JobTable {
    fn open(path: PathBuf) -> Result<Self, SchedulerError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock_path = path.with_extension("lock");
        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        match lock.try_lock_exclusive() {
            Ok(()) => {}
            Err(e) if e.kind() == IoErrorKind::WouldBlock => {
                return Err(SchedulerError::AlreadyOwned(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Self { path, _lock: lock })
    }

    fn load(&self) -> Result<HashMap<String, u64>, SchedulerError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, jobs: &HashMap<String, u64>) -> Result<(), SchedulerError> {
        let temp = self.path.with_extension("json.tmp");
        fs::write(&temp, serde_json::to_string_pretty(jobs)?)?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

struct State {
    jobs: HashMap<String, u64>,
    handler: Option<JobHandler>,
    shutdown: bool,
}

struct Shared {
    state: Mutex<State>,
    wakeup: Condvar,
    table: Option<JobTable>,
}

impl Shared {
    fn persist(&self, jobs: &HashMap<String, u64>) -> Result<(), SchedulerError> {
        match &self.table {
            Some(table) => table.store(jobs),
            None => Ok(()),
        }
    }
}

/// Scheduler backed by a dedicated worker thread
///
/// Jobs fire as soon as their instant passes, independent of any incoming
/// request. Jobs that came due while no handler was registered (or while the
/// process was down, for a persistent table) fire once a handler is set.
pub struct TimerScheduler {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl TimerScheduler {
    /// Create a scheduler whose jobs live only in memory
    pub fn new() -> Result<Self, SchedulerError> {
        Self::start(None, HashMap::new())
    }

    /// Create a scheduler persisting its jobs to `path`
    pub fn persistent(path: impl AsRef<Path>) -> Result<Self, SchedulerError> {
        let table = JobTable::open(path.as_ref().to_path_buf())?;
        let jobs = table.load()?;
        debug!(jobs = jobs.len(), path = %table.path.display(), "loaded job table");
        Self::start(Some(table), jobs)
    }

    /// Persistent scheduler under `<data_dir>/<app_name>/jobs.json`
    pub fn for_app(app_name: &str) -> Result<Self, SchedulerError> {
        let base_dir = match std::env::var("XDG_DATA_HOME") {
            Ok(xdg_data) => PathBuf::from(xdg_data),
            Err(_) => dirs::data_dir().ok_or_else(|| {
                SchedulerError::Io(std::io::Error::new(
                    IoErrorKind::NotFound,
                    "Could not determine data directory",
                ))
            })?,
        };
        Self::persistent(base_dir.join(app_name).join("jobs.json"))
    }

    fn start(table: Option<JobTable>, jobs: HashMap<String, u64>) -> Result<Self, SchedulerError> {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                jobs,
                handler: None,
                shutdown: false,
            }),
            wakeup: Condvar::new(),
            table,
        });

        let worker_shared = shared.clone();
        let worker = thread::Builder::new()
            .name("kitapi-scheduler".to_string())
            .spawn(move || run_worker(worker_shared))?;

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Register the callback run when a job fires
    pub fn set_handler(&self, handler: JobHandler) {
        let mut state = self.shared.state.lock();
        state.handler = Some(handler);
        self.shared.wakeup.notify_all();
    }

    fn update<F>(&self, change: F) -> Result<(), SchedulerError>
    where
        F: FnOnce(&mut HashMap<String, u64>),
    {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            return Err(SchedulerError::Stopped);
        }

        change(&mut state.jobs);
        self.shared.persist(&state.jobs)?;
        self.shared.wakeup.notify_all();
        Ok(())
    }
}

impl Scheduler for TimerScheduler {
    fn schedule_once(&self, job_id: &str, run_at: u64) -> Result<(), SchedulerError> {
        self.update(|jobs| {
            jobs.insert(job_id.to_string(), run_at);
        })
    }

    fn cancel(&self, job_id: &str) -> Result<(), SchedulerError> {
        self.update(|jobs| {
            jobs.remove(job_id);
        })
    }

    fn next_run(&self, job_id: &str) -> Option<u64> {
        self.shared.state.lock().jobs.get(job_id).copied()
    }
}

impl Drop for TimerScheduler {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            self.shared.wakeup.notify_all();
        }

        if let Some(worker) = self.worker.take() {
            // The last reference can be released by a handler on the worker itself
            if worker.thread().id() != thread::current().id() {
                let _ = worker.join();
            }
        }
    }
}

fn run_worker(shared: Arc<Shared>) {
    let mut state = shared.state.lock();

    while !state.shutdown {
        let next = state
            .jobs
            .iter()
            .min_by_key(|(_, run_at)| **run_at)
            .map(|(id, run_at)| (id.clone(), *run_at));

        let Some((job_id, run_at)) = next else {
            shared.wakeup.wait(&mut state);
            continue;
        };

        let now = now_secs();
        if run_at > now {
            let sleep = Duration::from_secs(run_at - now).min(MAX_SLEEP);
            shared.wakeup.wait_for(&mut state, sleep);
            continue;
        }

        let Some(handler) = state.handler.clone() else {
            shared.wakeup.wait(&mut state);
            continue;
        };

        state.jobs.remove(&job_id);
        if let Err(e) = shared.persist(&state.jobs) {
            warn!(job = %job_id, error = %e, "failed to persist job table");
        }

        debug!(job = %job_id, run_at, "firing scheduled job");
        MutexGuard::unlocked(&mut state, || handler(job_id.as_str()));
    }
}
