/// Proactive credential renewal scheduling
use crate::credential::Credential;
use crate::scheduler::Scheduler;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Keeps exactly one renewal job per credential lineage
///
/// Jobs are identified by a fixed id and replaced rather than appended.
#[derive(Clone)]
pub struct Renewal {
    scheduler: Arc<dyn Scheduler>,
    job_id: String,
    margin: Duration,
}

impl Renewal {
    pub fn new(scheduler: Arc<dyn Scheduler>, job_id: impl Into<String>, margin: Duration) -> Self {
        Self {
            scheduler,
            job_id: job_id.into(),
            margin,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Instant the renewal job should run for `credential`
    pub fn run_at(&self, credential: &Credential) -> Option<u64> {
        credential
            .expires_at
            .map(|expires_at| expires_at.saturating_sub(self.margin.as_secs()))
    }

    /// Schedule renewal ahead of the credential's expiry
    ///
    /// Failures are logged: the credential is already stored and an expired
    /// token is still recovered on the next authenticated request.
    pub fn arm(&self, credential: &Credential) {
        let Some(run_at) = self.run_at(credential) else {
            debug!("credential has no expiry, disarming renewal");
            self.disarm();
            return;
        };

        if self.scheduler.next_run(&self.job_id) == Some(run_at) {
            debug!(job = %self.job_id, run_at, "renewal already scheduled");
            return;
        }

        match self.scheduler.schedule_once(&self.job_id, run_at) {
            Ok(()) => debug!(job = %self.job_id, run_at, "renewal scheduled"),
            Err(e) => warn!(job = %self.job_id, error = %e, "failed to schedule renewal"),
        }
    }

    /// Schedule the renewal job at an explicit instant
    pub fn arm_at(&self, run_at: u64) {
        match self.scheduler.schedule_once(&self.job_id, run_at) {
            Ok(()) => debug!(job = %self.job_id, run_at, "renewal rescheduled"),
            Err(e) => warn!(job = %self.job_id, error = %e, "failed to reschedule renewal"),
        }
    }

    /// Cancel the renewal job; a no-op when nothing is scheduled
    pub fn disarm(&self) {
        if !self.scheduler.is_scheduled(&self.job_id) {
            return;
        }

        match self.scheduler.cancel(&self.job_id) {
            Ok(()) => debug!(job = %self.job_id, "renewal cancelled"),
            Err(e) => warn!(job = %self.job_id, error = %e, "failed to cancel renewal"),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.scheduler.is_scheduled(&self.job_id)
    }

    pub fn next_run(&self) -> Option<u64> {
        self.scheduler.next_run(&self.job_id)
    }
}
