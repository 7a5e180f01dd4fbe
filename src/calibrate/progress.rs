//! Progress reporting for batch calibration.
//!
//! The batch driver never prints; it emits [`ProgressEvent`]s to whatever
//! reporter the caller passes in. Reporters are called from worker threads.

/// Something that happened during a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    Started { total: usize },
    /// Date `index` (input order) finished; `completed` dates are done so far.
    DateCalibrated { index: usize, completed: usize, total: usize },
    Finished { total: usize },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Forwards events to the `log` facade, at most every `every` dates.
#[derive(Debug, Clone, Copy)]
pub struct LogProgress {
    pub every: usize,
}

impl Default for LogProgress {
    fn default() -> Self {
        Self { every: 100 }
    }
}

impl ProgressReporter for LogProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { total } => log::info!("calibrating {total} dates"),
            ProgressEvent::DateCalibrated { completed, total, .. } => {
                if self.every > 0 && (completed % self.every == 0 || completed == total) {
                    log::debug!("calibrated {completed}/{total}");
                }
            }
            ProgressEvent::Finished { total } => log::info!("calibrated {total} dates"),
        }
    }
}

impl<F> ProgressReporter for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn report(&self, event: ProgressEvent) {
        self(event)
    }
}
