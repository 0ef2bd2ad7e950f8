use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Run immediately, then once per period.
    Every(Duration),
    /// Run a single time.
    Once,
}

impl Schedule {
    /// `0` seconds means run once.
    pub fn from_secs(secs: u64) -> Self {
        if secs == 0 {
            Schedule::Once
        } else {
            Schedule::Every(Duration::from_secs(secs))
        }
    }
}

/// A background job driven by a tokio interval, stopped through its
/// cancellation token. Each tick awaits the job to completion before the next
/// one is scheduled, so ticks of one task never overlap.
pub struct PeriodicTask {
    name: &'static str,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    pub fn spawn<F, Fut>(
        name: &'static str,
        schedule: Schedule,
        cancel: CancellationToken,
        mut job: F,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            match schedule {
                Schedule::Once => {
                    tokio::select! {
                        _ = token.cancelled() => {}
                        _ = job() => {}
                    }
                }
                Schedule::Every(period) => {
                    let mut ticker = interval(period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        tokio::select! {
                            _ = token.cancelled() => break,
                            _ = ticker.tick() => {}
                        }
                        tokio::select! {
                            _ = token.cancelled() => break,
                            _ = job() => {}
                        }
                    }
                }
            }
            debug!(task = name, "Periodic task exited");
        });

        info!(task = name, ?schedule, "Periodic task started");
        Self { name, cancel, handle }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the task to exit. Call after [`cancel`](Self::cancel) for
    /// periodic schedules, which otherwise run forever.
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            tracing::error!(task = self.name, "Periodic task panicked: {e}");
        }
    }
}
