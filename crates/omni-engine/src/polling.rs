//! Background polling of long-running video operations.
//!
//! Each started operation gets its own tokio task and cancellation token,
//! keyed by the media item it reports to. Cancelling a token (directly or
//! through `cancel_all`) stops the task without touching the conversation.

use crate::provider::{GenerationProvider, VideoOperation};
use crate::session::{MediaTarget, Session};
use futures::future::join_all;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const VIDEO_MIME: &str = "video/mp4";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Completed,
    Failed(String),
    Cancelled,
}

struct PollTask {
    token: CancellationToken,
    /// Taken by `settle` while it waits; the token stays registered.
    handle: Option<JoinHandle<PollOutcome>>,
    finished: Arc<AtomicBool>,
}

impl PollTask {
    fn is_running(&self) -> bool {
        !self.finished.load(Ordering::SeqCst)
    }
}

/// Sets the task's finished flag however the poll loop exits.
struct FinishedFlag(Arc<AtomicBool>);

impl Drop for FinishedFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

pub struct VideoPoller {
    interval: Duration,
    max_attempts: u32,
    /// Parent of every task token; replaced each time it is cancelled.
    root: Mutex<CancellationToken>,
    tasks: Mutex<HashMap<String, PollTask>>,
}

impl VideoPoller {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            root: Mutex::new(CancellationToken::new()),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<String, PollTask>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn root(&self) -> MutexGuard<'_, CancellationToken> {
        self.root.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn spawn(
        &self,
        session: Arc<Session>,
        provider: Arc<dyn GenerationProvider>,
        target: MediaTarget,
        operation: VideoOperation,
    ) {
        let token = self.root().child_token();
        let finished = Arc::new(AtomicBool::new(false));
        let job = PollJob {
            session,
            provider,
            target: target.clone(),
            interval: self.interval,
            max_attempts: self.max_attempts,
            token: token.clone(),
        };
        let flag = FinishedFlag(Arc::clone(&finished));
        let handle = tokio::spawn(async move {
            let _flag = flag;
            job.run(operation).await
        });

        let mut tasks = self.tasks();
        tasks.retain(|_, task| task.is_running() || task.handle.is_some());
        tasks.insert(
            target.media_id,
            PollTask {
                token,
                handle: Some(handle),
                finished,
            },
        );
    }

    /// Number of poll loops still running.
    pub fn pending(&self) -> usize {
        self.tasks().values().filter(|task| task.is_running()).count()
    }

    /// Stops the poll loop bound to one media item.
    pub fn cancel(&self, media_id: &str) -> bool {
        match self.tasks().remove(media_id) {
            Some(task) => {
                task.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Stops every poll loop, including ones whose handles a `settle` call
    /// is currently holding.
    pub fn cancel_all(&self) -> usize {
        let previous = std::mem::replace(&mut *self.root(), CancellationToken::new());
        previous.cancel();
        let drained: Vec<PollTask> = self.tasks().drain().map(|(_, task)| task).collect();
        drained.iter().filter(|task| task.is_running()).count()
    }

    /// Waits for every poll loop started so far and returns their outcomes.
    ///
    /// Dropping the returned future leaves the loops running and still
    /// reachable through `cancel` and `cancel_all`.
    pub async fn settle(&self) -> Vec<PollOutcome> {
        let handles: Vec<JoinHandle<PollOutcome>> = self
            .tasks()
            .values_mut()
            .filter_map(|task| task.handle.take())
            .collect();
        let outcomes = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap_or_else(|e| PollOutcome::Failed(format!("poll task aborted: {}", e))))
            .collect();
        self.tasks()
            .retain(|_, task| task.is_running() || task.handle.is_some());
        outcomes
    }
}

impl Drop for VideoPoller {
    fn drop(&mut self) {
        self.root().cancel();
    }
}

struct PollJob {
    session: Arc<Session>,
    provider: Arc<dyn GenerationProvider>,
    target: MediaTarget,
    interval: Duration,
    max_attempts: u32,
    token: CancellationToken,
}

impl PollJob {
    async fn run(self, operation: VideoOperation) -> PollOutcome {
        let outcome = match self.poll_until_done(operation).await {
            Ok(Some(operation)) => self.materialize(operation).await,
            Ok(None) => PollOutcome::Cancelled,
            Err(reason) => PollOutcome::Failed(reason),
        };

        if let PollOutcome::Failed(reason) = &outcome {
            if self.token.is_cancelled() {
                return PollOutcome::Cancelled;
            }
            warn!(operation_media = %self.target.media_id, %reason, "video generation failed");
            self.session.fail_media(&self.target, reason);
        }
        outcome
    }

    /// `Ok(None)` means the loop was cancelled.
    async fn poll_until_done(&self, mut operation: VideoOperation) -> Result<Option<VideoOperation>, String> {
        let mut attempts = 0u32;
        while !operation.done {
            if attempts >= self.max_attempts {
                return Err(format!(
                    "no result after {} status checks",
                    self.max_attempts
                ));
            }
            if self.cancellable(tokio::time::sleep(self.interval)).await.is_none() {
                return Ok(None);
            }
            attempts += 1;
            debug!(operation = %operation.name, attempts, "refreshing video operation");
            operation = match self.cancellable(self.provider.poll_video(&operation)).await {
                None => return Ok(None),
                Some(Ok(next)) => next,
                Some(Err(e)) => return Err(e.to_string()),
            };
        }
        Ok(Some(operation))
    }

    async fn materialize(&self, operation: VideoOperation) -> PollOutcome {
        if let Some(error) = operation.error {
            return PollOutcome::Failed(error);
        }
        let Some(uri) = operation.video_uri else {
            return PollOutcome::Failed("operation finished without a video asset".to_string());
        };

        let bytes = match self.cancellable(self.provider.fetch_video_asset(&uri)).await {
            None => return PollOutcome::Cancelled,
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => return PollOutcome::Failed(e.to_string()),
        };
        if self.token.is_cancelled() {
            return PollOutcome::Cancelled;
        }

        let blob = match self.session.blobs.create(&bytes, VIDEO_MIME) {
            Ok(blob) => blob,
            Err(e) => return PollOutcome::Failed(format!("could not store video: {}", e)),
        };
        if self.session.complete_media(&self.target, blob.clone()) {
            info!(media = %self.target.media_id, blob = %blob.id, "video ready");
            PollOutcome::Completed
        } else {
            self.session.blobs.revoke(&blob);
            PollOutcome::Cancelled
        }
    }

    async fn cancellable<F: Future>(&self, future: F) -> Option<F::Output> {
        tokio::select! {
            _ = self.token.cancelled() => None,
            output = future => Some(output),
        }
    }
}
