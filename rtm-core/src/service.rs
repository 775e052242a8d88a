//! Simulated backend services
//!
//! Every call runs on its own worker thread, waits out a fixed delay and then
//! resolves. Callers hold a [`PendingOp`]; cancelling it or dropping it stops
//! the worker and joins the thread, so no timer outlives its owner.

use chrono::Utc;
use std::collections::HashMap;
use std::fmt;
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use uuid::Uuid;

use crate::error::{RtmError, RtmResult};
use crate::gap::{recommend_batch, LinkTarget, RecommendationResult, Recommender, UnlinkedItem};
use crate::requirement::{KnowledgeDoc, Requirement};

/// Kinds of simulated service calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceOp {
    Recommend,
    Link,
    Create,
    Upload,
    Load,
}

impl fmt::Display for ServiceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceOp::Recommend => write!(f, "Recommend"),
            ServiceOp::Link => write!(f, "Link"),
            ServiceOp::Create => write!(f, "Create"),
            ServiceOp::Upload => write!(f, "Upload"),
            ServiceOp::Load => write!(f, "Load"),
        }
    }
}

/// Timing of the simulated services
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Delay before a call resolves
    pub delay: Duration,
    /// Delay between upload progress ticks
    pub upload_step: Duration,
    /// Number of upload progress ticks
    pub upload_steps: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(400),
            upload_step: Duration::from_millis(100),
            upload_steps: 10,
        }
    }
}

impl ServiceConfig {
    /// Zero-delay timing for tests
    pub fn immediate() -> Self {
        Self {
            delay: Duration::ZERO,
            upload_step: Duration::ZERO,
            upload_steps: 4,
        }
    }
}

/// Handle to an in-flight simulated call
pub struct PendingOp<T> {
    op: ServiceOp,
    result_rx: mpsc::Receiver<RtmResult<T>>,
    progress_rx: mpsc::Receiver<u8>,
    cancel_tx: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
    progress: u8,
    finished: bool,
}

impl<T> fmt::Debug for PendingOp<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingOp")
            .field("op", &self.op)
            .field("progress", &self.progress)
            .field("finished", &self.finished)
            .finish()
    }
}

impl<T: Send + 'static> PendingOp<T> {
    /// Starts `work` after `steps` ticks of `step` each
    ///
    /// A `failure` reason makes the call resolve to `ServiceRejected`
    /// instead of running `work`.
    pub fn spawn<F>(
        op: ServiceOp,
        step: Duration,
        steps: u32,
        failure: Option<String>,
        work: F,
    ) -> Self
    where
        F: FnOnce() -> RtmResult<T> + Send + 'static,
    {
        let (result_tx, result_rx) = mpsc::channel();
        let (progress_tx, progress_rx) = mpsc::channel();
        let (cancel_tx, cancel_rx) = mpsc::channel::<()>();
        let steps = steps.max(1);

        log::debug!("{} started", op);
        let handle = thread::spawn(move || {
            for tick in 1..=steps {
                match cancel_rx.recv_timeout(step) {
                    Err(RecvTimeoutError::Timeout) => {
                        let _ = progress_tx.send(((tick * 100) / steps) as u8);
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        log::debug!("{} cancelled", op);
                        let _ = result_tx.send(Err(RtmError::Cancelled(op)));
                        return;
                    }
                }
            }
            let result = match failure {
                Some(reason) => Err(RtmError::ServiceRejected { op, reason }),
                None => work(),
            };
            log::debug!("{} resolved (ok: {})", op, result.is_ok());
            let _ = result_tx.send(result);
        });

        Self {
            op,
            result_rx,
            progress_rx,
            cancel_tx: Some(cancel_tx),
            handle: Some(handle),
            progress: 0,
            finished: false,
        }
    }
}

impl<T> PendingOp<T> {
    pub fn op(&self) -> ServiceOp {
        self.op
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Latest progress in percent
    pub fn progress(&mut self) -> u8 {
        while let Ok(p) = self.progress_rx.try_recv() {
            self.progress = p;
        }
        self.progress
    }

    /// Takes the outcome if the call has resolved
    ///
    /// Returns `None` while pending and after the outcome was taken once.
    pub fn try_take(&mut self) -> Option<RtmResult<T>> {
        if self.finished {
            return None;
        }
        match self.result_rx.try_recv() {
            Ok(result) => {
                self.finished = true;
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.finished = true;
                Some(Err(RtmError::Cancelled(self.op)))
            }
        }
    }

    /// Blocks until the call resolves
    pub fn wait(mut self) -> RtmResult<T> {
        if self.finished {
            return Err(RtmError::Cancelled(self.op));
        }
        self.finished = true;
        self.result_rx
            .recv()
            .unwrap_or(Err(RtmError::Cancelled(self.op)))
    }

    /// Asks the worker to stop; the outcome becomes `Cancelled`
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl<T> Drop for PendingOp<T> {
    fn drop(&mut self) {
        self.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Simulated backend used by the dashboard
pub struct MockServices {
    config: ServiceConfig,
    recommender: Arc<dyn Recommender>,
    failures: HashMap<ServiceOp, String>,
}

impl MockServices {
    pub fn new(config: ServiceConfig, recommender: Arc<dyn Recommender>) -> Self {
        Self {
            config,
            recommender,
            failures: HashMap::new(),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Makes the next call of `op` resolve to `ServiceRejected`
    pub fn fail_next(&mut self, op: ServiceOp, reason: impl Into<String>) {
        self.failures.insert(op, reason.into());
    }

    fn start<T, F>(&mut self, op: ServiceOp, work: F) -> PendingOp<T>
    where
        T: Send + 'static,
        F: FnOnce() -> RtmResult<T> + Send + 'static,
    {
        let failure = self.failures.remove(&op);
        PendingOp::spawn(op, self.config.delay, 1, failure, work)
    }

    /// Scores `items` against `requirements`
    pub fn recommend(
        &mut self,
        items: Vec<UnlinkedItem>,
        requirements: Vec<Requirement>,
    ) -> PendingOp<Vec<RecommendationResult>> {
        let recommender = Arc::clone(&self.recommender);
        self.start(ServiceOp::Recommend, move || {
            Ok(recommend_batch(recommender.as_ref(), &items, &requirements))
        })
    }

    /// Persists item links; echoes the pairs back
    pub fn link(&mut self, pairs: Vec<(String, LinkTarget)>) -> PendingOp<Vec<(String, LinkTarget)>> {
        self.start(ServiceOp::Link, move || Ok(pairs))
    }

    /// Creates a requirement record; echoes it back
    pub fn create_requirement(&mut self, requirement: Requirement) -> PendingOp<Requirement> {
        self.start(ServiceOp::Create, move || Ok(requirement))
    }

    /// Fetches a requirement for the detail page
    pub fn load_requirement(&mut self, req_id: String, found: Option<Requirement>) -> PendingOp<Requirement> {
        self.start(ServiceOp::Load, move || {
            found.ok_or(RtmError::RequirementNotFound(req_id))
        })
    }

    /// Uploads a knowledge-base document, reporting progress per step
    pub fn upload(&mut self, title: String, file_name: String, size_bytes: u64) -> PendingOp<KnowledgeDoc> {
        let failure = self.failures.remove(&ServiceOp::Upload);
        PendingOp::spawn(
            ServiceOp::Upload,
            self.config.upload_step,
            self.config.upload_steps,
            failure,
            move || {
                Ok(KnowledgeDoc {
                    id: Uuid::new_v4().to_string(),
                    title,
                    file_name,
                    size_bytes,
                    uploaded_at: Utc::now(),
                })
            },
        )
    }
}

/// Loading flags gating duplicate submission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusyFlags {
    pub analyzing: bool,
    pub linking: bool,
    pub creating: bool,
    pub uploading: bool,
    pub loading: bool,
}

impl BusyFlags {
    fn flag(&mut self, op: ServiceOp) -> &mut bool {
        match op {
            ServiceOp::Recommend => &mut self.analyzing,
            ServiceOp::Link => &mut self.linking,
            ServiceOp::Create => &mut self.creating,
            ServiceOp::Upload => &mut self.uploading,
            ServiceOp::Load => &mut self.loading,
        }
    }

    /// Marks `op` as running, failing with `Busy` if it already is
    pub fn begin(&mut self, op: ServiceOp) -> RtmResult<()> {
        let flag = self.flag(op);
        if *flag {
            return Err(RtmError::Busy(op));
        }
        *flag = true;
        Ok(())
    }

    pub fn finish(&mut self, op: ServiceOp) {
        *self.flag(op) = false;
    }

    pub fn is_busy(&self, op: ServiceOp) -> bool {
        match op {
            ServiceOp::Recommend => self.analyzing,
            ServiceOp::Link => self.linking,
            ServiceOp::Create => self.creating,
            ServiceOp::Upload => self.uploading,
            ServiceOp::Load => self.loading,
        }
    }

    pub fn any(&self) -> bool {
        self.analyzing || self.linking || self.creating || self.uploading || self.loading
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gap::{ItemKind, KeywordRecommender};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn services() -> MockServices {
        MockServices::new(ServiceConfig::immediate(), Arc::new(KeywordRecommender))
    }

    #[test]
    fn test_recommend_resolves() {
        let mut svc = services();
        let items = vec![UnlinkedItem::new("T-1", ItemKind::Task, "Password reset")];
        let reqs = vec![Requirement::new("REQ-001", "Password reset")];
        let results = svc.recommend(items, reqs).wait().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].recommendation.as_ref().unwrap().score, 100);
    }

    #[test]
    fn test_injected_failure_is_rejection() {
        let mut svc = services();
        svc.fail_next(ServiceOp::Link, "backend unavailable");
        let err = svc.link(Vec::new()).wait().unwrap_err();
        assert_eq!(
            err,
            RtmError::ServiceRejected {
                op: ServiceOp::Link,
                reason: "backend unavailable".into()
            }
        );
        // only the next call fails
        assert!(svc.link(Vec::new()).wait().is_ok());
    }

    #[test]
    fn test_cancel_before_resolution() {
        let mut op: PendingOp<()> = PendingOp::spawn(
            ServiceOp::Create,
            Duration::from_secs(30),
            1,
            None,
            || Ok(()),
        );
        op.cancel();
        assert_eq!(op.wait().unwrap_err(), RtmError::Cancelled(ServiceOp::Create));
    }

    #[test]
    fn test_drop_cancels_and_never_runs_work() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let op: PendingOp<()> = PendingOp::spawn(
            ServiceOp::Upload,
            Duration::from_secs(30),
            3,
            None,
            move || {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            },
        );
        // drop joins the worker, so this returns promptly
        drop(op);
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_upload_reports_full_progress() {
        let mut svc = services();
        let mut op = svc.upload("Spec".into(), "spec.pdf".into(), 2048);
        let doc = loop {
            if let Some(result) = op.try_take() {
                break result.unwrap();
            }
            thread::sleep(Duration::from_millis(1));
        };
        assert_eq!(op.progress(), 100);
        assert_eq!(doc.file_name, "spec.pdf");
        assert!(op.try_take().is_none());
    }

    #[test]
    fn test_load_missing_requirement() {
        let mut svc = services();
        let err = svc.load_requirement("REQ-404".into(), None).wait().unwrap_err();
        assert_eq!(err, RtmError::RequirementNotFound("REQ-404".into()));
    }

    #[test]
    fn test_busy_flags_gate_duplicates() {
        let mut busy = BusyFlags::default();
        busy.begin(ServiceOp::Recommend).unwrap();
        assert_eq!(
            busy.begin(ServiceOp::Recommend).unwrap_err(),
            RtmError::Busy(ServiceOp::Recommend)
        );
        assert!(busy.analyzing);
        busy.begin(ServiceOp::Link).unwrap();
        busy.finish(ServiceOp::Recommend);
        assert!(!busy.is_busy(ServiceOp::Recommend));
        assert!(busy.any());
    }
}
