use crate::application::reconciler::Reconciler;
use crate::application::verifier::VerifyClient;
use crate::domain::ports::SessionStoreArc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Reacts to host foreground-resume signals.
///
/// Suspension can stall the poll loop for minutes; on resume the handler
/// fires an immediate verification nudge and runs one out-of-schedule probe
/// through the reconciler's confirmation CAS. It never starts a competing
/// poll loop, so a resume arriving mid-tick cannot double-confirm.
#[derive(Clone)]
pub struct ResumeHandler {
    store: SessionStoreArc,
    verifier: VerifyClient,
    reconciler: Reconciler,
}

impl ResumeHandler {
    pub fn new(store: SessionStoreArc, verifier: VerifyClient, reconciler: Reconciler) -> Self {
        Self {
            store,
            verifier,
            reconciler,
        }
    }

    /// One resume: verify, then a single reconciliation probe. A no-op when
    /// no session is in flight or the session has already settled.
    pub async fn on_resume(&self) {
        let Some(session) = self.store.get().await else {
            tracing::debug!("host resumed with no link session in flight");
            return;
        };
        if session.status().is_terminal() {
            return;
        }
        tracing::info!(reference = %session.reference(), "host resumed, probing out of schedule");
        self.verifier.fire(session.reference());
        self.reconciler.probe_once(&session).await;
    }

    /// Subscribes to a generic "host resumed foreground" signal. Each change
    /// notification triggers [`ResumeHandler::on_resume`]; the task ends when
    /// the sender is dropped.
    pub fn listen(self, mut signal: watch::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while signal.changed().await.is_ok() {
                self.on_resume().await;
            }
        })
    }
}
