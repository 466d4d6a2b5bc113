use crate::application::engine::LinkEvent;
use crate::application::verifier::VerifyClient;
use crate::config::ReconcileConfig;
use crate::domain::ports::{LinkGatewayArc, SessionStoreArc};
use crate::domain::session::{AttemptOutcome, LinkSession, LinkStatus, ReconciliationAttempt};
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{Instant, sleep};

/// Owns the polling state machine that converges a link session against the
/// backend.
///
/// The loop runs as one cooperative task per session. Confirmation goes
/// through a compare-and-set on the session's status, so a scheduled tick and
/// a resume-triggered probe may race freely: whichever observes the new
/// method first wins, the loser's CAS is a no-op, and exactly one
/// confirmation event is emitted.
#[derive(Clone)]
pub struct Reconciler {
    store: SessionStoreArc,
    gateway: LinkGatewayArc,
    verifier: VerifyClient,
    events: UnboundedSender<LinkEvent>,
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(
        store: SessionStoreArc,
        gateway: LinkGatewayArc,
        verifier: VerifyClient,
        events: UnboundedSender<LinkEvent>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            verifier,
            events,
            config,
        }
    }

    /// Starts the poll loop for `session`. Idempotent: the caller that wins
    /// the `Pending -> Verifying` transition spawns the loop, every other
    /// caller is a no-op, so a session never has two competing loops.
    pub fn start(&self, session: LinkSession) -> bool {
        if !session.transition(LinkStatus::Pending, LinkStatus::Verifying) {
            tracing::debug!(
                reference = %session.reference(),
                status = %session.status(),
                "reconciliation already running or session settled"
            );
            return false;
        }
        self.emit_status(LinkStatus::Verifying);
        tracing::info!(reference = %session.reference(), "reconciliation started");

        let reconciler = self.clone();
        tokio::spawn(async move { reconciler.run_loop(session).await });
        true
    }

    async fn run_loop(&self, session: LinkSession) {
        let mut consecutive_failures: u32 = 0;
        let mut attempt_number: u32 = 0;
        let mut last_verify_at = Instant::now();

        loop {
            if session.status() != LinkStatus::Verifying {
                break;
            }
            sleep(self.config.poll_interval).await;
            // Re-check after the suspension point: cancellation and the
            // absolute deadline both take effect here, before any fetch.
            if session.status() != LinkStatus::Verifying {
                break;
            }
            if Instant::now() >= session.timeout_at() {
                break;
            }

            if Instant::now().duration_since(last_verify_at) >= self.config.verify_interval {
                last_verify_at = Instant::now();
                self.verifier.fire(session.reference());
            }

            attempt_number += 1;
            let started_at = Instant::now();
            let outcome = self.probe_once(&session).await;
            let attempt = ReconciliationAttempt {
                attempt_number,
                started_at,
                outcome,
            };
            tracing::debug!(reference = %session.reference(), ?attempt, "reconciliation tick");

            match outcome {
                AttemptOutcome::Confirmed => break,
                AttemptOutcome::NoChange => consecutive_failures = 0,
                AttemptOutcome::FetchFailed => {
                    consecutive_failures += 1;
                    if consecutive_failures > self.config.max_consecutive_failures {
                        tracing::warn!(
                            reference = %session.reference(),
                            failures = consecutive_failures,
                            "snapshot fetches failing persistently, giving up"
                        );
                        break;
                    }
                }
            }
        }

        // Budget exhausted without confirmation: indeterminate, not failed.
        // The backend may still confirm later; this client stops observing.
        if session.transition(LinkStatus::Verifying, LinkStatus::TimedOut) {
            tracing::info!(reference = %session.reference(), "reconciliation budget exhausted");
            self.emit_status(LinkStatus::TimedOut);
        }
        self.release_if_terminal(&session).await;
    }

    /// One reconciliation probe: fetch the current snapshot, diff it against
    /// the baseline captured at session creation, and on a new method attempt
    /// the confirmation CAS. Shared by the scheduled loop and resume-triggered
    /// probes so both follow the identical discipline.
    pub(crate) async fn probe_once(&self, session: &LinkSession) -> AttemptOutcome {
        let snapshot = match self.gateway.payment_methods(session.account_id()).await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                tracing::warn!(
                    reference = %session.reference(),
                    error = %error,
                    "payment method snapshot fetch failed"
                );
                return AttemptOutcome::FetchFailed;
            }
        };

        let added = snapshot.added_since(session.baseline());
        if added.is_empty() {
            return AttemptOutcome::NoChange;
        }

        let confirmed = session.transition(LinkStatus::Verifying, LinkStatus::Confirmed)
            || session.transition(LinkStatus::Pending, LinkStatus::Confirmed);
        if confirmed {
            tracing::info!(
                reference = %session.reference(),
                methods = added.len(),
                "new payment method detected, session confirmed"
            );
            self.emit_status(LinkStatus::Confirmed);
            let _ = self.events.send(LinkEvent::NewMethodsDetected(added));
            self.release_if_terminal(session).await;
        }
        AttemptOutcome::Confirmed
    }

    /// Clears the store once `session` is terminal, provided the slot still
    /// holds this session and not a successor.
    pub(crate) async fn release_if_terminal(&self, session: &LinkSession) {
        if !session.status().is_terminal() {
            return;
        }
        if let Some(current) = self.store.get().await
            && current.reference() == session.reference()
        {
            self.store.clear().await;
        }
    }

    fn emit_status(&self, status: LinkStatus) {
        let _ = self.events.send(LinkEvent::StatusChanged(status));
    }
}
