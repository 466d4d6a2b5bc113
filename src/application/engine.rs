use crate::application::reconciler::Reconciler;
use crate::application::resume::ResumeHandler;
use crate::application::verifier::VerifyClient;
use crate::config::ReconcileConfig;
use crate::domain::payment_method::PaymentMethod;
use crate::domain::ports::{
    CheckoutExecutorArc, CheckoutHandle, CheckoutOutcome, LinkGatewayArc, NewSessionRequest,
    SessionStoreArc,
};
use crate::domain::session::{AccountId, LinkSession, LinkStatus};
use crate::error::{LinkError, Result};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// Events delivered to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LinkEvent {
    StatusChanged(LinkStatus),
    NewMethodsDetected(Vec<PaymentMethod>),
}

/// The main entry point for linking a payment method to an account.
///
/// `LinkEngine` owns the session slot and the gateway, wires the reconciler
/// and verification client together, and exposes the two commands the
/// presentation layer needs: `initiate_link` and `cancel_link`. Everything
/// the caller should react to arrives on the event channel returned by
/// [`LinkEngine::new`].
#[derive(Clone)]
pub struct LinkEngine {
    store: SessionStoreArc,
    gateway: LinkGatewayArc,
    checkout: CheckoutExecutorArc,
    verifier: VerifyClient,
    reconciler: Reconciler,
    events: UnboundedSender<LinkEvent>,
    config: ReconcileConfig,
}

impl LinkEngine {
    /// Creates the engine and the event stream it reports on.
    ///
    /// # Arguments
    ///
    /// * `store` - Single-slot holder for the in-flight session.
    /// * `gateway` - Transport to the three backend operations.
    /// * `checkout` - External collaborator that drives tokenization.
    /// * `config` - Polling and timeout tunables.
    pub fn new(
        store: SessionStoreArc,
        gateway: LinkGatewayArc,
        checkout: CheckoutExecutorArc,
        config: ReconcileConfig,
    ) -> (Self, UnboundedReceiver<LinkEvent>) {
        let (events_tx, events_rx) = unbounded_channel();
        let verifier = VerifyClient::new(Arc::clone(&gateway), config.verify_timeout);
        let reconciler = Reconciler::new(
            Arc::clone(&store),
            Arc::clone(&gateway),
            verifier.clone(),
            events_tx.clone(),
            config.clone(),
        );
        let engine = Self {
            store,
            gateway,
            checkout,
            verifier,
            reconciler,
            events: events_tx,
            config,
        };
        (engine, events_rx)
    }

    /// Starts a new link attempt for `account_id`.
    ///
    /// Any prior non-terminal session is cancelled and evicted first, so at
    /// most one session is ever in flight. The returned session is `Pending`;
    /// checkout and reconciliation proceed in the background and report
    /// through the event channel.
    ///
    /// Fails with [`LinkError::Initiation`] when the baseline snapshot or the
    /// session itself cannot be obtained, in which case no session is
    /// recorded.
    pub async fn initiate_link(
        &self,
        account_id: AccountId,
        email: Option<String>,
    ) -> Result<LinkSession> {
        if let Some(prior) = self.store.get().await
            && !prior.status().is_terminal()
        {
            if prior.finish(LinkStatus::Cancelled) {
                self.emit_status(LinkStatus::Cancelled);
            }
            self.store.clear().await;
            tracing::info!(reference = %prior.reference(), "superseded prior link session");
        }

        let baseline = self
            .gateway
            .payment_methods(&account_id)
            .await
            .map_err(|error| LinkError::Initiation(error.to_string()))?;
        let created = self
            .gateway
            .create_session(NewSessionRequest {
                account_id: account_id.clone(),
                email,
            })
            .await
            .map_err(|error| LinkError::Initiation(error.to_string()))?;

        let session = LinkSession::new(
            created.reference,
            account_id,
            baseline,
            self.config.timeout_budget,
        );
        self.store.set(session.clone()).await;
        self.emit_status(LinkStatus::Pending);
        tracing::info!(
            reference = %session.reference(),
            account = %session.account_id(),
            budget = ?self.config.timeout_budget,
            "link session created"
        );

        let engine = self.clone();
        let handle = session.clone();
        tokio::spawn(async move { engine.drive_checkout(handle, created.checkout).await });
        Ok(session)
    }

    /// Cancels the in-flight link attempt, if any. The poll loop halts at its
    /// next suspension point; the store is emptied immediately. Returns
    /// whether a session was actually cancelled by this call.
    pub async fn cancel_link(&self) -> bool {
        let Some(session) = self.store.get().await else {
            return false;
        };
        let cancelled = session.finish(LinkStatus::Cancelled);
        if cancelled {
            tracing::info!(reference = %session.reference(), "link session cancelled");
            self.emit_status(LinkStatus::Cancelled);
        }
        self.store.clear().await;
        cancelled
    }

    /// The session currently in flight, if any.
    pub async fn current_session(&self) -> Option<LinkSession> {
        self.store.get().await
    }

    /// Builds the handler that reacts to host foreground-resume signals.
    pub fn resume_handler(&self) -> ResumeHandler {
        ResumeHandler::new(
            Arc::clone(&self.store),
            self.verifier.clone(),
            self.reconciler.clone(),
        )
    }

    async fn drive_checkout(&self, session: LinkSession, checkout: CheckoutHandle) {
        match self.checkout.run(&checkout).await {
            Ok(CheckoutOutcome::CompletedImmediately) => {
                tracing::debug!(reference = %session.reference(), "checkout completed in-band");
                // The method may already be visible; probe before the first
                // scheduled tick.
                self.reconciler.probe_once(&session).await;
                self.reconciler.start(session);
            }
            Ok(CheckoutOutcome::Pending) => {
                self.reconciler.start(session);
            }
            Err(error) => {
                tracing::warn!(
                    reference = %session.reference(),
                    error = %error,
                    "checkout executor failed"
                );
                if session.finish(LinkStatus::Failed) {
                    self.emit_status(LinkStatus::Failed);
                }
                self.reconciler.release_if_terminal(&session).await;
            }
        }
    }

    fn emit_status(&self, status: LinkStatus) {
        let _ = self.events.send(LinkEvent::StatusChanged(status));
    }
}
