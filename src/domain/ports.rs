use crate::domain::payment_method::PaymentMethodSnapshot;
use crate::domain::session::{AccountId, LinkSession, SessionReference};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Single-slot holder for the in-flight link session.
///
/// The one piece of shared mutable state in the engine besides the session's
/// own atomic status. All three operations are atomic with respect to
/// readers; no caller ever observes a half-written session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self) -> Option<LinkSession>;
    async fn set(&self, session: LinkSession);
    async fn clear(&self);
}

/// Body of `POST /link-sessions`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionRequest {
    pub account_id: AccountId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// How the checkout collaborator should drive tokenization: an embedded flow
/// token or a redirect URL, whichever the backend issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckoutHandle {
    #[serde(rename = "checkoutToken")]
    Token(String),
    #[serde(rename = "authorizationUrl")]
    RedirectUrl(String),
}

/// Response of `POST /link-sessions`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSession {
    pub reference: SessionReference,
    #[serde(flatten)]
    pub checkout: CheckoutHandle,
    pub expires_at: Option<String>,
}

/// Response of `POST /link-sessions/{reference}/verify`.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyAck {
    pub status: String,
}

/// The backend API this engine consumes, behind one thin transport port.
#[async_trait]
pub trait LinkGateway: Send + Sync {
    /// `POST /link-sessions` — requests a new link session.
    async fn create_session(&self, request: NewSessionRequest) -> Result<CreatedSession>;

    /// `POST /link-sessions/{reference}/verify` — idempotent nudge asking the
    /// backend to finalize a session early. Safe to retry.
    async fn verify(&self, reference: &SessionReference) -> Result<VerifyAck>;

    /// `GET /accounts/{accountId}/payment-methods` — current snapshot.
    async fn payment_methods(&self, account_id: &AccountId) -> Result<PaymentMethodSnapshot>;
}

/// What the external checkout collaborator reported back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckoutOutcome {
    /// Tokenization finished in-band; confirmation may already be visible.
    CompletedImmediately,
    /// Tokenization continues out-of-band; reconciliation takes over.
    #[default]
    Pending,
}

/// External collaborator that drives tokenization. The engine consumes its
/// single result and performs no further interaction with it.
#[async_trait]
pub trait CheckoutExecutor: Send + Sync {
    async fn run(&self, checkout: &CheckoutHandle) -> Result<CheckoutOutcome>;
}

pub type SessionStoreArc = Arc<dyn SessionStore>;
pub type LinkGatewayArc = Arc<dyn LinkGateway>;
pub type CheckoutExecutorArc = Arc<dyn CheckoutExecutor>;
