use crate::domain::payment_method::{PaymentMethod, PaymentMethodSnapshot};
use crate::domain::ports::{
    CheckoutExecutor, CheckoutHandle, CheckoutOutcome, CreatedSession, LinkGateway,
    NewSessionRequest, SessionStore, VerifyAck,
};
use crate::domain::session::{AccountId, LinkSession, SessionReference};
use crate::error::{LinkError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Single-slot, in-memory session holder.
///
/// Uses `Arc<RwLock<Option<LinkSession>>>` so every reader sees either the
/// whole session or nothing. `Clone` shares the slot.
#[derive(Default, Clone)]
pub struct InMemorySessionSlot {
    slot: Arc<RwLock<Option<LinkSession>>>,
}

impl InMemorySessionSlot {
    /// Creates a new, empty slot.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionSlot {
    async fn get(&self) -> Option<LinkSession> {
        self.slot.read().await.clone()
    }

    async fn set(&self, session: LinkSession) {
        *self.slot.write().await = Some(session);
    }

    async fn clear(&self) {
        *self.slot.write().await = None;
    }
}

#[derive(Default)]
struct GatewayState {
    methods: Vec<PaymentMethod>,
    /// Methods that replace the current set once this many fetches have been
    /// observed, simulating a webhook landing mid-flight.
    staged: Option<(usize, Vec<PaymentMethod>)>,
    failing_fetches: usize,
    fail_all_fetches: bool,
    fail_create: bool,
    fail_verify: bool,
    created: usize,
    fetches: usize,
    verifies: usize,
}

/// Scriptable in-memory gateway.
///
/// Stands in for the backend in tests and the demo binary: the snapshot it
/// serves can be replaced at any time or staged to change after a given
/// number of fetches, and each operation can be made to fail on demand.
/// Issued references are `R1`, `R2`, ... in creation order.
#[derive(Default, Clone)]
pub struct InMemoryLinkGateway {
    state: Arc<RwLock<GatewayState>>,
}

impl InMemoryLinkGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the snapshot served to subsequent fetches.
    pub async fn set_payment_methods(&self, methods: Vec<PaymentMethod>) {
        self.state.write().await.methods = methods;
    }

    /// Serves the current snapshot for the next `fetches` fetches, then
    /// switches to `methods`.
    pub async fn stage_methods_after(&self, fetches: usize, methods: Vec<PaymentMethod>) {
        self.state.write().await.staged = Some((fetches, methods));
    }

    /// Fails the next `count` snapshot fetches with a gateway error.
    pub async fn fail_next_fetches(&self, count: usize) {
        self.state.write().await.failing_fetches = count;
    }

    pub async fn fail_all_fetches(&self, fail: bool) {
        self.state.write().await.fail_all_fetches = fail;
    }

    pub async fn fail_create(&self, fail: bool) {
        self.state.write().await.fail_create = fail;
    }

    pub async fn fail_verify(&self, fail: bool) {
        self.state.write().await.fail_verify = fail;
    }

    pub async fn fetch_count(&self) -> usize {
        self.state.read().await.fetches
    }

    pub async fn verify_count(&self) -> usize {
        self.state.read().await.verifies
    }

    pub async fn create_count(&self) -> usize {
        self.state.read().await.created
    }
}

#[async_trait]
impl LinkGateway for InMemoryLinkGateway {
    async fn create_session(&self, _request: NewSessionRequest) -> Result<CreatedSession> {
        let mut state = self.state.write().await;
        if state.fail_create {
            return Err(LinkError::Gateway(
                "link session endpoint unavailable".to_string(),
            ));
        }
        state.created += 1;
        Ok(CreatedSession {
            reference: SessionReference::new(format!("R{}", state.created)),
            checkout: CheckoutHandle::Token(format!("tok_{}", state.created)),
            expires_at: None,
        })
    }

    async fn verify(&self, reference: &SessionReference) -> Result<VerifyAck> {
        let mut state = self.state.write().await;
        state.verifies += 1;
        if state.fail_verify {
            return Err(LinkError::Verification(format!(
                "verify unavailable for {reference}"
            )));
        }
        Ok(VerifyAck {
            status: "pending".to_string(),
        })
    }

    async fn payment_methods(&self, _account_id: &AccountId) -> Result<PaymentMethodSnapshot> {
        let mut state = self.state.write().await;
        state.fetches += 1;
        if let Some((after, methods)) = state.staged.clone()
            && state.fetches > after
        {
            state.methods = methods;
            state.staged = None;
        }
        if state.fail_all_fetches || state.failing_fetches > 0 {
            if state.failing_fetches > 0 {
                state.failing_fetches -= 1;
            }
            return Err(LinkError::Gateway(
                "payment methods endpoint unavailable".to_string(),
            ));
        }
        Ok(state.methods.iter().cloned().collect())
    }
}

/// Checkout collaborator stub with a fixed result.
#[derive(Default, Clone)]
pub struct InMemoryCheckoutExecutor {
    outcome: CheckoutOutcome,
    fail_reason: Option<String>,
}

impl InMemoryCheckoutExecutor {
    /// Tokenization continues out-of-band (the common webhook-driven path).
    pub fn pending() -> Self {
        Self::default()
    }

    /// Tokenization completes in-band.
    pub fn immediate() -> Self {
        Self {
            outcome: CheckoutOutcome::CompletedImmediately,
            fail_reason: None,
        }
    }

    /// Checkout fails outright with the given reason.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            outcome: CheckoutOutcome::Pending,
            fail_reason: Some(reason.into()),
        }
    }
}

#[async_trait]
impl CheckoutExecutor for InMemoryCheckoutExecutor {
    async fn run(&self, _checkout: &CheckoutHandle) -> Result<CheckoutOutcome> {
        match &self.fail_reason {
            Some(reason) => Err(LinkError::Checkout(reason.clone())),
            None => Ok(self.outcome),
        }
    }
}
