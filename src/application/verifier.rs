use crate::domain::ports::LinkGatewayArc;
use crate::domain::session::SessionReference;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Fire-and-forget client for the advisory verification endpoint.
///
/// Each call runs as a detached task bounded by its own timeout, never the
/// poll loop's. Failures and timeouts are logged and swallowed; verification
/// is a nudge that asks the backend to finalize a session early, and its
/// absence never aborts or extends reconciliation.
#[derive(Clone)]
pub struct VerifyClient {
    gateway: LinkGatewayArc,
    budget: Duration,
}

impl VerifyClient {
    pub fn new(gateway: LinkGatewayArc, budget: Duration) -> Self {
        Self { gateway, budget }
    }

    /// Spawns one verification call for `reference` and returns immediately.
    /// Safe to call any number of times, including after the session has
    /// already settled (the endpoint is idempotent).
    pub fn fire(&self, reference: &SessionReference) {
        let gateway = Arc::clone(&self.gateway);
        let reference = reference.clone();
        let budget = self.budget;
        tokio::spawn(async move {
            match timeout(budget, gateway.verify(&reference)).await {
                Ok(Ok(ack)) => {
                    tracing::debug!(reference = %reference, status = %ack.status, "verification acknowledged");
                }
                Ok(Err(error)) => {
                    tracing::debug!(reference = %reference, error = %error, "verification failed, ignoring");
                }
                Err(_) => {
                    tracing::warn!(reference = %reference, budget = ?budget, "verification timed out");
                }
            }
        });
    }
}
