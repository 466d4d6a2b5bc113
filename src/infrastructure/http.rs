use crate::domain::payment_method::{PaymentMethod, PaymentMethodSnapshot};
use crate::domain::ports::{CreatedSession, LinkGateway, NewSessionRequest, VerifyAck};
use crate::domain::session::{AccountId, SessionReference};
use crate::error::Result;
use async_trait::async_trait;

/// `LinkGateway` over HTTP, for hosts that talk to a real backend.
///
/// Thin by design: one request per port operation, JSON bodies matching the
/// backend wire format, non-2xx statuses surfaced as errors. Timeouts and
/// retry discipline stay with the engine, not the transport.
///
/// `Clone` shares the underlying connection pool.
#[derive(Clone)]
pub struct HttpLinkGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLinkGateway {
    /// Creates a gateway rooted at `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Creates a gateway with a preconfigured client, for hosts that need
    /// their own TLS, proxy or header setup.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl LinkGateway for HttpLinkGateway {
    async fn create_session(&self, request: NewSessionRequest) -> Result<CreatedSession> {
        let created = self
            .client
            .post(format!("{}/link-sessions", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<CreatedSession>()
            .await?;
        Ok(created)
    }

    async fn verify(&self, reference: &SessionReference) -> Result<VerifyAck> {
        let ack = self
            .client
            .post(format!(
                "{}/link-sessions/{}/verify",
                self.base_url, reference
            ))
            .send()
            .await?
            .error_for_status()?
            .json::<VerifyAck>()
            .await?;
        Ok(ack)
    }

    async fn payment_methods(&self, account_id: &AccountId) -> Result<PaymentMethodSnapshot> {
        let methods = self
            .client
            .get(format!(
                "{}/accounts/{}/payment-methods",
                self.base_url, account_id
            ))
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<PaymentMethod>>()
            .await?;
        Ok(methods.into_iter().collect())
    }
}
