#![allow(dead_code)]

use cardlink::application::engine::{LinkEngine, LinkEvent};
use cardlink::config::ReconcileConfig;
use cardlink::domain::payment_method::PaymentMethod;
use cardlink::domain::ports::{CheckoutExecutorArc, LinkGatewayArc, SessionStoreArc};
use cardlink::domain::session::{AccountId, LinkStatus};
use cardlink::infrastructure::in_memory::{
    InMemoryCheckoutExecutor, InMemoryLinkGateway, InMemorySessionSlot,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

pub fn fast_config() -> ReconcileConfig {
    ReconcileConfig {
        poll_interval: Duration::from_secs(1),
        verify_interval: Duration::from_secs(3),
        verify_timeout: Duration::from_secs(1),
        timeout_budget: Duration::from_secs(30),
        max_consecutive_failures: 3,
    }
}

pub fn method(id: &str) -> PaymentMethod {
    PaymentMethod {
        id: id.to_string(),
        brand: "visa".to_string(),
        last4: "4242".to_string(),
        exp_month: 12,
        exp_year: 2031,
        reusable: true,
    }
}

pub fn account(id: &str) -> AccountId {
    AccountId::new(id).unwrap()
}

pub fn engine_with(
    gateway: &InMemoryLinkGateway,
    checkout: InMemoryCheckoutExecutor,
    config: ReconcileConfig,
) -> (LinkEngine, UnboundedReceiver<LinkEvent>) {
    let store: SessionStoreArc = Arc::new(InMemorySessionSlot::new());
    let gateway: LinkGatewayArc = Arc::new(gateway.clone());
    let checkout: CheckoutExecutorArc = Arc::new(checkout);
    LinkEngine::new(store, gateway, checkout, config)
}

/// Next status-change event, skipping method-detection events.
pub async fn next_status(events: &mut UnboundedReceiver<LinkEvent>) -> LinkStatus {
    loop {
        match events.recv().await.expect("event stream closed") {
            LinkEvent::StatusChanged(status) => return status,
            LinkEvent::NewMethodsDetected(_) => continue,
        }
    }
}
