use cardlink::application::engine::{LinkEngine, LinkEvent};
use cardlink::config::ReconcileConfig;
use cardlink::domain::payment_method::PaymentMethod;
use cardlink::domain::ports::{CheckoutExecutorArc, LinkGatewayArc, SessionStoreArc};
use cardlink::domain::session::AccountId;
use cardlink::infrastructure::in_memory::{
    InMemoryCheckoutExecutor, InMemoryLinkGateway, InMemorySessionSlot,
};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Simulates a card-link flow end to end: the in-memory gateway stands in for
/// the backend, and the staged snapshot change plays the role of the webhook
/// landing out-of-band. Events are printed to stdout as JSON lines.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Account to link a card to
    account_id: String,

    /// Contact email forwarded to the backend
    #[arg(long)]
    email: Option<String>,

    /// Poll ticks before the simulated webhook makes the new card visible
    #[arg(long, default_value_t = 3)]
    confirm_after_ticks: u64,

    /// Never confirm; demonstrates the timeout path
    #[arg(long)]
    never_confirm: bool,

    /// Seconds between reconciliation ticks
    #[arg(long, default_value_t = 1)]
    poll_interval: u64,

    /// Overall reconciliation budget in seconds
    #[arg(long, default_value_t = 15)]
    timeout_budget: u64,

    /// Simulate a host foreground resume after this many seconds
    #[arg(long)]
    resume_after: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = ReconcileConfig {
        poll_interval: Duration::from_secs(cli.poll_interval),
        timeout_budget: Duration::from_secs(cli.timeout_budget),
        ..ReconcileConfig::default()
    };

    let gateway_fake = InMemoryLinkGateway::new();
    if !cli.never_confirm {
        let linked_card = PaymentMethod {
            id: "pm_linked".to_string(),
            brand: "visa".to_string(),
            last4: "4242".to_string(),
            exp_month: 12,
            exp_year: 2031,
            reusable: true,
        };
        gateway_fake
            .stage_methods_after(cli.confirm_after_ticks as usize, vec![linked_card])
            .await;
    }

    let store: SessionStoreArc = Arc::new(InMemorySessionSlot::new());
    let gateway: LinkGatewayArc = Arc::new(gateway_fake);
    let checkout: CheckoutExecutorArc = Arc::new(InMemoryCheckoutExecutor::pending());
    let (engine, mut events) = LinkEngine::new(store, gateway, checkout, config);

    let account = AccountId::new(cli.account_id).into_diagnostic()?;
    let session = engine.initiate_link(account, cli.email).await.into_diagnostic()?;
    tracing::info!(reference = %session.reference(), "link attempt started");

    if let Some(after) = cli.resume_after {
        let (resume_tx, resume_rx) = watch::channel(());
        engine.resume_handler().listen(resume_rx);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(after)).await;
            let _ = resume_tx.send(());
        });
    }

    while let Some(event) = events.recv().await {
        println!("{}", serde_json::to_string(&event).into_diagnostic()?);
        if let LinkEvent::StatusChanged(status) = &event
            && status.is_terminal()
        {
            break;
        }
    }

    Ok(())
}
