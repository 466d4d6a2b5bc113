use crate::domain::payment_method::PaymentMethodSnapshot;
use crate::error::{LinkError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Opaque backend-issued identifier for a link session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionReference(String);

impl SessionReference {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Owner of a link session. Rejects blank identifiers before any network
/// call is made.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(LinkError::InvalidAccount(
                "account id must not be blank".to_string(),
            ));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status of a link session.
///
/// Transitions are monotonic: `Pending → Verifying` and from either of those
/// into exactly one terminal state. Terminal states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[repr(u8)]
pub enum LinkStatus {
    Pending = 0,
    Verifying = 1,
    Confirmed = 2,
    Failed = 3,
    TimedOut = 4,
    Cancelled = 5,
}

impl LinkStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Confirmed | Self::Failed | Self::TimedOut | Self::Cancelled
        )
    }

    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Pending,
            1 => Self::Verifying,
            2 => Self::Confirmed,
            3 => Self::Failed,
            4 => Self::TimedOut,
            5 => Self::Cancelled,
            _ => unreachable!("invalid status discriminant {raw}"),
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Verifying => "verifying",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
            Self::TimedOut => "timedOut",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// One attempt to tokenize and attach a new payment instrument to an account.
///
/// Cloning shares the underlying session: the poll loop, a resume probe and
/// the caller all observe the same atomic status word, so a transition won by
/// one party is immediately visible to the rest. All mutation goes through
/// [`LinkSession::transition`] and [`LinkSession::finish`].
#[derive(Debug, Clone)]
pub struct LinkSession {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    reference: SessionReference,
    account_id: AccountId,
    baseline: PaymentMethodSnapshot,
    created_at: Instant,
    timeout_at: Instant,
    status: AtomicU8,
}

impl LinkSession {
    /// Creates a `Pending` session whose reconciliation budget starts now.
    pub fn new(
        reference: SessionReference,
        account_id: AccountId,
        baseline: PaymentMethodSnapshot,
        timeout_budget: Duration,
    ) -> Self {
        let created_at = Instant::now();
        Self {
            inner: Arc::new(SessionInner {
                reference,
                account_id,
                baseline,
                created_at,
                timeout_at: created_at + timeout_budget,
                status: AtomicU8::new(LinkStatus::Pending as u8),
            }),
        }
    }

    pub fn reference(&self) -> &SessionReference {
        &self.inner.reference
    }

    pub fn account_id(&self) -> &AccountId {
        &self.inner.account_id
    }

    /// Payment methods known to exist when this session was created.
    pub fn baseline(&self) -> &PaymentMethodSnapshot {
        &self.inner.baseline
    }

    pub fn created_at(&self) -> Instant {
        self.inner.created_at
    }

    /// Absolute deadline, fixed at creation and never extended.
    pub fn timeout_at(&self) -> Instant {
        self.inner.timeout_at
    }

    pub fn status(&self) -> LinkStatus {
        LinkStatus::from_raw(self.inner.status.load(Ordering::Acquire))
    }

    /// Compare-and-set from `from` to `to`. Returns whether this caller won
    /// the transition. Transitions out of a terminal state are refused.
    pub fn transition(&self, from: LinkStatus, to: LinkStatus) -> bool {
        if from.is_terminal() {
            return false;
        }
        self.inner
            .status
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Moves the session into the terminal state `to` from whatever
    /// non-terminal state it is currently in. Returns whether this caller won
    /// the transition; once any terminal state is reached all further calls
    /// return false.
    pub fn finish(&self, to: LinkStatus) -> bool {
        debug_assert!(to.is_terminal());
        loop {
            let current = self.status();
            if current.is_terminal() {
                return false;
            }
            if self.transition(current, to) {
                return true;
            }
        }
    }
}

/// Outcome of a single reconciliation tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Snapshot fetched, no method beyond the baseline.
    NoChange,
    /// Snapshot fetch failed; counted against the consecutive-failure bound.
    FetchFailed,
    /// A method beyond the baseline was observed.
    Confirmed,
}

/// Ephemeral record of one reconciliation tick. Logged, never persisted.
#[derive(Debug, Clone)]
pub struct ReconciliationAttempt {
    pub attempt_number: u32,
    pub started_at: Instant,
    pub outcome: AttemptOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> LinkSession {
        LinkSession::new(
            SessionReference::new("R1"),
            AccountId::new("acct_1").unwrap(),
            PaymentMethodSnapshot::new(),
            Duration::from_secs(120),
        )
    }

    #[test]
    fn test_account_id_rejects_blank() {
        assert!(matches!(
            AccountId::new("   "),
            Err(LinkError::InvalidAccount(_))
        ));
        assert!(AccountId::new("acct_1").is_ok());
    }

    #[tokio::test]
    async fn test_new_session_is_pending_with_budget() {
        let session = session();
        assert_eq!(session.status(), LinkStatus::Pending);
        assert_eq!(
            session.timeout_at() - session.created_at(),
            Duration::from_secs(120)
        );
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_set() {
        let session = session();
        assert!(session.transition(LinkStatus::Pending, LinkStatus::Verifying));
        // Second caller loses the same transition.
        assert!(!session.transition(LinkStatus::Pending, LinkStatus::Verifying));
        assert_eq!(session.status(), LinkStatus::Verifying);
    }

    #[tokio::test]
    async fn test_terminal_states_never_change() {
        let session = session();
        assert!(session.finish(LinkStatus::Confirmed));
        assert!(!session.finish(LinkStatus::Cancelled));
        assert!(!session.transition(LinkStatus::Confirmed, LinkStatus::TimedOut));
        assert_eq!(session.status(), LinkStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_finish_wins_exactly_once_across_clones() {
        let session = session();
        let clone = session.clone();
        assert!(session.finish(LinkStatus::Cancelled));
        assert!(!clone.finish(LinkStatus::TimedOut));
        assert_eq!(clone.status(), LinkStatus::Cancelled);
    }
}
