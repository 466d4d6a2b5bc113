use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An externally-tokenized payment instrument attached to an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    pub id: String,
    pub brand: String,
    pub last4: String,
    pub exp_month: u8,
    pub exp_year: u16,
    pub reusable: bool,
}

/// Unordered set of payment methods keyed by id.
///
/// A snapshot captured at session creation serves as the baseline against
/// which later fetches are diffed; a method present now but absent from the
/// baseline is what confirms a link attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentMethodSnapshot {
    methods: HashMap<String, PaymentMethod>,
}

impl PaymentMethodSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.methods.contains_key(id)
    }

    /// Methods present here but absent from `baseline`, sorted by id so
    /// callers observe a deterministic order.
    pub fn added_since(&self, baseline: &Self) -> Vec<PaymentMethod> {
        let mut added: Vec<PaymentMethod> = self
            .methods
            .values()
            .filter(|method| !baseline.contains(&method.id))
            .cloned()
            .collect();
        added.sort_by(|a, b| a.id.cmp(&b.id));
        added
    }
}

impl FromIterator<PaymentMethod> for PaymentMethodSnapshot {
    fn from_iter<I: IntoIterator<Item = PaymentMethod>>(iter: I) -> Self {
        Self {
            methods: iter
                .into_iter()
                .map(|method| (method.id.clone(), method))
                .collect(),
        }
    }
}
