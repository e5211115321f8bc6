use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::bypass::AdminFlag;
use super::recorder::{LedgerEvent, LedgerRecorder};

/// Maximum number of ledger entries kept in the account history
pub const HISTORY_LIMIT: usize = 50;

/// Appended to the reason of debits taken while admin bypass is active
pub const BYPASS_MARKER: &str = " [admin bypass]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Earn,
    Spend,
}

/// One immutable balance change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Time-ordered unique id (UUID v7)
    pub id: Uuid,
    pub signed_amount: i64,
    pub reason: String,
    pub balance_after: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: EntryKind,
}

/// Account balance plus its most-recent-first history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditAccount {
    pub balance: u64,
    pub history: Vec<LedgerEntry>,
}

/// Ledger amount for a credit count; counts past `i64::MAX` saturate
fn signed(amount: u64) -> i64 {
    i64::try_from(amount).unwrap_or(i64::MAX)
}

impl CreditAccount {
    pub fn new(balance: u64) -> Self {
        Self {
            balance,
            history: Vec::new(),
        }
    }

    fn push(&mut self, signed_amount: i64, reason: String, kind: EntryKind) {
        self.history.insert(
            0,
            LedgerEntry {
                id: Uuid::now_v7(),
                signed_amount,
                reason,
                balance_after: self.balance,
                timestamp: Utc::now(),
                kind,
            },
        );
        self.history.truncate(HISTORY_LIMIT);
    }
}

/// Owns the credit account and applies debits and credits to it.
///
/// The local account is authoritative for the session; every change is also
/// forwarded to the optional recorder without waiting for it.
pub struct CreditLedger {
    account: CreditAccount,
    user_id: u64,
    low_balance_threshold: u64,
    admin: Arc<dyn AdminFlag>,
    recorder: Option<Arc<dyn LedgerRecorder>>,
}

impl CreditLedger {
    pub fn new(
        account: CreditAccount,
        user_id: u64,
        low_balance_threshold: u64,
        admin: Arc<dyn AdminFlag>,
        recorder: Option<Arc<dyn LedgerRecorder>>,
    ) -> Self {
        Self {
            account,
            user_id,
            low_balance_threshold,
            admin,
            recorder,
        }
    }

    pub fn account(&self) -> &CreditAccount {
        &self.account
    }

    pub fn balance(&self) -> u64 {
        self.account.balance
    }

    pub fn history(&self) -> &[LedgerEntry] {
        &self.account.history
    }

    pub fn has_low_balance(&self) -> bool {
        self.account.balance < self.low_balance_threshold
    }

    pub fn is_bypassed(&self) -> bool {
        self.admin.is_set()
    }

    pub fn can_afford(&self, amount: u64) -> bool {
        self.admin.is_set() || self.account.balance >= amount
    }

    /// Take `amount` credits. Returns false, leaving the account untouched,
    /// when the balance does not cover it.
    pub fn debit(&mut self, amount: u64, reason: &str) -> bool {
        let bypassed = self.admin.is_set();
        if !bypassed && self.account.balance < amount {
            tracing::info!(
                amount,
                balance = self.account.balance,
                reason,
                "Debit refused: insufficient credits"
            );
            return false;
        }

        let balance_before = self.account.balance;
        if !bypassed {
            self.account.balance -= amount;
        }

        let reason = if bypassed {
            format!("{}{}", reason, BYPASS_MARKER)
        } else {
            reason.to_string()
        };
        self.account
            .push(-signed(amount), reason.clone(), EntryKind::Spend);

        tracing::info!(
            amount,
            balance = self.account.balance,
            bypassed,
            reason = %reason,
            "Credits debited"
        );

        self.dispatch(LedgerEvent {
            kind: EntryKind::Spend,
            user_id: self.user_id,
            amount,
            reason,
            balance_before,
            balance_after: self.account.balance,
        });
        true
    }

    /// Add `amount` credits (top-up or refund)
    pub fn credit(&mut self, amount: u64, reason: &str) {
        let balance_before = self.account.balance;
        self.account.balance = self.account.balance.saturating_add(amount);
        self.account
            .push(signed(amount), reason.to_string(), EntryKind::Earn);

        tracing::info!(amount, balance = self.account.balance, reason, "Credits added");

        self.dispatch(LedgerEvent {
            kind: EntryKind::Earn,
            user_id: self.user_id,
            amount,
            reason: reason.to_string(),
            balance_before,
            balance_after: self.account.balance,
        });
    }

    /// Overwrite the whole account (snapshot restore)
    pub(crate) fn replace_account(&mut self, account: CreditAccount) {
        self.account = account;
    }

    /// Forward an event to the recorder without blocking the caller.
    fn dispatch(&self, event: LedgerEvent) {
        let recorder = match self.recorder {
            Some(ref recorder) => recorder.clone(),
            None => return,
        };

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = recorder.record(&event).await {
                    tracing::warn!(
                        recorder = %recorder.name(),
                        amount = event.amount,
                        reason = %event.reason,
                        error = %e,
                        "Failed to record ledger event"
                    );
                }
            });
        } else {
            tracing::debug!("No tokio runtime available; ledger event not recorded");
        }
    }
}
