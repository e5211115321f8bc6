//! Loyalty levels derived from credits earned.
//!
//! Only `earn` entries still in the bounded history count towards a level.

use serde::Serialize;

use super::ledger::{EntryKind, LedgerEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum UserLevel {
    Member,
    Vip1,
    Vip2,
    Vip3,
    Vip4,
    Vip5,
}

impl UserLevel {
    const ALL: [UserLevel; 6] = [
        UserLevel::Member,
        UserLevel::Vip1,
        UserLevel::Vip2,
        UserLevel::Vip3,
        UserLevel::Vip4,
        UserLevel::Vip5,
    ];

    /// Earned credits needed to reach this level
    pub fn required(&self) -> u64 {
        match self {
            UserLevel::Member => 0,
            UserLevel::Vip1 => 500,
            UserLevel::Vip2 => 1_000,
            UserLevel::Vip3 => 2_000,
            UserLevel::Vip4 => 3_000,
            UserLevel::Vip5 => 5_000,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            UserLevel::Member => "Member",
            UserLevel::Vip1 => "VIP 1",
            UserLevel::Vip2 => "VIP 2",
            UserLevel::Vip3 => "VIP 3",
            UserLevel::Vip4 => "VIP 4",
            UserLevel::Vip5 => "VIP 5",
        }
    }

    pub fn next(&self) -> Option<UserLevel> {
        let idx = Self::ALL.iter().position(|l| l == self)?;
        Self::ALL.get(idx + 1).copied()
    }

    fn for_earned(earned: u64) -> UserLevel {
        Self::ALL
            .iter()
            .rev()
            .find(|level| earned >= level.required())
            .copied()
            .unwrap_or(UserLevel::Member)
    }
}

/// Progress towards the next level
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextLevel {
    pub level: UserLevel,
    pub credits_needed: u64,
    /// Percentage of the way from the current level, 0–100
    pub progress: f64,
}

fn earned(history: &[LedgerEntry]) -> u64 {
    history
        .iter()
        .filter(|e| e.kind == EntryKind::Earn)
        .map(|e| e.signed_amount.unsigned_abs())
        .fold(0u64, u64::saturating_add)
}

pub fn user_level(history: &[LedgerEntry]) -> UserLevel {
    UserLevel::for_earned(earned(history))
}

/// `None` at the top level
pub fn next_level(history: &[LedgerEntry]) -> Option<NextLevel> {
    let total = earned(history);
    let current = UserLevel::for_earned(total);
    let next = current.next()?;

    let span = (next.required() - current.required()) as f64;
    let into_level = (total - current.required()) as f64;
    Some(NextLevel {
        level: next,
        credits_needed: next.required().saturating_sub(total),
        progress: (into_level / span * 100.0).clamp(0.0, 100.0),
    })
}
