//! Credit economy: account ledger, admin bypass, external recorder and
//! loyalty levels.

mod bypass;
mod ledger;
pub mod level;
mod recorder;

pub use bypass::{AdminFlag, EnvAdminFlag, StaticAdminFlag};
pub use ledger::{
    CreditAccount, CreditLedger, EntryKind, LedgerEntry, BYPASS_MARKER, HISTORY_LIMIT,
};
pub use level::{next_level, user_level, NextLevel, UserLevel};
pub use recorder::{HttpLedgerRecorder, LedgerEvent, LedgerRecorder};
