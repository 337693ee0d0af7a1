#![warn(clippy::uninlined_format_args)]

pub mod authorization;
pub mod error;
pub mod ledger_service;
pub mod ports;

pub use authorization::AuthorizationPolicy;
pub use error::{Entity, FailureKind, LedgerError};
pub use ledger_service::{ExpensePatch, LedgerService, NamedBalance, SplitPatch};
pub use ports::{
    ExpenseStore, GroupStore, InviteCodeIssuer, MemberDirectory, MemberProfile, StoreError,
    TransactionDraft, TransactionStore, Versioned,
};
