use crate::ports::StoreError;
use splitledger_domain::{MemberId, Money, SplitError};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entity {
    Group,
    Expense,
    Member,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Group => "group",
            Entity::Expense => "expense",
            Entity::Member => "member",
        };
        f.write_str(name)
    }
}

/// The engine's error taxonomy. Validation errors are raised before any
/// persistence write; `Conflict` is retried internally once and then
/// surfaced; everything else is terminal for the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("amount must be positive, got {0}")]
    InvalidAmount(Money),
    #[error("splits sum to {actual}, expected {expected}")]
    SplitMismatch { expected: Money, actual: Money },
    #[error("{0} not found")]
    NotFound(Entity),
    #[error("member {0} lacks the required relationship for this operation")]
    Unauthorized(MemberId),
    #[error("write conflicted with a concurrent update")]
    Conflict,
}

/// Coarse classification used to pick a log level at the service boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// The caller sent something the engine rejects. Expected traffic.
    UserInput,
    /// A concurrent writer won; safe for the caller to retry.
    Contention,
}

impl LedgerError {
    pub fn kind(&self) -> FailureKind {
        match self {
            LedgerError::InvalidAmount(_)
            | LedgerError::SplitMismatch { .. }
            | LedgerError::NotFound(_)
            | LedgerError::Unauthorized(_) => FailureKind::UserInput,
            LedgerError::Conflict => FailureKind::Contention,
        }
    }
}

impl From<SplitError> for LedgerError {
    fn from(err: SplitError) -> Self {
        match err {
            SplitError::InvalidAmount(amount) => LedgerError::InvalidAmount(amount),
            SplitError::SplitMismatch { expected, actual } => {
                LedgerError::SplitMismatch { expected, actual }
            }
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } | StoreError::InviteCodeTaken => LedgerError::Conflict,
            StoreError::Missing => LedgerError::NotFound(Entity::Expense),
        }
    }
}
