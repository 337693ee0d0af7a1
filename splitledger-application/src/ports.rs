use chrono::{DateTime, Utc};
use smol_str::SmolStr;
use splitledger_domain::{
    Expense, ExpenseId, Group, GroupId, InviteCode, MemberId, Money, TransactionId,
    TransactionKind, TransactionRecord,
};
use std::collections::HashMap;

/// Errors surfaced by store adapters. The engine maps these onto its own
/// taxonomy at the service boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A conditional write lost against a concurrent update.
    #[error("document version {expected} is stale, store holds {actual}")]
    Conflict { expected: u64, actual: u64 },
    /// Another group already holds this invite code.
    #[error("invite code is already taken")]
    InviteCodeTaken,
    #[error("document does not exist")]
    Missing,
}

/// A document together with the version the store holds for it. Writers
/// hand the version back so the store can reject stale updates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Versioned<T> {
    pub document: T,
    pub version: u64,
}

pub trait GroupStore: Send + Sync {
    fn allocate_id(&self) -> GroupId;
    /// Persists a new group, enforcing invite-code uniqueness.
    fn insert(&self, group: Group) -> Result<(), StoreError>;
    fn get(&self, id: GroupId) -> Option<Group>;
    fn find_by_invite_code(&self, code: &InviteCode) -> Option<Group>;
    fn update(&self, group: Group) -> Result<(), StoreError>;
}

pub trait ExpenseStore: Send + Sync {
    fn allocate_id(&self) -> ExpenseId;
    fn insert(&self, expense: Expense) -> Result<(), StoreError>;
    fn get(&self, id: ExpenseId) -> Option<Versioned<Expense>>;
    /// All expenses of a group, ordered by expense id.
    fn for_group(&self, group_id: GroupId) -> Vec<Versioned<Expense>>;
    /// Conditional update: fails with [`StoreError::Conflict`] when
    /// `expected_version` no longer matches the stored document.
    fn update(&self, expense: Expense, expected_version: u64) -> Result<(), StoreError>;
    fn remove(&self, id: ExpenseId) -> Option<Expense>;
}

/// What the service hands the transaction store; the store assigns the id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransactionDraft {
    pub group_id: GroupId,
    pub kind: TransactionKind,
    pub payer: MemberId,
    pub payee: Option<MemberId>,
    pub amount: Money,
    pub recorded_at: DateTime<Utc>,
}

impl TransactionDraft {
    pub fn transfer(
        group_id: GroupId,
        from: MemberId,
        to: MemberId,
        amount: Money,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            group_id,
            kind: TransactionKind::Transfer,
            payer: from,
            payee: Some(to),
            amount,
            recorded_at,
        }
    }

    pub fn expense(
        group_id: GroupId,
        payer: MemberId,
        amount: Money,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            group_id,
            kind: TransactionKind::Expense,
            payer,
            payee: None,
            amount,
            recorded_at,
        }
    }
}

/// The generic transaction store: an append-only record of money movements
/// shared with personal bookkeeping. Transfer records are never mutated or
/// removed; expense bookkeeping records go away with their expense.
pub trait TransactionStore: Send + Sync {
    fn append(&self, draft: TransactionDraft) -> Result<TransactionRecord, StoreError>;
    /// Transfer-kind records of a group, in append order.
    fn transfers_for_group(&self, group_id: GroupId) -> Vec<TransactionRecord>;
    /// Removes one expense bookkeeping record (cascade from expense
    /// deletion). Transfer records are not removable through this port.
    fn remove_expense_record(
        &self,
        group_id: GroupId,
        id: TransactionId,
    ) -> Option<TransactionRecord>;
}

/// Generates invite-code candidates for a new group. The store still checks
/// uniqueness on insert; the issuer only has to make collisions unlikely
/// and retries cheap.
pub trait InviteCodeIssuer: Send + Sync {
    fn issue(&self, group_id: GroupId, attempt: u32) -> InviteCode;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberProfile {
    pub name: SmolStr,
    pub email: SmolStr,
}

/// Identity lookup for display. Never consulted for balance math.
pub trait MemberDirectory: Send + Sync {
    fn resolve(&self, member_id: MemberId) -> Option<MemberProfile>;

    fn display_name(&self, member_id: MemberId) -> Option<SmolStr> {
        self.resolve(member_id).map(|profile| profile.name)
    }
}

impl MemberDirectory for HashMap<MemberId, MemberProfile> {
    fn resolve(&self, member_id: MemberId) -> Option<MemberProfile> {
        self.get(&member_id).cloned()
    }
}
