use dashmap::{mapref::entry::Entry, DashMap};
use indexmap::IndexMap;
use splitledger_application::{
    ExpenseStore, GroupStore, StoreError, TransactionDraft, TransactionStore, Versioned,
};
use splitledger_domain::{
    Expense, ExpenseId, Group, GroupId, InviteCode, TransactionId, TransactionRecord,
};
use std::sync::atomic::{AtomicU64, Ordering};

/// In-memory document store backing all three store ports.
///
/// # Invariant
/// Expense documents carry a version that bumps on every successful write;
/// a writer holding a stale version gets [`StoreError::Conflict`] and must
/// re-read. Transaction records are append-only per group, in insertion
/// order; only expense bookkeeping records can be removed.
#[derive(Default)]
pub struct InMemoryLedgerStore {
    groups: DashMap<GroupId, Group>,
    invite_index: DashMap<InviteCode, GroupId>,
    expenses: DashMap<ExpenseId, Versioned<Expense>>,
    transactions: DashMap<GroupId, IndexMap<TransactionId, TransactionRecord>>,
    next_group_id: AtomicU64,
    next_expense_id: AtomicU64,
    next_transaction_id: AtomicU64,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl GroupStore for InMemoryLedgerStore {
    fn allocate_id(&self) -> GroupId {
        GroupId(Self::next(&self.next_group_id))
    }

    fn insert(&self, group: Group) -> Result<(), StoreError> {
        match self.invite_index.entry(group.invite_code().clone()) {
            Entry::Occupied(_) => Err(StoreError::InviteCodeTaken),
            Entry::Vacant(slot) => {
                slot.insert(group.id());
                self.groups.insert(group.id(), group);
                Ok(())
            }
        }
    }

    fn get(&self, id: GroupId) -> Option<Group> {
        self.groups.get(&id).map(|group| group.clone())
    }

    fn find_by_invite_code(&self, code: &InviteCode) -> Option<Group> {
        let id = *self.invite_index.get(code)?;
        GroupStore::get(self, id)
    }

    fn update(&self, group: Group) -> Result<(), StoreError> {
        match self.groups.get_mut(&group.id()) {
            Some(mut slot) => {
                *slot = group;
                Ok(())
            }
            None => Err(StoreError::Missing),
        }
    }
}

impl ExpenseStore for InMemoryLedgerStore {
    fn allocate_id(&self) -> ExpenseId {
        ExpenseId(Self::next(&self.next_expense_id))
    }

    fn insert(&self, expense: Expense) -> Result<(), StoreError> {
        self.expenses.insert(
            expense.id(),
            Versioned {
                document: expense,
                version: 1,
            },
        );
        Ok(())
    }

    fn get(&self, id: ExpenseId) -> Option<Versioned<Expense>> {
        self.expenses.get(&id).map(|slot| slot.clone())
    }

    fn for_group(&self, group_id: GroupId) -> Vec<Versioned<Expense>> {
        let mut documents: Vec<Versioned<Expense>> = self
            .expenses
            .iter()
            .filter(|slot| slot.document.group_id() == group_id)
            .map(|slot| slot.clone())
            .collect();
        documents.sort_by_key(|versioned| versioned.document.id());
        documents
    }

    fn update(&self, expense: Expense, expected_version: u64) -> Result<(), StoreError> {
        let mut slot = self
            .expenses
            .get_mut(&expense.id())
            .ok_or(StoreError::Missing)?;
        if slot.version != expected_version {
            return Err(StoreError::Conflict {
                expected: expected_version,
                actual: slot.version,
            });
        }
        *slot = Versioned {
            document: expense,
            version: expected_version + 1,
        };
        Ok(())
    }

    fn remove(&self, id: ExpenseId) -> Option<Expense> {
        self.expenses
            .remove(&id)
            .map(|(_, versioned)| versioned.document)
    }
}

impl TransactionStore for InMemoryLedgerStore {
    fn append(&self, draft: TransactionDraft) -> Result<TransactionRecord, StoreError> {
        let id = TransactionId(Self::next(&self.next_transaction_id));
        let record = TransactionRecord {
            id,
            group_id: draft.group_id,
            kind: draft.kind,
            payer: draft.payer,
            payee: draft.payee,
            amount: draft.amount,
            recorded_at: draft.recorded_at,
        };
        self.transactions
            .entry(draft.group_id)
            .or_default()
            .insert(id, record.clone());
        Ok(record)
    }

    fn transfers_for_group(&self, group_id: GroupId) -> Vec<TransactionRecord> {
        self.transactions
            .get(&group_id)
            .map(|records| {
                records
                    .values()
                    .filter(|record| record.is_transfer())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn remove_expense_record(
        &self,
        group_id: GroupId,
        id: TransactionId,
    ) -> Option<TransactionRecord> {
        let mut records = self.transactions.get_mut(&group_id)?;
        // Transfers are append-only; refuse to remove them.
        if records.get(&id).is_some_and(TransactionRecord::is_transfer) {
            return None;
        }
        records.shift_remove(&id)
    }
}
