use crate::{
    authorization::AuthorizationPolicy,
    error::{Entity, LedgerError},
    ports::{
        ExpenseStore, GroupStore, InviteCodeIssuer, MemberDirectory, StoreError, TransactionDraft,
        TransactionStore, Versioned,
    },
};
use chrono::{DateTime, Utc};
use smol_str::SmolStr;
use splitledger_domain::{
    build_splits, compute_balances, simplify, Expense, ExpenseId, Group, GroupId, InviteCode,
    MemberBalances, MemberId, Money, SplitKind, TransactionRecord, Transfer,
};

/// Invite issuance is retried with a bumped attempt counter until the store
/// accepts the code as unique. The space is large; running out means the
/// store is effectively wedged and the caller sees a conflict.
const MAX_INVITE_ATTEMPTS: u32 = 8;

/// A partial update to an expense. Absent fields keep their current value.
/// Changing the amount or splits re-validates the sum invariant and resets
/// settlement flags.
#[derive(Clone, Debug, Default)]
pub struct ExpensePatch {
    pub amount: Option<Money>,
    pub category: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub splits: Option<SplitPatch>,
}

#[derive(Clone, Debug)]
pub enum SplitPatch {
    /// Re-split evenly over the group's current participants.
    Equal,
    /// Replace with explicit shares.
    Custom(Vec<(MemberId, Money)>),
}

/// One row of a display-ready balance report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedBalance {
    pub member: MemberId,
    pub display_name: Option<SmolStr>,
    pub amount: Money,
}

/// The engine's operation surface. Holds its collaborators behind ports;
/// reads are pure folds over the stores, writes validate first and then
/// persist through conditional updates.
#[derive(Clone, Copy)]
pub struct LedgerService<'a> {
    groups: &'a dyn GroupStore,
    expenses: &'a dyn ExpenseStore,
    transactions: &'a dyn TransactionStore,
    invites: &'a dyn InviteCodeIssuer,
}

impl<'a> LedgerService<'a> {
    pub fn new(
        groups: &'a dyn GroupStore,
        expenses: &'a dyn ExpenseStore,
        transactions: &'a dyn TransactionStore,
        invites: &'a dyn InviteCodeIssuer,
    ) -> Self {
        Self {
            groups,
            expenses,
            transactions,
            invites,
        }
    }

    pub fn create_group(
        &self,
        name: &str,
        owner: MemberId,
        members: &[MemberId],
    ) -> Result<Group, LedgerError> {
        let id = self.groups.allocate_id();
        for attempt in 0..MAX_INVITE_ATTEMPTS {
            let code = self.invites.issue(id, attempt);
            let group = Group::new(id, name, owner, members.iter().copied(), code);
            match self.groups.insert(group.clone()) {
                Ok(()) => {
                    tracing::info!(group = %id, owner = %owner, "created group");
                    return Ok(group);
                }
                Err(StoreError::InviteCodeTaken) => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Err(LedgerError::Conflict)
    }

    /// Adds a member to the group behind an invite code. Joining a group
    /// you already belong to is a no-op; inactive groups are invisible.
    pub fn join_group(&self, code: &InviteCode, member: MemberId) -> Result<Group, LedgerError> {
        let mut group = self
            .groups
            .find_by_invite_code(code)
            .filter(Group::is_active)
            .ok_or(LedgerError::NotFound(Entity::Group))?;

        if group.is_participant(member) {
            return Ok(group);
        }
        group.join(member);
        self.groups.update(group.clone())?;
        tracing::info!(group = %group.id(), member = %member, "member joined group");
        Ok(group)
    }

    /// Deactivates a group. Owner only; a closed group no longer accepts
    /// joins but its history stays readable.
    pub fn close_group(&self, group_id: GroupId, actor: MemberId) -> Result<Group, LedgerError> {
        let mut group = self.group(group_id)?;
        if actor != group.owner() {
            return Err(LedgerError::Unauthorized(actor));
        }
        group.deactivate();
        self.groups.update(group.clone())?;
        tracing::info!(group = %group_id, "closed group");
        Ok(group)
    }

    /// Records a shared expense. Without explicit shares the amount is
    /// split evenly over every participant. The expense's own bookkeeping
    /// record is appended to the transaction store and linked.
    pub fn create_expense(
        &self,
        group_id: GroupId,
        payer: MemberId,
        amount: Money,
        category: &str,
        date: DateTime<Utc>,
        shares: Option<&[(MemberId, Money)]>,
    ) -> Result<Expense, LedgerError> {
        let group = self.group(group_id)?;
        if !group.is_participant(payer) {
            return Err(LedgerError::NotFound(Entity::Member));
        }
        if let Some(shares) = shares {
            if shares.iter().any(|&(member, _)| !group.is_participant(member)) {
                return Err(LedgerError::NotFound(Entity::Member));
            }
        }

        let participants: Vec<MemberId> = group.participants().collect();
        let (kind, splits) = build_splits(amount, &participants, shares)?;
        let id = self.expenses.allocate_id();
        let expense = Expense::try_new(id, group_id, payer, amount, category, date, kind, splits)?;

        // Validation is done; everything past this point is durable.
        let record = self
            .transactions
            .append(TransactionDraft::expense(group_id, payer, amount, date))?;
        let expense = expense.with_linked_transaction(record.id);
        self.expenses.insert(expense.clone())?;
        tracing::info!(expense = %id, group = %group_id, amount = %amount, "recorded expense");
        Ok(expense)
    }

    /// Applies a patch to an expense. Only the payer may mutate.
    pub fn update_expense(
        &self,
        expense_id: ExpenseId,
        actor: MemberId,
        patch: &ExpensePatch,
    ) -> Result<Expense, LedgerError> {
        retry_once(|| self.try_update_expense(expense_id, actor, patch))
    }

    fn try_update_expense(
        &self,
        expense_id: ExpenseId,
        actor: MemberId,
        patch: &ExpensePatch,
    ) -> Result<Expense, LedgerError> {
        let Versioned {
            document: mut expense,
            version,
        } = self
            .expenses
            .get(expense_id)
            .ok_or(LedgerError::NotFound(Entity::Expense))?;
        AuthorizationPolicy::authorize_expense_mutation(&expense, actor)?;

        if let Some(category) = &patch.category {
            expense.rename_category(category.clone());
        }
        if let Some(date) = patch.date {
            expense.reschedule(date);
        }

        if patch.amount.is_some() || patch.splits.is_some() {
            let amount = patch.amount.unwrap_or(expense.amount());
            let (kind, splits) = match &patch.splits {
                Some(SplitPatch::Custom(shares)) => {
                    let group = self.group(expense.group_id())?;
                    if shares.iter().any(|&(member, _)| !group.is_participant(member)) {
                        return Err(LedgerError::NotFound(Entity::Member));
                    }
                    build_splits(amount, &[], Some(shares))?
                }
                Some(SplitPatch::Equal) => {
                    let group = self.group(expense.group_id())?;
                    let participants: Vec<MemberId> = group.participants().collect();
                    build_splits(amount, &participants, None)?
                }
                None => match expense.kind() {
                    SplitKind::Equal => {
                        let over: Vec<MemberId> =
                            expense.splits().iter().map(|split| split.member).collect();
                        build_splits(amount, &over, None)?
                    }
                    // A bare amount change against custom shares fails the
                    // sum check unless the caller also supplies new shares.
                    SplitKind::Custom => {
                        let shares: Vec<(MemberId, Money)> = expense
                            .splits()
                            .iter()
                            .map(|split| (split.member, split.amount))
                            .collect();
                        build_splits(amount, &[], Some(&shares))?
                    }
                },
            };
            expense.reprice(amount, kind, splits)?;
        }

        self.expenses.update(expense.clone(), version)?;
        tracing::info!(expense = %expense_id, "updated expense");
        Ok(expense)
    }

    /// Hard delete. Cascades removal of the linked bookkeeping record;
    /// transfer records are untouched, so money that moved stays recorded.
    pub fn delete_expense(&self, expense_id: ExpenseId, actor: MemberId) -> Result<(), LedgerError> {
        let Versioned {
            document: expense, ..
        } = self
            .expenses
            .get(expense_id)
            .ok_or(LedgerError::NotFound(Entity::Expense))?;
        AuthorizationPolicy::authorize_expense_mutation(&expense, actor)?;

        let removed = self
            .expenses
            .remove(expense_id)
            .ok_or(LedgerError::NotFound(Entity::Expense))?;
        if let Some(transaction) = removed.linked_transaction() {
            if self
                .transactions
                .remove_expense_record(removed.group_id(), transaction)
                .is_none()
            {
                tracing::warn!(
                    expense = %expense_id,
                    transaction = %transaction,
                    "linked bookkeeping record was already gone"
                );
            }
        }
        tracing::info!(expense = %expense_id, "deleted expense");
        Ok(())
    }

    pub fn balances(&self, group_id: GroupId) -> Result<MemberBalances, LedgerError> {
        let group = self.group(group_id)?;
        Ok(self.balances_for(&group))
    }

    pub fn simplified_settlements(&self, group_id: GroupId) -> Result<Vec<Transfer>, LedgerError> {
        let group = self.group(group_id)?;
        Ok(simplify(&self.balances_for(&group)))
    }

    /// Balances joined with display names, sorted by member id. Display
    /// only; the directory never participates in balance math.
    pub fn named_balances(
        &self,
        group_id: GroupId,
        directory: &dyn MemberDirectory,
    ) -> Result<Vec<NamedBalance>, LedgerError> {
        let balances = self.balances(group_id)?;
        let mut lines: Vec<NamedBalance> = balances
            .into_iter()
            .map(|(member, amount)| NamedBalance {
                member,
                display_name: directory.display_name(member),
                amount,
            })
            .collect();
        lines.sort_by_key(|line| line.member);
        Ok(lines)
    }

    /// Marks an expense and its splits settled. Idempotent, and has no
    /// balance side effect: balances come from history, not flags.
    pub fn settle_expense(&self, expense_id: ExpenseId) -> Result<Expense, LedgerError> {
        retry_once(|| {
            let Versioned {
                document: mut expense,
                version,
            } = self
                .expenses
                .get(expense_id)
                .ok_or(LedgerError::NotFound(Entity::Expense))?;
            if expense.is_settled() {
                return Ok(expense);
            }
            expense.settle(Utc::now());
            self.expenses.update(expense.clone(), version)?;
            tracing::info!(expense = %expense_id, "settled expense");
            Ok(expense)
        })
    }

    /// Records one real payment from `from` to `to` and syncs split flags.
    ///
    /// The flag sync is best-effort: every pending split owned by `from`
    /// across the group's unsettled expenses is flipped, with no guarantee
    /// the flipped total equals the amount paid. The transfer record alone
    /// is authoritative for balances.
    pub fn settle_pair(
        &self,
        group_id: GroupId,
        from: MemberId,
        to: MemberId,
        amount: Money,
        actor: MemberId,
    ) -> Result<TransactionRecord, LedgerError> {
        let group = self.group(group_id)?;
        AuthorizationPolicy::authorize_pair(&group, actor, from, to)?;
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let record = retry_once(|| {
            self.transactions
                .append(TransactionDraft::transfer(
                    group_id,
                    from,
                    to,
                    amount,
                    Utc::now(),
                ))
                .map_err(Into::into)
        })?;
        tracing::info!(
            group = %group_id,
            from = %from,
            to = %to,
            amount = %amount,
            "recorded settlement payment"
        );

        self.reconcile_split_flags(group_id, from);
        Ok(record)
    }

    /// Executes the simplified settlement plan. A caller discharges only
    /// their own debts; the owner discharges everyone's. Skipped and failed
    /// instructions never abort siblings, and nothing already written is
    /// rolled back.
    pub fn settle_all(
        &self,
        group_id: GroupId,
        actor: MemberId,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        let group = self.group(group_id)?;
        let instructions = simplify(&self.balances_for(&group));

        let mut records = Vec::new();
        for instruction in instructions {
            if !AuthorizationPolicy::may_execute_for(&group, actor, instruction.from) {
                tracing::debug!(
                    group = %group_id,
                    from = %instruction.from,
                    "skipping settlement instruction not owned by caller"
                );
                continue;
            }
            match self.settle_pair(
                group_id,
                instruction.from,
                instruction.to,
                instruction.amount,
                actor,
            ) {
                Ok(record) => records.push(record),
                Err(err) => {
                    tracing::warn!(
                        group = %group_id,
                        from = %instruction.from,
                        to = %instruction.to,
                        error = %err,
                        "settlement instruction failed, continuing with the rest"
                    );
                }
            }
        }
        Ok(records)
    }

    fn group(&self, group_id: GroupId) -> Result<Group, LedgerError> {
        self.groups
            .get(group_id)
            .ok_or(LedgerError::NotFound(Entity::Group))
    }

    fn balances_for(&self, group: &Group) -> MemberBalances {
        let expenses: Vec<Expense> = self
            .expenses
            .for_group(group.id())
            .into_iter()
            .map(|versioned| versioned.document)
            .collect();
        let transfers = self.transactions.transfers_for_group(group.id());
        compute_balances(group, &expenses, &transfers)
    }

    fn reconcile_split_flags(&self, group_id: GroupId, payer: MemberId) {
        for Versioned { document, version } in self.expenses.for_group(group_id) {
            if document.is_settled() {
                continue;
            }
            let expense_id = document.id();
            let mut expense = document;
            if expense.settle_splits_for(payer) == 0 {
                continue;
            }

            let mut write = self.expenses.update(expense, version);
            if matches!(write, Err(StoreError::Conflict { .. })) {
                if let Some(Versioned { document, version }) = self.expenses.get(expense_id) {
                    let mut refreshed = document;
                    if refreshed.settle_splits_for(payer) == 0 {
                        continue;
                    }
                    write = self.expenses.update(refreshed, version);
                }
            }
            if let Err(err) = write {
                tracing::warn!(
                    expense = %expense_id,
                    error = %err,
                    "failed to sync split flags after settlement"
                );
            }
        }
    }
}

/// One internal retry on write conflicts; every other error is terminal
/// for the request.
fn retry_once<T>(op: impl Fn() -> Result<T, LedgerError>) -> Result<T, LedgerError> {
    match op() {
        Err(LedgerError::Conflict) => {
            tracing::debug!("write conflict, retrying once");
            op()
        }
        other => other,
    }
}
