use crate::model::{Expense, Group, MemberBalances, MemberId, Money, TransactionRecord};

/// Folds a group's durable history into per-member net balances.
///
/// Balances are always reconstructed from scratch; there is no cached
/// balance anywhere. Settled flags on expenses and splits are ignored: they
/// are a display projection, and only transfer records discharge debt.
pub struct BalanceAccumulator {
    balances: MemberBalances,
}

impl BalanceAccumulator {
    /// Seeds every known member at zero so that members with no activity
    /// still appear while folding.
    pub fn new(members: impl IntoIterator<Item = MemberId>) -> Self {
        let balances = members
            .into_iter()
            .map(|member| (member, Money::zero()))
            .collect();
        Self { balances }
    }

    /// The payer fronted the full amount; each split member owes their share.
    pub fn apply_expense(&mut self, expense: &Expense) {
        *self
            .balances
            .entry(expense.payer())
            .or_insert(Money::zero()) += expense.amount();
        for split in expense.splits() {
            *self.balances.entry(split.member).or_insert(Money::zero()) -= split.amount;
        }
    }

    /// A real payment: the payer discharged debt, the payee received cash
    /// and is owed that much less. Non-transfer records are skipped.
    pub fn apply_transaction(&mut self, record: &TransactionRecord) {
        if !record.is_transfer() {
            return;
        }
        let Some(payee) = record.payee else {
            return;
        };
        *self.balances.entry(record.payer).or_insert(Money::zero()) += record.amount;
        *self.balances.entry(payee).or_insert(Money::zero()) -= record.amount;
    }

    pub fn balances(&self) -> &MemberBalances {
        &self.balances
    }

    /// Final balances with sub-minor-unit noise filtered out, so phantom
    /// debts never surface.
    pub fn into_balances(self) -> MemberBalances {
        self.balances
            .into_iter()
            .filter(|(_, balance)| !balance.is_negligible())
            .collect()
    }
}

/// Computes the net balance of every participant from the group's full
/// expense and transfer history. Pure and idempotent.
pub fn compute_balances(
    group: &Group,
    expenses: &[Expense],
    transactions: &[TransactionRecord],
) -> MemberBalances {
    let known = group.participants().chain(
        transactions
            .iter()
            .filter(|record| record.is_transfer())
            .flat_map(|record| std::iter::once(record.payer).chain(record.payee)),
    );
    let mut accumulator = BalanceAccumulator::new(known);
    for expense in expenses {
        accumulator.apply_expense(expense);
    }
    for record in transactions {
        accumulator.apply_transaction(record);
    }
    accumulator.into_balances()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ExpenseId, GroupId, InviteCode, SplitKind, TransactionId, TransactionKind,
    };
    use crate::services::equal_splits;
    use chrono::Utc;
    use rstest::{fixture, rstest};

    const A: MemberId = MemberId(1);
    const B: MemberId = MemberId(2);
    const C: MemberId = MemberId(3);

    #[fixture]
    fn group() -> Group {
        Group::new(
            GroupId(1),
            "trip",
            A,
            [B, C],
            InviteCode::try_new("AB12CD34").expect("well-formed code"),
        )
    }

    fn expense(id: u64, payer: MemberId, amount: i64, over: &[MemberId]) -> Expense {
        let amount = Money::from_minor_units(amount);
        let splits = equal_splits(amount, over).expect("split derivation failed");
        Expense::try_new(
            ExpenseId(id),
            GroupId(1),
            payer,
            amount,
            "food",
            Utc::now(),
            SplitKind::Equal,
            splits,
        )
        .expect("valid expense")
    }

    fn transfer(id: u64, from: MemberId, to: MemberId, amount: i64) -> TransactionRecord {
        TransactionRecord {
            id: TransactionId(id),
            group_id: GroupId(1),
            kind: TransactionKind::Transfer,
            payer: from,
            payee: Some(to),
            amount: Money::from_minor_units(amount),
            recorded_at: Utc::now(),
        }
    }

    #[rstest]
    fn payer_gains_full_amount_minus_own_share(group: Group) {
        let expenses = [expense(1, A, 300, &[A, B, C])];
        let balances = compute_balances(&group, &expenses, &[]);

        assert_eq!(balances.get(&A), Some(&Money::from_minor_units(200)));
        assert_eq!(balances.get(&B), Some(&Money::from_minor_units(-100)));
        assert_eq!(balances.get(&C), Some(&Money::from_minor_units(-100)));
    }

    #[rstest]
    fn transfers_discharge_debt(group: Group) {
        let expenses = [expense(1, A, 300, &[A, B, C])];
        let transactions = [transfer(1, B, A, 100)];
        let balances = compute_balances(&group, &expenses, &transactions);

        assert_eq!(balances.get(&A), Some(&Money::from_minor_units(100)));
        assert_eq!(balances.get(&B), None, "B is square and filtered out");
        assert_eq!(balances.get(&C), Some(&Money::from_minor_units(-100)));
    }

    #[rstest]
    fn settled_flags_do_not_enter_balance_math(group: Group) {
        let mut settled = expense(1, A, 300, &[A, B, C]);
        settled.settle(Utc::now());
        let flagged = compute_balances(&group, &[settled], &[]);
        let unflagged = compute_balances(&group, &[expense(1, A, 300, &[A, B, C])], &[]);

        assert_eq!(flagged, unflagged);
    }

    #[rstest]
    fn expense_kind_records_are_not_folded(group: Group) {
        let bookkeeping = TransactionRecord {
            id: TransactionId(1),
            group_id: GroupId(1),
            kind: TransactionKind::Expense,
            payer: A,
            payee: None,
            amount: Money::from_minor_units(300),
            recorded_at: Utc::now(),
        };
        let balances = compute_balances(&group, &[], &[bookkeeping]);
        assert!(balances.is_empty());
    }

    #[rstest]
    fn zero_history_yields_empty_balances(group: Group) {
        assert!(compute_balances(&group, &[], &[]).is_empty());
    }

    #[rstest]
    fn repeated_computation_is_identical(group: Group) {
        let expenses = [expense(1, A, 300, &[A, B, C]), expense(2, B, 90, &[B, C])];
        let transactions = [transfer(1, C, A, 50)];

        let first = compute_balances(&group, &expenses, &transactions);
        let second = compute_balances(&group, &expenses, &transactions);
        assert_eq!(first, second);
    }

    #[rstest]
    fn conservation_holds_over_mixed_history(group: Group) {
        let expenses = [
            expense(1, A, 301, &[A, B, C]),
            expense(2, B, 90, &[B, C]),
            expense(3, C, 7, &[A, C]),
        ];
        let transactions = [transfer(1, B, A, 40), transfer(2, C, A, 101)];

        let balances = compute_balances(&group, &expenses, &transactions);
        let total: i64 = balances.values().map(|money| money.minor_units()).sum();
        assert_eq!(total, 0);
    }
}
