use crate::model::{MemberBalances, MemberId, Money, Transfer};
use itertools::{Either, Itertools};

/// Reduces a group's debt graph to a short list of point-to-point payments.
///
/// Greedy pairing: the largest creditor is repeatedly matched against the
/// largest debtor for `min(credit, |debt|)`. The result zeroes every
/// balance and emits at most `creditors + debtors - 1` transfers. It is not
/// guaranteed to be the globally minimal transaction count (that problem is
/// NP-hard); the heuristic's output is the compatibility contract.
///
/// Ordering is deterministic: magnitude first, member id as tie-break.
pub fn simplify(balances: &MemberBalances) -> Vec<Transfer> {
    let (mut creditors, mut debtors): (Vec<(MemberId, Money)>, Vec<(MemberId, Money)>) = balances
        .iter()
        .filter(|(_, balance)| !balance.is_negligible())
        .partition_map(|(&member, &balance)| {
            if balance.is_positive() {
                Either::Left((member, balance))
            } else {
                Either::Right((member, balance.abs()))
            }
        });

    creditors.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    debtors.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut transfers = Vec::new();
    let mut creditor_idx = 0;
    let mut debtor_idx = 0;

    while creditor_idx < creditors.len() && debtor_idx < debtors.len() {
        let (creditor, credit) = &mut creditors[creditor_idx];
        let (debtor, debt) = &mut debtors[debtor_idx];

        let amount = (*credit).min(*debt);
        transfers.push(Transfer {
            from: *debtor,
            to: *creditor,
            amount,
        });

        *credit -= amount;
        *debt -= amount;
        if credit.is_negligible() {
            creditor_idx += 1;
        }
        if debt.is_negligible() {
            debtor_idx += 1;
        }
    }

    transfers
}

/// Applies a proposed transfer to a balance table, the same direction the
/// balance fold gives a durable transfer record.
pub fn apply_transfer(balances: &mut MemberBalances, transfer: &Transfer) {
    *balances.entry(transfer.from).or_insert(Money::zero()) += transfer.amount;
    *balances.entry(transfer.to).or_insert(Money::zero()) -= transfer.amount;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn balances(entries: &[(u64, i64)]) -> MemberBalances {
        entries
            .iter()
            .map(|&(id, amount)| (MemberId(id), Money::from_minor_units(amount)))
            .collect()
    }

    #[rstest]
    #[case::empty(&[], &[])]
    #[case::already_settled(&[(1, 0), (2, 0)], &[])]
    #[case::single_pair(&[(1, 100), (2, -100)], &[(2, 1, 100)])]
    #[case::one_creditor_two_debtors(
        &[(1, 200), (2, -100), (3, -100)],
        &[(2, 1, 100), (3, 1, 100)]
    )]
    #[case::two_creditors_one_debtor(
        &[(1, 150), (2, 50), (3, -200)],
        &[(3, 1, 150), (3, 2, 50)]
    )]
    #[case::asymmetric_chain(
        &[(1, 250), (2, -100), (3, -150)],
        &[(3, 1, 150), (2, 1, 100)]
    )]
    #[case::tie_broken_by_member_id(
        &[(5, 100), (4, -50), (2, -50)],
        &[(2, 5, 50), (4, 5, 50)]
    )]
    fn simplify_pairs_largest_against_largest(
        #[case] input: &[(u64, i64)],
        #[case] expected: &[(u64, u64, i64)],
    ) {
        let transfers = simplify(&balances(input));

        let expected: Vec<Transfer> = expected
            .iter()
            .map(|&(from, to, amount)| Transfer {
                from: MemberId(from),
                to: MemberId(to),
                amount: Money::from_minor_units(amount),
            })
            .collect();
        assert_eq!(transfers, expected);
    }

    #[rstest]
    #[case(&[(1, 100), (2, -100)])]
    #[case(&[(1, 200), (2, -100), (3, -100)])]
    #[case(&[(1, 37), (2, 63), (3, -12), (4, -88)])]
    #[case(&[(1, 1), (2, 1), (3, 1), (4, -3)])]
    fn executing_all_transfers_zeroes_every_balance(#[case] input: &[(u64, i64)]) {
        let mut table = balances(input);
        let transfers = simplify(&table);

        for transfer in &transfers {
            apply_transfer(&mut table, transfer);
        }
        assert!(table.values().all(|balance| balance.is_zero()));
    }

    #[rstest]
    #[case(&[(1, 100), (2, -100)], 1)]
    #[case(&[(1, 37), (2, 63), (3, -12), (4, -88)], 3)]
    #[case(&[(1, 10), (2, 10), (3, 10), (4, -30)], 3)]
    fn transfer_count_stays_under_party_bound(
        #[case] input: &[(u64, i64)],
        #[case] bound: usize,
    ) {
        let transfers = simplify(&balances(input));
        assert!(transfers.len() <= bound);
    }

    #[test]
    fn all_creditors_or_all_debtors_emit_nothing() {
        assert!(simplify(&balances(&[(1, 100), (2, 50)])).is_empty());
        assert!(simplify(&balances(&[(1, -100), (2, -50)])).is_empty());
    }
}
