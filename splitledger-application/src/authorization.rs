use crate::error::{Entity, LedgerError};
use splitledger_domain::{Expense, Group, MemberId};

/// Relationship checks gating every mutating operation. Checks run before
/// any write so a rejected caller leaves no trace.
pub struct AuthorizationPolicy;

impl AuthorizationPolicy {
    /// A settlement payment may be recorded by the debtor, the creditor, or
    /// the group owner. Both endpoints must belong to the group.
    pub fn authorize_pair(
        group: &Group,
        actor: MemberId,
        from: MemberId,
        to: MemberId,
    ) -> Result<(), LedgerError> {
        if !group.is_participant(from) || !group.is_participant(to) {
            return Err(LedgerError::NotFound(Entity::Member));
        }
        if actor != from && actor != to && actor != group.owner() {
            return Err(LedgerError::Unauthorized(actor));
        }
        Ok(())
    }

    /// Expenses are mutable only by their payer.
    pub fn authorize_expense_mutation(
        expense: &Expense,
        actor: MemberId,
    ) -> Result<(), LedgerError> {
        if expense.payer() != actor {
            return Err(LedgerError::Unauthorized(actor));
        }
        Ok(())
    }

    /// Whether the actor may execute a proposed settlement on this group:
    /// their own debts always, anyone's when they own the group.
    pub fn may_execute_for(group: &Group, actor: MemberId, payer: MemberId) -> bool {
        actor == payer || actor == group.owner()
    }
}
