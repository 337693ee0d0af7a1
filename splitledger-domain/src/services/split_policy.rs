use crate::model::{MemberId, Money, Split, SplitKind};

/// A split sum must land strictly within one minor unit of the expense
/// amount; in integer paise that means exact equality. Division rounding
/// never trips this because equal splits push the remainder into one share.
pub const SPLIT_TOLERANCE: Money = Money::MINOR_UNIT;

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SplitError {
    #[error("amount must be positive, got {0}")]
    InvalidAmount(Money),
    #[error("splits sum to {actual}, expected {expected}")]
    SplitMismatch { expected: Money, actual: Money },
}

/// Derives splits for an expense.
///
/// With explicit shares the shares are validated against the total; without
/// them the amount is divided evenly over `participants`, the whole rounding
/// remainder landing on the last participant so the sum is always exact.
pub fn build_splits(
    amount: Money,
    participants: &[MemberId],
    explicit: Option<&[(MemberId, Money)]>,
) -> Result<(SplitKind, Vec<Split>), SplitError> {
    match explicit {
        Some(shares) => custom_splits(amount, shares).map(|s| (SplitKind::Custom, s)),
        None => equal_splits(amount, participants).map(|s| (SplitKind::Equal, s)),
    }
}

pub fn equal_splits(amount: Money, participants: &[MemberId]) -> Result<Vec<Split>, SplitError> {
    if !amount.is_positive() || participants.is_empty() {
        return Err(SplitError::InvalidAmount(amount));
    }

    let total = amount.minor_units();
    let count = participants.len() as i64;
    let base = total / count;
    let remainder = total % count;

    Ok(participants
        .iter()
        .enumerate()
        .map(|(idx, &member)| {
            let share = if idx == participants.len() - 1 {
                base + remainder
            } else {
                base
            };
            Split::pending(member, Money::from_minor_units(share))
        })
        .collect())
}

pub fn custom_splits(amount: Money, shares: &[(MemberId, Money)]) -> Result<Vec<Split>, SplitError> {
    if !amount.is_positive() || shares.is_empty() {
        return Err(SplitError::InvalidAmount(amount));
    }
    if let Some(&(_, share)) = shares.iter().find(|(_, share)| share.is_negative()) {
        return Err(SplitError::InvalidAmount(share));
    }

    let splits: Vec<Split> = shares
        .iter()
        .map(|&(member, share)| Split::pending(member, share))
        .collect();
    validate_split_sum(amount, &splits)?;
    Ok(splits)
}

/// Checks the split-sum invariant: the shares must add up to the expense
/// amount within [`SPLIT_TOLERANCE`].
pub fn validate_split_sum(amount: Money, splits: &[Split]) -> Result<(), SplitError> {
    if !amount.is_positive() {
        return Err(SplitError::InvalidAmount(amount));
    }

    let actual: Money = splits.iter().map(|split| split.amount).sum();
    if (actual - amount).abs() >= SPLIT_TOLERANCE {
        return Err(SplitError::SplitMismatch {
            expected: amount,
            actual,
        });
    }
    Ok(())
}
