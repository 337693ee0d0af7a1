use std::{
    fmt,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
};

use chrono::{DateTime, Utc};
use fxhash::FxHashMap;
use rust_decimal::{prelude::ToPrimitive, Decimal};

/// An amount of money in minor units (paise).
///
/// All ledger arithmetic happens on this type; major-unit decimals only
/// appear at the edges, converted through a [`CurrencyContext`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Self = Self(0);

    /// The smallest representable amount. Balances whose magnitude falls
    /// below this are treated as noise and never surfaced as debts.
    pub const MINOR_UNIT: Self = Self(1);

    pub fn zero() -> Self {
        Self(0)
    }

    pub fn from_minor_units(value: i64) -> Self {
        Self(value)
    }

    pub fn minor_units(self) -> i64 {
        self.0
    }

    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn is_negligible(self) -> bool {
        self.0.abs() < Self::MINOR_UNIT.0
    }

    pub fn signum(self) -> i64 {
        self.0.signum()
    }

    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, m| acc + m)
    }
}

const MAX_CURRENCY_SCALE: u32 = 18;

/// Errors converting a major-unit decimal into minor units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    /// The decimal does not land on a whole number of minor units.
    #[error("amount is not an integral number of minor units")]
    NonIntegral,
    /// The converted value does not fit in an i64.
    #[error("amount is out of the representable range")]
    OutOfRange,
    #[error("currency scale {scale} exceeds the supported maximum {max_supported}")]
    UnsupportedScale { scale: u32, max_supported: u32 },
}

/// Currency configuration for the ledger.
///
/// The scale is the number of decimal places in one major unit; paise use
/// scale 2 (100 paise per rupee).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurrencyContext {
    pub scale: u32,
}

impl CurrencyContext {
    /// Default context for rupees with paise as the minor unit.
    pub fn paise_default() -> Self {
        Self { scale: 2 }
    }

    /// Converts a major-unit amount to minor units under this scale.
    pub fn to_minor_units(self, amount: Decimal) -> Result<Money, AmountError> {
        let factor = 10_i128
            .checked_pow(self.scale)
            .filter(|_| self.scale <= MAX_CURRENCY_SCALE)
            .ok_or(AmountError::UnsupportedScale {
                scale: self.scale,
                max_supported: MAX_CURRENCY_SCALE,
            })?;
        let units = amount
            .checked_mul(Decimal::from_i128_with_scale(factor, 0))
            .ok_or(AmountError::OutOfRange)?;
        if units.fract() != Decimal::ZERO {
            return Err(AmountError::NonIntegral);
        }
        units
            .to_i64()
            .map(Money::from_minor_units)
            .ok_or(AmountError::OutOfRange)
    }

    /// Renders minor units back as a major-unit decimal for display.
    pub fn to_decimal(self, amount: Money) -> Decimal {
        Decimal::new(amount.minor_units(), self.scale)
    }
}

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(MemberId);
id_newtype!(GroupId);
id_newtype!(ExpenseId);
id_newtype!(TransactionId);

/// Per-member signed net positions for one group. Positive means the group
/// owes the member; negative means the member owes the group.
pub type MemberBalances = FxHashMap<MemberId, Money>;

pub const INVITE_CODE_LEN: usize = 8;

/// Fixed-length group invite token. Uniqueness is the store's concern; the
/// shape (length and uppercase alphanumeric charset) is enforced here.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InviteCode(String);

impl InviteCode {
    pub fn try_new(code: impl Into<String>) -> Option<Self> {
        let code = code.into();
        let well_formed = code.len() == INVITE_CODE_LEN
            && code
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
        well_formed.then_some(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InviteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A group of members sharing expenses.
///
/// # Invariant
/// The owner never appears in `members`, and `members` holds no duplicates.
/// Both are normalized away at construction, so every stored group document
/// satisfies them. Member order is insertion order and is semantic: equal
/// splits assign the rounding remainder to the last participant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    id: GroupId,
    name: String,
    owner: MemberId,
    members: Vec<MemberId>,
    invite_code: InviteCode,
    active: bool,
}

impl Group {
    pub fn new(
        id: GroupId,
        name: impl Into<String>,
        owner: MemberId,
        members: impl IntoIterator<Item = MemberId>,
        invite_code: InviteCode,
    ) -> Self {
        let mut normalized = Vec::new();
        for member in members {
            if member != owner && !normalized.contains(&member) {
                normalized.push(member);
            }
        }

        Self {
            id,
            name: name.into(),
            owner,
            members: normalized,
            invite_code,
            active: true,
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> MemberId {
        self.owner
    }

    pub fn members(&self) -> &[MemberId] {
        &self.members
    }

    pub fn invite_code(&self) -> &InviteCode {
        &self.invite_code
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Owner first, then members in insertion order.
    pub fn participants(&self) -> impl Iterator<Item = MemberId> + '_ {
        std::iter::once(self.owner).chain(self.members.iter().copied())
    }

    pub fn is_participant(&self, member: MemberId) -> bool {
        member == self.owner || self.members.contains(&member)
    }

    /// Adds a member. Joining twice is a no-op, as is the owner joining.
    pub fn join(&mut self, member: MemberId) {
        if !self.is_participant(member) {
            self.members.push(member);
        }
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }
}

/// How an expense's amount was distributed over its splits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitKind {
    Equal,
    Custom,
}

/// One member's owed share of a single expense.
///
/// The settled flag is a display projection. Balance math never reads it;
/// the transaction store is the source of truth for money that moved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Split {
    pub member: MemberId,
    pub amount: Money,
    pub settled: bool,
}

impl Split {
    pub fn pending(member: MemberId, amount: Money) -> Self {
        Self {
            member,
            amount,
            settled: false,
        }
    }
}

/// A shared expense paid by one member and split across several.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expense {
    id: ExpenseId,
    group_id: GroupId,
    payer: MemberId,
    amount: Money,
    category: String,
    date: DateTime<Utc>,
    kind: SplitKind,
    splits: Vec<Split>,
    settled: bool,
    settled_at: Option<DateTime<Utc>>,
    linked_transaction: Option<TransactionId>,
}

impl Expense {
    /// Builds an expense, enforcing that the amount is positive and the
    /// splits sum to it within one minor unit.
    #[allow(clippy::too_many_arguments)]
    pub fn try_new(
        id: ExpenseId,
        group_id: GroupId,
        payer: MemberId,
        amount: Money,
        category: impl Into<String>,
        date: DateTime<Utc>,
        kind: SplitKind,
        splits: Vec<Split>,
    ) -> Result<Self, crate::services::SplitError> {
        crate::services::validate_split_sum(amount, &splits)?;
        Ok(Self {
            id,
            group_id,
            payer,
            amount,
            category: category.into(),
            date,
            kind,
            splits,
            settled: false,
            settled_at: None,
            linked_transaction: None,
        })
    }

    pub fn id(&self) -> ExpenseId {
        self.id
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    pub fn payer(&self) -> MemberId {
        self.payer
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    pub fn kind(&self) -> SplitKind {
        self.kind
    }

    pub fn splits(&self) -> &[Split] {
        &self.splits
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    pub fn settled_at(&self) -> Option<DateTime<Utc>> {
        self.settled_at
    }

    pub fn linked_transaction(&self) -> Option<TransactionId> {
        self.linked_transaction
    }

    pub fn with_linked_transaction(mut self, transaction: TransactionId) -> Self {
        self.linked_transaction = Some(transaction);
        self
    }

    pub fn rename_category(&mut self, category: impl Into<String>) {
        self.category = category.into();
    }

    pub fn reschedule(&mut self, date: DateTime<Utc>) {
        self.date = date;
    }

    /// Replaces the amount and split set, re-validating the sum invariant.
    /// Settlement state resets: changed money makes the old flags stale.
    pub fn reprice(
        &mut self,
        amount: Money,
        kind: SplitKind,
        splits: Vec<Split>,
    ) -> Result<(), crate::services::SplitError> {
        crate::services::validate_split_sum(amount, &splits)?;
        self.amount = amount;
        self.kind = kind;
        self.splits = splits;
        self.settled = false;
        self.settled_at = None;
        Ok(())
    }

    /// Marks the expense and every split settled. Terminal; settling an
    /// already-settled expense keeps the original timestamp.
    pub fn settle(&mut self, at: DateTime<Utc>) {
        if self.settled {
            return;
        }
        self.settled = true;
        self.settled_at = Some(at);
        for split in &mut self.splits {
            split.settled = true;
        }
    }

    /// Flips the pending splits owned by `member`, returning how many
    /// changed. Does not touch the expense-level flag.
    pub fn settle_splits_for(&mut self, member: MemberId) -> usize {
        let mut flipped = 0;
        for split in &mut self.splits {
            if split.member == member && !split.settled {
                split.settled = true;
                flipped += 1;
            }
        }
        flipped
    }
}

/// Kind tag on generic transaction-store records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionKind {
    /// A directed settlement payment between two members. Append-only and
    /// folded into balances.
    Transfer,
    /// An expense's own bookkeeping record, for reporting. Removed when its
    /// expense is hard-deleted; never folded into balances.
    Expense,
}

/// A durable record in the generic transaction store. Records of kind
/// [`TransactionKind::Transfer`] are the settlement records of the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub group_id: GroupId,
    pub kind: TransactionKind,
    pub payer: MemberId,
    /// The receiving member. Present exactly when `kind` is `Transfer`.
    pub payee: Option<MemberId>,
    pub amount: Money,
    pub recorded_at: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn is_transfer(&self) -> bool {
        self.kind == TransactionKind::Transfer
    }
}

/// A proposed settlement payment: `from` pays `to` the given amount.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transfer {
    pub from: MemberId,
    pub to: MemberId,
    pub amount: Money,
}
