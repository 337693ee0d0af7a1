#![warn(clippy::uninlined_format_args)]

pub mod model;
pub mod services;

pub use model::{
    AmountError, CurrencyContext, Expense, ExpenseId, Group, GroupId, InviteCode, MemberBalances,
    MemberId, Money, Split, SplitKind, TransactionId, TransactionKind, TransactionRecord, Transfer,
    INVITE_CODE_LEN,
};
pub use services::{
    build_splits, compute_balances, simplify, validate_split_sum, BalanceAccumulator, SplitError,
};
