pub mod balance_calculator;
pub mod settlement_simplifier;
pub mod split_policy;

pub use balance_calculator::{compute_balances, BalanceAccumulator};
pub use settlement_simplifier::{apply_transfer, simplify};
pub use split_policy::{
    build_splits, custom_splits, equal_splits, validate_split_sum, SplitError, SPLIT_TOLERANCE,
};
