//! Application layer orchestrating the domain rules against the store.
//!
//! `TransactionEngine` drives purchase negotiations, `SettlementLedger` owns
//! seller payouts and `ListingLifecycle` moves listings on and off the market.
//! All three share the plan-then-commit loop in `commit`.

mod commit;
pub mod engine;
pub mod ledger;
pub mod listing;
pub mod stats;

pub use commit::DEFAULT_COMMIT_ATTEMPTS;
