pub mod chain_client;
pub mod client;
pub mod errors;
pub mod format;
pub mod indexer_client;
pub mod leaderboard;
pub mod ledger;
pub mod notifications;
pub mod orchestrator;
pub mod pending_bets;
pub mod types;
pub mod ui;
pub mod wallets;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use generated_abi::{
    erc20_types,
    flip_coin_types,
};
