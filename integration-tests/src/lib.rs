//! Shared fixtures for the end-to-end flows under `tests/`.

use alloy::primitives::{
    Address,
    U256,
    address,
};
use deployments::TokenRecord;
use flip_coin::{
    client::AppController,
    orchestrator::BetOrchestrator,
    test_helpers::FakeBetContract,
    types::BetRecord,
};
use std::rc::Rc;

pub const CONTRACT: Address = address!("0x00000000000000000000000000000000000000f1");
pub const CREATOR: Address = address!("0x00000000000000000000000000000000000000c1");
pub const PLAYER: Address = address!("0x00000000000000000000000000000000000000c2");
pub const USDC: Address = address!("0x00000000000000000000000000000000000000e2");

/// Bet fixtures are created at t=1000 with a 60s timeout.
pub const BEFORE_EXPIRY: u64 = 1_059;
pub const AT_EXPIRY: u64 = 1_060;

pub fn supported_tokens() -> Vec<TokenRecord> {
    vec![
        TokenRecord {
            symbol: "ETH".to_string(),
            address: Address::ZERO.to_string(),
            decimals: 18,
        },
        TokenRecord {
            symbol: "USDC".to_string(),
            address: USDC.to_string(),
            decimals: 6,
        },
    ]
}

pub fn controller_for(account: Option<Address>) -> AppController<FakeBetContract> {
    let orchestrator = Rc::new(BetOrchestrator::new(FakeBetContract::new(CONTRACT), account));
    AppController::new(orchestrator, "Local", supported_tokens())
}

/// `count` payout rows for `token`, cycling through `players` distinct
/// addresses; row `i` pays `i + 1`.
pub fn payout_rows(token: Address, players: u8, count: usize) -> Vec<BetRecord> {
    (0..count)
        .map(|i| {
            BetRecord::payout(
                Address::with_last_byte((i % usize::from(players)) as u8 + 1),
                token,
                U256::from(i + 1),
            )
        })
        .collect()
}
