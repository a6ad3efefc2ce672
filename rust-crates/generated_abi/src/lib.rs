use alloy::{
    primitives::Address,
    sol,
};

pub mod flip_coin_types {
    use super::*;

    sol! {
        #[sol(rpc)]
        contract FlipCoin {
            struct Bet {
                uint256 id;
                address player1;
                address player2;
                address token;
                uint256 amount;
                bool player1Face;
                uint256 timestamp;
                uint256 timeout;
                uint8 status;
            }

            /// Emitted whenever a bet is created or changes status.
            event AllBets(
                uint256 indexed betId,
                address indexed player1,
                address player2,
                uint8 status
            );

            /// Emitted when a game settles or is cancelled.
            event Notification(
                address player1,
                address player2,
                address winner,
                string status,
                uint256 payout,
                bool playerFace,
                bool outcome,
                uint256 betId
            );

            function allBets() external view returns (Bet[] memory);
            function joinGame(uint256 betId) external payable;
            function cancelBet(uint256 betId) external;
        }
    }
}

pub mod erc20_types {
    use super::*;

    sol! {
        #[sol(rpc)]
        interface IERC20 {
            function approve(address spender, uint256 amount) external returns (bool);
        }
    }
}

/// Stake token used by the contract for bets paid in the chain's native asset.
pub const NATIVE_TOKEN: Address = Address::ZERO;

/// On-chain encoding of `FlipCoin.Bet.status`.
pub const STATUS_PENDING: u8 = 0;
pub const STATUS_FULFILLED: u8 = 1;
pub const STATUS_CANCELLED: u8 = 2;

pub fn is_native_token(token: &Address) -> bool {
    *token == NATIVE_TOKEN
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn is_native_token__only_matches_zero_address() {
        // given
        let erc20 = address!("0x1111111111111111111111111111111111111111");

        // then
        assert!(is_native_token(&NATIVE_TOKEN));
        assert!(!is_native_token(&erc20));
    }
}
