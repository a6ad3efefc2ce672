use crate::errors::ContractError;
use alloy::primitives::{
    Address,
    I256,
    U256,
};
use generated_abi::{
    STATUS_CANCELLED,
    STATUS_FULFILLED,
    STATUS_PENDING,
    flip_coin_types::FlipCoin,
};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CoinFace {
    Heads,
    Tails,
}

impl CoinFace {
    /// PvP bets and resolution events encode `true` as Heads.
    pub fn from_pvp_flag(flag: bool) -> Self {
        if flag { CoinFace::Heads } else { CoinFace::Tails }
    }

    /// House-game results from the indexer encode `true` as Tails.
    pub fn from_house_flag(flag: bool) -> Self {
        if flag { CoinFace::Tails } else { CoinFace::Heads }
    }
}

impl fmt::Display for CoinFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoinFace::Heads => write!(f, "Heads"),
            CoinFace::Tails => write!(f, "Tails"),
        }
    }
}

/// A settled bet or payout event as reported by the indexer.
///
/// Settled-bet rows (`betResults`) carry no token and no payout; payout rows
/// (`gameWons`) carry nothing but player, token and payout. Absent fields are
/// `None` / zero.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BetRecord {
    pub player: Address,
    pub token: Option<Address>,
    pub payout_amount: U256,
    pub player_choice: bool,
    pub outcome: bool,
    pub profit: I256,
    pub won: bool,
}

impl BetRecord {
    pub fn payout(player: Address, token: Address, payout_amount: U256) -> Self {
        BetRecord {
            player,
            token: Some(token),
            payout_amount,
            player_choice: false,
            outcome: false,
            profit: I256::ZERO,
            won: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BetStatus {
    Pending,
    Fulfilled,
    Cancelled,
}

impl TryFrom<u8> for BetStatus {
    type Error = ContractError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            STATUS_PENDING => Ok(BetStatus::Pending),
            STATUS_FULFILLED => Ok(BetStatus::Fulfilled),
            STATUS_CANCELLED => Ok(BetStatus::Cancelled),
            other => Err(ContractError::Decode(format!("unknown bet status {other}"))),
        }
    }
}

impl fmt::Display for BetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetStatus::Pending => write!(f, "Pending"),
            BetStatus::Fulfilled => write!(f, "Fulfilled"),
            BetStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// An open PvP bet as stored by the contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingBet {
    pub id: U256,
    pub player1: Address,
    pub player2: Address,
    pub token: Address,
    pub amount: U256,
    pub player1_face: bool,
    pub timestamp: u64,
    pub timeout_seconds: u64,
    pub status: BetStatus,
}

impl PendingBet {
    pub fn expires_at(&self) -> u64 {
        self.timestamp.saturating_add(self.timeout_seconds)
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at()
    }

    pub fn is_active(&self, now: u64) -> bool {
        self.status == BetStatus::Pending && !self.is_expired(now)
    }

    pub fn remaining_seconds(&self, now: u64) -> u64 {
        self.expires_at().saturating_sub(now)
    }

    pub fn is_creator(&self, account: Option<Address>) -> bool {
        account.is_some_and(|account| account == self.player1)
    }

    pub fn can_join(&self, account: Option<Address>, now: u64) -> bool {
        account.is_some() && !self.is_creator(account) && self.is_active(now)
    }

    pub fn can_cancel(&self, account: Option<Address>, now: u64) -> bool {
        self.is_creator(account)
            && self.status == BetStatus::Pending
            && self.is_expired(now)
    }

    pub fn face(&self) -> CoinFace {
        CoinFace::from_pvp_flag(self.player1_face)
    }
}

impl TryFrom<FlipCoin::Bet> for PendingBet {
    type Error = ContractError;

    fn try_from(bet: FlipCoin::Bet) -> Result<Self, Self::Error> {
        Ok(PendingBet {
            id: bet.id,
            player1: bet.player1,
            player2: bet.player2,
            token: bet.token,
            amount: bet.amount,
            player1_face: bet.player1Face,
            timestamp: bet.timestamp.saturating_to::<u64>(),
            timeout_seconds: bet.timeout.saturating_to::<u64>(),
            status: BetStatus::try_from(bet.status)?,
        })
    }
}

/// A bet was created or changed status on chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerChange {
    pub bet_id: U256,
    pub player1: Address,
    pub player2: Address,
    pub status: BetStatus,
}

impl TryFrom<FlipCoin::AllBets> for LedgerChange {
    type Error = ContractError;

    fn try_from(event: FlipCoin::AllBets) -> Result<Self, Self::Error> {
        Ok(LedgerChange {
            bet_id: event.betId,
            player1: event.player1,
            player2: event.player2,
            status: BetStatus::try_from(event.status)?,
        })
    }
}

/// The contract settled (or otherwise updated) a game.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolutionEvent {
    pub bet_id: U256,
    pub player1: Address,
    pub player2: Address,
    pub winner: Address,
    pub status: String,
    pub payout: U256,
    pub player_face: bool,
    pub outcome: bool,
}

impl From<FlipCoin::Notification> for ResolutionEvent {
    fn from(event: FlipCoin::Notification) -> Self {
        ResolutionEvent {
            bet_id: event.betId,
            player1: event.player1,
            player2: event.player2,
            winner: event.winner,
            status: event.status,
            payout: event.payout,
            player_face: event.playerFace,
            outcome: event.outcome,
        }
    }
}

/// Contract events the client reacts to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainEvent {
    LedgerChanged(LedgerChange),
    Resolution(ResolutionEvent),
}
