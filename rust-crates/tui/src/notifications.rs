use crate::{
    format::{
        format_ether,
        truncate_address,
    },
    types::{
        CoinFace,
        ResolutionEvent,
    },
};
use alloy::primitives::{
    Address,
    U256,
};
use chrono::{
    DateTime,
    Local,
};
use std::collections::VecDeque;

pub const NOTIFICATION_CAPACITY: usize = 10;
const PAYOUT_PLACES: usize = 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub bet_id: U256,
    pub message: String,
    pub player1: Address,
    pub player2: Address,
    pub winner: Address,
    pub payout: U256,
    pub received_at: DateTime<Local>,
}

impl Notification {
    pub fn payout_text(&self) -> String {
        format_ether(self.payout, PAYOUT_PLACES)
    }
}

pub fn resolution_message(event: &ResolutionEvent, account: Option<Address>) -> String {
    if event.status != "Fulfilled" {
        return format!("Game status updated: {}", event.status);
    }
    let face = CoinFace::from_pvp_flag(event.player_face);
    let result = CoinFace::from_pvp_flag(event.outcome);
    let winner = if account == Some(event.winner) {
        "You".to_string()
    } else {
        truncate_address(&event.winner)
    };
    format!("Game resolved! Bet was {face}, result was {result}. Winner: {winner}")
}

/// Most recent first; the oldest entry falls off once capacity is reached.
#[derive(Clone, Debug)]
pub struct NotificationLog {
    entries: VecDeque<Notification>,
    capacity: usize,
}

impl Default for NotificationLog {
    fn default() -> Self {
        Self::with_capacity(NOTIFICATION_CAPACITY)
    }
}

impl NotificationLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(
        &mut self,
        event: &ResolutionEvent,
        account: Option<Address>,
        received_at: DateTime<Local>,
    ) {
        self.entries.push_front(Notification {
            bet_id: event.bet_id,
            message: resolution_message(event, account),
            player1: event.player1,
            player2: event.player2,
            winner: event.winner,
            payout: event.payout,
            received_at,
        });
        self.entries.truncate(self.capacity);
    }

    pub fn entries(&self) -> impl Iterator<Item = &Notification> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
