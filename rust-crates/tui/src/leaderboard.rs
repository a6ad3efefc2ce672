use crate::types::BetRecord;
use alloy::primitives::{
    Address,
    U256,
};
use std::collections::{
    HashMap,
    hash_map::Entry,
};

pub const LEADERBOARD_SIZE: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregatedPlayerPayout {
    pub player: Address,
    pub total_payout: U256,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenLeaderboard {
    pub token: Address,
    pub entries: Vec<AggregatedPlayerPayout>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RankBadge {
    Gold,
    Silver,
    Bronze,
    /// 1-indexed display position.
    Position(usize),
}

impl RankBadge {
    pub fn for_index(index: usize) -> Self {
        match index {
            0 => RankBadge::Gold,
            1 => RankBadge::Silver,
            2 => RankBadge::Bronze,
            n => RankBadge::Position(n + 1),
        }
    }

    pub fn position(&self) -> usize {
        match self {
            RankBadge::Gold => 1,
            RankBadge::Silver => 2,
            RankBadge::Bronze => 3,
            RankBadge::Position(n) => *n,
        }
    }
}

/// Sum payouts per `(token, player)` and rank each token's players by total,
/// largest first.
///
/// Records without a token (settled-bet rows) are not payouts and are
/// skipped. Players with equal totals keep the order in which they first
/// appear in `records`.
pub fn aggregate_payouts(records: &[BetRecord]) -> Vec<TokenLeaderboard> {
    let mut index: HashMap<(Address, Address), usize> = HashMap::new();
    let mut totals: Vec<(Address, AggregatedPlayerPayout)> = Vec::new();
    for record in records {
        let Some(token) = record.token else {
            continue;
        };
        match index.entry((token, record.player)) {
            Entry::Occupied(slot) => {
                let entry = &mut totals[*slot.get()].1;
                entry.total_payout = entry.total_payout.saturating_add(record.payout_amount);
            }
            Entry::Vacant(slot) => {
                slot.insert(totals.len());
                totals.push((
                    token,
                    AggregatedPlayerPayout {
                        player: record.player,
                        total_payout: record.payout_amount,
                    },
                ));
            }
        }
    }

    let mut boards: Vec<TokenLeaderboard> = Vec::new();
    let mut board_index: HashMap<Address, usize> = HashMap::new();
    for (token, entry) in totals {
        let slot = *board_index.entry(token).or_insert_with(|| {
            boards.push(TokenLeaderboard {
                token,
                entries: Vec::new(),
            });
            boards.len() - 1
        });
        boards[slot].entries.push(entry);
    }
    for board in &mut boards {
        board
            .entries
            .sort_by(|a, b| b.total_payout.cmp(&a.total_payout));
    }
    boards
}

/// Top-ten leaderboard per token, rebuilt from scratch.
pub fn build_leaderboards(records: &[BetRecord]) -> Vec<TokenLeaderboard> {
    let mut boards = aggregate_payouts(records);
    for board in &mut boards {
        board.entries.truncate(LEADERBOARD_SIZE);
    }
    boards
}

pub fn leaderboard_for_token(records: &[BetRecord], token: Address) -> TokenLeaderboard {
    build_leaderboards(records)
        .into_iter()
        .find(|board| board.token == token)
        .unwrap_or(TokenLeaderboard {
            token,
            entries: Vec::new(),
        })
}
