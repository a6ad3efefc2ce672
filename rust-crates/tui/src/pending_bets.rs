use crate::{
    errors::NotFoundError,
    orchestrator::{
        ActionKind,
        ActionStatus,
    },
    types::{
        BetStatus,
        PendingBet,
    },
};
use alloy::primitives::{
    Address,
    U256,
};

pub const PENDING_PAGE_SIZE: usize = 5;

pub fn find_bet(bets: &[PendingBet], bet_id: U256) -> Result<&PendingBet, NotFoundError> {
    bets.iter()
        .find(|bet| bet.id == bet_id)
        .ok_or(NotFoundError { bet_id })
}

/// In-memory copy of the contract's bet list. Every refresh replaces the
/// whole list.
#[derive(Clone, Debug, Default)]
pub struct PendingBetsTracker {
    bets: Vec<PendingBet>,
    page: usize,
}

impl PendingBetsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, mut bets: Vec<PendingBet>) {
        bets.sort_by(|a, b| b.id.cmp(&a.id));
        self.bets = bets;
        self.page = self.page.min(self.page_count() - 1);
    }

    /// Every bet the contract reported, newest first.
    pub fn all(&self) -> &[PendingBet] {
        &self.bets
    }

    pub fn get(&self, bet_id: U256) -> Result<&PendingBet, NotFoundError> {
        find_bet(&self.bets, bet_id)
    }

    /// Bets still awaiting an opponent, including expired ones their creator
    /// has not cancelled yet.
    pub fn open(&self) -> Vec<&PendingBet> {
        self.bets
            .iter()
            .filter(|bet| bet.status == BetStatus::Pending)
            .collect()
    }

    /// Open bets that can still be joined at `now`.
    pub fn active(&self, now: u64) -> Vec<&PendingBet> {
        self.bets.iter().filter(|bet| bet.is_active(now)).collect()
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_count(&self) -> usize {
        self.open().len().div_ceil(PENDING_PAGE_SIZE).max(1)
    }

    pub fn current_page(&self) -> Vec<&PendingBet> {
        self.open()
            .into_iter()
            .skip(self.page * PENDING_PAGE_SIZE)
            .take(PENDING_PAGE_SIZE)
            .collect()
    }

    pub fn next_page(&mut self) {
        self.page = (self.page + 1).min(self.page_count() - 1);
    }

    pub fn prev_page(&mut self) {
        self.page = self.page.saturating_sub(1);
    }

    pub fn page_label(&self) -> String {
        format!("Page {} of {}", self.page + 1, self.page_count())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BetAction {
    Join { enabled: bool },
    Approving,
    Joining,
    Cancel { enabled: bool },
    Canceling,
    Expired,
}

impl BetAction {
    pub fn label(&self) -> &'static str {
        match self {
            BetAction::Join { .. } => "Join",
            BetAction::Approving => "Approving...",
            BetAction::Joining => "Joining...",
            BetAction::Cancel { .. } => "Cancel",
            BetAction::Canceling => "Canceling...",
            BetAction::Expired => "Expired",
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(
            self,
            BetAction::Join { enabled: true } | BetAction::Cancel { enabled: true }
        )
    }
}

/// What the action cell for `bet` offers the connected account right now.
pub fn action_for(
    bet: &PendingBet,
    account: Option<Address>,
    now: u64,
    status: &ActionStatus,
) -> BetAction {
    match status.active_for(bet.id) {
        Some(ActionKind::Join) if status.approval.phase.is_in_flight() => {
            return BetAction::Approving;
        }
        Some(ActionKind::Join) => return BetAction::Joining,
        Some(ActionKind::Cancel) => return BetAction::Canceling,
        None => {}
    }
    let idle = status.active.is_none();
    if bet.is_expired(now) {
        if bet.can_cancel(account, now) {
            BetAction::Cancel { enabled: idle }
        } else {
            BetAction::Expired
        }
    } else {
        BetAction::Join {
            enabled: idle && bet.can_join(account, now),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        orchestrator::{
            ActiveAction,
            TxPhase,
        },
        test_helpers::arb_pending_bet,
    };
    use alloy::primitives::address;

    const CREATOR: Address = address!("0x00000000000000000000000000000000000000c1");
    const PLAYER: Address = address!("0x00000000000000000000000000000000000000c2");

    fn bets(ids: impl IntoIterator<Item = u64>) -> Vec<PendingBet> {
        ids.into_iter()
            .map(|id| arb_pending_bet(id, CREATOR, Address::ZERO))
            .collect()
    }

    #[test]
    fn replace__sorts_newest_first() {
        // given
        let mut tracker = PendingBetsTracker::new();

        // when
        tracker.replace(bets([2, 9, 4]));

        // then
        let ids: Vec<_> = tracker.all().iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![U256::from(9), U256::from(4), U256::from(2)]);
    }

    #[test]
    fn replace__drops_settled_bets_from_open_list() {
        // given
        let mut tracker = PendingBetsTracker::new();
        let mut list = bets([1, 2, 3]);
        list[1].status = BetStatus::Cancelled;
        list[2].status = BetStatus::Fulfilled;

        // when
        tracker.replace(list);

        // then
        assert_eq!(tracker.open().len(), 1);
        assert_eq!(tracker.all().len(), 3);
    }

    #[test]
    fn active__excludes_expired_bets() {
        // given
        let mut tracker = PendingBetsTracker::new();
        let mut list = bets([1, 2]);
        list[0].timeout_seconds = 10_000;
        tracker.replace(list);

        // when
        let active = tracker.active(1_060);

        // then
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, U256::from(1));
    }

    #[test]
    fn get__unknown_id__is_not_found() {
        // given
        let mut tracker = PendingBetsTracker::new();
        tracker.replace(bets([1]));

        // when
        let result = tracker.get(U256::from(42));

        // then
        assert_eq!(result, Err(NotFoundError { bet_id: U256::from(42) }));
    }

    #[test]
    fn paging__clamps_at_both_ends() {
        // given
        let mut tracker = PendingBetsTracker::new();
        tracker.replace(bets(1..=12));

        // when
        tracker.prev_page();
        let first = tracker.page_label();
        tracker.next_page();
        tracker.next_page();
        tracker.next_page();

        // then
        assert_eq!(first, "Page 1 of 3");
        assert_eq!(tracker.page_label(), "Page 3 of 3");
        assert_eq!(tracker.current_page().len(), 2);
    }

    #[test]
    fn replace__shorter_list__pulls_page_back_into_range() {
        // given
        let mut tracker = PendingBetsTracker::new();
        tracker.replace(bets(1..=12));
        tracker.next_page();
        tracker.next_page();

        // when
        tracker.replace(bets(1..=3));

        // then
        assert_eq!(tracker.page_label(), "Page 1 of 1");
    }

    #[test]
    fn page_label__empty_list__reports_one_page() {
        assert_eq!(PendingBetsTracker::new().page_label(), "Page 1 of 1");
    }

    #[test]
    fn action_for__covers_each_cell_state() {
        // given
        let bet = arb_pending_bet(1, CREATOR, Address::ZERO);
        let idle = ActionStatus::default();
        let mut approving = ActionStatus {
            active: Some(ActiveAction {
                bet_id: bet.id,
                kind: ActionKind::Join,
            }),
            ..ActionStatus::default()
        };
        approving.approval.phase = TxPhase::Confirming;
        let mut joining = approving.clone();
        joining.approval.phase = TxPhase::Confirmed;

        // then
        assert_eq!(action_for(&bet, Some(PLAYER), 1_030, &idle), BetAction::Join { enabled: true });
        assert_eq!(action_for(&bet, Some(CREATOR), 1_030, &idle), BetAction::Join { enabled: false });
        assert_eq!(action_for(&bet, Some(PLAYER), 1_030, &approving), BetAction::Approving);
        assert_eq!(action_for(&bet, Some(PLAYER), 1_030, &joining), BetAction::Joining);
        assert_eq!(action_for(&bet, Some(CREATOR), 1_060, &idle), BetAction::Cancel { enabled: true });
        assert_eq!(action_for(&bet, Some(PLAYER), 1_060, &idle), BetAction::Expired);
    }

    #[test]
    fn action_for__other_bet_in_flight__disables_actions() {
        // given
        let bet = arb_pending_bet(1, CREATOR, Address::ZERO);
        let busy = ActionStatus {
            active: Some(ActiveAction {
                bet_id: U256::from(99),
                kind: ActionKind::Cancel,
            }),
            ..ActionStatus::default()
        };

        // when
        let action = action_for(&bet, Some(PLAYER), 1_030, &busy);

        // then
        assert!(!action.is_enabled());
        assert_eq!(action.label(), "Join");
    }
}
