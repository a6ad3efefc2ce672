#![allow(non_snake_case)]

use super::*;
use crate::{
    errors::NotFoundError,
    test_helpers::{
        FakeBetContract,
        FakeLedgerSource,
        arb_payout,
        arb_pending_bet,
        arb_resolution,
    },
    types::{
        BetStatus,
        LedgerChange,
    },
};
use alloy::primitives::{
    I256,
    address,
};
use futures::stream;

const CONTRACT: Address = address!("0x00000000000000000000000000000000000000f1");
const CREATOR: Address = address!("0x00000000000000000000000000000000000000c1");
const PLAYER: Address = address!("0x00000000000000000000000000000000000000c2");
const PAYOUT_TOKEN: Address = address!("0x00000000000000000000000000000000000000b1");
const NOW: u64 = 1_030;
const AFTER_EXPIRY: u64 = 1_060;

fn tokens() -> Vec<TokenRecord> {
    vec![
        TokenRecord {
            symbol: "CHIP".to_string(),
            address: PAYOUT_TOKEN.to_string(),
            decimals: 0,
        },
        TokenRecord {
            symbol: "ETH".to_string(),
            address: Address::ZERO.to_string(),
            decimals: 18,
        },
    ]
}

fn controller(account: Option<Address>) -> AppController<FakeBetContract> {
    let orchestrator = Rc::new(BetOrchestrator::new(FakeBetContract::new(CONTRACT), account));
    AppController::new(orchestrator, "Local (http://127.0.0.1:8545)", tokens())
}

fn settled(won: bool) -> BetRecord {
    BetRecord {
        player: PLAYER,
        token: None,
        payout_amount: U256::ZERO,
        player_choice: true,
        outcome: won,
        profit: if won {
            I256::from_dec_str("1000000000000000000").unwrap()
        } else {
            I256::from_dec_str("-1000000000000000000").unwrap()
        },
        won,
    }
}

#[test]
fn apply__bets_loaded__pending_rows_newest_first_with_actions() {
    // given
    let mut app = controller(Some(PLAYER));
    let mut own = arb_pending_bet(3, PLAYER, Address::ZERO);
    own.timeout_seconds = 10;

    // when
    app.apply(WorkerEvent::Bets(Ok(vec![
        arb_pending_bet(1, CREATOR, Address::ZERO),
        own,
        arb_pending_bet(2, CREATOR, PAYOUT_TOKEN),
    ])));
    let snap = app.build_snapshot(NOW);

    // then
    let ids: Vec<_> = snap.pending.iter().map(|row| row.bet_id).collect();
    assert_eq!(ids, vec![U256::from(3), U256::from(2), U256::from(1)]);
    assert_eq!(snap.pending[0].time_left, "Expired");
    assert_eq!(snap.pending[0].action, BetAction::Cancel { enabled: true });
    assert_eq!(snap.pending[1].token, "CHIP");
    assert_eq!(snap.pending[1].action, BetAction::Join { enabled: true });
    assert_eq!(snap.pending[2].amount, "1.00");
    assert_eq!(snap.pending[2].time_left, "30 seconds");
    assert_eq!(snap.pending_page, "Page 1 of 1");
    assert_eq!(snap.empty_message, None);
}

#[test]
fn apply__bets_read_fails__records_error_and_keeps_list() {
    // given
    let mut app = controller(Some(PLAYER));
    app.apply(WorkerEvent::Bets(Ok(vec![arb_pending_bet(1, CREATOR, Address::ZERO)])));

    // when
    app.apply(WorkerEvent::Bets(Err(ContractError::Rpc("offline".to_string()))));

    // then
    assert_eq!(app.tracker().all().len(), 1);
    assert_eq!(app.errors().len(), 1);
    assert!(app.errors()[0].contains("offline"));
}

#[test]
fn build_snapshot__all_bets_paginates_by_ten() {
    // given
    let mut app = controller(None);
    app.next_tab();
    app.apply(WorkerEvent::Ledger {
        scope: QueryScope::AllBets,
        result: Ok((0..12).map(|i| settled(i % 2 == 0)).collect()),
    });

    // when
    let first = app.build_snapshot(NOW);
    app.next_page();
    app.next_page();
    let second = app.build_snapshot(NOW);

    // then
    assert_eq!(first.tab, Tab::AllBets);
    assert_eq!(first.all_bets.len(), 10);
    assert_eq!(first.all_bets_range, "Showing 1 to 10 of 12 results");
    assert_eq!(first.all_bets[0].profit, "1.00");
    assert_eq!(first.all_bets[1].profit, "-1.00");
    assert_eq!(first.all_bets[0].choice, CoinFace::Tails);
    assert_eq!(second.all_bets.len(), 2);
    assert_eq!(second.all_bets_range, "Showing 11 to 12 of 12 results");
}

#[test]
fn build_snapshot__empty_tabs__show_empty_state_messages() {
    // given
    let mut app = controller(Some(PLAYER));
    let mut messages = Vec::new();

    // when
    for _ in Tab::ALL {
        messages.push(app.build_snapshot(NOW).empty_message);
        app.next_tab();
    }

    // then
    assert_eq!(
        messages,
        vec![
            Some("No pending bets."),
            Some("No bets available."),
            Some("No leaderboard data available for this token."),
            Some("You haven't placed any bets yet."),
        ]
    );
}

#[test]
fn build_snapshot__no_supported_tokens__asks_for_token() {
    // given
    let orchestrator = Rc::new(BetOrchestrator::new(FakeBetContract::new(CONTRACT), None));
    let mut app = AppController::new(orchestrator, "Local", Vec::new());
    app.next_tab();
    app.next_tab();

    // when
    let snap = app.build_snapshot(NOW);

    // then
    assert_eq!(snap.tab, Tab::Leaderboard);
    assert_eq!(
        snap.empty_message,
        Some("Please select a token to view the leaderboard.")
    );
}

#[test]
fn apply__payouts_for_selected_token__fills_leaderboard() {
    // given
    let mut app = controller(None);
    let records: Vec<_> = (0..7).map(arb_payout).collect();

    // when
    app.apply(WorkerEvent::Ledger {
        scope: QueryScope::TokenPayouts(PAYOUT_TOKEN),
        result: Ok(records),
    });
    let snap = app.build_snapshot(NOW);

    // then
    assert_eq!(snap.leaderboard_token.as_deref(), Some("CHIP"));
    assert_eq!(snap.leaderboard.len(), 7);
    assert_eq!(snap.leaderboard[0].badge, RankBadge::Gold);
    assert_eq!(snap.leaderboard[0].payout, "7.00");
    assert_eq!(snap.leaderboard[6].payout, "1.00");
}

#[test]
fn apply__payouts_for_other_token__are_ignored() {
    // given
    let mut app = controller(None);

    // when
    app.apply(WorkerEvent::Ledger {
        scope: QueryScope::TokenPayouts(Address::ZERO),
        result: Ok(vec![BetRecord::payout(PLAYER, Address::ZERO, U256::from(5))]),
    });

    // then
    assert!(app.build_snapshot(NOW).leaderboard.is_empty());
}

#[test]
fn next_token__cycles_tokens_then_all_tokens() {
    // given
    let mut app = controller(None);

    // when
    let second = app.next_token();
    let all = app.next_token();
    let wrapped = app.next_token();

    // then
    assert_eq!(second, Some(QueryScope::TokenPayouts(Address::ZERO)));
    assert_eq!(all, Some(QueryScope::AllPayouts));
    assert_eq!(wrapped, Some(QueryScope::TokenPayouts(PAYOUT_TOKEN)));
}

#[test]
fn apply__all_payouts_with_all_tokens_selected__shows_every_token_board() {
    // given
    let mut app = controller(None);
    app.next_token();
    assert_eq!(app.next_token(), Some(QueryScope::AllPayouts));
    let records = vec![
        BetRecord::payout(PLAYER, Address::ZERO, U256::from(2_000_000_000_000_000_000u64)),
        BetRecord::payout(PLAYER, PAYOUT_TOKEN, U256::from(5)),
        BetRecord::payout(CREATOR, PAYOUT_TOKEN, U256::from(4)),
        BetRecord::payout(CREATOR, PAYOUT_TOKEN, U256::from(5)),
    ];

    // when
    app.apply(WorkerEvent::Ledger {
        scope: QueryScope::TokenPayouts(PAYOUT_TOKEN),
        result: Ok(records.clone()),
    });
    let ignored = app.build_snapshot(NOW).leaderboard.len();
    app.apply(WorkerEvent::Ledger {
        scope: QueryScope::AllPayouts,
        result: Ok(records),
    });
    let snap = app.build_snapshot(NOW);

    // then
    assert_eq!(ignored, 0);
    assert_eq!(snap.leaderboard_token.as_deref(), Some("All tokens"));
    let rows: Vec<_> = snap
        .leaderboard
        .iter()
        .map(|row| (row.badge, row.token.as_str(), row.player.as_str(), row.payout.as_str()))
        .collect();
    assert_eq!(
        rows,
        vec![
            (RankBadge::Gold, "CHIP", "0x0000...00c1", "9.00"),
            (RankBadge::Silver, "CHIP", "0x0000...00c2", "5.00"),
            (RankBadge::Gold, "ETH", "0x0000...00c2", "2.00"),
        ]
    );
}

#[test]
fn initial_queries__all_tokens_selected__requests_all_payouts() {
    // given
    let mut app = controller(None);
    app.next_token();
    app.next_token();

    // when
    let scopes = app.initial_queries();

    // then
    assert_eq!(scopes, vec![QueryScope::AllBets, QueryScope::AllPayouts]);
}

#[test]
fn initial_queries__with_wallet__includes_player_history() {
    // given
    let app = controller(Some(PLAYER));

    // when
    let scopes = app.initial_queries();

    // then
    assert_eq!(
        scopes,
        vec![
            QueryScope::AllBets,
            QueryScope::TokenPayouts(PAYOUT_TOKEN),
            QueryScope::PlayerBets(PLAYER),
        ]
    );
}

#[test]
fn apply__player_bets_for_other_account__are_ignored() {
    // given
    let mut app = controller(Some(PLAYER));

    // when
    app.apply(WorkerEvent::Ledger {
        scope: QueryScope::PlayerBets(CREATOR),
        result: Ok(vec![settled(true)]),
    });
    app.prev_tab();

    // then
    assert_eq!(app.tab(), Tab::YourBets);
    assert!(app.build_snapshot(NOW).your_bets.is_empty());
}

#[test]
fn prepare_action__decides_join_or_cancel() {
    // given
    let mut creator_app = controller(Some(CREATOR));
    let mut player_app = controller(Some(PLAYER));
    let bets = vec![arb_pending_bet(1, CREATOR, Address::ZERO)];
    creator_app.apply(WorkerEvent::Bets(Ok(bets.clone())));
    player_app.apply(WorkerEvent::Bets(Ok(bets)));
    let id = U256::from(1);

    // then
    assert_eq!(player_app.prepare_action(id, NOW).map(|(k, _)| k), Ok(ActionKind::Join));
    assert_eq!(
        creator_app.prepare_action(id, NOW).map(|(k, _)| k),
        Err(ActionError::NotJoinable { bet_id: id })
    );
    assert_eq!(
        creator_app.prepare_action(id, AFTER_EXPIRY).map(|(k, _)| k),
        Ok(ActionKind::Cancel)
    );
    assert_eq!(
        player_app.prepare_action(id, AFTER_EXPIRY).map(|(k, _)| k),
        Err(ActionError::NotCancellable { bet_id: id })
    );
}

#[test]
fn prepare_action__unknown_bet_or_no_wallet__is_rejected() {
    // given
    let mut read_only = controller(None);
    read_only.apply(WorkerEvent::Bets(Ok(vec![arb_pending_bet(1, CREATOR, Address::ZERO)])));

    // then
    assert_eq!(
        read_only.prepare_action(U256::from(9), NOW).map(|(k, _)| k),
        Err(ActionError::NotFound(NotFoundError { bet_id: U256::from(9) }))
    );
    assert_eq!(
        read_only.prepare_action(U256::from(1), NOW).map(|(k, _)| k),
        Err(ActionError::WalletNotConnected)
    );
}

#[test]
fn selected_bet_id__follows_selection_within_page() {
    // given
    let mut app = controller(Some(PLAYER));
    app.apply(WorkerEvent::Bets(Ok((1..=3)
        .map(|id| arb_pending_bet(id, CREATOR, Address::ZERO))
        .collect())));

    // when
    app.select_next();
    app.select_next();
    app.select_next();

    // then
    assert_eq!(app.selected_bet_id(), Some(U256::from(1)));
    app.select_prev();
    assert_eq!(app.selected_bet_id(), Some(U256::from(2)));
}

#[test]
fn apply__resolution_event__records_notification() {
    // given
    let mut app = controller(Some(PLAYER));

    // when
    app.apply(WorkerEvent::Chain(ChainEvent::Resolution(arb_resolution(4, PLAYER))));
    let snap = app.build_snapshot(NOW);

    // then
    assert_eq!(app.notifications().len(), 1);
    assert_eq!(
        snap.notifications[0].message,
        "Game resolved! Bet was Heads, result was Tails. Winner: You"
    );
    assert_eq!(snap.notifications[0].payout, "2.0000");
    assert_eq!(snap.status, "Bet #4 updated: Fulfilled");
}

#[test]
fn apply__ledger_change_without_action__changes_nothing() {
    // given
    let mut app = controller(Some(PLAYER));

    // when
    app.apply(WorkerEvent::Chain(ChainEvent::LedgerChanged(LedgerChange {
        bet_id: U256::from(1),
        player1: CREATOR,
        player2: PLAYER,
        status: BetStatus::Fulfilled,
    })));

    // then
    assert!(app.build_snapshot(NOW).transactions.is_empty());
    assert!(app.errors().is_empty());
}

#[test]
fn push_errors__keeps_latest_fifty_and_shows_five() {
    // given
    let mut app = controller(None);

    // when
    app.push_errors((0..60).map(|i| format!("error {i}")).collect());
    let snap = app.build_snapshot(NOW);

    // then
    assert_eq!(app.errors().len(), 50);
    assert_eq!(app.errors()[0], "error 10");
    assert_eq!(snap.errors.len(), 5);
    assert_eq!(snap.errors[4], "error 59");
}

#[test]
fn action_finished__failure_is_reported() {
    // given
    let mut app = controller(Some(PLAYER));

    // when
    app.action_finished(ActionOutcome {
        kind: ActionKind::Join,
        bet_id: U256::from(7),
        result: Err(ActionError::Busy),
    });
    app.action_finished(ActionOutcome {
        kind: ActionKind::Cancel,
        bet_id: U256::from(8),
        result: Ok(()),
    });

    // then
    assert_eq!(app.errors().len(), 1);
    assert!(app.errors()[0].starts_with("Bet #7"));
    assert_eq!(app.build_snapshot(NOW).status, "Cancelled bet #8");
}

#[tokio::test]
async fn ledger_worker__forwards_events_and_refreshes_on_ledger_change() {
    // given
    let contract = FakeBetContract::new(CONTRACT);
    contract.set_bets(vec![arb_pending_bet(1, CREATOR, Address::ZERO)]);
    let events = stream::iter(vec![ChainEvent::LedgerChanged(LedgerChange {
        bet_id: U256::from(1),
        player1: CREATOR,
        player2: PLAYER,
        status: BetStatus::Fulfilled,
    })]);
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    cmd_tx.send(WorkerCommand::Shutdown).unwrap();

    // when
    ledger_worker(contract, FakeLedgerSource::default(), events, cmd_rx, event_tx)
        .await
        .unwrap();

    // then
    let mut seen = Vec::new();
    while let Ok(event) = event_rx.try_recv() {
        seen.push(match event {
            WorkerEvent::Bets(Ok(bets)) => format!("bets:{}", bets.len()),
            WorkerEvent::Chain(ChainEvent::LedgerChanged(_)) => "ledger".to_string(),
            other => format!("{other:?}"),
        });
    }
    assert_eq!(seen, vec!["bets:1", "ledger", "bets:1"]);
}

#[tokio::test]
async fn ledger_worker__fetch_command__returns_all_pages() {
    // given
    let indexer = FakeLedgerSource::with_pages(vec![Ok((0..3).map(arb_payout).collect())]);
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    cmd_tx
        .send(WorkerCommand::FetchLedger(QueryScope::AllPayouts))
        .unwrap();
    drop(cmd_tx);

    // when
    ledger_worker(
        FakeBetContract::new(CONTRACT),
        indexer,
        stream::empty::<ChainEvent>(),
        cmd_rx,
        event_tx,
    )
    .await
    .unwrap();

    // then
    assert!(matches!(event_rx.try_recv(), Ok(WorkerEvent::Bets(Ok(_)))));
    match event_rx.try_recv() {
        Ok(WorkerEvent::Ledger {
            scope,
            result: Ok(records),
        }) => {
            assert_eq!(scope, QueryScope::AllPayouts);
            assert_eq!(records.len(), 3);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn ledger_worker__receiver_dropped__errors() {
    // given
    let (_cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    drop(event_rx);

    // when
    let result = ledger_worker(
        FakeBetContract::new(CONTRACT),
        FakeLedgerSource::default(),
        stream::empty::<ChainEvent>(),
        cmd_rx,
        event_tx,
    )
    .await;

    // then
    assert!(result.is_err());
}

#[tokio::test]
async fn ledger_worker__indexer_fetch_hangs__chain_events_still_forwarded() {
    // given
    let (chain_tx, chain_rx) = futures::channel::mpsc::unbounded();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    cmd_tx
        .send(WorkerCommand::FetchLedger(QueryScope::AllBets))
        .unwrap();
    let worker = ledger_worker(
        FakeBetContract::new(CONTRACT),
        FakeLedgerSource::hanging(),
        chain_rx,
        cmd_rx,
        event_tx,
    );
    let observe = async {
        let first = event_rx.recv().await;
        chain_tx
            .unbounded_send(ChainEvent::Resolution(arb_resolution(5, PLAYER)))
            .unwrap();
        let next = time::timeout(Duration::from_secs(2), event_rx.recv()).await;
        (first, next)
    };

    // when
    let (first, next) = tokio::select! {
        res = worker => panic!("worker exited early: {res:?}"),
        observed = observe => observed,
    };

    // then
    assert!(matches!(first, Some(WorkerEvent::Bets(Ok(_)))));
    match next {
        Ok(Some(WorkerEvent::Chain(ChainEvent::Resolution(event)))) => {
            assert_eq!(event.bet_id, U256::from(5));
        }
        other => panic!("chain event not forwarded while fetch pending: {other:?}"),
    }
}

#[tokio::test]
async fn ledger_worker__commands_closed__finishes_in_flight_fetches() {
    // given
    let indexer = FakeLedgerSource::with_pages(vec![Ok((0..2).map(arb_payout).collect())]);
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    cmd_tx
        .send(WorkerCommand::FetchLedger(QueryScope::TokenPayouts(PAYOUT_TOKEN)))
        .unwrap();
    cmd_tx
        .send(WorkerCommand::FetchLedger(QueryScope::PlayerBets(PLAYER)))
        .unwrap();
    drop(cmd_tx);

    // when
    ledger_worker(
        FakeBetContract::new(CONTRACT),
        indexer,
        futures::stream::pending::<ChainEvent>(),
        cmd_rx,
        event_tx,
    )
    .await
    .unwrap();

    // then
    let mut scopes = Vec::new();
    while let Ok(event) = event_rx.try_recv() {
        if let WorkerEvent::Ledger { scope, result } = event {
            assert!(result.is_ok());
            scopes.push(scope);
        }
    }
    assert_eq!(
        scopes,
        vec![
            QueryScope::TokenPayouts(PAYOUT_TOKEN),
            QueryScope::PlayerBets(PLAYER),
        ]
    );
}
