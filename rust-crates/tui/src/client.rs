use crate::{
    chain_client::ChainClient,
    errors::{
        ActionError,
        ContractError,
        FetchError,
    },
    format::{
        format_amount,
        format_signed_amount,
        format_timeout,
        token_decimals,
        token_symbol,
        truncate_address,
        truncate_hash,
        ETHER_DECIMALS,
    },
    indexer_client::IndexerClient,
    leaderboard::{
        RankBadge,
        TokenLeaderboard,
        build_leaderboards,
        leaderboard_for_token,
    },
    ledger::{
        LedgerSource,
        QueryScope,
        fetch_all,
    },
    notifications::NotificationLog,
    orchestrator::{
        ActionKind,
        ActionStatus,
        BetContract,
        BetOrchestrator,
        TxSlot,
    },
    pending_bets::{
        BetAction,
        PendingBetsTracker,
        action_for,
    },
    types::{
        BetRecord,
        ChainEvent,
        CoinFace,
        PendingBet,
    },
    ui,
    wallets,
};
use alloy::primitives::{
    Address,
    U256,
};
use chrono::{
    Local,
    Utc,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use crossterm::event::EventStream;
use deployments::{
    DeploymentEnv,
    DeploymentStore,
    TokenRecord,
};
use futures::{
    FutureExt,
    Stream,
    StreamExt,
    future::LocalBoxFuture,
    stream::{
        FuturesUnordered,
        LocalBoxStream,
    },
};
use std::{
    fmt,
    path::PathBuf,
    rc::Rc,
    sync::OnceLock,
    time::Duration,
};
use tokio::{
    sync::{
        mpsc,
        watch,
    },
    task::{
        self,
        LocalSet,
    },
    time,
};
use tracing::{
    error,
    info,
    warn,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::EnvFilter;

pub const DEFAULT_TESTNET_RPC_URL: &str = "https://ethereum-sepolia-rpc.publicnode.com";
pub const DEFAULT_DEVNET_RPC_URL: &str = "https://ethereum-holesky-rpc.publicnode.com";
pub const DEFAULT_LOCAL_RPC_URL: &str = "http://127.0.0.1:8545";
pub const ALL_BETS_PAGE_SIZE: usize = 10;
const MAX_ERRORS: usize = 50;
const VISIBLE_ERRORS: usize = 5;
const ERROR_PREVIEW_CHARS: usize = 50;
const DISPLAY_PLACES: usize = 2;
const REDRAW_INTERVAL: Duration = Duration::from_secs(1);
const LOG_DIR: &str = "logs";
const LOG_FILE_PREFIX: &str = "flip-coin.log";
const ALL_TOKENS_LABEL: &str = "All tokens";

#[derive(Clone, Debug)]
pub enum NetworkTarget {
    Testnet { url: String },
    Devnet { url: String },
    LocalNode { url: String },
}

impl NetworkTarget {
    pub fn env(&self) -> DeploymentEnv {
        match self {
            NetworkTarget::Testnet { .. } => DeploymentEnv::Test,
            NetworkTarget::Devnet { .. } => DeploymentEnv::Dev,
            NetworkTarget::LocalNode { .. } => DeploymentEnv::Local,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            NetworkTarget::Testnet { url }
            | NetworkTarget::Devnet { url }
            | NetworkTarget::LocalNode { url } => url,
        }
    }
}

impl fmt::Display for NetworkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.env(), self.url())
    }
}

#[derive(Clone, Debug)]
pub enum WalletConfig {
    Keystore { name: String, dir: PathBuf },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub network: NetworkTarget,
    /// `None` runs read-only.
    pub wallet: Option<WalletConfig>,
    pub indexer_url: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Tab {
    #[default]
    PendingBets,
    AllBets,
    Leaderboard,
    YourBets,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::PendingBets, Tab::AllBets, Tab::Leaderboard, Tab::YourBets];

    pub fn title(self) -> &'static str {
        match self {
            Tab::PendingBets => "Pending Bets",
            Tab::AllBets => "All Bets",
            Tab::Leaderboard => "Payouts Leaderboard",
            Tab::YourBets => "Your Bets",
        }
    }

    pub fn index(self) -> usize {
        Tab::ALL.iter().position(|tab| *tab == self).unwrap_or(0)
    }

    fn next(self) -> Tab {
        Tab::ALL[(self.index() + 1) % Tab::ALL.len()]
    }

    fn prev(self) -> Tab {
        Tab::ALL[(self.index() + Tab::ALL.len() - 1) % Tab::ALL.len()]
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingRow {
    pub bet_id: U256,
    pub player1: String,
    pub amount: String,
    pub token: String,
    pub face: CoinFace,
    pub timeout: String,
    pub time_left: String,
    pub action: BetAction,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BetRow {
    pub player: String,
    pub choice: CoinFace,
    pub outcome: CoinFace,
    pub profit: String,
    pub won: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeaderboardRow {
    pub badge: RankBadge,
    pub token: String,
    pub player: String,
    pub payout: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxLine {
    pub slot: TxSlot,
    pub hash: String,
    pub text: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotificationRow {
    pub time: String,
    pub message: String,
    pub payout: String,
}

#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub network: String,
    pub account: Option<String>,
    pub tab: Tab,
    pub selected_row: usize,
    pub status: String,
    pub errors: Vec<String>,
    pub empty_message: Option<&'static str>,
    pub pending: Vec<PendingRow>,
    pub pending_page: String,
    pub all_bets: Vec<BetRow>,
    pub all_bets_range: String,
    pub leaderboard_token: Option<String>,
    pub leaderboard: Vec<LeaderboardRow>,
    pub your_bets: Vec<BetRow>,
    pub transactions: Vec<TxLine>,
    pub last_tx_error: Option<String>,
    pub notifications: Vec<NotificationRow>,
}

#[derive(Debug)]
pub enum WorkerCommand {
    RefreshBets,
    FetchLedger(QueryScope),
    Shutdown,
}

type LedgerResult = Result<Vec<BetRecord>, FetchError>;

#[derive(Debug)]
pub enum WorkerEvent {
    Bets(Result<Vec<PendingBet>, ContractError>),
    Ledger {
        scope: QueryScope,
        result: LedgerResult,
    },
    Chain(ChainEvent),
}

#[derive(Debug)]
pub struct ActionOutcome {
    pub kind: ActionKind,
    pub bet_id: U256,
    pub result: Result<(), ActionError>,
}

/// Which payouts the leaderboard tab shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BoardSelection {
    /// Index into the supported tokens.
    Token(usize),
    AllTokens,
}

pub struct AppController<C = ChainClient> {
    orchestrator: Rc<BetOrchestrator<C>>,
    network: String,
    supported_tokens: Vec<TokenRecord>,
    tracker: PendingBetsTracker,
    notifications: NotificationLog,
    all_bets: Vec<BetRecord>,
    all_bets_page: usize,
    leaderboard: Vec<TokenLeaderboard>,
    board: Option<BoardSelection>,
    your_bets: Vec<BetRecord>,
    tab: Tab,
    selected_row: usize,
    status: String,
    errors: Vec<String>,
}

impl<C: BetContract> AppController<C> {
    pub fn new(
        orchestrator: Rc<BetOrchestrator<C>>,
        network: impl Into<String>,
        supported_tokens: Vec<TokenRecord>,
    ) -> Self {
        let board = (!supported_tokens.is_empty()).then_some(BoardSelection::Token(0));
        Self {
            orchestrator,
            network: network.into(),
            supported_tokens,
            tracker: PendingBetsTracker::new(),
            notifications: NotificationLog::default(),
            all_bets: Vec::new(),
            all_bets_page: 0,
            leaderboard: Vec::new(),
            board,
            your_bets: Vec::new(),
            tab: Tab::default(),
            selected_row: 0,
            status: String::new(),
            errors: Vec::new(),
        }
    }

    pub fn account(&self) -> Option<Address> {
        self.orchestrator.account()
    }

    pub fn orchestrator(&self) -> Rc<BetOrchestrator<C>> {
        Rc::clone(&self.orchestrator)
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ActionStatus> {
        self.orchestrator.subscribe()
    }

    pub fn tracker(&self) -> &PendingBetsTracker {
        &self.tracker
    }

    pub fn notifications(&self) -> &NotificationLog {
        &self.notifications
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    fn selected_token(&self) -> Option<Address> {
        let Some(BoardSelection::Token(idx)) = self.board else {
            return None;
        };
        self.supported_tokens.get(idx)?.address.parse().ok()
    }

    fn board_scope(&self) -> Option<QueryScope> {
        match self.board? {
            BoardSelection::Token(_) => self.selected_token().map(QueryScope::TokenPayouts),
            BoardSelection::AllTokens => Some(QueryScope::AllPayouts),
        }
    }

    /// Queries to issue at startup.
    pub fn initial_queries(&self) -> Vec<QueryScope> {
        let mut scopes = vec![QueryScope::AllBets];
        scopes.extend(self.board_scope());
        if let Some(account) = self.account() {
            scopes.push(QueryScope::PlayerBets(account));
        }
        scopes
    }

    pub fn apply(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Bets(Ok(bets)) => {
                self.tracker.replace(bets);
                self.clamp_selection();
            }
            WorkerEvent::Bets(Err(e)) => {
                self.push_errors(vec![format!("Failed to read bets: {e}")]);
            }
            WorkerEvent::Ledger {
                scope,
                result: Ok(records),
            } => self.ingest_ledger(scope, records),
            WorkerEvent::Ledger {
                scope,
                result: Err(e),
            } => {
                self.push_errors(vec![format!("Indexer query {scope:?} failed: {e}")]);
            }
            WorkerEvent::Chain(ChainEvent::LedgerChanged(change)) => {
                if self.orchestrator.observe_ledger_change(&change) {
                    info!(bet_id = %change.bet_id, "transaction confirmed by ledger event");
                }
            }
            WorkerEvent::Chain(ChainEvent::Resolution(event)) => {
                self.notifications
                    .record(&event, self.account(), Local::now());
                self.set_status(format!("Bet #{} updated: {}", event.bet_id, event.status));
            }
        }
    }

    fn ingest_ledger(&mut self, scope: QueryScope, records: Vec<BetRecord>) {
        match scope {
            QueryScope::AllBets => {
                self.all_bets = records;
                self.all_bets_page = self.all_bets_page.min(self.all_bets_page_count() - 1);
            }
            QueryScope::TokenPayouts(token) => {
                if self.selected_token() == Some(token) {
                    self.leaderboard = vec![leaderboard_for_token(&records, token)];
                }
            }
            QueryScope::PlayerBets(player) => {
                if self.account() == Some(player) {
                    self.your_bets = records;
                }
            }
            QueryScope::AllPayouts => {
                if self.board == Some(BoardSelection::AllTokens) {
                    let mut boards = build_leaderboards(&records);
                    boards.sort_by_key(|board| self.token_rank(&board.token));
                    self.leaderboard = boards;
                }
            }
        }
    }

    // Supported tokens first, in deployment order; unknown tokens after.
    fn token_rank(&self, token: &Address) -> (usize, Address) {
        let position = self
            .supported_tokens
            .iter()
            .position(|record| record.address.parse::<Address>().ok() == Some(*token))
            .unwrap_or(self.supported_tokens.len());
        (position, *token)
    }

    fn all_bets_page_count(&self) -> usize {
        self.all_bets.len().div_ceil(ALL_BETS_PAGE_SIZE).max(1)
    }

    pub fn next_tab(&mut self) {
        self.tab = self.tab.next();
        self.selected_row = 0;
    }

    pub fn prev_tab(&mut self) {
        self.tab = self.tab.prev();
        self.selected_row = 0;
    }

    pub fn select_next(&mut self) {
        let rows = self.tracker.current_page().len();
        if self.tab == Tab::PendingBets && rows > 0 {
            self.selected_row = (self.selected_row + 1).min(rows - 1);
        }
    }

    pub fn select_prev(&mut self) {
        self.selected_row = self.selected_row.saturating_sub(1);
    }

    pub fn next_page(&mut self) {
        match self.tab {
            Tab::PendingBets => {
                self.tracker.next_page();
                self.selected_row = 0;
            }
            Tab::AllBets => {
                self.all_bets_page = (self.all_bets_page + 1).min(self.all_bets_page_count() - 1);
            }
            Tab::Leaderboard | Tab::YourBets => {}
        }
    }

    pub fn prev_page(&mut self) {
        match self.tab {
            Tab::PendingBets => {
                self.tracker.prev_page();
                self.selected_row = 0;
            }
            Tab::AllBets => self.all_bets_page = self.all_bets_page.saturating_sub(1),
            Tab::Leaderboard | Tab::YourBets => {}
        }
    }

    /// Move the leaderboard to the next supported token, then to the
    /// all-tokens view, then back to the first token. Returns the query
    /// that fills it.
    pub fn next_token(&mut self) -> Option<QueryScope> {
        let last = self.supported_tokens.len().checked_sub(1)?;
        let next = match self.board {
            Some(BoardSelection::Token(idx)) if idx < last => BoardSelection::Token(idx + 1),
            Some(BoardSelection::Token(_)) => BoardSelection::AllTokens,
            Some(BoardSelection::AllTokens) | None => BoardSelection::Token(0),
        };
        self.board = Some(next);
        self.leaderboard.clear();
        let scope = self.board_scope();
        if let (None, BoardSelection::Token(idx)) = (&scope, next) {
            let address = self.supported_tokens[idx].address.clone();
            self.push_errors(vec![format!("Invalid token address {address}")]);
        }
        scope
    }

    pub fn selected_bet_id(&self) -> Option<U256> {
        if self.tab != Tab::PendingBets {
            return None;
        }
        self.tracker
            .current_page()
            .get(self.selected_row)
            .map(|bet| bet.id)
    }

    /// Decide whether `bet_id` is to be joined or cancelled by the connected
    /// account at `now`.
    pub fn prepare_action(
        &self,
        bet_id: U256,
        now: u64,
    ) -> Result<(ActionKind, PendingBet), ActionError> {
        let bet = self.tracker.get(bet_id)?.clone();
        let account = self.account().ok_or(ActionError::WalletNotConnected)?;
        if self.orchestrator.is_busy() {
            return Err(ActionError::Busy);
        }
        if bet.is_expired(now) {
            if bet.can_cancel(Some(account), now) {
                Ok((ActionKind::Cancel, bet))
            } else {
                Err(ActionError::NotCancellable { bet_id })
            }
        } else if bet.can_join(Some(account), now) {
            Ok((ActionKind::Join, bet))
        } else {
            Err(ActionError::NotJoinable { bet_id })
        }
    }

    pub fn action_finished(&mut self, outcome: ActionOutcome) {
        let ActionOutcome {
            kind,
            bet_id,
            result,
        } = outcome;
        match result {
            Ok(()) => {
                let verb = match kind {
                    ActionKind::Join => "Joined",
                    ActionKind::Cancel => "Cancelled",
                };
                self.set_status(format!("{verb} bet #{bet_id}"));
            }
            Err(e) => {
                error!(%bet_id, ?kind, error = %e, "bet action failed");
                self.push_errors(vec![format!("Bet #{bet_id}: {e}")]);
            }
        }
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
    }

    pub fn push_errors(&mut self, mut items: Vec<String>) {
        if items.is_empty() {
            return;
        }
        for item in &items {
            error!("{}", item);
        }
        self.errors.append(&mut items);
        if self.errors.len() > MAX_ERRORS {
            let drain = self.errors.len() - MAX_ERRORS;
            self.errors.drain(0..drain);
        }
    }

    fn clamp_selection(&mut self) {
        let rows = self.tracker.current_page().len();
        self.selected_row = self.selected_row.min(rows.saturating_sub(1));
    }

    pub fn build_snapshot(&self, now: u64) -> AppSnapshot {
        let status = self.orchestrator.status();
        let account = self.account();

        let pending: Vec<PendingRow> = self
            .tracker
            .current_page()
            .into_iter()
            .map(|bet| self.pending_row(bet, account, now, &status))
            .collect();

        let start = self.all_bets_page * ALL_BETS_PAGE_SIZE;
        let all_bets: Vec<BetRow> = self
            .all_bets
            .iter()
            .skip(start)
            .take(ALL_BETS_PAGE_SIZE)
            .map(bet_row)
            .collect();
        let all_bets_range = if self.all_bets.is_empty() {
            "Showing 0 to 0 of 0 results".to_string()
        } else {
            format!(
                "Showing {} to {} of {} results",
                start + 1,
                start + all_bets.len(),
                self.all_bets.len()
            )
        };

        let leaderboard_token = match self.board {
            Some(BoardSelection::AllTokens) => Some(ALL_TOKENS_LABEL.to_string()),
            Some(BoardSelection::Token(_)) | None => self
                .selected_token()
                .map(|token| token_symbol(&token, &self.supported_tokens)),
        };
        let leaderboard: Vec<LeaderboardRow> = self
            .leaderboard
            .iter()
            .flat_map(|board| {
                let decimals = token_decimals(&board.token, &self.supported_tokens);
                let symbol = token_symbol(&board.token, &self.supported_tokens);
                board
                    .entries
                    .iter()
                    .enumerate()
                    .map(move |(idx, entry)| LeaderboardRow {
                        badge: RankBadge::for_index(idx),
                        token: symbol.clone(),
                        player: truncate_address(&entry.player),
                        payout: format_amount(entry.total_payout, decimals, DISPLAY_PLACES),
                    })
            })
            .collect();

        let your_bets: Vec<BetRow> = self.your_bets.iter().map(bet_row).collect();

        let empty_message = match self.tab {
            Tab::PendingBets if pending.is_empty() => Some("No pending bets."),
            Tab::AllBets if all_bets.is_empty() => Some("No bets available."),
            Tab::Leaderboard if leaderboard_token.is_none() => {
                Some("Please select a token to view the leaderboard.")
            }
            Tab::Leaderboard if leaderboard.is_empty() => {
                Some("No leaderboard data available for this token.")
            }
            Tab::YourBets if your_bets.is_empty() => Some("You haven't placed any bets yet."),
            _ => None,
        };

        let transactions = [TxSlot::Approval, TxSlot::Join, TxSlot::Cancel]
            .into_iter()
            .filter_map(|slot| {
                let tx = status.slot(slot);
                let text = slot.phase_text(tx.phase)?;
                Some(TxLine {
                    slot,
                    hash: tx
                        .hash
                        .map(|hash| truncate_hash(&hash.to_string()))
                        .unwrap_or_default(),
                    text,
                })
            })
            .collect();

        let errors_start = self.errors.len().saturating_sub(VISIBLE_ERRORS);

        AppSnapshot {
            network: self.network.clone(),
            account: account.map(|a| truncate_address(&a)),
            tab: self.tab,
            selected_row: self.selected_row,
            status: self.status.clone(),
            errors: self.errors[errors_start..].to_vec(),
            empty_message,
            pending,
            pending_page: self.tracker.page_label(),
            all_bets,
            all_bets_range,
            leaderboard_token,
            leaderboard,
            your_bets,
            transactions,
            last_tx_error: status
                .last_error
                .as_ref()
                .map(|e| e.chars().take(ERROR_PREVIEW_CHARS).collect()),
            notifications: self
                .notifications
                .entries()
                .map(|n| NotificationRow {
                    time: n.received_at.format("%H:%M:%S").to_string(),
                    message: n.message.clone(),
                    payout: n.payout_text(),
                })
                .collect(),
        }
    }

    fn pending_row(
        &self,
        bet: &PendingBet,
        account: Option<Address>,
        now: u64,
        status: &ActionStatus,
    ) -> PendingRow {
        let decimals = token_decimals(&bet.token, &self.supported_tokens);
        PendingRow {
            bet_id: bet.id,
            player1: truncate_address(&bet.player1),
            amount: format_amount(bet.amount, decimals, DISPLAY_PLACES),
            token: token_symbol(&bet.token, &self.supported_tokens),
            face: bet.face(),
            timeout: format_timeout(bet.timeout_seconds),
            time_left: if bet.is_expired(now) {
                "Expired".to_string()
            } else {
                format_timeout(bet.remaining_seconds(now))
            },
            action: action_for(bet, account, now, status),
        }
    }
}

fn bet_row(record: &BetRecord) -> BetRow {
    BetRow {
        player: truncate_address(&record.player),
        choice: CoinFace::from_house_flag(record.player_choice),
        outcome: CoinFace::from_house_flag(record.outcome),
        profit: format_signed_amount(record.profit, ETHER_DECIMALS, DISPLAY_PLACES),
        won: record.won,
    }
}

pub fn now_unix() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}

/// Reads contract state and indexer history off the UI loop. Indexer
/// fetches run concurrently with chain event forwarding, so a slow query
/// never holds back ledger changes. Every ledger change triggers a full
/// re-read of the bet list.
pub async fn ledger_worker<C, S, E>(
    contract: C,
    indexer: S,
    mut events: E,
    mut cmd_rx: mpsc::UnboundedReceiver<WorkerCommand>,
    event_tx: mpsc::UnboundedSender<WorkerEvent>,
) -> Result<()>
where
    C: BetContract,
    S: LedgerSource,
    E: Stream<Item = ChainEvent> + Unpin,
{
    async fn refresh_bets<C: BetContract>(
        contract: &C,
        event_tx: &mpsc::UnboundedSender<WorkerEvent>,
    ) -> Result<()> {
        let bets = contract.all_bets().await;
        if let Err(err) = &bets {
            warn!(error = %err, "bet list refresh failed");
        }
        event_tx
            .send(WorkerEvent::Bets(bets))
            .map_err(|_| eyre!("ledger event receiver dropped"))
    }

    refresh_bets(&contract, &event_tx).await?;
    let indexer = &indexer;
    let mut fetches: FuturesUnordered<LocalBoxFuture<'_, (QueryScope, LedgerResult)>> =
        FuturesUnordered::new();
    let mut events_open = true;
    let mut commands_open = true;

    while commands_open || !fetches.is_empty() {
        tokio::select! {
            biased;
            event = events.next(), if events_open => {
                let Some(event) = event else {
                    warn!("contract event stream ended");
                    events_open = false;
                    continue;
                };
                let refresh = matches!(event, ChainEvent::LedgerChanged(_));
                event_tx
                    .send(WorkerEvent::Chain(event))
                    .map_err(|_| eyre!("ledger event receiver dropped"))?;
                if refresh {
                    refresh_bets(&contract, &event_tx).await?;
                }
            }
            Some((scope, result)) = fetches.next(), if !fetches.is_empty() => {
                if let Err(err) = &result {
                    warn!(?scope, error = %err, "indexer fetch failed");
                }
                event_tx
                    .send(WorkerEvent::Ledger { scope, result })
                    .map_err(|_| eyre!("ledger event receiver dropped"))?;
            }
            cmd = cmd_rx.recv(), if commands_open => {
                match cmd {
                    None => commands_open = false,
                    Some(WorkerCommand::RefreshBets) => refresh_bets(&contract, &event_tx).await?,
                    Some(WorkerCommand::FetchLedger(scope)) => {
                        fetches.push(
                            async move {
                                let result = fetch_all(indexer, &scope).await;
                                (scope, result)
                            }
                            .boxed_local(),
                        );
                    }
                    Some(WorkerCommand::Shutdown) => break,
                }
            }
            else => break,
        }
    }
    Ok(())
}

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Logs go to a daily file under `logs/`; the terminal belongs to the UI.
pub fn init_tracing() {
    let appender = rolling::daily(LOG_DIR, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    if installed.is_ok() {
        let _ = LOG_GUARD.set(guard);
    }
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let env = config.network.env();
    let record = DeploymentStore::new(env)
        .and_then(|store| store.load())
        .map_err(|e| eyre!("{e:#}"))?
        .ok_or_else(|| {
            eyre!(
                "No {env} deployment recorded in .deployments/{}/deployments.json",
                env.dir_name()
            )
        })?;
    let contract_address: Address = record
        .contract_address
        .parse()
        .wrap_err("invalid contract address in deployment record")?;
    let indexer_url = config
        .indexer_url
        .clone()
        .or_else(|| record.indexer_url.clone())
        .ok_or_else(|| eyre!("No indexer URL; pass --indexer-url or record one for {env}"))?;

    let signer = match &config.wallet {
        Some(WalletConfig::Keystore { name, dir }) => {
            let descriptor = wallets::find_wallet(dir, name)?;
            Some(wallets::unlock_wallet(&descriptor)?)
        }
        None => None,
    };
    let account = signer.as_ref().map(|signer| signer.address());
    info!(network = %config.network, contract = %contract_address, ?account, "connecting");

    let chain = ChainClient::connect(config.network.url(), contract_address, signer)
        .wrap_err("failed to connect to RPC")?;
    if let Some(chain_id) = record.chain_id {
        chain
            .check_chain_id(chain_id)
            .await
            .wrap_err("RPC endpoint does not match the deployment")?;
    }
    let indexer = IndexerClient::new(indexer_url).wrap_err("failed to build indexer client")?;
    let events = chain
        .event_stream()
        .await
        .wrap_err("failed to subscribe to contract events")?;
    let orchestrator = Rc::new(BetOrchestrator::new(chain.clone(), account));
    let controller =
        AppController::new(orchestrator, config.network.to_string(), record.supported_tokens);

    let local = LocalSet::new();
    local
        .run_until(async move {
            let mut ui_state = ui::UiState::default();
            tracing::info!("Starting UI");
            ui::terminal_enter(&mut ui_state)?;
            let res = run_loop(controller, chain, indexer, events, &mut ui_state).await;
            ui::terminal_exit()?;
            res
        })
        .await
}

fn spawn_action(
    controller: &mut AppController,
    action_tx: &mpsc::UnboundedSender<ActionOutcome>,
) {
    let Some(bet_id) = controller.selected_bet_id() else {
        return;
    };
    let now = now_unix();
    let (kind, bet) = match controller.prepare_action(bet_id, now) {
        Ok(prepared) => prepared,
        Err(e) => {
            controller.push_errors(vec![format!("Bet #{bet_id}: {e}")]);
            return;
        }
    };
    let orchestrator = controller.orchestrator();
    let action_tx = action_tx.clone();
    controller.set_status(match kind {
        ActionKind::Join => format!("Joining bet #{bet_id}..."),
        ActionKind::Cancel => format!("Canceling bet #{bet_id}..."),
    });
    task::spawn_local(async move {
        let result = match kind {
            ActionKind::Join => orchestrator.join(&bet, now).await,
            ActionKind::Cancel => orchestrator.cancel(&bet, now).await,
        };
        let _ = action_tx.send(ActionOutcome {
            kind,
            bet_id,
            result,
        });
    });
}

async fn run_loop(
    mut controller: AppController,
    chain: ChainClient,
    indexer: IndexerClient,
    events: LocalBoxStream<'static, ChainEvent>,
    ui_state: &mut ui::UiState,
) -> Result<()> {
    tracing::info!("Running app loop");
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (action_tx, mut action_rx) = mpsc::unbounded_channel();
    let worker = task::spawn_local(ledger_worker(chain, indexer, events, cmd_rx, event_tx));
    for scope in controller.initial_queries() {
        let _ = cmd_tx.send(WorkerCommand::FetchLedger(scope));
    }

    let mut status_rx = controller.subscribe_status();
    let mut input = EventStream::new();
    let mut redraw = time::interval(REDRAW_INTERVAL);

    loop {
        tokio::select! {
            maybe_event = event_rx.recv() => {
                let Some(event) = maybe_event else {
                    warn!("ledger worker channel closed");
                    break;
                };
                controller.apply(event);
            }
            Some(outcome) = action_rx.recv() => {
                controller.action_finished(outcome);
                let _ = cmd_tx.send(WorkerCommand::RefreshBets);
                if let Some(account) = controller.account() {
                    let _ = cmd_tx.send(WorkerCommand::FetchLedger(QueryScope::PlayerBets(account)));
                }
            }
            _ = status_rx.changed() => {}
            _ = redraw.tick() => {}
            _ = tokio::signal::ctrl_c() => break,
            raw_ev = input.next() => {
                let Some(raw_ev) = raw_ev else {
                    break;
                };
                let raw_ev = raw_ev.wrap_err("failed to read terminal input")?;
                let Some(ev) = ui::interpret_event(ui_state, raw_ev) else {
                    continue;
                };
                match ev {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::Redraw => {}
                    ui::UserEvent::NextTab => controller.next_tab(),
                    ui::UserEvent::PrevTab => controller.prev_tab(),
                    ui::UserEvent::SelectNext => controller.select_next(),
                    ui::UserEvent::SelectPrev => controller.select_prev(),
                    ui::UserEvent::NextPage => controller.next_page(),
                    ui::UserEvent::PrevPage => controller.prev_page(),
                    ui::UserEvent::NextToken => {
                        if let Some(scope) = controller.next_token() {
                            let _ = cmd_tx.send(WorkerCommand::FetchLedger(scope));
                        }
                    }
                    ui::UserEvent::Act => spawn_action(&mut controller, &action_tx),
                    ui::UserEvent::Refresh => {
                        controller.set_status("Refreshing...");
                        let _ = cmd_tx.send(WorkerCommand::RefreshBets);
                        for scope in controller.initial_queries() {
                            let _ = cmd_tx.send(WorkerCommand::FetchLedger(scope));
                        }
                    }
                }
            }
        }
        let snapshot = controller.build_snapshot(now_unix());
        ui::draw(ui_state, &snapshot).wrap_err("draw failed")?;
    }

    let _ = cmd_tx.send(WorkerCommand::Shutdown);
    match worker.await {
        Ok(Err(err)) => warn!(?err, "ledger worker exited with error"),
        Err(err) => warn!(?err, "ledger worker panicked"),
        Ok(Ok(())) => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests;
