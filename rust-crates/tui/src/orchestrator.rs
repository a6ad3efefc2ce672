use crate::{
    errors::{
        ActionError,
        ContractError,
    },
    types::{
        BetStatus,
        LedgerChange,
        PendingBet,
    },
};
use alloy::primitives::{
    Address,
    TxHash,
    U256,
};
use generated_abi::is_native_token;
use std::{
    collections::HashMap,
    future::Future,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
    time::Duration,
};
use tokio::{
    sync::watch,
    time,
};
use tracing::{
    error,
    info,
    warn,
};

pub const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Read and write surface of the betting contract.
pub trait BetContract {
    fn address(&self) -> Address;

    fn all_bets(&self) -> impl Future<Output = Result<Vec<PendingBet>, ContractError>>;

    /// Submit an ERC-20 `approve(spender, amount)` on `token`.
    fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> impl Future<Output = Result<TxHash, ContractError>>;

    fn join_game(
        &self,
        bet_id: U256,
        value: U256,
    ) -> impl Future<Output = Result<TxHash, ContractError>>;

    fn cancel_bet(&self, bet_id: U256)
    -> impl Future<Output = Result<TxHash, ContractError>>;

    /// Resolves once the transaction is mined. A mined but reverted
    /// transaction is `ContractError::Reverted`.
    fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
    ) -> impl Future<Output = Result<(), ContractError>>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum TxPhase {
    #[default]
    Idle,
    Submitted,
    Confirming,
    Confirmed,
    Failed,
}

impl TxPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, TxPhase::Confirmed | TxPhase::Failed)
    }

    pub fn is_in_flight(self) -> bool {
        matches!(self, TxPhase::Submitted | TxPhase::Confirming)
    }
}

/// Lifecycle of one tracked transaction. Phases only move forward and a
/// terminal phase is final.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransactionState {
    pub hash: Option<TxHash>,
    pub phase: TxPhase,
}

impl TransactionState {
    pub fn submit(&mut self, hash: TxHash) -> bool {
        if self.phase != TxPhase::Idle {
            return false;
        }
        self.hash = Some(hash);
        self.phase = TxPhase::Submitted;
        true
    }

    pub fn advance(&mut self, next: TxPhase) -> bool {
        if self.phase.is_terminal() || next <= self.phase {
            return false;
        }
        self.phase = next;
        true
    }

    pub fn fail(&mut self) -> bool {
        self.advance(TxPhase::Failed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TxSlot {
    Approval,
    Join,
    Cancel,
}

impl TxSlot {
    pub fn phase_text(self, phase: TxPhase) -> Option<&'static str> {
        let text = match (self, phase) {
            (_, TxPhase::Idle) => return None,
            (_, TxPhase::Failed) => "Failed",
            (TxSlot::Approval, TxPhase::Confirmed) => "Approved!",
            (TxSlot::Approval, _) => "Approving...",
            (TxSlot::Join, TxPhase::Confirmed) => "Joined!",
            (TxSlot::Join, _) => "Joining...",
            (TxSlot::Cancel, TxPhase::Confirmed) => "Canceled!",
            (TxSlot::Cancel, _) => "Canceling...",
        };
        Some(text)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionKind {
    Join,
    Cancel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActiveAction {
    pub bet_id: U256,
    pub kind: ActionKind,
}

/// Combined status of the current (or most recent) join/cancel flow.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActionStatus {
    pub approval: TransactionState,
    pub join: TransactionState,
    pub cancel: TransactionState,
    pub active: Option<ActiveAction>,
    pub last_error: Option<String>,
}

impl ActionStatus {
    pub fn slot(&self, slot: TxSlot) -> &TransactionState {
        match slot {
            TxSlot::Approval => &self.approval,
            TxSlot::Join => &self.join,
            TxSlot::Cancel => &self.cancel,
        }
    }

    fn slot_mut(&mut self, slot: TxSlot) -> &mut TransactionState {
        match slot {
            TxSlot::Approval => &mut self.approval,
            TxSlot::Join => &mut self.join,
            TxSlot::Cancel => &mut self.cancel,
        }
    }

    pub fn active_for(&self, bet_id: U256) -> Option<ActionKind> {
        self.active
            .filter(|active| active.bet_id == bet_id)
            .map(|active| active.kind)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfirmationSource {
    Receipt,
    LedgerEvent,
}

pub type ConfirmationOutcome = Result<ConfirmationSource, ContractError>;

/// Single-assignment completion signal. The first `resolve` wins; later ones
/// are ignored.
#[derive(Clone, Debug)]
pub struct Confirmation {
    slot: Arc<watch::Sender<Option<ConfirmationOutcome>>>,
}

impl Default for Confirmation {
    fn default() -> Self {
        Self::new()
    }
}

impl Confirmation {
    pub fn new() -> Self {
        let (slot, _) = watch::channel(None);
        Self {
            slot: Arc::new(slot),
        }
    }

    pub fn resolve(&self, outcome: ConfirmationOutcome) -> bool {
        self.slot.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(outcome);
            true
        })
    }

    pub fn outcome(&self) -> Option<ConfirmationOutcome> {
        self.slot.borrow().clone()
    }

    pub async fn wait(&self) -> ConfirmationOutcome {
        let mut rx = self.slot.subscribe();
        let resolved = rx
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|outcome| (*outcome).clone());
        resolved.unwrap_or_else(|| {
            Err(ContractError::Rpc("confirmation signal dropped".to_string()))
        })
    }
}

/// Runs join and cancel flows against a [`BetContract`], one at a time.
pub struct BetOrchestrator<C> {
    contract: C,
    account: Option<Address>,
    status: watch::Sender<ActionStatus>,
    confirmations: Mutex<HashMap<U256, Confirmation>>,
    confirmation_timeout: Duration,
}

impl<C: BetContract> BetOrchestrator<C> {
    pub fn new(contract: C, account: Option<Address>) -> Self {
        let (status, _) = watch::channel(ActionStatus::default());
        Self {
            contract,
            account,
            status,
            confirmations: Mutex::new(HashMap::new()),
            confirmation_timeout: CONFIRMATION_TIMEOUT,
        }
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn account(&self) -> Option<Address> {
        self.account
    }

    pub fn contract(&self) -> &C {
        &self.contract
    }

    pub fn status(&self) -> ActionStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ActionStatus> {
        self.status.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.status.borrow().active.is_some()
    }

    /// Join `bet`, approving the stake first when it is not the native asset.
    /// The join is only submitted after the approval is confirmed.
    pub async fn join(&self, bet: &PendingBet, now: u64) -> Result<(), ActionError> {
        let account = self.account.ok_or(ActionError::WalletNotConnected)?;
        if !bet.can_join(Some(account), now) {
            return Err(ActionError::NotJoinable { bet_id: bet.id });
        }
        self.begin(bet.id, ActionKind::Join)?;
        let result = self.run_join(bet).await;
        self.finish(&result);
        result
    }

    async fn run_join(&self, bet: &PendingBet) -> Result<(), ActionError> {
        let value = if is_native_token(&bet.token) {
            bet.amount
        } else {
            let spender = self.contract.address();
            self.submit_and_confirm(
                TxSlot::Approval,
                bet.id,
                self.contract.approve(bet.token, spender, bet.amount),
                false,
            )
            .await
            .map_err(ActionError::Approval)?;
            U256::ZERO
        };
        self.submit_and_confirm(
            TxSlot::Join,
            bet.id,
            self.contract.join_game(bet.id, value),
            true,
        )
        .await
        .map(|_| ())
        .map_err(ActionError::Transaction)
    }

    pub async fn cancel(&self, bet: &PendingBet, now: u64) -> Result<(), ActionError> {
        let account = self.account.ok_or(ActionError::WalletNotConnected)?;
        if !bet.can_cancel(Some(account), now) {
            return Err(ActionError::NotCancellable { bet_id: bet.id });
        }
        self.begin(bet.id, ActionKind::Cancel)?;
        let result = self
            .submit_and_confirm(
                TxSlot::Cancel,
                bet.id,
                self.contract.cancel_bet(bet.id),
                true,
            )
            .await
            .map(|_| ())
            .map_err(ActionError::Transaction);
        self.finish(&result);
        result
    }

    /// Feed a ledger change from the contract's event stream. Returns true if
    /// it confirmed the in-flight join or cancel for that bet.
    pub fn observe_ledger_change(&self, change: &LedgerChange) -> bool {
        let Some(kind) = self.status.borrow().active_for(change.bet_id) else {
            return false;
        };
        let consistent = match kind {
            ActionKind::Join => self.account == Some(change.player2),
            ActionKind::Cancel => change.status == BetStatus::Cancelled,
        };
        if !consistent {
            return false;
        }
        let confirmation = self.confirmations().get(&change.bet_id).cloned();
        confirmation
            .is_some_and(|confirmation| confirmation.resolve(Ok(ConfirmationSource::LedgerEvent)))
    }

    fn begin(&self, bet_id: U256, kind: ActionKind) -> Result<(), ActionError> {
        let started = self.status.send_if_modified(|status| {
            if status.active.is_some() {
                return false;
            }
            *status = ActionStatus {
                active: Some(ActiveAction { bet_id, kind }),
                ..ActionStatus::default()
            };
            true
        });
        if started {
            Ok(())
        } else {
            warn!(%bet_id, ?kind, "action rejected while another is in flight");
            Err(ActionError::Busy)
        }
    }

    fn finish(&self, result: &Result<(), ActionError>) {
        let last_error = result.as_ref().err().map(ToString::to_string);
        self.status.send_modify(|status| {
            status.active = None;
            status.last_error = last_error;
        });
    }

    async fn submit_and_confirm(
        &self,
        slot: TxSlot,
        bet_id: U256,
        submit: impl Future<Output = Result<TxHash, ContractError>>,
        ledger_confirms: bool,
    ) -> Result<ConfirmationSource, ContractError> {
        let confirmation = ledger_confirms.then(|| self.register(bet_id));
        let result = self.drive(slot, bet_id, submit, confirmation.as_ref()).await;
        if ledger_confirms {
            self.confirmations().remove(&bet_id);
        }
        result
    }

    async fn drive(
        &self,
        slot: TxSlot,
        bet_id: U256,
        submit: impl Future<Output = Result<TxHash, ContractError>>,
        confirmation: Option<&Confirmation>,
    ) -> Result<ConfirmationSource, ContractError> {
        let tx_hash = match submit.await {
            Ok(tx_hash) => tx_hash,
            Err(e) => {
                error!(%bet_id, ?slot, error = %e, "transaction submission failed");
                self.update(slot, TransactionState::fail);
                return Err(e);
            }
        };
        info!(%bet_id, ?slot, %tx_hash, "transaction submitted");
        self.update(slot, |tx| tx.submit(tx_hash));
        self.update(slot, |tx| tx.advance(TxPhase::Confirming));

        let receipt = self.await_receipt(tx_hash);
        let outcome = match confirmation {
            None => receipt.await.map(|()| ConfirmationSource::Receipt),
            Some(confirmation) => {
                tokio::select! {
                    result = receipt => {
                        confirmation.resolve(result.map(|()| ConfirmationSource::Receipt));
                    }
                    _ = confirmation.wait() => {}
                }
                confirmation.wait().await
            }
        };

        match &outcome {
            Ok(source) => {
                info!(%bet_id, ?slot, %tx_hash, ?source, "transaction confirmed");
                self.update(slot, |tx| tx.advance(TxPhase::Confirmed));
            }
            Err(e) => {
                error!(%bet_id, ?slot, %tx_hash, error = %e, "transaction failed");
                self.update(slot, TransactionState::fail);
            }
        }
        outcome
    }

    async fn await_receipt(&self, tx_hash: TxHash) -> Result<(), ContractError> {
        match time::timeout(
            self.confirmation_timeout,
            self.contract.wait_for_receipt(tx_hash),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ContractError::Timeout {
                tx_hash: tx_hash.to_string(),
            }),
        }
    }

    fn register(&self, bet_id: U256) -> Confirmation {
        let confirmation = Confirmation::new();
        self.confirmations().insert(bet_id, confirmation.clone());
        confirmation
    }

    fn confirmations(&self) -> MutexGuard<'_, HashMap<U256, Confirmation>> {
        self.confirmations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, slot: TxSlot, apply: impl FnOnce(&mut TransactionState) -> bool) {
        self.status
            .send_if_modified(|status| apply(status.slot_mut(slot)));
    }
}
