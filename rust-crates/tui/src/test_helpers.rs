//! Scriptable stand-ins for the indexer and the betting contract.

use crate::{
    errors::{
        ContractError,
        FetchError,
    },
    ledger::{
        LedgerSource,
        QueryScope,
    },
    orchestrator::BetContract,
    types::{
        BetRecord,
        BetStatus,
        PendingBet,
        ResolutionEvent,
    },
};
use alloy::primitives::{
    Address,
    TxHash,
    U256,
};
use std::{
    cell::{
        Cell,
        RefCell,
    },
    collections::{
        HashMap,
        VecDeque,
    },
};

pub fn arb_payout(seed: u64) -> BetRecord {
    BetRecord::payout(
        Address::with_last_byte((seed % 7) as u8 + 1),
        Address::with_last_byte(0xb1),
        U256::from(seed + 1),
    )
}

pub fn arb_pending_bet(id: u64, player1: Address, token: Address) -> PendingBet {
    PendingBet {
        id: U256::from(id),
        player1,
        player2: Address::ZERO,
        token,
        amount: U256::from(1_000_000_000_000_000_000u64),
        player1_face: true,
        timestamp: 1_000,
        timeout_seconds: 60,
        status: BetStatus::Pending,
    }
}

pub fn arb_resolution(bet_id: u64, winner: Address) -> ResolutionEvent {
    ResolutionEvent {
        bet_id: U256::from(bet_id),
        player1: Address::with_last_byte(0xc1),
        player2: Address::with_last_byte(0xc2),
        winner,
        status: "Fulfilled".to_string(),
        payout: U256::from(2_000_000_000_000_000_000u64),
        player_face: true,
        outcome: false,
    }
}

/// Serves scripted pages in order, then empty pages.
#[derive(Default)]
pub struct FakeLedgerSource {
    pages: RefCell<VecDeque<Result<Vec<BetRecord>, FetchError>>>,
    requests: RefCell<Vec<(usize, usize)>>,
    scopes: RefCell<Vec<QueryScope>>,
    hang: bool,
}

impl FakeLedgerSource {
    /// Every request is recorded and then never answers.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    pub fn with_pages(pages: Vec<Result<Vec<BetRecord>, FetchError>>) -> Self {
        Self {
            pages: RefCell::new(pages.into()),
            ..Self::default()
        }
    }

    /// `(skip, first)` of every request, in order.
    pub fn requests(&self) -> Vec<(usize, usize)> {
        self.requests.borrow().clone()
    }

    pub fn scopes(&self) -> Vec<QueryScope> {
        self.scopes.borrow().clone()
    }
}

impl LedgerSource for FakeLedgerSource {
    async fn fetch_page(
        &self,
        scope: &QueryScope,
        skip: usize,
        first: usize,
    ) -> Result<Vec<BetRecord>, FetchError> {
        self.requests.borrow_mut().push((skip, first));
        self.scopes.borrow_mut().push(scope.clone());
        if self.hang {
            return std::future::pending().await;
        }
        self.pages.borrow_mut().pop_front().unwrap_or(Ok(Vec::new()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
    Approve,
    JoinGame,
    CancelBet,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiptScript {
    Success,
    Revert,
    /// Never mined.
    Hang,
}

/// Everything the fake saw go out or come back, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WireCall {
    Approve {
        token: Address,
        spender: Address,
        amount: U256,
        tx_hash: TxHash,
    },
    JoinGame {
        bet_id: U256,
        value: U256,
        tx_hash: TxHash,
    },
    CancelBet {
        bet_id: U256,
        tx_hash: TxHash,
    },
    ReceiptConfirmed {
        tx_hash: TxHash,
    },
    ReceiptReverted {
        tx_hash: TxHash,
    },
}

pub struct FakeBetContract {
    address: Address,
    bets: RefCell<Result<Vec<PendingBet>, ContractError>>,
    wire: RefCell<Vec<WireCall>>,
    rejected: RefCell<HashMap<CallKind, String>>,
    receipts: RefCell<HashMap<CallKind, ReceiptScript>>,
    sent: RefCell<HashMap<TxHash, CallKind>>,
    next_hash: Cell<u8>,
}

impl FakeBetContract {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            bets: RefCell::new(Ok(Vec::new())),
            wire: RefCell::new(Vec::new()),
            rejected: RefCell::new(HashMap::new()),
            receipts: RefCell::new(HashMap::new()),
            sent: RefCell::new(HashMap::new()),
            next_hash: Cell::new(1),
        }
    }

    pub fn set_bets(&self, bets: Vec<PendingBet>) {
        *self.bets.borrow_mut() = Ok(bets);
    }

    pub fn fail_all_bets(&self, error: ContractError) {
        *self.bets.borrow_mut() = Err(error);
    }

    pub fn reject_submission(&self, kind: CallKind, reason: impl Into<String>) {
        self.rejected.borrow_mut().insert(kind, reason.into());
    }

    /// Receipts default to success.
    pub fn script_receipt(&self, kind: CallKind, script: ReceiptScript) {
        self.receipts.borrow_mut().insert(kind, script);
    }

    pub fn wire(&self) -> Vec<WireCall> {
        self.wire.borrow().clone()
    }

    pub fn submissions(&self, kind: CallKind) -> usize {
        self.sent.borrow().values().filter(|k| **k == kind).count()
    }

    fn submit(&self, kind: CallKind) -> Result<TxHash, ContractError> {
        if let Some(reason) = self.rejected.borrow().get(&kind) {
            return Err(ContractError::Submission(reason.clone()));
        }
        let n = self.next_hash.get();
        self.next_hash.set(n.wrapping_add(1));
        let tx_hash = TxHash::with_last_byte(n);
        self.sent.borrow_mut().insert(tx_hash, kind);
        Ok(tx_hash)
    }
}

impl BetContract for FakeBetContract {
    fn address(&self) -> Address {
        self.address
    }

    async fn all_bets(&self) -> Result<Vec<PendingBet>, ContractError> {
        self.bets.borrow().clone()
    }

    async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TxHash, ContractError> {
        let tx_hash = self.submit(CallKind::Approve)?;
        self.wire.borrow_mut().push(WireCall::Approve {
            token,
            spender,
            amount,
            tx_hash,
        });
        Ok(tx_hash)
    }

    async fn join_game(&self, bet_id: U256, value: U256) -> Result<TxHash, ContractError> {
        let tx_hash = self.submit(CallKind::JoinGame)?;
        self.wire.borrow_mut().push(WireCall::JoinGame {
            bet_id,
            value,
            tx_hash,
        });
        Ok(tx_hash)
    }

    async fn cancel_bet(&self, bet_id: U256) -> Result<TxHash, ContractError> {
        let tx_hash = self.submit(CallKind::CancelBet)?;
        self.wire
            .borrow_mut()
            .push(WireCall::CancelBet { bet_id, tx_hash });
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<(), ContractError> {
        let kind = self.sent.borrow().get(&tx_hash).copied();
        let script = kind
            .and_then(|kind| self.receipts.borrow().get(&kind).copied())
            .unwrap_or(ReceiptScript::Success);
        match script {
            ReceiptScript::Success => {
                self.wire
                    .borrow_mut()
                    .push(WireCall::ReceiptConfirmed { tx_hash });
                Ok(())
            }
            ReceiptScript::Revert => {
                self.wire
                    .borrow_mut()
                    .push(WireCall::ReceiptReverted { tx_hash });
                Err(ContractError::Reverted {
                    tx_hash: tx_hash.to_string(),
                })
            }
            ReceiptScript::Hang => std::future::pending().await,
        }
    }
}
