use crate::{
    errors::ContractError,
    orchestrator::{
        BetContract,
        CONFIRMATION_TIMEOUT,
    },
    types::{
        ChainEvent,
        LedgerChange,
        PendingBet,
        ResolutionEvent,
    },
};
use alloy::{
    network::{
        EthereumWallet,
        ReceiptResponse,
    },
    primitives::{
        Address,
        TxHash,
        U256,
    },
    providers::{
        DynProvider,
        PendingTransactionBuilder,
        PendingTransactionError,
        Provider,
        ProviderBuilder,
        WatchTxError,
    },
    rpc::types::Log,
    signers::local::PrivateKeySigner,
    transports::http::reqwest::Url,
};
use futures::{
    StreamExt,
    future,
    stream::{
        self,
        LocalBoxStream,
    },
};
use generated_abi::{
    erc20_types::IERC20,
    flip_coin_types::FlipCoin::{
        self,
        FlipCoinInstance,
    },
};
use std::{
    fmt,
    time::Duration,
};
use tracing::{
    debug,
    warn,
};

/// The betting contract on an EVM chain, reached over JSON-RPC.
#[derive(Clone)]
pub struct ChainClient {
    provider: DynProvider,
    contract: FlipCoinInstance<DynProvider>,
    receipt_timeout: Duration,
}

impl ChainClient {
    /// Without a signer the client can read and watch but every write is
    /// rejected by the node.
    pub fn connect(
        rpc_url: &str,
        contract: Address,
        signer: Option<PrivateKeySigner>,
    ) -> Result<Self, ContractError> {
        let url: Url = rpc_url
            .parse()
            .map_err(|e| ContractError::Rpc(format!("invalid rpc url {rpc_url}: {e}")))?;
        let provider = match signer {
            Some(signer) => ProviderBuilder::new()
                .wallet(EthereumWallet::from(signer))
                .connect_http(url)
                .erased(),
            None => ProviderBuilder::new().connect_http(url).erased(),
        };
        let contract = FlipCoin::new(contract, provider.clone());
        Ok(Self {
            provider,
            contract,
            receipt_timeout: CONFIRMATION_TIMEOUT,
        })
    }

    /// Fails when the node serves a different chain than the deployment
    /// record was written for.
    pub async fn check_chain_id(&self, expected: u64) -> Result<(), ContractError> {
        let actual = self
            .provider
            .get_chain_id()
            .await
            .map_err(|e| ContractError::Rpc(e.to_string()))?;
        ensure_chain_id(expected, actual)
    }

    /// Decoded `AllBets` and `Notification` logs, merged in arrival order.
    /// Logs that fail to decode are skipped.
    pub async fn event_stream(
        &self,
    ) -> Result<LocalBoxStream<'static, ChainEvent>, ContractError> {
        let ledger = self
            .contract
            .AllBets_filter()
            .watch()
            .await
            .map_err(|e| ContractError::Rpc(e.to_string()))?
            .into_stream()
            .filter_map(|item| future::ready(ledger_event(item)));
        let resolutions = self
            .contract
            .Notification_filter()
            .watch()
            .await
            .map_err(|e| ContractError::Rpc(e.to_string()))?
            .into_stream()
            .filter_map(|item| future::ready(resolution_event(item)));
        Ok(stream::select(ledger, resolutions).boxed_local())
    }
}

fn ledger_event(
    item: Result<(FlipCoin::AllBets, Log), alloy::sol_types::Error>,
) -> Option<ChainEvent> {
    let (event, _) = item
        .map_err(|e| warn!(error = %e, "failed to decode AllBets log"))
        .ok()?;
    let change = LedgerChange::try_from(event)
        .map_err(|e| warn!(error = %e, "ignoring AllBets log"))
        .ok()?;
    debug!(bet_id = %change.bet_id, status = %change.status, "ledger changed");
    Some(ChainEvent::LedgerChanged(change))
}

fn resolution_event(
    item: Result<(FlipCoin::Notification, Log), alloy::sol_types::Error>,
) -> Option<ChainEvent> {
    let (event, _) = item
        .map_err(|e| warn!(error = %e, "failed to decode Notification log"))
        .ok()?;
    Some(ChainEvent::Resolution(ResolutionEvent::from(event)))
}

impl BetContract for ChainClient {
    fn address(&self) -> Address {
        *self.contract.address()
    }

    async fn all_bets(&self) -> Result<Vec<PendingBet>, ContractError> {
        let bets = self
            .contract
            .allBets()
            .call()
            .await
            .map_err(|e| ContractError::Rpc(e.to_string()))?;
        bets.into_iter().map(PendingBet::try_from).collect()
    }

    async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TxHash, ContractError> {
        let pending = IERC20::new(token, self.provider.clone())
            .approve(spender, amount)
            .send()
            .await
            .map_err(|e| ContractError::Submission(e.to_string()))?;
        Ok(*pending.tx_hash())
    }

    async fn join_game(&self, bet_id: U256, value: U256) -> Result<TxHash, ContractError> {
        let pending = self
            .contract
            .joinGame(bet_id)
            .value(value)
            .send()
            .await
            .map_err(|e| ContractError::Submission(e.to_string()))?;
        Ok(*pending.tx_hash())
    }

    async fn cancel_bet(&self, bet_id: U256) -> Result<TxHash, ContractError> {
        let pending = self
            .contract
            .cancelBet(bet_id)
            .send()
            .await
            .map_err(|e| ContractError::Submission(e.to_string()))?;
        Ok(*pending.tx_hash())
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<(), ContractError> {
        let receipt =
            PendingTransactionBuilder::new(self.provider.root().clone(), tx_hash)
                .with_timeout(Some(self.receipt_timeout))
                .get_receipt()
                .await
                .map_err(|e| match e {
                    PendingTransactionError::TxWatcher(WatchTxError::Timeout) => {
                        ContractError::Timeout {
                            tx_hash: tx_hash.to_string(),
                        }
                    }
                    other => ContractError::Rpc(other.to_string()),
                })?;
        if ReceiptResponse::status(&receipt) {
            Ok(())
        } else {
            Err(ContractError::Reverted {
                tx_hash: tx_hash.to_string(),
            })
        }
    }
}

impl fmt::Display for ChainClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.contract.address())
    }
}

fn ensure_chain_id(expected: u64, actual: u64) -> Result<(), ContractError> {
    if expected == actual {
        return Ok(());
    }
    Err(ContractError::Rpc(format!(
        "node is on chain {actual} but the deployment was recorded for chain {expected}"
    )))
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn ensure_chain_id__matching_chain__is_ok() {
        assert_eq!(ensure_chain_id(31337, 31337), Ok(()));
    }

    #[test]
    fn ensure_chain_id__other_chain__names_both_ids() {
        // when
        let result = ensure_chain_id(11155111, 31337);

        // then
        let Err(ContractError::Rpc(message)) = result else {
            panic!("expected rpc error, got {result:?}");
        };
        assert!(message.contains("31337"));
        assert!(message.contains("11155111"));
    }
}
