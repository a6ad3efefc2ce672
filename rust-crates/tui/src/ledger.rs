use crate::{
    errors::FetchError,
    types::BetRecord,
};
use alloy::primitives::Address;
use std::future::Future;
use tracing::{
    debug,
    info,
};

pub const PAGE_SIZE: usize = 1000;

/// Which slice of the indexed history to read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryScope {
    /// Every settled bet.
    AllBets,
    /// Payout events for one stake token, largest payout first.
    TokenPayouts(Address),
    /// Payout events across every token.
    AllPayouts,
    /// Settled bets placed by one player.
    PlayerBets(Address),
}

pub trait LedgerSource {
    fn fetch_page(
        &self,
        scope: &QueryScope,
        skip: usize,
        first: usize,
    ) -> impl Future<Output = Result<Vec<BetRecord>, FetchError>>;
}

/// Read every record for `scope`, one page at a time, until a page comes back
/// short. An error on any page discards everything accumulated so far.
pub async fn fetch_all<S: LedgerSource>(
    source: &S,
    scope: &QueryScope,
) -> Result<Vec<BetRecord>, FetchError> {
    let mut records = Vec::new();
    let mut skip = 0;
    loop {
        let page = source.fetch_page(scope, skip, PAGE_SIZE).await?;
        let page_len = page.len();
        debug!(?scope, skip, page_len, "fetched ledger page");
        records.extend(page);
        if page_len < PAGE_SIZE {
            break;
        }
        skip += page_len;
    }
    info!(?scope, total = records.len(), "ledger fetch complete");
    Ok(records)
}
