use crate::{
    errors::FetchError,
    ledger::{
        LedgerSource,
        QueryScope,
    },
    types::BetRecord,
};
use alloy::primitives::{
    Address,
    I256,
    U256,
};
use serde::{
    Deserialize,
    de::DeserializeOwned,
};
use serde_json::{
    Value,
    json,
};
use std::{
    fmt,
    time::Duration,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const BET_RESULTS_QUERY: &str = r#"
query AllBets($first: Int!, $skip: Int!) {
  betResults(first: $first, skip: $skip) {
    player
    playerChoice
    outcome
    profit
    userWon
  }
}"#;

const PLAYER_BETS_QUERY: &str = r#"
query AllPlayerBet($first: Int!, $skip: Int!, $address: String!) {
  betResults(first: $first, skip: $skip, where: { player: $address }) {
    player
    playerChoice
    outcome
    profit
    userWon
  }
}"#;

const TOKEN_PAYOUTS_QUERY: &str = r#"
query TokenBets($first: Int!, $skip: Int!, $token: Bytes!) {
  gameWons(
    first: $first
    skip: $skip
    orderBy: payout
    orderDirection: desc
    where: { token: $token }
  ) {
    player
    token
    payout
  }
}"#;

const ALL_PAYOUTS_QUERY: &str = r#"
query AllPayouts($first: Int!, $skip: Int!) {
  gameWons(first: $first, skip: $skip) {
    player
    token
    payout
  }
}"#;

/// GraphQL client for the bet indexer.
#[derive(Clone)]
pub struct IndexerClient {
    url: String,
    http: reqwest::Client,
}

impl IndexerClient {
    pub fn new(url: impl Into<String>) -> Result<Self, FetchError> {
        let url = url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self { url, http })
    }

    pub async fn query<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<T, FetchError> {
        let res = self
            .http
            .post(&self.url)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        parse_response(&bytes)
    }
}

fn request_for(scope: &QueryScope, skip: usize, first: usize) -> (&'static str, Value) {
    match scope {
        QueryScope::AllBets => (BET_RESULTS_QUERY, json!({ "first": first, "skip": skip })),
        QueryScope::PlayerBets(player) => (
            PLAYER_BETS_QUERY,
            json!({ "first": first, "skip": skip, "address": lower_hex(player) }),
        ),
        QueryScope::TokenPayouts(token) => (
            TOKEN_PAYOUTS_QUERY,
            json!({ "first": first, "skip": skip, "token": lower_hex(token) }),
        ),
        QueryScope::AllPayouts => {
            (ALL_PAYOUTS_QUERY, json!({ "first": first, "skip": skip }))
        }
    }
}

// The indexer stores addresses lowercased.
fn lower_hex(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}

fn parse_response<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, FetchError> {
    let envelope: GraphQlResponse<T> = serde_json::from_slice(bytes)
        .map_err(|e| FetchError::Malformed(e.to_string()))?;
    if let Some(errors) = envelope.errors.filter(|errors| !errors.is_empty()) {
        return Err(FetchError::GraphQl(
            errors.into_iter().map(|e| e.message).collect(),
        ));
    }
    envelope
        .data
        .ok_or_else(|| FetchError::Malformed("response has no data".to_string()))
}

fn records_from_page(page: LedgerPageDto) -> Result<Vec<BetRecord>, FetchError> {
    match (page.bet_results, page.game_wons) {
        (Some(rows), _) => rows.into_iter().map(BetRecord::try_from).collect(),
        (None, Some(rows)) => rows.into_iter().map(BetRecord::try_from).collect(),
        (None, None) => Err(FetchError::Malformed(
            "response has neither betResults nor gameWons".to_string(),
        )),
    }
}

impl LedgerSource for IndexerClient {
    async fn fetch_page(
        &self,
        scope: &QueryScope,
        skip: usize,
        first: usize,
    ) -> Result<Vec<BetRecord>, FetchError> {
        let (query, variables) = request_for(scope, skip, first);
        let page: LedgerPageDto = self.query(query, variables).await?;
        records_from_page(page)
    }
}

impl fmt::Display for IndexerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlErrorDto>>,
}

#[derive(Deserialize)]
struct GraphQlErrorDto {
    message: String,
}

#[derive(Deserialize)]
struct LedgerPageDto {
    #[serde(rename = "betResults")]
    bet_results: Option<Vec<BetResultDto>>,
    #[serde(rename = "gameWons")]
    game_wons: Option<Vec<GameWonDto>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BetResultDto {
    player: String,
    player_choice: FlagDto,
    outcome: FlagDto,
    profit: BigIntDto,
    user_won: FlagDto,
}

#[derive(Deserialize)]
struct GameWonDto {
    player: String,
    token: String,
    payout: BigIntDto,
}

/// Subgraph `BigInt`s are strings, but some deployments emit plain numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum BigIntDto {
    Text(String),
    Number(serde_json::Number),
}

impl BigIntDto {
    fn as_decimal(&self) -> String {
        match self {
            BigIntDto::Text(text) => text.clone(),
            BigIntDto::Number(number) => number.to_string(),
        }
    }
}

/// Boolean columns arrive as JSON booleans, `0`/`1`, or their string forms
/// depending on the subgraph mapping.
#[derive(Deserialize)]
#[serde(untagged)]
enum FlagDto {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

fn parse_flag(field: &str, raw: &FlagDto) -> Result<bool, FetchError> {
    match raw {
        FlagDto::Bool(flag) => Ok(*flag),
        FlagDto::Number(number) => match number.as_u64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(FetchError::Malformed(format!("{field} {number}"))),
        },
        FlagDto::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" | "" => Ok(false),
            _ => Err(FetchError::Malformed(format!("{field} {text:?}"))),
        },
    }
}

fn parse_address(field: &str, raw: &str) -> Result<Address, FetchError> {
    raw.parse::<Address>()
        .map_err(|e| FetchError::Malformed(format!("{field} {raw:?}: {e}")))
}

fn parse_unsigned(field: &str, raw: &BigIntDto) -> Result<U256, FetchError> {
    let decimal = raw.as_decimal();
    U256::from_str_radix(&decimal, 10)
        .map_err(|e| FetchError::Malformed(format!("{field} {decimal:?}: {e}")))
}

fn parse_signed(field: &str, raw: &BigIntDto) -> Result<I256, FetchError> {
    let decimal = raw.as_decimal();
    I256::from_dec_str(&decimal)
        .map_err(|e| FetchError::Malformed(format!("{field} {decimal:?}: {e}")))
}

impl TryFrom<BetResultDto> for BetRecord {
    type Error = FetchError;

    fn try_from(dto: BetResultDto) -> Result<Self, Self::Error> {
        Ok(BetRecord {
            player: parse_address("player", &dto.player)?,
            token: None,
            payout_amount: U256::ZERO,
            player_choice: parse_flag("playerChoice", &dto.player_choice)?,
            outcome: parse_flag("outcome", &dto.outcome)?,
            profit: parse_signed("profit", &dto.profit)?,
            won: parse_flag("userWon", &dto.user_won)?,
        })
    }
}

impl TryFrom<GameWonDto> for BetRecord {
    type Error = FetchError;

    fn try_from(dto: GameWonDto) -> Result<Self, Self::Error> {
        Ok(BetRecord::payout(
            parse_address("player", &dto.player)?,
            parse_address("token", &dto.token)?,
            parse_unsigned("payout", &dto.payout)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use alloy::primitives::address;

    fn page_from(json: &str) -> Result<Vec<BetRecord>, FetchError> {
        let page: LedgerPageDto = parse_response(json.as_bytes())?;
        records_from_page(page)
    }

    #[test]
    fn parse_response__game_wons__builds_payout_records() {
        // given
        let json = r#"{"data":{"gameWons":[
            {"player":"0x00000000000000000000000000000000000000a1",
             "token":"0x00000000000000000000000000000000000000b1",
             "payout":"100000000000000000000000"}
        ]}}"#;

        // when
        let records = page_from(json).unwrap();

        // then
        assert_eq!(
            records,
            vec![BetRecord::payout(
                address!("0x00000000000000000000000000000000000000a1"),
                address!("0x00000000000000000000000000000000000000b1"),
                U256::from(100_000u64) * U256::from(10u64).pow(U256::from(18u64)),
            )]
        );
    }

    #[test]
    fn parse_response__bet_results__keeps_signed_profit() {
        // given
        let json = r#"{"data":{"betResults":[
            {"player":"0x00000000000000000000000000000000000000a1",
             "playerChoice":true,"outcome":false,"profit":"-5","userWon":false}
        ]}}"#;

        // when
        let records = page_from(json).unwrap();

        // then
        assert_eq!(records[0].profit, I256::from_dec_str("-5").unwrap());
        assert_eq!(records[0].token, None);
        assert!(records[0].player_choice);
        assert!(!records[0].won);
    }

    #[test]
    fn parse_response__flags_as_strings_or_numbers__are_accepted() {
        // given
        let json = r#"{"data":{"betResults":[
            {"player":"0x00000000000000000000000000000000000000a1",
             "playerChoice":"true","outcome":0,"profit":"3","userWon":"1"},
            {"player":"0x00000000000000000000000000000000000000a2",
             "playerChoice":1,"outcome":"false","profit":"-3","userWon":false}
        ]}}"#;

        // when
        let records = page_from(json).unwrap();

        // then
        let flags: Vec<_> = records
            .iter()
            .map(|r| (r.player_choice, r.outcome, r.won))
            .collect();
        assert_eq!(flags, vec![(true, false, true), (true, false, false)]);
    }

    #[test]
    fn parse_response__unrecognised_flag__is_malformed() {
        // given
        let json = r#"{"data":{"betResults":[
            {"player":"0x00000000000000000000000000000000000000a1",
             "playerChoice":"heads","outcome":false,"profit":"0","userWon":false}
        ]}}"#;

        // when
        let result = page_from(json);

        // then
        assert!(matches!(result, Err(FetchError::Malformed(msg)) if msg.contains("playerChoice")));
    }

    #[test]
    fn parse_response__graphql_errors__returns_graphql_error() {
        // given
        let json = r#"{"data":null,"errors":[{"message":"bad skip"}]}"#;

        // when
        let result = page_from(json);

        // then
        assert_eq!(result, Err(FetchError::GraphQl(vec!["bad skip".to_string()])));
    }

    #[test]
    fn parse_response__bad_payout__is_malformed() {
        // given
        let json = r#"{"data":{"gameWons":[
            {"player":"0x00000000000000000000000000000000000000a1",
             "token":"0x00000000000000000000000000000000000000b1",
             "payout":"lots"}
        ]}}"#;

        // when
        let result = page_from(json);

        // then
        assert!(matches!(result, Err(FetchError::Malformed(_))));
    }

    #[test]
    fn request_for__token_scope__passes_lowercase_token_and_paging() {
        // given
        let token = address!("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");

        // when
        let (query, variables) = request_for(&QueryScope::TokenPayouts(token), 2000, 1000);

        // then
        assert!(query.contains("gameWons"));
        assert_eq!(
            variables,
            json!({
                "first": 1000,
                "skip": 2000,
                "token": "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"
            })
        );
    }
}
