//! Wallet snapshot reader.
//!
//! Read-only Solana JSON-RPC client. Addresses are validated locally before
//! any network call, and all SOL/token arithmetic stays in `Decimal` so the
//! rent estimate is exact rather than a float approximation.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::SolanaConfig;
use crate::error::{GatewayError, Result, ValidationError};

pub const PROVIDER: &str = "solana";

/// SPL Token program owning all token accounts the reader inspects.
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

/// BONK mint.
pub const BONK_MINT: &str = "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263";

/// Rent deposit returned per closed empty token account, in SOL.
pub const RENT_PER_EMPTY_ACCOUNT_SOL: Decimal = dec!(0.002);

const LAMPORTS_SCALE: u32 = 9;

/// Reject anything that is not a well-formed base58 public key. Runs before
/// every RPC call so malformed input never produces network traffic.
pub fn validate_wallet_address(address: &str) -> std::result::Result<(), ValidationError> {
    solana_pubkey::Pubkey::from_str(address)
        .map(|_| ())
        .map_err(|_| ValidationError::InvalidWalletAddress)
}

/// Estimated SOL reclaimable by closing `empty_count` token accounts.
pub fn reclaimable_sol(empty_count: usize) -> Decimal {
    Decimal::from(empty_count) * RENT_PER_EMPTY_ACCOUNT_SOL
}

/// One SPL token account, in display units.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAccount {
    pub address: String,
    pub mint: String,
    pub owner: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub decimals: u8,
    pub ui_amount_string: String,
}

/// Everything the dashboard shows about a wallet, assembled from one pair of
/// RPC reads so the numbers are mutually consistent.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSnapshot {
    pub address: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    pub tokens: Vec<TokenAccount>,
    pub empty_accounts: Vec<TokenAccount>,
    #[serde(with = "rust_decimal::serde::float")]
    pub bonk_balance: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub reclaimable_sol: Decimal,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct KeyedAccount {
    pubkey: String,
    account: AccountPayload,
}

#[derive(Debug, Deserialize)]
struct AccountPayload {
    data: AccountData,
}

#[derive(Debug, Deserialize)]
struct AccountData {
    parsed: ParsedData,
}

#[derive(Debug, Deserialize)]
struct ParsedData {
    info: ParsedTokenInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParsedTokenInfo {
    mint: String,
    owner: String,
    token_amount: ParsedTokenAmount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParsedTokenAmount {
    decimals: u8,
    ui_amount_string: String,
}

fn map_keyed_account(keyed: KeyedAccount) -> std::result::Result<TokenAccount, GatewayError> {
    let info = keyed.account.data.parsed.info;
    let amount = Decimal::from_str_exact(&info.token_amount.ui_amount_string).map_err(|e| {
        GatewayError::invalid_response(
            PROVIDER,
            format!(
                "unparseable token amount for account {}: {e}",
                keyed.pubkey
            ),
        )
    })?;
    Ok(TokenAccount {
        address: keyed.pubkey,
        mint: info.mint,
        owner: info.owner,
        amount,
        decimals: info.token_amount.decimals,
        ui_amount_string: info.token_amount.ui_amount_string,
    })
}

fn filter_empty(accounts: &[TokenAccount]) -> Vec<TokenAccount> {
    accounts
        .iter()
        .filter(|account| account.amount.is_zero())
        .cloned()
        .collect()
}

fn bonk_amount(accounts: &[TokenAccount]) -> Decimal {
    accounts
        .iter()
        .find(|account| account.mint == BONK_MINT)
        .map(|account| account.amount)
        .unwrap_or(Decimal::ZERO)
}

fn lamports_to_sol(lamports: u64) -> Decimal {
    Decimal::from_i128_with_scale(i128::from(lamports), LAMPORTS_SCALE)
}

/// JSON-RPC client for wallet reads.
pub struct WalletReader {
    client: Client,
    rpc_url: String,
}

impl WalletReader {
    pub fn new(config: &SolanaConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| Client::new()),
            rpc_url: config.rpc_url.clone(),
        }
    }

    /// SOL balance in display units.
    pub async fn sol_balance(&self, address: &str) -> Result<Decimal> {
        validate_wallet_address(address)?;
        Ok(self.fetch_sol_balance(address).await?)
    }

    /// All SPL token accounts owned by the wallet.
    pub async fn token_accounts(&self, address: &str) -> Result<Vec<TokenAccount>> {
        validate_wallet_address(address)?;
        Ok(self.fetch_token_accounts(address).await?)
    }

    /// Token accounts holding exactly zero. Dust does not count as empty.
    pub async fn empty_accounts(&self, address: &str) -> Result<Vec<TokenAccount>> {
        validate_wallet_address(address)?;
        let accounts = self.fetch_token_accounts(address).await?;
        Ok(filter_empty(&accounts))
    }

    /// BONK balance in display units; a wallet without a BONK account holds
    /// zero, which is not an error.
    pub async fn bonk_balance(&self, address: &str) -> Result<Decimal> {
        validate_wallet_address(address)?;
        let accounts = self.fetch_token_accounts(address).await?;
        Ok(bonk_amount(&accounts))
    }

    /// Full wallet view from one balance read and one token-accounts read,
    /// everything else derived locally.
    pub async fn snapshot(&self, address: &str) -> Result<WalletSnapshot> {
        validate_wallet_address(address)?;
        let balance = self.fetch_sol_balance(address).await?;
        let tokens = self.fetch_token_accounts(address).await?;
        let empty_accounts = filter_empty(&tokens);
        let reclaimable = reclaimable_sol(empty_accounts.len());
        Ok(WalletSnapshot {
            address: address.to_string(),
            balance,
            bonk_balance: bonk_amount(&tokens),
            reclaimable_sol: reclaimable,
            tokens,
            empty_accounts,
            fetched_at: Utc::now(),
        })
    }

    async fn fetch_sol_balance(&self, address: &str) -> std::result::Result<Decimal, GatewayError> {
        let context: RpcContext<u64> = self
            .call("getBalance", serde_json::json!([address]))
            .await?;
        Ok(lamports_to_sol(context.value))
    }

    async fn fetch_token_accounts(
        &self,
        address: &str,
    ) -> std::result::Result<Vec<TokenAccount>, GatewayError> {
        let context: RpcContext<Vec<KeyedAccount>> = self
            .call(
                "getParsedTokenAccountsByOwner",
                serde_json::json!([
                    address,
                    { "programId": TOKEN_PROGRAM_ID },
                    { "encoding": "jsonParsed" },
                ]),
            )
            .await?;
        context.value.into_iter().map(map_keyed_account).collect()
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> std::result::Result<T, GatewayError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::transport(PROVIDER, e))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GatewayError::upstream(PROVIDER, status.as_u16(), detail));
        }
        let envelope: RpcEnvelope<T> = response
            .json()
            .await
            .map_err(|e| GatewayError::invalid_response(PROVIDER, e))?;
        if let Some(err) = envelope.error {
            return Err(GatewayError::upstream(
                PROVIDER,
                status.as_u16(),
                format!("RPC error {}: {}", err.code, err.message),
            ));
        }
        envelope
            .result
            .ok_or_else(|| GatewayError::invalid_response(PROVIDER, "missing result"))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::Error;

    fn keyed_account_fixture(pubkey: &str, mint: &str, ui_amount: &str) -> KeyedAccount {
        serde_json::from_value(serde_json::json!({
            "pubkey": pubkey,
            "account": {
                "data": {
                    "parsed": {
                        "info": {
                            "mint": mint,
                            "owner": "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin",
                            "tokenAmount": {
                                "amount": "0",
                                "decimals": 5,
                                "uiAmount": ui_amount.parse::<f64>().ok(),
                                "uiAmountString": ui_amount,
                            }
                        },
                        "type": "account"
                    },
                    "program": "spl-token",
                    "space": 165
                },
                "executable": false,
                "lamports": 2039280u64,
                "owner": TOKEN_PROGRAM_ID,
                "rentEpoch": 361u64
            }
        }))
        .expect("fixture parses")
    }

    #[test]
    fn accepts_wellformed_addresses_and_rejects_garbage() {
        assert!(validate_wallet_address(TOKEN_PROGRAM_ID).is_ok());
        assert!(validate_wallet_address("not-a-wallet").is_err());
        assert!(validate_wallet_address("").is_err());
        // Shortened by one character: right alphabet, wrong length.
        assert!(validate_wallet_address("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5D").is_err());
    }

    #[test]
    fn maps_parsed_accounts_with_exact_amounts() {
        let account = map_keyed_account(keyed_account_fixture("acc-1", BONK_MINT, "1500.5"))
            .expect("account maps");

        assert_eq!(account.address, "acc-1");
        assert_eq!(account.mint, BONK_MINT);
        assert_eq!(account.amount, dec!(1500.5));
        assert_eq!(account.decimals, 5);
        assert_eq!(account.ui_amount_string, "1500.5");
    }

    #[test]
    fn unparseable_amount_is_an_invalid_response() {
        let err = map_keyed_account(keyed_account_fixture("acc-1", BONK_MINT, "lots"))
            .expect_err("must fail");
        assert!(matches!(err, GatewayError::InvalidResponse { .. }));
    }

    #[test]
    fn empty_filter_requires_exactly_zero() {
        let accounts = vec![
            map_keyed_account(keyed_account_fixture("a", "mint-a", "0")).expect("maps"),
            map_keyed_account(keyed_account_fixture("b", "mint-b", "0.000001")).expect("maps"),
            map_keyed_account(keyed_account_fixture("c", "mint-c", "0")).expect("maps"),
        ];

        let empty = filter_empty(&accounts);
        assert_eq!(empty.len(), 2);
        assert!(empty.iter().all(|account| account.amount.is_zero()));
    }

    #[test]
    fn rent_estimate_is_exact_decimal_math() {
        assert_eq!(reclaimable_sol(0), dec!(0));
        assert_eq!(reclaimable_sol(3), dec!(0.006));
        assert_eq!(reclaimable_sol(500), dec!(1));
    }

    #[test]
    fn missing_bonk_account_reads_as_zero() {
        let accounts = vec![
            map_keyed_account(keyed_account_fixture("a", "mint-a", "12")).expect("maps"),
        ];
        assert_eq!(bonk_amount(&accounts), Decimal::ZERO);

        let with_bonk = vec![
            map_keyed_account(keyed_account_fixture("b", BONK_MINT, "42000")).expect("maps"),
        ];
        assert_eq!(bonk_amount(&with_bonk), dec!(42000));
    }

    #[test]
    fn lamports_convert_at_scale_nine() {
        assert_eq!(lamports_to_sol(1_500_000_000), dec!(1.5));
        assert_eq!(lamports_to_sol(1), dec!(0.000000001));
        assert_eq!(lamports_to_sol(0), dec!(0));
    }

    #[test]
    fn token_account_serializes_numeric_amounts() {
        let account = map_keyed_account(keyed_account_fixture("a", BONK_MINT, "1.5"))
            .expect("maps");
        let value = serde_json::to_value(&account).expect("serializes");

        assert_eq!(value["amount"], serde_json::json!(1.5));
        assert_eq!(value["uiAmountString"], "1.5");
    }

    #[tokio::test]
    async fn invalid_address_short_circuits_before_network() {
        let reader = WalletReader::new(&SolanaConfig {
            // Nothing listens here; a request would fail loudly as transport.
            rpc_url: "http://127.0.0.1:1".to_string(),
        });

        let err = reader
            .sol_balance("definitely-not-base58!")
            .await
            .expect_err("must fail");
        assert!(matches!(err, Error::Validation(ValidationError::InvalidWalletAddress)));
    }

    #[tokio::test]
    async fn valid_address_reaches_the_wire() {
        let reader = WalletReader::new(&SolanaConfig {
            rpc_url: "http://127.0.0.1:1".to_string(),
        });

        let err = reader
            .sol_balance(TOKEN_PROGRAM_ID)
            .await
            .expect_err("dead endpoint must fail");
        assert!(matches!(err, Error::Gateway(GatewayError::Transport { .. })));
    }
}
