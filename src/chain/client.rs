// src/chain/client.rs
//! JSON-RPC implementation of the chain traits

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::abi::{self, Token};
use super::{ChainReader, StakingWriter};
use crate::config::StakingConfig;
use crate::error::{Result, StakingError};
use crate::plan::PlanIndex;
use crate::types::{RawFullState, TxOutcome};

/// Talks to the staking contract through an Ethereum node.
///
/// Reads use `eth_call`. Writes use `eth_sendTransaction`, so the node (or the
/// wallet bridge behind the URL) must hold the key for `sender`.
pub struct RpcStakingClient {
    rpc_url: String,
    http_client: HttpClient,
    staking_contract: Address,
    sender: Option<Address>,
    receipt_poll: Duration,
    receipt_attempts: u32,
    request_id: AtomicU64,
}

impl RpcStakingClient {
    pub fn new(rpc_url: &str, staking_contract: Address) -> Self {
        Self {
            rpc_url: rpc_url.to_string(),
            http_client: HttpClient::new(),
            staking_contract,
            sender: None,
            receipt_poll: Duration::from_secs(2),
            receipt_attempts: 90,
            request_id: AtomicU64::new(1),
        }
    }

    pub fn from_config(config: &StakingConfig) -> Self {
        let mut client = Self::new(&config.rpc_url, config.staking_contract)
            .with_receipt_polling(
                Duration::from_millis(config.receipt_poll_ms),
                config.receipt_max_attempts,
            );
        client.sender = config.sender;
        client
    }

    pub fn with_sender(mut self, sender: Address) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn with_receipt_polling(mut self, interval: Duration, attempts: u32) -> Self {
        self.receipt_poll = interval;
        self.receipt_attempts = attempts.max(1);
        self
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": self.request_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params
        });

        let response = self
            .http_client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StakingError::Rpc(format!("{} returned HTTP {}", method, response.status())));
        }

        let json: Value = response.json().await?;

        if let Some(error) = json.get("error") {
            let message = error["message"].as_str().unwrap_or("unknown error");
            return Err(StakingError::Rpc(format!("{}: {}", method, message)));
        }

        json.get("result")
            .cloned()
            .ok_or_else(|| StakingError::Rpc(format!("{}: response without result: {}", method, json)))
    }

    async fn eth_call(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>> {
        let result = self
            .rpc(
                "eth_call",
                json!([
                    { "to": to.to_string(), "data": format!("0x{}", hex::encode(data)) },
                    "latest"
                ]),
            )
            .await?;

        let hex_str = result
            .as_str()
            .ok_or_else(|| StakingError::Decode(format!("eth_call result is not a string: {}", result)))?;
        abi::decode_hex_result(hex_str)
    }

    async fn send_transaction(&self, to: Address, data: Vec<u8>) -> Result<TxOutcome> {
        let from = self
            .sender
            .ok_or_else(|| StakingError::Config("No sender address configured for writes".to_string()))?;

        let result = self
            .rpc(
                "eth_sendTransaction",
                json!([{
                    "from": from.to_string(),
                    "to": to.to_string(),
                    "data": format!("0x{}", hex::encode(data))
                }]),
            )
            .await
            .map_err(|e| StakingError::TransactionFailed(e.to_string()))?;

        let tx_hash = result
            .as_str()
            .ok_or_else(|| StakingError::TransactionFailed(format!("Unexpected send result: {}", result)))?
            .to_string();

        log::info!("Submitted transaction {} to {}", tx_hash, to);
        self.wait_for_receipt(&tx_hash).await
    }

    /// Poll until the transaction is mined, then check its status
    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TxOutcome> {
        for attempt in 0..self.receipt_attempts {
            let receipt = self.rpc("eth_getTransactionReceipt", json!([tx_hash])).await?;

            if !receipt.is_null() {
                return match receipt["status"].as_str() {
                    Some("0x1") => {
                        log::info!("Transaction {} confirmed", tx_hash);
                        Ok(TxOutcome {
                            tx_hash: tx_hash.to_string(),
                        })
                    }
                    status => Err(StakingError::TransactionFailed(format!(
                        "Transaction {} reverted (status {:?})",
                        tx_hash, status
                    ))),
                };
            }

            log::debug!("Receipt for {} not available yet (attempt {})", tx_hash, attempt + 1);
            tokio::time::sleep(self.receipt_poll).await;
        }

        Err(StakingError::TransactionFailed(format!(
            "Transaction {} not mined after {} checks",
            tx_hash, self.receipt_attempts
        )))
    }
}

fn collection_args(collections: &[Address], token_ids: &[u64]) -> Result<Vec<Token>> {
    if collections.len() != token_ids.len() {
        return Err(StakingError::TransactionFailed(format!(
            "{} collections for {} token ids",
            collections.len(),
            token_ids.len()
        )));
    }
    Ok(vec![
        Token::AddressArray(collections.to_vec()),
        Token::UintArray(token_ids.iter().map(|id| U256::from(*id)).collect()),
    ])
}

#[async_trait]
impl ChainReader for RpcStakingClient {
    async fn get_user_full_state(&self, owner: Address) -> Result<RawFullState> {
        let data = abi::encode_call(abi::GET_USER_FULL_STATE, &[Token::Address(owner)]);
        let bytes = self.eth_call(self.staking_contract, data).await?;
        abi::decode_full_state(&bytes)
    }

    async fn is_blacklisted(&self, collection: Address, token_id: u64) -> Result<bool> {
        let data = abi::encode_call(
            abi::IS_BLACKLISTED,
            &[Token::Address(collection), Token::Uint(U256::from(token_id))],
        );
        let bytes = self.eth_call(self.staking_contract, data).await?;
        abi::decode_bool(&bytes)
    }

    async fn is_approved_for_all(
        &self,
        collection: Address,
        owner: Address,
        operator: Address,
    ) -> Result<bool> {
        let data = abi::encode_call(
            abi::IS_APPROVED_FOR_ALL,
            &[Token::Address(owner), Token::Address(operator)],
        );
        let bytes = self.eth_call(collection, data).await?;
        abi::decode_bool(&bytes)
    }
}

#[async_trait]
impl StakingWriter for RpcStakingClient {
    async fn stake(
        &self,
        collections: &[Address],
        token_ids: &[u64],
        plan: PlanIndex,
    ) -> Result<TxOutcome> {
        let mut args = collection_args(collections, token_ids)?;
        args.push(Token::Uint(U256::from(plan.index() as u64)));
        let data = abi::encode_call(abi::STAKE, &args);
        self.send_transaction(self.staking_contract, data).await
    }

    async fn unstake(&self, collections: &[Address], token_ids: &[u64]) -> Result<TxOutcome> {
        let data = abi::encode_call(abi::UNSTAKE, &collection_args(collections, token_ids)?);
        self.send_transaction(self.staking_contract, data).await
    }

    async fn claim_reward(&self, collections: &[Address], token_ids: &[u64]) -> Result<TxOutcome> {
        let data = abi::encode_call(abi::CLAIM_REWARD, &collection_args(collections, token_ids)?);
        self.send_transaction(self.staking_contract, data).await
    }

    async fn set_approval_for_all(
        &self,
        collection: Address,
        operator: Address,
        approved: bool,
    ) -> Result<TxOutcome> {
        let data = abi::encode_call(
            abi::SET_APPROVAL_FOR_ALL,
            &[Token::Address(operator), Token::Bool(approved)],
        );
        self.send_transaction(collection, data).await
    }
}
