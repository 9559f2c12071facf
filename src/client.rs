//! HTTP client for a running CoinLedger node, used by the wallet and miner tools.

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::blockchain::{Account, AddressBalance, Block, ProposedBlock};
use crate::transaction::{Transaction, TransactionRequest};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("node rejected request ({status}): {message}")]
    Rejected { status: StatusCode, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ClientError {
    /// True when a block was rejected because the chain moved on.
    pub fn is_chain_mismatch(&self) -> bool {
        matches!(
            self,
            ClientError::Rejected { message, .. } if message.starts_with("previous block mismatch")
        )
    }
}

#[derive(Deserialize)]
struct Envelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    fields: serde_json::Map<String, Value>,
}

pub struct NodeClient {
    http: Client,
    base_url: String,
}

impl NodeClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Checks the `ok` flag and pulls `field` out of the envelope.
    async fn unwrap_envelope<T: DeserializeOwned>(
        response: Response,
        field: Option<&str>,
    ) -> Result<T, ClientError> {
        let status = response.status();
        let envelope: Envelope = response.json().await.map_err(|e| {
            if status.is_success() {
                ClientError::Malformed(e.to_string())
            } else {
                ClientError::Rejected {
                    status,
                    message: status.to_string(),
                }
            }
        })?;

        if !envelope.ok || !status.is_success() {
            return Err(ClientError::Rejected {
                status,
                message: envelope.error.unwrap_or_else(|| status.to_string()),
            });
        }

        let value = match field {
            Some(name) => envelope
                .fields
                .get(name)
                .cloned()
                .ok_or_else(|| ClientError::Malformed(format!("missing field {:?}", name)))?,
            None => Value::Null,
        };
        serde_json::from_value(value).map_err(|e| ClientError::Malformed(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, field: &str) -> Result<T, ClientError> {
        let response = self.http.get(self.url(path)).send().await?;
        Self::unwrap_envelope(response, Some(field)).await
    }

    pub async fn get_address(&self, address: &str) -> Result<AddressBalance, ClientError> {
        self.get(&format!("/address/{}", address), "data").await
    }

    pub async fn list_addresses(&self) -> Result<Vec<Account>, ClientError> {
        self.get("/addresses", "addresses").await
    }

    pub async fn create_transaction(
        &self,
        secret: &str,
        recipient: &str,
        amount: i64,
    ) -> Result<Transaction, ClientError> {
        let body = TransactionRequest {
            pkey: secret.to_string(),
            address: recipient.to_string(),
            amount,
        };
        let response = self
            .http
            .post(self.url("/transaction"))
            .json(&body)
            .send()
            .await?;
        Self::unwrap_envelope(response, Some("transaction")).await
    }

    /// `None` when the node has no transaction with this id.
    pub async fn get_transaction(&self, id: u64) -> Result<Option<Transaction>, ClientError> {
        match self.get(&format!("/transaction/{}", id), "transaction").await {
            Ok(tx) => Ok(Some(tx)),
            Err(ClientError::Rejected { status, .. }) if status == StatusCode::NOT_FOUND => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn list_transactions(&self) -> Result<Vec<Transaction>, ClientError> {
        self.get("/transactions", "transactions").await
    }

    pub async fn list_address_transactions(
        &self,
        address: &str,
    ) -> Result<Vec<Transaction>, ClientError> {
        self.get(&format!("/transactions/{}", address), "transactions")
            .await
    }

    pub async fn submit_block(&self, block: &ProposedBlock) -> Result<(), ClientError> {
        let response = self
            .http
            .post(self.url("/block"))
            .json(block)
            .send()
            .await?;
        Self::unwrap_envelope::<()>(response, None).await
    }

    pub async fn latest_block_hash(&self) -> Result<String, ClientError> {
        self.get("/block", "block").await
    }

    pub async fn list_blocks(&self) -> Result<Vec<Block>, ClientError> {
        self.get("/blocks", "blocks").await
    }

    pub async fn total_supply(&self) -> Result<u64, ClientError> {
        self.get("/supply", "totalSupply").await
    }
}
