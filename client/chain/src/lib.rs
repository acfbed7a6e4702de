// This file is part of Tessera.

// Copyright (C) Tessera Labs
// SPDX-License-Identifier: Apache-2.0

// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// 	http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! HTTP clients for the chain gateways.
//!
//! The feeder gateway is the read side (blocks, transaction statuses,
//! read-only contract calls); the write gateway accepts signed
//! `INVOKE_FUNCTION` submissions. Workers depend on the [`ChainApi`] trait
//! rather than the concrete clients so tests can substitute a deterministic
//! chain.

use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;

use tp_gateway::{
	BlockDocument, CallResultDocument, InvokeFunction, TransactionStatusDocument,
};

/// How a block is addressed on the feeder gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockId {
	Number(u64),
	Hash(String),
	Latest,
}

/// Gateway failure taxonomy. `BadRequest` is the transient kind the
/// crawler answers with a cooldown; everything else is reported upward.
#[derive(Clone, Debug, Error)]
pub enum ClientError {
	#[error("gateway rejected the request: {0}")]
	BadRequest(String),
	#[error("gateway unreachable: {0}")]
	Transport(String),
	#[error("undecodable gateway payload: {0}")]
	Decode(String),
}

impl ClientError {
	pub fn is_bad_request(&self) -> bool {
		matches!(self, ClientError::BadRequest(_))
	}
}

/// The read operations tessera consumes from the chain.
#[async_trait::async_trait]
pub trait ChainApi: Send + Sync {
	async fn get_block(&self, id: &BlockId) -> Result<BlockDocument, ClientError>;

	async fn get_transaction_status(
		&self,
		transaction_hash: &str,
	) -> Result<TransactionStatusDocument, ClientError>;

	async fn call_contract(
		&self,
		invoke: &InvokeFunction,
	) -> Result<CallResultDocument, ClientError>;
}

/// Query parameters addressing a block on the feeder gateway.
fn block_query(id: &BlockId) -> Vec<(&'static str, String)> {
	match id {
		BlockId::Number(number) => vec![("blockNumber", number.to_string())],
		BlockId::Hash(hash) => vec![("blockHash", hash.clone())],
		BlockId::Latest => vec![],
	}
}

/// Client of the read-only feeder gateway.
#[derive(Clone)]
pub struct FeederClient {
	http: reqwest::Client,
	url: String,
}

impl FeederClient {
	pub fn new(url: impl Into<String>) -> Self {
		Self {
			http: reqwest::Client::new(),
			url: url.into(),
		}
	}

	fn endpoint(&self, operation: &str) -> String {
		format!("{}/{operation}", self.url.trim_end_matches('/'))
	}

	/// Performs a GET, retrying once on transport failure. A `BadRequest`
	/// is definitive and returned immediately.
	async fn get_json<T: DeserializeOwned>(
		&self,
		operation: &str,
		query: &[(&'static str, String)],
	) -> Result<T, ClientError> {
		let mut retried = false;
		loop {
			match self.try_get(operation, query).await {
				Err(error) if !retried && !error.is_bad_request() => {
					log::debug!(
						target: "tessera-chain",
						"retrying {operation} after {error}",
					);
					retried = true;
				}
				other => return other,
			}
		}
	}

	async fn try_get<T: DeserializeOwned>(
		&self,
		operation: &str,
		query: &[(&'static str, String)],
	) -> Result<T, ClientError> {
		let response = self
			.http
			.get(self.endpoint(operation))
			.query(query)
			.send()
			.await
			.map_err(|e| ClientError::Transport(e.to_string()))?;

		if response.status().is_client_error() {
			let body = response.text().await.unwrap_or_default();
			return Err(ClientError::BadRequest(body));
		}
		let response = response
			.error_for_status()
			.map_err(|e| ClientError::Transport(e.to_string()))?;
		response
			.json::<T>()
			.await
			.map_err(|e| ClientError::Decode(e.to_string()))
	}
}

#[async_trait::async_trait]
impl ChainApi for FeederClient {
	async fn get_block(&self, id: &BlockId) -> Result<BlockDocument, ClientError> {
		self.get_json("get_block", &block_query(id)).await
	}

	async fn get_transaction_status(
		&self,
		transaction_hash: &str,
	) -> Result<TransactionStatusDocument, ClientError> {
		self.get_json(
			"get_transaction_status",
			&[("transactionHash", transaction_hash.to_owned())],
		)
		.await
	}

	async fn call_contract(
		&self,
		invoke: &InvokeFunction,
	) -> Result<CallResultDocument, ClientError> {
		let response = self
			.http
			.post(self.endpoint("call_contract"))
			.json(invoke)
			.send()
			.await
			.map_err(|e| ClientError::Transport(e.to_string()))?;
		if response.status().is_client_error() {
			let body = response.text().await.unwrap_or_default();
			return Err(ClientError::BadRequest(body));
		}
		response
			.json()
			.await
			.map_err(|e| ClientError::Decode(e.to_string()))
	}
}

/// Acknowledgement of the write gateway.
#[derive(Clone, Debug, Deserialize)]
pub struct AddTransactionResponse {
	#[serde(default)]
	pub code: Option<String>,
	pub transaction_hash: String,
}

/// Client of the write gateway.
#[derive(Clone)]
pub struct GatewayClient {
	http: reqwest::Client,
	url: String,
}

impl GatewayClient {
	pub fn new(url: impl Into<String>) -> Self {
		Self {
			http: reqwest::Client::new(),
			url: url.into(),
		}
	}

	/// Submits a signed invocation. Not retried: the gateway deduplicates
	/// by transaction hash but a double submission is still noise.
	pub async fn add_transaction(
		&self,
		invoke: &InvokeFunction,
	) -> Result<AddTransactionResponse, ClientError> {
		let response = self
			.http
			.post(format!("{}/add_transaction", self.url.trim_end_matches('/')))
			.json(invoke)
			.send()
			.await
			.map_err(|e| ClientError::Transport(e.to_string()))?;
		if response.status().is_client_error() {
			let body = response.text().await.unwrap_or_default();
			return Err(ClientError::BadRequest(body));
		}
		response
			.json()
			.await
			.map_err(|e| ClientError::Decode(e.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn block_query_addresses() {
		assert_eq!(
			block_query(&BlockId::Number(7)),
			vec![("blockNumber", "7".to_owned())],
		);
		assert_eq!(
			block_query(&BlockId::Hash("0x7ad".to_owned())),
			vec![("blockHash", "0x7ad".to_owned())],
		);
		assert!(block_query(&BlockId::Latest).is_empty());
	}

	#[test]
	fn endpoints_tolerate_trailing_slashes() {
		let client = FeederClient::new("http://gateway.example/feeder_gateway/");
		assert_eq!(
			client.endpoint("get_block"),
			"http://gateway.example/feeder_gateway/get_block",
		);
	}

	#[test]
	fn bad_request_is_the_only_transient() {
		assert!(ClientError::BadRequest("block not found".into()).is_bad_request());
		assert!(!ClientError::Transport("refused".into()).is_bad_request());
		assert!(!ClientError::Decode("eof".into()).is_bad_request());
	}

	#[test]
	fn decodes_submission_acks() {
		let ack: AddTransactionResponse = serde_json::from_str(
			r#"{"code": "TRANSACTION_RECEIVED", "transaction_hash": "0xabc"}"#,
		)
		.unwrap();
		assert_eq!(ack.transaction_hash, "0xabc");
		assert_eq!(ack.code.as_deref(), Some("TRANSACTION_RECEIVED"));
	}
}
