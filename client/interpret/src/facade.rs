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

//! Off-chain collaborators of the interpreter.
//!
//! Registered collections live as ERC-20/ERC-721 contracts on the L1 side;
//! their `name`/`symbol`/`decimals`/`tokenURI` reads go through
//! [`ContractFacade`], and token metadata documents through
//! [`MetadataFetcher`]. Both are traits so the replay logic never assumes a
//! network; the production implementations speak Ethereum JSON-RPC and
//! plain HTTP via reqwest.

use serde::Deserialize;
use serde_json::Value;
use sha3::{Digest, Keccak256};
use thiserror::Error;

use tp_gateway::Felt;

#[derive(Clone, Debug, Error)]
pub enum FacadeError {
	#[error("facade unreachable: {0}")]
	Unavailable(String),
	#[error("facade returned malformed data: {0}")]
	Decode(String),
}

/// On-chain identity of a token contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractIdentity {
	pub name: String,
	pub symbol: String,
	pub decimals: i64,
}

/// Read access to a collection's ERC facade.
#[async_trait::async_trait]
pub trait ContractFacade: Send + Sync {
	/// `name`/`symbol`/`decimals` of an ERC-20, or `name`/`symbol` of an
	/// ERC-721 (decimals 0).
	async fn identify(&self, address: &str, fungible: bool)
		-> Result<ContractIdentity, FacadeError>;

	/// `tokenURI(token_id)` of an ERC-721 metadata contract.
	async fn token_uri(&self, address: &str, token_id: &Felt) -> Result<String, FacadeError>;
}

/// Fetches a token metadata document by URI.
#[async_trait::async_trait]
pub trait MetadataFetcher: Send + Sync {
	async fn fetch(&self, token_uri: &str) -> Result<Value, FacadeError>;
}

/// The ERC-721 metadata document shape. All three fields must decode as
/// strings for a token to be enriched; extra keys are carried in the raw
/// document only.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TokenMetadata {
	pub name: String,
	pub description: String,
	pub image: String,
}

impl TokenMetadata {
	pub fn validate(document: &Value) -> Result<TokenMetadata, FacadeError> {
		serde_json::from_value(document.clone()).map_err(|e| FacadeError::Decode(e.to_string()))
	}
}

/// First four keccak bytes of a solidity function signature.
fn function_selector(signature: &str) -> [u8; 4] {
	let digest: [u8; 32] = Keccak256::digest(signature.as_bytes()).into();
	[digest[0], digest[1], digest[2], digest[3]]
}

/// `0x`-prefixed call data: selector plus 32-byte words.
fn call_data(signature: &str, words: &[[u8; 32]]) -> String {
	let mut data = function_selector(signature).to_vec();
	for word in words {
		data.extend_from_slice(word);
	}
	format!("0x{}", hex::encode(data))
}

fn abi_word_as_usize(word: &[u8]) -> Result<usize, FacadeError> {
	if word.len() != 32 || word[..24].iter().any(|&b| b != 0) {
		return Err(FacadeError::Decode("oversized abi word".to_owned()));
	}
	let mut buf = [0u8; 8];
	buf.copy_from_slice(&word[24..]);
	Ok(u64::from_be_bytes(buf) as usize)
}

/// Decodes a solo `string` return value.
fn decode_abi_string(bytes: &[u8]) -> Result<String, FacadeError> {
	let offset = abi_word_as_usize(
		bytes.get(..32).ok_or_else(|| FacadeError::Decode("short abi head".to_owned()))?,
	)?;
	let length = abi_word_as_usize(
		bytes
			.get(offset..offset + 32)
			.ok_or_else(|| FacadeError::Decode("short abi offset".to_owned()))?,
	)?;
	let data = bytes
		.get(offset + 32..offset + 32 + length)
		.ok_or_else(|| FacadeError::Decode("short abi tail".to_owned()))?;
	String::from_utf8(data.to_vec()).map_err(|e| FacadeError::Decode(e.to_string()))
}

/// Decodes a solo `uint8`/`uint256` return value small enough to store.
fn decode_abi_uint(bytes: &[u8]) -> Result<i64, FacadeError> {
	let value = abi_word_as_usize(
		bytes.get(..32).ok_or_else(|| FacadeError::Decode("short abi head".to_owned()))?,
	)?;
	i64::try_from(value).map_err(|_| FacadeError::Decode("uint out of range".to_owned()))
}

/// `ContractFacade` over Ethereum JSON-RPC `eth_call`.
#[derive(Clone)]
pub struct EthereumFacade {
	http: reqwest::Client,
	url: String,
}

impl EthereumFacade {
	pub fn new(url: impl Into<String>) -> Self {
		Self {
			http: reqwest::Client::new(),
			url: url.into(),
		}
	}

	async fn eth_call(&self, to: &str, data: String) -> Result<Vec<u8>, FacadeError> {
		let payload = serde_json::json!({
			"jsonrpc": "2.0",
			"id": 1,
			"method": "eth_call",
			"params": [{ "to": to, "data": data }, "latest"],
		});
		let response: Value = self
			.http
			.post(&self.url)
			.json(&payload)
			.send()
			.await
			.map_err(|e| FacadeError::Unavailable(e.to_string()))?
			.json()
			.await
			.map_err(|e| FacadeError::Decode(e.to_string()))?;

		if let Some(error) = response.get("error") {
			return Err(FacadeError::Decode(error.to_string()));
		}
		let result = response
			.get("result")
			.and_then(Value::as_str)
			.ok_or_else(|| FacadeError::Decode("missing result".to_owned()))?;
		hex::decode(result.trim_start_matches("0x"))
			.map_err(|e| FacadeError::Decode(e.to_string()))
	}

	async fn call_string(&self, address: &str, signature: &str) -> Result<String, FacadeError> {
		decode_abi_string(&self.eth_call(address, call_data(signature, &[])).await?)
	}
}

#[async_trait::async_trait]
impl ContractFacade for EthereumFacade {
	async fn identify(
		&self,
		address: &str,
		fungible: bool,
	) -> Result<ContractIdentity, FacadeError> {
		let name = self.call_string(address, "name()").await?;
		let symbol = self.call_string(address, "symbol()").await?;
		let decimals = if fungible {
			decode_abi_uint(&self.eth_call(address, call_data("decimals()", &[])).await?)?
		} else {
			0
		};
		Ok(ContractIdentity {
			name,
			symbol,
			decimals,
		})
	}

	async fn token_uri(&self, address: &str, token_id: &Felt) -> Result<String, FacadeError> {
		let data = call_data("tokenURI(uint256)", &[token_id.to_bytes_be()]);
		decode_abi_string(&self.eth_call(address, data).await?)
	}
}

/// `MetadataFetcher` over plain HTTP.
#[derive(Clone)]
pub struct HttpMetadataFetcher {
	http: reqwest::Client,
}

impl HttpMetadataFetcher {
	pub fn new() -> Self {
		Self {
			http: reqwest::Client::new(),
		}
	}
}

impl Default for HttpMetadataFetcher {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait::async_trait]
impl MetadataFetcher for HttpMetadataFetcher {
	async fn fetch(&self, token_uri: &str) -> Result<Value, FacadeError> {
		self.http
			.get(token_uri)
			.send()
			.await
			.map_err(|e| FacadeError::Unavailable(e.to_string()))?
			.json()
			.await
			.map_err(|e| FacadeError::Decode(e.to_string()))
	}
}
