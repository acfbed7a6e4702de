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

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use starknet_types_core::felt::Felt;

use crate::felt::to_hex_string;

/// Transaction type tag of contract deployments.
pub const TYPE_DEPLOY: &str = "DEPLOY";
/// Transaction type tag of function invocations.
pub const TYPE_INVOKE_FUNCTION: &str = "INVOKE_FUNCTION";

/// Block statuses the chain can no longer reorganise away. The second
/// variant is the legacy spelling some gateways still serve.
pub const TERMINAL_BLOCK_STATUSES: [&str; 2] = ["ACCEPTED_ON_L1", "ACCEPTED_ONCHAIN"];
/// Status of a block the sequencer withdrew.
pub const STATUS_ABORTED: &str = "ABORTED";

/// A block as served by the feeder gateway.
///
/// Only the fields the crawler and interpreter read are typed; everything
/// else rides along in `extra` so the persisted document stays faithful.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockDocument {
	/// Monotone block number, the primary identity off-chain.
	pub block_number: u64,
	/// Block hash, unique per observed chain state.
	pub block_hash: String,
	/// Sequencer timestamp, epoch seconds.
	pub timestamp: i64,
	/// Finality status string; absent on some pending responses.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub status: Option<String>,
	/// Transactions in block order.
	#[serde(default)]
	pub transactions: Vec<TransactionDocument>,
	/// Receipts zipped with `transactions`.
	#[serde(default)]
	pub transaction_receipts: Vec<ReceiptDocument>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

/// A transaction inside a [`BlockDocument`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionDocument {
	pub transaction_hash: String,
	#[serde(rename = "type")]
	pub transaction_type: String,
	pub contract_address: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub entry_point_selector: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub entry_point_type: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub calldata: Option<Vec<String>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub constructor_calldata: Option<Vec<String>>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

impl TransactionDocument {
	/// The argument list to persist. DEPLOY transactions carry theirs under
	/// `constructor_calldata`.
	pub fn calldata(&self) -> &[String] {
		let calldata = if self.transaction_type == TYPE_DEPLOY {
			&self.constructor_calldata
		} else {
			&self.calldata
		};
		calldata.as_deref().unwrap_or(&[])
	}
}

/// A receipt inside a [`BlockDocument`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReceiptDocument {
	pub transaction_hash: String,
	pub transaction_index: i64,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

/// Lifecycle of a submitted transaction as reported by the feeder gateway.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
	NotReceived,
	Received,
	Pending,
	Rejected,
	AcceptedOnL2,
	AcceptedOnL1,
}

/// Response envelope of `get_transaction_status`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionStatusDocument {
	pub tx_status: TransactionStatus,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

/// Response envelope of `call_contract`: an ordered list of field elements.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CallResultDocument {
	pub result: Vec<String>,
}

/// An `INVOKE_FUNCTION` submission for the write gateway.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InvokeFunction {
	#[serde(rename = "type")]
	pub transaction_type: String,
	pub contract_address: String,
	pub entry_point_selector: String,
	pub calldata: Vec<String>,
	pub signature: Vec<String>,
}

impl InvokeFunction {
	pub fn new(
		contract_address: &Felt,
		entry_point_selector: &Felt,
		calldata: &[Felt],
		signature: &[Felt],
	) -> Self {
		Self {
			transaction_type: TYPE_INVOKE_FUNCTION.to_owned(),
			contract_address: to_hex_string(contract_address),
			entry_point_selector: to_hex_string(entry_point_selector),
			calldata: calldata.iter().map(to_hex_string).collect(),
			signature: signature.iter().map(to_hex_string).collect(),
		}
	}
}
