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

//! Typed views of the stored rows. Field elements stay canonical decimal
//! strings, addresses stay checksummed strings; nothing here re-interprets
//! what the writers normalised.

/// A raw mirrored block, as the purge pass reads it back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredBlock {
	pub block_number: u64,
	pub block_hash: String,
	pub status: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StarkContractRow {
	pub id: i64,
	pub address: String,
	/// Next block this contract's transactions have not been interpreted
	/// from; `None` until the DEPLOY transaction pins the start.
	pub block_counter: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionRow {
	pub id: i64,
	pub hash: String,
	pub block_number: i64,
	pub transaction_index: i64,
	pub transaction_type: String,
	pub contract_id: i64,
	pub entry_point_selector: Option<String>,
	pub entry_point_type: Option<String>,
	/// Ordered decimal field elements, exactly as crawled.
	pub calldata: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountRow {
	pub id: i64,
	pub stark_key: String,
	pub address: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlueprintRow {
	pub id: i64,
	pub permanent_id: Option<String>,
	pub minter_id: i64,
	pub expire_at: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenContractRow {
	pub id: i64,
	pub address: String,
	pub fungible: bool,
	pub blueprint_id: Option<i64>,
	pub name: Option<String>,
	pub symbol: Option<String>,
	pub decimals: Option<i64>,
	pub base_uri: Option<String>,
	pub image: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenRow {
	pub id: i64,
	pub contract_id: i64,
	pub token_id: String,
	pub owner_id: Option<i64>,
	pub latest_tx_id: Option<i64>,
	pub ask_id: Option<i64>,
	pub nonce: i64,
	pub name: Option<String>,
	pub description: Option<String>,
	pub image: Option<String>,
	pub token_uri: Option<String>,
	pub asset_metadata: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LimitOrderRow {
	pub id: i64,
	pub order_id: String,
	pub user_id: i64,
	pub bid: bool,
	pub token_id: i64,
	pub quote_contract_id: i64,
	pub quote_amount: String,
	pub tx_id: i64,
	pub closed_tx_id: Option<i64>,
	pub fulfilled: Option<bool>,
}

impl LimitOrderRow {
	pub fn state(&self) -> OrderState {
		OrderState::from_fulfilled(self.fulfilled)
	}
}

/// Lifecycle of a limit order. The store encodes it as the nullable
/// `fulfilled` column; the mapping lives here and nowhere else.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OrderState {
	New,
	Fulfilled,
	Cancelled,
}

impl OrderState {
	pub fn from_fulfilled(fulfilled: Option<bool>) -> Self {
		match fulfilled {
			None => OrderState::New,
			Some(true) => OrderState::Fulfilled,
			Some(false) => OrderState::Cancelled,
		}
	}

	pub fn to_fulfilled(self) -> Option<bool> {
		match self {
			OrderState::New => None,
			OrderState::Fulfilled => Some(true),
			OrderState::Cancelled => Some(false),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn order_state_round_trips_the_tristate() {
		for state in [OrderState::New, OrderState::Fulfilled, OrderState::Cancelled] {
			assert_eq!(OrderState::from_fulfilled(state.to_fulfilled()), state);
		}
	}

	#[test]
	fn open_orders_have_no_closing_transaction() {
		let order = LimitOrderRow {
			id: 1,
			order_id: "13".into(),
			user_id: 1,
			bid: true,
			token_id: 1,
			quote_contract_id: 1,
			quote_amount: "1000".into(),
			tx_id: 1,
			closed_tx_id: None,
			fulfilled: None,
		};
		assert_eq!(order.state(), OrderState::New);
		assert_eq!(
			LimitOrderRow { fulfilled: Some(false), closed_tx_id: Some(2), ..order }.state(),
			OrderState::Cancelled,
		);
	}
}
