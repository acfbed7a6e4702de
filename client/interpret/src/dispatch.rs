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

use std::{collections::HashMap, sync::OnceLock};

use thiserror::Error;

use tp_crypto::selector_from_name;
use tp_gateway::{parse_felt, to_hex_string, Felt, ParseFeltError};

/// The entry points the interpreter semanticises. The contract exposes
/// more; everything else is deliberately ignored.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EntryPoint {
	RegisterContract,
	RegisterClient,
	Mint,
	Withdraw,
	Deposit,
	Transfer,
	CreateOrder,
	FulfillOrder,
	CancelOrder,
}

impl EntryPoint {
	pub const ALL: [EntryPoint; 9] = [
		EntryPoint::RegisterContract,
		EntryPoint::RegisterClient,
		EntryPoint::Mint,
		EntryPoint::Withdraw,
		EntryPoint::Deposit,
		EntryPoint::Transfer,
		EntryPoint::CreateOrder,
		EntryPoint::FulfillOrder,
		EntryPoint::CancelOrder,
	];

	/// The canonical on-chain name the selector derives from.
	pub fn name(self) -> &'static str {
		match self {
			EntryPoint::RegisterContract => "register_contract",
			EntryPoint::RegisterClient => "register_client",
			EntryPoint::Mint => "mint",
			EntryPoint::Withdraw => "withdraw",
			EntryPoint::Deposit => "deposit",
			EntryPoint::Transfer => "transfer",
			EntryPoint::CreateOrder => "create_order",
			EntryPoint::FulfillOrder => "fulfill_order",
			EntryPoint::CancelOrder => "cancel_order",
		}
	}

	/// Canonical hex rendering of this entry point's selector.
	pub fn selector(self) -> String {
		to_hex_string(&selector_from_name(self.name()))
	}
}

/// Resolves a stored `entry_point_selector` to a handler. Selectors are
/// derived once from the canonical names; unknown or unparsable selectors
/// resolve to `None` and the transaction is skipped.
pub fn dispatch(selector: &str) -> Option<EntryPoint> {
	static TABLE: OnceLock<HashMap<String, EntryPoint>> = OnceLock::new();
	let table = TABLE.get_or_init(|| {
		EntryPoint::ALL
			.iter()
			.map(|&entry_point| (entry_point.selector(), entry_point))
			.collect()
	});
	let normalised = to_hex_string(&parse_felt(selector).ok()?);
	table.get(&normalised).copied()
}

/// Calldata that did not decode into its handler's shape.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CalldataError {
	#[error("{entry_point:?} expects {expected} calldata elements, got {actual}")]
	Arity {
		entry_point: EntryPoint,
		expected: usize,
		actual: usize,
	},
	#[error("{entry_point:?} calldata: {source}")]
	Element {
		entry_point: EntryPoint,
		source: ParseFeltError,
	},
}

/// A decoded invocation. Field elements stay untyped felts here; handlers
/// render them into keys, amounts and checksummed addresses as needed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
	RegisterContract { contract: Felt, kind: Felt, minter: Felt },
	RegisterClient { user: Felt, address: Felt },
	Mint { user: Felt, token_id: Felt, contract: Felt },
	Withdraw { amount_or_id: Felt, contract: Felt },
	Deposit { user: Felt, amount_or_id: Felt, contract: Felt },
	Transfer { from: Felt, to: Felt, amount_or_id: Felt, contract: Felt },
	CreateOrder {
		order_id: Felt,
		user: Felt,
		bid: Felt,
		base_contract: Felt,
		base_token_id: Felt,
		quote_contract: Felt,
		quote_amount: Felt,
	},
	FulfillOrder { order_id: Felt, user: Felt },
	CancelOrder { order_id: Felt },
}

impl Call {
	/// Decodes calldata at the dispatch boundary. Arity is fixed per
	/// entry point; a mismatch aborts the enclosing block.
	pub fn decode(entry_point: EntryPoint, calldata: &[String]) -> Result<Call, CalldataError> {
		let expected = match entry_point {
			EntryPoint::CancelOrder => 2,
			EntryPoint::RegisterClient | EntryPoint::FulfillOrder => 3,
			EntryPoint::RegisterContract | EntryPoint::Mint => 4,
			EntryPoint::Withdraw | EntryPoint::Deposit | EntryPoint::Transfer => 5,
			EntryPoint::CreateOrder => 7,
		};
		if calldata.len() != expected {
			return Err(CalldataError::Arity {
				entry_point,
				expected,
				actual: calldata.len(),
			});
		}

		let mut elements = Vec::with_capacity(expected);
		for raw in calldata {
			elements.push(parse_felt(raw).map_err(|source| CalldataError::Element {
				entry_point,
				source,
			})?);
		}

		// Trailing nonces and L1 sender addresses are part of the signed
		// payload but irrelevant to the semantic model.
		Ok(match entry_point {
			EntryPoint::RegisterContract => Call::RegisterContract {
				contract: elements[1],
				kind: elements[2],
				minter: elements[3],
			},
			EntryPoint::RegisterClient => Call::RegisterClient {
				user: elements[0],
				address: elements[1],
			},
			EntryPoint::Mint => Call::Mint {
				user: elements[0],
				token_id: elements[1],
				contract: elements[2],
			},
			EntryPoint::Withdraw => Call::Withdraw {
				amount_or_id: elements[1],
				contract: elements[2],
			},
			EntryPoint::Deposit => Call::Deposit {
				user: elements[1],
				amount_or_id: elements[2],
				contract: elements[3],
			},
			EntryPoint::Transfer => Call::Transfer {
				from: elements[0],
				to: elements[1],
				amount_or_id: elements[2],
				contract: elements[3],
			},
			EntryPoint::CreateOrder => Call::CreateOrder {
				order_id: elements[0],
				user: elements[1],
				bid: elements[2],
				base_contract: elements[3],
				base_token_id: elements[4],
				quote_contract: elements[5],
				quote_amount: elements[6],
			},
			EntryPoint::FulfillOrder => Call::FulfillOrder {
				order_id: elements[0],
				user: elements[1],
			},
			EntryPoint::CancelOrder => Call::CancelOrder {
				order_id: elements[0],
			},
		})
	}
}
