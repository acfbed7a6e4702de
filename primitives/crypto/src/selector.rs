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

use sha3::{Digest, Keccak256};
use starknet_types_core::felt::Felt;

/// Derives the entry-point selector of a canonical name: the starknet
/// keccak, i.e. keccak-256 truncated to its low 250 bits.
pub fn selector_from_name(name: &str) -> Felt {
	let mut digest: [u8; 32] = Keccak256::digest(name.as_bytes()).into();
	digest[0] &= 0x03;
	Felt::from_bytes_be(&digest)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pins_the_deposit_selector() {
		// The L1->L2 messaging constant baked into the on-chain contract.
		assert_eq!(
			selector_from_name("deposit"),
			Felt::from_hex("0xc73f681176fc7b3f9693986fd7b14581e8d540519e27400e88b8713932be01")
				.unwrap(),
		);
	}

	#[test]
	fn selectors_stay_inside_the_field() {
		for name in [
			"register_contract",
			"register_client",
			"mint",
			"withdraw",
			"deposit",
			"transfer",
			"create_order",
			"fulfill_order",
			"cancel_order",
		] {
			let selector = selector_from_name(name);
			assert!(selector.to_bytes_be()[0] <= 0x03, "{name} overflows 250 bits");
			assert_ne!(selector, Felt::ZERO);
		}
	}

	#[test]
	fn distinct_names_distinct_selectors() {
		assert_ne!(selector_from_name("mint"), selector_from_name("withdraw"));
	}
}
