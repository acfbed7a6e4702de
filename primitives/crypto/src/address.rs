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

/// The checksummed zero address, the store's stand-in for Ether.
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Renders the low 160 bits of a field element as an EIP-55 checksummed
/// Ethereum address. Every address column in the store holds this form, so
/// lookups are plain string equality.
pub fn to_checksum_address(value: &Felt) -> String {
	let bytes = value.to_bytes_be();
	let nibbles = hex::encode(&bytes[12..]);
	let digest: [u8; 32] = Keccak256::digest(nibbles.as_bytes()).into();

	let mut address = String::with_capacity(42);
	address.push_str("0x");
	for (i, c) in nibbles.chars().enumerate() {
		let hash_nibble = (digest[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0xf;
		if c.is_ascii_alphabetic() && hash_nibble >= 8 {
			address.push(c.to_ascii_uppercase());
		} else {
			address.push(c);
		}
	}
	address
}

#[cfg(test)]
mod tests {
	use super::*;
	use tp_gateway::parse_felt;

	#[test]
	fn zero_is_all_zeroes() {
		assert_eq!(to_checksum_address(&Felt::ZERO), ZERO_ADDRESS);
	}

	#[test]
	fn matches_the_eip55_vectors() {
		for expected in [
			"0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
			"0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
			"0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
			"0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
		] {
			let felt = parse_felt(&expected.to_lowercase()).unwrap();
			assert_eq!(to_checksum_address(&felt), expected);
		}
	}

	#[test]
	fn normalises_calldata_addresses() {
		// Addresses arrive from calldata as decimal field elements.
		let felt = parse_felt("520317047845569385721509102878101873512541208433").unwrap();
		let address = to_checksum_address(&felt);
		assert!(address.starts_with("0x"));
		assert_eq!(address.len(), 42);
		assert_eq!(
			parse_felt(&address.to_lowercase()).unwrap(),
			felt,
		);
	}
}
