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

use starknet_types_core::felt::Felt;
use thiserror::Error;

/// A string could not be read as a field element.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid field element `{0}`")]
pub struct ParseFeltError(pub String);

/// Parses a field element the way the chain renders them: `0x`-prefixed
/// strings are hexadecimal, everything else is decimal.
pub fn parse_felt(value: &str) -> Result<Felt, ParseFeltError> {
	let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
		Some(hex) => Felt::from_hex(hex),
		None => Felt::from_dec_str(value),
	};
	parsed.map_err(|_| ParseFeltError(value.to_owned()))
}

/// Canonical decimal rendering. Calldata, keys and amounts are persisted in
/// this form so equality is plain string equality.
pub fn to_dec_string(felt: &Felt) -> String {
	felt.to_biguint().to_string()
}

/// Minimal `0x`-prefixed hexadecimal rendering, the form gateway requests
/// are written in.
pub fn to_hex_string(felt: &Felt) -> String {
	format!("{felt:#x}")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_decimal_and_hex() {
		assert_eq!(parse_felt("5050").unwrap(), Felt::from(5050_u64));
		assert_eq!(parse_felt("0x13ba").unwrap(), Felt::from(5050_u64));
		assert_eq!(parse_felt("0X13BA").unwrap(), Felt::from(5050_u64));
		assert_eq!(parse_felt("0").unwrap(), Felt::ZERO);
	}

	#[test]
	fn rejects_garbage() {
		assert!(parse_felt("").is_err());
		assert!(parse_felt("0xzz").is_err());
		assert!(parse_felt("12three").is_err());
	}

	#[test]
	fn renders_canonically() {
		let felt = parse_felt("0x13ba").unwrap();
		assert_eq!(to_dec_string(&felt), "5050");
		assert_eq!(to_hex_string(&felt), "0x13ba");
		assert_eq!(to_dec_string(&Felt::ZERO), "0");
	}

	#[test]
	fn survives_eighty_digit_keys() {
		// A stark key near the top of the numeric range the store accepts.
		let key = "1740729136829561885683894917751815192814966525555656371386868611731128807883";
		let felt = parse_felt(key).unwrap();
		assert_eq!(to_dec_string(&felt), key);
	}
}
