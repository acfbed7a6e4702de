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

use sha1::{Digest, Sha1};
use starknet_crypto::{pedersen_hash, verify};
use starknet_types_core::felt::Felt;
use thiserror::Error;

use tp_gateway::parse_felt;

/// One element of a message clients sign.
#[derive(Clone, Debug)]
pub enum Signable {
	/// An integer, decimal or `0x`-prefixed hexadecimal.
	Number(String),
	/// An opaque byte blob. The on-chain scheme folds blobs through SHA-1
	/// read big-endian; that mapping is part of the protocol and must not
	/// be modernised.
	Bytes(Vec<u8>),
}

impl Signable {
	fn to_felt(&self) -> Result<Felt, SignatureError> {
		match self {
			Signable::Number(raw) => {
				parse_felt(raw).map_err(|_| SignatureError::InvalidElement(raw.clone()))
			}
			Signable::Bytes(blob) => {
				let digest = Sha1::digest(blob);
				let mut padded = [0u8; 32];
				padded[12..].copy_from_slice(&digest);
				Ok(Felt::from_bytes_be(&padded))
			}
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SignatureError {
	#[error("unsignable message element `{0}`")]
	InvalidElement(String),
	#[error("signature components out of range")]
	MalformedSignature,
}

/// Folds a message right to left with the Pedersen hash, starting from 0:
/// `h = H(x0, H(x1, ... H(xn-1, 0)))`.
pub fn fold_message(elements: &[Signable]) -> Result<Felt, SignatureError> {
	let mut acc = Felt::ZERO;
	for element in elements.iter().rev() {
		acc = pedersen_hash(&element.to_felt()?, &acc);
	}
	Ok(acc)
}

/// Checks the STARK signature `(r, s)` over the folded message against a
/// stark key.
pub fn verify_message(
	stark_key: &Felt,
	elements: &[Signable],
	r: &Felt,
	s: &Felt,
) -> Result<bool, SignatureError> {
	let message = fold_message(elements)?;
	verify(stark_key, &message, r, s).map_err(|_| SignatureError::MalformedSignature)
}
