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

//! Cryptographic primitives of the exchange protocol: entry-point selector
//! derivation, the Pedersen fold clients sign over, STARK signature
//! verification and Ethereum address checksumming.

mod address;
mod selector;
mod signable;

pub use self::{
	address::{to_checksum_address, ZERO_ADDRESS},
	selector::selector_from_name,
	signable::{fold_message, verify_message, Signable, SignatureError},
};
