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

//! Shared wire model of the L2 gateways.
//!
//! Everything the feeder gateway serves and the write gateway accepts is a
//! JSON document whose scalar values are field elements rendered as strings.
//! The types here deserialize the fields tessera interprets and carry every
//! other key through untouched, so a persisted document is byte-equivalent
//! to what the gateway returned.

mod felt;
mod types;

pub use self::{
	felt::{parse_felt, to_dec_string, to_hex_string, ParseFeltError},
	types::{
		BlockDocument, CallResultDocument, InvokeFunction, ReceiptDocument,
		TransactionDocument, TransactionStatus, TransactionStatusDocument, STATUS_ABORTED,
		TERMINAL_BLOCK_STATUSES, TYPE_DEPLOY, TYPE_INVOKE_FUNCTION,
	},
};
pub use starknet_types_core::felt::Felt;
