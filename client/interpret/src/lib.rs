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

//! The interpreter.
//!
//! One semantic cursor per exchange contract walks the raw mirror block by
//! block; within a block, that contract's transactions replay strictly in
//! `transaction_index` order, dispatched by entry-point selector into typed
//! handlers that mutate the semantic model. A whole block commits or rolls
//! back as one database transaction, so replays are idempotent and a failed
//! block is retried from its first transaction.

mod dispatch;
mod facade;
mod worker;

pub use self::{
	dispatch::{dispatch, Call, CalldataError, EntryPoint},
	facade::{
		ContractFacade, ContractIdentity, EthereumFacade, FacadeError, HttpMetadataFetcher,
		MetadataFetcher, TokenMetadata,
	},
	worker::InterpretWorker,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InterpretError {
	#[error(transparent)]
	Database(#[from] tc_db::Error),
	#[error(transparent)]
	Calldata(#[from] CalldataError),
}
