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

//! Chain ingestion.
//!
//! The crawl worker drives two frontiers over the chain: a forward cursor
//! chasing the tip (backing off while the next block does not exist yet)
//! and a backfill cursor draining history downward. Both funnel into the
//! same idempotent [`tc_db::Backend::put_block`], guarded by a windowed
//! membership cache. The purge worker is the reorg repair: it revisits
//! every block the chain could still rewrite and deletes or refreshes it.

mod cache;
mod purge;
mod worker;

pub use self::{
	cache::BlockCache,
	purge::{PurgeSummary, PurgeWorker},
	worker::CrawlWorker,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
	#[error(transparent)]
	Chain(#[from] tc_chain::ClientError),
	#[error(transparent)]
	Database(#[from] tc_db::Error),
}

#[cfg(test)]
pub(crate) mod test_support {
	use std::{
		collections::HashMap,
		sync::{Arc, Mutex},
	};

	use tc_chain::{BlockId, ChainApi, ClientError};
	use tc_db::{Backend, BackendConfig, SqliteBackendConfig};
	use tp_gateway::{BlockDocument, CallResultDocument, InvokeFunction, TransactionStatusDocument};

	pub async fn backend(tmp: &tempfile::TempDir) -> Backend {
		let path = format!(
			"sqlite://{}",
			tmp.path().join("test.db3").to_str().expect("utf-8 temp path"),
		);
		Backend::new(
			BackendConfig::Sqlite(SqliteBackendConfig {
				path: &path,
				create_if_missing: true,
			}),
			4,
		)
		.await
		.expect("backend to be created")
	}

	/// A deterministic chain the workers can crawl in tests.
	#[derive(Clone, Default)]
	pub struct MockChain {
		blocks: Arc<Mutex<HashMap<u64, BlockDocument>>>,
	}

	impl MockChain {
		pub fn block_document(number: u64, hash: &str, status: &str) -> BlockDocument {
			serde_json::from_value(serde_json::json!({
				"block_number": number,
				"block_hash": hash,
				"timestamp": 1_650_000_000 + number,
				"status": status,
				"transactions": [],
				"transaction_receipts": [],
			}))
			.unwrap()
		}

		pub fn insert(&self, document: BlockDocument) {
			self.blocks.lock().unwrap().insert(document.block_number, document);
		}

		pub fn remove(&self, number: u64) {
			self.blocks.lock().unwrap().remove(&number);
		}
	}

	#[async_trait::async_trait]
	impl ChainApi for MockChain {
		async fn get_block(&self, id: &BlockId) -> Result<BlockDocument, ClientError> {
			let blocks = self.blocks.lock().unwrap();
			let found = match id {
				BlockId::Number(number) => blocks.get(number),
				BlockId::Hash(hash) => blocks.values().find(|b| &b.block_hash == hash),
				BlockId::Latest => blocks.values().max_by_key(|b| b.block_number),
			};
			found.cloned().ok_or_else(|| ClientError::BadRequest("block not found".to_owned()))
		}

		async fn get_transaction_status(
			&self,
			_transaction_hash: &str,
		) -> Result<TransactionStatusDocument, ClientError> {
			unimplemented!("not exercised by sync tests")
		}

		async fn call_contract(
			&self,
			_invoke: &InvokeFunction,
		) -> Result<CallResultDocument, ClientError> {
			unimplemented!("not exercised by sync tests")
		}
	}
}
