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

use std::sync::Arc;

use tc_chain::{BlockId, ChainApi, ClientError};
use tc_db::{Backend, StoredBlock};

use crate::SyncError;

/// Blocks revisited per outer iteration.
const BATCH: u32 = 20;

/// Outcome of one purge pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PurgeSummary {
	pub deleted: u64,
	pub refreshed: u64,
	pub unreachable: u64,
}

/// Reorg repair over the raw mirror.
///
/// Streams persisted blocks whose status is not terminal in ascending
/// order, refetches each from the gateway, and reconciles: a changed hash
/// or an `ABORTED` status deletes the block with its transactions, anything
/// else refreshes the stored document in place. Interpreter cursors are
/// left alone; a deleted block simply becomes missing and interpretation
/// stalls on it until it is re-crawled.
pub struct PurgeWorker<C> {
	client: Arc<C>,
	backend: Backend,
	dry_run: bool,
}

impl<C: ChainApi> PurgeWorker<C> {
	pub fn new(client: Arc<C>, backend: Backend, dry_run: bool) -> Self {
		Self {
			client,
			backend,
			dry_run,
		}
	}

	/// One full pass over the non-terminal blocks.
	pub async fn run(&self) -> Result<PurgeSummary, SyncError> {
		let mut summary = PurgeSummary::default();
		let mut resume_from = 0u64;

		loop {
			let batch = self.backend.non_terminal_blocks(resume_from, BATCH).await?;
			let Some(last) = batch.last().map(|block| block.block_number) else {
				break;
			};

			// A block the gateway will not serve right now parks the pass;
			// the id is the resume point of the next outer iteration.
			let mut first_error = None;
			for stored in &batch {
				match self.reconcile(stored, &mut summary).await {
					Ok(()) => {}
					Err(SyncError::Chain(error)) if error.is_bad_request() => {
						summary.unreachable += 1;
						first_error.get_or_insert(stored.block_number);
					}
					Err(error) => return Err(error),
				}
			}

			let next = first_error.unwrap_or(last + 1);
			if next <= resume_from {
				break;
			}
			resume_from = next;
		}

		Ok(summary)
	}

	async fn reconcile(
		&self,
		stored: &StoredBlock,
		summary: &mut PurgeSummary,
	) -> Result<(), SyncError> {
		let current = self.client.get_block(&BlockId::Number(stored.block_number)).await?;

		let aborted = current.status.as_deref() == Some(tp_gateway::STATUS_ABORTED);
		if current.block_hash != stored.block_hash || aborted {
			log::info!(
				target: "tessera-sync",
				"purging block #{} ({} -> {}, status {:?})",
				stored.block_number,
				stored.block_hash,
				current.block_hash,
				current.status,
			);
			if !self.dry_run {
				self.backend.delete_block(stored.block_number).await?;
			}
			summary.deleted += 1;
		} else {
			log::debug!(
				target: "tessera-sync",
				"refreshing block #{} (status {:?})",
				stored.block_number,
				current.status,
			);
			if !self.dry_run {
				self.backend.replace_document(&current).await?;
			}
			summary.refreshed += 1;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{self, MockChain};

	async fn seeded(tmp: &tempfile::TempDir) -> (Backend, MockChain) {
		let backend = test_support::backend(tmp).await;
		let chain = MockChain::default();
		for number in 0..3u64 {
			let document =
				MockChain::block_document(number, &format!("0x{number:x}aa"), "ACCEPTED_ON_L2");
			backend.put_block(&document).await.unwrap();
			chain.insert(document);
		}
		(backend, chain)
	}

	#[tokio::test]
	async fn deletes_rewritten_blocks_and_finalises_agreeing_ones() {
		let tmp = tempfile::tempdir().expect("create a temporary directory");
		let (backend, chain) = seeded(&tmp).await;
		// The chain rewrote block 1 and finalised block 2.
		chain.insert(MockChain::block_document(1, "0x1bb", "ACCEPTED_ON_L2"));
		chain.insert(MockChain::block_document(2, "0x2aa", "ACCEPTED_ON_L1"));

		let worker = PurgeWorker::new(Arc::new(chain), backend.clone(), false);
		let summary = worker.run().await.unwrap();
		assert_eq!(summary, PurgeSummary { deleted: 1, refreshed: 2, unreachable: 0 });

		let mut remaining = backend.block_numbers_in(0, 100).await.unwrap();
		remaining.sort_unstable();
		assert_eq!(remaining, [0, 2]);
		// Block 2 is terminal now, so the next pass has only block 0 left.
		assert_eq!(backend.non_terminal_blocks(0, 20).await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn aborted_blocks_are_deleted_even_with_matching_hash() {
		let tmp = tempfile::tempdir().expect("create a temporary directory");
		let (backend, chain) = seeded(&tmp).await;
		chain.insert(MockChain::block_document(1, "0x1aa", "ABORTED"));

		let worker = PurgeWorker::new(Arc::new(chain), backend.clone(), false);
		let summary = worker.run().await.unwrap();
		assert_eq!(summary.deleted, 1);
		assert!(!backend.block_numbers_in(1, 2).await.unwrap().contains(&1));
	}

	#[tokio::test]
	async fn unreachable_blocks_park_the_pass_without_data_loss() {
		let tmp = tempfile::tempdir().expect("create a temporary directory");
		let (backend, chain) = seeded(&tmp).await;
		// The gateway refuses to serve block 0 for the moment.
		chain.remove(0);

		let worker = PurgeWorker::new(Arc::new(chain), backend.clone(), false);
		let summary = worker.run().await.unwrap();
		assert_eq!(summary.unreachable, 1);
		assert_eq!(summary.refreshed, 2);
		// Nothing was deleted; block 0 waits for the next pass.
		assert_eq!(backend.block_numbers_in(0, 100).await.unwrap().len(), 3);
	}

	#[tokio::test]
	async fn dry_run_reports_without_mutating() {
		let tmp = tempfile::tempdir().expect("create a temporary directory");
		let (backend, chain) = seeded(&tmp).await;
		chain.insert(MockChain::block_document(1, "0x1bb", "ACCEPTED_ON_L2"));

		let worker = PurgeWorker::new(Arc::new(chain), backend.clone(), true);
		let summary = worker.run().await.unwrap();
		assert_eq!(summary.deleted, 1);
		assert_eq!(backend.block_numbers_in(0, 100).await.unwrap().len(), 3);
	}
}
