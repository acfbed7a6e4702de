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

use std::{
	sync::Arc,
	time::{Duration, Instant},
};

use futures_timer::Delay;

use tc_chain::{BlockId, ChainApi};
use tc_db::Backend;

use crate::{BlockCache, SyncError};

/// Single-task block ingestor.
///
/// Initialised from a tip block (`--thru` hash, or the chain's latest), it
/// keeps two cursors: `forward` chases blocks past the tip and treats
/// `BadRequest` as "not sequenced yet" worth a cooldown; `backfill` walks
/// history down to genesis and never backs off, historical blocks exist.
pub struct CrawlWorker<C> {
	client: Arc<C>,
	backend: Backend,
	cooldown: Duration,
	cache: BlockCache,
}

impl<C: ChainApi> CrawlWorker<C> {
	pub fn new(client: Arc<C>, backend: Backend, cooldown: Duration) -> Self {
		Self {
			client,
			backend,
			cooldown,
			cache: BlockCache::new(),
		}
	}

	/// Crawls forever. `thru` bounds the run to history at and before the
	/// given block hash; without it the worker follows the live tip.
	pub async fn run(mut self, thru: Option<String>) -> Result<(), SyncError> {
		let tip = match &thru {
			Some(hash) => BlockId::Hash(hash.clone()),
			None => BlockId::Latest,
		};
		let tip = self.client.get_block(&tip).await?;
		let mut forward = tip.block_number + 1;
		let mut backfill = tip.block_number + 1;
		let mut cooldown_deadline = Instant::now();
		log::info!(
			target: "tessera-sync",
			"crawling around block #{}, live = {}",
			tip.block_number,
			thru.is_none(),
		);

		loop {
			if thru.is_none() && cooldown_deadline <= Instant::now() {
				match self.crawl_block(forward).await {
					Ok(()) => {
						forward += 1;
						continue;
					}
					Err(SyncError::Chain(error)) if error.is_bad_request() => {
						// The tip has not been sequenced yet.
						cooldown_deadline = Instant::now() + self.cooldown;
					}
					Err(SyncError::Chain(error)) => {
						log::warn!(
							target: "tessera-sync",
							"forward crawl of #{forward} failed: {error}",
						);
						cooldown_deadline = Instant::now() + self.cooldown;
					}
					Err(error) => return Err(error),
				}
			}

			if backfill > 0 {
				match self.crawl_block(backfill - 1).await {
					Ok(()) => {
						backfill -= 1;
						continue;
					}
					Err(SyncError::Chain(error)) => {
						log::warn!(
							target: "tessera-sync",
							"backfill crawl of #{} failed: {error}",
							backfill - 1,
						);
						Delay::new(self.cooldown).await;
						continue;
					}
					Err(error) => return Err(error),
				}
			}

			Delay::new(self.cooldown).await;
		}
	}

	/// Fetches and persists one block unless it is already known. A unique
	/// conflict means another writer won the race; the postcondition holds
	/// either way.
	async fn crawl_block(&mut self, block_number: u64) -> Result<(), SyncError> {
		if self.cache.hit(&self.backend, block_number).await? {
			return Ok(());
		}

		log::debug!(target: "tessera-sync", "crawling block #{block_number}");
		let document = self.client.get_block(&BlockId::Number(block_number)).await?;
		match self.backend.put_block(&document).await {
			Err(error) if error.is_unique_violation() => {
				log::debug!(
					target: "tessera-sync",
					"block #{block_number} persisted concurrently",
				);
				Ok(())
			}
			other => Ok(other?),
		}
	}
}
