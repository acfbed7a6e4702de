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

use std::collections::HashSet;

use tc_db::Backend;

use crate::SyncError;

/// Width of one membership window.
const WINDOW: u64 = 1000;

/// Windowed "is this block already persisted?" filter.
///
/// The cache memoises one 1000-id window of persisted block numbers and
/// reloads when a probe crosses into another window. A stale negative only
/// costs a redundant fetch; the store's unique constraint is the arbiter.
#[derive(Debug, Default)]
pub struct BlockCache {
	window: Option<u64>,
	blocks: HashSet<u64>,
}

impl BlockCache {
	/// An empty cache with an invalid cursor: the first probe always loads.
	pub fn new() -> Self {
		Default::default()
	}

	/// Whether `block_number` was persisted as of the last window load.
	pub async fn hit(&mut self, backend: &Backend, block_number: u64) -> Result<bool, SyncError> {
		let window = block_number / WINDOW;
		if self.window != Some(window) {
			let lo = window * WINDOW;
			self.blocks = backend.block_numbers_in(lo, lo + WINDOW).await?.into_iter().collect();
			self.window = Some(window);
		}
		Ok(self.blocks.contains(&block_number))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{self, MockChain};

	async fn persist(backend: &Backend, numbers: &[u64]) {
		for &number in numbers {
			backend
				.put_block(&MockChain::block_document(
					number,
					&format!("0x{number:x}aa"),
					"ACCEPTED_ON_L2",
				))
				.await
				.unwrap();
		}
	}

	#[tokio::test]
	async fn reflects_the_store_per_window() {
		let tmp = tempfile::tempdir().expect("create a temporary directory");
		let backend = test_support::backend(&tmp).await;
		persist(&backend, &[1, 2, 999, 1000, 2500]).await;

		let mut cache = BlockCache::new();
		assert!(cache.hit(&backend, 1).await.unwrap());
		assert!(cache.hit(&backend, 999).await.unwrap());
		assert!(!cache.hit(&backend, 3).await.unwrap());
		// Crossing into the next window reloads.
		assert!(cache.hit(&backend, 1000).await.unwrap());
		assert!(!cache.hit(&backend, 1001).await.unwrap());
		assert!(cache.hit(&backend, 2500).await.unwrap());
	}

	#[tokio::test]
	async fn stale_negatives_heal_on_window_crossing() {
		let tmp = tempfile::tempdir().expect("create a temporary directory");
		let backend = test_support::backend(&tmp).await;

		let mut cache = BlockCache::new();
		assert!(!cache.hit(&backend, 10).await.unwrap());
		// A block persisted behind the cache's back stays invisible...
		persist(&backend, &[10]).await;
		assert!(!cache.hit(&backend, 10).await.unwrap());
		// ...until any probe crosses a window boundary and back.
		assert!(!cache.hit(&backend, 1010).await.unwrap());
		assert!(cache.hit(&backend, 10).await.unwrap());
	}
}
