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

//! The raw chain mirror: blocks and transactions exactly as crawled.

use sqlx::Row;

use tp_gateway::{BlockDocument, TERMINAL_BLOCK_STATUSES};

use crate::{semantic, Backend, Error, Result, StoredBlock};

impl Backend {
	/// Persists a block and every (receipt, transaction) pair atomically.
	/// The block row is written first so the transaction rows always have
	/// their parent; contracts are de-duplicated by address. A block that
	/// is already present surfaces as [`Error::DuplicateBlock`] with
	/// nothing committed.
	pub async fn put_block(&self, document: &BlockDocument) -> Result<()> {
		log::debug!(
			target: "tessera-sql",
			"persisting block #{} with {} transactions",
			document.block_number,
			document.transactions.len(),
		);
		let mut tx = self.pool().begin().await?;

		let raw = serde_json::to_string(document)?;
		let inserted = sqlx::query(
			"INSERT INTO block (block_number, block_hash, timestamp, document)
			VALUES (?, ?, ?, ?)",
		)
		.bind(document.block_number as i64)
		.bind(&document.block_hash)
		.bind(document.timestamp)
		.bind(&raw)
		.execute(&mut *tx)
		.await;
		match inserted {
			Err(error) if unique_violation(&error) => {
				return Err(Error::DuplicateBlock(document.block_number));
			}
			other => other?,
		};

		for (receipt, transaction) in
			document.transaction_receipts.iter().zip(&document.transactions)
		{
			if receipt.transaction_hash != transaction.transaction_hash {
				return Err(Error::ReceiptMismatch {
					block: document.block_number,
					index: receipt.transaction_index,
				});
			}
			let contract =
				semantic::find_or_insert_stark_contract(&mut tx, &transaction.contract_address)
					.await?;
			sqlx::query(
				"INSERT INTO \"transaction\" (
					hash,
					block_number,
					transaction_index,
					type,
					contract_id,
					entry_point_selector,
					entry_point_type,
					calldata)
				VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
			)
			.bind(&transaction.transaction_hash)
			.bind(document.block_number as i64)
			.bind(receipt.transaction_index)
			.bind(&transaction.transaction_type)
			.bind(contract.id)
			.bind(&transaction.entry_point_selector)
			.bind(&transaction.entry_point_type)
			.bind(serde_json::to_string(transaction.calldata())?)
			.execute(&mut *tx)
			.await?;
		}

		tx.commit().await?;
		Ok(())
	}

	/// Removes a reorganised block and its transactions.
	pub async fn delete_block(&self, block_number: u64) -> Result<()> {
		log::debug!(target: "tessera-sql", "deleting block #{block_number}");
		let mut tx = self.pool().begin().await?;
		sqlx::query("DELETE FROM \"transaction\" WHERE block_number = ?")
			.bind(block_number as i64)
			.execute(&mut *tx)
			.await?;
		sqlx::query("DELETE FROM block WHERE block_number = ?")
			.bind(block_number as i64)
			.execute(&mut *tx)
			.await?;
		tx.commit().await?;
		Ok(())
	}

	/// Refreshes the stored document of a block the chain still agrees on.
	pub async fn replace_document(&self, document: &BlockDocument) -> Result<()> {
		sqlx::query(
			"UPDATE block SET block_hash = ?, timestamp = ?, document = ? WHERE block_number = ?",
		)
		.bind(&document.block_hash)
		.bind(document.timestamp)
		.bind(serde_json::to_string(document)?)
		.bind(document.block_number as i64)
		.execute(self.pool())
		.await?;
		Ok(())
	}

	/// Persisted block numbers inside `[start, end)`, for the crawl cache.
	pub async fn block_numbers_in(&self, start: u64, end: u64) -> Result<Vec<u64>> {
		let rows = sqlx::query(
			"SELECT block_number FROM block WHERE ? <= block_number AND block_number < ?",
		)
		.bind(start as i64)
		.bind(end as i64)
		.fetch_all(self.pool())
		.await?;
		Ok(rows.iter().map(|row| row.get::<i64, _>(0) as u64).collect())
	}

	/// The next batch of blocks the chain may still reorganise, ascending
	/// from `resume_from`.
	pub async fn non_terminal_blocks(
		&self,
		resume_from: u64,
		limit: u32,
	) -> Result<Vec<StoredBlock>> {
		let rows = sqlx::query(
			"SELECT block_number, block_hash, json_extract(document, '$.status')
			FROM block
			WHERE block_number >= ?
				AND COALESCE(json_extract(document, '$.status'), '') NOT IN (?, ?)
			ORDER BY block_number
			LIMIT ?",
		)
		.bind(resume_from as i64)
		.bind(TERMINAL_BLOCK_STATUSES[0])
		.bind(TERMINAL_BLOCK_STATUSES[1])
		.bind(limit)
		.fetch_all(self.pool())
		.await?;
		Ok(rows
			.iter()
			.map(|row| StoredBlock {
				block_number: row.get::<i64, _>(0) as u64,
				block_hash: row.get(1),
				status: row.get(2),
			})
			.collect())
	}

	/// Count of persisted transactions of a block, for repair assertions.
	pub async fn transaction_count(&self, block_number: u64) -> Result<i64> {
		let count = sqlx::query_scalar(
			"SELECT COUNT(*) FROM \"transaction\" WHERE block_number = ?",
		)
		.bind(block_number as i64)
		.fetch_one(self.pool())
		.await?;
		Ok(count)
	}
}

fn unique_violation(error: &sqlx::Error) -> bool {
	matches!(
		error,
		sqlx::Error::Database(db) if db.kind() == sqlx::error::ErrorKind::UniqueViolation,
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support;

	pub(crate) fn block_document(number: u64, hash: &str, transactions: usize) -> BlockDocument {
		let mut value = serde_json::json!({
			"block_number": number,
			"block_hash": hash,
			"timestamp": 1_650_000_000 + number,
			"status": "ACCEPTED_ON_L2",
			"transactions": [],
			"transaction_receipts": [],
		});
		for index in 0..transactions {
			value["transactions"].as_array_mut().unwrap().push(serde_json::json!({
				"transaction_hash": format!("0x{number}{index}f"),
				"type": "INVOKE_FUNCTION",
				"contract_address": "0x1234",
				"entry_point_selector": "0x9",
				"calldata": ["7", "11"],
			}));
			value["transaction_receipts"].as_array_mut().unwrap().push(serde_json::json!({
				"transaction_hash": format!("0x{number}{index}f"),
				"transaction_index": index,
			}));
		}
		serde_json::from_value(value).unwrap()
	}

	#[tokio::test]
	async fn put_block_persists_block_transactions_and_contracts() {
		let tmp = tempfile::tempdir().expect("create a temporary directory");
		let backend = test_support::backend(&tmp).await;

		backend.put_block(&block_document(5, "0x5a", 2)).await.expect("insert block");

		assert_eq!(backend.transaction_count(5).await.unwrap(), 2);
		let contracts: i64 =
			sqlx::query_scalar("SELECT COUNT(*) FROM stark_contract")
				.fetch_one(backend.pool())
				.await
				.unwrap();
		assert_eq!(contracts, 1);

		// Every transaction row points at its persisted parent block.
		let orphans: i64 = sqlx::query_scalar(
			"SELECT COUNT(*) FROM \"transaction\" t
			LEFT JOIN block b ON b.block_number = t.block_number
			WHERE b.block_number IS NULL",
		)
		.fetch_one(backend.pool())
		.await
		.unwrap();
		assert_eq!(orphans, 0);
	}

	#[tokio::test]
	async fn duplicate_blocks_conflict_without_partial_commit() {
		let tmp = tempfile::tempdir().expect("create a temporary directory");
		let backend = test_support::backend(&tmp).await;

		backend.put_block(&block_document(5, "0x5a", 1)).await.expect("insert block");
		let error = backend
			.put_block(&block_document(5, "0x5b", 2))
			.await
			.expect_err("conflicting insert");
		assert!(matches!(error, Error::DuplicateBlock(5)));
		assert!(error.is_unique_violation());
		// The losing attempt left no transactions behind.
		assert_eq!(backend.transaction_count(5).await.unwrap(), 1);
	}

	#[tokio::test]
	async fn receipt_transaction_disagreement_is_rejected() {
		let tmp = tempfile::tempdir().expect("create a temporary directory");
		let backend = test_support::backend(&tmp).await;

		let mut document = block_document(6, "0x6a", 1);
		document.transaction_receipts[0].transaction_hash = "0xffff".to_owned();
		let error = backend.put_block(&document).await.expect_err("mismatched receipt");
		assert!(matches!(error, Error::ReceiptMismatch { block: 6, index: 0 }));
		// Nothing committed, so a later correct crawl succeeds.
		backend.put_block(&block_document(6, "0x6a", 1)).await.expect("clean retry");
	}

	#[tokio::test]
	async fn delete_block_cascades_to_transactions() {
		let tmp = tempfile::tempdir().expect("create a temporary directory");
		let backend = test_support::backend(&tmp).await;

		backend.put_block(&block_document(7, "0x7a", 3)).await.expect("insert block");
		backend.delete_block(7).await.expect("delete block");

		assert_eq!(backend.transaction_count(7).await.unwrap(), 0);
		assert!(backend.block_numbers_in(0, 100).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn non_terminal_blocks_skip_finalised_ones() {
		let tmp = tempfile::tempdir().expect("create a temporary directory");
		let backend = test_support::backend(&tmp).await;

		let mut finalised = block_document(1, "0x1a", 0);
		finalised.status = Some("ACCEPTED_ON_L1".to_owned());
		backend.put_block(&finalised).await.unwrap();
		let mut legacy = block_document(2, "0x2a", 0);
		legacy.status = Some("ACCEPTED_ONCHAIN".to_owned());
		backend.put_block(&legacy).await.unwrap();
		backend.put_block(&block_document(3, "0x3a", 0)).await.unwrap();
		backend.put_block(&block_document(4, "0x4a", 0)).await.unwrap();

		let pending = backend.non_terminal_blocks(0, 20).await.unwrap();
		assert_eq!(
			pending,
			[
				StoredBlock {
					block_number: 3,
					block_hash: "0x3a".to_owned(),
					status: Some("ACCEPTED_ON_L2".to_owned()),
				},
				StoredBlock {
					block_number: 4,
					block_hash: "0x4a".to_owned(),
					status: Some("ACCEPTED_ON_L2".to_owned()),
				},
			],
		);
		// Resuming past an erroring id narrows the batch.
		assert_eq!(backend.non_terminal_blocks(4, 20).await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn replace_document_refreshes_in_place() {
		let tmp = tempfile::tempdir().expect("create a temporary directory");
		let backend = test_support::backend(&tmp).await;

		backend.put_block(&block_document(9, "0x9a", 0)).await.unwrap();
		let mut refreshed = block_document(9, "0x9a", 0);
		refreshed.status = Some("ACCEPTED_ON_L1".to_owned());
		backend.replace_document(&refreshed).await.unwrap();

		assert!(backend.non_terminal_blocks(0, 20).await.unwrap().is_empty());
	}
}
