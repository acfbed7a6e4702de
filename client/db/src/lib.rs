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

//! SQLite persistence.
//!
//! Two families of tables share one database. The raw mirror (`block`,
//! `"transaction"`, `stark_contract`) is written exclusively by the crawler;
//! the semantic model (`account`, `blueprint`, `token_contract`, `token`,
//! `limit_order`) is written exclusively by the interpreter, inside one
//! transaction per block. Both sides meet only at `stark_contract`, which is
//! find-or-insert under its unique address and therefore safe from either.

pub mod models;
pub mod semantic;

mod raw;

use std::str::FromStr;

use sqlx::{
	sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
	ConnectOptions,
};
use thiserror::Error;

pub use self::models::{
	AccountRow, BlueprintRow, LimitOrderRow, OrderState, StarkContractRow, StoredBlock,
	TokenContractRow, TokenRow, TransactionRow,
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Database(#[from] sqlx::Error),
	#[error("undecodable stored document: {0}")]
	Document(#[from] serde_json::Error),
	#[error("block {0} is already persisted")]
	DuplicateBlock(u64),
	#[error("receipt {index} of block {block} names a different transaction")]
	ReceiptMismatch { block: u64, index: i64 },
	#[error("token contract {address} re-registered with different terms")]
	RegistrationMismatch { address: String },
	#[error("token {token_id} of {contract} moved by a non-owner")]
	OwnerMismatch { contract: String, token_id: String },
	#[error("no {0} row for {1}")]
	Missing(&'static str, String),
}

impl Error {
	/// Unique-constraint conflicts mark writes that already happened; the
	/// callers that care treat them as such rather than as corruption.
	pub fn is_unique_violation(&self) -> bool {
		match self {
			Error::DuplicateBlock(_) => true,
			Error::Database(sqlx::Error::Database(db)) => {
				db.kind() == sqlx::error::ErrorKind::UniqueViolation
			}
			_ => false,
		}
	}
}

pub struct SqliteBackendConfig<'a> {
	pub path: &'a str,
	pub create_if_missing: bool,
}

pub enum BackendConfig<'a> {
	Sqlite(SqliteBackendConfig<'a>),
}

#[derive(Clone)]
pub struct Backend {
	pool: SqlitePool,
}

impl Backend {
	pub async fn new(config: BackendConfig<'_>, pool_size: u32) -> Result<Self> {
		let pool = SqlitePoolOptions::new()
			.max_connections(pool_size)
			.connect_lazy_with(Self::connect_options(&config)?.disable_statement_logging());
		Self::create_if_not_exists(&pool).await?;
		Ok(Self { pool })
	}

	fn connect_options(config: &BackendConfig) -> Result<SqliteConnectOptions> {
		match config {
			BackendConfig::Sqlite(config) => {
				let options = SqliteConnectOptions::from_str(config.path)?
					.create_if_missing(config.create_if_missing);
				Ok(options)
			}
		}
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	async fn create_if_not_exists(pool: &SqlitePool) -> Result<()> {
		sqlx::query(
			"BEGIN;
			CREATE TABLE IF NOT EXISTS block (
				block_number INTEGER PRIMARY KEY,
				block_hash TEXT NOT NULL,
				timestamp INTEGER NOT NULL,
				document TEXT NOT NULL,
				UNIQUE (
					block_hash
				)
			);
			CREATE TABLE IF NOT EXISTS stark_contract (
				id INTEGER PRIMARY KEY,
				address TEXT NOT NULL,
				block_counter INTEGER,
				UNIQUE (
					address
				)
			);
			CREATE TABLE IF NOT EXISTS \"transaction\" (
				id INTEGER PRIMARY KEY,
				hash TEXT NOT NULL,
				block_number INTEGER NOT NULL REFERENCES block (block_number),
				transaction_index INTEGER NOT NULL,
				type TEXT NOT NULL,
				contract_id INTEGER NOT NULL REFERENCES stark_contract (id),
				entry_point_selector TEXT,
				entry_point_type TEXT,
				calldata TEXT NOT NULL,
				UNIQUE (
					hash
				)
			);
			CREATE TABLE IF NOT EXISTS account (
				id INTEGER PRIMARY KEY,
				stark_key TEXT NOT NULL,
				address TEXT,
				UNIQUE (
					stark_key
				)
			);
			CREATE TABLE IF NOT EXISTS blueprint (
				id INTEGER PRIMARY KEY,
				permanent_id TEXT,
				minter_id INTEGER NOT NULL REFERENCES account (id),
				expire_at INTEGER,
				UNIQUE (
					permanent_id
				)
			);
			CREATE TABLE IF NOT EXISTS token_contract (
				id INTEGER PRIMARY KEY,
				address TEXT NOT NULL,
				fungible INTEGER NOT NULL,
				blueprint_id INTEGER REFERENCES blueprint (id),
				name TEXT,
				symbol TEXT,
				decimals INTEGER,
				base_uri TEXT,
				image TEXT,
				UNIQUE (
					address
				),
				UNIQUE (
					blueprint_id
				)
			);
			CREATE TABLE IF NOT EXISTS token (
				id INTEGER PRIMARY KEY,
				contract_id INTEGER NOT NULL REFERENCES token_contract (id),
				token_id TEXT NOT NULL,
				owner_id INTEGER REFERENCES account (id),
				latest_tx_id INTEGER REFERENCES \"transaction\" (id),
				ask_id INTEGER REFERENCES limit_order (id),
				nonce INTEGER NOT NULL DEFAULT 0,
				name TEXT,
				description TEXT,
				image TEXT,
				token_uri TEXT,
				asset_metadata TEXT,
				UNIQUE (
					contract_id,
					token_id
				)
			);
			CREATE TABLE IF NOT EXISTS limit_order (
				id INTEGER PRIMARY KEY,
				order_id TEXT NOT NULL,
				user_id INTEGER NOT NULL REFERENCES account (id),
				bid INTEGER NOT NULL,
				token_id INTEGER NOT NULL REFERENCES token (id),
				quote_contract_id INTEGER NOT NULL REFERENCES token_contract (id),
				quote_amount TEXT NOT NULL,
				tx_id INTEGER NOT NULL REFERENCES \"transaction\" (id),
				closed_tx_id INTEGER REFERENCES \"transaction\" (id),
				fulfilled INTEGER,
				UNIQUE (
					order_id
				)
			);
			CREATE INDEX IF NOT EXISTS transaction_block_idx ON \"transaction\" (
				block_number,
				transaction_index
			);
			CREATE INDEX IF NOT EXISTS transaction_contract_idx ON \"transaction\" (
				contract_id,
				block_number
			);
			CREATE INDEX IF NOT EXISTS token_owner_idx ON token (
				owner_id
			);
			COMMIT;",
		)
		.execute(pool)
		.await?;
		Ok(())
	}
}

#[cfg(test)]
pub(crate) mod test_support {
	use super::*;

	/// A throwaway file-backed backend; in-memory SQLite would give every
	/// pooled connection its own database.
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
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn schema_bootstrap_is_idempotent() {
		let tmp = tempfile::tempdir().expect("create a temporary directory");
		let backend = test_support::backend(&tmp).await;
		// A second bootstrap over the same file must be a no-op.
		Backend::create_if_not_exists(backend.pool()).await.expect("re-run ddl");

		let tables: Vec<String> = sqlx::query_scalar(
			"SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
		)
		.fetch_all(backend.pool())
		.await
		.expect("list tables");
		assert_eq!(
			tables,
			[
				"account",
				"block",
				"blueprint",
				"limit_order",
				"stark_contract",
				"token",
				"token_contract",
				"transaction",
			],
		);
	}
}
