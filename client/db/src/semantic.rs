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

//! Operations on the semantic model.
//!
//! Everything here takes a live connection rather than the pool: the
//! interpreter runs a whole block inside one transaction and these are its
//! building blocks. Find-or-insert is the only creation path for accounts,
//! contracts and tokens, so replays are idempotent by construction.

use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};

use crate::{
	models::{
		AccountRow, BlueprintRow, LimitOrderRow, OrderState, StarkContractRow, TokenContractRow,
		TokenRow, TransactionRow,
	},
	Error, Result,
};

pub async fn find_or_insert_stark_contract(
	conn: &mut SqliteConnection,
	address: &str,
) -> Result<StarkContractRow> {
	sqlx::query("INSERT OR IGNORE INTO stark_contract (address) VALUES (?)")
		.bind(address)
		.execute(&mut *conn)
		.await?;
	stark_contract_by_address(conn, address)
		.await?
		.ok_or_else(|| Error::Missing("stark_contract", address.to_owned()))
}

pub async fn stark_contract_by_address(
	conn: &mut SqliteConnection,
	address: &str,
) -> Result<Option<StarkContractRow>> {
	let row = sqlx::query(
		"SELECT id, address, block_counter FROM stark_contract WHERE address = ?",
	)
	.bind(address)
	.fetch_optional(conn)
	.await?;
	Ok(row.map(|row| StarkContractRow {
		id: row.get(0),
		address: row.get(1),
		block_counter: row.get(2),
	}))
}

/// Advances (or initialises) a contract's interpretation cursor.
pub async fn set_block_counter(
	conn: &mut SqliteConnection,
	contract_id: i64,
	block_counter: i64,
) -> Result<()> {
	sqlx::query("UPDATE stark_contract SET block_counter = ? WHERE id = ?")
		.bind(block_counter)
		.bind(contract_id)
		.execute(conn)
		.await?;
	Ok(())
}

fn transaction_row(row: &SqliteRow) -> Result<TransactionRow> {
	let calldata: String = row.get(8);
	Ok(TransactionRow {
		id: row.get(0),
		hash: row.get(1),
		block_number: row.get(2),
		transaction_index: row.get(3),
		transaction_type: row.get(4),
		contract_id: row.get(5),
		entry_point_selector: row.get(6),
		entry_point_type: row.get(7),
		calldata: serde_json::from_str(&calldata)?,
	})
}

const TRANSACTION_COLUMNS: &str = "id, hash, block_number, transaction_index, type, contract_id,
	entry_point_selector, entry_point_type, calldata";

/// The transaction that deployed a contract, if crawled yet.
pub async fn deploy_transaction(
	conn: &mut SqliteConnection,
	contract_id: i64,
) -> Result<Option<TransactionRow>> {
	let row = sqlx::query(&format!(
		"SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
		WHERE contract_id = ? AND type = 'DEPLOY'",
	))
	.bind(contract_id)
	.fetch_optional(conn)
	.await?;
	row.as_ref().map(transaction_row).transpose()
}

/// A contract's transactions of one block, in intra-block order.
pub async fn transactions_in_block(
	conn: &mut SqliteConnection,
	contract_id: i64,
	block_number: i64,
) -> Result<Vec<TransactionRow>> {
	let rows = sqlx::query(&format!(
		"SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
		WHERE contract_id = ? AND block_number = ?
		ORDER BY transaction_index",
	))
	.bind(contract_id)
	.bind(block_number)
	.fetch_all(conn)
	.await?;
	rows.iter().map(transaction_row).collect()
}

pub async fn block_exists(conn: &mut SqliteConnection, block_number: i64) -> Result<bool> {
	let row = sqlx::query("SELECT block_number FROM block WHERE block_number = ?")
		.bind(block_number)
		.fetch_optional(conn)
		.await?;
	Ok(row.is_some())
}

fn account_row(row: &SqliteRow) -> AccountRow {
	AccountRow {
		id: row.get(0),
		stark_key: row.get(1),
		address: row.get(2),
	}
}

/// Find-or-insert by stark key; when an address is supplied it overwrites
/// the stored one. Callers hand in checksummed addresses.
pub async fn find_or_insert_account(
	conn: &mut SqliteConnection,
	stark_key: &str,
	address: Option<&str>,
) -> Result<AccountRow> {
	sqlx::query("INSERT OR IGNORE INTO account (stark_key) VALUES (?)")
		.bind(stark_key)
		.execute(&mut *conn)
		.await?;
	if let Some(address) = address {
		sqlx::query("UPDATE account SET address = ? WHERE stark_key = ?")
			.bind(address)
			.bind(stark_key)
			.execute(&mut *conn)
			.await?;
	}
	let row = sqlx::query("SELECT id, stark_key, address FROM account WHERE stark_key = ?")
		.bind(stark_key)
		.fetch_optional(conn)
		.await?
		.ok_or_else(|| Error::Missing("account", stark_key.to_owned()))?;
	Ok(account_row(&row))
}

fn token_contract_row(row: &SqliteRow) -> TokenContractRow {
	TokenContractRow {
		id: row.get(0),
		address: row.get(1),
		fungible: row.get(2),
		blueprint_id: row.get(3),
		name: row.get(4),
		symbol: row.get(5),
		decimals: row.get(6),
		base_uri: row.get(7),
		image: row.get(8),
	}
}

const TOKEN_CONTRACT_COLUMNS: &str =
	"id, address, fungible, blueprint_id, name, symbol, decimals, base_uri, image";

pub async fn token_contract_by_address(
	conn: &mut SqliteConnection,
	address: &str,
) -> Result<Option<TokenContractRow>> {
	let row = sqlx::query(&format!(
		"SELECT {TOKEN_CONTRACT_COLUMNS} FROM token_contract WHERE address = ?",
	))
	.bind(address)
	.fetch_optional(conn)
	.await?;
	Ok(row.as_ref().map(token_contract_row))
}

pub async fn insert_blueprint(
	conn: &mut SqliteConnection,
	minter_id: i64,
	permanent_id: Option<&str>,
	expire_at: Option<i64>,
) -> Result<BlueprintRow> {
	let result = sqlx::query(
		"INSERT INTO blueprint (permanent_id, minter_id, expire_at) VALUES (?, ?, ?)",
	)
	.bind(permanent_id)
	.bind(minter_id)
	.bind(expire_at)
	.execute(conn)
	.await?;
	Ok(BlueprintRow {
		id: result.last_insert_rowid(),
		permanent_id: permanent_id.map(str::to_owned),
		minter_id,
		expire_at,
	})
}

/// Stark key of the account a blueprint authorises to mint.
pub async fn blueprint_minter_key(
	conn: &mut SqliteConnection,
	blueprint_id: i64,
) -> Result<Option<String>> {
	let row = sqlx::query(
		"SELECT a.stark_key FROM blueprint b
		JOIN account a ON a.id = b.minter_id
		WHERE b.id = ?",
	)
	.bind(blueprint_id)
	.fetch_optional(conn)
	.await?;
	Ok(row.map(|row| row.get(0)))
}

/// Registers a token contract. The blueprint link is 1:1, enforced by the
/// unique constraint on `blueprint_id`.
pub async fn insert_token_contract(
	conn: &mut SqliteConnection,
	address: &str,
	fungible: bool,
	blueprint_id: Option<i64>,
) -> Result<TokenContractRow> {
	sqlx::query("INSERT INTO token_contract (address, fungible, blueprint_id) VALUES (?, ?, ?)")
		.bind(address)
		.bind(fungible)
		.bind(blueprint_id)
		.execute(&mut *conn)
		.await?;
	token_contract_by_address(conn, address)
		.await?
		.ok_or_else(|| Error::Missing("token_contract", address.to_owned()))
}

/// Stores the on-chain identity read through the ERC facades.
pub async fn set_token_contract_identity(
	conn: &mut SqliteConnection,
	contract_id: i64,
	name: &str,
	symbol: &str,
	decimals: i64,
) -> Result<()> {
	sqlx::query("UPDATE token_contract SET name = ?, symbol = ?, decimals = ? WHERE id = ?")
		.bind(name)
		.bind(symbol)
		.bind(decimals)
		.bind(contract_id)
		.execute(conn)
		.await?;
	Ok(())
}

fn token_row(row: &SqliteRow) -> TokenRow {
	TokenRow {
		id: row.get(0),
		contract_id: row.get(1),
		token_id: row.get(2),
		owner_id: row.get(3),
		latest_tx_id: row.get(4),
		ask_id: row.get(5),
		nonce: row.get(6),
		name: row.get(7),
		description: row.get(8),
		image: row.get(9),
		token_uri: row.get(10),
		asset_metadata: row.get(11),
	}
}

const TOKEN_COLUMNS: &str = "id, contract_id, token_id, owner_id, latest_tx_id, ask_id, nonce,
	name, description, image, token_uri, asset_metadata";

pub async fn find_token(
	conn: &mut SqliteConnection,
	contract_id: i64,
	token_id: &str,
) -> Result<Option<TokenRow>> {
	let row = sqlx::query(&format!(
		"SELECT {TOKEN_COLUMNS} FROM token WHERE contract_id = ? AND token_id = ?",
	))
	.bind(contract_id)
	.bind(token_id)
	.fetch_optional(conn)
	.await?;
	Ok(row.as_ref().map(token_row))
}

/// Creates a token row with no owner and no ask; the ask, when one appears,
/// is backfilled inside the same block transaction.
pub async fn insert_token(
	conn: &mut SqliteConnection,
	contract_id: i64,
	token_id: &str,
) -> Result<TokenRow> {
	sqlx::query("INSERT INTO token (contract_id, token_id, nonce) VALUES (?, ?, 0)")
		.bind(contract_id)
		.bind(token_id)
		.execute(&mut *conn)
		.await?;
	find_token(conn, contract_id, token_id)
		.await?
		.ok_or_else(|| Error::Missing("token", token_id.to_owned()))
}

pub async fn set_token_owner(
	conn: &mut SqliteConnection,
	token_pk: i64,
	owner_id: Option<i64>,
	latest_tx_id: i64,
) -> Result<()> {
	sqlx::query("UPDATE token SET owner_id = ?, latest_tx_id = ? WHERE id = ?")
		.bind(owner_id)
		.bind(latest_tx_id)
		.bind(token_pk)
		.execute(conn)
		.await?;
	Ok(())
}

pub async fn set_token_ask(
	conn: &mut SqliteConnection,
	token_pk: i64,
	ask_id: Option<i64>,
) -> Result<()> {
	sqlx::query("UPDATE token SET ask_id = ? WHERE id = ?")
		.bind(ask_id)
		.bind(token_pk)
		.execute(conn)
		.await?;
	Ok(())
}

pub async fn set_token_uri(
	conn: &mut SqliteConnection,
	token_pk: i64,
	token_uri: &str,
) -> Result<()> {
	sqlx::query("UPDATE token SET token_uri = ? WHERE id = ?")
		.bind(token_uri)
		.bind(token_pk)
		.execute(conn)
		.await?;
	Ok(())
}

/// Folds a validated metadata document into the token and bumps the
/// metadata nonce.
pub async fn set_token_metadata(
	conn: &mut SqliteConnection,
	token_pk: i64,
	name: &str,
	description: &str,
	image: &str,
	asset_metadata: &str,
) -> Result<()> {
	sqlx::query(
		"UPDATE token
		SET name = ?, description = ?, image = ?, asset_metadata = ?, nonce = nonce + 1
		WHERE id = ?",
	)
	.bind(name)
	.bind(description)
	.bind(image)
	.bind(asset_metadata)
	.bind(token_pk)
	.execute(conn)
	.await?;
	Ok(())
}

/// A limit order about to be opened.
#[derive(Clone, Debug)]
pub struct NewLimitOrder<'a> {
	pub order_id: &'a str,
	pub user_id: i64,
	pub bid: bool,
	pub token_id: i64,
	pub quote_contract_id: i64,
	pub quote_amount: &'a str,
	pub tx_id: i64,
}

pub async fn insert_limit_order(
	conn: &mut SqliteConnection,
	order: &NewLimitOrder<'_>,
) -> Result<i64> {
	let result = sqlx::query(
		"INSERT INTO limit_order (
			order_id, user_id, bid, token_id, quote_contract_id, quote_amount, tx_id)
		VALUES (?, ?, ?, ?, ?, ?, ?)",
	)
	.bind(order.order_id)
	.bind(order.user_id)
	.bind(order.bid)
	.bind(order.token_id)
	.bind(order.quote_contract_id)
	.bind(order.quote_amount)
	.bind(order.tx_id)
	.execute(conn)
	.await?;
	Ok(result.last_insert_rowid())
}

fn limit_order_row(row: &SqliteRow) -> LimitOrderRow {
	LimitOrderRow {
		id: row.get(0),
		order_id: row.get(1),
		user_id: row.get(2),
		bid: row.get(3),
		token_id: row.get(4),
		quote_contract_id: row.get(5),
		quote_amount: row.get(6),
		tx_id: row.get(7),
		closed_tx_id: row.get(8),
		fulfilled: row.get(9),
	}
}

pub async fn limit_order_by_order_id(
	conn: &mut SqliteConnection,
	order_id: &str,
) -> Result<Option<LimitOrderRow>> {
	let row = sqlx::query(
		"SELECT id, order_id, user_id, bid, token_id, quote_contract_id, quote_amount,
			tx_id, closed_tx_id, fulfilled
		FROM limit_order WHERE order_id = ?",
	)
	.bind(order_id)
	.fetch_optional(conn)
	.await?;
	Ok(row.as_ref().map(limit_order_row))
}

/// Closes an order as fulfilled or cancelled. `OrderState::New` is not a
/// closing state and leaves the row untouched.
pub async fn close_limit_order(
	conn: &mut SqliteConnection,
	order_pk: i64,
	closed_tx_id: i64,
	state: OrderState,
) -> Result<()> {
	let Some(fulfilled) = state.to_fulfilled() else {
		return Ok(());
	};
	sqlx::query("UPDATE limit_order SET closed_tx_id = ?, fulfilled = ? WHERE id = ?")
		.bind(closed_tx_id)
		.bind(fulfilled)
		.bind(order_pk)
		.execute(conn)
		.await?;
	Ok(())
}

pub async fn token_by_pk(conn: &mut SqliteConnection, token_pk: i64) -> Result<TokenRow> {
	let row = sqlx::query(&format!("SELECT {TOKEN_COLUMNS} FROM token WHERE id = ?"))
		.bind(token_pk)
		.fetch_optional(conn)
		.await?
		.ok_or_else(|| Error::Missing("token", token_pk.to_string()))?;
	Ok(token_row(&row))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support;

	#[tokio::test]
	async fn account_lift_is_idempotent_and_updates_address() {
		let tmp = tempfile::tempdir().expect("create a temporary directory");
		let backend = test_support::backend(&tmp).await;
		let mut conn = backend.pool().acquire().await.unwrap();

		let first = find_or_insert_account(&mut conn, "5050", None).await.unwrap();
		assert_eq!(first.address, None);
		let second = find_or_insert_account(
			&mut conn,
			"5050",
			Some("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"),
		)
		.await
		.unwrap();
		assert_eq!(second.id, first.id);
		assert_eq!(
			second.address.as_deref(),
			Some("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"),
		);
		// A later lift without an address keeps the stored one.
		let third = find_or_insert_account(&mut conn, "5050", None).await.unwrap();
		assert_eq!(third, second);
	}

	#[tokio::test]
	async fn blueprint_links_are_one_to_one() {
		let tmp = tempfile::tempdir().expect("create a temporary directory");
		let backend = test_support::backend(&tmp).await;
		let mut conn = backend.pool().acquire().await.unwrap();

		let minter = find_or_insert_account(&mut conn, "77", None).await.unwrap();
		let blueprint = insert_blueprint(&mut conn, minter.id, None, None).await.unwrap();
		insert_token_contract(&mut conn, "0xAAa0000000000000000000000000000000000001", false, Some(blueprint.id))
			.await
			.unwrap();

		let error = insert_token_contract(
			&mut conn,
			"0xAAa0000000000000000000000000000000000002",
			false,
			Some(blueprint.id),
		)
		.await
		.expect_err("second contract on one blueprint");
		assert!(error.is_unique_violation());

		assert_eq!(
			blueprint_minter_key(&mut conn, blueprint.id).await.unwrap().as_deref(),
			Some("77"),
		);
	}

	#[tokio::test]
	async fn token_ask_backfill_and_order_lifecycle() {
		let tmp = tempfile::tempdir().expect("create a temporary directory");
		let backend = test_support::backend(&tmp).await;
		let mut conn = backend.pool().acquire().await.unwrap();

		let user = find_or_insert_account(&mut conn, "11", None).await.unwrap();
		let nft = insert_token_contract(&mut conn, "0xAAa0000000000000000000000000000000000001", false, None)
			.await
			.unwrap();
		let quote = insert_token_contract(&mut conn, "0x0000000000000000000000000000000000000000", true, None)
			.await
			.unwrap();
		let token = insert_token(&mut conn, nft.id, "2").await.unwrap();
		assert_eq!(token.nonce, 0);
		assert_eq!(token.ask_id, None);

		let order_pk = insert_limit_order(
			&mut conn,
			&NewLimitOrder {
				order_id: "13",
				user_id: user.id,
				bid: true,
				token_id: token.id,
				quote_contract_id: quote.id,
				quote_amount: "1000",
				tx_id: 1,
			},
		)
		.await
		.unwrap();
		set_token_ask(&mut conn, token.id, Some(order_pk)).await.unwrap();

		let open = limit_order_by_order_id(&mut conn, "13").await.unwrap().unwrap();
		assert_eq!(open.state(), OrderState::New);
		assert_eq!(open.closed_tx_id, None);
		assert_eq!(token_by_pk(&mut conn, token.id).await.unwrap().ask_id, Some(order_pk));

		close_limit_order(&mut conn, order_pk, 2, OrderState::Fulfilled).await.unwrap();
		set_token_ask(&mut conn, token.id, None).await.unwrap();
		let closed = limit_order_by_order_id(&mut conn, "13").await.unwrap().unwrap();
		assert_eq!(closed.state(), OrderState::Fulfilled);
		assert_eq!(closed.closed_tx_id, Some(2));
		assert_eq!(token_by_pk(&mut conn, token.id).await.unwrap().ask_id, None);
	}

	#[tokio::test]
	async fn metadata_updates_bump_the_nonce() {
		let tmp = tempfile::tempdir().expect("create a temporary directory");
		let backend = test_support::backend(&tmp).await;
		let mut conn = backend.pool().acquire().await.unwrap();

		let nft = insert_token_contract(&mut conn, "0xAAa0000000000000000000000000000000000001", false, None)
			.await
			.unwrap();
		let token = insert_token(&mut conn, nft.id, "9").await.unwrap();

		set_token_uri(&mut conn, token.id, "https://nft.example/9").await.unwrap();
		set_token_metadata(&mut conn, token.id, "Nine", "The ninth", "ipfs://nine", "{}")
			.await
			.unwrap();
		set_token_metadata(&mut conn, token.id, "Nine", "The ninth", "ipfs://nine", "{}")
			.await
			.unwrap();

		let enriched = token_by_pk(&mut conn, token.id).await.unwrap();
		assert_eq!(enriched.nonce, 2);
		assert_eq!(enriched.name.as_deref(), Some("Nine"));
		assert_eq!(enriched.token_uri.as_deref(), Some("https://nft.example/9"));
	}
}
