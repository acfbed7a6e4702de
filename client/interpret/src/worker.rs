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

use std::{sync::Arc, time::Duration};

use futures_timer::Delay;
use sqlx::SqliteConnection;

use tc_db::{
	models::{TokenContractRow, TokenRow, TransactionRow},
	semantic, Backend, Error as DbError, OrderState,
};
use tp_crypto::{to_checksum_address, ZERO_ADDRESS};
use tp_gateway::{to_dec_string, Felt};

use crate::{
	dispatch::{dispatch, Call},
	facade::{ContractFacade, FacadeError, MetadataFetcher, TokenMetadata},
	InterpretError,
};

/// `kind` calldata value of non-fungible collections.
const KIND_ERC721: u64 = 2;

/// Replays one exchange contract's transactions into the semantic model.
pub struct InterpretWorker<F, M> {
	backend: Backend,
	facade: Arc<F>,
	fetcher: Arc<M>,
	cooldown: Duration,
}

impl<F: ContractFacade, M: MetadataFetcher> InterpretWorker<F, M> {
	pub fn new(backend: Backend, facade: Arc<F>, fetcher: Arc<M>, cooldown: Duration) -> Self {
		Self {
			backend,
			facade,
			fetcher,
			cooldown,
		}
	}

	/// Interprets forever. Missing dependencies (uncrawled blocks, a not
	/// yet observed contract) and aborted blocks both back off and retry;
	/// the cursor only moves on commit.
	pub async fn run(self, contract_address: &str) -> Result<(), InterpretError> {
		self.bootstrap_ether().await?;
		loop {
			match self.tick(contract_address).await {
				Ok(true) => {}
				Ok(false) => Delay::new(self.cooldown).await,
				Err(error) => {
					log::error!(
						target: "tessera-interpret",
						"block aborted, will retry: {error}",
					);
					Delay::new(self.cooldown).await;
				}
			}
		}
	}

	/// The store's stand-in for Ether, so deposits quoted in it resolve.
	async fn bootstrap_ether(&self) -> Result<(), InterpretError> {
		let mut conn = self.backend.pool().acquire().await.map_err(DbError::from)?;
		if semantic::token_contract_by_address(&mut conn, ZERO_ADDRESS).await?.is_none() {
			match semantic::insert_token_contract(&mut conn, ZERO_ADDRESS, true, None).await {
				Err(error) if error.is_unique_violation() => {}
				other => {
					let contract = other?;
					semantic::set_token_contract_identity(
						&mut conn, contract.id, "Ether", "ETH", 18,
					)
					.await?;
				}
			}
		}
		Ok(())
	}

	/// Interprets the cursor block, if it exists, inside one transaction.
	/// Returns whether the cursor advanced.
	pub async fn tick(&self, contract_address: &str) -> Result<bool, InterpretError> {
		let mut tx = self.backend.pool().begin().await.map_err(DbError::from)?;

		let Some(contract) =
			semantic::stark_contract_by_address(&mut tx, contract_address).await?
		else {
			log::debug!(
				target: "tessera-interpret",
				"contract {contract_address} not observed yet",
			);
			return Ok(false);
		};

		let block_counter = match contract.block_counter {
			Some(counter) => counter,
			// The cursor starts at the block that deployed the contract.
			None => match semantic::deploy_transaction(&mut tx, contract.id).await? {
				Some(deploy) => deploy.block_number,
				None => {
					log::debug!(
						target: "tessera-interpret",
						"DEPLOY of {contract_address} not crawled yet",
					);
					return Ok(false);
				}
			},
		};

		if !semantic::block_exists(&mut tx, block_counter).await? {
			log::debug!(
				target: "tessera-interpret",
				"block #{block_counter} not crawled yet",
			);
			return Ok(false);
		}

		for transaction in
			semantic::transactions_in_block(&mut tx, contract.id, block_counter).await?
		{
			self.execute(&mut tx, &transaction).await?;
		}

		semantic::set_block_counter(&mut tx, contract.id, block_counter + 1).await?;
		tx.commit().await.map_err(DbError::from)?;
		Ok(true)
	}

	async fn execute(
		&self,
		conn: &mut SqliteConnection,
		transaction: &TransactionRow,
	) -> Result<(), InterpretError> {
		let Some(selector) = transaction.entry_point_selector.as_deref() else {
			return Ok(());
		};
		let Some(entry_point) = dispatch(selector) else {
			return Ok(());
		};
		log::debug!(
			target: "tessera-interpret",
			"interpret(tx={}, entry_point={})",
			transaction.hash,
			entry_point.name(),
		);

		match Call::decode(entry_point, &transaction.calldata)? {
			Call::RegisterContract {
				contract,
				kind,
				minter,
			} => self.register_contract(conn, &contract, &kind, &minter).await,
			Call::RegisterClient { user, address } => {
				self.lift_account(conn, &user, Some(to_checksum_address(&address))).await?;
				Ok(())
			}
			Call::Mint {
				user,
				token_id,
				contract,
			} => {
				if let Some(token) = self.lift_token(conn, &token_id, &contract).await? {
					let owner = self.lift_account(conn, &user, None).await?;
					semantic::set_token_owner(conn, token.id, Some(owner.id), transaction.id)
						.await?;
				}
				Ok(())
			}
			Call::Withdraw {
				amount_or_id,
				contract,
			} => {
				// Fungible withdrawals only move balances held on-chain.
				if let Some(token) = self.lift_token(conn, &amount_or_id, &contract).await? {
					semantic::set_token_owner(conn, token.id, None, transaction.id).await?;
				}
				Ok(())
			}
			Call::Deposit {
				user,
				amount_or_id,
				contract,
			} => {
				let account = self.lift_account(conn, &user, None).await?;
				if let Some(token) = self.lift_token(conn, &amount_or_id, &contract).await? {
					semantic::set_token_owner(conn, token.id, Some(account.id), transaction.id)
						.await?;
				}
				Ok(())
			}
			Call::Transfer {
				from,
				to,
				amount_or_id,
				contract,
			} => {
				let from_account = self.lift_account(conn, &from, None).await?;
				let to_account = self.lift_account(conn, &to, None).await?;
				if let Some(token) = self.lift_token(conn, &amount_or_id, &contract).await? {
					if token.owner_id != Some(from_account.id) {
						return Err(DbError::OwnerMismatch {
							contract: to_checksum_address(&contract),
							token_id: token.token_id,
						}
						.into());
					}
					semantic::set_token_owner(conn, token.id, Some(to_account.id), transaction.id)
						.await?;
				}
				Ok(())
			}
			Call::CreateOrder {
				order_id,
				user,
				bid,
				base_contract,
				base_token_id,
				quote_contract,
				quote_amount,
			} => {
				self.create_order(
					conn,
					transaction,
					&order_id,
					&user,
					&bid,
					&base_contract,
					&base_token_id,
					&quote_contract,
					&quote_amount,
				)
				.await
			}
			Call::FulfillOrder { order_id, user } => {
				let order_id = to_dec_string(&order_id);
				let order = semantic::limit_order_by_order_id(conn, &order_id)
					.await?
					.ok_or_else(|| DbError::Missing("limit_order", order_id))?;
				semantic::close_limit_order(conn, order.id, transaction.id, OrderState::Fulfilled)
					.await?;

				// A fulfilled bid hands the token to the order's creator;
				// a fulfilled ask hands it to whoever filled it.
				let owner = if order.bid {
					order.user_id
				} else {
					self.lift_account(conn, &user, None).await?.id
				};
				semantic::set_token_owner(conn, order.token_id, Some(owner), transaction.id)
					.await?;
				semantic::set_token_ask(conn, order.token_id, None).await?;
				Ok(())
			}
			Call::CancelOrder { order_id } => {
				let order_id = to_dec_string(&order_id);
				let order = semantic::limit_order_by_order_id(conn, &order_id)
					.await?
					.ok_or_else(|| DbError::Missing("limit_order", order_id))?;
				semantic::close_limit_order(conn, order.id, transaction.id, OrderState::Cancelled)
					.await?;
				semantic::set_token_ask(conn, order.token_id, None).await?;
				Ok(())
			}
		}
	}

	async fn register_contract(
		&self,
		conn: &mut SqliteConnection,
		contract: &Felt,
		kind: &Felt,
		minter: &Felt,
	) -> Result<(), InterpretError> {
		let address = to_checksum_address(contract);
		let fungible = *kind != Felt::from(KIND_ERC721);
		let minter_key = to_dec_string(minter);

		match semantic::token_contract_by_address(conn, &address).await? {
			Some(existing) => {
				// Re-registration must agree with the original terms.
				let existing_minter = match existing.blueprint_id {
					Some(blueprint_id) => {
						semantic::blueprint_minter_key(conn, blueprint_id).await?
					}
					None => None,
				};
				if existing.fungible != fungible || existing_minter.as_deref() != Some(&minter_key)
				{
					return Err(DbError::RegistrationMismatch { address }.into());
				}
				Ok(())
			}
			None => {
				let minter = self.lift_account_key(conn, &minter_key).await?;
				let blueprint = semantic::insert_blueprint(conn, minter.id, None, None).await?;
				let created =
					semantic::insert_token_contract(conn, &address, fungible, Some(blueprint.id))
						.await?;
				self.lift_contract(conn, &created).await?;
				Ok(())
			}
		}
	}

	#[allow(clippy::too_many_arguments)]
	async fn create_order(
		&self,
		conn: &mut SqliteConnection,
		transaction: &TransactionRow,
		order_id: &Felt,
		user: &Felt,
		bid: &Felt,
		base_contract: &Felt,
		base_token_id: &Felt,
		quote_contract: &Felt,
		quote_amount: &Felt,
	) -> Result<(), InterpretError> {
		let account = self.lift_account(conn, user, None).await?;
		let token = self
			.lift_token(conn, base_token_id, base_contract)
			.await?
			.ok_or_else(|| DbError::Missing("token", to_dec_string(base_token_id)))?;
		let quote_address = to_checksum_address(quote_contract);
		let quote = semantic::token_contract_by_address(conn, &quote_address)
			.await?
			.ok_or_else(|| DbError::Missing("token_contract", quote_address))?;

		let order_pk = semantic::insert_limit_order(
			conn,
			&semantic::NewLimitOrder {
				order_id: &to_dec_string(order_id),
				user_id: account.id,
				bid: *bid == Felt::ONE,
				token_id: token.id,
				quote_contract_id: quote.id,
				quote_amount: &to_dec_string(quote_amount),
				tx_id: transaction.id,
			},
		)
		.await?;
		// The cyclic ask link is backfilled after the order row exists,
		// inside the same block transaction.
		semantic::set_token_ask(conn, token.id, Some(order_pk)).await?;
		Ok(())
	}

	async fn lift_account(
		&self,
		conn: &mut SqliteConnection,
		user: &Felt,
		address: Option<String>,
	) -> Result<tc_db::AccountRow, InterpretError> {
		Ok(semantic::find_or_insert_account(conn, &to_dec_string(user), address.as_deref())
			.await?)
	}

	async fn lift_account_key(
		&self,
		conn: &mut SqliteConnection,
		stark_key: &str,
	) -> Result<tc_db::AccountRow, InterpretError> {
		Ok(semantic::find_or_insert_account(conn, stark_key, None).await?)
	}

	/// Find-or-insert of a token, plus metadata enrichment. Fungible
	/// contracts have no token rows and lift to `None`.
	async fn lift_token(
		&self,
		conn: &mut SqliteConnection,
		token_id: &Felt,
		contract: &Felt,
	) -> Result<Option<TokenRow>, InterpretError> {
		let address = to_checksum_address(contract);
		let token_contract = semantic::token_contract_by_address(conn, &address)
			.await?
			.ok_or_else(|| DbError::Missing("token_contract", address))?;
		if token_contract.fungible {
			return Ok(None);
		}

		let token_id_dec = to_dec_string(token_id);
		let token = match semantic::find_token(conn, token_contract.id, &token_id_dec).await? {
			Some(token) => token,
			None => semantic::insert_token(conn, token_contract.id, &token_id_dec).await?,
		};

		// Enrichment failures never fail the lift; the token stays bare.
		match self.resolve_token_uri(&token_contract, token_id).await {
			Ok(token_uri) => {
				semantic::set_token_uri(conn, token.id, &token_uri).await?;
				match self.resolve_metadata(&token_uri).await {
					Ok((metadata, raw)) => {
						semantic::set_token_metadata(
							conn,
							token.id,
							&metadata.name,
							&metadata.description,
							&metadata.image,
							&raw.to_string(),
						)
						.await?;
					}
					Err(error) => {
						log::debug!(
							target: "tessera-interpret",
							"token {token_uri} left unenriched: {error}",
						);
					}
				}
			}
			Err(error) => {
				log::debug!(
					target: "tessera-interpret",
					"no token uri for {token_id_dec}: {error}",
				);
			}
		}

		semantic::find_token(conn, token_contract.id, &token_id_dec)
			.await?
			.ok_or_else(|| DbError::Missing("token", token_id_dec).into())
			.map(Some)
	}

	async fn resolve_token_uri(
		&self,
		contract: &TokenContractRow,
		token_id: &Felt,
	) -> Result<String, FacadeError> {
		match contract.base_uri.as_deref() {
			Some(base_uri) => Ok(format!("{base_uri}{}", to_dec_string(token_id))),
			None => self.facade.token_uri(&contract.address, token_id).await,
		}
	}

	async fn resolve_metadata(
		&self,
		token_uri: &str,
	) -> Result<(TokenMetadata, serde_json::Value), FacadeError> {
		let raw = self.fetcher.fetch(token_uri).await?;
		let metadata = TokenMetadata::validate(&raw)?;
		Ok((metadata, raw))
	}

	/// Name/symbol/decimals of a freshly registered collection. Ether is
	/// special-cased; facade failures leave the identity columns empty.
	async fn lift_contract(
		&self,
		conn: &mut SqliteConnection,
		contract: &TokenContractRow,
	) -> Result<(), InterpretError> {
		if contract.address == ZERO_ADDRESS {
			semantic::set_token_contract_identity(conn, contract.id, "Ether", "ETH", 18).await?;
			return Ok(());
		}
		match self.facade.identify(&contract.address, contract.fungible).await {
			Ok(identity) => {
				semantic::set_token_contract_identity(
					conn,
					contract.id,
					&identity.name,
					&identity.symbol,
					identity.decimals,
				)
				.await?;
			}
			Err(error) => {
				log::debug!(
					target: "tessera-interpret",
					"could not identify {}: {error}",
					contract.address,
				);
			}
		}
		Ok(())
	}
}
