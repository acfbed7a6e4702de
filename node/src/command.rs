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

use clap::Parser;
use thiserror::Error;

use tc_chain::FeederClient;
use tc_db::{Backend, BackendConfig, SqliteBackendConfig};
use tc_interpret::{EthereumFacade, HttpMetadataFetcher, InterpretWorker};
use tc_sync::{CrawlWorker, PurgeWorker};

use crate::cli::{Cli, CrawlSubcommand, Subcommand};

#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Database(#[from] tc_db::Error),
	#[error(transparent)]
	Sync(#[from] tc_sync::SyncError),
	#[error(transparent)]
	Interpret(#[from] tc_interpret::InterpretError),
}

pub async fn run() -> Result<(), Error> {
	let cli = Cli::parse();

	let backend = Backend::new(
		BackendConfig::Sqlite(SqliteBackendConfig {
			path: &cli.config.database_url,
			create_if_missing: true,
		}),
		4,
	)
	.await?;
	let client = Arc::new(FeederClient::new(cli.config.feeder_gateway_url.clone()));
	let cooldown = Duration::from_secs(cli.config.cooldown);

	match cli.subcommand {
		Subcommand::Crawl(cmd) => match cmd.subcommand {
			Some(CrawlSubcommand::Purge(purge)) => {
				let summary = PurgeWorker::new(client, backend, purge.dry).run().await?;
				log::info!(
					target: "tessera-sync",
					"purge finished: {} deleted, {} refreshed, {} unreachable{}",
					summary.deleted,
					summary.refreshed,
					summary.unreachable,
					if purge.dry { " (dry run)" } else { "" },
				);
				Ok(())
			}
			None => {
				let worker = CrawlWorker::new(client, backend, cooldown);
				worker.run(cmd.thru).await?;
				Ok(())
			}
		},
		Subcommand::Interpret(cmd) => {
			let facade = Arc::new(EthereumFacade::new(cli.config.ethereum_rpc_url.clone()));
			let fetcher = Arc::new(HttpMetadataFetcher::new());
			let worker = InterpretWorker::new(backend, facade, fetcher, cooldown);
			worker.run(&cmd.contract_address).await?;
			Ok(())
		}
	}
}
