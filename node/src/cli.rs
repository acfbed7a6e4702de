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

/// The off-chain indexer and relay of the exchange.
#[derive(Debug, clap::Parser)]
#[command(name = "tessera", version, about)]
pub struct Cli {
	#[command(subcommand)]
	pub subcommand: Subcommand,

	#[command(flatten)]
	pub config: Config,
}

/// Service configuration; deployments drive it through the environment.
#[derive(Debug, clap::Args)]
pub struct Config {
	/// Read endpoint of the L2 feeder gateway.
	#[arg(long, env = "FEEDER_GATEWAY_URL")]
	pub feeder_gateway_url: String,

	/// Database the indexer owns, e.g. `sqlite:///var/lib/tessera.db3`.
	#[arg(long, env = "ASYNC_DATABASE_URL")]
	pub database_url: String,

	/// Ethereum JSON-RPC endpoint backing the ERC facades.
	#[arg(long, env = "ETHEREUM_RPC_URL", default_value = "http://localhost:8545")]
	pub ethereum_rpc_url: String,

	/// Seconds to back off when the chain or a dependency is not ready.
	#[arg(long, default_value = "15")]
	pub cooldown: u64,
}

#[derive(Debug, clap::Subcommand)]
pub enum Subcommand {
	/// Mirror the chain into the database.
	Crawl(CrawlCmd),

	/// Replay one exchange contract into the semantic model.
	Interpret(InterpretCmd),
}

#[derive(Debug, clap::Args)]
pub struct CrawlCmd {
	/// Crawl history at and before this block hash instead of following
	/// the live tip.
	#[arg(long)]
	pub thru: Option<String>,

	#[command(subcommand)]
	pub subcommand: Option<CrawlSubcommand>,
}

#[derive(Debug, clap::Subcommand)]
pub enum CrawlSubcommand {
	/// Reconcile persisted blocks the chain may have reorganised.
	Purge(PurgeCmd),
}

#[derive(Debug, clap::Args)]
pub struct PurgeCmd {
	/// Report what would change without touching the database.
	#[arg(long)]
	pub dry: bool,
}

#[derive(Debug, clap::Args)]
pub struct InterpretCmd {
	/// Address of the exchange contract, as the gateway spells it.
	pub contract_address: String,
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::Parser;

	const BASE: [&str; 5] = [
		"tessera",
		"--feeder-gateway-url",
		"http://gateway.example/feeder_gateway",
		"--database-url",
		"sqlite://tessera.db3",
	];

	fn parse(tail: &[&str]) -> Cli {
		let args: Vec<&str> = BASE.iter().chain(tail).copied().collect();
		Cli::parse_from(args)
	}

	#[test]
	fn parses_a_bounded_crawl() {
		let cli = parse(&["crawl", "--thru", "0x7ad"]);
		match cli.subcommand {
			Subcommand::Crawl(cmd) => {
				assert_eq!(cmd.thru.as_deref(), Some("0x7ad"));
				assert!(cmd.subcommand.is_none());
			}
			other => panic!("unexpected subcommand {other:?}"),
		}
		assert_eq!(cli.config.cooldown, 15);
	}

	#[test]
	fn parses_a_dry_purge() {
		let cli = parse(&["crawl", "purge", "--dry"]);
		match cli.subcommand {
			Subcommand::Crawl(CrawlCmd {
				subcommand: Some(CrawlSubcommand::Purge(purge)),
				..
			}) => assert!(purge.dry),
			other => panic!("unexpected subcommand {other:?}"),
		}
	}

	#[test]
	fn parses_an_interpret_target() {
		let cli = parse(&["interpret", "0x900d"]);
		match cli.subcommand {
			Subcommand::Interpret(cmd) => assert_eq!(cmd.contract_address, "0x900d"),
			other => panic!("unexpected subcommand {other:?}"),
		}
	}

	#[test]
	fn missing_configuration_is_a_startup_error() {
		assert!(Cli::try_parse_from(["tessera", "crawl"]).is_err());
	}
}
