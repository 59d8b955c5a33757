#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
use std::path::PathBuf;

use btree_index::{IndexReader, ReaderConfig};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "index-dump")]
#[command(about = "Print the B-tree indexes of a container file as JSON")]
struct Cli {
    /// Container file to read
    file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the entries of one V1 group node
    Group {
        #[arg(value_parser = parse_address)]
        address: u64,
    },

    /// List every symbol table address below a V1 group tree
    Symbols {
        #[arg(value_parser = parse_address)]
        address: u64,
    },

    /// List the chunks of a V1 chunk tree
    Chunks {
        #[arg(value_parser = parse_address)]
        address: u64,
        /// Dataset rank
        #[arg(long)]
        rank: usize,
    },

    /// Print a V2 tree header
    V2Header {
        #[arg(value_parser = parse_address)]
        address: u64,
    },

    /// List every record of a V2 tree
    V2Records {
        #[arg(value_parser = parse_address)]
        address: u64,
        /// Dataset rank (chunk trees only)
        #[arg(long, default_value = "0")]
        rank: usize,
    },

    /// List the chunks of a V2 chunk tree
    V2Chunks {
        #[arg(value_parser = parse_address)]
        address: u64,
        /// Dataset rank
        #[arg(long)]
        rank: usize,
        /// Size in bytes of an unfiltered chunk
        #[arg(long)]
        chunk_bytes: u64,
    },
}

/// Accept decimal or `0x`-prefixed hexadecimal addresses.
fn parse_address(value: &str) -> Result<u64, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("'{value}' is not an address: {e}"))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    let text = serde_json::to_string_pretty(value)?;
    println!("{text}");
    Ok(())
}

fn run(cli: &Cli, config: ReaderConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut reader = IndexReader::open(&cli.file, config)?;
    match cli.command {
        Command::Group { address } => print_json(&reader.list_group_entries(address)?)?,
        Command::Symbols { address } => {
            print_json(&reader.list_symbol_table_addresses(address)?)?;
        }
        Command::Chunks { address, rank } => print_json(&reader.list_chunks(address, rank)?)?,
        Command::V2Header { address } => print_json(&reader.read_v2_header(address)?)?,
        Command::V2Records { address, rank } => {
            print_json(&reader.list_v2_records(address, rank)?)?;
        }
        Command::V2Chunks {
            address,
            rank,
            chunk_bytes,
        } => print_json(&reader.list_v2_chunks(address, rank, chunk_bytes)?)?,
    }
    Ok(())
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "btree_index=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Load format parameters from environment variables
    let config = match ReaderConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Reading {} with size_of_offsets={}, size_of_lengths={}, byte_order={:?}",
        cli.file.display(),
        config.size_of_offsets,
        config.size_of_lengths,
        config.byte_order
    );

    if let Err(e) = run(&cli, config) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("4096"), Ok(4096));
        assert_eq!(parse_address("0x1000"), Ok(4096));
        assert_eq!(parse_address("0XFF"), Ok(255));
        assert!(parse_address("0xZZ").is_err());
        assert!(parse_address("-1").is_err());
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "index-dump",
            "file.h5",
            "v2-chunks",
            "0x200",
            "--rank",
            "3",
            "--chunk-bytes",
            "4096",
        ])
        .expect("parse");
        assert!(matches!(
            cli.command,
            Command::V2Chunks {
                address: 0x200,
                rank: 3,
                chunk_bytes: 4096
            }
        ));

        let cli = Cli::try_parse_from(["index-dump", "file.h5", "v2-records", "64"])
            .expect("parse");
        assert!(matches!(
            cli.command,
            Command::V2Records { address: 64, rank: 0 }
        ));
    }
}
