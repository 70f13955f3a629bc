//! Command-line front end.
//!
//! # Usage
//!
//! ```bash
//! # Document one service from its source tree
//! openapi-catalog generate ./orders-service --service-id orders -o orders.yaml
//!
//! # Same, with summaries derived from handler names, as JSON
//! openapi-catalog generate ./orders-service --describe heuristic -f json
//!
//! # Merge the documents of every configured service
//! openapi-catalog aggregate --config catalog.yaml --raw -v
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use openapi_catalog::cli;

fn main() -> Result<()> {
    let args = cli::CliArgs::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("openapi-catalog starting...");
    cli::run(args)?;
    info!("Done");

    Ok(())
}
