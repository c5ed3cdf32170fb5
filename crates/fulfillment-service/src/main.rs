//! Main entry point for the fulfillment service.
//!
//! This binary wires the order lifecycle engine together: it loads
//! configuration, registers the pluggable storage and mailer
//! implementations, builds the engine (refusing to start when the store
//! is unreachable) and runs it until interrupted. The HTTP layer that
//! exposes the operation surface lives in a collaborating subsystem and
//! is not part of this binary.

use clap::Parser;
use fulfillment_config::Config;
use fulfillment_core::{EngineBuilder, EngineFactories};
use std::path::PathBuf;

// Import implementations from individual crates
use fulfillment_mailer::implementations::http::create_mailer as create_http_mailer;
use fulfillment_mailer::implementations::log::create_mailer as create_log_mailer;
use fulfillment_storage::implementations::file::create_storage as create_file_storage;
use fulfillment_storage::implementations::memory::create_storage as create_memory_storage;

/// Command-line arguments for the fulfillment service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Macro to create a factory HashMap with the appropriate type aliases
macro_rules! create_factory_map {
    ($interface:path, $error:path, $( $name:literal => $factory:expr ),* $(,)?) => {{
        let mut factories = std::collections::HashMap::new();
        $(
            factories.insert(
                $name.to_string(),
                $factory as fn(&toml::Value) -> Result<Box<dyn $interface>, $error>
            );
        )*
        factories
    }};
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started fulfillment service");

	// Load configuration
	let config = Config::from_file_async(&args.config).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let factories = EngineFactories {
		storage_factories: create_factory_map!(
			fulfillment_storage::StorageInterface,
			fulfillment_storage::StorageError,
			"memory" => create_memory_storage,
			"file" => create_file_storage,
		),
		mailer_factories: create_factory_map!(
			fulfillment_mailer::MailerInterface,
			fulfillment_mailer::MailerError,
			"http" => create_http_mailer,
			"log" => create_log_mailer,
		),
	};

	// An unreachable store fails here, before anything serves
	let engine = EngineBuilder::new(config).build(factories).await?;

	engine.run().await?;

	tracing::info!("Stopped fulfillment service");
	Ok(())
}
