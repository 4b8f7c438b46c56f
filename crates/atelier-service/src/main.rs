//! Main entry point for the atelier order tracker.
//!
//! This binary loads the configuration, builds the lifecycle engine over the
//! configured order store and serves the HTTP API until interrupted.

use atelier_config::Config;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod factory_registry;
mod server;

/// Command-line arguments for the atelier service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml", env = "ATELIER_CONFIG")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Main entry point for the atelier service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the lifecycle engine with the configured store
/// 5. Runs the engine and the API until interrupted
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

	tracing::info!("Started atelier");

	let config_path = args
		.config
		.to_str()
		.ok_or("Configuration path is not valid UTF-8")?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let engine = Arc::new(factory_registry::build_engine_from_config(config.clone())?);
	engine.initialize().await?;

	let api_config = config.api.clone().filter(|api| api.enabled);

	let engine_task = engine.run();
	tokio::pin!(engine_task);
	let api_task = async {
		match api_config {
			Some(api_config) => server::start_server(api_config, Arc::clone(&engine)).await,
			None => {
				tracing::info!("API disabled, running lifecycle engine only");
				std::future::pending().await
			},
		}
	};

	let engine_finished = tokio::select! {
		result = &mut engine_task => {
			tracing::info!("Lifecycle engine finished");
			result?;
			true
		}
		result = api_task => {
			tracing::info!("API server finished");
			result?;
			false
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("Interrupt received");
			false
		}
	};

	engine.shutdown().await?;
	if !engine_finished {
		// Let in-flight archivals finish
		engine_task.await?;
	}
	tracing::info!("Stopped atelier");
	Ok(())
}
