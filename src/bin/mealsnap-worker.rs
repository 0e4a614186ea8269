// ABOUTME: Worker binary that drains the analysis queue and processes queued meals
// ABOUTME: Wires config, database, cache, vision, media store, and the worker pool
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Mealsnap Analysis Worker
//!
//! Starts a pool of analysis workers that pop jobs from the configured queue
//! and run the photo-to-nutrition pipeline for each meal. Runs until Ctrl+C,
//! then drains in-flight jobs before exiting.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use mealsnap::{
    analysis::MealAnalyzer,
    cache::{Cache, CacheConfig},
    config::environment::ServerConfig,
    database::Database,
    jobs::{self, WorkerPool},
    logging,
    media::{DiskImageStore, ImageStore},
    vision::VisionRouter,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "mealsnap-worker")]
#[command(about = "Mealsnap analysis worker - turns queued meal photos into nutrition estimates")]
pub struct Args {
    /// Extra .env file loaded before reading the process environment
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Override the configured worker concurrency
    #[arg(long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Handle container environments where clap may not work properly
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Argument parsing failed: {e}");
            eprintln!("Using configuration from environment only");
            Args {
                env_file: None,
                workers: None,
            }
        }
    };

    if let Some(env_file) = &args.env_file {
        // Must load before from_env: dotenvy never overrides existing vars
        dotenvy::from_path(env_file)?;
    }

    let mut config = ServerConfig::from_env()?;
    if let Some(workers) = args.workers {
        config.queue.worker_concurrency = workers.max(1);
    }

    logging::init_from_env()?;

    info!("Starting Mealsnap analysis worker");
    info!("{}", config.summary());

    let database = Arc::new(Database::new(&config.database.url.to_connection_string()).await?);
    if config.database.auto_migrate {
        database.migrate().await?;
        info!("Database migrations applied");
    }

    let cache = Cache::new(CacheConfig::from_server_config(&config)).await?;
    info!("Cache initialized: backend={}", cache.backend_name());

    let vision = Arc::new(VisionRouter::from_config(&config.vision)?);
    info!("Vision provider ready: {}", vision.provider_type());

    let store: Arc<dyn ImageStore> = Arc::new(DiskImageStore::new(&config.media.disk_root));

    let analyzer = Arc::new(MealAnalyzer::new(
        Arc::clone(&database),
        cache,
        store,
        vision,
        config.analysis.portion_mode,
    ));

    let queue = jobs::queue_from_config(&config).await?;
    let pool = WorkerPool::start(queue, analyzer, database, &config.queue);

    info!("Worker pool running; press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    pool.shutdown().await;
    info!("Shutdown complete");

    Ok(())
}
