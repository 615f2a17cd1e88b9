use log::{error, info};
use mongodb::error::Error as DbError;
use thiserror::Error;

use evote_backend::{model::mongodb::ensure_indexes_exist, Config};

/// Errors that are critical to the entire bootstrap.
#[derive(Debug, Error)]
enum Error {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] figment::Error),
    #[error("Failed to prepare database: {0}")]
    Db(#[from] DbError),
}

async fn run() -> Result<(), Error> {
    info!("Loading configuration...");
    let config = Config::load()?;
    info!("...configuration loaded!");

    info!("Connecting to database {}...", config.db_name());
    let (_client, db) = config.connect().await?;
    ensure_indexes_exist(&db).await?;
    info!("...database ready: collections and unique indexes are in place");
    Ok(())
}

#[tokio::main]
async fn main() {
    // Set up logging.
    log4rs::init_file("log4rs.yaml", Default::default()).expect("Failed to initialise logging");
    info!("Initialised logging");

    if let Err(err) = run().await {
        error!("{err}");
        error!("Critical failure, shutting down");
        std::process::exit(1)
    }
}
