use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use mongodb::{error::Error as DbError, Client as MongoClient, Database};
use serde::{Deserialize, Serialize};

/// Application configuration, derived from `Backend.toml` and `EVOTE_*`
/// environment variables, on top of built-in defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    // secrets
    db_uri: String,
    // non-secrets
    db_name: String,
    transaction_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_uri: "mongodb://localhost:27017".to_string(),
            db_name: "evote".to_string(),
            transaction_retries: 3,
        }
    }
}

impl Config {
    /// The file consulted for configuration, relative to the working directory.
    pub const FILE: &'static str = "Backend.toml";
    /// Prefix of the environment variables that override the file.
    pub const ENV_PREFIX: &'static str = "EVOTE_";

    /// Load the configuration from the default sources.
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    /// The layered configuration sources, lowest priority first.
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(Self::FILE))
            .merge(Env::prefixed(Self::ENV_PREFIX))
    }

    /// Connection string of the MongoDB deployment.
    /// Configured via `EVOTE_DB_URI`.
    pub fn db_uri(&self) -> &str {
        &self.db_uri
    }

    /// Name of the database holding the collections.
    /// Configured via `EVOTE_DB_NAME`.
    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    /// How many times a vote-casting transaction is re-run after a transient
    /// transaction error before giving up.
    /// Configured via `EVOTE_TRANSACTION_RETRIES`.
    pub fn transaction_retries(&self) -> u32 {
        self.transaction_retries
    }

    /// Connect to the configured deployment.
    ///
    /// The returned client and database handles are meant to be passed
    /// explicitly to every operation that needs them.
    pub async fn connect(&self) -> Result<(MongoClient, Database), DbError> {
        let client = MongoClient::with_uri_str(&self.db_uri).await?;
        let db = client.database(&self.db_name);
        Ok((client, db))
    }
}

#[cfg(test)]
impl Config {
    pub(crate) fn with_transaction_retries(mut self, retries: u32) -> Self {
        self.transaction_retries = retries;
        self
    }
}

/// Environment variable naming the deployment used by database-backed tests.
/// It must be a replica set, since casting a vote needs transactions.
#[cfg(test)]
pub(crate) const TEST_DB_URI_VAR: &str = "EVOTE_TEST_DB_URI";

/// Connect to the test deployment.
///
/// Panics if none is configured, so a database test can never pass without
/// touching a database.
#[cfg(test)]
pub(crate) async fn test_db_client() -> MongoClient {
    let uri = required_test_db_uri(std::env::var(TEST_DB_URI_VAR));
    MongoClient::with_uri_str(&uri)
        .await
        .unwrap_or_else(|e| panic!("Could not connect to test database at {uri}: {e}"))
}

#[cfg(test)]
fn required_test_db_uri(var: Result<String, std::env::VarError>) -> String {
    var.unwrap_or_else(|_| {
        panic!("{TEST_DB_URI_VAR} must name a MongoDB replica set to run database tests")
    })
}

/// Get the name of the database to use for a single test.
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
pub(crate) fn test_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}
