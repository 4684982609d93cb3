//! saga-schema: Storage bootstrap
//!
//! Creates the saga, correlation index, subscription and snapshot tables
//! for the configured backend, then exits. Safe to run repeatedly.
//!
//! ## Configuration
//! - First argument: path to a YAML config file (optional)
//! - SAGA_STORAGE_CONFIG: config file path when no argument is given
//! - SAGA_STORAGE__*: overrides, e.g. SAGA_STORAGE__STORAGE__TYPE=postgres
//! - SAGA_STORAGE_LOG: tracing filter (default: info)

use tracing::info;

use saga_persistence::config::Config;
use saga_persistence::saga::SagaRegistry;
use saga_persistence::storage::init_storage;
use saga_persistence::utils::bootstrap::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let path = std::env::args().nth(1);
    let config = Config::load(path.as_deref())?;

    let providers = init_storage(&config.storage, SagaRegistry::new()).await?;
    providers.ensure_schema().await?;

    info!(
        storage_type = %config.storage.storage_type,
        sagas = %config.storage.tables.sagas,
        saga_index = %config.storage.tables.saga_index,
        "saga-schema: tables ready"
    );

    Ok(())
}
