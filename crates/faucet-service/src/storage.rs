//! Ledger construction from configuration.

use std::sync::Arc;
use std::time::Duration;

use faucet_core::{FaucetError, Result};
use faucet_store::{
    Ledger, LedgerBackend, MemoryBackend, ServiceAccountKey, SheetsBackend, SheetsClient,
    SheetsCredentials,
};

use crate::config::{LedgerKind, ServiceConfig};

/// Open the ledger backend named by `config`.
///
/// # Errors
///
/// Returns `FaucetError::Configuration` if the backend is missing settings or
/// was not compiled in, and `StorageUnavailable` if it cannot be opened.
pub fn open_ledger(config: &ServiceConfig) -> Result<Arc<Ledger>> {
    let backend: Arc<dyn LedgerBackend> = match config.ledger {
        LedgerKind::Memory => {
            tracing::warn!("Using the in-memory ledger - data is lost on restart");
            Arc::new(MemoryBackend::with_tasks(config.tasks.clone()))
        }
        LedgerKind::RocksDb => open_rocks(config)?,
        LedgerKind::Sheets => Arc::new(open_sheets(config)?),
    };

    tracing::info!(backend = %backend.name(), "Ledger opened");
    Ok(Arc::new(Ledger::new(backend)))
}

#[cfg(feature = "rocksdb-backend")]
fn open_rocks(config: &ServiceConfig) -> Result<Arc<dyn LedgerBackend>> {
    tracing::info!(path = %config.data_dir, "Opening RocksDB ledger");
    let backend = faucet_store::RocksBackend::open(&config.data_dir)?;
    backend.replace_tasks(&config.tasks)?;
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "rocksdb-backend"))]
fn open_rocks(_config: &ServiceConfig) -> Result<Arc<dyn LedgerBackend>> {
    Err(FaucetError::Configuration(
        "LEDGER_BACKEND=rocksdb requires the rocksdb-backend feature".into(),
    ))
}

fn open_sheets(config: &ServiceConfig) -> Result<SheetsBackend> {
    let sheet_id = config.google_sheet_id.as_deref().ok_or_else(|| {
        FaucetError::Configuration("LEDGER_BACKEND=sheets requires GOOGLE_SHEET_ID".into())
    })?;
    let creds = config.google_creds.as_deref().ok_or_else(|| {
        FaucetError::Configuration("LEDGER_BACKEND=sheets requires GOOGLE_CREDS".into())
    })?;

    // GOOGLE_CREDS holds either the key JSON itself or a path to it.
    let key = if creds.trim_start().starts_with('{') {
        ServiceAccountKey::from_json(creds)?
    } else {
        ServiceAccountKey::from_file(creds)?
    };
    tracing::info!(
        sheet_id = %sheet_id,
        client_email = %key.client_email,
        "Using Google Sheets ledger"
    );

    let client = SheetsClient::with_base_url(
        &config.sheets_api_url,
        sheet_id,
        SheetsCredentials::service_account(key),
        Duration::from_secs(config.storage_timeout_seconds),
    )?;
    Ok(SheetsBackend::new(
        client,
        config.sheet_layout.clone(),
        config.storage_retry_policy(),
    ))
}
