use sea_orm::{DatabaseConnection, DatabaseTransaction, prelude::*};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    Currency, EngineError, ResultEngine,
    events::{EventBus, LedgerEvent},
};

mod accounts;
mod categories;
mod history;
mod operations;

pub use history::{BalanceHistory, HistoryPoint, HistoryQuery};
pub use operations::OperationListFilter;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result: $crate::ResultEngine<_> = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// The ledger engine.
///
/// Stateless between calls: every operation opens its own DB transaction, so
/// concurrent reads observe consistent snapshots and writes on the same
/// account serialize at the storage layer. Balance-affecting writes publish
/// [`LedgerEvent::ReloadAll`] on the engine's [`EventBus`] after commit.
#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    events: EventBus,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Registers a subscriber for change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    pub(crate) fn publish_reload(&self) {
        self.events.publish(LedgerEvent::ReloadAll);
    }

    /// Loads an account row or fails with `KeyNotFound`.
    pub(crate) async fn require_account(
        &self,
        db_tx: &DatabaseTransaction,
        account_id: Uuid,
    ) -> ResultEngine<crate::accounts::Model> {
        crate::accounts::Entity::find_by_id(account_id.to_string())
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("account not exists".to_string()))
    }
}

pub(crate) fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidAmount(format!(
            "{label} name must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Parse a currency code stored in the DB into a strongly typed `Currency`.
pub(crate) fn model_currency(value: &str) -> ResultEngine<Currency> {
    Currency::try_from(value)
}

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_model_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| EngineError::KeyNotFound(format!("{label} not exists")))
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            events: EventBus::new(),
        })
    }
}
