use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;
use vacantes_core::{ClosingDateRow, DaysRemainingUpdate, VacancyRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// The `vacantes` table, keyed on `codigo`.
#[async_trait]
pub trait VacancyStore: Send + Sync {
    /// Every stored `codigo`, without fetching full rows.
    async fn stored_codes(&self) -> Result<HashSet<String>, StoreError>;

    /// Insert or fully replace each record by `codigo`. Codes must be unique within `records`.
    async fn upsert_vacancies(&self, records: &[VacancyRecord]) -> Result<u64, StoreError>;

    /// `(codigo, fecha_cierre)` for every stored row.
    async fn closing_dates(&self) -> Result<Vec<ClosingDateRow>, StoreError>;

    /// Overwrite only `dias_restantes` for existing rows; unknown codes are ignored.
    async fn update_days_remaining(
        &self,
        updates: &[DaysRemainingUpdate],
    ) -> Result<u64, StoreError>;

    /// All stored rows ordered by `codigo`.
    async fn list_vacancies(&self) -> Result<Vec<VacancyRecord>, StoreError>;
}
