use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use vacantes_core::{ClosingDateRow, DaysRemainingUpdate, VacancyRecord};

use crate::store::{StoreError, VacancyStore};

/// In-process store with the same upsert semantics as the Postgres table.
///
/// `set_failing(true)` makes every operation return `StoreError::Unavailable`,
/// which is how callers' fault isolation gets exercised without a database.
#[derive(Debug, Default)]
pub struct MemoryVacancyStore {
    rows: Mutex<BTreeMap<String, VacancyRecord>>,
    failing: AtomicBool,
    upsert_calls: AtomicUsize,
}

impl MemoryVacancyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: impl IntoIterator<Item = VacancyRecord>) -> Self {
        let mut store = Self::default();
        {
            let map = store.rows.get_mut();
            for row in rows {
                map.insert(row.code.clone(), row);
            }
        }
        store
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `upsert_vacancies` calls that reached the store.
    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub async fn get(&self, code: &str) -> Option<VacancyRecord> {
        self.rows.lock().await.get(code).cloned()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store set to fail".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl VacancyStore for MemoryVacancyStore {
    async fn stored_codes(&self) -> Result<HashSet<String>, StoreError> {
        self.check()?;
        Ok(self.rows.lock().await.keys().cloned().collect())
    }

    async fn upsert_vacancies(&self, records: &[VacancyRecord]) -> Result<u64, StoreError> {
        self.check()?;
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock().await;
        for record in records {
            rows.insert(record.code.clone(), record.clone());
        }
        Ok(records.len() as u64)
    }

    async fn closing_dates(&self) -> Result<Vec<ClosingDateRow>, StoreError> {
        self.check()?;
        Ok(self
            .rows
            .lock()
            .await
            .values()
            .map(|row| ClosingDateRow {
                code: row.code.clone(),
                closing_date: row.closing_date,
            })
            .collect())
    }

    async fn update_days_remaining(
        &self,
        updates: &[DaysRemainingUpdate],
    ) -> Result<u64, StoreError> {
        self.check()?;
        let mut rows = self.rows.lock().await;
        let mut touched = 0u64;
        for update in updates {
            if let Some(row) = rows.get_mut(&update.code) {
                row.days_remaining = update.days_remaining;
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn list_vacancies(&self) -> Result<Vec<VacancyRecord>, StoreError> {
        self.check()?;
        Ok(self.rows.lock().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: &str, title: &str) -> VacancyRecord {
        VacancyRecord {
            code: code.into(),
            title: title.into(),
            salary: String::new(),
            experience_text: String::new(),
            contract_type: String::new(),
            remote_work_text: String::new(),
            location: String::new(),
            vacancy_count: 1,
            application_count: 0,
            published_date: None,
            closing_date: None,
            days_remaining: Some(4),
            url: None,
        }
    }

    #[tokio::test]
    async fn upsert_replaces_whole_row_by_code() {
        let store = MemoryVacancyStore::with_rows([record("1", "Old title")]);
        let mut replacement = record("1", "New title");
        replacement.url = Some("https://example.test/x".into());
        store.upsert_vacancies(&[replacement.clone(), record("2", "Other")]).await.unwrap();

        assert_eq!(store.len().await, 2);
        assert_eq!(store.get("1").await.unwrap(), replacement);
    }

    #[tokio::test]
    async fn days_remaining_update_skips_unknown_codes() {
        let store = MemoryVacancyStore::with_rows([record("1", "A")]);
        let touched = store
            .update_days_remaining(&[
                DaysRemainingUpdate { code: "1".into(), days_remaining: Some(-2) },
                DaysRemainingUpdate { code: "missing".into(), days_remaining: Some(9) },
            ])
            .await
            .unwrap();

        assert_eq!(touched, 1);
        assert_eq!(store.get("1").await.unwrap().days_remaining, Some(-2));
        assert!(store.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn failing_store_rejects_every_operation() {
        let store = MemoryVacancyStore::new();
        store.set_failing(true);
        assert!(store.stored_codes().await.is_err());
        assert!(store.upsert_vacancies(&[record("1", "A")]).await.is_err());
        assert!(store.closing_dates().await.is_err());
        assert_eq!(store.upsert_calls(), 0);
    }
}
