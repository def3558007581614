//! Core vacancy model, store projections and civil-time date helpers.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub mod dates;

pub use dates::{
    civil_midnight, civil_offset, civil_today, days_remaining, format_civil_date, normalize_date,
    DateError,
};

pub const CRATE_NAME: &str = "vacantes-core";

/// One job listing as persisted in the `vacantes` table.
///
/// Serialized keys follow the store's column names so the same JSON can be
/// handed to the store or returned by the on-demand endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VacancyRecord {
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "cargo")]
    pub title: String,
    #[serde(rename = "salario")]
    pub salary: String,
    #[serde(rename = "experiencia")]
    pub experience_text: String,
    #[serde(rename = "tipo_contrato")]
    pub contract_type: String,
    #[serde(rename = "teletrabajo")]
    pub remote_work_text: String,
    #[serde(rename = "ubicacion")]
    pub location: String,
    #[serde(rename = "num_vacantes")]
    pub vacancy_count: u32,
    #[serde(rename = "num_postulaciones")]
    pub application_count: u32,
    #[serde(rename = "fecha_publicacion")]
    pub published_date: Option<DateTime<FixedOffset>>,
    #[serde(rename = "fecha_cierre")]
    pub closing_date: Option<DateTime<FixedOffset>>,
    /// Derived from `closing_date`; `None` when the closing date is unknown.
    #[serde(rename = "dias_restantes")]
    pub days_remaining: Option<i64>,
    pub url: Option<String>,
}

impl VacancyRecord {
    /// Recompute `days_remaining` from `closing_date` for the given civil day.
    pub fn refresh_days_remaining(&mut self, today: NaiveDate) {
        self.days_remaining = self.closing_date.map(|closing| days_remaining(closing, today));
    }
}

/// `(codigo, fecha_cierre)` projection read by the refresh pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosingDateRow {
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "fecha_cierre")]
    pub closing_date: Option<DateTime<FixedOffset>>,
}

/// `(codigo, dias_restantes)` projection written by the refresh pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaysRemainingUpdate {
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "dias_restantes")]
    pub days_remaining: Option<i64>,
}

impl ClosingDateRow {
    pub fn to_update(&self, today: NaiveDate) -> DaysRemainingUpdate {
        DaysRemainingUpdate {
            code: self.code.clone(),
            days_remaining: self.closing_date.map(|closing| days_remaining(closing, today)),
        }
    }
}

/// Source of the current instant, so "today" can be pinned in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn civil_today(&self) -> NaiveDate {
        civil_today(self.now())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
