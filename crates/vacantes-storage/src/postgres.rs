use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::debug;
use vacantes_core::{ClosingDateRow, DaysRemainingUpdate, VacancyRecord};

use crate::store::{StoreError, VacancyStore};

const UPSERT_CHUNK: usize = 500;

const VACANCY_COLUMNS: &str = "codigo, cargo, salario, experiencia, tipo_contrato, teletrabajo, \
    ubicacion, num_vacantes, num_postulaciones, fecha_publicacion, fecha_cierre, dias_restantes, url";

#[derive(Debug, Clone)]
pub struct PgVacancyStore {
    pool: PgPool,
}

impl PgVacancyStore {
    /// Build a lazily connected store; connection problems surface per operation.
    pub fn connect_lazy(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_lazy(database_url)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

fn count_to_db(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn count_from_db(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

fn vacancy_from_row(row: &PgRow) -> Result<VacancyRecord, sqlx::Error> {
    Ok(VacancyRecord {
        code: row.try_get("codigo")?,
        title: row.try_get("cargo")?,
        salary: row.try_get("salario")?,
        experience_text: row.try_get("experiencia")?,
        contract_type: row.try_get("tipo_contrato")?,
        remote_work_text: row.try_get("teletrabajo")?,
        location: row.try_get("ubicacion")?,
        vacancy_count: count_from_db(row.try_get("num_vacantes")?),
        application_count: count_from_db(row.try_get("num_postulaciones")?),
        published_date: row.try_get::<Option<DateTime<FixedOffset>>, _>("fecha_publicacion")?,
        closing_date: row.try_get::<Option<DateTime<FixedOffset>>, _>("fecha_cierre")?,
        days_remaining: row.try_get("dias_restantes")?,
        url: row.try_get("url")?,
    })
}

#[async_trait]
impl VacancyStore for PgVacancyStore {
    async fn stored_codes(&self) -> Result<HashSet<String>, StoreError> {
        let rows = sqlx::query("SELECT codigo FROM vacantes")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("codigo").map_err(StoreError::from))
            .collect()
    }

    async fn upsert_vacancies(&self, records: &[VacancyRecord]) -> Result<u64, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut affected = 0u64;
        for chunk in records.chunks(UPSERT_CHUNK) {
            let mut qb: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("INSERT INTO vacantes ({VACANCY_COLUMNS}) "));
            qb.push_values(chunk, |mut b, r| {
                b.push_bind(&r.code)
                    .push_bind(&r.title)
                    .push_bind(&r.salary)
                    .push_bind(&r.experience_text)
                    .push_bind(&r.contract_type)
                    .push_bind(&r.remote_work_text)
                    .push_bind(&r.location)
                    .push_bind(count_to_db(r.vacancy_count))
                    .push_bind(count_to_db(r.application_count))
                    .push_bind(r.published_date)
                    .push_bind(r.closing_date)
                    .push_bind(r.days_remaining)
                    .push_bind(&r.url);
            });
            qb.push(
                " ON CONFLICT (codigo) DO UPDATE SET \
                 cargo = EXCLUDED.cargo, \
                 salario = EXCLUDED.salario, \
                 experiencia = EXCLUDED.experiencia, \
                 tipo_contrato = EXCLUDED.tipo_contrato, \
                 teletrabajo = EXCLUDED.teletrabajo, \
                 ubicacion = EXCLUDED.ubicacion, \
                 num_vacantes = EXCLUDED.num_vacantes, \
                 num_postulaciones = EXCLUDED.num_postulaciones, \
                 fecha_publicacion = EXCLUDED.fecha_publicacion, \
                 fecha_cierre = EXCLUDED.fecha_cierre, \
                 dias_restantes = EXCLUDED.dias_restantes, \
                 url = EXCLUDED.url, \
                 updated_at = now()",
            );
            affected += qb.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;
        debug!(affected, "upserted vacancies");
        Ok(affected)
    }

    async fn closing_dates(&self) -> Result<Vec<ClosingDateRow>, StoreError> {
        let rows = sqlx::query("SELECT codigo, fecha_cierre FROM vacantes")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| -> Result<ClosingDateRow, StoreError> {
                Ok(ClosingDateRow {
                    code: row.try_get("codigo")?,
                    closing_date: row.try_get("fecha_cierre")?,
                })
            })
            .collect()
    }

    async fn update_days_remaining(
        &self,
        updates: &[DaysRemainingUpdate],
    ) -> Result<u64, StoreError> {
        if updates.is_empty() {
            return Ok(0);
        }
        let codes: Vec<String> = updates.iter().map(|u| u.code.clone()).collect();
        let days: Vec<Option<i64>> = updates.iter().map(|u| u.days_remaining).collect();
        let result = sqlx::query(
            r#"
            UPDATE vacantes AS v
            SET dias_restantes = u.dias_restantes, updated_at = now()
            FROM UNNEST($1::text[], $2::int8[]) AS u(codigo, dias_restantes)
            WHERE v.codigo = u.codigo
            "#,
        )
        .bind(codes)
        .bind(days)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn list_vacancies(&self) -> Result<Vec<VacancyRecord>, StoreError> {
        let sql = format!("SELECT {VACANCY_COLUMNS} FROM vacantes ORDER BY codigo");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| vacancy_from_row(row).map_err(StoreError::from))
            .collect()
    }
}
