//! Outbound page fetching and the vacancy store contract.

mod fetch;
mod memory;
mod postgres;
mod store;

pub use fetch::{FetchError, FetchedText, FetcherConfig, HttpFetcher, RetryPolicy};
pub use memory::MemoryVacancyStore;
pub use postgres::{run_migrations, PgVacancyStore};
pub use store::{StoreError, VacancyStore};

pub const CRATE_NAME: &str = "vacantes-storage";
