//! Human-readable document numbers such as `JO-2026-0042`.
//!
//! The next value is computed by a subquery inside the INSERT itself, so the
//! read and the write happen under the same SQLite write lock. The unique
//! index on the number column catches anything that slips through.

use chrono::{DateTime, Datelike, Utc};
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::Sqlite;

#[derive(Debug, Clone, Copy)]
pub struct NumberSeries {
    prefix: &'static str,
    table: &'static str,
    column: &'static str,
}

pub const JOB_ORDERS: NumberSeries = NumberSeries {
    prefix: "JO",
    table: "job_orders",
    column: "job_number",
};

pub const INVOICES: NumberSeries = NumberSeries {
    prefix: "INV",
    table: "invoices",
    column: "invoice_number",
};

impl NumberSeries {
    /// `PREFIX-YEAR-`; sequences restart every calendar year.
    pub fn stem(&self, at: DateTime<Utc>) -> String {
        format!("{}-{}-", self.prefix, at.year())
    }

    /// SQL expression yielding the next number. Takes three binds, supplied
    /// by [`NumberSeries::bind`].
    pub fn next_value_sql(&self) -> String {
        format!(
            "(SELECT ? || printf('%04d', COALESCE(MAX(CAST(substr({column}, ?) AS INTEGER)), 0) + 1) \
             FROM {table} WHERE {column} LIKE ?)",
            column = self.column,
            table = self.table,
        )
    }

    pub fn bind<'q>(
        &self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
        stem: &str,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        let suffix_start = stem.chars().count() as i64 + 1;
        query
            .bind(stem.to_string())
            .bind(suffix_start)
            .bind(format!("{stem}%"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sqlx::sqlite::SqlitePoolOptions;

    #[test]
    fn stem_carries_prefix_and_year() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        assert_eq!(JOB_ORDERS.stem(at), "JO-2026-");
        assert_eq!(INVOICES.stem(at), "INV-2026-");
    }

    #[tokio::test]
    async fn numbers_increase_within_a_year_and_restart_across_years() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE job_orders (job_number TEXT NOT NULL UNIQUE)")
            .execute(&pool)
            .await
            .unwrap();

        let insert = format!("INSERT INTO job_orders (job_number) VALUES ({})", JOB_ORDERS.next_value_sql());
        for stem in ["JO-2026-", "JO-2026-", "JO-2027-", "JO-2026-"] {
            JOB_ORDERS
                .bind(sqlx::query(&insert), stem)
                .execute(&pool)
                .await
                .unwrap();
        }

        let numbers: Vec<String> = sqlx::query_scalar("SELECT job_number FROM job_orders ORDER BY rowid")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(numbers, ["JO-2026-0001", "JO-2026-0002", "JO-2027-0001", "JO-2026-0003"]);
    }
}
