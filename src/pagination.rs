use chrono::{DateTime, Utc};

use crate::errors::{AppError, AppResult};

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 200;

/// Validated `limit`/`offset` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub limit: i64,
    pub offset: i64,
}

impl Window {
    pub fn resolve(limit: Option<i64>, offset: Option<i64>) -> AppResult<Self> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(AppError::validation(format!("limit must be between 1 and {MAX_LIMIT}")));
        }

        let offset = offset.unwrap_or(0);
        if offset < 0 {
            return Err(AppError::validation("offset must not be negative"));
        }

        Ok(Self { limit, offset })
    }
}

/// Rejects inverted ranges; either bound may be open.
pub fn check_range(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> AppResult<()> {
    match (from, to) {
        (Some(from), Some(to)) if from > to => Err(AppError::validation("from must not be after to")),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn defaults_apply_when_absent() {
        assert_eq!(
            Window::resolve(None, None).unwrap(),
            Window { limit: DEFAULT_LIMIT, offset: 0 }
        );
    }

    #[test]
    fn out_of_bounds_values_are_rejected() {
        assert!(Window::resolve(Some(0), None).is_err());
        assert!(Window::resolve(Some(MAX_LIMIT + 1), None).is_err());
        assert!(Window::resolve(Some(10), Some(-1)).is_err());
    }

    #[test]
    fn inverted_range_is_rejected() {
        let now = Utc::now();
        assert!(check_range(Some(now), Some(now - Duration::seconds(1))).is_err());
        assert!(check_range(Some(now), Some(now)).is_ok());
        assert!(check_range(None, Some(now)).is_ok());
    }
}
