use thiserror::Error;

const MAX_WINDOW_HOURS: i64 = 24 * 30;
const MAX_LIMIT: i64 = 10_000;
const MAX_TOP_N: usize = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("window_hours must be positive")]
    WindowNotPositive,
    #[error("window_hours exceeds the maximum of {MAX_WINDOW_HOURS}")]
    WindowTooLarge,
    #[error("limit must be positive")]
    LimitNotPositive,
    #[error("limit exceeds the maximum of {MAX_LIMIT}")]
    LimitTooLarge,
    #[error("top_n must be positive")]
    TopNNotPositive,
    #[error("top_n exceeds the maximum of {MAX_TOP_N}")]
    TopNTooLarge,
}

/// A validated request for ranked trends over a recency window. Constructed only via
/// `TrendsRequest::new`, so a `TrendsRequest` in hand is always within bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendsRequest {
    pub window_hours: i64,
    pub limit: i64,
    pub top_n: usize,
}

impl TrendsRequest {
    pub fn new(window_hours: i64, limit: i64, top_n: usize) -> Result<Self, RequestError> {
        if window_hours <= 0 {
            return Err(RequestError::WindowNotPositive);
        }
        if window_hours > MAX_WINDOW_HOURS {
            return Err(RequestError::WindowTooLarge);
        }
        if limit <= 0 {
            return Err(RequestError::LimitNotPositive);
        }
        if limit > MAX_LIMIT {
            return Err(RequestError::LimitTooLarge);
        }
        if top_n == 0 {
            return Err(RequestError::TopNNotPositive);
        }
        if top_n > MAX_TOP_N {
            return Err(RequestError::TopNTooLarge);
        }

        Ok(Self {
            window_hours,
            limit,
            top_n,
        })
    }

    pub fn cache_key(&self) -> String {
        crate::cache::TrendsCache::key(self.window_hours, self.limit, self.top_n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_reasonable_request() {
        let request = TrendsRequest::new(24, 500, 10).unwrap();
        assert_eq!(request.window_hours, 24);
    }

    #[test]
    fn rejects_non_positive_window() {
        assert_eq!(
            TrendsRequest::new(0, 500, 10).unwrap_err(),
            RequestError::WindowNotPositive
        );
    }

    #[test]
    fn rejects_window_beyond_the_maximum() {
        assert_eq!(
            TrendsRequest::new(MAX_WINDOW_HOURS + 1, 500, 10).unwrap_err(),
            RequestError::WindowTooLarge
        );
    }

    #[test]
    fn rejects_zero_top_n() {
        assert_eq!(
            TrendsRequest::new(24, 500, 0).unwrap_err(),
            RequestError::TopNNotPositive
        );
    }

    #[test]
    fn cache_key_matches_the_cache_module_format() {
        let request = TrendsRequest::new(24, 500, 10).unwrap();
        assert_eq!(request.cache_key(), "trends:24:500:10");
    }
}
