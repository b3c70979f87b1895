//! Shared utility functions used across multiple modules.

/// Current Unix timestamp in milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_millis_is_after_2020() {
        assert!(now_millis() > 1_577_836_800_000);
    }
}
