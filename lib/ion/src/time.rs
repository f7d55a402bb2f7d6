use std::time::Instant;

/// Whole seconds elapsed between two monotonic readings. Saturates to zero
/// when `to` precedes `from`.
#[inline]
pub fn elapsed_secs(from: Instant, to: Instant) -> u64 {
    to.checked_duration_since(from).map_or(0, |d| d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_elapsed_secs() {
        let from = Instant::now();
        let to = from + Duration::from_millis(2500);
        assert_eq!(elapsed_secs(from, to), 2);
    }

    #[test]
    fn test_elapsed_secs_saturates() {
        let from = Instant::now() + Duration::from_secs(10);
        let to = Instant::now();
        assert_eq!(elapsed_secs(from, to), 0);
    }
}
