//! Order number generation
//!
//! `ORD-<UTC yyyyMMddHHmmssSSS>-<seq>`: `seq` restarts at 0 on every new
//! millisecond and counts up within one. The millisecond component never
//! moves backwards, even if the wall clock does.

use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct OrderNumberGenerator {
    /// (last millisecond handed out, sequence within it)
    state: Mutex<(i64, u32)>,
}

impl OrderNumberGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> String {
        self.next_at(shared::util::now_millis())
    }

    fn next_at(&self, now_millis: i64) -> String {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let (last, seq) = *state;
        let (millis, seq) = if now_millis > last {
            (now_millis, 0)
        } else {
            (last, seq + 1)
        };
        *state = (millis, seq);
        drop(state);

        format_number(millis, seq)
    }
}

fn format_number(millis: i64, seq: u32) -> String {
    match chrono::DateTime::from_timestamp_millis(millis) {
        Some(ts) => format!("ORD-{}-{seq}", ts.format("%Y%m%d%H%M%S%3f")),
        None => format!("ORD-{millis}-{seq}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    // 2026-03-04T05:06:07.089Z
    const T: i64 = 1_772_600_767_089;

    #[test]
    fn test_format() {
        let generator = OrderNumberGenerator::new();
        assert_eq!(generator.next_at(T), "ORD-20260304050607089-0");
    }

    #[test]
    fn test_same_millisecond_gets_sequence() {
        let generator = OrderNumberGenerator::new();
        assert_eq!(generator.next_at(T), "ORD-20260304050607089-0");
        assert_eq!(generator.next_at(T), "ORD-20260304050607089-1");
        assert_eq!(generator.next_at(T), "ORD-20260304050607089-2");
        assert_eq!(generator.next_at(T + 1), "ORD-20260304050607090-0");
    }

    #[test]
    fn test_clock_regression_stays_monotonic() {
        let generator = OrderNumberGenerator::new();
        generator.next_at(T);
        // clock jumps back one second
        assert_eq!(generator.next_at(T - 1000), "ORD-20260304050607089-1");
    }

    #[test]
    fn test_rapid_calls_are_unique() {
        let generator = OrderNumberGenerator::new();
        let numbers: HashSet<String> = (0..5000).map(|_| generator.next()).collect();
        assert_eq!(numbers.len(), 5000);
    }

    #[test]
    fn test_unique_across_threads() {
        let generator = std::sync::Arc::new(OrderNumberGenerator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let g = generator.clone();
                std::thread::spawn(move || (0..500).map(|_| g.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut all = HashSet::new();
        for h in handles {
            for n in h.join().unwrap() {
                assert!(all.insert(n));
            }
        }
        assert_eq!(all.len(), 2000);
    }
}
