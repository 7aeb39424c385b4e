use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Whether a user can save another document without triggering eviction.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct SaveCapacity {
    pub allowed: bool,
    pub current_count: i64,
    pub max_allowed: i64,
}

impl SaveCapacity {
    pub fn new(current_count: i64, max_allowed: i64) -> Self {
        Self {
            allowed: current_count < max_allowed,
            current_count,
            max_allowed,
        }
    }
}

/// Document to drop before one more is saved: the oldest active one, but only once the
/// user is at or over `max_saved`. Ties on `created_at` fall to the lower id.
pub fn eviction_candidate(active: &[(Uuid, DateTime<Utc>)], max_saved: i64) -> Option<Uuid> {
    let active_count = i64::try_from(active.len()).unwrap_or(i64::MAX);
    if active_count < max_saved {
        return None;
    }

    active
        .iter()
        .min_by_key(|(id, created_at)| (*created_at, *id))
        .map(|(id, _)| *id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn saved_at(minutes_ago: i64, now: DateTime<Utc>) -> (Uuid, DateTime<Utc>) {
        (Uuid::new_v4(), now - Duration::minutes(minutes_ago))
    }

    #[test]
    fn sixth_save_at_a_cap_of_five_drops_the_oldest() {
        let now = Utc::now();
        let active = vec![
            saved_at(10, now),
            saved_at(50, now),
            saved_at(30, now),
            saved_at(20, now),
            saved_at(40, now),
        ];

        assert_eq!(eviction_candidate(&active, 5), Some(active[1].0));
    }

    #[test]
    fn below_the_cap_nothing_is_evicted() {
        let now = Utc::now();
        let active = vec![saved_at(10, now), saved_at(20, now)];

        assert_eq!(eviction_candidate(&active, 3), None);
        assert_eq!(eviction_candidate(&[], 1), None);
    }

    #[test]
    fn over_the_cap_still_drops_the_oldest() {
        let now = Utc::now();
        let active = vec![saved_at(5, now), saved_at(15, now), saved_at(25, now)];

        assert_eq!(eviction_candidate(&active, 1), Some(active[2].0));
    }

    #[test]
    fn equal_timestamps_fall_back_to_the_lower_id() {
        let created_at = Utc::now();
        let low = Uuid::from_u128(1);
        let high = Uuid::from_u128(2);

        assert_eq!(
            eviction_candidate(&[(high, created_at), (low, created_at)], 2),
            Some(low)
        );
    }
}
