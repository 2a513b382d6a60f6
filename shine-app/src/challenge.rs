use ember::SyncCoordinator;
use shine_types::{DateKey, keys::Daily};

use crate::persist::{load_json, save_json};

/// Today's challenge checkbox. Owns `shine-challenge-<date>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyChallenge {
    date: DateKey,
    completed: bool,
}

impl DailyChallenge {
    pub async fn load(sync: &SyncCoordinator, today: DateKey) -> Self {
        Self {
            date: today,
            completed: load_json(sync, &Daily::Challenge.key(today))
                .await
                .unwrap_or(false),
        }
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    pub async fn set_completed(&mut self, sync: &SyncCoordinator, completed: bool) {
        self.completed = completed;
        let _ = save_json(sync, &Daily::Challenge.key(self.date), &completed).await;
    }

    pub async fn toggle(&mut self, sync: &SyncCoordinator) -> bool {
        self.set_completed(sync, !self.completed).await;
        self.completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::test_support::{day, signed_out};

    #[tokio::test]
    async fn test_toggle_is_scoped_to_the_day() {
        let sync = signed_out();
        let mut challenge = DailyChallenge::load(&sync, day(2025, 2, 1)).await;
        assert!(!challenge.completed());
        assert!(challenge.toggle(&sync).await);

        assert!(DailyChallenge::load(&sync, day(2025, 2, 1)).await.completed());
        assert!(!DailyChallenge::load(&sync, day(2025, 2, 2)).await.completed());

        assert!(!challenge.toggle(&sync).await);
        assert_eq!(
            sync.get("shine-challenge-2025-02-01").await.ok().as_deref(),
            Some("false")
        );
    }
}
