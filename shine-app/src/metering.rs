//! The daily allowance of AI-assisted features.

use ember::SyncCoordinator;
use shine_types::{DateKey, keys::Daily};

use crate::persist::{load_json, save_json};

/// Free users get this many AI uses per day.
pub const FREE_AI_LIMIT: u32 = 3;

/// Owns `shine-ai-usage-<date>`. Whether the user is premium comes from the
/// entitlement mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeteringGate {
    date: DateKey,
    limit: u32,
    used: u32,
    premium: bool,
}

impl MeteringGate {
    pub async fn load(sync: &SyncCoordinator, today: DateKey, premium: bool) -> Self {
        Self::with_limit(sync, today, premium, FREE_AI_LIMIT).await
    }

    pub async fn with_limit(
        sync: &SyncCoordinator,
        today: DateKey,
        premium: bool,
        limit: u32,
    ) -> Self {
        Self {
            date: today,
            limit,
            used: load_json(sync, &Daily::AiUsage.key(today))
                .await
                .unwrap_or(0),
            premium,
        }
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Uses left today, or `None` when unlimited.
    pub fn remaining(&self) -> Option<u32> {
        if self.premium {
            None
        } else {
            Some(self.limit.saturating_sub(self.used))
        }
    }

    pub fn allowed(&self) -> bool {
        self.premium || self.used < self.limit
    }

    pub fn set_premium(&mut self, premium: bool) {
        self.premium = premium;
    }

    /// Counts one attempt, whether or not it ends up succeeding.
    pub async fn record_attempt(&mut self, sync: &SyncCoordinator) -> u32 {
        self.used += 1;
        if save_json(sync, &Daily::AiUsage.key(self.date), &self.used)
            .await
            .is_degraded()
        {
            log::warn!("AI usage count was not persisted");
        }
        self.used
    }
}
