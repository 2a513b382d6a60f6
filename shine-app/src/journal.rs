//! Gratitude, three daily wins, and the evening reflection.
//!
//! Each part is saved under its own daily key and also folded into the
//! `shine-journal` map, which is what the journal history screen reads.

use std::collections::BTreeMap;

use ember::SyncCoordinator;
use serde::{Deserialize, Serialize};
use shine_types::{
    DateKey,
    keys::{self, Daily},
};

use crate::persist::{load_json, load_json_map, save_json};

/// How many days the journal history shows.
pub const JOURNAL_DAYS: usize = 14;

pub type Wins = [String; 3];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EveningReflection {
    #[serde(default)]
    pub reflection: String,
    /// 1-5
    #[serde(default)]
    pub rating: Option<u8>,
    /// For tomorrow.
    #[serde(default)]
    pub intention: String,
    #[serde(default, rename = "letGo")]
    pub let_go: String,
}

impl EveningReflection {
    fn trimmed(&self) -> Self {
        Self {
            reflection: self.reflection.trim().to_string(),
            rating: self.rating,
            intention: self.intention.trim().to_string(),
            let_go: self.let_go.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gratitude: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wins: Option<Wins>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evening: Option<EveningReflection>,
}

/// Owns `shine-journal` plus the gratitude, wins and evening daily keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Journal {
    entries: BTreeMap<DateKey, JournalEntry>,
}

impl Journal {
    /// Loads the journal, back-filling today's entry from its daily keys.
    pub async fn load(sync: &SyncCoordinator, today: DateKey) -> Self {
        let mut entries: BTreeMap<DateKey, JournalEntry> = load_json_map(sync, keys::JOURNAL).await;

        let gratitude: Option<String> = load_json(sync, &Daily::Gratitude.key(today)).await;
        let wins: Option<Wins> = load_json(sync, &Daily::Wins.key(today)).await;
        let evening: Option<EveningReflection> = load_json(sync, &Daily::Evening.key(today)).await;
        if gratitude.is_some() || wins.is_some() || evening.is_some() {
            let entry = entries.entry(today).or_default();
            entry.gratitude = entry.gratitude.take().or(gratitude);
            entry.wins = entry.wins.take().or(wins);
            entry.evening = entry.evening.take().or(evening);
        }
        Self { entries }
    }

    pub fn entry(&self, date: DateKey) -> Option<&JournalEntry> {
        self.entries.get(&date)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recent days with an entry, newest first.
    pub fn recent(&self, n: usize) -> Vec<(DateKey, &JournalEntry)> {
        self.entries
            .iter()
            .rev()
            .take(n)
            .map(|(date, entry)| (*date, entry))
            .collect()
    }

    pub fn history(&self) -> Vec<(DateKey, &JournalEntry)> {
        self.recent(JOURNAL_DAYS)
    }

    /// Returns false, saving nothing, if `text` is blank.
    pub async fn save_gratitude(&mut self, sync: &SyncCoordinator, today: DateKey, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        let _ = save_json(sync, &Daily::Gratitude.key(today), text).await;
        self.entries.entry(today).or_default().gratitude = Some(text.to_string());
        self.persist(sync).await;
        true
    }

    /// Returns false, saving nothing, if every win is blank.
    pub async fn save_wins(&mut self, sync: &SyncCoordinator, today: DateKey, wins: Wins) -> bool {
        if wins.iter().all(|win| win.trim().is_empty()) {
            return false;
        }
        let _ = save_json(sync, &Daily::Wins.key(today), &wins).await;
        self.entries.entry(today).or_default().wins = Some(wins);
        self.persist(sync).await;
        true
    }

    pub async fn save_evening(
        &mut self,
        sync: &SyncCoordinator,
        today: DateKey,
        evening: &EveningReflection,
    ) {
        let evening = evening.trimmed();
        let _ = save_json(sync, &Daily::Evening.key(today), &evening).await;
        self.entries.entry(today).or_default().evening = Some(evening);
        self.persist(sync).await;
    }

    async fn persist(&self, sync: &SyncCoordinator) {
        if save_json(sync, keys::JOURNAL, &self.entries).await.is_degraded() {
            log::warn!("Journal was not persisted");
        }
    }
}
