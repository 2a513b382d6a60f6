//! Mood logging and the daily streak.

use std::collections::BTreeMap;

use chrono::Datelike as _;
use ember::{StoreResult, SyncCoordinator};
use serde::{Deserialize, Serialize};
use shine_types::{
    DateKey,
    keys::{self, Daily},
};

use crate::persist::{load_json, load_json_map, save_json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("a mood must be between 1 and 5, got {0}")]
pub struct InvalidMood(pub u8);

/// How the day feels, from 1 (rough) to 5 (great).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Mood(u8);

impl Mood {
    pub const ROUGH: Mood = Mood(1);
    pub const GREAT: Mood = Mood(5);

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn label(self) -> &'static str {
        match self.0 {
            1 => "Rough",
            2 => "Low",
            3 => "Okay",
            4 => "Good",
            _ => "Great",
        }
    }
}

impl TryFrom<u8> for Mood {
    type Error = InvalidMood;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (1..=5).contains(&value) {
            Ok(Mood(value))
        } else {
            Err(InvalidMood(value))
        }
    }
}

impl From<Mood> for u8 {
    fn from(mood: Mood) -> Self {
        mood.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoodDay {
    pub date: DateKey,
    pub mood: Option<Mood>,
}

impl MoodDay {
    /// "Today", a weekday name for short ranges, or a month and day otherwise.
    pub fn label(&self, today: DateKey, range: u32) -> String {
        if self.date == today {
            "Today".to_string()
        } else if range <= 7 {
            self.date.date().weekday().to_string()
        } else {
            self.date.date().format("%b %-d").to_string()
        }
    }
}

/// Owns `shine-moods`, `shine-streak` and `shine-mood-today-<date>`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MoodLog {
    history: BTreeMap<DateKey, Mood>,
    streak: u32,
}

impl MoodLog {
    pub async fn load(sync: &SyncCoordinator) -> Self {
        Self {
            history: load_json_map(sync, keys::MOODS).await,
            streak: load_json(sync, keys::STREAK).await.unwrap_or_default(),
        }
    }

    pub fn history(&self) -> &BTreeMap<DateKey, Mood> {
        &self.history
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn on(&self, date: DateKey) -> Option<Mood> {
        self.history.get(&date).copied()
    }

    /// Records today's mood, overwriting an earlier log from the same day,
    /// and returns the recomputed streak.
    pub async fn save_mood(&mut self, sync: &SyncCoordinator, today: DateKey, mood: Mood) -> u32 {
        self.history.insert(today, mood);
        self.streak = streak_ending(&self.history, today);

        let results = [
            save_json(sync, keys::MOODS, &self.history).await,
            save_json(sync, keys::STREAK, &self.streak).await,
            save_json(sync, &Daily::MoodToday.key(today), &mood).await,
        ];
        if results.iter().any(StoreResult::is_degraded) {
            log::warn!("Mood for {today} was not fully persisted");
        }
        self.streak
    }

    /// The last `n` days ending today, oldest first.
    pub fn mood_days(&self, today: DateKey, n: u32) -> Vec<MoodDay> {
        (0..n)
            .rev()
            .filter_map(|back| today.days_back(u64::from(back)))
            .map(|date| MoodDay {
                date,
                mood: self.on(date),
            })
            .collect()
    }

    /// Average over the logged days among the last `n`. `None` if none were logged.
    pub fn average(&self, today: DateKey, n: u32) -> Option<f64> {
        let moods: Vec<f64> = self
            .mood_days(today, n)
            .into_iter()
            .filter_map(|day| day.mood)
            .map(|mood| f64::from(mood.value()))
            .collect();
        if moods.is_empty() {
            return None;
        }
        Some(moods.iter().sum::<f64>() / moods.len() as f64)
    }
}

/// One for today, plus one for every consecutive logged day walking back from yesterday.
pub fn streak_ending(history: &BTreeMap<DateKey, Mood>, today: DateKey) -> u32 {
    let mut streak = 1;
    let mut day = today.previous();
    while let Some(date) = day.filter(|date| history.contains_key(date)) {
        streak += 1;
        day = date.previous();
    }
    streak
}
