//! The catalogue of persisted record keys.
//!
//! Every key lives under the `shine-` namespace. Global keys hold one value for the whole
//! account; daily keys are suffixed with a [`DateKey`].

use crate::DateKey;

pub const PREFIX: &str = "shine-";

pub const MOODS: &str = "shine-moods";
pub const STREAK: &str = "shine-streak";
pub const JOURNAL: &str = "shine-journal";
pub const PREMIUM: &str = "shine-premium";
pub const STRIPE_CUSTOMER: &str = "shine-stripe-customer";

pub const GLOBAL: [&str; 5] = [MOODS, STREAK, JOURNAL, PREMIUM, STRIPE_CUSTOMER];

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Daily {
    MoodToday,
    Challenge,
    Gratitude,
    Wins,
    Evening,
    Insight,
    AiUsage,
}

impl Daily {
    pub const ALL: [Daily; 7] = [
        Daily::MoodToday,
        Daily::Challenge,
        Daily::Gratitude,
        Daily::Wins,
        Daily::Evening,
        Daily::Insight,
        Daily::AiUsage,
    ];

    fn feature(&self) -> &'static str {
        match self {
            Daily::MoodToday => "mood-today",
            Daily::Challenge => "challenge",
            Daily::Gratitude => "gratitude",
            Daily::Wins => "wins",
            Daily::Evening => "evening",
            Daily::Insight => "insight",
            Daily::AiUsage => "ai-usage",
        }
    }

    pub fn key(&self, date: DateKey) -> String {
        format!("{PREFIX}{}-{date}", self.feature())
    }

    /// Splits a daily key back into its feature and date.
    pub fn parse(key: &str) -> Option<(Daily, DateKey)> {
        let rest = key.strip_prefix(PREFIX)?;
        Daily::ALL.into_iter().find_map(|daily| {
            let date = rest.strip_prefix(daily.feature())?.strip_prefix('-')?;
            Some((daily, date.parse().ok()?))
        })
    }
}

/// Whether `key` belongs to the application's namespace.
pub fn is_known(key: &str) -> bool {
    GLOBAL.contains(&key) || Daily::parse(key).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_keys() {
        let date = DateKey::from_ymd(2025, 1, 31).unwrap();
        assert_eq!(Daily::AiUsage.key(date), "shine-ai-usage-2025-01-31");
        assert_eq!(Daily::MoodToday.key(date), "shine-mood-today-2025-01-31");
    }

    #[test]
    fn test_parse_daily_key() {
        let date = DateKey::from_ymd(2024, 12, 1).unwrap();
        for daily in Daily::ALL {
            assert_eq!(Daily::parse(&daily.key(date)), Some((daily, date)));
        }
        assert_eq!(Daily::parse("shine-moods"), None);
        assert_eq!(Daily::parse("shine-wins-yesterday"), None);
    }

    #[test]
    fn test_known_keys() {
        assert!(is_known(MOODS));
        assert!(is_known("shine-evening-2025-06-01"));
        assert!(!is_known("shine-welcome-seen-local"));
    }
}
