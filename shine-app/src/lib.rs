//! Daily Shine's app state: mood log, journal, daily challenge, the AI allowance,
//! the premium mirror, and the AI-assisted features.
//!
//! Each feature module owns its own record keys and persists through the
//! [`SyncCoordinator`] it is handed, so everything written here is pushed to the
//! signed-in user's cloud document.

pub mod assist;
pub mod challenge;
pub mod client;
pub mod entitlement;
pub mod fallback;
pub mod journal;
pub mod metering;
pub mod mood;
mod persist;

use std::sync::Arc;

use ember::{
    AttachOutcome, Identity, LocalStore, PushOutcome, SyncConfig, SyncCoordinator,
    supabase::{SupabaseConfig, SupabaseStore},
};
use shine_types::{
    DateKey,
    assist::{ChatMessage, CompassionLetter, Reframe, WeeklyInsight},
};

pub use assist::{Answer, AssistError, Assistant, Source};
pub use challenge::DailyChallenge;
pub use client::{BackendClient, ClientError, ProxyConfig};
pub use entitlement::Entitlement;
pub use journal::{EveningReflection, Journal, JournalEntry, Wins};
pub use metering::{FREE_AI_LIMIT, MeteringGate};
pub use mood::{Mood, MoodDay, MoodLog};
pub use persist::ShineDocument;

pub struct DailyShine {
    sync: SyncCoordinator,
    client: BackendClient,
    assistant: Assistant,
    today: DateKey,
    moods: MoodLog,
    journal: Journal,
    challenge: DailyChallenge,
    entitlement: Entitlement,
    gate: MeteringGate,
}

impl DailyShine {
    pub async fn open(sync: SyncCoordinator, proxy: ProxyConfig, today: DateKey) -> Self {
        let client = BackendClient::new(proxy);
        let entitlement = Entitlement::load(&sync).await;
        Self {
            assistant: Assistant::new(client.clone()),
            client,
            today,
            moods: MoodLog::load(&sync).await,
            journal: Journal::load(&sync, today).await,
            challenge: DailyChallenge::load(&sync, today).await,
            gate: MeteringGate::load(&sync, today, entitlement.is_premium()).await,
            entitlement,
            sync,
        }
    }

    /// Opens the app against the user's Supabase document, authenticated with their access token.
    pub async fn with_supabase(
        local: LocalStore,
        supabase: &SupabaseConfig,
        access_token: &str,
        proxy: ProxyConfig,
        today: DateKey,
    ) -> Self {
        let remote = Arc::new(SupabaseStore::for_user(supabase, access_token));
        let sync = ShineDocument::coordinator(local, remote, SyncConfig::default());
        Self::open(sync, proxy, today).await
    }

    /// Re-reads every module, e.g. after a sign-in pulled the cloud copy.
    async fn reload(&mut self) {
        self.moods = MoodLog::load(&self.sync).await;
        self.journal = Journal::load(&self.sync, self.today).await;
        self.challenge = DailyChallenge::load(&self.sync, self.today).await;
        self.entitlement = Entitlement::load(&self.sync).await;
        self.gate = MeteringGate::load(&self.sync, self.today, self.entitlement.is_premium()).await;
    }

    pub async fn sign_in(&mut self, identity: Identity) -> AttachOutcome {
        let outcome = self.sync.attach(identity).await;
        self.reload().await;
        outcome
    }

    /// Pushes anything still pending for the departing user before letting go of them.
    pub async fn sign_out(&mut self) -> Option<PushOutcome> {
        self.sync.detach().await
    }

    /// Moves the app to a new calendar day, e.g. when it stays open past midnight.
    /// The journal, challenge and AI allowance are per-day, so they are re-read.
    pub async fn set_today(&mut self, today: DateKey) {
        if today == self.today {
            return;
        }
        self.today = today;
        self.journal = Journal::load(&self.sync, today).await;
        self.challenge = DailyChallenge::load(&self.sync, today).await;
        self.gate = MeteringGate::load(&self.sync, today, self.entitlement.is_premium()).await;
    }

    pub fn sync(&self) -> &SyncCoordinator {
        &self.sync
    }

    pub fn today(&self) -> DateKey {
        self.today
    }

    pub fn moods(&self) -> &MoodLog {
        &self.moods
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn challenge(&self) -> &DailyChallenge {
        &self.challenge
    }

    pub fn entitlement(&self) -> &Entitlement {
        &self.entitlement
    }

    pub fn gate(&self) -> &MeteringGate {
        &self.gate
    }

    pub async fn save_mood(&mut self, mood: Mood) -> u32 {
        self.moods.save_mood(&self.sync, self.today, mood).await
    }

    pub async fn toggle_challenge(&mut self) -> bool {
        self.challenge.toggle(&self.sync).await
    }

    pub async fn save_gratitude(&mut self, text: &str) -> bool {
        self.journal.save_gratitude(&self.sync, self.today, text).await
    }

    pub async fn save_wins(&mut self, wins: Wins) -> bool {
        self.journal.save_wins(&self.sync, self.today, wins).await
    }

    pub async fn save_evening(&mut self, evening: &EveningReflection) {
        self.journal.save_evening(&self.sync, self.today, evening).await
    }

    pub async fn weekly_insight(&mut self) -> Answer<WeeklyInsight> {
        self.assistant
            .weekly_insight(&self.sync, &mut self.gate, &self.moods, &self.journal, self.today)
            .await
    }

    pub async fn reframe(&mut self, thought: &str) -> Option<Answer<Reframe>> {
        self.assistant.reframe(&self.sync, &mut self.gate, thought).await
    }

    pub async fn compassion_letter(&mut self, situation: &str) -> Option<Answer<CompassionLetter>> {
        self.assistant
            .compassion_letter(&self.sync, &mut self.gate, situation)
            .await
    }

    pub async fn ask_coach(
        &mut self,
        conversation: &[ChatMessage],
        question: &str,
    ) -> Option<Answer<String>> {
        self.assistant
            .ask_coach(&self.sync, &mut self.gate, conversation, question)
            .await
    }

    /// The checkout page for upgrading. `None` when nobody is signed in.
    pub async fn start_checkout(&self) -> Option<Result<String, ClientError>> {
        let identity = self.sync.identity().await?;
        Some(self.client.checkout(&identity).await)
    }

    pub async fn manage_subscription(&self) -> Option<Result<String, ClientError>> {
        self.entitlement.portal_url(&self.client).await
    }

    pub async fn handle_checkout_redirect(&mut self, query: &str) -> Option<bool> {
        let upgraded = self
            .entitlement
            .handle_checkout_redirect(&self.sync, query)
            .await;
        self.gate.set_premium(self.entitlement.is_premium());
        upgraded
    }

    /// Re-checks premium status with the backend. Does nothing when signed out.
    pub async fn refresh_entitlement(&mut self) -> Option<Result<bool, ClientError>> {
        let identity = self.sync.identity().await?;
        let result = self
            .entitlement
            .refresh(&self.sync, &self.client, &identity)
            .await
            .map(|state| state.is_premium);
        self.gate.set_premium(self.entitlement.is_premium());
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::persist::test_support::day;
    use ember::{MemoryRemote, RemoteDocument};

    fn proxy() -> ProxyConfig {
        ProxyConfig {
            base_url: "http://127.0.0.1:9".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_in_pulls_premium_into_the_gate() {
        let remote = Arc::new(MemoryRemote::new());
        let mut document = RemoteDocument::new("u1");
        document.data.insert("shine-premium".to_string(), true.into());
        document
            .data
            .insert("shine-moods".to_string(), serde_json::json!({"2025-08-01": 2}));
        remote.insert(document);

        let sync = SyncCoordinator::new(LocalStore::in_memory(), remote.clone(), SyncConfig::default());
        let today = day(2025, 8, 2);
        let mut app = DailyShine::open(sync, proxy(), today).await;
        assert_eq!(app.gate().remaining(), Some(3));
        assert!(app.start_checkout().await.is_none());

        assert_eq!(
            app.sign_in(Identity::new("u1", None)).await,
            AttachOutcome::Pulled { records: 2 }
        );
        assert!(app.entitlement().is_premium());
        assert_eq!(app.gate().remaining(), None);

        assert_eq!(app.save_mood(Mood::GREAT).await, 2);
        tokio::time::sleep(Duration::from_millis(2500)).await;
        let pushed = remote.document("u1").unwrap();
        assert_eq!(
            pushed.data["shine-moods"],
            serde_json::json!({"2025-08-01": 2, "2025-08-02": 5})
        );
        assert_eq!(pushed.data["shine-streak"], serde_json::json!(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_out_flushes_pending_writes() {
        let remote = Arc::new(MemoryRemote::new());
        let sync = SyncCoordinator::new(LocalStore::in_memory(), remote.clone(), SyncConfig::default());
        let mut app = DailyShine::open(sync, proxy(), day(2025, 8, 2)).await;

        assert_eq!(app.sign_in(Identity::new("u1", None)).await, AttachOutcome::Fresh);
        assert!(app.toggle_challenge().await);
        assert!(app.save_gratitude("friends").await);
        assert_eq!(remote.saves(), 0);

        assert!(matches!(app.sign_out().await, Some(PushOutcome::Pushed { .. })));
        let pushed = remote.document("u1").unwrap();
        assert_eq!(pushed.data["shine-challenge-2025-08-02"], serde_json::json!(true));
        assert_eq!(pushed.data["shine-gratitude-2025-08-02"], serde_json::json!("friends"));
    }

    #[tokio::test]
    async fn test_checkout_redirect_lifts_the_limit() {
        let sync = SyncCoordinator::new(
            LocalStore::in_memory(),
            Arc::new(MemoryRemote::new()),
            SyncConfig::default(),
        );
        let mut app = DailyShine::open(sync, proxy(), day(2025, 8, 2)).await;
        assert_eq!(app.gate().remaining(), Some(FREE_AI_LIMIT));

        assert_eq!(app.handle_checkout_redirect("?upgraded=true").await, Some(true));
        assert_eq!(app.gate().remaining(), None);
        assert!(app.manage_subscription().await.is_none());
    }

    #[tokio::test]
    async fn test_new_day_resets_daily_state() {
        let sync = ShineDocument::coordinator(
            LocalStore::in_memory(),
            Arc::new(MemoryRemote::new()),
            SyncConfig::default(),
        );
        let mut app = DailyShine::open(sync, proxy(), day(2025, 8, 2)).await;
        assert!(app.toggle_challenge().await);
        assert!(app.save_gratitude("coffee").await);
        app.gate.record_attempt(&app.sync).await;
        app.gate.record_attempt(&app.sync).await;
        assert_eq!(app.gate().remaining(), Some(FREE_AI_LIMIT - 2));

        app.set_today(day(2025, 8, 3)).await;
        assert_eq!(app.today(), day(2025, 8, 3));
        assert!(!app.challenge().completed());
        assert_eq!(app.gate().remaining(), Some(FREE_AI_LIMIT));
        assert!(app.journal().entry(day(2025, 8, 3)).is_none());
        assert!(app.journal().entry(day(2025, 8, 2)).is_some());

        app.set_today(day(2025, 8, 2)).await;
        assert!(app.challenge().completed());
        assert_eq!(app.gate().remaining(), Some(FREE_AI_LIMIT - 2));
    }
}
