//! The AI-assisted features: weekly insight, thought reframing, self-compassion letters
//! and the coach chat.
//!
//! Every feature goes through the [`MeteringGate`] first and always produces an answer:
//! when the allowance is spent, the proxy signals a fallback, the request fails, or the
//! model's output doesn't parse, a canned answer from [`crate::fallback`] is used instead.

use ember::SyncCoordinator;
use serde::de::DeserializeOwned;
use shine_types::{
    DateKey,
    assist::{
        AiRequest, ChatMessage, CompassionLetter, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, ProxyReply,
        Reframe, WeeklyInsight,
    },
    keys::Daily,
};

use crate::{
    client::{BackendClient, ClientError},
    fallback,
    journal::Journal,
    metering::MeteringGate,
    mood::MoodLog,
    persist::{load_json, save_json},
};

const COACH_MAX_TOKENS: u32 = 400;
/// How many earlier chat turns are sent along with a new question.
const COACH_HISTORY: usize = 6;

const INSIGHT_PROMPT: &str = "You're a warm wellbeing coach analyzing a user's mood and journal data from their positivity app. Give them a personalized weekly insight. Be specific to their data. Warm but honest.";

const REFRAME_PROMPT: &str = "You are a warm, compassionate cognitive reframing coach inside a daily positivity app called Daily Shine. The user will share a negative thought, and your job is to help them see it from a healthier perspective. Don't be toxic-positive: be honest but kind. Be warm but not cheesy. Sound like a wise friend, not a therapist robot.";

const LETTER_PROMPT: &str = "You are a self-compassion coach inside a positivity app. The user will describe something they're struggling with or feeling bad about. Write them a short, warm letter FROM their most compassionate self TO them. Acknowledge their pain, remind them of their humanity, offer perspective. Be real, not saccharine. No toxic positivity.";

const COACH_PROMPT: &str = "You are a warm, wise positivity coach inside an app called Daily Shine. Users come to you with questions about life, mindset, motivation, relationships, stress, self-improvement, and wellbeing.

Rules:
- Keep answers to 2-4 sentences max
- Be warm, direct, and practical, like a wise friend, not a therapist
- Give actionable advice when possible
- No toxic positivity. Be honest but kind
- If someone seems to be in crisis, gently suggest they talk to a professional or trusted person
- Never diagnose or prescribe medical/psychological treatment";

#[derive(Debug, thiserror::Error)]
pub enum AssistError {
    #[error("today's free AI allowance is used up")]
    QuotaExhausted,
    #[error("the AI proxy asked for a local answer")]
    Fallback,
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("the model's answer wasn't valid: {0}")]
    Unparseable(#[from] serde_json::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    Ai,
    Local,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Answer<T> {
    pub value: T,
    pub source: Source,
}

fn resolve<T>(feature: &str, result: Result<T, AssistError>, local: impl FnOnce() -> T) -> Answer<T> {
    match result {
        Ok(value) => Answer {
            value,
            source: Source::Ai,
        },
        Err(e) => {
            match e {
                AssistError::QuotaExhausted | AssistError::Fallback => {
                    log::info!("Using local {feature}: {e}")
                }
                AssistError::Client(_) | AssistError::Unparseable(_) => {
                    log::warn!("Using local {feature}: {e}")
                }
            }
            Answer {
                value: local(),
                source: Source::Local,
            }
        }
    }
}

/// Models sometimes wrap JSON in markdown fences despite being asked not to.
fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

/// The system prompt for a structured answer: the persona, then the shape to answer in.
fn structured_prompt<T: schemars::JsonSchema>(persona: &str) -> String {
    let schema = serde_json::to_string_pretty(&schemars::schema_for!(T)).unwrap_or_default();
    format!(
        "{persona}\n\nRespond with ONLY a JSON object (no markdown, no backticks, no preamble) matching this JSON schema:\n{schema}"
    )
}

fn request(system: String, messages: Vec<ChatMessage>, max_tokens: u32) -> AiRequest {
    AiRequest {
        model: Some(DEFAULT_MODEL.to_string()),
        max_tokens: Some(max_tokens),
        system,
        messages,
    }
}

pub struct Assistant {
    client: BackendClient,
}

impl Assistant {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }

    async fn complete(
        &self,
        sync: &SyncCoordinator,
        gate: &mut MeteringGate,
        request: &AiRequest,
    ) -> Result<String, AssistError> {
        if !gate.allowed() {
            return Err(AssistError::QuotaExhausted);
        }
        gate.record_attempt(sync).await;

        match self.client.complete(request).await? {
            ProxyReply::Fallback(_) => Err(AssistError::Fallback),
            ProxyReply::Completion(completion) => Ok(completion.text()),
        }
    }

    async fn structured<T: DeserializeOwned>(
        &self,
        sync: &SyncCoordinator,
        gate: &mut MeteringGate,
        request: &AiRequest,
    ) -> Result<T, AssistError> {
        let text = self.complete(sync, gate, request).await?;
        Ok(serde_json::from_str(strip_code_fences(&text))?)
    }

    /// The insight already generated today, if any.
    pub async fn saved_insight(sync: &SyncCoordinator, today: DateKey) -> Option<WeeklyInsight> {
        load_json(sync, &Daily::Insight.key(today)).await
    }

    pub async fn weekly_insight(
        &self,
        sync: &SyncCoordinator,
        gate: &mut MeteringGate,
        moods: &MoodLog,
        journal: &Journal,
        today: DateKey,
    ) -> Answer<WeeklyInsight> {
        let week = moods.mood_days(today, 7);
        let mood_summary = week
            .iter()
            .filter_map(|day| {
                let mood = day.mood?;
                Some(format!(
                    "{}: {} ({}/5)",
                    day.label(today, 7),
                    mood.label(),
                    mood.value()
                ))
            })
            .collect::<Vec<_>>()
            .join(", ");
        let recent_entries = journal
            .recent(5)
            .into_iter()
            .map(|(date, entry)| {
                format!(
                    "{date}: gratitude=\"{}\", wins={}, evening=\"{}\"",
                    entry.gratitude.as_deref().unwrap_or("none"),
                    serde_json::to_string(entry.wins.as_ref().map_or(&[][..], |w| &w[..]))
                        .unwrap_or_default(),
                    entry
                        .evening
                        .as_ref()
                        .map_or("none", |evening| evening.reflection.as_str()),
                )
            })
            .collect::<Vec<_>>()
            .join("; ");
        let message = format!(
            "My mood this week: {}. Journal entries: {}. Streak: {} days.",
            if mood_summary.is_empty() {
                "No moods logged yet"
            } else {
                mood_summary.as_str()
            },
            if recent_entries.is_empty() {
                "None yet"
            } else {
                recent_entries.as_str()
            },
            moods.streak(),
        );

        let request = request(
            structured_prompt::<WeeklyInsight>(INSIGHT_PROMPT),
            vec![ChatMessage::user(message)],
            DEFAULT_MAX_TOKENS,
        );
        let result = self.structured(sync, gate, &request).await;
        let answer = resolve("insight", result, || {
            let logged: Vec<_> = week.iter().filter_map(|day| day.mood).collect();
            fallback::local_insight(&logged, journal.len(), moods.streak())
        });

        let _ = save_json(sync, &Daily::Insight.key(today), &answer.value).await;
        answer
    }

    /// `None` if the thought is blank.
    pub async fn reframe(
        &self,
        sync: &SyncCoordinator,
        gate: &mut MeteringGate,
        thought: &str,
    ) -> Option<Answer<Reframe>> {
        let thought = thought.trim();
        if thought.is_empty() {
            return None;
        }
        let request = request(
            structured_prompt::<Reframe>(REFRAME_PROMPT),
            vec![ChatMessage::user(thought)],
            DEFAULT_MAX_TOKENS,
        );
        let result = self.structured(sync, gate, &request).await;
        Some(resolve("reframe", result, || fallback::local_reframe(thought)))
    }

    /// `None` if the situation is blank.
    pub async fn compassion_letter(
        &self,
        sync: &SyncCoordinator,
        gate: &mut MeteringGate,
        situation: &str,
    ) -> Option<Answer<CompassionLetter>> {
        let situation = situation.trim();
        if situation.is_empty() {
            return None;
        }
        let request = request(
            structured_prompt::<CompassionLetter>(LETTER_PROMPT),
            vec![ChatMessage::user(situation)],
            DEFAULT_MAX_TOKENS,
        );
        let result = self.structured(sync, gate, &request).await;
        Some(resolve("letter", result, || fallback::local_letter(situation)))
    }

    /// Answers `question` in the context of the conversation so far.
    /// `None` if the question is blank.
    pub async fn ask_coach(
        &self,
        sync: &SyncCoordinator,
        gate: &mut MeteringGate,
        conversation: &[ChatMessage],
        question: &str,
    ) -> Option<Answer<String>> {
        let question = question.trim();
        if question.is_empty() {
            return None;
        }
        let mut messages =
            conversation[conversation.len().saturating_sub(COACH_HISTORY)..].to_vec();
        messages.push(ChatMessage::user(question));

        let request = request(COACH_PROMPT.to_string(), messages, COACH_MAX_TOKENS);
        let result = self
            .complete(sync, gate, &request)
            .await
            .map(|text| text.trim().to_string());
        Some(resolve("coach answer", result, || fallback::local_answer(question)))
    }
}
