//! Canned answers used whenever the AI is unavailable or the free allowance is spent.
//!
//! Choices are deterministic: the same input always picks the same entry.

use shine_types::assist::{CompassionLetter, Reframe, WeeklyInsight};

use crate::mood::Mood;

/// Index into a list of `len` items chosen by a string hash of `seed`.
///
/// Used for "content of the day" as well, so the hash must stay stable: it is the
/// 32-bit `hash * 31 + code_unit` over UTF-16 code units.
pub fn seeded_index(seed: &str, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let hash = seed.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit))
    });
    hash.unsigned_abs() as usize % len
}

struct LocalReframe {
    keywords: &'static [&'static str],
    validation: &'static str,
    reframe: &'static str,
    technique: &'static str,
    action: &'static str,
}

impl LocalReframe {
    fn to_reframe(&self) -> Reframe {
        Reframe {
            validation: self.validation.to_string(),
            reframe: self.reframe.to_string(),
            technique: self.technique.to_string(),
            action: self.action.to_string(),
        }
    }
}

const LOCAL_REFRAMES: &[LocalReframe] = &[
    LocalReframe {
        keywords: &["not good enough", "not enough", "inadequate", "worthless", "useless"],
        validation: "That feeling of not being enough is painful, and it's more common than you think.",
        reframe: "You don't have to be perfect to be valuable. Your worth isn't measured by productivity or achievements. It's inherent.",
        technique: "Self-Compassion Reframe",
        action: "Write down one thing you did well today, no matter how small.",
    },
    LocalReframe {
        keywords: &["fail", "failure", "messed up", "screwed up", "ruined", "mistake"],
        validation: "Making mistakes feels terrible, especially when you care about doing well.",
        reframe: "Failure isn't the opposite of success. It's part of it. Every person you admire has a long list of failures you've never seen.",
        technique: "Growth Mindset Shift",
        action: "Ask yourself: what's one thing this taught me?",
    },
    LocalReframe {
        keywords: &["alone", "lonely", "no one", "nobody cares", "isolated"],
        validation: "Feeling disconnected is one of the most painful human experiences.",
        reframe: "Loneliness is a signal, not a life sentence. It means you value connection, and that capacity is still in you, waiting.",
        technique: "Evidence-Based Thinking",
        action: "Send one text to someone you haven't talked to in a while.",
    },
    LocalReframe {
        keywords: &["anxious", "anxiety", "worried", "scared", "afraid", "panic", "nervous"],
        validation: "Anxiety is exhausting, and it's your brain trying to protect you, even when it overshoots.",
        reframe: "You've survived every anxious moment so far. This feeling is temporary, not a prediction of the future.",
        technique: "Decatastrophizing",
        action: "Take three slow breaths: in for 4, hold for 4, out for 6.",
    },
    LocalReframe {
        keywords: &["hate myself", "hate my", "self-hate", "disgusting", "ugly", "stupid", "dumb", "idiot"],
        validation: "Being that harsh with yourself takes a real toll. You don't deserve that cruelty.",
        reframe: "Would you say this to someone you love? You deserve the same gentleness you'd give a friend in pain.",
        technique: "Cognitive Restructuring",
        action: "Look in the mirror and say one kind thing to yourself, even if it feels weird.",
    },
    LocalReframe {
        keywords: &["can't", "impossible", "never", "hopeless", "give up", "stuck", "trapped"],
        validation: "Feeling stuck is incredibly frustrating, especially when you've been trying hard.",
        reframe: "Feeling stuck isn't the same as being stuck. Sometimes the path forward just isn't visible yet. That doesn't mean it doesn't exist.",
        technique: "Decatastrophizing",
        action: "Identify one tiny step. Not the whole solution, just one step.",
    },
    LocalReframe {
        keywords: &["tired", "exhausted", "burnt out", "burnout", "overwhelmed", "too much"],
        validation: "Your exhaustion is real and valid, not a sign of weakness.",
        reframe: "Rest isn't quitting. Your body and mind are telling you something important. Listening to that is strength, not laziness.",
        technique: "Self-Compassion Reframe",
        action: "Give yourself permission to do 50% today. That's enough.",
    },
    LocalReframe {
        keywords: &["behind", "falling behind", "everyone else", "comparison", "compared to"],
        validation: "Comparing yourself to others is natural, but it almost always distorts reality.",
        reframe: "You're comparing your behind-the-scenes to everyone else's highlight reel. Their timeline is not your timeline.",
        technique: "Cognitive Restructuring",
        action: "Unfollow one account that makes you feel behind.",
    },
];

const DEFAULT_REFRAME: LocalReframe = LocalReframe {
    keywords: &[],
    validation: "What you're feeling right now is real, and it matters.",
    reframe: "This thought feels true right now, but feelings aren't facts. You've gotten through hard moments before, and this one is no different.",
    technique: "Cognitive Restructuring",
    action: "Write this thought on paper, then write a kinder version next to it.",
};

/// The first table entry with a keyword appearing in the thought.
pub fn local_reframe(thought: &str) -> Reframe {
    let lower = thought.to_lowercase();
    LOCAL_REFRAMES
        .iter()
        .find(|entry| entry.keywords.iter().any(|keyword| lower.contains(keyword)))
        .unwrap_or(&DEFAULT_REFRAME)
        .to_reframe()
}

const LOCAL_LETTERS: [[&str; 4]; 5] = [
    [
        "Hey, I see you right now.",
        "What you're going through is hard, and it's okay to feel the weight of it. You don't have to have it all figured out today. Just being here, still trying, says more about your strength than you realize.",
        "With all the kindness you deserve,",
        "Your Kinder Self",
    ],
    [
        "Hi, I know today is heavy.",
        "You're carrying more than most people see, and that takes real courage. Give yourself the same grace you'd give your best friend. You're not falling apart. You're being human.",
        "Gently and with love,",
        "The Part of You That Knows Better",
    ],
    [
        "Hey, take a breath with me.",
        "Whatever happened today doesn't define you. You've been through hard things before and you're still here. That resilience isn't nothing. It's everything.",
        "You've got this. I promise.",
        "Your Compassionate Side",
    ],
    [
        "I know you're being hard on yourself.",
        "But here's what I see: someone who cares deeply, tries their best, and holds themselves to a standard they'd never impose on anyone else. Ease up. You deserve your own kindness.",
        "With warmth and no judgment,",
        "Your Wiser Self",
    ],
    [
        "Hey, it's okay to not be okay.",
        "You don't need to perform strength right now. Sometimes the bravest thing is admitting you're struggling. Tomorrow will come with its own energy. For now, just let yourself be where you are.",
        "Always in your corner,",
        "Your Kinder Self",
    ],
];

pub fn local_letter(situation: &str) -> CompassionLetter {
    let [greeting, body, closing, signature] =
        LOCAL_LETTERS[seeded_index(situation, LOCAL_LETTERS.len())];
    CompassionLetter {
        greeting: greeting.to_string(),
        body: body.to_string(),
        closing: closing.to_string(),
        signature: signature.to_string(),
    }
}

const LOCAL_ANSWERS: [&str; 6] = [
    "That's a great question. Here's what I'd suggest: start with the smallest possible step. Don't try to solve everything at once. Just do one tiny thing today that moves you in the right direction. Momentum builds from there.",
    "I hear you. When things feel heavy, remember this: you don't have to figure it all out right now. Give yourself permission to take it one day at a time. That's not weakness, it's wisdom.",
    "Here's something that might help: write down exactly what's bothering you, then ask 'What would I tell my best friend in this situation?' We're usually kinder and wiser when advising others. Turn that compassion inward.",
    "That's something a lot of people struggle with. Try the 2-minute rule: if something takes less than 2 minutes, do it now. If it's bigger, just commit to working on it for 2 minutes. Starting is the hardest part.",
    "I think the most important thing here is to be honest with yourself about what you actually want, not what you think you should want. When you align your actions with your real values, things start to feel easier.",
    "It sounds like you might be overthinking this. Sometimes the best move is to stop analyzing and just take action. You can always course-correct later. Perfection isn't the goal. Movement is.",
];

pub fn local_answer(question: &str) -> String {
    LOCAL_ANSWERS[seeded_index(question, LOCAL_ANSWERS.len())].to_string()
}

/// A weekly insight built from the week's logged moods.
pub fn local_insight(week: &[Mood], journal_days: usize, streak: u32) -> WeeklyInsight {
    let build = |emoji: &str, headline: &str, insight: String, suggestion: &str| WeeklyInsight {
        headline: headline.to_string(),
        insight,
        suggestion: suggestion.to_string(),
        emoji: emoji.to_string(),
    };

    if week.is_empty() {
        return build(
            "🌱",
            "Your journey is just beginning",
            "You haven't logged many moods yet, and that's totally okay. Every garden starts with bare soil. The fact that you're here and exploring says something good about where you're headed.".to_string(),
            "Try logging your mood once a day this week. Even just tapping an emoji counts.",
        );
    }

    let average =
        week.iter().map(|mood| f64::from(mood.value())).sum::<f64>() / week.len() as f64;
    if average >= 4.0 {
        let journaling = if journal_days > 3 {
            "Your journaling consistency is paying off. Writing things down keeps good energy flowing."
        } else {
            "Consider journaling more to capture what's making this stretch so good."
        };
        build(
            "☀️",
            "You're riding a great wave",
            format!(
                "You've logged {} moods this week with an average around {average:.1}/5. That's a strong week! {journaling}",
                week.len()
            ),
            "Share your energy. Do something kind for someone else this week.",
        )
    } else if average >= 3.0 {
        let consistency = if streak > 3 {
            format!("Your {streak}-day streak shows real commitment.")
        } else {
            "Building consistency is the real win here.".to_string()
        };
        build(
            "🌿",
            "Steady and grounded",
            format!(
                "Your mood has been hovering around {average:.1}/5 this week. Not every week has to be a highlight reel. {consistency} Steady days build the foundation for great ones."
            ),
            "Pick one thing that usually lifts your mood and schedule it this week.",
        )
    } else {
        let honesty = if week.len() >= 5 {
            "Logging your mood even on rough days takes real honesty."
        } else {
            "Every check-in is a small act of self-care."
        };
        build(
            "💜",
            "Tough week, but you showed up",
            format!(
                "This week was harder, with your average mood around {average:.1}/5. But here's what matters: you're still here, still checking in, still trying. {honesty}"
            ),
            "Be extra gentle with yourself. Lower the bar and celebrate small wins.",
        )
    }
}
