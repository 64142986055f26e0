//! Triage agent: estimates the learner's level and what kind of help they want.

use serde::Serialize;

use super::{AgentKind, AgentReply, ReplyPayload};
use crate::models::Difficulty;

const ADVANCED_INDICATORS: &[&str] = &[
    "thread",
    "async",
    "concurrent",
    "optimization",
    "design pattern",
    "algorithm",
    "data structure",
    "memory",
    "performance",
    "framework",
    "architecture",
];
const INTERMEDIATE_INDICATORS: &[&str] = &[
    "class",
    "object",
    "inheritance",
    "method",
    "exception",
    "file",
    "module",
    "import",
    "package",
    "decorator",
    "generator",
    "iterator",
    "lambda",
];

const MAX_STEPS_IN_MESSAGE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Need {
    Debugging,
    LearningConcept,
    CodeReview,
    Exercise,
}

impl Need {
    fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::Debugging => &["error", "bug", "fix", "not working", "problem", "issue"],
            Self::LearningConcept => &["what is", "explain", "how does", "understand", "concept", "topic"],
            Self::CodeReview => &["review", "improve", "better", "optimize", "style", "best practice"],
            Self::Exercise => &["practice", "exercise", "challenge", "problem", "solve"],
        }
    }

    fn agent(self) -> AgentKind {
        match self {
            Self::Debugging => AgentKind::Debug,
            Self::LearningConcept => AgentKind::Concepts,
            Self::CodeReview => AgentKind::CodeReview,
            Self::Exercise => AgentKind::Exercise,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Debugging => "debugging",
            Self::LearningConcept => "learning_concept",
            Self::CodeReview => "code_review",
            Self::Exercise => "exercise",
        }
    }

    fn next_step(self) -> &'static str {
        match self {
            Self::Debugging => "Let me help you debug your code",
            Self::LearningConcept => "I can explain that concept in detail",
            Self::CodeReview => "I can review your code and suggest improvements",
            Self::Exercise => "I can provide practice exercises",
        }
    }
}

const ALL_NEEDS: [Need; 4] = [Need::Debugging, Need::LearningConcept, Need::CodeReview, Need::Exercise];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    pub detected_level: Difficulty,
    pub identified_needs: Vec<Need>,
    pub recommended_agent: AgentKind,
    pub next_steps: Vec<String>,
}

/// Assess a message. The most advanced matching level wins.
#[must_use]
pub fn assess(input: &str) -> Assessment {
    let lowered = input.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|w| lowered.contains(w));

    let detected_level = if mentions(ADVANCED_INDICATORS) {
        Difficulty::Advanced
    } else if mentions(INTERMEDIATE_INDICATORS) {
        Difficulty::Intermediate
    } else {
        Difficulty::Beginner
    };

    let identified_needs: Vec<Need> = ALL_NEEDS
        .into_iter()
        .filter(|need| mentions(need.keywords()))
        .collect();
    let recommended_agent = identified_needs
        .first()
        .copied()
        .map_or(AgentKind::Triage, Need::agent);

    let mut next_steps: Vec<String> = level_steps(detected_level)
        .iter()
        .map(|s| (*s).to_string())
        .collect();
    next_steps.extend(identified_needs.iter().map(|n| n.next_step().to_string()));

    Assessment { detected_level, identified_needs, recommended_agent, next_steps }
}

fn level_steps(level: Difficulty) -> &'static [&'static str] {
    match level {
        Difficulty::Beginner => &[
            "Start with basic Python concepts",
            "Try simple exercises to build confidence",
            "Focus on understanding syntax and basic constructs",
        ],
        Difficulty::Intermediate => &[
            "Practice object-oriented programming concepts",
            "Work on more complex problem-solving",
            "Learn about exception handling and file operations",
        ],
        Difficulty::Advanced => &[
            "Explore advanced Python features",
            "Study design patterns and architecture",
            "Focus on performance optimization",
        ],
    }
}

/// Render an assessment as prose.
#[must_use]
pub fn describe(assessment: &Assessment) -> String {
    let needs = if assessment.identified_needs.is_empty() {
        "general Python learning".to_string()
    } else {
        assessment
            .identified_needs
            .iter()
            .copied()
            .map(Need::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut parts = vec![
        format!("I've assessed your needs as a {} Python learner.", assessment.detected_level),
        format!("Based on your input, you seem to need help with: {needs}."),
    ];
    if assessment.recommended_agent != AgentKind::Triage {
        parts.push(format!(
            "I recommend routing you to our {} agent.",
            assessment.recommended_agent.as_str().replace('_', " ")
        ));
    }
    parts.push("Here are some suggested next steps:".to_string());
    for step in assessment.next_steps.iter().take(MAX_STEPS_IN_MESSAGE) {
        parts.push(format!("- {step}"));
    }
    parts.join(" ")
}

#[must_use]
pub fn respond(input: &str) -> AgentReply {
    let assessment = assess(input);
    AgentReply::new(AgentKind::Triage, describe(&assessment), 0.8, ReplyPayload::Assessment(assessment))
}

#[cfg(test)]
#[path = "triage_test.rs"]
mod tests;
