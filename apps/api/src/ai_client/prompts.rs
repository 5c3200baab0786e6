//! Prompt templates for every AI call in Viva.
//!
//! Each operation resolves its prompt through a `PromptRegistry`: an optional
//! JSON file can override individual entries at startup, and a compiled-in
//! default always exists for every key, so no AI call ever depends on mutable
//! external configuration being reachable.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

pub const GENERATE_QUESTIONS: &str = "generate_questions";
pub const ANALYZE_CV: &str = "analyze_cv";
pub const EVALUATE_ANSWER: &str = "evaluate_answer";
pub const PERSONALITY_PROFILE: &str = "personality_profile";

/// A fully-resolved prompt: system message, user template, model, temperature.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptSpec {
    pub system: String,
    pub template: String,
    pub model: String,
    pub temperature: f32,
}

/// Key -> prompt lookup with compiled-in defaults.
#[derive(Debug, Clone)]
pub struct PromptRegistry {
    overrides: HashMap<String, PromptSpec>,
}

impl PromptRegistry {
    /// Registry with built-in prompts only.
    pub fn defaults() -> Self {
        Self {
            overrides: HashMap::new(),
        }
    }

    /// Loads overrides from a JSON file of the form
    /// `{"evaluate_answer": {"system": ..., "template": ..., "model": ..., "temperature": ...}}`.
    /// Keys not present in the file fall back to the built-in prompts.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read prompt config {}", path.display()))?;
        let overrides: HashMap<String, PromptSpec> = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid prompt config {}", path.display()))?;
        info!(
            "Loaded {} prompt override(s) from {}",
            overrides.len(),
            path.display()
        );
        Ok(Self { overrides })
    }

    /// Resolves a prompt by key, falling back to the built-in default.
    pub fn resolve(&self, key: &str) -> PromptSpec {
        self.overrides
            .get(key)
            .cloned()
            .unwrap_or_else(|| builtin(key))
    }
}

/// Substitutes `{name}` placeholders in a template.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in values {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    out
}

fn builtin(key: &str) -> PromptSpec {
    match key {
        GENERATE_QUESTIONS => PromptSpec {
            system: "You are an expert HR interviewer who creates insightful pre-screening questions."
                .to_string(),
            template: GENERATE_QUESTIONS_TEMPLATE.to_string(),
            model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: 0.7,
        },
        ANALYZE_CV => PromptSpec {
            system: "You are an expert HR recruiter analyzing candidate CVs.".to_string(),
            template: ANALYZE_CV_TEMPLATE.to_string(),
            model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: 0.5,
        },
        EVALUATE_ANSWER => PromptSpec {
            system: "You are an expert HR interviewer evaluating candidate responses.".to_string(),
            template: EVALUATE_ANSWER_TEMPLATE.to_string(),
            model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: 0.5,
        },
        PERSONALITY_PROFILE => PromptSpec {
            system: "You are an expert HR psychologist creating candidate personality profiles."
                .to_string(),
            template: PERSONALITY_PROFILE_TEMPLATE.to_string(),
            model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: 0.6,
        },
        other => unreachable!("unknown prompt key: {other}"),
    }
}

const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

const GENERATE_QUESTIONS_TEMPLATE: &str = r#"Based on the following job description, generate 5-8 relevant pre-screening interview questions.
For each question, assign a weightage (importance score) from 1-20, where higher numbers indicate more important questions.

Job Description:
{job_description}

Return the response as a JSON array in this exact format:
[
    {"text": "Question text here?", "weightage": 15},
    {"text": "Another question?", "weightage": 10}
]

Make sure questions are:
1. Relevant to the job requirements
2. Open-ended to allow detailed responses
3. Assess key skills and experience
4. Clear and professional"#;

const ANALYZE_CV_TEMPLATE: &str = r#"Analyze the following CV and compare it with the job description.
Provide:
1. A concise summary of the candidate's experience and expertise (2-3 sentences)
2. A matching percentage (0-100) indicating how well the candidate fits the job

Job Description:
{job_description}

Candidate CV:
{cv_text}

Return response as JSON:
{
    "summary": "Brief summary here",
    "matching_percentage": 75.5
}"#;

const EVALUATE_ANSWER_TEMPLATE: &str = r#"Evaluate this interview answer on a scale relative to the question's weightage of {weightage}.

Question: {question}
Answer: {answer}

Consider:
1. Relevance to the question
2. Depth and detail
3. Clarity and communication
4. Professional presentation

Return a JSON with:
{
    "score": <number between 0 and {weightage}>,
    "feedback": "Brief feedback on the answer"
}"#;

const PERSONALITY_PROFILE_TEMPLATE: &str = r#"Based on the candidate's CV summary and interview answers, create a brief personality profile (3-4 sentences).

CV Summary:
{cv_summary}

Interview Answers:
{answers}

Focus on:
1. Communication style
2. Problem-solving approach
3. Professional demeanor
4. Key personality traits relevant to workplace"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_fill_replaces_placeholders() {
        let out = fill("Q: {question} W: {weightage}", &[("question", "why?"), ("weightage", "10")]);
        assert_eq!(out, "Q: why? W: 10");
    }

    #[test]
    fn test_defaults_resolve_every_key() {
        let registry = PromptRegistry::defaults();
        for key in [GENERATE_QUESTIONS, ANALYZE_CV, EVALUATE_ANSWER, PERSONALITY_PROFILE] {
            let spec = registry.resolve(key);
            assert!(!spec.template.is_empty(), "empty template for {key}");
            assert!(!spec.model.is_empty());
        }
    }

    #[test]
    fn test_override_file_wins_for_listed_keys_only() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"evaluate_answer": {{"system": "s", "template": "t {{answer}}", "model": "m", "temperature": 0.1}}}}"#
        )
        .unwrap();

        let registry = PromptRegistry::load(file.path()).unwrap();
        let overridden = registry.resolve(EVALUATE_ANSWER);
        assert_eq!(overridden.model, "m");
        assert_eq!(overridden.template, "t {answer}");

        // Unlisted keys still resolve to the built-in default.
        let default = registry.resolve(ANALYZE_CV);
        assert_eq!(default.model, DEFAULT_CHAT_MODEL);
    }

    #[test]
    fn test_invalid_override_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(PromptRegistry::load(file.path()).is_err());
    }
}
