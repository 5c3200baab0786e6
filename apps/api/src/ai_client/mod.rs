//! AI client — the single point of entry for all AI provider calls in Viva.
//!
//! ARCHITECTURAL RULE: No other module may call the provider API directly.
//! All AI interactions MUST go through this module.
//!
//! The transport lives behind the `AiBackend` trait so tests can swap in a
//! scripted backend. `AiService` layers the domain operations on top and owns
//! the fallback policy: every operation degrades to a typed default instead of
//! surfacing provider errors, because interview progression must never stall
//! waiting on a third party. There is deliberately no retry loop: a single
//! failure falls back immediately.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

use prompts::{fill, PromptRegistry};

const OPENAI_API_URL: &str = "https://api.openai.com/v1";
const TRANSCRIPTION_MODEL: &str = "whisper-1";
const SPEECH_MODEL: &str = "tts-1-hd";
const SPEECH_VOICE: &str = "nova";
/// CV text is truncated before prompting to stay inside context limits.
const MAX_CV_CHARS: usize = 3000;

pub const TRANSCRIPTION_FAILED: &str = "[Transcription failed]";
const PROFILE_FALLBACK: &str = "Personality profile analysis pending.";

#[derive(Debug, Error)]
pub enum AiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Provider returned empty content")]
    EmptyContent,
}

/// One chat-completion request, already resolved from a prompt template.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub temperature: f32,
    pub system: String,
    pub user: String,
}

/// Raw provider transport. Implemented by `OpenAiBackend` in production and
/// by scripted fakes in tests.
#[async_trait]
pub trait AiBackend: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<String, AiError>;
    async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<String, AiError>;
    async fn speak(&self, text: &str) -> Result<Bytes, AiError>;
}

// ---------------------------------------------------------------------------
// OpenAI transport
// ---------------------------------------------------------------------------

pub struct OpenAiBackend {
    client: Client,
    api_key: String,
}

impl OpenAiBackend {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, AiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ProviderError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(AiError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: String,
}

#[async_trait]
impl AiBackend for OpenAiBackend {
    async fn chat(&self, request: ChatRequest) -> Result<String, AiError> {
        let body = serde_json::json!({
            "model": request.model,
            "temperature": request.temperature,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.user},
            ],
        });

        let response = self
            .client
            .post(format!("{OPENAI_API_URL}/chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response).await?;

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(AiError::EmptyContent)?;

        debug!("Chat completion succeeded ({} chars)", content.len());
        Ok(content)
    }

    async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<String, AiError> {
        let part = reqwest::multipart::Part::bytes(audio)
            .file_name(filename.to_string())
            .mime_str("audio/webm")?;
        let form = reqwest::multipart::Form::new()
            .text("model", TRANSCRIPTION_MODEL)
            .part("file", part);

        let response = self
            .client
            .post(format!("{OPENAI_API_URL}/audio/transcriptions"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        let response = Self::check(response).await?;

        let parsed: TranscriptionResponse = response.json().await?;
        Ok(parsed.text)
    }

    async fn speak(&self, text: &str) -> Result<Bytes, AiError> {
        let body = serde_json::json!({
            "model": SPEECH_MODEL,
            "voice": SPEECH_VOICE,
            "input": text,
        });

        let response = self
            .client
            .post(format!("{OPENAI_API_URL}/audio/speech"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response).await?;

        Ok(response.bytes().await?)
    }
}

// ---------------------------------------------------------------------------
// Domain operations with fallback policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedQuestion {
    pub text: String,
    pub weightage: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CvAnalysis {
    pub summary: String,
    pub matching_percentage: f64,
}

#[derive(Debug, Deserialize)]
struct AnswerEvaluation {
    score: f64,
    #[allow(dead_code)]
    feedback: Option<String>,
}

/// The AI service used by all handlers and the interview orchestrator.
#[derive(Clone)]
pub struct AiService {
    backend: Arc<dyn AiBackend>,
    prompts: Arc<PromptRegistry>,
}

impl AiService {
    pub fn new(backend: Arc<dyn AiBackend>, prompts: PromptRegistry) -> Self {
        Self {
            backend,
            prompts: Arc::new(prompts),
        }
    }

    /// Generates pre-screening questions for a job description.
    /// Falls back to a generic question set on provider failure.
    pub async fn generate_questions(&self, job_description: &str) -> Vec<GeneratedQuestion> {
        let spec = self.prompts.resolve(prompts::GENERATE_QUESTIONS);
        let user = fill(&spec.template, &[("job_description", job_description)]);

        match self.chat_json::<Vec<GeneratedQuestion>>(&spec, user).await {
            Ok(questions) if !questions.is_empty() => questions
                .into_iter()
                .map(|q| GeneratedQuestion {
                    weightage: q.weightage.clamp(1, 20),
                    ..q
                })
                .collect(),
            Ok(_) => fallback_questions(),
            Err(e) => {
                warn!("Question generation failed, using fallback set: {e}");
                fallback_questions()
            }
        }
    }

    /// Summarizes a CV against a job description with a 0-100 match percentage.
    /// Falls back to a pending analysis on provider failure.
    pub async fn analyze_cv(&self, cv_text: &str, job_description: &str) -> CvAnalysis {
        if cv_text.trim().is_empty() {
            return CvAnalysis {
                summary: "Unable to extract CV content".to_string(),
                matching_percentage: 0.0,
            };
        }

        let cv_text = truncate_chars(cv_text, MAX_CV_CHARS);
        let spec = self.prompts.resolve(prompts::ANALYZE_CV);
        let user = fill(
            &spec.template,
            &[("job_description", job_description), ("cv_text", &cv_text)],
        );

        match self.chat_json::<CvAnalysis>(&spec, user).await {
            Ok(analysis) => CvAnalysis {
                matching_percentage: analysis.matching_percentage.clamp(0.0, 100.0),
                ..analysis
            },
            Err(e) => {
                warn!("CV analysis failed: {e}");
                CvAnalysis {
                    summary: "Analysis pending".to_string(),
                    matching_percentage: 0.0,
                }
            }
        }
    }

    /// Scores an answer in `0..=weightage`. Falls back to half the weightage
    /// on provider failure so scoring never blocks progression.
    pub async fn evaluate_answer(&self, question: &str, answer: &str, weightage: i32) -> f64 {
        let max = f64::from(weightage);
        let spec = self.prompts.resolve(prompts::EVALUATE_ANSWER);
        let user = fill(
            &spec.template,
            &[
                ("question", question),
                ("answer", answer),
                ("weightage", &weightage.to_string()),
            ],
        );

        match self.chat_json::<AnswerEvaluation>(&spec, user).await {
            Ok(evaluation) => evaluation.score.clamp(0.0, max),
            Err(e) => {
                warn!("Answer evaluation failed, scoring at half weightage: {e}");
                max * 0.5
            }
        }
    }

    /// Free-text personality profile from the CV summary and the Q/A block.
    /// Falls back to a placeholder profile on provider failure.
    pub async fn personality_profile(&self, cv_summary: &str, answers: &str) -> String {
        let spec = self.prompts.resolve(prompts::PERSONALITY_PROFILE);
        let user = fill(
            &spec.template,
            &[("cv_summary", cv_summary), ("answers", answers)],
        );

        match self.chat(&spec, user).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Personality profile generation failed: {e}");
                PROFILE_FALLBACK.to_string()
            }
        }
    }

    /// Transcribes answer audio. Falls back to a sentinel transcript on
    /// provider failure; the sentinel is still shown to the candidate.
    pub async fn transcribe_answer(&self, audio: Vec<u8>) -> String {
        match self.backend.transcribe(audio, "answer.webm").await {
            Ok(text) => text,
            Err(e) => {
                warn!("Transcription failed: {e}");
                TRANSCRIPTION_FAILED.to_string()
            }
        }
    }

    /// Synthesizes speech for a question. `None` on failure; the caller
    /// suppresses the speech event entirely.
    pub async fn synthesize_speech(&self, text: &str) -> Option<Bytes> {
        match self.backend.speak(text).await {
            Ok(audio) => Some(audio),
            Err(e) => {
                warn!("Speech synthesis failed: {e}");
                None
            }
        }
    }

    async fn chat(&self, spec: &prompts::PromptSpec, user: String) -> Result<String, AiError> {
        self.backend
            .chat(ChatRequest {
                model: spec.model.clone(),
                temperature: spec.temperature,
                system: spec.system.clone(),
                user,
            })
            .await
    }

    async fn chat_json<T: serde::de::DeserializeOwned>(
        &self,
        spec: &prompts::PromptSpec,
        user: String,
    ) -> Result<T, AiError> {
        let text = self.chat(spec, user).await?;
        serde_json::from_str(strip_json_fences(&text)).map_err(AiError::Parse)
    }
}

fn fallback_questions() -> Vec<GeneratedQuestion> {
    vec![
        GeneratedQuestion {
            text: "What relevant experience do you have for this position?".to_string(),
            weightage: 15,
        },
        GeneratedQuestion {
            text: "What are your key strengths?".to_string(),
            weightage: 12,
        },
        GeneratedQuestion {
            text: "Why are you interested in this role?".to_string(),
            weightage: 10,
        },
    ]
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
