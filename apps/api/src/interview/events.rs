//! Wire protocol for the interview channel. JSON text frames, discriminated
//! by a `type` tag in both directions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events received from the candidate's client.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    StartInterview {
        application_id: Uuid,
    },
    AnswerSubmitted {
        question_id: Uuid,
        /// Base64, optionally with a data-URL header.
        #[serde(default)]
        audio_data: Option<String>,
        #[serde(default)]
        answer_text: Option<String>,
        /// Seconds the candidate spent answering.
        #[serde(default)]
        duration: Option<f64>,
    },
    SkipQuestion {
        question_id: Uuid,
    },
    /// Stateless one-off synthesis, independent of session state.
    RequestSpeech {
        text: String,
    },
    Ping,
}

/// Events emitted to the candidate's client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected {
        message: String,
    },
    Question {
        question_id: Uuid,
        text: String,
        weightage: i32,
        /// 1-based position within the session's committed order.
        question_number: usize,
        total_questions: usize,
    },
    /// Best-effort: omitted entirely when synthesis fails.
    SpeechGenerated {
        audio_data: String,
    },
    /// Emitted only when answer audio was transcribed server-side.
    TranscriptReceived {
        question_id: Uuid,
        transcript: String,
    },
    InterviewComplete {
        message: String,
        total_score: f64,
        total_weightage: i32,
    },
    Error {
        message: String,
    },
    Pong {
        timestamp: String,
    },
}
