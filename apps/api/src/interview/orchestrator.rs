//! Interview orchestrator — drives a candidate through the session's
//! committed question order, one answered-or-skipped question per step.
//!
//! Each inbound event is processed under the session's own lock and returns
//! the ordered list of server events to emit. Speech synthesis is not part of
//! the transition path: the socket layer runs it as a detached follow-up so a
//! synthesis failure can never affect state-machine correctness.

use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::ai_client::AiService;
use crate::audio::{decode_payload, AudioPipeline};
use crate::interview::events::ServerEvent;
use crate::interview::session::{
    shuffle_question_order, InterviewSession, SessionStore, TranscriptEntry,
};
use crate::interview::store::{InterviewStore, NewAnswer};
use crate::notify::Notifier;

/// Sentinel answer text persisted for skipped questions.
const SKIPPED_ANSWER_TEXT: &str = "Answer skipped by Candidate";

const COMPLETION_MESSAGE: &str = "Thank you for completing the interview! \
     Our team will review your application and reach out if we move forward together.";

#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn InterviewStore>,
    ai: AiService,
    audio: AudioPipeline,
    notifier: Arc<dyn Notifier>,
    sessions: SessionStore,
    /// Fixed shuffle seed for deterministic question order in tests.
    shuffle_seed: Option<u64>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn InterviewStore>,
        ai: AiService,
        audio: AudioPipeline,
        notifier: Arc<dyn Notifier>,
        sessions: SessionStore,
        shuffle_seed: Option<u64>,
    ) -> Self {
        Self {
            store,
            ai,
            audio,
            notifier,
            sessions,
            shuffle_seed,
        }
    }

    /// Creates the session and emits the first question. Valid only when the
    /// connection has no active session.
    pub async fn start_interview(
        &self,
        connection_id: Uuid,
        application_id: Uuid,
    ) -> Vec<ServerEvent> {
        if self.sessions.get(connection_id).is_some() {
            return vec![error_event("Interview already in progress")];
        }

        let application = match self.store.application(application_id).await {
            Ok(Some(application)) => application,
            Ok(None) => return vec![error_event("Application not found")],
            Err(e) => {
                error!("Failed to load application {application_id}: {e:#}");
                return vec![error_event("Failed to start interview")];
            }
        };

        let questions = match self.store.questions_for_job(application.job_id).await {
            Ok(questions) => questions,
            Err(e) => {
                error!("Failed to load questions for job {}: {e:#}", application.job_id);
                return vec![error_event("Failed to start interview")];
            }
        };
        if questions.is_empty() {
            return vec![error_event("No questions found for this job")];
        }

        // The permutation is committed once here and reused for the whole
        // session; it never changes afterwards.
        let order = shuffle_question_order(
            questions.iter().map(|q| q.id).collect(),
            self.shuffle_seed,
        );
        let total = order.len();
        let first = questions
            .iter()
            .find(|q| q.id == order[0])
            .expect("shuffled order contains unknown question id");
        let first_event = ServerEvent::Question {
            question_id: first.id,
            text: first.text.clone(),
            weightage: first.weightage,
            question_number: 1,
            total_questions: total,
        };

        let session = InterviewSession::new(application_id, order);
        if self.sessions.insert(connection_id, session).is_none() {
            return vec![error_event("Interview already in progress")];
        }

        info!(
            %connection_id, %application_id,
            "Interview started with {total} questions"
        );
        vec![first_event]
    }

    /// Processes a submitted answer: audio intake, transcription when no text
    /// was supplied, scoring, durable commit, then cursor advancement.
    pub async fn submit_answer(
        &self,
        connection_id: Uuid,
        question_id: Uuid,
        audio_data: Option<String>,
        answer_text: Option<String>,
        duration: Option<f64>,
    ) -> Vec<ServerEvent> {
        let Some(session) = self.sessions.get(connection_id) else {
            return vec![error_event("No active session")];
        };
        let mut session = session.lock().await;

        let Some(expected) = session.current_question() else {
            return vec![error_event("No more questions")];
        };
        // Lenient policy on the answer path: the answer is scored against the
        // submitted question id even when it differs from the expected one.
        // Skip is strict; see DESIGN.md for the asymmetry.
        if expected != question_id {
            warn!(
                %connection_id, %question_id, %expected,
                "Answer submitted for a question other than the current one"
            );
        }

        let mut events = Vec::new();

        let mut audio_path = None;
        let mut audio_bytes = None;
        if let Some(payload) = audio_data.as_deref() {
            match decode_payload(payload) {
                Ok(bytes) => {
                    match self
                        .audio
                        .store(&bytes, session.application_id, question_id)
                        .await
                    {
                        Ok(path) => audio_path = Some(path),
                        Err(e) => warn!("Failed to persist answer audio: {e}"),
                    }
                    audio_bytes = Some(bytes);
                }
                Err(e) => warn!("Discarding undecodable answer audio: {e}"),
            }
        }

        // Transcribe only when the client sent no text. The transcript (the
        // failure sentinel included) is surfaced to the candidate and is
        // what gets scored and stored.
        let answer_text = match answer_text.filter(|t| !t.trim().is_empty()) {
            Some(text) => text,
            None => match audio_bytes {
                Some(bytes) => {
                    let transcript = self.ai.transcribe_answer(bytes).await;
                    events.push(ServerEvent::TranscriptReceived {
                        question_id,
                        transcript: transcript.clone(),
                    });
                    transcript
                }
                None => String::new(),
            },
        };

        let question = match self.store.question(question_id).await {
            Ok(Some(question)) => question,
            Ok(None) => {
                events.push(error_event("Question not found"));
                return events;
            }
            Err(e) => {
                error!("Failed to load question {question_id}: {e:#}");
                events.push(error_event("Question not found"));
                return events;
            }
        };

        let score = self
            .ai
            .evaluate_answer(&question.text, &answer_text, question.weightage)
            .await;

        let answer = NewAnswer {
            application_id: session.application_id,
            question_id,
            answer_text: answer_text.clone(),
            audio_path,
            score,
            weightage: question.weightage,
            duration,
        };
        if let Err(e) = self.store.record_answer(answer).await {
            // Nothing advanced: the client may resubmit this answer.
            error!("Failed to persist answer: {e:#}");
            events.push(error_event("Failed to save answer"));
            return events;
        }

        session.record(TranscriptEntry {
            question: question.text,
            answer: answer_text,
            score,
        });

        self.advance(&mut events, connection_id, &mut session).await;
        events
    }

    /// Skips the current question. Unlike the answer path, the supplied
    /// question id must match the session cursor exactly.
    pub async fn skip_question(&self, connection_id: Uuid, question_id: Uuid) -> Vec<ServerEvent> {
        let Some(session) = self.sessions.get(connection_id) else {
            return vec![error_event("No active session")];
        };
        let mut session = session.lock().await;

        let Some(expected) = session.current_question() else {
            return vec![error_event("No more questions to skip")];
        };
        if expected != question_id {
            return vec![error_event("Question mismatch")];
        }

        let question = match self.store.question(question_id).await {
            Ok(Some(question)) => question,
            Ok(None) => return vec![error_event("Question not found")],
            Err(e) => {
                error!("Failed to load question {question_id}: {e:#}");
                return vec![error_event("Question not found")];
            }
        };

        let answer = NewAnswer {
            application_id: session.application_id,
            question_id,
            answer_text: SKIPPED_ANSWER_TEXT.to_string(),
            audio_path: None,
            score: 0.0,
            weightage: question.weightage,
            duration: Some(0.0),
        };
        if let Err(e) = self.store.record_answer(answer).await {
            error!("Failed to persist skipped answer: {e:#}");
            return vec![error_event("Failed to save answer")];
        }

        session.record(TranscriptEntry {
            question: question.text,
            answer: SKIPPED_ANSWER_TEXT.to_string(),
            score: 0.0,
        });

        let mut events = Vec::new();
        self.advance(&mut events, connection_id, &mut session).await;
        events
    }

    /// Destroys the connection's session, if any. No persistence side effect:
    /// answers already committed stay; anything in flight is lost.
    pub fn disconnect(&self, connection_id: Uuid) {
        if self.sessions.remove(connection_id).is_some() {
            info!(%connection_id, "Session destroyed on disconnect");
        }
    }

    /// Emits the next question, or finalizes when the order is exhausted.
    async fn advance(
        &self,
        events: &mut Vec<ServerEvent>,
        connection_id: Uuid,
        session: &mut InterviewSession,
    ) {
        if session.is_exhausted() {
            self.finalize(events, connection_id, session).await;
            return;
        }

        let next_id = session
            .current_question()
            .expect("non-exhausted session has a current question");
        match self.store.question(next_id).await {
            Ok(Some(question)) => events.push(ServerEvent::Question {
                question_id: question.id,
                text: question.text,
                weightage: question.weightage,
                question_number: session.cursor + 1,
                total_questions: session.question_order.len(),
            }),
            Ok(None) => {
                warn!("Question {next_id} disappeared mid-session");
                events.push(error_event("Question not found"));
            }
            Err(e) => {
                error!("Failed to load question {next_id}: {e:#}");
                events.push(error_event("Failed to load next question"));
            }
        }
    }

    /// One-time completion: personality synthesis, durable completion update,
    /// candidate notification, completion event, session teardown.
    async fn finalize(
        &self,
        events: &mut Vec<ServerEvent>,
        connection_id: Uuid,
        session: &InterviewSession,
    ) {
        let application_id = session.application_id;

        let cv_summary = match self.store.application(application_id).await {
            Ok(Some(application)) => match self.store.candidate(application.candidate_id).await {
                Ok(Some(candidate)) => candidate.cv_summary.filter(|s| !s.trim().is_empty()),
                _ => None,
            },
            _ => None,
        }
        .unwrap_or_else(|| "No CV summary available".to_string());

        // Profile synthesis degrades to a placeholder inside the AI service;
        // it can never block completion.
        let profile = self
            .ai
            .personality_profile(&cv_summary, &session.qa_block())
            .await;
        let transcript = session.transcript_text();

        match self
            .store
            .finalize(application_id, Some(&profile), &transcript)
            .await
        {
            Ok(Some(totals)) => {
                if let Err(e) = self.notifier.interview_completed(application_id).await {
                    // Logged only: completion must not fail because the
                    // notification did.
                    error!("Failed to send completion email for {application_id}: {e:#}");
                }
                info!(%application_id, "Interview completed");
                events.push(ServerEvent::InterviewComplete {
                    message: COMPLETION_MESSAGE.to_string(),
                    total_score: totals.total_score,
                    total_weightage: totals.total_weightage,
                });
            }
            Ok(None) => {
                // A concurrent trigger already completed this application.
                info!(%application_id, "Finalization skipped: already completed");
            }
            Err(e) => {
                error!("Failed to finalize application {application_id}: {e:#}");
                events.push(error_event("Failed to finalize interview"));
            }
        }

        self.sessions.remove(connection_id);
    }
}

fn error_event(message: &str) -> ServerEvent {
    ServerEvent::Error {
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use anyhow::bail;
    use async_trait::async_trait;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    use bytes::Bytes;
    use chrono::Utc;

    use crate::ai_client::prompts::PromptRegistry;
    use crate::ai_client::{AiBackend, AiError, ChatRequest};
    use crate::interview::store::CompletedTotals;
    use crate::models::application::ApplicationRow;
    use crate::models::candidate::CandidateRow;
    use crate::models::job::QuestionRow;

    struct StubBackend {
        chats: Mutex<VecDeque<Option<String>>>,
        transcript: Option<String>,
    }

    impl StubBackend {
        fn new(chats: Vec<Option<&str>>) -> Self {
            Self {
                chats: Mutex::new(chats.into_iter().map(|c| c.map(String::from)).collect()),
                transcript: None,
            }
        }
    }

    #[async_trait]
    impl AiBackend for StubBackend {
        async fn chat(&self, _request: ChatRequest) -> Result<String, AiError> {
            match self.chats.lock().unwrap().pop_front().flatten() {
                Some(reply) => Ok(reply),
                None => Err(AiError::Api {
                    status: 503,
                    message: "stub failure".to_string(),
                }),
            }
        }

        async fn transcribe(&self, _audio: Vec<u8>, _filename: &str) -> Result<String, AiError> {
            self.transcript.clone().ok_or(AiError::EmptyContent)
        }

        async fn speak(&self, _text: &str) -> Result<Bytes, AiError> {
            Err(AiError::EmptyContent)
        }
    }

    #[derive(Default)]
    struct MemStore {
        applications: Mutex<HashMap<Uuid, ApplicationRow>>,
        candidates: Mutex<HashMap<Uuid, CandidateRow>>,
        questions: Mutex<Vec<QuestionRow>>,
        answers: Mutex<Vec<NewAnswer>>,
        fail_record: AtomicBool,
    }

    #[async_trait]
    impl InterviewStore for MemStore {
        async fn application(&self, id: Uuid) -> anyhow::Result<Option<ApplicationRow>> {
            Ok(self.applications.lock().unwrap().get(&id).cloned())
        }

        async fn candidate(&self, id: Uuid) -> anyhow::Result<Option<CandidateRow>> {
            Ok(self.candidates.lock().unwrap().get(&id).cloned())
        }

        async fn questions_for_job(&self, job_id: Uuid) -> anyhow::Result<Vec<QuestionRow>> {
            Ok(self
                .questions
                .lock()
                .unwrap()
                .iter()
                .filter(|q| q.job_id == job_id)
                .cloned()
                .collect())
        }

        async fn question(&self, id: Uuid) -> anyhow::Result<Option<QuestionRow>> {
            Ok(self
                .questions
                .lock()
                .unwrap()
                .iter()
                .find(|q| q.id == id)
                .cloned())
        }

        async fn record_answer(&self, answer: NewAnswer) -> anyhow::Result<()> {
            if self.fail_record.load(Ordering::SeqCst) {
                bail!("simulated persistence failure");
            }
            let mut applications = self.applications.lock().unwrap();
            let application = applications
                .get_mut(&answer.application_id)
                .filter(|a| a.completed_at.is_none());
            let Some(application) = application else {
                bail!("application completed or missing");
            };
            application.total_score += answer.score;
            self.answers.lock().unwrap().push(answer);
            Ok(())
        }

        async fn finalize(
            &self,
            application_id: Uuid,
            personality_profile: Option<&str>,
            transcript: &str,
        ) -> anyhow::Result<Option<CompletedTotals>> {
            let mut applications = self.applications.lock().unwrap();
            let Some(application) = applications.get_mut(&application_id) else {
                return Ok(None);
            };
            if application.status == "completed" {
                return Ok(None);
            }
            application.status = "completed".to_string();
            application.completed_at = Some(Utc::now());
            application.personality_profile = personality_profile.map(String::from);
            application.interview_transcript = Some(transcript.to_string());
            Ok(Some(CompletedTotals {
                total_score: application.total_score,
                total_weightage: application.total_weightage,
            }))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn interview_completed(&self, _application_id: Uuid) -> anyhow::Result<()> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                bail!("smtp unreachable");
            }
            Ok(())
        }
    }

    struct Fixture {
        orchestrator: Orchestrator,
        store: Arc<MemStore>,
        notifier: Arc<RecordingNotifier>,
        conn: Uuid,
        application_id: Uuid,
        _upload_dir: tempfile::TempDir,
    }

    fn fixture(weightages: &[i32], chat_replies: Vec<Option<&str>>) -> Fixture {
        fixture_with(weightages, chat_replies, None, false)
    }

    fn fixture_with(
        weightages: &[i32],
        chat_replies: Vec<Option<&str>>,
        transcript: Option<&str>,
        failing_notifier: bool,
    ) -> Fixture {
        let job_id = Uuid::new_v4();
        let candidate_id = Uuid::new_v4();
        let application_id = Uuid::new_v4();
        let now = Utc::now();

        let questions = weightages
            .iter()
            .enumerate()
            .map(|(i, &weightage)| QuestionRow {
                id: Uuid::new_v4(),
                job_id,
                text: format!("Question {}?", i + 1),
                weightage,
                is_ai_generated: false,
                order_index: i as i32,
                created_at: now,
            })
            .collect::<Vec<_>>();

        let store = Arc::new(MemStore::default());
        store.questions.lock().unwrap().extend(questions);
        store.candidates.lock().unwrap().insert(
            candidate_id,
            CandidateRow {
                id: candidate_id,
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                email: "ada@example.com".to_string(),
                phone: None,
                cv_path: None,
                cv_summary: Some("Seasoned engineer".to_string()),
                matching_percentage: Some(80.0),
                created_at: now,
            },
        );
        store.applications.lock().unwrap().insert(
            application_id,
            ApplicationRow {
                id: application_id,
                candidate_id,
                job_id,
                status: "in_progress".to_string(),
                total_score: 0.0,
                total_weightage: weightages.iter().sum(),
                personality_profile: None,
                interview_transcript: None,
                ip_address: None,
                local_time: None,
                timezone: None,
                created_at: now,
                completed_at: None,
            },
        );

        let mut backend = StubBackend::new(chat_replies);
        backend.transcript = transcript.map(String::from);
        let ai = AiService::new(Arc::new(backend), PromptRegistry::defaults());

        let upload_dir = tempfile::tempdir().unwrap();
        let audio = AudioPipeline::new(
            upload_dir.path().to_path_buf(),
            "viva-test-missing-ffmpeg".to_string(),
        );

        let notifier = Arc::new(RecordingNotifier {
            sent: AtomicUsize::new(0),
            fail: failing_notifier,
        });

        let orchestrator = Orchestrator::new(
            store.clone(),
            ai,
            audio,
            notifier.clone(),
            SessionStore::default(),
            Some(42),
        );

        Fixture {
            orchestrator,
            store,
            notifier,
            conn: Uuid::new_v4(),
            application_id,
            _upload_dir: upload_dir,
        }
    }

    /// The committed question order for an active session.
    fn session_order(f: &Fixture) -> Vec<Uuid> {
        let session = f.orchestrator.sessions.get(f.conn).unwrap();
        let order = session.try_lock().unwrap().question_order.clone();
        order
    }

    fn error_message(events: &[ServerEvent]) -> Option<String> {
        events.iter().find_map(|e| match e {
            ServerEvent::Error { message } => Some(message.clone()),
            _ => None,
        })
    }

    fn question_ids_in_store(f: &Fixture) -> Vec<Uuid> {
        f.store
            .questions
            .lock()
            .unwrap()
            .iter()
            .map(|q| q.id)
            .collect()
    }

    #[tokio::test]
    async fn test_start_emits_first_question_and_commits_a_permutation() {
        let f = fixture(&[10, 10, 10], vec![]);
        let events = f.orchestrator.start_interview(f.conn, f.application_id).await;

        match &events[..] {
            [ServerEvent::Question {
                question_number,
                total_questions,
                ..
            }] => {
                assert_eq!(*question_number, 1);
                assert_eq!(*total_questions, 3);
            }
            other => panic!("unexpected events {other:?}"),
        }

        let mut order = session_order(&f);
        let mut expected = question_ids_in_store(&f);
        order.sort();
        expected.sort();
        assert_eq!(order, expected, "order must be a permutation of the job's questions");
    }

    #[tokio::test]
    async fn test_start_rejects_unknown_application() {
        let f = fixture(&[10], vec![]);
        let events = f.orchestrator.start_interview(f.conn, Uuid::new_v4()).await;
        assert_eq!(error_message(&events).as_deref(), Some("Application not found"));
    }

    #[tokio::test]
    async fn test_start_rejects_job_without_questions() {
        let f = fixture(&[], vec![]);
        let events = f.orchestrator.start_interview(f.conn, f.application_id).await;
        assert_eq!(
            error_message(&events).as_deref(),
            Some("No questions found for this job")
        );
        assert!(f.orchestrator.sessions.get(f.conn).is_none());
    }

    #[tokio::test]
    async fn test_start_rejects_second_session_on_same_connection() {
        let f = fixture(&[10], vec![]);
        f.orchestrator.start_interview(f.conn, f.application_id).await;
        let events = f.orchestrator.start_interview(f.conn, f.application_id).await;
        assert_eq!(
            error_message(&events).as_deref(),
            Some("Interview already in progress")
        );
    }

    #[tokio::test]
    async fn test_full_interview_accumulates_scores_and_completes() {
        // Three evaluations scoring 8, 5, 10, then one personality profile.
        let f = fixture(
            &[10, 10, 10],
            vec![
                Some(r#"{"score": 8}"#),
                Some(r#"{"score": 5}"#),
                Some(r#"{"score": 10}"#),
                Some("Curious and methodical."),
            ],
        );
        f.orchestrator.start_interview(f.conn, f.application_id).await;
        let order = session_order(&f);

        for (i, question_id) in order.iter().enumerate() {
            let events = f
                .orchestrator
                .submit_answer(f.conn, *question_id, None, Some(format!("answer {i}")), Some(30.0))
                .await;
            assert!(error_message(&events).is_none(), "step {i}: {events:?}");
            if i + 1 < order.len() {
                assert!(matches!(
                    events.last(),
                    Some(ServerEvent::Question { question_number, .. }) if *question_number == i + 2
                ));
            } else {
                match events.last() {
                    Some(ServerEvent::InterviewComplete {
                        total_score,
                        total_weightage,
                        ..
                    }) => {
                        assert_eq!(*total_score, 23.0);
                        assert_eq!(*total_weightage, 30);
                    }
                    other => panic!("expected completion, got {other:?}"),
                }
            }
        }

        let applications = f.store.applications.lock().unwrap();
        let application = applications.get(&f.application_id).unwrap();
        assert_eq!(application.status, "completed");
        assert_eq!(application.total_score, 23.0);
        assert_eq!(
            application.personality_profile.as_deref(),
            Some("Curious and methodical.")
        );
        assert!(application.interview_transcript.is_some());
        assert_eq!(f.store.answers.lock().unwrap().len(), 3);
        assert_eq!(f.notifier.sent.load(Ordering::SeqCst), 1);
        assert!(f.orchestrator.sessions.get(f.conn).is_none());
    }

    #[tokio::test]
    async fn test_oracle_failure_scores_exactly_half_weightage() {
        let f = fixture(&[10, 10], vec![None]);
        f.orchestrator.start_interview(f.conn, f.application_id).await;
        let order = session_order(&f);

        let events = f
            .orchestrator
            .submit_answer(f.conn, order[0], None, Some("an answer".to_string()), None)
            .await;

        assert!(error_message(&events).is_none());
        let answers = f.store.answers.lock().unwrap();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].score, 5.0);
    }

    #[tokio::test]
    async fn test_total_score_matches_sum_of_persisted_answers() {
        let f = fixture(
            &[10, 20],
            vec![Some(r#"{"score": 7}"#), Some(r#"{"score": 13}"#)],
        );
        f.orchestrator.start_interview(f.conn, f.application_id).await;
        let order = session_order(&f);

        for question_id in &order {
            f.orchestrator
                .submit_answer(f.conn, *question_id, None, Some("a".to_string()), None)
                .await;
        }

        let answers = f.store.answers.lock().unwrap();
        let sum: f64 = answers.iter().map(|a| a.score).sum();
        let applications = f.store.applications.lock().unwrap();
        assert_eq!(applications.get(&f.application_id).unwrap().total_score, sum);
    }

    #[tokio::test]
    async fn test_skip_mismatch_is_rejected_without_side_effects() {
        let f = fixture(&[10, 10], vec![]);
        f.orchestrator.start_interview(f.conn, f.application_id).await;
        let order = session_order(&f);

        let events = f.orchestrator.skip_question(f.conn, order[1]).await;
        assert_eq!(error_message(&events).as_deref(), Some("Question mismatch"));
        assert!(f.store.answers.lock().unwrap().is_empty());

        let session = f.orchestrator.sessions.get(f.conn).unwrap();
        assert_eq!(session.try_lock().unwrap().cursor, 0);
    }

    #[tokio::test]
    async fn test_skip_records_zero_score_and_zero_duration() {
        let f = fixture(&[10, 10], vec![]);
        f.orchestrator.start_interview(f.conn, f.application_id).await;
        let order = session_order(&f);

        let events = f.orchestrator.skip_question(f.conn, order[0]).await;
        assert!(error_message(&events).is_none());
        assert!(matches!(
            events.last(),
            Some(ServerEvent::Question { question_number: 2, .. })
        ));

        let answers = f.store.answers.lock().unwrap();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].score, 0.0);
        assert_eq!(answers[0].duration, Some(0.0));
        assert_eq!(answers[0].answer_text, SKIPPED_ANSWER_TEXT);
        assert!(answers[0].audio_path.is_none());
    }

    #[tokio::test]
    async fn test_answer_path_is_lenient_about_question_id() {
        let f = fixture(&[10, 10], vec![Some(r#"{"score": 4}"#)]);
        f.orchestrator.start_interview(f.conn, f.application_id).await;
        let order = session_order(&f);

        // Submit against the *other* question: accepted, scored against it.
        let events = f
            .orchestrator
            .submit_answer(f.conn, order[1], None, Some("answer".to_string()), None)
            .await;

        assert!(error_message(&events).is_none());
        let answers = f.store.answers.lock().unwrap();
        assert_eq!(answers[0].question_id, order[1]);

        let session = f.orchestrator.sessions.get(f.conn).unwrap();
        assert_eq!(session.try_lock().unwrap().cursor, 1);
    }

    #[tokio::test]
    async fn test_disconnect_destroys_session_but_keeps_answers() {
        let f = fixture(&[10, 10], vec![Some(r#"{"score": 6}"#)]);
        f.orchestrator.start_interview(f.conn, f.application_id).await;
        let order = session_order(&f);

        f.orchestrator
            .submit_answer(f.conn, order[0], None, Some("answer".to_string()), None)
            .await;
        f.orchestrator.disconnect(f.conn);

        assert!(f.orchestrator.sessions.get(f.conn).is_none());
        assert_eq!(f.store.answers.lock().unwrap().len(), 1);
        let applications = f.store.applications.lock().unwrap();
        assert_eq!(applications.get(&f.application_id).unwrap().status, "in_progress");
    }

    #[tokio::test]
    async fn test_audio_without_text_is_transcribed_and_scored() {
        let f = fixture_with(
            &[10],
            vec![Some(r#"{"score": 9}"#), Some("profile")],
            Some("I built the payments pipeline"),
            false,
        );
        f.orchestrator.start_interview(f.conn, f.application_id).await;
        let order = session_order(&f);

        let payload = format!("data:audio/webm;base64,{}", BASE64.encode(b"opus-bytes"));
        let events = f
            .orchestrator
            .submit_answer(f.conn, order[0], Some(payload), None, Some(12.5))
            .await;

        assert!(matches!(
            &events[0],
            ServerEvent::TranscriptReceived { transcript, .. }
                if transcript == "I built the payments pipeline"
        ));

        let answers = f.store.answers.lock().unwrap();
        assert_eq!(
            answers[0].answer_text,
            "I built the payments pipeline"
        );
        // Codec toolchain is absent in tests: original encoding is kept.
        assert!(answers[0].audio_path.as_deref().unwrap().ends_with(".webm"));
    }

    #[tokio::test]
    async fn test_transcription_failure_still_surfaces_sentinel() {
        let f = fixture_with(&[10, 10], vec![Some(r#"{"score": 1}"#)], None, false);
        f.orchestrator.start_interview(f.conn, f.application_id).await;
        let order = session_order(&f);

        let payload = BASE64.encode(b"opus-bytes");
        let events = f
            .orchestrator
            .submit_answer(f.conn, order[0], Some(payload), None, None)
            .await;

        assert!(matches!(
            &events[0],
            ServerEvent::TranscriptReceived { transcript, .. }
                if transcript == crate::ai_client::TRANSCRIPTION_FAILED
        ));
    }

    #[tokio::test]
    async fn test_persistence_failure_does_not_advance_cursor() {
        let f = fixture(&[10, 10], vec![Some(r#"{"score": 5}"#), Some(r#"{"score": 5}"#)]);
        f.orchestrator.start_interview(f.conn, f.application_id).await;
        let order = session_order(&f);

        f.store.fail_record.store(true, Ordering::SeqCst);
        let events = f
            .orchestrator
            .submit_answer(f.conn, order[0], None, Some("answer".to_string()), None)
            .await;
        assert_eq!(error_message(&events).as_deref(), Some("Failed to save answer"));
        assert!(f.store.answers.lock().unwrap().is_empty());

        // The client may resubmit once persistence recovers.
        f.store.fail_record.store(false, Ordering::SeqCst);
        let events = f
            .orchestrator
            .submit_answer(f.conn, order[0], None, Some("answer".to_string()), None)
            .await;
        assert!(error_message(&events).is_none());
        assert_eq!(f.store.answers.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_without_session_is_rejected() {
        let f = fixture(&[10], vec![]);
        let events = f
            .orchestrator
            .submit_answer(f.conn, Uuid::new_v4(), None, Some("answer".to_string()), None)
            .await;
        assert_eq!(error_message(&events).as_deref(), Some("No active session"));
    }

    #[tokio::test]
    async fn test_finalization_is_idempotent() {
        let f = fixture(&[10], vec![]);
        let first = f
            .store
            .finalize(f.application_id, Some("profile"), "transcript")
            .await
            .unwrap();
        assert!(first.is_some());

        let second = f
            .store
            .finalize(f.application_id, Some("other"), "other")
            .await
            .unwrap();
        assert!(second.is_none(), "second finalization must be a no-op");

        // total_score is frozen once completed.
        let result = f
            .store
            .record_answer(NewAnswer {
                application_id: f.application_id,
                question_id: Uuid::new_v4(),
                answer_text: "late".to_string(),
                audio_path: None,
                score: 3.0,
                weightage: 10,
                duration: None,
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_block_completion() {
        let f = fixture_with(&[10], vec![Some(r#"{"score": 2}"#)], None, true);
        f.orchestrator.start_interview(f.conn, f.application_id).await;
        let order = session_order(&f);

        let events = f
            .orchestrator
            .submit_answer(f.conn, order[0], None, Some("answer".to_string()), None)
            .await;

        assert!(matches!(events.last(), Some(ServerEvent::InterviewComplete { .. })));
        assert_eq!(f.notifier.sent.load(Ordering::SeqCst), 1);
        let applications = f.store.applications.lock().unwrap();
        assert_eq!(applications.get(&f.application_id).unwrap().status, "completed");
    }
}
