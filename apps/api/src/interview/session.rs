//! In-memory interview session state, keyed by connection.
//!
//! A session lives from the start-interview signal until finalization or
//! disconnect. There is no resume contract: whatever answers were persisted
//! before a disconnect are all that survives it.

use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tokio::sync::Mutex;
use uuid::Uuid;

/// One answered-or-skipped question, appended in processing order.
#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub question: String,
    pub answer: String,
    pub score: f64,
}

/// Transient per-connection interview progress.
///
/// `question_order` is committed once at session creation and never changes;
/// `cursor` only moves forward, one step per answered-or-skipped question.
#[derive(Debug)]
pub struct InterviewSession {
    pub application_id: Uuid,
    pub question_order: Vec<Uuid>,
    pub cursor: usize,
    pub transcript: Vec<TranscriptEntry>,
}

impl InterviewSession {
    pub fn new(application_id: Uuid, question_order: Vec<Uuid>) -> Self {
        Self {
            application_id,
            question_order,
            cursor: 0,
            transcript: Vec::new(),
        }
    }

    /// The question the session is currently waiting on.
    pub fn current_question(&self) -> Option<Uuid> {
        self.question_order.get(self.cursor).copied()
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.question_order.len()
    }

    /// Appends a transcript entry and advances the cursor by one.
    pub fn record(&mut self, entry: TranscriptEntry) {
        self.transcript.push(entry);
        self.cursor += 1;
    }

    /// Q/A block fed to personality synthesis.
    pub fn qa_block(&self) -> String {
        self.transcript
            .iter()
            .map(|e| format!("Q: {}\nA: {}", e.question, e.answer))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Full transcript persisted on the application at finalization.
    pub fn transcript_text(&self) -> String {
        let mut out = String::new();
        for entry in &self.transcript {
            out.push_str(&format!(
                "Q: {}\nA: {}\nScore: {}\n\n",
                entry.question, entry.answer, entry.score
            ));
        }
        out
    }
}

/// Produces the committed question order for a new session.
/// A seed makes the shuffle deterministic for tests.
pub fn shuffle_question_order(mut ids: Vec<Uuid>, seed: Option<u64>) -> Vec<Uuid> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    ids.shuffle(&mut rng);
    ids
}

/// Process-local mapping from connection id to interview session.
///
/// The outer map lock is held only to insert/look up/remove an entry, never
/// across an await. Processing locks the per-session mutex, so distinct
/// connections never contend with each other. This store does not survive the
/// process; multi-process deployments need connection affinity or a shared
/// keyed store in front of it.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<std::sync::Mutex<HashMap<Uuid, Arc<Mutex<InterviewSession>>>>>,
}

impl SessionStore {
    /// Registers a session for a connection. Returns `None` and leaves the
    /// existing session untouched if one is already active.
    pub fn insert(
        &self,
        connection_id: Uuid,
        session: InterviewSession,
    ) -> Option<Arc<Mutex<InterviewSession>>> {
        let mut map = self.inner.lock().expect("session store poisoned");
        if map.contains_key(&connection_id) {
            return None;
        }
        let session = Arc::new(Mutex::new(session));
        map.insert(connection_id, session.clone());
        Some(session)
    }

    pub fn get(&self, connection_id: Uuid) -> Option<Arc<Mutex<InterviewSession>>> {
        self.inner
            .lock()
            .expect("session store poisoned")
            .get(&connection_id)
            .cloned()
    }

    pub fn remove(&self, connection_id: Uuid) -> Option<Arc<Mutex<InterviewSession>>> {
        self.inner
            .lock()
            .expect("session store poisoned")
            .remove(&connection_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn test_shuffle_is_a_permutation() {
        let original = ids(8);
        let shuffled = shuffle_question_order(original.clone(), Some(7));
        assert_eq!(shuffled.len(), original.len());
        let mut a = original.clone();
        let mut b = shuffled.clone();
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }

    #[test]
    fn test_shuffle_is_deterministic_for_a_seed() {
        let original = ids(8);
        let first = shuffle_question_order(original.clone(), Some(42));
        let second = shuffle_question_order(original, Some(42));
        assert_eq!(first, second);
    }

    #[test]
    fn test_record_advances_cursor() {
        let order = ids(2);
        let mut session = InterviewSession::new(Uuid::new_v4(), order.clone());
        assert_eq!(session.current_question(), Some(order[0]));

        session.record(TranscriptEntry {
            question: "Q1".to_string(),
            answer: "A1".to_string(),
            score: 3.0,
        });
        assert_eq!(session.cursor, 1);
        assert_eq!(session.current_question(), Some(order[1]));
        assert!(!session.is_exhausted());

        session.record(TranscriptEntry {
            question: "Q2".to_string(),
            answer: "A2".to_string(),
            score: 4.0,
        });
        assert!(session.is_exhausted());
        assert_eq!(session.current_question(), None);
    }

    #[test]
    fn test_transcript_text_preserves_order() {
        let mut session = InterviewSession::new(Uuid::new_v4(), ids(2));
        session.record(TranscriptEntry {
            question: "First?".to_string(),
            answer: "one".to_string(),
            score: 1.0,
        });
        session.record(TranscriptEntry {
            question: "Second?".to_string(),
            answer: "two".to_string(),
            score: 2.0,
        });
        let text = session.transcript_text();
        let first = text.find("First?").unwrap();
        let second = text.find("Second?").unwrap();
        assert!(first < second);
        assert!(text.contains("Score: 1"));
    }

    #[test]
    fn test_store_rejects_second_session_for_connection() {
        let store = SessionStore::default();
        let conn = Uuid::new_v4();
        assert!(store
            .insert(conn, InterviewSession::new(Uuid::new_v4(), ids(1)))
            .is_some());
        assert!(store
            .insert(conn, InterviewSession::new(Uuid::new_v4(), ids(1)))
            .is_none());
    }

    #[test]
    fn test_store_isolates_connections() {
        let store = SessionStore::default();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let app_a = Uuid::new_v4();
        let app_b = Uuid::new_v4();
        store.insert(a, InterviewSession::new(app_a, ids(1)));
        store.insert(b, InterviewSession::new(app_b, ids(1)));

        store.remove(a);
        assert!(store.get(a).is_none());
        let remaining = store.get(b).unwrap();
        assert_eq!(remaining.try_lock().unwrap().application_id, app_b);
    }
}
