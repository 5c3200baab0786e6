//! WebSocket endpoint for the interview channel.
//!
//! One connection carries one interview. Inbound frames are processed
//! sequentially; a dedicated sender task serializes outbound events so
//! detached work (speech synthesis) can emit without touching the socket
//! directly.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ai_client::AiService;
use crate::interview::events::{ClientEvent, ServerEvent};
use crate::state::AppState;

const CHANNEL_BUFFER_SIZE: usize = 64;
/// Answer audio arrives as a single base64 frame; allow a few minutes of it.
const MAX_WS_MESSAGE_SIZE: usize = 20 * 1024 * 1024;

/// GET /ws/interview
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();
    info!(%connection_id, "Interview connection established");

    let (mut sink, mut stream) = socket.split();
    let (event_tx, mut event_rx) = mpsc::channel::<ServerEvent>(CHANNEL_BUFFER_SIZE);

    // Sender task: the only writer to the socket.
    let sender_task = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    warn!("Failed to serialize server event: {e}");
                    continue;
                }
            };
            if sink.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let _ = event_tx
        .send(ServerEvent::Connected {
            message: "Connected to interview server".to_string(),
        })
        .await;

    while let Some(frame) = stream.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                warn!(%connection_id, "WebSocket error: {e}");
                break;
            }
        };
        match frame {
            Message::Text(text) => {
                let event = match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => event,
                    Err(e) => {
                        debug!(%connection_id, "Undecodable client frame: {e}");
                        let _ = event_tx
                            .send(ServerEvent::Error {
                                message: "Invalid message format".to_string(),
                            })
                            .await;
                        continue;
                    }
                };
                dispatch(&state, connection_id, event, &event_tx).await;
            }
            Message::Close(_) => break,
            // Pings/pongs are handled by the protocol layer; binary is unused.
            _ => {}
        }
    }

    state.interview.disconnect(connection_id);
    sender_task.abort();
    info!(%connection_id, "Interview connection closed");
}

async fn dispatch(
    state: &AppState,
    connection_id: Uuid,
    event: ClientEvent,
    event_tx: &mpsc::Sender<ServerEvent>,
) {
    let events = match event {
        ClientEvent::StartInterview { application_id } => {
            state
                .interview
                .start_interview(connection_id, application_id)
                .await
        }
        ClientEvent::AnswerSubmitted {
            question_id,
            audio_data,
            answer_text,
            duration,
        } => {
            state
                .interview
                .submit_answer(connection_id, question_id, audio_data, answer_text, duration)
                .await
        }
        ClientEvent::SkipQuestion { question_id } => {
            state.interview.skip_question(connection_id, question_id).await
        }
        ClientEvent::RequestSpeech { text } => {
            if text.trim().is_empty() {
                vec![ServerEvent::Error {
                    message: "Text required".to_string(),
                }]
            } else {
                spawn_one_off_speech(state.ai.clone(), text, event_tx.clone());
                Vec::new()
            }
        }
        ClientEvent::Ping => vec![ServerEvent::Pong {
            timestamp: Utc::now().to_rfc3339(),
        }],
    };

    for event in events {
        // Question delivery must not wait on synthesis: emit the text first,
        // then let a detached task follow up with the audio if it succeeds.
        if let ServerEvent::Question { ref text, .. } = event {
            spawn_question_speech(state.ai.clone(), text.clone(), event_tx.clone());
        }
        let _ = event_tx.send(event).await;
    }
}

/// Best-effort speech for an emitted question; failures are suppressed;
/// the text question was already delivered.
fn spawn_question_speech(ai: AiService, text: String, event_tx: mpsc::Sender<ServerEvent>) {
    tokio::spawn(async move {
        if let Some(audio) = ai.synthesize_speech(&text).await {
            let _ = event_tx
                .send(ServerEvent::SpeechGenerated {
                    audio_data: BASE64.encode(&audio),
                })
                .await;
        }
    });
}

/// Stateless synthesis requested by the client directly; unlike question
/// speech, a failure here is reported back.
fn spawn_one_off_speech(ai: AiService, text: String, event_tx: mpsc::Sender<ServerEvent>) {
    tokio::spawn(async move {
        match ai.synthesize_speech(&text).await {
            Some(audio) => {
                let _ = event_tx
                    .send(ServerEvent::SpeechGenerated {
                        audio_data: BASE64.encode(&audio),
                    })
                    .await;
            }
            None => {
                let _ = event_tx
                    .send(ServerEvent::Error {
                        message: "Failed to generate speech".to_string(),
                    })
                    .await;
            }
        }
    });
}
