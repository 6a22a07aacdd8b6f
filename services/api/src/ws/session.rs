//! Manages the WebSocket connection lifecycle for a tutoring session.
//!
//! Each connection owns one `SessionOrchestrator`; nothing survives the
//! socket. The session loop forwards client events into the orchestrator and
//! streams back new turns, curriculum snapshots, busy-state changes and quiz
//! lifecycle events.

use super::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use anyhow::Result;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use mentor_core::{orchestrator::SessionOrchestrator, quiz::QuizState};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Main handler for an individual WebSocket connection.
#[instrument(name = "ws_session", skip_all, fields(connection_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id: u32 = rand::random();
    tracing::Span::current().record("connection_id", connection_id);
    info!("New WebSocket connection. Starting tutoring session.");

    let (socket_tx, socket_rx) = socket.split();
    if let Err(e) = run_session(state, socket_tx, socket_rx).await {
        error!(error = ?e, "Session terminated with error.");
    }
    info!("Session finished.");
}

/// The main event loop for an active session.
///
/// Listens for client messages and for busy-state updates from the
/// orchestrator, and forwards both sides' traffic.
async fn run_session(
    state: Arc<AppState>,
    mut socket_tx: SplitSink<WebSocket, Message>,
    mut socket_rx: SplitStream<WebSocket>,
) -> Result<()> {
    let (busy_tx, mut busy_rx) = mpsc::channel(8);
    let mut orchestrator = SessionOrchestrator::new(state.generation.clone(), Some(busy_tx));
    // Turns already streamed to the client; everything past this index is new.
    let mut sent_turns = 0usize;

    loop {
        tokio::select! {
            Some(msg_result) = socket_rx.next() => {
                match msg_result {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(msg) => {
                                dispatch(&mut orchestrator, msg, &mut socket_tx, &mut sent_turns)
                                    .await?;
                            }
                            Err(e) => {
                                warn!(error = %e, "Unrecognized client message.");
                                send_msg(&mut socket_tx, ServerMessage::Error {
                                    message: format!("unrecognized message: {e}"),
                                })
                                .await?;
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        info!("Client sent close frame. Shutting down session.");
                        break;
                    }
                    Ok(Message::Binary(_)) => {
                        warn!("Ignoring unexpected binary message.");
                    }
                    Ok(Message::Ping(_) | Message::Pong(_)) => {}
                    Err(e) => {
                        error!("Error receiving from client WebSocket: {:?}", e);
                        break;
                    }
                }
            },
            Some(busy) = busy_rx.recv() => {
                send_msg(&mut socket_tx, ServerMessage::AgentStatus { state: busy }).await?;
            },
            else => break,
        }
    }

    info!("WebSocket connection closed.");
    Ok(())
}

/// Routes one client message into the orchestrator and streams back the
/// results. Orchestrator rejections (busy, invalid quiz operations) become
/// non-fatal `error` messages.
async fn dispatch(
    orchestrator: &mut SessionOrchestrator,
    msg: ClientMessage,
    socket_tx: &mut SplitSink<WebSocket, Message>,
    sent_turns: &mut usize,
) -> Result<()> {
    match msg {
        ClientMessage::UserMessage { text } => {
            if let Err(e) = orchestrator.submit_user_text(&text).await {
                send_msg(socket_tx, ServerMessage::Error { message: e.to_string() }).await?;
            }
            flush_turns(orchestrator, socket_tx, sent_turns).await?;
            send_curriculum(orchestrator, socket_tx).await?;
        }
        ClientMessage::SelectNode { node_id } => {
            if let Err(e) = orchestrator.select_node(node_id).await {
                send_msg(socket_tx, ServerMessage::Error { message: e.to_string() }).await?;
            }
            flush_turns(orchestrator, socket_tx, sent_turns).await?;
        }
        ClientMessage::RequestQuiz => {
            match orchestrator.request_quiz().await {
                Ok(true) => {
                    if let Some(quiz) = orchestrator.quiz() {
                        send_msg(
                            socket_tx,
                            ServerMessage::QuizStarted {
                                questions: quiz.questions().to_vec(),
                            },
                        )
                        .await?;
                    }
                    send_curriculum(orchestrator, socket_tx).await?;
                }
                Ok(false) => {}
                Err(e) => {
                    send_msg(socket_tx, ServerMessage::Error { message: e.to_string() }).await?;
                }
            }
        }
        ClientMessage::QuizSelect { option_index } => {
            if let Err(e) = orchestrator.quiz_select(option_index) {
                send_msg(socket_tx, ServerMessage::Error { message: e.to_string() }).await?;
            }
        }
        ClientMessage::QuizSubmit => {
            match orchestrator.quiz_submit() {
                Ok(correct) => {
                    // The question being graded is still current until `next`.
                    let question = orchestrator
                        .quiz()
                        .and_then(|q| q.current_question())
                        .cloned();
                    if let Some(question) = question {
                        send_msg(
                            socket_tx,
                            ServerMessage::QuizAnswer {
                                correct,
                                correct_option_index: question.correct_option_index,
                                explanation: question.explanation,
                            },
                        )
                        .await?;
                    }
                }
                Err(e) => {
                    send_msg(socket_tx, ServerMessage::Error { message: e.to_string() }).await?;
                }
            }
        }
        ClientMessage::QuizNext => match orchestrator.quiz_next() {
            Ok(QuizState::Completed { score, total }) => {
                // The single place the percentage is derived.
                let percent = (score as f32 / total as f32) * 100.0;
                send_msg(
                    socket_tx,
                    ServerMessage::QuizCompleted {
                        score,
                        total,
                        percent,
                    },
                )
                .await?;
            }
            Ok(QuizState::InProgress { index, .. }) => {
                let total = orchestrator.quiz().map(|q| q.total()).unwrap_or(0);
                send_msg(socket_tx, ServerMessage::QuizProgress { index, total }).await?;
            }
            Err(e) => {
                send_msg(socket_tx, ServerMessage::Error { message: e.to_string() }).await?;
            }
        },
        ClientMessage::QuizClose => {
            orchestrator.close_quiz();
        }
    }
    Ok(())
}

/// Streams any turns appended since the last flush, in order.
async fn flush_turns(
    orchestrator: &SessionOrchestrator,
    socket_tx: &mut SplitSink<WebSocket, Message>,
    sent_turns: &mut usize,
) -> Result<()> {
    let turns = orchestrator.conversation().turns();
    for turn in &turns[*sent_turns..] {
        send_msg(socket_tx, ServerMessage::Turn { turn: turn.clone() }).await?;
    }
    *sent_turns = turns.len();
    Ok(())
}

async fn send_curriculum(
    orchestrator: &SessionOrchestrator,
    socket_tx: &mut SplitSink<WebSocket, Message>,
) -> Result<()> {
    send_msg(
        socket_tx,
        ServerMessage::Curriculum {
            nodes: orchestrator.curriculum().all().to_vec(),
        },
    )
    .await
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
