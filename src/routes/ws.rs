//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{info, error, instrument, debug};

use crate::logic::{self, ApiError};
use crate::protocol::{ClientWsMessage, GuessOut, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "guessr_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "guessr_backend", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "guessr_backend", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state).await
          }
          Err(e) => ServerWsMessage::Error { error: "invalid_json".into(), message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "error": "serialization", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "guessr_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "guessr_backend", "WebSocket disconnected");
}

fn ws_error(e: ApiError) -> ServerWsMessage {
  let out = e.to_out();
  ServerWsMessage::Error { error: out.error.into(), message: out.message }
}

/// One reply per message; engine failures become `error` messages.
#[instrument(level = "info", skip(state))]
pub(crate) async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  let reply = match msg {
    ClientWsMessage::Ping => Ok(ServerWsMessage::Pong),

    ClientWsMessage::StartGame(req) => logic::start_game(state, req).await.map(|round| {
      info!(target: "guessr_backend", session = %round.session_id, "WS game started");
      ServerWsMessage::RoundStarted { round }
    }),

    ClientWsMessage::StartOfflineGame(req) => {
      logic::start_offline_game(state, req).await.map(|round| ServerWsMessage::RoundStarted { round })
    }

    ClientWsMessage::NewRound(req) => logic::new_round(state, req).await.map(|round| ServerWsMessage::RoundStarted { round }),

    ClientWsMessage::RevealFact { session_id } => {
      logic::reveal_fact(state, &session_id).await.map(|fact| ServerWsMessage::Fact { fact })
    }

    ClientWsMessage::SubmitGuess { session_id, guess } => {
      logic::submit_guess(state, &session_id, &guess).await.map(|result| match result {
        GuessOut::Finished(result) => ServerWsMessage::RoundOver { result },
        miss => ServerWsMessage::GuessResult { result: miss },
      })
    }

    ClientWsMessage::Hint { session_id } => logic::request_hint(state, &session_id).await.map(|hint| ServerWsMessage::Hint { hint }),

    ClientWsMessage::GiveUp { session_id } => {
      logic::give_up(state, &session_id).await.map(|result| ServerWsMessage::RoundOver { result })
    }

    ClientWsMessage::EndSession { session_id } => {
      logic::end_session(state, &session_id).await.map(|session| ServerWsMessage::SessionEnded { session })
    }

    ClientWsMessage::OfflineStatus(q) => Ok(ServerWsMessage::OfflineStatus { status: logic::offline_status(state, &q).await }),
  };
  reply.unwrap_or_else(ws_error)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::logic::tests::state_with;

  async fn send(state: &AppState, json: serde_json::Value) -> serde_json::Value {
    let msg: ClientWsMessage = serde_json::from_value(json).unwrap();
    serde_json::to_value(handle_client_ws(msg, state).await).unwrap()
  }

  #[tokio::test]
  async fn ws_messages_drive_a_round() {
    let (state, _) = state_with(Some("Kiwi"), &[]).await;
    assert_eq!(send(&state, serde_json::json!({ "type": "ping" })).await["type"], "pong");

    let started = send(&state, serde_json::json!({ "type": "start_game", "player_name": "Ada" })).await;
    assert_eq!(started["type"], "round_started");
    let sid = started["round"]["session_id"].as_str().unwrap().to_string();

    let miss = send(&state, serde_json::json!({ "type": "submit_guess", "session_id": sid, "guess": "zebra" })).await;
    assert_eq!(miss["type"], "guess_result");
    assert_eq!(miss["result"]["attempts_remaining"], 2);

    let over = send(&state, serde_json::json!({ "type": "give_up", "session_id": sid })).await;
    assert_eq!(over["type"], "round_over");
    assert_eq!(over["result"]["gave_up"], true);

    let err = send(&state, serde_json::json!({ "type": "hint", "session_id": sid })).await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["error"], "round_over");
  }
}
