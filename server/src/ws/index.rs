//! WebSocket endpoint: registry-backed push plus inbound PVP commands.

use actix_web::{web, web::Bytes, Error, HttpRequest, HttpResponse};
use actix_ws::{handle, Message, ProtocolError};
use futures::StreamExt;

use crate::{
    error::PvpResult,
    http::auth::player_from_token,
    protocol::{ClientMsg, ServerMsg},
    state::AppState,
};

/// Runs one inbound socket command for `player_id`. Results reach the client
/// through the registry; only failures are returned here.
pub async fn dispatch(state: &AppState, player_id: i64, msg: ClientMsg) -> PvpResult<()> {
    match msg {
        ClientMsg::Join {
            beast_id,
            match_type,
        } => {
            state.queue.enqueue(player_id, beast_id, match_type).await?;
        }
        ClientMsg::Leave => {
            state.queue.dequeue(player_id).await?;
        }
        ClientMsg::Action {
            match_id,
            action,
            beast_state,
        } => {
            state
                .matches
                .relay_action(match_id, player_id, action, &beast_state, None)
                .await?;
        }
    }
    Ok(())
}

/// What the pump does with one read from the client stream.
#[derive(Debug, PartialEq)]
enum Inbound {
    Command(String),
    Ping(Bytes),
    /// Close frame, protocol error or end of stream.
    Hangup,
    Ignore,
}

fn classify(frame: Option<Result<Message, ProtocolError>>) -> Inbound {
    match frame {
        Some(Ok(Message::Text(text))) => Inbound::Command(text.to_string()),
        Some(Ok(Message::Ping(bytes))) => Inbound::Ping(bytes),
        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => Inbound::Hangup,
        Some(Ok(_)) => Inbound::Ignore,
    }
}

pub async fn ws_index(
    req: HttpRequest,
    body: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    // 1 · token query param
    let token = req
        .query_string()
        .split('&')
        .find_map(|kv| kv.strip_prefix("token="))
        .ok_or_else(|| actix_web::error::ErrorUnauthorized("token missing"))?;
    let player_id = player_from_token(token).map_err(actix_web::error::ErrorUnauthorized)?;

    // 2 · handshake
    let (response, mut session, mut ws_stream) = handle(&req, body)?;

    // 3 · registry
    let (conn_id, mut outbox) = state.notifier.register(player_id);
    let state = state.into_inner();

    actix::spawn(async move {
        loop {
            tokio::select! {
                // client → server
                frame = ws_stream.next() => {
                    match classify(frame) {
                        Inbound::Command(text) => {
                            let reply = match serde_json::from_str::<ClientMsg>(&text) {
                                Ok(cmsg) => dispatch(&state, player_id, cmsg)
                                    .await
                                    .err()
                                    .map(|e| e.to_string()),
                                Err(_) => Some("malformed command".to_owned()),
                            };
                            if let Some(reason) = reply {
                                let Ok(json) = serde_json::to_string(&ServerMsg::Error { reason }) else {
                                    continue;
                                };
                                if session.text(json).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Inbound::Ping(bytes) => {
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Inbound::Hangup => break,
                        Inbound::Ignore => {}
                    }
                }
                // registry → client
                Some(msg) = outbox.recv() => {
                    if let Ok(json) = serde_json::to_string(&msg) {
                        if let Err(e) = session.text(json).await {
                            log::warn!("WS send failed for {player_id}: {e:?}");
                            break;
                        }
                    }
                }
                else => break,
            }
        }

        state.notifier.unregister(player_id, conn_id);
        let _ = session.close(None).await;
        log::info!("WS closed for player {player_id}");
    });

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_of_stream_hangs_up() {
        assert_eq!(classify(None), Inbound::Hangup);
        assert_eq!(classify(Some(Ok(Message::Close(None)))), Inbound::Hangup);
    }

    #[test]
    fn text_and_ping_frames_are_kept() {
        assert_eq!(
            classify(Some(Ok(Message::Text("{}".into())))),
            Inbound::Command("{}".to_owned())
        );
        assert_eq!(
            classify(Some(Ok(Message::Ping(Bytes::from_static(b"hi"))))),
            Inbound::Ping(Bytes::from_static(b"hi"))
        );
        assert_eq!(classify(Some(Ok(Message::Pong(Bytes::new())))), Inbound::Ignore);
    }
}
