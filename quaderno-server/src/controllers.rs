use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Extension, Path, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use futures_util::{SinkExt, StreamExt};
use quaderno_core::protocol::ws::{MessageReceived, OnlineStatus, WsMessage};
use quaderno_core::{new_id, ChatHistoryResponse, SendMessage};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::ChatError;
use crate::sessions::resolve_chat;
use crate::AppState;

/// Handler per GET /api/chat/{user_id}/{target_user_id}
///
/// Risolve la chat per la coppia (creandola pigramente al primo contatto,
/// come la join e l'invio: l'operazione è idempotente) e restituisce lo
/// storico in ordine cronologico di append.
pub async fn chat_history(
    Extension(state): Extension<Arc<AppState>>,
    Path((user_id, target_user_id)): Path<(String, String)>,
) -> Result<Json<ChatHistoryResponse>, (StatusCode, String)> {
    let chat = resolve_chat(&state.store, &user_id, &target_user_id)
        .await
        .map_err(http_error)?;
    let messages = state
        .store
        .history(&chat.chat_id)
        .await
        .map_err(http_error)?;

    Ok(Json(ChatHistoryResponse {
        chat_id: chat.chat_id,
        participants: chat.participants,
        messages,
        created_at: chat.created_at,
        updated_at: chat.updated_at,
    }))
}

fn http_error(e: ChatError) -> (StatusCode, String) {
    (e.status(), e.to_string())
}

/// Handler per /ws
pub async fn ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    // id interno della connessione: è la chiave con cui presenza e stanze
    // la riconoscono, l'identità utente arriva solo nei payload degli eventi
    let conn_id = new_id();

    // `tx` è un `UnboundedSender<String>` che stanze e handler clonano per
    // inviare messaggi a questo client (server -> client).
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();

    // Split socket into sink/stream
    /* socket.split() divide l'oggetto WebSocket in due metà indipendenti:
        sender (un Sink) usato per inviare messaggi verso il client,
        receiver (uno Stream) usato per ricevere messaggi dal client. */
    let (mut sender, mut receiver) = socket.split();

    // Task: forward messages from rx -> websocket
    let forward_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    // Un evento alla volta per questa connessione; le altre connessioni
    // procedono in parallelo sul runtime.
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(t) => {
                // frame non decodificabili vengono saltati senza risposta
                if let Ok(parsed) = serde_json::from_str::<WsMessage>(&t) {
                    handle_ws_message(&state, &conn_id, &tx, parsed).await;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    // cleanup: presenza e stanze vengono rilasciate in un unico passo alla
    // disconnessione; un invio ancora in volo persiste comunque, il suo
    // broadcast verso questa connessione diventa un no-op
    state.presence.mark_offline(&conn_id);
    state.rooms.leave_all(&conn_id);
    drop(tx);
    let _ = forward_task.await;
    tracing::debug!(conn_id = %conn_id, "connection closed");
}

/// Dispatch di un singolo evento WS già decodificato. È pubblica così i test
/// la pilotano con un canale al posto di un socket vero.
pub async fn handle_ws_message(
    state: &AppState,
    conn_id: &str,
    tx: &UnboundedSender<String>,
    msg: WsMessage,
) {
    match msg {
        WsMessage::JoinChat(jc) => {
            match resolve_chat(&state.store, &jc.user_id, &jc.target_user_id).await {
                Ok(chat) => {
                    state.rooms.join(&chat.chat_id, conn_id, tx.clone());
                    tracing::info!(chat_id = %chat.chat_id, user_id = %jc.user_id, "joined chat room");
                }
                Err(e) => send_error(tx, &e),
            }
        }
        WsMessage::SendMessage(sm) => {
            if let Err(e) = handle_send(state, &sm).await {
                tracing::warn!(error = %e, sender_id = %sm.sender_id, "send message failed");
                // l'errore arriva solo alla connessione origine, mai alla stanza
                send_error(tx, &e);
            }
        }
        WsMessage::IsOnline(p) => {
            state.presence.mark_online(&p.user_id, conn_id);
            tracing::debug!(user_id = %p.user_id, "user online");
        }
        WsMessage::CheckOnlineStatus(q) => {
            let online = state.presence.is_online(&q.target_user_id);
            send_to(
                tx,
                &WsMessage::OnlineStatus(OnlineStatus {
                    target_user_id: q.target_user_id,
                    online,
                }),
            );
        }
        // varianti server→client: un client che le manda viene ignorato
        WsMessage::MessageReceived(_) | WsMessage::OnlineStatus(_) | WsMessage::Error(_) => {}
    }
}

/// Percorso di invio: risolve la chat (creandola se è il primo contatto,
/// scorciatoia voluta), accoda il messaggio e lo trasmette alla stanza.
/// Il lock per-chat resta tenuto da prima dell'append a dopo il broadcast,
/// quindi per gli osservatori della stanza i due passi sono un'unica mossa e
/// l'ordine di consegna è l'ordine con cui gli append completano.
/// Se l'append fallisce il broadcast non parte: nessun messaggio fantasma.
async fn handle_send(state: &AppState, sm: &SendMessage) -> Result<(), ChatError> {
    let chat = resolve_chat(&state.store, &sm.sender_id, &sm.target_user_id).await?;

    let lock = state.chat_lock(&chat.chat_id);
    let _guard = lock.lock().await;

    let message = state
        .store
        .append_message(&chat.chat_id, &sm.sender_id, &sm.sender_name, &sm.text)
        .await?;

    let event = WsMessage::MessageReceived(MessageReceived {
        chat_id: chat.chat_id.clone(),
        message,
    });
    if let Ok(text) = serde_json::to_string(&event) {
        state.rooms.broadcast(&chat.chat_id, &text);
    }
    Ok(())
}

fn send_to(tx: &UnboundedSender<String>, msg: &WsMessage) {
    if let Ok(s) = serde_json::to_string(msg) {
        // receiver già chiuso: la connessione sta morendo, non c'è nulla da fare
        let _ = tx.send(s);
    }
}

fn send_error(tx: &UnboundedSender<String>, e: &ChatError) {
    send_to(tx, &WsMessage::Error(e.to_wire()));
}
