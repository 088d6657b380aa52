/* This file defines how data "travel" through the web socket.
    WsMessage is an enum for the envelope { type, payload }; the variants are:
    JoinChat / SendMessage / IsOnline / CheckOnlineStatus -> intents from the client
    MessageReceived -> broadcast from the server to the chat room
    OnlineStatus -> directed reply from the server to a checkOnlineStatus
    Error -> error delivered only to the connection that caused it
*/
use serde::{Deserialize, Serialize};

use crate::{error::Error, models::ChatMessage};

/// Messaggio WS con envelope { type, payload }.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum WsMessage {
    /// Client → Server: iscrizione alla stanza della conversazione con targetUserId.
    #[serde(rename = "joinChat")]
    JoinChat(JoinChat),
    /// Client → Server: richiesta di inviare un messaggio.
    #[serde(rename = "sendMessage")]
    SendMessage(SendMessage),
    /// Client → Server: registra questa connessione come "online" per userId.
    #[serde(rename = "isOnline")]
    IsOnline(IsOnline),
    /// Client → Server: chiede se targetUserId risulta online.
    #[serde(rename = "checkOnlineStatus")]
    CheckOnlineStatus(CheckOnlineStatus),
    /// Server → Client: nuovo messaggio, inviato a tutta la stanza (mittente incluso).
    #[serde(rename = "messageReceived")]
    MessageReceived(MessageReceived),
    /// Server → Client: risposta puntuale ad un checkOnlineStatus.
    #[serde(rename = "onlineStatus")]
    OnlineStatus(OnlineStatus),
    /// Server → Client: errore fuori banda, solo alla connessione origine.
    #[serde(rename = "error")]
    Error(Error),
}

/// Payload per l'iscrizione ad una conversazione (C→S).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinChat {
    pub user_id: String,
    pub target_user_id: String,
}

/// Payload per l'intento di invio messaggio (C→S).
/// La chat viene risolta (ed eventualmente creata) dal server a partire
/// dalla coppia mittente/destinatario: il client non conosce il chatId.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    pub sender_id: String,
    pub sender_name: String,
    pub target_user_id: String,
    pub text: String,
}

/// Payload di aggiornamento presenza (C→S).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsOnline {
    pub user_id: String,
}

/// Payload di interrogazione presenza (C→S).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOnlineStatus {
    pub target_user_id: String,
}

/// Evento di nuovo messaggio nella stanza (S→C).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReceived {
    pub chat_id: String,
    pub message: ChatMessage,
}

/// Risposta ad un checkOnlineStatus (S→C), solo alla connessione richiedente.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineStatus {
    pub target_user_id: String,
    pub online: bool,
}
