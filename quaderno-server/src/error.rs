use axum::http::StatusCode;
use thiserror::Error;

/// Tassonomia degli errori del core chat.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Chat o utente referenziato inesistente: riportato al chiamante, mai ritentato.
    #[error("not found: {0}")]
    NotFound(String),

    /// Campo mancante, vuoto o fuori misura: nessuna persistenza parziale.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Guasto transitorio dello store, già ritentato fino al limite.
    #[error("chat store unavailable: {0}")]
    StoreUnavailable(String),

    /// Errore non ritentabile fuori dalle categorie sopra (decodifica riga, statement malformato).
    #[error("internal error: {0}")]
    Internal(String),

    /// Due creazioni concorrenti della stessa coppia si sono scontrate
    /// sull'indice UNIQUE: chi perde ripete la lettura e restituisce la riga
    /// vincente, quindi questo errore non raggiunge mai il chiamante.
    #[error("conflicting concurrent creation")]
    Conflict,
}

impl ChatError {
    /// Codice errore esposto sul wire (WS e HTTP).
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::NotFound(_) => "not_found",
            ChatError::Validation(_) => "validation_failed",
            ChatError::StoreUnavailable(_) => "store_unavailable",
            ChatError::Internal(_) | ChatError::Conflict => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::NotFound(_) => StatusCode::NOT_FOUND,
            ChatError::Validation(_) => StatusCode::BAD_REQUEST,
            ChatError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ChatError::Internal(_) | ChatError::Conflict => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Converte nell'errore condiviso serializzabile sul wire.
    pub fn to_wire(&self) -> quaderno_core::Error {
        quaderno_core::Error::new(self.code(), self.to_string())
    }
}
