use std::time::Duration;

use quaderno_core::{new_id, now_timestamp, Chat, ChatMessage};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use crate::error::ChatError;

/// Dimensione massima del testo di un messaggio, in byte UTF-8.
pub const MAX_TEXT_BYTES: usize = 4096;

// Politica per i guasti transitori dello store: ogni chiamata è limitata da un
// timeout e ritentata al massimo MAX_RETRIES volte prima di arrendersi.
const STORE_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_RETRIES: u32 = 2;
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Chiave canonica di una coppia non ordinata di utenti: i due id ordinati
/// lessicograficamente e uniti da '_'. Restituisce (chiave, minore, maggiore).
/// Sulla chiave vive l'indice UNIQUE che impone al più una chat per coppia.
pub fn pair_key(user_a: &str, user_b: &str) -> (String, String, String) {
    let (lo, hi) = if user_a <= user_b {
        (user_a, user_b)
    } else {
        (user_b, user_a)
    };
    (format!("{}_{}", lo, hi), lo.to_string(), hi.to_string())
}

/// Repository persistente delle chat e dei loro messaggi.
#[derive(Clone)]
pub struct ChatStore {
    pool: SqlitePool,
}

impl ChatStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Cerca la chat il cui insieme di partecipanti è esattamente questa coppia.
    /// L'uguaglianza sulla chiave canonica esclude match parziali.
    pub async fn find_by_pair(&self, key: &str) -> Result<Option<Chat>, ChatError> {
        let pool = &self.pool;
        let row = with_retry(|| async move {
            sqlx::query(
                "SELECT chat_id, user_a, user_b, created_at, updated_at FROM chats WHERE pair_key = ?",
            )
            .bind(key)
            .fetch_optional(pool)
            .await
        })
        .await?;
        row.as_ref().map(row_to_chat).transpose()
    }

    /// Inserisce una nuova chat vuota per la coppia. Se un'altra connessione ha
    /// vinto la corsa sulla stessa coppia, l'indice UNIQUE su pair_key fa
    /// fallire l'INSERT e l'errore diventa `Conflict`.
    pub async fn create_chat(
        &self,
        key: &str,
        user_a: &str,
        user_b: &str,
    ) -> Result<Chat, ChatError> {
        let chat_id_s = new_id();
        let now_s = now_timestamp();
        let (pool, chat_id, now) = (&self.pool, chat_id_s.as_str(), now_s.as_str());
        with_retry(|| async move {
            sqlx::query(
                "INSERT INTO chats (chat_id, pair_key, user_a, user_b, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(chat_id)
            .bind(key)
            .bind(user_a)
            .bind(user_b)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
        })
        .await?;

        Ok(Chat {
            chat_id: chat_id_s,
            participants: vec![user_a.to_string(), user_b.to_string()],
            created_at: now_s.clone(),
            updated_at: now_s,
        })
    }

    /// Legge una chat per id.
    pub async fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>, ChatError> {
        let pool = &self.pool;
        let row = with_retry(|| async move {
            sqlx::query(
                "SELECT chat_id, user_a, user_b, created_at, updated_at FROM chats WHERE chat_id = ?",
            )
            .bind(chat_id)
            .fetch_optional(pool)
            .await
        })
        .await?;
        row.as_ref().map(row_to_chat).transpose()
    }

    /// Accoda un messaggio alla chat. Il messaggio viene validato prima di
    /// toccare lo store (niente persistenza parziale) e il seq è assegnato
    /// dentro la stessa INSERT, quindi il messaggio finisce sempre in coda.
    /// Fallisce con `NotFound` se la chat non esiste: l'append non crea mai
    /// la conversazione.
    pub async fn append_message(
        &self,
        chat_id: &str,
        sender_id: &str,
        sender_name: &str,
        text: &str,
    ) -> Result<ChatMessage, ChatError> {
        validate_message(sender_id, sender_name, text)?;

        let pool = &self.pool;
        let existing: i64 = with_retry(|| async move {
            sqlx::query_scalar("SELECT COUNT(*) FROM chats WHERE chat_id = ?")
                .bind(chat_id)
                .fetch_one(pool)
                .await
        })
        .await?;
        if existing == 0 {
            return Err(ChatError::NotFound(format!("chat {} does not exist", chat_id)));
        }

        let message_id_s = new_id();
        let now_s = now_timestamp();
        let (message_id, now) = (message_id_s.as_str(), now_s.as_str());
        with_retry(|| async move {
            let mut tx = pool.begin().await?;
            sqlx::query(
                "INSERT INTO chat_messages (message_id, chat_id, seq, sender_id, sender_name, text, timestamp) \
                 VALUES (?, ?, (SELECT COALESCE(MAX(seq), -1) + 1 FROM chat_messages WHERE chat_id = ?), ?, ?, ?, ?)",
            )
            .bind(message_id)
            .bind(chat_id)
            .bind(chat_id)
            .bind(sender_id)
            .bind(sender_name)
            .bind(text)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            sqlx::query("UPDATE chats SET updated_at = ? WHERE chat_id = ?")
                .bind(now)
                .bind(chat_id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await
        })
        .await
        .map_err(|e| match e {
            // collisione sul seq: possibile solo se il chiamante non ha
            // serializzato gli append sulla stessa chat
            ChatError::Conflict => ChatError::StoreUnavailable("concurrent append".to_string()),
            e => e,
        })?;

        Ok(ChatMessage {
            sender_id: sender_id.to_string(),
            sender_name: sender_name.to_string(),
            text: text.to_string(),
            timestamp: now_s,
        })
    }

    /// Storico della chat in ordine di append. Una chat senza messaggi
    /// restituisce la lista vuota, non un errore.
    pub async fn history(&self, chat_id: &str) -> Result<Vec<ChatMessage>, ChatError> {
        let pool = &self.pool;
        let rows = with_retry(|| async move {
            sqlx::query(
                "SELECT sender_id, sender_name, text, timestamp FROM chat_messages \
                 WHERE chat_id = ? ORDER BY seq",
            )
            .bind(chat_id)
            .fetch_all(pool)
            .await
        })
        .await?;
        rows.iter().map(row_to_message).collect()
    }
}

fn validate_message(sender_id: &str, sender_name: &str, text: &str) -> Result<(), ChatError> {
    if sender_id.trim().is_empty() {
        return Err(ChatError::Validation("senderId must not be empty".to_string()));
    }
    if sender_name.trim().is_empty() {
        return Err(ChatError::Validation("senderName must not be empty".to_string()));
    }
    if text.trim().is_empty() {
        return Err(ChatError::Validation("message text must not be empty".to_string()));
    }
    if text.len() > MAX_TEXT_BYTES {
        return Err(ChatError::Validation(format!(
            "message text exceeds {} bytes",
            MAX_TEXT_BYTES
        )));
    }
    Ok(())
}

fn row_to_chat(row: &SqliteRow) -> Result<Chat, ChatError> {
    let user_a: String = row.try_get("user_a").map_err(db_get_err)?;
    let user_b: String = row.try_get("user_b").map_err(db_get_err)?;
    Ok(Chat {
        chat_id: row.try_get("chat_id").map_err(db_get_err)?,
        participants: vec![user_a, user_b],
        created_at: row.try_get("created_at").map_err(db_get_err)?,
        updated_at: row.try_get("updated_at").map_err(db_get_err)?,
    })
}

fn row_to_message(row: &SqliteRow) -> Result<ChatMessage, ChatError> {
    Ok(ChatMessage {
        sender_id: row.try_get("sender_id").map_err(db_get_err)?,
        sender_name: row.try_get("sender_name").map_err(db_get_err)?,
        text: row.try_get("text").map_err(db_get_err)?,
        timestamp: row.try_get("timestamp").map_err(db_get_err)?,
    })
}

fn db_get_err(e: sqlx::Error) -> ChatError {
    ChatError::Internal(format!("db get error: {}", e))
}

/// Esegue un'operazione sullo store con timeout e retry limitato sui soli
/// guasti transitori. Le violazioni UNIQUE diventano `Conflict`, il resto
/// degli errori non transitori `Internal`.
async fn with_retry<T, F, Fut>(mut op: F) -> Result<T, ChatError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, sqlx::Error>>,
{
    let mut attempt = 0u32;
    loop {
        match tokio::time::timeout(STORE_TIMEOUT, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) if is_unique_violation(&e) => return Err(ChatError::Conflict),
            Ok(Err(e)) if is_transient(&e) => {
                if attempt >= MAX_RETRIES {
                    return Err(ChatError::StoreUnavailable(e.to_string()));
                }
                tracing::warn!(error = %e, attempt, "transient store error, retrying");
            }
            Ok(Err(e)) => return Err(ChatError::Internal(format!("db error: {}", e))),
            Err(_) => {
                if attempt >= MAX_RETRIES {
                    return Err(ChatError::StoreUnavailable(
                        "store operation timed out".to_string(),
                    ));
                }
                tracing::warn!(attempt, "store operation timed out, retrying");
            }
        }
        attempt += 1;
        tokio::time::sleep(RETRY_BACKOFF).await;
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_transient(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut => true,
        // SQLITE_BUSY (5) e SQLITE_LOCKED (6)
        sqlx::Error::Database(db) => matches!(db.code().as_deref(), Some("5") | Some("6")),
        _ => false,
    }
}
