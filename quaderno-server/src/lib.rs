use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use axum::http::StatusCode;
use dashmap::DashMap;
use sqlx::SqlitePool;
use tokio::sync::Mutex;

pub mod controllers;
pub mod error;
pub mod presence;
pub mod rooms;
pub mod routes;
pub mod sessions;
pub mod store;

use presence::PresenceTracker;
use rooms::RoomRegistry;
use store::ChatStore;

pub struct AppState {
    pub pool: SqlitePool,
    pub store: ChatStore,
    pub presence: PresenceTracker,
    pub rooms: RoomRegistry,
    /// Mutex per-chat, tenuto dal percorso di invio attraverso append e
    /// broadcast: l'ordine di consegna nella stanza coincide sempre con
    /// l'ordine in cui gli append completano. Chat diverse non condividono
    /// alcun lock.
    chat_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl AppState {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            store: ChatStore::new(pool.clone()),
            pool,
            presence: PresenceTracker::new(),
            rooms: RoomRegistry::new(),
            chat_locks: DashMap::new(),
        }
    }

    /// Lock di serializzazione per una singola chat.
    pub fn chat_lock(&self, chat_id: &str) -> Arc<Mutex<()>> {
        self.chat_locks
            .entry(chat_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

// Dato un percorso di file, restituisce un URL SQLite valido. Crea le directory genitrici se non esistono.
pub fn sqlite_url_for_path(p: &Path) -> anyhow::Result<String> {
    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()?.join(p)
    };
    if let Some(parent) = abs.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create parent dirs for {:?}", parent))?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .open(&abs)
        .with_context(|| format!("create/open sqlite file {:?}", abs))?;
    let s = abs.to_string_lossy().replace('\\', "/");
    Ok(format!("sqlite:///{}", s))
}

/// Crea un DB URL SQLite leggendo la variabile d'ambiente DATABASE_URL.
/// Se non è impostata, usa "quaderno.db" nella directory corrente.
pub fn build_sqlite_url() -> anyhow::Result<String> {
    let raw = std::env::var("DATABASE_URL").unwrap_or_else(|_| "quaderno.db".to_string());
    if raw == "sqlite::memory:" {
        return Ok(raw);
    }
    // Rimuovi il prefisso "sqlite://" se presente, per ottenere il percorso del file.
    let path_part = if raw.starts_with("sqlite://") {
        raw.trim_start_matches("sqlite:///")
            .trim_start_matches("sqlite://")
            .to_string()
    } else {
        raw
    };
    sqlite_url_for_path(&PathBuf::from(path_part))
}

// Connect to the database and return a connection pool.
pub async fn connect_pool(db_url: &str) -> anyhow::Result<SqlitePool> {
    let pool = SqlitePool::connect(db_url)
        .await
        .with_context(|| format!("connect to sqlite via {}", db_url))?;
    Ok(pool)
}

// Esegue le migrazioni del database. Crea le tabelle se non esistono.
pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    // Enable foreign keys (SQLite)
    sqlx::query("PRAGMA foreign_keys = ON;")
        .execute(pool)
        .await
        .context("enable foreign_keys")?;

    let stmts = [
        // l'indice UNIQUE su pair_key impone al più una chat per coppia di utenti
        r#"
        CREATE TABLE IF NOT EXISTS chats (
            chat_id    TEXT PRIMARY KEY,
            pair_key   TEXT NOT NULL UNIQUE,
            user_a     TEXT NOT NULL,
            user_b     TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );"#,
        // storico append-only: l'ordine dei messaggi di una chat è il seq
        r#"
        CREATE TABLE IF NOT EXISTS chat_messages (
            message_id  TEXT PRIMARY KEY,
            chat_id     TEXT NOT NULL,
            seq         INTEGER NOT NULL,
            sender_id   TEXT NOT NULL,
            sender_name TEXT NOT NULL,
            text        TEXT NOT NULL,
            timestamp   TEXT NOT NULL,
            FOREIGN KEY(chat_id) REFERENCES chats(chat_id)
        );"#,
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_chat_messages_chat_seq
            ON chat_messages(chat_id, seq);"#,
    ];
    // applica ogni statement di migrazione
    for s in &stmts {
        sqlx::query(s)
            .execute(pool)
            .await
            .with_context(|| format!("apply migration: {}", &s[..s.len().min(40)].replace('\n', " ")))?;
    }
    Ok(())
}

/// Controlla lo stato di salute del database tentando di acquisire una connessione dal pool.
pub async fn health_with_pool(pool: &SqlitePool) -> StatusCode {
    match pool.acquire().await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
