use anyhow::Result;
use quaderno_server::error::ChatError;
use quaderno_server::sessions::resolve_chat;
use quaderno_server::store::{pair_key, ChatStore, MAX_TEXT_BYTES};
use quaderno_server::{connect_pool, run_migrations, sqlite_url_for_path};
use sqlx::SqlitePool;
use tempfile::TempDir;

// Funzione di utilità: pool su file temporaneo, con migrazioni applicate
async fn pool_for(td: &TempDir) -> Result<SqlitePool> {
    let db_path = td.path().join("quaderno.db");
    let url = sqlite_url_for_path(db_path.as_path())?;
    let pool = connect_pool(&url).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

/*
    Obiettivo test: la chiave canonica della coppia è indipendente dall'ordine
    degli argomenti e ordina i due id lessicograficamente.
*/
#[test]
fn pair_key_is_order_independent() {
    let (k1, lo1, hi1) = pair_key("u2", "u1");
    let (k2, lo2, hi2) = pair_key("u1", "u2");
    assert_eq!(k1, k2);
    assert_eq!(k1, "u1_u2");
    assert_eq!((lo1, hi1), (lo2, hi2));
}

/*
    Obiettivo test: resolve_chat è idempotente e indipendente dall'ordine.
    u1 contatta u2 per primo: nasce una chat nuova, vuota. u2 risolve la
    coppia al contrario e deve ottenere la stessa chat, non una nuova.
*/
#[tokio::test]
async fn resolve_is_idempotent_and_order_independent() -> Result<()> {
    let td = TempDir::new()?;
    let pool = pool_for(&td).await?;
    let store = ChatStore::new(pool.clone());

    let first = resolve_chat(&store, "u1", "u2").await?;
    assert_eq!(first.participants, vec!["u1".to_string(), "u2".to_string()]);
    assert!(store.history(&first.chat_id).await?.is_empty());

    let second = resolve_chat(&store, "u2", "u1").await?;
    assert_eq!(second.chat_id, first.chat_id);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chats")
        .fetch_one(&pool)
        .await?;
    assert_eq!(count, 1, "repeated resolves must not create new chats");
    Ok(())
}

/*
    Obiettivo test: lo storico restituisce i messaggi nell'ordine in cui gli
    append sono completati, senza perdite né duplicati.
*/
#[tokio::test]
async fn history_preserves_append_order() -> Result<()> {
    let td = TempDir::new()?;
    let pool = pool_for(&td).await?;
    let store = ChatStore::new(pool);

    let chat = resolve_chat(&store, "u1", "u2").await?;
    store
        .append_message(&chat.chat_id, "u1", "alice", "hello")
        .await?;
    store.append_message(&chat.chat_id, "u2", "bob", "hi").await?;
    for i in 0..5 {
        store
            .append_message(&chat.chat_id, "u1", "alice", &format!("msg-{}", i))
            .await?;
    }

    let history = store.history(&chat.chat_id).await?;
    assert_eq!(history.len(), 7);
    assert_eq!(history[0].sender_id, "u1");
    assert_eq!(history[0].text, "hello");
    assert_eq!(history[1].sender_id, "u2");
    assert_eq!(history[1].text, "hi");
    for i in 0..5 {
        assert_eq!(history[2 + i].text, format!("msg-{}", i));
    }

    // i timestamp assegnati dal server non retrocedono mai dentro una chat
    for pair in history.windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }
    Ok(())
}

/*
    Obiettivo test: primo contatto concorrente sulla stessa coppia.
    Molte risoluzioni in parallelo devono convergere su un'unica chat:
    chi perde la corsa sull'indice UNIQUE rilegge la riga vincente.
*/
#[tokio::test]
async fn concurrent_first_contact_creates_single_chat() -> Result<()> {
    let td = TempDir::new()?;
    let pool = pool_for(&td).await?;
    let store = ChatStore::new(pool.clone());

    let mut handles = Vec::new();
    for _ in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            resolve_chat(&store, "u1", "u2").await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        let chat = handle.await??;
        ids.push(chat.chat_id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1, "all resolvers must converge on one chat");

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chats")
        .fetch_one(&pool)
        .await?;
    assert_eq!(count, 1, "exactly one chat row may exist for the pair");
    Ok(())
}

/*
    Obiettivo test: input non validi al resolver.
    Chat con sé stessi e id vuoti vengono rifiutati senza toccare lo store.
*/
#[tokio::test]
async fn resolve_rejects_invalid_pairs() -> Result<()> {
    let td = TempDir::new()?;
    let pool = pool_for(&td).await?;
    let store = ChatStore::new(pool.clone());

    let err = resolve_chat(&store, "u1", "u1").await.unwrap_err();
    assert!(matches!(err, ChatError::Validation(_)));

    let err = resolve_chat(&store, "", "u2").await.unwrap_err();
    assert!(matches!(err, ChatError::Validation(_)));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chats")
        .fetch_one(&pool)
        .await?;
    assert_eq!(count, 0);
    Ok(())
}

/*
    Obiettivo test: testo vuoto (o di soli spazi) e testo oltre il limite
    vengono rifiutati con errore di validazione e nessuna mutazione dello store.
*/
#[tokio::test]
async fn append_rejects_invalid_text_without_mutation() -> Result<()> {
    let td = TempDir::new()?;
    let pool = pool_for(&td).await?;
    let store = ChatStore::new(pool.clone());

    let chat = resolve_chat(&store, "u1", "u2").await?;

    let err = store
        .append_message(&chat.chat_id, "u1", "alice", "")
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Validation(_)));

    let err = store
        .append_message(&chat.chat_id, "u1", "alice", "   \n\t")
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Validation(_)));

    let oversized = "x".repeat(MAX_TEXT_BYTES + 1);
    let err = store
        .append_message(&chat.chat_id, "u1", "alice", &oversized)
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Validation(_)));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_messages")
        .fetch_one(&pool)
        .await?;
    assert_eq!(count, 0, "rejected messages must not be persisted");
    Ok(())
}

/*
    Obiettivo test: l'append non crea mai la conversazione: su una chat
    inesistente fallisce con NotFound.
*/
#[tokio::test]
async fn append_to_missing_chat_is_not_found() -> Result<()> {
    let td = TempDir::new()?;
    let pool = pool_for(&td).await?;
    let store = ChatStore::new(pool);

    let err = store
        .append_message("no-such-chat", "u1", "alice", "hello")
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::NotFound(_)));
    Ok(())
}

/*
    Obiettivo test: get_chat legge per id la chat creata dal resolver e
    restituisce None per un id sconosciuto.
*/
#[tokio::test]
async fn get_chat_reads_back_resolved_chat() -> Result<()> {
    let td = TempDir::new()?;
    let pool = pool_for(&td).await?;
    let store = ChatStore::new(pool);

    let chat = resolve_chat(&store, "u1", "u2").await?;
    let found = store.get_chat(&chat.chat_id).await?.expect("chat exists");
    assert_eq!(found, chat);

    assert!(store.get_chat("no-such-chat").await?.is_none());
    Ok(())
}
