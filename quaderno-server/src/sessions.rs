/* Session resolver: mappa una coppia non ordinata di utenti sull'unica chat
   che rappresenta la loro conversazione, creandola al primo contatto.
   È l'unico punto del server che fa check-or-create: sia la join che l'invio
   passano da qui, così la logica non viene duplicata. */

use quaderno_core::Chat;

use crate::error::ChatError;
use crate::store::{pair_key, ChatStore};

/// Risolve (ed eventualmente crea) la chat per la coppia {user_id, target_user_id}.
///
/// Idempotente e indipendente dall'ordine degli argomenti: chiamate ripetute
/// restituiscono sempre la chat con lo stesso id. Il primo contatto
/// concorrente sulla stessa coppia non produce mai due chat: chi perde la
/// corsa sull'indice UNIQUE rilegge e restituisce la riga vincente.
pub async fn resolve_chat(
    store: &ChatStore,
    user_id: &str,
    target_user_id: &str,
) -> Result<Chat, ChatError> {
    if user_id.trim().is_empty() || target_user_id.trim().is_empty() {
        return Err(ChatError::Validation(
            "userId and targetUserId must not be empty".to_string(),
        ));
    }
    if user_id == target_user_id {
        return Err(ChatError::Validation(
            "cannot open a chat with yourself".to_string(),
        ));
    }

    let (key, lo, hi) = pair_key(user_id, target_user_id);

    if let Some(chat) = store.find_by_pair(&key).await? {
        return Ok(chat);
    }

    match store.create_chat(&key, &lo, &hi).await {
        Ok(chat) => Ok(chat),
        // corsa persa sul primo contatto: la chat ormai esiste, restituiscila
        Err(ChatError::Conflict) => store.find_by_pair(&key).await?.ok_or_else(|| {
            ChatError::Internal("chat missing after creation conflict".to_string())
        }),
        Err(e) => Err(e),
    }
}
