use log::{debug, info};
use serde_json::json;

use crate::backend::{path, RealtimeStore, ServerValue, Updates};
use crate::error::BackendResult;
use crate::session::AuthSession;

use super::conversation_path;

/// Append `text` to the conversation with `peer_uid`.
///
/// Returns the new message id, or `None` when the trimmed text is empty and
/// nothing was written. Both participants' copies go out in one atomic
/// multi-path update under the same key.
pub async fn append_message(
    store: &dyn RealtimeStore,
    session: &AuthSession,
    peer_uid: &str,
    text: &str,
) -> BackendResult<Option<String>> {
    let text = text.trim();
    if text.is_empty() {
        debug!("Ignoring empty message to {}", peer_uid);
        return Ok(None);
    }

    let mine = conversation_path(session.uid(), peer_uid);
    let theirs = conversation_path(peer_uid, session.uid());
    let message_id = store.push_key(&mine)?;

    let record = json!({
        "message": text,
        "time": ServerValue::timestamp(),
        "from": session.uid(),
    });

    let mut updates = Updates::new();
    updates.insert(path::join(&[&mine, &message_id]), record.clone());
    updates.insert(path::join(&[&theirs, &message_id]), record);
    store.update(updates).await?;

    info!("Sent message {} to {}", message_id, peer_uid);
    Ok(Some(message_id))
}
