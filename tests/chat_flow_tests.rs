// End-to-end chat tests against the in-memory backend: streaming, sending,
// presence and listener teardown.

mod common;
use common::{setup_logging, sign_in_named, test_backend, wait_for, ReadOnlyStore, NOW_MS};

use std::sync::Arc;

use anyhow::Result;
use chrono::{TimeZone, Utc};
use log::info;
use serde_json::json;

use sochat::account::profile;
use sochat::backend::{MemoryBackend, RealtimeStore};
use sochat::chat::{append_message, conversation_path, presence, ChatScreen};
use sochat::ChatError;
use sochat::models::{UserStatus, UserSummary};
use sochat::AuthSession;

async fn two_users(backend: &MemoryBackend) -> Result<(AuthSession, AuthSession)> {
    let bob = sign_in_named(backend, "bob", "Bob", "+628000000002").await?;
    // Signing in alice replaces bob as the current user; bob's session stays usable
    let alice = sign_in_named(backend, "alice", "Alice", "+628000000001").await?;
    Ok((alice, bob))
}

fn summary(session: &AuthSession) -> UserSummary {
    UserSummary {
        uid: session.uid().to_string(),
        name: session.user().display_name.clone().unwrap_or_default(),
        photo: None,
        status: None,
    }
}

fn texts(chat: &ChatScreen) -> Vec<String> {
    chat.view().newest_first().map(|m| m.text.clone()).collect()
}

/// Messages arrive one list entry per event, newest first
#[tokio::test]
async fn test_messages_listed_newest_first() -> Result<()> {
    setup_logging();
    let backend = test_backend();
    let (alice, bob) = two_users(&backend).await?;

    let mut chat = ChatScreen::open(backend.store.clone(), alice.clone(), summary(&bob))?;
    for text in ["one", "two", "three"] {
        chat.set_text(text);
        assert!(chat.send().await?.is_some());
    }

    assert_eq!(chat.poll_updates(), 3);
    assert_eq!(chat.view().len(), 3);
    assert_eq!(texts(&chat), vec!["three", "two", "one"]);
    assert!(chat.view().newest_first().all(|m| chat.is_own(m)));
    assert!(chat.view().newest_first().all(|m| m.timestamp == NOW_MS));

    chat.close();
    Ok(())
}

/// Opening a chat replays the stored history before live messages
#[tokio::test]
async fn test_history_replayed_on_open() -> Result<()> {
    setup_logging();
    let backend = test_backend();
    let (alice, bob) = two_users(&backend).await?;

    append_message(backend.store.as_ref(), &bob, alice.uid(), "first").await?;
    append_message(backend.store.as_ref(), &bob, alice.uid(), "second").await?;

    let mut chat = ChatScreen::open(backend.store.clone(), alice.clone(), summary(&bob))?;
    wait_for(&mut chat, |c| c.view().len() == 2).await?;
    assert_eq!(texts(&chat), vec!["second", "first"]);
    assert!(chat.view().newest_first().all(|m| m.sender_id == "bob"));

    append_message(backend.store.as_ref(), &bob, alice.uid(), "third").await?;
    wait_for(&mut chat, |c| c.view().len() == 3).await?;
    assert_eq!(chat.view().latest().map(|m| m.text.as_str()), Some("third"));

    chat.close();
    Ok(())
}

/// Blank input writes nothing and leaves the field alone
#[tokio::test]
async fn test_blank_send_is_a_no_op() -> Result<()> {
    setup_logging();
    let backend = test_backend();
    let (alice, bob) = two_users(&backend).await?;

    let mut chat = ChatScreen::open(backend.store.clone(), alice, summary(&bob))?;
    for blank in ["", "   ", "\n\t"] {
        chat.set_text(blank);
        assert_eq!(chat.send().await?, None);
        assert_eq!(chat.text(), blank);
    }

    assert_eq!(backend.store.snapshot("messages")?, None);
    assert_eq!(chat.poll_updates(), 0);
    assert!(chat.view().is_empty());
    Ok(())
}

/// One send writes the same record to both participants under one key
#[tokio::test]
async fn test_send_writes_both_copies() -> Result<()> {
    setup_logging();
    let backend = test_backend();
    let (alice, bob) = two_users(&backend).await?;

    let mut chat = ChatScreen::open(backend.store.clone(), alice.clone(), summary(&bob))?;
    chat.set_text("  hello ");
    let id = chat.send().await?.expect("message id");
    assert_eq!(chat.text(), "");

    let expected = json!({ "message": "hello", "time": NOW_MS, "from": "alice" });
    let mine = backend.store.get(&format!("{}/{}", conversation_path("alice", "bob"), id)).await?;
    let theirs = backend.store.get(&format!("{}/{}", conversation_path("bob", "alice"), id)).await?;
    assert_eq!(mine, Some(expected.clone()));
    assert_eq!(theirs, Some(expected));

    // Exactly one message on each side
    let all = backend.store.get("messages").await?.unwrap();
    assert_eq!(all["alice"]["bob"].as_object().map(|m| m.len()), Some(1));
    assert_eq!(all["bob"]["alice"].as_object().map(|m| m.len()), Some(1));

    // The list fills from the listener, not from send
    assert!(chat.view().is_empty());
    assert_eq!(chat.poll_updates(), 1);
    assert_eq!(chat.view().latest().map(|m| m.id.clone()), Some(id));
    Ok(())
}

/// Both sides of an open conversation see each other's messages
#[tokio::test]
async fn test_peer_receives_message() -> Result<()> {
    setup_logging();
    let backend = test_backend();
    let (alice, bob) = two_users(&backend).await?;

    let mut alice_chat = ChatScreen::open(backend.store.clone(), alice.clone(), summary(&bob))?;
    let mut bob_chat = ChatScreen::open(backend.store.clone(), bob.clone(), summary(&alice))?;

    alice_chat.set_text("hi bob");
    alice_chat.send().await?;
    wait_for(&mut bob_chat, |c| !c.view().is_empty()).await?;

    let received = bob_chat.view().latest().cloned().unwrap();
    info!("Bob received {:?}", received);
    assert_eq!(received.text, "hi bob");
    assert_eq!(received.sender_id, "alice");
    assert!(!bob_chat.is_own(&received));

    bob_chat.set_text("hi alice");
    bob_chat.send().await?;
    wait_for(&mut alice_chat, |c| c.view().len() == 2).await?;
    assert_eq!(texts(&alice_chat), vec!["hi alice", "hi bob"]);

    alice_chat.close();
    bob_chat.close();
    Ok(())
}

/// The header follows the peer going online and then signing out
#[tokio::test]
async fn test_header_tracks_peer_presence() -> Result<()> {
    setup_logging();
    let backend = test_backend();
    let (alice, bob) = two_users(&backend).await?;
    let now = Utc.timestamp_millis_opt(NOW_MS).unwrap();

    let mut peer = summary(&bob);
    peer.name = "Bob with a rather long display name".to_string();
    let mut chat = ChatScreen::open(backend.store.clone(), alice, peer)?;
    assert_eq!(chat.header_name(), "Bob with a rather long di...");
    assert_eq!(chat.header_status(&now), "");

    presence::mark_online(backend.store.as_ref(), &bob).await?;
    wait_for(&mut chat, |c| c.header_status(&now) == "Online").await?;

    profile::sign_out(&backend.services(), bob).await?;
    wait_for(&mut chat, |c| c.header_status(&now) != "Online").await?;
    assert_eq!(chat.header_status(&now), "Today at 10:13 PM");
    assert_eq!(
        backend.store.get("users/bob/status").await?,
        Some(json!(NOW_MS))
    );

    chat.close();
    Ok(())
}

/// A summary's status shows until the store says otherwise
#[tokio::test]
async fn test_summary_status_shown_until_stored() -> Result<()> {
    setup_logging();
    let backend = test_backend();
    let (alice, bob) = two_users(&backend).await?;
    let now = Utc.timestamp_millis_opt(NOW_MS).unwrap();

    let mut peer = summary(&bob);
    peer.status = Some(UserStatus::Other("sometime".to_string()));
    let mut chat = ChatScreen::open(backend.store.clone(), alice, peer)?;
    chat.poll_updates();
    assert_eq!(chat.header_status(&now), "Invalid date");

    backend.store.set("users/bob/status", json!("Online")).await?;
    chat.poll_updates();
    assert_eq!(chat.header_status(&now), "Online");
    Ok(())
}

/// Once the peer was online, any later status value replaces it
#[tokio::test]
async fn test_header_leaves_online_on_any_change() -> Result<()> {
    setup_logging();
    let backend = test_backend();
    let (alice, bob) = two_users(&backend).await?;
    let now = Utc.timestamp_millis_opt(NOW_MS).unwrap();

    let mut chat = ChatScreen::open(backend.store.clone(), alice, summary(&bob))?;
    backend.store.set("users/bob/status", json!("Online")).await?;
    chat.poll_updates();
    assert_eq!(chat.header_status(&now), "Online");

    backend.store.set("users/bob/status", json!(null)).await?;
    chat.poll_updates();
    assert_eq!(chat.header_status(&now), "Invalid date");

    backend.store.set("users/bob/status", json!("Online")).await?;
    chat.poll_updates();
    backend.store.set("users/bob/status", json!(1_699_999_000_000.0)).await?;
    chat.poll_updates();
    assert_eq!(chat.header_status(&now), "Today at 9:56 PM");

    backend.store.set("users/bob/status", json!("Online")).await?;
    chat.poll_updates();
    backend.store.set("users/bob/status", json!(true)).await?;
    chat.poll_updates();
    assert_eq!(chat.header_status(&now), "Invalid date");

    chat.close();
    Ok(())
}

/// A rejected write keeps the compose text and reports the failure
#[tokio::test]
async fn test_failed_send_keeps_text() -> Result<()> {
    setup_logging();
    let backend = test_backend();
    let (alice, bob) = two_users(&backend).await?;
    let store = Arc::new(ReadOnlyStore { inner: backend.store.clone() });

    let mut chat = ChatScreen::open(store, alice, summary(&bob))?;
    chat.set_text("not going anywhere");
    let err = chat.send().await.unwrap_err();
    assert!(matches!(err, ChatError::Backend(_)));
    assert!(err.user_message().is_none());
    assert_eq!(chat.text(), "not going anywhere");

    assert_eq!(backend.store.snapshot("messages")?, None);
    assert_eq!(chat.poll_updates(), 0);
    assert!(chat.view().is_empty());

    chat.close();
    assert_eq!(backend.store.listener_count(), 0);
    Ok(())
}

/// Closing or dropping the screen detaches both listeners
#[tokio::test]
async fn test_teardown_detaches_listeners() -> Result<()> {
    setup_logging();
    let backend = test_backend();
    let (alice, bob) = two_users(&backend).await?;

    let chat = ChatScreen::open(backend.store.clone(), alice.clone(), summary(&bob))?;
    assert_eq!(backend.store.listener_count(), 2);
    chat.close();
    assert_eq!(backend.store.listener_count(), 0);

    {
        let _chat = ChatScreen::open(backend.store.clone(), alice.clone(), summary(&bob))?;
        assert_eq!(backend.store.listener_count(), 2);
    }
    assert_eq!(backend.store.listener_count(), 0);

    // Writes after teardown reach nobody and still succeed
    append_message(backend.store.as_ref(), &bob, alice.uid(), "late").await?;
    assert_eq!(backend.store.listener_count(), 0);
    Ok(())
}
