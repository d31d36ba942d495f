//! Turn pipeline tests driven through [`ScenarioBot::handle_message`]:
//! routing, goto resolution, action refusal rollback, root data reset,
//! presence, menus, TTL, and error handling.

mod common;

use common::mock_transport::{message, MockTransport, SentMessage};
use sbot_core::PresenceSignal;
use scenario::{Api, Scenario, TurnContext};
use scenario_bot::ScenarioBot;
use serde_json::{json, Value};
use session_store::{InMemoryStore, SessionStore, UserSession};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

struct Harness {
    bot: ScenarioBot,
    sessions: SessionStore,
    store: Arc<InMemoryStore>,
    sent_rx: mpsc::UnboundedReceiver<SentMessage>,
    presence_rx: mpsc::UnboundedReceiver<PresenceSignal>,
}

fn harness(api: Api, definition: Value) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let sessions = SessionStore::new(store.clone());
    let (transport, sent_rx, presence_rx) = MockTransport::with_receivers(Vec::new());
    let scenario = Scenario::new(Arc::new(api), &definition).expect("test definition");
    let bot = ScenarioBot::new(transport, Arc::new(scenario), sessions.clone());
    Harness {
        bot,
        sessions,
        store,
        sent_rx,
        presence_rx,
    }
}

/// Counting hook capability; returns Null.
fn counter(api: Api, name: &str) -> (Api, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = count.clone();
    let api = api.register_fn(name, move |_ctx: &mut TurnContext, _args: &[Value]| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Null)
    });
    (api, count)
}

#[tokio::test]
async fn test_command_match_yields_child_reply() {
    let mut h = harness(
        Api::new(),
        json!({
            "name": "root",
            "reply": "hi",
            "commands": {
                "/go": { "name": "go", "reply": "there" }
            }
        }),
    );

    h.bot.handle_message(message(1, "/go")).await.unwrap();

    let sent = h.sent_rx.try_recv().unwrap();
    assert_eq!(sent.text, "there");
    assert_eq!(sent.chat_id, 1);

    // "go" has no commands, so its implicit goto returns the user to root
    // for the next turn
    let session = h.sessions.load(1).await.unwrap();
    assert_eq!(session.path, "/root");
    assert!(session.data.is_empty());
}

#[tokio::test]
async fn test_matched_node_with_commands_keeps_path() {
    let mut h = harness(
        Api::new(),
        json!({
            "name": "root",
            "reply": "hi",
            "commands": {
                "^/go": {
                    "name": "go",
                    "reply": "there",
                    "commands": {
                        "^/deep": { "name": "deep", "reply": "down" }
                    }
                }
            }
        }),
    );

    h.bot.handle_message(message(1, "/go")).await.unwrap();
    assert_eq!(h.sent_rx.try_recv().unwrap().text, "there");
    assert_eq!(h.sessions.load(1).await.unwrap().path, "/root/go");

    // the next message routes from the saved position
    h.bot.handle_message(message(1, "/deep")).await.unwrap();
    assert_eq!(h.sent_rx.try_recv().unwrap().text, "down");
}

#[tokio::test]
async fn test_wildcard_fallback_catches_unmatched_text() {
    let mut h = harness(
        Api::new(),
        json!({
            "name": "root",
            "commands": {
                ".": { "name": "fallback", "reply": "caught", "goto": "." },
                "^/go": { "name": "go", "reply": "there" }
            }
        }),
    );

    h.bot.handle_message(message(1, "xyz")).await.unwrap();
    assert_eq!(h.sent_rx.try_recv().unwrap().text, "caught");
    assert_eq!(h.sessions.load(1).await.unwrap().path, "/root/fallback");
}

#[tokio::test]
async fn test_reentering_root_clears_session_data() {
    let mut h = harness(
        Api::new(),
        json!({
            "name": "root",
            "commands": {
                "^/child": { "name": "child", "reply": "leaf" }
            }
        }),
    );

    let mut session = UserSession::at_root();
    session.path = "/root/child".to_string();
    session.data.insert("x".to_string(), json!(1));
    h.sessions.save(1, &session, None).await.unwrap();

    // child is a leaf: its implicit goto resolves to root, which wipes data
    h.bot.handle_message(message(1, "anything")).await.unwrap();

    let session = h.sessions.load(1).await.unwrap();
    assert_eq!(session.path, "/root");
    assert_eq!(session.data, serde_json::Map::new());
}

#[tokio::test]
async fn test_action_refusal_rolls_back_to_parent() {
    let api = Api::new().register_fn("checkNumber", |ctx: &mut TurnContext, _args: &[Value]| {
        if ctx.text.trim().parse::<i64>().is_ok() {
            Ok(Value::Null)
        } else {
            Ok(json!("Please, type number only"))
        }
    });
    let (api, after_calls) = counter(api, "afterCheck");
    let (api, before_parent) = counter(api, "beforeGuess");

    let mut h = harness(
        api,
        json!({
            "name": "root",
            "commands": {
                "^/guess": {
                    "name": "guess",
                    "reply": "Send me a number",
                    "before": "<% beforeGuess %>",
                    "commands": {
                        ".": {
                            "name": "check",
                            "action": "<% checkNumber %>",
                            "reply": "saved",
                            "goto": "/",
                            "after": "<% afterCheck %>"
                        }
                    }
                }
            }
        }),
    );

    let mut session = UserSession::at_root();
    session.path = "/root/guess".to_string();
    h.sessions.save(1, &session, None).await.unwrap();

    h.bot.handle_message(message(1, "not a number")).await.unwrap();

    // the refusal text is the reply, the path moved up one segment, the
    // parent's before ran again, and neither goto nor after was processed
    assert_eq!(h.sent_rx.try_recv().unwrap().text, "Please, type number only");
    assert_eq!(h.sessions.load(1).await.unwrap().path, "/root/guess");
    assert_eq!(before_parent.load(Ordering::SeqCst), 1);
    assert_eq!(after_calls.load(Ordering::SeqCst), 0);

    // a valid input advances and follows goto back to root
    h.bot.handle_message(message(1, "42")).await.unwrap();
    assert_eq!(h.sent_rx.try_recv().unwrap().text, "saved");
    assert_eq!(h.sessions.load(1).await.unwrap().path, "/root");
}

#[tokio::test]
async fn test_after_runs_on_final_node() {
    let (api, after_calls) = counter(Api::new(), "afterRoot");
    let mut h = harness(
        api,
        json!({
            "name": "root",
            "reply": "hi",
            "after": "<% afterRoot %>",
            "commands": {
                "^/go": { "name": "go", "reply": "there" }
            }
        }),
    );

    // no match: the turn stays on root and root's after runs
    h.bot.handle_message(message(1, "hello")).await.unwrap();
    assert_eq!(after_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.sent_rx.try_recv().unwrap().text, "hi");
}

#[tokio::test]
async fn test_empty_text_produces_no_reply() {
    let mut h = harness(Api::new(), json!({ "name": "root", "reply": "hi" }));

    h.bot.handle_message(message(1, "")).await.unwrap();

    assert!(h.sent_rx.try_recv().is_err());
    assert_eq!(h.sessions.load(1).await.unwrap().path, "/root");
}

#[tokio::test]
async fn test_goto_absolute_renders_target_reply() {
    let (api, before_b) = counter(Api::new(), "beforeB");
    let mut h = harness(
        api,
        json!({
            "name": "root",
            "commands": {
                "^/a": { "name": "a", "goto": "/root/b" },
                "^/b": { "name": "b", "reply": "B here", "before": "<% beforeB %>", "goto": "." }
            }
        }),
    );

    h.bot.handle_message(message(1, "/a")).await.unwrap();

    // the transition re-ran before on the target and, with no reply yet,
    // rendered the target's reply
    assert_eq!(h.sent_rx.try_recv().unwrap().text, "B here");
    assert_eq!(h.sessions.load(1).await.unwrap().path, "/root/b");
    assert_eq!(before_b.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_goto_does_not_rerender_existing_reply() {
    let mut h = harness(
        Api::new(),
        json!({
            "name": "root",
            "commands": {
                "^/a": { "name": "a", "reply": "from a", "goto": "/root/b" },
                "^/b": { "name": "b", "reply": "B here", "goto": "." }
            }
        }),
    );

    h.bot.handle_message(message(1, "/a")).await.unwrap();

    assert_eq!(h.sent_rx.try_recv().unwrap().text, "from a");
    assert_eq!(h.sessions.load(1).await.unwrap().path, "/root/b");
}

#[tokio::test]
async fn test_goto_relative_parent() {
    let mut h = harness(
        Api::new(),
        json!({
            "name": "root",
            "commands": {
                "^/a": {
                    "name": "a",
                    "commands": {
                        ".": { "name": "deep", "goto": ".." }
                    }
                }
            }
        }),
    );

    let mut session = UserSession::at_root();
    session.path = "/root/a".to_string();
    h.sessions.save(1, &session, None).await.unwrap();

    h.bot.handle_message(message(1, "anything")).await.unwrap();
    assert_eq!(h.sessions.load(1).await.unwrap().path, "/root/a");
}

#[tokio::test]
async fn test_invalid_goto_falls_back_to_root() {
    let mut h = harness(
        Api::new(),
        json!({
            "name": "root",
            "commands": {
                "^/a": { "name": "a", "reply": "A", "goto": "/nowhere" }
            }
        }),
    );

    h.bot.handle_message(message(1, "/a")).await.unwrap();

    assert_eq!(h.sent_rx.try_recv().unwrap().text, "A");
    let session = h.sessions.load(1).await.unwrap();
    assert_eq!(session.path, "/root");
    assert!(session.data.is_empty());
}

#[tokio::test]
async fn test_presence_signal_emitted_before_reply() {
    let mut h = harness(
        Api::new(),
        json!({ "name": "root", "typing": true, "reply": "hi" }),
    );

    h.bot.handle_message(message(1, "hello")).await.unwrap();

    assert_eq!(h.presence_rx.try_recv().unwrap(), PresenceSignal::Typing);
    assert_eq!(h.sent_rx.try_recv().unwrap().text, "hi");
}

#[tokio::test]
async fn test_menu_rows_sent_with_reply_and_cleared_without() {
    let mut h = harness(
        Api::new(),
        json!({ "name": "root", "reply": "pick", "menu": "A || B\nC" }),
    );
    h.bot.handle_message(message(1, "hello")).await.unwrap();
    let sent = h.sent_rx.try_recv().unwrap();
    assert_eq!(
        sent.menu,
        Some(vec![
            vec!["A".to_string(), "B".to_string()],
            vec!["C".to_string()],
        ])
    );

    // no menu on the node: the send carries the explicit clear marker
    let mut h = harness(Api::new(), json!({ "name": "root", "reply": "bare" }));
    h.bot.handle_message(message(1, "hello")).await.unwrap();
    assert_eq!(h.sent_rx.try_recv().unwrap().menu, None);
}

#[tokio::test(start_paused = true)]
async fn test_ttl_override_expires_session_sooner() {
    let definition = json!({
        "name": "root",
        "commands": {
            "^/short": { "name": "short", "ttl": 5000, "goto": "." },
            "^/long": { "name": "long", "goto": "." }
        }
    });

    let mut h = harness(Api::new(), definition);

    h.bot.handle_message(message(1, "/short")).await.unwrap();
    h.bot.handle_message(message(2, "/long")).await.unwrap();
    assert_eq!(h.sessions.load(1).await.unwrap().path, "/root/short");

    tokio::time::advance(Duration::from_secs(6)).await;

    // the 5s override expired; the default 30min ttl did not
    assert_eq!(h.sessions.load(1).await.unwrap().path, "/");
    assert_eq!(h.sessions.load(2).await.unwrap().path, "/root/long");
}

#[tokio::test]
async fn test_failed_hook_leaves_session_unmodified_and_releases_lock() {
    let api = Api::new().register_fn("blowUp", |_ctx: &mut TurnContext, _args: &[Value]| {
        anyhow::bail!("hook exploded")
    });
    let mut h = harness(
        api,
        json!({
            "name": "root",
            "reply": "hi",
            "commands": {
                "^/boom": { "name": "boom", "before": "<% blowUp %>" }
            }
        }),
    );

    let outcome = h.bot.handle_message(message(1, "/boom")).await;
    assert!(outcome.is_err());
    assert!(h.store.is_empty().await, "failed turn must not persist");
    assert!(h.sent_rx.try_recv().is_err());

    // the lock was released: the next turn for the same user processes
    h.bot.handle_message(message(1, "hello")).await.unwrap();
    assert_eq!(h.sent_rx.try_recv().unwrap().text, "hi");
}

#[tokio::test]
async fn test_unresolvable_session_path_falls_back_to_root() {
    let mut h = harness(
        Api::new(),
        json!({ "name": "root", "reply": "hi" }),
    );

    // a stale path, e.g. from an older definition
    let mut session = UserSession::at_root();
    session.path = "/root/removed/node".to_string();
    session.data.insert("old".to_string(), json!(true));
    h.sessions.save(1, &session, None).await.unwrap();

    h.bot.handle_message(message(1, "hello")).await.unwrap();

    assert_eq!(h.sent_rx.try_recv().unwrap().text, "hi");
    let session = h.sessions.load(1).await.unwrap();
    assert_eq!(session.path, "/root");
    assert!(session.data.is_empty());
}
