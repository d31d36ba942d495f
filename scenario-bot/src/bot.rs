//! Message orchestrator: one turn per inbound message, bounded concurrency
//! across users, at most one in-flight turn per user.
//!
//! The poller drains a buffer of fetched updates and long-polls the
//! transport when it runs dry. Updates from a user with a turn in flight
//! are dropped, not queued; the per-user ordering guarantee comes from that
//! lock alone.

use anyhow::Result;
use async_trait::async_trait;
use job_queue::{JobPoller, JobQueue, JobWorker, QueueError};
use sbot_core::{IncomingMessage, Transport, Update};
use scenario::{path, Scenario, TurnContext};
use serde_json::Value;
use session_store::SessionStore;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// getUpdates page size.
const POLL_LIMIT: u8 = 100;
/// Long-poll timeout handed to the transport.
const POLL_TIMEOUT_SECS: u32 = 60;

/// The bot engine: transport + scenario tree + session store behind a
/// bounded-concurrency dispatcher.
pub struct ScenarioBot {
    core: Arc<BotCore>,
    max_concurrent_turns: usize,
    max_poll_delay: Duration,
}

impl ScenarioBot {
    pub fn new(
        transport: Arc<dyn Transport>,
        scenario: Arc<Scenario>,
        sessions: SessionStore,
    ) -> Self {
        Self {
            core: Arc::new(BotCore {
                transport,
                scenario,
                sessions,
                buffered: tokio::sync::Mutex::new(VecDeque::new()),
                offset: AtomicI64::new(0),
                locked_users: Mutex::new(HashSet::new()),
            }),
            max_concurrent_turns: 2,
            max_poll_delay: Duration::from_millis(60_000),
        }
    }

    /// Bound on concurrently processed turns.
    pub fn max_concurrent_turns(mut self, max: usize) -> Self {
        self.max_concurrent_turns = max;
        self
    }

    /// Cap on the poll backoff after transport failures.
    pub fn max_poll_delay(mut self, delay: Duration) -> Self {
        self.max_poll_delay = delay;
        self
    }

    /// Starts polling and dispatching. Returns the scheduler's handle; the
    /// loop runs until the process exits.
    pub fn start(&self) -> Result<JoinHandle<()>, QueueError> {
        JobQueue::new()
            .max_concurrent_jobs(self.max_concurrent_turns)
            .max_poll_delay(self.max_poll_delay)
            .set_poller(self.core.clone())
            .set_worker(self.core.clone())
            .start()
    }

    /// Runs one message through the full worker path (lock, pipeline,
    /// unlock) without going through the poller. Test entry point.
    pub async fn handle_message(&self, message: IncomingMessage) -> Result<()> {
        self.core.run(message).await
    }
}

struct BotCore {
    transport: Arc<dyn Transport>,
    scenario: Arc<Scenario>,
    sessions: SessionStore,
    /// Updates fetched but not yet dispatched.
    buffered: tokio::sync::Mutex<VecDeque<Update>>,
    /// Highest update id seen; the next poll starts one past it.
    offset: AtomicI64,
    /// Users with a turn in flight.
    locked_users: Mutex<HashSet<i64>>,
}

impl BotCore {
    fn lock_user(&self, user_id: i64) {
        self.locked_users
            .lock()
            .expect("user lock set poisoned")
            .insert(user_id);
    }

    fn unlock_user(&self, user_id: i64) {
        self.locked_users
            .lock()
            .expect("user lock set poisoned")
            .remove(&user_id);
    }

    fn is_locked(&self, user_id: i64) -> bool {
        self.locked_users
            .lock()
            .expect("user lock set poisoned")
            .contains(&user_id)
    }

    /// One turn: resolve the user's node, route by the inbound text, run the
    /// hook pipeline, send the reply with its menu, persist the session.
    async fn turn(&self, message: IncomingMessage) -> Result<()> {
        let user_id = message.from.id;
        let chat_id = message.chat.id;

        let mut session = self.sessions.load(user_id).await?;

        let mut node = match self.scenario.resolve(&session.path) {
            Ok(node) => node,
            Err(e) => {
                warn!(
                    user_id,
                    path = %session.path,
                    error = %e,
                    "session path no longer resolves, falling back to root"
                );
                self.scenario.root()
            }
        };
        if self.scenario.is_root(&node) {
            // re-entering root always starts from a clean slate
            session.data.clear();
        }

        let mut ctx = TurnContext::new(
            message.text.clone(),
            message.from.clone(),
            message.chat.clone(),
        );
        ctx.session = std::mem::take(&mut session.data);

        if let Some(next) = node.match_next(&message.text) {
            debug!(user_id, from = %node.path(), to = %next.path(), "command matched");
            node = next;
        }

        node.call_before(&mut ctx, &[]).await?;

        if let Some(signal) = node.presence_signal(&mut ctx, &[]).await? {
            self.transport.send_presence(chat_id, signal).await?;
        }

        let action_result = node.call_action(&mut ctx, &[]).await?;
        let mut reply: Option<String> = None;
        let mut run_after = true;

        match action_result {
            Value::String(refusal) if !refusal.is_empty() => {
                // the node refused to advance: its message is the reply and
                // the turn retries at the parent; no goto, no after
                reply = Some(refusal);
                run_after = false;
                let parent_path = path::parent(node.path());
                debug!(user_id, from = %node.path(), to = %parent_path, "action refused, rolling back");
                node = self.scenario.resolve(&parent_path)?;
                node.call_before(&mut ctx, &[]).await?;
            }
            _ => {
                if !message.text.is_empty() {
                    reply = node.reply(&mut ctx, &[]).await?;
                }

                let goto = node.goto_path(&mut ctx, &[]).await?;
                let target = path::join(node.path(), &goto);
                if target != node.path() {
                    match self.scenario.resolve(&target) {
                        Ok(dest) => {
                            if dest.path() != node.path() {
                                debug!(user_id, from = %node.path(), to = %dest.path(), "goto");
                                node = dest;
                                node.call_before(&mut ctx, &[]).await?;
                                if reply.is_none() && !message.text.is_empty() {
                                    reply = node.reply(&mut ctx, &[]).await?;
                                }
                            }
                        }
                        Err(e) => {
                            warn!(
                                user_id,
                                target = %target,
                                error = %e,
                                "goto target does not resolve, falling back to root"
                            );
                            node = self.scenario.root();
                            node.call_before(&mut ctx, &[]).await?;
                            if reply.is_none() && !message.text.is_empty() {
                                reply = node.reply(&mut ctx, &[]).await?;
                            }
                        }
                    }
                }
            }
        }

        let menu = node.menu(&mut ctx, &[]).await?;

        if let Some(text) = reply.as_deref().filter(|t| !t.is_empty()) {
            self.transport
                .send_message(chat_id, text, menu.as_ref())
                .await?;
        }

        if run_after {
            node.call_after(&mut ctx, &[]).await?;
        }

        let ttl_ms = node.ttl(&mut ctx, &[]).await?;
        session.path = node.path().to_string();
        session.data = if self.scenario.is_root(&node) {
            serde_json::Map::new()
        } else {
            ctx.session
        };
        let ttl_override = (ttl_ms > 0).then(|| Duration::from_millis(ttl_ms));
        self.sessions.save(user_id, &session, ttl_override).await?;

        info!(user_id, path = %session.path, "turn complete");
        Ok(())
    }
}

#[async_trait]
impl JobPoller<IncomingMessage> for BotCore {
    /// Yields the next dispatchable message: drains the buffer, long-polls
    /// the transport when it runs dry, advances the offset cursor, and
    /// drops updates from locked users.
    async fn poll(&self) -> Result<IncomingMessage> {
        loop {
            let next = self.buffered.lock().await.pop_front();
            let update = match next {
                Some(update) => update,
                None => {
                    let offset = self.offset.load(Ordering::Acquire) + 1;
                    debug!(offset, "fetching updates");
                    let updates = self
                        .transport
                        .fetch_updates(offset, POLL_LIMIT, POLL_TIMEOUT_SECS)
                        .await?;
                    self.buffered.lock().await.extend(updates);
                    continue;
                }
            };

            self.offset.fetch_max(update.update_id, Ordering::AcqRel);

            let Some(message) = update.message else {
                continue;
            };
            if self.is_locked(message.from.id) {
                debug!(
                    user_id = message.from.id,
                    "user turn in flight, dropping update"
                );
                continue;
            }
            // lock here, not in the spawned worker: the next poll cycle can
            // run before the worker task is scheduled
            self.lock_user(message.from.id);
            return Ok(message);
        }
    }
}

#[async_trait]
impl JobWorker<IncomingMessage> for BotCore {
    /// One worker invocation: run the pipeline, release the user lock
    /// whatever happened. The lock is usually taken by the poller already;
    /// taking it again covers direct invocations.
    async fn run(&self, message: IncomingMessage) -> Result<()> {
        let user_id = message.from.id;
        self.lock_user(user_id);
        let outcome = self.turn(message).await;
        self.unlock_user(user_id);
        if let Err(e) = &outcome {
            error!(user_id, error = %e, "turn failed");
        }
        outcome
    }
}
