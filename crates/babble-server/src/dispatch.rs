//! Command execution against the shared directory and client records.
//!
//! LOGIN and UNREGISTER are run by the connection task itself; every
//! other command reaches [`Dispatcher::execute`] through a worker.
//!
//! Failures never escape: each handler turns a miss or a refusal into
//! an error [`Answer`] so the worker moves on to the next job.

use std::sync::Arc;
use std::time::Duration;

use babble_core::{Answer, ClientKey, Command, CommandKind, Publication, Request};
use babble_protocol::format_answer;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::directory::{Directory, DirectoryError};
use crate::record::{lock_pair, ClientRecord, Ticket};
use crate::types::ConnectionHandle;

/// A parsed command plus the ticket that keeps it counted as pending.
#[derive(Debug)]
pub struct Job {
    pub command: Command,
    pub ticket: Ticket,
}

impl Job {
    /// Admit `command` for `record` and wrap it for the queue.
    pub fn admit(record: &Arc<ClientRecord>, command: Command) -> Self {
        Job {
            command,
            ticket: record.admit(),
        }
    }
}

#[derive(Debug)]
pub struct Dispatcher {
    directory: Arc<Directory>,
    timeline_capacity: usize,
    max_delay: Option<Duration>,
}

impl Dispatcher {
    pub fn new(directory: Arc<Directory>, config: &Config) -> Self {
        Dispatcher {
            directory,
            timeline_capacity: config.timeline_capacity,
            max_delay: config.max_delay(),
        }
    }

    pub fn directory(&self) -> &Arc<Directory> {
        &self.directory
    }

    /// Register `name` on `connection`.
    pub async fn login(
        &self,
        name: &str,
        connection: ConnectionHandle,
    ) -> Result<Arc<ClientRecord>, DirectoryError> {
        let key = ClientKey::from_name(name);
        let record = Arc::new(ClientRecord::new(
            key,
            name,
            connection,
            self.timeline_capacity,
        ));
        self.directory.insert(Arc::clone(&record)).await?;
        info!(%key, name, "client logged in");
        Ok(record)
    }

    /// Run an UNREGISTER: drain the issuer's in-flight commands, detach
    /// it from every follow relationship, then remove it from the directory.
    ///
    /// The caller must not hold a ticket for the issuer, or this never returns.
    pub async fn unregister(&self, command: &Command) -> Answer {
        let key = command.key;
        let Some(record) = self.directory.lookup(key).await else {
            warn!(%key, "unregister: no such client");
            return Answer::error(key, CommandKind::Unregister, "no such client").suppress();
        };

        record.wait_idle().await;

        // Once departed is set nobody can follow this record any more,
        // so the snapshot below is complete.
        let (followers, following) = {
            let mut rel = record.relations();
            rel.departed = true;
            (
                rel.followers.iter().copied().collect::<Vec<_>>(),
                rel.following.iter().copied().collect::<Vec<_>>(),
            )
        };

        for other_key in following {
            if let Some(other) = self.directory.lookup(other_key).await {
                let (mut mine, mut theirs) = lock_pair(&record, &other);
                theirs.followers.remove(&key);
                mine.following.remove(&other_key);
            }
        }
        for other_key in followers {
            if let Some(other) = self.directory.lookup(other_key).await {
                let (mut mine, mut theirs) = lock_pair(&record, &other);
                theirs.following.remove(&key);
                mine.followers.remove(&other_key);
            }
        }

        self.directory.remove(key).await;
        info!(%key, name = record.name(), "client unregistered");
        Answer::ok(key, CommandKind::Unregister, "").suppress()
    }

    /// Run one queued job, answer the client if it asked for it, then
    /// release the job's ticket.
    pub async fn execute(&self, job: Job) {
        let Job { command, ticket } = job;
        let record = Arc::clone(ticket.record());

        let answer = self.process(&command, &record, ticket.seq()).await;
        if !answer.is_ok() {
            warn!(key = %command.key, kind = %command.kind(), reason = %answer.detail, "command failed");
        }

        if command.answer_expected
            && !answer.suppressed
            && !record.connection().send_text(format_answer(&answer))
        {
            debug!(
                key = %command.key,
                conn = record.connection().id().0,
                kind = %command.kind(),
                "connection gone, answer dropped"
            );
        }

        drop(ticket);
    }

    async fn process(&self, command: &Command, record: &Arc<ClientRecord>, seq: u64) -> Answer {
        let key = record.key();
        match &command.request {
            Request::Publish { text } => self.publish(record, text).await,
            Request::Follow { name } => self.follow(record, name).await,
            Request::Timeline => self.timeline(record).await,
            Request::FollowCount => {
                Answer::ok(key, CommandKind::FollowCount, record.follower_count().to_string())
            }
            Request::Rdv => {
                record.wait_before(seq).await;
                Answer::ok(key, CommandKind::Rdv, "")
            }
            Request::Login { .. } => Answer::error(key, CommandKind::Login, "already logged in"),
            Request::Unregister => {
                Answer::error(key, CommandKind::Unregister, "unregister is not queued").suppress()
            }
        }
    }

    async fn publish(&self, record: &Arc<ClientRecord>, text: &str) -> Answer {
        self.inject_delay().await;

        let publication = Publication::new(record.name(), text);
        record.deliver(publication.clone());

        let mut delivered = 0usize;
        for follower_key in record.followers() {
            match self.directory.lookup(follower_key).await {
                Some(follower) => {
                    follower.deliver(publication.clone());
                    delivered += 1;
                }
                None => debug!(%follower_key, "follower left before fan-out"),
            }
        }

        Answer::ok(record.key(), CommandKind::Publish, delivered.to_string())
    }

    async fn follow(&self, record: &Arc<ClientRecord>, name: &str) -> Answer {
        self.inject_delay().await;

        let key = record.key();
        let target_key = ClientKey::from_name(name);
        if target_key == key {
            return Answer::error(key, CommandKind::Follow, "cannot follow yourself");
        }

        let Some(target) = self.directory.lookup(target_key).await else {
            return Answer::error(key, CommandKind::Follow, format!("unknown client {}", name));
        };

        {
            let (mut mine, mut theirs) = lock_pair(record, &target);
            if theirs.departed {
                return Answer::error(key, CommandKind::Follow, format!("unknown client {}", name));
            }
            theirs.followers.insert(key);
            mine.following.insert(target_key);
        }

        Answer::ok(key, CommandKind::Follow, name)
    }

    async fn timeline(&self, record: &Arc<ClientRecord>) -> Answer {
        self.inject_delay().await;

        let (total, items) = record.timeline_snapshot();
        let lines = items.iter().map(Publication::render_line).collect::<Vec<_>>();
        Answer::ok(
            record.key(),
            CommandKind::Timeline,
            format!("{} {}", total, lines.len()),
        )
        .with_lines(lines)
    }

    async fn inject_delay(&self) {
        if let Some(max) = self.max_delay {
            let micros = rand::thread_rng().gen_range(0..max.as_micros() as u64);
            tokio::time::sleep(Duration::from_micros(micros)).await;
        }
    }
}

/// The answer a connection sends back for its LOGIN attempt.
pub fn login_answer(key: ClientKey, result: &Result<Arc<ClientRecord>, DirectoryError>) -> Answer {
    match result {
        Ok(_) => Answer::ok(key, CommandKind::Login, key.to_string()),
        Err(e) => Answer::error(key, CommandKind::Login, e.to_string()),
    }
}
