//! Cycle driver - one task per bot, one batch per snapshot
//!
//! ```text
//! Idle ──snapshot──▶ Computing (spawn_blocking: bot.process) ──▶ batch ──▶ Idle
//!                                         │                       │
//!                                  Err: warn, no batch     empty: not submitted
//! ```
//!
//! Each runner owns its bot outright and awaits each cycle before pulling
//! the next snapshot, so two cycles of one bot never overlap and bot state
//! needs no locking. Chain and signing work happens on the blocking pool,
//! which keeps a slow node from stalling the ledger-only bots.

use crate::bots::Bot;
use crate::clock::TimeSource;
use crate::ledger::{Command, CommandBatch, Ledger, LedgerSnapshot};
use crate::runtime::{Shutdown, ShutdownSignal};
use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, TimeDelta, Utc};
use futures::StreamExt;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

/// Stamps command batches for one bot instance.
pub struct CommandFactory {
    application_id: String,
    party: String,
    workflow_id: String,
    max_record_time: TimeDelta,
    clock: Arc<dyn TimeSource>,
}

impl CommandFactory {
    pub fn new(
        application_id: impl Into<String>,
        party: impl Into<String>,
        bot_name: &str,
        max_record_time: TimeDelta,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        let party = party.into();
        let workflow_id = format!("WORKFLOW-{}-{}-{}", party, bot_name, Uuid::new_v4());
        Self { application_id: application_id.into(), party, workflow_id, max_record_time, clock }
    }

    /// Fixed for the life of the bot instance.
    pub fn workflow_id(&self) -> &str { &self.workflow_id }

    pub fn batch(&self, commands: Vec<Command>) -> CommandBatch {
        let now = self.clock.now();
        let max_record_time = now.checked_add_signed(self.max_record_time).unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut batch = CommandBatch {
            application_id: self.application_id.clone(),
            command_id: Uuid::new_v4().to_string(),
            party: self.party.clone(),
            workflow_id: self.workflow_id.clone(),
            ledger_effective_time: now,
            max_record_time,
            pending: Vec::new(),
            commands: Vec::with_capacity(commands.len()),
        };
        for command in commands {
            if !batch.push(command) {
                debug!(workflow = %self.workflow_id, "Dropped duplicate command");
            }
        }
        batch
    }
}

pub struct BotRunner {
    bot: Box<dyn Bot>,
    ledger: Arc<dyn Ledger>,
    factory: CommandFactory,
}

impl BotRunner {
    pub fn new(bot: Box<dyn Bot>, ledger: Arc<dyn Ledger>, factory: CommandFactory) -> Self {
        Self { bot, ledger, factory }
    }

    pub fn workflow_id(&self) -> &str { self.factory.workflow_id() }

    /// Run until shutdown. Returns `Err` if the ledger is lost.
    pub async fn run(self, mut shutdown: ShutdownSignal) -> anyhow::Result<()> {
        let Self { mut bot, ledger, factory } = self;
        let name = bot.name();
        let mut snapshots = ledger.subscribe(bot.filter()).await.with_context(|| format!("{name}: subscribe"))?;
        info!(bot = name, party = bot.party(), workflow = %factory.workflow_id(), "Bot started");

        loop {
            let snapshot = tokio::select! {
                _ = shutdown.recv() => {
                    info!(bot = name, "Bot stopped");
                    return Ok(());
                }
                next = snapshots.next() => match next {
                    Some(Ok(snapshot)) => snapshot,
                    Some(Err(e)) => return Err(e).with_context(|| format!("{name}: snapshot stream")),
                    None => bail!("{name}: snapshot stream ended"),
                },
            };

            let (returned, commands) = run_cycle(bot, snapshot).await?;
            bot = returned;
            let Some(commands) = commands else { continue };

            let batch = factory.batch(commands);
            if batch.is_empty() {
                continue;
            }
            let (command_id, size) = (batch.command_id.clone(), batch.len());
            ledger.submit(batch).await.with_context(|| format!("{name}: submit {command_id}"))?;
            info!(bot = name, command_id = %command_id, commands = size, "Submitted batch");
        }
    }
}

/// One cycle on the blocking pool. `None` when the cycle failed.
async fn run_cycle(mut bot: Box<dyn Bot>, snapshot: LedgerSnapshot) -> anyhow::Result<(Box<dyn Bot>, Option<Vec<Command>>)> {
    let name = bot.name();
    tokio::task::spawn_blocking(move || {
        let span = info_span!("cycle", bot = name, offset = snapshot.offset);
        let _enter = span.enter();
        let commands = match bot.process(&snapshot) {
            Ok(commands) => Some(commands),
            Err(e) => {
                warn!(error = %e, "Cycle failed, nothing emitted");
                None
            }
        };
        (bot, commands)
    })
    .await
    .map_err(|e| anyhow!("{name}: cycle panicked: {e}"))
}

/// Spawn one runner per bot and wait. The first runner to fail triggers
/// shutdown for the rest and its error is returned.
pub async fn run_bots(
    bots: Vec<Box<dyn Bot>>,
    ledger: Arc<dyn Ledger>,
    clock: Arc<dyn TimeSource>,
    application_id: &str,
    max_record_time: std::time::Duration,
    shutdown: Shutdown,
) -> anyhow::Result<()> {
    let window = TimeDelta::from_std(max_record_time).context("max record time out of range")?;
    let mut tasks = JoinSet::new();
    for bot in bots {
        let factory = CommandFactory::new(application_id, bot.party(), bot.name(), window, clock.clone());
        let runner = BotRunner::new(bot, ledger.clone(), factory);
        tasks.spawn(runner.run(shutdown.subscribe()));
    }

    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined.map_err(anyhow::Error::from).and_then(|result| result);
        if let Err(e) = outcome {
            error!(error = %format!("{e:#}"), "Bot terminated");
            shutdown.trigger();
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}
