//! The single owner of the brightness shown to the user.
//!
//! The controller runs in its own task and is the only thing talking to the
//! [BacklightTool]. Local changes (slider drags) are written out in the
//! background and update the surfaced level silently. Read-backs from the
//! device are only applied once a debounce window after the most recent local
//! change has passed, so a poll can't snap the slider back mid-drag. Applied
//! read-backs are announced on a [watch] channel.

use crate::{
    armaf::{ActorPort, ActorReceiver},
    config::{Config, PollStrategy, SetUnit},
    external::backlight::{BacklightTool, SetValue, ToolError},
    level::BrightnessLevel,
};
use anyhow::{bail, Result};
use std::time::Duration;
use tokio::{select, sync::watch, task::JoinHandle, time::Instant};

/// Used as the device maximum when the tool can't tell us the real one.
pub const FALLBACK_MAX_LEVEL: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    GetMaxLevel,
    GetCurrentLevel,
    SetLevel(BrightnessLevel),
    Poll,
    GetState,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    MaxLevel(MaxLevel),
    Level(BrightnessLevel),
    Sent(SetValue),
    Poll(PollOutcome),
    State(SyncState),
}

/// The device maximum in raw units. If the tool couldn't be queried, `value`
/// is [FALLBACK_MAX_LEVEL] and `fallback_reason` says why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaxLevel {
    pub value: u64,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PollOutcome {
    /// A new level was read and announced.
    Applied(BrightnessLevel),
    /// The device reads the level already shown, or couldn't be read.
    Unchanged,
    /// A local change is too recent, the read-back was rescheduled to run
    /// after the given time.
    Deferred(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Debouncing { remaining: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerOptions {
    pub debounce: Duration,
    pub set_unit: SetUnit,
    /// Arm a read-back for the end of the debounce window after every local
    /// change, without waiting for a poll.
    pub resync_after_set: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        ControllerOptions {
            debounce: Duration::from_millis(1000),
            set_unit: SetUnit::Raw,
            resync_after_set: false,
        }
    }
}

impl From<&Config> for ControllerOptions {
    fn from(config: &Config) -> Self {
        ControllerOptions {
            debounce: config.sync.debounce(),
            set_unit: config.tool.set_unit,
            resync_after_set: config.sync.poll == PollStrategy::AfterSet,
        }
    }
}

pub struct BrightnessController<T: BacklightTool> {
    tool: T,
    options: ControllerOptions,
    max_level: u64,
    /// The last level successfully read from the device.
    last_read: BrightnessLevel,
    /// The level shown to the user.
    level: watch::Sender<BrightnessLevel>,
    last_change: Option<Instant>,
    pending_sync: Option<Instant>,
    writes: Option<watch::Sender<Option<SetValue>>>,
    writer: Option<JoinHandle<()>>,
}

impl<T: BacklightTool> BrightnessController<T> {
    pub fn new(tool: T, options: ControllerOptions) -> BrightnessController<T> {
        let (level, _) = watch::channel(BrightnessLevel::OFF);
        BrightnessController {
            tool,
            options,
            max_level: FALLBACK_MAX_LEVEL,
            last_read: BrightnessLevel::OFF,
            level,
            last_change: None,
            pending_sync: None,
            writes: None,
            writer: None,
        }
    }

    /// Reads the initial state of the device and starts the controller task.
    ///
    /// The controller runs until every clone of the returned port is dropped.
    pub async fn spawn(mut self) -> ControllerPort {
        self.initialize().await;
        let (port, mut receiver) = ActorPort::make();
        let updates = self.level.subscribe();

        let (write_sender, write_receiver) = watch::channel(None);
        self.writes = Some(write_sender);
        self.writer = Some(tokio::spawn(write_loop(self.tool.clone(), write_receiver)));

        tokio::spawn(async move {
            self.main_loop(&mut receiver).await;
            self.tear_down().await;
            // Must go last, dropping it completes ControllerPort::await_shutdown
            drop(receiver);
        });

        ControllerPort { port, updates }
    }

    async fn initialize(&mut self) {
        let max = self.refresh_max_level().await;
        let level = self.read_current_level().await;
        self.level.send_replace(level);
        log::info!(
            "Brightness controller started at {} (maximum {}{})",
            level,
            max.value,
            if max.fallback_reason.is_some() { ", assumed" } else { "" }
        );
    }

    async fn main_loop(&mut self, receiver: &mut ActorReceiver<Command, Reply, ()>) {
        // One timer, re-armed in place, so there is never more than one
        // read-back pending.
        let sleep = tokio::time::sleep(Duration::ZERO);
        tokio::pin!(sleep);
        loop {
            if let Some(deadline) = self.pending_sync {
                sleep.as_mut().reset(deadline);
            }
            select! {
                biased;
                _ = sleep.as_mut(), if self.pending_sync.is_some() => {
                    self.pending_sync = None;
                    let outcome = self.sync().await;
                    log::debug!("Deferred sync finished: {:?}", outcome);
                }
                request = receiver.recv() => {
                    let req = match request {
                        Some(req) => req,
                        None => return,
                    };
                    let reply = self.handle_command(req.payload).await;
                    if req.respond(Ok(reply)).is_err() {
                        log::warn!("Requester went away before receiving brightness controller's reply");
                    }
                }
            }
        }
    }

    async fn tear_down(mut self) {
        log::debug!("Brightness controller stopping");
        if self.pending_sync.take().is_some() {
            log::debug!("Dropping pending sync");
        }
        // Closing the channel lets the writer finish the last queued write and exit
        drop(self.writes.take());
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.await {
                log::error!("Brightness writer failed: {}", e);
            }
        }
        log::debug!("Brightness controller stopped");
    }

    async fn handle_command(&mut self, command: Command) -> Reply {
        match command {
            Command::GetMaxLevel => Reply::MaxLevel(self.refresh_max_level().await),
            Command::GetCurrentLevel => Reply::Level(self.read_current_level().await),
            Command::SetLevel(level) => Reply::Sent(self.set_level(level)),
            Command::Poll => Reply::Poll(self.poll().await),
            Command::GetState => Reply::State(self.state()),
        }
    }

    async fn refresh_max_level(&mut self) -> MaxLevel {
        let reason = match self.tool.max_level().await {
            Ok(0) => "tool reported a maximum of 0".to_owned(),
            Ok(max) => {
                self.max_level = max;
                return MaxLevel {
                    value: max,
                    fallback_reason: None,
                };
            }
            Err(e) => e.to_string(),
        };
        log::warn!(
            "Couldn't get maximum brightness, assuming {}: {}",
            FALLBACK_MAX_LEVEL,
            reason
        );
        self.max_level = FALLBACK_MAX_LEVEL;
        MaxLevel {
            value: FALLBACK_MAX_LEVEL,
            fallback_reason: Some(reason),
        }
    }

    async fn query_level(&mut self) -> Result<BrightnessLevel, ToolError> {
        let raw = self.tool.current_level().await?;
        let level = BrightnessLevel::from_raw(raw, self.max_level);
        self.last_read = level;
        Ok(level)
    }

    async fn read_current_level(&mut self) -> BrightnessLevel {
        match self.query_level().await {
            Ok(level) => level,
            Err(e) => {
                log::warn!(
                    "Couldn't read current brightness, keeping {}: {}",
                    self.last_read,
                    e
                );
                self.last_read
            }
        }
    }

    fn set_level(&mut self, level: BrightnessLevel) -> SetValue {
        let value = match self.options.set_unit {
            SetUnit::Raw => SetValue::Raw(level.to_raw(self.max_level)),
            SetUnit::Percent => SetValue::Percent(level.to_percent()),
        };
        let now = Instant::now();
        self.last_change = Some(now);
        // Local changes aren't announced, the UI already shows them
        self.level.send_if_modified(|shown| {
            *shown = level;
            false
        });
        if self.pending_sync.is_some() || self.options.resync_after_set {
            self.pending_sync = Some(now + self.options.debounce);
        }
        log::debug!("Setting brightness to {} ({})", level, value);
        if let Some(writes) = &self.writes {
            writes.send_replace(Some(value));
        }
        value
    }

    async fn poll(&mut self) -> PollOutcome {
        let remaining = self.debounce_remaining();
        if !remaining.is_zero() {
            self.pending_sync = Some(Instant::now() + remaining);
            log::debug!("Local change too recent, deferring sync by {:?}", remaining);
            return PollOutcome::Deferred(remaining);
        }
        self.pending_sync = None;
        self.sync().await
    }

    /// Reads the device and shows the result if it differs from what is shown.
    async fn sync(&mut self) -> PollOutcome {
        let level = match self.query_level().await {
            Ok(level) => level,
            Err(e) => {
                log::warn!("Couldn't read brightness for sync: {}", e);
                return PollOutcome::Unchanged;
            }
        };
        let changed = self.level.send_if_modified(|shown| {
            if *shown == level {
                false
            } else {
                *shown = level;
                true
            }
        });
        if changed {
            log::debug!("Brightness changed externally to {}", level);
            PollOutcome::Applied(level)
        } else {
            PollOutcome::Unchanged
        }
    }

    fn debounce_remaining(&self) -> Duration {
        match self.last_change {
            Some(changed_at) => {
                (changed_at + self.options.debounce).saturating_duration_since(Instant::now())
            }
            None => Duration::ZERO,
        }
    }

    fn state(&self) -> SyncState {
        let remaining = self.debounce_remaining();
        if remaining.is_zero() {
            SyncState::Idle
        } else {
            SyncState::Debouncing { remaining }
        }
    }
}

/// Writes requested levels one at a time. Values requested while a write is
/// in flight collapse into the latest one.
async fn write_loop<T: BacklightTool>(tool: T, mut requests: watch::Receiver<Option<SetValue>>) {
    while requests.changed().await.is_ok() {
        let requested = *requests.borrow_and_update();
        if let Some(value) = requested {
            if let Err(e) = tool.set_level(value).await {
                log::error!("Couldn't set brightness to {}: {}", value, e);
            }
        }
    }
    log::debug!("Brightness writer stopped");
}

/// A handle to a running [BrightnessController].
///
/// This is what a UI holds: [level](Self::level) to read the value to show,
/// [set_level](Self::set_level) for slider changes and
/// [subscribe](Self::subscribe) to learn about changes made outside the UI.
#[derive(Debug, Clone)]
pub struct ControllerPort {
    port: ActorPort<Command, Reply, ()>,
    updates: watch::Receiver<BrightnessLevel>,
}

impl ControllerPort {
    /// The level currently shown.
    pub fn level(&self) -> BrightnessLevel {
        *self.updates.borrow()
    }

    /// A receiver which is notified whenever a read-back changes the level.
    /// Local changes made through [set_level](Self::set_level) are not
    /// announced.
    pub fn subscribe(&self) -> watch::Receiver<BrightnessLevel> {
        let mut receiver = self.updates.clone();
        receiver.borrow_and_update();
        receiver
    }

    pub async fn max_level(&self) -> Result<MaxLevel> {
        match self.request(Command::GetMaxLevel).await? {
            Reply::MaxLevel(max) => Ok(max),
            other => bail!("Unexpected reply to max level query: {:?}", other),
        }
    }

    pub async fn current_level(&self) -> Result<BrightnessLevel> {
        match self.request(Command::GetCurrentLevel).await? {
            Reply::Level(level) => Ok(level),
            other => bail!("Unexpected reply to level query: {:?}", other),
        }
    }

    /// Requests a new level and returns the value handed to the tool. Doesn't
    /// wait for the tool to finish.
    pub async fn set_level(&self, level: BrightnessLevel) -> Result<SetValue> {
        match self.request(Command::SetLevel(level)).await? {
            Reply::Sent(value) => Ok(value),
            other => bail!("Unexpected reply to set request: {:?}", other),
        }
    }

    pub async fn poll(&self) -> Result<PollOutcome> {
        match self.request(Command::Poll).await? {
            Reply::Poll(outcome) => Ok(outcome),
            other => bail!("Unexpected reply to poll: {:?}", other),
        }
    }

    pub async fn state(&self) -> Result<SyncState> {
        match self.request(Command::GetState).await? {
            Reply::State(state) => Ok(state),
            other => bail!("Unexpected reply to state query: {:?}", other),
        }
    }

    /// Gives up this port and waits for the controller to stop, which happens
    /// once all other clones are gone too. Any queued write is finished first.
    pub async fn await_shutdown(self) {
        self.port.await_shutdown().await
    }

    async fn request(&self, command: Command) -> Result<Reply> {
        Ok(self.port.request(command).await?)
    }
}
