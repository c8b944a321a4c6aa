// Maccel Engine
// Owns the tap, the published table and the deferred action worker

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use thiserror::Error;

use crate::output::{Dispatcher, KeySynthesizer, DEFAULT_QUEUE_CAPACITY};
use crate::shortpress::DEFAULT_SHORT_PRESS_THRESHOLD;
use crate::tap::{
    EngineNotice, EventTap, RemapListener, TapBackend, TapConfig, TapError, TapOptions, TapState,
};
use crate::{InputSourceSelector, RemappingPair, RemappingTable, SharedTable};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Tap(#[from] TapError),

    #[error("Failed to start worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Engine already running")]
    AlreadyRunning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub tap: TapConfig,
    /// Longest press still counted as a tap for input source switching
    pub short_press_threshold: Duration,
    /// Deferred actions that may wait for the worker
    pub queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tap: TapConfig::default(),
            short_press_threshold: DEFAULT_SHORT_PRESS_THRESHOLD,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// The remapping engine.
///
/// Tables can be published before or after [`EngineContext::start`];
/// the tap always reads the latest one.
pub struct EngineContext {
    config: EngineConfig,
    table: SharedTable,
    tap: Option<EventTap>,
    dispatcher: Option<Dispatcher>,
    notice_tx: Sender<EngineNotice>,
    notice_rx: Receiver<EngineNotice>,
}

impl EngineContext {
    pub fn new(config: EngineConfig) -> Self {
        let (notice_tx, notice_rx) = unbounded();
        Self {
            config,
            table: SharedTable::default(),
            tap: None,
            dispatcher: None,
            notice_tx,
            notice_rx,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build a table from `pairs` and publish it
    pub fn apply_remappings<I>(&self, pairs: I)
    where
        I: IntoIterator<Item = RemappingPair>,
    {
        self.publish(RemappingTable::build(pairs));
    }

    /// Replace the active table
    pub fn publish(&self, table: RemappingTable) {
        log::info!("Applying {} key remappings", table.len());
        for pair in table.pairs() {
            log::debug!("  {}", pair);
        }
        match &self.tap {
            Some(tap) => tap.publish(table),
            None => self.table.store(table),
        }
    }

    /// Currently published table
    pub fn table(&self) -> Arc<RemappingTable> {
        self.table.snapshot()
    }

    /// Install the tap and start the worker
    pub fn start<B>(
        &mut self,
        backend: &mut B,
        synthesizer: Box<dyn KeySynthesizer>,
        selector: Box<dyn InputSourceSelector>,
    ) -> Result<(), EngineError>
    where
        B: TapBackend + ?Sized,
    {
        if self.is_running() {
            return Err(EngineError::AlreadyRunning);
        }

        let dispatcher = Dispatcher::spawn(self.config.queue_capacity, synthesizer, selector)?;
        let listener = RemapListener::new(
            self.table.clone(),
            dispatcher.queue(),
            self.config.short_press_threshold,
        );
        let options = TapOptions {
            config: self.config.tap.clone(),
            table: self.table.clone(),
            actions: Some(dispatcher.queue()),
            notices: Some(self.notice_tx.clone()),
        };
        let tap = EventTap::create(backend, Box::new(listener), options)?;

        self.tap = Some(tap);
        self.dispatcher = Some(dispatcher);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.tap
            .as_ref()
            .is_some_and(|tap| tap.state() != TapState::Destroyed)
    }

    pub fn tap(&self) -> Option<&EventTap> {
        self.tap.as_ref()
    }

    pub fn state(&self) -> TapState {
        self.tap.as_ref().map_or(TapState::Inactive, EventTap::state)
    }

    pub fn is_active(&self) -> bool {
        self.state() == TapState::Active
    }

    /// Health notices; every receiver clone competes for the same notices
    pub fn notices(&self) -> Receiver<EngineNotice> {
        self.notice_rx.clone()
    }

    /// Destroy the tap, then drain and stop the worker. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(tap) = &self.tap {
            tap.destroy();
        }
        if let Some(mut dispatcher) = self.dispatcher.take() {
            dispatcher.shutdown();
        }
    }
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Drop for EngineContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}
