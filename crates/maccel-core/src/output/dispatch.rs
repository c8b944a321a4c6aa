// Maccel Output Layer - Deferred Action Dispatch
// Runs side effects requested by the listener on a worker thread

use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use super::synth::{KeySynthesizer, SyntheticKey};
use crate::{InputSourceSelector, KeyCode};

/// Default number of actions that may wait for the worker
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// A side effect the listener must not perform inline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredAction {
    /// Post a synthetic key transition
    Post(SyntheticKey),
    /// Post a full press and release
    Send(KeyCode),
    /// Switch the active keyboard layout
    SelectInputSource(usize),
}

enum Message {
    Run(DeferredAction),
    Stop,
}

/// Producer side handed to the listener. Pushing never blocks.
#[derive(Clone)]
pub struct ActionQueue {
    tx: Sender<Message>,
}

impl ActionQueue {
    /// Queue an action; returns false if it had to be dropped
    pub fn push(&self, action: DeferredAction) -> bool {
        match self.tx.try_send(Message::Run(action)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::warn!("Action queue full, dropping {:?}", action);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// A queue with no worker behind it; every push is dropped
    pub fn detached() -> Self {
        let (tx, _) = bounded(1);
        Self { tx }
    }
}

/// Worker thread executing deferred actions in FIFO order
pub struct Dispatcher {
    tx: Sender<Message>,
    handle: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Start the worker
    pub fn spawn(
        capacity: usize,
        synthesizer: Box<dyn KeySynthesizer>,
        selector: Box<dyn InputSourceSelector>,
    ) -> std::io::Result<Self> {
        let (tx, rx) = bounded(capacity.max(1));
        let handle = std::thread::Builder::new()
            .name("maccel-dispatch".to_string())
            .spawn(move || run_worker(rx, synthesizer, selector))?;
        Ok(Self {
            tx,
            handle: Some(handle),
        })
    }

    /// Producer handle for the listener
    pub fn queue(&self) -> ActionQueue {
        ActionQueue {
            tx: self.tx.clone(),
        }
    }

    /// Run everything already queued, then stop the worker. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.tx.send(Message::Stop);
            if handle.join().is_err() {
                log::error!("Dispatcher thread panicked");
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(
    rx: Receiver<Message>,
    synthesizer: Box<dyn KeySynthesizer>,
    selector: Box<dyn InputSourceSelector>,
) {
    for message in rx.iter() {
        match message {
            Message::Stop => break,
            Message::Run(DeferredAction::Post(key)) => {
                if let Err(e) = synthesizer.post(key) {
                    log::debug!("Synthetic {} not posted: {}", key, e);
                }
            }
            Message::Run(DeferredAction::Send(key)) => synthesizer.send(key),
            Message::Run(DeferredAction::SelectInputSource(index)) => {
                if selector.select(index) {
                    log::info!("Switched to input source {}", index);
                }
            }
        }
    }
    log::debug!("Dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{RecordingSynthesizer, StaticInputSources};

    #[test]
    fn test_actions_run_in_order() {
        let synth = RecordingSynthesizer::new();
        let sources = StaticInputSources::new(3);
        let mut dispatcher =
            Dispatcher::spawn(8, Box::new(synth.clone()), Box::new(sources.clone())).unwrap();
        let queue = dispatcher.queue();

        assert!(queue.push(DeferredAction::Post(SyntheticKey::down(KeyCode::F19))));
        assert!(queue.push(DeferredAction::SelectInputSource(2)));
        assert!(queue.push(DeferredAction::Post(SyntheticKey::up(KeyCode::F19))));
        dispatcher.shutdown();

        assert_eq!(
            synth.posted(),
            vec![SyntheticKey::down(KeyCode::F19), SyntheticKey::up(KeyCode::F19)]
        );
        assert_eq!(sources.current(), Some(2));
    }

    #[test]
    fn test_send_posts_full_tap() {
        let synth = RecordingSynthesizer::new();
        let mut dispatcher =
            Dispatcher::spawn(4, Box::new(synth.clone()), Box::new(StaticInputSources::new(1)))
                .unwrap();
        assert!(dispatcher.queue().push(DeferredAction::Send(KeyCode::ESCAPE)));
        dispatcher.shutdown();

        assert_eq!(
            synth.posted(),
            vec![SyntheticKey::down(KeyCode::ESCAPE), SyntheticKey::up(KeyCode::ESCAPE)]
        );
    }

    #[test]
    fn test_push_after_shutdown_is_dropped() {
        let mut dispatcher = Dispatcher::spawn(
            4,
            Box::new(RecordingSynthesizer::new()),
            Box::new(StaticInputSources::new(1)),
        )
        .unwrap();
        let queue = dispatcher.queue();
        dispatcher.shutdown();
        dispatcher.shutdown();
        assert!(!queue.push(DeferredAction::SelectInputSource(0)));
    }

    #[test]
    fn test_detached_queue_drops() {
        assert!(!ActionQueue::detached().push(DeferredAction::SelectInputSource(0)));
    }
}
