//! Channel-buffered writer proxy and its collector thread.
use crate::{SharedReplayBuffer, SyncError};
use anyhow::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{info, warn};
use recall_core::{
    replay_buffer::{TransitionBatch, TransitionRef},
    Element, ExperienceWriter,
};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
    sync::{Arc, Mutex},
    thread::JoinHandle,
    time::Duration,
};

/// Configuration of [`StoreProxy`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct StoreProxyConfig {
    /// Number of transitions buffered in the proxy before they are
    /// shipped to the collector in one message.
    pub n_flush: usize,
}

impl Default for StoreProxyConfig {
    fn default() -> Self {
        Self { n_flush: 64 }
    }
}

impl StoreProxyConfig {
    /// Sets the flush threshold.
    pub fn n_flush(mut self, n_flush: usize) -> Self {
        self.n_flush = n_flush;
        self
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Per-writer-thread front of the shared buffer.
///
/// Each writer owns a proxy and pushes transitions into it without
/// taking any lock; accumulated transitions are shipped to the
/// [`Collector`] over a channel once `n_flush` of them are buffered.
/// This keeps the shared lock out of the writers' hot loop while the
/// collector alone serializes the actual slot claims.
pub struct StoreProxy<T> {
    id: usize,
    sender: Sender<TransitionBatch<T>>,
    n_flush: usize,
    obs_dim: usize,
    act_dim: usize,
    buffer: TransitionBatch<T>,
}

impl<T: Element> StoreProxy<T> {
    /// Creates a proxy shipping into `sender`.
    ///
    /// `id` identifies the writer in logs; the dimensionalities size
    /// the accumulation buffer.
    pub fn new(
        id: usize,
        config: &StoreProxyConfig,
        obs_dim: usize,
        act_dim: usize,
        sender: Sender<TransitionBatch<T>>,
    ) -> Self {
        Self {
            id,
            sender,
            n_flush: config.n_flush,
            obs_dim,
            act_dim,
            buffer: TransitionBatch::with_capacity(config.n_flush, obs_dim, act_dim),
        }
    }

    /// The writer id this proxy belongs to.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Number of transitions waiting in the proxy.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Buffers a batch of transitions, flushing to the collector when
    /// the threshold is reached.
    pub fn push(&mut self, batch: &TransitionRef<'_, T>) -> Result<()> {
        self.buffer.append(batch);
        if self.buffer.len() >= self.n_flush {
            self.flush()?;
        }
        Ok(())
    }

    /// Ships the buffered transitions, if any, to the collector.
    ///
    /// Must be called once before dropping the proxy so a partial
    /// buffer is not lost.
    pub fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let full = std::mem::replace(
            &mut self.buffer,
            TransitionBatch::with_capacity(self.n_flush, self.obs_dim, self.act_dim),
        );
        match self.sender.try_send(full) {
            Ok(()) => Ok(()),
            Err(_) => Err(SyncError::SendFailed.into()),
        }
    }
}

/// The thread that drains writer proxies into the shared buffer.
///
/// Owns the pushing side of the shared lock: every slot claim goes
/// through this thread, so concurrent writers can never advance the
/// same write index. The thread exits when every proxy sender has been
/// dropped and the channel is drained, or when [`Collector::stop`] is
/// called.
pub struct Collector {
    handle: JoinHandle<()>,
    stop: Arc<Mutex<bool>>,
}

impl Collector {
    /// Spawns the collector thread.
    pub fn spawn<B>(
        buffer: SharedReplayBuffer<B>,
        receiver: Receiver<TransitionBatch<B::Elem>>,
    ) -> Self
    where
        B: ExperienceWriter + Send + 'static,
    {
        let stop = Arc::new(Mutex::new(false));
        let handle = {
            let stop = stop.clone();
            std::thread::spawn(move || Self::run(buffer, receiver, stop))
        };
        info!("Started collector thread");
        Self { handle, stop }
    }

    fn run<B>(
        buffer: SharedReplayBuffer<B>,
        receiver: Receiver<TransitionBatch<B::Elem>>,
        stop: Arc<Mutex<bool>>,
    ) where
        B: ExperienceWriter + Send + 'static,
    {
        loop {
            match receiver.recv_timeout(Duration::from_millis(100)) {
                Ok(item) => {
                    if let Err(e) = buffer.push(&item.view()) {
                        warn!("Collector dropped a batch: {}", e);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if *stop.lock().unwrap() {
                break;
            }
        }
        info!("Stopped collector thread");
    }

    /// Asks the collector thread to exit after the message in flight.
    pub fn stop(&self) {
        let mut stop = self.stop.lock().unwrap();
        *stop = true;
    }

    /// Waits until the collector thread finishes.
    pub fn join(self) {
        self.handle.join().unwrap();
    }
}
