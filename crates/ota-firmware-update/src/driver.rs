//! Tokio event loop around an [`OtaHandler`].
//!
//! The driver owns the handler on a single task and serializes everything
//! that touches it: commands from the transport and the chunk timeout. The
//! handler's callbacks therefore never run concurrently.

use std::time::Instant;

use ota_watchdog::Clock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::descriptor::UpdateDescriptor;
use crate::error::{OtaError, OtaResult};
use crate::handler::OtaHandler;

/// Command queue depth of a spawned driver.
pub const DEFAULT_COMMAND_QUEUE: usize = 32;

/// Clock backed by tokio's timer, so paused test time drives chunk timeouts.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}

/// Work items for the driver task.
#[derive(Debug)]
pub enum DriverCommand {
    /// Begin an update
    Start(UpdateDescriptor),
    /// A chunk response arrived
    Chunk {
        /// Index of the chunk
        index: u32,
        /// Chunk payload
        payload: Vec<u8>,
    },
    /// Abort the running update
    Stop,
    /// Leave the event loop and hand the handler back
    Shutdown,
}

/// Spawns handlers onto the tokio runtime.
#[derive(Debug, Clone, Copy)]
pub struct UpdateDriver {
    queue_depth: usize,
}

impl Default for UpdateDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateDriver {
    /// Driver with the default command queue depth.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue_depth: DEFAULT_COMMAND_QUEUE,
        }
    }

    /// Set the command queue depth. Zero is treated as one.
    #[must_use]
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }

    /// Move `handler` onto its own task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self, handler: OtaHandler<TokioClock>) -> DriverHandle {
        let (commands, receiver) = mpsc::channel(self.queue_depth);
        let task = tokio::spawn(run(handler, receiver));
        DriverHandle { commands, task }
    }
}

/// Handle to a spawned driver.
#[derive(Debug)]
pub struct DriverHandle {
    commands: mpsc::Sender<DriverCommand>,
    task: JoinHandle<OtaHandler<TokioClock>>,
}

impl DriverHandle {
    /// Begin an update.
    ///
    /// # Errors
    ///
    /// Returns `OtaError::DriverClosed` if the driver task has ended.
    pub async fn start(&self, descriptor: UpdateDescriptor) -> OtaResult<()> {
        self.send(DriverCommand::Start(descriptor)).await
    }

    /// Deliver a chunk response.
    ///
    /// # Errors
    ///
    /// Returns `OtaError::DriverClosed` if the driver task has ended.
    pub async fn deliver_chunk(&self, index: u32, payload: impl Into<Vec<u8>>) -> OtaResult<()> {
        self.send(DriverCommand::Chunk {
            index,
            payload: payload.into(),
        })
        .await
    }

    /// Abort the running update.
    ///
    /// # Errors
    ///
    /// Returns `OtaError::DriverClosed` if the driver task has ended.
    pub async fn stop(&self) -> OtaResult<()> {
        self.send(DriverCommand::Stop).await
    }

    /// Sender for transports that deliver chunks from their own tasks.
    #[must_use]
    pub fn sender(&self) -> mpsc::Sender<DriverCommand> {
        self.commands.clone()
    }

    /// Stop the event loop and return the handler.
    ///
    /// A running update is left as is and can be resumed by spawning the
    /// handler again.
    ///
    /// # Errors
    ///
    /// Returns `OtaError::DriverClosed` if the driver task panicked or was cancelled.
    pub async fn shutdown(self) -> OtaResult<OtaHandler<TokioClock>> {
        if self.commands.send(DriverCommand::Shutdown).await.is_err() {
            debug!("Update driver already stopped receiving commands");
        }
        self.task.await.map_err(|e| {
            debug!("Update driver task ended abnormally: {}", e);
            OtaError::DriverClosed
        })
    }

    async fn send(&self, command: DriverCommand) -> OtaResult<()> {
        self.commands.send(command).await.map_err(|e| {
            debug!("Dropping {:?}, update driver is gone", e.0);
            OtaError::DriverClosed
        })
    }
}

async fn run(
    mut handler: OtaHandler<TokioClock>,
    mut commands: mpsc::Receiver<DriverCommand>,
) -> OtaHandler<TokioClock> {
    info!("Firmware update driver started");
    loop {
        let deadline = handler.next_deadline();
        tokio::select! {
            command = commands.recv() => match command {
                Some(DriverCommand::Start(descriptor)) => handler.start(descriptor),
                Some(DriverCommand::Chunk { index, payload }) => {
                    handler.process_chunk(index, &payload);
                }
                Some(DriverCommand::Stop) => handler.stop(),
                Some(DriverCommand::Shutdown) | None => break,
            },
            () = sleep_until(deadline) => {
                handler.poll_timeout();
            }
        }
    }
    info!("Firmware update driver stopped");
    handler
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => {
            tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
        }
        None => std::future::pending().await,
    }
}
