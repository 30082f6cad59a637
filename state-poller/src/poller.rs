//! Per-device polling worker
//!
//! Each [`DevicePoller`] owns one background task that sleeps on a single
//! timer, fetches the device state when it fires, and hands successful
//! results to the shared result queue. The handle kept by the service talks
//! to that task over a command channel, so the timer only ever has one owner:
//! a reconfiguration resets the pending sleep instead of racing with it, and
//! a tick that already fired is handled exactly once.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use device_gateway::DeviceGateway;
use device_registry::{DeviceId, PollingConfig};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::jitter::Jitter;
use crate::queue::{PollOutcome, ResultSender};

/// Lifecycle of a polling worker
///
/// `Created → Scheduled → Fetching → Scheduled → … → Stopped`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerPhase {
    /// Constructed, timer not armed yet
    Created,
    /// Timer armed, waiting for the next tick
    Scheduled,
    /// Tick fired, fetch or delivery in progress
    Fetching,
    /// No further ticks will be scheduled
    Stopped,
}

/// Interval and address a worker polls with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerSettings {
    pub interval: Duration,
    pub address: IpAddr,
}

impl PollerSettings {
    pub fn new(interval: Duration, address: IpAddr) -> Self {
        Self { interval, address }
    }
}

impl From<&PollingConfig> for PollerSettings {
    fn from(config: &PollingConfig) -> Self {
        Self::new(config.interval(), config.target_address)
    }
}

/// Control surface of a polling worker as driven by the service
///
/// The service holds every poller behind its own lock, so these methods are
/// never called concurrently for the same worker.
pub trait StatePoller: Send {
    /// Arm the first tick after a random initial delay
    ///
    /// Must be called at most once.
    fn start(&mut self);

    /// Apply new settings, returning whether anything changed
    ///
    /// Unchanged settings are a no-op. Otherwise the pending tick is replaced
    /// by one `interval` from now, without jitter.
    fn refresh(&mut self, interval: Duration, address: IpAddr) -> bool;

    /// Stop scheduling ticks
    ///
    /// A fetch already in flight runs to completion and its result may still
    /// be delivered.
    fn stop(&mut self);

    /// Settings the worker currently polls with
    fn settings(&self) -> PollerSettings;
}

/// Creates workers for newly enabled devices
pub trait PollerFactory: Send + Sync {
    fn create(
        &self,
        device_id: DeviceId,
        settings: PollerSettings,
        results: ResultSender,
    ) -> Box<dyn StatePoller>;
}

/// Factory producing [`DevicePoller`]s that fetch through a shared gateway
#[derive(Clone)]
pub struct DevicePollerFactory {
    gateway: Arc<dyn DeviceGateway>,
    jitter: Jitter,
}

impl DevicePollerFactory {
    pub fn new(gateway: Arc<dyn DeviceGateway>, jitter: Jitter) -> Self {
        Self { gateway, jitter }
    }
}

impl PollerFactory for DevicePollerFactory {
    fn create(
        &self,
        device_id: DeviceId,
        settings: PollerSettings,
        results: ResultSender,
    ) -> Box<dyn StatePoller> {
        Box::new(DevicePoller::new(
            device_id,
            settings,
            Arc::clone(&self.gateway),
            results,
            self.jitter,
        ))
    }
}

/// Commands sent from the handle to the worker task
#[derive(Debug)]
enum Command {
    Reconfigure(PollerSettings),
    Stop,
}

/// Everything the worker task needs besides its settings
struct PollerContext {
    gateway: Arc<dyn DeviceGateway>,
    results: ResultSender,
    jitter: Jitter,
}

/// Handle to one device's polling worker
///
/// Dropping the handle stops the worker the same way [`StatePoller::stop`] does.
pub struct DevicePoller {
    device_id: DeviceId,
    settings: PollerSettings,
    phase: Arc<Mutex<PollerPhase>>,
    context: Option<PollerContext>,
    commands: Option<mpsc::UnboundedSender<Command>>,
    task: Option<JoinHandle<()>>,
}

impl DevicePoller {
    pub fn new(
        device_id: DeviceId,
        settings: PollerSettings,
        gateway: Arc<dyn DeviceGateway>,
        results: ResultSender,
        jitter: Jitter,
    ) -> Self {
        Self {
            device_id,
            settings,
            phase: Arc::new(Mutex::new(PollerPhase::Created)),
            context: Some(PollerContext {
                gateway,
                results,
                jitter,
            }),
            commands: None,
            task: None,
        }
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub fn phase(&self) -> PollerPhase {
        *self.phase.lock()
    }

    /// Whether the worker task has exited
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }
}

impl StatePoller for DevicePoller {
    fn start(&mut self) {
        let Some(context) = self.context.take() else {
            tracing::warn!("Poller for device {} already started", self.device_id);
            return;
        };

        let initial_delay = context.jitter.sample();
        tracing::info!(
            "Starting poller for device {} with interval {:?} and initial sleep {:?}",
            self.device_id,
            self.settings.interval,
            initial_delay
        );

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        *self.phase.lock() = PollerPhase::Scheduled;

        self.task = Some(tokio::spawn(run_poller(
            self.device_id.clone(),
            self.settings,
            context,
            Arc::clone(&self.phase),
            command_rx,
            initial_delay,
        )));
        self.commands = Some(command_tx);
    }

    fn refresh(&mut self, interval: Duration, address: IpAddr) -> bool {
        let next = PollerSettings::new(interval, address);
        if next == self.settings {
            return false;
        }

        if *self.phase.lock() == PollerPhase::Stopped {
            tracing::debug!("Ignoring refresh for stopped poller {}", self.device_id);
            return false;
        }

        tracing::info!(
            "Refreshing poller for device {}, interval: {:?} ip: {}",
            self.device_id,
            interval,
            address
        );
        self.settings = next;

        if let Some(commands) = &self.commands {
            if commands.send(Command::Reconfigure(next)).is_err() {
                tracing::debug!("Poller task for device {} already exited", self.device_id);
            }
        }

        true
    }

    fn stop(&mut self) {
        tracing::info!("Stopping poller for device {}", self.device_id);

        match self.commands.take() {
            Some(commands) => {
                let _ = commands.send(Command::Stop);
            }
            None => {
                self.context = None;
                *self.phase.lock() = PollerPhase::Stopped;
            }
        }
    }

    fn settings(&self) -> PollerSettings {
        self.settings
    }
}

impl std::fmt::Debug for DevicePoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevicePoller")
            .field("device_id", &self.device_id)
            .field("settings", &self.settings)
            .field("phase", &self.phase())
            .finish()
    }
}

/// Worker task: one timer, one fetch at a time
async fn run_poller(
    device_id: DeviceId,
    mut settings: PollerSettings,
    context: PollerContext,
    phase: Arc<Mutex<PollerPhase>>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    initial_delay: Duration,
) {
    let sleep = tokio::time::sleep(initial_delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            // Commands win over a tick that fired at the same time
            biased;

            command = commands.recv() => match command {
                Some(Command::Reconfigure(next)) => {
                    settings = next;
                    sleep.as_mut().reset(Instant::now() + settings.interval);
                }
                Some(Command::Stop) | None => break,
            },

            () = &mut sleep => {
                *phase.lock() = PollerPhase::Fetching;

                // Re-arm before fetching so a failure cannot stall polling
                let next_sleep = settings.interval + context.jitter.sample();
                tracing::info!("Polling device {}, next sleep {:?}", device_id, next_sleep);
                sleep.as_mut().reset(Instant::now() + next_sleep);

                if let Some(outcome) = poll_once(&device_id, settings.address, &context).await {
                    if context.results.send(outcome).await.is_err() {
                        tracing::debug!("Result queue closed, stopping poller for device {}", device_id);
                        break;
                    }
                }

                *phase.lock() = PollerPhase::Scheduled;
            }
        }
    }

    *phase.lock() = PollerPhase::Stopped;
    tracing::debug!("Poller task for device {} ended", device_id);
}

async fn poll_once(
    device_id: &DeviceId,
    address: IpAddr,
    context: &PollerContext,
) -> Option<PollOutcome> {
    match context.gateway.fetch_state(address).await {
        Ok(state) => Some(PollOutcome {
            device_id: device_id.clone(),
            state,
        }),
        Err(e) => {
            tracing::error!(
                "Failed to fetch state, deviceId: {}, ip: {}, error: {}",
                device_id,
                address,
                e
            );
            None
        }
    }
}
