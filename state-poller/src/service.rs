//! Reconciliation of polling configuration against live workers
//!
//! [`StatePollerService`] is the single owner of the per-device workers.
//! Every [`refresh`](StatePollerService::refresh) reads the full
//! configuration set from the store and converges the worker map onto it:
//! new enabled devices get a worker, changed devices are reconfigured in
//! place, disabled and deleted devices lose theirs. One background task
//! drains the result queue into the store and the telemetry publisher.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use device_gateway::DeviceGateway;
use device_registry::{DeviceId, DeviceStore};
use telemetry::TelemetryPublisher;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::PollerConfig;
use crate::error::{PollerError, Result};
use crate::jitter::Jitter;
use crate::poller::{DevicePollerFactory, PollerFactory, PollerSettings, StatePoller};
use crate::queue::{result_queue, PollOutcome, ResultReceiver, ResultSender};

/// Whether a device is currently being polled, and how
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollingState {
    Stopped,
    Polling { interval: Duration, address: IpAddr },
}

impl From<PollerSettings> for PollingState {
    fn from(settings: PollerSettings) -> Self {
        PollingState::Polling {
            interval: settings.interval,
            address: settings.address,
        }
    }
}

struct ResultConsumer {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Keeps one polling worker per enabled device
///
/// # Example
///
/// ```rust,ignore
/// let service = StatePollerService::new(registry, gateway, publisher, PollerConfig::default())?;
/// service.start().await?;
///
/// // After every configuration change made through the management API
/// service.refresh().await?;
///
/// service.stop().await;
/// ```
pub struct StatePollerService {
    store: Arc<dyn DeviceStore>,
    publisher: Arc<dyn TelemetryPublisher>,
    factory: Arc<dyn PollerFactory>,
    config: PollerConfig,

    /// Live workers; held for the whole of a refresh pass
    pollers: tokio::sync::Mutex<HashMap<DeviceId, Box<dyn StatePoller>>>,

    results_tx: ResultSender,

    /// Receiving end of the queue until `start` hands it to the consumer
    results_rx: parking_lot::Mutex<Option<ResultReceiver>>,

    consumer: parking_lot::Mutex<Option<ResultConsumer>>,

    /// Set by `stop`; only written with `pollers` held
    stopped: AtomicBool,
}

impl StatePollerService {
    /// Create a service polling devices through `gateway`
    pub fn new(
        store: Arc<dyn DeviceStore>,
        gateway: Arc<dyn DeviceGateway>,
        publisher: Arc<dyn TelemetryPublisher>,
        config: PollerConfig,
    ) -> Result<Self> {
        let factory = Arc::new(DevicePollerFactory::new(
            gateway,
            Jitter::new(config.max_jitter),
        ));
        Self::with_poller_factory(store, publisher, factory, config)
    }

    /// Create a service with a custom worker factory
    pub fn with_poller_factory(
        store: Arc<dyn DeviceStore>,
        publisher: Arc<dyn TelemetryPublisher>,
        factory: Arc<dyn PollerFactory>,
        config: PollerConfig,
    ) -> Result<Self> {
        config.validate()?;
        let (results_tx, results_rx) = result_queue(config.result_queue_capacity);

        Ok(Self {
            store,
            publisher,
            factory,
            config,
            pollers: tokio::sync::Mutex::new(HashMap::new()),
            results_tx,
            results_rx: parking_lot::Mutex::new(Some(results_rx)),
            consumer: parking_lot::Mutex::new(None),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Launch the result consumer, then bootstrap workers for every enabled device
    ///
    /// A service can be started once, and not after it has been stopped.
    pub async fn start(&self) -> Result<()> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(PollerError::Stopped);
        }

        let results = self
            .results_rx
            .lock()
            .take()
            .ok_or(PollerError::AlreadyStarted)?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(consume_results(
            Arc::clone(&self.store),
            Arc::clone(&self.publisher),
            results,
            shutdown_rx,
        ));
        *self.consumer.lock() = Some(ResultConsumer {
            shutdown: shutdown_tx,
            task,
        });

        self.refresh().await
    }

    /// Converge live workers onto the current configuration
    ///
    /// A store error aborts the pass; changes already applied in it stay in
    /// place and the next refresh converges the rest. Fails with
    /// [`PollerError::Stopped`] once the service has been stopped.
    pub async fn refresh(&self) -> Result<()> {
        let mut pollers = self.pollers.lock().await;
        if self.stopped.load(Ordering::SeqCst) {
            return Err(PollerError::Stopped);
        }

        let configs = self.store.polling_configs().await?;

        for (device_id, config) in &configs {
            let settings = PollerSettings::from(config);

            let enabled = config.enabled && config.interval_seconds > 0;
            if config.enabled && !enabled {
                tracing::warn!(
                    "Device {} has a zero polling interval, not polling it",
                    device_id
                );
            }

            match (enabled, pollers.contains_key(device_id)) {
                (true, false) => {
                    let mut poller = self.factory.create(
                        device_id.clone(),
                        settings,
                        self.results_tx.clone(),
                    );
                    poller.start();
                    pollers.insert(device_id.clone(), poller);
                }
                (true, true) => {
                    if let Some(poller) = pollers.get_mut(device_id) {
                        poller.refresh(settings.interval, settings.address);
                    }
                }
                (false, true) => {
                    if let Some(mut poller) = pollers.remove(device_id) {
                        poller.stop();
                    }
                }
                (false, false) => {}
            }
        }

        // Devices deleted from the store
        pollers.retain(|device_id, poller| {
            if configs.contains_key(device_id) {
                return true;
            }
            tracing::info!("Device {} removed, stopping its poller", device_id);
            poller.stop();
            false
        });

        Ok(())
    }

    /// Stop every worker and the result consumer
    ///
    /// The service cannot be started or refreshed afterwards.
    pub async fn stop(&self) {
        {
            let mut pollers = self.pollers.lock().await;
            self.stopped.store(true, Ordering::SeqCst);
            for (_, mut poller) in pollers.drain() {
                poller.stop();
            }
        }

        let consumer = self.consumer.lock().take();
        let Some(ResultConsumer { shutdown, task }) = consumer else {
            return;
        };

        let _ = shutdown.send(());
        match tokio::time::timeout(self.config.stop_timeout, task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Result consumer task failed: {}", e),
            Err(_) => tracing::warn!(
                "Result consumer did not stop within {:?}",
                self.config.stop_timeout
            ),
        }
    }

    /// Polling state of a single device
    pub async fn polling_state(&self, device_id: &DeviceId) -> PollingState {
        self.pollers
            .lock()
            .await
            .get(device_id)
            .map_or(PollingState::Stopped, |poller| poller.settings().into())
    }

    /// Polling state of every device that currently has a worker
    pub async fn polling_states(&self) -> HashMap<DeviceId, PollingState> {
        self.pollers
            .lock()
            .await
            .iter()
            .map(|(id, poller)| (id.clone(), poller.settings().into()))
            .collect()
    }

    /// Number of live workers
    pub async fn active_pollers(&self) -> usize {
        self.pollers.lock().await.len()
    }
}

/// Result consumer loop: persist, then publish
async fn consume_results(
    store: Arc<dyn DeviceStore>,
    publisher: Arc<dyn TelemetryPublisher>,
    mut results: ResultReceiver,
    mut shutdown: oneshot::Receiver<()>,
) {
    tracing::info!("State result consumer started");

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => break,

            outcome = results.recv() => match outcome {
                Some(outcome) => handle_outcome(store.as_ref(), publisher.as_ref(), outcome).await,
                None => break,
            },
        }
    }

    tracing::info!("State result consumer stopped");
}

async fn handle_outcome(
    store: &dyn DeviceStore,
    publisher: &dyn TelemetryPublisher,
    outcome: PollOutcome,
) {
    tracing::info!(
        "Updating state for device {}: {:?}",
        outcome.device_id,
        outcome.state
    );

    if let Err(e) = store.persist_state(&outcome.device_id, &outcome.state).await {
        tracing::error!(
            "Failed to update state, deviceId: {}, error: {}",
            outcome.device_id,
            e
        );
        return;
    }

    publisher.publish(&outcome.state);
}
