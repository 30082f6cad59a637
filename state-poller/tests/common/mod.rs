//! Recording fakes for the state poller's collaborators.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use device_gateway::{DeviceGateway, GatewayError, Result as GatewayResult};
use device_registry::{
    Defaults, DeviceConfig, DeviceId, DeviceState, DeviceStore, PollingConfig, Registry,
    RegistryError, Result as RegistryResult,
};
use parking_lot::Mutex;
use state_poller::{PollerFactory, PollerSettings, ResultSender, StatePoller};
use telemetry::TelemetryPublisher;
use tokio::sync::Semaphore;
use tokio::time::Instant;

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

pub fn config(ip_addr: &str, enabled: bool, interval: u32) -> DeviceConfig {
    DeviceConfig {
        main_ip: Some(ip(ip_addr)),
        state_polling_enabled: enabled,
        state_polling_interval_sec: interval,
    }
}

pub fn state(vcc: i32) -> DeviceState {
    DeviceState {
        vcc,
        instance: "A100".to_string(),
        poll_period: 1000,
        ..Default::default()
    }
}

// ============================================================================
// Store
// ============================================================================

/// Registry-backed store that records persisted states and can be told to fail
#[derive(Default)]
pub struct TestStore {
    pub registry: Registry,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    persisted: Mutex<Vec<(DeviceId, DeviceState)>>,
}

impl TestStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_device(&self, id: &str, config: DeviceConfig) -> DeviceId {
        let id = DeviceId::new(id);
        if !self.registry.contains(&id) {
            self.registry.create(&id).unwrap();
        }
        self.registry.update_config(&id, config).unwrap();
        id
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn persisted(&self) -> Vec<(DeviceId, DeviceState)> {
        self.persisted.lock().clone()
    }
}

#[async_trait]
impl DeviceStore for TestStore {
    async fn polling_configs(&self) -> RegistryResult<HashMap<DeviceId, PollingConfig>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RegistryError::Io {
                path: "devices.json".into(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk unavailable"),
            });
        }
        self.registry.polling_configs().await
    }

    async fn persist_state(&self, id: &DeviceId, state: &DeviceState) -> RegistryResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RegistryError::NotFound(id.clone()));
        }
        self.registry.persist_state(id, state).await?;
        self.persisted.lock().push((id.clone(), state.clone()));
        Ok(())
    }
}

/// Store serving a fixed set of polling configs, bypassing registry validation
pub struct StaticStore {
    configs: HashMap<DeviceId, PollingConfig>,
}

impl StaticStore {
    pub fn new(configs: impl IntoIterator<Item = (DeviceId, PollingConfig)>) -> Arc<Self> {
        Arc::new(Self {
            configs: configs.into_iter().collect(),
        })
    }
}

#[async_trait]
impl DeviceStore for StaticStore {
    async fn polling_configs(&self) -> RegistryResult<HashMap<DeviceId, PollingConfig>> {
        Ok(self.configs.clone())
    }

    async fn persist_state(&self, _id: &DeviceId, _state: &DeviceState) -> RegistryResult<()> {
        Ok(())
    }
}

// ============================================================================
// Publisher
// ============================================================================

#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<DeviceState>>,
}

impl RecordingPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn published(&self) -> Vec<DeviceState> {
        self.published.lock().clone()
    }
}

impl TelemetryPublisher for RecordingPublisher {
    fn publish(&self, state: &DeviceState) {
        self.published.lock().push(state.clone());
    }
}

// ============================================================================
// Gateway
// ============================================================================

/// Gateway answering from a script, defaulting to `state(call number)`
pub struct ScriptedGateway {
    responses: Mutex<VecDeque<GatewayResult<DeviceState>>>,
    calls: Mutex<Vec<(IpAddr, Instant)>>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            gate: None,
        })
    }

    /// Gateway whose fetches wait for a permit on the returned semaphore
    pub fn gated() -> (Arc<Self>, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let gateway = Arc::new(Self {
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            gate: Some(Arc::clone(&gate)),
        });
        (gateway, gate)
    }

    pub fn respond(&self, response: GatewayResult<DeviceState>) {
        self.responses.lock().push_back(response);
    }

    pub fn fail_next(&self, address: IpAddr) {
        self.respond(Err(GatewayError::Timeout {
            address,
            timeout: Duration::from_secs(30),
        }));
    }

    pub fn calls(&self) -> Vec<(IpAddr, Instant)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl DeviceGateway for ScriptedGateway {
    async fn fetch_state(&self, address: IpAddr) -> GatewayResult<DeviceState> {
        let call_number = {
            let mut calls = self.calls.lock();
            calls.push((address, Instant::now()));
            calls.len()
        };

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(state(call_number as i32)))
    }

    async fn push_defaults(&self, _defaults: &Defaults, _address: IpAddr) -> GatewayResult<()> {
        Ok(())
    }
}

// ============================================================================
// Poller factory
// ============================================================================

/// Lifecycle calls observed on recording pollers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollerEvent {
    Created(DeviceId, PollerSettings),
    Started(DeviceId),
    Refreshed {
        device_id: DeviceId,
        settings: PollerSettings,
        changed: bool,
    },
    Stopped(DeviceId),
}

pub type EventLog = Arc<Mutex<Vec<PollerEvent>>>;

#[derive(Default)]
pub struct RecordingFactory {
    pub events: EventLog,
}

impl RecordingFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<PollerEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Events that actually changed something: everything but no-op refreshes
    pub fn effective_events(&self) -> Vec<PollerEvent> {
        self.events()
            .into_iter()
            .filter(|e| !matches!(e, PollerEvent::Refreshed { changed: false, .. }))
            .collect()
    }
}

impl PollerFactory for RecordingFactory {
    fn create(
        &self,
        device_id: DeviceId,
        settings: PollerSettings,
        _results: ResultSender,
    ) -> Box<dyn StatePoller> {
        self.events
            .lock()
            .push(PollerEvent::Created(device_id.clone(), settings));
        Box::new(RecordingPoller {
            device_id,
            settings,
            events: Arc::clone(&self.events),
        })
    }
}

pub struct RecordingPoller {
    device_id: DeviceId,
    settings: PollerSettings,
    events: EventLog,
}

impl StatePoller for RecordingPoller {
    fn start(&mut self) {
        self.events
            .lock()
            .push(PollerEvent::Started(self.device_id.clone()));
    }

    fn refresh(&mut self, interval: Duration, address: IpAddr) -> bool {
        let settings = PollerSettings::new(interval, address);
        let changed = settings != self.settings;
        self.settings = settings;
        self.events.lock().push(PollerEvent::Refreshed {
            device_id: self.device_id.clone(),
            settings,
            changed,
        });
        changed
    }

    fn stop(&mut self) {
        self.events
            .lock()
            .push(PollerEvent::Stopped(self.device_id.clone()));
    }

    fn settings(&self) -> PollerSettings {
        self.settings
    }
}
