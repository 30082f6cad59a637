//! Lock-protected device registry with optional JSON file persistence

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::error::{RegistryError, Result};
use crate::model::{Defaults, Device, DeviceConfig, DeviceId, DeviceState};

type DeviceMap = BTreeMap<DeviceId, Device>;

/// Registry of managed devices
///
/// All reads are served from memory. When opened on a file, every successful
/// mutation is written through before it becomes visible, so a failed write
/// leaves both the file and the in-memory view unchanged.
///
/// # Example
///
/// ```rust
/// use device_registry::{DeviceConfig, DeviceId, Registry};
///
/// let registry = Registry::in_memory();
/// let id = DeviceId::new("12345");
/// registry.create(&id).unwrap();
///
/// registry
///     .update_config(
///         &id,
///         DeviceConfig {
///             main_ip: Some("ffff::1".parse().unwrap()),
///             state_polling_enabled: true,
///             state_polling_interval_sec: 600,
///         },
///     )
///     .unwrap();
///
/// assert!(registry.get(&id).unwrap().config.state_polling_enabled);
/// ```
#[derive(Debug)]
pub struct Registry {
    devices: RwLock<DeviceMap>,
    path: Option<PathBuf>,
}

impl Registry {
    /// Create a registry that lives only in memory
    pub fn in_memory() -> Self {
        Self {
            devices: RwLock::new(BTreeMap::new()),
            path: None,
        }
    }

    /// Open a registry backed by the given JSON file
    ///
    /// A missing file is treated as an empty registry and created on the first mutation.
    /// Stored configs are held to the same constraints as `update_config`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let devices: DeviceMap = match fs::read(&path) {
            Ok(buf) if buf.is_empty() => BTreeMap::new(),
            Ok(buf) => serde_json::from_slice(&buf)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(RegistryError::Io { path, source }),
        };

        for (id, device) in &devices {
            validate_config(id, &device.config)?;
        }

        tracing::info!(
            "Opened device registry '{}' with {} devices",
            path.display(),
            devices.len()
        );

        Ok(Self {
            devices: RwLock::new(devices),
            path: Some(path),
        })
    }

    /// Path of the backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Register a new device with default defaults and config
    pub fn create(&self, id: &DeviceId) -> Result<Device> {
        self.mutate(|devices| {
            if devices.contains_key(id) {
                return Err(RegistryError::AlreadyExists(id.clone()));
            }
            let device = Device::default();
            devices.insert(id.clone(), device.clone());
            Ok(device)
        })
    }

    /// Get a device by id
    pub fn get(&self, id: &DeviceId) -> Result<Device> {
        self.devices
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.clone()))
    }

    /// Check whether a device is registered
    pub fn contains(&self, id: &DeviceId) -> bool {
        self.devices.read().contains_key(id)
    }

    /// Snapshot of all registered devices
    pub fn devices(&self) -> BTreeMap<DeviceId, Device> {
        self.devices.read().clone()
    }

    /// Number of registered devices
    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn update_defaults(&self, id: &DeviceId, defaults: Defaults) -> Result<()> {
        self.mutate(|devices| {
            existing(devices, id)?.defaults = defaults;
            Ok(())
        })
    }

    pub fn update_state(&self, id: &DeviceId, state: DeviceState) -> Result<()> {
        self.mutate(|devices| {
            existing(devices, id)?.state = Some(state);
            Ok(())
        })
    }

    /// Replace a device's configuration
    ///
    /// A polling interval of zero is rejected.
    pub fn update_config(&self, id: &DeviceId, config: DeviceConfig) -> Result<()> {
        validate_config(id, &config)?;

        self.mutate(|devices| {
            existing(devices, id)?.config = config;
            Ok(())
        })
    }

    /// Remove a device and everything stored for it
    pub fn delete(&self, id: &DeviceId) -> Result<()> {
        self.mutate(|devices| {
            tracing::debug!("Deleting device '{}'", id);
            devices
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| RegistryError::NotFound(id.clone()))
        })
    }

    /// Apply a mutation, persisting the result before publishing it
    fn mutate<T>(&self, f: impl FnOnce(&mut DeviceMap) -> Result<T>) -> Result<T> {
        let mut devices = self.devices.write();

        let Some(path) = &self.path else {
            return f(&mut devices);
        };

        let mut next = devices.clone();
        let value = f(&mut next)?;
        write_atomic(path, &next)?;
        *devices = next;

        Ok(value)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::in_memory()
    }
}

fn validate_config(id: &DeviceId, config: &DeviceConfig) -> Result<()> {
    if config.state_polling_interval_sec == 0 {
        return Err(RegistryError::InvalidConfig {
            id: id.clone(),
            reason: "state polling interval must be greater than 0".to_string(),
        });
    }
    Ok(())
}

fn existing<'a>(devices: &'a mut DeviceMap, id: &DeviceId) -> Result<&'a mut Device> {
    devices
        .get_mut(id)
        .ok_or_else(|| RegistryError::NotFound(id.clone()))
}

fn write_atomic(path: &Path, devices: &DeviceMap) -> Result<()> {
    let buf = serde_json::to_vec_pretty(devices)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let io_err = |source: io::Error| RegistryError::Io {
        path: path.to_path_buf(),
        source,
    };
    fs::write(&tmp, buf).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;

    Ok(())
}
