//! Device API for Sonance

use crate::config::DeviceDesc;
use crate::context::{Context, ContextState};
use crate::driver::{Driver, Endpoint, Renderer};
use crate::error::{ErrorCode, ErrorSlot, HandleKind, Result, SonanceError};
use crate::mixer::OutputFormat;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

pub const ALC_MAJOR_VERSION: i32 = 0x1000;
pub const ALC_MINOR_VERSION: i32 = 0x1001;
pub const ALC_FREQUENCY: i32 = 0x1007;
pub const ALC_REFRESH: i32 = 0x1008;
pub const ALC_SYNC: i32 = 0x1009;
pub const ALC_MONO_SOURCES: i32 = 0x1010;
pub const ALC_STEREO_SOURCES: i32 = 0x1011;

const ENUM_VALUES: &[(&str, i32)] = &[
    ("ALC_MAJOR_VERSION", ALC_MAJOR_VERSION),
    ("ALC_MINOR_VERSION", ALC_MINOR_VERSION),
    ("ALC_FREQUENCY", ALC_FREQUENCY),
    ("ALC_REFRESH", ALC_REFRESH),
    ("ALC_SYNC", ALC_SYNC),
    ("ALC_MONO_SOURCES", ALC_MONO_SOURCES),
    ("ALC_STEREO_SOURCES", ALC_STEREO_SOURCES),
    ("AL_FORMAT_MONO8", 0x1100),
    ("AL_FORMAT_MONO16", 0x1101),
    ("AL_FORMAT_STEREO8", 0x1102),
    ("AL_FORMAT_STEREO16", 0x1103),
    ("AL_FORMAT_MONO_FLOAT32", 0x10010),
    ("AL_FORMAT_STEREO_FLOAT32", 0x10011),
    ("AL_NO_ERROR", 0),
    ("AL_INVALID_NAME", 0xA001),
    ("AL_INVALID_ENUM", 0xA002),
    ("AL_INVALID_VALUE", 0xA003),
    ("AL_INVALID_OPERATION", 0xA004),
    ("AL_OUT_OF_MEMORY", 0xA005),
    ("ALC_INVALID_DEVICE", 0xA001),
    ("ALC_INVALID_CONTEXT", 0xA002),
];

const BASE_EXTENSIONS: &[&str] = &[
    "ALC_ENUMERATE_ALL_EXT",
    "ALC_ENUMERATION_EXT",
    "AL_EXT_FLOAT32",
];

/// Specification version reported by every device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: i32,
    pub minor: i32,
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// An opened audio output endpoint.
///
/// A device hosts at most one [`Context`] at a time. Buffers and sources
/// belong to that context; the device only refuses to close while any of
/// them is still alive.
///
/// Once [`close`](Self::close) succeeds, every further call on the device
/// (and on its context) fails with `InvalidHandle`.
pub struct Device {
    endpoint: Option<Box<dyn Endpoint>>,
    desc: DeviceDesc,
    open: Arc<AtomicBool>,
    context: Weak<Mutex<ContextState>>,
    errors: ErrorSlot,
}

impl Device {
    /// Names of the endpoints `driver` can open (`ListDevices`).
    pub fn list_devices(driver: &dyn Driver) -> Result<Vec<String>> {
        driver.list_devices()
    }

    pub fn default_device_name(driver: &dyn Driver) -> Result<String> {
        driver.default_device()
    }

    /// Opens `name` (or the default endpoint for `None`) with the default
    /// [`DeviceDesc`].
    pub fn open(driver: &dyn Driver, name: Option<&str>) -> Result<Self> {
        Self::open_with_desc(driver, name, DeviceDesc::default())
    }

    /// # Errors
    ///
    /// `DeviceOpen` if the driver rejects the name, `InvalidValue` for an
    /// unusable `desc`.
    pub fn open_with_desc(driver: &dyn Driver, name: Option<&str>, desc: DeviceDesc) -> Result<Self> {
        desc.validate()?;
        let endpoint = driver.open(name, &desc)?;
        log::info!(
            "Opened device '{}' on {} driver ({} Hz, {} channel(s))",
            endpoint.name(),
            driver.name(),
            endpoint.sample_rate(),
            endpoint.channels()
        );

        Ok(Self {
            endpoint: Some(endpoint),
            desc,
            open: Arc::new(AtomicBool::new(true)),
            context: Weak::new(),
            errors: ErrorSlot::default(),
        })
    }

    fn endpoint(&self) -> Result<&dyn Endpoint> {
        self.endpoint
            .as_deref()
            .ok_or_else(|| SonanceError::invalid_handle(HandleKind::Device, "closed device"))
    }

    pub fn is_open(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Returns and clears the last recorded device error.
    pub fn get_error(&self) -> ErrorCode {
        self.errors.take()
    }

    pub fn name(&self) -> Result<String> {
        self.errors
            .track(self.endpoint().map(|endpoint| endpoint.name().to_string()))
    }

    pub fn version(&self) -> Result<Version> {
        self.errors
            .track(self.endpoint().map(|_| Version { major: 1, minor: 1 }))
    }

    /// Snapshot of the device attributes, keyed by `ALC_*` constants.
    pub fn attributes(&self) -> Result<HashMap<i32, i32>> {
        let result = self.endpoint().map(|endpoint| {
            HashMap::from([
                (ALC_FREQUENCY, endpoint.sample_rate() as i32),
                (ALC_REFRESH, self.desc.refresh_rate() as i32),
                (ALC_SYNC, 0),
                (ALC_MONO_SOURCES, self.desc.mono_sources() as i32),
                (ALC_STEREO_SOURCES, self.desc.stereo_sources() as i32),
            ])
        });
        self.errors.track(result)
    }

    pub fn extensions(&self) -> Result<Vec<String>> {
        let result = self.endpoint().map(|endpoint| {
            let mut extensions: Vec<String> =
                BASE_EXTENSIONS.iter().map(|name| name.to_string()).collect();
            if endpoint.is_loopback() {
                extensions.push("ALC_SOFT_loopback".to_string());
            }
            extensions
        });
        self.errors.track(result)
    }

    /// Extension names compare case-insensitively.
    pub fn is_extension_present(&self, name: &str) -> Result<bool> {
        self.extensions().map(|extensions| {
            extensions
                .iter()
                .any(|extension| extension.eq_ignore_ascii_case(name))
        })
    }

    /// Value of a named enumerant, or `None` if the name is unknown.
    pub fn enum_value(&self, name: &str) -> Result<Option<i32>> {
        let result = self.endpoint().map(|_| {
            ENUM_VALUES
                .iter()
                .find(|(known, _)| known.eq_ignore_ascii_case(name))
                .map(|(_, value)| *value)
        });
        self.errors.track(result)
    }

    /// Creates the device's rendering context and starts the endpoint.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` while a previous context of this device is still
    /// alive.
    pub fn create_context(&mut self) -> Result<Context> {
        let result = self.start_context();
        self.errors.track(result)
    }

    fn start_context(&mut self) -> Result<Context> {
        if self.context.upgrade().is_some() {
            return Err(SonanceError::InvalidOperation(
                "device already has a live context".into(),
            ));
        }
        let endpoint = self
            .endpoint
            .as_deref_mut()
            .ok_or_else(|| SonanceError::invalid_handle(HandleKind::Device, "closed device"))?;

        let format = OutputFormat {
            sample_rate: endpoint.sample_rate(),
            channels: endpoint.channels(),
        };
        let context = Context::new(format, &self.desc, self.open.clone(), endpoint.is_loopback());
        let state = Arc::downgrade(context.shared_state());
        endpoint.start(Renderer::new(state.clone()))?;
        self.context = state;
        log::info!("Context created on '{}'", endpoint.name());
        Ok(context)
    }

    /// Releases the endpoint.
    ///
    /// Returns `Ok(false)` without side effects while the device's context
    /// still holds buffers or sources; the caller deletes those and retries.
    pub fn close(&mut self) -> Result<bool> {
        let result = self.release();
        self.errors.track(result)
    }

    fn release(&mut self) -> Result<bool> {
        self.endpoint()?;

        if let Some(state) = self.context.upgrade() {
            let live = state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .live_objects();
            if live > 0 {
                log::warn!("Refusing to close device: {} buffer(s)/source(s) still alive", live);
                return Ok(false);
            }
        }

        if let Some(mut endpoint) = self.endpoint.take() {
            endpoint.stop();
            log::info!("Closed device '{}'", endpoint.name());
        }
        self.open.store(false, Ordering::Release);
        self.context = Weak::new();
        Ok(true)
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if let Some(endpoint) = self.endpoint.as_deref_mut() {
            endpoint.stop();
        }
        self.open.store(false, Ordering::Release);
    }
}
