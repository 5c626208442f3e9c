use super::{Driver, Endpoint, Renderer};
use crate::config::DeviceDesc;
use crate::error::{Result, SonanceError};

const LOOPBACK_DEVICE: &str = "Loopback";

/// Driver whose endpoint has no clock of its own.
///
/// Rendering happens only when the caller asks for it through
/// [`Context::render_samples`](crate::Context::render_samples), which makes
/// playback progress fully deterministic.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoopbackDriver;

impl Driver for LoopbackDriver {
    fn name(&self) -> &str {
        "loopback"
    }

    fn list_devices(&self) -> Result<Vec<String>> {
        Ok(vec![LOOPBACK_DEVICE.to_string()])
    }

    fn default_device(&self) -> Result<String> {
        Ok(LOOPBACK_DEVICE.to_string())
    }

    fn open(&self, name: Option<&str>, desc: &DeviceDesc) -> Result<Box<dyn Endpoint>> {
        if let Some(name) = name {
            if name != LOOPBACK_DEVICE {
                return Err(SonanceError::DeviceOpen(format!(
                    "loopback driver has no device named '{name}'"
                )));
            }
        }
        Ok(Box::new(LoopbackEndpoint {
            sample_rate: desc.sample_rate,
            channels: desc.channels,
        }))
    }
}

struct LoopbackEndpoint {
    sample_rate: u32,
    channels: u16,
}

impl Endpoint for LoopbackEndpoint {
    fn name(&self) -> &str {
        LOOPBACK_DEVICE
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn start(&mut self, _renderer: Renderer) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) {}

    fn is_loopback(&self) -> bool {
        true
    }
}
