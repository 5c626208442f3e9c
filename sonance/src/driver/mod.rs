//! Driver interface: the boundary between the resource model and an output backend.
//!
//! A [`Driver`] enumerates and opens endpoints. An opened [`Endpoint`] pulls
//! audio from a context through a [`Renderer`] on its own schedule; the
//! context never blocks on the endpoint and only learns about progress when
//! the caller polls it.

#[cfg(feature = "cpal")]
mod cpal_driver;
mod loopback;
mod null;

#[cfg(feature = "cpal")]
pub use cpal_driver::CpalDriver;
pub use loopback::LoopbackDriver;
pub use null::NullDriver;

use crate::config::DeviceDesc;
use crate::context::ContextState;
use crate::error::Result;
use std::sync::{Mutex, Weak};

/// A backend that can enumerate and open output endpoints.
pub trait Driver {
    fn name(&self) -> &str;

    /// Names accepted by [`Driver::open`].
    fn list_devices(&self) -> Result<Vec<String>>;

    fn default_device(&self) -> Result<String>;

    /// Opens `name`, or the default endpoint for `None`.
    ///
    /// # Errors
    ///
    /// Returns [`SonanceError::DeviceOpen`](crate::SonanceError::DeviceOpen) if
    /// the backend rejects the name or the configuration.
    fn open(&self, name: Option<&str>, desc: &DeviceDesc) -> Result<Box<dyn Endpoint>>;
}

/// An opened output endpoint.
pub trait Endpoint {
    fn name(&self) -> &str;

    fn sample_rate(&self) -> u32;

    fn channels(&self) -> u16;

    /// Begins pulling blocks from `renderer`. Replaces any previous renderer.
    fn start(&mut self, renderer: Renderer) -> Result<()>;

    /// Stops pulling. Idempotent.
    fn stop(&mut self);

    /// Loopback endpoints are rendered by the caller instead of a clock.
    fn is_loopback(&self) -> bool {
        false
    }
}

/// Pull handle into a context's render state.
///
/// Held by endpoint threads. Rendering never waits for the control thread:
/// when the state is locked, or the context has been dropped, the block is
/// filled with silence.
#[derive(Clone)]
pub struct Renderer {
    state: Weak<Mutex<ContextState>>,
}

impl Renderer {
    pub(crate) fn new(state: Weak<Mutex<ContextState>>) -> Self {
        Self { state }
    }

    /// Fills `out` (interleaved, endpoint channel count) and returns the
    /// number of frames written.
    pub fn render(&self, out: &mut [f32]) -> usize {
        out.fill(0.0);
        let Some(state) = self.state.upgrade() else {
            return 0;
        };
        let Ok(mut state) = state.try_lock() else {
            log::warn!("Context state busy, rendering {} samples of silence", out.len());
            return 0;
        };
        state.render(out)
    }
}
