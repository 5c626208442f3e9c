//! # Sonance
//!
//! The device, buffer and source resource model underneath a 3D sound API.
//!
//! Sonance follows the OpenAL object model: a [`Device`] is opened through a
//! [`Driver`](driver::Driver), a [`Context`] on that device owns PCM buffers
//! and playback sources, and sources either play one static buffer or stream
//! through a queue of buffers that the caller refills as they finish.
//!
//! ## Quick Start
//!
//! ```no_run
//! use sonance::*;
//!
//! let mut device = Device::open(&driver::NullDriver, None)?;
//! let mut context = device.create_context()?;
//!
//! // Three buffers of silence, one second each
//! let buffers = context.create_buffers(3)?;
//! for buffer in &buffers {
//!     context.set_buffer_data(*buffer, SampleFormat::Mono16, &vec![0; 88200], 44100)?;
//! }
//!
//! let source = context.create_source()?;
//! context.queue_buffers(source, &buffers)?;
//! context.play(source)?;
//!
//! // Refill the queue as buffers finish
//! while context.buffers_processed(source)? == 0 {
//!     std::thread::sleep(std::time::Duration::from_millis(10));
//! }
//! let done = context.unqueue_buffers(source, 1)?;
//! context.set_buffer_data(done[0], SampleFormat::Mono16, &vec![0; 88200], 44100)?;
//! context.queue_buffers(source, &done)?;
//! # Ok::<(), SonanceError>(())
//! ```
//!
//! ## Key Components
//!
//! - **[`Device`]**: Opens and closes an output endpoint, reports its capabilities
//! - **[`Context`]**: Owns buffers, sources and the [`Listener`]; every operation lives here
//! - **[`SourceState`]**: The `Initial → Playing ⇄ Paused → Stopped` state machine
//! - **[`SourceEvent`]**: Progress reports from the renderer, drained by polling
//! - **[`driver`]**: cpal, null and loopback backends behind the [`Driver`](driver::Driver) trait
//!
//! ## Rules that keep streaming correct
//!
//! - A buffer cannot be refilled or deleted while any source holds it.
//! - Only processed buffers at the head of a queue can be unqueued, and an
//!   unqueue request that asks for more than that removes nothing.
//! - A source is static or streaming, never both, until it is cleared.
//!
//! ## Errors
//!
//! Every call returns a [`Result`](error::Result). Failures are also kept in a
//! sticky slot per device and per context, readable once through `get_error`.

mod arena;
pub mod buffer;
pub mod config;
pub mod context;
pub mod device;
pub mod driver;
pub mod error;
pub mod events;
pub mod listener;
pub mod math;
mod mixer;
pub mod source;

pub use buffer::{BufferId, BufferInfo, SampleFormat};
pub use config::DeviceDesc;
pub use context::Context;
pub use device::{Device, Version};
pub use error::{ErrorCode, HandleKind, SonanceError, error_string};
pub use events::SourceEvent;
pub use listener::Listener;
pub use math::{Orientation, Quat, Vec3};
pub use source::{SourceId, SourceProps, SourceState, SourceType};
