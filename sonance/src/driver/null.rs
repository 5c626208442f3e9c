use super::{Driver, Endpoint, Renderer};
use crate::config::DeviceDesc;
use crate::error::{Result, SonanceError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const NULL_DEVICE: &str = "No Output";

/// Driver that renders in real time on a background thread and discards
/// the result. Useful where no audio hardware is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDriver;

impl Driver for NullDriver {
    fn name(&self) -> &str {
        "null"
    }

    fn list_devices(&self) -> Result<Vec<String>> {
        Ok(vec![NULL_DEVICE.to_string()])
    }

    fn default_device(&self) -> Result<String> {
        Ok(NULL_DEVICE.to_string())
    }

    fn open(&self, name: Option<&str>, desc: &DeviceDesc) -> Result<Box<dyn Endpoint>> {
        if let Some(name) = name {
            if name != NULL_DEVICE {
                return Err(SonanceError::DeviceOpen(format!(
                    "null driver has no device named '{name}'"
                )));
            }
        }
        Ok(Box::new(NullEndpoint {
            desc: desc.clone(),
            is_running: Arc::new(AtomicBool::new(false)),
            thread: None,
        }))
    }
}

struct NullEndpoint {
    desc: DeviceDesc,
    is_running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Endpoint for NullEndpoint {
    fn name(&self) -> &str {
        NULL_DEVICE
    }

    fn sample_rate(&self) -> u32 {
        self.desc.sample_rate
    }

    fn channels(&self) -> u16 {
        self.desc.channels
    }

    fn start(&mut self, renderer: Renderer) -> Result<()> {
        self.stop();

        let is_running = self.is_running.clone();
        let block_frames = self.desc.block_size;
        let channels = self.desc.channels as usize;
        let block_duration =
            Duration::from_secs_f64(block_frames as f64 / self.desc.sample_rate as f64);

        is_running.store(true, Ordering::Release);
        let thread = std::thread::Builder::new()
            .name("sonance-null-output".into())
            .spawn(move || {
                let mut block = vec![0.0f32; block_frames * channels];
                let mut deadline = Instant::now();
                while is_running.load(Ordering::Acquire) {
                    renderer.render(&mut block);
                    deadline += block_duration;
                    if let Some(wait) = deadline.checked_duration_since(Instant::now()) {
                        std::thread::sleep(wait);
                    }
                }
            })
            .map_err(|e| SonanceError::DeviceOpen(format!("Failed to spawn render thread: {e}")))?;

        self.thread = Some(thread);
        log::debug!("Null output started ({} frame blocks)", block_frames);
        Ok(())
    }

    fn stop(&mut self) {
        self.is_running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Null output render thread panicked");
            }
        }
    }
}

impl Drop for NullEndpoint {
    fn drop(&mut self) {
        self.stop();
    }
}
