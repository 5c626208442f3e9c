use super::{Driver, Endpoint, Renderer};
use crate::config::DeviceDesc;
use crate::error::{Result, SonanceError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};

/// Driver backed by the platform's default cpal host.
pub struct CpalDriver {
    host: cpal::Host,
}

impl CpalDriver {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }
}

impl Default for CpalDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for CpalDriver {
    fn name(&self) -> &str {
        self.host.id().name()
    }

    fn list_devices(&self) -> Result<Vec<String>> {
        let devices = self.host.output_devices().map_err(|e| {
            SonanceError::DeviceOpen(format!("Failed to enumerate output devices: {}", e))
        })?;
        Ok(devices.filter_map(|device| device.name().ok()).collect())
    }

    fn default_device(&self) -> Result<String> {
        let device = self.host.default_output_device().ok_or_else(|| {
            SonanceError::DeviceOpen("No default output device available".into())
        })?;
        device
            .name()
            .map_err(|e| SonanceError::DeviceOpen(format!("Failed to read device name: {}", e)))
    }

    fn open(&self, name: Option<&str>, desc: &DeviceDesc) -> Result<Box<dyn Endpoint>> {
        let device = match name {
            None => self.host.default_output_device().ok_or_else(|| {
                SonanceError::DeviceOpen("No default output device available".into())
            })?,
            Some(name) => self
                .host
                .output_devices()
                .map_err(|e| {
                    SonanceError::DeviceOpen(format!("Failed to enumerate output devices: {}", e))
                })?
                .find(|device| device.name().is_ok_and(|n| n == name))
                .ok_or_else(|| SonanceError::DeviceOpen(format!("No output device named '{name}'")))?,
        };

        let name = device
            .name()
            .map_err(|e| SonanceError::DeviceOpen(format!("Failed to read device name: {}", e)))?;
        let sample_format = device
            .default_output_config()
            .map_err(|e| SonanceError::DeviceOpen(format!("Failed to get default config: {}", e)))?
            .sample_format();

        Ok(Box::new(CpalEndpoint {
            name,
            device,
            sample_format,
            desc: desc.clone(),
            stream: None,
        }))
    }
}

struct CpalEndpoint {
    name: String,
    device: cpal::Device,
    sample_format: cpal::SampleFormat,
    desc: DeviceDesc,
    stream: Option<cpal::Stream>,
}

impl CpalEndpoint {
    fn create_stream<T>(&self, config: &cpal::StreamConfig, renderer: Renderer) -> Result<cpal::Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let mut mix = Vec::<f32>::new();

        self.device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    mix.resize(data.len(), 0.0);
                    renderer.render(&mut mix);
                    for (sample, value) in data.iter_mut().zip(&mix) {
                        *sample = T::from_sample(*value);
                    }
                },
                move |err| {
                    log::error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| SonanceError::DeviceOpen(format!("Failed to build stream: {}", e)))
    }
}

impl Endpoint for CpalEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn sample_rate(&self) -> u32 {
        self.desc.sample_rate
    }

    fn channels(&self) -> u16 {
        self.desc.channels
    }

    fn start(&mut self, renderer: Renderer) -> Result<()> {
        self.stop();

        let config = cpal::StreamConfig {
            channels: self.desc.channels,
            sample_rate: cpal::SampleRate(self.desc.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(self.desc.block_size as u32),
        };

        let stream = match self.sample_format {
            cpal::SampleFormat::F32 => self.create_stream::<f32>(&config, renderer)?,
            cpal::SampleFormat::I16 => self.create_stream::<i16>(&config, renderer)?,
            cpal::SampleFormat::U16 => self.create_stream::<u16>(&config, renderer)?,
            other => {
                return Err(SonanceError::DeviceOpen(format!(
                    "Unsupported device sample format {:?}",
                    other
                )));
            }
        };

        stream
            .play()
            .map_err(|e| SonanceError::DeviceOpen(format!("Failed to start stream: {}", e)))?;
        self.stream = Some(stream);
        log::info!("Output stream started on '{}'", self.name);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            log::info!("Output stream on '{}' stopped", self.name);
        }
    }
}
