/// Configuration descriptor for opening a device and its context
#[derive(Debug, Clone)]
pub struct DeviceDesc {
    /// Output mixing rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved output channels (1 or 2)
    pub channels: u16,
    /// Frames rendered per driver block. Also determines the reported refresh rate.
    pub block_size: usize,
    /// Maximum number of live sources per context
    pub max_sources: usize,
    /// Maximum number of live buffers per context
    pub max_buffers: usize,
    /// Renderer events held until polled; later events are dropped
    pub max_events: usize,
}

impl Default for DeviceDesc {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            block_size: 1024,
            max_sources: 64,
            max_buffers: 4096,
            max_events: 1024,
        }
    }
}

impl DeviceDesc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    pub fn block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    pub fn max_sources(mut self, max: usize) -> Self {
        self.max_sources = max;
        self
    }

    pub fn max_buffers(mut self, max: usize) -> Self {
        self.max_buffers = max;
        self
    }

    pub fn max_events(mut self, max: usize) -> Self {
        self.max_events = max;
        self
    }

    /// Share of `max_sources` advertised for stereo playback. The rest is
    /// advertised as mono; the context itself does not tell them apart.
    pub fn stereo_sources(&self) -> usize {
        self.max_sources / 4
    }

    pub fn mono_sources(&self) -> usize {
        self.max_sources - self.stereo_sources()
    }

    /// Blocks per second the driver renders at.
    pub fn refresh_rate(&self) -> u32 {
        (self.sample_rate as usize / self.block_size.max(1)).max(1) as u32
    }

    pub(crate) fn validate(&self) -> crate::error::Result<()> {
        if self.sample_rate == 0 {
            return Err(crate::error::SonanceError::InvalidValue(
                "sample_rate must be non-zero".into(),
            ));
        }
        if !(1..=2).contains(&self.channels) {
            return Err(crate::error::SonanceError::InvalidValue(format!(
                "unsupported output channel count {}",
                self.channels
            )));
        }
        if self.block_size == 0 {
            return Err(crate::error::SonanceError::InvalidValue(
                "block_size must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
