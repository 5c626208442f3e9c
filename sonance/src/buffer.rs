//! Buffer store: PCM payloads addressed by generation-checked ids.
//!
//! A buffer is borrowed by every source that has it attached or queued. The
//! store tracks those borrows as a reference count and refuses to mutate or
//! delete a buffer while the count is non-zero, so a source never renders
//! from bytes that change underneath it.

use crate::arena::{Arena, typed_id};
use crate::error::{HandleKind, Result, SonanceError};

typed_id!(
    /// Handle to a buffer owned by a [`Context`](crate::Context).
    BufferId
);

/// PCM sample layouts accepted by [`set_data`](crate::Context::set_buffer_data).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    /// Unsigned 8-bit, silence at 128
    Mono8,
    /// Signed 16-bit little endian
    Mono16,
    Stereo8,
    Stereo16,
    /// 32-bit little endian float (`AL_EXT_FLOAT32`)
    MonoFloat32,
    StereoFloat32,
}

impl SampleFormat {
    pub fn channels(self) -> u16 {
        match self {
            Self::Mono8 | Self::Mono16 | Self::MonoFloat32 => 1,
            Self::Stereo8 | Self::Stereo16 | Self::StereoFloat32 => 2,
        }
    }

    pub fn bits(self) -> u16 {
        match self {
            Self::Mono8 | Self::Stereo8 => 8,
            Self::Mono16 | Self::Stereo16 => 16,
            Self::MonoFloat32 | Self::StereoFloat32 => 32,
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        self.bits() as usize / 8
    }

    /// Bytes per frame (one sample for every channel).
    pub fn frame_size(self) -> usize {
        self.bytes_per_sample() * self.channels() as usize
    }

    pub fn raw(self) -> i32 {
        match self {
            Self::Mono8 => 0x1100,
            Self::Mono16 => 0x1101,
            Self::Stereo8 => 0x1102,
            Self::Stereo16 => 0x1103,
            Self::MonoFloat32 => 0x10010,
            Self::StereoFloat32 => 0x10011,
        }
    }

    /// Decodes the sample at `offset` bytes as a float in `[-1, 1]`.
    fn decode(self, bytes: &[u8], offset: usize) -> f32 {
        match self.bits() {
            8 => (f32::from(bytes[offset]) - 128.0) / 128.0,
            16 => f32::from(i16::from_le_bytes([bytes[offset], bytes[offset + 1]])) / 32768.0,
            _ => f32::from_le_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ]),
        }
    }
}

impl TryFrom<i32> for SampleFormat {
    type Error = SonanceError;

    fn try_from(raw: i32) -> Result<Self> {
        match raw {
            0x1100 => Ok(Self::Mono8),
            0x1101 => Ok(Self::Mono16),
            0x1102 => Ok(Self::Stereo8),
            0x1103 => Ok(Self::Stereo16),
            0x10010 => Ok(Self::MonoFloat32),
            0x10011 => Ok(Self::StereoFloat32),
            other => Err(SonanceError::InvalidEnum(format!(
                "unknown sample format {other:#x}"
            ))),
        }
    }
}

/// Snapshot of a buffer's properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferInfo {
    /// `None` until the buffer has been filled
    pub format: Option<SampleFormat>,
    pub frequency: u32,
    /// Payload size in bytes
    pub size: usize,
}

impl BufferInfo {
    pub fn channels(&self) -> u16 {
        self.format.map_or(0, SampleFormat::channels)
    }

    pub fn bits(&self) -> u16 {
        self.format.map_or(0, SampleFormat::bits)
    }

    pub fn frames(&self) -> usize {
        self.format.map_or(0, |format| self.size / format.frame_size())
    }
}

#[derive(Debug)]
pub(crate) struct PcmData {
    pub format: SampleFormat,
    pub frequency: u32,
    pub bytes: Vec<u8>,
}

impl PcmData {
    pub fn frames(&self) -> usize {
        self.bytes.len() / self.format.frame_size()
    }

    /// Sample of `channel` in `frame`. Mono payloads answer every channel.
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        let channels = self.format.channels() as usize;
        let channel = channel.min(channels - 1);
        let offset = frame * self.format.frame_size() + channel * self.format.bytes_per_sample();
        self.format.decode(&self.bytes, offset)
    }
}

#[derive(Debug, Default)]
pub(crate) struct BufferEntry {
    pub data: Option<PcmData>,
    pub refs: usize,
}

impl BufferEntry {
    pub fn frames(&self) -> usize {
        self.data.as_ref().map_or(0, PcmData::frames)
    }
}

#[derive(Debug)]
pub(crate) struct BufferStore {
    buffers: Arena<BufferEntry>,
    capacity: usize,
}

impl BufferStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: Arena::default(),
            capacity,
        }
    }

    pub fn create(&mut self) -> Result<BufferId> {
        if self.buffers.len() >= self.capacity {
            return Err(SonanceError::OutOfMemory(format!(
                "buffer limit of {} reached",
                self.capacity
            )));
        }
        let id = BufferId(self.buffers.insert(BufferEntry::default()));
        log::debug!("Created {}", id);
        Ok(id)
    }

    pub fn get(&self, id: BufferId) -> Result<&BufferEntry> {
        self.buffers
            .get(id.0)
            .ok_or_else(|| SonanceError::invalid_handle(HandleKind::Buffer, id))
    }

    fn get_mut(&mut self, id: BufferId) -> Result<&mut BufferEntry> {
        self.buffers
            .get_mut(id.0)
            .ok_or_else(|| SonanceError::invalid_handle(HandleKind::Buffer, id))
    }

    pub fn contains(&self, id: BufferId) -> bool {
        self.buffers.contains(id.0)
    }

    pub fn set_data(
        &mut self,
        id: BufferId,
        format: SampleFormat,
        bytes: &[u8],
        frequency: u32,
    ) -> Result<()> {
        let entry = self.get_mut(id)?;
        if entry.refs > 0 {
            return Err(SonanceError::InvalidOperation(format!(
                "{} is attached to {} source(s) and cannot be modified",
                id, entry.refs
            )));
        }
        if frequency == 0 {
            return Err(SonanceError::InvalidValue(
                "buffer frequency must be non-zero".into(),
            ));
        }
        if bytes.len() % format.frame_size() != 0 {
            return Err(SonanceError::InvalidValue(format!(
                "{} bytes is not a whole number of {:?} frames",
                bytes.len(),
                format
            )));
        }

        entry.data = Some(PcmData {
            format,
            frequency,
            bytes: bytes.to_vec(),
        });
        log::debug!(
            "{} filled: {:?}, {} Hz, {} bytes",
            id,
            format,
            frequency,
            bytes.len()
        );
        Ok(())
    }

    pub fn delete(&mut self, id: BufferId) -> Result<()> {
        let entry = self.get(id)?;
        if entry.refs > 0 {
            return Err(SonanceError::InvalidOperation(format!(
                "{} is still attached to {} source(s)",
                id, entry.refs
            )));
        }
        self.buffers.remove(id.0);
        log::debug!("Deleted {}", id);
        Ok(())
    }

    pub fn query(&self, id: BufferId) -> Result<BufferInfo> {
        let entry = self.get(id)?;
        Ok(match &entry.data {
            Some(data) => BufferInfo {
                format: Some(data.format),
                frequency: data.frequency,
                size: data.bytes.len(),
            },
            None => BufferInfo {
                format: None,
                frequency: 0,
                size: 0,
            },
        })
    }

    pub fn acquire(&mut self, id: BufferId) -> Result<()> {
        self.get_mut(id)?.refs += 1;
        Ok(())
    }

    pub fn release(&mut self, id: BufferId) {
        match self.buffers.get_mut(id.0) {
            Some(entry) => entry.refs = entry.refs.saturating_sub(1),
            None => log::warn!("Released {} which is no longer in the store", id),
        }
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mono16(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_set_data_then_query() {
        let mut store = BufferStore::new(8);
        let id = store.create().unwrap();
        assert_eq!(store.query(id).unwrap().format, None);

        let samples = vec![0i16; 441];
        store
            .set_data(id, SampleFormat::Mono16, &mono16(&samples), 44100)
            .unwrap();

        let info = store.query(id).unwrap();
        assert_eq!(info.format, Some(SampleFormat::Mono16));
        assert_eq!(info.frequency, 44100);
        assert_eq!(info.size, 441 * 2);
        assert_eq!(info.frames(), 441);
        assert_eq!(info.bits(), 16);
        assert_eq!(info.channels(), 1);
    }

    #[test]
    fn test_referenced_buffer_is_immutable() {
        let mut store = BufferStore::new(8);
        let id = store.create().unwrap();
        store.set_data(id, SampleFormat::Mono8, &[128; 4], 8000).unwrap();
        store.acquire(id).unwrap();

        let err = store.set_data(id, SampleFormat::Mono8, &[0; 8], 8000);
        assert!(matches!(err, Err(SonanceError::InvalidOperation(_))));
        assert!(matches!(store.delete(id), Err(SonanceError::InvalidOperation(_))));
        assert_eq!(store.query(id).unwrap().size, 4);

        store.release(id);
        store.set_data(id, SampleFormat::Mono8, &[0; 8], 8000).unwrap();
        assert_eq!(store.query(id).unwrap().size, 8);
        store.delete(id).unwrap();
        assert!(matches!(
            store.query(id),
            Err(SonanceError::InvalidHandle { kind: HandleKind::Buffer, .. })
        ));
    }

    #[test]
    fn test_malformed_payloads_are_rejected() {
        let mut store = BufferStore::new(8);
        let id = store.create().unwrap();
        assert!(matches!(
            store.set_data(id, SampleFormat::Stereo16, &[0; 6], 44100),
            Err(SonanceError::InvalidValue(_))
        ));
        assert!(matches!(
            store.set_data(id, SampleFormat::Mono16, &[0; 4], 0),
            Err(SonanceError::InvalidValue(_))
        ));
        assert!(matches!(
            SampleFormat::try_from(0x1234),
            Err(SonanceError::InvalidEnum(_))
        ));
        assert_eq!(SampleFormat::try_from(0x1103).unwrap(), SampleFormat::Stereo16);
    }

    #[test]
    fn test_capacity_limit() {
        let mut store = BufferStore::new(1);
        store.create().unwrap();
        assert!(matches!(store.create(), Err(SonanceError::OutOfMemory(_))));
    }

    #[test]
    fn test_sample_decoding() {
        let data = PcmData {
            format: SampleFormat::Stereo16,
            frequency: 44100,
            bytes: mono16(&[16384, -32768]),
        };
        assert_eq!(data.frames(), 1);
        assert_eq!(data.sample(0, 0), 0.5);
        assert_eq!(data.sample(0, 1), -1.0);

        let mono8 = PcmData {
            format: SampleFormat::Mono8,
            frequency: 8000,
            bytes: vec![128, 192],
        };
        assert_eq!(mono8.sample(1, 1), 0.5);
    }
}
