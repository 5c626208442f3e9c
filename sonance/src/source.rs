//! Source state machine and buffer queue.
//!
//! A source is either unattached, bound to a single static buffer, or a
//! streaming queue. The first attachment fixes the mode until the source is
//! cleared again, and the render cursor splits the queue into processed
//! buffers (before the cursor) and pending ones (at or after it).

use crate::arena::typed_id;
use crate::buffer::{BufferId, BufferStore};
use crate::error::{Result, SonanceError};
use crate::math::Vec3;

typed_id!(
    /// Handle to a source owned by a [`Context`](crate::Context).
    SourceId
);

/// Playback state of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// Never played, or rewound
    Initial,
    Playing,
    /// Playing halted, cursor kept
    Paused,
    /// Halted; every queued buffer counts as processed
    Stopped,
}

/// Attachment mode as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    Undetermined,
    Static,
    Streaming,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SourceMode {
    Undetermined,
    Static(BufferId),
    Streaming(Vec<BufferId>),
}

/// Scalar and vector properties of a source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceProps {
    /// Linear gain, 1.0 is unattenuated
    pub gain: f32,
    /// Playback rate multiplier, must be positive
    pub pitch: f32,
    pub position: Vec3,
    pub velocity: Vec3,
    pub looping: bool,
}

impl Default for SourceProps {
    fn default() -> Self {
        Self {
            gain: 1.0,
            pitch: 1.0,
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            looping: false,
        }
    }
}

impl SourceProps {
    pub(crate) fn validate(&self) -> Result<()> {
        if !self.gain.is_finite() || self.gain < 0.0 {
            return Err(SonanceError::InvalidValue(format!(
                "gain {} must be finite and non-negative",
                self.gain
            )));
        }
        if !self.pitch.is_finite() || self.pitch <= 0.0 {
            return Err(SonanceError::InvalidValue(format!(
                "pitch {} must be finite and positive",
                self.pitch
            )));
        }
        if !self.position.is_finite() || !self.velocity.is_finite() {
            return Err(SonanceError::InvalidValue(
                "position and velocity must be finite".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct Source {
    pub id: SourceId,
    pub props: SourceProps,
    pub state: SourceState,
    pub mode: SourceMode,
    /// Index of the buffer being rendered; buffers before it are processed.
    pub current: usize,
    /// Fractional frame position inside the current buffer
    pub offset: f64,
}

impl Source {
    pub fn new(id: SourceId) -> Self {
        Self {
            id,
            props: SourceProps::default(),
            state: SourceState::Initial,
            mode: SourceMode::Undetermined,
            current: 0,
            offset: 0.0,
        }
    }

    pub fn queue(&self) -> &[BufferId] {
        match &self.mode {
            SourceMode::Undetermined => &[],
            SourceMode::Static(buffer) => std::slice::from_ref(buffer),
            SourceMode::Streaming(queue) => queue,
        }
    }

    pub fn source_type(&self) -> SourceType {
        match self.mode {
            SourceMode::Undetermined => SourceType::Undetermined,
            SourceMode::Static(_) => SourceType::Static,
            SourceMode::Streaming(_) => SourceType::Streaming,
        }
    }

    pub fn buffers_queued(&self) -> usize {
        self.queue().len()
    }

    pub fn buffers_processed(&self) -> usize {
        let active = matches!(self.state, SourceState::Playing | SourceState::Paused);
        if active && self.props.looping {
            0
        } else {
            self.current.min(self.buffers_queued())
        }
    }

    /// Frames from the start of the queue to the render cursor.
    pub fn sample_offset(&self, store: &BufferStore) -> usize {
        if !matches!(self.state, SourceState::Playing | SourceState::Paused) {
            return 0;
        }
        let before: usize = self.queue()[..self.current]
            .iter()
            .filter_map(|id| store.get(*id).ok())
            .map(|entry| entry.frames())
            .sum();
        before + self.offset as usize
    }

    pub fn play(&mut self) {
        if self.queue().is_empty() {
            log::debug!("{} has nothing queued, play ignored", self.id);
            return;
        }

        match self.state {
            SourceState::Playing => {
                log::debug!("{} restarting buffer {}", self.id, self.current);
                self.offset = 0.0;
            }
            SourceState::Paused => {
                log::debug!("{} resuming at buffer {}", self.id, self.current);
            }
            SourceState::Initial | SourceState::Stopped => {
                log::debug!("{} playing from queue head", self.id);
                self.current = 0;
                self.offset = 0.0;
            }
        }
        self.state = SourceState::Playing;
    }

    pub fn pause(&mut self) {
        if self.state == SourceState::Playing {
            log::debug!("{} paused at buffer {}", self.id, self.current);
            self.state = SourceState::Paused;
        }
    }

    pub fn stop(&mut self) {
        log::debug!("{} stopped ({:?} -> Stopped)", self.id, self.state);
        self.state = SourceState::Stopped;
        self.current = self.buffers_queued();
        self.offset = 0.0;
    }

    pub fn rewind(&mut self) {
        log::debug!("{} rewound ({:?} -> Initial)", self.id, self.state);
        self.state = SourceState::Initial;
        self.current = 0;
        self.offset = 0.0;
    }

    /// Appends `buffers` to the queue. Nothing is queued unless every
    /// buffer is valid and matches the format already queued.
    pub fn queue_buffers(&mut self, buffers: &[BufferId], store: &mut BufferStore) -> Result<()> {
        if let SourceMode::Static(buffer) = self.mode {
            return Err(SonanceError::InvalidOperation(format!(
                "{} has static {} attached and cannot queue",
                self.id, buffer
            )));
        }

        let mut reference = None;
        for id in self.queue().iter().chain(buffers) {
            let entry = store.get(*id)?;
            let Some(data) = &entry.data else { continue };
            let layout = (data.format, data.frequency);
            match reference {
                None => reference = Some(layout),
                Some(expected) if expected != layout => {
                    return Err(SonanceError::InvalidOperation(format!(
                        "{} is {:?} at {} Hz but {} queues {:?} at {} Hz",
                        id, layout.0, layout.1, self.id, expected.0, expected.1
                    )));
                }
                Some(_) => {}
            }
        }

        for id in buffers {
            store.acquire(*id)?;
        }

        match &mut self.mode {
            SourceMode::Streaming(queue) => queue.extend_from_slice(buffers),
            mode => {
                if buffers.is_empty() {
                    return Ok(());
                }
                log::debug!("{} switched to streaming", self.id);
                *mode = SourceMode::Streaming(buffers.to_vec());
            }
        }
        log::debug!(
            "{} queued {} buffer(s), {} total",
            self.id,
            buffers.len(),
            self.buffers_queued()
        );
        Ok(())
    }

    /// Removes `count` processed buffers from the head, all or nothing.
    pub fn unqueue_buffers(
        &mut self,
        count: usize,
        store: &mut BufferStore,
    ) -> Result<Vec<BufferId>> {
        let processed = self.buffers_processed();
        let id = self.id;
        let queue = match &mut self.mode {
            SourceMode::Static(_) => {
                return Err(SonanceError::InvalidOperation(format!(
                    "{id} is static; only streaming sources unqueue"
                )));
            }
            SourceMode::Undetermined if count == 0 => return Ok(Vec::new()),
            SourceMode::Undetermined => {
                return Err(SonanceError::InvalidOperation(format!(
                    "{id} has no queued buffers"
                )));
            }
            SourceMode::Streaming(queue) => queue,
        };
        if count > processed {
            return Err(SonanceError::InvalidOperation(format!(
                "{id} has {processed} processed buffer(s), cannot unqueue {count}"
            )));
        }

        let removed: Vec<BufferId> = queue.drain(..count).collect();
        let emptied = queue.is_empty();
        for buffer in &removed {
            store.release(*buffer);
        }
        self.current -= count;
        if emptied {
            log::debug!("{} queue cleared, mode reset", self.id);
            self.mode = SourceMode::Undetermined;
        }
        log::debug!(
            "{} unqueued {} buffer(s), {} remain",
            self.id,
            removed.len(),
            self.buffers_queued()
        );
        Ok(removed)
    }

    /// Binds a single static buffer, or detaches everything with `None`.
    pub fn set_buffer(&mut self, buffer: Option<BufferId>, store: &mut BufferStore) -> Result<()> {
        if matches!(self.state, SourceState::Playing | SourceState::Paused) {
            return Err(SonanceError::InvalidOperation(format!(
                "{} must be stopped or initial to change its buffer",
                self.id
            )));
        }
        if let (SourceMode::Streaming(_), Some(buffer)) = (&self.mode, buffer) {
            return Err(SonanceError::InvalidOperation(format!(
                "{} is streaming and cannot take static {}",
                self.id, buffer
            )));
        }

        if let Some(buffer) = buffer {
            store.acquire(buffer)?;
        }
        self.release_all(store);
        self.mode = match buffer {
            Some(buffer) => SourceMode::Static(buffer),
            None => SourceMode::Undetermined,
        };
        self.state = SourceState::Initial;
        self.current = 0;
        self.offset = 0.0;
        log::debug!("{} buffer set to {:?}", self.id, buffer);
        Ok(())
    }

    /// Drops every buffer reference this source holds.
    pub fn release_all(&mut self, store: &mut BufferStore) {
        for buffer in self.queue() {
            store.release(*buffer);
        }
        self.mode = SourceMode::Undetermined;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::buffer::SampleFormat;

    fn setup(buffers: usize) -> (Source, BufferStore, Vec<BufferId>) {
        let mut store = BufferStore::new(16);
        let ids = (0..buffers)
            .map(|_| {
                let id = store.create().unwrap();
                store
                    .set_data(id, SampleFormat::Mono16, &[0; 200], 44100)
                    .unwrap();
                id
            })
            .collect();
        let mut arena = Arena::default();
        let key = arena.insert(());
        (Source::new(SourceId(key)), store, ids)
    }

    const ALL_STATES: [SourceState; 4] = [
        SourceState::Initial,
        SourceState::Playing,
        SourceState::Paused,
        SourceState::Stopped,
    ];

    /// Drives a source with a non-empty queue into `state`.
    fn enter(source: &mut Source, state: SourceState) {
        source.rewind();
        match state {
            SourceState::Initial => {}
            SourceState::Playing => source.play(),
            SourceState::Paused => {
                source.play();
                source.pause();
            }
            SourceState::Stopped => source.stop(),
        }
        assert_eq!(source.state, state);
    }

    #[test]
    fn test_stop_reaches_stopped_from_every_state() {
        let (mut source, mut store, ids) = setup(2);
        source.queue_buffers(&ids, &mut store).unwrap();

        for state in ALL_STATES {
            enter(&mut source, state);
            source.stop();
            assert_eq!(source.state, SourceState::Stopped, "stop from {:?}", state);
            assert_eq!(source.buffers_processed(), 2);
            assert_eq!(source.queue(), ids.as_slice());
        }
    }

    #[test]
    fn test_rewind_reaches_initial_from_every_state() {
        let (mut source, mut store, ids) = setup(3);
        source.queue_buffers(&ids, &mut store).unwrap();

        for state in ALL_STATES {
            enter(&mut source, state);
            source.current = 1;
            source.offset = 7.0;
            source.rewind();
            assert_eq!(source.state, SourceState::Initial, "rewind from {:?}", state);
            assert_eq!(source.buffers_processed(), 0);
            assert_eq!(source.offset, 0.0);
            assert_eq!(source.queue(), ids.as_slice());
        }
    }

    #[test]
    fn test_play_and_pause_transitions() {
        let (mut source, mut store, ids) = setup(1);
        source.play();
        assert_eq!(source.state, SourceState::Initial);

        source.pause();
        assert_eq!(source.state, SourceState::Initial);

        source.queue_buffers(&ids, &mut store).unwrap();
        source.play();
        assert_eq!(source.state, SourceState::Playing);
        source.pause();
        source.play();
        assert_eq!(source.state, SourceState::Playing);
        source.stop();
        source.play();
        assert_eq!(source.state, SourceState::Playing);
        assert_eq!(source.buffers_processed(), 0);
    }

    #[test]
    fn test_replay_restarts_current_buffer() {
        let (mut source, mut store, ids) = setup(3);
        source.queue_buffers(&ids, &mut store).unwrap();
        source.play();
        source.current = 1;
        source.offset = 42.0;

        source.play();
        assert_eq!(source.current, 1);
        assert_eq!(source.offset, 0.0);
        assert_eq!(source.buffers_processed(), 1);
    }

    #[test]
    fn test_rewind_keeps_queue() {
        let (mut source, mut store, ids) = setup(3);
        source.queue_buffers(&ids, &mut store).unwrap();
        source.play();
        source.stop();
        assert_eq!(source.buffers_processed(), 3);

        source.rewind();
        assert_eq!(source.state, SourceState::Initial);
        assert_eq!(source.buffers_processed(), 0);
        assert_eq!(source.queue(), ids.as_slice());
    }

    #[test]
    fn test_unqueue_is_all_or_nothing() {
        let (mut source, mut store, ids) = setup(3);
        source.queue_buffers(&ids, &mut store).unwrap();
        source.play();
        source.current = 1;

        let before = source.queue().to_vec();
        let err = source.unqueue_buffers(2, &mut store);
        assert!(matches!(err, Err(SonanceError::InvalidOperation(_))));
        assert_eq!(source.queue(), before.as_slice());
        assert_eq!(store.get(ids[0]).unwrap().refs, 1);

        assert_eq!(source.unqueue_buffers(1, &mut store).unwrap(), vec![ids[0]]);
        assert_eq!(store.get(ids[0]).unwrap().refs, 0);
        assert_eq!(source.buffers_processed(), 0);
        assert_eq!(source.queue(), &ids[1..]);
    }

    #[test]
    fn test_full_unqueue_resets_mode() {
        let (mut source, mut store, ids) = setup(2);
        source.queue_buffers(&ids, &mut store).unwrap();
        source.stop();
        source.unqueue_buffers(2, &mut store).unwrap();
        assert_eq!(source.source_type(), SourceType::Undetermined);
        assert_eq!(source.buffers_processed(), 0);

        source.set_buffer(Some(ids[0]), &mut store).unwrap();
        assert_eq!(source.source_type(), SourceType::Static);
    }

    #[test]
    fn test_modes_are_exclusive() {
        let (mut source, mut store, ids) = setup(2);
        source.set_buffer(Some(ids[0]), &mut store).unwrap();
        assert!(matches!(
            source.queue_buffers(&ids[1..], &mut store),
            Err(SonanceError::InvalidOperation(_))
        ));
        assert!(matches!(
            source.unqueue_buffers(1, &mut store),
            Err(SonanceError::InvalidOperation(_))
        ));
        assert_eq!(store.get(ids[1]).unwrap().refs, 0);

        source.set_buffer(None, &mut store).unwrap();
        assert_eq!(store.get(ids[0]).unwrap().refs, 0);
        source.queue_buffers(&ids[1..], &mut store).unwrap();
        assert!(matches!(
            source.set_buffer(Some(ids[0]), &mut store),
            Err(SonanceError::InvalidOperation(_))
        ));
        assert_eq!(source.source_type(), SourceType::Streaming);
    }

    #[test]
    fn test_queue_rejects_mismatched_formats() {
        let (mut source, mut store, ids) = setup(1);
        let stereo = store.create().unwrap();
        store
            .set_data(stereo, SampleFormat::Stereo16, &[0; 8], 44100)
            .unwrap();

        let err = source.queue_buffers(&[ids[0], stereo], &mut store);
        assert!(matches!(err, Err(SonanceError::InvalidOperation(_))));
        assert_eq!(source.buffers_queued(), 0);
        assert_eq!(store.get(ids[0]).unwrap().refs, 0);
    }

    #[test]
    fn test_looping_source_reports_nothing_processed() {
        let (mut source, mut store, ids) = setup(2);
        source.queue_buffers(&ids, &mut store).unwrap();
        source.props.looping = true;
        source.play();
        source.current = 1;
        assert_eq!(source.buffers_processed(), 0);
    }

    #[test]
    fn test_props_validation() {
        let mut props = SourceProps::default();
        assert!(props.validate().is_ok());
        props.pitch = 0.0;
        assert!(matches!(props.validate(), Err(SonanceError::InvalidValue(_))));
        props.pitch = 1.0;
        props.gain = -1.0;
        assert!(props.validate().is_err());
        props.gain = 1.0;
        props.position = Vec3::new(f32::NAN, 0.0, 0.0);
        assert!(props.validate().is_err());
    }
}
