//! Context API for Sonance

use crate::arena::Arena;
use crate::buffer::{BufferId, BufferInfo, BufferStore, SampleFormat};
use crate::config::DeviceDesc;
use crate::error::{ErrorCode, ErrorSlot, HandleKind, Result, SonanceError};
use crate::events::SourceEvent;
use crate::listener::Listener;
use crate::math::{Orientation, Vec3};
use crate::mixer::{OutputFormat, mix_sources};
use crate::source::{Source, SourceId, SourceProps, SourceState, SourceType};
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Everything the renderer needs, shared between the control thread and the
/// endpoint's render thread.
pub(crate) struct ContextState {
    pub(crate) buffers: BufferStore,
    pub(crate) sources: Arena<Source>,
    listener: Listener,
    format: OutputFormat,
    max_sources: usize,
    events: Sender<SourceEvent>,
}

impl ContextState {
    pub(crate) fn render(&mut self, out: &mut [f32]) -> usize {
        mix_sources(
            out,
            self.format,
            &mut self.sources,
            &self.buffers,
            self.listener.gain,
            &self.events,
        )
    }

    /// Number of buffers and sources still alive.
    pub(crate) fn live_objects(&self) -> usize {
        self.buffers.len() + self.sources.len()
    }

    fn source(&self, id: SourceId) -> Result<&Source> {
        self.sources
            .get(id.0)
            .ok_or_else(|| SonanceError::invalid_handle(HandleKind::Source, id))
    }

    fn source_mut(&mut self, id: SourceId) -> Result<&mut Source> {
        self.sources
            .get_mut(id.0)
            .ok_or_else(|| SonanceError::invalid_handle(HandleKind::Source, id))
    }

    /// Splits the borrow so a source can update buffer reference counts.
    fn source_and_store(&mut self, id: SourceId) -> Result<(&mut Source, &mut BufferStore)> {
        let source = self
            .sources
            .get_mut(id.0)
            .ok_or_else(|| SonanceError::invalid_handle(HandleKind::Source, id))?;
        Ok((source, &mut self.buffers))
    }

    fn check_sources(&self, ids: &[SourceId]) -> Result<()> {
        ids.iter().try_for_each(|id| self.source(*id).map(|_| ()))
    }
}

/// A rendering session on a [`Device`](crate::Device).
///
/// The context owns every buffer and source created through it and the
/// single [`Listener`]. All calls are synchronous; playback itself advances
/// on the device's render schedule and is observed by polling
/// ([`buffers_processed`](Self::buffers_processed), [`source_state`](Self::source_state),
/// [`poll_events`](Self::poll_events)).
///
/// A context is meant to be driven from one thread at a time: it is `Send`
/// but not `Sync`.
///
/// Every operation returns a typed [`Result`]. Failures are additionally
/// recorded in a sticky error slot read by [`get_error`](Self::get_error).
pub struct Context {
    state: Arc<Mutex<ContextState>>,
    device_open: Arc<AtomicBool>,
    loopback: bool,
    events: Receiver<SourceEvent>,
    errors: ErrorSlot,
}

impl Context {
    pub(crate) fn new(
        format: OutputFormat,
        desc: &DeviceDesc,
        device_open: Arc<AtomicBool>,
        loopback: bool,
    ) -> Self {
        // Bounded so a caller that never polls does not grow the queue;
        // the renderer drops events once it is full.
        let (sender, receiver) = crossbeam_channel::bounded(desc.max_events);
        let state = ContextState {
            buffers: BufferStore::new(desc.max_buffers),
            sources: Arena::default(),
            listener: Listener::default(),
            format,
            max_sources: desc.max_sources,
            events: sender,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            device_open,
            loopback,
            events: receiver,
            errors: ErrorSlot::default(),
        }
    }

    pub(crate) fn shared_state(&self) -> &Arc<Mutex<ContextState>> {
        &self.state
    }

    fn lock(&self) -> MutexGuard<'_, ContextState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` against the shared state after checking the device is still
    /// open, recording any failure in the sticky error slot.
    fn with_state<T>(&self, f: impl FnOnce(&mut ContextState) -> Result<T>) -> Result<T> {
        let result = if self.device_open.load(Ordering::Acquire) {
            f(&mut self.lock())
        } else {
            Err(SonanceError::invalid_handle(
                HandleKind::Context,
                "context of a closed device",
            ))
        };
        self.errors.track(result)
    }

    /// Returns and clears the last recorded error.
    pub fn get_error(&self) -> ErrorCode {
        self.errors.take()
    }

    pub fn sample_rate(&self) -> u32 {
        self.lock().format.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.lock().format.channels
    }

    /// Drains the events reported by the renderer since the last call.
    ///
    /// At most [`DeviceDesc::max_events`] are held between calls; events
    /// reported while the queue is full are lost.
    pub fn poll_events(&self) -> Vec<SourceEvent> {
        self.events.try_iter().collect()
    }

    /// Renders `out` (interleaved) on a loopback device.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` when the device renders on its own clock.
    pub fn render_samples(&mut self, out: &mut [f32]) -> Result<usize> {
        let loopback = self.loopback;
        self.with_state(|state| {
            if !loopback {
                return Err(SonanceError::InvalidOperation(
                    "render_samples requires a loopback device".into(),
                ));
            }
            let channels = state.format.channels as usize;
            if out.len() % channels != 0 {
                return Err(SonanceError::InvalidValue(format!(
                    "{} samples is not a whole number of {}-channel frames",
                    out.len(),
                    channels
                )));
            }
            out.fill(0.0);
            Ok(state.render(out))
        })
    }

    // Buffers

    pub fn create_buffer(&mut self) -> Result<BufferId> {
        self.with_state(|state| state.buffers.create())
    }

    /// Creates `count` buffers, or none if the store cannot hold them all.
    pub fn create_buffers(&mut self, count: usize) -> Result<Vec<BufferId>> {
        self.with_state(|state| {
            let mut created = Vec::with_capacity(count);
            for _ in 0..count {
                match state.buffers.create() {
                    Ok(id) => created.push(id),
                    Err(error) => {
                        for id in created {
                            state.buffers.delete(id)?;
                        }
                        return Err(error);
                    }
                }
            }
            Ok(created)
        })
    }

    /// Replaces the payload of `buffer`.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` while any source has the buffer attached or queued;
    /// `InvalidValue` for a zero frequency or a partial trailing frame.
    pub fn set_buffer_data(
        &mut self,
        buffer: BufferId,
        format: SampleFormat,
        data: &[u8],
        frequency: u32,
    ) -> Result<()> {
        self.with_state(|state| state.buffers.set_data(buffer, format, data, frequency))
    }

    /// Deletes `buffer`; fails with `InvalidOperation` while it is attached.
    pub fn delete_buffer(&mut self, buffer: BufferId) -> Result<()> {
        self.with_state(|state| state.buffers.delete(buffer))
    }

    pub fn buffer_info(&self, buffer: BufferId) -> Result<BufferInfo> {
        self.with_state(|state| state.buffers.query(buffer))
    }

    pub fn is_buffer(&self, buffer: BufferId) -> bool {
        self.lock().buffers.contains(buffer)
    }

    // Sources

    pub fn create_source(&mut self) -> Result<SourceId> {
        self.with_state(|state| {
            if state.sources.len() >= state.max_sources {
                return Err(SonanceError::OutOfMemory(format!(
                    "source limit of {} reached",
                    state.max_sources
                )));
            }
            let key = state.sources.insert(Source::new(SourceId::from_raw(0)));
            let id = SourceId(key);
            if let Some(source) = state.sources.get_mut(key) {
                source.id = id;
            }
            log::debug!("Created {}", id);
            Ok(id)
        })
    }

    /// Deletes `source`, stopping it and releasing every buffer it holds.
    pub fn delete_source(&mut self, source: SourceId) -> Result<()> {
        self.with_state(|state| {
            let (entry, store) = state.source_and_store(source)?;
            entry.release_all(store);
            state.sources.remove(source.0);
            log::debug!("Deleted {}", source);
            Ok(())
        })
    }

    pub fn is_source(&self, source: SourceId) -> bool {
        self.lock().sources.contains(source.0)
    }

    pub fn play(&mut self, source: SourceId) -> Result<()> {
        self.with_state(|state| {
            state.source_mut(source)?.play();
            Ok(())
        })
    }

    pub fn pause(&mut self, source: SourceId) -> Result<()> {
        self.with_state(|state| {
            state.source_mut(source)?.pause();
            Ok(())
        })
    }

    pub fn stop(&mut self, source: SourceId) -> Result<()> {
        self.with_state(|state| {
            state.source_mut(source)?.stop();
            Ok(())
        })
    }

    pub fn rewind(&mut self, source: SourceId) -> Result<()> {
        self.with_state(|state| {
            state.source_mut(source)?.rewind();
            Ok(())
        })
    }

    /// Plays every source in `sources` within one render block. Nothing
    /// changes if any id is invalid.
    pub fn play_many(&mut self, sources: &[SourceId]) -> Result<()> {
        self.for_each_source(sources, Source::play)
    }

    pub fn pause_many(&mut self, sources: &[SourceId]) -> Result<()> {
        self.for_each_source(sources, Source::pause)
    }

    pub fn stop_many(&mut self, sources: &[SourceId]) -> Result<()> {
        self.for_each_source(sources, Source::stop)
    }

    pub fn rewind_many(&mut self, sources: &[SourceId]) -> Result<()> {
        self.for_each_source(sources, Source::rewind)
    }

    fn for_each_source(&mut self, sources: &[SourceId], f: fn(&mut Source)) -> Result<()> {
        self.with_state(|state| {
            state.check_sources(sources)?;
            for id in sources {
                f(state.source_mut(*id)?);
            }
            Ok(())
        })
    }

    /// Appends `buffers` to the tail of the source's queue.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` if the source has a static buffer attached or a
    /// buffer's format or frequency differs from the queued ones. Nothing is
    /// queued on failure.
    pub fn queue_buffers(&mut self, source: SourceId, buffers: &[BufferId]) -> Result<()> {
        self.with_state(|state| {
            let (entry, store) = state.source_and_store(source)?;
            entry.queue_buffers(buffers, store)
        })
    }

    /// Removes `count` processed buffers from the head of the queue and
    /// returns them in playback order.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` if `count` exceeds [`buffers_processed`](Self::buffers_processed);
    /// the queue is left untouched.
    pub fn unqueue_buffers(&mut self, source: SourceId, count: usize) -> Result<Vec<BufferId>> {
        self.with_state(|state| {
            let (entry, store) = state.source_and_store(source)?;
            entry.unqueue_buffers(count, store)
        })
    }

    /// Attaches a single static buffer, or detaches everything with `None`.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` while the source is playing or paused, or when a
    /// buffer is given to a streaming source.
    pub fn set_buffer(&mut self, source: SourceId, buffer: Option<BufferId>) -> Result<()> {
        self.with_state(|state| {
            let (entry, store) = state.source_and_store(source)?;
            entry.set_buffer(buffer, store)
        })
    }

    pub fn buffers_queued(&self, source: SourceId) -> Result<usize> {
        self.with_state(|state| Ok(state.source(source)?.buffers_queued()))
    }

    pub fn buffers_processed(&self, source: SourceId) -> Result<usize> {
        self.with_state(|state| Ok(state.source(source)?.buffers_processed()))
    }

    /// Snapshot of the queue in playback order.
    pub fn queued_buffers(&self, source: SourceId) -> Result<Vec<BufferId>> {
        self.with_state(|state| Ok(state.source(source)?.queue().to_vec()))
    }

    pub fn source_state(&self, source: SourceId) -> Result<SourceState> {
        self.with_state(|state| Ok(state.source(source)?.state))
    }

    pub fn source_type(&self, source: SourceId) -> Result<SourceType> {
        self.with_state(|state| Ok(state.source(source)?.source_type()))
    }

    /// Playback position in frames from the head of the queue.
    pub fn sample_offset(&self, source: SourceId) -> Result<usize> {
        self.with_state(|state| {
            let entry = state.source(source)?;
            Ok(entry.sample_offset(&state.buffers))
        })
    }

    // Source properties

    pub fn source_props(&self, source: SourceId) -> Result<SourceProps> {
        self.with_state(|state| Ok(state.source(source)?.props))
    }

    /// Replaces all properties at once; nothing changes if any is invalid.
    pub fn set_source_props(&mut self, source: SourceId, props: SourceProps) -> Result<()> {
        self.update_props(source, |current| *current = props)
    }

    fn update_props(&mut self, source: SourceId, f: impl FnOnce(&mut SourceProps)) -> Result<()> {
        self.with_state(|state| {
            let entry = state.source_mut(source)?;
            let mut props = entry.props;
            f(&mut props);
            props.validate()?;
            entry.props = props;
            Ok(())
        })
    }

    pub fn gain(&self, source: SourceId) -> Result<f32> {
        self.source_props(source).map(|props| props.gain)
    }

    pub fn set_gain(&mut self, source: SourceId, gain: f32) -> Result<()> {
        self.update_props(source, |props| props.gain = gain)
    }

    pub fn pitch(&self, source: SourceId) -> Result<f32> {
        self.source_props(source).map(|props| props.pitch)
    }

    pub fn set_pitch(&mut self, source: SourceId, pitch: f32) -> Result<()> {
        self.update_props(source, |props| props.pitch = pitch)
    }

    pub fn position(&self, source: SourceId) -> Result<Vec3> {
        self.source_props(source).map(|props| props.position)
    }

    pub fn set_position(&mut self, source: SourceId, position: Vec3) -> Result<()> {
        self.update_props(source, |props| props.position = position)
    }

    pub fn velocity(&self, source: SourceId) -> Result<Vec3> {
        self.source_props(source).map(|props| props.velocity)
    }

    pub fn set_velocity(&mut self, source: SourceId, velocity: Vec3) -> Result<()> {
        self.update_props(source, |props| props.velocity = velocity)
    }

    pub fn looping(&self, source: SourceId) -> Result<bool> {
        self.source_props(source).map(|props| props.looping)
    }

    pub fn set_looping(&mut self, source: SourceId, looping: bool) -> Result<()> {
        self.update_props(source, |props| props.looping = looping)
    }

    // Listener

    pub fn listener(&self) -> Result<Listener> {
        self.with_state(|state| Ok(state.listener))
    }

    pub fn set_listener(&mut self, listener: Listener) -> Result<()> {
        self.with_state(|state| {
            listener.validate()?;
            state.listener = listener;
            Ok(())
        })
    }

    fn update_listener(&mut self, f: impl FnOnce(&mut Listener)) -> Result<()> {
        let mut listener = self.listener()?;
        f(&mut listener);
        self.set_listener(listener)
    }

    pub fn set_listener_position(&mut self, position: Vec3) -> Result<()> {
        self.update_listener(|listener| listener.position = position)
    }

    pub fn set_listener_velocity(&mut self, velocity: Vec3) -> Result<()> {
        self.update_listener(|listener| listener.velocity = velocity)
    }

    pub fn set_listener_orientation(&mut self, orientation: Orientation) -> Result<()> {
        self.update_listener(|listener| listener.orientation = orientation)
    }

    pub fn set_listener_gain(&mut self, gain: f32) -> Result<()> {
        self.update_listener(|listener| listener.gain = gain)
    }
}
