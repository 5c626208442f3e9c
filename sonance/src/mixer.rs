// Mixer module - advances source cursors and sums playing sources into an output block.
// Sample conversion is nearest-neighbour with a linear gain; there is no filtering.

use crate::arena::Arena;
use crate::buffer::BufferStore;
use crate::events::SourceEvent;
use crate::source::{Source, SourceState};
use crossbeam_channel::{Sender, TrySendError};

/// Pitch values above this render at this rate. The stored property keeps
/// whatever the caller set.
pub(crate) const MAX_PITCH: f32 = 255.0;

/// Output block layout.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OutputFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Mixes every playing source into `out` (interleaved, added to existing content).
/// Returns the number of frames in the block.
pub(crate) fn mix_sources(
    out: &mut [f32],
    format: OutputFormat,
    sources: &mut Arena<Source>,
    store: &BufferStore,
    listener_gain: f32,
    events: &Sender<SourceEvent>,
) -> usize {
    let channels = format.channels as usize;
    let frames = out.len() / channels;

    for (_, source) in sources.iter_mut() {
        if source.state != SourceState::Playing {
            continue;
        }
        mix_source(out, format, source, store, listener_gain, events);
    }

    frames
}

fn emit(events: &Sender<SourceEvent>, event: SourceEvent) {
    match events.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => log::trace!("Event queue full, dropping {:?}", event),
        Err(TrySendError::Disconnected(_)) => {
            log::debug!("Dropping {:?}, event receiver is gone", event)
        }
    }
}

/// Moves the cursor onto a buffer that still has frames left, crossing
/// finished buffers and wrapping or stopping at the queue end.
/// Returns false when the source stopped.
fn settle_cursor(source: &mut Source, store: &BufferStore, events: &Sender<SourceEvent>) -> bool {
    loop {
        let queue_len = source.buffers_queued();
        if source.current >= queue_len {
            let loop_frames: usize = source
                .queue()
                .iter()
                .map(|id| store.get(*id).map_or(0, |entry| entry.frames()))
                .sum();
            if source.props.looping && loop_frames > 0 {
                log::debug!("{} looped", source.id);
                source.current = 0;
                // A large step can overshoot the queue many times over.
                source.offset %= loop_frames as f64;
                emit(events, SourceEvent::Looped { source: source.id });
                continue;
            }
            log::debug!("{} ran out of queued buffers", source.id);
            source.state = SourceState::Stopped;
            source.current = queue_len;
            source.offset = 0.0;
            emit(events, SourceEvent::Stopped { source: source.id });
            return false;
        }

        let buffer = source.queue()[source.current];
        let frames = store.get(buffer).map_or(0, |entry| entry.frames());
        if (source.offset as usize) < frames {
            return true;
        }

        source.offset = (source.offset - frames as f64).max(0.0);
        source.current += 1;
        emit(
            events,
            SourceEvent::BufferProcessed {
                source: source.id,
                buffer,
            },
        );
    }
}

fn mix_source(
    out: &mut [f32],
    format: OutputFormat,
    source: &mut Source,
    store: &BufferStore,
    listener_gain: f32,
    events: &Sender<SourceEvent>,
) {
    let channels = format.channels as usize;
    let gain = source.props.gain * listener_gain;

    for frame in out.chunks_exact_mut(channels) {
        if !settle_cursor(source, store, events) {
            return;
        }

        let buffer = source.queue()[source.current];
        let Some(data) = store.get(buffer).ok().and_then(|entry| entry.data.as_ref()) else {
            return;
        };
        let position = source.offset as usize;

        if channels == 1 && data.format.channels() == 2 {
            frame[0] += 0.5 * (data.sample(position, 0) + data.sample(position, 1)) * gain;
        } else {
            for (channel, sample) in frame.iter_mut().enumerate() {
                *sample += data.sample(position, channel) * gain;
            }
        }

        let pitch = source.props.pitch.min(MAX_PITCH);
        source.offset +=
            f64::from(data.frequency) * f64::from(pitch) / f64::from(format.sample_rate);
    }

    // Finished buffers are reported as soon as the block that consumed them ends.
    settle_cursor(source, store, events);
}
