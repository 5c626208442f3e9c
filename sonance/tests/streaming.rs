use sonance::driver::{LoopbackDriver, NullDriver};
use sonance::*;
use std::time::{Duration, Instant};

const RATE: u32 = 44100;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn silent_buffers(context: &mut Context, count: usize, frames: usize) -> Vec<BufferId> {
    let buffers = context.create_buffers(count).expect("Failed to create buffers");
    for buffer in &buffers {
        context
            .set_buffer_data(*buffer, SampleFormat::Mono16, &vec![0; frames * 2], RATE)
            .expect("Failed to fill buffer");
    }
    buffers
}

fn loopback_context() -> (Device, Context) {
    let desc = DeviceDesc::default().sample_rate(RATE).channels(1);
    let mut device =
        Device::open_with_desc(&LoopbackDriver, None, desc).expect("Failed to open loopback");
    let context = device.create_context().expect("Failed to create context");
    (device, context)
}

#[test]
fn test_streaming_unqueue_on_loopback() {
    init_logger();
    let (_device, mut context) = loopback_context();
    let source = context.create_source().unwrap();
    let [b1, b2, b3] = silent_buffers(&mut context, 3, 441)[..] else {
        panic!("expected three buffers");
    };

    context.queue_buffers(source, &[b1, b2, b3]).unwrap();
    assert_eq!(context.source_type(source).unwrap(), SourceType::Streaming);
    context.play(source).unwrap();

    let mut block = vec![0.0; 100];
    while context.buffers_processed(source).unwrap() == 0 {
        context.render_samples(&mut block).unwrap();
    }
    assert_eq!(context.buffers_processed(source).unwrap(), 1);
    assert_eq!(context.unqueue_buffers(source, 1).unwrap(), vec![b1]);

    let before = context.queued_buffers(source).unwrap();
    assert!(matches!(
        context.unqueue_buffers(source, 1),
        Err(SonanceError::InvalidOperation(_))
    ));
    assert_eq!(context.get_error(), ErrorCode::InvalidOperation);
    assert_eq!(context.queued_buffers(source).unwrap(), before);
    assert_eq!(before, vec![b2, b3]);

    // b1 is free again: refill and requeue it behind b3
    context
        .set_buffer_data(b1, SampleFormat::Mono16, &vec![0; 882], RATE)
        .unwrap();
    context.queue_buffers(source, &[b1]).unwrap();
    assert!(matches!(
        context.set_buffer_data(b2, SampleFormat::Mono16, &[0; 2], RATE),
        Err(SonanceError::InvalidOperation(_))
    ));
    assert_eq!(context.buffer_info(b2).unwrap().size, 882);

    let events = context.poll_events();
    assert_eq!(
        events,
        vec![SourceEvent::BufferProcessed {
            source,
            buffer: b1
        }]
    );
}

#[test]
fn test_queue_runs_dry_and_stops() {
    init_logger();
    let (_device, mut context) = loopback_context();
    let source = context.create_source().unwrap();
    let buffers = silent_buffers(&mut context, 2, 100);
    context.queue_buffers(source, &buffers).unwrap();
    context.play(source).unwrap();

    let mut block = vec![0.0; 250];
    context.render_samples(&mut block).unwrap();
    assert_eq!(context.source_state(source).unwrap(), SourceState::Stopped);
    assert_eq!(context.buffers_processed(source).unwrap(), 2);
    assert!(
        context
            .poll_events()
            .contains(&SourceEvent::Stopped { source })
    );

    assert_eq!(context.unqueue_buffers(source, 2).unwrap(), buffers);
    assert_eq!(context.source_type(source).unwrap(), SourceType::Undetermined);
    assert_eq!(context.buffers_processed(source).unwrap(), 0);

    // Play on an empty queue leaves the state alone
    context.play(source).unwrap();
    assert_eq!(context.source_state(source).unwrap(), SourceState::Stopped);
}

#[test]
fn test_state_machine_keeps_queue() {
    init_logger();
    let (_device, mut context) = loopback_context();
    let source = context.create_source().unwrap();
    let buffers = silent_buffers(&mut context, 3, 100);
    context.queue_buffers(source, &buffers).unwrap();

    context.play(source).unwrap();
    let mut block = vec![0.0; 150];
    context.render_samples(&mut block).unwrap();
    assert_eq!(context.buffers_processed(source).unwrap(), 1);

    context.pause(source).unwrap();
    assert_eq!(context.source_state(source).unwrap(), SourceState::Paused);
    context.render_samples(&mut block).unwrap();
    assert_eq!(context.buffers_processed(source).unwrap(), 1);

    context.play(source).unwrap();
    assert_eq!(context.source_state(source).unwrap(), SourceState::Playing);

    context.stop(source).unwrap();
    assert_eq!(context.source_state(source).unwrap(), SourceState::Stopped);
    assert_eq!(context.buffers_processed(source).unwrap(), 3);

    context.rewind(source).unwrap();
    assert_eq!(context.source_state(source).unwrap(), SourceState::Initial);
    assert_eq!(context.buffers_processed(source).unwrap(), 0);
    assert_eq!(context.queued_buffers(source).unwrap(), buffers);
}

#[test]
fn test_static_and_streaming_modes_exclude_each_other() {
    init_logger();
    let (_device, mut context) = loopback_context();
    let buffers = silent_buffers(&mut context, 2, 100);

    let fixed = context.create_source().unwrap();
    context.set_buffer(fixed, Some(buffers[0])).unwrap();
    assert_eq!(context.source_type(fixed).unwrap(), SourceType::Static);
    assert_eq!(context.buffers_queued(fixed).unwrap(), 1);
    assert!(context.queue_buffers(fixed, &buffers[1..]).is_err());

    let streaming = context.create_source().unwrap();
    context.queue_buffers(streaming, &buffers[1..]).unwrap();
    assert!(context.set_buffer(streaming, Some(buffers[0])).is_err());
    assert_eq!(context.get_error(), ErrorCode::InvalidOperation);
}

#[test]
fn test_static_looping_source_keeps_playing() {
    init_logger();
    let (_device, mut context) = loopback_context();
    let buffer = silent_buffers(&mut context, 1, 50)[0];
    let source = context.create_source().unwrap();
    context.set_buffer(source, Some(buffer)).unwrap();
    context.set_looping(source, true).unwrap();
    context.play(source).unwrap();

    let mut block = vec![0.0; 175];
    context.render_samples(&mut block).unwrap();
    assert_eq!(context.source_state(source).unwrap(), SourceState::Playing);
    assert_eq!(context.sample_offset(source).unwrap(), 25);
    assert!(context.set_buffer(source, None).is_err());

    context.set_looping(source, false).unwrap();
    context.render_samples(&mut block).unwrap();
    assert_eq!(context.source_state(source).unwrap(), SourceState::Stopped);
}

#[test]
fn test_gain_scales_output() {
    init_logger();
    let (_device, mut context) = loopback_context();
    let buffer = context.create_buffer().unwrap();
    let samples: Vec<u8> = std::iter::repeat_n(16384i16.to_le_bytes(), 10)
        .flatten()
        .collect();
    context
        .set_buffer_data(buffer, SampleFormat::Mono16, &samples, RATE)
        .unwrap();
    let source = context.create_source().unwrap();
    context.set_buffer(source, Some(buffer)).unwrap();
    context.set_gain(source, 0.5).unwrap();
    context.set_listener_gain(0.5).unwrap();
    context.play(source).unwrap();

    let mut block = vec![0.0; 4];
    context.render_samples(&mut block).unwrap();
    assert_eq!(block, vec![0.125; 4]);
}

#[test]
fn test_render_samples_requires_loopback() {
    init_logger();
    let mut device = Device::open(&NullDriver, None).unwrap();
    let mut context = device.create_context().unwrap();
    let mut block = vec![0.0; 8];
    assert!(matches!(
        context.render_samples(&mut block),
        Err(SonanceError::InvalidOperation(_))
    ));
}

#[test]
fn test_streaming_on_null_device() {
    init_logger();
    let desc = DeviceDesc::default().sample_rate(RATE).block_size(256);
    let mut device = Device::open_with_desc(&NullDriver, None, desc).unwrap();
    let mut context = device.create_context().unwrap();

    let source = context.create_source().unwrap();
    // 20 ms per buffer
    let [b1, b2, b3] = silent_buffers(&mut context, 3, 882)[..] else {
        panic!("expected three buffers");
    };
    context.queue_buffers(source, &[b1, b2, b3]).unwrap();
    context.play(source).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while context.buffers_processed(source).unwrap() == 0 {
        assert!(Instant::now() < deadline, "no buffer was processed in time");
        std::thread::sleep(Duration::from_millis(1));
    }

    // Pausing freezes the cursor so the second unqueue is deterministic
    context.pause(source).unwrap();
    let processed = context.buffers_processed(source).unwrap();
    let unqueued = context.unqueue_buffers(source, processed).unwrap();
    assert_eq!(unqueued[0], b1);
    assert!(matches!(
        context.unqueue_buffers(source, 1),
        Err(SonanceError::InvalidOperation(_))
    ));
}

#[test]
fn test_close_with_live_source_is_refused() {
    init_logger();
    let mut device = Device::open(&NullDriver, None).unwrap();
    let mut context = device.create_context().unwrap();
    let source = context.create_source().unwrap();

    assert!(!device.close().unwrap());
    assert!(device.is_open());
    assert_eq!(context.source_state(source).unwrap(), SourceState::Initial);

    context.delete_source(source).unwrap();
    assert!(device.close().unwrap());
    assert!(matches!(
        device.close(),
        Err(SonanceError::InvalidHandle {
            kind: HandleKind::Device,
            ..
        })
    ));
}
