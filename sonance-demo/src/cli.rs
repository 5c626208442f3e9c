use crate::sawtooth::SawtoothWave;
use anyhow::{Context as _, Result, bail};
use sonance::driver::{CpalDriver, Driver, LoopbackDriver, NullDriver};
use sonance::{Device, DeviceDesc, SampleFormat, SourceState};
use std::time::{Duration, Instant};

const SAMPLE_RATE: u32 = 44100;
const BUFFER_COUNT: usize = 4;
/// 50 ms of audio per buffer
const BUFFER_FRAMES: usize = SAMPLE_RATE as usize / 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Cpal,
    Null,
    Loopback,
}

#[derive(Debug)]
pub struct Options {
    pub backend: Backend,
    pub device: Option<String>,
    pub list_devices: bool,
    pub seconds: f64,
    pub frequency: f64,
}

impl Options {
    pub fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let mut options = Self {
            backend: Backend::Cpal,
            device: None,
            list_devices: false,
            seconds: 2.0,
            frequency: 220.0,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--list-devices" => options.list_devices = true,
                "--backend" => {
                    let name = args.next().context("--backend needs a value")?;
                    options.backend = match name.as_str() {
                        "cpal" => Backend::Cpal,
                        "null" => Backend::Null,
                        "loopback" => Backend::Loopback,
                        other => bail!("unknown backend '{other}'"),
                    };
                }
                "--device" => options.device = Some(args.next().context("--device needs a name")?),
                "--seconds" => {
                    options.seconds = args
                        .next()
                        .context("--seconds needs a value")?
                        .parse()
                        .context("--seconds must be a number")?;
                }
                "--frequency" => {
                    options.frequency = args
                        .next()
                        .context("--frequency needs a value")?
                        .parse()
                        .context("--frequency must be a number")?;
                }
                other => bail!("unknown argument '{other}'"),
            }
        }
        Ok(options)
    }
}

pub fn run(options: Options) -> Result<()> {
    let driver: Box<dyn Driver> = match options.backend {
        Backend::Cpal => Box::new(CpalDriver::new()),
        Backend::Null => Box::new(NullDriver),
        Backend::Loopback => Box::new(LoopbackDriver),
    };

    if options.list_devices {
        for name in Device::list_devices(driver.as_ref())? {
            println!("{name}");
        }
        return Ok(());
    }

    stream_sawtooth(driver.as_ref(), &options)
}

/// Streams a sawtooth tone through a small ring of queued buffers, refilling
/// each buffer as soon as the source reports it processed.
fn stream_sawtooth(driver: &dyn Driver, options: &Options) -> Result<()> {
    let desc = DeviceDesc::default().sample_rate(SAMPLE_RATE).block_size(512);
    let mut device = Device::open_with_desc(driver, options.device.as_deref(), desc)?;
    log::info!(
        "Device '{}' (version {}), attributes {:?}",
        device.name()?,
        device.version()?,
        device.attributes()?
    );
    let loopback = device.is_extension_present("ALC_SOFT_loopback")?;

    let mut context = device.create_context()?;
    let mut wave = SawtoothWave::new(options.frequency, 0.0, 0.25, SAMPLE_RATE);

    let buffers = context.create_buffers(BUFFER_COUNT)?;
    for buffer in &buffers {
        let pcm = wave.next_chunk(BUFFER_FRAMES);
        context.set_buffer_data(*buffer, SampleFormat::Mono16, &pcm, SAMPLE_RATE)?;
    }
    let source = context.create_source()?;
    context.queue_buffers(source, &buffers)?;
    context.play(source)?;
    log::info!("Streaming {} Hz for {:.1}s", options.frequency, options.seconds);

    let total = Duration::from_secs_f64(options.seconds);
    let started = Instant::now();
    let mut rendered = Duration::ZERO;
    let mut block = vec![0.0f32; 512 * context.channels() as usize];

    while (if loopback { rendered } else { started.elapsed() }) < total {
        if loopback {
            context.render_samples(&mut block)?;
            rendered += Duration::from_secs_f64(512.0 / SAMPLE_RATE as f64);
        } else {
            std::thread::sleep(Duration::from_millis(5));
        }

        for event in context.poll_events() {
            log::debug!("{:?}", event);
        }

        let processed = context.buffers_processed(source)?;
        if processed == 0 {
            continue;
        }
        for buffer in context.unqueue_buffers(source, processed)? {
            let pcm = wave.next_chunk(BUFFER_FRAMES);
            context.set_buffer_data(buffer, SampleFormat::Mono16, &pcm, SAMPLE_RATE)?;
            context.queue_buffers(source, &[buffer])?;
        }

        // An underrun stops the source; restart it with the refilled queue.
        if context.source_state(source)? == SourceState::Stopped {
            log::warn!("Source underran, restarting");
            context.play(source)?;
        }
    }

    context.stop(source)?;
    context.delete_source(source)?;
    for buffer in buffers {
        context.delete_buffer(buffer)?;
    }
    if !device.close()? {
        bail!("device refused to close");
    }
    log::info!("Streaming finished");
    Ok(())
}
