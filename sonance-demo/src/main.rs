mod cli;
mod sawtooth;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let options = cli::Options::parse(std::env::args().skip(1))?;
    cli::run(options)
}
