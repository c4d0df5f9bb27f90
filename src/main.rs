use anyhow::Result;
use dir2md::{cli::parse_args, run_dir2md};
use log::LevelFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = parse_args()?;

    let level = match (config.quiet, config.verbosity) {
        (true, _) => LevelFilter::Warn,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .format_target(false)
        .init();

    if let Some(path) = run_dir2md(config).await? {
        println!("{}", path.display());
    }
    Ok(())
}
