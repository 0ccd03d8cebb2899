use clap::Parser;
use signal_sniper::{Cli, run_cli};

fn main() -> anyhow::Result<()> {
    // A. Init Logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    // B. Parse Args
    let args = Cli::parse();
    #[cfg(debug_assertions)]
    log::info!("Parsed arguments: {:?}", args);

    // C. Run and print the report
    let report = run_cli(&args)?;
    println!("{}", report);
    Ok(())
}
