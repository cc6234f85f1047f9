use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wl_gammactl::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "wl-gammactl")]
#[command(version, about = "Set contrast, brightness and gamma of every Wayland output")]
struct Cli {
    /// Set contrast
    #[arg(short, long, value_name = "R:G:B", default_value = "1:1:1", allow_hyphen_values = true)]
    contrast: ColorTriple,

    /// Set brightness
    #[arg(short, long, value_name = "R:G:B", default_value = "1:1:1", allow_hyphen_values = true)]
    brightness: ColorTriple,

    /// Set gamma
    #[arg(short, long, value_name = "R:G:B", default_value = "1:1:1", allow_hyphen_values = true)]
    gamma: ColorTriple,

    /// Give up when the compositor does not answer a roundtrip within this many milliseconds
    #[arg(long, value_name = "MS")]
    roundtrip_timeout: Option<u64>,
}

fn main() -> Result<()> {
    // Diagnostics go to stderr, progress to stdout
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let adjustment = Adjustment::new(cli.contrast, cli.brightness, cli.gamma);
    adjustment.validate()?;

    let options = ClientOptions {
        roundtrip_timeout: cli.roundtrip_timeout.map(Duration::from_millis),
    };

    let mut client = GammaClient::connect(options)?;
    client.prepare()?;

    println!("Contrast: {}", adjustment.contrast);
    println!("Brightness: {}", adjustment.brightness);
    println!("Gamma: {}", adjustment.gamma);

    client.apply_with(&adjustment, |applied| println!("> Adjusting {}", applied.ramp_size))?;

    client.run()?;
    Ok(())
}
