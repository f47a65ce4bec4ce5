use std::{fmt::Debug, path::PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use embassy_time::Delay;
use embedded_hal::{delay::DelayNs, digital::InputPin};
use embedded_hal_mock::eh1::delay::NoopDelay;
use ev3d_core::utils::{
    PrinterConfig,
    controllers::{PrintHead, TachoDriver, sim_printhead},
    gcode::{Instruction, parse_gcode_file, run_gcode},
};
use tracing::{error, info};

#[derive(Parser)]
#[clap(version = "1.0", about = "Print a G-code file on the EV3 printer")]
struct Opts {
    /// G-code file to print
    #[clap(required_unless_present = "print_config")]
    gcode: Option<PathBuf>,
    /// TOML printer configuration (defaults to the reference build)
    #[clap(long, short)]
    config: Option<PathBuf>,
    /// drive simulated motors instead of EV3 hardware
    #[clap(long)]
    dry_run: bool,
    /// with --dry-run, skip the move delays
    #[clap(long, requires = "dry_run")]
    fast: bool,
    /// do not home the axes before printing
    #[clap(long)]
    skip_calibration: bool,
    /// print the parsed instructions as JSON lines and exit
    #[clap(long)]
    dump: bool,
    /// print the effective configuration as TOML and exit
    #[clap(long)]
    print_config: bool,
}

fn print_job<M, S, D>(
    head: &mut PrintHead<M, S, D>,
    instructions: &[Instruction],
    calibrate: bool,
) -> Result<()>
where
    M: TachoDriver,
    M::Error: Debug + Send + Sync + 'static,
    S: InputPin,
    D: DelayNs,
{
    if calibrate {
        info!("Calibrating axes");
        head.calibrate().context("calibration failed")?;
    }
    run_gcode(head, instructions).context("print failed")?;
    Ok(())
}

#[cfg(feature = "ev3")]
fn print_on_hardware(
    config: &PrinterConfig,
    instructions: &[Instruction],
    calibrate: bool,
) -> Result<()> {
    let mut head = ev3d_core::utils::controllers::ev3::open_printhead(config, Delay)
        .context("unable to open EV3 devices")?;
    print_job(&mut head, instructions, calibrate)
}

#[cfg(not(feature = "ev3"))]
fn print_on_hardware(
    _config: &PrinterConfig,
    _instructions: &[Instruction],
    _calibrate: bool,
) -> Result<()> {
    bail!("built without EV3 support, rebuild with `--features ev3` or pass --dry-run")
}

fn run(opts: Opts) -> Result<()> {
    let config = match &opts.config {
        Some(path) => PrinterConfig::load(path)
            .with_context(|| format!("unable to load config {}", path.display()))?,
        None => PrinterConfig::default(),
    };

    if opts.print_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let Some(gcode) = opts.gcode.as_ref() else {
        bail!("no G-code file given");
    };
    let instructions = parse_gcode_file(gcode)
        .with_context(|| format!("unable to parse {}", gcode.display()))?;

    if opts.dump {
        for instruction in &instructions {
            println!("{}", serde_json::to_string(instruction)?);
        }
        return Ok(());
    }

    let calibrate = !opts.skip_calibration;
    if !opts.dry_run {
        return print_on_hardware(&config, &instructions, calibrate);
    }

    info!(fast = opts.fast, "Dry run on simulated motors");
    if opts.fast {
        let mut head = sim_printhead(&config, NoopDelay::new())?;
        print_job(&mut head, &instructions, calibrate)
    } else {
        let mut head = sim_printhead(&config, Delay)?;
        print_job(&mut head, &instructions, calibrate)
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let opts: Opts = Opts::parse();
    if let Err(e) = run(opts) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
