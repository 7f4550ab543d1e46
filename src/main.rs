use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use use_cpu::topology::log_host_summary;
use use_cpu::{
    build_slots, Coordinator, Opts, OsPlacement, RunControl, SystemClock, Topology,
};

fn init_logging(verbose: bool) -> Result<()> {
    let loglevel = if verbose {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };

    let mut lcfg = simplelog::ConfigBuilder::new();
    if lcfg.set_time_offset_to_local().is_err() {
        eprintln!("Unable to determine local time offset, logging in UTC");
    }
    lcfg.set_time_level(simplelog::LevelFilter::Error)
        .set_location_level(simplelog::LevelFilter::Off)
        .set_target_level(simplelog::LevelFilter::Off)
        .set_thread_level(simplelog::LevelFilter::Off);
    simplelog::TermLogger::init(
        loglevel,
        lcfg.build(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )?;
    Ok(())
}

fn main() -> Result<()> {
    let opts = Opts::parse();
    init_logging(opts.verbose).context("Failed to initialize logging")?;

    let topo = Topology::detect().context("Processor discovery failed")?;
    log_host_summary(&topo);

    let settings = opts.settings();
    let slots = build_slots(&topo, &settings).context("Invalid configuration")?;

    let clock = SystemClock;
    let started = clock.check().context("Unable to read the realtime clock")?;
    let control = Arc::new(
        RunControl::starting_at(started, settings.duration_secs, settings.mode)
            .context("Invalid configuration")?,
    );
    let control_clone = control.clone();
    ctrlc::set_handler(move || {
        if control_clone.request_stop() {
            warn!("Interrupted, finishing the current cycle");
        }
    })
    .context("Error setting Ctrl-C handler")?;

    info!(
        "Default load {:.1}% at priority {}",
        settings.default_utilization.percent(),
        settings.priority
    );
    let coordinator = Coordinator::new(
        slots,
        settings.default_utilization,
        settings.priority,
        &control,
        clock,
        OsPlacement,
    );
    let stdout = io::stdout();
    let mut out = stdout.lock();
    coordinator.run(&mut out).context("Run aborted")?;
    Ok(())
}
