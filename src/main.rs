use std::path::PathBuf;
use std::sync::Arc;

use vibratord::config::Config;
use vibratord::decoder;
use vibratord::device::LoggingDevice;
use vibratord::service::Completion;
use vibratord::session::{CustomKind, VibratorUsage};
use vibratord::{PlaybackOutcome, VibrateAttribute, VibratorError, VibratorService};

const USAGE: &str = "usage:
  vibratord once <ms>
  vibratord preset <name> [count]
  vibratord custom <file> [hd|predefined|time]";

/// One parsed command line request.
enum Command {
    Once(i32),
    Preset(String, i32),
    Custom(PathBuf, CustomKind),
}

fn parse_args(args: &[String]) -> Option<Command> {
    match args {
        [cmd, ms] if cmd == "once" => ms.parse().ok().map(Command::Once),
        [cmd, name] if cmd == "preset" => Some(Command::Preset(name.clone(), 1)),
        [cmd, name, count] if cmd == "preset" => count.parse().ok().map(|c| Command::Preset(name.clone(), c)),
        [cmd, file] if cmd == "custom" => Some(Command::Custom(file.into(), CustomKind::Predefined)),
        [cmd, file, kind] if cmd == "custom" => CustomKind::parse(kind).map(|k| Command::Custom(file.into(), k)),
        _ => None,
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = parse_args(&args) else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    let cfg = Config::load();
    let device = Arc::new(LoggingDevice::new(&cfg.presets, cfg.delay_time_ms));
    let service = Arc::new(VibratorService::new(device, cfg));
    match service.delay_time() {
        Ok(ms) => log::info!("vibratord starting (driver delay {ms}ms)"),
        Err(e) => log::warn!("vibratord starting, driver delay unknown: {e}"),
    }

    let attr = VibrateAttribute::new("vibratord", VibratorUsage::Unknown);
    let request = {
        let service = Arc::clone(&service);
        tokio::task::spawn_blocking(move || submit(&service, command, &attr)).await
    };
    let completion = match request {
        Ok(Ok(completion)) => completion,
        Ok(Err(e)) => {
            log::error!("Vibration request rejected ({}): {e}", e.code());
            std::process::exit(1);
        }
        Err(e) => {
            log::error!("Request task failed: {e}");
            std::process::exit(1);
        }
    };

    let result = tokio::select! {
        result = completion => result,
        _ = tokio::signal::ctrl_c() => {
            log::info!("Interrupted, cancelling vibration");
            let svc = Arc::clone(&service);
            tokio::task::spawn_blocking(move || svc.cancel()).await.ok();
            Ok(Ok(PlaybackOutcome::Cancelled))
        }
    };

    match result {
        Ok(Ok(outcome)) => log::info!("Vibration finished: {outcome:?}"),
        Ok(Err(e)) => {
            log::error!("Vibration failed ({}): {e}", e.code());
            std::process::exit(1);
        }
        Err(_) => {
            log::error!("Playback worker went away without a result");
            std::process::exit(1);
        }
    }
}

fn submit(service: &VibratorService, command: Command, attr: &VibrateAttribute) -> Result<Completion, VibratorError> {
    match command {
        Command::Once(ms) => service.vibrate(ms, attr),
        Command::Preset(name, count) => service.play_effect(&name, count, attr),
        Command::Custom(path, kind) => {
            let package = decoder::decode_file(&path)?;
            log::info!("Loaded {} pattern(s) from {}", package.patterns.len(), path.display());
            service.play_custom(package, kind, attr)
        }
    }
}
