mod calibrate;
mod capture;
mod clock;
mod edges;
mod error;
mod focus;
mod hud;
mod inject;
mod logging;
mod pointer;
mod preview;
mod region;
mod shell;
mod trigger;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing::info;

use crate::calibrate::{calibrate, resolve_capture_dir};
use crate::capture::{PrimaryScreen, ScreenSource};
use crate::clock::SystemClock;
use crate::error::CalibrationError;
use crate::focus::focus_window;
use crate::inject::{Channel, ConfirmKeyboard};
use crate::pointer::{ConsoleWait, EnigoPointer, GlobalHookWait, PointAcquirer};
use crate::preview::{PreviewWindow, PromptWindowWait};
use crate::region::{Region, ThresholdPair};
use crate::trigger::{log_banner, ScreenSampler, TriggerConfig, TriggerLoop};

static STOP: AtomicBool = AtomicBool::new(false);

#[derive(Parser, Debug)]
#[command(
    name = "edge-enter",
    version,
    about = "Watch a screen region for edges and answer with synthetic Enter presses"
)]
struct Cli {
    /// Bring a window containing this title to the foreground before scanning
    #[arg(long)]
    focus_title: Option<String>,
    /// Canny low threshold (0-255)
    #[arg(long, default_value_t = 50)]
    canny_lo: u8,
    /// Canny high threshold (0-255)
    #[arg(long, default_value_t = 150)]
    canny_hi: u8,
    /// Skip the live tuner and scan LEFT,TOP,RIGHT,BOTTOM directly
    #[arg(long)]
    region: Option<Region>,
    /// Minimum seconds between two edge triggers
    #[arg(long, default_value = "0.40", value_parser = parse_seconds)]
    cooldown: Duration,
    /// Seconds without a trigger before a single Enter is sent
    #[arg(long, default_value = "25.0", value_parser = parse_seconds)]
    idle_timeout: Duration,
    /// Disable the idle-timeout Enter
    #[arg(long, action = ArgAction::SetTrue)]
    no_idle: bool,
    /// Seconds between two samples of the region
    #[arg(long, default_value = "0.03", value_parser = parse_seconds)]
    interval: Duration,
    /// Seconds between the two presses of a double Enter
    #[arg(long, default_value = "2.0", value_parser = parse_seconds)]
    confirm_delay: Duration,
    /// Injection channel to use (repeatable; default: all)
    #[arg(long = "channel", value_enum)]
    channels: Vec<Channel>,
    /// Directory for tuner captures (default: $EDGE_ENTER_CAPTURE_DIR or tuner_captures)
    #[arg(long)]
    capture_dir: Option<PathBuf>,
    /// Debug-level logging (EDGE_ENTER_LOG overrides)
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,
}

impl Cli {
    fn trigger_config(&self) -> TriggerConfig {
        TriggerConfig {
            cooldown: self.cooldown,
            idle_timeout: (!self.no_idle).then_some(self.idle_timeout),
            interval: self.interval,
            double_confirm_delay: self.confirm_delay,
        }
    }

    fn channels(&self) -> Vec<Channel> {
        if self.channels.is_empty() {
            Channel::ALL.to_vec()
        } else {
            self.channels.clone()
        }
    }
}

fn parse_seconds(raw: &str) -> Result<Duration, String> {
    let secs: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("{raw:?} is not a number of seconds"))?;
    Duration::try_from_secs_f64(secs).map_err(|_| format!("{raw:?} must be a finite, non-negative number of seconds"))
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(err) = run(cli) {
        if let Some(CalibrationError::Cancelled) = err.downcast_ref::<CalibrationError>() {
            eprintln!("cancelled by operator");
            std::process::exit(130);
        }
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let screen = PrimaryScreen::open()?;
    let initial = ThresholdPair::new(cli.canny_lo, cli.canny_hi);

    let (region, thresholds) = match cli.region {
        Some(region) => (region.clamp(&screen.bounds()), initial),
        None => {
            let mut acquirer = point_acquirer()?;
            calibrate(
                &screen,
                &mut acquirer,
                PreviewWindow::open,
                initial,
                &resolve_capture_dir(cli.capture_dir.clone()),
            )?
        }
    };

    ctrlc::set_handler(|| STOP.store(true, Ordering::SeqCst))
        .context("failed to install Ctrl-C handler")?;

    let keyboard = ConfirmKeyboard::from_channels(&cli.channels());

    if let Some(title) = cli.focus_title.as_deref() {
        let diag = focus_window(title);
        if diag.ok {
            info!("[focus] '{title}' -> OK");
        } else {
            info!("[focus] '{title}' -> not found/denied ({})", diag.summary());
        }
        thread::sleep(Duration::from_millis(200));
    }

    let config = cli.trigger_config();
    log_banner(region, thresholds, &config, &keyboard.channel_names());

    let sampler = ScreenSampler::new(screen, region, thresholds);
    TriggerLoop::new(config, sampler, keyboard, SystemClock::new()).run(&STOP);
    Ok(())
}

fn point_acquirer() -> Result<PointAcquirer> {
    let pointer = EnigoPointer::new()?;
    Ok(PointAcquirer::new(
        vec![
            Box::new(GlobalHookWait::default()),
            Box::new(PromptWindowWait),
            Box::new(ConsoleWait::stdin()),
        ],
        Box::new(pointer),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_flags() {
        let cli = Cli::try_parse_from(["edge-enter"]).unwrap();
        assert_eq!(cli.canny_lo, 50);
        assert_eq!(cli.canny_hi, 150);
        assert!(cli.focus_title.is_none());
        let config = cli.trigger_config();
        assert_eq!(config.cooldown, Duration::from_millis(400));
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(25)));
        assert_eq!(config.interval, Duration::from_millis(30));
        assert_eq!(config.double_confirm_delay, Duration::from_secs(2));
        assert_eq!(cli.channels(), Channel::ALL.to_vec());
    }

    #[test]
    fn no_idle_disables_heartbeat() {
        let cli = Cli::try_parse_from(["edge-enter", "--no-idle", "--idle-timeout", "5"]).unwrap();
        assert_eq!(cli.trigger_config().idle_timeout, None);
    }

    #[test]
    fn parses_region_channels_and_focus() {
        let cli = Cli::try_parse_from([
            "edge-enter",
            "--region",
            "100,100,300,250",
            "--channel",
            "scancode",
            "--channel",
            "enigo",
            "--focus-title",
            "Game",
        ])
        .unwrap();
        assert_eq!(cli.region, Some(Region::from_corners((100, 100), (300, 250)).unwrap()));
        assert_eq!(cli.channels(), vec![Channel::Scancode, Channel::Enigo]);
        assert_eq!(cli.focus_title.as_deref(), Some("Game"));
    }

    #[test]
    fn rejects_out_of_range_thresholds_and_bad_seconds() {
        assert!(Cli::try_parse_from(["edge-enter", "--canny-lo", "256"]).is_err());
        assert!(Cli::try_parse_from(["edge-enter", "--canny-hi", "-1"]).is_err());
        assert!(Cli::try_parse_from(["edge-enter", "--cooldown", "-0.5"]).is_err());
        assert!(Cli::try_parse_from(["edge-enter", "--interval", "soon"]).is_err());
        assert!(Cli::try_parse_from(["edge-enter", "--region", "5,5,1,1"]).is_err());
    }
}
