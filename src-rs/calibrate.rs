//! Interactive region and threshold tuner (RAW | EDGES preview).

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use image::RgbImage;
use serde::Serialize;
use tracing::info;

use crate::capture::ScreenSource;
use crate::edges::{edges_to_rgb, EdgeFrame};
use crate::hud::{hud_line, side_by_side};
use crate::pointer::PointAcquirer;
use crate::region::{MonitorBounds, Region, ThresholdPair};

pub const STEP: i32 = 5;
pub const STEP_FINE: i32 = 1;
pub const CAPTURE_DIR_ENV: &str = "EDGE_ENTER_CAPTURE_DIR";
const DEFAULT_CAPTURE_DIR: &str = "tuner_captures";

pub const LEGEND: &str =
    "ARROWS move | I/K H | J/L W | [/] lo | {/} hi | ; fine | S save | P print | Q/Esc done";

/// Operator commands understood by the tuner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Move the whole region one step in the given direction (unit vector).
    Move { dx: i32, dy: i32 },
    /// Move the right/bottom edge one step (unit vector).
    Resize { dw: i32, dh: i32 },
    Lo(i16),
    Hi(i16),
    FineStep,
    Save,
    Print,
    Done,
}

/// What the loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Save,
    Print,
    Done,
}

/// Region + thresholds being tuned, always clamped to the monitor.
#[derive(Debug, Clone)]
pub struct Tuner {
    pub region: Region,
    pub thresholds: ThresholdPair,
    monitor: MonitorBounds,
    fine: bool,
}

impl Tuner {
    pub fn new(region: Region, thresholds: ThresholdPair, monitor: MonitorBounds) -> Self {
        Self {
            region: region.clamp(&monitor),
            thresholds,
            monitor,
            fine: false,
        }
    }

    #[cfg(test)]
    pub fn fine_armed(&self) -> bool {
        self.fine
    }

    pub fn apply(&mut self, command: Command) -> Step {
        if command == Command::FineStep {
            self.fine = true;
            return Step::Continue;
        }
        let step = if self.fine { STEP_FINE } else { STEP };
        self.fine = false;

        match command {
            Command::Move { dx, dy } => {
                self.region = self.region.shifted(dx * step, dy * step).clamp(&self.monitor);
                Step::Continue
            }
            Command::Resize { dw, dh } => {
                self.region = self.region.resized(dw * step, dh * step).clamp(&self.monitor);
                Step::Continue
            }
            Command::Lo(delta) => {
                self.thresholds.adjust_lo(delta);
                Step::Continue
            }
            Command::Hi(delta) => {
                self.thresholds.adjust_hi(delta);
                Step::Continue
            }
            Command::Save => Step::Save,
            Command::Print => Step::Print,
            Command::Done => Step::Done,
            Command::FineStep => Step::Continue,
        }
    }

    pub fn summary(&self) -> String {
        format!("{}  {}", self.region, self.thresholds)
    }
}

/// Display + keyboard surface the tuner renders into.
pub trait PreviewSurface {
    fn is_open(&self) -> bool;
    fn show(&mut self, frame: &RgbImage) -> Result<()>;
    /// Commands entered since the last poll; never blocks.
    fn poll(&mut self) -> Vec<Command>;
}

/// Lets the operator pick and tune a region, returning the final region and thresholds.
pub fn calibrate<S, F>(
    screen: &dyn ScreenSource,
    acquirer: &mut PointAcquirer,
    open_surface: F,
    initial: ThresholdPair,
    capture_dir: &Path,
) -> Result<(Region, ThresholdPair)>
where
    S: PreviewSurface,
    F: FnOnce() -> Result<S>,
{
    println!("=== Live Region Tuner (RAW | EDGES) ===");
    let top_left = acquirer.acquire("Set mouse to LEFT-TOP corner of the region.")?;
    let bottom_right = acquirer.acquire("Set mouse to BOTTOM-RIGHT corner of the region.")?;
    let region = Region::from_corners(top_left, bottom_right)?;

    let mut tuner = Tuner::new(region, initial, screen.bounds());
    let mut surface = open_surface()?;

    while surface.is_open() {
        let capture = screen
            .grab(tuner.region)
            .with_context(|| format!("failed to capture {}", tuner.region))?;
        let frame = EdgeFrame::from_capture(&capture, tuner.thresholds);
        surface.show(&render_preview(&frame, &tuner))?;

        for command in surface.poll() {
            match tuner.apply(command) {
                Step::Continue => {}
                Step::Print => println!("{}", tuner.summary()),
                Step::Save => {
                    let saved = save_debug_images(
                        capture_dir,
                        &frame,
                        tuner.region,
                        tuner.thresholds,
                        Local::now(),
                    )?;
                    info!(
                        "[tuner] saved {}, {} and {}",
                        saved.raw.display(),
                        saved.edges.display(),
                        saved.sidecar.display()
                    );
                }
                Step::Done => return Ok((tuner.region, tuner.thresholds)),
            }
        }
    }

    Ok((tuner.region, tuner.thresholds))
}

/// Side-by-side RAW | EDGES frame with HUD lines on both halves.
pub fn render_preview(frame: &EdgeFrame, tuner: &Tuner) -> RgbImage {
    let info_region = format!("REGION {}", tuner.region);
    let info_canny = format!("CANNY {}  edges={:.2}%", tuner.thresholds, frame.percent());

    let mut left = frame.raw.clone();
    hud_line(&mut left, 0, &info_region);
    hud_line(&mut left, 1, &info_canny);
    hud_line(&mut left, 2, LEGEND);

    let mut right = edges_to_rgb(&frame.edges);
    hud_line(&mut right, 0, &info_region);
    hud_line(&mut right, 1, &info_canny);

    side_by_side(&left, &right)
}

#[derive(Debug, Clone)]
pub struct SavedCapture {
    pub raw: PathBuf,
    pub edges: PathBuf,
    pub sidecar: PathBuf,
}

#[derive(Serialize)]
struct CaptureSidecar<'a> {
    captured_at: String,
    region: Region,
    thresholds: ThresholdPair,
    edge_density: f64,
    raw_path: &'a Path,
    edges_path: &'a Path,
}

/// Writes `raw_<ts>.png`, `edges_<ts>.png` and a `<ts>.json` sidecar into `dir`.
pub fn save_debug_images(
    dir: &Path,
    frame: &EdgeFrame,
    region: Region,
    thresholds: ThresholdPair,
    at: DateTime<Local>,
) -> Result<SavedCapture> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create capture dir: {}", dir.display()))?;
    let ts = at.format("%Y%m%d_%H%M%S_%6f").to_string();
    let raw = dir.join(format!("raw_{ts}.png"));
    let edges = dir.join(format!("edges_{ts}.png"));
    let sidecar = dir.join(format!("{ts}.json"));

    frame
        .raw
        .save(&raw)
        .with_context(|| format!("failed to save raw capture: {}", raw.display()))?;
    frame
        .edges
        .save(&edges)
        .with_context(|| format!("failed to save edge map: {}", edges.display()))?;

    let meta = CaptureSidecar {
        captured_at: at.to_rfc3339(),
        region,
        thresholds,
        edge_density: frame.density,
        raw_path: &raw,
        edges_path: &edges,
    };
    fs::write(&sidecar, serde_json::to_string_pretty(&meta)?)
        .with_context(|| format!("failed to write sidecar: {}", sidecar.display()))?;

    Ok(SavedCapture {
        raw,
        edges,
        sidecar,
    })
}

/// `--capture-dir`, then `EDGE_ENTER_CAPTURE_DIR`, then `tuner_captures`.
pub fn resolve_capture_dir(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| {
        env::var(CAPTURE_DIR_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
    })
    .unwrap_or_else(|| PathBuf::from(DEFAULT_CAPTURE_DIR))
}
