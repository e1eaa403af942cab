use anyhow::{anyhow, bail, Context, Result};
use image::RgbaImage;
use xcap::Monitor;

use crate::region::{MonitorBounds, Region};

/// Source of region captures on the primary monitor.
pub trait ScreenSource {
    fn bounds(&self) -> MonitorBounds;
    fn grab(&self, region: Region) -> Result<RgbaImage>;
}

/// Primary-monitor capture through `xcap`.
pub struct PrimaryScreen {
    monitor: Monitor,
    bounds: MonitorBounds,
}

impl PrimaryScreen {
    pub fn open() -> Result<Self> {
        let mut monitors = Monitor::all().map_err(|e| anyhow!("failed to list monitors: {e}"))?;
        if monitors.is_empty() {
            bail!("no monitor available for capture");
        }
        let primary = monitors.iter().position(|m| m.is_primary()).unwrap_or(0);
        let monitor = monitors.swap_remove(primary);
        let bounds = MonitorBounds {
            left: monitor.x(),
            top: monitor.y(),
            width: monitor.width(),
            height: monitor.height(),
        };
        Ok(Self { monitor, bounds })
    }
}

impl ScreenSource for PrimaryScreen {
    fn bounds(&self) -> MonitorBounds {
        self.bounds
    }

    fn grab(&self, region: Region) -> Result<RgbaImage> {
        let shot = self
            .monitor
            .capture_image()
            .map_err(|e| anyhow!("monitor capture failed: {e}"))?;
        let (w, h) = (shot.width(), shot.height());
        let full = RgbaImage::from_raw(w, h, shot.into_raw())
            .context("monitor capture returned a malformed buffer")?;
        Ok(crop_to_region(&full, &self.bounds, region))
    }
}

/// Cuts `region` (absolute coordinates) out of a full-monitor capture.
///
/// HiDPI captures can be larger than the logical monitor size; the region is
/// scaled into capture pixels before cropping so the crop always stays inside.
pub fn crop_to_region(full: &RgbaImage, mon: &MonitorBounds, region: Region) -> RgbaImage {
    let region = region.clamp(mon);
    let scale_x = f64::from(full.width()) / f64::from(mon.width.max(1));
    let scale_y = f64::from(full.height()) / f64::from(mon.height.max(1));

    let x = (f64::from(region.left - mon.left) * scale_x).floor() as u32;
    let y = (f64::from(region.top - mon.top) * scale_y).floor() as u32;
    let x = x.min(full.width().saturating_sub(1));
    let y = y.min(full.height().saturating_sub(1));
    let w = ((f64::from(region.width()) * scale_x).round() as u32)
        .max(1)
        .min(full.width() - x);
    let h = ((f64::from(region.height()) * scale_y).round() as u32)
        .max(1)
        .min(full.height() - y);

    image::imageops::crop_imm(full, x, y, w, h).to_image()
}
