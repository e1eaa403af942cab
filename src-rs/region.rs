use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Context};
use serde::Serialize;

use crate::error::CalibrationError;

/// Screen rectangle in absolute pixels. `right`/`bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Region {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// Bounds of the monitor a region must stay inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonitorBounds {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl MonitorBounds {
    pub fn right(&self) -> i32 {
        self.left + self.width.max(1) as i32
    }

    pub fn bottom(&self) -> i32 {
        self.top + self.height.max(1) as i32
    }
}

impl Region {
    /// Builds a region from the operator's two corner points.
    pub fn from_corners(top_left: (i32, i32), bottom_right: (i32, i32)) -> Result<Self, CalibrationError> {
        let (left, top) = top_left;
        let (right, bottom) = bottom_right;
        if right <= left || bottom <= top {
            return Err(CalibrationError::InvalidRegion {
                left,
                top,
                right,
                bottom,
            });
        }
        Ok(Self {
            left,
            top,
            right,
            bottom,
        })
    }

    pub fn width(&self) -> u32 {
        (self.right - self.left).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.bottom - self.top).max(0) as u32
    }

    /// Pulls the region inside `mon`, keeping at least one pixel in each axis.
    pub fn clamp(self, mon: &MonitorBounds) -> Self {
        let left = self.left.clamp(mon.left, mon.right() - 1);
        let top = self.top.clamp(mon.top, mon.bottom() - 1);
        let right = self.right.min(mon.right()).max(left + 1);
        let bottom = self.bottom.min(mon.bottom()).max(top + 1);
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn shifted(self, dx: i32, dy: i32) -> Self {
        Self {
            left: self.left.saturating_add(dx),
            top: self.top.saturating_add(dy),
            right: self.right.saturating_add(dx),
            bottom: self.bottom.saturating_add(dy),
        }
    }

    /// Moves only the right/bottom edges. Callers re-clamp afterwards.
    pub fn resized(self, dw: i32, dh: i32) -> Self {
        Self {
            right: self.right.saturating_add(dw),
            bottom: self.bottom.saturating_add(dh),
            ..self
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LT=({},{}) BR=({},{}) size={}x{}",
            self.left,
            self.top,
            self.right,
            self.bottom,
            self.width(),
            self.height()
        )
    }
}

impl FromStr for Region {
    type Err = anyhow::Error;

    /// Parses `LEFT,TOP,RIGHT,BOTTOM`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            bail!("expected LEFT,TOP,RIGHT,BOTTOM, got {raw:?}");
        }
        let mut values = [0i32; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .with_context(|| format!("invalid coordinate {part:?} in {raw:?}"))?;
        }
        Ok(Self::from_corners((values[0], values[1]), (values[2], values[3]))?)
    }
}

/// Low/high Canny thresholds. Adjustments saturate at 0 and 255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThresholdPair {
    pub lo: u8,
    pub hi: u8,
}

impl ThresholdPair {
    pub fn new(lo: u8, hi: u8) -> Self {
        Self { lo, hi }
    }

    pub fn adjust_lo(&mut self, delta: i16) {
        self.lo = saturating_step(self.lo, delta);
    }

    pub fn adjust_hi(&mut self, delta: i16) {
        self.hi = saturating_step(self.hi, delta);
    }

    /// Ordered pair handed to the edge detector; an inverted pair acts like the swapped one.
    pub fn ordered(&self) -> (f32, f32) {
        let lo = self.lo.min(self.hi);
        let hi = self.lo.max(self.hi);
        (f32::from(lo), f32::from(hi))
    }
}

impl fmt::Display for ThresholdPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lo={} hi={}", self.lo, self.hi)
    }
}

fn saturating_step(value: u8, delta: i16) -> u8 {
    (i16::from(value) + delta).clamp(0, 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> MonitorBounds {
        MonitorBounds {
            left: 0,
            top: 0,
            width: 1920,
            height: 1080,
        }
    }

    fn assert_contained(region: Region, mon: &MonitorBounds) {
        assert!(region.left >= mon.left, "{region:?}");
        assert!(region.top >= mon.top, "{region:?}");
        assert!(region.right <= mon.right(), "{region:?}");
        assert!(region.bottom <= mon.bottom(), "{region:?}");
        assert!(region.width() >= 1, "{region:?}");
        assert!(region.height() >= 1, "{region:?}");
    }

    #[test]
    fn corners_must_be_below_and_right() {
        assert!(Region::from_corners((10, 10), (20, 20)).is_ok());
        assert_eq!(
            Region::from_corners((10, 10), (10, 20)),
            Err(CalibrationError::InvalidRegion {
                left: 10,
                top: 10,
                right: 10,
                bottom: 20
            })
        );
        assert!(Region::from_corners((10, 10), (20, 5)).is_err());
    }

    #[test]
    fn clamp_keeps_inside_region_untouched() {
        let region = Region::from_corners((100, 100), (300, 250)).unwrap();
        assert_eq!(region.clamp(&monitor()), region);
    }

    #[test]
    fn clamp_contains_regions_across_monitors() {
        let monitors = [
            monitor(),
            MonitorBounds {
                left: -1280,
                top: -200,
                width: 1280,
                height: 1024,
            },
            MonitorBounds {
                left: 50,
                top: 50,
                width: 1,
                height: 1,
            },
        ];
        let coords = [-5000, -1281, -1, 0, 1, 49, 50, 51, 640, 1919, 1920, 5000];
        for mon in &monitors {
            for &l in &coords {
                for &t in &coords {
                    for &w in &[1, 2, 37, 4000] {
                        for &h in &[1, 3, 900] {
                            let region = Region::from_corners((l, t), (l + w, t + h)).unwrap();
                            assert_contained(region.clamp(mon), mon);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn clamp_after_shift_past_edge() {
        let mon = monitor();
        let region = Region::from_corners((1900, 1000), (1915, 1075))
            .unwrap()
            .shifted(50, 50)
            .clamp(&mon);
        assert_contained(region, &mon);
        assert_eq!(region.left, 1919);
        assert_eq!(region.right, 1920);
        assert_eq!(region.bottom, 1080);
    }

    #[test]
    fn resize_below_one_pixel_is_clamped_back() {
        let mon = monitor();
        let region = Region::from_corners((10, 10), (12, 12))
            .unwrap()
            .resized(-5, -5)
            .clamp(&mon);
        assert_eq!(region.width(), 1);
        assert_eq!(region.height(), 1);
    }

    #[test]
    fn parses_region_flag() {
        let region: Region = "100, 100,300,250".parse().unwrap();
        assert_eq!(region.width(), 200);
        assert_eq!(region.height(), 150);
        assert!("1,2,3".parse::<Region>().is_err());
        assert!("5,5,1,1".parse::<Region>().is_err());
        assert!("a,b,c,d".parse::<Region>().is_err());
    }

    #[test]
    fn thresholds_saturate_instead_of_wrapping() {
        let mut pair = ThresholdPair::new(0, 255);
        for _ in 0..10 {
            pair.adjust_lo(-1);
            pair.adjust_hi(1);
        }
        assert_eq!(pair, ThresholdPair::new(0, 255));

        for _ in 0..300 {
            pair.adjust_lo(1);
            pair.adjust_hi(-1);
        }
        assert_eq!(pair, ThresholdPair::new(255, 0));

        let mut pair = ThresholdPair::new(50, 150);
        pair.adjust_lo(1);
        pair.adjust_hi(-1);
        assert_eq!(pair, ThresholdPair::new(51, 149));
    }

    #[test]
    fn inverted_thresholds_are_ordered() {
        assert_eq!(ThresholdPair::new(200, 10).ordered(), (10.0, 200.0));
        assert_eq!(ThresholdPair::new(10, 200).ordered(), (10.0, 200.0));
    }
}
