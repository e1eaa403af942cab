//! Headless sampling loop: edges in the region answer with a double Enter,
//! prolonged silence with a single Enter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::capture::ScreenSource;
use crate::clock::Clock;
use crate::edges::edge_density;
use crate::inject::ConfirmKeyboard;
use crate::region::{Region, ThresholdPair};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerConfig {
    /// Minimum time between two positive triggers.
    pub cooldown: Duration,
    /// `None` disables the idle heartbeat.
    pub idle_timeout: Option<Duration>,
    pub interval: Duration,
    pub double_confirm_delay: Duration,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_millis(400),
            idle_timeout: Some(Duration::from_secs(25)),
            interval: Duration::from_millis(30),
            double_confirm_delay: Duration::from_secs(2),
        }
    }
}

/// What a tick decided to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Activity,
    Idle,
    Wait,
}

/// Time of the last fired action; drives both cooldown and idle windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerState {
    pub last_action: Duration,
}

impl TriggerState {
    pub fn new(last_action: Duration) -> Self {
        Self { last_action }
    }

    pub fn decide(&self, density: f64, now: Duration, config: &TriggerConfig) -> Decision {
        let elapsed = now.saturating_sub(self.last_action);
        if density > 0.0 && elapsed >= config.cooldown {
            Decision::Activity
        } else if config.idle_timeout.is_some_and(|idle| elapsed >= idle) {
            Decision::Idle
        } else {
            Decision::Wait
        }
    }
}

/// Produces the edge density of the watched region for one tick.
pub trait FrameSampler {
    fn sample(&mut self) -> Result<f64>;
}

/// Captures the frozen region and measures its edge density.
pub struct ScreenSampler<S> {
    screen: S,
    region: Region,
    thresholds: ThresholdPair,
}

impl<S: ScreenSource> ScreenSampler<S> {
    pub fn new(screen: S, region: Region, thresholds: ThresholdPair) -> Self {
        Self {
            screen,
            region,
            thresholds,
        }
    }
}

impl<S: ScreenSource> FrameSampler for ScreenSampler<S> {
    fn sample(&mut self) -> Result<f64> {
        let capture = self.screen.grab(self.region)?;
        let gray = image::imageops::grayscale(&capture);
        Ok(edge_density(&gray, self.thresholds))
    }
}

pub struct TriggerLoop<F, C> {
    config: TriggerConfig,
    sampler: F,
    keyboard: ConfirmKeyboard,
    clock: C,
    state: TriggerState,
    next_tick: Duration,
}

impl<F: FrameSampler, C: Clock> TriggerLoop<F, C> {
    /// The idle window starts counting from construction.
    pub fn new(config: TriggerConfig, sampler: F, keyboard: ConfirmKeyboard, clock: C) -> Self {
        let now = clock.now();
        Self::with_state(config, sampler, keyboard, clock, TriggerState::new(now))
    }

    pub fn with_state(
        config: TriggerConfig,
        sampler: F,
        keyboard: ConfirmKeyboard,
        clock: C,
        state: TriggerState,
    ) -> Self {
        let next_tick = clock.now();
        Self {
            config,
            sampler,
            keyboard,
            clock,
            state,
            next_tick,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> TriggerState {
        self.state
    }

    /// Samples once and fires at most one action.
    pub fn tick(&mut self) -> Decision {
        let density = match self.sampler.sample() {
            Ok(density) => density,
            Err(err) => {
                warn!("capture failed, skipping tick: {err:#}");
                return Decision::Wait;
            }
        };

        let decision = self.state.decide(density, self.clock.now(), &self.config);
        match decision {
            Decision::Activity => {
                info!(
                    "TRIGGER: edges={:.3}%  -> initiating double Enter sequence",
                    density * 100.0
                );
                let sent = self
                    .keyboard
                    .double_confirm(self.config.double_confirm_delay, &self.clock);
                info!("TRIGGER-RESULT: double_enter_sent={sent}");
                self.state.last_action = self.clock.now();
            }
            Decision::Idle => {
                let idle = self.config.idle_timeout.unwrap_or_default();
                info!(
                    "IDLE: No trigger for {}s -> initiating single Enter",
                    idle.as_secs_f64()
                );
                let sent = self.keyboard.single_confirm();
                info!("IDLE-RESULT: single_enter_sent={sent}");
                self.state.last_action = self.clock.now();
            }
            Decision::Wait => {}
        }
        decision
    }

    /// Sleeps until the next tick boundary. An overrun restarts the schedule
    /// instead of firing a burst of catch-up ticks.
    pub fn pace(&mut self) {
        self.next_tick += self.config.interval;
        let now = self.clock.now();
        if self.next_tick > now {
            self.clock.sleep(self.next_tick - now);
        } else {
            self.next_tick = now;
        }
    }

    /// Ticks until `stop` is raised.
    pub fn run(&mut self, stop: &AtomicBool) {
        while !stop.load(Ordering::SeqCst) {
            self.tick();
            self.pace();
        }
        info!("Stopped.");
    }
}

/// Scan banner logged before the first tick.
pub fn log_banner(region: Region, thresholds: ThresholdPair, config: &TriggerConfig, channels: &[&str]) {
    info!("=== Scanning (edge ratio > 0.00%) ===");
    info!("Region {region}");
    info!("Canny {thresholds}");
    info!(
        "Cooldown {}s, confirm delay {} ms, interval {} ms",
        config.cooldown.as_secs_f64(),
        config.double_confirm_delay.as_millis(),
        config.interval.as_millis()
    );
    match config.idle_timeout {
        Some(idle) => info!("Idle timeout set to {} seconds.", idle.as_secs_f64()),
        None => info!("Idle timeout disabled."),
    }
    info!("Injection channels: {}", channels.join(", "));
}
