//! Confirm-key injection.
//!
//! Different target applications honour different input paths (games in
//! exclusive input mode often ignore everything but raw scancodes), so a single
//! press is broadcast on every configured channel and counts as sent if any
//! channel accepted it.

use std::time::Duration;

use clap::ValueEnum;
use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use tracing::{debug, info, warn};

use crate::clock::Clock;

/// One way of delivering an Enter press to the OS.
pub trait KeyInjector {
    fn name(&self) -> &'static str;
    /// Sends one Enter press; `false` if this channel could not deliver it.
    fn try_press(&mut self) -> bool;
}

/// Injection channels selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Channel {
    /// UI-automation key press (enigo)
    Enigo,
    /// OS-level global key send (rdev)
    Rdev,
    /// Low-level hardware scancode event
    Scancode,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Enigo, Channel::Rdev, Channel::Scancode];
}

pub struct EnigoInjector {
    enigo: Enigo,
}

impl EnigoInjector {
    pub fn new() -> anyhow::Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| anyhow::anyhow!("enigo unavailable: {e:?}"))?;
        Ok(Self { enigo })
    }
}

impl KeyInjector for EnigoInjector {
    fn name(&self) -> &'static str {
        "enigo"
    }

    fn try_press(&mut self) -> bool {
        match self.enigo.key(Key::Return, Direction::Click) {
            Ok(()) => true,
            Err(err) => {
                debug!("enigo press failed: {err:?}");
                false
            }
        }
    }
}

pub struct RdevInjector;

impl KeyInjector for RdevInjector {
    fn name(&self) -> &'static str {
        "rdev"
    }

    fn try_press(&mut self) -> bool {
        for event in [
            rdev::EventType::KeyPress(rdev::Key::Return),
            rdev::EventType::KeyRelease(rdev::Key::Return),
        ] {
            if let Err(err) = rdev::simulate(&event) {
                debug!("rdev simulate failed: {err:?}");
                return false;
            }
            // Some backends drop events sent back-to-back.
            std::thread::sleep(Duration::from_millis(10));
        }
        true
    }
}

/// Raw scancode for the main Enter key on the platform's lowest input layer.
pub struct ScancodeInjector;

impl KeyInjector for ScancodeInjector {
    fn name(&self) -> &'static str {
        "scancode"
    }

    fn try_press(&mut self) -> bool {
        scancode::press_enter()
    }
}

#[cfg(target_os = "windows")]
mod scancode {
    use std::mem::size_of;

    use tracing::debug;
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYEVENTF_KEYUP,
        KEYEVENTF_SCANCODE, VIRTUAL_KEY,
    };

    const SC_ENTER: u16 = 0x1C;

    fn key_input(up: bool) -> INPUT {
        let flags = if up {
            KEYEVENTF_SCANCODE | KEYEVENTF_KEYUP
        } else {
            KEYEVENTF_SCANCODE
        };
        INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: VIRTUAL_KEY(0),
                    wScan: SC_ENTER,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        }
    }

    pub(super) fn press_enter() -> bool {
        let inputs = [key_input(false), key_input(true)];
        // SAFETY: `inputs` is a valid, initialised slice of keyboard INPUT records.
        let sent = unsafe { SendInput(&inputs, size_of::<INPUT>() as i32) };
        if sent as usize != inputs.len() {
            debug!("SendInput delivered {sent}/{} events", inputs.len());
            return false;
        }
        true
    }
}

#[cfg(target_os = "macos")]
mod scancode {
    use tracing::debug;

    use crate::shell::run_once;

    /// Hardware key code of Return on Apple keyboards.
    const KEY_CODE_RETURN: &str = "36";

    pub(super) fn press_enter() -> bool {
        let script = format!("tell application \"System Events\" to key code {KEY_CODE_RETURN}");
        let diag = run_once("osascript", &["-e", &script]);
        if !diag.ok {
            debug!("osascript key code failed: {}", diag.summary());
        }
        diag.ok
    }
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
mod scancode {
    use tracing::debug;

    use crate::shell::run_once;

    pub(super) fn press_enter() -> bool {
        let diag = run_once("xdotool", &["key", "--clearmodifiers", "Return"]);
        if !diag.ok {
            debug!("xdotool key failed: {}", diag.summary());
        }
        diag.ok
    }
}

/// The confirm key, broadcast on every available injector.
pub struct ConfirmKeyboard {
    injectors: Vec<Box<dyn KeyInjector>>,
}

impl ConfirmKeyboard {
    pub fn new(injectors: Vec<Box<dyn KeyInjector>>) -> Self {
        Self { injectors }
    }

    /// Builds the requested channels, dropping any that cannot start.
    pub fn from_channels(channels: &[Channel]) -> Self {
        let mut injectors: Vec<Box<dyn KeyInjector>> = Vec::new();
        for channel in channels {
            if injectors.iter().any(|i| i.name() == channel_name(*channel)) {
                continue;
            }
            match channel {
                Channel::Enigo => match EnigoInjector::new() {
                    Ok(injector) => injectors.push(Box::new(injector)),
                    Err(err) => warn!("[inject] enigo channel disabled: {err:#}"),
                },
                Channel::Rdev => injectors.push(Box::new(RdevInjector)),
                Channel::Scancode => injectors.push(Box::new(ScancodeInjector)),
            }
        }
        if injectors.is_empty() {
            warn!("[inject] no injection channel available; confirm presses will all fail");
        }
        Self::new(injectors)
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.injectors.iter().map(|i| i.name()).collect()
    }

    /// Tries every channel in order; true if at least one delivered the press.
    pub fn press_once(&mut self) -> bool {
        let mut ok = false;
        for injector in &mut self.injectors {
            let sent = injector.try_press();
            info!("  {} -> {}", injector.name(), if sent { "ok" } else { "failed" });
            ok |= sent;
        }
        ok
    }

    /// Enter, wait `delay`, Enter. Succeeds only if both presses went out.
    pub fn double_confirm(&mut self, delay: Duration, clock: &dyn Clock) -> bool {
        info!("ACTION: ENTER (1/2)");
        let first = self.press_once();
        info!("RESULT: enter1={first}");
        info!("ACTION: WAIT {} ms", delay.as_millis());
        clock.sleep(delay);
        info!("ACTION: ENTER (2/2)");
        let second = self.press_once();
        info!("RESULT: enter2={second}");
        first && second
    }

    pub fn single_confirm(&mut self) -> bool {
        info!("ACTION: ENTER (idle timeout)");
        let sent = self.press_once();
        info!("RESULT: enter1={sent}");
        sent
    }
}

fn channel_name(channel: Channel) -> &'static str {
    match channel {
        Channel::Enigo => "enigo",
        Channel::Rdev => "rdev",
        Channel::Scancode => "scancode",
    }
}
