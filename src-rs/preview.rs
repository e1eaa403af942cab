//! minifb-backed windows: the tuner preview and the corner prompt.

use anyhow::{anyhow, Result};
use image::RgbImage;
use minifb::{Key, KeyRepeat, ScaleMode, Window, WindowOptions};

use crate::calibrate::{Command, PreviewSurface};
use crate::hud::{draw_bitmap_text, to_framebuffer, BLACK, WHITE};
use crate::pointer::{ConfirmWait, WaitOutcome};

const PREVIEW_TITLE: &str = "Live Region Tuner  (RAW | EDGES)";
const PROMPT_TITLE: &str = "Press ENTER to mark corner";
const PROMPT_TEXT: &str = "Press ENTER to record mouse position (Esc/Q cancel)";

/// Maps a pressed key (with Shift state) to a tuner command.
pub fn command_for(key: Key, shift: bool) -> Option<Command> {
    let command = match key {
        Key::Left => Command::Move { dx: -1, dy: 0 },
        Key::Right => Command::Move { dx: 1, dy: 0 },
        Key::Up => Command::Move { dx: 0, dy: -1 },
        Key::Down => Command::Move { dx: 0, dy: 1 },
        Key::J => Command::Resize { dw: -1, dh: 0 },
        Key::L => Command::Resize { dw: 1, dh: 0 },
        Key::I => Command::Resize { dw: 0, dh: -1 },
        Key::K => Command::Resize { dw: 0, dh: 1 },
        Key::LeftBracket if shift => Command::Hi(-1),
        Key::RightBracket if shift => Command::Hi(1),
        Key::LeftBracket => Command::Lo(-1),
        Key::RightBracket => Command::Lo(1),
        Key::Semicolon => Command::FineStep,
        Key::S => Command::Save,
        Key::P => Command::Print,
        Key::Q | Key::Escape => Command::Done,
        _ => return None,
    };
    Some(command)
}

/// Live preview window. Opened on the first frame and kept for the whole
/// session; later frames of a different size are stretched into it.
pub struct PreviewWindow {
    window: Option<Window>,
    closed: bool,
}

/// Resizable, aspect-preserving options so a region resize never reopens the window.
fn preview_options() -> WindowOptions {
    WindowOptions {
        resize: true,
        scale_mode: ScaleMode::AspectRatioStretch,
        ..WindowOptions::default()
    }
}

impl PreviewWindow {
    pub fn open() -> Result<Self> {
        Ok(Self {
            window: None,
            closed: false,
        })
    }

    fn window_for(&mut self, width: usize, height: usize) -> Result<&mut Window> {
        if self.window.is_none() {
            let mut window = Window::new(PREVIEW_TITLE, width, height, preview_options())
                .map_err(|e| anyhow!("failed to open preview window: {e}"))?;
            window.set_target_fps(60);
            self.window = Some(window);
        }
        self.window
            .as_mut()
            .ok_or_else(|| anyhow!("preview window missing"))
    }
}

impl PreviewSurface for PreviewWindow {
    fn is_open(&self) -> bool {
        !self.closed
    }

    fn show(&mut self, frame: &RgbImage) -> Result<()> {
        let (w, h) = (frame.width() as usize, frame.height() as usize);
        let buffer = to_framebuffer(frame);
        let window = self.window_for(w, h)?;
        window
            .update_with_buffer(&buffer, w, h)
            .map_err(|e| anyhow!("failed to update preview window: {e}"))?;
        if !window.is_open() {
            self.closed = true;
        }
        Ok(())
    }

    fn poll(&mut self) -> Vec<Command> {
        let Some(window) = self.window.as_ref() else {
            return Vec::new();
        };
        let shift = window.is_key_down(Key::LeftShift) || window.is_key_down(Key::RightShift);
        window
            .get_keys_pressed(KeyRepeat::Yes)
            .into_iter()
            .filter_map(|key| command_for(key, shift))
            .collect()
    }
}

/// Small always-on-top window that waits for Enter (confirm) or Esc/Q (cancel).
#[derive(Default)]
pub struct PromptWindowWait;

impl PromptWindowWait {
    fn render() -> Vec<u32> {
        let mut img = RgbImage::from_pixel(460, 80, WHITE);
        draw_bitmap_text(&mut img, 10, 36, PROMPT_TEXT, BLACK);
        to_framebuffer(&img)
    }
}

impl ConfirmWait for PromptWindowWait {
    fn name(&self) -> &'static str {
        "prompt window"
    }

    fn wait(&mut self, _prompt: &str) -> WaitOutcome {
        let mut window = match Window::new(PROMPT_TITLE, 460, 80, WindowOptions::default()) {
            Ok(window) => window,
            Err(err) => return WaitOutcome::Unavailable(err.to_string()),
        };
        window.topmost(true);
        window.set_target_fps(100);
        let buffer = Self::render();

        if let Err(err) = window.update_with_buffer(&buffer, 460, 80) {
            return WaitOutcome::Unavailable(err.to_string());
        }
        // Discard anything already pending so a previous Enter is not reused.
        let _ = window.get_keys_pressed(KeyRepeat::No);

        while window.is_open() {
            if let Err(err) = window.update_with_buffer(&buffer, 460, 80) {
                return WaitOutcome::Unavailable(err.to_string());
            }
            for key in window.get_keys_pressed(KeyRepeat::No) {
                match key {
                    Key::Enter | Key::NumPadEnter => return WaitOutcome::Confirmed,
                    Key::Escape | Key::Q => return WaitOutcome::Cancelled,
                    _ => {}
                }
            }
        }
        WaitOutcome::Cancelled
    }
}
