//! Operator point acquisition: wait for a confirm key, then read the pointer.

use std::io::{self, BufRead, Write};
use std::thread;

use anyhow::{anyhow, bail, Result};
use crossbeam_channel::{unbounded, Receiver, TryRecvError};
use enigo::{Enigo, Mouse, Settings};
use tracing::debug;

use crate::error::CalibrationError;

/// What a confirmation strategy observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Confirmed,
    Cancelled,
    /// The strategy cannot run here; try the next one.
    Unavailable(String),
}

/// One way of waiting for the operator's confirm/cancel key.
pub trait ConfirmWait {
    fn name(&self) -> &'static str;
    fn wait(&mut self, prompt: &str) -> WaitOutcome;
}

pub trait PointerPosition {
    fn position(&self) -> Result<(i32, i32)>;
}

pub struct EnigoPointer {
    enigo: Enigo,
}

impl EnigoPointer {
    pub fn new() -> Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| anyhow!("cannot read pointer position: {e:?}"))?;
        Ok(Self { enigo })
    }
}

impl PointerPosition for EnigoPointer {
    fn position(&self) -> Result<(i32, i32)> {
        self.enigo
            .location()
            .map_err(|e| anyhow!("pointer location unavailable: {e:?}"))
    }
}

/// Tries each confirmation strategy in order of preference; a strategy that
/// reports itself unavailable is dropped for the rest of the run.
pub struct PointAcquirer {
    waits: Vec<Box<dyn ConfirmWait>>,
    pointer: Box<dyn PointerPosition>,
}

impl PointAcquirer {
    pub fn new(waits: Vec<Box<dyn ConfirmWait>>, pointer: Box<dyn PointerPosition>) -> Self {
        Self { waits, pointer }
    }

    /// Blocks until the operator confirms and returns the pointer position at that instant.
    pub fn acquire(&mut self, prompt: &str) -> Result<(i32, i32)> {
        println!("{prompt}");
        while !self.waits.is_empty() {
            let outcome = self.waits[0].wait(prompt);
            match outcome {
                WaitOutcome::Confirmed => return self.pointer.position(),
                WaitOutcome::Cancelled => return Err(CalibrationError::Cancelled.into()),
                WaitOutcome::Unavailable(reason) => {
                    let dropped = self.waits.remove(0);
                    debug!("[pointer] {} unavailable: {reason}", dropped.name());
                }
            }
        }
        bail!("no way to wait for the confirm key: global hook, prompt window and console all unavailable")
    }
}

enum HookMessage {
    Key(rdev::Key),
    Failed(String),
}

/// Global keyboard hook; works whichever window has focus.
#[derive(Default)]
pub struct GlobalHookWait {
    events: Option<Receiver<HookMessage>>,
}

impl GlobalHookWait {
    fn events(&mut self) -> &Receiver<HookMessage> {
        self.events.get_or_insert_with(|| {
            let (tx, rx) = unbounded();
            thread::spawn(move || {
                let key_tx = tx.clone();
                let listened = rdev::listen(move |event| {
                    if let rdev::EventType::KeyPress(key) = event.event_type {
                        let _ = key_tx.send(HookMessage::Key(key));
                    }
                });
                if let Err(err) = listened {
                    let _ = tx.send(HookMessage::Failed(format!("{err:?}")));
                }
            });
            rx
        })
    }
}

impl ConfirmWait for GlobalHookWait {
    fn name(&self) -> &'static str {
        "global hook"
    }

    fn wait(&mut self, _prompt: &str) -> WaitOutcome {
        let events = self.events().clone();
        // Drop keys pressed before this prompt so an earlier Enter is not reused.
        loop {
            match events.try_recv() {
                Ok(HookMessage::Key(_)) => continue,
                Ok(HookMessage::Failed(reason)) => return WaitOutcome::Unavailable(reason),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    return WaitOutcome::Unavailable("hook thread exited".to_string())
                }
            }
        }
        println!("  Press ENTER to record current mouse position (Esc cancels)...");
        loop {
            match events.recv() {
                Ok(HookMessage::Key(rdev::Key::Return | rdev::Key::KpReturn)) => {
                    return WaitOutcome::Confirmed
                }
                Ok(HookMessage::Key(rdev::Key::Escape)) => return WaitOutcome::Cancelled,
                Ok(HookMessage::Key(_)) => {}
                Ok(HookMessage::Failed(reason)) => return WaitOutcome::Unavailable(reason),
                Err(_) => return WaitOutcome::Unavailable("hook thread exited".to_string()),
            }
        }
    }
}

/// Last resort: a blocking prompt on the controlling console.
pub struct ConsoleWait<R> {
    input: R,
}

impl ConsoleWait<io::StdinLock<'static>> {
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock())
    }
}

impl<R: BufRead> ConsoleWait<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }
}

impl<R: BufRead> ConfirmWait for ConsoleWait<R> {
    fn name(&self) -> &'static str {
        "console"
    }

    fn wait(&mut self, _prompt: &str) -> WaitOutcome {
        print!("  Point the mouse, then press ENTER here (q + ENTER cancels): ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => WaitOutcome::Unavailable("console input closed".to_string()),
            Ok(_) if line.trim().eq_ignore_ascii_case("q") => WaitOutcome::Cancelled,
            Ok(_) => WaitOutcome::Confirmed,
            Err(err) => WaitOutcome::Unavailable(err.to_string()),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::Cursor;

    pub(crate) struct ScriptedWait {
        pub(crate) outcomes: VecDeque<WaitOutcome>,
    }

    impl ScriptedWait {
        pub(crate) fn boxed(outcomes: Vec<WaitOutcome>) -> Box<dyn ConfirmWait> {
            Box::new(Self {
                outcomes: outcomes.into(),
            })
        }
    }

    impl ConfirmWait for ScriptedWait {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn wait(&mut self, _prompt: &str) -> WaitOutcome {
            self.outcomes
                .pop_front()
                .unwrap_or_else(|| WaitOutcome::Unavailable("script exhausted".to_string()))
        }
    }

    pub(crate) struct FixedPointer(pub(crate) std::cell::RefCell<VecDeque<(i32, i32)>>);

    impl FixedPointer {
        pub(crate) fn boxed(points: Vec<(i32, i32)>) -> Box<dyn PointerPosition> {
            Box::new(Self(std::cell::RefCell::new(points.into())))
        }
    }

    impl PointerPosition for FixedPointer {
        fn position(&self) -> Result<(i32, i32)> {
            self.0
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| anyhow!("no pointer samples left"))
        }
    }

    #[test]
    fn confirmed_wait_reads_pointer() {
        let mut acquirer = PointAcquirer::new(
            vec![ScriptedWait::boxed(vec![WaitOutcome::Confirmed])],
            FixedPointer::boxed(vec![(12, 34)]),
        );
        assert_eq!(acquirer.acquire("corner").unwrap(), (12, 34));
    }

    #[test]
    fn unavailable_strategy_falls_through_and_stays_dropped() {
        let mut acquirer = PointAcquirer::new(
            vec![
                ScriptedWait::boxed(vec![
                    WaitOutcome::Unavailable("no hook".to_string()),
                    WaitOutcome::Confirmed,
                ]),
                ScriptedWait::boxed(vec![WaitOutcome::Confirmed, WaitOutcome::Confirmed]),
            ],
            FixedPointer::boxed(vec![(1, 2), (3, 4)]),
        );
        assert_eq!(acquirer.acquire("a").unwrap(), (1, 2));
        assert_eq!(acquirer.waits.len(), 1);
        assert_eq!(acquirer.acquire("b").unwrap(), (3, 4));
    }

    #[test]
    fn cancel_aborts_acquisition() {
        let mut acquirer = PointAcquirer::new(
            vec![
                ScriptedWait::boxed(vec![WaitOutcome::Cancelled]),
                ScriptedWait::boxed(vec![WaitOutcome::Confirmed]),
            ],
            FixedPointer::boxed(vec![(1, 2)]),
        );
        let err = acquirer.acquire("a").unwrap_err();
        assert_eq!(
            err.downcast_ref::<CalibrationError>(),
            Some(&CalibrationError::Cancelled)
        );
    }

    #[test]
    fn exhausted_strategies_is_an_error() {
        let mut acquirer = PointAcquirer::new(
            vec![ScriptedWait::boxed(vec![])],
            FixedPointer::boxed(vec![]),
        );
        let err = acquirer.acquire("a").unwrap_err();
        assert!(err.to_string().contains("no way to wait"));
    }

    #[test]
    fn console_wait_reads_enter_and_q() {
        assert_eq!(ConsoleWait::new(Cursor::new("\n")).wait("p"), WaitOutcome::Confirmed);
        assert_eq!(ConsoleWait::new(Cursor::new(" Q \n")).wait("p"), WaitOutcome::Cancelled);
        assert!(matches!(
            ConsoleWait::new(Cursor::new("")).wait("p"),
            WaitOutcome::Unavailable(_)
        ));
    }
}
