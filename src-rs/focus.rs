//! Best-effort foregrounding of the target window by title substring.

use crate::shell::Diagnostic;

/// Brings the first visible window whose title contains `title_substring`
/// (case-insensitive) to the foreground.
pub fn focus_window(title_substring: &str) -> Diagnostic {
    let needle = title_substring.trim();
    if needle.is_empty() {
        return Diagnostic::failed("empty_title", "no title substring given");
    }
    platform::focus(needle)
}

/// Case-insensitive substring match against a window title.
#[cfg(any(target_os = "windows", test))]
pub fn title_matches(title: &str, needle: &str) -> bool {
    !needle.is_empty() && title.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(target_os = "windows")]
mod platform {
    use windows::Win32::Foundation::{BOOL, HWND, LPARAM};
    use windows::Win32::UI::WindowsAndMessaging::{
        EnumWindows, GetWindowTextW, IsWindowVisible, SetForegroundWindow, ShowWindow, SW_RESTORE,
    };

    use super::title_matches;
    use crate::shell::Diagnostic;

    struct Search<'a> {
        needle: &'a str,
        found: Option<HWND>,
    }

    unsafe extern "system" fn visit(hwnd: HWND, lparam: LPARAM) -> BOOL {
        // SAFETY: lparam carries the `Search` owned by `focus` for the duration of EnumWindows.
        let search = &mut *(lparam.0 as *mut Search<'_>);
        if IsWindowVisible(hwnd).as_bool() {
            let mut buf = [0u16; 512];
            let len = GetWindowTextW(hwnd, &mut buf);
            if len > 0 {
                let title = String::from_utf16_lossy(&buf[..len as usize]);
                if title_matches(&title, search.needle) {
                    search.found = Some(hwnd);
                }
            }
        }
        BOOL(1)
    }

    pub(super) fn focus(needle: &str) -> Diagnostic {
        let mut search = Search {
            needle,
            found: None,
        };
        // SAFETY: `search` outlives the synchronous EnumWindows call.
        let enumerated = unsafe {
            EnumWindows(Some(visit), LPARAM(&mut search as *mut Search<'_> as isize))
        };
        if let Err(err) = enumerated {
            return Diagnostic::failed("enum_windows_failed", err.to_string());
        }
        let Some(hwnd) = search.found else {
            return Diagnostic::failed("not_found", format!("no visible window contains {needle:?}"));
        };
        // SAFETY: hwnd came from EnumWindows just above.
        let raised = unsafe {
            let _ = ShowWindow(hwnd, SW_RESTORE);
            SetForegroundWindow(hwnd).as_bool()
        };
        if raised {
            Diagnostic {
                message: Some("focused".to_string()),
                ..Diagnostic::succeeded(1)
            }
        } else {
            Diagnostic::failed("denied", "SetForegroundWindow was refused")
        }
    }
}

#[cfg(target_os = "macos")]
mod platform {
    use std::time::Duration;

    use crate::shell::{applescript_escape, run_with_retry, Diagnostic};

    pub(super) fn focus(needle: &str) -> Diagnostic {
        let escaped = applescript_escape(needle);
        let script = format!(
            "set needle to \"{escaped}\"\n\
             tell application \"System Events\"\n\
             repeat with p in (processes whose visible is true)\n\
             repeat with w in windows of p\n\
             ignoring case\n\
             if name of w contains needle then\n\
             set frontmost of p to true\n\
             perform action \"AXRaise\" of w\n\
             return \"ok\"\n\
             end if\n\
             end ignoring\n\
             end repeat\n\
             end repeat\n\
             end tell\n\
             return \"missing\""
        );
        let (stdout, mut diag) = run_with_retry(
            "osascript",
            &["-e", &script],
            2,
            Duration::from_millis(1500),
            Duration::from_millis(40),
        );
        match stdout.as_deref() {
            Some("ok") => diag.message = Some("focused".to_string()),
            Some(_) => {
                diag.ok = false;
                diag.error_code = Some("not_found".to_string());
                diag.message = Some(format!("no visible window contains {needle:?}"));
            }
            None => {}
        }
        diag
    }
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
mod platform {
    use crate::shell::{run_once, Diagnostic};

    pub(super) fn focus(needle: &str) -> Diagnostic {
        let wmctrl = run_once("wmctrl", &["-a", needle]);
        if wmctrl.ok {
            return wmctrl;
        }
        let xdotool = run_once(
            "xdotool",
            &["search", "--onlyvisible", "--name", needle, "windowactivate"],
        );
        if xdotool.ok {
            return xdotool;
        }
        Diagnostic::failed(
            "not_found",
            format!(
                "wmctrl ({}) and xdotool ({}) could not focus {needle:?}",
                wmctrl.summary(),
                xdotool.summary()
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_match_ignores_case() {
        assert!(title_matches("Final Fantasy XIV", "fantasy"));
        assert!(title_matches("notepad", "NOTE"));
        assert!(!title_matches("Terminal", "game"));
        assert!(!title_matches("anything", ""));
    }

    #[test]
    fn blank_title_is_rejected_without_touching_windows() {
        let diag = focus_window("   ");
        assert!(!diag.ok);
        assert_eq!(diag.error_code.as_deref(), Some("empty_title"));
    }
}
