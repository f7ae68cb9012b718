use anyhow::Result;
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::{execute, terminal};
use std::io::{self, IsTerminal, Write, stdout};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, warn};

const POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    DebugOn,
    DebugOff,
    DebugToggle,
    Quit,
}

/// Map a terminal key event to an action. With `enhanced` the terminal
/// reports releases, so the debug key works while held; without it each
/// press toggles.
pub fn translate(event: &KeyEvent, enhanced: bool) -> Option<KeyAction> {
    let ctrl = event.modifiers.contains(KeyModifiers::CONTROL);

    match (event.code, event.kind) {
        (KeyCode::Char('c'), KeyEventKind::Press) if ctrl => Some(KeyAction::Quit),
        (KeyCode::Char('q') | KeyCode::Esc, KeyEventKind::Press) => Some(KeyAction::Quit),
        (KeyCode::Char('d'), KeyEventKind::Press) if enhanced => Some(KeyAction::DebugOn),
        (KeyCode::Char('d'), KeyEventKind::Release) if enhanced => Some(KeyAction::DebugOff),
        (KeyCode::Char('d'), KeyEventKind::Press) => Some(KeyAction::DebugToggle),
        _ => None,
    }
}

/// Log writer that keeps lines readable while the terminal is in raw mode,
/// where a bare `\n` no longer returns the cursor.
pub struct CrlfWriter<W> {
    inner: W,
    enabled: bool,
}

impl<W: Write> CrlfWriter<W> {
    pub fn new(inner: W, enabled: bool) -> Self {
        Self { inner, enabled }
    }
}

impl<W: Write> Write for CrlfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.enabled {
            return self.inner.write(buf);
        }

        let mut start = 0;
        for (i, b) in buf.iter().enumerate() {
            if *b == b'\n' && (i == 0 || buf[i - 1] != b'\r') {
                self.inner.write_all(&buf[start..i])?;
                self.inner.write_all(b"\r\n")?;
                start = i + 1;
            }
        }
        self.inner.write_all(&buf[start..])?;

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// State driven by key actions, read by the frame loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Controls {
    pub hand_dots: bool,
    pub quit: bool,
}

impl Controls {
    pub fn handle(&mut self, action: KeyAction) {
        match action {
            KeyAction::DebugOn => self.hand_dots = true,
            KeyAction::DebugOff => self.hand_dots = false,
            KeyAction::DebugToggle => self.hand_dots = !self.hand_dots,
            KeyAction::Quit => self.quit = true,
        }
    }
}

/// Reads the terminal on a background thread and forwards key actions.
/// Restores the terminal when dropped.
pub struct KeyListener {
    actions: flume::Receiver<KeyAction>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    enhanced: bool,
}

impl Drop for KeyListener {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Key listener panicked");
            }
        }

        if self.enhanced {
            if let Err(e) = execute!(stdout(), PopKeyboardEnhancementFlags) {
                warn!("Failed to restore keyboard flags: {e:?}");
            }
        }
        if let Err(e) = terminal::disable_raw_mode() {
            error!("Failed to leave raw mode: {e:?}");
        }
    }
}

impl KeyListener {
    /// `None` when stdin is not a terminal.
    pub fn start() -> Result<Option<KeyListener>> {
        if !std::io::stdin().is_terminal() {
            debug!("stdin is not a terminal, keyboard controls disabled");
            return Ok(None);
        }

        let enhanced = terminal::supports_keyboard_enhancement().unwrap_or(false);
        terminal::enable_raw_mode()?;
        if enhanced {
            execute!(
                stdout(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
        }
        debug!("Listening for keys, release events: {enhanced}");

        let (tx, rx) = flume::unbounded();
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("keys".into())
            .spawn(move || {
                while !thread_stop.load(Ordering::Relaxed) {
                    match event::poll(POLL) {
                        Ok(false) => continue,
                        Ok(true) => {}
                        Err(e) => {
                            error!("Failed to poll terminal: {e:?}");
                            break;
                        }
                    }

                    let action = match event::read() {
                        Ok(Event::Key(key)) => translate(&key, enhanced),
                        Ok(_) => None,
                        Err(e) => {
                            error!("Failed to read terminal event: {e:?}");
                            break;
                        }
                    };

                    if let Some(action) = action {
                        if tx.send(action).is_err() {
                            break;
                        }
                    }
                }
            })?;

        Ok(Some(KeyListener {
            actions: rx,
            stop,
            handle: Some(handle),
            enhanced,
        }))
    }

    pub fn try_iter(&self) -> impl Iterator<Item = KeyAction> + '_ {
        self.actions.try_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, kind: KeyEventKind) -> KeyEvent {
        KeyEvent::new_with_kind(code, KeyModifiers::NONE, kind)
    }

    #[test]
    fn test_quit_keys() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(translate(&ctrl_c, false), Some(KeyAction::Quit));
        assert_eq!(
            translate(&key(KeyCode::Char('q'), KeyEventKind::Press), true),
            Some(KeyAction::Quit)
        );
        assert_eq!(
            translate(&key(KeyCode::Esc, KeyEventKind::Press), false),
            Some(KeyAction::Quit)
        );
        assert_eq!(translate(&key(KeyCode::Char('c'), KeyEventKind::Press), false), None);
    }

    #[test]
    fn test_debug_key_held() {
        let mut controls = Controls::default();
        let press = key(KeyCode::Char('d'), KeyEventKind::Press);
        let repeat = key(KeyCode::Char('d'), KeyEventKind::Repeat);
        let release = key(KeyCode::Char('d'), KeyEventKind::Release);

        for event in [&press, &repeat, &repeat] {
            if let Some(action) = translate(event, true) {
                controls.handle(action);
            }
            assert!(controls.hand_dots);
        }

        controls.handle(translate(&release, true).unwrap());
        assert!(!controls.hand_dots);
    }

    #[test]
    fn test_debug_key_toggle() {
        let mut controls = Controls::default();
        let press = key(KeyCode::Char('d'), KeyEventKind::Press);

        controls.handle(translate(&press, false).unwrap());
        assert!(controls.hand_dots);
        controls.handle(translate(&press, false).unwrap());
        assert!(!controls.hand_dots);
        assert!(!controls.quit);
    }

    #[test]
    fn test_crlf_writer() {
        let mut w = CrlfWriter::new(Vec::new(), true);
        write!(w, "one\ntwo\r\nthree\n").unwrap();
        assert_eq!(w.inner, b"one\r\ntwo\r\nthree\r\n");

        let mut w = CrlfWriter::new(Vec::new(), false);
        write!(w, "one\n").unwrap();
        assert_eq!(w.inner, b"one\n");
    }
}
