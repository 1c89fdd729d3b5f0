use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::Sender;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal,
};

use crate::{ClackError, Result};

/// How long a read waits before the listener rechecks for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Requests sent to the tick loop from outside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    TogglePause,
    Quit,
    /// The keyboard can no longer be read.
    InputFailed(String),
}

/// Space pauses, Esc, `q` and Ctrl-C quit. Raw mode turns Ctrl-C into a
/// plain key press, so it has to be handled here rather than by the
/// signal handler.
pub fn map_key(key: &KeyEvent) -> Option<ControlEvent> {
    if key.kind == KeyEventKind::Release {
        return None;
    }

    match key.code {
        KeyCode::Char(' ') => Some(ControlEvent::TogglePause),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(ControlEvent::Quit)
        }
        KeyCode::Esc | KeyCode::Char('q') => Some(ControlEvent::Quit),
        _ => None,
    }
}

/// Blocking source of key presses.
pub trait KeySource: Send + 'static {
    /// Waits up to `timeout` for the next key press.
    fn next_key(&mut self, timeout: Duration) -> io::Result<Option<KeyEvent>>;
}

/// Key presses from the controlling terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalKeys;

impl KeySource for TerminalKeys {
    fn next_key(&mut self, timeout: Duration) -> io::Result<Option<KeyEvent>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }

        match event::read()? {
            Event::Key(key) => Ok(Some(key)),
            _ => Ok(None),
        }
    }
}

/// Keeps the terminal in raw mode for as long as it lives.
#[derive(Debug)]
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Result<Self> {
        terminal::enable_raw_mode().map_err(|err| ClackError::InputDevice(err.to_string()))?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(err) = terminal::disable_raw_mode() {
            tracing::warn!("failed to restore the terminal: {err}");
        }
    }
}

/// Background thread turning key presses into [`ControlEvent`]s.
///
/// Dropping the listener stops the thread and releases the terminal.
#[derive(Debug)]
pub struct KeyListener {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    _raw: Option<RawModeGuard>,
}

impl KeyListener {
    /// Puts the terminal into raw mode and starts listening on it.
    pub fn spawn(events: Sender<ControlEvent>) -> Result<Self> {
        let raw = RawModeGuard::enable()?;
        let mut listener = Self::spawn_with(TerminalKeys, events)?;
        listener._raw = Some(raw);
        Ok(listener)
    }

    pub fn spawn_with(source: impl KeySource, events: Sender<ControlEvent>) -> Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = shutdown.clone();
        let handle = thread::Builder::new()
            .name("clack-input".to_string())
            .spawn(move || listen(source, &events, &flag))?;

        Ok(Self {
            shutdown,
            handle: Some(handle),
            _raw: None,
        })
    }

    /// Stops the listener thread and waits for it.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("input listener panicked");
            }
        }
    }
}

impl Drop for KeyListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn listen(mut source: impl KeySource, events: &Sender<ControlEvent>, shutdown: &AtomicBool) {
    while !shutdown.load(Ordering::SeqCst) {
        let key = match source.next_key(POLL_INTERVAL) {
            Ok(Some(key)) => key,
            Ok(None) => continue,
            Err(err) if shutdown.load(Ordering::SeqCst) => {
                tracing::debug!("input closed during shutdown: {err}");
                break;
            }
            Err(err) => {
                tracing::error!("failed to read key press: {err}");
                let _ = events.send(ControlEvent::InputFailed(err.to_string()));
                break;
            }
        };

        let Some(control) = map_key(&key) else {
            continue;
        };
        let quit = control == ControlEvent::Quit;
        if events.send(control).is_err() || quit {
            break;
        }
    }
}

/// Routes SIGINT and SIGTERM to the tick loop as [`ControlEvent::Quit`].
pub fn install_signal_handler(events: Sender<ControlEvent>) -> Result<()> {
    ctrlc::set_handler(move || {
        tracing::debug!("termination signal received");
        let _ = events.send(ControlEvent::Quit);
    })
    .map_err(|err| ClackError::InputDevice(err.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    struct Scripted {
        keys: VecDeque<io::Result<Option<KeyEvent>>>,
    }

    impl Scripted {
        fn new(keys: impl IntoIterator<Item = io::Result<Option<KeyEvent>>>) -> Self {
            Self {
                keys: keys.into_iter().collect(),
            }
        }
    }

    impl KeySource for Scripted {
        fn next_key(&mut self, timeout: Duration) -> io::Result<Option<KeyEvent>> {
            match self.keys.pop_front() {
                Some(next) => next,
                None => {
                    thread::sleep(timeout);
                    Ok(None)
                }
            }
        }
    }

    #[test]
    fn maps_control_keys() {
        assert_eq!(
            map_key(&press(KeyCode::Char(' '))),
            Some(ControlEvent::TogglePause)
        );
        assert_eq!(map_key(&press(KeyCode::Esc)), Some(ControlEvent::Quit));
        assert_eq!(map_key(&press(KeyCode::Char('q'))), Some(ControlEvent::Quit));
        assert_eq!(
            map_key(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(ControlEvent::Quit)
        );
        assert_eq!(map_key(&press(KeyCode::Char('c'))), None);
        assert_eq!(map_key(&press(KeyCode::Enter)), None);

        let release = KeyEvent::new_with_kind(
            KeyCode::Char(' '),
            KeyModifiers::NONE,
            KeyEventKind::Release,
        );
        assert_eq!(map_key(&release), None);
    }

    #[test]
    fn forwards_keys_until_quit() {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let source = Scripted::new([
            Ok(Some(press(KeyCode::Char(' ')))),
            Ok(None),
            Ok(Some(press(KeyCode::Char('x')))),
            Ok(Some(press(KeyCode::Char(' ')))),
            Ok(Some(press(KeyCode::Esc))),
            Ok(Some(press(KeyCode::Char(' ')))),
        ]);

        let listener = KeyListener::spawn_with(source, sender).unwrap();
        let received: Vec<ControlEvent> = receiver
            .iter()
            .take(3)
            .collect();
        listener.shutdown();

        assert_eq!(
            received,
            [
                ControlEvent::TogglePause,
                ControlEvent::TogglePause,
                ControlEvent::Quit
            ]
        );
        // The thread stopped after quit and dropped its sender.
        assert!(receiver.recv().is_err());
    }

    #[test]
    fn read_errors_are_reported() {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let source = Scripted::new([Err(io::Error::other("device unplugged"))]);

        let listener = KeyListener::spawn_with(source, sender).unwrap();
        let event = receiver.recv().unwrap();
        listener.shutdown();

        assert_eq!(
            event,
            ControlEvent::InputFailed("device unplugged".to_string())
        );
    }

    struct ClosedOnShutdown {
        shutdown: Arc<AtomicBool>,
    }

    impl KeySource for ClosedOnShutdown {
        fn next_key(&mut self, _timeout: Duration) -> io::Result<Option<KeyEvent>> {
            self.shutdown.store(true, Ordering::SeqCst);
            Err(io::Error::new(io::ErrorKind::Interrupted, "operation canceled"))
        }
    }

    #[test]
    fn errors_during_shutdown_are_swallowed() {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));
        let source = ClosedOnShutdown {
            shutdown: shutdown.clone(),
        };

        listen(source, &sender, &shutdown);
        assert!(receiver.try_recv().is_err());
    }
}
