/// Playback control state of the metronome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Running,
    Paused,
    /// Terminal, nothing leaves this state.
    Stopped,
}

/// Single owner of [`TransportState`].
#[derive(Debug, Default)]
pub struct Transport {
    state: TransportState,
}

impl Transport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Flips between running and paused and returns the new state.
    /// A stopped transport stays stopped.
    pub fn toggle_pause(&mut self) -> TransportState {
        self.state = match self.state {
            TransportState::Running => TransportState::Paused,
            TransportState::Paused => TransportState::Running,
            TransportState::Stopped => TransportState::Stopped,
        };
        self.state
    }

    pub fn stop(&mut self) {
        self.state = TransportState::Stopped;
    }

    pub fn is_running(&self) -> bool {
        self.state == TransportState::Running
    }

    pub fn is_paused(&self) -> bool {
        self.state == TransportState::Paused
    }

    pub fn is_stopped(&self) -> bool {
        self.state == TransportState::Stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_running_and_toggles() {
        let mut transport = Transport::new();
        assert!(transport.is_running());

        assert_eq!(transport.toggle_pause(), TransportState::Paused);
        assert!(transport.is_paused());
        assert_eq!(transport.toggle_pause(), TransportState::Running);
    }

    #[test]
    fn stop_is_terminal_from_any_state() {
        let mut transport = Transport::new();
        transport.toggle_pause();
        transport.stop();
        assert!(transport.is_stopped());

        assert_eq!(transport.toggle_pause(), TransportState::Stopped);
        assert!(!transport.is_running());
    }
}
