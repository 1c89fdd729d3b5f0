use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use crate::{
    BeatDisplay, ClackError, ControlEvent, Result, RunSettings, Sound, Status, TickPlayer,
    TimeSignature, Transport, TransportState,
};

/// Largest timer error absorbed without moving the schedule.
pub const DRIFT_TOLERANCE: Duration = Duration::from_millis(10);

/// Outcome of [`DriftClock::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drift {
    /// The schedule advanced by exactly one interval.
    OnSchedule,
    /// The timer was off by more than [`DRIFT_TOLERANCE`]; the schedule now
    /// counts from the actual fire time.
    Resynced { late: bool, by: Duration },
}

/// Fixed-interval schedule that does not accumulate timer jitter.
#[derive(Debug, Clone)]
pub struct DriftClock {
    interval: Duration,
    next_tick: Instant,
}

impl DriftClock {
    /// The first tick is due at `start`.
    pub fn new(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            next_tick: start,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Instant the next tick is scheduled for.
    pub fn next_tick(&self) -> Instant {
        self.next_tick
    }

    /// Accounts for a timer that fired at `fired_at` and schedules the next
    /// tick.
    ///
    /// Small errors are ignored so the long-run tempo stays exact. A stall
    /// beyond the tolerance is accepted as lost time instead of being made
    /// up with a burst of catch-up ticks.
    pub fn observe(&mut self, fired_at: Instant) -> Drift {
        let (late, by) = match fired_at.checked_duration_since(self.next_tick) {
            Some(by) => (true, by),
            None => (false, self.next_tick.duration_since(fired_at)),
        };

        if by > DRIFT_TOLERANCE {
            self.next_tick = fired_at + self.interval;
            Drift::Resynced { late, by }
        } else {
            self.next_tick += self.interval;
            Drift::OnSchedule
        }
    }
}

/// Counters returned when the tick loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Audible ticks played.
    pub ticks: u64,
    /// Times the schedule had to be rebuilt after a stall.
    pub resyncs: u64,
}

/// Drives the metronome: owns the tick counter, the clock and the transport,
/// and is the only place any of them change.
#[derive(Debug)]
pub struct TickScheduler<P, D> {
    signature: TimeSignature,
    clock: DriftClock,
    transport: Transport,
    report: TickReport,
    player: P,
    display: D,
}

impl<P: TickPlayer, D: BeatDisplay> TickScheduler<P, D> {
    /// Creates a scheduler whose first tick is due immediately.
    pub fn new(settings: RunSettings, player: P, display: D) -> Self {
        Self::starting_at(settings, player, display, Instant::now())
    }

    pub fn starting_at(settings: RunSettings, player: P, display: D, start: Instant) -> Self {
        Self {
            signature: settings.signature,
            clock: DriftClock::new(settings.beat_interval(), start),
            transport: Transport::new(),
            report: TickReport::default(),
            player,
            display,
        }
    }

    pub fn interval(&self) -> Duration {
        self.clock.interval()
    }

    pub fn clock(&self) -> &DriftClock {
        &self.clock
    }

    pub fn state(&self) -> TransportState {
        self.transport.state()
    }

    /// Number of audible ticks so far.
    pub fn ticks(&self) -> u64 {
        self.report.ticks
    }

    /// Beat index the next audible tick will land on.
    pub fn next_beat(&self) -> u32 {
        (self.report.ticks % u64::from(self.signature.beats)) as u32
    }

    /// Handles one timer expiry.
    ///
    /// The clock always advances. Sound and display only happen while
    /// running, so a paused metronome keeps its beat phase.
    pub fn on_timer(&mut self, fired_at: Instant) -> Result<()> {
        if self.transport.is_stopped() {
            return Ok(());
        }

        if let Drift::Resynced { late, by } = self.clock.observe(fired_at) {
            self.report.resyncs += 1;
            tracing::debug!(late, drift = ?by, "timer drifted, resynchronised");
        }

        if !self.transport.is_running() {
            return Ok(());
        }

        let beat = self.next_beat();
        self.player.play_tick(Sound::for_beat(beat));
        self.display.render_beat(self.signature.beats, beat)?;
        self.report.ticks += 1;
        Ok(())
    }

    pub fn on_control(&mut self, event: ControlEvent) -> Result<()> {
        match event {
            ControlEvent::TogglePause => {
                let status = match self.transport.toggle_pause() {
                    TransportState::Paused => Status::Paused,
                    TransportState::Running => Status::Resumed,
                    TransportState::Stopped => return Ok(()),
                };
                tracing::debug!(%status, ticks = self.report.ticks, "transport toggled");
                self.display.show_status(status)
            }
            ControlEvent::Quit => {
                self.stop();
                Ok(())
            }
            ControlEvent::InputFailed(reason) => {
                self.stop();
                Err(ClackError::InputDevice(reason))
            }
        }
    }

    /// Runs until a quit request arrives on `controls` and returns the
    /// final counters.
    ///
    /// A closed control channel counts as a quit request.
    pub fn run(mut self, controls: &Receiver<ControlEvent>) -> Result<TickReport> {
        tracing::debug!(
            signature = %self.signature,
            interval = ?self.clock.interval(),
            "metronome started"
        );

        while !self.transport.is_stopped() {
            let timer = crossbeam_channel::at(self.clock.next_tick());

            crossbeam_channel::select! {
                // The message is the deadline itself; drift has to be
                // measured against the time the wakeup really happened.
                recv(timer) -> _ => {
                    self.on_timer(Instant::now())?;
                    if self.transport.is_paused() {
                        self.drain(controls)?;
                    }
                }
                recv(controls) -> event => match event {
                    Ok(event) => self.on_control(event)?,
                    Err(_) => {
                        tracing::debug!("control channel closed");
                        self.stop();
                    }
                },
            }
        }

        self.display.clear()?;
        tracing::debug!(
            ticks = self.report.ticks,
            resyncs = self.report.resyncs,
            "metronome stopped"
        );
        Ok(self.report)
    }

    /// Handles whatever is already queued without blocking.
    fn drain(&mut self, controls: &Receiver<ControlEvent>) -> Result<()> {
        while !self.transport.is_stopped() {
            let Ok(event) = controls.try_recv() else {
                break;
            };
            self.on_control(event)?;
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.player.silence();
        self.transport.stop();
    }
}
