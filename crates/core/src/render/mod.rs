use std::{
    fmt,
    io::{self, Stdout, Write},
};

use crossterm::{
    cursor::MoveTo,
    queue,
    terminal::{Clear, ClearType},
};

use crate::Result;

pub const HELP_LINE: &str = "Press [ESC] to quit, [SPACEBAR] to pause the metronome";

const BEAT_FILLED: char = '\u{25CF}';
const BEAT_EMPTY: char = '\u{25CB}';

/// One glyph per beat of the measure, the current beat filled.
pub fn beat_row(beats: u32, index: u32) -> String {
    (0..beats)
        .map(|beat| if beat == index { BEAT_FILLED } else { BEAT_EMPTY })
        .collect()
}

/// Transport change announced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Paused,
    Resumed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Paused => f.write_str("Paused"),
            Self::Resumed => f.write_str("Resumed"),
        }
    }
}

/// Presentation side of the metronome. Purely reactive: it shows what the
/// scheduler tells it and never feeds anything back.
pub trait BeatDisplay {
    fn render_beat(&mut self, beats: u32, index: u32) -> Result<()>;

    fn show_status(&mut self, status: Status) -> Result<()>;

    /// Wipes the indicator once the metronome has stopped.
    fn clear(&mut self) -> Result<()>;
}

impl<T: BeatDisplay + ?Sized> BeatDisplay for &mut T {
    fn render_beat(&mut self, beats: u32, index: u32) -> Result<()> {
        (**self).render_beat(beats, index)
    }

    fn show_status(&mut self, status: Status) -> Result<()> {
        (**self).show_status(status)
    }

    fn clear(&mut self) -> Result<()> {
        (**self).clear()
    }
}

/// Redraws the beat indicator in place at the top of a terminal.
#[derive(Debug)]
pub struct TerminalDisplay<W: Write> {
    out: W,
    row: Option<String>,
    status: Option<Status>,
}

impl TerminalDisplay<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalDisplay<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            row: None,
            status: None,
        }
    }

    /// Clears the whole screen and draws the help line.
    pub fn begin(&mut self) -> Result<()> {
        queue!(self.out, Clear(ClearType::All))?;
        self.draw()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn draw(&mut self) -> Result<()> {
        queue!(self.out, MoveTo(0, 0), Clear(ClearType::FromCursorDown))?;

        // Raw mode does not translate `\n`, so every line carries `\r`.
        if let Some(row) = &self.row {
            write!(self.out, "{row}\r\n")?;
        }
        write!(self.out, "{HELP_LINE}\r\n")?;
        if let Some(status) = self.status {
            write!(self.out, "{status}\r\n")?;
        }

        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write> BeatDisplay for TerminalDisplay<W> {
    fn render_beat(&mut self, beats: u32, index: u32) -> Result<()> {
        self.row = Some(beat_row(beats, index));
        self.status = None;
        self.draw()
    }

    fn show_status(&mut self, status: Status) -> Result<()> {
        self.status = Some(status);
        self.draw()
    }

    fn clear(&mut self) -> Result<()> {
        self.row = None;
        self.status = None;
        queue!(self.out, MoveTo(0, 0), Clear(ClearType::FromCursorDown))?;
        self.out.flush()?;
        Ok(())
    }
}
