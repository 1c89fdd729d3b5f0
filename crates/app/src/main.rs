use std::{path::PathBuf, process::ExitCode};

use clack_core::{
    config::{DEFAULT_TEMPO, DEFAULT_TIME_SIGNATURE},
    install_signal_handler, AudioEngine, KeyListener, Preset, PresetStore, RunSettings, SoundBank,
    TerminalDisplay, TickScheduler, TimeSignature,
};
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();

    let result = match &cli.command {
        Some(Commands::Run) => run_metronome(&cli),
        Some(Commands::Add { name }) => add_preset(&cli, name),
        Some(Commands::Delete { name }) => delete_preset(name),
        Some(Commands::List) => list_presets(),
        Some(Commands::Siglist) => {
            print_signatures();
            Ok(())
        }
        // No command is a request for usage, not a mistake.
        None => Cli::command().print_help().map_err(Into::into),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run_metronome(cli: &Cli) -> clack_core::Result<()> {
    // A preset replaces the flags before anything is validated.
    let preset = match &cli.config {
        Some(name) => Some(PresetStore::open_default()?.get(name)?.clone()),
        None => None,
    };
    let settings = RunSettings::resolve(cli.tempo, &cli.timesig, preset.as_ref())?;

    tracing::info!(
        tempo = %settings.tempo,
        signature = %settings.signature,
        interval = ?settings.beat_interval(),
        "starting metronome"
    );

    let bank = SoundBank::load_dir(&cli.sounds)?;
    let engine = AudioEngine::open(bank)?;

    let (sender, receiver) = crossbeam_channel::unbounded();
    install_signal_handler(sender.clone())?;
    let listener = KeyListener::spawn(sender)?;

    let mut display = TerminalDisplay::stdout();
    display.begin()?;

    let outcome = TickScheduler::new(settings, engine, display).run(&receiver);
    // Give the terminal back before anything else is printed.
    listener.shutdown();

    let report = outcome?;
    tracing::info!(
        ticks = report.ticks,
        resyncs = report.resyncs,
        "metronome stopped"
    );
    Ok(())
}

fn add_preset(cli: &Cli, name: &str) -> clack_core::Result<()> {
    let settings = RunSettings::resolve(cli.tempo, &cli.timesig, None)?;

    let mut store = PresetStore::open_default()?;
    store.add(Preset {
        key: name.to_string(),
        tempo: settings.tempo.bpm().into(),
        timesig: settings.signature.to_string(),
    })?;

    tracing::info!(path = %store.path().display(), "saved preset");
    println!("{name} is added to the config");
    Ok(())
}

fn delete_preset(name: &str) -> clack_core::Result<()> {
    let mut store = PresetStore::open_default()?;
    store.remove(name)?;

    println!("{name} is deleted from the config");
    Ok(())
}

fn list_presets() -> clack_core::Result<()> {
    let store = PresetStore::open_default()?;
    if store.presets().is_empty() {
        println!("No saved configs in {}", store.path().display());
        return Ok(());
    }

    for preset in store.presets() {
        println!("{:<16} {:>3} bpm  {}", preset.key, preset.tempo, preset.timesig);
    }
    Ok(())
}

fn print_signatures() {
    println!("Available Time Signatures:");
    for signature in TimeSignature::list() {
        println!("  - {signature}");
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Terminal metronome with accented beats", long_about = None)]
struct Cli {
    /// Tempo in beats per minute.
    #[arg(long, global = true, default_value_t = DEFAULT_TEMPO, allow_negative_numbers = true)]
    tempo: i64,
    /// Time signature as BEATS/NOTE, see `siglist`.
    #[arg(long, global = true, default_value = DEFAULT_TIME_SIGNATURE)]
    timesig: String,
    /// Name of a saved config; overrides --tempo and --timesig.
    #[arg(long, global = true)]
    config: Option<String>,
    /// Directory holding the hi.wav and lo.wav tick sounds.
    #[arg(long, global = true, default_value = "static")]
    sounds: PathBuf,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the metronome. Space pauses, Esc quits.
    Run,
    /// Save the current --tempo and --timesig under a name.
    Add { name: String },
    /// Remove a saved config.
    Delete { name: String },
    /// Print the saved configs.
    List,
    /// Print the list of available time signatures.
    Siglist,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_work_before_and_after_the_command() {
        let cli = Cli::try_parse_from(["clack", "--tempo", "100", "run", "--timesig", "3/4"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Run)));
        assert_eq!(cli.tempo, 100);
        assert_eq!(cli.timesig, "3/4");
        assert!(cli.config.is_none());
    }

    #[test]
    fn defaults_match_common_time() {
        let cli = Cli::try_parse_from(["clack", "run"]).unwrap();
        assert_eq!(cli.tempo, 120);
        assert_eq!(cli.timesig, "4/4");
        assert_eq!(cli.sounds, PathBuf::from("static"));
    }

    #[test]
    fn negative_tempo_reaches_validation() {
        let cli = Cli::try_parse_from(["clack", "--tempo", "-3", "run"]).unwrap();
        assert!(RunSettings::resolve(cli.tempo, &cli.timesig, None).is_err());
    }

    #[test]
    fn preset_commands_take_a_name() {
        let cli = Cli::try_parse_from(["clack", "--config=cfg1", "add", "slow"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Add { ref name }) if name == "slow"));
        assert!(Cli::try_parse_from(["clack", "delete"]).is_err());
    }

    #[test]
    fn bare_invocation_parses_without_a_command() {
        let cli = Cli::try_parse_from(["clack"]).unwrap();
        assert!(cli.command.is_none());
        assert!(Cli::try_parse_from(["clack", "--tempo", "90"]).unwrap().command.is_none());
    }
}
