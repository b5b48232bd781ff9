use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use jarvis::config::{Config, LoggingConfig};
use jarvis::error::TranscriptionError;
use jarvis::patterns::PatternTable;
use jarvis::transcriber::{self, ConsoleTranscriber, Transcriber};
use jarvis::tts::ConsoleTts;
use jarvis::{Assistant, SessionLoop, wake::WakeWord};

#[derive(Parser)]
#[command(name = "jarvis", about = "Voice command assistant")]
struct Cli {
    /// Config file
    #[arg(short, long, default_value = jarvis::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the voice session (typed lines stand in for speech)
    Run,
    /// Handle one typed command and exit
    Text {
        #[arg(required = true, num_args = 1..)]
        command: Vec<String>,
    },
    /// Show which wake rule, if any, an utterance triggers
    Wake {
        #[arg(required = true, num_args = 1..)]
        utterance: Vec<String>,
    },
    /// Print the pattern table
    Patterns {
        /// Overwrite the pattern file with the built-in table first
        #[arg(long)]
        reset: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (config, source) = Config::load_or_default(&cli.config);
    init_logging(&config.logging, cli.verbose)?;
    source.report();

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_session(config),
        Command::Text { command } => {
            let assistant = build_assistant(config)?;
            assistant.process_text_command(&command.join(" "));
            Ok(())
        }
        Command::Wake { utterance } => {
            show_wake(&WakeWord::new(&config.wake), &utterance.join(" "));
            Ok(())
        }
        Command::Patterns { reset } => show_patterns(&config.matcher.patterns_path, reset),
    }
}

fn init_logging(config: &LoggingConfig, verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { config.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating log directory {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            Some(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

fn build_assistant(config: Config) -> anyhow::Result<Arc<Assistant>> {
    let engine = Box::new(ConsoleTts::new(&config.name));
    let assistant = Assistant::from_config(config, engine).context("loading command patterns")?;
    Ok(Arc::new(assistant))
}

fn run_session(config: Config) -> anyhow::Result<()> {
    let assistant = build_assistant(config)?;

    let state = Arc::clone(assistant.state());
    ctrlc::set_handler(move || state.request_shutdown())?;

    // One reader thread for the whole process; rebuilt transcribers share it
    let lines = transcriber::spawn_stdin_reader();
    let state = Arc::clone(assistant.state());
    let factory = move || -> Result<Box<dyn Transcriber>, TranscriptionError> {
        Ok(Box::new(ConsoleTranscriber::new(lines.clone(), Arc::clone(&state))))
    };

    eprintln!(
        "Type what you would say. Start with \"hey {}\", Ctrl+C to quit.",
        assistant.name().to_lowercase()
    );
    let mut session = SessionLoop::new(Arc::clone(&assistant), factory)?;
    session.run()?;
    Ok(())
}

fn show_wake(wake: &WakeWord, utterance: &str) {
    match wake.detect(utterance) {
        Some(trigger) => println!("wake: {:?}", trigger),
        None => {
            println!("no wake word");
            if let Some((phrase, score)) = wake.closest_phrase(utterance) {
                println!("closest phrase: '{}' ({:.2})", phrase, score);
            }
        }
    }
}

fn show_patterns(path: &Path, reset: bool) -> anyhow::Result<()> {
    let table = if reset {
        let table = PatternTable::builtin()?;
        table.save(path)?;
        tracing::info!("reset {}", path.display());
        table
    } else {
        PatternTable::load(path)?
    };
    println!("{}", table.to_json()?);
    Ok(())
}
