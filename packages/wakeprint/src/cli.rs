//! Command Line Interface for wakeprint
//!
//! Enroll a personal wake phrase from recordings, listen for it live, or
//! replay a recording through the full pipeline.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use wakeprint::vad::VadSeverity;

/// Personal wake-phrase detector
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// TOML configuration file (defaults apply to anything it omits)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the VAD severity from the configuration
    #[arg(long, global = true)]
    pub severity: Option<Severity>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a template set from recordings of the wake phrase
    Enroll(EnrollCommand),

    /// Listen on a microphone until Ctrl-C
    Listen(ListenCommand),

    /// Run a recording through the pipeline and print every segment outcome
    Score(ScoreCommand),

    /// List available audio input devices
    ListDevices,
}

/// Speech classifier selection, shared by every command that runs the gate
#[derive(Args, Debug, Clone)]
pub struct ClassifierArgs {
    /// Silero VAD ONNX model; the energy classifier is used without it
    #[arg(long)]
    pub silero: Option<PathBuf>,
}

/// Build a template set from recordings of the wake phrase
#[derive(Parser, Debug)]
pub struct EnrollCommand {
    /// Where to write the template set
    #[arg(short, long)]
    pub output: PathBuf,

    /// One mono 16-bit WAV per utterance
    #[arg(required = true)]
    pub wavs: Vec<PathBuf>,

    #[command(flatten)]
    pub classifier: ClassifierArgs,
}

/// Listen on a microphone until Ctrl-C
#[derive(Parser, Debug)]
pub struct ListenCommand {
    /// Template set produced by `enroll`
    #[arg(short, long)]
    pub templates: PathBuf,

    /// Audio device to use (use list-devices to see available devices)
    #[arg(short, long)]
    pub device: Option<String>,

    #[command(flatten)]
    pub classifier: ClassifierArgs,
}

/// Run a recording through the pipeline
#[derive(Parser, Debug)]
pub struct ScoreCommand {
    /// Template set produced by `enroll`
    #[arg(short, long)]
    pub templates: PathBuf,

    /// Mono 16-bit WAV to replay
    pub wav: PathBuf,

    #[command(flatten)]
    pub classifier: ClassifierArgs,
}

/// VAD severity tiers
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Severity {
    Off,
    Normal,
    Aggressive,
    VeryAggressive,
}

impl From<Severity> for VadSeverity {
    fn from(s: Severity) -> Self {
        match s {
            Severity::Off => VadSeverity::Off,
            Severity::Normal => VadSeverity::Normal,
            Severity::Aggressive => VadSeverity::Aggressive,
            Severity::VeryAggressive => VadSeverity::VeryAggressive,
        }
    }
}
