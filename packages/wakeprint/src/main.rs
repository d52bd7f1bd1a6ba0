//! wakeprint CLI binary

use std::{path::Path, sync::atomic::Ordering, time::Duration};

use anyhow::{Context, Result, bail};
use clap::Parser;
use env_logger::Env;
use log::{info, warn};

mod cli;
use cli::{ClassifierArgs, Cli, Commands};

use wakeprint::{
    Config, Listener, ListenerEvent, ListenerMetrics, MicrophoneSource, SharedTemplates,
    TemplateLoad, TemplateSave, TemplateSet, WavFileSource,
    audio::{AudioSource, input_device_names},
    enroll_files,
    vad::{EnergyClassifier, SpeechClassifier},
};

type Classifier = Box<dyn SpeechClassifier>;

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(p) => Config::load(p).with_context(|| format!("loading config {}", p.display()))?,
        None => Config::default(),
    };
    if let Some(s) = cli.severity {
        config.vad.severity = s.into();
    }

    match cli.command {
        Commands::Enroll(cmd) => enroll(&config, cmd),
        Commands::Listen(cmd) => listen(config, cmd),
        Commands::Score(cmd) => score(&config, cmd),
        Commands::ListDevices => list_devices(),
    }
}

fn make_classifier(args: &ClassifierArgs, sample_rate: u32) -> wakeprint::Result<Classifier> {
    match &args.silero {
        None => Ok(Box::new(EnergyClassifier::default())),
        Some(model) => silero(model, sample_rate),
    }
}

#[cfg(feature = "silero")]
fn silero(model: &Path, sample_rate: u32) -> wakeprint::Result<Classifier> {
    Ok(Box::new(wakeprint::vad::SileroClassifier::new(model, sample_rate)?))
}

#[cfg(not(feature = "silero"))]
fn silero(model: &Path, _sample_rate: u32) -> wakeprint::Result<Classifier> {
    Err(wakeprint::vad::VadError::ModelLoad(format!(
        "{}: built without the `silero` feature",
        model.display()
    ))
    .into())
}

fn load_templates(path: &Path) -> Result<TemplateSet> {
    let set = TemplateSet::load_from_file(path)
        .with_context(|| format!("loading templates {}", path.display()))?;
    if set.is_empty() {
        bail!("{} holds no templates; run `enroll` first", path.display());
    }
    info!("{} template(s) from {}", set.len(), path.display());
    Ok(set)
}

fn enroll(config: &Config, cmd: cli::EnrollCommand) -> Result<()> {
    let classifier = make_classifier(&cmd.classifier, config.audio.sample_rate)?;
    let set = enroll_files(config, classifier, &cmd.wavs).context("enrollment failed")?;
    set.save_to_file(&cmd.output)
        .with_context(|| format!("writing {}", cmd.output.display()))?;

    println!("{} template(s) written to {}", set.len(), cmd.output.display());
    match set.consistency(config.matcher.dtw_band) {
        Some(c) => {
            println!("consistency (min pairwise similarity): {c:.3}");
            let floor = config.matcher.min_dynamic_threshold + config.matcher.dynamic_threshold_margin;
            if c < floor {
                warn!("recordings disagree (consistency {c:.3} < {floor:.3}); consider re-recording");
            }
        }
        None => warn!("a single template cannot be checked for consistency; three are recommended"),
    }
    Ok(())
}

fn listen(config: Config, cmd: cli::ListenCommand) -> Result<()> {
    let templates = SharedTemplates::new(load_templates(&cmd.templates)?);
    let audio = config.audio.clone();
    let sample_rate = audio.sample_rate;
    let classifier = cmd.classifier.clone();
    let device = cmd.device.clone();

    let handle = Listener::spawn(
        config,
        move || make_classifier(&classifier, sample_rate),
        move || MicrophoneSource::open(device.as_deref(), &audio),
        templates,
    )
    .context("starting listener")?;

    let running = handle.running_flag();
    ctrlc::set_handler(move || running.store(false, Ordering::Release))
        .context("installing Ctrl-C handler")?;
    info!("listening; press Ctrl-C to stop");

    while handle.is_running() {
        match handle.events().recv_timeout(Duration::from_millis(200)) {
            Ok(ListenerEvent::Wake(d)) => {
                println!("WAKE  confidence {:.3} ({} hit(s))", d.confidence, d.hits);
            }
            Ok(ev) => log::debug!("{ev:?}"),
            Err(_) => {}
        }
    }

    let m = handle.metrics();
    info!(
        "frames {}, segments {}, wakes {}, rejections {}, avg match {} µs",
        ListenerMetrics::get(&m.frames_processed),
        ListenerMetrics::get(&m.segments_flushed),
        ListenerMetrics::get(&m.wakes),
        ListenerMetrics::get(&m.rejections),
        ListenerMetrics::get(&m.avg_match_time_us),
    );
    handle.stop().context("listener failed")?;
    Ok(())
}

fn score(config: &Config, cmd: cli::ScoreCommand) -> Result<()> {
    let templates = load_templates(&cmd.templates)?;
    let classifier = make_classifier(&cmd.classifier, config.audio.sample_rate)?;
    let mut listener = Listener::new(classifier, config)?;
    let mut source = WavFileSource::open(&cmd.wav, &config.audio, config.flush_tail_ms())
        .with_context(|| format!("opening {}", cmd.wav.display()))?;

    let frame_ms = config.frame_ms();
    let mut frame_no = 0usize;
    let mut wakes = 0usize;
    while let Some(frame) = source.read_frame()? {
        frame_no += 1;
        let Some(ev) = listener.process_frame(&frame, &templates) else {
            continue;
        };
        let at = frame_no as f32 * frame_ms / 1_000.0;
        match ev {
            ListenerEvent::Wake(d) => {
                wakes += 1;
                println!("{at:8.2}s  WAKE      confidence {:.3}", d.confidence);
            }
            ListenerEvent::Rejected(r) => println!("{at:8.2}s  rejected  {r}"),
            ListenerEvent::DroppedShort { speech_ms } => {
                println!("{at:8.2}s  dropped   {speech_ms:.0} ms of speech")
            }
        }
    }
    println!("{wakes} wake(s) in {}", cmd.wav.display());
    Ok(())
}

fn list_devices() -> Result<()> {
    println!("Available input devices:");
    for name in input_device_names()? {
        println!("  - {name}");
    }
    Ok(())
}
