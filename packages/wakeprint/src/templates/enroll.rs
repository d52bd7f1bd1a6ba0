use std::path::Path;

use tracing::{info, instrument, warn};
use wakeprint_vad::SpeechClassifier;

use super::TemplateSet;
use crate::{
    Config, Result, WakeprintError,
    audio::{AudioSource, WavFileSource},
    kfc::{FeatureExtractor, FeatureSequence},
    segment::{SegmentEvent, Segmenter},
};

/// Turns recorded utterances into templates through the same gate and
/// segmentation path used while listening.
pub struct Enroller<C> {
    segmenter: Segmenter<C>,
    extractor: FeatureExtractor,
    config: Config,
}

impl<C: SpeechClassifier> Enroller<C> {
    pub fn new(classifier: C, cfg: &Config) -> Result<Self> {
        Ok(Self {
            segmenter: Segmenter::new(classifier, cfg)?,
            extractor: FeatureExtractor::new(cfg)?,
            config: cfg.clone(),
        })
    }

    /// Features of the first closed segment in `source`, or `None` if the
    /// stream ends first.
    pub fn capture<S: AudioSource + ?Sized>(&mut self, source: &mut S) -> Result<Option<FeatureSequence>> {
        self.segmenter.reset();
        while let Some(frame) = source.read_frame()? {
            match self.segmenter.push(&frame) {
                Some(SegmentEvent::Closed(seg)) => {
                    let seq = self.extractor.extract(&seg.pcm);
                    if seq.is_empty() {
                        warn!("enrollment segment yielded no features");
                        continue;
                    }
                    info!(
                        "captured {:.0} ms utterance, {} feature frames",
                        seg.speech_ms,
                        seq.len()
                    );
                    return Ok(Some(seq));
                }
                Some(SegmentEvent::DroppedShort { speech_ms }) => {
                    warn!("ignoring {speech_ms:.0} ms burst; too short for a template");
                }
                _ => {}
            }
        }
        Ok(None)
    }

    /// One template from a WAV recording.
    pub fn capture_file(&mut self, path: impl AsRef<Path>) -> Result<FeatureSequence> {
        let path = path.as_ref();
        let mut src = WavFileSource::open(path, &self.config.audio, self.config.flush_tail_ms())?;
        self.capture(&mut src)?
            .ok_or_else(|| WakeprintError::NoSpeech(path.display().to_string()))
    }

    pub fn feature_dim(&self) -> usize {
        self.extractor.dim()
    }
}

/// Build a [`TemplateSet`] from one WAV file per utterance.
#[instrument(skip_all, fields(files = paths.len()))]
pub fn enroll_files<C, P>(cfg: &Config, classifier: C, paths: &[P]) -> Result<TemplateSet>
where
    C: SpeechClassifier,
    P: AsRef<Path>,
{
    let mut enroller = Enroller::new(classifier, cfg)?;
    let mut set = TemplateSet::new(enroller.feature_dim());
    for p in paths {
        set.push(enroller.capture_file(p)?)?;
    }
    if let Some(c) = set.consistency(cfg.matcher.dtw_band) {
        info!("enrolled {} templates, consistency {c:.3}", set.len());
    }
    Ok(set)
}
