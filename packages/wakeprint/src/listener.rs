//! The capture-and-decide loop.
//!
//! Frames are handled strictly in arrival order on one thread:
//! gate → accumulator → (on flush) features → matcher. The only shared
//! state is the template set, read as an `Arc` snapshot, and the metrics.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, bounded};
use tracing::{debug, error, info, instrument, warn};
use wakeprint_vad::SpeechClassifier;

use crate::{
    Config, Result, WakeprintError,
    audio::AudioSource,
    matcher::{MatchOutcome, Rejection, TemplateMatcher, WakeDecision},
    segment::{SegmentEvent, Segmenter},
    templates::{SharedTemplates, TemplateSet},
};

/// Events buffered for a spawned listener's consumer.
const EVENT_QUEUE: usize = 64;

/// Something the listener decided about a closed segment.
#[derive(Debug, Clone, PartialEq)]
pub enum ListenerEvent {
    Wake(WakeDecision),
    Rejected(Rejection),
    DroppedShort { speech_ms: f32 },
}

/// Lock-free counters, readable from any thread.
#[derive(Debug, Default)]
pub struct ListenerMetrics {
    pub frames_processed: AtomicU64,
    pub speech_frames: AtomicU64,
    pub segments_flushed: AtomicU64,
    pub segments_dropped_short: AtomicU64,
    pub wakes: AtomicU64,
    pub rejections: AtomicU64,
    pub classifier_failures: AtomicU64,
    /// Average match time per scored segment (microseconds)
    pub avg_match_time_us: AtomicU64,
    pub total_match_time_us: AtomicU64,
    pub match_iterations: AtomicU64,
}

impl ListenerMetrics {
    #[inline]
    pub fn update_match_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        let total = self.total_match_time_us.fetch_add(us, Ordering::Relaxed) + us;
        let iterations = self.match_iterations.fetch_add(1, Ordering::Relaxed) + 1;
        self.avg_match_time_us
            .store(total / iterations, Ordering::Relaxed);
    }

    #[inline]
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// Gate, accumulator and matcher for one capture stream.
pub struct Listener<C> {
    segmenter: Segmenter<C>,
    matcher: TemplateMatcher,
    metrics: Arc<ListenerMetrics>,
}

impl<C: SpeechClassifier> Listener<C> {
    #[instrument(skip_all)]
    pub fn new(classifier: C, cfg: &Config) -> Result<Self> {
        info!(
            "listener: {} Hz, {}-sample frames, vad {}",
            cfg.audio.sample_rate, cfg.audio.frame_size, cfg.vad.severity
        );
        Ok(Self {
            segmenter: Segmenter::new(classifier, cfg)?,
            matcher: TemplateMatcher::new(cfg)?,
            metrics: Arc::new(ListenerMetrics::default()),
        })
    }

    pub fn metrics(&self) -> Arc<ListenerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Advance by one frame. Returns an event only when a segment was
    /// flushed.
    pub fn process_frame(&mut self, frame: &[i16], templates: &TemplateSet) -> Option<ListenerEvent> {
        let m = &*self.metrics;
        ListenerMetrics::bump(&m.frames_processed);

        let event = self.segmenter.push(frame);
        if self.segmenter.gate().is_speaking() {
            ListenerMetrics::bump(&m.speech_frames);
        }
        m.classifier_failures
            .store(self.segmenter.gate().classifier_failures(), Ordering::Relaxed);

        let out = match event? {
            SegmentEvent::Started => return None,
            SegmentEvent::DroppedShort { speech_ms } => {
                ListenerMetrics::bump(&m.segments_dropped_short);
                debug!("dropped {speech_ms:.0} ms segment");
                ListenerEvent::DroppedShort { speech_ms }
            }
            SegmentEvent::Closed(seg) => {
                ListenerMetrics::bump(&m.segments_flushed);
                let t0 = Instant::now();
                let outcome = self.matcher.match_segment(
                    &seg.pcm,
                    seg.speech_ms,
                    seg.noise_floor,
                    templates,
                );
                m.update_match_time(t0.elapsed());
                match outcome {
                    MatchOutcome::Accepted(d) => {
                        ListenerMetrics::bump(&m.wakes);
                        info!("wake (confidence {:.3}, {} hit(s))", d.confidence, d.hits);
                        ListenerEvent::Wake(d)
                    }
                    MatchOutcome::Rejected(r) => {
                        ListenerMetrics::bump(&m.rejections);
                        if r == Rejection::IncompatibleTemplates {
                            warn!("{r}");
                        } else {
                            debug!("segment rejected: {r}");
                        }
                        ListenerEvent::Rejected(r)
                    }
                }
            }
        };
        Some(out)
    }

    /// Loop until `running` is cleared or the source ends, reporting
    /// every segment outcome.
    #[instrument(skip_all)]
    pub fn run_events<S, F>(
        &mut self,
        source: &mut S,
        templates: &SharedTemplates,
        running: &AtomicBool,
        mut on_event: F,
    ) -> Result<()>
    where
        S: AudioSource + ?Sized,
        F: FnMut(ListenerEvent),
    {
        while running.load(Ordering::Acquire) {
            let Some(frame) = source.read_frame()? else {
                debug!("audio source ended");
                break;
            };
            let snapshot = templates.snapshot();
            if let Some(ev) = self.process_frame(&frame, &snapshot) {
                on_event(ev);
            }
        }
        Ok(())
    }

    /// [`run_events`](Self::run_events), calling `on_wake` once per
    /// accepted segment.
    pub fn run<S, F>(
        &mut self,
        source: &mut S,
        templates: &SharedTemplates,
        running: &AtomicBool,
        mut on_wake: F,
    ) -> Result<()>
    where
        S: AudioSource + ?Sized,
        F: FnMut(WakeDecision),
    {
        self.run_events(source, templates, running, |ev| {
            if let ListenerEvent::Wake(d) = ev {
                on_wake(d);
            }
        })
    }

    /// Start the loop on its own thread.
    ///
    /// Classifier and source are built on that thread (a live capture
    /// stream may not be `Send`), and construction errors come back from
    /// this call. Both are dropped on the same thread when the loop exits.
    pub fn spawn<FC, FS, S>(
        config: Config,
        classifier: FC,
        source: FS,
        templates: SharedTemplates,
    ) -> Result<ListenerHandle>
    where
        C: 'static,
        FC: FnOnce() -> Result<C> + Send + 'static,
        FS: FnOnce() -> Result<S> + Send + 'static,
        S: AudioSource + 'static,
    {
        let (ready_tx, ready_rx) = bounded::<Result<Arc<ListenerMetrics>>>(1);
        let (event_tx, event_rx) = bounded(EVENT_QUEUE);
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);

        let thread = std::thread::Builder::new()
            .name("wakeprint-listener".to_string())
            .spawn(move || -> Result<()> {
                let built = classifier()
                    .and_then(|c| Listener::new(c, &config))
                    .and_then(|l| source().map(|s| (l, s)));
                let (mut listener, mut source) = match built {
                    Ok(v) => v,
                    Err(e) => {
                        let msg = e.to_string();
                        let _ = ready_tx.send(Err(e));
                        return Err(WakeprintError::Thread(msg));
                    }
                };
                let _ = ready_tx.send(Ok(listener.metrics()));

                let result = listener.run_events(&mut source, &templates, &thread_running, |ev| {
                    if event_tx.try_send(ev).is_err() {
                        warn!("listener event queue full; event dropped");
                    }
                });
                if let Err(e) = &result {
                    error!("listener stopped: {e}");
                }
                thread_running.store(false, Ordering::Release);
                result
            })
            .map_err(|e| WakeprintError::Thread(format!("failed to spawn listener thread: {e}")))?;

        let metrics = match ready_rx.recv() {
            Ok(Ok(m)) => m,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(WakeprintError::Thread(
                    "listener thread exited during start-up".into(),
                ));
            }
        };

        Ok(ListenerHandle {
            running,
            events: event_rx,
            metrics,
            thread: Some(thread),
        })
    }
}

/// Owner-side view of a spawned listener.
pub struct ListenerHandle {
    running: Arc<AtomicBool>,
    events: Receiver<ListenerEvent>,
    metrics: Arc<ListenerMetrics>,
    thread: Option<JoinHandle<Result<()>>>,
}

impl ListenerHandle {
    pub fn events(&self) -> &Receiver<ListenerEvent> {
        &self.events
    }

    pub fn metrics(&self) -> &ListenerMetrics {
        &self.metrics
    }

    /// False once the loop has exited, for whatever reason.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// The flag the loop polls; clearing it stops the loop after the
    /// current frame.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Clear the flag and wait for the loop thread.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        self.running.store(false, Ordering::Release);
        match self.thread.take() {
            Some(t) => t
                .join()
                .map_err(|_| WakeprintError::Thread("listener thread panicked".into()))?,
            None => Ok(()),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("listener shutdown: {e}");
        }
    }
}
