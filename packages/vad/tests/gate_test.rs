use std::cell::RefCell;
use std::rc::Rc;

use wakeprint_vad::{
    ClassifierError, EnergyClassifier, GateConfig, SpeechClassifier, VadSeverity,
    VoiceActivityGate,
};

/// Records every window it is handed; reports speech for loud windows.
struct Recording {
    context: usize,
    seen: Rc<RefCell<Vec<Vec<f32>>>>,
    resets: Rc<RefCell<usize>>,
}

impl SpeechClassifier for Recording {
    fn context_size(&self) -> usize {
        self.context
    }

    fn speech_probability(&mut self, window: &[f32]) -> Result<f32, ClassifierError> {
        self.seen.borrow_mut().push(window.to_vec());
        Ok(0.0)
    }

    fn reset(&mut self) {
        *self.resets.borrow_mut() += 1;
    }
}

fn ramp(start: i16, len: usize) -> Vec<i16> {
    (0..len).map(|i| start + i as i16).collect()
}

#[test]
fn window_is_previous_tail_plus_frame() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let resets = Rc::new(RefCell::new(0));
    let classifier = Recording {
        context: 4,
        seen: Rc::clone(&seen),
        resets: Rc::clone(&resets),
    };
    let cfg = GateConfig::builder().frame_size(8usize).build();
    let mut gate = VoiceActivityGate::new(classifier, &cfg).unwrap();

    let a = ramp(100, 8);
    let b = ramp(200, 8);
    gate.is_speech(&a);
    gate.is_speech(&b);

    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].len(), 12);
    assert_eq!(seen[1].len(), 12);

    // first call: zero context
    assert!(seen[0][..4].iter().all(|&v| v == 0.0));
    assert_approx_frame(&seen[0][4..], &a);

    // second call: tail of first window, then the new frame
    assert_approx_frame(&seen[1][..4], &a[4..]);
    assert_approx_frame(&seen[1][4..], &b);
}

#[test]
fn reset_clears_context_and_classifier_state() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let resets = Rc::new(RefCell::new(0));
    let classifier = Recording {
        context: 4,
        seen: Rc::clone(&seen),
        resets: Rc::clone(&resets),
    };
    let cfg = GateConfig::builder().frame_size(8usize).build();
    let mut gate = VoiceActivityGate::new(classifier, &cfg).unwrap();

    gate.is_speech(&ramp(100, 8));
    gate.reset();
    gate.is_speech(&ramp(300, 8));

    assert_eq!(*resets.borrow(), 1);
    let seen = seen.borrow();
    assert!(seen[1][..4].iter().all(|&v| v == 0.0));
}

fn assert_approx_frame(got: &[f32], pcm: &[i16]) {
    assert_eq!(got.len(), pcm.len());
    for (g, &s) in got.iter().zip(pcm) {
        approx::assert_abs_diff_eq!(*g, s as f32 / 32_768.0, epsilon = 1e-7);
    }
}

#[test]
fn energy_gate_tracks_a_tone_burst() {
    let cfg = GateConfig::builder()
        .severity(VadSeverity::Normal)
        .speech_duration_ms(64)
        .silence_duration_ms(96)
        .build();
    let mut gate = VoiceActivityGate::new(EnergyClassifier::default(), &cfg).unwrap();

    let silence = vec![0i16; 512];
    let tone: Vec<i16> = (0..512)
        .map(|i| (8_000.0 * (2.0 * std::f32::consts::PI * 300.0 * i as f32 / 16_000.0).sin()) as i16)
        .collect();

    let mut states = Vec::new();
    for _ in 0..3 {
        states.push(gate.is_speech(&silence));
    }
    for _ in 0..6 {
        states.push(gate.is_speech(&tone));
    }
    for _ in 0..6 {
        states.push(gate.is_speech(&silence));
    }

    assert_eq!(
        states,
        vec![
            false, false, false, // silence
            false, false, true, true, true, true, // speech confirmed on the third frame
            true, true, true, false, false, false, // closes on the fourth silent frame
        ]
    );
}
