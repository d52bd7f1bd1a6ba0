use crate::ClassifierError;

/// Black-box per-frame speech classifier.
///
/// Implementations own whatever recurrent state they need; it is threaded
/// from one call to the next inside the instance and cleared by
/// [`reset`](SpeechClassifier::reset). Instances are driven by exactly one
/// gate on one thread.
pub trait SpeechClassifier {
    /// Number of trailing samples from the previous window that must be
    /// prepended to every new frame.
    fn context_size(&self) -> usize;

    /// Whether `frame_size` new samples per call (plus the context) form a
    /// window this classifier can run on.
    fn supports_frame(&self, _frame_size: usize) -> bool {
        true
    }

    /// Speech probability in `[0, 1]` for `window` (`context ++ frame`).
    fn speech_probability(&mut self, window: &[f32]) -> Result<f32, ClassifierError>;

    /// Forget the recurrent state.
    fn reset(&mut self);
}

impl<C: SpeechClassifier + ?Sized> SpeechClassifier for Box<C> {
    fn context_size(&self) -> usize {
        (**self).context_size()
    }

    fn supports_frame(&self, frame_size: usize) -> bool {
        (**self).supports_frame(frame_size)
    }

    fn speech_probability(&mut self, window: &[f32]) -> Result<f32, ClassifierError> {
        (**self).speech_probability(window)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}
