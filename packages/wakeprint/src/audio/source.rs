use std::collections::VecDeque;

use crate::Result;

/// Pull-style producer of fixed-size int16 frames.
///
/// `Ok(None)` marks the end of the stream. Implementations may block until a
/// full frame is available.
pub trait AudioSource {
    fn read_frame(&mut self) -> Result<Option<Vec<i16>>>;
}

impl<S: AudioSource + ?Sized> AudioSource for Box<S> {
    fn read_frame(&mut self) -> Result<Option<Vec<i16>>> {
        (**self).read_frame()
    }
}

/// In-memory frames, replayed in order.
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    frames: VecDeque<Vec<i16>>,
}

impl VecSource {
    pub fn new(frames: Vec<Vec<i16>>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    /// Chunk `samples` into `frame_size` frames; a short last frame is
    /// zero-padded.
    pub fn from_samples(samples: &[i16], frame_size: usize) -> Self {
        let frames = samples
            .chunks(frame_size.max(1))
            .map(|c| {
                let mut f = c.to_vec();
                f.resize(frame_size, 0);
                f
            })
            .collect();
        Self { frames }
    }

    /// Append `count` all-zero frames.
    pub fn with_silence(mut self, count: usize, frame_size: usize) -> Self {
        self.frames
            .extend(std::iter::repeat_n(vec![0i16; frame_size], count));
        self
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl AudioSource for VecSource {
    fn read_frame(&mut self) -> Result<Option<Vec<i16>>> {
        Ok(self.frames.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_pad_and_drain() {
        let mut src = VecSource::from_samples(&[1, 2, 3, 4, 5], 2).with_silence(1, 2);
        assert_eq!(src.remaining(), 4);
        assert_eq!(src.read_frame().unwrap(), Some(vec![1, 2]));
        assert_eq!(src.read_frame().unwrap(), Some(vec![3, 4]));
        assert_eq!(src.read_frame().unwrap(), Some(vec![5, 0]));
        assert_eq!(src.read_frame().unwrap(), Some(vec![0, 0]));
        assert_eq!(src.read_frame().unwrap(), None);
    }
}
