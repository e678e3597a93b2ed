//! Test tone generation
//!
//! 440 Hz sine at half amplitude, 16-bit little-endian stereo with both
//! channels carrying the same signal. Used by the binary's `--tone` mode to
//! exercise the pipeline without a transport, and by tests.

pub const TONE_FREQUENCY_HZ: f32 = 440.0;
pub const TONE_AMPLITUDE: f32 = 0.5;

/// Continuous sine generator; phase carries across chunks.
///
/// Phase is accumulated modulo TAU rather than derived from a sample
/// counter; a `step * n` product loses f32 precision once `n` passes ~2^24
/// (a few minutes of audio) and the tone drifts.
pub struct ToneGenerator {
    amplitude: f32,
    step: f32,
    phase: f32,
}

impl ToneGenerator {
    /// 440 Hz at half amplitude.
    pub fn new(sample_rate: u32) -> Self {
        Self::with_frequency(sample_rate, TONE_FREQUENCY_HZ, TONE_AMPLITUDE)
    }

    pub fn with_frequency(sample_rate: u32, frequency: f32, amplitude: f32) -> Self {
        Self {
            amplitude,
            step: std::f32::consts::TAU * frequency / sample_rate as f32,
            phase: 0.0,
        }
    }

    /// Fill `pcm` with 16-bit stereo sample frames (4 bytes each). A
    /// trailing partial frame is left zeroed.
    pub fn fill(&mut self, pcm: &mut [u8]) {
        for frame in pcm.chunks_exact_mut(4) {
            let value = (i16::MAX as f32 * self.amplitude * self.phase.sin()) as i16;
            let bytes = value.to_le_bytes();

            // Same signal on left and right
            frame[0] = bytes[0];
            frame[1] = bytes[1];
            frame[2] = bytes[0];
            frame[3] = bytes[1];

            self.phase += self.step;
            if self.phase >= std::f32::consts::TAU {
                self.phase -= std::f32::consts::TAU;
            }
        }
    }

    /// Generate one chunk of `len` bytes (rounded down to whole frames).
    pub fn next_chunk(&mut self, len: usize) -> Vec<u8> {
        let mut chunk = vec![0u8; len - (len % 4)];
        self.fill(&mut chunk);
        chunk
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_length_rounded_to_frames() {
        let mut tone = ToneGenerator::new(44100);
        assert_eq!(tone.next_chunk(512).len(), 512);
        assert_eq!(tone.next_chunk(510).len(), 508);
    }

    #[test]
    fn test_channels_carry_same_signal() {
        let mut tone = ToneGenerator::new(44100);
        let chunk = tone.next_chunk(512);

        for frame in chunk.chunks_exact(4) {
            assert_eq!(&frame[0..2], &frame[2..4]);
        }
    }

    #[test]
    fn test_tone_is_not_silence_and_bounded() {
        let mut tone = ToneGenerator::new(44100);
        let chunk = tone.next_chunk(4096);

        let mut peak: i16 = 0;
        for frame in chunk.chunks_exact(4) {
            let value = i16::from_le_bytes([frame[0], frame[1]]);
            peak = peak.max(value.saturating_abs());
        }

        // Half amplitude: audible but clearly below full scale
        assert!(peak > i16::MAX / 4);
        assert!(peak <= i16::MAX / 2 + 1);
    }

    #[test]
    fn test_phase_stays_bounded_over_long_runs() {
        let mut tone = ToneGenerator::new(44100);

        // Several seconds of audio; an unbounded accumulator would grow
        // past the range where f32 still resolves individual steps
        for _ in 0..2000 {
            tone.next_chunk(512);
        }

        assert!(tone.phase >= 0.0);
        assert!(tone.phase < std::f32::consts::TAU);
    }

    #[test]
    fn test_phase_continuous_across_chunks() {
        let mut split = ToneGenerator::new(44100);
        let mut whole = ToneGenerator::new(44100);

        let mut joined = split.next_chunk(256);
        joined.extend(split.next_chunk(256));
        assert_eq!(joined, whole.next_chunk(512));
    }
}
