/// Sawtooth oscillator producing 16-bit mono PCM in consecutive chunks.
pub struct SawtoothWave {
    frequency: f64,
    phase: f64,
    amplitude: f64,
    sample_rate: u32,
    position: u64,
}

impl SawtoothWave {
    pub fn new(frequency: f64, phase: f64, amplitude: f64, sample_rate: u32) -> Self {
        Self {
            frequency,
            phase,
            amplitude,
            sample_rate,
            position: 0,
        }
    }

    /// Value at time `t` seconds, in `[0, amplitude)`.
    pub fn evaluate(&self, t: f64) -> f64 {
        let cycle = self.frequency * t + self.phase;
        self.amplitude * (cycle - cycle.floor())
    }

    /// Next `frames` samples as little-endian `i16` bytes, centred on zero.
    pub fn next_chunk(&mut self, frames: usize) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(frames * 2);
        for _ in 0..frames {
            let t = self.position as f64 / self.sample_rate as f64;
            let value = (self.evaluate(t) * 2.0 - self.amplitude) * i16::MAX as f64;
            bytes.extend_from_slice(&(value as i16).to_le_bytes());
            self.position += 1;
        }
        bytes
    }
}
