//! Shake and twist detection from the accelerometer
//!
//! Both are sampled every other tick. A shake is any swing of 60 degrees or
//! more between samples in the last four; a twist is a jump in the
//! normalised X component.

/// Swing between two samples that counts towards a shake, in degrees
pub const SHAKE_ANGLE: f32 = 60.0;
/// Twist amount beyond which the remote counts as twisting
pub const TWIST_THRESHOLD: f32 = 0.6;

const HISTORY: usize = 5;
const SAMPLE_EVERY: u64 = 2;

/// Calibrated acceleration reordered as `(x, z, y)` and normalised; zero stays zero
fn direction([x, y, z]: [f32; 3]) -> [f32; 3] {
    let v = [x, z, y];
    let len = v.iter().map(|c| c * c).sum::<f32>().sqrt();
    if len < 1e-5 {
        return [0.0; 3];
    }
    v.map(|c| c / len)
}

/// Angle between two vectors in degrees, 0 when either is zero
fn angle_between(a: [f32; 3], b: [f32; 3]) -> f32 {
    let len_sq = |v: [f32; 3]| v.iter().map(|c| c * c).sum::<f32>();
    let denom = (len_sq(a) * len_sq(b)).sqrt();
    if denom < 1e-15 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    (dot / denom).clamp(-1.0, 1.0).acos().to_degrees()
}

#[derive(Debug, Clone, Default)]
pub struct MotionTracker {
    frame: u64,
    angles: [f32; HISTORY],
    previous: [f32; 3],
    shaking: bool,
    twist: f32,
}

impl MotionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed this tick's calibrated acceleration
    pub fn update(&mut self, accel: [f32; 3]) {
        self.frame += 1;
        if self.frame % SAMPLE_EVERY != 0 {
            return;
        }

        let next = direction(accel);
        let angle = angle_between(next, self.previous);

        // The newest angle only counts from the next sample on
        self.shaking = self.angles[..HISTORY - 1]
            .iter()
            .any(|&a| a >= SHAKE_ANGLE);
        self.angles.rotate_left(1);
        self.angles[HISTORY - 1] = angle;

        self.twist = next[0] - self.previous[0];
        self.previous = next;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn shaking(&self) -> bool {
        self.shaking
    }

    pub fn twist_amount(&self) -> f32 {
        self.twist
    }

    pub fn twisting(&self) -> bool {
        self.twist.abs() > TWIST_THRESHOLD
    }
}
