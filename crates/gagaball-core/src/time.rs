/// Milliseconds on a match clock. Every timed flag (invulnerability, freeze,
/// power-up expiry, parry cooldown) is stored as an absolute `Millis` and
/// compared against the current clock each tick.
pub type Millis = u64;

/// Convert a frame delta in seconds to whole milliseconds, rounding to nearest.
/// Negative or non-finite deltas yield zero.
pub fn secs_to_millis(dt: f32) -> Millis {
    if !dt.is_finite() || dt <= 0.0 {
        return 0;
    }
    (dt * 1000.0).round() as Millis
}
