/// Simulation and real time of a level.
///
/// Simulation time advances by the real frame delta scaled by the rate, with
/// the real delta clamped to a maximum so a stalled frame does not produce a
/// single enormous step.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Clock {
    time: f64,
    real_time: f64,
    delta: f32,
    real_delta: f32,
    rate: f32,
    frame: u64,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Clock {
    pub fn new(rate: f32) -> Self {
        Self {
            time: 0.0,
            real_time: 0.0,
            delta: 0.0,
            real_delta: 0.0,
            rate,
            frame: 0,
        }
    }

    /// Simulation time in seconds
    #[inline]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Wall clock time in seconds, unaffected by the rate
    #[inline]
    pub fn real_time(&self) -> f64 {
        self.real_time
    }

    /// Simulation delta of the current frame
    #[inline]
    pub fn delta(&self) -> f32 {
        self.delta
    }

    #[inline]
    pub fn real_delta(&self) -> f32 {
        self.real_delta
    }

    /// The simulation time multiplier
    #[inline]
    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn set_rate(&mut self, rate: f32) {
        assert!(rate >= 0.0, "Negative time rate {rate}");
        self.rate = rate;
    }

    /// The number of frames advanced
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub(crate) fn advance(&mut self, real_delta: f32, max_delta: f32) {
        let real_delta = real_delta.max(0.0);
        self.real_delta = real_delta;
        self.delta = real_delta.min(max_delta) * self.rate;

        self.real_time += real_delta as f64;
        self.time += self.delta as f64;
        self.frame += 1;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn advance() {
        let mut clock = Clock::new(2.0);
        clock.advance(0.25, 1.0);
        assert_eq!(clock.delta(), 0.5);
        assert_eq!(clock.time(), 0.5);
        assert_eq!(clock.real_time(), 0.25);

        // Clamped
        clock.advance(4.0, 1.0);
        assert_eq!(clock.delta(), 2.0);
        assert_eq!(clock.real_delta(), 4.0);
        assert_eq!(clock.time(), 2.5);
        assert_eq!(clock.frame(), 2);

        clock.set_rate(0.0);
        clock.advance(0.5, 1.0);
        assert_eq!(clock.time(), 2.5);
        assert_eq!(clock.real_time(), 4.75);
    }
}
