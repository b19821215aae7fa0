/// A closed range `[min, max]` along one axis.
///
/// The empty interval has `min > max` so that growing it by any value
/// yields a degenerate interval at that value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub min: f32,
    pub max: f32,
}

impl Interval {
    /// Create a new interval given min and max values.
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Returns true if the interval contains nothing.
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    /// Grow the interval so that it contains `x`.
    pub fn include(&mut self, x: f32) {
        self.min = self.min.min(x);
        self.max = self.max.max(x);
    }

    /// Creates an interval that surrounds two other intervals.
    pub fn surrounding(a: &Interval, b: &Interval) -> Interval {
        Interval::new(a.min.min(b.min), a.max.max(b.max))
    }

    /// An empty interval (min > max, contains nothing).
    pub const EMPTY: Interval = Interval {
        min: f32::INFINITY,
        max: f32::NEG_INFINITY,
    };
}

impl Default for Interval {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_include_from_empty() {
        let mut interval = Interval::EMPTY;
        assert!(interval.is_empty());

        interval.include(3.0);
        assert!(!interval.is_empty());
        assert_eq!(interval.min, 3.0);
        assert_eq!(interval.max, 3.0);

        interval.include(-1.0);
        assert_eq!(interval.min, -1.0);
        assert_eq!(interval.max, 3.0);
    }

    #[test]
    fn test_interval_surrounding() {
        let a = Interval::new(-5.0, 0.0);
        let b = Interval::new(2.0, 7.0);
        let c = Interval::surrounding(&a, &b);

        assert_eq!(c.min, -5.0);
        assert_eq!(c.max, 7.0);
        assert!(Interval::surrounding(&Interval::EMPTY, &Interval::EMPTY).is_empty());
    }
}
