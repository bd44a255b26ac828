//! Equi-width histograms over single columns.

use std::fmt;

use crate::executor::Op;

/// Equi-width histogram over a fixed integer range.
///
/// The range `[min, max]` is split into buckets of width
/// `ceil((max - min + 1) / buckets)`; the last bucket may be narrower.
/// Space and per-value time are constant in the number of values seen.
pub struct IntHistogram {
    min: i32,
    max: i32,
    bucket_width: i64,
    buckets: Vec<i64>,
    total: i64,
}

impl IntHistogram {
    /// Creates a histogram with `buckets` buckets over `[min, max]`.
    ///
    /// Every value later added must lie inside the range.
    pub fn new(buckets: usize, min: i32, max: i32) -> IntHistogram {
        let span = max as i64 - min as i64 + 1;
        // A degenerate range (empty column: min > max) still builds; with
        // no values added every estimate falls back to 1.0.
        let bucket_width = (span + buckets as i64 - 1).div_euclid(buckets as i64).max(1);
        IntHistogram {
            min,
            max,
            bucket_width,
            buckets: vec![0; buckets],
            total: 0,
        }
    }

    fn bucket_of(&self, v: i32) -> usize {
        ((v as i64 - self.min as i64) / self.bucket_width) as usize
    }

    /// Effective width of bucket `b`: the last bucket only covers what is
    /// left of the range.
    fn width_of(&self, b: usize) -> i64 {
        if b == self.buckets.len() - 1 {
            self.max as i64 - self.min as i64 - (self.buckets.len() as i64 - 1) * self.bucket_width
                + 1
        } else {
            self.bucket_width
        }
    }

    /// Inclusive right edge of bucket `b`.
    fn right_edge_of(&self, b: usize) -> i64 {
        (self.min as i64 + (b as i64 + 1) * self.bucket_width - 1).min(self.max as i64)
    }

    /// Adds one value.
    pub fn add_value(&mut self, v: i32) {
        let b = self.bucket_of(v);
        self.buckets[b] += 1;
        self.total += 1;
    }

    /// Returns the number of values added.
    pub fn total(&self) -> i64 {
        self.total
    }

    /// Estimates the fraction of values satisfying `value op v`.
    ///
    /// An empty histogram answers 1.0, a safe over-estimate.
    pub fn estimate_selectivity(&self, op: Op, v: i32) -> f64 {
        if self.total == 0 {
            return 1.0;
        }

        let total = self.total as f64;
        let (eq_count, greater_count) = if v < self.min {
            (0.0, total)
        } else if v > self.max {
            (0.0, 0.0)
        } else {
            let b = self.bucket_of(v);
            let width = self.width_of(b).max(1) as f64;
            let eq = self.buckets[b] as f64 / width;

            let beyond: i64 = self.buckets[b + 1..].iter().sum();
            let within = eq * (self.right_edge_of(b) - v as i64) as f64;
            (eq, beyond as f64 + within)
        };

        match op {
            Op::Equals => eq_count / total,
            Op::NotEquals => 1.0 - eq_count / total,
            Op::GreaterThan => greater_count / total,
            Op::GreaterThanOrEq => (greater_count + eq_count) / total,
            Op::LessThan => 1.0 - (greater_count + eq_count) / total,
            Op::LessThanOrEq => 1.0 - greater_count / total,
            Op::Like => 1.0,
        }
    }
}

impl fmt::Display for IntHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (b, count) in self.buckets.iter().enumerate() {
            let left = self.min as i64 + b as i64 * self.bucket_width;
            writeln!(f, "[{}, {}]: {}", left, self.right_edge_of(b), count)?;
        }
        Ok(())
    }
}

/// Histogram over STRING columns.
///
/// Strings are mapped to integers by packing their first four bytes
/// big-endian, then delegated to an [`IntHistogram`] over the packed
/// range. Only equality-class estimates are meaningful, which is all the
/// planner asks of string columns.
pub struct StringHistogram {
    inner: IntHistogram,
}

impl StringHistogram {
    /// Creates a histogram with `buckets` buckets.
    pub fn new(buckets: usize) -> StringHistogram {
        StringHistogram {
            inner: IntHistogram::new(buckets, Self::min_value(), Self::max_value()),
        }
    }

    /// Packs the first four bytes of `s` into a sortable integer.
    fn string_to_int(s: &str) -> i32 {
        let mut v: i32 = 0;
        let bytes = s.as_bytes();
        for i in 0..4 {
            v = (v << 8) | bytes.get(i).copied().unwrap_or(0) as i32;
        }
        v.clamp(Self::min_value(), Self::max_value())
    }

    fn min_value() -> i32 {
        0
    }

    fn max_value() -> i32 {
        // "zzzz" packed big-endian; printable table data stays below it.
        i32::from_be_bytes([0x7a; 4])
    }

    /// Adds one string value.
    pub fn add_value(&mut self, s: &str) {
        self.inner.add_value(Self::string_to_int(s));
    }

    /// Estimates the fraction of values satisfying `value op s`.
    pub fn estimate_selectivity(&self, op: Op, s: &str) -> f64 {
        self.inner.estimate_selectivity(op, Self::string_to_int(s))
    }

    /// Returns the number of values added.
    pub fn total(&self) -> i64 {
        self.inner.total()
    }
}
