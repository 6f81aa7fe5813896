//! Deviation of an observed price from its peg.

/// Signed percentage deviation of `price` from `peg_price`.
///
/// `peg_price` must be positive; [`crate::config::Config`] guarantees it.
pub fn evaluate(price: f64, peg_price: f64) -> f64 {
    ((price - peg_price) / peg_price) * 100.0
}

/// Strict comparison: a deviation equal to the threshold does not alert.
pub fn exceeds_threshold(deviation_percent: f64, threshold_percent: f64) -> bool {
    deviation_percent.abs() > threshold_percent
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviationResult {
    pub price: f64,
    pub peg_price: f64,
    pub deviation_percent: f64,
}

impl DeviationResult {
    pub fn new(price: f64, peg_price: f64) -> Self {
        Self {
            price,
            peg_price,
            deviation_percent: evaluate(price, peg_price),
        }
    }

    pub fn exceeds(&self, threshold_percent: f64) -> bool {
        exceeds_threshold(self.deviation_percent, threshold_percent)
    }
}
