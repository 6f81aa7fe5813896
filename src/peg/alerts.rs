use crate::peg::deviation::DeviationResult;

/// A composed notification, ready for a [`crate::notify::Notifier`].
#[derive(Debug, Clone, PartialEq)]
pub struct AlertEvent {
    pub subject: String,
    pub body: String,
}

impl AlertEvent {
    pub fn compose(symbol: &str, result: &DeviationResult, threshold_percent: f64) -> Self {
        let subject = format!("ALERT: {} Price Deviation", symbol);
        let body = format!(
            "STABLECOIN PRICE ALERT\n\
             \n\
             Stablecoin: {}\n\
             Current Price: ${:.6}\n\
             Target Price: ${:.2}\n\
             Deviation: {:.2}%\n\
             \n\
             This deviation exceeds your configured threshold of {}%.\n",
            symbol, result.price, result.peg_price, result.deviation_percent, threshold_percent
        );

        Self { subject, body }
    }
}

pub struct AlertEngine {
    symbol: String,
    threshold_percent: f64,
}

impl AlertEngine {
    pub fn new(symbol: impl Into<String>, threshold_percent: f64) -> Self {
        Self {
            symbol: symbol.into(),
            threshold_percent,
        }
    }

    /// Returns an alert only when the deviation is beyond the threshold.
    pub fn check(&self, result: &DeviationResult) -> Option<AlertEvent> {
        if result.exceeds(self.threshold_percent) {
            Some(AlertEvent::compose(&self.symbol, result, self.threshold_percent))
        } else {
            None
        }
    }
}
