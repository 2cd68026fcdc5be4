//! Session performance: portfolio value series, P&L, Sharpe ratio and drawdown.

/// Default annualization factor (trading days).
pub const TRADING_DAYS: f64 = 252.0;

/// Snapshot of the tracked performance numbers.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PerformanceSummary {
    /// Portfolio value at session start
    pub initial_value: f64,
    /// Most recently recorded portfolio value
    pub final_value: f64,
    /// `final_value - initial_value`
    pub pnl: f64,
    /// Annualized Sharpe ratio
    pub sharpe: f64,
    /// Maximum drawdown (positive fraction, e.g. 0.20 = 20% peak-to-trough)
    pub max_drawdown: f64,
    /// Number of recorded values, including the initial one
    pub num_values: usize,
}

impl std::fmt::Display for PerformanceSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Session Performance")?;
        writeln!(f, "  Initial value:   {:>12.2}", self.initial_value)?;
        writeln!(f, "  Final value:     {:>12.2}", self.final_value)?;
        writeln!(f, "  P&L:             {:>12.2}", self.pnl)?;
        writeln!(f, "  Sharpe:          {:>12.4}", self.sharpe)?;
        writeln!(f, "  Max drawdown:    {:>11.2}%", self.max_drawdown * 100.0)?;
        write!(f, "  Samples:         {:>12}", self.num_values)
    }
}

/// Append-only portfolio value series for one session.
///
/// The series starts with the initial value and never shrinks.
#[derive(Clone, Debug)]
pub struct PerformanceTracker {
    values: Vec<f64>,
    periods_per_year: f64,
    risk_free: f64,
}

impl PerformanceTracker {
    /// # Arguments
    ///
    /// * `initial_value`: Portfolio value before the first step
    /// * `periods_per_year`: Annualization factor ([`TRADING_DAYS`] by default)
    /// * `risk_free`: Annual risk-free rate subtracted from the annualized mean
    pub fn new(initial_value: f64, periods_per_year: f64, risk_free: f64) -> Self {
        Self {
            values: vec![initial_value],
            periods_per_year,
            risk_free,
        }
    }

    /// Append the portfolio value observed at the end of a step.
    pub fn record(&mut self, value: f64) {
        self.values.push(value);
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn initial_value(&self) -> f64 {
        self.values[0]
    }

    pub fn latest_value(&self) -> f64 {
        self.values[self.values.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Cumulative P&L: latest value minus initial value.
    pub fn pnl(&self) -> f64 {
        self.latest_value() - self.initial_value()
    }

    /// Period-over-period simple returns.
    ///
    /// Changes from a zero base are not finite and are skipped.
    pub fn returns(&self) -> Vec<f64> {
        self.values
            .windows(2)
            .map(|w| (w[1] - w[0]) / w[0])
            .filter(|r| r.is_finite())
            .collect()
    }

    /// Annualized Sharpe ratio over [`returns`](Self::returns).
    ///
    /// `(mean × N − risk_free) / (σ × √N)` with population σ. Returns 0 with
    /// fewer than two returns or zero volatility.
    pub fn sharpe(&self) -> f64 {
        sharpe_ratio(&self.returns(), self.periods_per_year, self.risk_free)
    }

    /// Largest peak-to-trough decline of the value series.
    pub fn max_drawdown(&self) -> f64 {
        compute_max_drawdown(&self.values)
    }

    pub fn summary(&self) -> PerformanceSummary {
        PerformanceSummary {
            initial_value: self.initial_value(),
            final_value: self.latest_value(),
            pnl: self.pnl(),
            sharpe: self.sharpe(),
            max_drawdown: self.max_drawdown(),
            num_values: self.values.len(),
        }
    }
}

/// Annualized Sharpe ratio of a return series.
pub fn sharpe_ratio(returns: &[f64], periods_per_year: f64, risk_free: f64) -> f64 {
    let n = returns.len();
    if n < 2 {
        return 0.0;
    }

    let mean = returns.iter().sum::<f64>() / n as f64;
    let variance = returns.iter().map(|&r| (r - mean).powi(2)).sum::<f64>() / n as f64;
    let volatility = variance.sqrt() * periods_per_year.sqrt();

    if volatility > 0.0 && volatility.is_finite() {
        (mean * periods_per_year - risk_free) / volatility
    } else {
        0.0
    }
}

/// Maximum drawdown of a value series, as a positive fraction of the peak.
fn compute_max_drawdown(values: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;

    for &v in values {
        if v > peak {
            peak = v;
        }
        if peak > 0.0 {
            let dd = (peak - v) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }

    max_dd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_initial_value() {
        let t = PerformanceTracker::new(50_000.0, TRADING_DAYS, 0.0);
        assert_eq!(t.values(), &[50_000.0]);
        assert_eq!(t.pnl(), 0.0);
        assert_eq!(t.sharpe(), 0.0);
    }

    #[test]
    fn pnl_is_latest_minus_initial() {
        let mut t = PerformanceTracker::new(50_000.0, TRADING_DAYS, 0.0);
        t.record(50_500.0);
        t.record(49_000.0);
        assert_eq!(t.pnl(), -1_000.0);
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn flat_series_has_zero_sharpe() {
        let mut t = PerformanceTracker::new(100.0, TRADING_DAYS, 0.0);
        for _ in 0..10 {
            t.record(100.0);
        }
        assert_eq!(t.sharpe(), 0.0);
    }

    #[test]
    fn sharpe_matches_formula() {
        let returns = [0.01, -0.005, 0.02, 0.0];
        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let std = (returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n).sqrt();
        let expected = (mean * 252.0 - 0.02) / (std * 252.0_f64.sqrt());

        assert!((sharpe_ratio(&returns, 252.0, 0.02) - expected).abs() < 1e-12);
    }

    #[test]
    fn returns_skip_zero_base() {
        let mut t = PerformanceTracker::new(0.0, TRADING_DAYS, 0.0);
        t.record(100.0);
        t.record(110.0);
        let r = t.returns();
        assert_eq!(r.len(), 1);
        assert!((r[0] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn single_return_has_zero_sharpe() {
        let mut t = PerformanceTracker::new(100.0, TRADING_DAYS, 0.0);
        t.record(110.0);
        assert_eq!(t.sharpe(), 0.0);
    }

    #[test]
    fn drawdown() {
        let mut t = PerformanceTracker::new(100.0, TRADING_DAYS, 0.0);
        t.record(120.0);
        t.record(90.0);
        t.record(130.0);
        assert!((t.max_drawdown() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn summary_display() {
        let mut t = PerformanceTracker::new(100.0, TRADING_DAYS, 0.0);
        t.record(105.0);
        let s = t.summary();
        assert_eq!(s.pnl, 5.0);
        assert_eq!(s.num_values, 2);
        let out = format!("{s}");
        assert!(out.contains("P&L"));
        assert!(out.contains("5.00"));
    }
}
