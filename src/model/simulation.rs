//! Monte Carlo simulation of the score differential

use crate::{Result, WnbaError};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// Percentile bounds of a confidence interval, in 0-100
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceBounds {
    pub low: f64,
    pub high: f64,
}

impl ConfidenceBounds {
    pub fn new(low: f64, high: f64) -> Result<Self> {
        if !(0.0..=100.0).contains(&low) || !(0.0..=100.0).contains(&high) || low >= high {
            return Err(WnbaError::Config(format!(
                "confidence bounds must satisfy 0 <= low < high <= 100, got {} and {}",
                low, high
            )));
        }
        Ok(ConfidenceBounds { low, high })
    }
}

/// Summary of a simulated differential distribution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationSummary {
    /// Share of draws where the home team wins
    pub win_probability: f64,
    pub conf_low: f64,
    pub conf_high: f64,
}

/// Normal-noise Monte Carlo around a predicted differential
pub struct MonteCarlo {
    simulations: usize,
    rng: StdRng,
}

impl MonteCarlo {
    pub fn new(simulations: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        MonteCarlo {
            simulations: simulations.max(1),
            rng,
        }
    }

    /// Draw `simulations` samples from Normal(mean, std)
    pub fn sample(&mut self, mean: f64, std: f64) -> Result<Vec<f64>> {
        let normal = Normal::new(mean, std).map_err(|e| {
            WnbaError::Model(format!("invalid distribution N({}, {}): {}", mean, std, e))
        })?;
        Ok((0..self.simulations)
            .map(|_| normal.sample(&mut self.rng))
            .collect())
    }

    pub fn simulate(
        &mut self,
        mean: f64,
        std: f64,
        bounds: ConfidenceBounds,
    ) -> Result<SimulationSummary> {
        let mut samples = self.sample(mean, std)?;
        let wins = samples.iter().filter(|&&s| s > 0.0).count();
        samples.sort_by(f64::total_cmp);

        Ok(SimulationSummary {
            win_probability: wins as f64 / samples.len() as f64,
            conf_low: percentile(&samples, bounds.low),
            conf_high: percentile(&samples, bounds.high),
        })
    }
}

/// Percentile of sorted data with linear interpolation between ranks
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = (pct / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let weight = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * weight
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_interpolates() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&data, 0.0), 1.0);
        assert_eq!(percentile(&data, 50.0), 3.0);
        assert_eq!(percentile(&data, 100.0), 5.0);
        assert_eq!(percentile(&data, 12.5), 1.5);
        assert_eq!(percentile(&[7.0], 95.0), 7.0);
        assert!(percentile(&[], 50.0).is_nan());
    }

    #[test]
    fn test_bounds_validation() {
        assert!(ConfidenceBounds::new(2.5, 97.5).is_ok());
        assert_eq!(ConfidenceBounds::new(5.0, 95.0).unwrap().high, 95.0);
        assert!(ConfidenceBounds::new(95.0, 5.0).is_err());
        assert!(ConfidenceBounds::new(-1.0, 50.0).is_err());
        assert!(ConfidenceBounds::new(10.0, 101.0).is_err());
    }

    #[test]
    fn test_zero_spread_is_deterministic() {
        let mut mc = MonteCarlo::new(100, Some(1));
        let bounds = ConfidenceBounds::new(2.5, 97.5).unwrap();

        let summary = mc.simulate(3.0, 0.0, bounds).unwrap();
        assert_eq!(summary.win_probability, 1.0);
        assert_eq!(summary.conf_low, 3.0);
        assert_eq!(summary.conf_high, 3.0);

        let summary = mc.simulate(-0.5, 0.0, bounds).unwrap();
        assert_eq!(summary.win_probability, 0.0);
    }

    #[test]
    fn test_symmetric_distribution() {
        let mut mc = MonteCarlo::new(20_000, Some(42));
        let bounds = ConfidenceBounds::new(2.5, 97.5).unwrap();
        let summary = mc.simulate(0.0, 10.0, bounds).unwrap();

        assert!((summary.win_probability - 0.5).abs() < 0.02);
        // 95% interval of N(0, 10) is about +/- 19.6
        assert!((summary.conf_low + 19.6).abs() < 1.0);
        assert!((summary.conf_high - 19.6).abs() < 1.0);
    }

    #[test]
    fn test_seed_reproducible() {
        let bounds = ConfidenceBounds::new(5.0, 95.0).unwrap();
        let a = MonteCarlo::new(500, Some(7)).simulate(4.0, 12.0, bounds).unwrap();
        let b = MonteCarlo::new(500, Some(7)).simulate(4.0, 12.0, bounds).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_spread() {
        let mut mc = MonteCarlo::new(10, Some(1));
        assert!(mc.sample(0.0, f64::NAN).is_err());
        assert!(mc.sample(0.0, -1.0).is_err());
    }
}
