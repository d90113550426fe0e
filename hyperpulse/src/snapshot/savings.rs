//! Estimated carbon savings.
//!
//! The savings figure is an estimate whose formula varies by deployment, so it
//! is computed by a [`SavingsPolicy`] chosen at startup.

/// Inputs available to a savings policy at assembly time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SavingsInput {
    pub average_intensity_gco2_kwh: f64,
    pub carbon_aware_vms: u64,
    pub completed_backups: u64,
}

/// Strategy for estimating kilograms of CO2 saved by carbon-aware scheduling.
pub trait SavingsPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    fn estimate_kg(&self, input: &SavingsInput) -> f64;
}

/// Compares the observed grid intensity against a fixed baseline.
#[derive(Debug, Clone, Copy)]
pub struct BaselineSavingsPolicy {
    /// Reference grid intensity in gCO2/kWh.
    pub baseline_intensity: f64,
    /// Energy attributed to one completed backup.
    pub kwh_per_backup: f64,
}

impl Default for BaselineSavingsPolicy {
    fn default() -> Self {
        Self {
            baseline_intensity: 400.0,
            kwh_per_backup: 10.0,
        }
    }
}

impl SavingsPolicy for BaselineSavingsPolicy {
    fn name(&self) -> &'static str {
        "baseline"
    }

    fn estimate_kg(&self, input: &SavingsInput) -> f64 {
        if input.carbon_aware_vms == 0 || input.average_intensity_gco2_kwh <= 0.0 {
            return 0.0;
        }
        let delta = (self.baseline_intensity - input.average_intensity_gco2_kwh).max(0.0);
        delta * self.kwh_per_backup * input.completed_backups as f64 / 1000.0
    }
}

/// Reports no savings.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSavingsPolicy;

impl SavingsPolicy for NoSavingsPolicy {
    fn name(&self) -> &'static str {
        "none"
    }

    fn estimate_kg(&self, _input: &SavingsInput) -> f64 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_policy() {
        let policy = BaselineSavingsPolicy::default();
        let input = SavingsInput {
            average_intensity_gco2_kwh: 250.0,
            carbon_aware_vms: 4,
            completed_backups: 2,
        };
        // (400 - 250) * 10 kWh * 2 backups / 1000
        assert!((policy.estimate_kg(&input) - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_baseline_policy_never_negative() {
        let policy = BaselineSavingsPolicy::default();
        let input = SavingsInput {
            average_intensity_gco2_kwh: 650.0,
            carbon_aware_vms: 1,
            completed_backups: 10,
        };
        assert_eq!(policy.estimate_kg(&input), 0.0);
    }

    #[test]
    fn test_baseline_policy_requires_carbon_aware_vms() {
        let policy = BaselineSavingsPolicy::default();
        let input = SavingsInput {
            average_intensity_gco2_kwh: 100.0,
            carbon_aware_vms: 0,
            completed_backups: 10,
        };
        assert_eq!(policy.estimate_kg(&input), 0.0);
        assert_eq!(NoSavingsPolicy.estimate_kg(&input), 0.0);
    }
}
