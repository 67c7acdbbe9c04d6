use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

/// Parameters of one k-means run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeansConfig {
    pub k: usize,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Stop once the RSS improves by less than this between iterations.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_max_iterations() -> usize { 100 }
fn default_tolerance() -> f64 { 1e-5 }
fn default_workers() -> usize { num_cpus::get() }

impl KMeansConfig {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            workers: default_workers(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Rejects `k` outside `1..=documents` and a zero iteration limit, and clamps
    /// `workers` to at least one.
    pub fn validate(&mut self, documents: usize) -> Result<()> {
        if self.k == 0 || self.k > documents {
            return Err(IndexError::InvalidClusterCount { k: self.k, documents });
        }
        if self.max_iterations == 0 {
            return Err(IndexError::input("max_iterations must be at least 1"));
        }
        self.workers = self.workers.max(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_uses_defaults() {
        let cfg = KMeansConfig::new(3);
        assert_eq!(cfg.k, 3);
        assert_eq!(cfg.max_iterations, 100);
        assert!((cfg.tolerance - 1e-5).abs() < f64::EPSILON);
        assert!(cfg.workers >= 1);
    }

    #[test]
    fn k_must_fit_the_corpus() {
        assert!(matches!(
            KMeansConfig::new(0).validate(4),
            Err(IndexError::InvalidClusterCount { k: 0, documents: 4 })
        ));
        assert!(KMeansConfig::new(5).validate(4).is_err());
        let mut cfg = KMeansConfig::new(4).with_workers(0);
        cfg.validate(4).unwrap();
        assert_eq!(cfg.workers, 1);
    }

    #[test]
    fn zero_iterations_is_rejected() {
        let err = KMeansConfig::new(2).with_max_iterations(0).validate(4).unwrap_err();
        assert!(matches!(err, IndexError::Input(msg) if msg.contains("max_iterations")));
    }
}
