use mzcore::data::spectrum::Scan;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Perturbs a scan's signal. Implementations must preserve ms level, scan
/// id, retention time, precursor linkage and array lengths.
pub trait NoiseInjector {
    fn inject_noise(&mut self, scan: Scan) -> Scan;
}

/// Identity injector for deterministic ground-truth runs.
pub struct PassthroughNoiseInjector;

impl NoiseInjector for PassthroughNoiseInjector {
    fn inject_noise(&mut self, scan: Scan) -> Scan {
        scan
    }
}

/// Adds zero-mean Gaussian intensity noise scaled by each scan's base peak.
/// Seed explicitly for reproducible output; the entropy-seeded constructor
/// is non-deterministic by design.
pub struct GaussNoiseInjector {
    rng: StdRng,
    noise_level: f64,
}

impl GaussNoiseInjector {
    pub fn new(noise_level: f64) -> Self {
        GaussNoiseInjector {
            rng: StdRng::from_entropy(),
            noise_level,
        }
    }

    pub fn from_seed(seed: u64, noise_level: f64) -> Self {
        GaussNoiseInjector {
            rng: StdRng::seed_from_u64(seed),
            noise_level,
        }
    }
}

impl NoiseInjector for GaussNoiseInjector {
    fn inject_noise(&mut self, scan: Scan) -> Scan {
        let spectrum = scan
            .spectrum
            .add_intensity_noise_normal(self.noise_level, &mut self.rng);
        Scan { spectrum, ..scan }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mzcore::data::spectrum::MzSpectrum;

    fn sample_scan() -> Scan {
        Scan::ms1(3, 12.5, MzSpectrum::new(vec![100.0, 200.0], vec![50.0, 500.0]))
    }

    #[test]
    fn test_gauss_injector_preserves_identity_fields() {
        let mut injector = GaussNoiseInjector::from_seed(7, 0.05);
        let noised = injector.inject_noise(sample_scan());

        assert_eq!(noised.id, 3);
        assert_eq!(noised.retention_time, 12.5);
        assert_eq!(noised.spectrum.mz, vec![100.0, 200.0]);
        assert_eq!(noised.spectrum.intensity.len(), 2);
    }

    #[test]
    fn test_same_seed_same_noise() {
        let mut a = GaussNoiseInjector::from_seed(1312, 0.05);
        let mut b = GaussNoiseInjector::from_seed(1312, 0.05);
        assert_eq!(a.inject_noise(sample_scan()), b.inject_noise(sample_scan()));
    }

    #[test]
    fn test_passthrough_is_identity() {
        let scan = sample_scan();
        assert_eq!(PassthroughNoiseInjector.inject_noise(scan.clone()), scan);
    }
}
