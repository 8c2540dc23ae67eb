use std::fmt;
use std::fmt::{Display, Formatter};

use bincode::{Decode, Encode};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

extern crate rand;

use rand::distributions::Distribution;
use rand::Rng;
use statrs::distribution::Normal;

/// Represents the level of a spectrum.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize, Encode, Decode)]
pub enum MsLevel {
    Ms1,
    Ms2,
}

impl MsLevel {
    /// Numeric ms level as written to the output file.
    pub fn level(&self) -> u8 {
        match self {
            MsLevel::Ms1 => 1,
            MsLevel::Ms2 => 2,
        }
    }
}

impl Display for MsLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "MS{}", self.level())
    }
}

/// Represents a mass spectrum with associated m/z values and intensities.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct MzSpectrum {
    pub mz: Vec<f64>,
    pub intensity: Vec<f64>,
}

impl MzSpectrum {
    /// Constructs a new `MzSpectrum`.
    ///
    /// # Arguments
    ///
    /// * `mz` - A vector of m/z values.
    /// * `intensity` - A vector of intensity values corresponding to the m/z values.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use mzcore::data::spectrum::MzSpectrum;
    /// let spectrum = MzSpectrum::new(vec![100.0, 200.0], vec![10.0, 20.0]);
    /// assert_eq!(spectrum.mz, vec![100.0, 200.0]);
    /// assert_eq!(spectrum.intensity, vec![10.0, 20.0]);
    /// ```
    pub fn new(mz: Vec<f64>, intensity: Vec<f64>) -> Self {
        MzSpectrum { mz, intensity }
    }

    pub fn len(&self) -> usize {
        self.mz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mz.is_empty()
    }

    /// Summed intensity over all peaks.
    pub fn total_ion_current(&self) -> f64 {
        self.intensity.iter().sum()
    }

    /// The (m/z, intensity) pair of highest intensity, first such pair on ties.
    pub fn base_peak(&self) -> Option<(f64, f64)> {
        self.mz
            .iter()
            .zip(self.intensity.iter())
            .map(|(&mz, &intensity)| (mz, intensity))
            .reduce(|best, candidate| if candidate.1 > best.1 { candidate } else { best })
    }

    /// Returns the spectrum with peaks re-ordered by intensity ascending.
    /// The sort is stable, equal intensities keep their relative order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use mzcore::data::spectrum::MzSpectrum;
    /// let spectrum = MzSpectrum::new(vec![100.0, 200.0, 300.0], vec![30.0, 10.0, 20.0]);
    /// let sorted = spectrum.sorted_by_intensity();
    /// assert_eq!(sorted.mz, vec![200.0, 300.0, 100.0]);
    /// assert_eq!(sorted.intensity, vec![10.0, 20.0, 30.0]);
    /// ```
    pub fn sorted_by_intensity(&self) -> Self {
        let mut pairs: Vec<(f64, f64)> = self
            .mz
            .iter()
            .zip(self.intensity.iter())
            .map(|(&mz, &intensity)| (mz, intensity))
            .collect();
        pairs.sort_by_key(|&(_, intensity)| OrderedFloat(intensity));
        let (mz, intensity) = pairs.into_iter().unzip();
        MzSpectrum::new(mz, intensity)
    }

    /// Adds zero-mean Gaussian intensity noise scaled by the base peak
    /// intensity, clamped at zero. Empty spectra pass through unchanged.
    pub fn add_intensity_noise_normal<R: Rng>(&self, noise_level: f64, rng: &mut R) -> Self {
        let max_intensity = match self.base_peak() {
            Some((_, intensity)) if intensity > 0.0 => intensity,
            _ => return self.clone(),
        };
        let dist = Normal::new(0.0, max_intensity * noise_level).unwrap();
        let intensity = self
            .intensity
            .iter()
            .map(|&i| (i + dist.sample(rng)).max(0.0))
            .collect();
        MzSpectrum::new(self.mz.clone(), intensity)
    }
}

impl Display for MzSpectrum {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "MzSpectrum(peaks: {})", self.len())
    }
}

/// Precursor linkage carried by every fragment scan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Precursor {
    pub mz: f64,
    pub intensity: f64,
    pub charge: i32,
    pub scan_id: u32,
}

/// One emitted spectrum. Fragment scans carry their precursor linkage,
/// survey scans never do.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Scan {
    pub id: u32,
    pub ms_level: MsLevel,
    pub retention_time: f64,
    pub spectrum: MzSpectrum,
    pub precursor: Option<Precursor>,
}

impl Scan {
    pub fn ms1(id: u32, retention_time: f64, spectrum: MzSpectrum) -> Self {
        Scan {
            id,
            ms_level: MsLevel::Ms1,
            retention_time,
            spectrum,
            precursor: None,
        }
    }

    pub fn ms2(id: u32, retention_time: f64, spectrum: MzSpectrum, precursor: Precursor) -> Self {
        Scan {
            id,
            ms_level: MsLevel::Ms2,
            retention_time,
            spectrum,
            precursor: Some(precursor),
        }
    }

    pub fn total_ion_current(&self) -> f64 {
        self.spectrum.total_ion_current()
    }

    /// A fragment scan emitted purely to keep the cycle shape fixed.
    pub fn is_placeholder(&self) -> bool {
        self.ms_level == MsLevel::Ms2
            && self.spectrum.is_empty()
            && self.precursor.as_ref().map_or(false, |p| p.mz == 0.0)
    }
}

/// One survey scan paired with its dependent fragment scans.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct ScanCycle {
    pub ms1: Scan,
    pub ms2: Vec<Scan>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_peak_takes_first_on_ties() {
        let spectrum = MzSpectrum::new(vec![100.0, 200.0, 300.0], vec![5.0, 9.0, 9.0]);
        assert_eq!(spectrum.base_peak(), Some((200.0, 9.0)));
        assert_eq!(MzSpectrum::new(vec![], vec![]).base_peak(), None);
    }

    #[test]
    fn test_sorted_by_intensity_is_stable() {
        let spectrum = MzSpectrum::new(vec![300.0, 100.0, 200.0], vec![7.0, 7.0, 1.0]);
        let sorted = spectrum.sorted_by_intensity();
        assert_eq!(sorted.mz, vec![200.0, 300.0, 100.0]);
    }

    #[test]
    fn test_intensity_noise_preserves_shape_and_sign() {
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        let spectrum = MzSpectrum::new(vec![100.0, 200.0], vec![10.0, 1000.0]);
        let mut rng = StdRng::seed_from_u64(42);
        let noised = spectrum.add_intensity_noise_normal(0.05, &mut rng);

        assert_eq!(noised.mz, spectrum.mz);
        assert_eq!(noised.intensity.len(), 2);
        assert!(noised.intensity.iter().all(|&i| i >= 0.0));

        let empty = MzSpectrum::new(vec![], vec![]);
        assert_eq!(empty.add_intensity_noise_normal(0.05, &mut rng), empty);
    }
}
