use std::collections::BTreeMap;
use std::time::Instant;

use itertools::Itertools;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::info;

use mzcore::data::spectrum::{MzSpectrum, Precursor, Scan, ScanCycle};

use crate::errors::{Result, SimError};
use crate::sim::distribution::rescale_intensity;
use crate::sim::fragmentation::Fragmentor;
use crate::sim::noise::NoiseInjector;
use crate::sim::properties::{PeakProperties, RunParams};

/// Fixed number of dependent fragment scans per survey cycle. Cycles are
/// always padded to this width with placeholder scans.
pub const PRECURSORS_PER_CYCLE: usize = 10;

/// Scan ids a molecule participated in; auxiliary output for downstream
/// summaries, never consulted by the generation logic.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MoleculeScanIds {
    pub ms1_scans: Vec<u32>,
    pub ms2_scans: Vec<u32>,
}

/// The ordered cycle stream plus the per-molecule bookkeeping index.
#[derive(Clone, Debug, PartialEq)]
pub struct AcquisitionRun {
    pub cycles: Vec<ScanCycle>,
    pub molecule_scans: BTreeMap<String, MoleculeScanIds>,
}

impl AcquisitionRun {
    /// All scans in emission order, survey scan first within each cycle.
    pub fn scans(&self) -> impl Iterator<Item = &Scan> + '_ {
        self.cycles
            .iter()
            .flat_map(|cycle| std::iter::once(&cycle.ms1).chain(cycle.ms2.iter()))
    }

    pub fn scan_count(&self) -> usize {
        self.cycles.iter().map(|cycle| 1 + cycle.ms2.len()).sum()
    }
}

/// A molecule eligible for fragmentation in the running cycle.
struct PrecursorCandidate<'a> {
    properties: &'a PeakProperties,
    summed_intensity: f64,
    apex_mz: f64,
    apex_intensity: f64,
}

/// Data-dependent acquisition simulator: walks the retention-time axis,
/// emits one survey scan per cycle and fans out to exactly
/// [`PRECURSORS_PER_CYCLE`] dependent fragment scans, real where a ranked
/// molecule is still eluting and placeholders everywhere else.
pub struct DdaAcquisition<'a> {
    properties: &'a [PeakProperties],
    envelopes: &'a BTreeMap<String, MzSpectrum>,
    params: &'a RunParams,
    fragmentor: &'a dyn Fragmentor,
    noise_injector: &'a mut dyn NoiseInjector,
}

impl<'a> DdaAcquisition<'a> {
    pub fn new(
        properties: &'a [PeakProperties],
        envelopes: &'a BTreeMap<String, MzSpectrum>,
        params: &'a RunParams,
        fragmentor: &'a dyn Fragmentor,
        noise_injector: &'a mut dyn NoiseInjector,
    ) -> Self {
        DdaAcquisition {
            properties,
            envelopes,
            params,
            fragmentor,
            noise_injector,
        }
    }

    /// Run the full simulation clock and materialize the cycle stream.
    pub fn generate(mut self) -> Result<AcquisitionRun> {
        info!("start generating scan cycles");
        let started = Instant::now();

        let mut molecule_scans: BTreeMap<String, MoleculeScanIds> = self
            .properties
            .iter()
            .map(|p| (p.chemical_formula.clone(), MoleculeScanIds::default()))
            .collect();
        let mut cycles: Vec<ScanCycle> = Vec::new();
        let mut scan_id: u32 = 0;

        let mut t = 0.0;
        while t < self.params.gradient_length {
            let cycle = self.build_cycle(t, &mut scan_id, &mut molecule_scans)?;
            cycles.push(cycle);
            t += self.params.ms_rt_diff;
        }

        info!(
            cycles = cycles.len(),
            scans = scan_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "finished generating scan cycles"
        );
        Ok(AcquisitionRun {
            cycles,
            molecule_scans,
        })
    }

    fn build_cycle(
        &mut self,
        t: f64,
        scan_id: &mut u32,
        molecule_scans: &mut BTreeMap<String, MoleculeScanIds>,
    ) -> Result<ScanCycle> {
        let mut pooled: Vec<(f64, f64)> = Vec::new();
        let mut candidates: Vec<PrecursorCandidate> = Vec::new();

        for props in self.properties {
            if !props.is_active_at(t) {
                continue;
            }
            let envelope = match self.envelopes.get(&props.chemical_formula) {
                Some(envelope) => envelope,
                None => continue,
            };
            let scaled = rescale_intensity(&envelope.intensity, t, props)?;
            let peaks: Vec<(f64, f64)> = envelope
                .mz
                .iter()
                .zip(scaled.iter())
                .map(|(&mz, &intensity)| (mz, intensity))
                .collect();
            let apex = peaks
                .iter()
                .copied()
                .reduce(|best, candidate| if candidate.1 > best.1 { candidate } else { best });

            if let Some((apex_mz, apex_intensity)) = apex {
                pooled.extend_from_slice(&peaks);
                candidates.push(PrecursorCandidate {
                    properties: props,
                    summed_intensity: scaled.iter().sum(),
                    apex_mz,
                    apex_intensity,
                });
                if let Some(ids) = molecule_scans.get_mut(&props.chemical_formula) {
                    ids.ms1_scans.push(*scan_id);
                }
            }
        }

        // Survey peaks are kept intensity-ascending, not m/z-ordered
        let (mz, intensity) = pooled.into_iter().unzip();
        let spectrum = MzSpectrum::new(mz, intensity).sorted_by_intensity();
        let ms1 = self.noise_injector.inject_noise(Scan::ms1(*scan_id, t, spectrum));
        validate_scan(&ms1)?;
        let precursor_scan_id = *scan_id;
        *scan_id += 1;

        // Rank by summed scaled intensity, descending; stable on ties
        let ranked: Vec<PrecursorCandidate> = candidates
            .into_iter()
            .sorted_by(|a, b| OrderedFloat(b.summed_intensity).cmp(&OrderedFloat(a.summed_intensity)))
            .collect();

        let mut ms2_scans: Vec<Scan> = Vec::with_capacity(PRECURSORS_PER_CYCLE);
        let slots = ranked
            .iter()
            .map(Some)
            .pad_using(PRECURSORS_PER_CYCLE, |_| None)
            .take(PRECURSORS_PER_CYCLE);

        for (slot, candidate) in slots.enumerate() {
            let rt = t + (slot as f64 + 1.0) * self.params.ms_rt_diff;
            let scan = match candidate {
                Some(candidate) if candidate.properties.is_active_at(rt) => {
                    let fragments = self.fragmentor.fragment(&candidate.properties.trivial_name)?;
                    if fragments.mz.len() != fragments.intensity.len() {
                        return Err(SimError::LengthMismatch {
                            scan_id: *scan_id,
                            mz_len: fragments.mz.len(),
                            intensity_len: fragments.intensity.len(),
                        });
                    }
                    let precursor = Precursor {
                        mz: candidate.apex_mz,
                        intensity: candidate.apex_intensity,
                        charge: 1,
                        scan_id: precursor_scan_id,
                    };
                    let scan = self
                        .noise_injector
                        .inject_noise(Scan::ms2(*scan_id, rt, fragments, precursor));
                    validate_scan(&scan)?;
                    if let Some(ids) =
                        molecule_scans.get_mut(&candidate.properties.chemical_formula)
                    {
                        ids.ms2_scans.push(*scan_id);
                    }
                    scan
                }
                _ => Scan::ms2(
                    *scan_id,
                    rt,
                    MzSpectrum::default(),
                    Precursor {
                        mz: 0.0,
                        intensity: 0.0,
                        charge: 1,
                        scan_id: precursor_scan_id,
                    },
                ),
            };
            ms2_scans.push(scan);
            *scan_id += 1;
        }

        Ok(ScanCycle {
            ms1,
            ms2: ms2_scans,
        })
    }
}

/// Reject collaborator output that broke the mz/intensity pairing.
fn validate_scan(scan: &Scan) -> Result<()> {
    if scan.spectrum.mz.len() != scan.spectrum.intensity.len() {
        return Err(SimError::LengthMismatch {
            scan_id: scan.id,
            mz_len: scan.spectrum.mz.len(),
            intensity_len: scan.spectrum.intensity.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap as Map;

    use crate::sim::isotopologue::{build_isotopologue_library, ConvolutionEnvelopeProvider};
    use crate::sim::noise::{GaussNoiseInjector, PassthroughNoiseInjector};
    use crate::sim::properties::{check_peak_properties, check_run_params, RawPeakProperties, RawRunParams};

    struct StubFragmentor;

    impl Fragmentor for StubFragmentor {
        fn fragment(&self, _trivial_name: &str) -> Result<MzSpectrum> {
            Ok(MzSpectrum::new(vec![81.05, 136.06], vec![100.0, 100.0]))
        }
    }

    struct BrokenNoiseInjector;

    impl NoiseInjector for BrokenNoiseInjector {
        fn inject_noise(&mut self, mut scan: Scan) -> Scan {
            scan.spectrum.intensity.push(1.0);
            scan
        }
    }

    fn raw_molecule(
        formula: &str,
        name: &str,
        start: f64,
        width: f64,
        scaling: f64,
    ) -> RawPeakProperties {
        let mut peak_params = Map::new();
        peak_params.insert("sigma".to_string(), 1.0);
        RawPeakProperties {
            chemical_formula: formula.to_string(),
            trivial_name: Some(name.to_string()),
            charge: Some(1),
            scan_start_time: Some(start),
            peak_width: Some(width),
            peak_function: Some("gauss".to_string()),
            peak_params,
            peak_scaling_factor: Some(scaling),
        }
    }

    fn run_params(gradient_length: f64, ms_rt_diff: f64) -> RunParams {
        check_run_params(RawRunParams {
            gradient_length: Some(gradient_length),
            ms_rt_diff: Some(ms_rt_diff),
            charges: None,
        })
        .unwrap()
    }

    fn generate_water_run() -> AcquisitionRun {
        let properties =
            check_peak_properties(vec![raw_molecule("H2O", "water", 0.0, 10.0, 1000.0)]).unwrap();
        let provider = ConvolutionEnvelopeProvider::default();
        let envelopes = build_isotopologue_library(&properties, &provider, &[1]).unwrap();
        let params = run_params(10.0, 1.0);
        let mut noise = PassthroughNoiseInjector;
        DdaAcquisition::new(&properties, &envelopes, &params, &StubFragmentor, &mut noise)
            .generate()
            .unwrap()
    }

    #[test]
    fn test_water_scenario_cycle_structure() {
        let run = generate_water_run();

        // Ten survey cycles at t = 0..9, each with the full fan-out
        assert_eq!(run.cycles.len(), 10);
        for (k, cycle) in run.cycles.iter().enumerate() {
            assert_eq!(cycle.ms1.retention_time, k as f64);
            assert_eq!(cycle.ms2.len(), PRECURSORS_PER_CYCLE);

            let real: Vec<&Scan> = cycle.ms2.iter().filter(|s| !s.is_placeholder()).collect();
            assert_eq!(real.len(), 1);
            assert!(!cycle.ms2[0].is_placeholder());
            assert!(cycle.ms2[1..].iter().all(|s| s.is_placeholder()));

            // Dependent scans advance the retention time step by step
            for (j, ms2) in cycle.ms2.iter().enumerate() {
                assert_eq!(ms2.retention_time, k as f64 + (j + 1) as f64);
                assert_eq!(ms2.precursor.as_ref().unwrap().scan_id, cycle.ms1.id);
            }
        }
    }

    #[test]
    fn test_water_scenario_intensity_peaks_at_window_center() {
        let run = generate_water_run();
        let tics: Vec<f64> = run.cycles.iter().map(|c| c.ms1.total_ion_current()).collect();
        let apex_cycle = tics
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(apex_cycle, 5);
    }

    #[test]
    fn test_scan_ids_are_gapless_and_precursors_resolve() {
        let run = generate_water_run();
        let ids: Vec<u32> = run.scans().map(|s| s.id).collect();
        let expected: Vec<u32> = (0..run.scan_count() as u32).collect();
        assert_eq!(ids, expected);

        let mut seen_ms1: Vec<u32> = Vec::new();
        for scan in run.scans() {
            match &scan.precursor {
                None => seen_ms1.push(scan.id),
                Some(precursor) => assert!(seen_ms1.contains(&precursor.scan_id)),
            }
        }
    }

    #[test]
    fn test_ms1_peaks_are_intensity_ascending() {
        let run = generate_water_run();
        let ms1 = &run.cycles[5].ms1;
        assert!(!ms1.spectrum.is_empty());
        assert!(ms1.spectrum.intensity.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_membership_follows_elution_window() {
        let properties =
            check_peak_properties(vec![raw_molecule("C9H13N3O5", "cytidine", 2.0, 3.0, 1000.0)])
                .unwrap();
        let provider = ConvolutionEnvelopeProvider::default();
        let envelopes = build_isotopologue_library(&properties, &provider, &[1]).unwrap();
        let params = run_params(8.0, 1.0);
        let mut noise = PassthroughNoiseInjector;
        let run = DdaAcquisition::new(&properties, &envelopes, &params, &StubFragmentor, &mut noise)
            .generate()
            .unwrap();

        for cycle in &run.cycles {
            let t = cycle.ms1.retention_time;
            let in_window = (2.0..=5.0).contains(&t);
            assert_eq!(!cycle.ms1.spectrum.is_empty(), in_window, "at t = {}", t);
        }
        assert_eq!(
            run.molecule_scans["C9H13N3O5"].ms1_scans.len(),
            run.cycles
                .iter()
                .filter(|c| (2.0..=5.0).contains(&c.ms1.retention_time))
                .count()
        );
    }

    #[test]
    fn test_empty_configuration_still_runs_the_clock() {
        let properties: Vec<PeakProperties> = Vec::new();
        let envelopes = BTreeMap::new();
        let params = run_params(0.3, 0.1);
        let mut noise = PassthroughNoiseInjector;
        let run = DdaAcquisition::new(&properties, &envelopes, &params, &StubFragmentor, &mut noise)
            .generate()
            .unwrap();

        assert_eq!(run.cycles.len(), 3);
        for cycle in &run.cycles {
            assert!(cycle.ms1.spectrum.is_empty());
            assert_eq!(cycle.ms2.len(), PRECURSORS_PER_CYCLE);
            assert!(cycle.ms2.iter().all(|s| s.is_placeholder()));
        }
    }

    #[test]
    fn test_zero_gradient_produces_no_cycles() {
        let properties =
            check_peak_properties(vec![raw_molecule("H2O", "water", 0.0, 10.0, 1000.0)]).unwrap();
        let provider = ConvolutionEnvelopeProvider::default();
        let envelopes = build_isotopologue_library(&properties, &provider, &[1]).unwrap();
        let params = run_params(0.0, 1.0);
        let mut noise = PassthroughNoiseInjector;
        let run = DdaAcquisition::new(&properties, &envelopes, &params, &StubFragmentor, &mut noise)
            .generate()
            .unwrap();
        assert!(run.cycles.is_empty());
    }

    #[test]
    fn test_ranking_prefers_higher_summed_intensity() {
        let properties = check_peak_properties(vec![
            raw_molecule("C9H12N2O6", "uridine", 0.0, 10.0, 1000.0),
            raw_molecule("C10H13N5O4", "adenosine", 0.0, 10.0, 5000.0),
        ])
        .unwrap();
        let provider = ConvolutionEnvelopeProvider::default();
        let envelopes = build_isotopologue_library(&properties, &provider, &[1]).unwrap();
        let params = run_params(4.0, 1.0);
        let mut noise = PassthroughNoiseInjector;
        let run = DdaAcquisition::new(&properties, &envelopes, &params, &StubFragmentor, &mut noise)
            .generate()
            .unwrap();

        let adenosine_apex = envelopes["C10H13N5O4"].base_peak().unwrap().0;
        for cycle in &run.cycles {
            let first = cycle.ms2[0].precursor.as_ref().unwrap();
            assert!((first.mz - adenosine_apex).abs() < 1e-9);
            assert!(!cycle.ms2[0].is_placeholder());
            assert!(!cycle.ms2[1].is_placeholder());
            assert!(cycle.ms2[2..].iter().all(|s| s.is_placeholder()));
        }
    }

    #[test]
    fn test_fan_out_truncates_to_ten_candidates() {
        let formulas = [
            "C", "C2", "C3", "C4", "C5", "C6", "C7", "C8", "C9", "C10", "C11", "C12",
        ];
        let raw: Vec<RawPeakProperties> = formulas
            .iter()
            .enumerate()
            .map(|(i, f)| {
                // Unshaped profiles keep the ranking key exactly proportional
                // to the scaling factor
                let mut raw = raw_molecule(f, f, 0.0, 100.0, 1000.0 * (i as f64 + 1.0));
                raw.peak_function = Some("none".to_string());
                raw.peak_params.clear();
                raw
            })
            .collect();
        let properties = check_peak_properties(raw).unwrap();
        let provider = ConvolutionEnvelopeProvider::default();
        let envelopes = build_isotopologue_library(&properties, &provider, &[1]).unwrap();
        let params = run_params(2.0, 1.0);
        let mut noise = PassthroughNoiseInjector;
        let run = DdaAcquisition::new(&properties, &envelopes, &params, &StubFragmentor, &mut noise)
            .generate()
            .unwrap();

        let cycle = &run.cycles[0];
        assert_eq!(cycle.ms2.len(), PRECURSORS_PER_CYCLE);
        assert!(cycle.ms2.iter().all(|s| !s.is_placeholder()));
        // The two weakest molecules never make the cut
        assert!(run.molecule_scans["C"].ms2_scans.is_empty());
        assert!(run.molecule_scans["C2"].ms2_scans.is_empty());
        assert!(!run.molecule_scans["C12"].ms2_scans.is_empty());
    }

    #[test]
    fn test_fixed_seed_runs_are_identical() {
        let properties =
            check_peak_properties(vec![raw_molecule("H2O", "water", 0.0, 10.0, 1000.0)]).unwrap();
        let provider = ConvolutionEnvelopeProvider::default();
        let envelopes = build_isotopologue_library(&properties, &provider, &[1]).unwrap();
        let params = run_params(10.0, 1.0);

        let mut noise_a = GaussNoiseInjector::from_seed(1312, 0.05);
        let run_a = DdaAcquisition::new(&properties, &envelopes, &params, &StubFragmentor, &mut noise_a)
            .generate()
            .unwrap();
        let mut noise_b = GaussNoiseInjector::from_seed(1312, 0.05);
        let run_b = DdaAcquisition::new(&properties, &envelopes, &params, &StubFragmentor, &mut noise_b)
            .generate()
            .unwrap();

        assert_eq!(run_a, run_b);
    }

    #[test]
    fn test_broken_collaborator_is_rejected() {
        let properties =
            check_peak_properties(vec![raw_molecule("H2O", "water", 0.0, 10.0, 1000.0)]).unwrap();
        let provider = ConvolutionEnvelopeProvider::default();
        let envelopes = build_isotopologue_library(&properties, &provider, &[1]).unwrap();
        let params = run_params(2.0, 1.0);
        let mut noise = BrokenNoiseInjector;
        let err = DdaAcquisition::new(&properties, &envelopes, &params, &StubFragmentor, &mut noise)
            .generate()
            .unwrap_err();
        assert!(matches!(err, SimError::LengthMismatch { .. }));
    }
}
