extern crate statrs;

use std::collections::{BTreeMap, HashMap};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use statrs::distribution::{Continuous, Normal};
use crate::chemistry::elements::{atoms_isotopic_weights, isotopic_abundance};

/// convolve two distributions of masses and abundances
///
/// Arguments:
///
/// * `dist_a` - first distribution of masses and abundances
/// * `dist_b` - second distribution of masses and abundances
/// * `mass_tolerance` - mass tolerance for combining peaks
/// * `abundance_threshold` - minimum abundance for a peak to be kept
/// * `max_results` - maximum number of peaks to keep
///
/// Returns:
///
/// * `Vec<(f64, f64)>` - combined distribution of masses and abundances
///
/// # Examples
///
/// ```
/// use mzcore::algorithm::isotope::convolve;
///
/// let dist_a = vec![(100.0, 0.5), (101.0, 0.5)];
/// let dist_b = vec![(100.0, 0.5), (101.0, 0.5)];
/// let result = convolve(&dist_a, &dist_b, 1e-6, 1e-12, 200);
/// assert_eq!(result, vec![(200.0, 0.25), (201.0, 0.5), (202.0, 0.25)]);
/// ```
pub fn convolve(
    dist_a: &[(f64, f64)],
    dist_b: &[(f64, f64)],
    mass_tolerance: f64,
    abundance_threshold: f64,
    max_results: usize,
) -> Vec<(f64, f64)> {
    let mut result: Vec<(f64, f64)> = Vec::new();

    for (mass_a, abundance_a) in dist_a {
        for (mass_b, abundance_b) in dist_b {
            let combined_mass = mass_a + mass_b;
            let combined_abundance = abundance_a * abundance_b;

            if combined_abundance < abundance_threshold {
                continue;
            }

            // Merge with an existing peak within tolerance or start a new one
            if let Some(entry) = result
                .iter_mut()
                .find(|(m, _)| (*m - combined_mass).abs() < mass_tolerance)
            {
                entry.1 += combined_abundance;
            } else {
                result.push((combined_mass, combined_abundance));
            }
        }
    }

    // Sort by abundance (descending) to prepare for trimming
    result.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());

    if result.len() > max_results {
        result.truncate(max_results);
    }

    result.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

    result
}

/// convolve a distribution with itself n times
///
/// # Examples
///
/// ```
/// use mzcore::algorithm::isotope::convolve_pow;
///
/// let dist = vec![(100.0, 0.5), (101.0, 0.5)];
/// let result = convolve_pow(&dist, 2);
/// assert_eq!(result, vec![(200.0, 0.25), (201.0, 0.5), (202.0, 0.25)]);
/// ```
pub fn convolve_pow(dist: &[(f64, f64)], n: i32) -> Vec<(f64, f64)> {
    if n == 0 {
        return vec![(0.0, 1.0)]; // Delta distribution
    }
    if n == 1 {
        return dist.to_vec();
    }

    let mut result = dist.to_vec();
    let mut power = 2;

    // Square repeatedly to cover the largest power of two below n
    while power <= n {
        result = convolve(&result, &result, 1e-6, 1e-12, 200);
        power *= 2;
    }

    if power / 2 < n {
        result = convolve(&result, &convolve_pow(dist, n - power / 2), 1e-6, 1e-12, 200);
    }

    result
}

/// generate the isotope distribution for a given atomic composition
///
/// Arguments:
///
/// * `atomic_composition` - element symbol to atom count
/// * `mass_tolerance` - mass tolerance for combining peaks
/// * `abundance_threshold` - minimum abundance for a peak to be kept
/// * `max_result` - maximum number of peaks to keep
///
/// Returns:
///
/// * `Vec<(f64, f64)>` - mass-ordered distribution of masses and relative abundances
pub fn generate_isotope_distribution(
    atomic_composition: &HashMap<String, i32>,
    mass_tolerance: f64,
    abundance_threshold: f64,
    max_result: i32,
) -> Vec<(f64, f64)> {
    let mut cumulative_distribution: Option<Vec<(f64, f64)>> = None;
    let isotope_weights: HashMap<String, Vec<f64>> = atoms_isotopic_weights()
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    let isotope_abundances: HashMap<String, Vec<f64>> = isotopic_abundance()
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();

    for (element, &count) in atomic_composition.iter() {
        let element_weights = isotope_weights
            .get(element)
            .expect("Element not found in isotopic weights table")
            .clone();
        let element_abundances = isotope_abundances
            .get(element)
            .expect("Element not found in isotopic abundance table")
            .clone();

        let element_distribution: Vec<(f64, f64)> = element_weights
            .iter()
            .zip(element_abundances.iter())
            .map(|(&mass, &abundance)| (mass, abundance))
            .collect();

        let element_power_distribution = if count > 1 {
            convolve_pow(&element_distribution, count)
        } else {
            element_distribution
        };

        cumulative_distribution = match cumulative_distribution {
            Some(cum_dist) => Some(convolve(
                &cum_dist,
                &element_power_distribution,
                mass_tolerance,
                abundance_threshold,
                max_result as usize,
            )),
            None => Some(element_power_distribution),
        };
    }

    let final_distribution = cumulative_distribution.expect("Composition has no elements");
    let total_abundance: f64 = final_distribution.iter().map(|&(_, abundance)| abundance).sum();
    let normalized: Vec<_> = final_distribution
        .into_iter()
        .map(|(mass, abundance)| (mass, abundance / total_abundance))
        .collect();

    // Merge peaks that quantize to the same micro-mass and emit mass-ordered
    let mut sort_map: BTreeMap<i64, f64> = BTreeMap::new();
    let quantize = |mass: f64| -> i64 { (mass * 1_000_000.0).round() as i64 };

    for (mass, abundance) in normalized {
        let key = quantize(mass);
        sort_map.entry(key).and_modify(|e| *e += abundance).or_insert(abundance);
    }

    sort_map
        .iter()
        .map(|(&key, &abundance)| (key as f64 / 1_000_000.0, abundance))
        .collect()
}

/// generate isotope distributions for a batch of atomic compositions in parallel
///
/// Arguments:
///
/// * `atomic_compositions` - one composition per molecule
/// * `mass_tolerance` - mass tolerance for combining peaks
/// * `abundance_threshold` - minimum abundance for a peak to be kept
/// * `max_result` - maximum number of peaks to keep per distribution
/// * `num_threads` - number of threads to use
///
/// Returns:
///
/// * `Vec<Vec<(f64, f64)>>` - one distribution per input composition, input order
pub fn generate_isotope_distributions(
    atomic_compositions: &[HashMap<String, i32>],
    mass_tolerance: f64,
    abundance_threshold: f64,
    max_result: i32,
    num_threads: usize,
) -> Vec<Vec<(f64, f64)>> {
    let thread_pool = ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .expect("Failed to build thread pool");

    thread_pool.install(|| {
        atomic_compositions
            .par_iter()
            .map(|composition| {
                generate_isotope_distribution(
                    composition,
                    mass_tolerance,
                    abundance_threshold,
                    max_result,
                )
            })
            .collect()
    })
}

/// calculate the normal probability density function
///
/// # Examples
///
/// ```
/// use mzcore::algorithm::isotope::normal_pdf;
///
/// let pdf = normal_pdf(0.0, 0.0, 1.0);
/// assert_eq!(pdf, 0.39894228040143265);
/// ```
pub fn normal_pdf(x: f64, mean: f64, std_dev: f64) -> f64 {
    let normal = Normal::new(mean, std_dev).unwrap();
    normal.pdf(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_water_distribution_is_normalized_and_mass_ordered() {
        let mut composition = HashMap::new();
        composition.insert("H".to_string(), 2);
        composition.insert("O".to_string(), 1);

        let dist = generate_isotope_distribution(&composition, 1e-3, 1e-9, 200);

        assert!(dist.len() >= 2);
        let total: f64 = dist.iter().map(|&(_, a)| a).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(dist.windows(2).all(|w| w[0].0 < w[1].0));
        // Monoisotopic water sits at the front and dominates
        assert!((dist[0].0 - 18.010565).abs() < 1e-3);
        assert!(dist[0].1 > 0.99);
    }

    #[test]
    fn test_batch_matches_single(){
        let mut composition = HashMap::new();
        composition.insert("C".to_string(), 6);
        composition.insert("H".to_string(), 12);
        composition.insert("O".to_string(), 6);

        let single = generate_isotope_distribution(&composition, 1e-3, 1e-9, 200);
        let batch = generate_isotope_distributions(&[composition], 1e-3, 1e-9, 200, 2);

        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0], single);
    }
}
