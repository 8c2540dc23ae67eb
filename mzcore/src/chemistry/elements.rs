use std::collections::HashMap;

/// Monoisotopic weights of the elements the generator knows about.
///
/// # Examples
///
/// ```
/// use mzcore::chemistry::elements::atomic_weights_mono_isotopic;
///
/// let weights = atomic_weights_mono_isotopic();
/// assert_eq!(weights["C"], 12.0);
/// ```
pub fn atomic_weights_mono_isotopic() -> HashMap<&'static str, f64> {
    let mut map = HashMap::new();
    map.insert("H", 1.00782503207);
    map.insert("C", 12.0);
    map.insert("N", 14.0030740048);
    map.insert("O", 15.99491461956);
    map.insert("P", 30.97376163);
    map.insert("S", 31.97207100);
    map.insert("Na", 22.9897692809);
    map.insert("K", 38.96370668);
    map.insert("Cl", 34.96885268);
    map.insert("F", 18.99840322);
    map.insert("Se", 73.92247644);
    map
}

/// Isotope masses per element, most abundant species first is not assumed,
/// the order matches the abundance table below.
pub fn atoms_isotopic_weights() -> HashMap<&'static str, Vec<f64>> {
    let mut map = HashMap::new();
    map.insert("H", vec![1.00782503207, 2.0141017778]);
    map.insert("C", vec![12.0, 13.0033548378]);
    map.insert("N", vec![14.0030740048, 15.0001088982]);
    map.insert("O", vec![15.99491461956, 16.99913170, 17.9991610]);
    map.insert("P", vec![30.97376163]);
    map.insert("S", vec![31.97207100, 32.97145876, 33.96786690, 35.96708076]);
    map.insert("Na", vec![22.9897692809]);
    map.insert("K", vec![38.96370668, 39.96399848, 40.96182576]);
    map.insert("Cl", vec![34.96885268, 36.96590259]);
    map.insert("F", vec![18.99840322]);
    map.insert(
        "Se",
        vec![73.92247644, 75.91921406, 76.91991404, 77.91730909, 79.91652133, 81.9166994],
    );
    map
}

/// Natural isotopic abundances per element, aligned with
/// [`atoms_isotopic_weights`].
pub fn isotopic_abundance() -> HashMap<&'static str, Vec<f64>> {
    let mut map = HashMap::new();
    map.insert("H", vec![0.999885, 0.000115]);
    map.insert("C", vec![0.9893, 0.0107]);
    map.insert("N", vec![0.99636, 0.00364]);
    map.insert("O", vec![0.99757, 0.00038, 0.00205]);
    map.insert("P", vec![1.0]);
    map.insert("S", vec![0.9499, 0.0075, 0.0425, 0.0001]);
    map.insert("Na", vec![1.0]);
    map.insert("K", vec![0.932581, 0.000117, 0.067302]);
    map.insert("Cl", vec![0.7576, 0.2424]);
    map.insert("F", vec![1.0]);
    map.insert(
        "Se",
        vec![0.0089, 0.0937, 0.0763, 0.2377, 0.4961, 0.0873],
    );
    map
}
