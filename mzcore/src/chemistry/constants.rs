// Physical constants used throughout the simulation
pub const MASS_PROTON: f64 = 1.007276466621; // Unified atomic mass unit
pub const MASS_NEUTRON: f64 = 1.00866491595; // Unified atomic mass unit
pub const MASS_ELECTRON: f64 = 0.00054857990946; // Unified atomic mass unit
pub const MASS_WATER: f64 = 18.0105646863; // Unified atomic mass unit

// IUPAC Standards
pub const STANDARD_TEMPERATURE: f64 = 273.15; // Kelvin
pub const STANDARD_PRESSURE: f64 = 1e5; // Pascal
pub const AVOGADRO: f64 = 6.02214076e23; // mol^-1
