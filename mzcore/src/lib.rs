// chemistry module
pub mod chemistry {
    pub mod constants;
    pub mod elements;
    pub mod formula;
}

// algorithm module
pub mod algorithm {
    pub mod isotope;
}

// data module
pub mod data {
    pub mod spectrum;
}
