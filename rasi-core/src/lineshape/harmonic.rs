use crate::constants::{thermal_energy, HBAR};

/// Partition function of a quantum harmonic oscillator with angular
/// frequency `omega`, zero-point energy included.
pub fn harmonic_partition_function(omega: f64, temperature: f64) -> f64 {
    let x = HBAR * omega / thermal_energy(temperature);
    (-0.5 * x).exp() / (1.0 - (-x).exp())
}
