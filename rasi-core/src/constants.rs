//! Physical constants (CODATA 2018, SI units).

use std::f64::consts::PI;

/// Boltzmann constant in J/K.
pub const BOLTZMANN: f64 = 1.380_649e-23;

/// Reduced Planck constant in J s.
pub const HBAR: f64 = 1.054_571_817e-34;

/// Elementary charge in C. Converts between eV and J.
pub const ELEMENTARY_CHARGE: f64 = 1.602_176_634e-19;

/// Thermal energy `k_B T` in J.
pub fn thermal_energy(temperature: f64) -> f64 {
    BOLTZMANN * temperature
}

/// Classical partition function of a harmonic mode with curvature
/// `m_omega2` (mass times angular frequency squared).
pub fn classical_partition_function(m_omega2: f64, temperature: f64) -> f64 {
    (2.0 * PI * thermal_energy(temperature) / m_omega2).sqrt()
}
