//! Electronic Matrix Factors
//!
//! An EMF dataset describes, for a set of defect positions along a 1D device
//! cut, the band edges and the carrier reservoirs a defect can exchange
//! charge with. Each reservoir is an energy grid plus a density of
//! states-weighted coupling on that grid.
//!
//! Datasets are loaded from JSON:
//!
//! ```json
//! {
//!   "metadata": { "dimensionality": "1D", "device_simulator": "minimos",
//!                 "theory_level": "wkb", "type": "tunneling" },
//!   "defects": [
//!     { "position": 0.5e-9, "ec": 1.1, "ev": 0.0, "phi": 0.1,
//!       "oxidation_reservoir": { "substrate": { "energies": [..], "density": [..] } },
//!       "reduction_reservoir": { .. } }
//!   ]
//! }
//! ```
//!
//! [`EmfPositionInterpolator`] turns a dataset and a defect position into
//! the reservoirs seen by a defect at that position.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, DomainError, Result};
use crate::node::{Calculator, Context, Publisher, Value, VariableRegistry};

/// One carrier reservoir: coupling density on an energy grid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reservoir {
    energies: Vec<f64>,
    density: Vec<f64>,
}

impl Reservoir {
    /// Pair up grid and density, sorted by energy.
    pub fn new(energies: Vec<f64>, density: Vec<f64>) -> Result<Self, DomainError> {
        let reservoir = Self { energies, density };
        reservoir.check_shape("reservoir")?;
        Ok(reservoir.sorted())
    }

    fn check_shape(&self, what: &str) -> Result<(), DomainError> {
        if self.energies.len() != self.density.len() {
            return Err(DomainError::ShapeMismatch {
                what: format!("{what}: density"),
                expected: self.energies.len(),
                actual: self.density.len(),
            });
        }
        Ok(())
    }

    fn sorted(self) -> Self {
        if self.energies.windows(2).all(|w| w[0] <= w[1]) {
            return self;
        }
        let mut points: Vec<(f64, f64)> = self.energies.into_iter().zip(self.density).collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (energies, density) = points.into_iter().unzip();
        Self { energies, density }
    }

    pub fn energies(&self) -> &[f64] {
        &self.energies
    }

    pub fn density(&self) -> &[f64] {
        &self.density
    }

    pub fn len(&self) -> usize {
        self.energies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.energies.is_empty()
    }
}

/// Reservoirs by name.
pub type ReservoirSet = IndexMap<String, Reservoir>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmfMetadata {
    pub dimensionality: String,
    pub device_simulator: String,
    pub theory_level: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Band edges and reservoirs at one defect position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefectRecord {
    pub position: f64,
    pub ec: f64,
    pub ev: f64,
    pub phi: f64,
    #[serde(default)]
    pub oxidation_reservoir: ReservoirSet,
    #[serde(default)]
    pub reduction_reservoir: ReservoirSet,
}

/// A full EMF dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmfData {
    #[serde(default)]
    pub metadata: EmfMetadata,
    defects: Vec<DefectRecord>,
}

impl EmfData {
    /// Build a dataset, ordering defects by position and reservoir points by
    /// energy.
    pub fn new(metadata: EmfMetadata, defects: Vec<DefectRecord>) -> Result<Self> {
        let mut data = Self { metadata, defects };
        data.normalize()?;
        Ok(data)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let mut data: Self =
            serde_json::from_str(text).map_err(|e| ConfigurationError::Json(e.to_string()))?;
        data.normalize()?;
        Ok(data)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ConfigurationError::Json(e.to_string()).into())
    }

    fn normalize(&mut self) -> Result<(), DomainError> {
        self.defects.sort_by(|a, b| a.position.total_cmp(&b.position));
        for defect in &mut self.defects {
            for (side, set) in [
                ("oxidation", &mut defect.oxidation_reservoir),
                ("reduction", &mut defect.reduction_reservoir),
            ] {
                for (name, reservoir) in set.iter_mut() {
                    reservoir.check_shape(&format!("{side} reservoir '{name}'"))?;
                    *reservoir = std::mem::take(reservoir).sorted();
                }
            }
        }
        Ok(())
    }

    pub fn defects(&self) -> &[DefectRecord] {
        &self.defects
    }

    /// Indices of the records enclosing `position`, which must lie strictly
    /// inside the simulated interval.
    pub fn bracket(&self, position: f64) -> Result<(usize, usize), DomainError> {
        let out_of_range = || DomainError::PositionOutOfRange {
            position,
            lower: self.defects.first().map_or(f64::NAN, |d| d.position),
            upper: self.defects.last().map_or(f64::NAN, |d| d.position),
        };
        let (Some(first), Some(last)) = (self.defects.first(), self.defects.last()) else {
            return Err(out_of_range());
        };
        if !(first.position < position && position < last.position) {
            return Err(out_of_range());
        }
        let upper = self
            .defects
            .iter()
            .position(|d| position < d.position)
            .ok_or_else(out_of_range)?;
        Ok((upper - 1, upper))
    }
}

/// Linear interpolation between `(x1, y1)` and `(x2, y2)`.
pub fn lerp(x: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    let w = (x - x1) / (x2 - x1);
    (1.0 - w) * y1 + w * y2
}

fn interpolate_set(
    side: &'static str,
    x: f64,
    lower: (&ReservoirSet, f64),
    upper: (&ReservoirSet, f64),
) -> Result<ReservoirSet, DomainError> {
    let (set1, x1) = lower;
    let (set2, x2) = upper;
    if set1.len() != set2.len() || set1.keys().any(|name| !set2.contains_key(name)) {
        return Err(DomainError::ReservoirMismatch { side });
    }

    let mut result = ReservoirSet::with_capacity(set1.len());
    for (name, r1) in set1 {
        let Some(r2) = set2.get(name) else {
            return Err(DomainError::ReservoirMismatch { side });
        };
        if r1.energies != r2.energies {
            return Err(DomainError::GridMismatch {
                reservoir: name.clone(),
            });
        }
        let density = r1
            .density
            .iter()
            .zip(&r2.density)
            .map(|(&d1, &d2)| lerp(x, x1, d1, x2, d2))
            .collect();
        result.insert(
            name.clone(),
            Reservoir {
                energies: r1.energies.clone(),
                density,
            },
        );
    }
    Ok(result)
}

/// Interpolates an EMF dataset at a defect position.
///
/// Inputs: `emf`, `position`. Outputs: `oxidation_reservoir`,
/// `reduction_reservoir`, `ec`, `ev`, `phi`.
#[derive(Debug, Default)]
pub struct EmfPositionInterpolator;

impl Calculator for EmfPositionInterpolator {
    fn kind(&self) -> &'static str {
        "EmfPositionInterpolator"
    }

    fn declare(&self, vars: &mut VariableRegistry) -> Result<()> {
        vars.require_input("emf")?;
        vars.require_input("position")?;
        for name in ["oxidation_reservoir", "reduction_reservoir", "ec", "ev", "phi"] {
            vars.declare_output(name, Value::Unset)?;
        }
        Ok(())
    }

    fn recompute(&mut self, cx: &Context<'_>, out: &mut Publisher<'_>) -> Result<()> {
        let emf = cx.emf("emf")?;
        let x = cx.scalar("position")?;

        let (i1, i2) = emf.bracket(x)?;
        let lower = &emf.defects[i1];
        let upper = &emf.defects[i2];
        let (x1, x2) = (lower.position, upper.position);

        let oxidation = interpolate_set(
            "oxidation",
            x,
            (&lower.oxidation_reservoir, x1),
            (&upper.oxidation_reservoir, x2),
        )?;
        let reduction = interpolate_set(
            "reduction",
            x,
            (&lower.reduction_reservoir, x1),
            (&upper.reduction_reservoir, x2),
        )?;

        out.publish("oxidation_reservoir", oxidation)?;
        out.publish("reduction_reservoir", reduction)?;
        out.publish("ec", lerp(x, x1, lower.ec, x2, upper.ec))?;
        out.publish("ev", lerp(x, x1, lower.ev, x2, upper.ev))?;
        out.publish("phi", lerp(x, x1, lower.phi, x2, upper.phi))
    }
}
