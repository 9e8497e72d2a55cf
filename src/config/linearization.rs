//! Per-pixel nonlinearity correction.

use std::{collections::BTreeMap, str::FromStr};

use log::debug;
use ndarray::{Array1, ArrayView1, ArrayViewMut1, Zip};
use serde::Deserialize;

use super::ChannelIndices;
use crate::AggregateError;

/// The shapes of correction curve we know how to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveType {
    /// `((a x)^3 + b x) / (c x + 1)`
    CubicFraction,
}

impl FromStr for CurveType {
    type Err = AggregateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cubicfraction" => Ok(CurveType::CubicFraction),
            _ => Err(AggregateError::UnsupportedCurveType(s.to_string())),
        }
    }
}

/// The linearization table as stored in the hardware configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LinearizationTable {
    #[serde(rename = "type")]
    pub curve_type: String,

    /// Coefficients keyed by pixel number (as a string).
    pub parameters: BTreeMap<String, PixelCoefficients>,
}

/// Only the first element of each list is used.
#[derive(Debug, Clone, Deserialize)]
pub struct PixelCoefficients {
    pub a: Vec<f64>,
    pub b: Vec<f64>,
    pub c: Vec<f64>,
}

/// A correction curve with its per-pixel coefficients.
#[derive(Debug, Clone, PartialEq)]
pub struct Linearization {
    pub curve_type: CurveType,

    /// Coefficients indexed by pixel number. There's room for two rows of
    /// probe pixels, so each has twice as many elements as there are probe
    /// pixels; pixels missing from the table keep zero coefficients.
    pub a: Array1<f64>,
    pub b: Array1<f64>,
    pub c: Array1<f64>,
}

impl Linearization {
    /// Build the coefficient vectors from `table`. `source` names where the
    /// table came from, for error messages.
    pub fn from_table(
        table: &LinearizationTable,
        indices: &ChannelIndices,
        source: &str,
    ) -> Result<Linearization, AggregateError> {
        let curve_type: CurveType = table.curve_type.parse()?;

        let num_coeffs = indices.probe_pixels.len() * 2;
        let mut a = Array1::zeros(num_coeffs);
        let mut b = Array1::zeros(num_coeffs);
        let mut c = Array1::zeros(num_coeffs);
        for (key, coeffs) in &table.parameters {
            let pixel: usize = key.trim().parse().map_err(|_| {
                AggregateError::format(source, format!("'{key}' is not a pixel number"))
            })?;
            if pixel >= num_coeffs {
                return Err(AggregateError::format(
                    source,
                    format!("pixel {pixel} is out of range; there is room for {num_coeffs}"),
                ));
            }
            a[pixel] = first_coeff(&coeffs.a, "a", pixel, source)?;
            b[pixel] = first_coeff(&coeffs.b, "b", pixel, source)?;
            c[pixel] = first_coeff(&coeffs.c, "c", pixel, source)?;
        }
        debug!(
            "Linearization: {curve_type:?} with {} of {num_coeffs} pixels set",
            table.parameters.len()
        );

        Ok(Linearization { curve_type, a, b, c })
    }

    pub fn len(&self) -> usize {
        self.a.len()
    }

    pub fn is_empty(&self) -> bool {
        self.a.is_empty()
    }

    /// Apply the correction curve to one reading per pixel.
    pub fn linearize(&self, x: ArrayView1<f64>) -> Result<Array1<f64>, AggregateError> {
        self.check_len(x.len())?;
        let curve = self.curve();
        Ok(Zip::from(&x)
            .and(&self.a)
            .and(&self.b)
            .and(&self.c)
            .map_collect(|&x, &a, &b, &c| curve(x, a, b, c)))
    }

    /// As [`Linearization::linearize`], overwriting the readings.
    pub fn linearize_inplace(&self, mut x: ArrayViewMut1<f64>) -> Result<(), AggregateError> {
        self.check_len(x.len())?;
        let curve = self.curve();
        Zip::from(&mut x)
            .and(&self.a)
            .and(&self.b)
            .and(&self.c)
            .for_each(|x, &a, &b, &c| *x = curve(*x, a, b, c));
        Ok(())
    }

    fn curve(&self) -> fn(f64, f64, f64, f64) -> f64 {
        match self.curve_type {
            CurveType::CubicFraction => cubic_fraction,
        }
    }

    fn check_len(&self, len: usize) -> Result<(), AggregateError> {
        if len != self.len() {
            return Err(AggregateError::format(
                "linearization input",
                format!("got {len} readings for {} pixel coefficients", self.len()),
            ));
        }
        Ok(())
    }
}

/// `((a x)^3 + b x) / (c x + 1)`. A zero denominator is not special-cased and
/// gives inf or NaN.
pub fn cubic_fraction(x: f64, a: f64, b: f64, c: f64) -> f64 {
    // Adding zero turns -0.0 into 0.0.
    ((a * x).powf(3.0) + b * x) / (c * x + 1.0) + 0.0
}

fn first_coeff(
    values: &[f64],
    name: &str,
    pixel: usize,
    source: &str,
) -> Result<f64, AggregateError> {
    values.first().copied().ok_or_else(|| {
        AggregateError::format(
            source,
            format!("empty '{name}' coefficients for pixel {pixel}"),
        )
    })
}
