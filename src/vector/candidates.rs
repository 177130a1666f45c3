//! Centroid and trial points of one Nelder-Mead step.
//!
//! Every trial point is an affine combination of the centroid `M` and the
//! vertex `V` the worker is about to replace:
//!
//! ```text
//!   reflection           (1 + rho) M - rho V
//!   expansion            (1 + rho xi) M - rho xi V
//!   inside contraction   (1 - gamma) M + gamma V
//!   outside contraction  (1 + rho gamma) M - rho gamma V
//! ```

use ndarray::prelude::*;
use ndarray::Zip;

use crate::simplex::Simplex;

/// Nelder-Mead coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    /// Reflection.
    pub rho: f64,
    /// Expansion.
    pub xi: f64,
    /// Contraction.
    pub gamma: f64,
    /// Shrink.
    pub sigma: f64,
}

impl Default for Coefficients {
    fn default() -> Self {
        Coefficients { rho: 1.0, xi: 2.0, gamma: 0.5, sigma: 0.5 }
    }
}

/// Work vectors reused across iterations.
#[derive(Debug, Clone)]
pub struct Scratch {
    pub centroid: Array1<f64>,
    pub reflection: Array1<f64>,
    pub expansion: Array1<f64>,
    pub contraction: Array1<f64>,
}

/// `out = a * m + b * v`
#[inline]
fn combine(out: &mut Array1<f64>, a: f64, m: &Array1<f64>, b: f64, v: ArrayView1<f64>) {
    Zip::from(out)
        .and(m)
        .and(&v)
        .for_each(|o, &m, &v| *o = a * m + b * v);
}

impl Scratch {
    pub fn new(dimension: usize) -> Self {
        Scratch {
            centroid: Array1::zeros(dimension),
            reflection: Array1::zeros(dimension),
            expansion: Array1::zeros(dimension),
            contraction: Array1::zeros(dimension),
        }
    }

    /// Mean of the first `pool` physical slots. Sums first, divides once.
    pub fn centroid(&mut self, simplex: &Simplex, pool: usize) {
        self.centroid.fill(0.0);
        for slot in 0..pool {
            self.centroid += &simplex.vertex(slot);
        }
        self.centroid /= pool as f64;
    }

    pub fn reflect(&mut self, target: ArrayView1<f64>, c: &Coefficients) {
        combine(&mut self.reflection, 1.0 + c.rho, &self.centroid, -c.rho, target);
    }

    pub fn expand(&mut self, target: ArrayView1<f64>, c: &Coefficients) {
        let k = c.rho * c.xi;
        combine(&mut self.expansion, 1.0 + k, &self.centroid, -k, target);
    }

    pub fn contract_inside(&mut self, target: ArrayView1<f64>, c: &Coefficients) {
        combine(&mut self.contraction, 1.0 - c.gamma, &self.centroid, c.gamma, target);
    }

    pub fn contract_outside(&mut self, target: ArrayView1<f64>, c: &Coefficients) {
        let k = c.rho * c.gamma;
        combine(&mut self.contraction, 1.0 + k, &self.centroid, -k, target);
    }
}
