//! The simplex store: `d + 1` vertices, one objective value per vertex and a
//! value-sorted permutation over the slots.
//!
//! Vertices and values are always addressed by physical slot. The permutation
//! is only used to rank values; sorting never moves coordinates.

use std::fmt;

use ndarray::prelude::*;
use ndarray::Zip;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Simplex {
    vertices: Array2<f64>,
    values: Array1<f64>,
    order: Vec<usize>,
}

impl Simplex {
    /// Vertex 0 is `guess`, vertex `i > 0` is `guess` moved by `step` along
    /// coordinate `i - 1`. Objective values start at zero.
    pub fn new(guess: ArrayView1<f64>, step: f64) -> Result<Self> {
        let n = guess.len();
        if n == 0 {
            return Err(Error::ZeroDimension);
        }
        let mut vertices = Array2::zeros((n + 1, n));
        for mut row in vertices.rows_mut() {
            row.assign(&guess);
        }
        for k in 0..n {
            vertices[[k + 1, k]] += step;
        }
        Self::from_vertices(vertices)
    }

    /// Wraps an explicit `(n + 1) x n` vertex matrix.
    pub fn from_vertices(vertices: Array2<f64>) -> Result<Self> {
        let (rows, n) = vertices.dim();
        if n == 0 {
            return Err(Error::ZeroDimension);
        }
        if rows != n + 1 {
            return Err(Error::DimensionMismatch { expected: n + 1, actual: rows });
        }
        Ok(Simplex {
            vertices,
            values: Array1::zeros(n + 1),
            order: (0..n + 1).collect(),
        })
    }

    pub fn dimension(&self) -> usize {
        self.vertices.ncols()
    }

    /// Number of vertices, `dimension() + 1`.
    pub fn len(&self) -> usize {
        self.vertices.nrows()
    }

    pub fn vertex(&self, slot: usize) -> ArrayView1<'_, f64> {
        self.vertices.row(slot)
    }

    pub fn vertex_mut(&mut self, slot: usize) -> ArrayViewMut1<'_, f64> {
        self.vertices.row_mut(slot)
    }

    pub fn vertices(&self) -> ArrayView2<'_, f64> {
        self.vertices.view()
    }

    pub fn objective(&self, slot: usize) -> f64 {
        self.values[slot]
    }

    pub fn set_objective(&mut self, slot: usize, value: f64) {
        self.values[slot] = value;
    }

    pub fn objectives(&self) -> ArrayView1<'_, f64> {
        self.values.view()
    }

    pub(crate) fn objectives_mut(&mut self) -> ArrayViewMut1<'_, f64> {
        self.values.view_mut()
    }

    /// Physical slot holding the `rank`-th smallest value.
    #[inline]
    pub fn sorted_slot(&self, rank: usize) -> usize {
        self.order[rank]
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Smallest known objective value.
    pub fn best(&self) -> f64 {
        self.values[self.order[0]]
    }

    /// Re-ranks the slots by value. The sort is stable and uses the IEEE total
    /// order, so ties keep their relative order and NaN ranks last.
    pub fn sort(&mut self) {
        let values = &self.values;
        self.order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    }

    /// Copies `vertex` into `slot` and stores `value` for it.
    /// Returns whether the coordinates actually changed.
    pub fn replace(&mut self, slot: usize, vertex: ArrayView1<f64>, value: f64) -> bool {
        let changed = self.vertices.row(slot) != vertex;
        if changed {
            self.vertices.row_mut(slot).assign(&vertex);
        }
        self.values[slot] = value;
        changed
    }

    /// Pulls every vertex but slot 0 toward slot 0:
    /// `v_i = sigma * v_0 + (1 - sigma) * v_i`. Values are left stale.
    pub fn shrink(&mut self, sigma: f64) {
        let (anchor, mut rest) = self.vertices.view_mut().split_at(Axis(0), 1);
        let anchor = anchor.row(0);
        for mut row in rest.rows_mut() {
            Zip::from(&mut row)
                .and(&anchor)
                .for_each(|x, &a| *x = sigma * a + (1.0 - sigma) * *x);
        }
    }
}

impl fmt::Display for Simplex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (row, value) in self.vertices.rows().into_iter().zip(self.values.iter()) {
            for x in row.iter() {
                write!(f, "{} ", x)?;
            }
            writeln!(f, "| {}", value)?;
        }
        Ok(())
    }
}
