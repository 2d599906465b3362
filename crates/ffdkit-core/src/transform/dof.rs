//! Degrees of freedom of a control-point transformation.
//!
//! Each control point carries three DOFs, one per displacement component.
//! DOF `3 n + c` is component `c` of control point `n`, with control
//! points enumerated x fastest, then y, z and t.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::spatial::Vector3;

/// Whether a DOF takes part in optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DofStatus {
    #[default]
    Active,
    Passive,
}

/// DOF index of component `component` of control point `cp`.
#[inline]
pub fn dof_index(cp: usize, component: usize) -> usize {
    3 * cp + component
}

/// Sparse derivative of a displacement with respect to the DOFs.
///
/// Entry `dof` holds `(dux, duy, duz) / d(dof)`. Absent entries are zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformationJacobian {
    entries: BTreeMap<usize, Vector3>,
}

impl TransformationJacobian {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value` to the entry of `dof`.
    pub fn add(&mut self, dof: usize, value: Vector3) {
        *self.entries.entry(dof).or_insert_with(Vector3::zeros) += value;
    }

    /// Derivative with respect to `dof`, zero if not stored.
    pub fn get(&self, dof: usize) -> Vector3 {
        self.entries.get(&dof).copied().unwrap_or_else(Vector3::zeros)
    }

    pub fn contains(&self, dof: usize) -> bool {
        self.entries.contains_key(&dof)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stored entries in increasing DOF order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Vector3)> {
        self.entries.iter().map(|(&dof, v)| (dof, v))
    }

    /// Displacement contributed by the stored DOFs for a parameter vector.
    ///
    /// # Panics
    /// If a stored DOF index is out of range for `params`.
    pub fn apply(&self, params: &[f64]) -> Vector3 {
        self.entries
            .iter()
            .fold(Vector3::zeros(), |acc, (&dof, v)| acc + v * params[dof])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jacobian_accumulates() {
        let mut jac = TransformationJacobian::new();
        jac.add(dof_index(2, 1), Vector3::new(0.0, 0.5, 0.0));
        jac.add(dof_index(2, 1), Vector3::new(0.0, 0.25, 0.0));
        assert_eq!(jac.len(), 1);
        assert_eq!(jac.get(7), Vector3::new(0.0, 0.75, 0.0));
        assert_eq!(jac.get(8), Vector3::zeros());
        assert!(!jac.contains(8));
    }

    #[test]
    fn test_jacobian_apply() {
        let mut jac = TransformationJacobian::new();
        jac.add(0, Vector3::new(0.5, 0.0, 0.0));
        jac.add(4, Vector3::new(0.0, 0.25, 0.0));
        let params = [2.0, 0.0, 0.0, 0.0, 4.0, 0.0];
        assert_eq!(jac.apply(&params), Vector3::new(1.0, 1.0, 0.0));
    }
}
