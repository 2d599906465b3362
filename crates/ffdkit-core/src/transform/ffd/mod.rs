//! Cubic B-spline free-form transformation on a 4D lattice.
//!
//! The displacement at continuous lattice coordinates `q = (x, y, z, t)` is
//!
//! ```text
//! u(q) = sum_{i,j,k,l} B(x - i) B(y - j) B(z - k) B(t - l) c_{ijkl}
//! ```
//!
//! where `B` is the cubic B-spline kernel and `c` the control-point
//! coefficients. Only the 4 x 4 x 4 x 4 nodes around `floor(q)` contribute.
//! Axes with a single node carry no kernel; the field is constant along them.
//!
//! The implementation is split by concern:
//! * `evaluate` - displacement and derivatives, DOF derivatives
//! * `approximate` - fitting coefficients to displacement samples
//! * `bending` - bending energy and its gradient
//! * `subdivide` - exact lattice refinement
//! * `tensor` - burn tensor seam

mod approximate;
mod bending;
mod evaluate;
mod subdivide;
mod tensor;

pub use approximate::DisplacementSample;
pub use bending::BendingEnergyMode;
pub use tensor::FfdTimeSlice;

use std::sync::Arc;

use tracing::debug;

use crate::error::{FfdError, Result};
use crate::image::{Grid4, ImageAttributes};
use crate::interpolation::Extrapolation;
use crate::spatial::Vector3;
use super::dof::{dof_index, DofStatus};
use super::lattice::Lattice;
use super::observer::{ChangeEvent, ObserverId, Observers};

/// Cubic B-spline free-form transformation over space and time.
#[derive(Debug, Clone)]
pub struct BSplineFreeFormTransform4D {
    lattice: Lattice,
    coefficients: Grid4<Vector3>,
    status: Vec<DofStatus>,
    extrapolation: Option<Extrapolation<Vector3>>,
    default_displacement: Vector3,
    observers: Observers,
}

impl BSplineFreeFormTransform4D {
    /// Identity transformation on a lattice.
    pub fn new(lattice: Lattice) -> Self {
        let coefficients = Grid4::new(lattice.dims());
        let status = vec![DofStatus::Active; lattice.number_of_dofs()];
        debug!(
            dims = ?lattice.dims(),
            spacing = ?lattice.spacing(),
            "Created B-spline free-form transformation"
        );
        Self {
            lattice,
            coefficients,
            status,
            extrapolation: None,
            default_displacement: Vector3::zeros(),
            observers: Observers::default(),
        }
    }

    /// Identity transformation on a lattice covering an image domain.
    ///
    /// See [`Lattice::covering`] for how the lattice is placed.
    pub fn from_attributes(attributes: &ImageAttributes, spacing: [f64; 4]) -> Result<Self> {
        Ok(Self::new(Lattice::covering(attributes, spacing)?))
    }

    /// Resolve lattice nodes outside the lattice by `extrapolation`.
    pub fn with_extrapolation(mut self, extrapolation: Extrapolation<Vector3>) -> Self {
        self.extrapolation = Some(extrapolation);
        self
    }

    /// Displacement returned where no control point contributes.
    pub fn with_default_displacement(mut self, displacement: Vector3) -> Self {
        self.default_displacement = displacement;
        self
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    pub fn extrapolation(&self) -> Option<&Extrapolation<Vector3>> {
        self.extrapolation.as_ref()
    }

    pub fn default_displacement(&self) -> Vector3 {
        self.default_displacement
    }

    /// Control-point coefficients.
    pub fn coefficients(&self) -> &Grid4<Vector3> {
        &self.coefficients
    }

    /// Replace all coefficients.
    ///
    /// # Errors
    /// If the grid extents differ from the lattice.
    pub fn set_coefficients(&mut self, coefficients: Grid4<Vector3>) -> Result<()> {
        if coefficients.dims() != self.lattice.dims() {
            return Err(FfdError::invalid_dimensions(format!(
                "coefficient grid {:?} does not match lattice {:?}",
                coefficients.dims(),
                self.lattice.dims()
            )));
        }
        self.coefficients = coefficients;
        self.notify(ChangeEvent::Parameters);
        Ok(())
    }

    pub fn number_of_control_points(&self) -> usize {
        self.lattice.number_of_control_points()
    }

    pub fn number_of_dofs(&self) -> usize {
        self.lattice.number_of_dofs()
    }

    /// Coefficient of a control point given by lattice index.
    ///
    /// # Panics
    /// If the index is out of range.
    pub fn control_point(&self, index: [usize; 4]) -> Vector3 {
        self.coefficients.get(self.checked_index(index))
    }

    /// Set the coefficient of a control point given by lattice index.
    ///
    /// # Panics
    /// If the index is out of range.
    pub fn set_control_point(&mut self, index: [usize; 4], value: Vector3) {
        let index = self.checked_index(index);
        self.coefficients.set(index, value);
        self.notify(ChangeEvent::Parameters);
    }

    fn checked_index(&self, index: [usize; 4]) -> [usize; 4] {
        self.lattice.control_point_offset(index);
        index
    }

    /// Flat parameter vector, three values per control point, x fastest.
    pub fn parameters(&self) -> Vec<f64> {
        self.coefficients
            .as_slice()
            .iter()
            .flat_map(|c| [c[0], c[1], c[2]])
            .collect()
    }

    /// Replace all coefficients from a flat parameter vector.
    ///
    /// # Errors
    /// If the length is not the number of DOFs.
    pub fn set_parameters(&mut self, params: &[f64]) -> Result<()> {
        FfdError::check_length(self.number_of_dofs(), params.len())?;
        for (c, chunk) in self.coefficients.as_mut_slice().iter_mut().zip(params.chunks_exact(3)) {
            *c = Vector3::new(chunk[0], chunk[1], chunk[2]);
        }
        self.notify(ChangeEvent::Parameters);
        Ok(())
    }

    /// Value of one DOF.
    ///
    /// # Panics
    /// If `dof` is out of range.
    pub fn get(&self, dof: usize) -> f64 {
        self.check_dof(dof);
        self.coefficients.as_slice()[dof / 3][dof % 3]
    }

    /// Set one DOF.
    ///
    /// # Panics
    /// If `dof` is out of range.
    pub fn put(&mut self, dof: usize, value: f64) {
        self.check_dof(dof);
        self.coefficients.as_mut_slice()[dof / 3][dof % 3] = value;
        self.notify(ChangeEvent::Parameters);
    }

    fn check_dof(&self, dof: usize) {
        assert!(
            dof < self.number_of_dofs(),
            "DOF {} out of range, transformation has {} DOFs",
            dof,
            self.number_of_dofs()
        );
    }

    /// Status of one DOF.
    ///
    /// # Panics
    /// If `dof` is out of range.
    pub fn status(&self, dof: usize) -> DofStatus {
        self.check_dof(dof);
        self.status[dof]
    }

    /// # Panics
    /// If `dof` is out of range.
    pub fn set_status(&mut self, dof: usize, status: DofStatus) {
        self.check_dof(dof);
        self.status[dof] = status;
        self.notify(ChangeEvent::Status);
    }

    /// Set the status of all three DOFs of a control point.
    pub fn set_control_point_status(&mut self, cp: usize, status: DofStatus) {
        for c in 0..3 {
            let dof = dof_index(cp, c);
            self.check_dof(dof);
            self.status[dof] = status;
        }
        self.notify(ChangeEvent::Status);
    }

    /// Set the status of every DOF.
    pub fn set_all_status(&mut self, status: DofStatus) {
        self.status.fill(status);
        self.notify(ChangeEvent::Status);
    }

    pub fn is_active(&self, dof: usize) -> bool {
        self.status[dof] == DofStatus::Active
    }

    /// Whether every DOF of a control point is passive.
    pub fn is_passive_control_point(&self, cp: usize) -> bool {
        (0..3).all(|c| self.status[dof_index(cp, c)] == DofStatus::Passive)
    }

    /// Register a callback fired after every mutation.
    pub fn on_change<F>(&mut self, callback: F) -> ObserverId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.observers.add(Arc::new(callback))
    }

    /// Remove a callback. Returns whether it was registered.
    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }

    fn notify(&self, event: ChangeEvent) {
        self.observers.notify(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ffd() -> BSplineFreeFormTransform4D {
        BSplineFreeFormTransform4D::new(Lattice::with_dims([3, 4, 2, 1]).unwrap())
    }

    #[test]
    fn test_parameter_vector_layout() {
        let mut ffd = ffd();
        assert_eq!(ffd.number_of_dofs(), 72);
        ffd.set_control_point([1, 0, 0, 0], Vector3::new(1.0, 2.0, 3.0));
        let params = ffd.parameters();
        assert_eq!(&params[3..6], &[1.0, 2.0, 3.0]);
        assert_eq!(ffd.get(4), 2.0);
        ffd.put(5, -1.0);
        assert_eq!(ffd.control_point([1, 0, 0, 0]), Vector3::new(1.0, 2.0, -1.0));
    }

    #[test]
    fn test_set_parameters_length() {
        let mut ffd = ffd();
        let err = ffd.set_parameters(&[0.0; 5]).unwrap_err();
        assert_eq!(err, FfdError::LengthMismatch { expected: 72, actual: 5 });
        let params: Vec<f64> = (0..72).map(|v| v as f64).collect();
        ffd.set_parameters(&params).unwrap();
        assert_eq!(ffd.parameters(), params);
    }

    #[test]
    fn test_status_defaults_active() {
        let mut ffd = ffd();
        assert!((0..ffd.number_of_dofs()).all(|dof| ffd.status(dof) == DofStatus::Active));
        ffd.set_control_point_status(2, DofStatus::Passive);
        assert!(ffd.is_passive_control_point(2));
        assert_eq!(ffd.status(5), DofStatus::Active);
        assert_eq!(ffd.status(6), DofStatus::Passive);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_put_out_of_range() {
        let mut ffd = ffd();
        ffd.put(72, 1.0);
    }

    #[test]
    fn test_observers_fire_on_mutation() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut ffd = ffd();
        let counter = Arc::clone(&count);
        let id = ffd.on_change(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        ffd.put(0, 1.0);
        ffd.set_status(0, DofStatus::Passive);
        ffd.set_parameters(&[0.0; 72]).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(ffd.remove_observer(id));
        ffd.put(0, 2.0);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
