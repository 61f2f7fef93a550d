//! Parameter change lists and value queues.
//!
//! Both are pass-through views over lists owned by the host (or by a test
//! double). The view never copies, sorts or buffers points: reads and appends
//! go straight to the backing list through a [`ParameterChangesBackend`].

use std::ffi::c_void;
use std::ptr::NonNull;

use crate::types::{ParamId, ParamValue};

/// Access to a foreign parameter change list and its queues.
///
/// `list` and `queue` are the opaque handles the backend hands out.
///
/// # Safety
///
/// Implementations must only be called with handles obtained from the same
/// backend, and must not retain them.
pub unsafe trait ParameterChangesBackend {
    /// Number of queues in the list.
    unsafe fn queue_count(&self, list: NonNull<c_void>) -> usize;

    /// Queue at `index`.
    unsafe fn queue(&self, list: NonNull<c_void>, index: usize) -> Option<NonNull<c_void>>;

    /// Queue for `id`, created if the list has none yet.
    unsafe fn add_queue(&self, list: NonNull<c_void>, id: ParamId) -> Option<NonNull<c_void>>;

    unsafe fn parameter_id(&self, queue: NonNull<c_void>) -> ParamId;

    unsafe fn point_count(&self, queue: NonNull<c_void>) -> usize;

    /// Point at `index` as (sample offset, value).
    unsafe fn point(&self, queue: NonNull<c_void>, index: usize) -> Option<(i32, ParamValue)>;

    /// Append a point; returns its index.
    unsafe fn add_point(
        &self,
        queue: NonNull<c_void>,
        sample_offset: i32,
        value: ParamValue,
    ) -> Option<usize>;
}

// =============================================================================
// ParameterChanges
// =============================================================================

/// The parameter changes of one block.
#[derive(Clone, Copy)]
pub struct ParameterChanges<'a> {
    backend: &'a dyn ParameterChangesBackend,
    list: NonNull<c_void>,
}

impl<'a> ParameterChanges<'a> {
    /// Wrap a foreign list.
    ///
    /// # Safety
    ///
    /// `list` must be a live handle understood by `backend` for all of `'a`.
    pub unsafe fn from_raw(backend: &'a dyn ParameterChangesBackend, list: NonNull<c_void>) -> Self {
        Self { backend, list }
    }

    #[inline]
    pub fn len(&self) -> usize {
        // Safety: from_raw contract
        unsafe { self.backend.queue_count(self.list) }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn queue(&self, index: usize) -> Option<ParameterValueQueue<'a>> {
        // Safety: from_raw contract
        unsafe { self.backend.queue(self.list, index) }.map(|queue| ParameterValueQueue {
            backend: self.backend,
            queue,
        })
    }

    /// Queue for `id`, appending one when the list does not have it yet.
    pub fn add_queue(&self, id: ParamId) -> Option<ParameterValueQueue<'a>> {
        // Safety: from_raw contract
        unsafe { self.backend.add_queue(self.list, id) }.map(|queue| ParameterValueQueue {
            backend: self.backend,
            queue,
        })
    }

    /// Iterate queues in list order.
    pub fn iter(&self) -> impl Iterator<Item = ParameterValueQueue<'a>> + '_ {
        (0..self.len()).filter_map(move |i| self.queue(i))
    }
}

// =============================================================================
// ParameterValueQueue
// =============================================================================

/// The automation points of one parameter within one block.
#[derive(Clone, Copy)]
pub struct ParameterValueQueue<'a> {
    backend: &'a dyn ParameterChangesBackend,
    queue: NonNull<c_void>,
}

impl<'a> ParameterValueQueue<'a> {
    #[inline]
    pub fn parameter_id(&self) -> ParamId {
        // Safety: the queue handle came from the same backend
        unsafe { self.backend.parameter_id(self.queue) }
    }

    #[inline]
    pub fn len(&self) -> usize {
        // Safety: see parameter_id
        unsafe { self.backend.point_count(self.queue) }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Point at `index` as (sample offset, value), value clamped to `[0, 1]`.
    #[inline]
    pub fn point(&self, index: usize) -> Option<(i32, ParamValue)> {
        // Safety: see parameter_id
        unsafe { self.backend.point(self.queue, index) }.map(|(offset, value)| {
            let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
            (offset, value)
        })
    }

    /// The value in effect at the end of the block.
    #[inline]
    pub fn last_point(&self) -> Option<(i32, ParamValue)> {
        self.len().checked_sub(1).and_then(|i| self.point(i))
    }

    /// Append a point, value clamped to `[0, 1]`. Returns its index.
    pub fn add_point(&self, sample_offset: i32, value: ParamValue) -> Option<usize> {
        let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        // Safety: see parameter_id
        unsafe { self.backend.add_point(self.queue, sample_offset, value) }
    }

    /// Iterate points in the order the backing list holds them.
    pub fn iter(&self) -> impl Iterator<Item = (i32, ParamValue)> + '_ {
        (0..self.len()).filter_map(move |i| self.point(i))
    }
}


#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::test_support::{TestBackend, TestChanges};
    use super::*;

    #[test]
    fn test_reads_queues_in_list_order() {
        let list = TestChanges::with_points(&[(7, &[(0, 0.1), (32, 0.2)]), (3, &[(5, 0.9)])]);
        let changes = unsafe { ParameterChanges::from_raw(&TestBackend, list.handle()) };

        let ids: Vec<_> = changes.iter().map(|q| q.parameter_id()).collect();
        assert_eq!(ids, vec![7, 3]);

        let queue = changes.queue(0).unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.point(1), Some((32, 0.2)));
        assert_eq!(queue.point(2), None);
        assert_eq!(queue.last_point(), Some((32, 0.2)));
        assert!(changes.queue(2).is_none());
    }

    #[test]
    fn test_does_not_resort_points() {
        let list = TestChanges::with_points(&[(1, &[(40, 0.4), (10, 0.1)])]);
        let changes = unsafe { ParameterChanges::from_raw(&TestBackend, list.handle()) };
        let points: Vec<_> = changes.queue(0).unwrap().iter().collect();
        assert_eq!(points, vec![(40, 0.4), (10, 0.1)]);
    }

    #[test]
    fn test_values_are_clamped() {
        let list = TestChanges::with_points(&[(1, &[(0, 1.7), (1, -3.0)])]);
        let changes = unsafe { ParameterChanges::from_raw(&TestBackend, list.handle()) };
        let queue = changes.queue(0).unwrap();
        assert_eq!(queue.point(0), Some((0, 1.0)));
        assert_eq!(queue.point(1), Some((1, 0.0)));

        queue.add_point(2, 2.5);
        assert_eq!(list.points(1)[2], (2, 1.0));
    }

    #[test]
    fn test_add_queue_reuses_existing() {
        let list = TestChanges::default();
        let changes = unsafe { ParameterChanges::from_raw(&TestBackend, list.handle()) };
        assert!(changes.is_empty());

        changes.add_queue(9).unwrap().add_point(0, 0.5);
        changes.add_queue(9).unwrap().add_point(8, 0.6);
        assert_eq!(changes.len(), 1);
        assert_eq!(list.points(9), vec![(0, 0.5), (8, 0.6)]);
    }

    proptest! {
        #[test]
        fn queue_round_trip(
            steps in prop::collection::vec((1i32..64, 0.0f64..=1.0), 0..2048)
        ) {
            let list = TestChanges::default();
            let changes = unsafe { ParameterChanges::from_raw(&TestBackend, list.handle()) };
            let queue = changes.add_queue(42).unwrap();

            let mut offset = 0;
            let mut expected = Vec::with_capacity(steps.len());
            for (step, value) in steps {
                offset += step;
                let index = queue.add_point(offset, value).unwrap();
                prop_assert_eq!(index, expected.len());
                expected.push((offset, value));
            }

            prop_assert_eq!(queue.len(), expected.len());
            for (i, point) in expected.iter().enumerate() {
                prop_assert_eq!(queue.point(i), Some(*point));
            }
        }
    }
}
