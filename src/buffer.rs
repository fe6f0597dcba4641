// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Cached point grid shared between the depth and normals callbacks.
//!
//! The depth callback projects every pixel into the grid; the normals callback
//! reads it back to position its arrows without re-running the projection.
//! The grid is owned by the engine and guarded by the engine lock.
//!
//! # Memory Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      PointGrid (W x H)                    │
//! │  index = row * W + col                                    │
//! │  ┌────────┬────────┬────────┬──────────┐                  │
//! │  │ x: f32 │ y: f32 │ z: f32 │ reserved │  x W x H         │
//! │  └────────┴────────┴────────┴──────────┘                  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Storage is allocated lazily on the first frame and reallocated whenever
//! the incoming frame dimensions differ from the grid's.

use tracing::info;

/// Result of [`PointGrid::ensure_dimensions`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GridChange {
    /// Grid already had the requested dimensions.
    Unchanged,
    /// First allocation.
    Allocated,
    /// Dimensions changed from `width` x `height`; previous contents were
    /// discarded.
    Resized { width: u32, height: u32 },
}

/// Row-major grid of `[x, y, z, reserved]` entries.
#[derive(Clone, Debug, Default)]
pub struct PointGrid {
    data: Vec<[f32; 4]>,
    width: u32,
    height: u32,
}

impl PointGrid {
    /// Create an empty, unallocated grid.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a zero-filled grid with the given dimensions.
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        let mut grid = Self::new();
        grid.ensure_dimensions(width, height);
        grid
    }

    /// Make sure the grid holds exactly `width` x `height` entries.
    ///
    /// On a dimension change the grid is reallocated and zero-filled; the
    /// returned [`GridChange`] reports what happened.
    pub fn ensure_dimensions(&mut self, width: u32, height: u32) -> GridChange {
        if self.is_allocated() && self.width == width && self.height == height {
            return GridChange::Unchanged;
        }

        let change = if self.is_allocated() {
            info!(
                from_width = self.width,
                from_height = self.height,
                width,
                height,
                "point grid dimensions changed, reallocating"
            );
            GridChange::Resized {
                width: self.width,
                height: self.height,
            }
        } else {
            info!(width, height, "allocating point grid");
            GridChange::Allocated
        };

        self.data = vec![[0.0; 4]; width as usize * height as usize];
        self.width = width;
        self.height = height;
        change
    }

    /// True once the first frame has sized the grid.
    #[inline]
    pub fn is_allocated(&self) -> bool {
        !self.data.is_empty()
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True if the grid matches the given frame dimensions.
    #[inline]
    pub fn matches(&self, width: u32, height: u32) -> bool {
        self.is_allocated() && self.width == width && self.height == height
    }

    /// Entry at flat index `row * width + col`.
    #[inline]
    pub fn get(&self, index: usize) -> [f32; 4] {
        self.data[index]
    }

    #[inline]
    pub fn set(&mut self, index: usize, point: [f32; 4]) {
        self.data[index] = point;
    }

    #[inline]
    pub fn as_slice(&self) -> &[[f32; 4]] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [[f32; 4]] {
        &mut self.data
    }

    /// Copy an interleaved `[x, y, z, w]` float buffer into the grid.
    ///
    /// # Panics
    ///
    /// Panics if `src` holds fewer than `4 * len()` floats.
    pub fn copy_from_interleaved(&mut self, src: &[f32]) {
        assert!(src.len() >= 4 * self.data.len());
        for (dst, chunk) in self.data.iter_mut().zip(src.chunks_exact(4)) {
            dst.copy_from_slice(chunk);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_lazy_allocation() {
        let mut grid = PointGrid::new();
        assert!(!grid.is_allocated());
        assert!(grid.is_empty());

        assert_eq!(grid.ensure_dimensions(4, 3), GridChange::Allocated);
        assert!(grid.is_allocated());
        assert_eq!(grid.len(), 12);
        assert_eq!(grid.width(), 4);
        assert_eq!(grid.height(), 3);
        assert_eq!(grid.ensure_dimensions(4, 3), GridChange::Unchanged);
    }

    #[test]
    fn test_grid_reallocates_on_dimension_change() {
        let mut grid = PointGrid::with_dimensions(4, 3);
        grid.set(5, [1.0, 2.0, 3.0, 0.0]);

        assert_eq!(
            grid.ensure_dimensions(2, 2),
            GridChange::Resized {
                width: 4,
                height: 3
            }
        );
        assert_eq!(grid.len(), 4);
        assert!(grid.matches(2, 2));
        assert!(!grid.matches(4, 3));
        assert!(grid.as_slice().iter().all(|p| *p == [0.0; 4]));

        // Same pixel count, different shape still counts as a change.
        assert_eq!(
            grid.ensure_dimensions(4, 1),
            GridChange::Resized {
                width: 2,
                height: 2
            }
        );
    }

    #[test]
    fn test_grid_copy_from_interleaved() {
        let mut grid = PointGrid::with_dimensions(2, 1);
        grid.copy_from_interleaved(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert_eq!(grid.get(0), [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(grid.get(1), [5.0, 6.0, 7.0, 8.0]);
    }
}
