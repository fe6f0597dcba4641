// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Pinhole projection of depth samples into 3-D points.
//!
//! Points are expressed in the camera optical frame: x right, y down, z
//! forward along the optical axis. A single focal length derived from the
//! horizontal field of view is used for both image axes.
//!
//! For the pixel at row `j`, column `i` with sample `d`:
//!
//! ```text
//! fl = W / (2 tan(hfov / 2))
//! h  = atan2(i - (W - 1) / 2, fl)      (0 when W == 1)
//! v  = atan2(j - (H - 1) / 2, fl)      (0 when H == 1)
//! x  = d tan(h)
//! y  = d tan(v)
//! z  = d                                (cutoff < d < inf)
//! ```
//!
//! Samples at or below the cutoff are out of sensing range, as are NaN and
//! the `+inf` reported beyond the far clip plane. The emitted
//! point becomes NaN in all three coordinates while the cached grid keeps the
//! tangent-scaled x and y with z forced to zero.

use crate::{buffer::PointGrid, camera::focal_length, camera::DepthFrame, camera::Points};
use tracing::instrument;

/// Converts depth frames into point grids.
#[derive(Clone, Copy, Debug)]
pub struct FrameProjector {
    hfov: f64,
    cutoff: f64,
}

impl FrameProjector {
    /// `hfov` in radians, `cutoff` in meters.
    pub fn new(hfov: f64, cutoff: f64) -> Self {
        Self { hfov, cutoff }
    }

    pub fn hfov(&self) -> f64 {
        self.hfov
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// Project `frame` into `points` (message order, row-major) and `grid`.
    ///
    /// The caller sizes `grid` to the frame dimensions beforehand; `points` is
    /// resized here. Returns the dense flag: false if any sample fell at or
    /// below the cutoff or was not finite.
    ///
    /// # Panics
    ///
    /// Panics if the frame holds fewer than `width * height` samples or the
    /// grid does not match the frame dimensions.
    #[instrument(skip_all, fields(width = frame.width, height = frame.height))]
    pub fn project(&self, frame: &DepthFrame, grid: &mut PointGrid, points: &mut Points) -> bool {
        let cols = frame.width as usize;
        let rows = frame.height as usize;
        assert!(frame.data.len() >= cols * rows);
        assert!(grid.matches(frame.width, frame.height));

        points.resize(cols * rows);
        let fl = focal_length(frame.width, self.hfov);
        let mut dense = true;

        for j in 0..rows {
            let p_angle = if rows > 1 {
                (j as f64 - 0.5 * (rows - 1) as f64).atan2(fl)
            } else {
                0.0
            };
            let p_tan = p_angle.tan();

            for i in 0..cols {
                let y_angle = if cols > 1 {
                    (i as f64 - 0.5 * (cols - 1) as f64).atan2(fl)
                } else {
                    0.0
                };

                let index = j * cols + i;
                let depth = frame.data[index] as f64;
                let x = (depth * y_angle.tan()) as f32;
                let y = (depth * p_tan) as f32;

                if depth > self.cutoff && depth.is_finite() {
                    let z = depth as f32;
                    points.x[index] = x;
                    points.y[index] = y;
                    points.z[index] = z;
                    grid.set(index, [x, y, z, 0.0]);
                } else {
                    points.x[index] = f32::NAN;
                    points.y[index] = f32::NAN;
                    points.z[index] = f32::NAN;
                    grid.set(index, [x, y, 0.0, 0.0]);
                    dense = false;
                }
            }
        }

        dense
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn project(data: &[f32], width: u32, height: u32, cutoff: f64) -> (Points, PointGrid, bool) {
        let projector = FrameProjector::new(FRAC_PI_2, cutoff);
        let frame = DepthFrame::new(data, width, height);
        let mut grid = PointGrid::with_dimensions(width, height);
        let mut points = Points::default();
        let dense = projector.project(&frame, &mut grid, &mut points);
        (points, grid, dense)
    }

    #[test]
    fn test_project_2x2_cutoff() {
        let (points, grid, dense) = project(&[0.5, 0.3, 0.5, 0.5], 2, 2, 0.4);
        assert!(!dense);
        assert_eq!(points.len(), 4);

        assert!(points.x[1].is_nan());
        assert!(points.y[1].is_nan());
        assert!(points.z[1].is_nan());

        for index in [0, 2, 3] {
            assert_eq!(points.z[index], 0.5);
            assert!(points.x[index].is_finite());
            assert!(points.y[index].is_finite());
        }

        // Cached grid keeps x/y and zeroes z for the invalid sample.
        let cached = grid.get(1);
        assert!(cached[0].is_finite());
        assert!(cached[1].is_finite());
        assert_eq!(cached[2], 0.0);
        assert_eq!(cached[3], 0.0);
    }

    #[test]
    fn test_project_geometry() {
        // 90 degree hfov on a 2-pixel wide image gives fl = 1 and pixel
        // offsets of +/-0.5, so x = +/-d/2.
        let (points, _, dense) = project(&[2.0, 2.0, 2.0, 2.0], 2, 2, 0.4);
        assert!(dense);
        assert_relative_eq!(points.x[0], -1.0, epsilon = 1e-6);
        assert_relative_eq!(points.x[1], 1.0, epsilon = 1e-6);
        assert_relative_eq!(points.y[0], -1.0, epsilon = 1e-6);
        assert_relative_eq!(points.y[2], 1.0, epsilon = 1e-6);
        assert_relative_eq!(points.x[2], points.x[0]);
    }

    #[test]
    fn test_project_single_row_and_column() {
        let (points, _, dense) = project(&[1.0, 1.0, 1.0], 3, 1, 0.4);
        assert!(dense);
        assert!(points.y.iter().all(|y| *y == 0.0));
        assert!(points.x[0] < 0.0 && points.x[2] > 0.0);
        assert_eq!(points.x[1], 0.0);

        let (points, _, _) = project(&[1.0, 1.0, 1.0], 1, 3, 0.4);
        assert!(points.x.iter().all(|x| *x == 0.0));
        assert!(points.y[0] < 0.0 && points.y[2] > 0.0);
    }

    #[test]
    fn test_project_valid_depth_exact() {
        let data: Vec<f32> = (0..64).map(|i| 0.41 + i as f32 * 0.173).collect();
        let (points, grid, dense) = project(&data, 8, 8, 0.4);
        assert!(dense);
        for (index, d) in data.iter().enumerate() {
            assert_eq!(points.z[index], *d);
            assert_eq!(grid.get(index)[2], *d);
        }
    }

    #[test]
    fn test_project_cutoff_is_exclusive() {
        let (points, grid, dense) = project(&[0.5, 0.0, -1.0, f32::NAN], 2, 2, 0.5);
        assert!(!dense);
        for index in 0..4 {
            assert!(points.z[index].is_nan());
            assert_eq!(grid.get(index)[2], 0.0);
        }
    }

    #[test]
    fn test_project_infinite_depth_is_invalid() {
        let (points, grid, dense) = project(&[1.0, f32::INFINITY, 1.0], 3, 1, 0.4);
        assert!(!dense);
        assert!(points.x[1].is_nan());
        assert!(points.y[1].is_nan());
        assert!(points.z[1].is_nan());
        assert_eq!(grid.get(1)[2], 0.0);
        for index in [0, 2] {
            assert_eq!(points.z[index], 1.0);
            assert!(points.x[index].is_finite());
        }
        assert_eq!(dense, points.is_dense());
    }
}
