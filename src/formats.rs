// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Point cloud formatting for ROS PointCloud2 messages.
//!
//! # Format
//!
//! ## 32-byte format (xyz + rgb)
//! ```text
//! ┌───────┬───────┬───────┬─────────┬───────────┬─────────┐
//! │ x:f32 │ y:f32 │ z:f32 │ padding │ rgb:4B    │ padding │
//! │ 4B    │ 4B    │ 4B    │ 4B      │ 4B        │ 12B     │
//! └───────┴───────┴───────┴─────────┴───────────┴─────────┘
//! ```
//!
//! This is the layout produced by the ROS point cloud modifier for the "xyz"
//! and "rgb" field sets: xyz padded to 16 bytes, rgb padded to 16 bytes.
//! The rgb field is declared FLOAT32; its four bytes are written verbatim
//! from the point's rgb slot. All values are little-endian.

use crate::camera::Points;
use edgefirst_schemas::{
    sensor_msgs::{PointCloud2, PointField},
    std_msgs::Header,
};

/// Bytes per point in the xyz + rgb layout.
pub const POINT_STEP: u32 = 32;

/// Byte offset of the rgb field.
pub const RGB_OFFSET: usize = 16;

/// Point field data types for PointCloud2 messages.
///
/// These values correspond to the ROS sensor_msgs/PointField datatype field.
/// All variants are defined for completeness, even if not all are currently
/// used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[allow(dead_code)]
pub enum PointFieldType {
    INT8 = 1,
    UINT8 = 2,
    INT16 = 3,
    UINT16 = 4,
    INT32 = 5,
    UINT32 = 6,
    FLOAT32 = 7,
    FLOAT64 = 8,
}

/// Build the XYZ + RGB point fields (32-byte stride).
///
/// Returns a vector of PointField definitions for:
/// - x: FLOAT32 at offset 0
/// - y: FLOAT32 at offset 4
/// - z: FLOAT32 at offset 8
/// - rgb: FLOAT32 at offset 16
pub fn xyz_rgb_fields() -> Vec<PointField> {
    [("x", 0), ("y", 4), ("z", 8), ("rgb", RGB_OFFSET as u32)]
        .into_iter()
        .map(|(name, offset)| PointField {
            name: String::from(name),
            offset,
            datatype: PointFieldType::FLOAT32 as u8,
            count: 1,
        })
        .collect()
}

/// Format point cloud data into the 32-byte packed format.
///
/// # Arguments
///
/// * `x`, `y`, `z` - Coordinate arrays (must be at least `n_points` long)
/// * `rgb` - Color bytes per point (must be at least `n_points` long)
/// * `n_points` - Number of points to format
///
/// # Returns
///
/// A vector of bytes in packed 32-byte-per-point format.
#[inline(never)]
pub fn format_points_xyzrgb(
    x: &[f32],
    y: &[f32],
    z: &[f32],
    rgb: &[[u8; 4]],
    n_points: usize,
) -> Vec<u8> {
    let mut data = vec![0u8; POINT_STEP as usize * n_points];
    format_points_xyzrgb_into(x, y, z, rgb, n_points, &mut data);
    data
}

/// Format point cloud data into a pre-allocated buffer (32-byte format).
///
/// Padding bytes are left untouched; pass a zeroed buffer for deterministic
/// output.
///
/// # Panics
///
/// Panics if `out` is too small.
#[inline(never)]
pub fn format_points_xyzrgb_into(
    x: &[f32],
    y: &[f32],
    z: &[f32],
    rgb: &[[u8; 4]],
    n_points: usize,
    out: &mut [u8],
) {
    let step = POINT_STEP as usize;
    assert!(out.len() >= step * n_points);

    for (index, point) in out.chunks_exact_mut(step).take(n_points).enumerate() {
        point[0..4].copy_from_slice(&x[index].to_le_bytes());
        point[4..8].copy_from_slice(&y[index].to_le_bytes());
        point[8..12].copy_from_slice(&z[index].to_le_bytes());
        point[RGB_OFFSET..RGB_OFFSET + 4].copy_from_slice(&rgb[index]);
    }
}

/// Build an organized `width` x `height` PointCloud2 from projected points.
pub fn point_cloud_message(
    header: Header,
    width: u32,
    height: u32,
    points: &Points,
    is_dense: bool,
) -> PointCloud2 {
    let n_points = width as usize * height as usize;
    let data = format_points_xyzrgb(&points.x, &points.y, &points.z, &points.rgb, n_points);

    PointCloud2 {
        header,
        height,
        width,
        fields: xyz_rgb_fields(),
        is_bigendian: false,
        point_step: POINT_STEP,
        row_step: POINT_STEP * width,
        data,
        is_dense,
    }
}

/// Read back the xyz of point `index` from a packed 32-byte buffer.
pub fn read_xyz(data: &[u8], index: usize) -> [f32; 3] {
    let base = index * POINT_STEP as usize;
    let read = |offset: usize| {
        f32::from_le_bytes([
            data[base + offset],
            data[base + offset + 1],
            data[base + offset + 2],
            data[base + offset + 3],
        ])
    };
    [read(0), read(4), read(8)]
}

/// Read back the rgb bytes of point `index` from a packed 32-byte buffer.
pub fn read_rgb(data: &[u8], index: usize) -> [u8; 4] {
    let base = index * POINT_STEP as usize + RGB_OFFSET;
    [data[base], data[base + 1], data[base + 2], data[base + 3]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgefirst_schemas::builtin_interfaces::Time;

    #[test]
    fn test_format_points_xyzrgb() {
        let x = vec![1.0f32, 2.0, 3.0, 4.0, 5.0];
        let y = vec![10.0f32, 20.0, 30.0, 40.0, 50.0];
        let z = vec![100.0f32, 200.0, 300.0, 400.0, 500.0];
        let rgb = vec![[1u8, 2, 3, 0], [4, 5, 6, 0], [7, 8, 9, 0], [0; 4], [255; 4]];

        let data = format_points_xyzrgb(&x, &y, &z, &rgb, 5);
        assert_eq!(data.len(), 32 * 5);

        assert_eq!(read_xyz(&data, 0), [1.0, 10.0, 100.0]);
        assert_eq!(read_rgb(&data, 0), [1, 2, 3, 0]);
        assert_eq!(read_xyz(&data, 4), [5.0, 50.0, 500.0]);
        assert_eq!(read_rgb(&data, 4), [255; 4]);

        // Padding stays zero.
        assert!(data[12..16].iter().all(|b| *b == 0));
        assert!(data[20..32].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_point_field_builder() {
        let fields = xyz_rgb_fields();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0].name, "x");
        assert_eq!(fields[0].offset, 0);
        assert_eq!(fields[2].name, "z");
        assert_eq!(fields[2].offset, 8);
        assert_eq!(fields[3].name, "rgb");
        assert_eq!(fields[3].offset, 16);
        assert!(fields
            .iter()
            .all(|f| f.datatype == PointFieldType::FLOAT32 as u8 && f.count == 1));
    }

    #[test]
    fn test_point_cloud_message_layout() {
        let mut points = Points::new(6);
        points.x[5] = 0.25;
        points.z[5] = 2.0;
        points.rgb[5] = [9, 8, 7, 0];

        let header = Header {
            stamp: Time { sec: 3, nanosec: 4 },
            frame_id: String::from("camera"),
        };
        let msg = point_cloud_message(header, 3, 2, &points, true);
        assert_eq!(msg.width, 3);
        assert_eq!(msg.height, 2);
        assert_eq!(msg.point_step, 32);
        assert_eq!(msg.row_step, 96);
        assert_eq!(msg.data.len(), 6 * 32);
        assert!(!msg.is_bigendian);
        assert!(msg.is_dense);
        assert_eq!(read_xyz(&msg.data, 5), [0.25, 0.0, 2.0]);
        assert_eq!(read_rgb(&msg.data, 5), [9, 8, 7, 0]);
    }
}
