// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Surface normal visualization as arrow markers.
//!
//! Every `stride`-th pixel of a normals frame becomes one red arrow placed at
//! the cached point for that pixel and oriented along the normal. Marker ids
//! are the flat pixel index, so a viewer replaces the arrows of the previous
//! frame instead of accumulating them; the one second lifetime clears arrows
//! that stop being republished.

use crate::{buffer::PointGrid, camera::NormalsFrame};
use edgefirst_schemas::{
    builtin_interfaces::Time,
    geometry_msgs::{Point, Pose, Quaternion, Vector3},
    sensor_msgs::CompressedImage,
    std_msgs::Header,
};
use nalgebra::{Unit, UnitQuaternion, Vector3 as NVector3};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Marker message types (`visualization_msgs`), Humble and later layout.
pub mod visualization_msgs {
    use super::*;

    pub const ARROW: i32 = 0;
    pub const ADD: i32 = 0;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
    pub struct ColorRGBA {
        pub r: f32,
        pub g: f32,
        pub b: f32,
        pub a: f32,
    }

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Duration {
        pub sec: i32,
        pub nanosec: u32,
    }

    #[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
    pub struct UVCoordinate {
        pub u: f32,
        pub v: f32,
    }

    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    pub struct MeshFile {
        pub filename: String,
        pub data: Vec<u8>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct Marker {
        pub header: Header,
        pub ns: String,
        pub id: i32,
        pub type_: i32,
        pub action: i32,
        pub pose: Pose,
        pub scale: Vector3,
        pub color: ColorRGBA,
        pub lifetime: Duration,
        pub frame_locked: bool,
        pub points: Vec<Point>,
        pub colors: Vec<ColorRGBA>,
        pub texture_resource: String,
        pub texture: CompressedImage,
        pub uv_coordinates: Vec<UVCoordinate>,
        pub text: String,
        pub mesh_resource: String,
        pub mesh_file: MeshFile,
        pub mesh_use_embedded_materials: bool,
    }

    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    pub struct MarkerArray {
        pub markers: Vec<Marker>,
    }
}

use visualization_msgs::{ColorRGBA, Duration, Marker, MarkerArray, MeshFile, ADD, ARROW};

const ARROW_COLOR: ColorRGBA = ColorRGBA {
    r: 1.0,
    g: 0.0,
    b: 0.0,
    a: 1.0,
};

const ARROW_LIFETIME: Duration = Duration { sec: 1, nanosec: 0 };

/// Orientation that rotates the x axis onto `normal`.
///
/// A zero (or non-finite) normal yields the identity. When the normal is
/// parallel or antiparallel to x the rotation axis is undefined and z is used
/// instead.
pub fn normal_orientation(normal: [f32; 3]) -> UnitQuaternion<f64> {
    let n = NVector3::new(normal[0] as f64, normal[1] as f64, normal[2] as f64);
    let norm = n.norm();
    if norm == 0.0 || !norm.is_finite() {
        return UnitQuaternion::identity();
    }
    let n = n / norm;
    let reference = NVector3::x();

    let angle = -n.dot(&reference).clamp(-1.0, 1.0).acos();
    let axis = Unit::try_new(n.cross(&reference), 1e-12).unwrap_or_else(NVector3::z_axis);
    UnitQuaternion::from_axis_angle(&axis, angle)
}

/// Builds decimated normal arrow markers.
#[derive(Clone, Copy, Debug)]
pub struct NormalsVisualizer {
    stride: u32,
}

impl NormalsVisualizer {
    /// `stride` of zero is treated as one.
    pub fn new(stride: u32) -> Self {
        Self {
            stride: stride.max(1),
        }
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Build one arrow per `stride`-th pixel of `frame`.
    ///
    /// Pixels are visited column by column. The grid must match the frame
    /// dimensions; otherwise no marker is produced.
    #[instrument(skip_all, fields(stride = self.stride))]
    pub fn markers(&self, frame: &NormalsFrame, grid: &PointGrid, header: &Header) -> MarkerArray {
        let mut array = MarkerArray::default();
        if !grid.matches(frame.width, frame.height) || frame.check(4).is_err() {
            return array;
        }

        let cols = frame.width as usize;
        let rows = frame.height as usize;
        for i in 0..cols {
            for j in 0..rows {
                let index = j * cols + i;
                if index % self.stride as usize != 0 {
                    continue;
                }

                let normal = &frame.data[4 * index..4 * index + 3];
                let q = normal_orientation([normal[0], normal[1], normal[2]]);
                let position = grid.get(index);

                array.markers.push(Marker {
                    header: header.clone(),
                    ns: String::new(),
                    id: index as i32,
                    type_: ARROW,
                    action: ADD,
                    pose: Pose {
                        position: Point {
                            x: position[0] as f64,
                            y: position[1] as f64,
                            z: position[2] as f64,
                        },
                        orientation: Quaternion {
                            x: q.i,
                            y: q.j,
                            z: q.k,
                            w: q.w,
                        },
                    },
                    scale: Vector3 {
                        x: 1.0,
                        y: 0.01,
                        z: 0.01,
                    },
                    color: ARROW_COLOR,
                    lifetime: ARROW_LIFETIME,
                    frame_locked: false,
                    points: Vec::new(),
                    colors: Vec::new(),
                    texture_resource: String::new(),
                    texture: CompressedImage {
                        header: Header {
                            stamp: Time { sec: 0, nanosec: 0 },
                            frame_id: String::new(),
                        },
                        format: String::new(),
                        data: Vec::new(),
                    },
                    uv_coordinates: Vec::new(),
                    text: String::new(),
                    mesh_resource: String::new(),
                    mesh_file: MeshFile::default(),
                    mesh_use_embedded_materials: false,
                });
            }
        }

        array
    }
}
