// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Rigid transform from the camera frame into the point cloud frame.
//!
//! The transform is configured as six whitespace-separated numbers,
//! `x y z roll pitch yaw` (meters and radians), and applied to every point of
//! an outgoing cloud just before it is packed.

use crate::camera::Error;
use edgefirst_schemas::geometry_msgs::{Quaternion, Transform, Vector3};
use nalgebra::{Point3, UnitQuaternion, Vector3 as NVector3};
use serde::{Deserialize, Deserializer};
use std::{fmt, str::FromStr};

/// Re-expresses projected points in another coordinate frame.
///
/// Implementations must leave NaN points NaN.
pub trait CloudTransform {
    /// Transform the points in place. The three slices have equal length.
    fn transform_points(&self, x: &mut [f32], y: &mut [f32], z: &mut [f32]);

    /// True when `transform_points` is a no-op.
    fn is_identity(&self) -> bool {
        false
    }
}

/// Rotation followed by translation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RigidTransform {
    pub translation: NVector3<f64>,
    pub rotation: UnitQuaternion<f64>,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform {
    pub fn identity() -> Self {
        Self {
            translation: NVector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Build from a translation and roll, pitch, yaw angles in radians.
    pub fn from_xyz_rpy(xyz: [f64; 3], rpy: [f64; 3]) -> Self {
        Self {
            translation: NVector3::new(xyz[0], xyz[1], xyz[2]),
            rotation: UnitQuaternion::from_euler_angles(rpy[0], rpy[1], rpy[2]),
        }
    }

    /// Apply to a single point.
    pub fn apply(&self, point: [f64; 3]) -> [f64; 3] {
        let p = self.rotation * Point3::new(point[0], point[1], point[2]) + self.translation;
        [p.x, p.y, p.z]
    }

    /// Convert into a `geometry_msgs/Transform`.
    pub fn to_msg(&self) -> Transform {
        Transform {
            translation: Vector3 {
                x: self.translation.x,
                y: self.translation.y,
                z: self.translation.z,
            },
            rotation: Quaternion {
                x: self.rotation.i,
                y: self.rotation.j,
                z: self.rotation.k,
                w: self.rotation.w,
            },
        }
    }
}

impl CloudTransform for RigidTransform {
    fn transform_points(&self, x: &mut [f32], y: &mut [f32], z: &mut [f32]) {
        if CloudTransform::is_identity(self) {
            return;
        }

        let rotation = self.rotation.cast::<f32>();
        let translation = self.translation.cast::<f32>();
        for ((x, y), z) in x.iter_mut().zip(y.iter_mut()).zip(z.iter_mut()) {
            let p = rotation * Point3::new(*x, *y, *z) + translation;
            *x = p.x;
            *y = p.y;
            *z = p.z;
        }
    }

    fn is_identity(&self) -> bool {
        self.translation == NVector3::zeros() && self.rotation == UnitQuaternion::identity()
    }
}

impl FromStr for RigidTransform {
    type Err = Error;

    /// Parse `"x y z roll pitch yaw"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split_whitespace()
            .map(|token| {
                token
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| Error::Config(format!("invalid transform value '{}'", token)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        match values.as_slice() {
            [x, y, z, roll, pitch, yaw] => {
                Ok(Self::from_xyz_rpy([*x, *y, *z], [*roll, *pitch, *yaw]))
            }
            _ => Err(Error::Config(format!(
                "transform needs 6 values (x y z roll pitch yaw), got {}",
                values.len()
            ))),
        }
    }
}

impl fmt::Display for RigidTransform {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (roll, pitch, yaw) = self.rotation.euler_angles();
        write!(
            f,
            "{} {} {} {} {} {}",
            self.translation.x, self.translation.y, self.translation.z, roll, pitch, yaw
        )
    }
}

impl<'de> Deserialize<'de> for RigidTransform {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_parse_transform() {
        let tf: RigidTransform = "1 2 3 0 0 0".parse().unwrap();
        assert_eq!(tf.translation, NVector3::new(1.0, 2.0, 3.0));
        assert_eq!(tf.rotation, UnitQuaternion::identity());

        let tf: RigidTransform = "  0\t0 0  0 0 1.5707963267948966 ".parse().unwrap();
        let p = tf.apply([1.0, 0.0, 0.0]);
        assert_relative_eq!(p[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(p[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_parse_transform_errors() {
        assert!(matches!(
            "1 2 3 0 0".parse::<RigidTransform>(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            "1 2 3 0 0 0 0".parse::<RigidTransform>(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            "1 2 x 0 0 0".parse::<RigidTransform>(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            "1 2 NaN 0 0 0".parse::<RigidTransform>(),
            Err(Error::Config(_))
        ));
        assert!("".parse::<RigidTransform>().is_err());
    }

    #[test]
    fn test_transform_points() {
        let tf = RigidTransform::from_xyz_rpy([0.0, 0.0, 1.0], [FRAC_PI_2, 0.0, 0.0]);
        let mut x = vec![1.0f32, f32::NAN];
        let mut y = vec![1.0f32, 0.0];
        let mut z = vec![0.0f32, 0.0];
        tf.transform_points(&mut x, &mut y, &mut z);

        // Roll maps y onto z.
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(y[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(z[0], 2.0, epsilon = 1e-6);
        assert!(x[1].is_nan());
        assert!(z[1].is_nan());
    }

    #[test]
    fn test_identity_is_noop() {
        let tf = RigidTransform::default();
        assert!(CloudTransform::is_identity(&tf));
        let mut x = vec![1.5f32];
        let mut y = vec![-2.0f32];
        let mut z = vec![f32::NAN];
        tf.transform_points(&mut x, &mut y, &mut z);
        assert_eq!(x[0], 1.5);
        assert_eq!(y[0], -2.0);
        assert!(z[0].is_nan());
    }

    #[test]
    fn test_to_msg() {
        let tf = RigidTransform::from_xyz_rpy([0.1, 0.2, 0.3], [0.0, 0.0, 0.0]);
        let msg = tf.to_msg();
        assert_eq!(msg.translation.x, 0.1);
        assert_eq!(msg.rotation.w, 1.0);
    }

    #[test]
    fn test_deserialize_from_string() {
        let tf: RigidTransform = serde_json::from_str("\"0 0 0 0 0 0\"").unwrap();
        assert!(CloudTransform::is_identity(&tf));
        assert!(serde_json::from_str::<RigidTransform>("\"0 0 0\"").is_err());
    }
}
