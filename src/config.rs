// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Engine configuration.
//!
//! [`CameraConfig`] holds every tunable of the conversion engine. It can be
//! built in code, deserialized from JSON (camelCase keys, every key
//! optional), or converted from the binary's command line arguments.
//! Loading validates eagerly so a malformed value fails at startup rather
//! than per frame.

use crate::{camera::Error, raster::Encoding, transform::RigidTransform};
use serde::Deserialize;

/// Output topic names, relative to the publisher's base topic.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TopicNames {
    pub point_cloud: String,
    pub depth_image: String,
    pub depth_info: String,
    pub normals: String,
    pub reflectance: String,
    pub image: String,
    pub image_info: String,
}

impl Default for TopicNames {
    fn default() -> Self {
        Self {
            point_cloud: String::from("points"),
            depth_image: String::from("depth/image_raw"),
            depth_info: String::from("depth/camera_info"),
            normals: String::from("normals"),
            reflectance: String::from("reflectance"),
            image: String::from("ir/image_raw"),
            image_info: String::from("ir/camera_info"),
        }
    }
}

/// Depth camera engine configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CameraConfig {
    /// Horizontal field of view in radians.
    pub hfov: f64,
    /// Minimum valid range in meters; samples at or below are invalid.
    pub point_cloud_cutoff: f64,
    /// Publish one normal arrow every `reduce_normals` pixels.
    pub reduce_normals: u32,
    /// Publish depth rasters as `16UC1` millimeters instead of `32FC1` meters.
    #[serde(rename = "useDepth16UC1Format")]
    pub use_depth_16uc1_format: bool,
    /// Transform from the camera frame into the point cloud frame.
    pub camera_frame_to_point_cloud_frame: RigidTransform,
    /// Camera optical frame.
    pub frame_name: String,
    /// Point cloud frame, defaults to `frame_name`.
    pub point_cloud_frame_name: Option<String>,
    /// Depth raster frame, defaults to `frame_name`.
    pub depth_image_frame_name: Option<String>,
    /// Camera info publish rate in Hz; zero publishes on every call.
    pub update_rate: f64,
    pub topics: TopicNames,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            hfov: std::f64::consts::FRAC_PI_3,
            point_cloud_cutoff: 0.4,
            reduce_normals: 50,
            use_depth_16uc1_format: false,
            camera_frame_to_point_cloud_frame: RigidTransform::identity(),
            frame_name: String::from("camera"),
            point_cloud_frame_name: None,
            depth_image_frame_name: None,
            update_rate: 0.0,
            topics: TopicNames::default(),
        }
    }
}

impl CameraConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        let config: CameraConfig =
            serde_json::from_str(json).map_err(|err| Error::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), Error> {
        if !self.hfov.is_finite() || self.hfov <= 0.0 || self.hfov >= std::f64::consts::PI {
            return Err(Error::Config(format!(
                "hfov must be in (0, pi) radians, got {}",
                self.hfov
            )));
        }
        if !self.point_cloud_cutoff.is_finite() {
            return Err(Error::Config(format!(
                "pointCloudCutoff must be finite, got {}",
                self.point_cloud_cutoff
            )));
        }
        if self.reduce_normals == 0 {
            return Err(Error::Config(String::from(
                "reduceNormals must be positive",
            )));
        }
        if !self.update_rate.is_finite() || self.update_rate < 0.0 {
            return Err(Error::Config(format!(
                "updateRate must be a non-negative number, got {}",
                self.update_rate
            )));
        }
        if self.frame_name.is_empty() {
            return Err(Error::Config(String::from("frameName must not be empty")));
        }
        Ok(())
    }

    pub fn encoding(&self) -> Encoding {
        if self.use_depth_16uc1_format {
            Encoding::UInt16Milli
        } else {
            Encoding::Float32
        }
    }

    pub fn point_cloud_frame(&self) -> &str {
        self.point_cloud_frame_name
            .as_deref()
            .unwrap_or(&self.frame_name)
    }

    pub fn depth_image_frame(&self) -> &str {
        self.depth_image_frame_name
            .as_deref()
            .unwrap_or(&self.frame_name)
    }

    /// Minimum sensor time between two camera info messages, in nanoseconds.
    pub fn update_period_nanos(&self) -> i64 {
        if self.update_rate > 0.0 {
            (1e9 / self.update_rate) as i64
        } else {
            0
        }
    }
}
