// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use edgefirst_depthcam::{CameraConfig, Error, RigidTransform, TopicNames};
use serde_json::json;
use tracing::level_filters::LevelFilter;
use zenoh::config::{Config, WhatAmI};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Depth image width in pixels
    #[arg(long, env, default_value = "320")]
    pub width: u32,

    /// Depth image height in pixels
    #[arg(long, env, default_value = "240")]
    pub height: u32,

    /// Horizontal field of view in degrees
    #[arg(long, env, default_value = "60")]
    pub hfov: f64,

    /// Capture rate in frames per second while the camera is active.  An
    /// inactive camera idles at one frame per second.
    #[arg(long, env, default_value = "10")]
    pub fps: u32,

    /// Depth camera info publish rate in Hz, 0 publishes with every frame
    #[arg(long, env, default_value = "0")]
    pub update_rate: f64,

    /// Minimum valid range in meters, closer samples are invalid
    #[arg(long, env, default_value = "0.4")]
    pub cutoff: f64,

    /// Publish one normal arrow every N pixels
    #[arg(long, env, default_value = "50")]
    pub reduce_normals: u32,

    /// Publish the depth image as 16UC1 millimeters instead of 32FC1 meters
    #[arg(long, env)]
    pub depth_16uc1: bool,

    /// Transform from the camera frame into the point cloud frame as
    /// "x y z roll pitch yaw"
    #[arg(long, env, default_value = "0 0 0 0 0 0")]
    pub transform: String,

    /// Frame transformation vector from the base_link
    #[arg(
        long,
        env,
        default_value = "0 0 0",
        value_delimiter = ' ',
        num_args = 3
    )]
    pub tf_vec: Vec<f64>,

    /// Frame transformation quaternion from the base_link
    #[arg(
        long,
        env,
        default_value = "-0.5 0.5 -0.5 0.5",
        value_delimiter = ' ',
        num_args = 4
    )]
    pub tf_quat: Vec<f64>,

    /// The name of the base frame
    #[arg(long, env, default_value = "base_link")]
    pub base_frame_id: String,

    /// The name of the camera optical frame
    #[arg(long, env, default_value = "camera_depth_optical_frame")]
    pub frame_id: String,

    /// The name of the point cloud frame, defaults to the camera frame
    #[arg(long, env)]
    pub point_cloud_frame_id: Option<String>,

    /// The name of the depth image frame, defaults to the camera frame
    #[arg(long, env)]
    pub depth_image_frame_id: Option<String>,

    /// camera base topic
    #[arg(long, env, default_value = "rt/camera")]
    pub camera_topic: String,

    /// Application log level
    #[arg(long, env, default_value = "info")]
    pub rust_log: LevelFilter,

    /// Enable Tracy profiler broadcast
    #[arg(long, env)]
    pub tracy: bool,

    /// zenoh connection mode
    #[arg(long, env, default_value = "peer")]
    mode: WhatAmI,

    /// connect to zenoh endpoints
    #[arg(long, env)]
    connect: Vec<String>,

    /// listen to zenoh endpoints
    #[arg(long, env)]
    listen: Vec<String>,

    /// disable zenoh multicast scouting
    #[arg(long, env)]
    no_multicast_scouting: bool,
}

impl Args {
    /// Full key expression of a topic under the camera base topic.
    pub fn topic(&self, name: &str) -> String {
        format!("{}/{}", self.camera_topic.trim_end_matches('/'), name)
    }
}

impl TryFrom<&Args> for CameraConfig {
    type Error = Error;

    fn try_from(args: &Args) -> Result<Self, Self::Error> {
        let config = CameraConfig {
            hfov: args.hfov.to_radians(),
            point_cloud_cutoff: args.cutoff,
            reduce_normals: args.reduce_normals,
            use_depth_16uc1_format: args.depth_16uc1,
            camera_frame_to_point_cloud_frame: args.transform.parse::<RigidTransform>()?,
            frame_name: args.frame_id.clone(),
            point_cloud_frame_name: args.point_cloud_frame_id.clone(),
            depth_image_frame_name: args.depth_image_frame_id.clone(),
            update_rate: args.update_rate,
            topics: TopicNames::default(),
        };
        config.validate()?;
        Ok(config)
    }
}

fn insert(config: &mut Config, key: &str, value: serde_json::Value) -> Result<(), Error> {
    config
        .insert_json5(key, &value.to_string())
        .map_err(|err| Error::Config(format!("zenoh {}: {:?}", key, err)))
}

impl TryFrom<&Args> for Config {
    type Error = Error;

    fn try_from(args: &Args) -> Result<Self, Self::Error> {
        let mut config = Config::default();

        insert(&mut config, "mode", json!(args.mode))?;

        if !args.connect.is_empty() {
            insert(&mut config, "connect/endpoints", json!(args.connect))?;
        }

        if !args.listen.is_empty() {
            insert(&mut config, "listen/endpoints", json!(args.listen))?;
        }

        if args.no_multicast_scouting {
            insert(&mut config, "scouting/multicast/enabled", json!(false))?;
        }

        insert(&mut config, "scouting/multicast/interface", json!("lo"))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgefirst_depthcam::Encoding;

    #[test]
    fn test_args_to_config() {
        let args = Args::parse_from([
            "depthcam",
            "--hfov",
            "90",
            "--depth-16uc1",
            "--transform",
            "0 0 0.5 0 0 0",
            "--point-cloud-frame-id",
            "base_link",
        ]);
        let config = CameraConfig::try_from(&args).unwrap();
        assert!((config.hfov - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert_eq!(config.encoding(), Encoding::UInt16Milli);
        assert_eq!(config.point_cloud_frame(), "base_link");
        assert_eq!(config.depth_image_frame(), "camera_depth_optical_frame");
        assert_eq!(args.topic("points"), "rt/camera/points");
    }

    #[test]
    fn test_args_bad_transform() {
        let args = Args::parse_from(["depthcam", "--transform", "1 2 3"]);
        assert!(matches!(
            CameraConfig::try_from(&args),
            Err(Error::Config(_))
        ));
    }
}
