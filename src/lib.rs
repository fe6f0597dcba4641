// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! EdgeFirst Depth Camera Library
//!
//! This library converts depth camera captures into ROS 2 messages: colored
//! point clouds, depth rasters, reflectance rasters, camera info and surface
//! normal arrows. The capture device is only kept running while a consumer is
//! attached to one of the outputs.
//!
//! # Architecture
//!
//! The host owns the capture device and calls into the engine with borrowed
//! frames; the engine publishes through a host-provided sink:
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────────────┐     ┌─────────────┐
//! │  Host capture   │ ──► │  DepthCamera             │ ──► │  FrameSink  │
//! │  (depth/color/  │     │  activation gate         │     │  (zenoh,    │
//! │   normals/refl) │     │  projection + color      │     │   test, ..) │
//! └─────────────────┘     │  raster / normals        │     └─────────────┘
//!          ▲              └──────────────────────────┘            │
//!          │                                                      │
//!          └──────────── set_active(true / false) ◄───────────────┘
//! ```
//!
//! 1. Consumers attach and detach with `subscribe` / `unsubscribe`
//! 2. Each frame callback first runs the activation gate
//! 3. Depth frames are projected into the cached [`buffer::PointGrid`]
//! 4. The last color image is fused into the points by pixel index
//! 5. Messages are built and handed to the sink under the engine lock
//!
//! # Modules
//!
//! - [`activation`]: Consumer counters and the device activation state machine
//! - [`buffer`]: Cached point grid shared by the depth and normals paths
//! - [`camera`]: Frame views, point storage, errors and timestamps
//! - [`color`]: Color fusion
//! - [`config`]: Engine configuration
//! - [`engine`]: The conversion engine and the sink trait
//! - [`formats`]: PointCloud2 packing
//! - [`normals`]: Normal arrow markers
//! - [`projection`]: Pinhole projection
//! - [`raster`]: Depth raster encodings
//! - [`transform`]: Rigid transform into the point cloud frame
//!
//! # Example
//!
//! ```ignore
//! use edgefirst_depthcam::{CameraConfig, DepthCamera, DepthFrame, OutputKind};
//!
//! let camera = DepthCamera::new(CameraConfig::default(), sink);
//! camera.subscribe(OutputKind::PointCloud);
//!
//! // From the host's depth callback
//! camera.on_depth_frame(&DepthFrame::new(&depth, width, height).with_stamp(stamp));
//! ```

pub mod activation;
pub mod buffer;
pub mod camera;
pub mod color;
pub mod config;
pub mod engine;
pub mod formats;
pub mod normals;
pub mod projection;
pub mod raster;
pub mod transform;

// Re-exports for convenience
pub use buffer::GridChange;
pub use activation::{Gate, OutputKind, SubscriberActivation, SubscriberCounters, Transition};
pub use camera::{
    ColorFrame, DepthFrame, Error, Frame, NormalsFrame, Points, ReflectanceFrame, RgbPointFrame,
};
pub use config::{CameraConfig, TopicNames};
pub use engine::{DepthCamera, FrameSink};
pub use formats::PointFieldType;
pub use raster::Encoding;
pub use transform::{CloudTransform, RigidTransform};
