// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Depth camera conversion engine.
//!
//! [`DepthCamera`] receives the host's capture callbacks, decides from the
//! consumer counters whether the capture device should run, converts frames
//! into messages and hands them to a [`FrameSink`].
//!
//! All mutable state (counters, point grid, cached color image, the sink
//! itself) sits behind one mutex which is held for the whole
//! read, convert, publish sequence of a callback. Callbacks may arrive on any
//! host thread. Conversion never fails: frames that do not match their
//! declared dimensions are dropped with a debug log.

use crate::{
    activation::{Gate, OutputKind, SubscriberActivation, SubscriberCounters, Transition},
    buffer::{GridChange, PointGrid},
    camera::{
        camera_info, time_nanos, ColorFrame, DepthFrame, NormalsFrame, Points, ReflectanceFrame,
        RgbPointFrame,
    },
    color::{fuse, CachedColor},
    config::CameraConfig,
    formats::point_cloud_message,
    normals::{visualization_msgs::MarkerArray, NormalsVisualizer},
    projection::FrameProjector,
    raster::{reflectance_image, DepthRasterEncoder},
    transform::CloudTransform,
};
use edgefirst_schemas::{
    builtin_interfaces::Time,
    sensor_msgs::{CameraInfo, Image, PointCloud2},
    std_msgs::Header,
};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, instrument, trace};

/// Transport for the engine's outputs.
///
/// Every method is called with the engine lock held, in callback order.
pub trait FrameSink {
    /// Switch the capture device on or off.
    fn set_active(&mut self, active: bool);
    fn publish_point_cloud(&mut self, msg: &PointCloud2);
    fn publish_depth_image(&mut self, msg: &Image);
    fn publish_markers(&mut self, msg: &MarkerArray);
    fn publish_reflectance(&mut self, msg: &Image);
    fn publish_camera_info(&mut self, msg: &CameraInfo);
}

struct State<S> {
    sink: S,
    activation: SubscriberActivation,
    grid: PointGrid,
    points: Points,
    color: CachedColor,
    /// Stamp of the last depth or RGB point cloud frame.
    depth_stamp: Time,
    /// Dimensions of the last well-formed depth frame.
    depth_dims: Option<(u32, u32)>,
    last_info_stamp: Option<Time>,
    /// Outcome of the most recent grid sizing.
    grid_change: GridChange,
}

impl<S: FrameSink> State<S> {
    /// Forward the gate's transition to the sink; true if the frame should be
    /// converted.
    fn apply(&mut self, gate: Gate) -> bool {
        if let Some(transition) = gate.transition() {
            self.sink.set_active(transition.is_active());
        }
        gate == Gate::Proceed
    }
}

/// Depth camera conversion engine.
pub struct DepthCamera<S> {
    config: CameraConfig,
    projector: FrameProjector,
    encoder: DepthRasterEncoder,
    visualizer: NormalsVisualizer,
    transform: Box<dyn CloudTransform + Send + Sync>,
    state: Mutex<State<S>>,
}

impl<S: FrameSink> DepthCamera<S> {
    /// Create an engine from a validated configuration. The point cloud
    /// transform defaults to the configured rigid transform.
    pub fn new(config: CameraConfig, sink: S) -> Self {
        let projector = FrameProjector::new(config.hfov, config.point_cloud_cutoff);
        let encoder = DepthRasterEncoder::new(config.encoding(), config.point_cloud_cutoff);
        let visualizer = NormalsVisualizer::new(config.reduce_normals);
        let transform = Box::new(config.camera_frame_to_point_cloud_frame);

        Self {
            config,
            projector,
            encoder,
            visualizer,
            transform,
            state: Mutex::new(State {
                sink,
                activation: SubscriberActivation::new(),
                grid: PointGrid::new(),
                points: Points::default(),
                color: CachedColor::new(),
                depth_stamp: Time { sec: 0, nanosec: 0 },
                depth_dims: None,
                last_info_stamp: None,
                grid_change: GridChange::Unchanged,
            }),
        }
    }

    /// Replace the point cloud transform.
    pub fn with_transform(mut self, transform: impl CloudTransform + Send + Sync + 'static) -> Self {
        self.transform = Box::new(transform);
        self
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, State<S>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the sink under the engine lock.
    pub fn with_sink<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.lock().sink)
    }

    pub fn into_sink(self) -> S {
        self.state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .sink
    }

    pub fn counters(&self) -> SubscriberCounters {
        self.lock().activation.counters()
    }

    pub fn is_active(&self) -> bool {
        self.lock().activation.is_active()
    }

    /// Dimensions of the cached point grid, if allocated.
    pub fn grid_dimensions(&self) -> Option<(u32, u32)> {
        let state = self.lock();
        state
            .grid
            .is_allocated()
            .then(|| (state.grid.width(), state.grid.height()))
    }

    /// What the last converted frame did to the point grid.
    pub fn last_grid_change(&self) -> GridChange {
        self.lock().grid_change
    }

    /// A consumer attached to `kind`.
    pub fn subscribe(&self, kind: OutputKind) -> Option<Transition> {
        let mut state = self.lock();
        let transition = state.activation.subscribe(kind);
        if let Some(transition) = transition {
            state.sink.set_active(transition.is_active());
        }
        transition
    }

    /// A consumer detached from `kind`.
    pub fn unsubscribe(&self, kind: OutputKind) -> Option<Transition> {
        let mut state = self.lock();
        let transition = state.activation.unsubscribe(kind);
        if let Some(transition) = transition {
            state.sink.set_active(transition.is_active());
        }
        transition
    }

    /// Size the grid for a frame and remember what happened.
    fn resize_grid(state: &mut State<S>, width: u32, height: u32) {
        let change = state.grid.ensure_dimensions(width, height);
        if change != GridChange::Unchanged {
            trace!(?change, "point grid dimensions changed");
        }
        state.grid_change = change;
    }

    fn header(&self, stamp: Time, frame_id: &str) -> Header {
        Header {
            stamp,
            frame_id: String::from(frame_id),
        }
    }

    /// Convert a depth frame into a point cloud and depth raster.
    #[instrument(skip_all, fields(width = frame.width, height = frame.height))]
    pub fn on_depth_frame(&self, frame: &DepthFrame) {
        if let Err(err) = frame.check(1) {
            debug!("dropping depth frame: {}", err);
            return;
        }

        let mut state = self.lock();
        let state = &mut *state;
        state.depth_stamp = frame.stamp.clone();
        state.depth_dims = Some((frame.width, frame.height));

        let gate = state.activation.gate_depth_frame();
        if !state.apply(gate) {
            trace!(?gate, "depth frame not converted");
            return;
        }

        let counters = state.activation.counters();
        if counters.point_cloud > 0 || counters.normals > 0 {
            Self::resize_grid(state, frame.width, frame.height);
            let dense = self
                .projector
                .project(frame, &mut state.grid, &mut state.points);
            fuse(
                state.color.data(),
                frame.width,
                frame.height,
                &mut state.points,
            );

            if counters.point_cloud > 0 {
                let points = &mut state.points;
                self.transform
                    .transform_points(&mut points.x, &mut points.y, &mut points.z);
                let header = self.header(frame.stamp.clone(), self.config.point_cloud_frame());
                let msg = point_cloud_message(header, frame.width, frame.height, points, dense);
                state.sink.publish_point_cloud(&msg);
            }
        }

        if counters.depth_image > 0 {
            let header = self.header(frame.stamp.clone(), self.config.depth_image_frame());
            let msg = self.encoder.encode(frame, header);
            state.sink.publish_depth_image(&msg);
        }
    }

    /// Cache a color frame for fusion with the next depth frame.
    #[instrument(skip_all, fields(width = frame.width, height = frame.height))]
    pub fn on_image_frame(&self, frame: &ColorFrame) {
        if frame.pixels() == 0 {
            debug!("dropping empty image frame");
            return;
        }

        let mut state = self.lock();
        let wanted = state.activation.counters().image > 0;
        let gate = state.activation.gate(wanted, wanted);
        if state.apply(gate) {
            state.color.store(frame.data, frame.width, frame.height);
        }
    }

    /// Publish normal arrows positioned on the cached point grid.
    #[instrument(skip_all, fields(width = frame.width, height = frame.height))]
    pub fn on_normals_frame(&self, frame: &NormalsFrame) {
        if let Err(err) = frame.check(4) {
            debug!("dropping normals frame: {}", err);
            return;
        }

        let mut state = self.lock();
        let wanted = state.activation.counters().normals > 0;
        let gate = state.activation.gate(wanted, wanted);
        if !state.apply(gate) {
            return;
        }

        if !state.grid.matches(frame.width, frame.height) {
            debug!(
                grid_width = state.grid.width(),
                grid_height = state.grid.height(),
                "normals frame does not match the point grid"
            );
            state.sink.publish_markers(&MarkerArray::default());
            return;
        }
        let header = self.header(state.depth_stamp.clone(), &self.config.frame_name);
        let msg = self.visualizer.markers(frame, &state.grid, &header);
        state.sink.publish_markers(&msg);
    }

    /// Publish a reflectance raster when somebody listens.
    #[instrument(skip_all, fields(width = frame.width, height = frame.height))]
    pub fn on_reflectance_frame(&self, frame: &ReflectanceFrame) {
        if let Err(err) = frame.check(1) {
            debug!("dropping reflectance frame: {}", err);
            return;
        }

        let mut state = self.lock();
        if state.activation.counters().reflectance == 0 {
            return;
        }
        let header = self.header(frame.stamp.clone(), &self.config.frame_name);
        let msg = reflectance_image(frame, header);
        state.sink.publish_reflectance(&msg);
    }

    /// Republish a host-computed colored point cloud.
    ///
    /// The frame holds `x, y, z, rgb` floats per pixel. It also replaces the
    /// cached point grid so normals can be placed on it.
    #[instrument(skip_all, fields(width = frame.width, height = frame.height))]
    pub fn on_rgb_point_cloud(&self, frame: &RgbPointFrame) {
        if let Err(err) = frame.check(4) {
            debug!("dropping rgb point cloud: {}", err);
            return;
        }

        let mut state = self.lock();
        let state = &mut *state;
        state.depth_stamp = frame.stamp.clone();

        let counters = state.activation.counters();
        let gate = state.activation.gate(
            counters.point_cloud > 0,
            counters.point_cloud > 0 || counters.normals > 0,
        );
        if !state.apply(gate) {
            return;
        }

        Self::resize_grid(state, frame.width, frame.height);
        state.grid.copy_from_interleaved(frame.data);

        let cols = frame.width as usize;
        let rows = frame.height as usize;
        let points = &mut state.points;
        points.resize(cols * rows);
        let mut k = 0;
        for i in 0..cols {
            for j in 0..rows {
                let [x, y, z, rgb] = state.grid.get(j * cols + i);
                points.x[k] = x;
                points.y[k] = y;
                points.z[k] = z;
                points.rgb[k] = rgb.to_le_bytes();
                k += 1;
            }
        }

        if counters.point_cloud > 0 {
            let dense = points.is_dense();
            self.transform
                .transform_points(&mut points.x, &mut points.y, &mut points.z);
            let header = self.header(frame.stamp.clone(), self.config.point_cloud_frame());
            let msg = point_cloud_message(header, frame.width, frame.height, points, dense);
            state.sink.publish_point_cloud(&msg);
        }
    }

    /// Publish the depth camera info, at most once per update period of
    /// sensor time. Returns true if a message was published.
    pub fn publish_camera_info(&self, stamp: Time) -> bool {
        let mut state = self.lock();
        if state.activation.counters().depth_info == 0 {
            return false;
        }
        let Some((width, height)) = state.depth_dims else {
            trace!("no depth frame yet, skipping camera info");
            return false;
        };

        if let Some(last) = &state.last_info_stamp {
            if time_nanos(&stamp) - time_nanos(last) < self.config.update_period_nanos() {
                return false;
            }
        }

        let header = self.header(stamp.clone(), self.config.depth_image_frame());
        let msg = camera_info(header, width, height, self.config.hfov);
        state.sink.publish_camera_info(&msg);
        state.last_info_stamp = Some(stamp);
        true
    }
}
