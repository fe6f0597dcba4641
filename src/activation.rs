// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Subscriber-count driven sensor activation.
//!
//! The capture device only runs while somebody consumes one of its outputs.
//! [`SubscriberActivation`] keeps one counter per output plus a combined image
//! counter shared by every image-style output, and the device's active flag.
//! Every method returns the transition the host must apply, so the decision is
//! plain data and can be checked without a running sensor.
//!
//! Activation from a frame callback is lagged by one frame: the frame that
//! triggers activation is dropped so that no stale data leaves the engine
//! before the device has completed a full capture cycle.

use std::fmt;
use tracing::debug;

/// Derived output a consumer can attach to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputKind {
    /// Colored point cloud (`sensor_msgs/PointCloud2`)
    PointCloud,
    /// Depth raster (`sensor_msgs/Image`, 32FC1 or 16UC1)
    DepthImage,
    /// Depth camera info (`sensor_msgs/CameraInfo`)
    DepthInfo,
    /// Normal arrows (`visualization_msgs/MarkerArray`)
    Normals,
    /// Reflectance raster (`sensor_msgs/Image`, 32FC1)
    Reflectance,
    /// Plain camera image consumer, counted only in the combined image count
    Image,
}

impl OutputKind {
    pub const ALL: [OutputKind; 6] = [
        OutputKind::PointCloud,
        OutputKind::DepthImage,
        OutputKind::DepthInfo,
        OutputKind::Normals,
        OutputKind::Reflectance,
        OutputKind::Image,
    ];

    /// Outputs whose consumers also count as image consumers.
    fn counts_as_image(self) -> bool {
        matches!(
            self,
            OutputKind::PointCloud | OutputKind::Normals | OutputKind::Reflectance
        )
    }

    /// Depth raster and camera info consumers ride along with other consumers
    /// and never switch the device off on their own.
    fn may_deactivate(self) -> bool {
        !matches!(self, OutputKind::DepthImage | OutputKind::DepthInfo)
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OutputKind::PointCloud => write!(f, "point_cloud"),
            OutputKind::DepthImage => write!(f, "depth_image"),
            OutputKind::DepthInfo => write!(f, "depth_info"),
            OutputKind::Normals => write!(f, "normals"),
            OutputKind::Reflectance => write!(f, "reflectance"),
            OutputKind::Image => write!(f, "image"),
        }
    }
}

/// Per-output consumer counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubscriberCounters {
    pub point_cloud: u32,
    pub depth_image: u32,
    pub depth_info: u32,
    pub normals: u32,
    pub reflectance: u32,
    /// Combined count of every image-style consumer.
    pub image: u32,
}

impl SubscriberCounters {
    /// Counter owned by `kind`.
    pub fn get(&self, kind: OutputKind) -> u32 {
        match kind {
            OutputKind::PointCloud => self.point_cloud,
            OutputKind::DepthImage => self.depth_image,
            OutputKind::DepthInfo => self.depth_info,
            OutputKind::Normals => self.normals,
            OutputKind::Reflectance => self.reflectance,
            OutputKind::Image => self.image,
        }
    }

    fn get_mut(&mut self, kind: OutputKind) -> &mut u32 {
        match kind {
            OutputKind::PointCloud => &mut self.point_cloud,
            OutputKind::DepthImage => &mut self.depth_image,
            OutputKind::DepthInfo => &mut self.depth_info,
            OutputKind::Normals => &mut self.normals,
            OutputKind::Reflectance => &mut self.reflectance,
            OutputKind::Image => &mut self.image,
        }
    }

    /// True if any consumer keeps the depth pipeline running.
    pub fn any_depth_consumer(&self) -> bool {
        self.point_cloud > 0 || self.depth_image > 0 || self.image > 0 || self.normals > 0
    }
}

/// Device state change requested from the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Activate,
    Deactivate,
}

impl Transition {
    pub fn is_active(self) -> bool {
        self == Transition::Activate
    }
}

/// Outcome of the per-frame activation check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gate {
    /// Device is active and the frame should be converted.
    Proceed,
    /// Device was just activated; drop this frame.
    Activated,
    /// Device was just deactivated; drop this frame.
    Deactivated,
    /// Nothing to do for this frame.
    Idle,
}

impl Gate {
    /// Transition the host must apply for this gate, if any.
    pub fn transition(self) -> Option<Transition> {
        match self {
            Gate::Activated => Some(Transition::Activate),
            Gate::Deactivated => Some(Transition::Deactivate),
            Gate::Proceed | Gate::Idle => None,
        }
    }
}

/// Consumer counters and the capture device's active flag.
///
/// Counters saturate at zero: an unsubscribe on an empty counter leaves it at
/// zero (and still requests deactivation where that output is allowed to).
#[derive(Clone, Debug, Default)]
pub struct SubscriberActivation {
    counters: SubscriberCounters,
    active: bool,
}

impl SubscriberActivation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counters(&self) -> SubscriberCounters {
        self.counters
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Register a consumer for `kind`, activating the device if needed.
    pub fn subscribe(&mut self, kind: OutputKind) -> Option<Transition> {
        *self.counters.get_mut(kind) += 1;
        if kind.counts_as_image() {
            self.counters.image += 1;
        }
        debug!(%kind, count = self.counters.get(kind), "consumer attached");

        if self.active {
            None
        } else {
            self.set_active(true)
        }
    }

    /// Remove a consumer for `kind`, deactivating the device when the output's
    /// counter reaches zero.
    pub fn unsubscribe(&mut self, kind: OutputKind) -> Option<Transition> {
        let counter = self.counters.get_mut(kind);
        *counter = counter.saturating_sub(1);
        let remaining = *counter;
        if kind.counts_as_image() {
            self.counters.image = self.counters.image.saturating_sub(1);
        }
        debug!(%kind, count = remaining, "consumer detached");

        if remaining == 0 && kind.may_deactivate() {
            self.set_active(false)
        } else {
            None
        }
    }

    /// Activation check run before converting a depth frame.
    ///
    /// An active device with no consumer left is switched off. An inactive
    /// device with a consumer is switched on and the frame is dropped.
    pub fn gate_depth_frame(&mut self) -> Gate {
        let wanted = self.counters.any_depth_consumer();
        if self.active && !wanted {
            self.set_active(false);
            Gate::Deactivated
        } else {
            self.gate(wanted, wanted)
        }
    }

    /// Activation check for the auxiliary frame callbacks.
    ///
    /// `activate` decides whether an inactive device should be switched on,
    /// `proceed` whether an active device's frame should be converted.
    pub fn gate(&mut self, activate: bool, proceed: bool) -> Gate {
        match (self.active, activate, proceed) {
            (false, true, _) => {
                self.set_active(true);
                Gate::Activated
            }
            (false, false, _) => Gate::Idle,
            (true, _, true) => Gate::Proceed,
            (true, _, false) => Gate::Idle,
        }
    }

    fn set_active(&mut self, active: bool) -> Option<Transition> {
        if self.active == active {
            return None;
        }
        self.active = active;
        debug!(active, "capture device state change");
        Some(if active {
            Transition::Activate
        } else {
            Transition::Deactivate
        })
    }
}
