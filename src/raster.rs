// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Depth raster encoding (REP 118).
//!
//! Two encodings are supported:
//!
//! - `32FC1`: meters as f32, NaN for samples at or below the cutoff.
//! - `16UC1`: millimeters as u16, rounded and clamped, 0 for samples at or
//!   below the cutoff.
//!
//! Output bytes are always little-endian and `is_bigendian` is 0.

use crate::camera::{DepthFrame, ReflectanceFrame};
use edgefirst_schemas::{sensor_msgs::Image, std_msgs::Header};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::instrument;

/// Depth raster pixel encoding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    /// 32-bit float meters (`32FC1`).
    #[default]
    Float32,
    /// 16-bit unsigned millimeters (`16UC1`).
    UInt16Milli,
}

impl Encoding {
    /// ROS image encoding string.
    pub fn name(self) -> &'static str {
        match self {
            Encoding::Float32 => "32FC1",
            Encoding::UInt16Milli => "16UC1",
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Encoding::Float32 => 4,
            Encoding::UInt16Milli => 2,
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Converts depth frames into raster images.
#[derive(Clone, Copy, Debug)]
pub struct DepthRasterEncoder {
    encoding: Encoding,
    cutoff: f64,
}

impl DepthRasterEncoder {
    pub fn new(encoding: Encoding, cutoff: f64) -> Self {
        Self { encoding, cutoff }
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Encode `depth` into `out`, replacing its contents.
    pub fn encode_into(&self, depth: &[f32], out: &mut Vec<u8>) {
        out.clear();
        out.reserve(depth.len() * self.encoding.bytes_per_pixel());

        match self.encoding {
            Encoding::Float32 => {
                for &d in depth {
                    out.extend_from_slice(&self.meters(d).to_le_bytes());
                }
            }
            Encoding::UInt16Milli => {
                for &d in depth {
                    out.extend_from_slice(&self.millimeters(d).to_le_bytes());
                }
            }
        }
    }

    /// Build the depth image message for `frame`.
    ///
    /// # Panics
    ///
    /// Panics if the frame holds fewer than `width * height` samples.
    #[instrument(skip_all, fields(encoding = %self.encoding))]
    pub fn encode(&self, frame: &DepthFrame, header: Header) -> Image {
        let mut data = Vec::new();
        self.encode_into(&frame.data[..frame.pixels()], &mut data);

        Image {
            header,
            height: frame.height,
            width: frame.width,
            encoding: String::from(self.encoding.name()),
            is_bigendian: 0,
            step: (self.encoding.bytes_per_pixel() * frame.width as usize) as u32,
            data,
        }
    }

    #[inline]
    fn meters(&self, d: f32) -> f32 {
        if d as f64 > self.cutoff {
            d
        } else {
            f32::NAN
        }
    }

    #[inline]
    fn millimeters(&self, d: f32) -> u16 {
        if d as f64 > self.cutoff {
            (d as f64 * 1000.0).round().clamp(0.0, u16::MAX as f64) as u16
        } else {
            0
        }
    }
}

/// Build a `32FC1` reflectance image, copying samples unchanged.
///
/// # Panics
///
/// Panics if the frame holds fewer than `width * height` samples.
pub fn reflectance_image(frame: &ReflectanceFrame, header: Header) -> Image {
    let data = frame.data[..frame.pixels()]
        .iter()
        .flat_map(|r| r.to_le_bytes())
        .collect();

    Image {
        header,
        height: frame.height,
        width: frame.width,
        encoding: String::from(Encoding::Float32.name()),
        is_bigendian: 0,
        step: 4 * frame.width,
        data,
    }
}
