// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Common depth camera types: frame views, projected point storage, the crate
//! error type and timestamp helpers.
//!
//! Frames are borrowed views over buffers owned by the host capture callback.
//! They are only valid for the duration of that callback; anything the engine
//! needs to keep (the projected point grid, the last color image) is copied
//! into engine-owned storage.

use edgefirst_schemas::{
    builtin_interfaces::Time,
    sensor_msgs::{CameraInfo, RegionOfInterest},
    std_msgs::Header,
};
use std::fmt;

/// Borrowed view of one capture delivered by the host.
///
/// `data` is row-major with `channels` values per pixel. `depth` and `format`
/// are passed through from the host as-is; the conversion code relies only on
/// the dimensions and the buffer length.
#[derive(Clone, Debug)]
pub struct Frame<'a, T> {
    pub data: &'a [T],
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub format: &'a str,
    pub stamp: Time,
}

/// Range samples in meters, one per pixel.
pub type DepthFrame<'a> = Frame<'a, f32>;

/// RGB8 (3 bytes per pixel) or mono (1 byte per pixel) image.
pub type ColorFrame<'a> = Frame<'a, u8>;

/// Surface normals, 4 floats per pixel (x, y, z, unused).
pub type NormalsFrame<'a> = Frame<'a, f32>;

/// Reflectance samples, one float per pixel.
pub type ReflectanceFrame<'a> = Frame<'a, f32>;

/// Host-computed colored point cloud, 4 floats per pixel (x, y, z, packed rgb).
pub type RgbPointFrame<'a> = Frame<'a, f32>;

impl<'a, T> Frame<'a, T> {
    /// Wrap a host buffer with a zero timestamp and an empty format string.
    pub fn new(data: &'a [T], width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            depth: 1,
            format: "",
            stamp: Time { sec: 0, nanosec: 0 },
        }
    }

    pub fn with_stamp(mut self, stamp: Time) -> Self {
        self.stamp = stamp;
        self
    }

    pub fn with_format(mut self, depth: u32, format: &'a str) -> Self {
        self.depth = depth;
        self.format = format;
        self
    }

    /// Number of pixels described by the frame dimensions.
    #[inline]
    pub fn pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Check that the frame is non-empty and carries at least
    /// `channels` values for every pixel.
    pub fn check(&self, channels: usize) -> Result<(), Error> {
        let expected = self.pixels() * channels;
        if expected == 0 || self.data.len() < expected {
            return Err(Error::FrameSize {
                width: self.width,
                height: self.height,
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }
}

/// Projected points for one outgoing point cloud message.
///
/// Structure-of-arrays layout matching the packed formatter in
/// [`crate::formats`]. The `rgb` slot holds the four bytes written at the
/// message's rgb field offset.
#[derive(Clone, Debug, Default)]
pub struct Points {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub z: Vec<f32>,
    pub rgb: Vec<[u8; 4]>,
}

impl Points {
    /// Create a new Points structure with pre-allocated capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            x: vec![0.0; capacity],
            y: vec![0.0; capacity],
            z: vec![0.0; capacity],
            rgb: vec![[0; 4]; capacity],
        }
    }

    /// Resize every channel to `len` points, reusing the existing allocation.
    pub fn resize(&mut self, len: usize) {
        self.x.resize(len, 0.0);
        self.y.resize(len, 0.0);
        self.z.resize(len, 0.0);
        self.rgb.resize(len, [0; 4]);
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// True when no point carries a NaN coordinate.
    pub fn is_dense(&self) -> bool {
        self.x
            .iter()
            .zip(&self.y)
            .zip(&self.z)
            .all(|((x, y), z)| !x.is_nan() && !y.is_nan() && !z.is_nan())
    }
}

/// Common error type for depth camera operations.
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),
    /// System time error
    SystemTime(std::time::SystemTimeError),
    /// Configuration error
    Config(String),
    /// CDR serialization error
    Serialization(cdr::Error),
    /// Frame buffer does not match its declared dimensions
    FrameSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::SystemTime(err) => write!(f, "system time error: {}", err),
            Error::Config(msg) => write!(f, "configuration error: {}", msg),
            Error::Serialization(err) => write!(f, "serialization error: {}", err),
            Error::FrameSize {
                width,
                height,
                expected,
                actual,
            } => write!(
                f,
                "frame {}x{} needs {} samples but has {}",
                width, height, expected, actual
            ),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<std::time::SystemTimeError> for Error {
    fn from(err: std::time::SystemTimeError) -> Self {
        Error::SystemTime(err)
    }
}

impl From<cdr::Error> for Error {
    fn from(err: cdr::Error) -> Self {
        Error::Serialization(err)
    }
}

/// Pinhole focal length in pixels for an image `width` pixels wide with the
/// given horizontal field of view (radians). Used for both axes.
#[inline]
pub fn focal_length(width: u32, hfov: f64) -> f64 {
    width as f64 / (2.0 * (hfov / 2.0).tan())
}

/// Time as signed nanoseconds.
#[inline]
pub fn time_nanos(time: &Time) -> i64 {
    time.sec as i64 * 1_000_000_000 + time.nanosec as i64
}

/// Build the camera info for a `width` x `height` pinhole camera without
/// distortion, principal point at the image center.
pub fn camera_info(header: Header, width: u32, height: u32, hfov: f64) -> CameraInfo {
    let fl = focal_length(width, hfov);
    let cx = (width as f64 + 1.0) / 2.0;
    let cy = (height as f64 + 1.0) / 2.0;

    CameraInfo {
        header,
        height,
        width,
        distortion_model: String::from("plumb_bob"),
        d: vec![0.0; 5],
        k: [fl, 0.0, cx, 0.0, fl, cy, 0.0, 0.0, 1.0],
        r: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        p: [fl, 0.0, cx, 0.0, 0.0, fl, cy, 0.0, 0.0, 0.0, 1.0, 0.0],
        binning_x: 0,
        binning_y: 0,
        roi: RegionOfInterest {
            x_offset: 0,
            y_offset: 0,
            height: 0,
            width: 0,
            do_rectify: false,
        },
    }
}

/// Get current timestamp.
///
/// On Linux, uses `CLOCK_MONOTONIC_RAW` for best accuracy.
/// On other platforms, falls back to `SystemTime`.
#[cfg(target_os = "linux")]
pub fn timestamp() -> Result<Time, Error> {
    let mut tp = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    let err = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC_RAW, &mut tp) };
    if err != 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    Ok(Time {
        sec: tp.tv_sec as i32,
        nanosec: tp.tv_nsec as u32,
    })
}

#[cfg(not(target_os = "linux"))]
pub fn timestamp() -> Result<Time, Error> {
    let now = std::time::SystemTime::now();
    let duration = now.duration_since(std::time::UNIX_EPOCH)?;
    Ok(Time {
        sec: duration.as_secs() as i32,
        nanosec: duration.subsec_nanos(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_frame_check() {
        let data = [0.0f32; 6];
        assert!(Frame::new(&data, 3, 2).check(1).is_ok());
        assert!(Frame::new(&data, 3, 2).check(4).is_err());
        assert!(Frame::new(&data, 0, 2).check(1).is_err());
        assert!(Frame::new(&data[..0], 0, 0).check(1).is_err());
    }

    #[test]
    fn test_focal_length_90_degrees() {
        let fl = focal_length(2, std::f64::consts::FRAC_PI_2);
        assert!((fl - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_points_dense() {
        let mut points = Points::new(3);
        assert!(points.is_dense());
        points.y[1] = f32::NAN;
        assert!(!points.is_dense());
        points.resize(1);
        assert_eq!(points.len(), 1);
        assert!(points.is_dense());
    }

    #[test]
    fn test_camera_info_intrinsics() {
        let header = Header {
            stamp: Time { sec: 1, nanosec: 0 },
            frame_id: String::from("camera"),
        };
        let info = camera_info(header, 640, 480, std::f64::consts::FRAC_PI_2);
        assert_eq!(info.width, 640);
        assert_eq!(info.height, 480);
        assert_relative_eq!(info.k[0], 320.0, epsilon = 1e-9);
        assert_relative_eq!(info.k[4], 320.0, epsilon = 1e-9);
        assert_eq!(info.k[2], 320.5);
        assert_eq!(info.k[5], 240.5);
        assert_eq!(info.distortion_model, "plumb_bob");
    }

    #[test]
    fn test_time_nanos() {
        let t = Time {
            sec: 2,
            nanosec: 500,
        };
        assert_eq!(time_nanos(&t), 2_000_000_500);
    }
}
