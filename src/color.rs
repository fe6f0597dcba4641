// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Color fusion: attach the last captured color image to projected points.
//!
//! Color and depth are captured by the same camera with the same resolution,
//! so the pixel at flat index `j * W + i` of the depth grid takes its color
//! from the same pixel of the color image. The buffer layout is inferred from
//! its length; any length that is neither RGB8 nor mono is treated as "no
//! color" and produces black points.

use crate::camera::Points;

/// Layout of a cached color buffer relative to the depth grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorLayout {
    /// 3 bytes per pixel.
    Rgb,
    /// 1 byte per pixel, replicated into all three channels.
    Mono,
    /// Absent or mismatched buffer.
    Missing,
}

impl ColorLayout {
    /// Infer the layout of a `len`-byte buffer for a `width` x `height` grid.
    pub fn detect(len: Option<usize>, width: u32, height: u32) -> Self {
        let pixels = width as usize * height as usize;
        match len {
            Some(len) if pixels > 0 && len == pixels * 3 => ColorLayout::Rgb,
            Some(len) if pixels > 0 && len == pixels => ColorLayout::Mono,
            _ => ColorLayout::Missing,
        }
    }
}

/// Last color image seen by the engine.
#[derive(Clone, Debug, Default)]
pub struct CachedColor {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl CachedColor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached image, reusing the existing allocation.
    pub fn store(&mut self, data: &[u8], width: u32, height: u32) {
        self.data.clear();
        self.data.extend_from_slice(data);
        self.width = width;
        self.height = height;
    }

    pub fn data(&self) -> Option<&[u8]> {
        if self.data.is_empty() {
            None
        } else {
            Some(self.data.as_slice())
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Fill the rgb slot of every point from `color`.
///
/// `points` must hold `width * height` points in row-major order. The fourth
/// byte of each rgb slot is always zero.
pub fn fuse(color: Option<&[u8]>, width: u32, height: u32, points: &mut Points) -> ColorLayout {
    let cols = width as usize;
    let rows = height as usize;
    debug_assert_eq!(points.len(), cols * rows);

    let layout = ColorLayout::detect(color.map(<[u8]>::len), width, height);
    match (layout, color) {
        (ColorLayout::Rgb, Some(src)) => {
            for j in 0..rows {
                for i in 0..cols {
                    let offset = i * 3 + j * cols * 3;
                    points.rgb[j * cols + i] = [src[offset], src[offset + 1], src[offset + 2], 0];
                }
            }
        }
        (ColorLayout::Mono, Some(src)) => {
            for j in 0..rows {
                for i in 0..cols {
                    let value = src[i + j * cols];
                    points.rgb[j * cols + i] = [value, value, value, 0];
                }
            }
        }
        _ => points.rgb.iter_mut().for_each(|rgb| *rgb = [0; 4]),
    }

    layout
}
