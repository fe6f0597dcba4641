// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Synthetic depth camera used by the publisher binary.
//!
//! Renders a floor plane 1.2 m below the camera and a sphere bobbing in front
//! of it. Depth is the distance along the optical axis, matching what the
//! projection expects; rays that hit nothing get a sample of 0 (invalid).

use edgefirst_schemas::builtin_interfaces::Time;
use nalgebra::Vector3;

const FLOOR_HEIGHT: f64 = 1.2;
const FLOOR_TILT: f64 = 0.05;
const SPHERE_RADIUS: f64 = 0.6;
const MAX_RANGE: f64 = 12.0;

/// One rendered capture, every buffer row-major `width x height`.
pub struct SceneFrame {
    pub width: u32,
    pub height: u32,
    pub stamp: Time,
    pub depth: Vec<f32>,
    /// `x, y, z, 0` per pixel.
    pub normals: Vec<f32>,
    /// RGB8.
    pub color: Vec<u8>,
    pub reflectance: Vec<f32>,
}

pub struct Scene {
    width: u32,
    height: u32,
    fl: f64,
    frame: u64,
}

impl Scene {
    pub fn new(width: u32, height: u32, hfov: f64) -> Self {
        Self {
            width,
            height,
            fl: edgefirst_depthcam::camera::focal_length(width, hfov),
            frame: 0,
        }
    }

    pub fn render(&mut self, stamp: Time) -> SceneFrame {
        let pixels = self.width as usize * self.height as usize;
        let mut out = SceneFrame {
            width: self.width,
            height: self.height,
            stamp,
            depth: vec![0.0; pixels],
            normals: vec![0.0; pixels * 4],
            color: vec![0; pixels * 3],
            reflectance: vec![0.0; pixels],
        };

        let t = self.frame as f64 * 0.05;
        self.frame += 1;
        let center = Vector3::new(0.8 * t.sin(), 0.4, 3.0 + 0.5 * (0.7 * t).cos());

        for j in 0..self.height as usize {
            let b = (j as f64 - 0.5 * (self.height as f64 - 1.0)) / self.fl;
            for i in 0..self.width as usize {
                let a = (i as f64 - 0.5 * (self.width as f64 - 1.0)) / self.fl;
                let ray = Vector3::new(a, b, 1.0);
                let index = j * self.width as usize + i;

                let hit = [sphere_hit(&ray, &center), floor_hit(&ray)]
                    .into_iter()
                    .flatten()
                    .filter(|hit| hit.0 < MAX_RANGE)
                    .min_by(|x, y| x.0.total_cmp(&y.0));

                let Some((d, normal, rgb)) = hit else {
                    out.color[index * 3..index * 3 + 3].copy_from_slice(&[20, 20, 30]);
                    continue;
                };

                let shade = normal.dot(&-ray.normalize()).max(0.0);
                out.depth[index] = d as f32;
                out.normals[index * 4] = normal.x as f32;
                out.normals[index * 4 + 1] = normal.y as f32;
                out.normals[index * 4 + 2] = normal.z as f32;
                out.reflectance[index] = shade as f32;
                for (c, base) in out.color[index * 3..index * 3 + 3].iter_mut().zip(rgb) {
                    *c = (base as f64 * (0.3 + 0.7 * shade)) as u8;
                }
            }
        }

        out
    }
}

/// Depth along the optical axis, surface normal and base color.
type Hit = (f64, Vector3<f64>, [u8; 3]);

fn sphere_hit(ray: &Vector3<f64>, center: &Vector3<f64>) -> Option<Hit> {
    let uu = ray.dot(ray);
    let uc = ray.dot(center);
    let disc = uc * uc - uu * (center.dot(center) - SPHERE_RADIUS * SPHERE_RADIUS);
    if disc < 0.0 {
        return None;
    }
    let s = (uc - disc.sqrt()) / uu;
    if s <= 0.0 {
        return None;
    }
    let normal = (ray * s - center).normalize();
    Some((s, normal, [220, 60, 40]))
}

fn floor_hit(ray: &Vector3<f64>) -> Option<Hit> {
    // Plane y = FLOOR_HEIGHT - FLOOR_TILT * z, rising away from the camera.
    let denom = ray.y + FLOOR_TILT;
    if denom <= 0.0 {
        return None;
    }
    let s = FLOOR_HEIGHT / denom;
    let normal = Vector3::new(0.0, -1.0, -FLOOR_TILT).normalize();
    let (x, z) = (ray.x * s, s);
    let checker = ((x.floor() as i64 + z.floor() as i64) & 1) == 0;
    let rgb = if checker { [200, 200, 200] } else { [90, 90, 90] };
    Some((s, normal, rgb))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_dimensions() {
        let mut scene = Scene::new(32, 24, std::f64::consts::FRAC_PI_3);
        let frame = scene.render(Time { sec: 1, nanosec: 0 });
        assert_eq!(frame.depth.len(), 32 * 24);
        assert_eq!(frame.normals.len(), 32 * 24 * 4);
        assert_eq!(frame.color.len(), 32 * 24 * 3);

        // The center ray hits the sphere, the bottom row hits the floor.
        let center = 12 * 32 + 16;
        assert!(frame.depth[center] > 2.0 && frame.depth[center] < 4.0);
        assert!(frame.depth[23 * 32 + 16] > 0.0);
        // Top rows look above the horizon.
        assert_eq!(frame.depth[0], 0.0);
    }
}
