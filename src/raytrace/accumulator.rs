//! Progressive tile scheduling
//!
//! The image is traced one tile per frame in row-major order. Every
//! completed pass over all tiles adds one sample per pixel to the running
//! average, so the picture refines while the camera stands still.

use bytemuck::{Pod, Zeroable};

use crate::config::RayTraceConfig;

/// Uniform of the `raytrace` kernel
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct RayTraceData {
    /// Origin of the tile being traced, in pixels
    pub thread_loc: [u32; 2],
    pub image_size: [u32; 2],
    /// Passes completed before this tile; the kernel weighs the new
    /// sample by it
    pub num_rendered_frames: u32,
    pub max_steps: u32,
    pub max_bounces: u32,
    pub max_rays_per_pixel: u32,
    pub max_trace_distance: f32,
    pub num_lights: u32,
    pub tile_size: u32,
    pub _padding: u32,
}

#[derive(Debug, Clone)]
pub struct Accumulator {
    data: RayTraceData,
    /// Origin of the next tile
    cursor: [u32; 2],
    completed: u32,
    rendering: bool,
}

impl Accumulator {
    pub fn new(config: &RayTraceConfig, num_lights: u32) -> Self {
        Self {
            data: RayTraceData {
                thread_loc: [0, 0],
                image_size: [0, 0],
                num_rendered_frames: 0,
                max_steps: config.max_steps,
                max_bounces: config.max_bounces,
                max_rays_per_pixel: config.max_rays_per_pixel,
                max_trace_distance: config.max_trace_distance,
                num_lights,
                tile_size: config.tile_size.max(1),
                _padding: 0,
            },
            cursor: [0, 0],
            completed: 0,
            rendering: true,
        }
    }

    /// Track a new image size. Returns true, and restarts accumulation,
    /// when the size changed.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if self.data.image_size == [width, height] {
            return false;
        }
        self.data.image_size = [width, height];
        self.reset();
        true
    }

    /// Drop every accumulated sample and start over at the first tile
    pub fn reset(&mut self) {
        self.cursor = [0, 0];
        self.completed = 0;
        self.data.thread_loc = [0, 0];
        self.data.num_rendered_frames = 0;
    }

    /// Pick the tile to trace this frame and advance. `None` when hidden,
    /// when the image is empty, or when paused between passes.
    pub fn next_tile(&mut self, visible: bool) -> Option<[u32; 2]> {
        let [width, height] = self.data.image_size;
        if !visible || width == 0 || height == 0 {
            return None;
        }
        // A paused pass runs to completion before it stops; after a reset
        // one pass is traced so the paused picture is never blank
        if !self.rendering && self.cursor == [0, 0] && self.completed > 0 {
            return None;
        }

        let tile = self.cursor;
        self.data.thread_loc = tile;
        self.data.num_rendered_frames = self.completed;

        let step = self.data.tile_size;
        self.cursor[0] += step;
        if self.cursor[0] >= width {
            self.cursor[0] = 0;
            self.cursor[1] += step;
            if self.cursor[1] >= height {
                self.cursor[1] = 0;
                self.completed += 1;
            }
        }
        Some(tile)
    }

    /// Take new trace settings. Restarts accumulation when anything that
    /// affects the picture changed; returns whether it did.
    pub fn set_params(&mut self, config: &RayTraceConfig) -> bool {
        let mut data = self.data;
        data.max_steps = config.max_steps;
        data.max_bounces = config.max_bounces;
        data.max_rays_per_pixel = config.max_rays_per_pixel;
        data.max_trace_distance = config.max_trace_distance;
        data.tile_size = config.tile_size.max(1);
        if data == self.data {
            return false;
        }
        self.data = data;
        self.reset();
        true
    }

    pub fn set_rendering(&mut self, rendering: bool) {
        self.rendering = rendering;
    }

    pub fn is_rendering(&self) -> bool {
        self.rendering
    }

    pub fn set_num_lights(&mut self, num_lights: u32) {
        self.data.num_lights = num_lights;
    }

    /// Completed passes since the last reset
    pub fn passes(&self) -> u32 {
        self.completed
    }

    pub fn tile_size(&self) -> u32 {
        self.data.tile_size
    }

    pub fn data(&self) -> &RayTraceData {
        &self.data
    }
}
