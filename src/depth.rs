// src/depth.rs - Depth buffer sampling
use crate::error::DepthError;
use nalgebra::Point2;
use std::sync::RwLock;

/// Layout of a pixel buffer handed over by the depth provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Single-channel 32-bit float depth in meters.
    DepthFloat32,
    /// Single-channel 16-bit float depth.
    DepthFloat16,
    /// Single-channel 32-bit float disparity (1 / meters).
    DisparityFloat32,
    /// Anything else, e.g. a color or confidence buffer handed over by mistake.
    Other(u32),
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::DepthFloat32 | PixelFormat::DisparityFloat32 => 4,
            PixelFormat::DepthFloat16 => 2,
            PixelFormat::Other(_) => 4,
        }
    }
}

/// A read-mostly grid of depth values addressed by normalized image
/// coordinates (0,0 top-left, 1,1 bottom-right).
///
/// Storage sits behind a lock so a provider can refill the same buffer in
/// place between frames; samplers only ever take the read side.
#[derive(Debug)]
pub struct DepthBuffer {
    width: usize,
    height: usize,
    format: PixelFormat,
    bytes: RwLock<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BufferPosition {
    column: usize,
    row: usize,
}

impl DepthBuffer {
    pub fn from_depths(width: usize, height: usize, depths: &[f32]) -> Result<Self, DepthError> {
        let expected = width * height;
        if depths.len() != expected {
            return Err(DepthError::SizeMismatch {
                expected: expected * 4,
                actual: depths.len() * 4,
            });
        }

        let bytes = depths.iter().flat_map(|d| d.to_ne_bytes()).collect();
        Ok(Self {
            width,
            height,
            format: PixelFormat::DepthFloat32,
            bytes: RwLock::new(bytes),
        })
    }

    pub fn filled(width: usize, height: usize, depth: f32) -> Self {
        let bytes = std::iter::repeat(depth.to_ne_bytes())
            .take(width * height)
            .flatten()
            .collect();
        Self {
            width,
            height,
            format: PixelFormat::DepthFloat32,
            bytes: RwLock::new(bytes),
        }
    }

    /// Wraps raw provider bytes in any format. Sampling checks the format.
    pub fn from_raw(width: usize, height: usize, format: PixelFormat, bytes: Vec<u8>) -> Result<Self, DepthError> {
        let expected = width * height * format.bytes_per_pixel();
        if bytes.len() != expected {
            return Err(DepthError::SizeMismatch {
                expected,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            bytes: RwLock::new(bytes),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Overwrites the buffer contents in place.
    pub fn write_depths(&self, depths: &[f32]) -> Result<(), DepthError> {
        self.ensure_depth_format()?;
        let expected = self.width * self.height;
        if depths.len() != expected {
            return Err(DepthError::SizeMismatch {
                expected: expected * 4,
                actual: depths.len() * 4,
            });
        }

        let mut bytes = self.bytes.write().map_err(|_| DepthError::LockPoisoned)?;
        for (chunk, depth) in bytes.chunks_exact_mut(4).zip(depths) {
            chunk.copy_from_slice(&depth.to_ne_bytes());
        }
        Ok(())
    }

    /// Depth at a single normalized point.
    pub fn sample(&self, point: Point2<f32>) -> Result<f32, DepthError> {
        self.ensure_depth_format()?;
        let position = self.buffer_position(point)?;

        let bytes = self.bytes.read().map_err(|_| DepthError::LockPoisoned)?;
        Ok(self.load(&bytes, position))
    }

    /// Depths at many normalized points, taking the read lock once.
    ///
    /// The outer error covers the whole buffer (wrong format, poisoned lock);
    /// per-point results carry `OutOfBounds` so one bad coordinate does not
    /// discard the rest of the batch.
    pub fn sample_many(&self, points: &[Point2<f32>]) -> Result<Vec<Result<f32, DepthError>>, DepthError> {
        self.ensure_depth_format()?;

        let positions: Vec<_> = points.iter().map(|p| self.buffer_position(*p)).collect();

        let bytes = self.bytes.read().map_err(|_| DepthError::LockPoisoned)?;
        let values = positions
            .into_iter()
            .map(|position| position.map(|position| self.load(&bytes, position)))
            .collect();

        Ok(values)
    }

    fn ensure_depth_format(&self) -> Result<(), DepthError> {
        match self.format {
            PixelFormat::DepthFloat32 => Ok(()),
            other => Err(DepthError::DepthUnavailable(other)),
        }
    }

    fn buffer_position(&self, point: Point2<f32>) -> Result<BufferPosition, DepthError> {
        let out_of_bounds = || DepthError::OutOfBounds {
            x: point.x,
            y: point.y,
            width: self.width,
            height: self.height,
        };

        if !point.x.is_finite() || !point.y.is_finite() {
            return Err(out_of_bounds());
        }

        let column = (point.x * self.width as f32).floor();
        let row = (point.y * self.height as f32).floor();

        if column < 0.0 || row < 0.0 || column >= self.width as f32 || row >= self.height as f32 {
            return Err(out_of_bounds());
        }

        Ok(BufferPosition {
            column: column as usize,
            row: row as usize,
        })
    }

    fn load(&self, bytes: &[u8], position: BufferPosition) -> f32 {
        let offset = (position.column + position.row * self.width) * 4;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&bytes[offset..offset + 4]);
        f32::from_ne_bytes(raw)
    }
}
