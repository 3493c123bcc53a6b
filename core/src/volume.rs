use image::DynamicImage;
use thiserror::Error;

/// Luma weights applied to captured RGB frames before they reach the network.
const LUMA_WEIGHTS: [f32; 3] = [0.2989, 0.5870, 0.1140];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VolumeError {
    #[error("{buffer} buffer holds {actual} values but a {sx}x{sy}x{depth} volume needs {expected}")]
    ShapeMismatch {
        buffer: &'static str,
        sx: usize,
        sy: usize,
        depth: usize,
        expected: usize,
        actual: usize,
    },
}

/// Read-only view of a shape-tagged activation buffer with a parallel gradient buffer.
///
/// Values are laid out x-fastest within a row and depth-fastest within a cell,
/// so `(x, y, d)` lives at `((sx * y) + x) * depth + d` in both `w` and `dw`.
/// Implementations must keep `w().len() == dw().len() == sx * sy * depth`.
pub trait Volume {
    fn sx(&self) -> usize;
    fn sy(&self) -> usize;
    fn depth(&self) -> usize;
    fn w(&self) -> &[f32];
    fn dw(&self) -> &[f32];

    fn len(&self) -> usize {
        self.sx() * self.sy() * self.depth()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn index(&self, x: usize, y: usize, d: usize) -> usize {
        ((self.sx() * y) + x) * self.depth() + d
    }

    fn get(&self, x: usize, y: usize, d: usize) -> f32 {
        self.w()[self.index(x, y, d)]
    }

    fn get_grad(&self, x: usize, y: usize, d: usize) -> f32 {
        self.dw()[self.index(x, y, d)]
    }

    /// Selects the gradient buffer when `gradients` is set, the values otherwise.
    fn buffer(&self, gradients: bool) -> &[f32] {
        if gradients {
            self.dw()
        } else {
            self.w()
        }
    }

    fn is_well_formed(&self) -> bool {
        self.w().len() == self.len() && self.dw().len() == self.len()
    }
}

/// In-memory volume. Constructors reject buffers whose length disagrees with the shape.
#[derive(Clone, Debug, PartialEq)]
pub struct Vol {
    sx: usize,
    sy: usize,
    depth: usize,
    w: Vec<f32>,
    dw: Vec<f32>,
}

impl Vol {
    pub fn zeros(sx: usize, sy: usize, depth: usize) -> Self {
        Self::filled(sx, sy, depth, 0.0)
    }

    pub fn filled(sx: usize, sy: usize, depth: usize, value: f32) -> Self {
        let len = sx * sy * depth;
        Self {
            sx,
            sy,
            depth,
            w: vec![value; len],
            dw: vec![0.0; len],
        }
    }

    /// Wraps activation values; the gradient buffer starts zeroed.
    pub fn from_values(
        sx: usize,
        sy: usize,
        depth: usize,
        w: Vec<f32>,
    ) -> Result<Self, VolumeError> {
        let dw = vec![0.0; w.len()];
        Self::from_parts(sx, sy, depth, w, dw)
    }

    pub fn from_parts(
        sx: usize,
        sy: usize,
        depth: usize,
        w: Vec<f32>,
        dw: Vec<f32>,
    ) -> Result<Self, VolumeError> {
        let expected = sx * sy * depth;
        for (buffer, actual) in [("value", w.len()), ("gradient", dw.len())] {
            if actual != expected {
                return Err(VolumeError::ShapeMismatch {
                    buffer,
                    sx,
                    sy,
                    depth,
                    expected,
                    actual,
                });
            }
        }

        Ok(Self {
            sx,
            sy,
            depth,
            w,
            dw,
        })
    }

    /// Depth-3 volume holding the image's RGB channels scaled into [0, 1].
    pub fn from_rgb_image(image: &DynamicImage) -> Self {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        let w = rgb
            .pixels()
            .flat_map(|pixel| pixel.0.map(|channel| f32::from(channel) / 255.0))
            .collect::<Vec<_>>();
        let dw = vec![0.0; w.len()];

        Self {
            sx: width as usize,
            sy: height as usize,
            depth: 3,
            w,
            dw,
        }
    }

    /// Depth-1 volume of perceptual luminance in [0, 1], the way camera frames are captured.
    pub fn from_luma_image(image: &DynamicImage) -> Self {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        let w = rgb
            .pixels()
            .map(|pixel| {
                pixel
                    .0
                    .iter()
                    .zip(LUMA_WEIGHTS)
                    .map(|(&channel, weight)| weight * f32::from(channel))
                    .sum::<f32>()
                    / 255.0
            })
            .collect::<Vec<_>>();
        let dw = vec![0.0; w.len()];

        Self {
            sx: width as usize,
            sy: height as usize,
            depth: 1,
            w,
            dw,
        }
    }

    pub fn set(&mut self, x: usize, y: usize, d: usize, value: f32) {
        let index = self.index(x, y, d);
        self.w[index] = value;
    }

    pub fn set_grad(&mut self, x: usize, y: usize, d: usize, value: f32) {
        let index = self.index(x, y, d);
        self.dw[index] = value;
    }

    pub fn w_mut(&mut self) -> &mut [f32] {
        &mut self.w
    }

    pub fn dw_mut(&mut self) -> &mut [f32] {
        &mut self.dw
    }
}

impl Volume for Vol {
    fn sx(&self) -> usize {
        self.sx
    }

    fn sy(&self) -> usize {
        self.sy
    }

    fn depth(&self) -> usize {
        self.depth
    }

    fn w(&self) -> &[f32] {
        &self.w
    }

    fn dw(&self) -> &[f32] {
        &self.dw
    }
}
