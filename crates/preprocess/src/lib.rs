pub mod config;
pub mod cpu;

use ndarray::{Array, IxDyn};
use std::str::FromStr;

pub use config::{DEFAULT_INPUT_SIZE, IMAGENET_MEAN, IMAGENET_STD, SYMMETRIC_MEAN, SYMMETRIC_STD};
pub use cpu::CpuPreProcessor;

/// Memory order of the model input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
    /// `[1, H, W, 3]`, the TensorFlow convention.
    Nhwc,
    /// `[1, 3, H, W]`, the PyTorch convention.
    Nchw,
}

/// How the source image is fitted into the model input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeMode {
    /// Scale each axis independently to fill the input.
    #[default]
    Stretch,
    /// Preserve aspect ratio and pad the remainder with a gray border.
    Letterbox,
}

impl FromStr for ResizeMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "stretch" => Ok(ResizeMode::Stretch),
            "letterbox" => Ok(ResizeMode::Letterbox),
            other => Err(format!("unknown resize mode '{other}' (stretch, letterbox)")),
        }
    }
}

/// Element encoding of the model input tensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PixelEncoding {
    /// f32 values computed as `(v / 255 - mean) / std` per channel.
    Normalized { mean: [f32; 3], std: [f32; 3] },
    /// Raw u8 pixel values, for quantized models.
    Raw,
}

/// Everything the preprocessor needs to know about a model input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputSpec {
    pub size: (u32, u32),
    pub layout: TensorLayout,
    pub encoding: PixelEncoding,
    pub resize: ResizeMode,
}

impl Default for InputSpec {
    fn default() -> Self {
        Self {
            size: DEFAULT_INPUT_SIZE,
            layout: TensorLayout::Nchw,
            encoding: PixelEncoding::Normalized {
                mean: IMAGENET_MEAN,
                std: IMAGENET_STD,
            },
            resize: ResizeMode::Stretch,
        }
    }
}

impl InputSpec {
    /// Tensor shape this spec produces.
    pub fn shape(&self) -> [usize; 4] {
        let (width, height) = (self.size.0 as usize, self.size.1 as usize);
        match self.layout {
            TensorLayout::Nhwc => [1, height, width, 3],
            TensorLayout::Nchw => [1, 3, height, width],
        }
    }
}

/// Preprocessed tensor, typed by what the model consumes.
#[derive(Debug)]
pub enum PreprocessOutput {
    Float(Array<f32, IxDyn>),
    Quantized(Array<u8, IxDyn>),
}

impl PreprocessOutput {
    pub fn shape(&self) -> &[usize] {
        match self {
            PreprocessOutput::Float(arr) => arr.shape(),
            PreprocessOutput::Quantized(arr) => arr.shape(),
        }
    }
}

/// Result of preprocessing including transformation parameters
#[derive(Debug)]
pub struct PreprocessResult {
    /// Preprocessed image data
    pub data: PreprocessOutput,
    /// Horizontal scale factor from source to model input
    pub scale_x: f32,
    /// Vertical scale factor from source to model input
    pub scale_y: f32,
    /// X offset from letterboxing (in pixels)
    pub offset_x: f32,
    /// Y offset from letterboxing (in pixels)
    pub offset_y: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_mode_from_str() {
        assert_eq!("stretch".parse(), Ok(ResizeMode::Stretch));
        assert_eq!(" Letterbox ".parse(), Ok(ResizeMode::Letterbox));
        assert!("crop".parse::<ResizeMode>().is_err());
    }

    #[test]
    fn test_shape_follows_layout() {
        let spec = InputSpec {
            size: (320, 240),
            layout: TensorLayout::Nhwc,
            ..InputSpec::default()
        };
        assert_eq!(spec.shape(), [1, 240, 320, 3]);
        assert_eq!(InputSpec::default().shape(), [1, 3, 224, 224]);
    }
}
