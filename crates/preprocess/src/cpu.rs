use crate::config::LETTERBOX_COLOR;
use crate::{
    InputSpec, PixelEncoding, PreprocessOutput, PreprocessResult, ResizeMode, TensorLayout,
};
use common::span;
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use ndarray::{Array, IxDyn};

pub struct CpuPreProcessor {
    pub spec: InputSpec,
    resizer: Resizer,
    letterboxed_buffer: Vec<u8>,
}

/// Geometry of a resize into the model input.
struct Placement {
    scale_x: f32,
    scale_y: f32,
    offset_x: u32,
    offset_y: u32,
    width: u32,
    height: u32,
}

impl CpuPreProcessor {
    pub fn new(spec: InputSpec) -> Self {
        let (w, h) = spec.size;
        Self {
            spec,
            resizer: Resizer::new(),
            letterboxed_buffer: vec![LETTERBOX_COLOR; (w * h * 3) as usize],
        }
    }

    pub fn preprocess_rgb(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> anyhow::Result<PreprocessResult> {
        let _s = span!("preprocess_rgb");

        tracing::trace!(
            width,
            height,
            pixel_bytes = pixels.len(),
            "Preprocessing image dimensions"
        );

        if width == 0 || height == 0 {
            anyhow::bail!("Cannot preprocess an empty {}x{} image", width, height);
        }

        let expected_size = (width * height * 3) as usize;
        if pixels.len() != expected_size {
            anyhow::bail!(
                "Buffer size mismatch: expected {}, got {} bytes",
                expected_size,
                pixels.len()
            );
        }

        let placement = self.resize_into_input(pixels, width, height)?;

        let data = match self.spec.encoding {
            PixelEncoding::Normalized { mean, std } => PreprocessOutput::Float(
                Self::normalize(&self.letterboxed_buffer, &self.spec, mean, std)?,
            ),
            PixelEncoding::Raw => {
                PreprocessOutput::Quantized(Self::reorder(&self.letterboxed_buffer, &self.spec)?)
            }
        };

        Ok(PreprocessResult {
            data,
            scale_x: placement.scale_x,
            scale_y: placement.scale_y,
            offset_x: placement.offset_x as f32,
            offset_y: placement.offset_y as f32,
        })
    }

    fn resize_into_input(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> anyhow::Result<Placement> {
        let _s = span!("resize_into_input");

        let (input_w, input_h) = self.spec.size;

        let placement = match self.spec.resize {
            ResizeMode::Stretch => Placement {
                scale_x: input_w as f32 / width as f32,
                scale_y: input_h as f32 / height as f32,
                offset_x: 0,
                offset_y: 0,
                width: input_w,
                height: input_h,
            },
            ResizeMode::Letterbox => {
                let scale = (input_w as f32 / width as f32).min(input_h as f32 / height as f32);
                let new_width = ((width as f32 * scale) as u32).clamp(1, input_w);
                let new_height = ((height as f32 * scale) as u32).clamp(1, input_h);
                Placement {
                    scale_x: scale,
                    scale_y: scale,
                    offset_x: (input_w - new_width) / 2,
                    offset_y: (input_h - new_height) / 2,
                    width: new_width,
                    height: new_height,
                }
            }
        };

        let (new_width, new_height) = (placement.width, placement.height);

        let src = ImageRef::new(width, height, pixels, PixelType::U8x3)?;
        let mut resized = Image::new(new_width, new_height, PixelType::U8x3);

        self.resizer.resize(
            &src,
            &mut resized,
            &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
        )?;

        self.letterboxed_buffer.fill(LETTERBOX_COLOR);

        let resized_data = resized.buffer();
        let stride = input_w * 3;
        let row_bytes = (new_width * 3) as usize;

        for y in 0..new_height {
            let src_row = (y * new_width * 3) as usize;
            let dst_row = ((y + placement.offset_y) * stride + placement.offset_x * 3) as usize;

            self.letterboxed_buffer[dst_row..dst_row + row_bytes]
                .copy_from_slice(&resized_data[src_row..src_row + row_bytes]);
        }

        Ok(placement)
    }

    fn normalize(
        buf: &[u8],
        spec: &InputSpec,
        mean: [f32; 3],
        std: [f32; 3],
    ) -> anyhow::Result<Array<f32, IxDyn>> {
        let _s = span!("normalize");

        let spatial = (spec.size.0 * spec.size.1) as usize;
        let mut output = vec![0.0f32; 3 * spatial];

        for (i, px) in buf.chunks_exact(3).enumerate() {
            for c in 0..3 {
                let value = (px[c] as f32 / 255.0 - mean[c]) / std[c];
                output[Self::index(spec.layout, spatial, i, c)] = value;
            }
        }

        Ok(Array::from_shape_vec(IxDyn(&spec.shape()), output)?)
    }

    fn reorder(buf: &[u8], spec: &InputSpec) -> anyhow::Result<Array<u8, IxDyn>> {
        let _s = span!("reorder");

        let output = match spec.layout {
            TensorLayout::Nhwc => buf.to_vec(),
            TensorLayout::Nchw => {
                let spatial = (spec.size.0 * spec.size.1) as usize;
                let mut planar = vec![0u8; 3 * spatial];
                for (i, px) in buf.chunks_exact(3).enumerate() {
                    for c in 0..3 {
                        planar[c * spatial + i] = px[c];
                    }
                }
                planar
            }
        };

        Ok(Array::from_shape_vec(IxDyn(&spec.shape()), output)?)
    }

    #[inline]
    fn index(layout: TensorLayout, spatial: usize, pixel: usize, channel: usize) -> usize {
        match layout {
            TensorLayout::Nhwc => pixel * 3 + channel,
            TensorLayout::Nchw => channel * spatial + pixel,
        }
    }
}

impl Default for CpuPreProcessor {
    fn default() -> Self {
        Self::new(InputSpec::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IMAGENET_MEAN, IMAGENET_STD, SYMMETRIC_MEAN, SYMMETRIC_STD};

    fn spec(
        size: (u32, u32),
        layout: TensorLayout,
        encoding: PixelEncoding,
        resize: ResizeMode,
    ) -> InputSpec {
        InputSpec {
            size,
            layout,
            encoding,
            resize,
        }
    }

    fn float_data(result: PreprocessResult) -> Array<f32, IxDyn> {
        match result.data {
            PreprocessOutput::Float(arr) => arr,
            PreprocessOutput::Quantized(_) => panic!("Expected float output"),
        }
    }

    /// Test RGB preprocessing to the default NCHW input
    #[test]
    fn test_rgb_preprocessing() {
        let pixels = vec![
            255, 0, 0, // Red pixel
            0, 255, 0, // Green pixel
            0, 0, 255, // Blue pixel
            255, 255, 255, // White pixel
        ];

        let mut preprocessor = CpuPreProcessor::default();
        let result = preprocessor.preprocess_rgb(&pixels, 2, 2);

        assert!(result.is_ok(), "RGB preprocessing should succeed");
        let output = float_data(result.unwrap());
        assert_eq!(output.shape(), &[1, 3, 224, 224]);
    }

    /// Test buffer size mismatch detection
    #[test]
    fn test_buffer_size_mismatch_detection() {
        let pixels = vec![0u8; 200]; // Wrong size for 10x10

        let mut preprocessor = CpuPreProcessor::default();
        let result = preprocessor.preprocess_rgb(&pixels, 10, 10);

        assert!(result.is_err(), "Size mismatch should return error");
        assert!(
            result.unwrap_err().to_string().contains("mismatch"),
            "Error should mention mismatch"
        );
    }

    #[test]
    fn test_empty_image_rejected() {
        let mut preprocessor = CpuPreProcessor::default();
        let result = preprocessor.preprocess_rgb(&[], 0, 10);
        assert!(result.is_err(), "Zero-width image should be rejected");
    }

    /// Test letterboxing preserves aspect ratio
    #[test]
    fn test_letterboxing_preserves_aspect_ratio() {
        // 800x600 image (4:3 aspect ratio)
        let pixels = vec![128u8; 800 * 600 * 3];

        let mut preprocessor = CpuPreProcessor::new(spec(
            (512, 512),
            TensorLayout::Nchw,
            PixelEncoding::Normalized {
                mean: IMAGENET_MEAN,
                std: IMAGENET_STD,
            },
            ResizeMode::Letterbox,
        ));
        let result = preprocessor.preprocess_rgb(&pixels, 800, 600).unwrap();

        // Scale should be min(512/800, 512/600) = 512/800 = 0.64
        assert_eq!(result.scale_x, 0.64, "Scale should preserve aspect ratio");
        assert_eq!(result.scale_y, 0.64, "Scale should be uniform");

        // Resized dimensions: 800*0.64 = 512, 600*0.64 = 384
        // Offset Y: (512 - 384) / 2 = 64
        assert_eq!(result.offset_x, 0.0, "X offset should be 0 for wide image");
        assert_eq!(result.offset_y, 64.0, "Y offset should center vertically");

        assert_eq!(result.data.shape(), &[1, 3, 512, 512]);
    }

    /// Stretch fills the whole input and scales axes independently
    #[test]
    fn test_stretch_scales_axes_independently() {
        let pixels = vec![200u8; 448 * 112 * 3];

        let mut preprocessor = CpuPreProcessor::new(spec(
            (224, 224),
            TensorLayout::Nhwc,
            PixelEncoding::Raw,
            ResizeMode::Stretch,
        ));
        let result = preprocessor.preprocess_rgb(&pixels, 448, 112).unwrap();

        assert_eq!(result.scale_x, 0.5);
        assert_eq!(result.scale_y, 2.0);
        assert_eq!(result.offset_x, 0.0);
        assert_eq!(result.offset_y, 0.0);

        match result.data {
            PreprocessOutput::Quantized(arr) => {
                assert_eq!(arr.shape(), &[1, 224, 224, 3]);
                // No letterbox border anywhere
                assert!(arr.iter().all(|&v| v > 190), "Stretch should not pad");
            }
            PreprocessOutput::Float(_) => panic!("Raw encoding should produce u8 output"),
        }
    }

    /// Test ImageNet normalization is applied
    #[test]
    fn test_imagenet_normalization() {
        // Create image with known pixel values (128, 128, 128 = mid gray)
        let pixels = vec![128u8; 2 * 2 * 3];

        let mut preprocessor = CpuPreProcessor::default();
        let output = float_data(preprocessor.preprocess_rgb(&pixels, 2, 2).unwrap());

        // For gray 128 (0.502) with ImageNet norm:
        //   R: (0.502 - 0.485) / 0.229 ≈ 0.074
        //   G: (0.502 - 0.456) / 0.224 ≈ 0.205
        //   B: (0.502 - 0.406) / 0.225 ≈ 0.427
        let r = output[[0, 0, 112, 112]];
        let g = output[[0, 1, 112, 112]];
        let b = output[[0, 2, 112, 112]];

        assert!((r - 0.074).abs() < 0.1, "R channel should be ~0.074 (got {})", r);
        assert!((g - 0.205).abs() < 0.1, "G channel should be ~0.205 (got {})", g);
        assert!((b - 0.427).abs() < 0.1, "B channel should be ~0.427 (got {})", b);
    }

    /// NHWC keeps channels interleaved
    #[test]
    fn test_nhwc_layout_interleaves_channels() {
        // Solid red image
        let pixels: Vec<u8> = (0..4 * 4).flat_map(|_| [255u8, 0, 0]).collect();

        let mut preprocessor = CpuPreProcessor::new(spec(
            (4, 4),
            TensorLayout::Nhwc,
            PixelEncoding::Normalized {
                mean: SYMMETRIC_MEAN,
                std: SYMMETRIC_STD,
            },
            ResizeMode::Stretch,
        ));
        let output = float_data(preprocessor.preprocess_rgb(&pixels, 4, 4).unwrap());

        assert_eq!(output.shape(), &[1, 4, 4, 3]);
        // (255 - 127) / 128 = 1.0, (0 - 127) / 128 ≈ -0.992
        assert!((output[[0, 2, 2, 0]] - 1.0).abs() < 0.02);
        assert!((output[[0, 2, 2, 1]] + 0.992).abs() < 0.02);
        assert!((output[[0, 2, 2, 2]] + 0.992).abs() < 0.02);
    }
}
