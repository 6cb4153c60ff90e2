use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use preprocess::{
    CpuPreProcessor, IMAGENET_MEAN, IMAGENET_STD, InputSpec, PixelEncoding, ResizeMode,
    TensorLayout,
};

/// Create raw pixel buffer for benchmarking (gradient pattern)
fn create_test_pixels(width: u32, height: u32) -> Vec<u8> {
    let mut pixels = vec![0u8; (width * height * 3) as usize];
    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 3) as usize;
            pixels[idx] = (x % 256) as u8; // R
            pixels[idx + 1] = (y % 256) as u8; // G
            pixels[idx + 2] = ((x + y) % 256) as u8; // B
        }
    }
    pixels
}

fn benchmark_cpu_preprocess(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpu_preprocess");

    // Typical gallery photo sizes
    let resolutions = [(640, 480), (1280, 720), (1920, 1080), (4032, 3024)];

    let specs = [
        (
            "nchw_imagenet_224",
            InputSpec {
                size: (224, 224),
                layout: TensorLayout::Nchw,
                encoding: PixelEncoding::Normalized {
                    mean: IMAGENET_MEAN,
                    std: IMAGENET_STD,
                },
                resize: ResizeMode::Stretch,
            },
        ),
        (
            "nhwc_raw_300_letterbox",
            InputSpec {
                size: (300, 300),
                layout: TensorLayout::Nhwc,
                encoding: PixelEncoding::Raw,
                resize: ResizeMode::Letterbox,
            },
        ),
    ];

    for (name, spec) in specs {
        let mut preprocessor = CpuPreProcessor::new(spec);

        for (width, height) in resolutions.iter() {
            let pixels = create_test_pixels(*width, *height);

            group.bench_with_input(
                BenchmarkId::new(name, format!("{}x{}", width, height)),
                &pixels,
                |b, pixels| {
                    b.iter(|| {
                        let (w, h) = (black_box(*width), black_box(*height));
                        preprocessor.preprocess_rgb(black_box(pixels), w, h).unwrap()
                    });
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, benchmark_cpu_preprocess);
criterion_main!(benches);
