/// Input size used when a model does not say otherwise.
pub const DEFAULT_INPUT_SIZE: (u32, u32) = (224, 224);

/// Padding value for the letterbox border.
pub const LETTERBOX_COLOR: u8 = 114;

/// ImageNet channel mean (RGB order).
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet channel standard deviation (RGB order).
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Maps `[0, 255]` onto roughly `[-1, 1]`, the TF-Hub "lite" convention.
pub const SYMMETRIC_MEAN: [f32; 3] = [127.0 / 255.0; 3];
pub const SYMMETRIC_STD: [f32; 3] = [128.0 / 255.0; 3];
