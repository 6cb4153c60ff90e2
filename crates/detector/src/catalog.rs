//! Fixed catalog of bundled models and hardware delegates.
//!
//! Every selectable model maps to a file name inside the model directory plus
//! the metadata the pre/post-processing stages need. Nothing here touches the
//! inference library.

use clap::ValueEnum;
use preprocess::{
    IMAGENET_MEAN, IMAGENET_STD, InputSpec, PixelEncoding, ResizeMode, SYMMETRIC_MEAN,
    SYMMETRIC_STD, TensorLayout,
};
use serde::Serialize;
use std::fmt;

/// Extension of the model files understood by the inference backend.
pub const MODEL_EXTENSION: &str = "onnx";

pub const IMAGENET_LABELS_FILE: &str = "imagenet_labels.txt";
pub const COCO_LABELS_FILE: &str = "coco_labels.txt";

/// Hardware backend used by the inference library to execute the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Delegate {
    #[default]
    Cpu,
    Gpu,
    Nnapi,
}

impl Delegate {
    pub const ALL: [Delegate; 3] = [Delegate::Cpu, Delegate::Gpu, Delegate::Nnapi];

    pub fn name(&self) -> &'static str {
        match self {
            Delegate::Cpu => "CPU",
            Delegate::Gpu => "GPU",
            Delegate::Nnapi => "NNAPI",
        }
    }
}

impl fmt::Display for Delegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pretrained network selectable by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize)]
pub enum Model {
    #[default]
    #[value(name = "efficientnet-lite0")]
    EfficientNetV0,
    #[value(name = "efficientnet-lite1")]
    EfficientNetV1,
    #[value(name = "efficientnet-lite2")]
    EfficientNetV2,
    #[value(name = "efficientnet-lite3")]
    EfficientNetV3,
    #[value(name = "efficientnet-lite3x")]
    EfficientNetV3x,
    #[value(name = "efficientnet-lite4")]
    EfficientNetV4,
    #[value(name = "ssd-mobilenet-v1")]
    MobileNetV1,
    #[value(name = "mobilenet-v2")]
    MobileNetV2,
}

/// What the model's output tensors describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadKind {
    /// One score per class for the whole image.
    Classification,
    /// SSD post-processed outputs: boxes, classes, scores, count.
    SsdDetection,
}

/// Transformation applied to raw class scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreActivation {
    /// Scores are already probabilities.
    None,
    Softmax,
}

/// Static description of a catalog model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelSpec {
    pub input: InputSpec,
    pub head: HeadKind,
    pub activation: ScoreActivation,
    pub labels_file: &'static str,
}

impl Model {
    pub const ALL: [Model; 8] = [
        Model::EfficientNetV0,
        Model::EfficientNetV1,
        Model::EfficientNetV2,
        Model::EfficientNetV3,
        Model::EfficientNetV3x,
        Model::EfficientNetV4,
        Model::MobileNetV1,
        Model::MobileNetV2,
    ];

    /// Name shown in selection lists.
    pub fn display_name(&self) -> &'static str {
        match self {
            Model::EfficientNetV0 => "EfficientNetV0",
            Model::EfficientNetV1 => "EfficientNetV1",
            Model::EfficientNetV2 => "EfficientNetV2",
            Model::EfficientNetV3 => "EfficientNetV3",
            Model::EfficientNetV3x => "EfficientNetV3x",
            Model::EfficientNetV4 => "EfficientNetV4",
            Model::MobileNetV1 => "MobileNetV1",
            Model::MobileNetV2 => "MobileNetV2",
        }
    }

    pub fn file_stem(&self) -> &'static str {
        match self {
            Model::EfficientNetV0 => "efficientnet-lite0",
            Model::EfficientNetV1 => "efficientnet-lite1",
            Model::EfficientNetV2 => "efficientnet-lite2",
            Model::EfficientNetV3 => "efficientnet-lite3",
            Model::EfficientNetV3x => "efficientnet-lite3x",
            Model::EfficientNetV4 => "efficientnet-lite4",
            Model::MobileNetV1 => "ssd-mobilenet-v1",
            Model::MobileNetV2 => "mobilenet_v2",
        }
    }

    /// File name of the model inside the model directory.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.file_stem(), MODEL_EXTENSION)
    }

    pub fn spec(&self) -> ModelSpec {
        match self {
            Model::EfficientNetV0 => efficientnet_lite(224),
            Model::EfficientNetV1 => efficientnet_lite(240),
            Model::EfficientNetV2 => efficientnet_lite(260),
            Model::EfficientNetV3 | Model::EfficientNetV3x => efficientnet_lite(280),
            Model::EfficientNetV4 => efficientnet_lite(300),
            Model::MobileNetV1 => ModelSpec {
                input: InputSpec {
                    size: (300, 300),
                    layout: TensorLayout::Nhwc,
                    encoding: PixelEncoding::Raw,
                    resize: ResizeMode::Stretch,
                },
                head: HeadKind::SsdDetection,
                activation: ScoreActivation::None,
                labels_file: COCO_LABELS_FILE,
            },
            Model::MobileNetV2 => ModelSpec {
                input: InputSpec {
                    size: (224, 224),
                    layout: TensorLayout::Nchw,
                    encoding: PixelEncoding::Normalized {
                        mean: IMAGENET_MEAN,
                        std: IMAGENET_STD,
                    },
                    resize: ResizeMode::Stretch,
                },
                head: HeadKind::Classification,
                activation: ScoreActivation::Softmax,
                labels_file: IMAGENET_LABELS_FILE,
            },
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

fn efficientnet_lite(size: u32) -> ModelSpec {
    ModelSpec {
        input: InputSpec {
            size: (size, size),
            layout: TensorLayout::Nhwc,
            encoding: PixelEncoding::Normalized {
                mean: SYMMETRIC_MEAN,
                std: SYMMETRIC_STD,
            },
            resize: ResizeMode::Stretch,
        },
        head: HeadKind::Classification,
        activation: ScoreActivation::None,
        labels_file: IMAGENET_LABELS_FILE,
    }
}
