use super::{BoundingBox, Category, Detection};
use crate::backend::InferenceOutput;
use crate::catalog::{HeadKind, ScoreActivation};
use crate::labels::LabelMap;
use ndarray::ArrayViewD;
use preprocess::PreprocessResult;

/// SSD class ids skip the leading "???" entry of the label map.
const SSD_LABEL_OFFSET: usize = 1;

pub struct TransformParams {
    pub orig_width: u32,
    pub orig_height: u32,
    pub input_width: u32,
    pub input_height: u32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl TransformParams {
    pub fn new(orig: (u32, u32), input: (u32, u32), pre: &PreprocessResult) -> Self {
        Self {
            orig_width: orig.0,
            orig_height: orig.1,
            input_width: input.0,
            input_height: input.1,
            scale_x: pre.scale_x,
            scale_y: pre.scale_y,
            offset_x: pre.offset_x,
            offset_y: pre.offset_y,
        }
    }

    /// Map a normalized (0-1) point in model input space back to the source image.
    fn to_image(&self, x_norm: f32, y_norm: f32) -> (f32, f32) {
        let x = (x_norm * self.input_width as f32 - self.offset_x) / self.scale_x;
        let y = (y_norm * self.input_height as f32 - self.offset_y) / self.scale_y;
        (
            x.max(0.0).min(self.orig_width as f32),
            y.max(0.0).min(self.orig_height as f32),
        )
    }
}

pub struct PostProcessor {
    pub head: HeadKind,
    pub activation: ScoreActivation,
    /// Zero keeps every result.
    pub max_results: usize,
    pub score_threshold: Option<f32>,
}

impl PostProcessor {
    pub fn new(
        head: HeadKind,
        activation: ScoreActivation,
        max_results: usize,
        score_threshold: Option<f32>,
    ) -> Self {
        Self {
            head,
            activation,
            max_results,
            score_threshold,
        }
    }

    pub fn process(
        &self,
        output: &InferenceOutput,
        labels: &LabelMap,
        transform: &TransformParams,
    ) -> anyhow::Result<Vec<Detection>> {
        match self.head {
            HeadKind::Classification => {
                let scores = output
                    .tensors
                    .first()
                    .ok_or_else(|| anyhow::anyhow!("Classifier produced no output"))?;
                self.parse_classification(&scores.view(), labels, transform)
            }
            HeadKind::SsdDetection => {
                let [boxes, classes, scores, count] = output.tensors.as_slice() else {
                    anyhow::bail!(
                        "SSD head expects 4 outputs (boxes, classes, scores, count), got {}",
                        output.tensors.len()
                    );
                };
                self.parse_ssd(
                    &boxes.view(),
                    &classes.view(),
                    &scores.view(),
                    &count.view(),
                    labels,
                    transform,
                )
            }
        }
    }

    /// Top-k categories for the whole image, as a single detection.
    #[tracing::instrument(skip_all)]
    pub fn parse_classification(
        &self,
        scores: &ArrayViewD<f32>, // [1, num_classes]
        labels: &LabelMap,
        transform: &TransformParams,
    ) -> anyhow::Result<Vec<Detection>> {
        let mut values: Vec<f32> = scores.iter().copied().collect();
        if values.is_empty() {
            anyhow::bail!("Classifier output is empty (shape {:?})", scores.shape());
        }
        if self.activation == ScoreActivation::Softmax {
            softmax(&mut values);
        }

        // One extra output means index 0 is the background class.
        let background = usize::from(!labels.is_empty() && values.len() == labels.len() + 1);

        let mut categories: Vec<Category> = values
            .iter()
            .enumerate()
            .skip(background)
            .map(|(i, &score)| (i - background, score))
            .filter(|&(_, score)| self.passes(score))
            .map(|(index, score)| category(labels, index, score))
            .collect();

        categories.sort_by(|a, b| b.score.total_cmp(&a.score));
        self.truncate(&mut categories);

        Ok(vec![Detection {
            bounding_box: BoundingBox::full(transform.orig_width, transform.orig_height),
            categories,
        }])
    }

    /// Parse SSD post-processed outputs into one detection per box.
    #[tracing::instrument(skip_all)]
    pub fn parse_ssd(
        &self,
        boxes: &ArrayViewD<f32>,   // [1, N, 4] ymin, xmin, ymax, xmax (normalized 0-1)
        classes: &ArrayViewD<f32>, // [1, N]
        scores: &ArrayViewD<f32>,  // [1, N]
        count: &ArrayViewD<f32>,   // [1]
        labels: &LabelMap,
        transform: &TransformParams,
    ) -> anyhow::Result<Vec<Detection>> {
        if boxes.ndim() != 3 || boxes.shape()[2] != 4 {
            anyhow::bail!("Unexpected SSD box shape {:?}", boxes.shape());
        }
        let available = boxes.shape()[1].min(classes.len()).min(scores.len());
        let reported = count.iter().next().map_or(available, |&c| c.max(0.0) as usize);
        let num = reported.min(available);

        let classes: Vec<f32> = classes.iter().copied().collect();
        let scores: Vec<f32> = scores.iter().copied().collect();

        let mut detections = Vec::with_capacity(num);
        for i in 0..num {
            let score = scores[i];
            if !self.passes(score) {
                continue;
            }

            let (x1, y1) = transform.to_image(boxes[[0, i, 1]], boxes[[0, i, 0]]);
            let (x2, y2) = transform.to_image(boxes[[0, i, 3]], boxes[[0, i, 2]]);

            let index = classes[i].max(0.0) as usize + SSD_LABEL_OFFSET;
            detections.push(Detection {
                bounding_box: BoundingBox { x1, y1, x2, y2 },
                categories: vec![category(labels, index, score)],
            });
        }

        detections.sort_by(|a, b| top_score(b).total_cmp(&top_score(a)));
        self.truncate(&mut detections);

        Ok(detections)
    }

    fn passes(&self, score: f32) -> bool {
        self.score_threshold.is_none_or(|threshold| score >= threshold)
    }

    fn truncate<T>(&self, items: &mut Vec<T>) {
        if self.max_results > 0 {
            items.truncate(self.max_results);
        }
    }
}

fn category(labels: &LabelMap, index: usize, score: f32) -> Category {
    let (label, display_name) = labels.resolve(index);
    Category {
        index,
        label,
        display_name,
        score,
    }
}

fn top_score(detection: &Detection) -> f32 {
    detection.categories.first().map_or(0.0, |c| c.score)
}

/// Numerically stable in-place softmax.
fn softmax(values: &mut [f32]) {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    if sum > 0.0 {
        for v in values.iter_mut() {
            *v /= sum;
        }
    }
}
