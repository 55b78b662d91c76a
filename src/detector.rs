use anyhow::Result;
use image::imageops::FilterType;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

use crate::inference::load_session;
use crate::types::{Frame, Rect};

const INPUT_W: u32 = 320;
const INPUT_H: u32 = 240;
const SCORE_THRESHOLD: f32 = 0.7;

/// UltraFace box detector. Finds the most confident face, used to crop the mesh input.
pub struct FaceBoxDetector {
    session: Session,
    anchors: Vec<(f32, f32, f32, f32)>, // cx, cy, w, h
}

impl FaceBoxDetector {
    pub fn new(model_path: &Path) -> Result<Self> {
        let session = load_session(model_path)?;
        let anchors = generate_anchors(INPUT_W as usize, INPUT_H as usize);
        Ok(Self { session, anchors })
    }

    /// Best face box in frame pixels.
    pub fn detect(&mut self, frame: &Frame) -> Result<Option<Rect>> {
        let resized = image::imageops::resize(frame, INPUT_W, INPUT_H, FilterType::Triangle);

        // NCHW [1, 3, 240, 320], (pixel - 127) / 128
        let plane = (INPUT_W * INPUT_H) as usize;
        let mut input_data = vec![0.0f32; 3 * plane];
        for (i, px) in resized.pixels().enumerate() {
            for c in 0..3 {
                input_data[c * plane + i] = (px[c] as f32 - 127.0) / 128.0;
            }
        }

        let input_tensor = Tensor::from_array((vec![1, 3, INPUT_H as usize, INPUT_W as usize], input_data))?;
        let outputs = self.session.run(ort::inputs![input_tensor])?;

        let (_scores_shape, scores_data) = outputs["scores"].try_extract_tensor::<f32>()?;
        let (_boxes_shape, boxes_data) = outputs["boxes"].try_extract_tensor::<f32>()?;

        let Some(rect) = best_box(&self.anchors, scores_data, boxes_data, SCORE_THRESHOLD) else {
            return Ok(None);
        };

        let sx = frame.width() as f32 / INPUT_W as f32;
        let sy = frame.height() as f32 / INPUT_H as f32;
        Ok(Some(Rect::new(rect.x * sx, rect.y * sy, rect.width * sx, rect.height * sy)))
    }
}

/// Decode the highest-scoring anchor above `threshold`, in model input pixels.
fn best_box(anchors: &[(f32, f32, f32, f32)], scores_raw: &[f32], boxes_raw: &[f32], threshold: f32) -> Option<Rect> {
    let center_variance = 0.1;
    let size_variance = 0.2;

    let mut best_score = 0.0;
    let mut best_rect = None;

    for (i, &(ax, ay, aw, ah)) in anchors.iter().enumerate() {
        let (Some(&score), Some(enc)) = (scores_raw.get(i * 2 + 1), boxes_raw.get(i * 4..i * 4 + 4)) else {
            break;
        };
        if score <= threshold || score <= best_score {
            continue;
        }

        let cx = enc[0] * center_variance * aw + ax;
        let cy = enc[1] * center_variance * ah + ay;
        let w = (enc[2] * size_variance).exp() * aw;
        let h = (enc[3] * size_variance).exp() * ah;

        best_score = score;
        best_rect = Some(Rect::new(
            (cx - w / 2.0) * INPUT_W as f32,
            (cy - h / 2.0) * INPUT_H as f32,
            w * INPUT_W as f32,
            h * INPUT_H as f32,
        ));
    }

    best_rect
}

fn generate_anchors(width: usize, height: usize) -> Vec<(f32, f32, f32, f32)> {
    let shrinkage_list = [8, 16, 32, 64];
    let min_boxes: [&[f32]; 4] = [&[10.0, 16.0, 24.0], &[32.0, 48.0], &[64.0, 96.0], &[128.0, 192.0, 256.0]];
    let mut anchors = Vec::new();

    let w = width as f32;
    let h = height as f32;

    for (i, &shrinkage) in shrinkage_list.iter().enumerate() {
        let s = shrinkage as f32;
        let feature_h = (h / s).ceil() as usize;
        let feature_w = (w / s).ceil() as usize;

        for v in 0..feature_h {
            for u in 0..feature_w {
                let cx = (u as f32 * s + s / 2.0) / w;
                let cy = (v as f32 * s + s / 2.0) / h;
                for &min_box in min_boxes[i] {
                    anchors.push((cx, cy, min_box / w, min_box / h));
                }
            }
        }
    }
    anchors
}
