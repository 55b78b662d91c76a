use anyhow::{Context, Result};
use image::{imageops::FilterType, RgbImage};
use log::{info, warn};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;

use crate::config::ModelPaths;
use crate::detector::FaceBoxDetector;
use crate::source::{LandmarkDetector, NullDetector};
use crate::types::{Frame, Landmarks, Point3D, Rect, FACE_MESH_POINTS, HAND_POINTS};

const MESH_SIZE: u32 = 192;
const HAND_SIZE: u32 = 224;

pub fn load_session(model_path: &Path) -> Result<Session> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(4)?
        .with_execution_providers([
            ort::execution_providers::CoreMLExecutionProvider::default().build(),
            ort::execution_providers::CPUExecutionProvider::default().build(),
        ])?
        .commit_from_file(model_path)
        .with_context(|| format!("Failed to load model {}", model_path.display()))?;
    Ok(session)
}

/// 468-point face mesh, run on the face box found by UltraFace (or the full frame).
pub struct FaceMeshDetector {
    mesh: Session,
    boxes: Option<FaceBoxDetector>,
}

impl FaceMeshDetector {
    pub fn new(mesh_path: &Path, detector_path: &Path) -> Result<Self> {
        let boxes = if detector_path.exists() {
            info!("Loading face detector from {}", detector_path.display());
            Some(FaceBoxDetector::new(detector_path)?)
        } else {
            warn!("Face detector not found at {}. Mesh runs on the full frame.", detector_path.display());
            None
        };
        info!("Loading face mesh from {}", mesh_path.display());
        Ok(Self {
            mesh: load_session(mesh_path)?,
            boxes,
        })
    }
}

impl LandmarkDetector for FaceMeshDetector {
    fn name(&self) -> String {
        "Face Mesh (468 pts)".to_string()
    }

    fn detect(&mut self, frame: &Frame) -> Result<Option<Landmarks>> {
        let roi = match &mut self.boxes {
            Some(det) => match det.detect(frame)? {
                Some(rect) => pad_to_frame(rect, 0.25, frame.width(), frame.height()),
                None => return Ok(None),
            },
            None => Rect::new(0.0, 0.0, frame.width() as f32, frame.height() as f32),
        };
        if roi.width < 1.0 || roi.height < 1.0 {
            return Ok(None);
        }

        let crop = image::imageops::crop_imm(frame, roi.x as u32, roi.y as u32, roi.width as u32, roi.height as u32)
            .to_image();
        // [-1, 1] NHWC
        let input_data = nhwc(&crop, MESH_SIZE, |v| v as f32 / 127.5 - 1.0);
        let input = Tensor::from_array((vec![1, MESH_SIZE as usize, MESH_SIZE as usize, 3], input_data))?;
        let outputs = self.mesh.run(ort::inputs![input])?;
        let (_shape, data) = outputs[0].try_extract_tensor::<f32>()?;

        Ok(to_landmarks(data, FACE_MESH_POINTS, MESH_SIZE, roi, frame.width(), frame.height()))
    }
}

/// 21-point hand landmarks on the full frame, gated by the model's presence score.
pub struct HandLandmarkDetector {
    session: Session,
    score_threshold: f32,
}

impl HandLandmarkDetector {
    pub fn new(model_path: &Path, score_threshold: f32) -> Result<Self> {
        info!("Loading hand landmarks from {}", model_path.display());
        Ok(Self {
            session: load_session(model_path)?,
            score_threshold,
        })
    }
}

impl LandmarkDetector for HandLandmarkDetector {
    fn name(&self) -> String {
        "Hand Landmarks (21 pts)".to_string()
    }

    fn detect(&mut self, frame: &Frame) -> Result<Option<Landmarks>> {
        // [0, 1] NHWC
        let input_data = nhwc(frame, HAND_SIZE, |v| v as f32 / 255.0);
        let input = Tensor::from_array((vec![1, HAND_SIZE as usize, HAND_SIZE as usize, 3], input_data))?;
        let outputs = self.session.run(ort::inputs![input])?;

        let (_shape, points) = outputs[0].try_extract_tensor::<f32>()?;
        let (_shape, score) = outputs[1].try_extract_tensor::<f32>()?;
        let score = presence_score(score.first().copied().unwrap_or(0.0));
        if score < self.score_threshold {
            return Ok(None);
        }

        let full = Rect::new(0.0, 0.0, frame.width() as f32, frame.height() as f32);
        Ok(to_landmarks(points, HAND_POINTS, HAND_SIZE, full, frame.width(), frame.height()))
    }
}

/// Face detector for the face source. Falls back to an always-empty detector when the mesh is missing.
pub fn face_detector(models: &ModelPaths) -> Box<dyn LandmarkDetector> {
    if !models.face_mesh.exists() {
        warn!("Face mesh model not found at {}", models.face_mesh.display());
        return Box::new(NullDetector::new("Face Mesh"));
    }
    match FaceMeshDetector::new(&models.face_mesh, &models.face_detection) {
        Ok(d) => Box::new(d),
        Err(e) => {
            warn!("Face mesh disabled: {:#}", e);
            Box::new(NullDetector::new("Face Mesh"))
        }
    }
}

pub fn hand_detector(models: &ModelPaths) -> Box<dyn LandmarkDetector> {
    if !models.hand_landmark.exists() {
        warn!("Hand landmark model not found at {}", models.hand_landmark.display());
        return Box::new(NullDetector::new("Hand Landmarks"));
    }
    match HandLandmarkDetector::new(&models.hand_landmark, models.hand_score_threshold) {
        Ok(d) => Box::new(d),
        Err(e) => {
            warn!("Hand landmarks disabled: {:#}", e);
            Box::new(NullDetector::new("Hand Landmarks"))
        }
    }
}

fn nhwc(img: &RgbImage, size: u32, norm: impl Fn(u8) -> f32) -> Vec<f32> {
    let resized = image::imageops::resize(img, size, size, FilterType::Triangle);
    let mut data = Vec::with_capacity((size * size * 3) as usize);
    for px in resized.pixels() {
        data.extend(px.0.iter().map(|&v| norm(v)));
    }
    data
}

/// Grow a box by `pad` of its size on each axis and clip it to the frame.
fn pad_to_frame(rect: Rect, pad: f32, frame_w: u32, frame_h: u32) -> Rect {
    let (fw, fh) = (frame_w as f32, frame_h as f32);
    let x = (rect.x - rect.width * pad / 2.0).max(0.0);
    let y = (rect.y - rect.height * pad / 2.0).max(0.0);
    let w = (rect.width * (1.0 + pad)).min(fw - x);
    let h = (rect.height * (1.0 + pad)).min(fh - y);
    Rect::new(x, y, w.max(0.0), h.max(0.0))
}

/// Model outputs are in model-input pixels of the `roi` crop; map them to [0,1] of the frame.
fn to_landmarks(data: &[f32], count: usize, model_size: u32, roi: Rect, frame_w: u32, frame_h: u32) -> Option<Landmarks> {
    if data.len() < count * 3 {
        return None;
    }
    let sx = roi.width / model_size as f32;
    let sy = roi.height / model_size as f32;
    let points = data
        .chunks_exact(3)
        .take(count)
        .map(|p| {
            Point3D::new(
                (roi.x + p[0] * sx) / frame_w as f32,
                (roi.y + p[1] * sy) / frame_h as f32,
                p[2] / model_size as f32,
            )
        })
        .collect();
    Some(Landmarks::new(points))
}

/// Some exports emit a logit, others a probability.
fn presence_score(raw: f32) -> f32 {
    if (0.0..=1.0).contains(&raw) {
        raw
    } else {
        1.0 / (1.0 + (-raw).exp())
    }
}
