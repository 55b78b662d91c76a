use image::{imageops, imageops::FilterType, Rgba, RgbaImage};
use log::trace;

use crate::selection::SelectionState;
use crate::types::{Frame, Landmarks, Rect, FACE_CHIN, FACE_LEFT_EAR, FACE_RIGHT_EAR};

/// Drawing target for the overlay. Only the renderer mutates it.
pub trait Surface {
    fn set_size(&mut self, width: u32, height: u32);
    fn clear(&mut self);
    fn draw_frame(&mut self, frame: &Frame);
    fn draw_image(&mut self, image: &RgbaImage, dest: Rect);
}

/// In-memory RGBA canvas.
pub struct CanvasSurface {
    canvas: RgbaImage,
}

impl CanvasSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: RgbaImage::new(width, height),
        }
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.canvas
    }
}

impl Surface for CanvasSurface {
    fn set_size(&mut self, width: u32, height: u32) {
        if self.canvas.dimensions() != (width, height) {
            self.canvas = RgbaImage::new(width, height);
        }
    }

    fn clear(&mut self) {
        for p in self.canvas.pixels_mut() {
            *p = Rgba([0, 0, 0, 0]);
        }
    }

    fn draw_frame(&mut self, frame: &Frame) {
        for (dst, src) in self.canvas.pixels_mut().zip(frame.pixels()) {
            *dst = Rgba([src[0], src[1], src[2], 255]);
        }
    }

    fn draw_image(&mut self, image: &RgbaImage, dest: Rect) {
        let w = dest.width.round();
        let h = dest.height.round();
        if w < 1.0 || h < 1.0 {
            return;
        }
        let scaled = imageops::resize(image, w as u32, h as u32, FilterType::Triangle);
        imageops::overlay(&mut self.canvas, &scaled, dest.x.round() as i64, dest.y.round() as i64);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayConfig {
    pub earring_width_ratio: f32,
    pub necklace_width_ratio: f32,
    pub necklace_drop_ratio: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            earring_width_ratio: 0.25,
            necklace_width_ratio: 1.2,
            necklace_drop_ratio: 0.2,
        }
    }
}

/// Face anchor points in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchors {
    pub left_ear: (f32, f32),
    pub right_ear: (f32, f32),
    pub neck: (f32, f32),
    pub ear_distance: f32,
}

impl Anchors {
    pub fn from_face(face: &Landmarks, width: u32, height: u32) -> Option<Self> {
        let left_ear = face.get(FACE_LEFT_EAR)?.to_pixels(width, height);
        let right_ear = face.get(FACE_RIGHT_EAR)?.to_pixels(width, height);
        let neck = face.get(FACE_CHIN)?.to_pixels(width, height);
        let ear_distance = (right_ear.0 - left_ear.0).hypot(right_ear.1 - left_ear.1);
        Some(Self {
            left_ear,
            right_ear,
            neck,
            ear_distance,
        })
    }
}

fn scaled_height(width: f32, (img_w, img_h): (u32, u32)) -> f32 {
    if img_w == 0 {
        return 0.0;
    }
    (img_h as f32 / img_w as f32) * width
}

/// One rect per ear: centered horizontally on the ear, top edge at the ear.
pub fn earring_rects(anchors: &Anchors, image_size: (u32, u32), config: &OverlayConfig) -> [Rect; 2] {
    let w = anchors.ear_distance * config.earring_width_ratio;
    let h = scaled_height(w, image_size);
    [anchors.left_ear, anchors.right_ear].map(|(x, y)| Rect::new(x - w / 2.0, y, w, h))
}

/// Centered on the neck point, dropped below it in proportion to face width.
pub fn necklace_rect(anchors: &Anchors, image_size: (u32, u32), config: &OverlayConfig) -> Rect {
    let w = anchors.ear_distance * config.necklace_width_ratio;
    let h = scaled_height(w, image_size);
    let (x, y) = anchors.neck;
    Rect::new(x - w / 2.0, y + anchors.ear_distance * config.necklace_drop_ratio, w, h)
}

pub struct OverlayRenderer {
    config: OverlayConfig,
}

impl OverlayRenderer {
    pub fn new(config: OverlayConfig) -> Self {
        Self { config }
    }

    /// Redraw the whole surface for one face result. Returns the number of jewelry draws.
    ///
    /// The base frame is drawn even when no face was found so the overlay never
    /// shows a stale picture. Items that are still decoding are skipped.
    pub fn render<S: Surface>(
        &self,
        surface: &mut S,
        frame: &Frame,
        face: Option<&Landmarks>,
        selection: &SelectionState,
    ) -> usize {
        let (width, height) = frame.dimensions();
        surface.set_size(width, height);
        surface.clear();
        surface.draw_frame(frame);

        let Some(anchors) = face.and_then(|f| Anchors::from_face(f, width, height)) else {
            return 0;
        };

        let mut draws = 0;

        if let Some(image) = selection.earring().and_then(|h| h.image()) {
            for rect in earring_rects(&anchors, image.dimensions(), &self.config) {
                surface.draw_image(image, rect);
                draws += 1;
            }
        }

        if let Some(image) = selection.necklace().and_then(|h| h.image()) {
            surface.draw_image(image, necklace_rect(&anchors, image.dimensions(), &self.config));
            draws += 1;
        }

        trace!("rendered {} jewelry draws, ear distance {:.1}px", draws, anchors.ear_distance);
        draws
    }
}
