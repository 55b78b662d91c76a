use image::{Rgba, RgbaImage};
use std::time::Instant;

use crate::app::Status;
use crate::catalog::{Catalog, CategoryId};
use crate::font;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
const GREY: Rgba<u8> = Rgba([110, 110, 110, 255]);
const GOLD: Rgba<u8> = Rgba([255, 215, 0, 255]);

/// Everything the HUD shows for one displayed frame.
pub struct HudView<'a> {
    pub catalog: &'a Catalog,
    pub active: Option<CategoryId>,
    pub item_index: Option<usize>,
    pub status: Status,
    pub try_all: bool,
    pub mirror: bool,
    pub now: Instant,
}

pub fn draw_hud(img: &mut RgbaImage, view: &HudView, scale: u32) {
    if view.status.is_flashing(view.now) {
        draw_border(img, 3 * scale, GOLD);
    }
    draw_presence(img, view.status.hand_present, scale);
    draw_menu(img, view, scale);
}

fn draw_border(img: &mut RgbaImage, thickness: u32, color: Rgba<u8>) {
    let (w, h) = img.dimensions();
    for y in 0..h {
        for x in 0..w {
            if x < thickness || y < thickness || x + thickness >= w || y + thickness >= h {
                img.put_pixel(x, y, color);
            }
        }
    }
}

fn draw_presence(img: &mut RgbaImage, present: bool, scale: u32) {
    let (w, _) = img.dimensions();
    let radius = 4 * scale as i64;
    let margin = 8 * scale as i64;
    let cx = w as i64 - margin - radius;
    let cy = margin + radius;
    let color = if present { GREEN } else { GREY };

    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy > radius * radius {
                continue;
            }
            let (px, py) = (cx + dx, cy + dy);
            if px >= 0 && py >= 0 && (px as u32) < img.width() && (py as u32) < img.height() {
                img.put_pixel(px as u32, py as u32, color);
            }
        }
    }

    let label = "HAND";
    // Frames narrower than the dot push its left edge below zero.
    let lx = (cx - radius).max(0) as u32;
    let lx = lx.saturating_sub(font::measure_text_width(label, scale) + 2 * scale);
    font::draw_text_line(img, lx, (cy - radius).max(0) as u32, label, color, scale);
}

fn draw_menu(img: &mut RgbaImage, view: &HudView, scale: u32) {
    let line = font::line_height(scale);
    let x = 6 * scale;
    let mut y = 6 * scale;

    for (id, category) in view.catalog.iter() {
        let active = view.active == Some(id);
        let label = format!("[{}] {}", id.index() + 1, category.name.replace('_', " "));
        font::draw_text_line(img, x, y, &label, if active { GREEN } else { WHITE }, scale);
        y += line;
    }
    y += line;

    if let Some(id) = view.active {
        let count = view.catalog.get(id).count;
        let text = match view.item_index {
            Some(i) => format!("ITEM {}/{}", i + 1, count),
            None => format!("ITEM -/{}", count),
        };
        font::draw_text_line(img, x, y, &text, WHITE, scale);
        y += line;
    }
    if view.try_all {
        font::draw_text_line(img, x, y, "TRY ALL", GOLD, scale);
        y += line;
    }
    if view.mirror {
        font::draw_text_line(img, x, y, "MIRROR", GREY, scale);
    }

    let hint = "< > NAV  F1-F9 PICK  T TRY ALL  M MIRROR  H HUD";
    let bottom = img.height().saturating_sub(line + 2 * scale);
    font::draw_text_line(img, x, bottom, hint, GREY, scale);
}
