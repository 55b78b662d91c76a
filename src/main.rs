use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use log::{info, warn};
use minifb::Key;
use std::sync::Arc;
use std::time::Instant;

use rusty_jewels::args::Args;
use rusty_jewels::camera::{print_cameras, CameraSource};
use rusty_jewels::hud::{draw_hud, HudView};
use rusty_jewels::inference::{face_detector, hand_detector};
use rusty_jewels::output::WindowOutput;
use rusty_jewels::{
    AppConfig, AssetCache, CanvasSurface, FrameScheduler, LandmarkSource, SourceKind, ThreadedLoader, TryOnApp,
    UiSignal,
};

const CATEGORY_KEYS: [Key; 9] = [
    Key::Key1,
    Key::Key2,
    Key::Key3,
    Key::Key4,
    Key::Key5,
    Key::Key6,
    Key::Key7,
    Key::Key8,
    Key::Key9,
];
const ITEM_KEYS: [Key; 9] = [Key::F1, Key::F2, Key::F3, Key::F4, Key::F5, Key::F6, Key::F7, Key::F8, Key::F9];

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.list {
        return print_cameras();
    }

    // 0. Load Config
    let mut config = AppConfig::load(&args.config)?;
    if let Some(dir) = &args.assets {
        config.assets_dir = dir.clone();
    }
    let catalog = Arc::new(config.build_catalog()?);
    let mut mirror_mode = config.defaults.mirror_mode && !args.no_mirror;
    let mut show_hud = config.defaults.show_hud;

    // 1. Setup Camera
    let mut camera = CameraSource::new(args.cam_index)?;
    let (width, height) = (camera.width(), camera.height());
    println!("{} {} ({}x{})", "Opened camera:".green(), camera.name().cyan(), width, height);

    // 2. Setup Landmark Sources
    let face = LandmarkSource::spawn(SourceKind::Face, face_detector(&config.models))?;
    let hand = LandmarkSource::spawn(SourceKind::Hand, hand_detector(&config.models))?;
    println!("Face: {}  Hand: {}", face.name().cyan(), hand.name().cyan());

    // 3. Wire the app
    let cache = AssetCache::new(catalog.clone(), config.assets_dir.clone(), Box::new(ThreadedLoader));
    let mut app = TryOnApp::new(
        FrameScheduler::new(face, hand),
        cache,
        CanvasSurface::new(width, height),
        config.settings(),
    );

    let initial = args.category.clone().or_else(|| config.defaults.initial_category.clone());
    if let Some(id) = initial {
        app.select_category(&id).with_context(|| format!("Unknown --category {}", id))?;
    }

    let mut window = WindowOutput::new("Rusty Jewels", width as usize, height as usize)?;

    println!("{}", "Starting try-on...".green());
    println!("Controls: [1-9] Category [F1-F9] Item [Left/Right] Navigate [T] Try all [M] Mirror [H] HUD [Esc] Quit");

    while window.is_open() && !window.is_key_down(Key::Escape) {
        let mut frame = match camera.capture() {
            Ok(f) => f,
            Err(e) => {
                warn!("Camera error: {:#}", e);
                continue;
            }
        };
        if mirror_mode {
            image::imageops::flip_horizontal_in_place(&mut frame);
        }

        let now = Instant::now();
        app.on_frame(frame, now);
        app.pump(now);

        for key in window.keys_pressed() {
            match key {
                Key::Left => {
                    app.navigate(-1);
                }
                Key::Right => {
                    app.navigate(1);
                }
                Key::T => {
                    app.toggle_try_all(now);
                }
                Key::M => mirror_mode = !mirror_mode,
                Key::H => show_hud = !show_hud,
                k => {
                    if let Some(n) = CATEGORY_KEYS.iter().position(|&c| c == k) {
                        app.select_category_at(n);
                    } else if let Some(n) = ITEM_KEYS.iter().position(|&c| c == k) {
                        app.pick_active_item(n);
                    }
                }
            }
        }

        for signal in app.drain_signals() {
            match signal {
                UiSignal::HandPresence(present) => info!("Hand {}", if present { "detected" } else { "lost" }),
                UiSignal::GestureFlash(gesture) => info!("Gesture {:?}", gesture),
                UiSignal::TryAll(on) => info!("Try all {}", if on { "on" } else { "off" }),
            }
        }

        let mut display = app.surface().pixels().clone();
        if show_hud {
            let view = HudView {
                catalog: &catalog,
                active: app.selection().active_category(),
                item_index: app.selection().current_index(app.cache()),
                status: app.status(),
                try_all: app.selection().try_all(),
                mirror: mirror_mode,
                now,
            };
            draw_hud(&mut display, &view, config.defaults.hud_scale);
        }
        window.update(&display)?;
    }

    app.log_summary();
    Ok(())
}
