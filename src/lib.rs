//! Webcam jewelry try-on: face landmarks anchor earring and necklace images,
//! hand gestures flip through the catalog.

pub mod app;
pub mod args;
pub mod assets;
pub mod catalog;
pub mod config;
pub mod font;
pub mod gesture;
pub mod hud;
pub mod renderer;
pub mod scheduler;
pub mod selection;
pub mod source;
pub mod types;

#[cfg(feature = "camera")]
pub mod camera;
#[cfg(feature = "onnx")]
pub mod detector;
#[cfg(feature = "onnx")]
pub mod inference;
#[cfg(feature = "window")]
pub mod output;

pub use app::{Status, TryOnApp, TryOnSettings, UiSignal};
pub use assets::{AssetCache, AssetLoader, ImageHandle, ThreadedLoader};
pub use catalog::{Catalog, CatalogError, CategoryId, Slot};
pub use config::AppConfig;
pub use gesture::{Gesture, GestureClassifier, GestureConfig};
pub use renderer::{CanvasSurface, OverlayConfig, OverlayRenderer, Surface};
pub use scheduler::FrameScheduler;
pub use selection::SelectionState;
pub use source::{Detection, LandmarkDetector, LandmarkSource, NullDetector};
pub use types::{Frame, Landmarks, Point3D, Rect, SharedFrame, SourceKind};
