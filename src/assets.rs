use image::RgbaImage;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::catalog::{Catalog, CategoryId};

struct AssetImage {
    path: PathBuf,
    /// 0-based position in its category; `<index + 1>.png` on disk.
    index: usize,
    image: OnceLock<RgbaImage>,
}

/// Shared reference to a jewelry image that may still be decoding.
///
/// The cache owns the handles; selection and rendering hold clones of the
/// same `Arc`, so identity (not pixel equality) tells items apart.
#[derive(Clone)]
pub struct ImageHandle(Arc<AssetImage>);

impl ImageHandle {
    pub fn pending(path: impl Into<PathBuf>, index: usize) -> Self {
        Self(Arc::new(AssetImage {
            path: path.into(),
            index,
            image: OnceLock::new(),
        }))
    }

    /// A handle whose decode already finished.
    pub fn ready(path: impl Into<PathBuf>, index: usize, image: RgbaImage) -> Self {
        let handle = Self::pending(path, index);
        handle.complete(image);
        handle
    }

    pub fn path(&self) -> &Path {
        &self.0.path
    }

    pub fn index(&self) -> usize {
        self.0.index
    }

    pub fn is_ready(&self) -> bool {
        self.0.image.get().is_some()
    }

    pub fn image(&self) -> Option<&RgbaImage> {
        self.0.image.get()
    }

    /// Intrinsic size, known once decoded.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.image().map(|img| img.dimensions())
    }

    /// Publish the decoded pixels. Returns false if the handle was already complete.
    pub fn complete(&self, image: RgbaImage) -> bool {
        self.0.image.set(image).is_ok()
    }

    pub fn same_as(&self, other: &ImageHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageHandle")
            .field("path", &self.0.path)
            .field("index", &self.0.index)
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Decodes images out of band and completes their handles when done.
pub trait AssetLoader: Send + Sync {
    fn load(&self, handles: Vec<ImageHandle>);
}

/// Decodes each category on its own background thread with `image`.
pub struct ThreadedLoader;

impl AssetLoader for ThreadedLoader {
    fn load(&self, handles: Vec<ImageHandle>) {
        std::thread::spawn(move || {
            for handle in handles {
                match image::open(handle.path()) {
                    Ok(img) => {
                        handle.complete(img.to_rgba8());
                        debug!("Decoded {}", handle.path().display());
                    }
                    Err(e) => warn!("Failed to decode {}: {}", handle.path().display(), e),
                }
            }
        });
    }
}

/// Per-category image sequences, populated on first selection and never evicted.
pub struct AssetCache {
    catalog: Arc<Catalog>,
    root: PathBuf,
    loader: Box<dyn AssetLoader>,
    entries: HashMap<CategoryId, Vec<ImageHandle>>,
}

impl AssetCache {
    pub fn new(catalog: Arc<Catalog>, root: impl Into<PathBuf>, loader: Box<dyn AssetLoader>) -> Self {
        Self {
            catalog,
            root: root.into(),
            loader,
            entries: HashMap::new(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Create the category's handles and start decoding them. Idempotent.
    pub fn preload(&mut self, id: CategoryId) -> &[ImageHandle] {
        let catalog = &self.catalog;
        let root = &self.root;
        let loader = &self.loader;

        self.entries.entry(id).or_insert_with(|| {
            let category = catalog.get(id);
            let handles: Vec<ImageHandle> = (0..category.count)
                .map(|i| ImageHandle::pending(category.item_path(root, i), i))
                .collect();
            info!("Preloading {} ({} items)", category.name, handles.len());
            loader.load(handles.clone());
            handles
        })
    }

    pub fn is_loaded(&self, id: CategoryId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn items(&self, id: CategoryId) -> Option<&[ImageHandle]> {
        self.entries.get(&id).map(|v| v.as_slice())
    }

    pub fn item(&self, id: CategoryId, index: usize) -> Option<&ImageHandle> {
        self.items(id).and_then(|items| items.get(index))
    }

    /// Position of `handle` in the category's sequence, if it belongs there.
    pub fn position(&self, id: CategoryId, handle: &ImageHandle) -> Option<usize> {
        self.items(id)?.iter().position(|h| h.same_as(handle))
    }

    /// Like `position`, but an item from another category of the same slot
    /// maps to the item with the same file name here (`3.png` -> index 2),
    /// if this category has that many items.
    pub fn position_by_name(&self, id: CategoryId, handle: &ImageHandle) -> Option<usize> {
        let items = self.items(id)?;
        self.position(id, handle)
            .or_else(|| (handle.index() < items.len()).then_some(handle.index()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::catalog::{default_entries, Catalog};
    use std::sync::Mutex;

    /// Records handles instead of decoding them; tests complete them by hand.
    #[derive(Clone, Default)]
    pub struct ManualLoader {
        pub requests: Arc<Mutex<Vec<Vec<ImageHandle>>>>,
    }

    impl AssetLoader for ManualLoader {
        fn load(&self, handles: Vec<ImageHandle>) {
            self.requests.lock().unwrap().push(handles);
        }
    }

    fn cache_with(loader: ManualLoader) -> AssetCache {
        let catalog = Arc::new(Catalog::new(&default_entries()).unwrap());
        AssetCache::new(catalog, "assets", Box::new(loader))
    }

    #[test]
    fn test_preload_is_idempotent() {
        let loader = ManualLoader::default();
        let mut cache = cache_with(loader.clone());
        let id = cache.catalog().resolve("diamond_necklaces").unwrap();

        let first: Vec<ImageHandle> = cache.preload(id).to_vec();
        let second: Vec<ImageHandle> = cache.preload(id).to_vec();

        assert_eq!(first.len(), 6);
        assert!(first.iter().zip(&second).all(|(a, b)| a.same_as(b)));
        assert_eq!(loader.requests.lock().unwrap().len(), 1, "second preload must not reload");
    }

    #[test]
    fn test_handles_start_pending() {
        let mut cache = cache_with(ManualLoader::default());
        let id = cache.catalog().resolve("gold_earrings").unwrap();
        cache.preload(id);

        let handle = cache.item(id, 2).unwrap().clone();
        assert!(!handle.is_ready());
        assert!(handle.dimensions().is_none());

        assert!(handle.complete(RgbaImage::new(40, 80)));
        assert!(!handle.complete(RgbaImage::new(1, 1)), "second completion is refused");
        assert_eq!(cache.item(id, 2).unwrap().dimensions(), Some((40, 80)));
        assert_eq!(cache.position(id, &handle), Some(2));
    }

    #[test]
    fn test_unloaded_category_has_no_items() {
        let cache = cache_with(ManualLoader::default());
        let id = cache.catalog().resolve("gold_necklaces").unwrap();
        assert!(!cache.is_loaded(id));
        assert!(cache.item(id, 0).is_none());
    }

    #[test]
    fn test_foreign_handle_not_found() {
        let mut cache = cache_with(ManualLoader::default());
        let id = cache.catalog().resolve("gold_necklaces").unwrap();
        cache.preload(id);
        let stranger = ImageHandle::pending("assets/gold_necklaces/1.png", 0);
        assert_eq!(cache.position(id, &stranger), None);
    }

    #[test]
    fn test_position_by_name_crosses_categories() {
        let mut cache = cache_with(ManualLoader::default());
        let gold = cache.catalog().resolve("gold_earrings").unwrap();
        let diamond = cache.catalog().resolve("diamond_necklaces").unwrap();
        cache.preload(gold);
        cache.preload(diamond);

        let third = cache.item(gold, 2).unwrap().clone();
        assert_eq!(third.index(), 2);
        assert_eq!(cache.position(diamond, &third), None);
        assert_eq!(cache.position_by_name(diamond, &third), Some(2));
        assert_eq!(cache.position_by_name(gold, &third), Some(2));

        // Diamond necklaces has a 6th item; gold earrings does not.
        let sixth = cache.item(diamond, 5).unwrap().clone();
        assert_eq!(cache.position_by_name(gold, &sixth), None);
    }
}
