use log::{debug, info};

use crate::assets::{AssetCache, ImageHandle};
use crate::catalog::{CatalogError, CategoryId, Slot};

/// One overlay position.
///
/// `shown` is what the renderer draws; `requested` is the latest choice that
/// is still decoding. The newest request always replaces an older one, so a
/// slow decode can never overwrite a later pick.
#[derive(Debug, Default, Clone)]
struct SlotState {
    shown: Option<ImageHandle>,
    requested: Option<ImageHandle>,
}

impl SlotState {
    /// The item navigation should count from.
    fn current(&self) -> Option<&ImageHandle> {
        self.requested.as_ref().or(self.shown.as_ref())
    }

    fn request(&mut self, handle: ImageHandle) {
        match &self.shown {
            Some(shown) if shown.same_as(&handle) => self.requested = None,
            _ => self.requested = Some(handle),
        }
    }

    fn promote(&mut self) -> bool {
        if self.requested.as_ref().is_some_and(|h| h.is_ready()) {
            self.shown = self.requested.take();
            return true;
        }
        false
    }
}

/// Active category plus what each slot displays.
///
/// Switching category never clears the other slot, so earrings and a
/// necklace can be worn together.
#[derive(Debug, Default)]
pub struct SelectionState {
    active: Option<CategoryId>,
    earrings: SlotState,
    necklace: SlotState,
    try_all: bool,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_category(&self) -> Option<CategoryId> {
        self.active
    }

    /// Make `id` the active category and start loading its images.
    pub fn select_category(&mut self, cache: &mut AssetCache, id: &str) -> Result<CategoryId, CatalogError> {
        let category = cache.catalog().resolve(id)?;
        self.select_category_id(cache, category);
        Ok(category)
    }

    pub fn select_category_id(&mut self, cache: &mut AssetCache, category: CategoryId) {
        self.active = Some(category);
        cache.preload(category);
        info!("Category selected: {}", cache.catalog().get(category).name);
    }

    /// Request item `index` of category `id` for that category's slot.
    ///
    /// Returns false (and changes nothing) if the category was never loaded or
    /// the index is out of range.
    pub fn pick_item(&mut self, cache: &AssetCache, id: &str, index: usize) -> Result<bool, CatalogError> {
        let category = cache.catalog().resolve(id)?;
        Ok(self.pick_item_id(cache, category, index))
    }

    pub fn pick_item_id(&mut self, cache: &AssetCache, category: CategoryId, index: usize) -> bool {
        let Some(handle) = cache.item(category, index) else {
            debug!("Pick ignored: {} item {} not available", cache.catalog().get(category).name, index);
            return false;
        };
        let slot = cache.catalog().get(category).slot;
        self.slot_mut(slot).request(handle.clone());
        true
    }

    /// Step the active category's slot by `dir`, wrapping both ways.
    ///
    /// With no current item the position counts as -1, so `+1` lands on the
    /// first item and `-1` on the last. An item left over from another
    /// category of the same slot counts by its file name. Returns the new index.
    pub fn navigate(&mut self, cache: &AssetCache, dir: i32) -> Option<usize> {
        let category = self.active?;
        let items = cache.items(category)?;
        let slot = cache.catalog().get(category).slot;

        let current = self
            .slot(slot)
            .current()
            .and_then(|h| cache.position_by_name(category, h))
            .map(|i| i as i64)
            .unwrap_or(-1);
        let next = wrap_index(current, dir, items.len());

        self.slot_mut(slot).request(items[next].clone());
        debug!("Navigate {:+} -> {} item {}", dir, cache.catalog().get(category).name, next);
        Some(next)
    }

    /// Swap in requested items whose decode has finished. Called before each render.
    pub fn refresh(&mut self) -> bool {
        let earrings = self.earrings.promote();
        let necklace = self.necklace.promote();
        earrings || necklace
    }

    /// Item currently drawn in `slot`.
    pub fn shown(&self, slot: Slot) -> Option<&ImageHandle> {
        self.slot(slot).shown.as_ref()
    }

    pub fn earring(&self) -> Option<&ImageHandle> {
        self.shown(Slot::Earrings)
    }

    pub fn necklace(&self) -> Option<&ImageHandle> {
        self.shown(Slot::Necklace)
    }

    /// Index of the active category's current item, for display.
    pub fn current_index(&self, cache: &AssetCache) -> Option<usize> {
        let category = self.active?;
        let slot = cache.catalog().get(category).slot;
        self.slot(slot).current().and_then(|h| cache.position_by_name(category, h))
    }

    pub fn try_all(&self) -> bool {
        self.try_all
    }

    pub fn toggle_try_all(&mut self) -> bool {
        self.try_all = !self.try_all;
        info!("Try-all {}", if self.try_all { "on" } else { "off" });
        self.try_all
    }

    fn slot(&self, slot: Slot) -> &SlotState {
        match slot {
            Slot::Earrings => &self.earrings,
            Slot::Necklace => &self.necklace,
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut SlotState {
        match slot {
            Slot::Earrings => &mut self.earrings,
            Slot::Necklace => &mut self.necklace,
        }
    }
}

/// `((i + dir) mod n + n) mod n`, with `i = -1` meaning "nothing selected".
pub fn wrap_index(current: i64, dir: i32, len: usize) -> usize {
    debug_assert!(len > 0);
    (current + dir as i64).rem_euclid(len as i64) as usize
}
