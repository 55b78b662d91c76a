use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("unknown jewelry category '{0}'")]
    UnknownCategory(String),

    #[error("category '{0}' names neither earrings nor a necklace")]
    UnknownSlot(String),

    #[error("category '{0}' has no items")]
    EmptyCategory(String),

    #[error("category '{0}' is listed more than once")]
    DuplicateCategory(String),
}

/// The two independent overlay positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    Earrings,
    Necklace,
}

impl Slot {
    /// Derive the slot from a category identifier ("gold_earrings" -> Earrings).
    pub fn from_category_id(id: &str) -> Result<Self, CatalogError> {
        let lower = id.to_ascii_lowercase();
        if lower.contains("earring") {
            Ok(Slot::Earrings)
        } else if lower.contains("necklace") {
            Ok(Slot::Necklace)
        } else {
            Err(CatalogError::UnknownSlot(id.to_string()))
        }
    }
}

/// Config form of a catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryEntry {
    pub id: String,
    pub count: usize,
}

impl CategoryEntry {
    pub fn new(id: &str, count: usize) -> Self {
        Self { id: id.to_string(), count }
    }
}

/// Index of a validated category inside its `Catalog`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CategoryId(usize);

impl CategoryId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct Category {
    pub name: String,
    pub count: usize,
    pub slot: Slot,
}

impl Category {
    /// Item `index` (0-based) lives at `<root>/<name>/<index + 1>.png`.
    pub fn item_path(&self, root: &Path, index: usize) -> PathBuf {
        root.join(&self.name).join(format!("{}.png", index + 1))
    }
}

/// Static category -> item count mapping, validated once at startup.
#[derive(Debug, Clone)]
pub struct Catalog {
    categories: Vec<Category>,
}

impl Catalog {
    pub fn new(entries: &[CategoryEntry]) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        let mut categories = Vec::with_capacity(entries.len());

        for entry in entries {
            if !seen.insert(entry.id.as_str()) {
                return Err(CatalogError::DuplicateCategory(entry.id.clone()));
            }
            if entry.count == 0 {
                return Err(CatalogError::EmptyCategory(entry.id.clone()));
            }
            categories.push(Category {
                name: entry.id.clone(),
                count: entry.count,
                slot: Slot::from_category_id(&entry.id)?,
            });
        }

        Ok(Self { categories })
    }

    pub fn resolve(&self, id: &str) -> Result<CategoryId, CatalogError> {
        self.categories
            .iter()
            .position(|c| c.name == id)
            .map(CategoryId)
            .ok_or_else(|| CatalogError::UnknownCategory(id.to_string()))
    }

    pub fn get(&self, id: CategoryId) -> &Category {
        &self.categories[id.0]
    }

    /// Category by display order (used for keyboard bindings).
    pub fn nth(&self, n: usize) -> Option<CategoryId> {
        (n < self.categories.len()).then_some(CategoryId(n))
    }

    pub fn iter(&self) -> impl Iterator<Item = (CategoryId, &Category)> {
        self.categories.iter().enumerate().map(|(i, c)| (CategoryId(i), c))
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

pub fn default_entries() -> Vec<CategoryEntry> {
    vec![
        CategoryEntry::new("gold_earrings", 5),
        CategoryEntry::new("gold_necklaces", 5),
        CategoryEntry::new("diamond_earrings", 5),
        CategoryEntry::new("diamond_necklaces", 6),
    ]
}
