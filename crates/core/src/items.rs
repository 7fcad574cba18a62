//! Static item lookup used by soft reserves.
//!
//! The catalog is loaded once from a JSON array of `{ "itemId": 19019, "name": "..." }`
//! records. Records without a usable id or name are skipped rather than failing the load.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Upper bound on suggestions handed to an interactive picker.
pub const MAX_SUGGESTIONS: usize = 25;
/// Longest label a picker option may carry.
pub const MAX_SUGGESTION_LABEL_CHARS: usize = 100;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read item catalog `{path}`: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("could not parse item catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Default)]
pub struct ItemCatalog {
    items: Vec<Item>,
    by_id: HashMap<u32, usize>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(rename = "itemId", default)]
    item_id: Option<Value>,
    #[serde(default)]
    name: Option<Value>,
}

impl ItemCatalog {
    pub fn new(mut items: Vec<Item>) -> Self {
        items.sort_by(|left, right| {
            left.name
                .to_lowercase()
                .cmp(&right.name.to_lowercase())
                .then_with(|| left.name.cmp(&right.name))
        });

        let mut by_id = HashMap::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            by_id.entry(item.id).or_insert(index);
        }

        Self { items, by_id }
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| CatalogError::Read { path: path.to_path_buf(), source })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let records: Vec<Value> = serde_json::from_str(raw)?;
        let items = records
            .into_iter()
            .filter_map(|record| serde_json::from_value::<RawItem>(record).ok())
            .filter_map(|record| {
                let id = record.item_id.as_ref().and_then(parse_item_id)?;
                let name = match record.name {
                    Some(Value::String(name)) => name.trim().to_owned(),
                    _ => return None,
                };
                (!name.is_empty()).then_some(Item { id, name })
            })
            .collect();

        Ok(Self::new(items))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn find_by_id(&self, id: u32) -> Option<&Item> {
        self.by_id.get(&id).and_then(|index| self.items.get(*index))
    }

    /// Case-insensitive substring search in catalog order. An empty query matches
    /// everything; `limit` is clamped to [`MAX_SUGGESTIONS`].
    pub fn search_by_name(&self, query: &str, limit: usize) -> Vec<&Item> {
        let needle = query.trim().to_lowercase();
        self.items
            .iter()
            .filter(|item| item.name.to_lowercase().contains(&needle))
            .take(limit.min(MAX_SUGGESTIONS))
            .collect()
    }
}

fn parse_item_id(value: &Value) -> Option<u32> {
    let id = match value {
        Value::Number(number) => number.as_u64()?,
        Value::String(text) => text.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    u32::try_from(id).ok().filter(|id| *id > 0)
}

/// Truncates a picker label to [`MAX_SUGGESTION_LABEL_CHARS`] characters.
pub fn suggestion_label(name: &str) -> String {
    name.chars().take(MAX_SUGGESTION_LABEL_CHARS).collect()
}
