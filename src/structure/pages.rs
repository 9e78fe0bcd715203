// src/structure/pages.rs
// =============================================================================
// The page-identity tree: one PageRecord per crawled page.
//
// Records live in an arena (a Vec) and refer to each other by index, so the
// tree has no reference cycles and serializes as a flat list. Index 0 is the
// base URL.
//
// A record is created once per normalized key. Reaching the same page again
// from a different parent does not create a second record and does not add
// a second tree edge; the new parent is remembered in `referrers` instead.
// That keeps `children` a proper tree.
//
// On disk the tree is two lists:
// - records: the arena in discovery order (ids are positions)
// - listing: a flat index of every page sorted by (depth, path)
// The listing is derived, so it is written but ignored when reading back.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::crawl::NormalizedKey;

pub type PageId = usize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub id: PageId,
    pub url: String,
    pub key: NormalizedKey,
    pub title: String,
    pub path: String,
    pub depth: usize,
    pub parent: Option<PageId>,
    pub parent_url: Option<String>,
    pub children: Vec<PageId>,
    /// Other pages that link here but are not the tree parent
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub referrers: Vec<PageId>,
}

/// Fields needed to create a record
#[derive(Debug, Clone)]
pub struct NewPage {
    pub url: String,
    pub key: NormalizedKey,
    pub title: String,
    pub path: String,
    pub depth: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "PageTreeRepr", into = "PageTreeRepr")]
pub struct PageTree {
    records: Vec<PageRecord>,
    by_key: HashMap<NormalizedKey, PageId>,
}

/// One line of the sorted page listing in the JSON index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingEntry {
    pub id: PageId,
    pub depth: usize,
    pub path: String,
    pub title: String,
    pub url: String,
}

#[derive(Serialize, Deserialize)]
struct PageTreeRepr {
    records: Vec<PageRecord>,
    #[serde(default, skip_deserializing)]
    listing: Vec<ListingEntry>,
}

impl From<PageTreeRepr> for PageTree {
    fn from(repr: PageTreeRepr) -> Self {
        let by_key = repr
            .records
            .iter()
            .map(|r| (r.key.clone(), r.id))
            .collect();
        Self {
            records: repr.records,
            by_key,
        }
    }
}

impl From<PageTree> for PageTreeRepr {
    fn from(tree: PageTree) -> Self {
        let listing = tree
            .listing()
            .into_iter()
            .map(|r| ListingEntry {
                id: r.id,
                depth: r.depth,
                path: r.path.clone(),
                title: r.title.clone(),
                url: r.url.clone(),
            })
            .collect();
        Self {
            records: tree.records,
            listing,
        }
    }
}

impl PageTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a page under `parent`, or returns the existing record's id.
    ///
    /// Idempotent per key: the second call for a key only records the new
    /// parent as a referrer.
    pub fn insert(&mut self, page: NewPage, parent: Option<PageId>) -> PageId {
        if let Some(&existing) = self.by_key.get(&page.key) {
            if let Some(parent) = parent {
                self.add_referrer(existing, parent);
            }
            return existing;
        }

        let id = self.records.len();
        let parent_url = parent.and_then(|p| self.records.get(p)).map(|p| p.url.clone());
        self.records.push(PageRecord {
            id,
            url: page.url,
            key: page.key.clone(),
            title: page.title,
            path: page.path,
            depth: page.depth,
            parent,
            parent_url,
            children: Vec::new(),
            referrers: Vec::new(),
        });
        self.by_key.insert(page.key, id);

        if let Some(parent) = parent {
            if let Some(p) = self.records.get_mut(parent) {
                if !p.children.contains(&id) {
                    p.children.push(id);
                }
            }
        }
        id
    }

    /// Remembers that `referrer` also links to `id` (no tree edge is added)
    pub fn add_referrer(&mut self, id: PageId, referrer: PageId) {
        if id == referrer {
            return;
        }
        if let Some(record) = self.records.get_mut(id) {
            if record.parent != Some(referrer) && !record.referrers.contains(&referrer) {
                record.referrers.push(referrer);
            }
        }
    }

    pub fn get(&self, id: PageId) -> Option<&PageRecord> {
        self.records.get(id)
    }

    pub fn id_of(&self, key: &NormalizedKey) -> Option<PageId> {
        self.by_key.get(key).copied()
    }

    pub fn root(&self) -> Option<&PageRecord> {
        self.records.first()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[PageRecord] {
        &self.records
    }

    /// Records ordered by depth, then path (the order used in listings)
    pub fn listing(&self) -> Vec<&PageRecord> {
        let mut sorted: Vec<&PageRecord> = self.records.iter().collect();
        sorted.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.path.cmp(&b.path)));
        sorted
    }
}
