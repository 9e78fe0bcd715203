// src/structure/mod.rs
// =============================================================================
// The structures a run builds and the index record they are saved in.
//
// Submodules:
// - pages: PageTree, one record per crawled page (page-map runs)
// - trie: PathTrie, nodes per URL path segment (URL-structure runs)
//
// StructureIndex is what gets written to disk. It holds enough to render the
// tree document again later without crawling anything.
// =============================================================================

mod pages;
mod trie;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use pages::{NewPage, PageId, PageTree};
pub use trie::{PathTrie, ROOT};

/// The finished structure of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Structure {
    Pages(PageTree),
    Paths(PathTrie),
}

impl Structure {
    /// Number of discovered pages the structure holds
    pub fn discovered(&self) -> usize {
        match self {
            Structure::Pages(tree) => tree.len(),
            Structure::Paths(trie) => trie.page_count(),
        }
    }
}

/// Serialized run result (index.json / structure.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureIndex {
    pub base_url: String,
    pub timestamp: DateTime<Utc>,
    pub max_depth: usize,
    pub total_discovered: usize,
    pub structure: Structure,
}

impl StructureIndex {
    pub fn new(base_url: &url::Url, max_depth: usize, structure: Structure) -> Self {
        Self {
            base_url: base_url.to_string(),
            timestamp: Utc::now(),
            max_depth,
            total_discovered: structure.discovered(),
            structure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[test]
    fn test_index_round_trip_keeps_kind() {
        let base = Url::parse("https://example.com/").unwrap();
        let mut trie = PathTrie::new(&base);
        trie.insert(&Url::parse("https://example.com/a").unwrap());
        trie.insert(&Url::parse("https://example.com/b/c").unwrap());

        let index = StructureIndex::new(&base, 2, Structure::Paths(trie));
        assert_eq!(index.total_discovered, 2);

        let json = serde_json::to_value(&index).unwrap();
        assert_eq!(json["structure"]["kind"], "paths");
        assert_eq!(json["base_url"], "https://example.com/");

        let back: StructureIndex = serde_json::from_value(json).unwrap();
        match back.structure {
            Structure::Paths(trie) => assert_eq!(trie.len(), 4),
            Structure::Pages(_) => panic!("wrong structure kind"),
        }
    }
}
