// src/structure/trie.rs
// =============================================================================
// The structural trie: a tree keyed by URL path segments.
//
// "https://example.com/docs/guide/intro" becomes
//
//   /  ->  docs  ->  guide  ->  intro
//
// A node stands for a path prefix, not necessarily a page that was crawled;
// `page` marks the nodes some discovered URL actually ended at.
//
// Nodes live in an arena addressed by index with a (parent, segment) -> child
// map on the side. The root "/" is node 0 and exists from construction on.
// Nodes are never removed.
//
// Rust concepts used:
// - Arena instead of Box/Rc children: nodes refer to each other by index,
//   which keeps the borrow checker out of parent/child links
// - serde(from/into) with a private Repr struct: only the nodes are written
//   to disk, the edge map is rebuilt on load
// - `match` with guards (`Some(..) if ...`) for extension classification
// =============================================================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

use crate::crawl::same_host;

pub type NodeId = usize;

pub const ROOT: NodeId = 0;

/// Content-type hint derived from a segment's file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Icon {
    Home,
    Folder,
    File,
    Pdf,
    Document,
    Spreadsheet,
    Presentation,
    Text,
    Csv,
    Archive,
    Image,
    Video,
    Audio,
    Web,
    Stylesheet,
    Script,
    Data,
}

impl Icon {
    /// Classifies the last segment of `url`.
    ///
    /// An extension of one to four characters on a URL that does not end
    /// in '/' makes it a file; anything else is a folder.
    pub fn classify(url: &str) -> Icon {
        // rsplit always yields at least one item, the default is never used
        let last = url.rsplit('/').next().unwrap_or_default();
        let extension = match last.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() && ext.len() <= 4 && !url.ends_with('/') => {
                ext.to_ascii_lowercase()
            }
            _ => return Icon::Folder,
        };

        match extension.as_str() {
            "pdf" => Icon::Pdf,
            "doc" | "docx" => Icon::Document,
            "xls" | "xlsx" => Icon::Spreadsheet,
            "ppt" | "pptx" => Icon::Presentation,
            "txt" => Icon::Text,
            "csv" => Icon::Csv,
            "zip" | "rar" => Icon::Archive,
            "jpg" | "jpeg" | "png" | "gif" => Icon::Image,
            "mp4" => Icon::Video,
            "mp3" => Icon::Audio,
            "html" => Icon::Web,
            "css" => Icon::Stylesheet,
            "js" => Icon::Script,
            "json" => Icon::Data,
            _ => Icon::File,
        }
    }

    pub fn glyph(self) -> &'static str {
        match self {
            Icon::Home => "🏠",
            Icon::Folder => "📁",
            Icon::File | Icon::Pdf => "📄",
            Icon::Document => "📝",
            Icon::Spreadsheet => "📊",
            Icon::Presentation => "📈",
            Icon::Text => "📃",
            Icon::Csv => "📉",
            Icon::Archive => "🗜️",
            Icon::Image => "🏷️",
            Icon::Video => "🎥",
            Icon::Audio => "🎵",
            Icon::Web => "🌐",
            Icon::Stylesheet => "🎨",
            Icon::Script => "⚙️",
            Icon::Data => "📦",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrieNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    /// Path segment as first seen ("/" for the root)
    pub segment: String,
    pub url: String,
    pub title: String,
    pub icon: Icon,
    /// True when a discovered URL ends exactly here
    pub page: bool,
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "PathTrieRepr", into = "PathTrieRepr")]
pub struct PathTrie {
    base: Url,
    nodes: Vec<TrieNode>,
    edges: HashMap<(NodeId, String), NodeId>,
}

#[derive(Serialize, Deserialize)]
struct PathTrieRepr {
    base: Url,
    nodes: Vec<TrieNode>,
}

impl From<PathTrieRepr> for PathTrie {
    fn from(repr: PathTrieRepr) -> Self {
        // Every non-root node contributes exactly one (parent, segment) edge
        let edges = repr
            .nodes
            .iter()
            .filter_map(|n| n.parent.map(|p| ((p, edge_key(&n.segment)), n.id)))
            .collect();
        Self {
            base: repr.base,
            nodes: repr.nodes,
            edges,
        }
    }
}

impl From<PathTrie> for PathTrieRepr {
    fn from(trie: PathTrie) -> Self {
        Self {
            base: trie.base,
            nodes: trie.nodes,
        }
    }
}

// Segments are matched case-insensitively, like normalized keys
fn edge_key(segment: &str) -> String {
    segment.to_lowercase()
}

fn title_for(segment: &str) -> String {
    segment.replace(['-', '_'], " ")
}

impl PathTrie {
    /// Creates a trie holding only the root node for `base`'s origin
    pub fn new(base: &Url) -> Self {
        let origin = base.origin().ascii_serialization();
        let root = TrieNode {
            id: ROOT,
            parent: None,
            segment: "/".to_string(),
            url: format!("{origin}/"),
            title: base.host_str().unwrap_or_default().to_string(),
            icon: Icon::Home,
            page: false,
            children: Vec::new(),
        };
        Self {
            base: base.clone(),
            nodes: vec![root],
            edges: HashMap::new(),
        }
    }

    /// Inserts every path segment of `url`, returning the node it ends at.
    ///
    /// URLs on another host are refused (`None`). Inserting a path that is
    /// already present changes nothing apart from marking its end node as
    /// a page.
    pub fn insert(&mut self, url: &Url) -> Option<NodeId> {
        if !same_host(url, &self.base) {
            return None;
        }

        let origin = self.base.origin().ascii_serialization();

        // Walk down from the root, creating whatever is missing
        let mut current = ROOT;
        // Path up to and including the current segment ("/docs/guide")
        let mut accumulated = String::new();

        // Empty segments come from "//" and trailing slashes
        for segment in url.path().split('/').filter(|s| !s.is_empty()) {
            accumulated.push('/');
            accumulated.push_str(segment);

            let key = (current, edge_key(segment));
            current = match self.edges.get(&key) {
                Some(&child) => child,
                None => {
                    let full_url = format!("{origin}{accumulated}");
                    // The next free slot in the arena is the new id
                    let id = self.nodes.len();
                    self.nodes.push(TrieNode {
                        id,
                        parent: Some(current),
                        segment: segment.to_string(),
                        icon: Icon::classify(&full_url),
                        url: full_url,
                        title: title_for(segment),
                        page: false,
                        children: Vec::new(),
                    });
                    self.nodes[current].children.push(id);
                    self.edges.insert(key, id);
                    id
                }
            };
        }

        // The root itself is a page when the URL had no path
        self.nodes[current].page = true;
        Some(current)
    }

    pub fn get(&self, id: NodeId) -> Option<&TrieNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> &[TrieNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Number of nodes a discovered URL ended at
    pub fn page_count(&self) -> usize {
        self.nodes().iter().filter(|n| n.page).count()
    }
}
