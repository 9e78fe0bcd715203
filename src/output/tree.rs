// src/output/tree.rs
// =============================================================================
// Serializes a finished structure into a nested, collapsible <ul> list.
//
// Markup contract (the document script relies on it):
// - every node is an <li class="node ...">
// - a node with children carries class "collapsible collapsed", a
//   <button class="toggle" aria-expanded="false">[+]</button> as its first
//   child, and its child list as a direct <ul hidden> child
// - leaves have neither a toggle nor a child list
//
// A toggle only ever shows/hides its own <li>'s direct <ul>, so expanding one
// node leaves its siblings, ancestors and grandchildren as they were.
//
// Rendering is a pure function of the structure and walks it with an
// explicit stack.
// =============================================================================

use std::collections::HashSet;
use std::fmt::Write;

use crate::structure::{PageTree, PathTrie, ROOT};

/// What the renderer needs to know about one node
#[derive(Debug, Clone)]
pub struct TreeItem<'a> {
    pub icon: Option<&'static str>,
    pub title: &'a str,
    pub caption: &'a str,
    pub href: &'a str,
}

/// A structure that can be drawn as a tree
pub trait TreeSource {
    fn roots(&self) -> Vec<usize>;
    fn item(&self, id: usize) -> Option<TreeItem<'_>>;
    fn children(&self, id: usize) -> &[usize];
}

impl TreeSource for PageTree {
    fn roots(&self) -> Vec<usize> {
        self.records()
            .iter()
            .filter(|r| r.parent.is_none())
            .map(|r| r.id)
            .collect()
    }

    fn item(&self, id: usize) -> Option<TreeItem<'_>> {
        self.get(id).map(|r| TreeItem {
            icon: None,
            title: &r.title,
            caption: &r.path,
            href: &r.url,
        })
    }

    fn children(&self, id: usize) -> &[usize] {
        self.get(id).map(|r| r.children.as_slice()).unwrap_or(&[])
    }
}

impl TreeSource for PathTrie {
    fn roots(&self) -> Vec<usize> {
        vec![ROOT]
    }

    fn item(&self, id: usize) -> Option<TreeItem<'_>> {
        self.get(id).map(|n| TreeItem {
            icon: Some(n.icon.glyph()),
            title: if id == ROOT { "Home" } else { n.title.as_str() },
            caption: &n.segment,
            href: &n.url,
        })
    }

    fn children(&self, id: usize) -> &[usize] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }
}

/// Escapes text for use in HTML element content and quoted attributes
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

enum Step {
    Open(usize),
    Close,
}

/// Renders the whole structure as a `<ul>` list
pub fn render_tree<T: TreeSource + ?Sized>(source: &T) -> String {
    let mut html = String::from("<ul>\n");
    let mut seen: HashSet<usize> = HashSet::new();
    let mut stack: Vec<Step> = source.roots().into_iter().rev().map(Step::Open).collect();

    while let Some(step) = stack.pop() {
        match step {
            Step::Close => html.push_str("</ul></li>\n"),
            Step::Open(id) => {
                // A malformed index could contain a cycle
                if !seen.insert(id) {
                    continue;
                }
                let Some(item) = source.item(id) else {
                    continue;
                };
                let children: Vec<usize> = source
                    .children(id)
                    .iter()
                    .copied()
                    .filter(|c| !seen.contains(c))
                    .collect();

                if children.is_empty() {
                    html.push_str("<li class=\"node leaf\">");
                    push_link(&mut html, &item);
                    html.push_str("</li>\n");
                } else {
                    html.push_str("<li class=\"node collapsible collapsed\">");
                    html.push_str(
                        "<button type=\"button\" class=\"toggle\" aria-expanded=\"false\">[+]</button>",
                    );
                    push_link(&mut html, &item);
                    html.push_str("\n<ul hidden>\n");
                    stack.push(Step::Close);
                    stack.extend(children.into_iter().rev().map(Step::Open));
                }
            }
        }
    }

    html.push_str("</ul>\n");
    html
}

fn push_link(html: &mut String, item: &TreeItem<'_>) {
    let _ = write!(
        html,
        "<a href=\"{}\" class=\"node-link\" target=\"_blank\" rel=\"noopener\">",
        escape_html(item.href)
    );
    if let Some(icon) = item.icon {
        let _ = write!(html, "<span class=\"node-icon\">{icon}</span> ");
    }
    let _ = write!(
        html,
        "<span class=\"node-title\">{}</span><span class=\"node-path\">{}</span></a>",
        escape_html(item.title),
        escape_html(item.caption)
    );
}
