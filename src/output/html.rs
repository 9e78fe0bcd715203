// src/output/html.rs
// =============================================================================
// The self-contained HTML document around the rendered tree: summary
// counters, the tree itself, a generation timestamp and a small script that
// wires up the [+]/[-] toggles.
// =============================================================================

use chrono::{DateTime, Utc};
use std::fmt::Write;

use super::tree::{escape_html, render_tree, TreeSource};
use crate::structure::{Structure, StructureIndex};

const STYLE: &str = r##"
    body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; margin: 0; padding: 20px; background: #f0f2f8; }
    .container { max-width: 1200px; margin: 0 auto; background: white; border-radius: 12px; box-shadow: 0 10px 40px rgba(0,0,0,0.15); padding: 30px; }
    h1 { color: #333; border-bottom: 3px solid #667eea; padding-bottom: 10px; }
    .stats { background: #f8f9fa; padding: 15px; border-radius: 8px; margin-bottom: 20px; display: flex; gap: 30px; flex-wrap: wrap; }
    .stat { display: flex; flex-direction: column; }
    .stat-label { font-size: 12px; color: #666; text-transform: uppercase; letter-spacing: 1px; }
    .stat-value { font-size: 20px; font-weight: bold; color: #667eea; word-break: break-all; }
    .tree { background: #fafafa; border-radius: 8px; padding: 20px; overflow-x: auto; }
    .tree ul { list-style: none; padding-left: 20px; margin: 5px 0; }
    .tree > ul { padding-left: 0; }
    .tree li { padding: 3px 0; }
    .tree ul[hidden] { display: none; }
    .node-link { display: inline-block; padding: 4px 10px; background: white; border: 1px solid #ddd; border-radius: 6px; text-decoration: none; color: #333; }
    .node-link:hover { background: #667eea; color: white; border-color: #667eea; }
    .node-title { font-weight: 500; }
    .node-path { font-size: 11px; opacity: 0.7; margin-left: 8px; }
    .toggle { cursor: pointer; border: none; background: none; width: 28px; color: #667eea; font-weight: bold; font-family: monospace; }
    .leaf { padding-left: 28px; }
    .footer { margin-top: 30px; padding-top: 20px; border-top: 1px solid #eee; text-align: center; color: #666; font-size: 14px; }
"##;

// Each toggle flips only its own <li> and that <li>'s direct child list
const SCRIPT: &str = r##"
    document.querySelectorAll('.tree .toggle').forEach(function (toggle) {
        toggle.addEventListener('click', function (event) {
            event.preventDefault();
            event.stopPropagation();
            var item = toggle.parentElement;
            var list = item.querySelector(':scope > ul');
            var expand = item.classList.contains('collapsed');
            item.classList.toggle('collapsed', !expand);
            toggle.setAttribute('aria-expanded', expand ? 'true' : 'false');
            toggle.textContent = expand ? '[-]' : '[+]';
            if (list) { list.hidden = !expand; }
        });
    });
"##;

/// Summary shown above the tree
#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub heading: String,
    pub base_url: String,
    pub total_pages: usize,
    pub max_depth: usize,
    pub generated_at: DateTime<Utc>,
}

impl DocumentInfo {
    pub fn for_index(index: &StructureIndex) -> Self {
        let host = url::Url::parse(&index.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| index.base_url.clone());
        let heading = match index.structure {
            Structure::Pages(_) => format!("🗺️ Site Map - {host}"),
            Structure::Paths(_) => format!("📂 URL Structure - {host}"),
        };
        Self {
            heading,
            base_url: index.base_url.clone(),
            total_pages: index.total_discovered,
            max_depth: index.max_depth,
            generated_at: index.timestamp,
        }
    }
}

/// Renders a complete document for a structure index
pub fn render_index(index: &StructureIndex) -> String {
    let info = DocumentInfo::for_index(index);
    match &index.structure {
        Structure::Pages(tree) => render_document(tree, &info),
        Structure::Paths(trie) => render_document(trie, &info),
    }
}

pub fn render_document<T: TreeSource + ?Sized>(source: &T, info: &DocumentInfo) -> String {
    let mut html = String::with_capacity(8 * 1024);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    let _ = writeln!(html, "<title>{}</title>", escape_html(&info.heading));
    let _ = writeln!(html, "<style>{STYLE}</style>\n</head>\n<body>\n<div class=\"container\">");
    let _ = writeln!(html, "<h1>{}</h1>", escape_html(&info.heading));

    html.push_str("<div class=\"stats\">\n");
    push_stat(&mut html, "Total Pages", &info.total_pages.to_string());
    push_stat(&mut html, "Base URL", &info.base_url);
    push_stat(&mut html, "Max Depth", &info.max_depth.to_string());
    html.push_str("</div>\n");

    html.push_str("<div class=\"tree\">\n");
    html.push_str(&render_tree(source));
    html.push_str("</div>\n");

    let _ = writeln!(
        html,
        "<div class=\"footer\">Generated on {} | Click a page to visit it | Click [+]/[-] to expand/collapse</div>",
        info.generated_at.to_rfc3339()
    );
    let _ = writeln!(html, "</div>\n<script>{SCRIPT}</script>\n</body>\n</html>");
    html
}

fn push_stat(html: &mut String, label: &str, value: &str) {
    let _ = writeln!(
        html,
        "<div class=\"stat\"><span class=\"stat-label\">{}</span><span class=\"stat-value\">{}</span></div>",
        escape_html(label),
        escape_html(value)
    );
}
