use std::{fmt::Write, fs, path::Path};

use anyhow::{anyhow, Context, Result};

use crate::{
    document::{Block, Node},
    visualization::encode_png_data_url,
};

pub const DEFAULT_PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Layer activations</title>
<style>
.layer { border: 1px solid #999; margin: 5px; padding: 5px; }
.layer_act { float: right; width: 70%; }
.ltitle { font-weight: bold; margin-bottom: 4px; }
.actmap { margin: 1px; image-rendering: pixelated; }
.clear { clear: both; }
</style>
</head>
<body>

<!-- SECTION:status start -->
<!-- SECTION:status end -->

<!-- SECTION:summary start -->
<!-- SECTION:summary end -->

<!-- SECTION:activations start -->
<!-- SECTION:activations end -->

</body>
</html>
"#;

#[derive(Clone, Debug)]
pub struct PageSection {
    id: String,
    content: String,
}

impl PageSection {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
        }
    }

    fn start_marker(&self) -> String {
        format!("<!-- SECTION:{} start -->", self.id)
    }

    fn end_marker(&self) -> String {
        format!("<!-- SECTION:{} end -->", self.id)
    }

    /// Splices this section's content between its markers in `page`.
    fn splice(&self, page: &str) -> Result<String> {
        let start_marker = self.start_marker();
        let end_marker = self.end_marker();

        let start = page
            .find(&start_marker)
            .ok_or_else(|| anyhow!("missing start marker: {}", start_marker))?;
        let body_start = start + start_marker.len();
        let end = page[body_start..]
            .find(&end_marker)
            .map(|offset| body_start + offset)
            .ok_or_else(|| anyhow!("missing end marker: {}", end_marker))?;

        let body = self.content.trim_matches('\n');
        let mut spliced = String::with_capacity(page.len() + body.len());
        spliced.push_str(&page[..body_start]);
        spliced.push('\n');
        if !body.is_empty() {
            spliced.push_str(body);
            spliced.push('\n');
        }
        spliced.push_str(&page[end..]);
        Ok(spliced)
    }
}

pub fn ensure_page_file(path: &Path, template: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    if !path.exists() {
        fs::write(path, template)
            .with_context(|| format!("failed to write page template to {}", path.display()))?;
    }

    Ok(())
}

pub fn update_sections(path: &Path, sections: &[PageSection]) -> Result<()> {
    let mut page = fs::read_to_string(path)
        .with_context(|| format!("failed to read page at {}", path.display()))?;

    for section in sections {
        page = section.splice(&page)?;
    }

    fs::write(path, page)
        .with_context(|| format!("failed to write updated page to {}", path.display()))
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Serializes a render tree to HTML, inlining every canvas as a PNG data URL.
pub fn to_html(block: &Block) -> Result<String> {
    let mut html = String::new();
    write_block(&mut html, block)?;
    Ok(html)
}

fn write_block(html: &mut String, block: &Block) -> Result<()> {
    if block.class.is_empty() {
        html.push_str("<div>");
    } else {
        let _ = write!(html, "<div class=\"{}\">", escape_html(&block.class));
    }
    for node in &block.children {
        write_node(html, node)?;
    }
    html.push_str("</div>\n");
    Ok(())
}

fn write_node(html: &mut String, node: &Node) -> Result<()> {
    match node {
        Node::Block(block) => write_block(html, block)?,
        Node::Text(text) => html.push_str(&escape_html(text)),
        Node::Break => html.push_str("<br>"),
        Node::Canvas(canvas) => {
            // PNG cannot hold an empty image
            let src = if canvas.width() == 0 || canvas.height() == 0 {
                String::new()
            } else {
                encode_png_data_url(&canvas.image)?
            };
            let _ = write!(
                html,
                "<img class=\"{}\" width=\"{}\" height=\"{}\" src=\"{}\">",
                escape_html(&canvas.class),
                canvas.width(),
                canvas.height(),
                src
            );
        }
    }
    Ok(())
}
