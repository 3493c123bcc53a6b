use image::RgbaImage;

/// Class given to every activation raster.
pub const ACTMAP_CLASS: &str = "actmap";

/// Append-only surface the renderers draw into. The owner decides when it is cleared.
pub trait RenderTarget {
    fn clear(&mut self);
    fn append(&mut self, node: Node);
}

#[derive(Clone, Debug, PartialEq)]
pub struct Canvas {
    pub class: String,
    pub image: RgbaImage,
}

impl Canvas {
    pub fn actmap(image: RgbaImage) -> Self {
        Self {
            class: ACTMAP_CLASS.to_string(),
            image,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Canvas(Canvas),
    Text(String),
    Break,
    Block(Block),
}

/// A classed container of nodes in document order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Block {
    pub class: String,
    pub children: Vec<Node>,
}

impl Block {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            children: Vec::new(),
        }
    }

    pub fn text(&mut self, text: impl Into<String>) {
        self.children.push(Node::Text(text.into()));
    }

    pub fn line_break(&mut self) {
        self.children.push(Node::Break);
    }

    /// Appends `text` followed by a line break.
    pub fn line(&mut self, text: impl Into<String>) {
        self.text(text);
        self.line_break();
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.class.split_whitespace().any(|name| name == class)
    }

    /// Direct child blocks, skipping canvases and text.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.children.iter().filter_map(|node| match node {
            Node::Block(block) => Some(block),
            _ => None,
        })
    }

    /// First block at any depth carrying `class`, searched depth-first.
    pub fn find(&self, class: &str) -> Option<&Block> {
        self.blocks()
            .find_map(|block| block.has_class(class).then_some(block).or_else(|| block.find(class)))
    }

    /// Canvases directly inside this block.
    pub fn canvases(&self) -> impl Iterator<Item = &Canvas> {
        self.children.iter().filter_map(|node| match node {
            Node::Canvas(canvas) => Some(canvas),
            _ => None,
        })
    }

    /// Text nodes directly inside this block.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.children.iter().filter_map(|node| match node {
            Node::Text(text) => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl RenderTarget for Block {
    fn clear(&mut self) {
        self.children.clear();
    }

    fn append(&mut self, node: Node) {
        self.children.push(node);
    }
}
