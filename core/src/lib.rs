pub mod config;
pub mod document;
pub mod experiment;
pub mod metrics;
pub mod network;
pub mod page;
pub mod render;
pub mod rng;
pub mod rounds;
pub mod stats;
pub mod summary;
pub mod visualization;
pub mod volume;

pub use config::{load_or_init, RenderOptions};
pub use document::{Block, Canvas, Node, RenderTarget};
pub use experiment::ExperimentMode;
pub use metrics::{RoundMetrics, TrainStats};
pub use network::{Layer, LayerKind, LayerType, Network};
pub use page::{ensure_page_file, to_html, update_sections, PageSection, DEFAULT_PAGE_TEMPLATE};
pub use render::{
    draw_activations, draw_activations_color, visualize_activations, visualize_activations_with,
};
pub use rng::{random_vol, seeded_rng};
pub use rounds::{CancelFlag, Example, RoundLoop, RoundOutcome, RoundReport, Trainer};
pub use stats::{f2t, max_min, MaxMin};
pub use summary::{summarize_network, LayerSummary};
pub use visualization::{encode_luma_png_data_url, encode_png_data_url};
pub use volume::{Vol, Volume, VolumeError};
