use std::{
    fmt::Write,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::Parser;
use convplay_core::{
    encode_luma_png_data_url, ensure_page_file, load_or_init, page::escape_html, random_vol,
    seeded_rng, summarize_network, summary::total_parameters, to_html, update_sections,
    visualize_activations_with, Block, Example, ExperimentMode, Layer, LayerKind, LayerSummary,
    Network, PageSection, RenderOptions, RoundLoop, RoundMetrics, RoundOutcome, TrainStats,
    Trainer, Vol, Volume, DEFAULT_PAGE_TEMPLATE,
};
use image::{
    imageops::{self, FilterType},
    DynamicImage, RgbaImage,
};
use rand::{rngs::StdRng, Rng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const PERSONS: [&str; 3] = ["Nobody", "Jens", "Daria"];
const WIDTH: usize = 64;
const HEIGHT: usize = 64;
const TEST_ROUNDS: usize = 3;
const DEFAULT_LOG_FILTER: &str = "info,convplay_core=debug";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
/// Trains the camera screen's network and writes its layer activations to an HTML page.
struct Args {
    /// `full` runs the configured number of rounds, `test` only a few.
    #[arg(short, long, default_value_t = ExperimentMode::Full)]
    mode: ExperimentMode,
    /// Training images, labelled in order (Nobody, Jens, Daria). Random frames when omitted.
    #[arg(long = "image")]
    images: Vec<PathBuf>,
    /// Output directory for the page, config and summary.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Config file; defaults to `<out>/config.json`.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
struct ExperimentConfig {
    seed: u64,
    rounds: usize,
    /// Rewrite the page after every this many rounds.
    export_every: usize,
    /// Stop early once the mean loss of a round drops below this.
    target_loss: f32,
    /// Feed RGB frames instead of the grayscale capture.
    color: bool,
    render: RenderOptions,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            seed: 1337,
            rounds: 100,
            export_every: 10,
            target_loss: 0.05,
            color: false,
            render: RenderOptions::default(),
        }
    }
}

struct ExperimentPaths {
    config: PathBuf,
    page: PathBuf,
    summary: PathBuf,
}

/// Stands in for the numeric library: fills every layer with plausible
/// activations and gradients whose softmax output drifts toward the label.
struct SyntheticTrainer {
    layers: Vec<Layer>,
    rng: StdRng,
    steps: usize,
    depth: usize,
}

impl SyntheticTrainer {
    fn camera_network(seed: u64, depth: usize) -> Self {
        let mut rng = seeded_rng(seed);
        let conv1 = random_filters(&mut rng, 16, 5, depth);
        let conv2 = random_filters(&mut rng, 20, 5, 16);
        let fc_inputs = (WIDTH / 4) * (HEIGHT / 4) * 20;
        let fc = random_filters(&mut rng, PERSONS.len(), 1, fc_inputs);

        let layers = vec![
            Layer::new(LayerKind::Input, Vol::zeros(WIDTH, HEIGHT, depth)),
            Layer::new(
                LayerKind::Conv {
                    filters: conv1,
                    sx: 5,
                    sy: 5,
                    in_depth: depth,
                    stride: 1,
                },
                Vol::zeros(WIDTH, HEIGHT, 16),
            ),
            Layer::new(
                LayerKind::Pool {
                    sx: 2,
                    sy: 2,
                    stride: 2,
                },
                Vol::zeros(WIDTH / 2, HEIGHT / 2, 16),
            ),
            Layer::new(
                LayerKind::Conv {
                    filters: conv2,
                    sx: 5,
                    sy: 5,
                    in_depth: 16,
                    stride: 1,
                },
                Vol::zeros(WIDTH / 2, HEIGHT / 2, 20),
            ),
            Layer::new(
                LayerKind::Pool {
                    sx: 2,
                    sy: 2,
                    stride: 2,
                },
                Vol::zeros(WIDTH / 4, HEIGHT / 4, 20),
            ),
            Layer::new(
                LayerKind::Fc {
                    filters: fc,
                    num_inputs: fc_inputs,
                },
                Vol::zeros(1, 1, PERSONS.len()),
            ),
            Layer::new(LayerKind::Softmax, Vol::zeros(1, 1, PERSONS.len())),
        ];

        Self {
            layers,
            rng,
            steps: 0,
            depth,
        }
    }

    fn probabilities(&mut self, label: usize) -> Vec<f32> {
        let confidence = 1.0 - (-(self.steps as f32) / 40.0).exp();
        let logits = (0..PERSONS.len())
            .map(|class| {
                let bias = if class == label { 4.0 * confidence } else { 0.0 };
                bias + self.rng.gen_range(-0.5f32..0.5)
            })
            .collect::<Vec<_>>();
        let max = logits.iter().cloned().fold(f32::MIN, f32::max);
        let exps = logits.iter().map(|l| (l - max).exp()).collect::<Vec<_>>();
        let total = exps.iter().sum::<f32>();
        exps.into_iter().map(|e| e / total).collect()
    }
}

fn random_filters(rng: &mut StdRng, count: usize, size: usize, depth: usize) -> Vec<Vol> {
    (0..count)
        .map(|_| random_vol(rng, size, size, depth, 0.3))
        .collect()
}

impl Trainer for SyntheticTrainer {
    fn train(&mut self, input: &Vol, label: usize) -> Result<TrainStats> {
        anyhow::ensure!(
            (input.sx(), input.sy(), input.depth()) == (WIDTH, HEIGHT, self.depth),
            "expected a {WIDTH}x{HEIGHT}x{} input, got {}x{}x{}",
            self.depth,
            input.sx(),
            input.sy(),
            input.depth()
        );
        self.layers[0].out_act = input.clone();
        self.steps += 1;

        let gradient_scale = 1.0 / (1.0 + self.steps as f32 / 10.0);
        let probabilities = self.probabilities(label);
        let last = self.layers.len() - 1;

        for index in 0..self.layers.len() {
            let rng = &mut self.rng;
            let layer = &mut self.layers[index];
            let act = &mut layer.out_act;

            if index == last {
                act.w_mut().copy_from_slice(&probabilities);
            } else if index > 0 {
                for value in act.w_mut() {
                    *value = rng.gen::<f32>().powi(2);
                }
            }
            if index < last {
                for grad in act.dw_mut() {
                    *grad = rng.gen_range(-1.0f32..1.0) * gradient_scale;
                }
            }

            let filters = match &mut layer.kind {
                LayerKind::Conv { filters, .. } | LayerKind::Fc { filters, .. } => filters,
                _ => continue,
            };
            for filter in filters {
                for grad in filter.dw_mut() {
                    *grad = rng.gen_range(-0.1f32..0.1) * gradient_scale;
                }
            }
        }

        let loss = -probabilities[label].max(f32::EPSILON).ln();
        debug!(step = self.steps, label, loss, "trained example");
        Ok(TrainStats { loss })
    }

    fn network(&self) -> &dyn Network {
        &self.layers
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let paths = initialize_paths(&args)?;
    let config: ExperimentConfig = load_or_init(&paths.config, ExperimentConfig::default)?;
    ensure_page_file(&paths.page, DEFAULT_PAGE_TEMPLATE)?;

    info!(mode = %args.mode, page = %paths.page.display(), "running camera activations");

    let depth = if config.color { 3 } else { 1 };
    let dataset = load_dataset(&args.images, config.seed, depth)?;
    let frames = render_frames(&dataset)?;
    let mut trainer = SyntheticTrainer::camera_network(config.seed, depth);
    let rounds = RoundLoop::new(args.mode.select(config.rounds, TEST_ROUNDS));
    let cancel = rounds.cancel_flag();
    let mut visual = Block::new("visual");

    let report = rounds.run(&mut trainer, &dataset, |metrics, network| {
        visualize_activations_with(network, &mut visual, &config.render);
        if metrics.round % config.export_every.max(1) == 0 {
            write_page(&paths.page, metrics, &frames, &visual, None)?;
        }
        if metrics.mean_loss < config.target_loss {
            info!(round = metrics.round, "target loss reached");
            cancel.cancel();
        }
        Ok(())
    })?;

    let summaries = summarize_network(trainer.network());
    if let Some(last) = report.history.last() {
        write_page(&paths.page, last, &frames, &visual, Some(&summaries))?;
    }
    write_summary(&paths.summary, &summaries)?;

    match report.outcome {
        RoundOutcome::Completed { rounds } => info!(rounds, "training finished"),
        RoundOutcome::Cancelled { completed } => info!(completed, "training stopped early"),
    }
    info!(
        parameters = total_parameters(&summaries),
        summary = %paths.summary.display(),
        "wrote activation report"
    );

    Ok(())
}

fn initialize_paths(args: &Args) -> Result<ExperimentPaths> {
    let dir = args
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("output"));
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;

    Ok(ExperimentPaths {
        config: args
            .config
            .clone()
            .unwrap_or_else(|| dir.join("config.json")),
        page: dir.join("activations.html"),
        summary: dir.join("summary.json"),
    })
}

fn load_dataset(images: &[PathBuf], seed: u64, depth: usize) -> Result<Vec<Example>> {
    if images.is_empty() {
        let mut rng = seeded_rng(seed.wrapping_add(1));
        return Ok((0..PERSONS.len())
            .map(|label| {
                let mut frame = random_vol(&mut rng, WIDTH, HEIGHT, depth, 0.5);
                for value in frame.w_mut() {
                    *value += 0.5;
                }
                Example::new(frame, label)
            })
            .collect());
    }

    images
        .iter()
        .enumerate()
        .map(|(index, path)| -> Result<Example> {
            let image = image::open(path)
                .with_context(|| format!("failed to open image {}", path.display()))?;
            debug!(path = %path.display(), label = index % PERSONS.len(), "loaded frame");
            Ok(Example::new(
                capture_frame(&image, depth),
                index % PERSONS.len(),
            ))
        })
        .collect()
}

/// Scales `image` to the frame height and centres it horizontally, as the
/// camera capture does, then converts it to a `depth` 1 (luma) or 3 volume.
fn capture_frame(image: &DynamicImage, depth: usize) -> Vol {
    let (width, height) = (WIDTH as u32, HEIGHT as u32);
    let drawn_width = (width * image.height() / image.width().max(1)).max(1);
    let scaled = image.resize_exact(drawn_width, height, FilterType::Triangle);

    let mut canvas = RgbaImage::new(width, height);
    imageops::overlay(
        &mut canvas,
        &scaled,
        (i64::from(width) - i64::from(drawn_width)) / 2,
        0,
    );
    let canvas = DynamicImage::ImageRgba8(canvas);

    if depth == 1 {
        Vol::from_luma_image(&canvas)
    } else {
        Vol::from_rgb_image(&canvas)
    }
}

/// Thumbnails of the grayscale training frames; colour frames are not previewed.
fn render_frames(dataset: &[Example]) -> Result<String> {
    let mut output = String::new();
    for example in dataset.iter().filter(|example| example.input.depth() == 1) {
        let url = encode_luma_png_data_url(
            example.input.sx() as u32,
            example.input.sy() as u32,
            example.input.w(),
        )?;
        let _ = write!(
            &mut output,
            "<img class=\"frame\" title=\"{}\" src=\"{url}\">",
            PERSONS[example.label % PERSONS.len()]
        );
    }
    Ok(output)
}

fn write_page(
    path: &Path,
    metrics: &RoundMetrics,
    frames: &str,
    visual: &Block,
    summaries: Option<&[LayerSummary]>,
) -> Result<()> {
    let mut sections = vec![
        PageSection::new("status", render_status_section(metrics, frames)),
        PageSection::new("activations", to_html(visual)?),
    ];
    if let Some(summaries) = summaries {
        sections.push(PageSection::new(
            "summary",
            render_summary_section(summaries),
        ));
    }

    update_sections(path, &sections)
}

fn render_status_section(metrics: &RoundMetrics, frames: &str) -> String {
    format!(
        "<p>Round {}: {} examples, mean loss {:.4}</p>\n<p>{frames}</p>",
        metrics.round, metrics.examples, metrics.mean_loss
    )
}

fn render_summary_section(summaries: &[LayerSummary]) -> String {
    let mut output = String::new();
    let _ = writeln!(&mut output, "<table>");
    let _ = writeln!(
        &mut output,
        "<tr><th>Layer</th><th>Shape</th><th>Parameters</th></tr>"
    );
    for summary in summaries {
        let parameters = summary
            .parameters
            .map(|p| p.total().to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            &mut output,
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            summary.index,
            escape_html(&summary.title()),
            parameters
        );
    }
    let _ = writeln!(
        &mut output,
        "<tr><td colspan=\"2\">total</td><td>{}</td></tr>",
        total_parameters(summaries)
    );
    let _ = writeln!(&mut output, "</table>");
    output
}

fn write_summary(path: &Path, summaries: &[LayerSummary]) -> Result<()> {
    let serialized = serde_json::to_string_pretty(summaries)?;
    fs::write(path, serialized)
        .with_context(|| format!("failed to write summary to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    #[test]
    fn capture_is_a_centred_grayscale_frame() {
        // half as wide as tall, so the frame is drawn 128 wide and cropped to the middle
        let white = RgbaImage::from_pixel(32, 64, Rgba([255, 255, 255, 255]));
        let frame = capture_frame(&DynamicImage::ImageRgba8(white), 1);

        assert_eq!((frame.sx(), frame.sy(), frame.depth()), (WIDTH, HEIGHT, 1));
        assert!((frame.get(0, 0, 0) - 0.9999).abs() < 1e-3);
        assert!((frame.get(WIDTH - 1, HEIGHT - 1, 0) - 0.9999).abs() < 1e-3);
    }

    #[test]
    fn wide_capture_leaves_dark_margins() {
        let white = RgbaImage::from_pixel(128, 64, Rgba([255, 255, 255, 255]));
        let frame = capture_frame(&DynamicImage::ImageRgba8(white), 1);

        assert_eq!(frame.get(0, 32, 0), 0.0);
        assert!(frame.get(WIDTH / 2, 32, 0) > 0.99);
        assert_eq!(frame.get(WIDTH - 1, 32, 0), 0.0);
    }

    #[test]
    fn trainer_accepts_only_its_input_depth() {
        let mut trainer = SyntheticTrainer::camera_network(7, 1);

        let stats = trainer.train(&Vol::zeros(WIDTH, HEIGHT, 1), 1).unwrap();
        assert!(stats.loss > 0.0);
        assert!(trainer.train(&Vol::zeros(WIDTH, HEIGHT, 3), 1).is_err());
    }

    #[test]
    fn frames_preview_only_grayscale_inputs() {
        let dataset = vec![
            Example::new(Vol::filled(2, 2, 1, 0.5), 0),
            Example::new(Vol::filled(2, 2, 3, 0.5), 1),
        ];

        let html = render_frames(&dataset).unwrap();

        assert_eq!(html.matches("<img class=\"frame\"").count(), 1);
        assert!(html.contains("title=\"Nobody\""));
    }

    #[test]
    fn default_log_filter_enables_library_debug_events() {
        let filter = EnvFilter::new(DEFAULT_LOG_FILTER).to_string();
        assert!(filter.contains("convplay_core=debug"));
    }
}
