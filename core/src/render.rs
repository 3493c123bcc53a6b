use image::{Rgba, RgbaImage};
use tracing::debug;

use crate::{
    config::RenderOptions,
    document::{Block, Canvas, Node, RenderTarget},
    network::{Layer, LayerType, Network},
    stats::max_min,
    summary::LayerSummary,
    volume::{Vol, Volume},
};

const DEFAULT_SCALE: u32 = 2;

fn effective_scale(scale: u32) -> u32 {
    if scale == 0 {
        DEFAULT_SCALE
    } else {
        scale
    }
}

fn raster_for<V: Volume + ?Sized>(vol: &V, scale: u32) -> RgbaImage {
    RgbaImage::new(vol.sx() as u32 * scale, vol.sy() as u32 * scale)
}

/// Nearest-neighbour magnification: paints the `scale x scale` block behind cell `(x, y)`.
fn paint_cell(
    image: &mut RgbaImage,
    x: usize,
    y: usize,
    scale: u32,
    mut paint: impl FnMut(&mut Rgba<u8>),
) {
    let (left, top) = (x as u32 * scale, y as u32 * scale);
    for dy in 0..scale {
        for dx in 0..scale {
            paint(image.get_pixel_mut(left + dx, top + dy));
        }
    }
}

/// Draws one grayscale raster per depth channel of `vol` into `target`.
///
/// All channels share one normalization so magnitudes stay comparable across
/// maps. `scale` is the number of output pixels per cell side (0 means 2), and
/// `use_gradients` selects `dw` over `w`.
pub fn draw_activations<T, V>(target: &mut T, vol: &V, scale: u32, use_gradients: bool)
where
    T: RenderTarget + ?Sized,
    V: Volume + ?Sized,
{
    debug_assert!(vol.is_well_formed(), "volume buffers disagree with its shape");
    let scale = effective_scale(scale);
    let range = max_min(vol.buffer(use_gradients)).unwrap_or_default();

    for d in 0..vol.depth() {
        let mut image = raster_for(vol, scale);
        for y in 0..vol.sy() {
            for x in 0..vol.sx() {
                let value = if use_gradients {
                    vol.get_grad(x, y, d)
                } else {
                    vol.get(x, y, d)
                };
                let level = range.intensity(value);
                paint_cell(&mut image, x, y, scale, |pixel| {
                    *pixel = Rgba([level, level, level, 255]);
                });
            }
        }
        target.append(Node::Canvas(Canvas::actmap(image)));
    }
}

/// Composites the first three channels of `vol` into a single RGB raster.
///
/// The raster starts transparent black; channel `d` only writes colour plane
/// `d`, and alpha becomes opaque where channel 0 is written. Volumes with fewer
/// than three channels leave the missing planes at zero.
pub fn draw_activations_color<T, V>(target: &mut T, vol: &V, scale: u32, use_gradients: bool)
where
    T: RenderTarget + ?Sized,
    V: Volume + ?Sized,
{
    debug_assert!(vol.is_well_formed(), "volume buffers disagree with its shape");
    let scale = effective_scale(scale);
    let range = max_min(vol.buffer(use_gradients)).unwrap_or_default();
    let mut image = raster_for(vol, scale);

    for d in 0..vol.depth().min(3) {
        for y in 0..vol.sy() {
            for x in 0..vol.sx() {
                let value = if use_gradients {
                    vol.get_grad(x, y, d)
                } else {
                    vol.get(x, y, d)
                };
                let level = range.intensity(value);
                paint_cell(&mut image, x, y, scale, |pixel| {
                    pixel.0[d] = level;
                    if d == 0 {
                        pixel.0[3] = 255;
                    }
                });
            }
        }
    }

    target.append(Node::Canvas(Canvas::actmap(image)));
}

/// Replaces the contents of `target` with one report block per layer.
pub fn visualize_activations<N, T>(network: &N, target: &mut T)
where
    N: Network + ?Sized,
    T: RenderTarget + ?Sized,
{
    visualize_activations_with(network, target, &RenderOptions::default());
}

pub fn visualize_activations_with<N, T>(network: &N, target: &mut T, options: &RenderOptions)
where
    N: Network + ?Sized,
    T: RenderTarget + ?Sized,
{
    target.clear();

    for (index, layer) in network.layers().iter().enumerate() {
        let report = render_layer(index, layer, options);
        debug!(
            index,
            layer_type = %layer.layer_type(),
            shape = ?[layer.out_sx(), layer.out_sy(), layer.out_depth()],
            "rendered layer"
        );
        target.append(Node::Block(report));
    }
}

fn shows_gradients(layer_type: LayerType) -> bool {
    match layer_type {
        LayerType::Input | LayerType::Softmax => false,
        LayerType::Conv
        | LayerType::Pool
        | LayerType::Fc
        | LayerType::Regression
        | LayerType::Local => true,
    }
}

fn render_layer(index: usize, layer: &Layer, options: &RenderOptions) -> Block {
    let layer_type = layer.layer_type();
    let scale = options.activation_scale(layer_type);

    let mut activations = Block::new("layer_act");
    activations.line("Activations:");
    if index == 0 {
        // the input layer is drawn as an image
        draw_activations_color(&mut activations, &layer.out_act, scale, false);
        draw_activations_color(&mut activations, &layer.out_act, scale, true);
    } else {
        draw_activations(&mut activations, &layer.out_act, scale, false);
    }

    if shows_gradients(layer_type) {
        let mut gradients = Block::new("layer_grad");
        gradients.line("Activation Gradients:");
        draw_activations(&mut gradients, &layer.out_act, scale, true);
        activations.append(Node::Block(gradients));
    }

    if layer_type == LayerType::Conv {
        activations.append(Node::Block(render_filters(index, layer.filters(), options)));
    }

    let summary = LayerSummary::of(index, layer);
    let mut report = Block::new(format!("layer lt{layer_type}"));
    report.append(Node::Block(activations));

    let mut title = Block::new("ltitle");
    title.text(summary.title());
    report.append(Node::Block(title));
    for line in summary.detail_lines(options.precision) {
        report.line(line);
    }

    report.append(Node::Block(Block::new("clear")));
    report
}

fn render_filters(index: usize, filters: &[Vol], options: &RenderOptions) -> Block {
    let mut block = Block::new("layer_filters");
    let visible = filters
        .first()
        .is_some_and(|filter| filter.sx() > options.max_hidden_filter_size);
    if !visible {
        block.text("Weights hidden, too small");
        return block;
    }

    block.line("Weights:");
    draw_filter_set(&mut block, index, filters, options.filter_scale, false);
    block.line_break();
    block.line("Weight Gradients:");
    draw_filter_set(&mut block, index, filters, options.filter_scale, true);
    block
}

fn draw_filter_set(block: &mut Block, index: usize, filters: &[Vol], scale: u32, gradients: bool) {
    for filter in filters {
        // filters of the first conv layer see the RGB input directly
        if index == 1 {
            draw_activations_color(block, filter, scale, gradients);
        } else {
            block.text("(");
            draw_activations(block, filter, scale, gradients);
            block.text(")");
        }
    }
}
