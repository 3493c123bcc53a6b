use convplay_core::{draw_activations, draw_activations_color, Block, Vol, Volume};
use proptest::prelude::*;

fn single_canvas(target: &Block) -> &image::RgbaImage {
    let mut canvases = target.canvases();
    let canvas = canvases.next().expect("one canvas");
    assert!(canvases.next().is_none());
    &canvas.image
}

#[test]
fn cells_magnify_into_uniform_blocks() {
    let vol = Vol::from_values(2, 2, 1, vec![0.0, 128.0, 255.0, 64.0]).unwrap();
    let mut target = Block::default();

    draw_activations(&mut target, &vol, 3, false);

    let image = single_canvas(&target);
    assert_eq!(image.dimensions(), (6, 6));

    // (x, y) -> expected gray level
    let expected = [[0u8, 128], [255, 64]];
    for (px, py, pixel) in image.enumerate_pixels() {
        let level = expected[(py / 3) as usize][(px / 3) as usize];
        assert_eq!(pixel.0, [level, level, level, 255], "pixel ({px}, {py})");
    }
}

#[test]
fn one_raster_per_channel_in_depth_order() {
    let mut vol = Vol::zeros(1, 1, 4);
    for d in 0..4 {
        vol.set(0, 0, d, d as f32);
    }
    let mut target = Block::default();

    draw_activations(&mut target, &vol, 1, false);

    let levels = target
        .canvases()
        .map(|canvas| canvas.image.get_pixel(0, 0).0[0])
        .collect::<Vec<_>>();
    assert_eq!(levels, [0, 85, 170, 255]);
}

#[test]
fn normalization_is_shared_across_channels() {
    let vol = Vol::from_values(1, 1, 2, vec![1.0, 3.0]).unwrap();
    let mut target = Block::default();

    draw_activations(&mut target, &vol, 1, false);

    let levels = target
        .canvases()
        .map(|canvas| canvas.image.get_pixel(0, 0).0[0])
        .collect::<Vec<_>>();
    // per-channel normalization would have made both channels 0
    assert_eq!(levels, [0, 255]);
}

#[test]
fn uniform_volume_renders_black_without_dividing_by_zero() {
    let vol = Vol::filled(3, 3, 2, 0.7);
    let mut target = Block::default();

    draw_activations(&mut target, &vol, 2, false);

    assert_eq!(target.canvases().count(), 2);
    for canvas in target.canvases() {
        assert!(canvas.image.pixels().all(|pixel| pixel.0 == [0, 0, 0, 255]));
    }
}

#[test]
fn tiny_gradient_spread_still_spans_full_range() {
    let vol = Vol::from_parts(2, 1, 1, vec![0.0; 2], vec![1e-9, 3e-9]).unwrap();
    let mut target = Block::default();

    draw_activations(&mut target, &vol, 1, true);

    let image = single_canvas(&target);
    assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0, 255]);
    assert_eq!(image.get_pixel(1, 0).0, [255, 255, 255, 255]);
}

#[test]
fn color_composite_maps_channels_to_planes() {
    let mut vol = Vol::zeros(2, 1, 3);
    vol.set(0, 0, 0, 1.0);
    vol.set(1, 0, 2, 1.0);
    let mut target = Block::default();

    draw_activations_color(&mut target, &vol, 2, false);

    let image = single_canvas(&target);
    assert_eq!(image.dimensions(), (4, 2));
    assert_eq!(image.get_pixel(0, 0).0, [255, 0, 0, 255]);
    assert_eq!(image.get_pixel(3, 1).0, [0, 0, 255, 255]);
}

#[test]
fn color_composite_ignores_channels_past_three() {
    let mut vol = Vol::zeros(1, 1, 5);
    vol.set(0, 0, 4, 10.0);
    vol.set(0, 0, 1, 5.0);
    let mut target = Block::default();

    draw_activations_color(&mut target, &vol, 1, false);

    // channel 4 only widens the shared range
    assert_eq!(single_canvas(&target).get_pixel(0, 0).0, [0, 127, 0, 255]);
}

#[test]
fn color_composite_can_draw_gradients() {
    let vol = Vol::from_parts(1, 1, 3, vec![0.0; 3], vec![-1.0, 0.0, 1.0]).unwrap();
    let mut target = Block::default();

    draw_activations_color(&mut target, &vol, 1, true);

    assert_eq!(single_canvas(&target).get_pixel(0, 0).0, [0, 127, 255, 255]);
}

fn arb_volume() -> impl Strategy<Value = Vol> {
    (1usize..5, 1usize..5, 1usize..4).prop_flat_map(|(sx, sy, depth)| {
        let len = sx * sy * depth;
        (
            prop::collection::vec(-100.0f32..100.0, len),
            prop::collection::vec(-1.0f32..1.0, len),
        )
            .prop_map(move |(w, dw)| Vol::from_parts(sx, sy, depth, w, dw).unwrap())
    })
}

proptest! {
    #[test]
    fn grid_rasters_match_shape_and_span_the_range(
        vol in arb_volume(),
        scale in 1u32..5,
        gradients in any::<bool>(),
    ) {
        let mut target = Block::default();
        draw_activations(&mut target, &vol, scale, gradients);

        let canvases = target.canvases().collect::<Vec<_>>();
        prop_assert_eq!(canvases.len(), vol.depth());

        let mut darkest = u8::MAX;
        let mut brightest = u8::MIN;
        for canvas in canvases {
            prop_assert_eq!(
                canvas.image.dimensions(),
                (vol.sx() as u32 * scale, vol.sy() as u32 * scale)
            );
            for pixel in canvas.image.pixels() {
                let [r, g, b, a] = pixel.0;
                prop_assert!(r == g && g == b);
                prop_assert_eq!(a, 255);
                darkest = darkest.min(r);
                brightest = brightest.max(r);
            }
        }

        prop_assert_eq!(darkest, 0);
        let buffer = vol.buffer(gradients);
        let spread = buffer.iter().cloned().fold(f32::MIN, f32::max)
            - buffer.iter().cloned().fold(f32::MAX, f32::min);
        if spread > 0.0 {
            prop_assert_eq!(brightest, 255);
        }
    }

    #[test]
    fn color_composite_always_yields_one_raster(vol in arb_volume(), scale in 1u32..4) {
        let mut target = Block::default();
        draw_activations_color(&mut target, &vol, scale, false);

        prop_assert_eq!(target.children.len(), 1);
        let image = single_canvas(&target);
        prop_assert_eq!(
            image.dimensions(),
            (vol.sx() as u32 * scale, vol.sy() as u32 * scale)
        );
        prop_assert!(image.pixels().all(|pixel| pixel.0[3] == 255));
    }
}
