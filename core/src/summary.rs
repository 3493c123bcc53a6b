use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    network::{Layer, LayerKind, LayerType, Network},
    stats::{f2t, max_min},
    volume::Volume,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f32,
    pub max: f32,
}

impl ValueRange {
    /// Range of `values`; an empty buffer reads as `[0, 0]`.
    pub fn of(values: &[f32]) -> Self {
        max_min(values)
            .map(|scan| Self {
                min: scan.minv,
                max: scan.maxv,
            })
            .unwrap_or_default()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterGeometry {
    pub sx: usize,
    pub sy: usize,
    pub depth: usize,
    pub stride: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolGeometry {
    pub sx: usize,
    pub sy: usize,
    pub stride: usize,
}

/// How a layer's learnable parameters add up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Parameters {
    Spatial {
        filters: usize,
        sx: usize,
        sy: usize,
        in_depth: usize,
        total: usize,
    },
    Dense {
        filters: usize,
        num_inputs: usize,
        total: usize,
    },
}

impl Parameters {
    pub fn total(&self) -> usize {
        match self {
            Self::Spatial { total, .. } | Self::Dense { total, .. } => *total,
        }
    }
}

impl fmt::Display for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spatial {
                filters,
                sx,
                sy,
                in_depth,
                total,
            } => write!(
                f,
                "parameters: {filters}x{sx}x{sy}x{in_depth}+{filters} = {total}"
            ),
            Self::Dense {
                filters,
                num_inputs,
                total,
            } => write!(f, "parameters: {filters}x{num_inputs}+{filters} = {total}"),
        }
    }
}

/// Shape, statistics and parameter bookkeeping for one layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerSummary {
    pub index: usize,
    pub layer_type: LayerType,
    pub shape: [usize; 3],
    pub activation_range: ValueRange,
    pub gradient_range: ValueRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterGeometry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pooling: Option<PoolGeometry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Parameters>,
}

impl LayerSummary {
    pub fn of(index: usize, layer: &Layer) -> Self {
        let mut filter = None;
        let mut pooling = None;
        let mut parameters = None;
        let total = layer.parameter_count();

        match &layer.kind {
            LayerKind::Conv {
                filters,
                sx,
                sy,
                in_depth,
                stride,
            } => {
                filter = Some(match filters.first() {
                    Some(first) => FilterGeometry {
                        sx: first.sx(),
                        sy: first.sy(),
                        depth: first.depth(),
                        stride: *stride,
                    },
                    None => FilterGeometry {
                        sx: *sx,
                        sy: *sy,
                        depth: *in_depth,
                        stride: *stride,
                    },
                });
                parameters = total.map(|total| Parameters::Spatial {
                    filters: filters.len(),
                    sx: *sx,
                    sy: *sy,
                    in_depth: *in_depth,
                    total,
                });
            }
            LayerKind::Local {
                filters,
                sx,
                sy,
                in_depth,
            } => {
                parameters = total.map(|total| Parameters::Spatial {
                    filters: filters.len(),
                    sx: *sx,
                    sy: *sy,
                    in_depth: *in_depth,
                    total,
                });
            }
            LayerKind::Fc {
                filters,
                num_inputs,
            } => {
                parameters = total.map(|total| Parameters::Dense {
                    filters: filters.len(),
                    num_inputs: *num_inputs,
                    total,
                });
            }
            LayerKind::Pool { sx, sy, stride } => {
                pooling = Some(PoolGeometry {
                    sx: *sx,
                    sy: *sy,
                    stride: *stride,
                });
            }
            LayerKind::Input | LayerKind::Softmax | LayerKind::Regression => {}
        }

        Self {
            index,
            layer_type: layer.layer_type(),
            shape: [layer.out_sx(), layer.out_sy(), layer.out_depth()],
            activation_range: ValueRange::of(layer.out_act.w()),
            gradient_range: ValueRange::of(layer.out_act.dw()),
            filter,
            pooling,
            parameters,
        }
    }

    /// `<type> (<sx>x<sy>x<depth>)`
    pub fn title(&self) -> String {
        let [sx, sy, depth] = self.shape;
        format!("{} ({sx}x{sy}x{depth})", self.layer_type)
    }

    /// Statistic lines shown under the title, in display order.
    pub fn detail_lines(&self, precision: i32) -> Vec<String> {
        let mut lines = Vec::with_capacity(5);

        if let Some(filter) = &self.filter {
            lines.push(format!(
                "filter size {}x{}x{}, stride {}",
                filter.sx, filter.sy, filter.depth, filter.stride
            ));
        }
        if let Some(pooling) = &self.pooling {
            lines.push(format!(
                "pooling size {}x{}, stride {}",
                pooling.sx, pooling.sy, pooling.stride
            ));
        }

        lines.push(format!(
            "max activation: {}, min: {}",
            f2t(self.activation_range.max, precision),
            f2t(self.activation_range.min, precision)
        ));
        lines.push(format!(
            "max gradient: {}, min: {}",
            f2t(self.gradient_range.max, precision),
            f2t(self.gradient_range.min, precision)
        ));

        if let Some(parameters) = &self.parameters {
            lines.push(parameters.to_string());
        }

        lines
    }
}

pub fn summarize_network<N: Network + ?Sized>(network: &N) -> Vec<LayerSummary> {
    network
        .layers()
        .iter()
        .enumerate()
        .map(|(index, layer)| LayerSummary::of(index, layer))
        .collect()
}

/// Sum of every layer's parameter count.
pub fn total_parameters(summaries: &[LayerSummary]) -> usize {
    summaries
        .iter()
        .filter_map(|summary| summary.parameters.as_ref())
        .map(Parameters::total)
        .sum()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::volume::Vol;

    fn conv_layer() -> Layer {
        let filters = (0..16).map(|_| Vol::zeros(5, 5, 3)).collect();
        let out_act =
            Vol::from_parts(1, 1, 2, vec![0.25, -1.5], vec![0.001, -0.0000042]).unwrap();
        Layer::new(
            LayerKind::Conv {
                filters,
                sx: 5,
                sy: 5,
                in_depth: 3,
                stride: 2,
            },
            out_act,
        )
    }

    #[test]
    fn conv_lines_match_display_format() {
        let summary = LayerSummary::of(1, &conv_layer());

        assert_eq!(summary.title(), "conv (1x1x2)");
        assert_eq!(
            summary.detail_lines(5),
            vec![
                "filter size 5x5x3, stride 2".to_string(),
                "max activation: 0.25, min: -1.5".to_string(),
                "max gradient: 0.001, min: -0.00001".to_string(),
                "parameters: 16x5x5x3+16 = 1216".to_string(),
            ]
        );
    }

    #[test]
    fn pool_and_fc_lines() {
        let pool = Layer::new(
            LayerKind::Pool {
                sx: 2,
                sy: 2,
                stride: 2,
            },
            Vol::zeros(2, 2, 1),
        );
        let fc = Layer::new(
            LayerKind::Fc {
                filters: (0..50).map(|_| Vol::zeros(1, 1, 800)).collect(),
                num_inputs: 800,
            },
            Vol::zeros(1, 1, 50),
        );

        let pool_lines = LayerSummary::of(0, &pool).detail_lines(5);
        assert_eq!(pool_lines[0], "pooling size 2x2, stride 2");
        assert_eq!(pool_lines.len(), 3);

        let fc_lines = LayerSummary::of(1, &fc).detail_lines(5);
        assert_eq!(fc_lines.last().unwrap(), "parameters: 50x800+50 = 40050");
    }

    #[test]
    fn empty_buffers_read_as_zero() {
        let layer = Layer::new(LayerKind::Regression, Vol::zeros(0, 0, 0));
        let summary = LayerSummary::of(0, &layer);

        assert_eq!(summary.activation_range, ValueRange::default());
        assert_eq!(
            summary.detail_lines(5),
            vec![
                "max activation: 0, min: 0".to_string(),
                "max gradient: 0, min: 0".to_string(),
            ]
        );
    }

    #[test]
    fn network_totals_add_up() {
        let network = vec![
            Layer::new(LayerKind::Input, Vol::zeros(8, 8, 3)),
            conv_layer(),
            Layer::new(LayerKind::Softmax, Vol::zeros(1, 1, 3)),
        ];

        let summaries = summarize_network(&network);

        assert_eq!(summaries.len(), 3);
        assert_eq!(total_parameters(&summaries), 1216);
        let json = serde_json::to_value(&summaries[1]).unwrap();
        assert_eq!(json["layer_type"], "conv");
        assert_eq!(json["parameters"]["kind"], "spatial");
        assert_eq!(json["parameters"]["total"], 1216);
        assert!(json.get("pooling").is_none());
    }
}
