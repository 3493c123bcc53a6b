use std::fmt;

use serde::{Deserialize, Serialize};

use crate::volume::{Vol, Volume};

/// Fieldless tag of a layer's computation kind.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerType {
    Input,
    Conv,
    Pool,
    Fc,
    Softmax,
    Regression,
    Local,
}

impl LayerType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Conv => "conv",
            Self::Pool => "pool",
            Self::Fc => "fc",
            Self::Softmax => "softmax",
            Self::Regression => "regression",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Kind-specific data carried by a layer.
#[derive(Clone, Debug)]
pub enum LayerKind {
    Input,
    Conv {
        filters: Vec<Vol>,
        sx: usize,
        sy: usize,
        in_depth: usize,
        stride: usize,
    },
    Pool {
        sx: usize,
        sy: usize,
        stride: usize,
    },
    Fc {
        filters: Vec<Vol>,
        num_inputs: usize,
    },
    Softmax,
    Regression,
    Local {
        filters: Vec<Vol>,
        sx: usize,
        sy: usize,
        in_depth: usize,
    },
}

impl LayerKind {
    pub fn layer_type(&self) -> LayerType {
        match self {
            Self::Input => LayerType::Input,
            Self::Conv { .. } => LayerType::Conv,
            Self::Pool { .. } => LayerType::Pool,
            Self::Fc { .. } => LayerType::Fc,
            Self::Softmax => LayerType::Softmax,
            Self::Regression => LayerType::Regression,
            Self::Local { .. } => LayerType::Local,
        }
    }
}

/// One stage of a feed-forward network as seen after a forward/backward pass.
#[derive(Clone, Debug)]
pub struct Layer {
    pub kind: LayerKind,
    pub out_act: Vol,
}

impl Layer {
    pub fn new(kind: LayerKind, out_act: Vol) -> Self {
        Self { kind, out_act }
    }

    pub fn layer_type(&self) -> LayerType {
        self.kind.layer_type()
    }

    pub fn out_sx(&self) -> usize {
        self.out_act.sx()
    }

    pub fn out_sy(&self) -> usize {
        self.out_act.sy()
    }

    pub fn out_depth(&self) -> usize {
        self.out_act.depth()
    }

    /// Learnable filters, empty for kinds without weights.
    pub fn filters(&self) -> &[Vol] {
        match &self.kind {
            LayerKind::Conv { filters, .. }
            | LayerKind::Fc { filters, .. }
            | LayerKind::Local { filters, .. } => filters.as_slice(),
            LayerKind::Input
            | LayerKind::Pool { .. }
            | LayerKind::Softmax
            | LayerKind::Regression => &[],
        }
    }

    /// Weights plus one bias per filter; `None` for kinds without parameters.
    pub fn parameter_count(&self) -> Option<usize> {
        match &self.kind {
            LayerKind::Conv {
                filters,
                sx,
                sy,
                in_depth,
                ..
            }
            | LayerKind::Local {
                filters,
                sx,
                sy,
                in_depth,
            } => Some(sx * sy * in_depth * filters.len() + filters.len()),
            LayerKind::Fc {
                filters,
                num_inputs,
            } => Some(num_inputs * filters.len() + filters.len()),
            LayerKind::Input
            | LayerKind::Pool { .. }
            | LayerKind::Softmax
            | LayerKind::Regression => None,
        }
    }
}

/// Anything exposing its layers in forward order.
pub trait Network {
    fn layers(&self) -> &[Layer];
}

impl Network for [Layer] {
    fn layers(&self) -> &[Layer] {
        self
    }
}

impl Network for Vec<Layer> {
    fn layers(&self) -> &[Layer] {
        self
    }
}
