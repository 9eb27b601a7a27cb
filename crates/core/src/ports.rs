//! The port type system for workflow node connections.
//!
//! Every node declares named, typed input and output ports. Edges are only
//! valid between compatible port types; the rules deliberately keep
//! `image_batch` isolated so that a batch can only be narrowed to a single
//! item through the `pick` gate under human selection.

use serde::{Deserialize, Serialize};

/// The type carried by a node port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortType {
    Image,
    ImageBatch,
    Video,
    Text,
    AnyMedia,
}

impl PortType {
    /// Stable lowercase name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PortType::Image => "image",
            PortType::ImageBatch => "image_batch",
            PortType::Video => "video",
            PortType::Text => "text",
            PortType::AnyMedia => "any_media",
        }
    }
}

/// A named, typed slot on a node.
#[derive(Debug, Clone, Copy)]
pub struct Port {
    pub name: &'static str,
    pub ty: PortType,
    /// Required input ports must be fed by an edge for the graph to be
    /// valid. Ignored on output ports.
    pub required: bool,
}

impl Port {
    pub const fn required(name: &'static str, ty: PortType) -> Self {
        Self {
            name,
            ty,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, ty: PortType) -> Self {
        Self {
            name,
            ty,
            required: false,
        }
    }
}

/// Whether an output of type `output` may feed an input of type `input`.
///
/// Rules:
/// - identical types always connect;
/// - `image` and `video` outputs may feed an `any_media` input;
/// - `image_batch` feeds only `image_batch` (the `pick` gate is the only
///   way to cross that boundary);
/// - `text` and `any_media` outputs feed only same-typed inputs.
pub fn compatible(output: PortType, input: PortType) -> bool {
    use PortType::*;
    match (output, input) {
        (a, b) if a == b => true,
        (Image | Video, AnyMedia) => true,
        _ => false,
    }
}
