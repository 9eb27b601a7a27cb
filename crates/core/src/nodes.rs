//! The closed table of workflow node kinds.
//!
//! Each kind declares its typed ports, its configuration schema, whether it
//! is a human-approval gate, and a pure credit-cost function. Executors live
//! in the engine crate and are looked up through the same enum, so the set
//! of kinds is sealed here: adding a kind is a compile-time change, not a
//! runtime registration.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::ports::{Port, PortType};

// ---------------------------------------------------------------------------
// NodeKind
// ---------------------------------------------------------------------------

/// The closed set of node kinds a workflow graph may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Emits a fixed (template-resolved) text prompt.
    Prompt,
    /// Generates a batch of images from a prompt.
    GenerateImage,
    /// Applies an instruction-driven edit to a single image.
    EditImage,
    /// Upscales a single image by an integer factor.
    UpscaleImage,
    /// Animates a single image into a short video clip.
    GenerateVideo,
    /// Writes a caption for a piece of media.
    Caption,
    /// Gate: pauses the run until a human approves the media.
    Review,
    /// Gate: pauses the run until a human picks one image from a batch.
    Pick,
}

impl NodeKind {
    pub const ALL: [NodeKind; 8] = [
        NodeKind::Prompt,
        NodeKind::GenerateImage,
        NodeKind::EditImage,
        NodeKind::UpscaleImage,
        NodeKind::GenerateVideo,
        NodeKind::Caption,
        NodeKind::Review,
        NodeKind::Pick,
    ];

    /// Stable snake_case name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Prompt => "prompt",
            NodeKind::GenerateImage => "generate_image",
            NodeKind::EditImage => "edit_image",
            NodeKind::UpscaleImage => "upscale_image",
            NodeKind::GenerateVideo => "generate_video",
            NodeKind::Caption => "caption",
            NodeKind::Review => "review",
            NodeKind::Pick => "pick",
        }
    }

    /// Gate kinds suspend the run for external approval instead of
    /// completing in-line.
    pub fn is_gate(&self) -> bool {
        matches!(self, NodeKind::Review | NodeKind::Pick)
    }

    /// Declared input ports.
    pub fn input_ports(&self) -> &'static [Port] {
        const NONE: &[Port] = &[];
        const OPTIONAL_PROMPT: &[Port] = &[Port::optional("prompt", PortType::Text)];
        const SINGLE_IMAGE: &[Port] = &[Port::required("image", PortType::Image)];
        const ANY_MEDIA: &[Port] = &[Port::required("media", PortType::AnyMedia)];
        const IMAGE_BATCH: &[Port] = &[Port::required("images", PortType::ImageBatch)];

        match self {
            NodeKind::Prompt => NONE,
            NodeKind::GenerateImage => OPTIONAL_PROMPT,
            NodeKind::EditImage | NodeKind::UpscaleImage | NodeKind::GenerateVideo => SINGLE_IMAGE,
            NodeKind::Caption | NodeKind::Review => ANY_MEDIA,
            NodeKind::Pick => IMAGE_BATCH,
        }
    }

    /// Declared output ports.
    pub fn output_ports(&self) -> &'static [Port] {
        const TEXT: &[Port] = &[Port::required("text", PortType::Text)];
        const IMAGES: &[Port] = &[Port::required("images", PortType::ImageBatch)];
        const IMAGE: &[Port] = &[Port::required("image", PortType::Image)];
        const VIDEO: &[Port] = &[Port::required("video", PortType::Video)];
        const MEDIA: &[Port] = &[Port::required("media", PortType::AnyMedia)];

        match self {
            NodeKind::Prompt | NodeKind::Caption => TEXT,
            NodeKind::GenerateImage => IMAGES,
            NodeKind::EditImage | NodeKind::UpscaleImage | NodeKind::Pick => IMAGE,
            NodeKind::GenerateVideo => VIDEO,
            NodeKind::Review => MEDIA,
        }
    }

    /// Configuration schema for this kind.
    pub fn config_schema(&self) -> &'static [ConfigField] {
        const PROMPT: &[ConfigField] = &[ConfigField::text("text", true)];
        const GENERATE_IMAGE: &[ConfigField] = &[
            ConfigField::choice("model", true, &["sdxl", "flux-dev", "flux-pro"]),
            ConfigField::text("prompt", false),
            ConfigField::int("width", FieldDefault::Int(1024), 256, 2048),
            ConfigField::int("height", FieldDefault::Int(1024), 256, 2048),
            ConfigField::int("batch_size", FieldDefault::Int(1), 1, 8),
        ];
        const EDIT_IMAGE: &[ConfigField] = &[
            ConfigField {
                name: "model",
                ty: FieldType::Choice(&["flux-kontext"]),
                required: false,
                default: FieldDefault::Str("flux-kontext"),
                min: None,
                max: None,
            },
            ConfigField::text("instruction", true),
        ];
        const UPSCALE_IMAGE: &[ConfigField] =
            &[ConfigField::int("factor", FieldDefault::Int(2), 2, 4)];
        const GENERATE_VIDEO: &[ConfigField] = &[
            ConfigField::choice("model", true, &["kling", "wan-video"]),
            ConfigField::int("duration_secs", FieldDefault::Int(5), 1, 30),
            ConfigField::text("motion_prompt", false),
        ];
        const CAPTION: &[ConfigField] = &[ConfigField {
            name: "style",
            ty: FieldType::Text,
            required: false,
            default: FieldDefault::Str("engaging"),
            min: None,
            max: None,
        }];
        const REVIEW: &[ConfigField] = &[ConfigField::text("note", false)];
        const PICK: &[ConfigField] = &[];

        match self {
            NodeKind::Prompt => PROMPT,
            NodeKind::GenerateImage => GENERATE_IMAGE,
            NodeKind::EditImage => EDIT_IMAGE,
            NodeKind::UpscaleImage => UPSCALE_IMAGE,
            NodeKind::GenerateVideo => GENERATE_VIDEO,
            NodeKind::Caption => CAPTION,
            NodeKind::Review => REVIEW,
            NodeKind::Pick => PICK,
        }
    }

    /// Credit cost of executing a node of this kind with the given
    /// (already resolved and defaulted) configuration.
    ///
    /// Pure function: the same kind and config always cost the same.
    /// Gates and prompts are free.
    pub fn credit_cost(&self, config: &Value) -> i64 {
        match self {
            NodeKind::Prompt | NodeKind::Review | NodeKind::Pick => 0,
            NodeKind::Caption => 1,
            NodeKind::GenerateImage => {
                let per_image = match config_str(config, "model") {
                    Some("sdxl") => 2,
                    Some("flux-dev") => 4,
                    Some("flux-pro") => 8,
                    _ => 4,
                };
                per_image * config_int(config, "batch_size").unwrap_or(1).max(1)
            }
            NodeKind::EditImage => 6,
            NodeKind::UpscaleImage => config_int(config, "factor").unwrap_or(2).clamp(2, 4),
            NodeKind::GenerateVideo => {
                let per_sec = match config_str(config, "model") {
                    Some("kling") => 10,
                    Some("wan-video") => 6,
                    _ => 10,
                };
                per_sec * config_int(config, "duration_secs").unwrap_or(5).max(1)
            }
        }
    }
}

fn config_str<'a>(config: &'a Value, key: &str) -> Option<&'a str> {
    config.get(key).and_then(Value::as_str)
}

fn config_int(config: &Value, key: &str) -> Option<i64> {
    config.get(key).and_then(Value::as_i64)
}

// ---------------------------------------------------------------------------
// Configuration schema
// ---------------------------------------------------------------------------

/// Value type of a configuration field.
#[derive(Debug, Clone, Copy)]
pub enum FieldType {
    Text,
    Integer,
    /// A string restricted to a fixed set of values.
    Choice(&'static [&'static str]),
}

/// Default applied by [`apply_defaults`] when a field is absent.
#[derive(Debug, Clone, Copy)]
pub enum FieldDefault {
    None,
    Int(i64),
    Str(&'static str),
}

/// One field of a node kind's configuration schema.
#[derive(Debug, Clone, Copy)]
pub struct ConfigField {
    pub name: &'static str,
    pub ty: FieldType,
    pub required: bool,
    pub default: FieldDefault,
    /// Inclusive bounds, integer fields only.
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl ConfigField {
    const fn text(name: &'static str, required: bool) -> Self {
        Self {
            name,
            ty: FieldType::Text,
            required,
            default: FieldDefault::None,
            min: None,
            max: None,
        }
    }

    const fn int(name: &'static str, default: FieldDefault, min: i64, max: i64) -> Self {
        Self {
            name,
            ty: FieldType::Integer,
            required: false,
            default,
            min: Some(min),
            max: Some(max),
        }
    }

    const fn choice(name: &'static str, required: bool, values: &'static [&'static str]) -> Self {
        Self {
            name,
            ty: FieldType::Choice(values),
            required,
            default: FieldDefault::None,
            min: None,
            max: None,
        }
    }
}

/// Validate a node configuration against its kind's schema.
///
/// Unknown fields are tolerated (forward compatibility with display-only
/// metadata the canvas may attach); missing required fields, wrong value
/// types, out-of-range integers and unknown choice values are rejected.
pub fn validate_config(kind: NodeKind, config: &Value) -> Result<(), CoreError> {
    if !config.is_object() && !config.is_null() {
        return Err(CoreError::Validation(format!(
            "Config for {} node must be an object",
            kind.as_str()
        )));
    }

    for field in kind.config_schema() {
        let value = config.get(field.name);

        let Some(value) = value else {
            if field.required {
                return Err(CoreError::Validation(format!(
                    "{} node is missing required config field \"{}\"",
                    kind.as_str(),
                    field.name
                )));
            }
            continue;
        };

        match field.ty {
            FieldType::Text => {
                if !value.is_string() {
                    return Err(CoreError::Validation(format!(
                        "Config field \"{}\" must be a string",
                        field.name
                    )));
                }
            }
            FieldType::Integer => {
                let Some(n) = value.as_i64() else {
                    return Err(CoreError::Validation(format!(
                        "Config field \"{}\" must be an integer",
                        field.name
                    )));
                };
                if let Some(min) = field.min {
                    if n < min {
                        return Err(CoreError::Validation(format!(
                            "Config field \"{}\" must be >= {min}",
                            field.name
                        )));
                    }
                }
                if let Some(max) = field.max {
                    if n > max {
                        return Err(CoreError::Validation(format!(
                            "Config field \"{}\" must be <= {max}",
                            field.name
                        )));
                    }
                }
            }
            FieldType::Choice(values) => {
                let Some(s) = value.as_str() else {
                    return Err(CoreError::Validation(format!(
                        "Config field \"{}\" must be a string",
                        field.name
                    )));
                };
                if !values.contains(&s) {
                    return Err(CoreError::Validation(format!(
                        "Config field \"{}\" must be one of: {}",
                        field.name,
                        values.join(", ")
                    )));
                }
            }
        }
    }

    Ok(())
}

/// Return a copy of `config` with schema defaults filled in for absent
/// fields. A null config is treated as an empty object.
pub fn apply_defaults(kind: NodeKind, config: &Value) -> Value {
    let mut out = match config {
        Value::Object(map) => Value::Object(map.clone()),
        _ => Value::Object(Default::default()),
    };

    let map = out.as_object_mut().expect("out is always an object");
    for field in kind.config_schema() {
        if map.contains_key(field.name) {
            continue;
        }
        match field.default {
            FieldDefault::None => {}
            FieldDefault::Int(n) => {
                map.insert(field.name.to_string(), Value::from(n));
            }
            FieldDefault::Str(s) => {
                map.insert(field.name.to_string(), Value::from(s));
            }
        }
    }

    out
}
