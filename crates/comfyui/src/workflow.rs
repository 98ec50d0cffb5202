//! Multi-view job graph: the fixed template and parameter injection.
//!
//! The graph is in ComfyUI API format: an object keyed by node id whose
//! values carry a `class_type` and an `inputs` map. Inputs are either
//! literal JSON values or links to another node's output slot, encoded
//! as `["<node_id>", <slot>]`.
//!
//! ```text
//! LoadImage(31) -> ImageScaleToTotalPixels(39) -> VAEEncode(10) ----------+
//!                                  |                                       |
//!              TextEncodeQwenImageEditPlus(115 positive, 3 negative) -> KSampler(14)
//!                                                                          |
//!                                        VAEDecode(12) -> SaveImage(80) <--+
//! ```

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use viewshift_core::error::CoreError;
use viewshift_core::generation::{resolve_seed, GenerationParameters};

// ---------------------------------------------------------------------------
// Node ids of the substituted slots
// ---------------------------------------------------------------------------

/// `LoadImage` node receiving the uploaded source image.
pub const LOAD_IMAGE_NODE: &str = "31";
/// Positive `TextEncodeQwenImageEditPlus` node receiving the prompt.
pub const POSITIVE_PROMPT_NODE: &str = "115";
/// `KSampler` node receiving steps, cfg, and seed.
pub const SAMPLER_NODE: &str = "14";
/// `SaveImage` node whose output is the job's artifact.
pub const SAVE_IMAGE_NODE: &str = "80";

// ---------------------------------------------------------------------------
// Placeholders
// ---------------------------------------------------------------------------

pub const INPUT_IMAGE_PLACEHOLDER: &str = "__INPUT_IMAGE__";
pub const PROMPT_PLACEHOLDER: &str = "__PROMPT__";
pub const SEED_PLACEHOLDER: &str = "__SEED__";
pub const STEPS_PLACEHOLDER: &str = "__STEPS__";
pub const CFG_PLACEHOLDER: &str = "__CFG__";
pub const OUTPUT_PREFIX_PLACEHOLDER: &str = "__OUTPUT_PREFIX__";

const PLACEHOLDERS: &[&str] = &[
    INPUT_IMAGE_PLACEHOLDER,
    PROMPT_PLACEHOLDER,
    SEED_PLACEHOLDER,
    STEPS_PLACEHOLDER,
    CFG_PLACEHOLDER,
    OUTPUT_PREFIX_PLACEHOLDER,
];

/// Every `(node_id, input_name)` pair the injector writes.
const SUBSTITUTED_SLOTS: &[(&str, &str)] = &[
    (LOAD_IMAGE_NODE, "image"),
    (POSITIVE_PROMPT_NODE, "text"),
    (SAMPLER_NODE, "seed"),
    (SAMPLER_NODE, "steps"),
    (SAMPLER_NODE, "cfg"),
    (SAVE_IMAGE_NODE, "filename_prefix"),
];

// ---------------------------------------------------------------------------
// Graph types
// ---------------------------------------------------------------------------

/// Reference to output `slot` of node `node_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLink(pub String, pub u32);

/// A single node input: a link to another node or a literal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeInput {
    Link(NodeLink),
    Literal(Value),
}

/// One operation in the job graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub class_type: String,
    #[serde(default)]
    pub inputs: BTreeMap<String, NodeInput>,
}

/// A ComfyUI job graph keyed by node id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobGraph {
    nodes: BTreeMap<String, GraphNode>,
}

/// Errors from template handling and parameter injection.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// The template is missing a node or slot the injector needs, or is
    /// structurally invalid. Always an implementation bug.
    #[error("Malformed template: {0}")]
    MalformedTemplate(String),

    /// A parameter could not be turned into a concrete graph value.
    #[error(transparent)]
    Parameter(#[from] CoreError),
}

impl JobGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, node: GraphNode) {
        self.nodes.insert(id.into(), node);
    }

    pub fn remove(&mut self, id: &str) -> Option<GraphNode> {
        self.nodes.remove(id)
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut GraphNode> {
        self.nodes.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Literal value of `input` on node `node_id`, if both exist and the
    /// input is not a link.
    pub fn literal(&self, node_id: &str, input: &str) -> Option<&Value> {
        match self.node(node_id)?.inputs.get(input)? {
            NodeInput::Literal(v) => Some(v),
            NodeInput::Link(_) => None,
        }
    }

    /// Check that every link resolves to a node of this graph and that
    /// the graph has no cycles.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        for (id, node) in &self.nodes {
            for (input, value) in &node.inputs {
                if let NodeInput::Link(NodeLink(target, _)) = value {
                    if !self.nodes.contains_key(target) {
                        return Err(WorkflowError::MalformedTemplate(format!(
                            "node '{id}' input '{input}' links to missing node '{target}'"
                        )));
                    }
                }
            }
        }
        self.check_acyclic()
    }

    /// `(node_id, input_name)` of every literal that still holds a placeholder.
    pub fn placeholders(&self) -> Vec<(String, String)> {
        let mut found = Vec::new();
        for (id, node) in &self.nodes {
            for (input, value) in &node.inputs {
                if let NodeInput::Literal(Value::String(s)) = value {
                    if PLACEHOLDERS.contains(&s.as_str()) {
                        found.push((id.clone(), input.clone()));
                    }
                }
            }
        }
        found
    }

    /// Depth-first search with three colours; a grey node reached again
    /// closes a cycle.
    fn check_acyclic(&self) -> Result<(), WorkflowError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'a>(
            graph: &'a JobGraph,
            id: &'a str,
            marks: &mut HashMap<&'a str, Mark>,
        ) -> Result<(), WorkflowError> {
            match marks.get(id) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    return Err(WorkflowError::MalformedTemplate(format!(
                        "cycle detected at node '{id}'"
                    )))
                }
                None => {}
            }
            marks.insert(id, Mark::Visiting);
            if let Some(node) = graph.nodes.get(id) {
                for value in node.inputs.values() {
                    if let NodeInput::Link(NodeLink(target, _)) = value {
                        visit(graph, target, marks)?;
                    }
                }
            }
            marks.insert(id, Mark::Done);
            Ok(())
        }

        let mut marks = HashMap::new();
        for id in self.nodes.keys() {
            visit(self, id, &mut marks)?;
        }
        Ok(())
    }

    /// Fail unless `node_id.input` exists and is a literal slot.
    fn require_literal_slot(&self, node_id: &str, input: &str) -> Result<(), WorkflowError> {
        let node = self.node(node_id).ok_or_else(|| {
            WorkflowError::MalformedTemplate(format!("missing node '{node_id}'"))
        })?;
        match node.inputs.get(input) {
            Some(NodeInput::Literal(_)) => Ok(()),
            Some(NodeInput::Link(_)) => Err(WorkflowError::MalformedTemplate(format!(
                "node '{node_id}' input '{input}' is a link, expected a literal"
            ))),
            None => Err(WorkflowError::MalformedTemplate(format!(
                "node '{node_id}' ({}) has no input '{input}'",
                node.class_type
            ))),
        }
    }

    fn set_literal(&mut self, node_id: &str, input: &str, value: Value) {
        if let Some(node) = self.nodes.get_mut(node_id) {
            node.inputs.insert(input.to_string(), NodeInput::Literal(value));
        }
    }
}

// ---------------------------------------------------------------------------
// Template builder
// ---------------------------------------------------------------------------

fn lit(value: impl Into<Value>) -> NodeInput {
    NodeInput::Literal(value.into())
}

fn link(node_id: &str, slot: u32) -> NodeInput {
    NodeInput::Link(NodeLink(node_id.to_string(), slot))
}

fn node<const N: usize>(class_type: &str, inputs: [(&str, NodeInput); N]) -> GraphNode {
    GraphNode {
        class_type: class_type.to_string(),
        inputs: inputs
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect(),
    }
}

/// Build the Qwen-Image-Edit multi-view template.
///
/// Returns a fresh, independently owned graph on every call. Substituted
/// slots hold placeholder strings until [`inject`] replaces them.
pub fn build_template() -> JobGraph {
    let mut g = JobGraph::new();

    g.insert("22", node("VAELoader", [("vae_name", lit("qwen_image_vae.safetensors"))]));
    g.insert(
        "76",
        node(
            "CLIPLoader",
            [
                ("clip_name", lit("qwen_2.5_vl_7b.safetensors")),
                ("type", lit("stable_diffusion")),
                ("device", lit("default")),
            ],
        ),
    );
    g.insert(
        "77",
        node(
            "UNETLoader",
            [
                ("unet_name", lit("Qwen-Image-Edit-2511.safetensors")),
                ("weight_dtype", lit("default")),
            ],
        ),
    );
    g.insert(
        "125",
        node(
            "LoraLoaderModelOnly",
            [
                ("model", link("77", 0)),
                ("lora_name", lit("Qwen-Image-Lightning-4steps-V1.0.safetensors")),
                ("strength_model", lit(0.8)),
            ],
        ),
    );
    g.insert(
        "20",
        node(
            "LoraLoaderModelOnly",
            [
                ("model", link("125", 0)),
                ("lora_name", lit("Qwen-Image-Lightning-8steps-V1.0.safetensors")),
                ("strength_model", lit(1.0)),
            ],
        ),
    );
    g.insert(
        LOAD_IMAGE_NODE,
        node(
            "LoadImage",
            [("image", lit(INPUT_IMAGE_PLACEHOLDER)), ("upload", lit("image"))],
        ),
    );
    g.insert(
        "39",
        node(
            "ImageScaleToTotalPixels",
            [
                ("image", link(LOAD_IMAGE_NODE, 0)),
                ("upscale_method", lit("lanczos")),
                ("megapixels", lit(1)),
                ("resolution_steps", lit(1)),
            ],
        ),
    );
    g.insert(
        "10",
        node("VAEEncode", [("pixels", link("39", 0)), ("vae", link("22", 0))]),
    );
    g.insert(
        POSITIVE_PROMPT_NODE,
        node(
            "TextEncodeQwenImageEditPlus",
            [
                ("clip", link("76", 0)),
                ("vae", link("22", 0)),
                ("image1", link("39", 0)),
                ("text", lit(PROMPT_PLACEHOLDER)),
            ],
        ),
    );
    g.insert(
        "3",
        node(
            "TextEncodeQwenImageEditPlus",
            [
                ("clip", link("76", 0)),
                ("vae", link("22", 0)),
                ("image1", link("39", 0)),
                ("text", lit("")),
            ],
        ),
    );
    g.insert(
        "2",
        node("ModelSamplingAuraFlow", [("model", link("20", 0)), ("shift", lit(3))]),
    );
    g.insert("1", node("CFGNorm", [("model", link("2", 0)), ("strength", lit(1))]));
    g.insert(
        SAMPLER_NODE,
        node(
            "KSampler",
            [
                ("model", link("1", 0)),
                ("positive", link(POSITIVE_PROMPT_NODE, 0)),
                ("negative", link("3", 0)),
                ("latent_image", link("10", 0)),
                ("seed", lit(SEED_PLACEHOLDER)),
                ("control_after_generate", lit("randomize")),
                ("steps", lit(STEPS_PLACEHOLDER)),
                ("cfg", lit(CFG_PLACEHOLDER)),
                ("sampler_name", lit("euler")),
                ("scheduler", lit("simple")),
                ("denoise", lit(1.0)),
            ],
        ),
    );
    g.insert(
        "12",
        node("VAEDecode", [("samples", link(SAMPLER_NODE, 0)), ("vae", link("22", 0))]),
    );
    g.insert(
        SAVE_IMAGE_NODE,
        node(
            "SaveImage",
            [
                ("images", link("12", 0)),
                ("filename_prefix", lit(OUTPUT_PREFIX_PLACEHOLDER)),
            ],
        ),
    );

    g
}

// ---------------------------------------------------------------------------
// Parameter injector
// ---------------------------------------------------------------------------

/// A fully parameterized graph plus the seed it was built with.
#[derive(Debug, Clone)]
pub struct InjectedGraph {
    pub graph: JobGraph,
    pub seed: u64,
}

/// Produce a concrete job graph from `template` and `params`.
///
/// The template is never modified. Every designated slot is checked before
/// anything is written, values are written verbatim (only the seed is
/// resolved), and the result is checked for leftover placeholders.
///
/// Range validation of `steps` and `cfg_scale` is the caller's job.
pub fn inject(
    template: &JobGraph,
    params: &GenerationParameters,
) -> Result<InjectedGraph, WorkflowError> {
    for (node_id, input) in SUBSTITUTED_SLOTS {
        template.require_literal_slot(node_id, input)?;
    }

    let seed = resolve_seed(params.seed.as_ref())?;

    let mut graph = template.clone();
    graph.set_literal(LOAD_IMAGE_NODE, "image", json!(params.input_image_ref));
    graph.set_literal(POSITIVE_PROMPT_NODE, "text", json!(params.prompt));
    graph.set_literal(SAMPLER_NODE, "steps", json!(params.steps));
    graph.set_literal(SAMPLER_NODE, "cfg", json!(params.cfg_scale));
    graph.set_literal(SAMPLER_NODE, "seed", json!(seed));
    graph.set_literal(SAVE_IMAGE_NODE, "filename_prefix", json!(params.output_prefix));

    let leftover = graph.placeholders();
    if !leftover.is_empty() {
        let slots: Vec<String> = leftover
            .iter()
            .map(|(node_id, input)| format!("{node_id}.{input}"))
            .collect();
        return Err(WorkflowError::MalformedTemplate(format!(
            "unresolved placeholders remain: {}",
            slots.join(", ")
        )));
    }

    Ok(InjectedGraph { graph, seed })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
