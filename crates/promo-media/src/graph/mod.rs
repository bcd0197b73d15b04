//! Filter graph construction.
//!
//! Graphs are assembled as a typed list of [`FilterNode`]s and only turned
//! into a `-filter_complex` string at the very end. [`FilterGraph::validate`]
//! checks pin wiring against the positional input list before FFmpeg sees
//! anything.

mod builder;
mod inputs;
mod node;

pub use builder::{BuiltGraph, GraphBuilder, GraphSources, CORNER_MARGIN_PX, VIDEO_OUT};
pub use inputs::{InputEntry, InputList, InputRole};
pub use node::{quoted, secs, FilterNode, FilterParam, Pin, StreamType};

use std::collections::{HashMap, HashSet};

use crate::error::{MediaError, MediaResult};

/// Ordered filter nodes plus the labels mapped into the output file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterGraph {
    nodes: Vec<FilterNode>,
    outputs: Vec<String>,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: FilterNode) {
        self.nodes.push(node);
    }

    pub fn extend(&mut self, nodes: impl IntoIterator<Item = FilterNode>) {
        self.nodes.extend(nodes);
    }

    /// Mark a label as a final output pin (mapped with `-map`).
    pub fn add_output(&mut self, label: impl Into<String>) {
        self.outputs.push(label.into());
    }

    pub fn nodes(&self) -> &[FilterNode] {
        &self.nodes
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn find(&self, name: &str) -> impl Iterator<Item = &FilterNode> {
        let name = name.to_string();
        self.nodes.iter().filter(move |n| n.name == name)
    }

    /// Labels of every positional input consumed by the graph.
    pub fn referenced_inputs(&self) -> HashSet<usize> {
        self.nodes
            .iter()
            .flat_map(|n| n.inputs.iter())
            .filter_map(|pin| match pin {
                Pin::Input { index, .. } => Some(*index),
                Pin::Label(_) => None,
            })
            .collect()
    }

    /// Check pin wiring against `input_count` positional inputs.
    ///
    /// Every label is created once, consumed once unless it is a final
    /// output, and only consumed after its producer. Positional indices
    /// must be in range.
    pub fn validate(&self, input_count: usize) -> MediaResult<()> {
        if self.outputs.is_empty() {
            return Err(MediaError::graph_invariant("graph has no output pins"));
        }

        let mut produced: HashSet<&str> = HashSet::new();
        let mut consumed: HashMap<&str, usize> = HashMap::new();

        for (position, node) in self.nodes.iter().enumerate() {
            for pin in &node.inputs {
                match pin {
                    Pin::Input { index, .. } if *index >= input_count => {
                        return Err(MediaError::graph_invariant(format!(
                            "node {} ({}) reads input {} but only {} inputs exist",
                            position, node.name, index, input_count
                        )));
                    }
                    Pin::Input { .. } => {}
                    Pin::Label(label) => {
                        if !produced.contains(label.as_str()) {
                            return Err(MediaError::graph_invariant(format!(
                                "node {} ({}) reads pin [{}] which was not created before it",
                                position, node.name, label
                            )));
                        }
                        let uses = consumed.entry(label.as_str()).or_insert(0);
                        *uses += 1;
                        if *uses > 1 {
                            return Err(MediaError::graph_invariant(format!(
                                "pin [{}] is consumed more than once",
                                label
                            )));
                        }
                    }
                }
            }

            for label in &node.outputs {
                if !produced.insert(label.as_str()) {
                    return Err(MediaError::graph_invariant(format!(
                        "output label [{}] is created twice",
                        label
                    )));
                }
            }
        }

        let mut final_outputs = HashSet::new();
        for label in &self.outputs {
            if !produced.contains(label.as_str()) {
                return Err(MediaError::graph_invariant(format!(
                    "output pin [{}] is never created",
                    label
                )));
            }
            if consumed.contains_key(label.as_str()) {
                return Err(MediaError::graph_invariant(format!(
                    "output pin [{}] is also consumed inside the graph",
                    label
                )));
            }
            if !final_outputs.insert(label.as_str()) {
                return Err(MediaError::graph_invariant(format!(
                    "output pin [{}] is mapped twice",
                    label
                )));
            }
        }

        for label in &produced {
            if !consumed.contains_key(label) && !final_outputs.contains(label) {
                return Err(MediaError::graph_invariant(format!(
                    "pin [{}] is created but never used",
                    label
                )));
            }
        }

        Ok(())
    }

    /// Serialize to a `-filter_complex` argument.
    pub fn to_filter_complex(&self) -> String {
        self.nodes
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(";")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple_graph() -> FilterGraph {
        let mut graph = FilterGraph::new();
        graph.push(FilterNode::new("scale").input(Pin::video(0)).param("w", 640).param("h", 360).output("s0"));
        graph.push(FilterNode::new("format").input(Pin::label("s0")).param("pix_fmts", "yuv420p").output("vout"));
        graph.push(FilterNode::new("volume").input(Pin::audio(1)).positional("1.0").output("aout"));
        graph.add_output("vout");
        graph.add_output("aout");
        graph
    }

    #[test]
    fn test_valid_graph_serializes() {
        let graph = simple_graph();
        graph.validate(2).unwrap();
        assert_eq!(
            graph.to_filter_complex(),
            "[0:v]scale=w=640:h=360[s0];[s0]format=pix_fmts=yuv420p[vout];[1:a]volume=1.0[aout]"
        );
        assert_eq!(graph.referenced_inputs(), HashSet::from([0, 1]));
    }

    #[test]
    fn test_input_out_of_range() {
        let err = simple_graph().validate(1).unwrap_err();
        assert!(matches!(err, MediaError::GraphInvariant(_)));
    }

    #[test]
    fn test_unknown_pin_rejected() {
        let mut graph = simple_graph();
        graph.push(FilterNode::new("null").input(Pin::label("ghost")).output("g2"));
        assert!(graph.validate(2).is_err());
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let mut graph = FilterGraph::new();
        graph.push(FilterNode::new("null").input(Pin::video(0)).output("v"));
        graph.push(FilterNode::new("null").input(Pin::video(1)).output("v"));
        graph.add_output("v");
        assert!(graph.validate(2).is_err());
    }

    #[test]
    fn test_dangling_label_rejected() {
        let mut graph = simple_graph();
        graph.push(FilterNode::new("anull").input(Pin::audio(1)).output("unused"));
        let err = graph.validate(2).unwrap_err();
        assert!(err.to_string().contains("never used"));
    }

    #[test]
    fn test_double_consumption_rejected() {
        let mut graph = FilterGraph::new();
        graph.push(FilterNode::new("null").input(Pin::video(0)).output("a"));
        graph.push(FilterNode::new("hstack").input(Pin::label("a")).input(Pin::label("a")).output("vout"));
        graph.add_output("vout");
        assert!(graph.validate(1).is_err());
    }

    #[test]
    fn test_missing_outputs_rejected() {
        let mut graph = FilterGraph::new();
        graph.push(FilterNode::new("null").input(Pin::video(0)).output("v"));
        assert!(graph.validate(1).is_err());
        graph.add_output("missing");
        assert!(graph.validate(1).is_err());
    }
}
