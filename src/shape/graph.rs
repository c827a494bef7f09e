use petgraph::{
    stable_graph::{NodeIndex, StableGraph},
    visit::EdgeRef,
    Direction,
};
use tileperf_symbolic::Expr;

use super::{contiguous_strides, HardwareLocation};

/// Tensor attributes the way the graph IR stores them. Data types are
/// plain names; the element size may be left for the adapter to infer.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorAttr {
    pub dtype: String,
    pub dtype_size: Option<u32>,
    pub location: HardwareLocation,
    pub dims: Vec<Expr>,
    pub repeats: Vec<Expr>,
    pub strides: Vec<Expr>,
    pub gm_strides: Vec<Expr>,
}

impl TensorAttr {
    /// Dense tensor in UB
    pub fn new(dtype: impl Into<String>, dims: Vec<Expr>) -> Self {
        let strides = contiguous_strides(&dims);
        Self {
            dtype: dtype.into(),
            dtype_size: None,
            location: HardwareLocation::UB,
            repeats: dims.clone(),
            gm_strides: strides.clone(),
            strides,
            dims,
        }
    }

    pub fn in_global(mut self) -> Self {
        self.location = HardwareLocation::Gm;
        self
    }

    pub fn with_location(mut self, location: HardwareLocation) -> Self {
        self.location = location;
        self
    }

    pub fn with_gm_strides(mut self, gm_strides: Vec<Expr>) -> Self {
        self.gm_strides = gm_strides;
        self
    }
}

#[derive(Debug, Clone)]
pub struct AscNode {
    pub name: String,
    pub op_type: String,
    pub outputs: Vec<TensorAttr>,
}

/// Edge from a producer output to a consumer input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    pub input_order: u8,
    pub output_order: u8,
}

/// Minimal kernel graph: nodes own their output tensors, edges say which
/// output feeds which input.
#[derive(Debug, Clone, Default)]
pub struct AscGraph {
    pub graph: StableGraph<AscNode, Dependency>,
}

impl AscGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        op_type: impl Into<String>,
        outputs: Vec<TensorAttr>,
    ) -> NodeIndex {
        self.graph.add_node(AscNode {
            name: name.into(),
            op_type: op_type.into(),
            outputs,
        })
    }

    /// Feed output `output_order` of `src` into input `input_order` of `dst`
    pub fn connect(&mut self, src: NodeIndex, output_order: u8, dst: NodeIndex, input_order: u8) {
        self.graph.add_edge(
            src,
            dst,
            Dependency {
                input_order,
                output_order,
            },
        );
    }

    pub fn node(&self, id: NodeIndex) -> Option<&AscNode> {
        self.graph.node_weight(id)
    }

    /// Input tensors of `id`, ordered by input slot
    pub fn inputs(&self, id: NodeIndex) -> Vec<&TensorAttr> {
        let mut edges = self
            .graph
            .edges_directed(id, Direction::Incoming)
            .map(|e| (e.source(), *e.weight()))
            .collect::<Vec<_>>();
        edges.sort_by_key(|(_, d)| d.input_order);
        edges
            .into_iter()
            .filter_map(|(src, d)| self.graph[src].outputs.get(d.output_order as usize))
            .collect()
    }

    pub fn outputs(&self, id: NodeIndex) -> &[TensorAttr] {
        self.graph
            .node_weight(id)
            .map(|n| n.outputs.as_slice())
            .unwrap_or_default()
    }

    /// Nodes in dependency order, or the node a cycle was found at
    pub fn toposort(&self) -> Result<Vec<NodeIndex>, NodeIndex> {
        petgraph::algo::toposort(&self.graph, None).map_err(|c| c.node_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inputs_follow_slot_order() {
        let mut g = AscGraph::new();
        let x = g.add_node("x", "Data", vec![TensorAttr::new("float16", vec![Expr::int(4)])]);
        let y = g.add_node("y", "Data", vec![TensorAttr::new("float32", vec![Expr::int(8)])]);
        let add = g.add_node("add", "Add", vec![TensorAttr::new("float32", vec![Expr::int(8)])]);
        g.connect(y, 0, add, 1);
        g.connect(x, 0, add, 0);
        let dtypes = g.inputs(add).iter().map(|t| t.dtype.as_str()).collect::<Vec<_>>();
        assert_eq!(dtypes, ["float16", "float32"]);
        assert_eq!(g.toposort().unwrap().last(), Some(&add));
    }
}
