use petgraph::stable_graph::NodeIndex;
use rayon::prelude::*;

use crate::{
    perf::{lookup, PerfResult},
    shape::{
        classify_boundary, node_context, node_descriptors, AscGraph, BoundaryKind, NodeContext,
        TensorShapeDescriptor,
    },
    CostError, HardwareConfig, ModelError,
};

/// Entry point for costing nodes and graphs against one hardware config.
#[derive(Debug, Clone, Default)]
pub struct PerfModel {
    hardware: HardwareConfig,
}

/// Costs of every modeled node, and their sum.
#[derive(Debug, Clone, Default)]
pub struct GraphPerf {
    /// In dependency order
    pub nodes: Vec<(NodeIndex, PerfResult)>,
    /// Names of nodes whose op kind has no cost function
    pub unmodeled: Vec<String>,
    /// Per-pipe sum over `nodes`, holding every node's ternaries
    pub total: PerfResult,
}

impl PerfModel {
    pub fn new(hardware: HardwareConfig) -> Self {
        Self { hardware }
    }

    pub fn hardware(&self) -> &HardwareConfig {
        &self.hardware
    }

    /// Op kind to cost a node as. Boundary nodes always use the data-movement
    /// laws, whatever the IR calls them.
    pub fn cost_kind<'a>(&self, op_type: &'a str, boundary: BoundaryKind) -> &'a str {
        match boundary {
            BoundaryKind::Load => "Load",
            BoundaryKind::Store => "Store",
            BoundaryKind::Compute => op_type,
        }
    }

    /// Cost one op instance. `None` if its kind is not modeled.
    pub fn evaluate(
        &self,
        ctx: &NodeContext,
        inputs: &[TensorShapeDescriptor],
        outputs: &[TensorShapeDescriptor],
    ) -> Result<Option<PerfResult>, CostError> {
        let kind = self.cost_kind(&ctx.op_type, classify_boundary(inputs, outputs));
        match lookup(kind) {
            Some(cost_fn) => cost_fn(inputs, outputs, ctx).map(Some),
            None => Ok(None),
        }
    }

    /// Cost one graph node. Source nodes (no inputs) hold graph inputs and
    /// cost nothing, so they yield `None` like unmodeled ops.
    pub fn evaluate_node(
        &self,
        graph: &AscGraph,
        id: NodeIndex,
    ) -> Result<Option<PerfResult>, ModelError> {
        let ctx = node_context(graph, id, &self.hardware)
            .ok_or(ModelError::NodeNotFound(id.index()))?;
        let (inputs, outputs) = node_descriptors(graph, id);
        if inputs.is_empty() {
            return Ok(None);
        }
        self.evaluate(&ctx, &inputs, &outputs)
            .map_err(|source| ModelError::Cost {
                node: ctx.name.clone(),
                source,
            })
    }

    /// Cost every node in parallel, then sum per pipe in dependency order.
    pub fn evaluate_graph(&self, graph: &AscGraph) -> Result<GraphPerf, ModelError> {
        let order = graph.toposort().map_err(|id| ModelError::Cycle {
            node: graph
                .node(id)
                .map(|n| n.name.clone())
                .unwrap_or_else(|| id.index().to_string()),
        })?;
        let results = order
            .par_iter()
            .map(|&id| self.evaluate_node(graph, id).map(|r| (id, r)))
            .collect::<Result<Vec<_>, ModelError>>()?;

        let mut perf = GraphPerf::default();
        for (id, result) in results {
            match result {
                Some(result) => {
                    perf.total
                        .merge(result.clone())
                        .map_err(|source| ModelError::Cost {
                            node: graph.graph[id].name.clone(),
                            source: source.into(),
                        })?;
                    perf.nodes.push((id, result));
                }
                None => {
                    let node = &graph.graph[id];
                    if !graph.inputs(id).is_empty() {
                        tracing::debug!(
                            node = %node.name,
                            op_type = %node.op_type,
                            "no cost model"
                        );
                        perf.unmodeled.push(node.name.clone());
                    }
                }
            }
        }
        Ok(perf)
    }
}
