use petgraph::stable_graph::NodeIndex;

use super::{AscGraph, DataType, NodeContext, TensorAttr, TensorShapeDescriptor};
use crate::HardwareConfig;

/// Translate one IR tensor. An element size the IR leaves out is taken from
/// the data type, or 4 bytes if the type is unknown.
pub fn describe(attr: &TensorAttr) -> TensorShapeDescriptor {
    let data_type = DataType::from_name(&attr.dtype);
    let data_type_size = attr.dtype_size.or_else(|| data_type.size()).unwrap_or_else(|| {
        tracing::debug!(dtype = %attr.dtype, "unknown element size, assuming 4 bytes");
        4
    });
    TensorShapeDescriptor {
        data_type,
        data_type_size,
        location: attr.location,
        dims: attr.dims.clone(),
        repeats: attr.repeats.clone(),
        strides: attr.strides.clone(),
        gm_strides: attr.gm_strides.clone(),
    }
}

/// Input and output descriptors of a node, inputs in slot order
pub fn node_descriptors(
    graph: &AscGraph,
    id: NodeIndex,
) -> (Vec<TensorShapeDescriptor>, Vec<TensorShapeDescriptor>) {
    let inputs = graph.inputs(id).into_iter().map(describe).collect();
    let outputs = graph.outputs(id).iter().map(describe).collect();
    (inputs, outputs)
}

pub fn node_context(
    graph: &AscGraph,
    id: NodeIndex,
    hardware: &HardwareConfig,
) -> Option<NodeContext> {
    graph
        .node(id)
        .map(|n| NodeContext::new(&n.name, &n.op_type).with_hardware(hardware.clone()))
}

/// Where a node sits relative to global memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum BoundaryKind {
    /// Reads global memory into on-chip buffers
    Load,
    /// Writes results back to global memory
    Store,
    Compute,
}

pub fn classify_boundary(
    inputs: &[TensorShapeDescriptor],
    outputs: &[TensorShapeDescriptor],
) -> BoundaryKind {
    let global = |t: &TensorShapeDescriptor| t.location.is_global();
    if outputs.iter().any(global) {
        BoundaryKind::Store
    } else if inputs.iter().any(global) {
        BoundaryKind::Load
    } else {
        BoundaryKind::Compute
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::HardwareLocation;
    use tileperf_symbolic::Expr;

    #[test]
    fn test_describe() {
        let attr = TensorAttr::new("bfloat16", vec![Expr::symbol("s"), Expr::int(64)]).in_global();
        let t = describe(&attr);
        assert_eq!(t.data_type, DataType::BFloat16);
        assert_eq!(t.data_type_size, 2);
        assert_eq!(t.location, HardwareLocation::Gm);
        assert_eq!(t.strides, vec![Expr::int(64), Expr::one()]);

        let odd = describe(&TensorAttr::new("complex32", vec![Expr::int(2)]));
        assert_eq!(odd.data_type, DataType::Other("complex32".into()));
        assert_eq!(odd.data_type_size, 4);
    }

    #[test]
    fn test_boundaries() {
        let mut g = AscGraph::new();
        let dims = vec![Expr::int(16)];
        let x = g.add_node("x", "Data", vec![TensorAttr::new("float16", dims.clone()).in_global()]);
        let ld = g.add_node("ld", "Load", vec![TensorAttr::new("float16", dims.clone())]);
        let abs = g.add_node("abs", "Abs", vec![TensorAttr::new("float16", dims.clone())]);
        let st = g.add_node("st", "Store", vec![TensorAttr::new("float16", dims).in_global()]);
        g.connect(x, 0, ld, 0);
        g.connect(ld, 0, abs, 0);
        g.connect(abs, 0, st, 0);

        let kind = |id| {
            let (i, o) = node_descriptors(&g, id);
            classify_boundary(&i, &o)
        };
        assert_eq!(kind(ld), BoundaryKind::Load);
        assert_eq!(kind(abs), BoundaryKind::Compute);
        assert_eq!(kind(st), BoundaryKind::Store);
    }
}
