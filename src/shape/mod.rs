mod adapter;
pub use adapter::*;
mod graph;
pub use graph::*;

use tileperf_symbolic::Expr;

use crate::HardwareConfig;

/// Element data type of a tensor. Names the model has no calibration for are
/// kept verbatim in `Other` and costed with generic laws.
#[derive(Debug, Clone, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum DataType {
    Float16,
    BFloat16,
    Float32,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Bool,
    #[strum(default)]
    Other(String),
}

impl DataType {
    /// Parse a type name. Never fails: unknown names land in `Other`.
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| DataType::Other(name.to_string()))
    }

    /// Size in bytes, if the type is known
    pub fn size(&self) -> Option<u32> {
        match self {
            DataType::Int8 | DataType::UInt8 | DataType::Bool => Some(1),
            DataType::Float16 | DataType::BFloat16 | DataType::Int16 | DataType::UInt16 => Some(2),
            DataType::Float32 | DataType::Int32 | DataType::UInt32 => Some(4),
            DataType::Int64 | DataType::UInt64 => Some(8),
            DataType::Other(_) => None,
        }
    }
}

/// Where a tensor lives. Global memory first, then the on-chip buffers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
pub enum HardwareLocation {
    #[strum(serialize = "GM")]
    Gm,
    L1,
    L0A,
    L0B,
    L0C,
    UB,
}

impl HardwareLocation {
    pub fn is_global(self) -> bool {
        self == HardwareLocation::Gm
    }
}

/// Everything a cost function needs to know about one tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorShapeDescriptor {
    pub data_type: DataType,
    /// Bytes per element
    pub data_type_size: u32,
    pub location: HardwareLocation,
    pub dims: Vec<Expr>,
    pub repeats: Vec<Expr>,
    /// Strides in the local (on-chip) buffer, in elements
    pub strides: Vec<Expr>,
    /// Strides in global memory, in elements
    pub gm_strides: Vec<Expr>,
}

impl TensorShapeDescriptor {
    /// A densely packed UB tensor. Unknown types default to 4-byte elements.
    pub fn new(data_type: DataType, dims: Vec<Expr>) -> Self {
        let strides = contiguous_strides(&dims);
        Self {
            data_type_size: data_type.size().unwrap_or(4),
            data_type,
            location: HardwareLocation::UB,
            repeats: dims.clone(),
            gm_strides: strides.clone(),
            strides,
            dims,
        }
    }

    pub fn with_location(mut self, location: HardwareLocation) -> Self {
        self.location = location;
        self
    }

    pub fn with_data_type_size(mut self, size: u32) -> Self {
        self.data_type_size = size;
        self
    }

    pub fn with_repeats(mut self, repeats: Vec<Expr>) -> Self {
        self.repeats = repeats;
        self
    }

    pub fn with_strides(mut self, strides: Vec<Expr>) -> Self {
        self.strides = strides;
        self
    }

    pub fn with_gm_strides(mut self, gm_strides: Vec<Expr>) -> Self {
        self.gm_strides = gm_strides;
        self
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Product of all dims
    pub fn element_count(&self) -> Expr {
        self.dims.iter().cloned().product()
    }

    pub fn total_bytes(&self) -> Expr {
        self.element_count() * self.data_type_size
    }
}

/// Row-major strides for `dims`, innermost stride 1.
pub fn contiguous_strides(dims: &[Expr]) -> Vec<Expr> {
    let mut strides = vec![Expr::one(); dims.len()];
    for i in (0..dims.len().saturating_sub(1)).rev() {
        strides[i] = &strides[i + 1] * &dims[i + 1];
    }
    strides
}

/// Per-node information handed to every cost function next to the tensors.
#[derive(Debug, Clone, Default)]
pub struct NodeContext {
    pub name: String,
    pub op_type: String,
    pub hardware: HardwareConfig,
}

impl NodeContext {
    pub fn new(name: impl Into<String>, op_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op_type: op_type.into(),
            hardware: HardwareConfig::default(),
        }
    }

    pub fn with_hardware(mut self, hardware: HardwareConfig) -> Self {
        self.hardware = hardware;
        self
    }

    /// Prefix for placeholders this node registers
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.op_type
        } else {
            &self.name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_names() {
        assert_eq!(DataType::from_name("bfloat16"), DataType::BFloat16);
        assert_eq!(DataType::from_name("uint8"), DataType::UInt8);
        assert_eq!(DataType::UInt32.to_string(), "uint32");
        assert_eq!(DataType::Float16.to_string(), "float16");
        // Unknown and differently cased names are kept as written
        let unknown = DataType::from_name("float8_e4m3");
        assert_eq!(unknown, DataType::Other("float8_e4m3".to_string()));
        assert_eq!(unknown.to_string(), "float8_e4m3");
        assert_eq!(unknown.size(), None);
        assert_eq!(DataType::from_name("Float16"), DataType::Other("Float16".to_string()));
    }
}
