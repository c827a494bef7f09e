use serde::{Deserialize, Serialize};
use tileperf_symbolic::Expr;

use crate::ConfigError;

/// Hardware parameters the cost laws are expressed against.
///
/// Every field has a default, so a JSON document only needs to name the
/// values it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// Name of the symbol standing for the number of active cores
    pub block_dim_symbol: String,
    /// Unified buffer block size in bytes. Transfers that are not a multiple
    /// of it pay `unaligned_penalty`.
    pub ub_align_bytes: i64,
    pub unaligned_penalty: i64,
    /// Bursts shorter than this many bytes use the small-block DMA law
    pub dma_small_block_threshold: i64,
    /// Per-core bytes above which select/compare ops stream instead of buffering
    pub select_stream_threshold: i64,
    /// Edge of the square block the cube unit works on
    pub cube_fractal: i64,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            block_dim_symbol: "block_dim".to_string(),
            ub_align_bytes: 32,
            unaligned_penalty: 2,
            dma_small_block_threshold: 25000,
            select_stream_threshold: 8192,
            cube_fractal: 16,
        }
    }
}

impl HardwareConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn block_dim(&self) -> Expr {
        Expr::symbol(&self.block_dim_symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json() {
        let cfg = HardwareConfig::from_json(r#"{ "dma_small_block_threshold": 4096 }"#).unwrap();
        assert_eq!(cfg.dma_small_block_threshold, 4096);
        assert_eq!(cfg.block_dim_symbol, "block_dim");
        assert_eq!(cfg.ub_align_bytes, 32);
    }

    #[test]
    fn test_bad_json() {
        assert!(HardwareConfig::from_json(r#"{ "ub_align_bytes": "wide" }"#).is_err());
    }
}
