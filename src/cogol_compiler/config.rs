// Compiler configuration
//
// Loaded from an optional TOML file; every field has a default so an empty
// file (or no file at all) gives the standard layout.

use crate::cogol_compiler::error::CompilerError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Scratch cells reserved up front, right after the display cell
    pub initial_scratch_cells: usize,
    /// Extra `call[i]` cells named in the memory map after the call stack pointer
    pub call_stack_size: usize,
    /// Run the peephole pass over the resolved program
    pub optimize: bool,
    /// Append instruction labels to listing lines
    pub annotate_listing: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            initial_scratch_cells: 1,
            call_stack_size: 0,
            optimize: true,
            annotate_listing: false,
        }
    }
}

impl CompilerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, CompilerError> {
        toml::from_str(text).map_err(|e| CompilerError::ConfigError(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, CompilerError> {
        let text = fs::read_to_string(path).map_err(|e| {
            CompilerError::IOError(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&text)?;
        log::debug!("Loaded compiler configuration from {}: {:?}", path.display(), config);
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, CompilerError> {
        toml::to_string(self).map_err(|e| CompilerError::ConfigError(e.to_string()))
    }
}
