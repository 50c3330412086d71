//! Macro sources (`M1..Mn`).
//!
//! Each macro is a global unipolar source whose value is its own raw
//! parameter. They are written once per block.

use std::sync::Arc;

use polyvox_core::ParamRange;

use crate::error::EngineError;
use crate::mapping::{ModulationRegistry, SourceOutput, SourceSpec};
use crate::params::{AtomicParam, ParameterLayout, ParameterStore};

/// Name of macro `index` (0-based).
pub fn macro_name(index: usize) -> String {
    format!("M{}", index + 1)
}

/// Declare `count` macro parameters.
pub fn declare_params(layout: &mut ParameterLayout, count: usize) {
    for i in 0..count {
        layout.push(macro_name(i), ParamRange::linear(0.0, 1.0), 0.0);
    }
}

/// The bank of macro sources.
#[derive(Debug)]
pub struct Macros {
    names: Vec<String>,
    raws: Vec<Arc<AtomicParam>>,
    outputs: Vec<SourceOutput>,
}

impl Macros {
    /// Register `count` macros.
    pub fn new(
        count: usize,
        store: &ParameterStore,
        registry: &mut ModulationRegistry,
    ) -> Result<Self, EngineError> {
        let mut names = Vec::with_capacity(count);
        let mut raws = Vec::with_capacity(count);
        let mut outputs = Vec::with_capacity(count);
        for i in 0..count {
            let name = macro_name(i);
            raws.push(Arc::clone(&store.get(&name)?.raw));
            outputs.push(registry.register_source(SourceSpec {
                name: name.clone(),
                per_voice: false,
                bipolar: false,
                audio_rate: false,
                colour: 0xda70d6,
            })?);
            names.push(name);
        }
        Ok(Self { names, raws, outputs })
    }

    /// Source names.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Publish every used macro.
    pub fn frame(&mut self) {
        for (raw, output) in self.raws.iter().zip(&self.outputs) {
            if output.is_used() {
                output.write(0, raw.get().clamp(0.0, 1.0));
            }
        }
    }
}
