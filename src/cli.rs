//! Single-argument CLI: declaration model in, generated C on stdout.
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

/// generate JSON-dump C functions for every struct/enum in a declaration model
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    /// path to the declaration model the C front-end extracted from the header
    model: PathBuf,
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> anyhow::Result<()> {
        let source = std::fs::read_to_string(&self.model)
            .with_context(|| format!("failed to read declaration model {}", self.model.display()))?;
        let decls = load_declarations(&source)
            .with_context(|| format!("malformed declaration model {}", self.model.display()))?;

        let mut trace = std::io::stderr();
        let generated = crate::codegen::generate(&decls, &mut trace)?;
        print!("{generated}");
        Ok(())
    }
}

/// Decode the front-end's JSON form of the model, reporting the JSON path
/// at fault on failure.
fn load_declarations(source: &str) -> anyhow::Result<Vec<crate::ir::Declaration>> {
    let mut de = serde_json::Deserializer::from_str(source);
    let decls = serde_path_to_error::deserialize(&mut de)?;
    Ok(decls)
}
