//! RON definition loader
//!
//! Accumulates definition documents from strings, files or directories into
//! one merged `CharacterDef`. Every section concatenates in load order;
//! duplicate ids across documents are rejected.

use crate::builder::build_character;
use crate::error::{Error, Result};
use crate::schema::CharacterDef;
use cadence_core::Character;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Loader for RON character definitions
#[derive(Debug, Default)]
pub struct Loader {
    def: CharacterDef,
    seen_resources: HashSet<String>,
    seen_states: HashSet<String>,
    seen_operations: HashSet<String>,
    seen_metas: HashSet<String>,
}

impl Loader {
    /// Create an empty loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a definition document from a RON string
    pub fn load_str(&mut self, content: &str) -> Result<()> {
        let doc: CharacterDef = ron::from_str(content)?;
        self.merge(doc)
    }

    /// Load a definition document from a RON file
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let content = fs::read_to_string(path.as_ref())?;
        self.load_str(&content)
    }

    /// Load every `.ron` file in a directory, recursively. Files load in
    /// directory-listing order, so definition order across files follows
    /// the filesystem.
    pub fn load_directory(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("not a directory: {path:?}"),
            )));
        }
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let file_path = entry.path();
            if file_path.extension().map(|e| e == "ron").unwrap_or(false) {
                self.load_file(&file_path)?;
            } else if file_path.is_dir() {
                self.load_directory(&file_path)?;
            }
        }
        Ok(())
    }

    fn merge(&mut self, doc: CharacterDef) -> Result<()> {
        if !doc.name.is_empty() {
            self.def.name = doc.name;
        }
        for resource in doc.resources {
            if !self.seen_resources.insert(resource.id.clone()) {
                return Err(Error::DuplicateDefinition(resource.id));
            }
            self.def.resources.push(resource);
        }
        for state in doc.states {
            if !self.seen_states.insert(state.id.clone()) {
                return Err(Error::DuplicateDefinition(state.id));
            }
            self.def.states.push(state);
        }
        for op in doc.operations {
            if !self.seen_operations.insert(op.id.clone()) {
                return Err(Error::DuplicateDefinition(op.id));
            }
            self.def.operations.push(op);
        }
        for meta in doc.metas {
            if !self.seen_metas.insert(meta.id.clone()) {
                return Err(Error::DuplicateDefinition(meta.id));
            }
            self.def.metas.push(meta);
        }
        self.def.regen_rules.extend(doc.regen_rules);
        self.def.trigger_rules.extend(doc.trigger_rules);
        Ok(())
    }

    /// The merged definitions loaded so far
    pub fn def(&self) -> &CharacterDef {
        &self.def
    }

    /// Finish loading and return the merged definitions
    pub fn finish(self) -> CharacterDef {
        self.def
    }

    /// Finish loading and assemble a validated character
    pub fn build(self) -> Result<Character> {
        build_character(&self.def)
    }
}
