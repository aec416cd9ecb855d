// src/sema/module.rs

use crate::sema::database::TypeDatabase;
use crate::sema::symbols::{Symbol, SymbolTable};
use crate::sema::type_arena::TypeId;

/// The per-module result of the pass: the module's own type, its body
/// block, its globals, and the modules it imported.
///
/// Globals hold every imported symbol and every non-block top-level
/// declaration; methods never leak into them.
#[derive(Debug)]
pub struct ModuleRecord {
    pub name: String,
    pub type_id: TypeId,
    pub body_block: TypeId,
    pub globals: SymbolTable,
    pub imports: Vec<String>,
    pub defines_module_type: bool,
}

impl ModuleRecord {
    pub fn new(
        name: impl Into<String>,
        type_id: TypeId,
        body_block: TypeId,
        defines_module_type: bool,
    ) -> Self {
        Self {
            name: name.into(),
            type_id,
            body_block,
            globals: SymbolTable::new(),
            imports: Vec::new(),
            defines_module_type,
        }
    }

    pub fn define_global(&mut self, name: impl Into<String>, value_type: TypeId, mutable: bool) {
        self.globals.define(name, value_type, mutable);
    }

    pub fn global(&self, name: &str) -> Option<&Symbol> {
        self.globals.lookup(name)
    }

    /// Whether the module's own type answers a message.
    pub fn responds_to_message(&self, db: &TypeDatabase, name: &str) -> bool {
        db.responds_to(self.type_id, name)
    }
}
