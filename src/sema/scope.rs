// src/sema/scope.rs

use crate::sema::database::TypeDatabase;
use crate::sema::symbols::SymbolTable;
use crate::sema::type_arena::TypeId;
use crate::sema::types::BlockKind;

/// The state of one traversal frame: the current `self`, the block being
/// filled in, and the innermost locals table.
#[derive(Debug)]
pub struct TypeScope {
    pub self_type: TypeId,
    pub block_type: TypeId,
    pub locals: SymbolTable,
}

impl TypeScope {
    pub fn new(self_type: TypeId, block_type: TypeId, locals: SymbolTable) -> Self {
        Self {
            self_type,
            block_type,
            locals,
        }
    }

    pub fn is_closure(&self, db: &TypeDatabase) -> bool {
        self.block_kind(db) == Some(BlockKind::Closure)
    }

    pub fn is_method(&self, db: &TypeDatabase) -> bool {
        self.block_kind(db) == Some(BlockKind::Method)
    }

    fn block_kind(&self, db: &TypeDatabase) -> Option<BlockKind> {
        db.get(self.block_type).as_block().map(|block| block.kind)
    }
}
