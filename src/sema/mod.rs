// src/sema/mod.rs
pub mod checker;
pub mod compatibility;
pub mod database;
pub mod instantiate;
pub mod module;
pub mod scope;
pub mod symbols;
pub mod type_arena;
pub mod types;

pub use checker::Checker;
pub use database::TypeDatabase;
pub use instantiate::CallInstances;
pub use module::ModuleRecord;
pub use scope::TypeScope;
pub use symbols::{Symbol, SymbolTable};
pub use type_arena::{TypeArena, TypeId};
pub use types::{BlockKind, BlockType, ConstraintType, ObjectType, TraitType, Type};
