// src/sema/symbols.rs

use rustc_hash::FxHashMap;

use crate::sema::type_arena::TypeId;

/// A named binding with its type and mutability.
///
/// `index` is the insertion position inside the owning table; downstream
/// passes rely on it for slot allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub value_type: TypeId,
    pub mutable: bool,
    pub index: usize,
}

/// An ordered symbol table with optional parent chaining.
///
/// Attribute tables are flat; locals chain to the enclosing scope. Lookup
/// misses return `None`; callers that previously read a null-symbol's type
/// substitute the database Dynamic type instead.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    by_name: FxHashMap<String, usize>,
    parent: Option<Box<SymbolTable>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: SymbolTable) -> Self {
        Self {
            parent: Some(Box::new(parent)),
            ..Self::default()
        }
    }

    /// Define a symbol, replacing any binding with the same name in this
    /// table while keeping its original position.
    pub fn define(&mut self, name: impl Into<String>, value_type: TypeId, mutable: bool) -> usize {
        let name = name.into();

        if let Some(&index) = self.by_name.get(&name) {
            self.symbols[index] = Symbol {
                name,
                value_type,
                mutable,
                index,
            };
            return index;
        }

        let index = self.symbols.len();
        self.by_name.insert(name.clone(), index);
        self.symbols.push(Symbol {
            name,
            value_type,
            mutable,
            index,
        });
        index
    }

    /// Look a name up in this table only.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.by_name.get(name).map(|&index| &self.symbols[index])
    }

    /// Look a name up in this table, then in the parent chain.
    pub fn lookup_with_parent(&self, name: &str) -> Option<&Symbol> {
        self.lookup(name)
            .or_else(|| self.parent.as_ref().and_then(|p| p.lookup_with_parent(name)))
    }

    pub fn lookup_with_parent_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        if let Some(&index) = self.by_name.get(name) {
            return Some(&mut self.symbols[index]);
        }
        self.parent
            .as_mut()
            .and_then(|p| p.lookup_with_parent_mut(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Symbol at an insertion index, this table only.
    pub fn at_index(&self, index: usize) -> Option<&Symbol> {
        self.symbols.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn into_parent(self) -> Option<SymbolTable> {
        self.parent.map(|b| *b)
    }
}
