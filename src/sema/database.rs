// src/sema/database.rs
//
// The registry of built-in prototypes. One database is created per compile
// and shared by every module pass; during compilation it only grows.

use crate::sema::compatibility;
use crate::sema::symbols::Symbol;
use crate::sema::type_arena::{TypeArena, TypeId};
use crate::sema::types::{BlockKind, BlockType, ObjectType, TraitType, Type};

/// Name of the method instance attributes may be defined in
pub const INIT_METHOD: &str = "init";

/// Names of the blocks synthesized for a `try` expression
pub const TRY_BLOCK_NAME: &str = "@try";
pub const ELSE_BLOCK_NAME: &str = "@else";

/// Global under which a module's own type is registered
pub const MODULE_GLOBAL: &str = "ThisModule";

/// Attributes of the top-level type
pub const MODULE_ATTRIBUTE: &str = "Module";
pub const MODULES_ATTRIBUTE: &str = "Modules";

/// Reserved attribute holding an object's name
pub const OBJECT_NAME_ATTRIBUTE: &str = "$name";

/// Constants that may not be redefined by user code
pub const RESERVED_CONSTANTS: &[&str] = &[
    "Self",
    "Dyn",
    MODULE_GLOBAL,
    MODULE_ATTRIBUTE,
    MODULES_ATTRIBUTE,
    "Integer",
    "Float",
    "String",
    "Array",
    "Block",
    "Trait",
    "Object",
    "Nil",
    "True",
    "False",
    "Void",
];

/// Process-wide type registry: the arena plus the named prototypes every
/// module shares.
#[derive(Debug)]
pub struct TypeDatabase {
    arena: TypeArena,
    pub object_type: TypeId,
    pub trait_type: TypeId,
    pub block_type: TypeId,
    pub integer_type: TypeId,
    pub float_type: TypeId,
    pub string_type: TypeId,
    pub array_type: TypeId,
    pub nil_type: TypeId,
    pub true_type: TypeId,
    pub false_type: TypeId,
    pub void_type: TypeId,
    pub top_level: TypeId,
    /// Prototype every module type inherits from
    pub module_prototype: TypeId,
    /// Registry object holding every module type by qualified name
    pub modules_registry: TypeId,
    pub dynamic_type: TypeId,
    pub self_placeholder: TypeId,
}

impl TypeDatabase {
    pub fn new() -> Self {
        let mut arena = TypeArena::new();

        let object_type = arena.alloc(Type::object("Object", None));
        let trait_type = arena.alloc(Type::object("Trait", Some(object_type)));
        let block_type = arena.alloc(Type::object("Block", Some(object_type)));
        let integer_type = arena.alloc(Type::object("Integer", Some(object_type)));
        let float_type = arena.alloc(Type::object("Float", Some(object_type)));
        let string_type = arena.alloc(Type::object("String", Some(object_type)));
        let array_type = arena.alloc(Type::object("Array", Some(object_type)));
        let nil_type = arena.alloc(Type::object("Nil", Some(object_type)));
        let true_type = arena.alloc(Type::object("True", Some(object_type)));
        let false_type = arena.alloc(Type::object("False", Some(object_type)));
        let void_type = arena.alloc(Type::object("Void", Some(object_type)));
        let top_level = arena.alloc(Type::object("TopLevel", None));
        let module_prototype = arena.alloc(Type::object(MODULE_ATTRIBUTE, Some(object_type)));
        let modules_registry = arena.alloc(Type::object(MODULES_ATTRIBUTE, Some(object_type)));
        let dynamic_type = arena.alloc(Type::Dynamic);
        let self_placeholder = arena.alloc(Type::SelfType);

        let mut database = Self {
            arena,
            object_type,
            trait_type,
            block_type,
            integer_type,
            float_type,
            string_type,
            array_type,
            nil_type,
            true_type,
            false_type,
            void_type,
            top_level,
            module_prototype,
            modules_registry,
            dynamic_type,
            self_placeholder,
        };

        database.define_top_level_attributes();
        database
    }

    fn define_top_level_attributes(&mut self) {
        let prototypes = [
            ("Integer", self.integer_type),
            ("Float", self.float_type),
            ("String", self.string_type),
            ("Array", self.array_type),
            ("Block", self.block_type),
            ("Trait", self.trait_type),
            ("Object", self.object_type),
            ("Nil", self.nil_type),
            ("True", self.true_type),
            ("False", self.false_type),
            ("Void", self.void_type),
            (MODULE_ATTRIBUTE, self.module_prototype),
            (MODULES_ATTRIBUTE, self.modules_registry),
        ];

        let top_level = self.top_level;
        for (name, id) in prototypes {
            if let Some(attributes) = self.arena.get_mut(top_level).attributes_mut() {
                attributes.define(name, id, false);
            }
        }
    }

    pub fn alloc(&mut self, ty: Type) -> TypeId {
        self.arena.alloc(ty)
    }

    pub fn get(&self, id: TypeId) -> &Type {
        self.arena.get(id)
    }

    pub fn get_mut(&mut self, id: TypeId) -> &mut Type {
        self.arena.get_mut(id)
    }

    pub fn new_object(&mut self, name: impl Into<String>, prototype: Option<TypeId>) -> TypeId {
        self.arena.alloc(Type::Object(ObjectType::new(name, prototype)))
    }

    pub fn new_trait(&mut self, name: impl Into<String>) -> TypeId {
        let prototype = Some(self.trait_type);
        self.arena.alloc(Type::Trait(TraitType::new(name, prototype)))
    }

    /// A trait synthesized from a type-parameter constraint.
    pub fn new_generated_trait(&mut self, name: impl Into<String>) -> TypeId {
        let prototype = Some(self.trait_type);
        self.arena
            .alloc(Type::Trait(TraitType::generated(name, prototype)))
    }

    pub fn new_block(&mut self, name: impl Into<String>, kind: BlockKind) -> TypeId {
        let prototype = Some(self.block_type);
        self.arena
            .alloc(Type::Block(BlockType::new(name, kind, prototype)))
    }

    pub fn optional(&mut self, inner: TypeId) -> TypeId {
        self.arena.alloc(Type::Optional(inner))
    }

    pub fn is_void(&self, id: TypeId) -> bool {
        id == self.void_type
    }

    pub fn is_dynamic(&self, id: TypeId) -> bool {
        self.get(id).is_dynamic()
    }

    /// Attribute lookup on a single type, without prototype fallback.
    pub fn lookup_attribute(&self, id: TypeId, name: &str) -> Option<Symbol> {
        self.get(id)
            .attributes()
            .and_then(|table| table.lookup(name))
            .cloned()
    }

    /// Method lookup: the attribute table, then the prototype chain. Traits
    /// additionally answer with their required methods; constraints with
    /// the methods attached so far. The first match wins.
    pub fn lookup_method(&self, id: TypeId, name: &str) -> Option<Symbol> {
        let mut current = Some(id);

        while let Some(step) = current {
            match self.get(step) {
                Type::Object(object) => {
                    if let Some(symbol) = object.attributes.lookup(name) {
                        return Some(symbol.clone());
                    }
                }
                Type::Trait(traits) => {
                    if let Some(symbol) = traits.attributes.lookup(name) {
                        return Some(symbol.clone());
                    }
                    if let Some(symbol) = traits.required_methods.lookup(name) {
                        return Some(symbol.clone());
                    }
                }
                Type::Block(_) => {}
                Type::Optional(inner) => return self.lookup_method(*inner, name),
                Type::Constraint(constraint) => {
                    return constraint.required_methods.lookup(name).cloned();
                }
                Type::SelfType | Type::Dynamic => return None,
            }

            current = self.get(step).prototype();
        }

        None
    }

    pub fn responds_to(&self, id: TypeId, name: &str) -> bool {
        self.lookup_method(id, name).is_some()
    }

    /// Whether `target` appears in the prototype chain of `id`.
    pub fn prototype_chain_contains(&self, id: TypeId, target: TypeId) -> bool {
        let mut current = self.get(id).prototype();

        while let Some(step) = current {
            if step == target {
                return true;
            }
            current = self.get(step).prototype();
        }

        false
    }

    /// Whether a type implements a trait, either by advertising it or by
    /// structurally satisfying every requirement. Empty requirement sets
    /// verify successfully.
    pub fn implements_trait(&self, id: TypeId, trait_id: TypeId) -> bool {
        match self.get(id) {
            Type::Dynamic => return true,
            Type::Object(object) => {
                if object.implemented_traits.contains(&trait_id) {
                    return true;
                }
            }
            Type::Trait(traits) => {
                if traits.required_traits.contains(&trait_id) {
                    return true;
                }
            }
            Type::Optional(inner) => return self.implements_trait(*inner, trait_id),
            _ => {}
        }

        let Type::Trait(required) = self.get(trait_id) else {
            return false;
        };

        required
            .required_traits
            .iter()
            .all(|&sub| self.implements_trait(id, sub))
            && required
                .required_methods
                .iter()
                .all(|method| self.implements_method(id, method))
    }

    /// Whether a type defines a method compatible with a requirement.
    pub fn implements_method(&self, id: TypeId, required: &Symbol) -> bool {
        let Some(found) = self.lookup_method(id, &required.name) else {
            return false;
        };

        if !self.get(found.value_type).is_block() {
            return false;
        }

        compatibility::compatible(self, found.value_type, required.value_type)
    }

    /// Display name for diagnostics.
    pub fn type_name(&self, id: TypeId) -> String {
        match self.get(id) {
            Type::Optional(inner) => format!("?{}", self.type_name(*inner)),
            other => other.name().to_string(),
        }
    }
}

impl Default for TypeDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prototypes_are_registered_on_top_level() {
        let database = TypeDatabase::new();

        let integer = database.lookup_attribute(database.top_level, "Integer");
        assert_eq!(integer.map(|s| s.value_type), Some(database.integer_type));

        let module = database.lookup_attribute(database.top_level, MODULE_ATTRIBUTE);
        assert_eq!(module.map(|s| s.value_type), Some(database.module_prototype));
    }

    #[test]
    fn method_lookup_walks_prototype_chain() {
        let mut database = TypeDatabase::new();
        let block = database.new_block("to_string", BlockKind::Method);

        let object_type = database.object_type;
        if let Some(attributes) = database.get_mut(object_type).attributes_mut() {
            attributes.define("to_string", block, false);
        }

        let found = database.lookup_method(database.integer_type, "to_string");
        assert_eq!(found.map(|s| s.value_type), Some(block));
    }

    #[test]
    fn trait_lookup_includes_required_methods() {
        let mut database = TypeDatabase::new();
        let traits = database.new_trait("Inspect");
        let method = database.new_block("inspect", BlockKind::Method);

        if let Some(required) = database.get_mut(traits).as_trait_mut() {
            required.required_methods.define("inspect", method, false);
        }

        assert!(database.responds_to(traits, "inspect"));
        assert!(!database.responds_to(database.integer_type, "inspect"));
    }

    #[test]
    fn implements_trait_via_advertised_set() {
        let mut database = TypeDatabase::new();
        let traits = database.new_trait("Inspect");
        let method = database.new_block("inspect", BlockKind::Method);
        if let Some(t) = database.get_mut(traits).as_trait_mut() {
            t.required_methods.define("inspect", method, false);
        }

        let thing = database.new_object("Thing", Some(database.object_type));
        assert!(!database.implements_trait(thing, traits));

        if let Some(object) = database.get_mut(thing).as_object_mut() {
            object.implemented_traits.insert(traits);
        }
        assert!(database.implements_trait(thing, traits));
    }

    #[test]
    fn implements_trait_structurally() {
        let mut database = TypeDatabase::new();
        let traits = database.new_trait("Closeable");
        let required = database.new_block("close", BlockKind::Method);
        if let Some(t) = database.get_mut(traits).as_trait_mut() {
            t.required_methods.define("close", required, false);
        }

        let thing = database.new_object("Socket", Some(database.object_type));
        let close = database.new_block("close", BlockKind::Method);
        if let Some(attributes) = database.get_mut(thing).attributes_mut() {
            attributes.define("close", close, false);
        }

        assert!(database.implements_trait(thing, traits));
    }

    #[test]
    fn optional_type_names_use_prefix() {
        let mut database = TypeDatabase::new();
        let optional = database.optional(database.integer_type);

        assert_eq!(database.type_name(optional), "?Integer");
    }
}
