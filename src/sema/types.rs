// src/sema/types.rs

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::sema::symbols::{Symbol, SymbolTable};
use crate::sema::type_arena::TypeId;

/// The kind of a block type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Closure,
    Method,
    TryBlock,
    ElseBlock,
}

/// Ordered table of type parameters, each backed by a generated trait.
/// Most types declare at most a handful, so entries live inline.
#[derive(Debug, Clone, Default)]
pub struct TypeParameters {
    params: SmallVec<[(String, TypeId); 4]>,
}

impl TypeParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: impl Into<String>, parameter: TypeId) {
        let name = name.into();
        if let Some(entry) = self.params.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = parameter;
        } else {
            self.params.push((name, parameter));
        }
    }

    pub fn get(&self, name: &str) -> Option<TypeId> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, id)| *id)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.iter().any(|(n, _)| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, TypeId)> {
        self.params.iter().map(|(n, id)| (n.as_str(), *id))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Concrete types bound to a receiver's type parameters, keyed by the
/// parameter name. Fresh bindings win only when the name is unbound.
#[derive(Debug, Clone, Default)]
pub struct ParameterInstances {
    map: FxHashMap<String, TypeId>,
}

impl ParameterInstances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<TypeId> {
        self.map.get(name).copied()
    }

    pub fn bind(&mut self, name: impl Into<String>, instance: TypeId) {
        self.map.entry(name.into()).or_insert(instance);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, TypeId)> {
        self.map.iter().map(|(n, id)| (n.as_str(), *id))
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// A named object with prototype-based attribute fallback. Methods are
/// attributes whose type is a block.
#[derive(Debug, Clone)]
pub struct ObjectType {
    pub name: String,
    pub prototype: Option<TypeId>,
    pub attributes: SymbolTable,
    pub implemented_traits: FxHashSet<TypeId>,
    pub type_parameters: TypeParameters,
    pub type_parameter_instances: ParameterInstances,
}

impl ObjectType {
    pub fn new(name: impl Into<String>, prototype: Option<TypeId>) -> Self {
        Self {
            name: name.into(),
            prototype,
            attributes: SymbolTable::new(),
            implemented_traits: FxHashSet::default(),
            type_parameters: TypeParameters::new(),
            type_parameter_instances: ParameterInstances::new(),
        }
    }
}

/// A trait: required methods and required sub-traits on top of the object
/// structure. `generated` marks traits synthesized from type parameters.
#[derive(Debug, Clone)]
pub struct TraitType {
    pub name: String,
    pub prototype: Option<TypeId>,
    pub attributes: SymbolTable,
    pub required_methods: SymbolTable,
    pub required_traits: FxHashSet<TypeId>,
    pub type_parameters: TypeParameters,
    pub type_parameter_instances: ParameterInstances,
    pub generated: bool,
}

impl TraitType {
    pub fn new(name: impl Into<String>, prototype: Option<TypeId>) -> Self {
        Self {
            name: name.into(),
            prototype,
            attributes: SymbolTable::new(),
            required_methods: SymbolTable::new(),
            required_traits: FxHashSet::default(),
            type_parameters: TypeParameters::new(),
            type_parameter_instances: ParameterInstances::new(),
            generated: false,
        }
    }

    pub fn generated(name: impl Into<String>, prototype: Option<TypeId>) -> Self {
        Self {
            generated: true,
            ..Self::new(name, prototype)
        }
    }
}

/// The common type of closures and methods. The argument at index 0 is
/// always the implicit `self`.
#[derive(Debug, Clone)]
pub struct BlockType {
    pub name: String,
    pub kind: BlockKind,
    pub prototype: Option<TypeId>,
    pub arguments: SymbolTable,
    /// Number of arguments without a default, excluding `self` and rest
    pub required_arguments: usize,
    pub rest_argument: bool,
    pub returns: Option<TypeId>,
    pub throws: Option<TypeId>,
    pub type_parameters: TypeParameters,
    /// Written without an explicit signature; the return type may be
    /// back-filled from the body.
    pub infer: bool,
}

impl BlockType {
    pub fn new(name: impl Into<String>, kind: BlockKind, prototype: Option<TypeId>) -> Self {
        Self {
            name: name.into(),
            kind,
            prototype,
            arguments: SymbolTable::new(),
            required_arguments: 0,
            rest_argument: false,
            returns: None,
            throws: None,
            type_parameters: TypeParameters::new(),
            infer: false,
        }
    }

    pub fn define_self_argument(&mut self, self_type: TypeId) {
        self.arguments.define("self", self_type, false);
    }

    pub fn define_argument(&mut self, name: impl Into<String>, value_type: TypeId, rest: bool) {
        self.arguments.define(name, value_type, false);
        if rest {
            self.rest_argument = true;
        }
    }

    /// Number of declared arguments, excluding `self`.
    pub fn argument_count(&self) -> usize {
        self.arguments.len().saturating_sub(1)
    }

    /// Maximum number of call-site arguments, excluding `self` and rest.
    pub fn maximum_arguments(&self) -> usize {
        let count = self.argument_count();
        if self.rest_argument {
            count.saturating_sub(1)
        } else {
            count
        }
    }

    /// Declared argument by keyword name. `self` is not addressable.
    pub fn keyword_argument(&self, name: &str) -> Option<&Symbol> {
        if name == "self" {
            return None;
        }
        self.arguments.lookup(name)
    }

    /// Declared argument by call-site position. Positions start at 1
    /// because index 0 is `self`.
    pub fn positional_argument(&self, position: usize) -> Option<&Symbol> {
        self.arguments.at_index(position)
    }

    /// The declared argument extra call-site arguments bind to.
    pub fn rest_argument_symbol(&self) -> Option<&Symbol> {
        if !self.rest_argument {
            return None;
        }
        self.arguments.at_index(self.arguments.len() - 1)
    }

    pub fn is_closure(&self) -> bool {
        self.kind == BlockKind::Closure
    }

    pub fn is_method(&self) -> bool {
        self.kind == BlockKind::Method
    }
}

/// The inferred type of an unannotated closure argument. Required methods
/// are attached the first time the argument receives a message.
#[derive(Debug, Clone)]
pub struct ConstraintType {
    pub name: String,
    pub required_methods: SymbolTable,
}

impl ConstraintType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required_methods: SymbolTable::new(),
        }
    }
}

/// The closed sum of types handled by the pass.
#[derive(Debug, Clone)]
pub enum Type {
    Object(ObjectType),
    Trait(TraitType),
    Block(BlockType),
    Optional(TypeId),
    SelfType,
    Dynamic,
    Constraint(ConstraintType),
}

impl Type {
    pub fn object(name: impl Into<String>, prototype: Option<TypeId>) -> Self {
        Type::Object(ObjectType::new(name, prototype))
    }

    /// The display name used in diagnostics. Optional types render through
    /// the database, which knows the wrapped type's name.
    pub fn name(&self) -> &str {
        match self {
            Type::Object(object) => &object.name,
            Type::Trait(traits) => &traits.name,
            Type::Block(block) => &block.name,
            Type::Optional(_) => "Optional",
            Type::SelfType => "Self",
            Type::Dynamic => "Dynamic",
            Type::Constraint(constraint) => &constraint.name,
        }
    }

    pub fn prototype(&self) -> Option<TypeId> {
        match self {
            Type::Object(object) => object.prototype,
            Type::Trait(traits) => traits.prototype,
            Type::Block(block) => block.prototype,
            _ => None,
        }
    }

    pub fn attributes(&self) -> Option<&SymbolTable> {
        match self {
            Type::Object(object) => Some(&object.attributes),
            Type::Trait(traits) => Some(&traits.attributes),
            _ => None,
        }
    }

    pub fn attributes_mut(&mut self) -> Option<&mut SymbolTable> {
        match self {
            Type::Object(object) => Some(&mut object.attributes),
            Type::Trait(traits) => Some(&mut traits.attributes),
            _ => None,
        }
    }

    pub fn type_parameters(&self) -> Option<&TypeParameters> {
        match self {
            Type::Object(object) => Some(&object.type_parameters),
            Type::Trait(traits) => Some(&traits.type_parameters),
            _ => None,
        }
    }

    pub fn parameter_instances(&self) -> Option<&ParameterInstances> {
        match self {
            Type::Object(object) => Some(&object.type_parameter_instances),
            Type::Trait(traits) => Some(&traits.type_parameter_instances),
            _ => None,
        }
    }

    pub fn implemented_traits(&self) -> Option<&FxHashSet<TypeId>> {
        match self {
            Type::Object(object) => Some(&object.implemented_traits),
            _ => None,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Type::Dynamic)
    }

    pub fn is_block(&self) -> bool {
        matches!(self, Type::Block(_))
    }

    pub fn is_trait(&self) -> bool {
        matches!(self, Type::Trait(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Type::Object(_))
    }

    pub fn is_constraint(&self) -> bool {
        matches!(self, Type::Constraint(_))
    }

    /// A generated trait stands in for a type parameter.
    pub fn as_type_parameter(&self) -> Option<&TraitType> {
        match self {
            Type::Trait(traits) if traits.generated => Some(traits),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<&BlockType> {
        match self {
            Type::Block(block) => Some(block),
            _ => None,
        }
    }

    pub fn as_block_mut(&mut self) -> Option<&mut BlockType> {
        match self {
            Type::Block(block) => Some(block),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectType> {
        match self {
            Type::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut ObjectType> {
        match self {
            Type::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_trait(&self) -> Option<&TraitType> {
        match self {
            Type::Trait(traits) => Some(traits),
            _ => None,
        }
    }

    pub fn as_trait_mut(&mut self) -> Option<&mut TraitType> {
        match self {
            Type::Trait(traits) => Some(traits),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(raw: u32) -> TypeId {
        TypeId::new(raw)
    }

    #[test]
    fn type_parameters_preserve_order() {
        let mut params = TypeParameters::new();
        params.define("T", ty(1));
        params.define("R", ty(2));

        let names: Vec<_> = params.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["T", "R"]);
        assert_eq!(params.get("R"), Some(ty(2)));
        assert!(params.contains("T"));
        assert!(!params.contains("X"));
    }

    #[test]
    fn parameter_instances_first_binding_wins() {
        let mut instances = ParameterInstances::new();
        instances.bind("T", ty(1));
        instances.bind("T", ty(2));

        assert_eq!(instances.get("T"), Some(ty(1)));
    }

    #[test]
    fn block_argument_counts_exclude_self() {
        let mut block = BlockType::new("example", BlockKind::Method, None);
        block.define_self_argument(ty(0));
        block.define_argument("a", ty(1), false);
        block.define_argument("rest", ty(2), true);
        block.required_arguments = 1;

        assert_eq!(block.argument_count(), 2);
        assert_eq!(block.maximum_arguments(), 1);
        assert!(block.rest_argument);
        assert_eq!(block.rest_argument_symbol().map(|s| s.name.as_str()), Some("rest"));
    }

    #[test]
    fn block_positional_arguments_start_after_self() {
        let mut block = BlockType::new("example", BlockKind::Method, None);
        block.define_self_argument(ty(0));
        block.define_argument("a", ty(1), false);

        assert_eq!(block.positional_argument(1).map(|s| s.name.as_str()), Some("a"));
        assert!(block.keyword_argument("self").is_none());
        assert!(block.keyword_argument("a").is_some());
    }

    #[test]
    fn generated_traits_are_type_parameters() {
        let generated = Type::Trait(TraitType::generated("T", None));
        let written = Type::Trait(TraitType::new("Inspect", None));

        assert!(generated.as_type_parameter().is_some());
        assert!(written.as_type_parameter().is_none());
    }
}
