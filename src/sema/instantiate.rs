// src/sema/instantiate.rs
//
// Call-site parameter instantiation. Every send builds a fresh instance
// table seeded from the receiver, binds formal parameters positionally, and
// resolves the return type through it.

use rustc_hash::FxHashMap;

use crate::sema::database::TypeDatabase;
use crate::sema::type_arena::TypeId;
use crate::sema::types::Type;

/// Concrete types bound to type parameters for the duration of one send.
#[derive(Debug, Default)]
pub struct CallInstances {
    map: FxHashMap<String, TypeId>,
}

impl CallInstances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the table from the receiver's already-bound instances.
    pub fn seeded_from(db: &TypeDatabase, receiver: TypeId) -> Self {
        let mut instances = Self::new();

        if let Some(bound) = db.get(receiver).parameter_instances() {
            for (name, instance) in bound.iter() {
                instances.map.insert(name.to_string(), instance);
            }
        }

        instances
    }

    /// Bind a parameter name; the first binding wins.
    pub fn bind(&mut self, name: impl Into<String>, instance: TypeId) {
        self.map.entry(name.into()).or_insert(instance);
    }

    pub fn get(&self, name: &str) -> Option<TypeId> {
        self.map.get(name).copied()
    }

    /// Resolve a declared return type against this table. Unresolved
    /// `SelfType` is substituted by the receiver; generated traits resolve
    /// to their bound instance when one exists.
    pub fn resolve(&self, db: &mut TypeDatabase, ty: TypeId, receiver: TypeId) -> TypeId {
        enum Step {
            Receiver,
            Parameter(String),
            Optional(TypeId),
            Keep,
        }

        let step = match db.get(ty) {
            Type::SelfType => Step::Receiver,
            Type::Trait(traits) if traits.generated => Step::Parameter(traits.name.clone()),
            Type::Optional(inner) => Step::Optional(*inner),
            _ => Step::Keep,
        };

        match step {
            Step::Receiver => receiver,
            Step::Parameter(name) => self.get(&name).unwrap_or(ty),
            Step::Optional(inner) => {
                let resolved = self.resolve(db, inner, receiver);
                if resolved == inner {
                    ty
                } else {
                    db.optional(resolved)
                }
            }
            Step::Keep => ty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sema::types::BlockKind;

    #[test]
    fn resolve_substitutes_self_with_receiver() {
        let mut db = TypeDatabase::new();
        let receiver = db.new_object("Thing", Some(db.object_type));
        let instances = CallInstances::new();

        let self_placeholder = db.self_placeholder;
        assert_eq!(instances.resolve(&mut db, self_placeholder, receiver), receiver);
    }

    #[test]
    fn resolve_substitutes_bound_parameters() {
        let mut db = TypeDatabase::new();
        let receiver = db.new_object("List", Some(db.object_type));
        let parameter = db.new_generated_trait("T");

        let mut instances = CallInstances::new();
        instances.bind("T", db.integer_type);

        assert_eq!(
            instances.resolve(&mut db, parameter, receiver),
            db.integer_type
        );
    }

    #[test]
    fn resolve_keeps_unbound_parameters() {
        let mut db = TypeDatabase::new();
        let receiver = db.new_object("List", Some(db.object_type));
        let parameter = db.new_generated_trait("T");
        let instances = CallInstances::new();

        assert_eq!(instances.resolve(&mut db, parameter, receiver), parameter);
    }

    #[test]
    fn resolve_rewraps_optionals() {
        let mut db = TypeDatabase::new();
        let receiver = db.new_object("List", Some(db.object_type));
        let parameter = db.new_generated_trait("T");
        let optional = db.optional(parameter);

        let mut instances = CallInstances::new();
        instances.bind("T", db.string_type);

        let resolved = instances.resolve(&mut db, optional, receiver);
        match db.get(resolved) {
            Type::Optional(inner) => assert_eq!(*inner, db.string_type),
            other => panic!("expected an optional, got {other:?}"),
        }
    }

    #[test]
    fn seeded_table_reuses_receiver_instances() {
        let mut db = TypeDatabase::new();
        let receiver = db.new_object("List", Some(db.object_type));
        let parameter = db.new_generated_trait("T");

        let float = db.float_type;
        if let Some(object) = db.get_mut(receiver).as_object_mut() {
            object.type_parameters.define("T", parameter);
            object.type_parameter_instances.bind("T", float);
        }

        let instances = CallInstances::seeded_from(&db, receiver);
        assert_eq!(instances.get("T"), Some(db.float_type));
    }

    #[test]
    fn identical_calls_share_return_types() {
        let mut db = TypeDatabase::new();
        let receiver = db.new_object("List", Some(db.object_type));
        let parameter = db.new_generated_trait("T");
        let _block = db.new_block("first", BlockKind::Method);

        let integer = db.integer_type;
        if let Some(object) = db.get_mut(receiver).as_object_mut() {
            object.type_parameters.define("T", parameter);
            object.type_parameter_instances.bind("T", integer);
        }

        let first = CallInstances::seeded_from(&db, receiver);
        let second = CallInstances::seeded_from(&db, receiver);

        assert_eq!(
            first.resolve(&mut db, parameter, receiver),
            second.resolve(&mut db, parameter, receiver)
        );
    }
}
