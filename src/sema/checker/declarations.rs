// src/sema/checker/declarations.rs
//
// Declaration handling: objects, traits, implementations, methods, and
// variable definitions.

use super::Checker;

use crate::ast::{
    DefineVariable, MethodDefinition, NodeId, NodeKind, ObjectDefinition, Reassign, ReopenObject,
    Span, TraitDefinition, TraitImplementation, TypeParameterDef,
};
use crate::errors::TypeErrorKind;
use crate::sema::compatibility;
use crate::sema::database;
use crate::sema::scope::TypeScope;
use crate::sema::symbols::{Symbol, SymbolTable};
use crate::sema::type_arena::TypeId;
use crate::sema::types::{BlockKind, Type};

impl Checker<'_> {
    pub(super) fn check_object(
        &mut self,
        object_def: &mut ObjectDefinition,
        span: Span,
        scope: &mut TypeScope,
    ) -> TypeId {
        let name = object_def.name.clone();

        // Redefining an existing object reuses its type, so reopening and
        // re-running the pass observe the same identity.
        let existing = self
            .db
            .lookup_attribute(scope.self_type, &name)
            .map(|symbol| symbol.value_type)
            .filter(|&id| self.db.get(id).is_object());

        let object_type = existing.unwrap_or_else(|| {
            let prototype = self.db.object_type;
            let string_type = self.db.string_type;
            let id = self.db.new_object(&name, Some(prototype));

            if let Some(attributes) = self.db.get_mut(id).attributes_mut() {
                attributes.define(database::OBJECT_NAME_ATTRIBUTE, string_type, false);
            }
            id
        });

        self.define_type_parameters(object_type, &object_def.type_parameters, scope);
        self.register_constant(&name, object_type, false, span, scope);

        let mut inner = TypeScope::new(object_type, scope.block_type, SymbolTable::new());
        self.check_body(&mut object_def.body, &mut inner);

        object_type
    }

    pub(super) fn check_trait(
        &mut self,
        trait_def: &mut TraitDefinition,
        span: Span,
        scope: &mut TypeScope,
    ) -> TypeId {
        let name = trait_def.name.clone();

        let existing = self
            .db
            .lookup_attribute(scope.self_type, &name)
            .map(|symbol| symbol.value_type)
            .filter(|&id| self.db.get(id).is_trait());

        let trait_type = existing.unwrap_or_else(|| self.db.new_trait(&name));

        self.define_type_parameters(trait_type, &trait_def.type_parameters, scope);

        for required in &trait_def.required_traits {
            let required_type = self.resolve_annotation(required, scope);
            if self.db.get(required_type).is_trait()
                && let Some(traits) = self.db.get_mut(trait_type).as_trait_mut()
            {
                traits.required_traits.insert(required_type);
            }
        }

        self.register_constant(&name, trait_type, false, span, scope);

        let mut inner = TypeScope::new(trait_type, scope.block_type, SymbolTable::new());
        self.check_body(&mut trait_def.body, &mut inner);

        trait_type
    }

    /// Implementations are advertised tentatively, then verified. A failed
    /// verification removes the trait so the object does not advertise
    /// compatibility it cannot honor.
    pub(super) fn check_trait_implementation(
        &mut self,
        implementation: &mut TraitImplementation,
        span: Span,
        scope: &mut TypeScope,
    ) -> TypeId {
        let trait_type = self.resolve_annotation(&implementation.trait_name, scope);

        let Some(object_type) = self.resolve_constant_name(&implementation.object_name, scope)
        else {
            self.error(
                TypeErrorKind::UndefinedConstant {
                    name: implementation.object_name.clone(),
                    span: span.into(),
                },
                span,
            );
            return self.db.dynamic_type;
        };

        if self.db.is_dynamic(trait_type) {
            // The annotation failed to resolve and was already diagnosed.
            return self.db.dynamic_type;
        }

        if !self.db.get(trait_type).is_trait() {
            let found = self.db.type_name(trait_type);
            self.error(
                TypeErrorKind::TypeMismatch {
                    expected: "Trait".to_string(),
                    found,
                    span: implementation.trait_name.span().into(),
                },
                implementation.trait_name.span(),
            );
            return self.db.dynamic_type;
        }

        if let Some(object) = self.db.get_mut(object_type).as_object_mut() {
            object.implemented_traits.insert(trait_type);
        }

        let mut inner = TypeScope::new(object_type, scope.block_type, SymbolTable::new());
        self.check_body(&mut implementation.body, &mut inner);

        if !self.verify_trait_implementation(object_type, trait_type, span) {
            tracing::debug!(
                object = %self.db.type_name(object_type),
                traits = %self.db.type_name(trait_type),
                "removing unverified trait implementation"
            );
            if let Some(object) = self.db.get_mut(object_type).as_object_mut() {
                object.implemented_traits.remove(&trait_type);
            }
        }

        object_type
    }

    fn verify_trait_implementation(
        &mut self,
        object_type: TypeId,
        trait_type: TypeId,
        span: Span,
    ) -> bool {
        let Some(traits) = self.db.get(trait_type).as_trait() else {
            return false;
        };

        let required_traits: Vec<TypeId> = traits.required_traits.iter().copied().collect();
        let required_methods: Vec<Symbol> = traits.required_methods.iter().cloned().collect();
        let mut satisfied = true;

        for required in required_traits {
            if !self.db.implements_trait(object_type, required) {
                let object = self.db.type_name(object_type);
                let required = self.db.type_name(required);
                self.error(
                    TypeErrorKind::UnimplementedTrait {
                        object,
                        required,
                        span: span.into(),
                    },
                    span,
                );
                satisfied = false;
            }
        }

        for method in required_methods {
            if !self.db.implements_method(object_type, &method) {
                let object = self.db.type_name(object_type);
                self.error(
                    TypeErrorKind::UnimplementedMethod {
                        object,
                        method: method.name.clone(),
                        span: span.into(),
                    },
                    span,
                );
                satisfied = false;
            }
        }

        satisfied
    }

    pub(super) fn check_reopen_object(
        &mut self,
        reopen: &mut ReopenObject,
        span: Span,
        scope: &mut TypeScope,
    ) -> TypeId {
        let Some(existing) = self.resolve_constant_name(&reopen.name, scope) else {
            self.error(
                TypeErrorKind::UndefinedConstant {
                    name: reopen.name.clone(),
                    span: span.into(),
                },
                span,
            );
            return self.db.dynamic_type;
        };

        let mut inner = TypeScope::new(existing, scope.block_type, SymbolTable::new());
        self.check_body(&mut reopen.body, &mut inner);

        existing
    }

    /// Build a method's block type and either attach it as a required
    /// method (traits only) or register it as an attribute of self and
    /// queue the body for phase two.
    pub(super) fn check_method(
        &mut self,
        id: NodeId,
        method: &mut MethodDefinition,
        span: Span,
        scope: &mut TypeScope,
    ) -> TypeId {
        let block_id = self.db.new_block(&method.name, BlockKind::Method);

        self.define_block_signature(
            block_id,
            &method.type_parameters,
            &mut method.arguments,
            method.returns.as_ref(),
            method.throws.as_ref(),
            scope,
            false,
        );

        if method.required {
            if self.db.get(scope.self_type).is_trait() {
                let name = method.name.clone();
                if let Some(traits) = self.db.get_mut(scope.self_type).as_trait_mut() {
                    traits.required_methods.define(name, block_id, false);
                }
            } else {
                self.error(
                    TypeErrorKind::DefineRequiredMethodOnNonTrait {
                        name: method.name.clone(),
                        span: span.into(),
                    },
                    span,
                );
            }
            return block_id;
        }

        // Methods become attributes of self; they do not leak into the
        // module globals.
        let name = method.name.clone();
        if let Some(attributes) = self.db.get_mut(scope.self_type).attributes_mut() {
            attributes.define(name, block_id, false);
        }

        let mut locals = SymbolTable::new();
        self.define_arguments_as_locals(block_id, &mut locals);
        self.pending
            .insert(id, TypeScope::new(scope.self_type, block_id, locals));

        block_id
    }

    /// Phase two: type a queued method body and verify it against the
    /// declared return type. The default declared return is Dynamic, which
    /// always verifies.
    pub(super) fn check_deferred_method(
        &mut self,
        method: &mut MethodDefinition,
        span: Span,
        mut scope: TypeScope,
    ) {
        let body_type = self.check_block_body(&mut method.body, &mut scope);

        let declared = self
            .db
            .get(scope.block_type)
            .as_block()
            .and_then(|block| block.returns)
            .unwrap_or(self.db.dynamic_type);

        if !compatibility::compatible(self.db, body_type, declared) {
            let expected = self.db.type_name(declared);
            let found = self.db.type_name(body_type);
            let at = method.body.last().map(|node| node.span).unwrap_or(span);
            self.error(
                TypeErrorKind::ReturnTypeMismatch {
                    expected,
                    found,
                    span: at.into(),
                },
                at,
            );
        }
    }

    /// `let` dispatches on the name node: identifiers define locals,
    /// constants attach to self (and the module globals at module level),
    /// attributes require `init`.
    pub(super) fn check_define_variable(
        &mut self,
        define: &mut DefineVariable,
        _span: Span,
        scope: &mut TypeScope,
    ) -> TypeId {
        let value_type = self.check_expression(&mut define.value, scope);
        let value_span = define.value.span;

        let declared = define
            .annotation
            .as_ref()
            .map(|annotation| self.resolve_annotation(annotation, scope));

        if let Some(declared) = declared
            && !compatibility::compatible(self.db, value_type, declared)
        {
            let expected = self.db.type_name(declared);
            let found = self.db.type_name(value_type);
            self.error(
                TypeErrorKind::TypeMismatch {
                    expected,
                    found,
                    span: value_span.into(),
                },
                value_span,
            );
        }

        // An explicit annotation becomes the variable's static type; it may
        // be a supertype of the inferred expression.
        let variable_type = declared.unwrap_or(value_type);
        let name_span = define.name.span;

        match &define.name.kind {
            NodeKind::Identifier(name) => {
                let name = name.clone();
                scope.locals.define(name, variable_type, define.mutable);
            }
            NodeKind::Constant(constant) => {
                let name = constant.name.clone();
                self.register_constant(&name, variable_type, define.mutable, name_span, scope);
            }
            NodeKind::Attribute(name) => {
                let name = name.clone();
                let in_init = scope.is_method(self.db)
                    && self
                        .db
                        .get(scope.block_type)
                        .as_block()
                        .is_some_and(|block| block.name == database::INIT_METHOD);
                let module_self = scope.self_type == self.module.type_id;

                if module_self || in_init {
                    if let Some(attributes) = self.db.get_mut(scope.self_type).attributes_mut() {
                        attributes.define(name, variable_type, define.mutable);
                    }
                } else {
                    self.error(
                        TypeErrorKind::DefineInstanceAttributeOutsideInit {
                            name,
                            span: name_span.into(),
                        },
                        name_span,
                    );
                }
            }
            _ => {}
        }

        define.name.resolved_type = Some(variable_type);
        variable_type
    }

    pub(super) fn check_reassign(
        &mut self,
        reassign: &mut Reassign,
        _span: Span,
        scope: &mut TypeScope,
    ) -> TypeId {
        let value_type = self.check_expression(&mut reassign.value, scope);
        let value_span = reassign.value.span;
        let name_span = reassign.name.span;

        let target_type = match &reassign.name.kind {
            NodeKind::Identifier(name) => {
                let name = name.clone();
                // Absent at every scope yields None, never a panic.
                match scope.locals.lookup_with_parent(&name).cloned() {
                    None => {
                        self.error(
                            TypeErrorKind::ReassignUndefinedLocal {
                                name,
                                span: name_span.into(),
                            },
                            name_span,
                        );
                        None
                    }
                    Some(local) => {
                        if !local.mutable {
                            self.error(
                                TypeErrorKind::ReassignImmutableLocal {
                                    name,
                                    span: name_span.into(),
                                },
                                name_span,
                            );
                        } else if !compatibility::compatible(self.db, value_type, local.value_type)
                        {
                            let expected = self.db.type_name(local.value_type);
                            let found = self.db.type_name(value_type);
                            self.error(
                                TypeErrorKind::TypeMismatch {
                                    expected,
                                    found,
                                    span: value_span.into(),
                                },
                                value_span,
                            );
                        }
                        Some(local.value_type)
                    }
                }
            }
            NodeKind::Attribute(name) => {
                let name = name.clone();
                match self.db.lookup_attribute(scope.self_type, &name) {
                    None => {
                        self.error(
                            TypeErrorKind::ReassignUndefinedAttribute {
                                name,
                                span: name_span.into(),
                            },
                            name_span,
                        );
                        None
                    }
                    Some(attribute) => {
                        if !attribute.mutable {
                            self.error(
                                TypeErrorKind::ReassignImmutableAttribute {
                                    name,
                                    span: name_span.into(),
                                },
                                name_span,
                            );
                        } else if !compatibility::compatible(
                            self.db,
                            value_type,
                            attribute.value_type,
                        ) {
                            let expected = self.db.type_name(attribute.value_type);
                            let found = self.db.type_name(value_type);
                            self.error(
                                TypeErrorKind::TypeMismatch {
                                    expected,
                                    found,
                                    span: value_span.into(),
                                },
                                value_span,
                            );
                        }
                        Some(attribute.value_type)
                    }
                }
            }
            _ => None,
        };

        let resolved = target_type.unwrap_or(self.db.dynamic_type);
        reassign.name.resolved_type = Some(resolved);
        resolved
    }

    /// Define generated traits for a type's parameters, reusing existing
    /// parameters so repeated definitions keep their identity.
    fn define_type_parameters(
        &mut self,
        target: TypeId,
        parameters: &[TypeParameterDef],
        scope: &TypeScope,
    ) {
        for parameter in parameters {
            let existing = self
                .db
                .get(target)
                .type_parameters()
                .and_then(|table| table.get(&parameter.name));

            let generated =
                existing.unwrap_or_else(|| self.db.new_generated_trait(&parameter.name));

            for required in &parameter.required_traits {
                let required_type = self.resolve_annotation(required, scope);
                if self.db.get(required_type).is_trait()
                    && let Some(traits) = self.db.get_mut(generated).as_trait_mut()
                {
                    traits.required_traits.insert(required_type);
                }
            }

            match self.db.get_mut(target) {
                Type::Object(object) => object.type_parameters.define(&parameter.name, generated),
                Type::Trait(traits) => traits.type_parameters.define(&parameter.name, generated),
                _ => {}
            }
        }
    }

    /// Register a constant on the enclosing self, and in the module globals
    /// when self is the module. Reserved names are diagnosed but the
    /// binding still occurs.
    fn register_constant(
        &mut self,
        name: &str,
        value: TypeId,
        mutable: bool,
        span: Span,
        scope: &TypeScope,
    ) {
        if database::RESERVED_CONSTANTS.contains(&name) {
            self.error(
                TypeErrorKind::RedefineReservedConstant {
                    name: name.to_string(),
                    span: span.into(),
                },
                span,
            );
        }

        if let Some(attributes) = self.db.get_mut(scope.self_type).attributes_mut() {
            attributes.define(name, value, mutable);
        }

        if scope.self_type == self.module.type_id {
            self.module.define_global(name, value, mutable);
        }
    }
}
