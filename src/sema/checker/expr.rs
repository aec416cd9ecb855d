// src/sema/checker/expr.rs
//
// Expression typing: name resolution, sends, closures, and control flow.

use smallvec::SmallVec;

use super::Checker;

use crate::ast::{Closure, ConstantRef, Node, NodeKind, Send, Span, Try};
use crate::errors::TypeErrorKind;
use crate::sema::compatibility;
use crate::sema::database;
use crate::sema::instantiate::CallInstances;
use crate::sema::scope::TypeScope;
use crate::sema::symbols::{Symbol, SymbolTable};
use crate::sema::type_arena::TypeId;
use crate::sema::types::{BlockKind, BlockType, Type};

/// One already-typed call-site argument.
pub(super) struct CallArgument {
    pub keyword: Option<String>,
    pub value_type: TypeId,
    pub span: Span,
}

impl Checker<'_> {
    /// Identifiers resolve as: a local, a zero-argument message on self,
    /// a zero-argument message on the module, then a module global.
    pub(super) fn check_identifier(
        &mut self,
        name: &str,
        span: Span,
        scope: &mut TypeScope,
    ) -> TypeId {
        if let Some(local) = scope.locals.lookup_with_parent(name) {
            return local.value_type;
        }

        if self.db.responds_to(scope.self_type, name) {
            return self.check_message(scope.self_type, name, &[], span);
        }

        if self.module.responds_to_message(self.db, name) {
            let receiver = self.module.type_id;
            return self.check_message(receiver, name, &[], span);
        }

        if let Some(global) = self.module.global(name) {
            return global.value_type;
        }

        self.error(
            TypeErrorKind::UndefinedLocal {
                name: name.to_string(),
                span: span.into(),
            },
            span,
        );
        self.db.dynamic_type
    }

    pub(super) fn check_constant(
        &mut self,
        constant: &mut ConstantRef,
        span: Span,
        scope: &mut TypeScope,
    ) -> TypeId {
        if let Some(receiver) = constant.receiver.as_deref_mut() {
            let receiver_type = self.check_expression(receiver, scope);

            if self.db.is_dynamic(receiver_type) {
                return receiver_type;
            }

            if let Some(symbol) = self.db.lookup_attribute(receiver_type, &constant.name) {
                return symbol.value_type;
            }
        } else if let Some(found) = self.resolve_constant_name(&constant.name, scope) {
            return found;
        }

        self.error(
            TypeErrorKind::UndefinedConstant {
                name: constant.name.clone(),
                span: span.into(),
            },
            span,
        );
        self.db.dynamic_type
    }

    pub(super) fn check_attribute(
        &mut self,
        name: &str,
        span: Span,
        scope: &mut TypeScope,
    ) -> TypeId {
        if let Some(symbol) = self.db.lookup_attribute(scope.self_type, name) {
            return symbol.value_type;
        }

        self.error(
            TypeErrorKind::UndefinedAttribute {
                name: name.to_string(),
                span: span.into(),
            },
            span,
        );
        self.db.dynamic_type
    }

    pub(super) fn check_global(
        &mut self,
        name: &str,
        span: Span,
        _scope: &mut TypeScope,
    ) -> TypeId {
        if let Some(global) = self.module.global(name) {
            return global.value_type;
        }

        self.error(
            TypeErrorKind::UndefinedConstant {
                name: name.to_string(),
                span: span.into(),
            },
            span,
        );
        self.db.dynamic_type
    }

    pub(super) fn check_send(
        &mut self,
        send: &mut Send,
        span: Span,
        scope: &mut TypeScope,
    ) -> TypeId {
        // Without an explicit receiver, prefer self over the module when
        // both respond; this preserves self-shadowing diagnostics.
        let receiver_type = match send.receiver.as_mut() {
            Some(receiver) => self.check_expression(receiver, scope),
            None => {
                if self.db.responds_to(scope.self_type, &send.name) {
                    scope.self_type
                } else if self.module.responds_to_message(self.db, &send.name) {
                    self.module.type_id
                } else {
                    scope.self_type
                }
            }
        };
        send.receiver_type = Some(receiver_type);

        // Arguments are typed first, left to right, so they receive types
        // and diagnostics even when the send itself cannot be checked.
        let mut arguments: SmallVec<[CallArgument; 8]> = SmallVec::new();

        for node in send.arguments.iter_mut() {
            let keyword = match &node.kind {
                NodeKind::KeywordArgument(keyword) => Some(keyword.name.clone()),
                _ => None,
            };
            let value_type = self.check_expression(node, scope);
            arguments.push(CallArgument {
                keyword,
                value_type,
                span: node.span,
            });
        }

        let name = send.name.clone();
        self.check_message(receiver_type, &name, &arguments, span)
    }

    /// The send algorithm: dynamic short-circuit, constraint synthesis,
    /// lookup, keyword and arity verification, per-argument compatibility
    /// with generated-trait inference, and return type initialization.
    pub(super) fn check_message(
        &mut self,
        receiver: TypeId,
        name: &str,
        arguments: &[CallArgument],
        span: Span,
    ) -> TypeId {
        if self.db.is_dynamic(receiver) {
            return receiver;
        }

        if self.db.get(receiver).is_constraint() {
            return self.synthesize_required_method(receiver, name, arguments);
        }

        let Some(symbol) = self.db.lookup_method(receiver, name) else {
            let receiver_name = self.db.type_name(receiver);
            self.error(
                TypeErrorKind::UndefinedMethod {
                    name: name.to_string(),
                    receiver: receiver_name,
                    span: span.into(),
                },
                span,
            );
            return self.db.dynamic_type;
        };

        let block = match self.db.get(symbol.value_type) {
            Type::Block(block) => block.clone(),
            _ => {
                let receiver_name = self.db.type_name(receiver);
                self.error(
                    TypeErrorKind::UndefinedMethod {
                        name: name.to_string(),
                        receiver: receiver_name,
                        span: span.into(),
                    },
                    span,
                );
                return symbol.value_type;
            }
        };

        for argument in arguments {
            if let Some(keyword) = &argument.keyword
                && block.keyword_argument(keyword).is_none()
            {
                self.error(
                    TypeErrorKind::UndefinedKeywordArgument {
                        name: keyword.clone(),
                        method: name.to_string(),
                        span: argument.span.into(),
                    },
                    argument.span,
                );
            }
        }

        let given = arguments.len();
        let minimum = block.required_arguments;
        let maximum = block.maximum_arguments();
        let count_ok = if block.rest_argument {
            given >= minimum
        } else {
            given >= minimum && given <= maximum
        };

        if !count_ok {
            let expected = if block.rest_argument {
                format!("at least {minimum}")
            } else if minimum == maximum {
                format!("{minimum}")
            } else {
                format!("{minimum}..{maximum}")
            };
            self.error(
                TypeErrorKind::ArgumentCountMismatch {
                    method: name.to_string(),
                    expected,
                    found: given,
                    span: span.into(),
                },
                span,
            );
        }

        let mut instances = CallInstances::seeded_from(self.db, receiver);

        if count_ok {
            for (index, argument) in arguments.iter().enumerate() {
                let expected = match &argument.keyword {
                    Some(keyword) => block.keyword_argument(keyword).cloned(),
                    None => block
                        .positional_argument(index + 1)
                        .or_else(|| block.rest_argument_symbol())
                        .cloned(),
                };

                if let Some(expected) = expected {
                    self.check_message_argument(receiver, &block, &expected, argument, &mut instances);
                }
            }
        }

        let declared = block.returns.unwrap_or(self.db.dynamic_type);
        let return_type = instances.resolve(self.db, declared, receiver);

        if let Some(throws) = block.throws {
            let resolved = instances.resolve(self.db, throws, receiver);
            self.record_throw(resolved);
        }

        return_type
    }

    /// Verify one argument against its expected type. Expected types that
    /// are generated traits resolve through the receiver's parameter
    /// instances; a fresh binding is persisted on the receiver unless the
    /// receiver is the current module.
    fn check_message_argument(
        &mut self,
        receiver: TypeId,
        block: &BlockType,
        expected: &Symbol,
        argument: &CallArgument,
        instances: &mut CallInstances,
    ) {
        let mut expected_type = expected.value_type;

        let parameter_name = self
            .db
            .get(expected_type)
            .as_type_parameter()
            .map(|parameter| parameter.name.clone());

        if let Some(parameter_name) = parameter_name {
            let receiver_parameter = self
                .db
                .get(receiver)
                .type_parameters()
                .is_some_and(|parameters| parameters.contains(&parameter_name));

            if receiver_parameter {
                let existing = self
                    .db
                    .get(receiver)
                    .parameter_instances()
                    .and_then(|bound| bound.get(&parameter_name));

                if let Some(existing) = existing {
                    expected_type = existing;
                } else if compatibility::compatible(self.db, argument.value_type, expected_type) {
                    if receiver != self.module.type_id {
                        tracing::trace!(
                            parameter = %parameter_name,
                            "binding type parameter instance on receiver"
                        );
                        match self.db.get_mut(receiver) {
                            Type::Object(object) => object
                                .type_parameter_instances
                                .bind(&parameter_name, argument.value_type),
                            Type::Trait(traits) => traits
                                .type_parameter_instances
                                .bind(&parameter_name, argument.value_type),
                            _ => {}
                        }
                    }
                    instances.bind(parameter_name, argument.value_type);
                    return;
                } else {
                    let found = self.db.type_name(argument.value_type);
                    self.error(
                        TypeErrorKind::GeneratedTraitNotImplemented {
                            parameter: parameter_name,
                            found,
                            span: argument.span.into(),
                        },
                        argument.span,
                    );
                    return;
                }
            } else if block.type_parameters.contains(&parameter_name) {
                if let Some(bound) = instances.get(&parameter_name) {
                    expected_type = bound;
                } else if compatibility::compatible(self.db, argument.value_type, expected_type) {
                    instances.bind(parameter_name, argument.value_type);
                    return;
                } else {
                    let found = self.db.type_name(argument.value_type);
                    self.error(
                        TypeErrorKind::GeneratedTraitNotImplemented {
                            parameter: parameter_name,
                            found,
                            span: argument.span.into(),
                        },
                        argument.span,
                    );
                    return;
                }
            }
        }

        if !compatibility::compatible(self.db, argument.value_type, expected_type) {
            let expected = self.db.type_name(expected_type);
            let found = self.db.type_name(argument.value_type);
            self.error(
                TypeErrorKind::TypeMismatch {
                    expected,
                    found,
                    span: argument.span.into(),
                },
                argument.span,
            );
        }
    }

    /// Sends to an unresolved closure-argument constraint synthesize a
    /// required method from the argument types on first use.
    fn synthesize_required_method(
        &mut self,
        constraint: TypeId,
        name: &str,
        arguments: &[CallArgument],
    ) -> TypeId {
        if let Some(existing) = self.db.lookup_method(constraint, name) {
            return self
                .db
                .get(existing.value_type)
                .as_block()
                .and_then(|block| block.returns)
                .unwrap_or(self.db.dynamic_type);
        }

        let returns = arguments
            .first()
            .map(|argument| argument.value_type)
            .unwrap_or(self.db.dynamic_type);

        let method = self.db.new_block(name, BlockKind::Method);
        if let Some(block) = self.db.get_mut(method).as_block_mut() {
            block.define_self_argument(constraint);
        }
        for (index, argument) in arguments.iter().enumerate() {
            let value_type = argument.value_type;
            if let Some(block) = self.db.get_mut(method).as_block_mut() {
                block.define_argument(format!("a{index}"), value_type, false);
                block.required_arguments += 1;
            }
        }
        if let Some(block) = self.db.get_mut(method).as_block_mut() {
            block.returns = Some(returns);
        }

        if let Type::Constraint(constraint) = self.db.get_mut(constraint) {
            constraint.required_methods.define(name, method, false);
        }

        returns
    }

    pub(super) fn check_closure(
        &mut self,
        closure: &mut Closure,
        span: Span,
        scope: &mut TypeScope,
    ) -> TypeId {
        let block_id = self.db.new_block("closure", BlockKind::Closure);
        closure.block_type = Some(block_id);

        let infer = closure.returns.is_none();
        if let Some(block) = self.db.get_mut(block_id).as_block_mut() {
            block.infer = infer;
        }

        self.define_block_signature(
            block_id,
            &[],
            &mut closure.arguments,
            closure.returns.as_ref(),
            closure.throws.as_ref(),
            scope,
            true,
        );

        // Closures close over the enclosing locals.
        let parent = std::mem::take(&mut scope.locals);
        let mut locals = SymbolTable::with_parent(parent);
        self.define_arguments_as_locals(block_id, &mut locals);

        let mut inner = TypeScope::new(scope.self_type, block_id, locals);
        let body_type = self.check_block_body(&mut closure.body, &mut inner);
        scope.locals = inner.locals.into_parent().unwrap_or_default();

        let declared = self
            .db
            .get(block_id)
            .as_block()
            .and_then(|block| block.returns);

        match declared {
            None => {
                if let Some(block) = self.db.get_mut(block_id).as_block_mut() {
                    block.returns = Some(body_type);
                }
            }
            Some(declared) => {
                if !compatibility::compatible(self.db, body_type, declared) {
                    let expected = self.db.type_name(declared);
                    let found = self.db.type_name(body_type);
                    let at = closure.body.last().map(|node| node.span).unwrap_or(span);
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
        }

        block_id
    }

    /// A `return` expression types as its value (or Nil) and records the
    /// value for the enclosing block's exit check.
    pub(super) fn check_return(
        &mut self,
        value: Option<&mut Node>,
        span: Span,
        scope: &mut TypeScope,
    ) -> TypeId {
        let value_type = match value {
            Some(value) => self.check_expression(value, scope),
            None => self.db.nil_type,
        };

        if let Some(frame) = self.return_frames.last_mut() {
            frame.push((value_type, span));
        }

        value_type
    }

    /// A `throw` types as Void. Closures and try blocks without a declared
    /// throw type have it back-filled from the thrown value.
    pub(super) fn check_throw(
        &mut self,
        value: &mut Node,
        _span: Span,
        scope: &mut TypeScope,
    ) -> TypeId {
        let value_type = self.check_expression(value, scope);

        let kind = self
            .db
            .get(scope.block_type)
            .as_block()
            .map(|block| block.kind);

        if matches!(kind, Some(BlockKind::Closure) | Some(BlockKind::TryBlock))
            && let Some(block) = self.db.get_mut(scope.block_type).as_block_mut()
            && block.throws.is_none()
        {
            block.throws = Some(value_type);
        }

        self.record_throw(value_type);
        self.db.void_type
    }

    pub(super) fn check_try(
        &mut self,
        try_expression: &mut Try,
        span: Span,
        scope: &mut TypeScope,
    ) -> TypeId {
        let self_type = scope.self_type;

        let try_block = self.db.new_block(database::TRY_BLOCK_NAME, BlockKind::TryBlock);
        if let Some(block) = self.db.get_mut(try_block).as_block_mut() {
            block.define_self_argument(self_type);
        }
        try_expression.try_block_type = Some(try_block);

        // The try expression runs inside the try block; throw types from
        // sends and throw expressions back-fill the block.
        self.throw_frames.push(None);
        let parent = std::mem::take(&mut scope.locals);
        let mut try_scope = TypeScope::new(self_type, try_block, SymbolTable::with_parent(parent));
        let try_type = self.check_expression(&mut try_expression.expression, &mut try_scope);
        scope.locals = try_scope.locals.into_parent().unwrap_or_default();
        let observed_throw = self.throw_frames.pop().flatten();

        if let Some(block) = self.db.get_mut(try_block).as_block_mut() {
            if block.returns.is_none() {
                block.returns = Some(try_type);
            }
            if block.throws.is_none() {
                block.throws = observed_throw;
            }
        }

        let throw_type = self
            .db
            .get(try_block)
            .as_block()
            .and_then(|block| block.throws)
            .unwrap_or(self.db.dynamic_type);

        let else_block = self.db.new_block(database::ELSE_BLOCK_NAME, BlockKind::ElseBlock);
        if let Some(block) = self.db.get_mut(else_block).as_block_mut() {
            block.define_self_argument(self_type);
        }
        try_expression.else_block_type = Some(else_block);

        let has_else = !try_expression.else_body.is_empty() || try_expression.else_argument.is_some();

        let else_type = if has_else {
            if let Some(argument) = &try_expression.else_argument
                && let Some(block) = self.db.get_mut(else_block).as_block_mut()
            {
                block.define_argument(argument.clone(), throw_type, false);
                block.required_arguments = 1;
            }

            let parent = std::mem::take(&mut scope.locals);
            let mut locals = SymbolTable::with_parent(parent);
            self.define_arguments_as_locals(else_block, &mut locals);

            let mut else_scope = TypeScope::new(self_type, else_block, locals);
            let else_type = self.check_body(&mut try_expression.else_body, &mut else_scope);
            scope.locals = else_scope.locals.into_parent().unwrap_or_default();

            else_type
        } else {
            self.db.void_type
        };

        if let Some(block) = self.db.get_mut(else_block).as_block_mut()
            && block.returns.is_none()
        {
            block.returns = Some(else_type);
        }

        // Branches producing physical values must agree; the whole
        // expression takes the try branch's type when it has one.
        if !self.db.is_void(try_type)
            && !self.db.is_void(else_type)
            && !compatibility::compatible(self.db, else_type, try_type)
        {
            let expected = self.db.type_name(try_type);
            let found = self.db.type_name(else_type);
            let at = try_expression
                .else_body
                .last()
                .map(|node| node.span)
                .unwrap_or(span);
            self.error(
                TypeErrorKind::TypeMismatch {
                    expected,
                    found,
                    span: at.into(),
                },
                at,
            );
        }

        if self.db.is_void(try_type) {
            else_type
        } else {
            try_type
        }
    }
}
