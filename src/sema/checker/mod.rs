// src/sema/checker/mod.rs

mod declarations;
mod expr;
mod imports;
mod intrinsics;

use rustc_hash::FxHashMap;

use crate::ast::{self, Node, NodeId, NodeKind, Span, TypeAnnotation, TypeParameterDef};
use crate::errors::{Diagnostics, TypeErrorKind};
use crate::sema::compatibility;
use crate::sema::database::{self, TypeDatabase};
use crate::sema::module::ModuleRecord;
use crate::sema::scope::TypeScope;
use crate::sema::symbols::SymbolTable;
use crate::sema::type_arena::TypeId;
use crate::sema::types::{BlockKind, ConstraintType, Type};

/// The type pass: assigns a type to every expression node, registers
/// declarations, and verifies trait contracts.
///
/// Declarations are processed in two phases. Phase one walks the module
/// body, queuing method bodies instead of entering them; phase two types
/// every queued body under its recorded scope. This lets methods refer to
/// sibling declarations appearing later in source order.
pub struct Checker<'a> {
    db: &'a mut TypeDatabase,
    modules: &'a FxHashMap<String, ModuleRecord>,
    diagnostics: &'a mut Diagnostics,
    module: ModuleRecord,
    /// Scopes of queued method bodies, keyed by their node
    pending: FxHashMap<NodeId, TypeScope>,
    /// Value types of `return` expressions per enclosing block body
    return_frames: Vec<Vec<(TypeId, Span)>>,
    /// Throw types observed while typing a `try` expression
    throw_frames: Vec<Option<TypeId>>,
}

impl<'a> Checker<'a> {
    pub fn new(
        db: &'a mut TypeDatabase,
        modules: &'a FxHashMap<String, ModuleRecord>,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        let module = ModuleRecord::new("", db.top_level, db.block_type, false);

        Self {
            db,
            modules,
            diagnostics,
            module,
            pending: FxHashMap::default(),
            return_frames: Vec::new(),
            throw_frames: Vec::new(),
        }
    }

    /// Type a module's AST in place.
    pub fn run(&mut self, module: &mut ast::Module) {
        let module_type = self.define_module_type(module);
        let body_block = self.define_module_body_block(module, module_type);

        self.module = ModuleRecord::new(
            &module.name,
            module_type,
            body_block,
            module.defines_module_type,
        );
        self.module
            .define_global(database::MODULE_GLOBAL, module_type, false);

        tracing::debug!(module = %module.name, "running type pass");

        // Imports bind before any top-level declaration is processed.
        for node in module.body.iter_mut() {
            if let NodeKind::Import(import) = &node.kind {
                let import = import.clone();
                self.check_import(&import, node.span);
                node.resolved_type = Some(self.db.nil_type);
            }
        }

        let mut scope = TypeScope::new(module_type, body_block, SymbolTable::new());
        let mut last_type = self.db.nil_type;

        for node in module.body.iter_mut() {
            if matches!(node.kind, NodeKind::Import(_)) {
                continue;
            }
            last_type = self.check_expression(node, &mut scope);
        }

        if let Some(block) = self.db.get_mut(body_block).as_block_mut()
            && block.returns.is_none()
        {
            block.returns = Some(last_type);
        }

        self.process_deferred(module);
    }

    /// Consume the checker, returning the module record it built.
    pub fn into_module(self) -> ModuleRecord {
        self.module
    }

    fn define_module_type(&mut self, module: &ast::Module) -> TypeId {
        if !module.defines_module_type {
            return self.db.top_level;
        }

        // Re-registering a known module reuses its type, keeping the pass
        // idempotent.
        let existing = self
            .db
            .lookup_attribute(self.db.modules_registry, &module.name)
            .map(|symbol| symbol.value_type)
            .filter(|&id| self.db.get(id).is_object());

        let module_type = existing.unwrap_or_else(|| {
            let prototype = self.db.module_prototype;
            self.db.new_object(&module.name, Some(prototype))
        });

        let registry = self.db.modules_registry;
        if let Some(attributes) = self.db.get_mut(registry).attributes_mut() {
            attributes.define(module.name.clone(), module_type, false);
        }

        module_type
    }

    fn define_module_body_block(&mut self, module: &ast::Module, module_type: TypeId) -> TypeId {
        let body_block = self.db.new_block(&module.name, BlockKind::Method);
        if let Some(block) = self.db.get_mut(body_block).as_block_mut() {
            block.define_self_argument(module_type);
        }
        body_block
    }

    /// Phase two: type every queued method body in queue order. Bodies may
    /// queue further methods, so walking repeats until the queue drains.
    fn process_deferred(&mut self, module: &mut ast::Module) {
        while !self.pending.is_empty() {
            let before = self.pending.len();

            for node in module.body.iter_mut() {
                self.visit_deferred(node);
            }

            if self.pending.len() == before {
                tracing::warn!(
                    remaining = self.pending.len(),
                    "deferred methods not reachable from the module body"
                );
                self.pending.clear();
            }
        }
    }

    fn visit_deferred(&mut self, node: &mut Node) {
        if let NodeKind::Method(method) = &mut node.kind {
            if let Some(scope) = self.pending.remove(&node.id) {
                tracing::trace!(method = %method.name, "typing deferred method body");
                self.check_deferred_method(method, node.span, scope);
            }
        }

        match &mut node.kind {
            NodeKind::ArrayLiteral(values) => {
                for value in values {
                    self.visit_deferred(value);
                }
            }
            NodeKind::Send(send) => {
                if let Some(receiver) = &mut send.receiver {
                    self.visit_deferred(receiver);
                }
                for argument in &mut send.arguments {
                    self.visit_deferred(argument);
                }
            }
            NodeKind::KeywordArgument(keyword) => self.visit_deferred(&mut keyword.value),
            NodeKind::Object(object) => {
                for child in &mut object.body {
                    self.visit_deferred(child);
                }
            }
            NodeKind::Trait(traits) => {
                for child in &mut traits.body {
                    self.visit_deferred(child);
                }
            }
            NodeKind::TraitImplementation(implementation) => {
                for child in &mut implementation.body {
                    self.visit_deferred(child);
                }
            }
            NodeKind::ReopenObject(reopen) => {
                for child in &mut reopen.body {
                    self.visit_deferred(child);
                }
            }
            NodeKind::Method(method) => {
                for child in &mut method.body {
                    self.visit_deferred(child);
                }
            }
            NodeKind::Closure(closure) => {
                for child in &mut closure.body {
                    self.visit_deferred(child);
                }
            }
            NodeKind::DefineVariable(define) => self.visit_deferred(&mut define.value),
            NodeKind::Reassign(reassign) => self.visit_deferred(&mut reassign.value),
            NodeKind::Return(Some(value)) => self.visit_deferred(value),
            NodeKind::Throw(value) => self.visit_deferred(value),
            NodeKind::Try(try_expression) => {
                self.visit_deferred(&mut try_expression.expression);
                for child in &mut try_expression.else_body {
                    self.visit_deferred(child);
                }
            }
            NodeKind::RawInstruction(raw) => {
                for argument in &mut raw.arguments {
                    self.visit_deferred(argument);
                }
            }
            _ => {}
        }
    }

    /// Type a single expression node, recording its resolved type.
    pub(crate) fn check_expression(&mut self, node: &mut Node, scope: &mut TypeScope) -> TypeId {
        let span = node.span;
        let id = node.id;

        let resolved = match &mut node.kind {
            NodeKind::IntegerLiteral(_) => self.db.integer_type,
            NodeKind::FloatLiteral(_) => self.db.float_type,
            NodeKind::StringLiteral(_) => self.db.string_type,
            NodeKind::BooleanLiteral(true) => self.db.true_type,
            NodeKind::BooleanLiteral(false) => self.db.false_type,
            NodeKind::NilLiteral => self.db.nil_type,
            NodeKind::ArrayLiteral(values) => {
                for value in values.iter_mut() {
                    self.check_expression(value, scope);
                }
                self.db.array_type
            }
            NodeKind::SelfExpression => scope.self_type,
            NodeKind::Identifier(name) => {
                let name = name.clone();
                self.check_identifier(&name, span, scope)
            }
            NodeKind::Constant(constant) => self.check_constant(constant, span, scope),
            NodeKind::Attribute(name) => {
                let name = name.clone();
                self.check_attribute(&name, span, scope)
            }
            NodeKind::Global(name) => {
                let name = name.clone();
                self.check_global(&name, span, scope)
            }
            NodeKind::Send(send) => self.check_send(send, span, scope),
            NodeKind::KeywordArgument(keyword) => self.check_expression(&mut keyword.value, scope),
            NodeKind::Object(object) => self.check_object(object, span, scope),
            NodeKind::Trait(traits) => self.check_trait(traits, span, scope),
            NodeKind::TraitImplementation(implementation) => {
                self.check_trait_implementation(implementation, span, scope)
            }
            NodeKind::ReopenObject(reopen) => self.check_reopen_object(reopen, span, scope),
            NodeKind::Method(method) => self.check_method(id, method, span, scope),
            NodeKind::Closure(closure) => self.check_closure(closure, span, scope),
            NodeKind::DefineVariable(define) => self.check_define_variable(define, span, scope),
            NodeKind::Reassign(reassign) => self.check_reassign(reassign, span, scope),
            NodeKind::Return(value) => self.check_return(value.as_deref_mut(), span, scope),
            NodeKind::Throw(value) => self.check_throw(value, span, scope),
            NodeKind::Try(try_expression) => self.check_try(try_expression, span, scope),
            NodeKind::RawInstruction(raw) => self.check_raw_instruction(raw, span, scope),
            NodeKind::Import(import) => {
                let import = import.clone();
                self.check_import(&import, span);
                self.db.nil_type
            }
        };

        node.resolved_type = Some(resolved);
        resolved
    }

    /// Type a sequence of expressions; the body's type is the type of its
    /// last expression, or Nil when empty.
    pub(crate) fn check_body(&mut self, body: &mut [Node], scope: &mut TypeScope) -> TypeId {
        let mut last = self.db.nil_type;

        for node in body.iter_mut() {
            last = self.check_expression(node, scope);
        }

        last
    }

    /// Type a block body, collecting `return` expressions. Every non-last
    /// return's value type must be compatible with the body's type.
    pub(crate) fn check_block_body(&mut self, body: &mut [Node], scope: &mut TypeScope) -> TypeId {
        let trailing_return = matches!(body.last().map(|n| &n.kind), Some(NodeKind::Return(_)));

        self.return_frames.push(Vec::new());
        let body_type = self.check_body(body, scope);
        let mut collected = self.return_frames.pop().unwrap_or_default();

        if trailing_return && !collected.is_empty() {
            collected.pop();
        }

        for (returned, span) in collected {
            if !compatibility::compatible(self.db, returned, body_type) {
                let expected = self.db.type_name(body_type);
                let found = self.db.type_name(returned);
                self.error(
                    TypeErrorKind::ReturnTypeMismatch {
                        expected,
                        found,
                        span: span.into(),
                    },
                    span,
                );
            }
        }

        body_type
    }

    /// Resolve a written type reference against the ordered lookup sources:
    /// the enclosing block's type parameters, the self type, then constant
    /// resolution.
    pub(crate) fn resolve_annotation(
        &mut self,
        annotation: &TypeAnnotation,
        scope: &TypeScope,
    ) -> TypeId {
        match annotation {
            TypeAnnotation::Named {
                name,
                arguments,
                span,
            } => {
                for argument in arguments {
                    self.resolve_annotation(argument, scope);
                }

                if let Some(block) = self.db.get(scope.block_type).as_block()
                    && let Some(parameter) = block.type_parameters.get(name)
                {
                    return parameter;
                }

                if let Some(parameters) = self.db.get(scope.self_type).type_parameters()
                    && let Some(parameter) = parameters.get(name)
                {
                    return parameter;
                }

                if let Some(found) = self.resolve_constant_name(name, scope) {
                    return found;
                }

                self.error(
                    TypeErrorKind::UndefinedConstant {
                        name: name.clone(),
                        span: (*span).into(),
                    },
                    *span,
                );
                self.db.dynamic_type
            }
            TypeAnnotation::Optional { inner, .. } => {
                let inner = self.resolve_annotation(inner, scope);
                self.db.optional(inner)
            }
            TypeAnnotation::SelfType { .. } => self.db.self_placeholder,
            TypeAnnotation::Dynamic { .. } => self.db.dynamic_type,
            TypeAnnotation::Block {
                arguments,
                returns,
                throws,
                ..
            } => {
                let block_id = self.db.new_block("block", BlockKind::Closure);
                let self_type = scope.self_type;

                if let Some(block) = self.db.get_mut(block_id).as_block_mut() {
                    block.define_self_argument(self_type);
                }

                for (index, argument) in arguments.iter().enumerate() {
                    let argument_type = self.resolve_annotation(argument, scope);
                    if let Some(block) = self.db.get_mut(block_id).as_block_mut() {
                        block.define_argument(format!("a{index}"), argument_type, false);
                        block.required_arguments += 1;
                    }
                }

                let returns = returns
                    .as_deref()
                    .map(|annotation| self.resolve_annotation(annotation, scope));
                let throws = throws
                    .as_deref()
                    .map(|annotation| self.resolve_annotation(annotation, scope));

                if let Some(block) = self.db.get_mut(block_id).as_block_mut() {
                    block.returns = returns;
                    block.throws = throws;
                }

                block_id
            }
        }
    }

    /// Constant resolution through [self type, module, top level].
    pub(crate) fn resolve_constant_name(&self, name: &str, scope: &TypeScope) -> Option<TypeId> {
        if let Some(symbol) = self.db.lookup_attribute(scope.self_type, name) {
            return Some(symbol.value_type);
        }

        if let Some(symbol) = self.module.global(name) {
            return Some(symbol.value_type);
        }

        if let Some(symbol) = self.db.lookup_attribute(self.module.type_id, name) {
            return Some(symbol.value_type);
        }

        self.db
            .lookup_attribute(self.db.top_level, name)
            .map(|symbol| symbol.value_type)
    }

    /// Build a block's signature: type parameters, the implicit self
    /// argument, formal arguments, and the return and throw types.
    ///
    /// Unannotated arguments fall back to their default value's type when
    /// one exists. Without either, closure arguments receive a fresh
    /// constraint and method arguments are Dynamic.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn define_block_signature(
        &mut self,
        block_id: TypeId,
        type_parameters: &[TypeParameterDef],
        arguments: &mut [ast::ArgumentDef],
        returns: Option<&TypeAnnotation>,
        throws: Option<&TypeAnnotation>,
        scope: &mut TypeScope,
        closure: bool,
    ) {
        let self_type = scope.self_type;

        if let Some(block) = self.db.get_mut(block_id).as_block_mut() {
            block.define_self_argument(self_type);
        }

        let signature_scope = TypeScope::new(self_type, block_id, SymbolTable::new());

        for parameter in type_parameters {
            let generated = self.db.new_generated_trait(&parameter.name);

            for required in &parameter.required_traits {
                let required_type = self.resolve_annotation(required, &signature_scope);
                if self.db.get(required_type).is_trait()
                    && let Some(traits) = self.db.get_mut(generated).as_trait_mut()
                {
                    traits.required_traits.insert(required_type);
                }
            }

            if let Some(block) = self.db.get_mut(block_id).as_block_mut() {
                block.type_parameters.define(&parameter.name, generated);
            }
        }

        let mut required_count = 0;

        for argument in arguments.iter_mut() {
            let argument_type = if let Some(annotation) = &argument.annotation {
                self.resolve_annotation(annotation, &signature_scope)
            } else if let Some(default) = argument.default_value.as_mut() {
                self.check_expression(default, scope)
            } else if closure {
                self.db
                    .alloc(Type::Constraint(ConstraintType::new(&argument.name)))
            } else {
                self.db.dynamic_type
            };

            if !argument.rest && argument.default_value.is_none() {
                required_count += 1;
            }

            if let Some(block) = self.db.get_mut(block_id).as_block_mut() {
                block.define_argument(&argument.name, argument_type, argument.rest);
            }
        }

        let returns = returns.map(|annotation| self.resolve_annotation(annotation, &signature_scope));
        let throws = throws.map(|annotation| self.resolve_annotation(annotation, &signature_scope));

        if let Some(block) = self.db.get_mut(block_id).as_block_mut() {
            block.required_arguments = required_count;
            block.returns = returns;
            block.throws = throws;
        }
    }

    /// Copy a block's formal arguments into a locals table so the body can
    /// refer to them by name.
    pub(crate) fn define_arguments_as_locals(&self, block_id: TypeId, locals: &mut SymbolTable) {
        let Some(block) = self.db.get(block_id).as_block() else {
            return;
        };

        for argument in block.arguments.iter().skip(1) {
            locals.define(argument.name.clone(), argument.value_type, false);
        }
    }

    pub(crate) fn error(&mut self, kind: TypeErrorKind, span: Span) {
        self.diagnostics.error(kind, span);
    }

    pub(crate) fn record_throw(&mut self, thrown: TypeId) {
        if let Some(frame) = self.throw_frames.last_mut()
            && frame.is_none()
        {
            *frame = Some(thrown);
        }
    }
}
