// src/sema/checker/intrinsics.rs
//
// Type assignments for the closed registry of raw instructions. The
// registry is part of the contract with code generation; unknown opcodes
// are diagnosed and type as Nil.

use super::Checker;

use crate::ast::{RawInstruction, Span};
use crate::errors::TypeErrorKind;
use crate::sema::scope::TypeScope;
use crate::sema::type_arena::TypeId;

impl Checker<'_> {
    pub(super) fn check_raw_instruction(
        &mut self,
        raw: &mut RawInstruction,
        span: Span,
        scope: &mut TypeScope,
    ) -> TypeId {
        for argument in raw.arguments.iter_mut() {
            self.check_expression(argument, scope);
        }

        match raw.name.as_str() {
            "integer_add" | "integer_sub" | "integer_mul" | "integer_div" | "integer_mod" => {
                self.db.integer_type
            }
            "integer_to_float" => self.db.float_type,
            "integer_to_string" => self.db.string_type,
            "float_add" | "float_sub" | "float_mul" | "float_div" => self.db.float_type,
            "float_to_integer" => self.db.integer_type,
            "float_to_string" => self.db.string_type,
            "string_size" => self.db.integer_type,
            "string_concat" => self.db.string_type,
            "array_length" => self.db.integer_type,
            "array_at" | "array_set" => self.db.dynamic_type,
            "stdout_write" | "stderr_write" => self.db.integer_type,
            "get_toplevel" => self.db.top_level,
            "get_nil" => self.db.nil_type,
            "get_true" => self.db.true_type,
            "get_false" => self.db.false_type,
            "module_load" => self.db.dynamic_type,
            "panic" | "exit" => self.db.void_type,
            _ => {
                self.error(
                    TypeErrorKind::UnknownRawInstruction {
                        name: raw.name.clone(),
                        span: span.into(),
                    },
                    span,
                );
                self.db.nil_type
            }
        }
    }
}
