// src/errors/sema.rs
//! Type checking errors (E3xxx).

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum TypeErrorKind {
    #[error("the attribute '{name}' is undefined")]
    #[diagnostic(code(E3001))]
    UndefinedAttribute {
        name: String,
        #[label("undefined attribute")]
        span: SourceSpan,
    },

    #[error("the receiver of type '{receiver}' does not respond to '{name}'")]
    #[diagnostic(code(E3002))]
    UndefinedMethod {
        name: String,
        receiver: String,
        #[label("undefined method")]
        span: SourceSpan,
    },

    #[error("the constant '{name}' is undefined")]
    #[diagnostic(code(E3003))]
    UndefinedConstant {
        name: String,
        #[label("undefined constant")]
        span: SourceSpan,
    },

    #[error("the method '{method}' does not define the argument '{name}'")]
    #[diagnostic(code(E3004))]
    UndefinedKeywordArgument {
        name: String,
        method: String,
        #[label("unknown keyword argument")]
        span: SourceSpan,
    },

    #[error("the local '{name}' is undefined")]
    #[diagnostic(code(E3005))]
    UndefinedLocal {
        name: String,
        #[label("not found in scope")]
        span: SourceSpan,
    },

    #[error("the module '{module}' does not define '{name}'")]
    #[diagnostic(code(E3006))]
    ImportUndefinedSymbol {
        name: String,
        module: String,
        #[label("undefined symbol")]
        span: SourceSpan,
    },

    #[error("'{name}' is already defined and cannot be imported")]
    #[diagnostic(code(E3007))]
    ImportExistingSymbol {
        name: String,
        #[label("already defined")]
        span: SourceSpan,
    },

    #[error("expected {expected}, found {found}")]
    #[diagnostic(code(E3008))]
    TypeMismatch {
        expected: String,
        found: String,
        #[label("type mismatch")]
        span: SourceSpan,
    },

    #[error("the body returns {found}, but the signature declares {expected}")]
    #[diagnostic(code(E3009))]
    ReturnTypeMismatch {
        expected: String,
        found: String,
        #[label("incompatible return type")]
        span: SourceSpan,
    },

    #[error("'{method}' expects {expected} arguments, found {found}")]
    #[diagnostic(code(E3010))]
    ArgumentCountMismatch {
        method: String,
        expected: String,
        found: usize,
        #[label("wrong number of arguments")]
        span: SourceSpan,
    },

    #[error("'{found}' does not satisfy the constraints of '{parameter}'")]
    #[diagnostic(code(E3011))]
    GeneratedTraitNotImplemented {
        parameter: String,
        found: String,
        #[label("unsatisfied type parameter")]
        span: SourceSpan,
    },

    #[error("'{object}' does not implement the trait '{required}'")]
    #[diagnostic(code(E3012))]
    UnimplementedTrait {
        object: String,
        required: String,
        #[label("missing required trait")]
        span: SourceSpan,
    },

    #[error("'{object}' does not implement the method '{method}'")]
    #[diagnostic(code(E3013))]
    UnimplementedMethod {
        object: String,
        method: String,
        #[label("missing required method")]
        span: SourceSpan,
    },

    #[error("cannot reassign the undefined attribute '{name}'")]
    #[diagnostic(code(E3014))]
    ReassignUndefinedAttribute {
        name: String,
        #[label("undefined attribute")]
        span: SourceSpan,
    },

    #[error("cannot reassign the undefined local '{name}'")]
    #[diagnostic(code(E3015))]
    ReassignUndefinedLocal {
        name: String,
        #[label("undefined local")]
        span: SourceSpan,
    },

    #[error("cannot reassign the immutable attribute '{name}'")]
    #[diagnostic(code(E3016))]
    ReassignImmutableAttribute {
        name: String,
        #[label("attribute is immutable")]
        span: SourceSpan,
    },

    #[error("cannot reassign the immutable local '{name}'")]
    #[diagnostic(code(E3017), help("consider declaring the local as mutable"))]
    ReassignImmutableLocal {
        name: String,
        #[label("local is immutable")]
        span: SourceSpan,
    },

    #[error("instance attributes may only be defined inside 'init'")]
    #[diagnostic(code(E3018))]
    DefineInstanceAttributeOutsideInit {
        name: String,
        #[label("attribute defined outside 'init'")]
        span: SourceSpan,
    },

    #[error("required methods may only be defined on traits")]
    #[diagnostic(code(E3019))]
    DefineRequiredMethodOnNonTrait {
        name: String,
        #[label("not inside a trait")]
        span: SourceSpan,
    },

    #[error("'{name}' is a reserved constant and cannot be redefined")]
    #[diagnostic(code(E3020))]
    RedefineReservedConstant {
        name: String,
        #[label("reserved constant")]
        span: SourceSpan,
    },

    #[error("the raw instruction '{name}' does not exist")]
    #[diagnostic(code(E3021))]
    UnknownRawInstruction {
        name: String,
        #[label("unknown instruction")]
        span: SourceSpan,
    },
}
