// src/sema/compatibility.rs
//
// Type compatibility checking. These are pure functions that determine if a
// value of one type can be used where another type is expected.

use crate::sema::database::TypeDatabase;
use crate::sema::type_arena::TypeId;
use crate::sema::types::Type;

/// Check if `ours` is compatible with `theirs`.
///
/// Compatibility is reflexive; Dynamic is compatible with everything in
/// both directions; Optional accepts the wrapped type and Nil; objects are
/// compatible with prototype-chain ancestors, implemented traits, and
/// structurally satisfied traits; blocks are contravariant in arguments and
/// covariant in return and throw types.
pub fn compatible(db: &TypeDatabase, ours: TypeId, theirs: TypeId) -> bool {
    if ours == theirs {
        return true;
    }

    if db.get(ours).is_dynamic() || db.get(theirs).is_dynamic() {
        return true;
    }

    match db.get(theirs) {
        Type::Optional(inner) => {
            let inner = *inner;

            if ours == db.nil_type || compatible(db, ours, inner) {
                return true;
            }

            match db.get(ours) {
                Type::Optional(our_inner) => compatible(db, *our_inner, inner),
                _ => false,
            }
        }
        Type::Trait(_) => db.implements_trait(ours, theirs),
        Type::Constraint(constraint) => constraint
            .required_methods
            .iter()
            .all(|method| db.implements_method(ours, method)),
        Type::Block(_) => block_compatible(db, ours, theirs),
        Type::Object(_) => db.prototype_chain_contains(ours, theirs),
        Type::SelfType => matches!(db.get(ours), Type::SelfType),
        Type::Dynamic => true,
    }
}

/// Block compatibility: argument counts match modulo rest arguments, each
/// argument pair is contravariant, and the return and throw types are
/// covariant. An absent throw type only matches an absent throw type.
pub fn block_compatible(db: &TypeDatabase, ours: TypeId, theirs: TypeId) -> bool {
    let (Some(supplied), Some(expected)) =
        (db.get(ours).as_block(), db.get(theirs).as_block())
    else {
        return false;
    };

    if !supplied.rest_argument
        && !expected.rest_argument
        && supplied.argument_count() != expected.argument_count()
    {
        return false;
    }

    // Skip index 0 (both blocks carry their own self argument) and rest
    // arguments, which extra call-site arguments bind to.
    let pairs = supplied
        .maximum_arguments()
        .min(expected.maximum_arguments());
    for position in 1..=pairs {
        let (Some(ours_arg), Some(theirs_arg)) = (
            supplied.positional_argument(position),
            expected.positional_argument(position),
        ) else {
            return false;
        };

        if !compatible(db, theirs_arg.value_type, ours_arg.value_type) {
            return false;
        }
    }

    let our_return = supplied.returns.unwrap_or(db.dynamic_type);
    let their_return = expected.returns.unwrap_or(db.dynamic_type);
    if !compatible(db, our_return, their_return) {
        return false;
    }

    match (supplied.throws, expected.throws) {
        (None, None) => true,
        (Some(ours_throw), Some(theirs_throw)) => compatible(db, ours_throw, theirs_throw),
        _ => false,
    }
}
