//! `cast_value`: the closed set of legal type conversions.
//!
//! Identity casts and `any`-widening are implicit everywhere; everything
//! lossy exists only behind an explicit cast node in the typed tree
//! (`spec.md` §4.B/§4.C.1's `CastExpr`/`CastKind`) — the evaluator never
//! performs a lossy conversion on its own initiative.

use crate::types::interner::{Type, TypeKind};
use crate::types::value::Value;

/// Mirrors `interp::cst::CastExpr`'s `CastKind`: `None` is a type-preserving
/// no-op cast node (kept in the tree for uniform traversal), `Implicit`
/// widens to `any` or wraps into an optional; the other three are the only
/// lossy conversions the language allows, and only ever appear when the
/// source explicitly wrote a cast expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    None,
    Implicit,
    FloatToInteger,
    CharToInteger,
    IntegerToChar,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastError {
    pub message: String,
}

/// Determines which, if any, cast connects `from` to `to`; does not itself
/// perform the conversion (see [`cast_value`]).
pub fn classify_cast(from: &Type, to: &Type) -> Option<CastKind> {
    if from == to {
        return Some(CastKind::None);
    }
    if matches!(to.kind(), TypeKind::Any) {
        return Some(CastKind::Implicit);
    }
    if let TypeKind::Optional { element } = to.kind() {
        if element == from {
            return Some(CastKind::Implicit);
        }
    }
    match (from.kind(), to.kind()) {
        (TypeKind::Float, TypeKind::Integer) => Some(CastKind::FloatToInteger),
        (TypeKind::Char, TypeKind::Integer) => Some(CastKind::CharToInteger),
        (TypeKind::Integer, TypeKind::Char) => Some(CastKind::IntegerToChar),
        _ => None,
    }
}

/// Performs a cast whose kind was already decided by [`classify_cast`] (or
/// is known statically, e.g. from a typed-tree `CastExpr`).
pub fn cast_value(value: &Value, kind: CastKind, to: &Type) -> Result<Value, CastError> {
    match kind {
        CastKind::None => Ok(value.clone()),
        CastKind::Implicit => match to.kind() {
            TypeKind::Any => Ok(value.clone()),
            TypeKind::Optional { .. } => Ok(Value::Optional(Some(Box::new(value.clone())))),
            _ => Err(CastError { message: format!("cannot implicitly cast to {to:?}") }),
        },
        CastKind::FloatToInteger => match value {
            Value::Float(f) => Ok(Value::Integer(*f as i64)),
            _ => Err(CastError { message: "float->integer cast applied to a non-float value".into() }),
        },
        CastKind::CharToInteger => match value {
            Value::Char(c) => Ok(Value::Integer(*c as i64)),
            _ => Err(CastError { message: "char->integer cast applied to a non-char value".into() }),
        },
        CastKind::IntegerToChar => match value {
            Value::Integer(i) => {
                let c = char::from_u32(*i as u32)
                    .ok_or_else(|| CastError { message: format!("{i} is not a valid Unicode scalar value") })?;
                Ok(Value::Char(c))
            }
            _ => Err(CastError { message: "integer->char cast applied to a non-integer value".into() }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::interner::TypeInterner;

    #[test]
    fn identity_cast_is_none() {
        let interner = TypeInterner::new();
        let int = interner.integer();
        assert_eq!(classify_cast(&int, &int), Some(CastKind::None));
    }

    #[test]
    fn float_to_int_truncates() {
        let v = cast_value(&Value::Float(3.9), CastKind::FloatToInteger, &TypeInterner::new().integer()).unwrap();
        assert_eq!(v, Value::Integer(3));
    }

    #[test]
    fn int_to_char_rejects_surrogate_range() {
        let err = cast_value(&Value::Integer(0xD800), CastKind::IntegerToChar, &TypeInterner::new().char());
        assert!(err.is_err());
    }

    #[test]
    fn no_implicit_path_between_unrelated_primitives() {
        let interner = TypeInterner::new();
        assert_eq!(classify_cast(&interner.bool(), &interner.string()), None);
    }
}
