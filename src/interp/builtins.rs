//! The scripting surface's builtin function table (`SPEC_FULL.md` §4.C
//! supplement, §6): `Length` unit constructors, the `Colour` rgb/cmyk
//! constructors, `Position`, and the seven `PathSegment` cases, matching
//! `original_source/include/sap/path_segment.h` and `units.h`.

use crate::errors::{Error, Location, Result};
use crate::types::interner::{Type, TypeInterner};
use crate::types::value::{Colour, DynLength, DynLengthUnit, PathSegment, Position, Value};

/// Every builtin function's name and signature, interned fresh each call
/// (cheap: the interner dedupes). `typecheck::typecheck_program` declares
/// each of these into the root scope before predeclaring user source, the
/// same way it predeclares user `function` definitions.
pub fn signatures(interner: &TypeInterner) -> Vec<(&'static str, Vec<Type>, Type)> {
    let length_ty = interner.named("Length");
    let colour_ty = interner.named("Colour");
    let position_ty = interner.named("Position");
    let path_segment_ty = interner.named("PathSegment");
    let int = interner.integer();
    let float = interner.float();

    let mut out = Vec::new();
    for unit in ["mm", "cm", "em", "ex", "in", "pt", "pc", "rem"] {
        out.push((unit, vec![float.clone()], length_ty.clone()));
    }
    out.push(("rgb", vec![float.clone(), float.clone(), float.clone()], colour_ty.clone()));
    out.push(("cmyk", vec![float.clone(), float.clone(), float.clone(), float.clone()], colour_ty));
    out.push(("position", vec![float.clone(), float.clone()], position_ty.clone()));
    out.push(("move_to", vec![position_ty.clone()], path_segment_ty.clone()));
    out.push(("line_to", vec![position_ty.clone()], path_segment_ty.clone()));
    out.push(("cubic_bezier", vec![position_ty.clone(), position_ty.clone(), position_ty.clone()], path_segment_ty.clone()));
    out.push(("cubic_bezier_ic1", vec![position_ty.clone(), position_ty.clone()], path_segment_ty.clone()));
    out.push(("cubic_bezier_ic2", vec![position_ty.clone(), position_ty.clone()], path_segment_ty.clone()));
    out.push(("rectangle", vec![position_ty.clone(), position_ty.clone()], path_segment_ty.clone()));
    out.push(("close_path", vec![], path_segment_ty));
    out.push(("len", vec![interner.array(interner.any(), false)], int));
    out
}

/// Evaluates a call to one of the names [`signatures`] declared. `Length`
/// constructors stay in their unresolved unit (`DynLength::resolve` only
/// happens once a `Length` participates in arithmetic against the ambient
/// style, in `Evaluator::eval_binary`).
pub fn call_builtin(name: &str, args: &[Value], loc: Location) -> Result<Value> {
    let number = |v: &Value| -> Result<f64> {
        match v {
            Value::Float(f) => Ok(*f),
            Value::Integer(i) => Ok(*i as f64),
            _ => Err(Error::internal(format!("builtin '{name}' expected a number, got {v:?}"))),
        }
    };
    let position = |v: &Value| -> Result<Position> {
        match v {
            Value::Position(p) => Ok(*p),
            _ => Err(Error::internal(format!("builtin '{name}' expected a position, got {v:?}"))),
        }
    };

    match name {
        "mm" => Ok(Value::Length(DynLength { value: number(&args[0])?, unit: DynLengthUnit::Mm })),
        "cm" => Ok(Value::Length(DynLength { value: number(&args[0])?, unit: DynLengthUnit::Cm })),
        "em" => Ok(Value::Length(DynLength { value: number(&args[0])?, unit: DynLengthUnit::Em })),
        "ex" => Ok(Value::Length(DynLength { value: number(&args[0])?, unit: DynLengthUnit::Ex })),
        "in" => Ok(Value::Length(DynLength { value: number(&args[0])?, unit: DynLengthUnit::In })),
        "pt" => Ok(Value::Length(DynLength { value: number(&args[0])?, unit: DynLengthUnit::Pt })),
        "pc" => Ok(Value::Length(DynLength { value: number(&args[0])?, unit: DynLengthUnit::Pc })),
        "rem" => Ok(Value::Length(DynLength { value: number(&args[0])?, unit: DynLengthUnit::Rem })),
        "rgb" => Ok(Value::Colour(Colour::Rgb { r: number(&args[0])?, g: number(&args[1])?, b: number(&args[2])? })),
        "cmyk" => Ok(Value::Colour(Colour::Cmyk { c: number(&args[0])?, m: number(&args[1])?, y: number(&args[2])?, k: number(&args[3])? })),
        "position" => Ok(Value::Position(Position { x: number(&args[0])?, y: number(&args[1])? })),
        "move_to" => Ok(Value::PathSegment(PathSegment::Move(position(&args[0])?))),
        "line_to" => Ok(Value::PathSegment(PathSegment::Line(position(&args[0])?))),
        "cubic_bezier" => Ok(Value::PathSegment(PathSegment::CubicBezier(position(&args[0])?, position(&args[1])?, position(&args[2])?))),
        "cubic_bezier_ic1" => Ok(Value::PathSegment(PathSegment::CubicBezierIC1(position(&args[0])?, position(&args[1])?))),
        "cubic_bezier_ic2" => Ok(Value::PathSegment(PathSegment::CubicBezierIC2(position(&args[0])?, position(&args[1])?))),
        "rectangle" => Ok(Value::PathSegment(PathSegment::Rectangle(position(&args[0])?, position(&args[1])?))),
        "close_path" => Ok(Value::PathSegment(PathSegment::Close)),
        "len" => match &args[0] {
            Value::Array(a) => Ok(Value::Integer(a.len() as i64)),
            Value::String(s) => Ok(Value::Integer(s.chars().count() as i64)),
            other => Err(Error::internal(format!("'len' expected an array or string, got {other:?}"))),
        },
        _ => Err(Error::eval(loc, format!("unknown builtin function '{name}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_builds_a_tagged_colour() {
        let v = call_builtin("rgb", &[Value::Float(1.0), Value::Float(0.5), Value::Float(0.0)], Location::default()).unwrap();
        assert_eq!(v, Value::Colour(Colour::Rgb { r: 1.0, g: 0.5, b: 0.0 }));
    }

    #[test]
    fn len_counts_array_elements() {
        let arr = Value::Array(std::rc::Rc::new(vec![Value::Integer(1), Value::Integer(2)]));
        let v = call_builtin("len", &[arr], Location::default()).unwrap();
        assert_eq!(v, Value::Integer(2));
    }
}
