//! Evaluation (`spec.md` §4.C.2): walks a typechecked [`crate::interp::cst`]
//! tree against a stack of [`Frame`]s, producing [`EvalResult`]s. Grounded
//! operator-by-operator on `original_source/source/interp/cst/*.cpp`.

use std::rc::Rc;

use crate::errors::{Error, Location, Result};
use crate::interp::cst::{self, BinaryOp, CompareOp, Decl, DeclId, LogicalOp, NullCoalesceKind, UnaryOp};
use crate::interp::frame::Frame;
use crate::interp::typecheck::Decls;
use crate::tree::style::Style;
use crate::types::cast::{cast_value, classify_cast};
use crate::types::interner::TypeInterner;
use crate::types::value::{EvalResult, LvalueHandle, NamedValue, Value};

pub struct Evaluator<'a> {
    decls: &'a Decls,
    frame: Rc<Frame>,
    /// The style in effect for `Length` arithmetic (`spec.md` §4.C supplement:
    /// "`Length` arithmetic resolves against the ambient style... only at
    /// the point a `Length` participates in a layout-affecting operation").
    current_style: Rc<Style>,
    root_font_size_mm: f64,
}

impl<'a> Evaluator<'a> {
    pub fn new(decls: &'a Decls) -> Self {
        let style = Rc::new(Style::empty());
        let root_font_size_mm = style.font_size_mm_or_default();
        Evaluator { decls, frame: Frame::root(), current_style: style, root_font_size_mm }
    }

    pub fn with_style(decls: &'a Decls, style: Rc<Style>) -> Self {
        let root_font_size_mm = style.font_size_mm_or_default();
        Evaluator { decls, frame: Frame::root(), current_style: style, root_font_size_mm }
    }

    fn generation(&self) -> u64 {
        self.frame.generation()
    }

    fn push_block_scope(&mut self) -> Rc<Frame> {
        let saved = self.frame.clone();
        self.frame = self.frame.child();
        saved
    }

    fn push_call_scope(&mut self) -> Rc<Frame> {
        let saved = self.frame.clone();
        self.frame = self.frame.call();
        saved
    }

    fn pop_scope(&mut self, saved: Rc<Frame>) {
        self.frame = saved;
    }

    fn resolve_value(&self, result: EvalResult, loc: Location) -> Result<Value> {
        result.into_value(self.generation(), loc)
    }

    pub fn eval_stmt(&mut self, stmt: &cst::Stmt) -> Result<EvalResult> {
        let loc = stmt.loc;
        match &stmt.kind {
            cst::StmtKind::Expr(e) => {
                let r = self.eval_expr(e)?;
                // Non-lvalue intermediate results are dropped at the end of
                // the containing block, not here; see `Block`'s own loop.
                Ok(match r {
                    EvalResult::Normal(_) | EvalResult::LValue(_) => EvalResult::unit(),
                    other => other,
                })
            }
            cst::StmtKind::Let { decl, init } => {
                let value = match init {
                    Some(e) => {
                        let r = self.eval_expr(e)?;
                        self.resolve_value(r, loc)?
                    }
                    None => Value::Null,
                };
                self.frame.declare(*decl, value);
                Ok(EvalResult::unit())
            }
            cst::StmtKind::Block(stmts) => {
                let saved = self.push_block_scope();
                let result = (|| {
                    for s in stmts {
                        let r = self.eval_stmt(s)?;
                        if !matches!(r, EvalResult::Normal(Value::Null)) && !is_unit(&r) {
                            return Ok(r);
                        }
                    }
                    Ok(EvalResult::unit())
                })();
                self.pop_scope(saved);
                result
            }
            cst::StmtKind::If { cond, then_branch, else_branch } => {
                let cond_val = self.eval_bool(cond)?;
                if cond_val {
                    self.eval_stmt(then_branch)
                } else if let Some(e) = else_branch {
                    self.eval_stmt(e)
                } else {
                    Ok(EvalResult::unit())
                }
            }
            cst::StmtKind::IfLetOptional { scrutinee, decl, then_branch, else_branch } => {
                let saved = self.push_block_scope();
                let r = self.eval_expr(scrutinee)?;
                let value = self.resolve_value(r, loc)?;
                let result = match value {
                    Value::Optional(Some(inner)) => {
                        self.frame.declare(*decl, *inner);
                        self.eval_stmt(then_branch)
                    }
                    Value::Optional(None) | Value::Null => match else_branch {
                        Some(e) => self.eval_stmt(e),
                        None => Ok(EvalResult::unit()),
                    },
                    _ => Err(Error::internal("if-let-optional scrutinee did not evaluate to an optional")),
                };
                self.pop_scope(saved);
                result
            }
            cst::StmtKind::IfLetUnion { scrutinee, variant_index, bindings, then_branch, else_branch } => {
                let saved = self.push_block_scope();
                let r = self.eval_expr(scrutinee)?;
                let value = self.resolve_value(r, loc)?;
                let result = match value {
                    Value::Named(named) if named.variant_index == Some(*variant_index) => {
                        for (field_index, decl) in bindings {
                            self.frame.declare(*decl, named.fields[*field_index].clone());
                        }
                        self.eval_stmt(then_branch)
                    }
                    Value::Named(_) => match else_branch {
                        Some(e) => self.eval_stmt(e),
                        None => Ok(EvalResult::unit()),
                    },
                    _ => Err(Error::internal("if-let-union scrutinee did not evaluate to a union value")),
                };
                self.pop_scope(saved);
                result
            }
            cst::StmtKind::While { cond, body } => {
                while self.eval_bool(cond)? {
                    match self.eval_stmt(body)? {
                        EvalResult::Return(v) => return Ok(EvalResult::Return(v)),
                        EvalResult::LoopBreak => break,
                        _ => {}
                    }
                }
                Ok(EvalResult::unit())
            }
            cst::StmtKind::For { init, cond, update, body } => {
                let saved = self.push_block_scope();
                let result = (|| {
                    if let Some(s) = init {
                        self.eval_stmt(s)?;
                    }
                    loop {
                        if let Some(c) = cond {
                            if !self.eval_bool(c)? {
                                break;
                            }
                        }
                        match self.eval_stmt(body)? {
                            EvalResult::Return(v) => return Ok(EvalResult::Return(v)),
                            EvalResult::LoopBreak => break,
                            _ => {}
                        }
                        if let Some(u) = update {
                            self.eval_expr(u)?;
                        }
                    }
                    Ok(EvalResult::unit())
                })();
                self.pop_scope(saved);
                result
            }
            cst::StmtKind::Return(e) => match e {
                None => Ok(EvalResult::Return(Value::Null)),
                Some(e) => {
                    let r = self.eval_expr(e)?;
                    let value = match r {
                        EvalResult::LValue(handle) => {
                            if Frame::is_owned_within_current_call(&self.frame, &handle.cell) {
                                handle.take(loc)?
                            } else {
                                handle.read(self.generation(), loc)?
                            }
                        }
                        other => other.into_value(self.generation(), loc)?,
                    };
                    Ok(EvalResult::Return(value))
                }
            },
            cst::StmtKind::Break => Ok(EvalResult::LoopBreak),
            cst::StmtKind::Continue => Ok(EvalResult::LoopContinue),
            cst::StmtKind::Import(_) => Ok(EvalResult::unit()),
            cst::StmtKind::Hook { .. } => {
                // Phase gating (`spec.md` §4.C.3) is the layout driver's
                // responsibility, which decides *when* to call `eval_stmt`
                // on a hook body at all; by the time evaluation reaches
                // here the phase has already matched.
                match &stmt.kind {
                    cst::StmtKind::Hook { body, .. } => self.eval_stmt(body),
                    _ => unreachable!(),
                }
            }
            cst::StmtKind::FunctionDef(_) | cst::StmtKind::StructDef(_) | cst::StmtKind::UnionDef(_) | cst::StmtKind::EnumDef(_) => Ok(EvalResult::unit()),
        }
    }

    fn eval_bool(&mut self, e: &cst::Expr) -> Result<bool> {
        let r = self.eval_expr(e)?;
        let value = self.resolve_value(r, e.loc)?;
        match value {
            Value::Bool(b) => Ok(b),
            _ => Err(Error::internal("condition did not evaluate to bool (typecheck should have rejected this)")),
        }
    }

    pub fn eval_expr(&mut self, expr: &cst::Expr) -> Result<EvalResult> {
        let loc = expr.loc;
        match &expr.kind {
            cst::ExprKind::Null => Ok(EvalResult::Normal(Value::Null)),
            cst::ExprKind::Bool(b) => Ok(EvalResult::Normal(Value::Bool(*b))),
            cst::ExprKind::Integer(i) => Ok(EvalResult::Normal(Value::Integer(*i))),
            cst::ExprKind::Float(f) => Ok(EvalResult::Normal(Value::Float(*f))),
            cst::ExprKind::Char(c) => Ok(EvalResult::Normal(Value::Char(*c))),
            cst::ExprKind::Str(s) => Ok(EvalResult::Normal(Value::String(Rc::new(s.to_string())))),
            cst::ExprKind::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    let r = self.eval_expr(item)?;
                    values.push(self.resolve_value(r, item.loc)?);
                }
                Ok(EvalResult::Normal(Value::Array(Rc::new(values))))
            }
            cst::ExprKind::FString(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        cst::FStringPart::Literal(s) => out.push_str(s),
                        cst::FStringPart::Expr(e) => {
                            let r = self.eval_expr(e)?;
                            let v = self.resolve_value(r, e.loc)?;
                            out.push_str(&v.to_string());
                        }
                    }
                }
                Ok(EvalResult::Normal(Value::String(Rc::new(out))))
            }
            cst::ExprKind::Cast { expr: inner, kind } => {
                let r = self.eval_expr(inner)?;
                let value = self.resolve_value(r, loc)?;
                let cast = cast_value(&value, *kind, &expr.ty).map_err(|e| Error::eval(loc, e.message))?;
                Ok(EvalResult::Normal(cast))
            }
            cst::ExprKind::StructLiteral { type_name, fields } => {
                let declared_order = match self.decls.find_named(type_name) {
                    Some((_, Decl::Struct { fields, .. })) => fields.iter().map(|(n, _)| n.clone()).collect::<Vec<_>>(),
                    _ => return Err(Error::internal(format!("struct '{type_name}' not found at eval time"))),
                };
                let mut by_name = std::collections::HashMap::new();
                for (name, value_expr) in fields {
                    let r = self.eval_expr(value_expr)?;
                    by_name.insert(name.to_string(), self.resolve_value(r, value_expr.loc)?);
                }
                let ordered = declared_order.iter().map(|n| by_name.remove(n.as_ref()).unwrap_or(Value::Null)).collect();
                Ok(EvalResult::Normal(Value::Named(Rc::new(NamedValue { type_name: type_name.to_string(), variant_index: None, fields: ordered }))))
            }
            cst::ExprKind::Unary { op, expr: inner } => {
                let r = self.eval_expr(inner)?;
                let value = self.resolve_value(r, loc)?;
                let result = match (op, &value) {
                    (UnaryOp::Neg, Value::Integer(i)) => Value::Integer(-i),
                    (UnaryOp::Neg, Value::Float(f)) => Value::Float(-f),
                    (UnaryOp::Not, Value::Bool(b)) => Value::Bool(!b),
                    _ => return Err(Error::internal("unary operator applied to an unsupported value (typecheck should have rejected this)")),
                };
                Ok(EvalResult::Normal(result))
            }
            cst::ExprKind::Binary { op, lhs, rhs } => {
                let l = self.eval_expr(lhs)?;
                let lval = self.resolve_value(l, lhs.loc)?;
                let r = self.eval_expr(rhs)?;
                let rval = self.resolve_value(r, rhs.loc)?;
                Ok(EvalResult::Normal(self.eval_binary(*op, lval, rval, loc)?))
            }
            cst::ExprKind::Logical { op, lhs, rhs } => {
                let left = self.eval_bool(lhs)?;
                match op {
                    LogicalOp::And if !left => Ok(EvalResult::Normal(Value::Bool(false))),
                    LogicalOp::Or if left => Ok(EvalResult::Normal(Value::Bool(true))),
                    _ => {
                        let right = self.eval_bool(rhs)?;
                        Ok(EvalResult::Normal(Value::Bool(right)))
                    }
                }
            }
            cst::ExprKind::Comparison { first, rest } => {
                let r0 = self.eval_expr(first)?;
                let mut lhs = self.resolve_value(r0, first.loc)?;
                for (op, rhs_expr) in rest {
                    let r = self.eval_expr(rhs_expr)?;
                    let rhs = self.resolve_value(r, rhs_expr.loc)?;
                    if !compare_values(*op, &lhs, &rhs)? {
                        return Ok(EvalResult::Normal(Value::Bool(false)));
                    }
                    lhs = rhs;
                }
                Ok(EvalResult::Normal(Value::Bool(true)))
            }
            cst::ExprKind::Assign { op, lhs, rhs } => {
                let l = self.eval_expr(lhs)?;
                let handle = match l {
                    EvalResult::LValue(h) => h,
                    _ => return Err(Error::eval(loc, "cannot assign to a non-lvalue")),
                };
                let r = self.eval_expr(rhs)?;
                let rval = self.resolve_value(r, rhs.loc)?;

                let result_value = match op {
                    None => rval,
                    Some(binop) => {
                        let current = handle.read(self.generation(), loc)?;
                        self.eval_binary(*binop, current, rval, loc)?
                    }
                };

                // Casts to the lvalue's static type (`assign_op.cpp`'s
                // `ev->castValue`); a compound assign's rhs is `rhs.ty`
                // still, since the operator's result stays the operand type.
                let source_ty = if op.is_some() { &lhs.ty } else { &rhs.ty };
                let final_value = match classify_cast(source_ty, &lhs.ty) {
                    Some(kind) => cast_value(&result_value, kind, &lhs.ty).map_err(|e| Error::eval(loc, e.message))?,
                    None => result_value,
                };
                handle.write(final_value);
                Ok(EvalResult::unit())
            }
            cst::ExprKind::NullCoalesce { kind, lhs, rhs } => {
                let l = self.eval_expr(lhs)?;
                let lval = self.resolve_value(l, lhs.loc)?;
                let has_value = match &lval {
                    Value::Optional(inner) => inner.is_some(),
                    Value::Null => false,
                    _ => true,
                };
                if has_value {
                    match (kind, lval) {
                        (NullCoalesceKind::Flatmap, v) => Ok(EvalResult::Normal(v)),
                        (NullCoalesceKind::Value, Value::Optional(Some(inner))) => Ok(EvalResult::Normal(*inner)),
                        (NullCoalesceKind::Value, v) => Ok(EvalResult::Normal(v)),
                    }
                } else {
                    let r = self.eval_expr(rhs)?;
                    Ok(EvalResult::Normal(self.resolve_value(r, rhs.loc)?))
                }
            }
            cst::ExprKind::OptionalCheck(inner) => {
                let r = self.eval_expr(inner)?;
                let value = self.resolve_value(r, inner.loc)?;
                let has_value = match value {
                    Value::Optional(inner) => inner.is_some(),
                    Value::Null => false,
                    _ => true,
                };
                Ok(EvalResult::Normal(Value::Bool(has_value)))
            }
            cst::ExprKind::Deref(inner) => {
                // Pointers are represented as lvalue handles; dereferencing
                // just re-exposes the pointee as an lvalue.
                self.eval_expr(inner)
            }
            cst::ExprKind::AddressOf { expr: inner, .. } => self.eval_expr(inner),
            cst::ExprKind::Subscript { base, index } => {
                let b = self.eval_expr(base)?;
                let base_val = self.resolve_value(b, base.loc)?;
                let i = self.eval_expr(index)?;
                let index_val = self.resolve_value(i, index.loc)?;
                let idx = match index_val {
                    Value::Integer(i) => i,
                    _ => return Err(Error::internal("array subscript index was not an integer")),
                };
                match base_val {
                    Value::Array(arr) => {
                        let len = arr.len() as i64;
                        if idx < 0 || idx >= len {
                            return Err(Error::eval(loc, format!("array index {idx} out of bounds (length {len})")));
                        }
                        Ok(EvalResult::Normal(arr[idx as usize].clone()))
                    }
                    _ => Err(Error::internal("subscript applied to a non-array value")),
                }
            }
            cst::ExprKind::StructUpdate { base, fields } => {
                let b = self.eval_expr(base)?;
                let base_val = self.resolve_value(b, base.loc)?;
                let named = match base_val {
                    Value::Named(n) => n,
                    _ => return Err(Error::internal("struct-update applied to a non-struct value")),
                };
                let declared_order = match self.decls.find_named(&named.type_name) {
                    Some((_, Decl::Struct { fields, .. })) => fields.iter().map(|(n, _)| n.clone()).collect::<Vec<_>>(),
                    _ => return Err(Error::internal(format!("struct '{}' not found at eval time", named.type_name))),
                };
                let mut updated_fields = named.fields.clone();
                for (name, value_expr) in fields {
                    let r = self.eval_expr(value_expr)?;
                    let v = self.resolve_value(r, value_expr.loc)?;
                    if let Some(idx) = declared_order.iter().position(|n| n.as_ref() == name.as_ref()) {
                        updated_fields[idx] = v;
                    }
                }
                Ok(EvalResult::Normal(Value::Named(Rc::new(NamedValue {
                    type_name: named.type_name.clone(),
                    variant_index: named.variant_index,
                    fields: updated_fields,
                }))))
            }
            cst::ExprKind::Move(inner) => {
                let r = self.eval_expr(inner)?;
                match r {
                    EvalResult::LValue(handle) => Ok(EvalResult::Normal(handle.take(loc)?)),
                    _ => Err(Error::eval(loc, "expected an lvalue in 'move' expression")),
                }
            }
            cst::ExprKind::ArraySpread(inner) => self.eval_expr(inner),
            cst::ExprKind::Dot { base, field_index, is_optional, .. } => {
                let b = self.eval_expr(base)?;
                match b {
                    EvalResult::LValue(handle) if !*is_optional => {
                        let current = handle.read(self.generation(), loc)?;
                        match current {
                            Value::Named(named) => Ok(EvalResult::Normal(named.fields[*field_index].clone())),
                            _ => Err(Error::internal("dot access on a non-struct lvalue")),
                        }
                    }
                    other => {
                        let value = self.resolve_value(other, base.loc)?;
                        if *is_optional {
                            let (has_value, named) = match value {
                                Value::Optional(Some(inner)) => match *inner {
                                    Value::Named(n) => (true, Some(n)),
                                    _ => (true, None),
                                },
                                Value::Optional(None) | Value::Null => (false, None),
                                Value::Named(n) => (true, Some(n)),
                                _ => (false, None),
                            };
                            if has_value {
                                let n = named.ok_or_else(|| Error::internal("optional dot access on a non-struct value"))?;
                                Ok(EvalResult::Normal(Value::Optional(Some(Box::new(n.fields[*field_index].clone())))))
                            } else {
                                Ok(EvalResult::Normal(Value::Optional(None)))
                            }
                        } else {
                            match value {
                                Value::Named(named) => Ok(EvalResult::Normal(named.fields[*field_index].clone())),
                                _ => Err(Error::internal("dot access on a non-struct value")),
                            }
                        }
                    }
                }
            }
            cst::ExprKind::Ident(decl) => self.eval_ident(*decl, loc),
            cst::ExprKind::Call { callee, args } => self.eval_call(callee, args, loc),
        }
    }

    fn eval_ident(&mut self, decl: DeclId, loc: Location) -> Result<EvalResult> {
        match self.decls.get(decl) {
            Decl::Variable { name, .. } => {
                let cell = self.frame.lookup(decl).ok_or_else(|| Error::internal(format!("undeclared variable '{name}' referenced at eval time")))?;
                Ok(EvalResult::LValue(LvalueHandle { cell, name: name.clone() }))
            }
            Decl::EnumCase { index, enum_name, .. } => Ok(EvalResult::Normal(Value::Named(Rc::new(NamedValue {
                type_name: enum_name.to_string(),
                variant_index: Some(*index),
                fields: vec![],
            })))),
            // Functions referenced bare (not called) aren't materialised as
            // first-class values in this evaluator; `Call` handles them
            // directly by `DeclId` instead.
            Decl::Function { .. } | Decl::BuiltinFunction { .. } | Decl::Struct { .. } | Decl::Union { .. } => {
                Err(Error::internal("declaration referenced as a plain value has no runtime representation"))
            }
        }
    }

    fn eval_call(&mut self, callee: &cst::Expr, args: &[cst::Expr], loc: Location) -> Result<EvalResult> {
        let decl_id = match &callee.kind {
            cst::ExprKind::Ident(id) => *id,
            _ => return Err(Error::internal("indirect calls are not supported by this evaluator")),
        };
        let mut arg_values = Vec::with_capacity(args.len());
        for a in args {
            let r = self.eval_expr(a)?;
            arg_values.push(self.resolve_value(r, a.loc)?);
        }

        match self.decls.get(decl_id).clone() {
            Decl::BuiltinFunction { name, .. } => {
                let result = crate::interp::builtins::call_builtin(&name, &arg_values, loc)?;
                Ok(EvalResult::Normal(result))
            }
            Decl::Function { param_decls, body, .. } => {
                let saved = self.push_call_scope();
                for (param_decl, value) in param_decls.iter().zip(arg_values.into_iter()) {
                    self.frame.declare(*param_decl, value);
                }
                let result = self.eval_stmt(&body);
                self.pop_scope(saved);
                match result? {
                    EvalResult::Return(v) => Ok(EvalResult::Normal(v)),
                    _ => Ok(EvalResult::unit()),
                }
            }
            Decl::Variable { .. } | Decl::EnumCase { .. } | Decl::Struct { .. } | Decl::Union { .. } => {
                Err(Error::eval(loc, "value is not callable"))
            }
        }
    }

    fn eval_binary(&self, op: BinaryOp, lval: Value, rval: Value, loc: Location) -> Result<Value> {
        use Value::*;
        match (op, &lval, &rval) {
            (BinaryOp::Add, Integer(a), Integer(b)) => Ok(Integer(a + b)),
            (BinaryOp::Subtract, Integer(a), Integer(b)) => Ok(Integer(a - b)),
            (BinaryOp::Multiply, Integer(a), Integer(b)) => Ok(Integer(a * b)),
            (BinaryOp::Divide, Integer(a), Integer(b)) => {
                if *b == 0 {
                    return Err(Error::eval(loc, "integer division by zero"));
                }
                Ok(Integer(a / b))
            }
            (BinaryOp::Modulo, Integer(a), Integer(b)) => {
                if *b == 0 {
                    return Err(Error::eval(loc, "integer modulo by zero"));
                }
                Ok(Integer(a % b))
            }
            (BinaryOp::Add, Float(a), Float(b)) => Ok(Float(a + b)),
            (BinaryOp::Subtract, Float(a), Float(b)) => Ok(Float(a - b)),
            (BinaryOp::Multiply, Float(a), Float(b)) => Ok(Float(a * b)),
            (BinaryOp::Divide, Float(a), Float(b)) => Ok(Float(a / b)),
            (BinaryOp::Modulo, Float(a), Float(b)) => Ok(Float(a % b)),
            (BinaryOp::Add, Array(a), Array(b)) => {
                let mut out = (**a).clone();
                out.extend((**b).clone());
                Ok(Array(Rc::new(out)))
            }
            (BinaryOp::Multiply, Array(a), Integer(n)) | (BinaryOp::Multiply, Integer(n), Array(a)) => {
                let mut out = Vec::new();
                for _ in 0..(*n).max(0) {
                    out.extend((**a).clone());
                }
                Ok(Array(Rc::new(out)))
            }
            (BinaryOp::Add, Length(a), Length(b)) => {
                let style = &self.current_style;
                let font_size = style.font_size_mm_or_default();
                Ok(Length(crate::types::value::DynLength {
                    value: a.resolve(font_size, self.root_font_size_mm) + b.resolve(font_size, self.root_font_size_mm),
                    unit: crate::types::value::DynLengthUnit::Mm,
                }))
            }
            (BinaryOp::Subtract, Length(a), Length(b)) => {
                let style = &self.current_style;
                let font_size = style.font_size_mm_or_default();
                Ok(Length(crate::types::value::DynLength {
                    value: a.resolve(font_size, self.root_font_size_mm) - b.resolve(font_size, self.root_font_size_mm),
                    unit: crate::types::value::DynLengthUnit::Mm,
                }))
            }
            (BinaryOp::Multiply, Length(a), Integer(n)) | (BinaryOp::Multiply, Integer(n), Length(a)) => {
                Ok(Length(crate::types::value::DynLength { value: a.value * (*n as f64), unit: a.unit }))
            }
            (BinaryOp::Multiply, Length(a), Float(n)) | (BinaryOp::Multiply, Float(n), Length(a)) => {
                Ok(Length(crate::types::value::DynLength { value: a.value * n, unit: a.unit }))
            }
            (BinaryOp::Divide, Length(a), Integer(n)) => Ok(Length(crate::types::value::DynLength { value: a.value / (*n as f64), unit: a.unit })),
            (BinaryOp::Divide, Length(a), Float(n)) => Ok(Length(crate::types::value::DynLength { value: a.value / n, unit: a.unit })),
            _ => Err(Error::internal(format!("no arithmetic operator connects {lval:?} and {rval:?} (typecheck should have rejected this)"))),
        }
    }

    /// Resolves `name` to a zero-argument function declaration and evaluates
    /// it. Used for a pending `ScriptCall`/`ScriptBlock` the layout driver is
    /// evaluating (`spec.md` §4.C.3): there is no enclosing `Call` expression
    /// to supply a `DeclId`, only the bare name the typed tree attached to
    /// the script node, so this looks the declaration up by name instead of
    /// going through `eval_call`.
    pub fn call_named(&mut self, name: &str, loc: Location) -> Result<Value> {
        let (decl_id, _) = self.decls.find_named(name).ok_or_else(|| Error::internal(format!("script call to undeclared function '{name}'")))?;
        match self.decls.get(decl_id).clone() {
            Decl::Function { param_decls, body, .. } if param_decls.is_empty() => {
                let saved = self.push_call_scope();
                let result = self.eval_stmt(&body);
                self.pop_scope(saved);
                match result? {
                    EvalResult::Return(v) => Ok(v),
                    _ => Ok(Value::Null),
                }
            }
            Decl::BuiltinFunction { name, .. } => crate::interp::builtins::call_builtin(&name, &[], loc),
            _ => Err(Error::internal(format!("script call target '{name}' is not a zero-argument function"))),
        }
    }
}

fn is_unit(r: &EvalResult) -> bool {
    matches!(r, EvalResult::Normal(Value::Null))
}

fn compare_values(op: CompareOp, lhs: &Value, rhs: &Value) -> Result<bool> {
    use Value::*;
    let ordering = match (lhs, rhs) {
        (Integer(a), Integer(b)) => a.partial_cmp(b),
        (Float(a), Float(b)) => a.partial_cmp(b),
        (Char(a), Char(b)) => a.partial_cmp(b),
        (Bool(a), Bool(b)) => {
            return Ok(match op {
                CompareOp::Eq => a == b,
                CompareOp::Ne => a != b,
                _ => return Err(Error::internal("relational comparison applied to bool (typecheck should have rejected this)")),
            });
        }
        (Null, Null) => {
            return Ok(matches!(op, CompareOp::Eq));
        }
        (Optional(a), Null) | (Null, Optional(a)) => {
            return Ok(match op {
                CompareOp::Eq => a.is_none(),
                CompareOp::Ne => a.is_some(),
                _ => return Err(Error::internal("relational comparison applied to optional-vs-null")),
            });
        }
        _ => return Err(Error::internal(format!("unsupported comparison between {lhs:?} and {rhs:?}"))),
    };
    let ordering = ordering.ok_or_else(|| Error::internal("comparison operands were not orderable (NaN)"))?;
    Ok(match op {
        CompareOp::Lt => ordering.is_lt(),
        CompareOp::Gt => ordering.is_gt(),
        CompareOp::Le => ordering.is_le(),
        CompareOp::Ge => ordering.is_ge(),
        CompareOp::Eq => ordering.is_eq(),
        CompareOp::Ne => !ordering.is_eq(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Location;
    use crate::interp::cst::{Expr, ExprKind, Stmt, StmtKind};

    fn loc() -> Location {
        Location::default()
    }

    #[test]
    fn integer_addition_evaluates() {
        let interner = TypeInterner::new();
        let decls = Decls::default();
        let mut ev = Evaluator::new(&decls);
        let lhs = Expr { loc: loc(), ty: interner.integer(), kind: ExprKind::Integer(2) };
        let rhs = Expr { loc: loc(), ty: interner.integer(), kind: ExprKind::Integer(3) };
        let expr = Expr { loc: loc(), ty: interner.integer(), kind: ExprKind::Binary { op: BinaryOp::Add, lhs: Box::new(lhs), rhs: Box::new(rhs) } };
        let result = ev.eval_expr(&expr).unwrap();
        assert_eq!(result.into_value(0, loc()).unwrap(), Value::Integer(5));
    }

    #[test]
    fn comparison_chain_short_circuits_on_first_false() {
        let interner = TypeInterner::new();
        let decls = Decls::default();
        let mut ev = Evaluator::new(&decls);
        let a = Expr { loc: loc(), ty: interner.integer(), kind: ExprKind::Integer(1) };
        let b = Expr { loc: loc(), ty: interner.integer(), kind: ExprKind::Integer(5) };
        let c = Expr { loc: loc(), ty: interner.integer(), kind: ExprKind::Integer(2) };
        let expr = Expr {
            loc: loc(),
            ty: interner.bool(),
            kind: ExprKind::Comparison { first: Box::new(a), rest: vec![(CompareOp::Lt, b), (CompareOp::Lt, c)] },
        };
        let result = ev.eval_expr(&expr).unwrap();
        assert_eq!(result.into_value(0, loc()).unwrap(), Value::Bool(false));
    }

    #[test]
    fn move_then_read_is_an_eval_error() {
        let decls = Decls::default();
        let mut ev = Evaluator::new(&decls);

        let cell = ev.frame.declare(DeclId(0), Value::Integer(9));
        let handle = LvalueHandle { cell, name: Rc::from("x") };

        let moved = handle.take(loc()).unwrap();
        assert_eq!(moved, Value::Integer(9));

        let err = handle.read(ev.generation(), loc());
        assert!(err.is_err());
    }

    #[test]
    fn block_scoping_drops_locals_after_the_block() {
        let interner = TypeInterner::new();
        let decls = Decls::default();
        let mut ev = Evaluator::new(&decls);
        let inner = Stmt {
            loc: loc(),
            kind: StmtKind::Block(vec![Stmt { loc: loc(), kind: StmtKind::Let { decl: DeclId(0), init: None } }]),
        };
        ev.eval_stmt(&inner).unwrap();
        assert!(ev.frame.lookup(DeclId(0)).is_none());
    }
}
