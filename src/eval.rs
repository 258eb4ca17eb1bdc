// ABOUTME: Tree-walking evaluator for EZ programs
// Statements and expressions reduce to Values under an environment. Error,
// Break, Continue, and ReturnValue are propagation sentinels: every enclosing
// construct tests for them at its boundaries and threads them outward
// unchanged, so the evaluator never unwinds the host stack.

use crate::ast::*;
use crate::config::DEFAULT_MAX_RECURSION;
use crate::diagnostics::{suggest, Diagnostic};
use crate::env::{EnumDef, Environment, StructDef, UpdateFault};
use crate::modules::{module_stem, ModuleLoader};
use crate::parser::{ParseMode, Parser};
use crate::registry;
use crate::value::{FunctionDef, IntType, MapKey, RangeFault, RuntimeError, Value};
use indexmap::IndexMap;
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

/// One step of an assignment path: `a[i].f[j] = v`.
enum Access {
    Idx(Value),
    Field(String),
}

pub struct Evaluator {
    loader: ModuleLoader,
    max_recursion: usize,
    call_depth: usize,
    current_file: Option<PathBuf>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Evaluator::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Evaluator::with_root(".")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Evaluator {
            loader: ModuleLoader::new(root),
            max_recursion: DEFAULT_MAX_RECURSION,
            call_depth: 0,
            current_file: None,
        }
    }

    pub fn set_max_recursion(&mut self, limit: usize) {
        self.max_recursion = limit;
    }

    pub fn set_current_file(&mut self, file: Option<PathBuf>) {
        self.current_file = file;
    }

    pub fn loader(&self) -> &ModuleLoader {
        &self.loader
    }

    pub fn take_warnings(&mut self) -> Vec<Diagnostic> {
        self.loader.take_warnings()
    }

    // ------------------------------------------------------------------
    // Programs, blocks, statements
    // ------------------------------------------------------------------

    /// Evaluate a whole program: a top-level return unwraps to its first
    /// value, an error stops evaluation, otherwise the last statement's
    /// value is the program result.
    pub fn eval_program(&mut self, program: &Program, env: &Rc<Environment>) -> Value {
        let mut last = Value::Nil;
        for stmt in &program.statements {
            match self.eval_statement(stmt, env) {
                Value::Error(e) => return Value::Error(e),
                Value::ReturnValue(values) => {
                    return values.into_iter().next().unwrap_or(Value::Nil);
                }
                Value::Break | Value::Continue => return Value::Nil,
                value => last = value,
            }
        }
        last
    }

    /// Evaluate a block in a fresh child scope.
    fn eval_block(&mut self, block: &Block, env: &Rc<Environment>) -> Value {
        let child = Environment::with_parent(env.clone());
        self.eval_block_in(block, &child)
    }

    /// Evaluate a block's statements in the given scope.
    fn eval_block_in(&mut self, block: &Block, env: &Rc<Environment>) -> Value {
        for stmt in &block.statements {
            let result = self.eval_statement(stmt, env);
            if result.is_sentinel() {
                return result;
            }
        }
        Value::Nil
    }

    fn eval_statement(&mut self, stmt: &Statement, env: &Rc<Environment>) -> Value {
        match stmt {
            Statement::Declaration {
                names,
                mutable,
                type_annot,
                value,
                pos,
                ..
            } => self.eval_declaration(names, *mutable, type_annot.as_ref(), value.as_ref(), *pos, env),
            Statement::Assignment {
                target,
                op,
                value,
                pos,
            } => self.eval_assignment(target, *op, value, *pos, env),
            Statement::Return { values, pos } => {
                let mut out = Vec::with_capacity(values.len());
                for expr in values {
                    let v = self.eval_expression(expr, env);
                    if v.is_error() {
                        return v.or_position(*pos);
                    }
                    out.push(v);
                }
                Value::ReturnValue(out)
            }
            Statement::Block(block) => self.eval_block(block, env),
            Statement::If {
                branches,
                otherwise,
                ..
            } => {
                for (cond, block) in branches {
                    let test = self.eval_expression(cond, env);
                    if test.is_error() {
                        return test;
                    }
                    if test.is_truthy() {
                        return self.eval_block(block, env);
                    }
                }
                match otherwise {
                    Some(block) => self.eval_block(block, env),
                    None => Value::Nil,
                }
            }
            Statement::AsLongAs {
                condition, body, ..
            } => {
                loop {
                    let test = self.eval_expression(condition, env);
                    if test.is_error() {
                        return test;
                    }
                    if !test.is_truthy() {
                        break;
                    }
                    let body_env = Environment::for_loop(env.clone());
                    match self.eval_block_in(body, &body_env) {
                        Value::Break => break,
                        Value::Continue => continue,
                        v @ (Value::Error(_) | Value::ReturnValue(_)) => return v,
                        _ => {}
                    }
                }
                Value::Nil
            }
            Statement::Loop { body, .. } => {
                loop {
                    let body_env = Environment::for_loop(env.clone());
                    match self.eval_block_in(body, &body_env) {
                        Value::Break => break,
                        Value::Continue => continue,
                        v @ (Value::Error(_) | Value::ReturnValue(_)) => return v,
                        _ => {}
                    }
                }
                Value::Nil
            }
            Statement::For {
                var,
                start,
                end,
                step,
                body,
                pos,
            } => self.eval_for(var, start, end, step.as_ref(), body, *pos, env),
            Statement::ForEach {
                var,
                collection,
                body,
                pos,
            } => self.eval_for_each(var, collection, body, *pos, env),
            Statement::Break { pos } => {
                if env.loop_depth() == 0 {
                    Value::error_at("E5009", "`break` used outside a loop", *pos)
                } else {
                    Value::Break
                }
            }
            Statement::Continue { pos } => {
                if env.loop_depth() == 0 {
                    Value::error_at("E5010", "`continue` used outside a loop", *pos)
                } else {
                    Value::Continue
                }
            }
            Statement::Function(decl) => {
                let def = FunctionDef {
                    name: decl.name.clone(),
                    params: decl.params.clone(),
                    return_types: decl.return_types.clone(),
                    body: decl.body.clone(),
                    env: env.clone(),
                };
                env.define(decl.name.clone(), Value::Function(Rc::new(def)), false);
                Value::Nil
            }
            Statement::Import { path, alias, pos } => {
                self.eval_import(path, alias.clone(), env, *pos)
            }
            Statement::Using { name, .. } => {
                env.add_using(name.clone());
                Value::Nil
            }
            Statement::StructDecl { name, fields, .. } => {
                env.define_struct(StructDef {
                    name: name.clone(),
                    fields: fields.clone(),
                });
                Value::Nil
            }
            Statement::EnumDecl { name, variants, .. } => {
                self.eval_enum_decl(name, variants, env)
            }
            Statement::When {
                subject,
                arms,
                default,
                pos,
                ..
            } => self.eval_when(subject, arms, default.as_ref(), *pos, env),
            Statement::Expression { expr, .. } => self.eval_expression(expr, env),
            Statement::ModuleDecl { .. } => Value::Nil,
            Statement::Ensure { call, pos } => {
                // Desugars to: evaluate the call; an error result returns
                // from the enclosing function immediately.
                let result = self.eval_expression(call, env);
                if result.is_error() {
                    return Value::ReturnValue(vec![result.or_position(*pos)]);
                }
                result
            }
        }
    }

    fn eval_declaration(
        &mut self,
        names: &[String],
        mutable: bool,
        type_annot: Option<&TypeAnnot>,
        value: Option<&Expression>,
        pos: Position,
        env: &Rc<Environment>,
    ) -> Value {
        let evaluated = match value {
            Some(expr) => {
                let v = self.eval_expression(expr, env);
                if v.is_error() {
                    return v.or_position(pos);
                }
                v
            }
            None => match type_annot {
                Some(annot) => match self.zero_value(annot, env) {
                    Ok(v) => v,
                    Err(e) => return e.or_position(pos),
                },
                None => Value::Nil,
            },
        };

        if names.len() > 1 {
            let values = match evaluated {
                Value::ReturnValue(values) => values,
                other => {
                    return Value::error_at(
                        "E3040",
                        format!(
                            "declaration of {} names needs {} values, found one {}",
                            names.len(),
                            names.len(),
                            other.type_name()
                        ),
                        pos,
                    );
                }
            };
            if values.len() != names.len() {
                return Value::error_at(
                    "E5012",
                    format!(
                        "declaration of {} names received {} values",
                        names.len(),
                        values.len()
                    ),
                    pos,
                );
            }
            for (name, v) in names.iter().zip(values) {
                if name != "_" {
                    env.define(name.clone(), v, mutable);
                }
            }
            return Value::Nil;
        }

        let single = match evaluated {
            Value::ReturnValue(mut values) => {
                if values.len() == 1 {
                    values.remove(0)
                } else {
                    return Value::error_at(
                        "E3040",
                        format!("one name cannot bind {} values", values.len()),
                        pos,
                    );
                }
            }
            v => v,
        };

        let coerced = match type_annot {
            Some(annot) => match self.coerce_declared(single, annot, mutable, env) {
                Ok(v) => v,
                Err(e) => return e.or_position(pos),
            },
            None => set_container_mutability(single, mutable),
        };

        if names[0] != "_" {
            env.define(names[0].clone(), coerced.clone(), mutable);
        }
        coerced
    }

    /// Check and adapt a value to its declared type.
    fn coerce_declared(
        &mut self,
        value: Value,
        annot: &TypeAnnot,
        mutable: bool,
        env: &Rc<Environment>,
    ) -> Result<Value, Value> {
        match annot {
            TypeAnnot::Named(name) => self.coerce_named(value, name, env),
            TypeAnnot::Array { elem, size } => {
                let Value::Array { elements, .. } = value else {
                    return Err(type_mismatch(annot, &value));
                };
                {
                    let mut els = elements.borrow_mut();
                    if let Some(expected) = size {
                        if els.len() != *expected {
                            return Err(Value::error(
                                "E3041",
                                format!(
                                    "array of {} elements does not fit declared size {}",
                                    els.len(),
                                    expected
                                ),
                            ));
                        }
                    }
                    for slot in els.iter_mut() {
                        let taken = std::mem::replace(slot, Value::Nil);
                        *slot = self.coerce_declared(taken, elem, true, env)?;
                    }
                }
                Ok(Value::Array { elements, mutable })
            }
            TypeAnnot::Map { .. } => match value {
                Value::Map { entries, .. } => Ok(Value::Map { entries, mutable }),
                // An empty `{}` literal reads as an empty array; a map
                // annotation turns it into an empty map.
                Value::Array { elements, .. } if elements.borrow().is_empty() => Ok(Value::Map {
                    entries: Rc::new(RefCell::new(IndexMap::new())),
                    mutable,
                }),
                other => Err(type_mismatch(annot, &other)),
            },
        }
    }

    fn coerce_named(
        &mut self,
        value: Value,
        name: &str,
        env: &Rc<Environment>,
    ) -> Result<Value, Value> {
        if let Some(ty) = IntType::from_name(name) {
            return match value {
                Value::Integer(iv) => {
                    if !ty.contains(&iv.value) {
                        return Err(range_error(&iv.value, ty));
                    }
                    Ok(Value::typed_int(iv.value, ty))
                }
                Value::Byte(b) => {
                    let big = BigInt::from(b);
                    if !ty.contains(&big) {
                        return Err(range_error(&big, ty));
                    }
                    Ok(Value::typed_int(big, ty))
                }
                other => Err(Value::error(
                    "E3001",
                    format!("cannot bind {} to `{}`", other.type_name(), name),
                )),
            };
        }
        match name {
            "float" | "f64" | "f32" => match value {
                Value::Float(f) => Ok(Value::Float(f)),
                Value::Integer(iv) => iv
                    .value
                    .to_f64()
                    .map(Value::Float)
                    .ok_or_else(|| Value::error("E3001", "integer does not fit a float")),
                Value::Byte(b) => Ok(Value::Float(f64::from(b))),
                other => Err(Value::error(
                    "E3001",
                    format!("cannot bind {} to `float`", other.type_name()),
                )),
            },
            "byte" => match value {
                Value::Byte(b) => Ok(Value::Byte(b)),
                Value::Integer(iv) => match iv.value.to_u8() {
                    Some(b) => Ok(Value::Byte(b)),
                    None => Err(Value::error(
                        "E3026",
                        format!("{} is outside the byte range 0..=255", iv.value),
                    )),
                },
                other => Err(Value::error(
                    "E3001",
                    format!("cannot bind {} to `byte`", other.type_name()),
                )),
            },
            "string" => match value {
                Value::Str(s) => Ok(Value::Str(s)),
                other => Err(Value::error(
                    "E3001",
                    format!("cannot bind {} to `string`", other.type_name()),
                )),
            },
            "bool" => match value {
                Value::Bool(b) => Ok(Value::Bool(b)),
                other => Err(Value::error(
                    "E3001",
                    format!("cannot bind {} to `bool`", other.type_name()),
                )),
            },
            "char" => match value {
                Value::Char(c) => Ok(Value::Char(c)),
                other => Err(Value::error(
                    "E3001",
                    format!("cannot bind {} to `char`", other.type_name()),
                )),
            },
            "any" => Ok(value),
            _ => {
                if env.struct_def(name).is_some() {
                    return match value {
                        Value::Struct {
                            name: got, fields, ..
                        } if got == name => Ok(Value::Struct { name: got, fields }),
                        Value::Nil => Ok(Value::Nil),
                        other => Err(Value::error(
                            "E3001",
                            format!("cannot bind {} to `{}`", other.type_name(), name),
                        )),
                    };
                }
                if env.enum_def(name).is_some() {
                    return match value {
                        Value::EnumValue {
                            enum_name,
                            variant,
                            value,
                        } if enum_name == name => Ok(Value::EnumValue {
                            enum_name,
                            variant,
                            value,
                        }),
                        other => Err(Value::error(
                            "E3001",
                            format!("cannot bind {} to `{}`", other.type_name(), name),
                        )),
                    };
                }
                Err(Value::error("E4004", format!("unknown type `{}`", name)))
            }
        }
    }

    fn eval_assignment(
        &mut self,
        target: &Expression,
        op: AssignOp,
        value: &Expression,
        pos: Position,
        env: &Rc<Environment>,
    ) -> Value {
        let rhs = match op {
            AssignOp::Assign => {
                let v = self.eval_expression(value, env);
                if v.is_error() {
                    return v.or_position(pos);
                }
                v
            }
            compound => {
                // `target OP= rhs` reads the target first, left to right
                let current = self.eval_expression(target, env);
                if current.is_error() {
                    return current.or_position(pos);
                }
                let v = self.eval_expression(value, env);
                if v.is_error() {
                    return v.or_position(pos);
                }
                let infix = match compound {
                    AssignOp::Add => InfixOp::Add,
                    AssignOp::Sub => InfixOp::Sub,
                    AssignOp::Mul => InfixOp::Mul,
                    AssignOp::Div => InfixOp::Div,
                    AssignOp::Mod => InfixOp::Mod,
                    AssignOp::Assign => unreachable!(),
                };
                let combined = self.apply_binary(infix, current, v, pos);
                if combined.is_error() {
                    return combined;
                }
                combined
            }
        };

        self.assign_into(target, rhs, env, pos)
    }

    fn assign_into(
        &mut self,
        target: &Expression,
        value: Value,
        env: &Rc<Environment>,
        pos: Position,
    ) -> Value {
        // Plain identifier: update through the chain.
        if let Expression::Ident { name, .. } = target {
            if name == "_" {
                return Value::Nil;
            }
            let Some(old) = env.get(name) else {
                return self.undefined_name("E4005", name, env, pos);
            };
            let coerced = match coerce_to_existing(&old, value) {
                Ok(v) => v,
                Err(e) => return e.or_position(pos),
            };
            return match env.update(name, coerced) {
                Ok(()) => Value::Nil,
                Err(UpdateFault::Immutable) => Value::error_at(
                    "E5006",
                    format!("cannot assign to `const` binding `{}`", name),
                    pos,
                ),
                Err(UpdateFault::NotFound) => self.undefined_name("E4005", name, env, pos),
            };
        }

        // Index/member chain rooted at an identifier: write in place.
        let mut path: Vec<Access> = Vec::new();
        let mut cursor = target;
        let root = loop {
            match cursor {
                Expression::Index { object, index, .. } => {
                    let idx = self.eval_expression(index, env);
                    if idx.is_error() {
                        return idx.or_position(pos);
                    }
                    path.push(Access::Idx(idx));
                    cursor = object;
                }
                Expression::Member { object, member, .. } => {
                    path.push(Access::Field(member.clone()));
                    cursor = object;
                }
                Expression::Ident { name, .. } => break name,
                other => {
                    return Value::error_at(
                        "E5002",
                        format!("cannot assign into a {}", other_kind(other)),
                        pos,
                    );
                }
            }
        };
        path.reverse();

        let Some((cell, binding_mutable)) = env.cell(root) else {
            return self.undefined_name("E4005", root, env, pos);
        };
        if !binding_mutable {
            // const struct bindings have no container flag of their own
            if matches!(&*cell.borrow(), Value::Struct { .. }) {
                return Value::error_at(
                    "E5011",
                    format!("cannot mutate `const` binding `{}`", root),
                    pos,
                );
            }
        }

        let mut slot = cell.borrow_mut();
        write_path(&mut slot, &path, value).or_position(pos)
    }

    fn eval_enum_decl(
        &mut self,
        name: &str,
        variants: &[(String, Option<Expression>)],
        env: &Rc<Environment>,
    ) -> Value {
        let mut out = Vec::with_capacity(variants.len());
        let mut next = BigInt::zero();
        for (vname, explicit) in variants {
            let value = match explicit {
                Some(expr) => {
                    let v = self.eval_expression(expr, env);
                    if v.is_error() {
                        return v;
                    }
                    if let Value::Integer(iv) = &v {
                        next = &iv.value + 1;
                    }
                    v
                }
                None => {
                    let v = Value::int(next.clone());
                    next += 1;
                    v
                }
            };
            out.push((vname.clone(), value));
        }
        env.define_enum(EnumDef {
            name: name.to_string(),
            variants: out,
        });
        Value::Nil
    }

    fn eval_for(
        &mut self,
        var: &str,
        start: &Expression,
        end: &Expression,
        step: Option<&Expression>,
        body: &Block,
        pos: Position,
        env: &Rc<Environment>,
    ) -> Value {
        let start_v = self.eval_expression(start, env);
        if start_v.is_error() {
            return start_v;
        }
        let end_v = self.eval_expression(end, env);
        if end_v.is_error() {
            return end_v;
        }
        let (Value::Integer(start_i), Value::Integer(end_i)) = (&start_v, &end_v) else {
            return Value::error_at("E5014", "range bounds must be integers", pos);
        };

        let step_i: BigInt = match step {
            Some(expr) => {
                let v = self.eval_expression(expr, env);
                if v.is_error() {
                    return v;
                }
                let Value::Integer(iv) = v else {
                    return Value::error_at("E5014", "range step must be an integer", pos);
                };
                if iv.value.is_zero() {
                    return Value::error_at("E5015", "range step may not be zero", pos);
                }
                iv.value
            }
            None => {
                if start_i.value <= end_i.value {
                    BigInt::from(1)
                } else {
                    BigInt::from(-1)
                }
            }
        };

        let ascending = step_i.is_positive();
        let mut i = start_i.value.clone();
        loop {
            if ascending && i > end_i.value {
                break;
            }
            if !ascending && i < end_i.value {
                break;
            }
            let body_env = Environment::for_loop(env.clone());
            if var != "_" {
                body_env.define(
                    var.to_string(),
                    Value::typed_int(i.clone(), start_i.ty),
                    true,
                );
            }
            match self.eval_block_in(body, &body_env) {
                Value::Break => break,
                Value::Continue => {}
                v @ (Value::Error(_) | Value::ReturnValue(_)) => return v,
                _ => {}
            }
            i += &step_i;
        }
        Value::Nil
    }

    fn eval_for_each(
        &mut self,
        var: &str,
        collection: &Expression,
        body: &Block,
        pos: Position,
        env: &Rc<Environment>,
    ) -> Value {
        let coll = self.eval_expression(collection, env);
        if coll.is_error() {
            return coll;
        }
        let items: Vec<Value> = match &coll {
            Value::Array { elements, .. } => elements.borrow().clone(),
            Value::Str(s) => s.chars().map(Value::Char).collect(),
            other => {
                return Value::error_at(
                    "E3001",
                    format!("`for_each` iterates arrays and strings, not {}", other.type_name()),
                    pos,
                );
            }
        };

        for item in items {
            let body_env = Environment::for_loop(env.clone());
            if var != "_" {
                body_env.define(var.to_string(), item, true);
            }
            match self.eval_block_in(body, &body_env) {
                Value::Break => break,
                Value::Continue => continue,
                v @ (Value::Error(_) | Value::ReturnValue(_)) => return v,
                _ => {}
            }
        }
        Value::Nil
    }

    fn eval_when(
        &mut self,
        subject: &Expression,
        arms: &[WhenArm],
        default: Option<&Block>,
        pos: Position,
        env: &Rc<Environment>,
    ) -> Value {
        let subject_v = self.eval_expression(subject, env);
        if subject_v.is_error() {
            return subject_v;
        }

        for arm in arms {
            for value_expr in &arm.values {
                let candidate = self.eval_expression(value_expr, env);
                if candidate.is_error() {
                    return candidate;
                }
                match eq_values(&subject_v, &candidate, pos) {
                    Ok(true) => return self.eval_block(&arm.body, env),
                    Ok(false) => {}
                    Err(e) => return e,
                }
            }
        }

        match default {
            Some(block) => self.eval_block(block, env),
            None => Value::Nil,
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    pub fn eval_expression(&mut self, expr: &Expression, env: &Rc<Environment>) -> Value {
        match expr {
            Expression::Int { value, pos: _ } => Value::int(value.clone()),
            Expression::Float { value, .. } => Value::Float(*value),
            Expression::Str { value, .. } => Value::Str(value.clone()),
            Expression::Char { value, .. } => Value::Char(*value),
            Expression::Bool { value, .. } => Value::Bool(*value),
            Expression::Nil { .. } => Value::Nil,
            Expression::Interp { parts, pos } => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        InterpPart::Literal(text) => out.push_str(text),
                        InterpPart::Expr(e) => {
                            let v = self.eval_expression(e, env);
                            if v.is_error() {
                                return v.or_position(*pos);
                            }
                            out.push_str(&v.display_plain());
                        }
                    }
                }
                Value::Str(out)
            }
            Expression::Array { elements, pos } => {
                let mut out = Vec::with_capacity(elements.len());
                for el in elements {
                    let v = self.eval_expression(el, env);
                    if v.is_error() {
                        return v.or_position(*pos);
                    }
                    out.push(v);
                }
                Value::array(out)
            }
            Expression::MapLit { pairs, pos } => {
                let mut entries = IndexMap::new();
                for (key_expr, value_expr) in pairs {
                    let key_v = self.eval_expression(key_expr, env);
                    if key_v.is_error() {
                        return key_v.or_position(*pos);
                    }
                    let Some(key) = MapKey::from_value(&key_v) else {
                        return Value::error_at(
                            "E5013",
                            format!("{} cannot be used as a map key", key_v.type_name()),
                            key_expr.pos(),
                        );
                    };
                    let value_v = self.eval_expression(value_expr, env);
                    if value_v.is_error() {
                        return value_v.or_position(*pos);
                    }
                    entries.insert(key, value_v);
                }
                Value::map(entries)
            }
            Expression::Ident { name, pos } => self.resolve_ident(name, env, *pos),
            Expression::Prefix { op, operand, pos } => {
                let v = self.eval_expression(operand, env);
                if v.is_error() {
                    return v;
                }
                match op {
                    PrefixOp::Not => Value::Bool(!v.is_truthy()),
                    PrefixOp::Neg => match v {
                        Value::Integer(iv) => {
                            let neg = -&iv.value;
                            match IntType::check_range(iv.ty, iv.ty, &neg) {
                                Ok(ty) => Value::typed_int(neg, ty),
                                Err(fault) => range_fault_error(fault, &neg).or_position(*pos),
                            }
                        }
                        Value::Byte(b) => {
                            let ty = IntType::Sized {
                                bits: 8,
                                signed: false,
                            };
                            let neg = -BigInt::from(b);
                            match IntType::check_range(ty, ty, &neg) {
                                Ok(ty) => Value::typed_int(neg, ty),
                                Err(fault) => range_fault_error(fault, &neg).or_position(*pos),
                            }
                        }
                        Value::Float(f) => Value::Float(-f),
                        other => Value::error_at(
                            "E3002",
                            format!("`-` is not defined for {}", other.type_name()),
                            *pos,
                        ),
                    },
                }
            }
            Expression::Infix {
                op,
                left,
                right,
                pos,
            } => self.eval_infix(*op, left, right, *pos, env),
            Expression::Postfix { op, operand, pos } => self.eval_postfix(*op, operand, *pos, env),
            Expression::Call { callee, args, pos } => self.eval_call(callee, args, *pos, env),
            Expression::Index { object, index, pos } => {
                let obj = self.eval_expression(object, env);
                if obj.is_error() {
                    return obj;
                }
                let idx = self.eval_expression(index, env);
                if idx.is_error() {
                    return idx;
                }
                index_value(&obj, &idx).or_position(*pos)
            }
            Expression::Member {
                object,
                member,
                pos,
            } => self.eval_member(object, member, *pos, env),
            Expression::Range { pos, .. } => Value::error_at(
                "E5014",
                "`range(...)` is only meaningful in `for` or `in`",
                *pos,
            ),
            Expression::New { type_name, pos } => {
                match self.zero_value(&TypeAnnot::Named(type_name.clone()), env) {
                    Ok(v) => v,
                    Err(e) => e.or_position(*pos),
                }
            }
        }
    }

    fn resolve_ident(&mut self, name: &str, env: &Rc<Environment>, pos: Position) -> Value {
        if name == "_" {
            return Value::error_at("E4001", "the blank identifier cannot be read", pos);
        }
        if let Some(v) = env.get(name) {
            return v;
        }
        // Unqualified lookup through using-activated modules
        for alias in env.usings() {
            if let Some(key) = env.import(&alias) {
                if let Some(module_env) = self.loader.module_env(&key) {
                    if let Some(v) = module_env.get(name) {
                        return v;
                    }
                }
            }
            let qualified = format!("{}.{}", alias, name);
            if let Some(v) = registry::lookup(&qualified) {
                return v;
            }
        }
        // Finally, a bare builtin lookup
        if let Some(v) = registry::lookup(name) {
            return v;
        }
        self.undefined_name("E4001", name, env, pos)
    }

    fn undefined_name(
        &self,
        code: &str,
        name: &str,
        env: &Rc<Environment>,
        pos: Position,
    ) -> Value {
        let mut candidates = env.visible_names();
        candidates.extend(registry::names().iter().map(|s| s.to_string()));
        let help = suggest(name, candidates.iter().map(String::as_str));
        let message = format!("`{}` is not defined", name);
        match help {
            Some(help) => {
                let mut err = Value::error_with_help(code, message, help);
                err = err.or_position(pos);
                err
            }
            None => Value::error_at(code, message, pos),
        }
    }

    fn eval_infix(
        &mut self,
        op: InfixOp,
        left: &Expression,
        right: &Expression,
        pos: Position,
        env: &Rc<Environment>,
    ) -> Value {
        // Short-circuit forms never evaluate the right side eagerly.
        match op {
            InfixOp::And => {
                let l = self.eval_expression(left, env);
                if l.is_error() {
                    return l;
                }
                if !l.is_truthy() {
                    return Value::Bool(false);
                }
                let r = self.eval_expression(right, env);
                if r.is_error() {
                    return r;
                }
                return Value::Bool(r.is_truthy());
            }
            InfixOp::Or => {
                let l = self.eval_expression(left, env);
                if l.is_error() {
                    return l;
                }
                if l.is_truthy() {
                    return Value::Bool(true);
                }
                let r = self.eval_expression(right, env);
                if r.is_error() {
                    return r;
                }
                return Value::Bool(r.is_truthy());
            }
            InfixOp::In | InfixOp::NotIn => {
                let l = self.eval_expression(left, env);
                if l.is_error() {
                    return l;
                }
                // `x in range(a, b)` is half-open and respects the step
                // lattice; everything else tests containment in a value.
                let contains = if let Expression::Range {
                    start, end, step, ..
                } = right
                {
                    match self.range_membership(&l, start, end, step.as_deref(), pos, env) {
                        Ok(b) => b,
                        Err(e) => return e,
                    }
                } else {
                    let r = self.eval_expression(right, env);
                    if r.is_error() {
                        return r;
                    }
                    match containment(&l, &r, pos) {
                        Ok(b) => b,
                        Err(e) => return e,
                    }
                };
                return Value::Bool(if op == InfixOp::In {
                    contains
                } else {
                    !contains
                });
            }
            _ => {}
        }

        let l = self.eval_expression(left, env);
        if l.is_error() {
            return l;
        }
        let r = self.eval_expression(right, env);
        if r.is_error() {
            return r;
        }
        self.apply_binary(op, l, r, pos)
    }

    fn range_membership(
        &mut self,
        value: &Value,
        start: &Expression,
        end: &Expression,
        step: Option<&Expression>,
        pos: Position,
        env: &Rc<Environment>,
    ) -> Result<bool, Value> {
        let Value::Integer(x) = value else {
            return Err(Value::error_at(
                "E5014",
                "range membership requires an integer",
                pos,
            ));
        };
        let start_v = self.eval_expression(start, env);
        if start_v.is_error() {
            return Err(start_v);
        }
        let end_v = self.eval_expression(end, env);
        if end_v.is_error() {
            return Err(end_v);
        }
        let (Value::Integer(a), Value::Integer(b)) = (&start_v, &end_v) else {
            return Err(Value::error_at("E5014", "range bounds must be integers", pos));
        };
        let in_bounds = a.value <= x.value && x.value < b.value;
        match step {
            None => Ok(in_bounds),
            Some(expr) => {
                let step_v = self.eval_expression(expr, env);
                if step_v.is_error() {
                    return Err(step_v);
                }
                let Value::Integer(k) = step_v else {
                    return Err(Value::error_at("E5014", "range step must be an integer", pos));
                };
                if k.value.is_zero() {
                    return Err(Value::error_at("E5015", "range step may not be zero", pos));
                }
                Ok(in_bounds && ((&x.value - &a.value) % &k.value).is_zero())
            }
        }
    }

    fn apply_binary(&mut self, op: InfixOp, l: Value, r: Value, pos: Position) -> Value {
        match op {
            InfixOp::Eq => match eq_values(&l, &r, pos) {
                Ok(b) => Value::Bool(b),
                Err(e) => e,
            },
            InfixOp::NotEq => match eq_values(&l, &r, pos) {
                Ok(b) => Value::Bool(!b),
                Err(e) => e,
            },
            InfixOp::Lt | InfixOp::LtEq | InfixOp::Gt | InfixOp::GtEq => {
                match order_values(&l, &r) {
                    Some(ord) => {
                        let b = match op {
                            InfixOp::Lt => ord == std::cmp::Ordering::Less,
                            InfixOp::LtEq => ord != std::cmp::Ordering::Greater,
                            InfixOp::Gt => ord == std::cmp::Ordering::Greater,
                            _ => ord != std::cmp::Ordering::Less,
                        };
                        Value::Bool(b)
                    }
                    None => Value::error_at(
                        "E3002",
                        format!(
                            "`{}` is not defined for {} and {}",
                            op,
                            l.type_name(),
                            r.type_name()
                        ),
                        pos,
                    ),
                }
            }
            InfixOp::Add | InfixOp::Sub | InfixOp::Mul | InfixOp::Div | InfixOp::Mod => {
                arithmetic(op, &l, &r, pos)
            }
            InfixOp::And | InfixOp::Or | InfixOp::In | InfixOp::NotIn => {
                unreachable!("handled before operand evaluation")
            }
        }
    }

    fn eval_postfix(
        &mut self,
        op: PostfixOp,
        operand: &Expression,
        pos: Position,
        env: &Rc<Environment>,
    ) -> Value {
        let Expression::Ident { name, .. } = operand else {
            return Value::error_at(
                "E5016",
                format!("`{}` applies only to integer variables", op),
                pos,
            );
        };
        let Some(old) = env.get(name) else {
            return self.undefined_name("E4001", name, env, pos);
        };
        let Value::Integer(iv) = old else {
            return Value::error_at(
                "E5016",
                format!("`{}` applies only to integer variables", op),
                pos,
            );
        };
        let delta = if op == PostfixOp::Inc { 1 } else { -1 };
        let next = &iv.value + delta;
        let ty = match IntType::check_range(iv.ty, iv.ty, &next) {
            Ok(ty) => ty,
            Err(fault) => return range_fault_error(fault, &next).or_position(pos),
        };
        match env.update(name, Value::typed_int(next, ty)) {
            Ok(()) => Value::Integer(iv),
            Err(UpdateFault::Immutable) => Value::error_at(
                "E5006",
                format!("cannot assign to `const` binding `{}`", name),
                pos,
            ),
            Err(UpdateFault::NotFound) => self.undefined_name("E4005", name, env, pos),
        }
    }

    fn eval_member(
        &mut self,
        object: &Expression,
        member: &str,
        pos: Position,
        env: &Rc<Environment>,
    ) -> Value {
        if let Expression::Ident { name, .. } = object {
            if env.is_defined(name) {
                let obj = match env.get(name) {
                    Some(v) => v,
                    None => return self.undefined_name("E4001", name, env, pos),
                };
                return member_of(&obj, member, pos);
            }
            if let Some(def) = env.enum_def(name) {
                return match def.variant(member) {
                    Some(value) => Value::EnumValue {
                        enum_name: name.clone(),
                        variant: member.to_string(),
                        value: Box::new(value.clone()),
                    },
                    None => Value::error_at(
                        "E4007",
                        format!("enum `{}` has no variant `{}`", name, member),
                        pos,
                    ),
                };
            }
            if let Some(key) = env.import(name) {
                let Some(module_env) = self.loader.module_env(&key) else {
                    return Value::error_at(
                        "E4003",
                        format!("module `{}` is not loaded", name),
                        pos,
                    );
                };
                return match module_env.get(member) {
                    Some(v) => v,
                    None => Value::error_at(
                        "E4005",
                        format!("`{}.{}` was accessed before it was defined", name, member),
                        pos,
                    ),
                };
            }
            let qualified = format!("{}.{}", name, member);
            if let Some(v) = registry::lookup(&qualified) {
                return v;
            }
            if registry::module_exists(name) {
                let prefix = format!("{}.", name);
                let closest = registry::module_members(name)
                    .into_iter()
                    .filter_map(|m| m.strip_prefix(prefix.as_str()))
                    .map(|m| (strsim::levenshtein(member, m), m))
                    .filter(|(dist, _)| *dist <= 2)
                    .min_by_key(|(dist, _)| *dist);
                let message = format!("`{}` has no member `{}`", name, member);
                return match closest {
                    Some((_, m)) => Value::error_with_help(
                        "E4002",
                        message,
                        format!("did you mean `{}.{}`?", name, m),
                    )
                    .or_position(pos),
                    None => Value::error_at("E4002", message, pos),
                };
            }
            return self.undefined_name("E4003", name, env, pos);
        }

        let obj = self.eval_expression(object, env);
        if obj.is_error() {
            return obj;
        }
        member_of(&obj, member, pos)
    }

    fn eval_call(
        &mut self,
        callee: &Expression,
        args: &[Expression],
        pos: Position,
        env: &Rc<Environment>,
    ) -> Value {
        let callee_value = match callee {
            Expression::Ident { name, .. } => {
                let resolved = self.resolve_ident(name, env, pos);
                if let Value::Error(mut e) = resolved {
                    if e.code == "E4001" {
                        e.code = "E4002".to_string();
                    }
                    Value::Error(e)
                } else {
                    resolved
                }
            }
            other => self.eval_expression(other, env),
        };
        if callee_value.is_error() {
            return callee_value;
        }

        match callee_value {
            Value::Builtin { func, .. } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    let v = self.eval_expression(arg, env);
                    if v.is_error() {
                        return v.or_position(pos);
                    }
                    values.push(v);
                }
                func(&values).or_position(pos)
            }
            Value::Function(def) => self.apply_function(&def, args, env, pos),
            Value::Nil => Value::error_at("E4010", "nil is not callable", pos),
            other => Value::error_at(
                "E5001",
                format!("{} is not callable", other.type_name()),
                pos,
            ),
        }
    }

    fn apply_function(
        &mut self,
        def: &Rc<FunctionDef>,
        args: &[Expression],
        caller_env: &Rc<Environment>,
        pos: Position,
    ) -> Value {
        if self.call_depth >= self.max_recursion {
            return Value::error_at(
                "E5018",
                format!("call depth exceeded the limit of {}", self.max_recursion),
                pos,
            );
        }

        let required = def.params.iter().filter(|p| p.default.is_none()).count();
        if args.len() < required || args.len() > def.params.len() {
            let expected = if required == def.params.len() {
                format!("{}", required)
            } else {
                format!("{}-{}", required, def.params.len())
            };
            return Value::error_at(
                "E5008",
                format!(
                    "`{}` expects {} argument{}, got {}",
                    def.name,
                    expected,
                    if expected == "1" { "" } else { "s" },
                    args.len()
                ),
                pos,
            );
        }

        let fn_env = Environment::for_call(def.env.clone());
        for (i, param) in def.params.iter().enumerate() {
            if i < args.len() {
                if param.by_ref {
                    // Bind the caller's storage cell. When the argument is
                    // itself a reference parameter, this forwards the
                    // original cell identity through every level.
                    let Expression::Ident { name: arg_name, .. } = &args[i] else {
                        return Value::error_at(
                            "E3001",
                            format!("`&{}` requires a variable argument", param.name),
                            args[i].pos(),
                        );
                    };
                    let Some((cell, caller_mutable)) = caller_env.cell(arg_name) else {
                        return self.undefined_name("E4001", arg_name, caller_env, args[i].pos());
                    };
                    // A `const` caller binding stays immutable through the
                    // reference.
                    fn_env.define_cell(param.name.clone(), cell, caller_mutable);
                } else {
                    let v = self.eval_expression(&args[i], caller_env);
                    if v.is_error() {
                        return v.or_position(pos);
                    }
                    let v = match &param.type_annot {
                        Some(annot) => match self.coerce_declared(v, annot, true, &fn_env) {
                            Ok(v) => v,
                            Err(e) => return e.or_position(args[i].pos()),
                        },
                        None => v,
                    };
                    fn_env.define(param.name.clone(), v, true);
                }
            } else {
                // Trailing unsupplied parameters take their defaults,
                // evaluated in the callee scope.
                let default = param
                    .default
                    .as_ref()
                    .expect("arity check guarantees a default");
                let v = self.eval_expression(default, &fn_env);
                if v.is_error() {
                    return v.or_position(pos);
                }
                fn_env.define(param.name.clone(), v, true);
            }
        }

        self.call_depth += 1;
        let result = self.eval_block_in(&def.body, &fn_env);
        self.call_depth -= 1;

        match result {
            Value::ReturnValue(values) => self.finish_return(def, values, pos),
            Value::Error(e) => Value::Error(e),
            _ => {
                if def.return_types.is_empty() {
                    Value::Nil
                } else {
                    Value::error_at(
                        "E3012",
                        format!(
                            "`{}` must return {} value{}",
                            def.name,
                            def.return_types.len(),
                            if def.return_types.len() == 1 { "" } else { "s" }
                        ),
                        pos,
                    )
                }
            }
        }
    }

    fn finish_return(&self, def: &Rc<FunctionDef>, values: Vec<Value>, pos: Position) -> Value {
        if !def.return_types.is_empty() && values.len() != def.return_types.len() {
            return Value::error_at(
                "E3012",
                format!(
                    "`{}` returns {} values but declares {}",
                    def.name,
                    values.len(),
                    def.return_types.len()
                ),
                pos,
            );
        }
        for (value, annot) in values.iter().zip(&def.return_types) {
            if !value_matches_type(value, annot) {
                return Value::error_at(
                    "E3012",
                    format!(
                        "`{}` returns {} where `{}` is declared",
                        def.name,
                        value.type_name(),
                        annot
                    ),
                    pos,
                );
            }
        }
        match values.len() {
            0 => Value::Nil,
            1 => values.into_iter().next().unwrap(),
            _ => Value::ReturnValue(values),
        }
    }

    /// Zero-initialize a value of the given type (`new(T)` and
    /// initializer-less declarations).
    fn zero_value(&mut self, annot: &TypeAnnot, env: &Rc<Environment>) -> Result<Value, Value> {
        match annot {
            TypeAnnot::Named(name) => {
                if let Some(ty) = IntType::from_name(name) {
                    return Ok(Value::typed_int(0, ty));
                }
                match name.as_str() {
                    "float" | "f64" | "f32" => Ok(Value::Float(0.0)),
                    "string" => Ok(Value::Str(String::new())),
                    "bool" => Ok(Value::Bool(false)),
                    "char" => Ok(Value::Char('\0')),
                    "byte" => Ok(Value::Byte(0)),
                    "any" => Ok(Value::Nil),
                    _ => {
                        if let Some(def) = env.struct_def(name) {
                            let mut fields = IndexMap::new();
                            for (fname, fannot) in &def.fields {
                                fields.insert(fname.clone(), self.zero_value(fannot, env)?);
                            }
                            return Ok(Value::Struct {
                                name: name.clone(),
                                fields,
                            });
                        }
                        if let Some(def) = env.enum_def(name) {
                            let Some((variant, value)) = def.variants.first() else {
                                return Err(Value::error(
                                    "E4007",
                                    format!("enum `{}` has no variants", name),
                                ));
                            };
                            return Ok(Value::EnumValue {
                                enum_name: name.clone(),
                                variant: variant.clone(),
                                value: Box::new(value.clone()),
                            });
                        }
                        Err(Value::error("E4004", format!("unknown type `{}`", name)))
                    }
                }
            }
            TypeAnnot::Array { elem, size } => {
                let mut elements = Vec::new();
                if let Some(n) = size {
                    for _ in 0..*n {
                        elements.push(self.zero_value(elem, env)?);
                    }
                }
                Ok(Value::array(elements))
            }
            TypeAnnot::Map { .. } => Ok(Value::map(IndexMap::new())),
        }
    }

    // ------------------------------------------------------------------
    // Imports
    // ------------------------------------------------------------------

    fn eval_import(
        &mut self,
        path: &str,
        alias: Option<String>,
        env: &Rc<Environment>,
        pos: Position,
    ) -> Value {
        let importing = self.current_file.clone();
        let resolved = match self.loader.resolve(path, importing.as_deref()) {
            Ok(p) => p,
            Err(e) => return e.or_position(pos),
        };
        if let Err(e) = self.loader.check_internal(&resolved, importing.as_deref()) {
            return e.or_position(pos);
        }

        let key = resolved.to_string_lossy().to_string();

        // A cached entry is reused as-is. `Loading` means we are inside a
        // cycle: the partial environment is returned so forward references
        // can resolve once the cycle closes.
        if let Some(entry) = self.loader.entry(&key) {
            let bound = alias.unwrap_or_else(|| entry.name.clone());
            env.add_import(bound, key);
            return Value::Nil;
        }

        let sources = match self.loader.sources(&resolved) {
            Ok(s) => s,
            Err(e) => return e.or_position(pos),
        };
        let is_dir = sources.len() > 1 || resolved.is_dir();

        let module_env = Environment::new();
        let default_name = module_stem(&resolved);
        self.loader
            .begin(key.clone(), module_env.clone(), default_name.clone());

        let mut declared_name: Option<String> = None;
        for (file, src) in &sources {
            let mut parser = Parser::with_mode(src, ParseMode::ModuleFile);
            let program = parser.parse_program();
            let diags = parser.take_errors();
            if let Some(first) = diags.iter().find(|d| d.is_error()) {
                return Value::error_at(
                    "E6002",
                    format!(
                        "`{}` does not parse: {} [{}]",
                        file.display(),
                        first.message,
                        first.code
                    ),
                    pos,
                );
            }

            if program.statements.is_empty() {
                self.loader.push_warning(
                    Diagnostic::warning("W4002", "module file declares nothing", 1, 1)
                        .with_file(file.display().to_string()),
                );
            }

            let file_decl = program.statements.iter().find_map(|s| match s {
                Statement::ModuleDecl { name, pos } => Some((name.clone(), *pos)),
                _ => None,
            });
            if let Some((name, decl_pos)) = file_decl {
                if !is_dir && name != module_stem(file) {
                    self.loader.push_warning(
                        Diagnostic::warning(
                            "W4001",
                            format!(
                                "module `{}` is declared in file `{}`",
                                name,
                                module_stem(file)
                            ),
                            decl_pos.line,
                            decl_pos.column,
                        )
                        .with_file(file.display().to_string()),
                    );
                }
                match &declared_name {
                    Some(existing) if *existing != name => {
                        return Value::error_at(
                            "E6006",
                            format!(
                                "`{}` declares module `{}` but `{}` was already declared",
                                file.display(),
                                name,
                                existing
                            ),
                            pos,
                        );
                    }
                    None => {
                        self.loader.set_name(&key, name.clone());
                        declared_name = Some(name);
                    }
                    _ => {}
                }
            }

            let saved = std::mem::replace(&mut self.current_file, Some(file.clone()));
            let mut failed = Value::Nil;
            for stmt in &program.statements {
                let result = self.eval_statement(stmt, &module_env);
                if result.is_error() {
                    failed = result;
                    break;
                }
            }
            self.current_file = saved;
            if failed.is_error() {
                return failed;
            }
        }

        self.loader.finish(&key);
        let bound = alias.unwrap_or_else(|| declared_name.unwrap_or(default_name));
        log::debug!("module `{}` bound as `{}`", key, bound);
        env.add_import(bound, key);
        Value::Nil
    }
}

// ----------------------------------------------------------------------
// Value-level helpers
// ----------------------------------------------------------------------

fn type_mismatch(annot: &TypeAnnot, value: &Value) -> Value {
    Value::error(
        "E3001",
        format!("cannot bind {} to `{}`", value.type_name(), annot),
    )
}

fn range_error(value: &BigInt, ty: IntType) -> Value {
    if *value > ty.max() {
        Value::error(
            "E5005",
            format!("{} exceeds the maximum of `{}`", value, ty.name()),
        )
    } else {
        Value::error(
            "E5007",
            format!("{} is below the minimum of `{}`", value, ty.name()),
        )
    }
}

fn range_fault_error(fault: RangeFault, value: &BigInt) -> Value {
    match fault {
        RangeFault::Overflow(ty) => Value::error(
            "E5005",
            format!("{} exceeds the maximum of `{}`", value, ty.name()),
        ),
        RangeFault::Underflow(ty) => Value::error(
            "E5007",
            format!("{} is below the minimum of `{}`", value, ty.name()),
        ),
    }
}

fn other_kind(expr: &Expression) -> &'static str {
    match expr {
        Expression::Call { .. } => "call result",
        _ => "temporary value",
    }
}

/// Keep a binding's scalar type stable across assignment: integer bindings
/// keep their declared range, byte and float bindings coerce integers.
fn coerce_to_existing(old: &Value, new: Value) -> Result<Value, Value> {
    match (old, &new) {
        (Value::Integer(old_iv), Value::Integer(new_iv)) => {
            if !old_iv.ty.contains(&new_iv.value) {
                return Err(range_error(&new_iv.value, old_iv.ty));
            }
            Ok(Value::typed_int(new_iv.value.clone(), old_iv.ty))
        }
        (Value::Integer(old_iv), Value::Byte(b)) => {
            let big = BigInt::from(*b);
            if !old_iv.ty.contains(&big) {
                return Err(range_error(&big, old_iv.ty));
            }
            Ok(Value::typed_int(big, old_iv.ty))
        }
        (Value::Byte(_), Value::Integer(iv)) => match iv.value.to_u8() {
            Some(b) => Ok(Value::Byte(b)),
            None => Err(Value::error(
                "E3026",
                format!("{} is outside the byte range 0..=255", iv.value),
            )),
        },
        (Value::Byte(_), Value::Byte(b)) => Ok(Value::Byte(*b)),
        (Value::Float(_), Value::Integer(iv)) => iv
            .value
            .to_f64()
            .map(Value::Float)
            .ok_or_else(|| Value::error("E3001", "integer does not fit a float")),
        (Value::Float(_), Value::Float(_)) => Ok(new),
        (Value::Nil, _) | (_, Value::Nil) => Ok(new),
        (Value::Str(_), Value::Str(_))
        | (Value::Bool(_), Value::Bool(_))
        | (Value::Char(_), Value::Char(_))
        | (Value::Array { .. }, Value::Array { .. })
        | (Value::Map { .. }, Value::Map { .. })
        | (Value::Struct { .. }, Value::Struct { .. })
        | (Value::EnumValue { .. }, Value::EnumValue { .. })
        | (Value::Function(_), Value::Function(_))
        | (Value::Function(_), Value::Builtin { .. })
        | (Value::Builtin { .. }, _) => Ok(new),
        (old, new_v) => Err(Value::error(
            "E3001",
            format!(
                "cannot assign {} to a {} binding",
                new_v.type_name(),
                old.type_name()
            ),
        )),
    }
}

/// In-place write through an access path rooted at a binding cell.
fn write_path(target: &mut Value, path: &[Access], value: Value) -> Value {
    let Some(first) = path.first() else {
        return match coerce_to_existing(target, value) {
            Ok(v) => {
                *target = v;
                Value::Nil
            }
            Err(e) => e,
        };
    };

    match (target, first) {
        (Value::Nil, _) => Value::error("E4010", "nil cannot be indexed or accessed"),
        (
            Value::Array {
                elements, mutable, ..
            },
            Access::Idx(idx),
        ) => {
            if !*mutable {
                return Value::error("E5011", "cannot mutate a `const` array");
            }
            let mut els = elements.borrow_mut();
            let len = els.len();
            let Some(i) = index_as_usize(idx, len) else {
                return Value::error(
                    "E5003",
                    format!("index {} is out of range for length {}", idx, len),
                );
            };
            write_path(&mut els[i], &path[1..], value)
        }
        (
            Value::Map {
                entries, mutable, ..
            },
            Access::Idx(key),
        ) => {
            if !*mutable {
                return Value::error("E5011", "cannot mutate a `const` map");
            }
            let Some(map_key) = MapKey::from_value(key) else {
                return Value::error(
                    "E5013",
                    format!("{} cannot be used as a map key", key.type_name()),
                );
            };
            let mut map = entries.borrow_mut();
            if path.len() == 1 {
                map.insert(map_key, value);
                Value::Nil
            } else {
                match map.get_mut(&map_key) {
                    Some(slot) => write_path(slot, &path[1..], value),
                    None => Value::error("E12001", format!("map has no key {}", map_key)),
                }
            }
        }
        (Value::Struct { fields, .. }, Access::Field(field)) => match fields.get_mut(field) {
            Some(slot) => write_path(slot, &path[1..], value),
            None => Value::error("E4006", format!("no field `{}`", field)),
        },
        (Value::Str(_), Access::Idx(_)) => {
            Value::error("E5002", "strings cannot be assigned into by index")
        }
        (other, Access::Idx(_)) => Value::error(
            "E5002",
            format!("{} cannot be indexed", other.type_name()),
        ),
        (other, Access::Field(field)) => Value::error(
            "E4006",
            format!("{} has no field `{}`", other.type_name(), field),
        ),
    }
}

fn index_as_usize(idx: &Value, len: usize) -> Option<usize> {
    match idx {
        Value::Integer(iv) => {
            if iv.value.is_negative() {
                return None;
            }
            let i = iv.to_usize()?;
            if i < len {
                Some(i)
            } else {
                None
            }
        }
        Value::Byte(b) => {
            let i = *b as usize;
            if i < len {
                Some(i)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn index_value(obj: &Value, idx: &Value) -> Value {
    match obj {
        Value::Nil => Value::error("E4010", "nil cannot be indexed"),
        Value::Array { elements, .. } => {
            let els = elements.borrow();
            match index_as_usize(idx, els.len()) {
                Some(i) => els[i].clone(),
                None => Value::error(
                    "E5003",
                    format!("index {} is out of range for length {}", idx, els.len()),
                ),
            }
        }
        Value::Str(s) => {
            let count = s.chars().count();
            match index_as_usize(idx, count) {
                Some(i) => Value::Char(s.chars().nth(i).unwrap()),
                None => Value::error(
                    "E5003",
                    format!("index {} is out of range for length {}", idx, count),
                ),
            }
        }
        Value::Map { entries, .. } => match MapKey::from_value(idx) {
            Some(key) => entries.borrow().get(&key).cloned().unwrap_or(Value::Nil),
            None => Value::error(
                "E5013",
                format!("{} cannot be used as a map key", idx.type_name()),
            ),
        },
        other => Value::error(
            "E5002",
            format!("{} cannot be indexed", other.type_name()),
        ),
    }
}

fn member_of(obj: &Value, member: &str, pos: Position) -> Value {
    match obj {
        Value::Nil => Value::error_at("E4010", "nil has no members", pos),
        Value::Struct { name, fields } => match fields.get(member) {
            Some(v) => v.clone(),
            None => Value::error_at(
                "E4006",
                format!("struct `{}` has no field `{}`", name, member),
                pos,
            ),
        },
        other => Value::error_at(
            "E3002",
            format!("{} has no member `{}`", other.type_name(), member),
            pos,
        ),
    }
}

/// `==`/`!=` semantics. Comparing enum values of different enum types, or an
/// enum value against a non-enum, is a type error.
fn eq_values(a: &Value, b: &Value, pos: Position) -> Result<bool, Value> {
    let enum_mismatch = match (a, b) {
        (
            Value::EnumValue { enum_name: an, .. },
            Value::EnumValue { enum_name: bn, .. },
        ) => an != bn,
        (Value::EnumValue { .. }, Value::Nil) | (Value::Nil, Value::EnumValue { .. }) => false,
        (Value::EnumValue { .. }, _) | (_, Value::EnumValue { .. }) => true,
        _ => false,
    };
    if enum_mismatch {
        return Err(Value::error_at(
            "E3032",
            format!("cannot compare {} with {}", a.type_name(), b.type_name()),
            pos,
        ));
    }
    a.try_eq(b).ok_or_else(|| {
        Value::error_at(
            "E3002",
            format!("`==` is not defined for {} and {}", a.type_name(), b.type_name()),
            pos,
        )
    })
}

fn order_values(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Some(x.value.cmp(&y.value)),
        (Value::Integer(x), Value::Byte(y)) => Some(x.value.cmp(&BigInt::from(*y))),
        (Value::Byte(x), Value::Integer(y)) => Some(BigInt::from(*x).cmp(&y.value)),
        (Value::Byte(x), Value::Byte(y)) => Some(x.cmp(y)),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
        (Value::Integer(x), Value::Float(y)) => x.value.to_f64()?.partial_cmp(y),
        (Value::Float(x), Value::Integer(y)) => x.partial_cmp(&y.value.to_f64()?),
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        (Value::Char(x), Value::Char(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn containment(needle: &Value, haystack: &Value, pos: Position) -> Result<bool, Value> {
    match haystack {
        Value::Array { elements, .. } => {
            for el in elements.borrow().iter() {
                if let Some(true) = needle.try_eq(el) {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Value::Str(s) => match needle {
            Value::Str(sub) => Ok(s.contains(sub.as_str())),
            Value::Char(c) => Ok(s.contains(*c)),
            other => Err(Value::error_at(
                "E3002",
                format!("`in` over a string requires a string or char, not {}", other.type_name()),
                pos,
            )),
        },
        other => Err(Value::error_at(
            "E3002",
            format!("`in` is not defined for {}", other.type_name()),
            pos,
        )),
    }
}

/// Integer arithmetic is exact, then range-checked against the combined
/// declared type. Any float operand promotes the operation to float.
fn arithmetic(op: InfixOp, l: &Value, r: &Value, pos: Position) -> Value {
    // String concatenation
    if op == InfixOp::Add {
        match (l, r) {
            (Value::Str(a), Value::Str(b)) => return Value::Str(format!("{}{}", a, b)),
            (Value::Str(a), Value::Char(b)) => return Value::Str(format!("{}{}", a, b)),
            (Value::Char(a), Value::Str(b)) => return Value::Str(format!("{}{}", a, b)),
            _ => {}
        }
    }

    enum Num {
        I(BigInt, IntType),
        F(f64),
    }
    fn as_num(v: &Value) -> Option<Num> {
        match v {
            Value::Integer(iv) => Some(Num::I(iv.value.clone(), iv.ty)),
            Value::Byte(b) => Some(Num::I(
                BigInt::from(*b),
                IntType::Sized {
                    bits: 8,
                    signed: false,
                },
            )),
            Value::Float(f) => Some(Num::F(*f)),
            _ => None,
        }
    }

    let (Some(ln), Some(rn)) = (as_num(l), as_num(r)) else {
        return Value::error_at(
            "E3002",
            format!(
                "`{}` is not defined for {} and {}",
                op,
                l.type_name(),
                r.type_name()
            ),
            pos,
        );
    };

    match (ln, rn) {
        (Num::I(a, ta), Num::I(b, tb)) => {
            let result = match op {
                InfixOp::Add => &a + &b,
                InfixOp::Sub => &a - &b,
                InfixOp::Mul => &a * &b,
                InfixOp::Div => {
                    if b.is_zero() {
                        return Value::error_at("E5004", "division by zero", pos);
                    }
                    &a / &b
                }
                InfixOp::Mod => {
                    if b.is_zero() {
                        return Value::error_at("E5004", "modulo by zero", pos);
                    }
                    &a % &b
                }
                _ => unreachable!(),
            };
            match IntType::check_range(ta, tb, &result) {
                Ok(ty) => Value::typed_int(result, ty),
                Err(fault) => range_fault_error(fault, &result).or_position(pos),
            }
        }
        (ln, rn) => {
            let a = match ln {
                Num::I(v, _) => v.to_f64().unwrap_or(f64::INFINITY),
                Num::F(f) => f,
            };
            let b = match rn {
                Num::I(v, _) => v.to_f64().unwrap_or(f64::INFINITY),
                Num::F(f) => f,
            };
            let result = match op {
                InfixOp::Add => a + b,
                InfixOp::Sub => a - b,
                InfixOp::Mul => a * b,
                InfixOp::Div => a / b,
                InfixOp::Mod => a % b,
                _ => unreachable!(),
            };
            Value::Float(result)
        }
    }
}

fn value_matches_type(value: &Value, annot: &TypeAnnot) -> bool {
    // Error values propagate through any declared return type
    if value.is_error() {
        return true;
    }
    match annot {
        TypeAnnot::Named(name) => {
            if IntType::from_name(name).is_some() {
                return matches!(value, Value::Integer(_) | Value::Byte(_) | Value::Nil);
            }
            match name.as_str() {
                "float" | "f64" | "f32" => {
                    matches!(value, Value::Float(_) | Value::Integer(_) | Value::Nil)
                }
                "string" => matches!(value, Value::Str(_) | Value::Nil),
                "bool" => matches!(value, Value::Bool(_) | Value::Nil),
                "char" => matches!(value, Value::Char(_) | Value::Nil),
                "byte" => matches!(value, Value::Byte(_) | Value::Integer(_) | Value::Nil),
                "any" => true,
                "void" => matches!(value, Value::Nil),
                other => match value {
                    Value::Struct { name, .. } => name == other,
                    Value::EnumValue { enum_name, .. } => enum_name == other,
                    Value::Nil => true,
                    _ => false,
                },
            }
        }
        TypeAnnot::Array { .. } => matches!(value, Value::Array { .. } | Value::Nil),
        TypeAnnot::Map { .. } => matches!(value, Value::Map { .. } | Value::Nil),
    }
}

fn set_container_mutability(value: Value, mutable: bool) -> Value {
    match value {
        Value::Array { elements, .. } => Value::Array { elements, mutable },
        Value::Map { entries, .. } => Value::Map { entries, mutable },
        other => other,
    }
}

// ----------------------------------------------------------------------
// Interpreter facade
// ----------------------------------------------------------------------

/// A parser+evaluator pair over one global environment, the unit the CLI,
/// the REPL, and the integration tests drive.
pub struct Interpreter {
    evaluator: Evaluator,
    env: Rc<Environment>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter {
            evaluator: Evaluator::new(),
            env: Environment::new(),
        }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Interpreter {
            evaluator: Evaluator::with_root(root),
            env: Environment::new(),
        }
    }

    pub fn set_max_recursion(&mut self, limit: usize) {
        self.evaluator.set_max_recursion(limit);
    }

    pub fn set_current_file(&mut self, file: Option<PathBuf>) {
        self.evaluator.set_current_file(file);
    }

    pub fn env(&self) -> &Rc<Environment> {
        &self.env
    }

    pub fn take_warnings(&mut self) -> Vec<Diagnostic> {
        self.evaluator.take_warnings()
    }

    /// Lex, parse, and evaluate one source text. Parse diagnostics or a
    /// runtime error value become the `Err` side.
    pub fn eval_source(&mut self, source: &str) -> Result<Value, Vec<Diagnostic>> {
        let mut parser = Parser::new(source);
        let program = parser.parse_program();
        let diags = parser.take_errors();
        if diags.iter().any(Diagnostic::is_error) {
            return Err(diags
                .into_iter()
                .map(|d| d.with_source(source))
                .collect());
        }

        match self.evaluator.eval_program(&program, &self.env) {
            Value::Error(e) => Err(vec![runtime_diagnostic(&e, source)]),
            value => Ok(value),
        }
    }
}

/// Convert a runtime error value into a renderable diagnostic.
pub fn runtime_diagnostic(error: &RuntimeError, source: &str) -> Diagnostic {
    let line = error.line.unwrap_or(1);
    let column = error.column.unwrap_or(1);
    let mut diag = Diagnostic::error(&error.code, error.message.clone(), line, column)
        .with_source(source);
    if let Some(help) = &error.help {
        diag = diag.with_help(help.clone());
    }
    diag
}
