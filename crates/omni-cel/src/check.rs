//! # Static Checking
//!
//! Types a parsed expression against its declarations before the program
//! is cached. Identifiers resolve to the root variable or to a
//! comprehension binder, field selection follows the dotted declarations,
//! and operators and built-in functions are checked against the operand
//! types the interpreter accepts.
//!
//! Values the declarations leave open (list elements, map values, untyped
//! fields, binders) check as `dyn`, which is compatible with everything.

use std::fmt;

use cel_parser::{ArithmeticOp, Atom, Expression, Member, RelationOp, UnaryOp};

use crate::decl::{DeclType, Declarations};

/// Static type of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ty {
    Dyn,
    Null,
    Bool,
    Int,
    UInt,
    Double,
    String,
    Bytes,
    List,
    Map,
    Timestamp,
    Duration,
}

impl Ty {
    fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::UInt | Self::Double)
    }

    fn is_dyn(self) -> bool {
        self == Self::Dyn
    }

    /// `true` if this type is `want` or `dyn`.
    fn admits(self, want: Self) -> bool {
        self == want || self.is_dyn()
    }

    fn equatable(self, other: Self) -> bool {
        self == other
            || self.is_dyn()
            || other.is_dyn()
            || self == Self::Null
            || other == Self::Null
            || (self.is_numeric() && other.is_numeric())
    }

    fn orderable(self, other: Self) -> bool {
        if self.is_dyn() || other.is_dyn() {
            return true;
        }
        if self.is_numeric() && other.is_numeric() {
            return true;
        }
        self == other && !matches!(self, Self::List | Self::Map | Self::Bytes)
    }
}

impl From<DeclType> for Ty {
    fn from(ty: DeclType) -> Self {
        match ty {
            DeclType::String => Self::String,
            DeclType::Int => Self::Int,
            DeclType::Double => Self::Double,
            DeclType::Bool => Self::Bool,
            DeclType::List => Self::List,
            DeclType::Map => Self::Map,
            DeclType::Dyn => Self::Dyn,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Dyn => "dyn",
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Double => "double",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::List => "list",
            Self::Map => "map",
            Self::Timestamp => "timestamp",
            Self::Duration => "duration",
        })
    }
}

/// Why an expression failed to check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckError {
    /// Top-level identifiers that are neither the root nor a binder,
    /// sorted and deduplicated.
    Undeclared(Vec<String>),
    /// An operand, receiver or argument of the wrong type.
    Type(String),
}

/// Infer the type of `expr` under `decls`.
///
/// # Errors
///
/// [`CheckError::Undeclared`] if any identifier is undeclared, otherwise
/// the first [`CheckError::Type`] found.
pub fn check(expr: &Expression, decls: &Declarations) -> Result<Ty, CheckError> {
    let mut checker = Checker {
        decls,
        binders: Vec::new(),
        undeclared: Vec::new(),
    };
    let result = checker.infer(expr);
    if !checker.undeclared.is_empty() {
        let mut names = checker.undeclared;
        names.sort_unstable();
        names.dedup();
        return Err(CheckError::Undeclared(names));
    }
    result.map_err(CheckError::Type)
}

struct Checker<'a> {
    decls: &'a Declarations,
    binders: Vec<String>,
    undeclared: Vec<String>,
}

impl Checker<'_> {
    fn infer(&mut self, expr: &Expression) -> Result<Ty, String> {
        match expr {
            Expression::Atom(atom) => Ok(atom_type(atom)),
            Expression::Ident(name) => Ok(self.ident(name)),
            Expression::Member(target, member) => self.member(target, member),
            Expression::FunctionCall(func, target, args) => {
                let Expression::Ident(name) = func.as_ref() else {
                    return Err("only named functions can be called".into());
                };
                self.call(name, target.as_deref(), args)
            }
            Expression::List(items) => {
                for item in items {
                    self.infer(item)?;
                }
                Ok(Ty::List)
            }
            Expression::Map(entries) => {
                for (key, value) in entries {
                    let key_ty = self.infer(key)?;
                    if !matches!(key_ty, Ty::Dyn | Ty::String | Ty::Int | Ty::UInt | Ty::Bool) {
                        return Err(format!("{key_ty} cannot be a map key"));
                    }
                    self.infer(value)?;
                }
                Ok(Ty::Map)
            }
            Expression::Unary(op, operand) => {
                let ty = self.infer(operand)?;
                match op {
                    UnaryOp::Not | UnaryOp::DoubleNot if ty.admits(Ty::Bool) => Ok(Ty::Bool),
                    UnaryOp::Minus if matches!(ty, Ty::Int | Ty::Double | Ty::Dyn) => Ok(ty),
                    UnaryOp::DoubleMinus if ty.is_numeric() || ty.is_dyn() => Ok(ty),
                    UnaryOp::Not | UnaryOp::DoubleNot => Err(format!("no operator ! for {ty}")),
                    UnaryOp::Minus | UnaryOp::DoubleMinus => Err(format!("no operator - for {ty}")),
                }
            }
            Expression::Arithmetic(left, op, right) => {
                let (l, r) = (self.infer(left)?, self.infer(right)?);
                arithmetic(l, op, r)
            }
            Expression::Relation(left, op, right) => {
                let (l, r) = (self.infer(left)?, self.infer(right)?);
                relation(l, op, r)
            }
            Expression::Ternary(cond, then, otherwise) => {
                self.condition(cond, "?:")?;
                let (a, b) = (self.infer(then)?, self.infer(otherwise)?);
                Ok(if a == b { a } else { Ty::Dyn })
            }
            Expression::Or(left, right) => {
                self.condition(left, "||")?;
                self.condition(right, "||")?;
                Ok(Ty::Bool)
            }
            Expression::And(left, right) => {
                self.condition(left, "&&")?;
                self.condition(right, "&&")?;
                Ok(Ty::Bool)
            }
        }
    }

    fn condition(&mut self, expr: &Expression, op: &str) -> Result<(), String> {
        let ty = self.infer(expr)?;
        if ty.admits(Ty::Bool) {
            Ok(())
        } else {
            Err(format!("operand of {op} must be bool, got {ty}"))
        }
    }

    fn is_binder(&self, name: &str) -> bool {
        self.binders.iter().any(|b| b == name)
    }

    fn ident(&mut self, name: &str) -> Ty {
        if self.is_binder(name) {
            return Ty::Dyn;
        }
        match self.decls.get(name) {
            Some(ty) => ty.into(),
            None => {
                self.undeclared.push(name.to_string());
                Ty::Dyn
            }
        }
    }

    /// Dotted declaration name of a field-selection chain from the root.
    fn path_of(&self, expr: &Expression) -> Option<String> {
        match expr {
            Expression::Ident(name) if !self.is_binder(name) && self.decls.declares(name) => {
                Some(name.to_string())
            }
            Expression::Member(target, member) => match member.as_ref() {
                Member::Attribute(field) => self.path_of(target).map(|p| format!("{p}.{field}")),
                _ => None,
            },
            _ => None,
        }
    }

    fn member(&mut self, target: &Expression, member: &Member) -> Result<Ty, String> {
        let parent = self.infer(target)?;
        match member {
            Member::Attribute(field) => self.select(target, parent, field, false),
            Member::Index(index) => {
                let index = self.infer(index)?;
                match parent {
                    Ty::Dyn => Ok(Ty::Dyn),
                    Ty::List if matches!(index, Ty::Int | Ty::UInt | Ty::Dyn) => Ok(Ty::Dyn),
                    Ty::String if matches!(index, Ty::Int | Ty::UInt | Ty::Dyn) => Ok(Ty::String),
                    Ty::Map if matches!(index, Ty::String | Ty::Int | Ty::UInt | Ty::Bool | Ty::Dyn) => {
                        Ok(Ty::Dyn)
                    }
                    Ty::List | Ty::String | Ty::Map => {
                        Err(format!("{parent} cannot be indexed by {index}"))
                    }
                    other => Err(format!("{other} cannot be indexed")),
                }
            }
            Member::Fields(_) => Err("message construction is not supported".into()),
        }
    }

    /// Type of `target.field`. A declared object rejects fields it does not
    /// declare unless only presence is tested.
    fn select(&self, target: &Expression, parent: Ty, field: &str, presence: bool) -> Result<Ty, String> {
        match parent {
            Ty::Dyn => Ok(Ty::Dyn),
            Ty::Map => {
                let Some(path) = self.path_of(target) else {
                    return Ok(Ty::Dyn);
                };
                if let Some(ty) = self.decls.get(&format!("{path}.{field}")) {
                    Ok(ty.into())
                } else if presence || !self.decls.declares_fields(&path) {
                    Ok(Ty::Dyn)
                } else {
                    Err(format!("undefined field {field} on {path}"))
                }
            }
            other => Err(format!("cannot select field {field} on {other}")),
        }
    }

    fn call(&mut self, name: &str, target: Option<&Expression>, args: &[Expression]) -> Result<Ty, String> {
        match name {
            "has" => {
                let [Expression::Member(object, member)] = args else {
                    return Err("has() takes a single field selection".into());
                };
                let Member::Attribute(field) = member.as_ref() else {
                    return Err("has() takes a single field selection".into());
                };
                if target.is_some() {
                    return Err("has() is not a method".into());
                }
                let parent = self.infer(object)?;
                self.select(object, parent, field, true)?;
                Ok(Ty::Bool)
            }
            "all" | "exists" | "exists_one" | "map" | "filter" => {
                let Some(range) = target else {
                    return Err(format!("{name}() must be called on a list or map"));
                };
                let [Expression::Ident(binder), body] = args else {
                    return Err(format!("{name}() takes a variable and an expression"));
                };
                let range_ty = self.infer(range)?;
                if !matches!(range_ty, Ty::List | Ty::Map | Ty::Dyn) {
                    return Err(format!("{name}() cannot range over {range_ty}"));
                }
                self.binders.push(binder.to_string());
                let body_ty = self.infer(body);
                self.binders.pop();
                let body_ty = body_ty?;
                match name {
                    "map" => Ok(Ty::List),
                    _ if !body_ty.admits(Ty::Bool) => {
                        Err(format!("{name}() predicate must be bool, got {body_ty}"))
                    }
                    "filter" => Ok(Ty::List),
                    _ => Ok(Ty::Bool),
                }
            }
            "size" => {
                let (recv, _) = self.receiver(name, target, args, 0)?;
                if matches!(recv, Ty::String | Ty::Bytes | Ty::List | Ty::Map | Ty::Dyn) {
                    Ok(Ty::Int)
                } else {
                    Err(format!("size() is not defined on {recv}"))
                }
            }
            "contains" => {
                let (recv, arg) = self.receiver(name, target, args, 1)?;
                match recv {
                    Ty::String if arg[0].admits(Ty::String) => Ok(Ty::Bool),
                    Ty::List | Ty::Map | Ty::Bytes | Ty::Dyn => Ok(Ty::Bool),
                    _ => Err(format!("contains() is not defined on {recv} with {}", arg[0])),
                }
            }
            "startsWith" | "endsWith" | "matches" => {
                let (recv, arg) = self.receiver(name, target, args, 1)?;
                if recv.admits(Ty::String) && arg[0].admits(Ty::String) {
                    Ok(Ty::Bool)
                } else {
                    Err(format!("{name}() is not defined on {recv} with {}", arg[0]))
                }
            }
            "string" | "int" | "uint" | "double" | "bytes" | "duration" | "timestamp" => {
                self.receiver(name, target, args, 0)?;
                Ok(match name {
                    "string" => Ty::String,
                    "int" => Ty::Int,
                    "uint" => Ty::UInt,
                    "double" => Ty::Double,
                    "bytes" => Ty::Bytes,
                    "duration" => Ty::Duration,
                    _ => Ty::Timestamp,
                })
            }
            "max" => {
                for arg in target.into_iter().chain(args) {
                    let ty = self.infer(arg)?;
                    if !(ty.is_numeric() || matches!(ty, Ty::List | Ty::Dyn)) {
                        return Err(format!("max() is not defined on {ty}"));
                    }
                }
                Ok(Ty::Dyn)
            }
            other => Err(format!("undeclared function {other}")),
        }
    }

    /// Receiver and argument types of a function callable both as
    /// `x.f(args)` and `f(x, args)`.
    fn receiver(
        &mut self,
        name: &str,
        target: Option<&Expression>,
        args: &[Expression],
        arity: usize,
    ) -> Result<(Ty, Vec<Ty>), String> {
        let (recv, rest) = match (target, args.split_first()) {
            (Some(target), _) => (target, args),
            (None, Some((first, rest))) => (first, rest),
            (None, None) => return Err(format!("{name}() needs an argument")),
        };
        if rest.len() != arity {
            return Err(format!("wrong number of arguments to {name}()"));
        }
        let recv = self.infer(recv)?;
        let rest = rest.iter().map(|a| self.infer(a)).collect::<Result<Vec<_>, _>>()?;
        Ok((recv, rest))
    }
}

fn atom_type(atom: &Atom) -> Ty {
    match atom {
        Atom::Int(_) => Ty::Int,
        Atom::UInt(_) => Ty::UInt,
        Atom::Float(_) => Ty::Double,
        Atom::String(_) => Ty::String,
        Atom::Bytes(_) => Ty::Bytes,
        Atom::Bool(_) => Ty::Bool,
        Atom::Null => Ty::Null,
    }
}

fn arithmetic(l: Ty, op: &ArithmeticOp, r: Ty) -> Result<Ty, String> {
    if l.is_dyn() || r.is_dyn() {
        return Ok(Ty::Dyn);
    }
    let result = if l.is_numeric() && r.is_numeric() {
        match (l, r) {
            _ if l == r => Some(l),
            (Ty::Double, _) | (_, Ty::Double) => Some(Ty::Double),
            // int and uint do not mix
            _ => None,
        }
    } else {
        match (op, l, r) {
            (ArithmeticOp::Add, Ty::String, Ty::String) => Some(Ty::String),
            (ArithmeticOp::Add, Ty::List, Ty::List) => Some(Ty::List),
            (ArithmeticOp::Add, Ty::Map, Ty::Map) => Some(Ty::Map),
            (ArithmeticOp::Add, Ty::Duration, Ty::Duration) => Some(Ty::Duration),
            (ArithmeticOp::Add, Ty::Timestamp, Ty::Duration)
            | (ArithmeticOp::Add, Ty::Duration, Ty::Timestamp) => Some(Ty::Timestamp),
            (ArithmeticOp::Subtract, Ty::Duration, Ty::Duration) => Some(Ty::Duration),
            (ArithmeticOp::Subtract, Ty::Timestamp, Ty::Duration) => Some(Ty::Timestamp),
            (ArithmeticOp::Subtract, Ty::Timestamp, Ty::Timestamp) => Some(Ty::Duration),
            _ => None,
        }
    };
    result.ok_or_else(|| format!("no operator {} for {l} and {r}", arithmetic_symbol(op)))
}

fn arithmetic_symbol(op: &ArithmeticOp) -> &'static str {
    match op {
        ArithmeticOp::Add => "+",
        ArithmeticOp::Subtract => "-",
        ArithmeticOp::Multiply => "*",
        ArithmeticOp::Divide => "/",
        ArithmeticOp::Modulus => "%",
    }
}

fn relation(l: Ty, op: &RelationOp, r: Ty) -> Result<Ty, String> {
    let ok = match op {
        RelationOp::In => matches!(
            (l, r),
            (_, Ty::List | Ty::Map | Ty::Dyn) | (Ty::String | Ty::Dyn, Ty::String)
        ),
        RelationOp::Equals | RelationOp::NotEquals => l.equatable(r),
        RelationOp::LessThan
        | RelationOp::LessThanEq
        | RelationOp::GreaterThan
        | RelationOp::GreaterThanEq => l.orderable(r),
    };
    if ok {
        Ok(Ty::Bool)
    } else {
        Err(format!("no operator {} for {l} and {r}", relation_symbol(op)))
    }
}

fn relation_symbol(op: &RelationOp) -> &'static str {
    match op {
        RelationOp::LessThan => "<",
        RelationOp::LessThanEq => "<=",
        RelationOp::GreaterThan => ">",
        RelationOp::GreaterThanEq => ">=",
        RelationOp::Equals => "==",
        RelationOp::NotEquals => "!=",
        RelationOp::In => "in",
    }
}
