//! Abstract syntax tree produced by the parser and consumed by the evaluator.
//!
//! Every child link is an `Rc<Expr>` rather than `Box<Expr>`: a [`Closure`]
//! captures a reference to its `Lambda` node, and the evaluator pushes
//! sub-expressions onto its explicit stack one at a time — both want cheap
//! structural sharing of AST nodes rather than ownership transfer or deep
//! copies.

use std::fmt;
use std::rc::Rc;

use crate::error::SourceLocation;
use crate::util::{indent, quote};

/// One parsed expression node. Every variant carries the source location of
/// its introducing token; parent links are not kept since nothing in this
/// interpreter observes them.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Integer { loc: SourceLocation, value: i64 },
    String { loc: SourceLocation, value: String },
    Intrinsic { loc: SourceLocation, name: String },
    Variable { loc: SourceLocation, name: String },
    Lambda { loc: SourceLocation, params: Vec<String>, body: Rc<Expr> },
    Letrec { loc: SourceLocation, bindings: Vec<(String, Rc<Expr>)>, body: Rc<Expr> },
    If { loc: SourceLocation, cond: Rc<Expr>, then_branch: Rc<Expr>, else_branch: Rc<Expr> },
    Call { loc: SourceLocation, callee: Rc<Expr>, args: Vec<Rc<Expr>> },
    /// Invariant: never empty — the parser rejects `[ ]`.
    Sequence { loc: SourceLocation, exprs: Vec<Rc<Expr>> },
}

impl Expr {
    #[must_use]
    pub fn loc(&self) -> SourceLocation {
        match self {
            Expr::Integer { loc, .. }
            | Expr::String { loc, .. }
            | Expr::Intrinsic { loc, .. }
            | Expr::Variable { loc, .. }
            | Expr::Lambda { loc, .. }
            | Expr::Letrec { loc, .. }
            | Expr::If { loc, .. }
            | Expr::Call { loc, .. }
            | Expr::Sequence { loc, .. } => *loc,
        }
    }

    /// The node's variant name, used by the tracer and the `ast` bracketed
    /// form.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Integer { .. } => "Integer",
            Expr::String { .. } => "String",
            Expr::Intrinsic { .. } => "Intrinsic",
            Expr::Variable { .. } => "Variable",
            Expr::Lambda { .. } => "Lambda",
            Expr::Letrec { .. } => "Letrec",
            Expr::If { .. } => "If",
            Expr::Call { .. } => "Call",
            Expr::Sequence { .. } => "Sequence",
        }
    }

    /// Re-renders this node as syntax the parser accepts, producing the same
    /// tree when re-lexed and re-parsed.
    #[must_use]
    pub fn pretty_print(&self) -> String {
        match self {
            Expr::Integer { value, .. } => value.to_string(),
            Expr::String { value, .. } => quote(value),
            Expr::Intrinsic { name, .. } => name.clone(),
            Expr::Variable { name, .. } => name.clone(),
            Expr::Lambda { params, body, .. } => {
                format!("lambda ({}) {{\n{}\n}}", params.join(" "), indent(&body.pretty_print(), 2))
            }
            Expr::Letrec { bindings, body, .. } => {
                let bound = bindings
                    .iter()
                    .map(|(name, init)| format!("{name} = {}", init.pretty_print()))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!(
                    "letrec (\n{}\n) {{\n{}\n}}",
                    indent(&bound, 2),
                    indent(&body.pretty_print(), 2)
                )
            }
            Expr::If { cond, then_branch, else_branch, .. } => {
                format!(
                    "if {} then {}\nelse {}",
                    cond.pretty_print(),
                    then_branch.pretty_print(),
                    else_branch.pretty_print()
                )
            }
            Expr::Call { callee, args, .. } => {
                let mut parts = vec![callee.pretty_print()];
                parts.extend(args.iter().map(|a| a.pretty_print()));
                format!("({})", parts.join(" "))
            }
            Expr::Sequence { exprs, .. } => {
                let body = exprs.iter().map(|e| e.pretty_print()).collect::<Vec<_>>().join("\n");
                format!("[\n{}\n]", indent(&body, 2))
            }
        }
    }
}

impl fmt::Display for Expr {
    /// Bracketed structural form used by the `ast` CLI mode, e.g.
    /// `(Call 1:1 (Intrinsic 1:2 .add) [(Integer 1:7 1) (Integer 1:9 2)])`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Integer { loc, value } => write!(f, "(Integer {loc} {value})"),
            Expr::String { loc, value } => write!(f, "(String {loc} {})", quote(value)),
            Expr::Intrinsic { loc, name } => write!(f, "(Intrinsic {loc} {name})"),
            Expr::Variable { loc, name } => write!(f, "(Variable {loc} {name})"),
            Expr::Lambda { loc, params, body } => {
                write!(f, "(Lambda {loc} [{}] {body})", params.join(" "))
            }
            Expr::Letrec { loc, bindings, body } => {
                let bound = bindings.iter().map(|(n, e)| format!("({n} {e})")).collect::<Vec<_>>().join(" ");
                write!(f, "(Letrec {loc} [{bound}] {body})")
            }
            Expr::If { loc, cond, then_branch, else_branch } => {
                write!(f, "(If {loc} {cond} {then_branch} {else_branch})")
            }
            Expr::Call { loc, callee, args } => {
                let args = args.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(" ");
                write!(f, "(Call {loc} {callee} [{args}])")
            }
            Expr::Sequence { loc, exprs } => {
                let exprs = exprs.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(" ");
                write!(f, "(Sequence {loc} [{exprs}])")
            }
        }
    }
}
