//! Runtime values.
//!
//! A [`Value`] is `Rc<ValueBox>` so the evaluator's `value` register, store
//! cells, and environments can all share one allocation identity without a
//! copy; `ValueBox::location` is a `Cell` so [`crate::heap::Store::alloc`]
//! can stamp the cell's own idea of where it lives without needing `&mut`
//! access through the `Rc` (mirrors `original_source`'s `Value.location`
//! attribute, which Python mutates in place through normal reference
//! semantics). A closure's `env` and a continuation's captured stack are
//! each wrapped in a `RefCell` for the same reason: GC relocation needs to
//! rewrite the locations they hold in place, visible through every existing
//! `Rc` alias, exactly like Python mutating a list found via `id()`.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::ast::Expr;
use crate::heap::Location;
use crate::util::quote;

/// One captured stack, as produced by `.callcc`. Cloning a [`CapturedStack`]
/// bumps the `Rc`, so invoking a continuation more than once (multi-shot,
/// `spec.md` §4.3) never consumes the capture; the evaluator clones the
/// *contents* out (`(*stack.0.borrow()).clone()`) when it actually resumes.
#[derive(Debug, Clone)]
pub struct CapturedStack(pub Rc<RefCell<Vec<crate::eval::Layer>>>);

#[derive(Debug, Clone)]
pub enum ValueData {
    Void,
    Integer(i64),
    Str(String),
    /// `env` maps parameter/letrec names visible at capture time to the
    /// store locations holding their values; `fun` is the originating
    /// `Lambda` node shared with the AST it was parsed from.
    Closure { env: Rc<RefCell<Vec<(String, Location)>>>, fun: Rc<Expr> },
    Continuation { stack: CapturedStack },
}

/// A heap-resident value. Cheap to clone (bumps the `Rc`); `location` is the
/// cell this particular allocation currently lives in, if any — `None` for a
/// freshly constructed value not yet passed to
/// [`crate::heap::Store::alloc`].
#[derive(Debug)]
pub struct ValueBox {
    pub location: Cell<Option<Location>>,
    pub data: ValueData,
}

pub type Value = Rc<ValueBox>;

fn boxed(data: ValueData) -> Value {
    Rc::new(ValueBox { location: Cell::new(None), data })
}

impl ValueBox {
    #[must_use]
    pub fn void() -> Value {
        boxed(ValueData::Void)
    }

    #[must_use]
    pub fn integer(v: i64) -> Value {
        boxed(ValueData::Integer(v))
    }

    #[must_use]
    pub fn string(s: String) -> Value {
        boxed(ValueData::Str(s))
    }

    #[must_use]
    pub fn closure(env: Vec<(String, Location)>, fun: Rc<Expr>) -> Value {
        boxed(ValueData::Closure { env: Rc::new(RefCell::new(env)), fun })
    }

    #[must_use]
    pub fn continuation(stack: CapturedStack) -> Value {
        boxed(ValueData::Continuation { stack })
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match &self.data {
            ValueData::Void => "void",
            ValueData::Integer(_) => "integer",
            ValueData::Str(_) => "string",
            ValueData::Closure { .. } => "closure",
            ValueData::Continuation { .. } => "continuation",
        }
    }

    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match &self.data {
            ValueData::Integer(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match &self.data {
            ValueData::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ValueBox {
    /// Rendering used by `.put`: integers print as decimal, strings print
    /// raw (unquoted), and the remaining three kinds print as bracketed
    /// placeholders, matching `original_source`'s `Value.__str__`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            ValueData::Void => write!(f, "<void>"),
            ValueData::Integer(v) => write!(f, "{v}"),
            ValueData::Str(s) => write!(f, "{s}"),
            ValueData::Closure { .. } => write!(f, "<closure>"),
            ValueData::Continuation { .. } => write!(f, "<continuation>"),
        }
    }
}

/// Renders a value the way `.strquote` does: strings come back as a quoted
/// literal (escaping `\` and `"`), every other kind falls back to `Display`.
#[must_use]
pub fn strquote(v: &ValueBox) -> String {
    match &v.data {
        ValueData::Str(s) => quote(s),
        _ => v.to_string(),
    }
}
