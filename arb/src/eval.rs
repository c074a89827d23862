//! The tree-walking evaluator.
//!
//! Evaluation is driven by an explicit stack of [`Layer`]s rather than the
//! host call stack: every AST variant is a small state machine keyed off
//! `Layer::pc`, advancing one micro-step per outer loop iteration. This is
//! what makes `.callcc` safe — capturing a continuation is just cloning
//! `Vec<Layer>`, no Rust stack unwinding or re-entrancy tricks required.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::Expr;
use crate::error::{ArbError, ArbResult, SourceLocation};
use crate::heap::{GcConfig, HeapStats, Location, Store};
use crate::io::InterpreterIo;
use crate::tracer::Tracer;
use crate::value::{strquote, CapturedStack, Value, ValueBox, ValueData};

/// `(name, location)` pairs visible to the expression currently being
/// evaluated. Order matters only for shadowing: a later entry with the same
/// name wins, via a backward linear scan.
pub type Env = Vec<(String, Location)>;

/// The env a [`Layer`] actually holds: shared by `Rc` across every layer of
/// the same frame. A nested, non-frame `letrec` pushes its bindings into the
/// very same cell its enclosing frame layer reads, which is what lets
/// dynamic lookup — which only inspects `frame` layers — see bindings
/// introduced anywhere inside that frame.
pub type SharedEnv = Rc<RefCell<Env>>;

/// Scratch storage for the multi-step `Call` state machine: accumulates the
/// callee (non-intrinsic calls only) and the evaluated arguments one at a
/// time.
#[derive(Debug, Clone, Default)]
pub struct LayerLocal {
    pub callee: Option<Value>,
    pub args: Vec<Value>,
}

/// One frame of the explicit evaluation stack.
#[derive(Debug, Clone)]
pub struct Layer {
    pub env: SharedEnv,
    pub expr: Rc<Expr>,
    pub pc: usize,
    pub local: LayerLocal,
    /// Whether this layer starts a frame: the initial program layer, or a
    /// closure/continuation call. Dynamic-scope lookup and GC marking only
    /// descend into `env` for frame layers.
    pub frame: bool,
}

impl Layer {
    fn new(env: SharedEnv, expr: Rc<Expr>, frame: bool) -> Self {
        Self { env, expr, pc: 0, local: LayerLocal::default(), frame }
    }

    fn new_frame(env: Env, expr: Rc<Expr>) -> Self {
        Self::new(Rc::new(RefCell::new(env)), expr, true)
    }
}

/// Deep-clones a stack snapshot the way `.callcc` needs: independent of the
/// live stack and of any other resumption of the same continuation, while
/// preserving per-frame env sharing — layers that pointed at the same
/// [`SharedEnv`] in `stack` still point at one (fresh) cell in the copy, so a
/// binding added after this clone via one alias doesn't leak into the other,
/// and a binding already present is still visible through every alias in
/// the copy.
fn clone_stack(stack: &[Layer]) -> Vec<Layer> {
    let mut seen: HashMap<*const RefCell<Env>, SharedEnv> = HashMap::new();
    stack
        .iter()
        .map(|layer| {
            let ptr = Rc::as_ptr(&layer.env);
            let env = seen.entry(ptr).or_insert_with(|| Rc::new(RefCell::new(layer.env.borrow().clone()))).clone();
            Layer { env, expr: Rc::clone(&layer.expr), pc: layer.pc, local: layer.local.clone(), frame: layer.frame }
        })
        .collect()
}

fn is_lexical_name(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_lowercase)
}

/// Keeps only the lexically-scoped bindings of `env`, the capture rule for a
/// freshly built [`Closure`](ValueData::Closure): dynamic bindings are
/// resolved anew at call time from whatever stack happens to be active then.
fn filter_lexical(env: &[(String, Location)]) -> Env {
    env.iter().filter(|(name, _)| is_lexical_name(name)).cloned().collect()
}

fn lookup_env(loc: SourceLocation, name: &str, env: &[(String, Location)]) -> ArbResult<Location> {
    env.iter().rev().find(|(n, _)| n == name).map(|(_, l)| *l).ok_or_else(|| {
        ArbError::runtime(Some(loc), format!("undefined variable {name} (intrinsic functions cannot be treated as variables)"))
    })
}

fn lookup_stack(loc: SourceLocation, name: &str, stack: &[Layer]) -> ArbResult<Location> {
    for layer in stack.iter().rev() {
        if layer.frame {
            if let Some((_, l)) = layer.env.borrow().iter().rev().find(|(n, _)| n == name) {
                return Ok(*l);
            }
        }
    }
    Err(ArbError::runtime(Some(loc), format!("undefined variable {name} (intrinsic functions cannot be treated as variables)")))
}

/// Owns the store and the explicit evaluation stack for one program run.
/// `.eval` constructs a brand new, independent `Interpreter` rather than
/// reusing this one: a fresh store and empty environment.
pub struct Interpreter<'t, T: Tracer> {
    stack: Vec<Layer>,
    store: Store,
    tracer: &'t mut T,
    io: &'t mut dyn InterpreterIo,
}

impl<'t, T: Tracer> Interpreter<'t, T> {
    #[must_use]
    pub fn new(tree: Rc<Expr>, config: GcConfig, tracer: &'t mut T, io: &'t mut dyn InterpreterIo) -> Self {
        Self { stack: vec![Layer::new_frame(Vec::new(), tree)], store: Store::new(config), tracer, io }
    }

    #[must_use]
    pub fn heap_stats(&self) -> HeapStats {
        HeapStats { used: self.store.used(), capacity: self.store.capacity(), ..self.store.stats }
    }

    /// Runs the explicit-stack loop to completion, returning the final
    /// value or propagating a runtime error (including [`ArbError::Exit`]
    /// from `.exit`).
    pub fn run(&mut self) -> ArbResult<Value> {
        self.tracer.on_interp_start();
        let mut value = ValueBox::void();

        loop {
            let Some(top_idx) = self.stack.len().checked_sub(1) else { return Ok(value) };

            if self.store.should_collect() {
                let reclaimed = crate::gc::collect(&mut self.store, &value, &mut self.stack);
                self.tracer.on_gc(reclaimed);
                self.store.stats.collections_run += 1;
                self.store.stats.cells_reclaimed += reclaimed;
                if self.store.should_collect() {
                    self.store.mark_insufficient();
                } else {
                    self.store.clear_latch();
                }
            }

            let expr = Rc::clone(&self.stack[top_idx].expr);
            self.tracer.on_step(expr.kind_name(), expr.loc());
            value = self.step(top_idx, &expr, value)?;
        }
    }

    fn alloc(&mut self, value: Value) -> Location {
        self.store.alloc(value)
    }

    /// Advances the top layer by exactly one micro-step and returns the
    /// `value` register to use on the next iteration.
    fn step(&mut self, idx: usize, expr: &Rc<Expr>, value: Value) -> ArbResult<Value> {
        match expr.as_ref() {
            Expr::Integer { value, .. } => {
                let v = ValueBox::integer(*value);
                self.stack.pop();
                Ok(v)
            }
            Expr::String { value, .. } => {
                let v = ValueBox::string(value.clone());
                self.stack.pop();
                Ok(v)
            }
            Expr::Intrinsic { loc, name } => {
                Err(ArbError::runtime(Some(*loc), format!("intrinsic {name} used outside of callee position")))
            }
            Expr::Lambda { .. } => {
                let env = filter_lexical(&self.stack[idx].env.borrow());
                let v = ValueBox::closure(env, Rc::clone(expr));
                self.stack.pop();
                Ok(v)
            }
            Expr::Letrec { bindings, body, .. } => self.step_letrec(idx, bindings, body, value),
            Expr::If { cond, then_branch, else_branch, loc } => {
                self.step_if(idx, cond, then_branch, else_branch, *loc, value)
            }
            Expr::Variable { name, loc } => {
                let loc_in_store = if is_lexical_name(name) {
                    lookup_env(*loc, name, &self.stack[idx].env.borrow())?
                } else {
                    lookup_stack(*loc, name, &self.stack)?
                };
                self.tracer.on_variable_lookup(name);
                let v = self.store.get(loc_in_store);
                self.stack.pop();
                Ok(v)
            }
            Expr::Call { callee, args, loc } => {
                if let Expr::Intrinsic { name, .. } = callee.as_ref() {
                    self.step_intrinsic_call(idx, name, args, *loc, value)
                } else {
                    self.step_closure_call(idx, callee, args, *loc, value)
                }
            }
            Expr::Sequence { exprs, .. } => self.step_sequence(idx, exprs, value),
        }
    }

    fn step_letrec(
        &mut self,
        idx: usize,
        bindings: &[(String, Rc<Expr>)],
        body: &Rc<Expr>,
        value: Value,
    ) -> ArbResult<Value> {
        let pc = self.stack[idx].pc;
        if pc == 0 {
            for (name, _) in bindings {
                let loc = self.alloc(ValueBox::void());
                self.stack[idx].env.borrow_mut().push((name.clone(), loc));
            }
            self.stack[idx].pc += 1;
        } else if pc <= bindings.len() {
            if pc > 1 {
                self.update_last_binding(idx, bindings, pc, &value)?;
            }
            let env = Rc::clone(&self.stack[idx].env);
            self.stack.push(Layer::new(env, Rc::clone(&bindings[pc - 1].1), false));
            self.stack[idx].pc += 1;
        } else if pc == bindings.len() + 1 {
            if pc > 1 {
                self.update_last_binding(idx, bindings, pc, &value)?;
            }
            let env = Rc::clone(&self.stack[idx].env);
            self.stack.push(Layer::new(env, Rc::clone(body), false));
            self.stack[idx].pc += 1;
        } else {
            for _ in bindings {
                self.stack[idx].env.borrow_mut().pop();
            }
            self.stack.pop();
        }
        Ok(value)
    }

    fn update_last_binding(
        &mut self,
        idx: usize,
        bindings: &[(String, Rc<Expr>)],
        pc: usize,
        value: &Value,
    ) -> ArbResult<()> {
        let (name, init) = &bindings[pc - 2];
        let loc = lookup_env(init.loc(), name, &self.stack[idx].env.borrow())?;
        self.store.overwrite(loc, Rc::clone(value));
        Ok(())
    }

    fn step_if(
        &mut self,
        idx: usize,
        cond: &Rc<Expr>,
        then_branch: &Rc<Expr>,
        else_branch: &Rc<Expr>,
        loc: SourceLocation,
        value: Value,
    ) -> ArbResult<Value> {
        let pc = self.stack[idx].pc;
        if pc == 0 {
            let env = Rc::clone(&self.stack[idx].env);
            self.stack.push(Layer::new(env, Rc::clone(cond), false));
            self.stack[idx].pc += 1;
        } else if pc == 1 {
            let cond_val = value.as_integer().ok_or_else(|| {
                ArbError::runtime(Some(loc), format!("the condition evaluated to a value of wrong type ({})", value.type_name()))
            })?;
            let branch = if cond_val != 0 { then_branch } else { else_branch };
            let env = Rc::clone(&self.stack[idx].env);
            self.stack.push(Layer::new(env, Rc::clone(branch), false));
            self.stack[idx].pc += 1;
        } else {
            self.stack.pop();
        }
        Ok(value)
    }

    fn step_sequence(&mut self, idx: usize, exprs: &[Rc<Expr>], value: Value) -> ArbResult<Value> {
        let pc = self.stack[idx].pc;
        if pc < exprs.len() {
            let env = Rc::clone(&self.stack[idx].env);
            self.stack.push(Layer::new(env, Rc::clone(&exprs[pc]), false));
            self.stack[idx].pc += 1;
        } else {
            self.stack.pop();
        }
        Ok(value)
    }

    fn step_intrinsic_call(
        &mut self,
        idx: usize,
        name: &str,
        args_ast: &[Rc<Expr>],
        loc: SourceLocation,
        value: Value,
    ) -> ArbResult<Value> {
        let pc = self.stack[idx].pc;
        if pc == 0 {
            self.stack[idx].pc += 1;
        } else if pc <= args_ast.len() {
            if pc > 1 {
                self.stack[idx].local.args.push(value);
            }
            let env = Rc::clone(&self.stack[idx].env);
            self.stack.push(Layer::new(env, Rc::clone(&args_ast[pc - 1]), false));
            self.stack[idx].pc += 1;
        } else {
            if pc > 1 {
                self.stack[idx].local.args.push(value.clone());
            }
            let args = std::mem::take(&mut self.stack[idx].local.args);
            if name == ".callcc" {
                // `.callcc` replaces its own call layer with a closure-call
                // layer directly; it must not go through the generic
                // "pop after the intrinsic runs" path below.
                self.call_callcc(args, loc)?;
                return Ok(value);
            }
            let result = self.call_intrinsic(name, args, loc)?;
            self.stack.pop();
            return Ok(result);
        }
        Ok(value)
    }

    /// `.callcc`: pops its own call layer, deep-copies the remaining stack
    /// into a [`Continuation`](ValueData::Continuation), then pushes a
    /// closure-call layer that binds the continuation as the closure's sole
    /// parameter. The early pop skips the generic post-intrinsic pop entirely.
    fn call_callcc(&mut self, args: Vec<Value>, loc: SourceLocation) -> ArbResult<()> {
        let [v] = args_n(&args).ok_or_else(|| ArbError::runtime(Some(loc), "wrong number/type of arguments given to .callcc"))?;
        let ValueData::Closure { .. } = &v.data else {
            return Err(ArbError::runtime(Some(loc), "wrong number/type of arguments given to .callcc"));
        };
        let closure = v.clone();
        self.stack.pop();
        let captured = CapturedStack(Rc::new(RefCell::new(clone_stack(&self.stack))));
        self.tracer.on_continuation_captured();
        let cont = ValueBox::continuation(captured);
        let ValueData::Closure { env: cenv, fun } = &closure.data else { unreachable!() };
        let Expr::Lambda { params, body, .. } = fun.as_ref() else {
            return Err(ArbError::internal("closure's fun is not a Lambda node"));
        };
        let param = params
            .first()
            .ok_or_else(|| ArbError::runtime(Some(loc), "the closure given to .callcc takes no parameters"))?;
        let addr = self.bind_location(cont);
        let mut new_env = cenv.borrow().clone();
        new_env.push((param.clone(), addr));
        self.stack.push(Layer::new_frame(new_env, Rc::clone(body)));
        Ok(())
    }

    fn step_closure_call(
        &mut self,
        idx: usize,
        callee: &Rc<Expr>,
        args_ast: &[Rc<Expr>],
        loc: SourceLocation,
        value: Value,
    ) -> ArbResult<Value> {
        let pc = self.stack[idx].pc;
        if pc == 0 {
            let env = self.stack[idx].env.clone();
            self.stack.push(Layer::new(env, Rc::clone(callee), false));
            self.stack[idx].pc += 1;
        } else if pc == 1 {
            self.stack[idx].local.callee = Some(value.clone());
            self.stack[idx].pc += 1;
        } else if pc - 1 <= args_ast.len() {
            if pc - 1 > 1 {
                self.stack[idx].local.args.push(value);
            }
            let env = self.stack[idx].env.clone();
            self.stack.push(Layer::new(env, Rc::clone(&args_ast[pc - 2]), false));
            self.stack[idx].pc += 1;
        } else if pc - 1 == args_ast.len() + 1 {
            if pc - 1 > 1 {
                self.stack[idx].local.args.push(value);
            }
            let callee_val = self.stack[idx].local.callee.clone().expect("callee evaluated before args");
            let args = self.stack[idx].local.args.clone();
            match &callee_val.data {
                ValueData::Closure { env: cenv, fun } => {
                    let Expr::Lambda { params, body, .. } = fun.as_ref() else {
                        return Err(ArbError::internal("closure's fun is not a Lambda node"));
                    };
                    if args.len() != params.len() {
                        return Err(ArbError::runtime(Some(loc), format!("wrong number of arguments given to {callee}")));
                    }
                    let mut new_env = cenv.borrow().clone();
                    for (param, arg) in params.iter().zip(args.into_iter()) {
                        let addr = self.bind_location(arg);
                        new_env.push((param.clone(), addr));
                    }
                    self.stack.push(Layer::new_frame(new_env, Rc::clone(body)));
                    self.stack[idx].pc += 1;
                }
                ValueData::Continuation { stack: CapturedStack(captured) } => {
                    if args.len() != 1 {
                        return Err(ArbError::runtime(Some(loc), format!("wrong number of arguments given to {callee}")));
                    }
                    self.tracer.on_continuation_applied();
                    self.stack = clone_stack(&captured.borrow());
                    return Ok(args.into_iter().next().unwrap());
                }
                _ => {
                    return Err(ArbError::runtime(Some(loc), format!("{callee} (whose evaluation result is {callee_val}) is not callable")));
                }
            }
        } else {
            self.stack.pop();
        }
        Ok(value)
    }

    /// Reuses a value's own store location if it already has one, else
    /// allocates a fresh cell.
    fn bind_location(&mut self, value: Value) -> Location {
        value.location.get().unwrap_or_else(|| self.alloc(value))
    }

    fn call_intrinsic(&mut self, name: &str, args: Vec<Value>, loc: SourceLocation) -> ArbResult<Value> {
        let wrong_args = || ArbError::runtime(Some(loc), format!("wrong number/type of arguments given to {name}"));
        let ints = |args: &[Value]| -> ArbResult<(i64, i64)> {
            match (args.first().and_then(|v| v.as_integer()), args.get(1).and_then(|v| v.as_integer())) {
                (Some(a), Some(b)) if args.len() == 2 => Ok((a, b)),
                _ => Err(wrong_args()),
            }
        };
        let strs2 = |args: &[Value]| -> ArbResult<(String, String)> {
            match (args.first().and_then(|v| v.as_str()), args.get(1).and_then(|v| v.as_str())) {
                (Some(a), Some(b)) if args.len() == 2 => Ok((a.to_string(), b.to_string())),
                _ => Err(wrong_args()),
            }
        };
        match name {
            ".void" => {
                if !args.is_empty() {
                    return Err(wrong_args());
                }
                Ok(ValueBox::void())
            }
            ".add" => {
                let (a, b) = ints(&args)?;
                Ok(ValueBox::integer(a + b))
            }
            ".sub" => {
                let (a, b) = ints(&args)?;
                Ok(ValueBox::integer(a - b))
            }
            ".mul" => {
                let (a, b) = ints(&args)?;
                Ok(ValueBox::integer(a * b))
            }
            ".div" => {
                let (a, b) = ints(&args)?;
                if b == 0 {
                    return Err(ArbError::runtime(Some(loc), "division by zero in .div"));
                }
                Ok(ValueBox::integer(floor_div(a, b)))
            }
            ".mod" => {
                let (a, b) = ints(&args)?;
                if b == 0 {
                    return Err(ArbError::runtime(Some(loc), "division by zero in .mod"));
                }
                Ok(ValueBox::integer(floor_mod(a, b)))
            }
            ".lt" => {
                let (a, b) = ints(&args)?;
                Ok(ValueBox::integer(i64::from(a < b)))
            }
            ".strlen" => {
                let [v] = args_n(&args).ok_or_else(wrong_args)?;
                let s = v.as_str().ok_or_else(wrong_args)?;
                Ok(ValueBox::integer(s.chars().count() as i64))
            }
            ".strcut" => {
                if args.len() != 3 {
                    return Err(wrong_args());
                }
                let s = args[0].as_str().ok_or_else(wrong_args)?;
                let start = args[1].as_integer().ok_or_else(wrong_args)?;
                let end = args[2].as_integer().ok_or_else(wrong_args)?;
                let chars: Vec<char> = s.chars().collect();
                let len = chars.len() as i64;
                let start = python_slice_index(start, len);
                let end = python_slice_index(end, len).max(start);
                Ok(ValueBox::string(chars[start..end].iter().collect()))
            }
            ".strcat" => {
                let (a, b) = strs2(&args)?;
                Ok(ValueBox::string(a + &b))
            }
            ".strlt" => {
                let (a, b) = strs2(&args)?;
                Ok(ValueBox::integer(i64::from(a < b)))
            }
            ".strint" => {
                let [v] = args_n(&args).ok_or_else(wrong_args)?;
                let s = v.as_str().ok_or_else(wrong_args)?;
                let n = s.trim().parse::<i64>().map_err(|_| ArbError::runtime(Some(loc), format!("malformed integer string {s:?} given to .strint")))?;
                Ok(ValueBox::integer(n))
            }
            ".strquote" => {
                let [v] = args_n(&args).ok_or_else(wrong_args)?;
                if v.as_str().is_none() {
                    return Err(wrong_args());
                }
                Ok(ValueBox::string(strquote(v)))
            }
            ".getline" => {
                if !args.is_empty() {
                    return Err(wrong_args());
                }
                match self.io.getline().map_err(|e| ArbError::internal(e.to_string()))? {
                    Some(line) => Ok(ValueBox::string(line)),
                    None => Ok(ValueBox::void()),
                }
            }
            ".put" => {
                if args.is_empty() {
                    return Err(wrong_args());
                }
                let mut out = String::new();
                for v in &args {
                    out.push_str(&v.to_string());
                }
                self.io.put(&out).map_err(|e| ArbError::internal(e.to_string()))?;
                Ok(ValueBox::void())
            }
            ".isvoid" => {
                let [v] = args_n(&args).ok_or_else(wrong_args)?;
                Ok(ValueBox::integer(i64::from(matches!(v.data, ValueData::Void))))
            }
            ".isint" => {
                let [v] = args_n(&args).ok_or_else(wrong_args)?;
                Ok(ValueBox::integer(i64::from(matches!(v.data, ValueData::Integer(_)))))
            }
            ".isstr" => {
                let [v] = args_n(&args).ok_or_else(wrong_args)?;
                Ok(ValueBox::integer(i64::from(matches!(v.data, ValueData::Str(_)))))
            }
            ".isclo" => {
                let [v] = args_n(&args).ok_or_else(wrong_args)?;
                Ok(ValueBox::integer(i64::from(matches!(v.data, ValueData::Closure { .. }))))
            }
            ".iscont" => {
                let [v] = args_n(&args).ok_or_else(wrong_args)?;
                Ok(ValueBox::integer(i64::from(matches!(v.data, ValueData::Continuation { .. }))))
            }
            ".eval" => {
                let [v] = args_n(&args).ok_or_else(wrong_args)?;
                let source = v.as_str().ok_or_else(wrong_args)?;
                self.tracer.on_eval_nested_start();
                let result = crate::run_source(source, self.store.config, self.tracer, self.io);
                self.tracer.on_eval_nested_stop();
                result
            }
            ".exit" => {
                if !args.is_empty() {
                    return Err(wrong_args());
                }
                self.tracer.on_exit_called();
                Err(ArbError::Exit)
            }
            other => Err(ArbError::internal(format!("unrecognized intrinsic {other}"))),
        }
    }
}

/// Resolves a `.strcut` bound the way Python's `str[start:end]` does: a
/// negative index counts from the end of the string before clamping to
/// `[0, len]`, matching `original_source`'s `args[0].value[start:end]` slice.
fn python_slice_index(i: i64, len: i64) -> usize {
    let i = if i < 0 { i + len } else { i };
    i.clamp(0, len) as usize
}

/// Floor division (rounds toward negative infinity), matching Python `//`.
/// `div_euclid` is the wrong tool here: it rounds toward the *remainder being
/// non-negative*, which agrees with floor only when `b > 0` (e.g.
/// `(.div 7 -2)` must be `-4`, not the `-3` euclidean division gives).
fn floor_div(a: i64, b: i64) -> i64 {
    let (q, r) = (a / b, a % b);
    if r != 0 && (r < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}

/// Floor modulo, matching Python `%`: the result always has the same sign
/// as `b` (or is zero), unlike `%`'s sign-of-dividend and `rem_euclid`'s
/// always-non-negative results.
fn floor_mod(a: i64, b: i64) -> i64 {
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        r + b
    } else {
        r
    }
}

fn args_n<const N: usize>(args: &[Value]) -> Option<[&Value; N]> {
    if args.len() != N {
        return None;
    }
    let mut out: [&Value; N] = [args.first()?; N];
    for (slot, v) in out.iter_mut().zip(args.iter()) {
        *slot = v;
    }
    Some(out)
}
