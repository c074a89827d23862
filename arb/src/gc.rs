//! Mark-sweep-compact garbage collection for [`Store`].
//!
//! Grounded on `original_source`'s `State.mark`/`sweep_and_compact`/
//! `relocate`: mark everything reachable from the value register and the
//! live evaluation stack, compact the store by moving live cells down,
//! then rewrite every location any closure or stack frame holds using the
//! resulting old -> new map.
//!
//! Like `original_source`, [`Layer::env`](crate::eval::Layer) is shared
//! (`Rc<RefCell<_>>`) across every non-frame sub-layer of a frame, so only
//! `layer.frame` layers need their locations marked and relocated — every
//! sub-layer reads through the same cell.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::eval::{Env, Layer};
use crate::heap::{Location, Store};
use crate::value::{CapturedStack, Value, ValueData};

struct Mark<'s> {
    store: &'s Store,
    locations: HashSet<usize>,
    closure_ptrs: HashSet<usize>,
    cont_ptrs: HashSet<usize>,
    closure_envs: Vec<Rc<RefCell<Env>>>,
    cont_stacks: Vec<Rc<RefCell<Vec<Layer>>>>,
}

impl<'s> Mark<'s> {
    fn new(store: &'s Store) -> Self {
        Self {
            store,
            locations: HashSet::new(),
            closure_ptrs: HashSet::new(),
            cont_ptrs: HashSet::new(),
            closure_envs: Vec::new(),
            cont_stacks: Vec::new(),
        }
    }

    fn value(&mut self, value: &Value) {
        match &value.data {
            ValueData::Closure { env, .. } => self.closure(env),
            ValueData::Continuation { stack } => self.captured_stack(stack),
            _ => {}
        }
    }

    fn closure(&mut self, env: &Rc<RefCell<Env>>) {
        let ptr = Rc::as_ptr(env) as usize;
        if self.closure_ptrs.insert(ptr) {
            self.closure_envs.push(Rc::clone(env));
            let locs: Vec<Location> = env.borrow().iter().map(|(_, l)| *l).collect();
            for loc in locs {
                self.location(loc);
            }
        }
    }

    fn captured_stack(&mut self, stack: &CapturedStack) {
        let ptr = Rc::as_ptr(&stack.0) as usize;
        if self.cont_ptrs.insert(ptr) {
            self.cont_stacks.push(Rc::clone(&stack.0));
            let layers = stack.0.borrow().clone();
            self.layers(&layers);
        }
    }

    fn layers(&mut self, layers: &[Layer]) {
        for layer in layers {
            if layer.frame {
                let locs: Vec<Location> = layer.env.borrow().iter().map(|(_, l)| *l).collect();
                for loc in locs {
                    self.location(loc);
                }
            }
            if let Some(callee) = &layer.local.callee {
                self.value(callee);
            }
            for arg in &layer.local.args {
                self.value(arg);
            }
        }
    }

    fn location(&mut self, loc: Location) {
        if self.locations.insert(loc.0) {
            if let Some(Some(value)) = self.store.raw_cells().get(loc.0) {
                let value = Rc::clone(value);
                self.value(&value);
            }
        }
    }
}

/// Runs one mark-sweep-compact cycle. Returns the number of cells reclaimed.
pub fn collect(store: &mut Store, value_register: &Value, stack: &mut Vec<Layer>) -> usize {
    let mut mark = Mark::new(store);
    mark.value(value_register);
    mark.layers(stack);

    let before = store.used();
    let relocation = sweep_and_compact(store, &mark.locations);
    let removed = before.saturating_sub(relocation.len());

    for layer in stack.iter_mut() {
        if layer.frame {
            relocate_env(&mut layer.env.borrow_mut(), &relocation);
        }
    }
    for env in &mark.closure_envs {
        relocate_env(&mut env.borrow_mut(), &relocation);
    }
    for cs in &mark.cont_stacks {
        for layer in cs.borrow_mut().iter_mut() {
            if layer.frame {
                relocate_env(&mut layer.env.borrow_mut(), &relocation);
            }
        }
    }

    removed
}

fn relocate_env(env: &mut Env, relocation: &HashMap<usize, usize>) {
    for (_, loc) in env.iter_mut() {
        if let Some(&new) = relocation.get(&loc.0) {
            *loc = Location(new);
        }
    }
}

/// Moves every cell reachable per `visited` down to a contiguous prefix, in
/// original order, and returns the old -> new location map. Unreachable
/// cells are dropped (their `Rc<ValueBox>` refcount falls, freeing the
/// allocation once nothing else aliases it).
fn sweep_and_compact(store: &mut Store, visited: &HashSet<usize>) -> HashMap<usize, usize> {
    let cells = store.raw_cells_mut();
    let mut relocation = HashMap::new();
    let mut write = 0;
    for read in 0..cells.len() {
        if visited.contains(&read) {
            let value = cells[read].take();
            if let Some(value) = &value {
                value.location.set(Some(Location(write)));
            }
            cells[write] = value;
            relocation.insert(read, write);
            write += 1;
        }
    }
    cells.truncate(write);
    relocation
}
