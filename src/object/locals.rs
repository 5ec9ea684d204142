//! Local variable storage shared between frames and the lambdas they create.

use std::cell::RefCell;
use std::ops::Range;
use std::rc::Rc;

use super::value::Value;

/// Slot storage for one running method.
///
/// A plain call owns a single flat array. Calling a lambda stacks a fresh
/// layer over the locals it captured, covering only the slots the lambda
/// allocates itself, so recursive and re-entrant calls never see each other's
/// parameters while writes to captured slots still reach the creator.
#[derive(Clone)]
pub struct Locals {
    base: Rc<RefCell<Vec<Value>>>,
    layers: Vec<Layer>,
}

#[derive(Clone)]
struct Layer {
    slots: Range<usize>,
    values: Rc<RefCell<Vec<Value>>>,
}

impl Locals {
    pub fn new(count: usize) -> Self {
        Self {
            base: Rc::new(RefCell::new(vec![Value::Null; count])),
            layers: Vec::new(),
        }
    }

    /// Storage for one call of a lambda that owns `slots`, layered over these
    /// captured locals.
    pub fn enter(&self, slots: Range<usize>) -> Self {
        let mut layers = self.layers.clone();
        layers.push(Layer {
            values: Rc::new(RefCell::new(vec![Value::Null; slots.len()])),
            slots,
        });
        Self {
            base: self.base.clone(),
            layers,
        }
    }

    fn storage(&self, slot: usize) -> (&RefCell<Vec<Value>>, usize) {
        self.layers
            .iter()
            .rev()
            .find(|layer| layer.slots.contains(&slot))
            .map(|layer| (&*layer.values, slot - layer.slots.start))
            .unwrap_or((&*self.base, slot))
    }

    pub fn get(&self, slot: usize) -> Value {
        let (values, index) = self.storage(slot);
        let values = values.borrow();
        values.get(index).cloned().unwrap_or(Value::Null)
    }

    pub fn set(&self, slot: usize, value: Value) {
        let (values, index) = self.storage(slot);
        let mut values = values.borrow_mut();
        if index >= values.len() {
            values.resize(index + 1, Value::Null);
        }
        values[index] = value;
    }
}
