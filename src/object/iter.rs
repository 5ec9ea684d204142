//! Iterator state for `foreach`.

use std::cell::RefCell;
use std::rc::Rc;

use super::value::Value;

/// What an iterator walks over.
pub enum IterSource {
    /// Live list; growth during iteration is observed.
    List(Rc<RefCell<Vec<Value>>>),
    /// Snapshot of tuple items, string characters or hash keys.
    Items(Vec<Value>),
    /// `range(start, end, step)`, produced on demand.
    Range { start: i64, end: i64, step: i64 },
    /// A user object implementing `_iterMoveNext` and `_iterGetCurrent`.
    Object(Value),
}

pub struct IterState {
    pub source: IterSource,
    index: usize,
    current: Value,
}

impl IterState {
    pub fn new(source: IterSource) -> Self {
        Self {
            source,
            index: 0,
            current: Value::Null,
        }
    }

    /// The user object behind this iterator, if it is not a builtin sequence.
    pub fn object(&self) -> Option<Value> {
        match &self.source {
            IterSource::Object(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Advance a builtin iterator. Returns `None` for user objects, which the
    /// VM advances by calling `_iterMoveNext`.
    pub fn move_next(&mut self) -> Option<bool> {
        let next = match &self.source {
            IterSource::List(items) => items.borrow().get(self.index).cloned(),
            IterSource::Items(items) => items.get(self.index).cloned(),
            IterSource::Range { start, end, step } => {
                range_item(*start, *end, *step, self.index).map(Value::Int)
            }
            IterSource::Object(_) => return None,
        };
        match next {
            Some(value) => {
                self.current = value;
                self.index += 1;
                Some(true)
            }
            None => Some(false),
        }
    }

    pub fn current(&self) -> Value {
        self.current.clone()
    }

    pub fn reset(&mut self) {
        self.index = 0;
        self.current = Value::Null;
    }
}

/// The `index`th value of a range, or `None` once it has passed `end` or
/// would overflow.
fn range_item(start: i64, end: i64, step: i64, index: usize) -> Option<i64> {
    let offset = i64::try_from(index).ok()?.checked_mul(step)?;
    let value = start.checked_add(offset)?;
    let inside = if step > 0 { value < end } else { value > end };
    inside.then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_iteration_sees_appends() {
        let items = Rc::new(RefCell::new(vec![Value::Int(1)]));
        let mut iter = IterState::new(IterSource::List(items.clone()));
        assert_eq!(iter.move_next(), Some(true));
        assert_eq!(iter.current(), Value::Int(1));
        items.borrow_mut().push(Value::Int(2));
        assert_eq!(iter.move_next(), Some(true));
        assert_eq!(iter.current(), Value::Int(2));
        assert_eq!(iter.move_next(), Some(false));

        iter.reset();
        assert_eq!(iter.move_next(), Some(true));
        assert_eq!(iter.current(), Value::Int(1));
    }

    #[test]
    fn test_range_is_produced_on_demand() {
        let mut iter = IterState::new(IterSource::Range {
            start: 0,
            end: 1 << 40,
            step: 1 << 39,
        });
        assert_eq!(iter.move_next(), Some(true));
        assert_eq!(iter.current(), Value::Int(0));
        assert_eq!(iter.move_next(), Some(true));
        assert_eq!(iter.current(), Value::Int(1 << 39));
        assert_eq!(iter.move_next(), Some(false));

        let mut down = IterState::new(IterSource::Range {
            start: i64::MIN + 1,
            end: i64::MIN,
            step: -2,
        });
        assert_eq!(down.move_next(), Some(true));
        assert_eq!(down.move_next(), Some(false));
    }

    #[test]
    fn test_object_iterators_defer_to_the_vm() {
        let mut iter = IterState::new(IterSource::Object(Value::Null));
        assert_eq!(iter.move_next(), None);
        assert!(iter.object().is_some());
    }
}
