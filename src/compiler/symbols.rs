//! Lexical scopes and local slot allocation.
//!
//! The analyser records every scope it opens; the compiler then replays the
//! same sequence with [`SymbolTable::next_scope`] so both passes resolve
//! identifiers against identical scope chains.

use std::ops::Range;

use indexmap::IndexMap;

/// One lexical scope.
#[derive(Debug)]
pub struct Scope {
    pub symbols: IndexMap<String, usize>,
    pub parent: Option<usize>,
    /// Lookups do not continue past a function boundary.
    pub function_boundary: bool,
    /// Nearest enclosing function-boundary scope, which owns the slot counter.
    root: usize,
    next_slot: usize,
    /// Slots allocated from the root counter while this scope was open.
    slots: Range<usize>,
}

impl Scope {
    fn new(parent: Option<usize>, function_boundary: bool, root: usize, first_slot: usize) -> Self {
        Self {
            symbols: IndexMap::new(),
            parent,
            function_boundary,
            root,
            next_slot: 0,
            slots: first_slot..first_slot,
        }
    }
}

/// Flat arena of scopes in the order they were opened.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    current: usize,
    /// Next recorded scope to hand out during replay.
    cursor: usize,
}

impl SymbolTable {
    /// A table holding only the module root scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new(None, true, 0, 0)],
            current: 0,
            cursor: 1,
        }
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    pub fn current_scope(&self) -> usize {
        self.current
    }

    pub fn is_root(&self) -> bool {
        self.current == 0
    }

    // ===== Recording =====

    /// Open a new scope nested in the current one.
    pub fn begin_scope(&mut self, function_boundary: bool) -> usize {
        let index = self.scopes.len();
        let (root, first_slot) = if function_boundary {
            (index, 0)
        } else {
            let root = self.scopes[self.current].root;
            (root, self.scopes[root].next_slot)
        };
        self.scopes.push(Scope::new(
            Some(self.current),
            function_boundary,
            root,
            first_slot,
        ));
        self.current = index;
        self.cursor = self.scopes.len();
        index
    }

    /// Close the current scope.
    ///
    /// # Panics
    ///
    /// When closing the module root or when `function_boundary` does not match
    /// the kind the scope was opened with.
    pub fn end_scope(&mut self, function_boundary: bool) {
        let scope = &self.scopes[self.current];
        assert_eq!(
            scope.function_boundary, function_boundary,
            "scope {} closed with the wrong kind",
            self.current
        );
        let parent = scope.parent.expect("the module scope cannot be closed");
        let end = self.scopes[scope.root].next_slot;
        self.scopes[self.current].slots.end = end;
        self.current = parent;
    }

    /// Bind `name` in the current scope. Rebinding returns the existing slot.
    pub fn add_symbol(&mut self, name: &str) -> usize {
        if let Some(slot) = self.scopes[self.current].symbols.get(name) {
            return *slot;
        }
        let root = self.scopes[self.current].root;
        let slot = self.scopes[root].next_slot;
        self.scopes[root].next_slot += 1;
        self.scopes[self.current]
            .symbols
            .insert(name.to_string(), slot);
        slot
    }

    /// Resolve `name` from the current scope outwards, stopping after the
    /// first function boundary.
    pub fn lookup(&self, name: &str) -> Option<usize> {
        let mut index = self.current;
        loop {
            let scope = &self.scopes[index];
            if let Some(slot) = scope.symbols.get(name) {
                return Some(*slot);
            }
            if scope.function_boundary {
                return None;
            }
            index = scope.parent?;
        }
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Slots allocated so far by the function that owns the current scope.
    pub fn local_count(&self) -> usize {
        let root = self.scopes[self.current].root;
        self.scopes[root].next_slot
    }

    /// Slots allocated while the current scope and its nested scopes were
    /// open. Only complete once the scope has been recorded and closed.
    pub fn slot_range(&self) -> Range<usize> {
        self.scopes[self.current].slots.clone()
    }

    // ===== Replay =====

    /// Rewind to the module root before replaying.
    pub fn reset(&mut self) {
        self.current = 0;
        self.cursor = 1;
    }

    /// Enter the next recorded scope.
    ///
    /// # Panics
    ///
    /// When the replay diverges from the recorded order.
    pub fn next_scope(&mut self) -> usize {
        let index = self.cursor;
        assert!(
            index < self.scopes.len(),
            "scope replay ran past the {} recorded scopes",
            self.scopes.len()
        );
        assert_eq!(
            self.scopes[index].parent,
            Some(self.current),
            "scope replay diverged at scope {}",
            index
        );
        self.current = index;
        self.cursor += 1;
        index
    }

    /// Return to the parent of the replayed scope.
    pub fn leave_scope(&mut self) {
        self.current = self.scopes[self.current]
            .parent
            .expect("the module scope cannot be left");
    }

    /// # Panics
    ///
    /// Unless every recorded scope was replayed and closed.
    pub fn finish_replay(&self) {
        assert_eq!(
            self.cursor,
            self.scopes.len(),
            "only {} of {} scopes were replayed",
            self.cursor,
            self.scopes.len()
        );
        assert_eq!(self.current, 0, "replay finished inside scope {}", self.current);
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_binding_wins() {
        let mut table = SymbolTable::new();
        table.begin_scope(true);
        let a = table.add_symbol("a");
        let b = table.add_symbol("b");
        assert_eq!(table.add_symbol("a"), a);
        assert_ne!(a, b);
        assert_eq!(table.local_count(), 2);
    }

    #[test]
    fn test_function_boundary_hides_outer_locals() {
        let mut table = SymbolTable::new();
        table.begin_scope(true);
        table.add_symbol("outer");
        table.begin_scope(false);
        assert!(table.is_defined("outer"));
        table.end_scope(false);
        table.begin_scope(true);
        assert!(!table.is_defined("outer"));
        table.end_scope(true);
        table.end_scope(true);
    }

    #[test]
    fn test_nested_scopes_share_the_function_counter() {
        let mut table = SymbolTable::new();
        table.begin_scope(true);
        let x = table.add_symbol("x");
        table.begin_scope(false);
        let item = table.add_symbol("item");
        table.end_scope(false);
        table.begin_scope(false);
        let e = table.add_symbol("e");
        assert_eq!((x, item, e), (0, 1, 2));
        assert_eq!(table.local_count(), 3);
    }

    #[test]
    fn test_lambda_scope_records_its_slot_range() {
        let mut table = SymbolTable::new();
        table.begin_scope(true);
        table.add_symbol("f");
        table.begin_scope(false);
        table.add_symbol("n");
        table.begin_scope(false);
        table.add_symbol("i");
        table.end_scope(false);
        table.end_scope(false);
        table.add_symbol("after");
        table.end_scope(true);

        table.reset();
        table.next_scope();
        table.next_scope();
        assert_eq!(table.slot_range(), 1..3);
        table.next_scope();
        assert_eq!(table.slot_range(), 2..3);
        table.leave_scope();
        table.leave_scope();
        assert_eq!(table.local_count(), 4);
        table.leave_scope();
        table.finish_replay();
    }

    #[test]
    fn test_replay_resolves_the_same_slots() {
        let mut table = SymbolTable::new();
        table.begin_scope(true);
        table.add_symbol("a");
        table.begin_scope(false);
        table.add_symbol("b");
        table.end_scope(false);
        table.end_scope(true);

        table.reset();
        table.next_scope();
        assert_eq!(table.lookup("a"), Some(0));
        assert_eq!(table.lookup("b"), None);
        table.next_scope();
        assert_eq!(table.lookup("b"), Some(1));
        table.leave_scope();
        table.leave_scope();
        table.finish_replay();
    }

    #[test]
    #[should_panic(expected = "diverged")]
    fn test_replay_divergence_panics() {
        let mut table = SymbolTable::new();
        table.begin_scope(true);
        table.end_scope(true);
        table.begin_scope(true);
        table.begin_scope(false);
        table.end_scope(false);
        table.end_scope(true);

        table.reset();
        table.next_scope();
        // Scope 2 is a sibling of scope 1, not its child.
        table.next_scope();
    }

    #[test]
    #[should_panic(expected = "replayed")]
    fn test_incomplete_replay_panics() {
        let mut table = SymbolTable::new();
        table.begin_scope(true);
        table.end_scope(true);
        table.reset();
        table.finish_replay();
    }

    #[test]
    #[should_panic(expected = "wrong kind")]
    fn test_mismatched_end_scope_panics() {
        let mut table = SymbolTable::new();
        table.begin_scope(false);
        table.end_scope(true);
    }
}
