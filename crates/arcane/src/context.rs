//! Interpreter state of one run.
//!
//! Everything a run mutates lives in [`Interpreter`]: the composite store, the
//! scope stack, the control-transfer frames, preferences and reports. Every
//! push onto a stack is paired with a pop on all exit paths.

use crate::ast::Node;
use crate::composite::{CompositeId, Store};
use crate::control::ControlStack;
use crate::preferences::Preferences;
use crate::report::{Level, Location, Report, Reports, Token};
use crate::resolve::Resolver;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScopeEntry {
    pub namespace: CompositeId,
    /// Function whose call opened the scope.
    pub function: Option<CompositeId>,
    /// Location of the call.
    pub location: Option<Location>,
}

impl ScopeEntry {
    pub fn namespace(namespace: CompositeId) -> Self {
        Self {
            namespace,
            function: None,
            location: None,
        }
    }
}

#[derive(Debug)]
pub struct Interpreter {
    pub(crate) store: Store,
    pub(crate) scopes: Vec<ScopeEntry>,
    pub(crate) control: ControlStack,
    pub(crate) preferences: Preferences,
    pub(crate) reports: Reports,
    pub(crate) tokens: Vec<Token>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Preferences::default())
    }
}

impl Interpreter {
    pub fn new(preferences: Preferences) -> Self {
        Self::with_store(Store::new(), preferences)
    }

    /// Interpreter seeded with composites of a previous run.
    pub fn with_store(store: Store, preferences: Preferences) -> Self {
        let reports = Reports::new(preferences.allowed_report_level);
        Self {
            store,
            scopes: Vec::new(),
            control: ControlStack::default(),
            preferences,
            reports,
            tokens: Vec::new(),
        }
    }

    /// Clears all run state, keeping preferences.
    pub fn reset(&mut self) {
        self.store = Store::new();
        self.scopes.clear();
        self.control.clear();
        self.reports = Reports::new(self.preferences.allowed_report_level);
        self.tokens.clear();
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn reports(&self) -> &[Report] {
        self.reports.entries()
    }

    pub fn scopes(&self) -> &[ScopeEntry] {
        &self.scopes
    }

    pub fn control(&self) -> &ControlStack {
        &self.control
    }

    pub fn into_parts(self) -> (Store, Vec<Report>) {
        (self.store, self.reports.into_entries())
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.store, self.preferences.structural_type_checking)
    }

    /// The root namespace (slot 0).
    pub fn global(&self) -> Option<CompositeId> {
        self.store.id_at(0)
    }

    // --- Scopes ---

    pub fn top_scope(&self) -> Option<CompositeId> {
        self.scopes.last().map(|entry| entry.namespace)
    }

    pub fn push_scope(&mut self, entry: ScopeEntry) {
        self.scopes.push(entry);
    }

    /// Pops the top scope; with `destroy` its namespace is collected when no
    /// longer retained.
    pub fn pop_scope(&mut self, destroy: bool) {
        if let Some(entry) = self.scopes.pop()
            && destroy
        {
            self.destroy_if_released(entry.namespace);
        }
    }

    pub fn with_scope<T>(
        &mut self,
        entry: ScopeEntry,
        destroy: bool,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        self.push_scope(entry);
        let result = f(self);
        self.pop_scope(destroy);
        result
    }

    /// Number of active function calls.
    pub fn call_depth(&self) -> usize {
        self.scopes.iter().filter(|entry| entry.function.is_some()).count()
    }

    // --- Reports ---

    pub fn location_of(&self, node: &Node) -> Location {
        self.tokens
            .get(node.range.start)
            .map(|token| token.location)
            .unwrap_or_default()
    }

    /// Records a diagnostic attributed to `node`.
    pub fn report(&mut self, level: Level, node: Option<&Node>, message: &str) {
        let (position, location, string) = match node {
            Some(node) => (
                node.range.start,
                self.location_of(node),
                format!("{} -> {message}", node.type_name()),
            ),
            None => (0, Location::default(), message.to_string()),
        };
        self.reports.push(level, position, location, string);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Range, NodeKind};

    #[test]
    fn reports_use_token_locations() {
        let mut interpreter = Interpreter::default();
        interpreter.tokens = vec![
            Token::default(),
            Token {
                position: 1,
                location: Location { line: 2, column: 5 },
                ..Token::default()
            },
        ];
        let node = Node {
            range: Range { start: 1, end: 1 },
            kind: NodeKind::NilLiteral,
        };

        interpreter.report(Level::Warning, Some(&node), "Something.");

        let report = &interpreter.reports()[0];
        assert_eq!(report.location, Some(Location { line: 2, column: 5 }));
        assert_eq!(report.string, "nilLiteral -> Something.");
    }

    #[test]
    fn with_scope_pops_on_return() {
        let mut interpreter = Interpreter::default();
        let global = interpreter.create_namespace(Some("Global"), None, crate::graph::Levels::Own);

        let depth = interpreter.with_scope(ScopeEntry::namespace(global), false, |interpreter| {
            interpreter.scopes().len()
        });

        assert_eq!(depth, 1);
        assert!(interpreter.scopes().is_empty());
        assert!(interpreter.store().is_valid(global));
    }
}
