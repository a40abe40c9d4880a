//! Automatic reference counting over the composite graph.
//!
//! Edges are stored backwards: every composite lists its `retainers`. A
//! composite stays alive while it is *significantly retained*, i.e. reachable
//! through retainer edges from the root namespace, from the namespace on top
//! of the scope stack, or from a composite held by an active control transfer.
//! Collection is event driven: every release re-checks its target.

use rustc_hash::FxHashSet;

use crate::composite::{CompositeId, Kind, Observer, Slot};
use crate::context::Interpreter;
use crate::control::{ControlTransfer, TransferKind};
use crate::report::Level;
use crate::resolve::{Argument, Matching};
use crate::types::Type;
use crate::value::Value;

impl Interpreter {
    /// Ground truth: `retaining` references `retained` through a slot, its
    /// type, imports, members or observers.
    pub fn retains(&self, retaining: CompositeId, retained: CompositeId) -> bool {
        self.store
            .get(retaining)
            .is_some_and(|composite| composite.is_alive() && composite.references().contains(&retained))
    }

    pub fn retain(&mut self, retaining: CompositeId, retained: CompositeId) {
        if retaining == retained {
            return;
        }
        if let Some(composite) = self.store.get_mut(retained)
            && !composite.ids.retainers.contains(&retaining)
        {
            composite.ids.retainers.push(retaining);
        }
    }

    pub fn release(&mut self, retaining: CompositeId, retained: CompositeId) {
        if retaining == retained {
            return;
        }
        let Some(composite) = self.store.get_mut(retained) else {
            return;
        };
        let before = composite.ids.retainers.len();
        composite.ids.retainers.retain(|id| *id != retaining);
        if composite.ids.retainers.len() != before {
            self.destroy_if_released(retained);
        }
    }

    /// Retains or releases depending on whether the edge still exists.
    pub fn retain_or_release(&mut self, retaining: CompositeId, retained: CompositeId) {
        if self.retains(retaining, retained) {
            self.retain(retaining, retained);
        } else {
            self.release(retaining, retained);
        }
    }

    /// Reconciles the edges that differ between two reference sets.
    pub(crate) fn reconcile(&mut self, retaining: CompositeId, old: &[CompositeId], new: &[CompositeId]) {
        let mut changed: Vec<CompositeId> = old
            .iter()
            .filter(|id| !new.contains(id))
            .chain(new.iter().filter(|id| !old.contains(id)))
            .copied()
            .collect();
        changed.sort();
        changed.dedup();
        // Fresh edges first so a composite moving between references survives.
        changed.sort_by_key(|id| !new.contains(id));
        for id in changed {
            self.retain_or_release(retaining, id);
        }
    }

    /// True when `target` is reachable from `root` by walking retainer edges.
    pub fn reachable(&self, root: CompositeId, target: CompositeId) -> bool {
        self.reaches_any(target, &[root])
    }

    /// Walks retainers outward from `target` looking for any of `roots`.
    /// Every composite is visited at most once.
    fn reaches_any(&self, target: CompositeId, roots: &[CompositeId]) -> bool {
        let mut visited = FxHashSet::default();
        let mut pending = vec![target];
        while let Some(id) = pending.pop() {
            if !visited.insert(id) {
                continue;
            }
            if roots.contains(&id) {
                return true;
            }
            if let Some(composite) = self.store.get(id) {
                pending.extend(composite.ids.retainers.iter().copied());
            }
        }
        false
    }

    /// Significant retainment: reachable from the root namespace, the top
    /// scope, or a composite held by an active control transfer.
    pub fn is_retained(&self, id: CompositeId) -> bool {
        let mut roots = self.control.composites();
        roots.extend(self.global());
        roots.extend(self.top_scope());
        self.reaches_any(id, &roots)
    }

    pub fn destroy_if_released(&mut self, id: CompositeId) {
        if self.store.is_valid(id) && !self.is_retained(id) {
            self.destroy(id);
        }
    }

    /// Replaces the current frame's transfer, collecting what only the
    /// displaced value kept alive.
    pub(crate) fn set_transfer(&mut self, value: Option<Value>, kind: Option<TransferKind>) {
        let displaced = self.control.set(value, kind);
        self.collect_transfer(displaced);
    }

    /// Clears the current frame's transfer.
    pub(crate) fn reset_transfer(&mut self) {
        let displaced = self.control.take();
        self.collect_transfer(displaced);
    }

    /// Re-checks the composites of a transfer that stopped being a root.
    pub(crate) fn collect_transfer(&mut self, transfer: Option<ControlTransfer>) {
        let Some(value) = transfer.and_then(|transfer| transfer.value) else {
            return;
        };
        let mut composites = Vec::new();
        value.collect_composites(&mut composites);
        for id in composites {
            self.destroy_if_released(id);
        }
    }

    /// Runs the deinitializer, releases everything the composite retains and
    /// removes it from the store. Idempotent.
    pub fn destroy(&mut self, id: CompositeId) {
        let Some(composite) = self.store.get_mut(id) else {
            return;
        };
        if !composite.is_alive() {
            return;
        }
        composite.life = crate::composite::Life::Destroyed;
        let is_object = composite.is(Kind::Object);
        log::debug!("Destroying composite {id} {}", composite.title());

        if is_object {
            self.run_deinitializer(id);
        }

        let retained: Vec<CompositeId> = self
            .store
            .iter()
            .filter(|(other, composite)| *other != id && composite.ids.retainers.contains(&id))
            .map(|(other, _)| other)
            .collect();
        for other in retained {
            self.release(id, other);
        }

        let Some(composite) = self.store.free(id) else {
            return;
        };
        let dangling = composite
            .ids
            .retainers
            .iter()
            .any(|retainer| self.store.get(*retainer).is_some_and(|c| c.is_alive()));
        if dangling {
            self.report(
                Level::Warning,
                None,
                &format!(
                    "Composite #{} was destroyed with a non-empty retainer list (either it was retained by its own non-significantly-retained composite(s) or something destroyed it forcibly).",
                    id.index
                ),
            );
        }
    }

    fn run_deinitializer(&mut self, object: CompositeId) {
        let arguments: [Argument; 0] = [];
        let deinitializer = self
            .resolver()
            .find_member_overload(object, "deinit", &Matching::Call(&arguments), true)
            .and_then(|resolved| resolved.matching);
        let Some(function) = deinitializer else {
            return;
        };

        self.control.push();
        let result = self.call_function(None, function, &[], Some(object), None);
        let transfer = self.control.pop();
        if result.is_err() || transfer.as_ref().is_some_and(ControlTransfer::is_explicit) {
            log::warn!("Deinitializer of composite {object} failed; destruction continues");
        }
        self.collect_transfer(transfer);
    }

    // --- Mutation sites ---

    /// Sets an identity slot. Assignments that would make the slot chain
    /// cyclic are rolled back (`self`/`Self` excepted).
    pub fn set_slot(&mut self, id: CompositeId, slot: Slot, value: Option<CompositeId>) {
        let Some(composite) = self.store.get_mut(id) else {
            return;
        };
        let old = composite.ids.get(slot);
        composite.ids.set(slot, value);

        if !matches!(slot, Slot::Current | Slot::CurrentType) && self.slot_chain_is_cyclic(id, slot) {
            if let Some(composite) = self.store.get_mut(id) {
                composite.ids.set(slot, old);
            }
            return;
        }

        if old != value {
            if let Some(old) = old {
                self.retain_or_release(id, old);
            }
            if let Some(value) = value {
                self.retain_or_release(id, value);
            }
        }
    }

    fn slot_chain_is_cyclic(&self, start: CompositeId, slot: Slot) -> bool {
        let mut visited = FxHashSet::default();
        let mut current = Some(start);
        while let Some(id) = current {
            if !visited.insert(id) {
                return true;
            }
            current = self.store.get(id).and_then(|composite| composite.ids.get(slot));
        }
        false
    }

    /// Replaces a composite's type, reconciling referenced composites.
    pub fn set_type(&mut self, id: CompositeId, type_: Type) {
        let Some(composite) = self.store.get_mut(id) else {
            return;
        };
        let old: Vec<CompositeId> = composite.type_.references().collect();
        let new: Vec<CompositeId> = type_.references().collect();
        composite.type_ = type_;
        self.reconcile(id, &old, &new);
    }

    pub fn set_import(&mut self, namespace: CompositeId, alias: &str, imported: CompositeId) {
        let Some(composite) = self.store.get_mut(namespace) else {
            return;
        };
        let old = composite.imports.insert(alias.to_string(), imported);
        self.reconcile(namespace, &old.into_iter().collect::<Vec<_>>(), &[imported]);
    }

    pub fn remove_import(&mut self, namespace: CompositeId, alias: &str) {
        let Some(composite) = self.store.get_mut(namespace) else {
            return;
        };
        if let Some(old) = composite.imports.shift_remove(alias) {
            self.retain_or_release(namespace, old);
        }
    }

    pub fn add_observer(&mut self, id: CompositeId, observer: Observer) {
        let Some(composite) = self.store.get_mut(id) else {
            return;
        };
        let function = observer.value;
        composite.observers.push(observer);
        self.retain_or_release(id, function);
    }

    pub fn remove_observer(&mut self, id: CompositeId, identifier: &str) {
        let Some(composite) = self.store.get_mut(id) else {
            return;
        };
        let removed: Vec<CompositeId> = composite
            .observers
            .iter()
            .filter(|observer| observer.identifier == identifier)
            .map(|observer| observer.value)
            .collect();
        composite.observers.retain(|observer| observer.identifier != identifier);
        for function in removed {
            self.retain_or_release(id, function);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::{Overload, Statements};
    use crate::context::ScopeEntry;
    use crate::graph::Levels;
    use crate::resolve::Placement;

    fn setup() -> (Interpreter, CompositeId) {
        let mut interpreter = Interpreter::default();
        let global = interpreter.create_namespace(Some("Global"), None, Levels::Own);
        interpreter.push_scope(ScopeEntry::namespace(global));
        (interpreter, global)
    }

    fn hold(interpreter: &mut Interpreter, holder: CompositeId, name: &str, held: Option<CompositeId>) {
        interpreter.set_member_overload(
            holder,
            name,
            Overload::new(Type::new(), held.map(Value::Reference)),
            Placement::Local,
        );
    }

    /// Every composite's retainers equal the set of composites retaining it.
    fn assert_symmetric(interpreter: &Interpreter) {
        for (id, composite) in interpreter.store().iter() {
            let mut expected: Vec<CompositeId> = interpreter
                .store()
                .iter()
                .filter(|(other, _)| *other != id && interpreter.retains(*other, id))
                .map(|(other, _)| other)
                .collect();
            let mut actual: Vec<CompositeId> = composite.ids.retainers.to_vec();
            expected.sort();
            actual.sort();
            assert_eq!(actual, expected, "retainers of {id}");
        }
    }

    #[test]
    fn release_destroys_unreachable() {
        let (mut interpreter, global) = setup();
        let a = interpreter.create_namespace(Some("A"), Some(global), Levels::Own);
        hold(&mut interpreter, global, "a", Some(a));
        assert!(interpreter.is_retained(a));

        hold(&mut interpreter, global, "a", None);
        assert!(!interpreter.store().is_valid(a));
        assert!(interpreter.reports().is_empty());
    }

    #[test]
    fn cycles_are_collected() {
        let (mut interpreter, global) = setup();
        let a = interpreter.create_namespace(Some("A"), Some(global), Levels::Own);
        let b = interpreter.create_namespace(Some("B"), Some(global), Levels::Own);
        hold(&mut interpreter, global, "a", Some(a));
        hold(&mut interpreter, a, "b", Some(b));
        hold(&mut interpreter, b, "a", Some(a));
        assert_symmetric(&interpreter);

        hold(&mut interpreter, global, "a", None);

        assert!(!interpreter.store().is_valid(a));
        assert!(!interpreter.store().is_valid(b));
        assert!(interpreter.reports().is_empty());
        assert_symmetric(&interpreter);
    }

    #[test]
    fn reachable_composites_survive_adversarial_cycles() {
        let (mut interpreter, global) = setup();
        let nodes: Vec<CompositeId> = (0..6)
            .map(|i| interpreter.create_namespace(Some(&format!("N{i}")), Some(global), Levels::Missing))
            .collect();
        hold(&mut interpreter, global, "entry", Some(nodes[0]));
        for (i, node) in nodes.iter().enumerate() {
            let next = nodes[(i + 1) % nodes.len()];
            let skip = nodes[(i + 3) % nodes.len()];
            hold(&mut interpreter, *node, "next", Some(next));
            hold(&mut interpreter, *node, "skip", Some(skip));
        }
        assert_symmetric(&interpreter);

        // Cutting single edges never collects anything still reachable.
        hold(&mut interpreter, nodes[2], "next", None);
        hold(&mut interpreter, nodes[4], "skip", None);
        for node in &nodes {
            assert_eq!(interpreter.store().is_valid(*node), interpreter.is_retained(*node));
        }
        assert!(nodes.iter().all(|node| interpreter.store().is_valid(*node)));
        assert_symmetric(&interpreter);

        hold(&mut interpreter, global, "entry", None);
        assert!(nodes.iter().all(|node| !interpreter.store().is_valid(*node)));
    }

    #[test]
    fn reachability_terminates_on_long_cycles() {
        let (mut interpreter, global) = setup();
        let ring: Vec<CompositeId> = (0..200)
            .map(|_| interpreter.create_namespace(None, Some(global), Levels::Missing))
            .collect();
        hold(&mut interpreter, global, "ring", Some(ring[0]));
        for (i, node) in ring.iter().enumerate() {
            hold(&mut interpreter, *node, "next", Some(ring[(i + 1) % ring.len()]));
        }

        assert!(interpreter.reachable(global, ring[150]));
        let stranger = interpreter.create_namespace(None, None, Levels::Missing);
        assert!(!interpreter.reachable(stranger, ring[150]));
    }

    #[test]
    fn control_transfer_values_are_roots() {
        let (mut interpreter, global) = setup();
        interpreter.control.push();
        let a = interpreter.create_namespace(Some("A"), Some(global), Levels::Own);
        interpreter.control.set(Some(Value::Reference(a)), Some(TransferKind::Return));

        interpreter.destroy_if_released(a);
        assert!(interpreter.store().is_valid(a));

        interpreter.control.pop();
        interpreter.destroy_if_released(a);
        assert!(!interpreter.store().is_valid(a));
    }

    #[test]
    fn displaced_transfer_values_are_collected() {
        let (mut interpreter, global) = setup();
        interpreter.control.push();
        let a = interpreter.create_namespace(Some("A"), Some(global), Levels::Own);
        let b = interpreter.create_namespace(Some("B"), Some(global), Levels::Own);
        interpreter.set_transfer(Some(Value::Reference(a)), None);
        interpreter.set_transfer(Some(Value::Reference(b)), None);

        assert!(!interpreter.store().is_valid(a));
        assert!(interpreter.store().is_valid(b));

        interpreter.reset_transfer();
        assert!(!interpreter.store().is_valid(b));
    }

    #[test]
    fn releasing_a_super_link_spares_imported_helpers() {
        let (mut interpreter, global) = setup();
        let helper = interpreter.create_namespace(Some("H"), Some(global), Levels::Own);
        interpreter.set_import(global, "H", helper);
        let base = interpreter.create_class(Some("Base"), Some(global));
        let derived = interpreter.create_class(Some("Derived"), Some(global));
        hold(&mut interpreter, global, "Base", Some(base));
        hold(&mut interpreter, global, "Derived", Some(derived));

        let object = interpreter.create_object(None, derived, None);
        let super_object = interpreter.create_object(None, base, Some(object));
        interpreter.set_super_levels(object, Some(super_object));
        hold(&mut interpreter, super_object, "helper", Some(helper));
        hold(&mut interpreter, global, "object", Some(object));
        assert_symmetric(&interpreter);

        interpreter.set_super_levels(object, None);

        assert!(!interpreter.store().is_valid(super_object));
        assert!(interpreter.store().is_valid(object));
        assert!(interpreter.store().is_valid(helper));
        assert!(interpreter.reports().is_empty());
        assert_symmetric(&interpreter);

        interpreter.remove_import(global, "H");
        assert!(!interpreter.store().is_valid(helper));
    }

    #[test]
    fn cyclic_slot_assignments_roll_back() {
        let (mut interpreter, global) = setup();
        let a = interpreter.create_namespace(Some("A"), Some(global), Levels::Own);

        interpreter.set_slot(global, Slot::Scope, Some(a));

        assert_eq!(interpreter.store().get(global).unwrap().ids.scope, None);
        assert!(!interpreter.store().get(a).unwrap().ids.retainers.contains(&global));
    }

    #[test]
    fn observers_and_imports_are_edges() {
        let (mut interpreter, global) = setup();
        let function = interpreter.create_function(Some("watch"), Statements::None, Some(global));
        let helper = interpreter.create_namespace(Some("H"), Some(global), Levels::Own);

        interpreter.add_observer(global, Observer { identifier: "didSet".into(), value: function });
        interpreter.set_import(global, "H", helper);
        assert_symmetric(&interpreter);
        assert!(interpreter.store().get(helper).unwrap().ids.retainers.contains(&global));

        interpreter.remove_observer(global, "didSet");
        interpreter.remove_import(global, "H");
        assert!(!interpreter.store().is_valid(function));
        assert!(!interpreter.store().is_valid(helper));
        assert_symmetric(&interpreter);
    }

    #[test]
    fn destroy_reports_live_retainers() {
        let (mut interpreter, global) = setup();
        let a = interpreter.create_namespace(Some("A"), Some(global), Levels::Own);
        let holder = interpreter.create_namespace(Some("Holder"), None, Levels::Missing);
        hold(&mut interpreter, holder, "a", Some(a));

        // The holder itself is not significantly retained.
        interpreter.destroy_if_released(a);

        assert!(!interpreter.store().is_valid(a));
        assert_eq!(interpreter.reports().len(), 1);
        assert!(interpreter.reports()[0].string.contains("non-empty retainer list"));
    }
}
