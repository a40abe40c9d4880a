//! Member and overload resolution.
//!
//! Lookups walk up to three chains per composite (object instances through
//! `super`, types through `Super`, lexical nesting through `scope`) and return
//! an explicit [`ResolvedOverload`].

use rustc_hash::FxHashSet;

use crate::composite::{
    Associativity, CompositeId, Kind, OperatorOverload, Overload, Slot, Store,
};
use crate::context::Interpreter;
use crate::types::{Predefined, Type, TypePart};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub label: Option<String>,
    pub value: Option<Value>,
}

impl Argument {
    pub fn positional(value: Option<Value>) -> Self {
        Self { label: None, value }
    }
}

/// Which overload of a member a lookup wants.
#[derive(Debug, Clone, Copy)]
pub enum Matching<'a> {
    /// Most recent overload holding a value, else the most recent one.
    Property,
    /// First overload whose value is a function accepting the arguments.
    Call(&'a [Argument]),
    /// First overload whose value references a composite.
    Composite,
    /// First overload whose type accepts the given type.
    Nominal(&'a Type),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOverload {
    /// Composite the overload was found on.
    pub owner: CompositeId,
    /// Position in the owner's member list; `None` for synthesized overloads
    /// (pseudo identifiers and imports).
    pub index: Option<usize>,
    pub overload: Overload,
    /// Function or composite selected by the matching.
    pub matching: Option<CompositeId>,
}

/// Where [`Interpreter::set_member_overload`] puts an overload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Always a new overload on the composite.
    Append,
    /// Replaces the composite's first overload, or appends.
    Local,
    /// Replaces a resolved overload on its owner, or appends there.
    Replace { owner: CompositeId, index: Option<usize> },
}

/// Read-only view of the store answering lookups.
pub struct Resolver<'a> {
    store: &'a Store,
    structural: bool,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a Store, structural: bool) -> Self {
        Self { store, structural }
    }

    /// Full lookup: local, object chain and inheritance chain at each level,
    /// then outward through `scope` unless `internal`.
    pub fn find_member_overload(
        &self,
        start: CompositeId,
        identifier: &str,
        matching: &Matching,
        internal: bool,
    ) -> Option<ResolvedOverload> {
        let mut visited = FxHashSet::default();
        let mut current = Some(start);

        while let Some(id) = current {
            if !visited.insert(id) {
                break;
            }
            let composite = self.store.get(id)?;

            if (composite.is(Kind::Function) || composite.is(Kind::Namespace))
                && let Some(found) = self.get_member_overload(id, identifier, matching)
            {
                return Some(found);
            }
            if let Some(found) = self.find_in_object_chain(id, identifier, matching) {
                return Some(found);
            }
            if let Some(found) = self.find_in_inheritance_chain(id, identifier, matching) {
                return Some(found);
            }
            if internal {
                break;
            }
            current = composite.ids.scope;
        }
        None
    }

    /// Members of one composite, then pseudo identifiers, then imports.
    pub fn get_member_overload(
        &self,
        id: CompositeId,
        identifier: &str,
        matching: &Matching,
    ) -> Option<ResolvedOverload> {
        let mut visited = FxHashSet::default();
        self.get_member_overload_guarded(id, identifier, matching, &mut visited)
    }

    fn get_member_overload_guarded(
        &self,
        id: CompositeId,
        identifier: &str,
        matching: &Matching,
        visited: &mut FxHashSet<CompositeId>,
    ) -> Option<ResolvedOverload> {
        if !visited.insert(id) {
            return None;
        }
        let composite = self.store.get(id)?;

        if let Some(overloads) = composite.members.get(identifier)
            && let Some((index, matched)) = self.select(overloads, matching)
        {
            return Some(ResolvedOverload {
                owner: id,
                index: Some(index),
                overload: overloads[index].clone(),
                matching: matched,
            });
        }

        let pseudo = if identifier == "Global" {
            self.store.id_at(0)
        } else {
            Slot::pseudo_identifier(identifier).and_then(|slot| composite.ids.get(slot))
        };
        if let Some(target) = pseudo {
            return self.synthesized(id, target, matching);
        }

        if composite.is(Kind::Namespace) {
            if let Some(imported) = composite.imports.get(identifier) {
                return self.synthesized(id, *imported, matching);
            }
            for imported in composite.imports.values() {
                if let Some(found) =
                    self.get_member_overload_guarded(*imported, identifier, matching, visited)
                {
                    return Some(found);
                }
            }
        }
        None
    }

    fn synthesized(
        &self,
        owner: CompositeId,
        target: CompositeId,
        matching: &Matching,
    ) -> Option<ResolvedOverload> {
        let overload = Overload::new(Type::predefined(Predefined::Any), Some(Value::Reference(target)));
        let (_, matched) = self.select(std::slice::from_ref(&overload), matching)?;
        Some(ResolvedOverload {
            owner,
            index: None,
            overload,
            matching: matched,
        })
    }

    fn find_in_object_chain(
        &self,
        id: CompositeId,
        identifier: &str,
        matching: &Matching,
    ) -> Option<ResolvedOverload> {
        let composite = self.store.get(id)?;
        let mut object = if composite.is(Kind::Object) {
            Some(id)
        } else {
            composite
                .ids
                .current
                .filter(|current| *current != id && self.store.is_kind(Some(*current), Kind::Object))
        };

        let mut redirected = false;
        let mut visited = FxHashSet::default();
        while let Some(current) = object {
            if !visited.insert(current) {
                break;
            }
            if let Some(found) = self.get_member_overload(current, identifier, matching) {
                if !redirected && found.overload.has_modifier("virtual") {
                    redirected = true;
                    let lowest = self.lowest_sub(current);
                    if lowest != current {
                        visited.clear();
                        object = Some(lowest);
                        continue;
                    }
                }
                return Some(found);
            }
            object = self.store.get(current).and_then(|object| object.ids.super_);
        }
        None
    }

    fn find_in_inheritance_chain(
        &self,
        id: CompositeId,
        identifier: &str,
        matching: &Matching,
    ) -> Option<ResolvedOverload> {
        let composite = self.store.get(id)?;
        let mut current = if composite.is(Kind::Object) {
            composite.ids.current_type
        } else {
            Some(id)
        };

        let mut visited = FxHashSet::default();
        while let Some(level) = current {
            if !visited.insert(level) {
                break;
            }
            if let Some(found) = self.get_member_overload(level, identifier, matching) {
                return Some(found);
            }
            current = self.store.get(level).and_then(|level| level.ids.super_type);
        }
        None
    }

    /// Most derived object below `object` through `sub` links.
    pub fn lowest_sub(&self, object: CompositeId) -> CompositeId {
        let mut lowest = object;
        let mut visited = FxHashSet::default();
        while let Some(sub) = self.store.get(lowest).and_then(|object| object.ids.sub) {
            if !visited.insert(sub) {
                break;
            }
            lowest = sub;
        }
        lowest
    }

    fn select(&self, overloads: &[Overload], matching: &Matching) -> Option<(usize, Option<CompositeId>)> {
        match matching {
            Matching::Property => overloads
                .iter()
                .rposition(|overload| overload.value.is_some())
                .or_else(|| overloads.len().checked_sub(1))
                .map(|index| {
                    let matched = overloads[index].value.as_ref().and_then(Value::composite);
                    (index, matched)
                }),
            Matching::Call(arguments) => overloads.iter().enumerate().find_map(|(index, overload)| {
                self.find_value_function(overload.value.as_ref(), arguments)
                    .map(|function| (index, Some(function)))
            }),
            Matching::Composite => overloads.iter().enumerate().find_map(|(index, overload)| {
                overload
                    .value
                    .as_ref()
                    .and_then(Value::composite)
                    .filter(|id| self.store.is_valid(*id))
                    .map(|id| (index, Some(id)))
            }),
            Matching::Nominal(type_) => overloads
                .iter()
                .rposition(|overload| type_.accepts(&overload.type_, self.store))
                .map(|index| (index, overloads[index].value.as_ref().and_then(Value::composite))),
        }
    }

    // --- Call matching ---

    /// A function accepting `arguments`, taken from the value itself or from
    /// the entries of a dictionary of overloads.
    pub fn find_value_function(&self, value: Option<&Value>, arguments: &[Argument]) -> Option<CompositeId> {
        match value {
            Some(Value::Dictionary(dictionary)) => dictionary
                .values()
                .find_map(|value| self.value_function(Some(value), arguments)),
            value => self.value_function(value, arguments),
        }
    }

    /// The function referenced by `value` when its parameters accept `arguments`.
    pub fn value_function(&self, value: Option<&Value>, arguments: &[Argument]) -> Option<CompositeId> {
        let function = value?.composite()?;
        let composite = self.store.get(function)?;
        if !composite.is(Kind::Function) {
            return None;
        }

        let type_ = &composite.type_;
        let parameters: Vec<&TypePart> = type_
            .function_parameters()
            .into_iter()
            .filter_map(|index| type_.part(index))
            .collect();
        let variadic = parameters.iter().any(|parameter| parameter.variadic);
        let required = parameters
            .iter()
            .filter(|parameter| !parameter.variadic && parameter.value.is_none())
            .count();
        if arguments.len() < required || (!variadic && arguments.len() > parameters.len()) {
            return None;
        }

        for (position, argument) in arguments.iter().enumerate() {
            let Some((index, parameter)) = parameter_at(type_, position) else {
                break;
            };
            // Only the first argument of a variadic run carries the label.
            let leading = position < parameters.len();
            if leading
                && let Some(label) = &parameter.label
                && argument.label.as_ref() != Some(label)
            {
                return None;
            }
            if self.structural {
                let expected = type_.subtype(index);
                let provided = self.value_type(argument.value.as_ref());
                if !expected.accepts(&provided, self.store) {
                    return None;
                }
            }
        }
        Some(function)
    }

    /// Type describing a value; objects are described by their class.
    pub fn value_type(&self, value: Option<&Value>) -> Type {
        let Some(value) = value else {
            return Type::new();
        };
        let Some(id) = value.composite() else {
            return Predefined::parse(value.primitive_type())
                .map(Type::predefined)
                .unwrap_or_default();
        };

        let mut part = TypePart {
            inout: matches!(value, Value::Pointer(_)),
            reference: Some(id),
            ..TypePart::default()
        };
        let mut current = Some(id);
        let mut visited = FxHashSet::default();
        while let Some(level) = current {
            if !visited.insert(level) {
                break;
            }
            let Some(composite) = self.store.get(level) else {
                break;
            };
            if composite.is(Kind::Object) {
                current = composite.ids.scope;
                continue;
            }
            if level == id {
                part.is_self = true;
            } else {
                part.reference = Some(level);
            }
            break;
        }
        Type::from_parts(vec![part])
    }

    // --- Operators ---

    /// Nearest operator declaration of `operator` with `modifier`, walking scopes.
    pub fn find_operator_overload(
        &self,
        start: CompositeId,
        operator: &str,
        modifier: &str,
    ) -> Option<OperatorOverload> {
        let mut visited = FxHashSet::default();
        let mut current = Some(start);
        while let Some(id) = current {
            if !visited.insert(id) {
                break;
            }
            let composite = self.store.get(id)?;
            if let Some(overload) = composite
                .operators
                .get(operator)
                .and_then(|overloads| overloads.iter().rev().find(|o| o.modifiers.iter().any(|m| m == modifier)))
            {
                return Some(overload.clone());
            }
            current = composite.ids.scope;
        }
        None
    }
}

/// Parameter part receiving the argument at `position`; a trailing variadic
/// parameter receives every remaining argument.
pub(crate) fn parameter_at(type_: &Type, position: usize) -> Option<(usize, &TypePart)> {
    let parameters = type_.function_parameters();
    let index = match parameters.get(position) {
        Some(index) => *index,
        None => *parameters.last().filter(|index| type_.part(**index).is_some_and(|p| p.variadic))?,
    };
    type_.part(index).map(|part| (index, part))
}

impl Interpreter {
    pub fn find_member_overload(
        &self,
        start: CompositeId,
        identifier: &str,
        matching: &Matching,
        internal: bool,
    ) -> Option<ResolvedOverload> {
        self.resolver().find_member_overload(start, identifier, matching, internal)
    }

    /// Stores an overload and reconciles the composites it stops or starts
    /// referencing.
    pub fn set_member_overload(
        &mut self,
        composite: CompositeId,
        identifier: &str,
        overload: Overload,
        placement: Placement,
    ) -> Option<CompositeId> {
        let (owner, index) = match placement {
            Placement::Append => (composite, None),
            Placement::Local => {
                let first = self
                    .store
                    .get(composite)?
                    .members
                    .get(identifier)
                    .filter(|overloads| !overloads.is_empty())
                    .map(|_| 0);
                (composite, first)
            }
            Placement::Replace { owner, index } => (owner, index),
        };

        let fresh = overload.references();
        let target = self.store.get_mut(owner)?;
        let overloads = target.members.entry(identifier.to_string()).or_default();
        let stale = match index.filter(|index| *index < overloads.len()) {
            Some(index) => std::mem::replace(&mut overloads[index], overload).references(),
            None => {
                overloads.push(overload);
                Vec::new()
            }
        };

        self.reconcile(owner, &stale, &fresh);
        Some(owner)
    }

    /// Removes every overload of a member.
    pub fn remove_member(&mut self, composite: CompositeId, identifier: &str) {
        let Some(target) = self.store.get_mut(composite) else {
            return;
        };
        let Some(overloads) = target.members.shift_remove(identifier) else {
            return;
        };
        let stale: Vec<CompositeId> = overloads.iter().flat_map(Overload::references).collect();
        self.reconcile(composite, &stale, &[]);
    }

    /// Records an operator declaration on a namespace, replacing an earlier
    /// declaration of the same fixity.
    pub fn set_operator_overload(
        &mut self,
        namespace: CompositeId,
        operator: &str,
        modifiers: &[String],
        precedence: i64,
        associativity: Associativity,
    ) {
        let Some(fixity) = modifiers
            .iter()
            .find(|modifier| FIXITIES.contains(&modifier.as_str()))
            .cloned()
        else {
            return;
        };
        let Some(composite) = self.store.get_mut(namespace) else {
            return;
        };
        if !composite.is(Kind::Namespace) {
            return;
        }
        let overloads = composite.operators.entry(operator.to_string()).or_default();
        let overload = OperatorOverload {
            modifiers: modifiers.to_vec(),
            associativity,
            precedence,
        };
        match overloads.iter_mut().find(|existing| existing.modifiers.contains(&fixity)) {
            Some(existing) => *existing = overload,
            None => overloads.push(overload),
        }
    }
}

const FIXITIES: [&str; 3] = ["prefix", "infix", "postfix"];
