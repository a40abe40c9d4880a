use crate::ast::{Node, NodeKind};
use crate::call::Callee;
use crate::composite::{CompositeId, Observer, Overload};
use crate::context::Interpreter;
use crate::control::{Flow, TransferKind, Unwind};
use crate::report::Level;
use crate::resolve::{Argument, Matching, Placement};
use crate::types::Type;
use crate::value::{Dictionary, Value};

/// Assignable location: a member or an entry of a dictionary held by one.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Place {
    Member {
        composite: CompositeId,
        identifier: String,
        internal: bool,
    },
    Entry {
        base: Box<Place>,
        key: Value,
    },
}

const NOT_ASSIGNABLE: &str = "Cannot assign to anything but a valid identifier or chain expression.";

impl Interpreter {
    pub(super) fn identifier(&mut self, node: &Node, identifier: &str, scope: CompositeId) -> Flow {
        match self.find_member_overload(scope, identifier, &Matching::Property, false) {
            Some(resolved) => Ok(resolved.overload.value),
            None => {
                self.report(Level::Warning, Some(node), &format!("Identifier \"{identifier}\" wasn't found."));
                Ok(None)
            }
        }
    }

    pub(super) fn string_literal(&mut self, segments: &[Node], scope: CompositeId) -> Flow {
        let mut string = String::new();
        for segment in segments {
            match &segment.kind {
                NodeKind::StringSegment { value } => string.push_str(value),
                _ => {
                    let value = self.eval(segment, scope)?;
                    string.push_str(&self.value_string(value.as_ref()));
                }
            }
        }
        Ok(Some(Value::String(string)))
    }

    pub(super) fn array_literal(&mut self, node: &Node, values: &[Node], scope: CompositeId) -> Flow {
        let mut elements = Vec::with_capacity(values.len());
        for value in values {
            if let Some(value) = self.eval(value, scope)? {
                elements.push(Some(value));
            }
        }
        let array = Value::Dictionary(Dictionary::array(elements));
        self.wrap_literal(node, "Array", array, scope)
    }

    pub(super) fn dictionary_literal(&mut self, node: &Node, entries: &[Node], scope: CompositeId) -> Flow {
        let mut dictionary = Dictionary::new();
        for entry in entries {
            let NodeKind::Entry { key, value } = &entry.kind else {
                continue;
            };
            let key = self.eval_child(key.as_deref(), scope)?;
            let value = self.eval_child(value.as_deref(), scope)?;
            if let Some(key) = key {
                dictionary.insert(key, value);
            }
        }
        self.wrap_literal(node, "Dictionary", Value::Dictionary(dictionary), scope)
    }

    /// Passes a collection literal to an in-scope callable of that name, if any.
    fn wrap_literal(&mut self, node: &Node, callable: &str, literal: Value, scope: CompositeId) -> Flow {
        let arguments = [Argument::positional(Some(literal.clone()))];
        let callee = Callee::Member {
            composite: Some(scope),
            identifier: callable.to_string(),
            internal: false,
        };
        let plan = self.plan_call(&callee, &arguments);
        if plan.function.is_none() {
            return Ok(Some(literal));
        }
        self.invoke(node, scope, plan, &arguments, &[])
    }

    // --- Postfix forms ---

    pub(super) fn chain_expression(
        &mut self,
        node: &Node,
        composite: Option<&Node>,
        member: Option<&Node>,
        scope: CompositeId,
    ) -> Flow {
        let base = match composite {
            Some(composite) => self.postfix(composite, scope)?,
            None => None,
        };
        let Some(composite) = self.value_composite(base.as_ref()) else {
            self.report(Level::Error, Some(node), "Composite wasn't found.");
            return Ok(None);
        };
        let Some(identifier) = self.member_name(member, scope)? else {
            return Ok(None);
        };
        Ok(self
            .find_member_overload(composite, &identifier, &Matching::Property, true)
            .and_then(|resolved| resolved.overload.value))
    }

    /// Member name of a chain: an identifier or a string literal.
    fn member_name(&mut self, member: Option<&Node>, scope: CompositeId) -> Flow<Option<String>> {
        let Some(member) = member else {
            return Ok(None);
        };
        if let Some(identifier) = member.identifier_value() {
            return Ok(Some(identifier.to_string()));
        }
        match self.eval(member, scope)? {
            Some(Value::String(identifier)) => Ok(Some(identifier)),
            _ => Ok(None),
        }
    }

    pub(super) fn call_expression(
        &mut self,
        node: &Node,
        callee: Option<&Node>,
        generic_arguments: &[Node],
        arguments: &[Node],
        closure: Option<&Node>,
        scope: CompositeId,
    ) -> Flow {
        let generic_arguments: Vec<Type> = generic_arguments
            .iter()
            .map(|argument| self.type_of(Some(argument), scope))
            .collect();
        let arguments = self.arguments(arguments, closure, scope)?;

        let callee = match callee {
            Some(callee) => self.callee(callee, scope)?,
            None => Callee::Value(None),
        };
        if let Callee::Value(None) = callee {
            self.report(
                Level::Warning,
                Some(node),
                "Cannot call anything but a valid (in particular, chain) expression.",
            );
            return Ok(None);
        }

        let plan = self.plan_call(&callee, &arguments);
        self.invoke(node, scope, plan, &arguments, &generic_arguments)
    }

    fn callee(&mut self, callee: &Node, scope: CompositeId) -> Flow<Callee> {
        match &callee.kind {
            NodeKind::Identifier { value } => Ok(Callee::Member {
                composite: Some(scope),
                identifier: value.clone(),
                internal: false,
            }),
            NodeKind::ChainExpression { composite, member } => {
                let base = match composite {
                    Some(composite) => self.postfix(composite, scope)?,
                    None => None,
                };
                let Some(identifier) = self.member_name(member.as_deref(), scope)? else {
                    return Ok(Callee::Value(None));
                };
                Ok(Callee::Member {
                    composite: self.value_composite(base.as_ref()),
                    identifier,
                    internal: true,
                })
            }
            _ => Ok(Callee::Value(self.postfix(callee, scope)?)),
        }
    }

    pub(crate) fn arguments(
        &mut self,
        nodes: &[Node],
        closure: Option<&Node>,
        scope: CompositeId,
    ) -> Flow<Vec<Argument>> {
        let mut arguments = Vec::with_capacity(nodes.len() + 1);
        for node in nodes {
            let argument = match &node.kind {
                NodeKind::Argument { label, value } => Argument {
                    label: label
                        .as_deref()
                        .and_then(Node::identifier_value)
                        .map(str::to_string),
                    value: self.eval_child(value.as_deref(), scope)?,
                },
                _ => Argument::positional(self.eval(node, scope)?),
            };
            arguments.push(argument);
        }
        if let Some(closure) = closure {
            arguments.push(Argument::positional(self.eval(closure, scope)?));
        }
        Ok(arguments)
    }

    pub(super) fn subscript_expression(
        &mut self,
        node: &Node,
        composite: Option<&Node>,
        arguments: &[Node],
        closure: Option<&Node>,
        scope: CompositeId,
    ) -> Flow {
        let base = match composite {
            Some(composite) => self.postfix(composite, scope)?,
            None => None,
        };
        let arguments = self.arguments(arguments, closure, scope)?;
        let key = arguments.first().and_then(|argument| argument.value.as_ref());

        match &base {
            Some(Value::Dictionary(dictionary)) => Ok(key.and_then(|key| dictionary.get(key)).cloned()),
            Some(Value::String(string)) => Ok(match key {
                Some(Value::Integer(index)) => usize::try_from(*index)
                    .ok()
                    .and_then(|index| string.chars().nth(index))
                    .map(|character| Value::String(character.to_string())),
                _ => None,
            }),
            _ => {
                let Some(composite) = self.value_composite(base.as_ref()) else {
                    return Ok(None);
                };
                let function = self
                    .find_member_overload(composite, "subscript", &Matching::Call(&arguments), true)
                    .and_then(|resolved| resolved.matching);
                match function {
                    Some(function) => {
                        let caller = self.store.get(scope).and_then(|scope| scope.ids.current_type);
                        self.call_function(Some(node), function, &arguments, None, caller)
                    }
                    None => {
                        self.report(Level::Error, Some(node), "Subscript with specified signature wasn't found.");
                        Ok(None)
                    }
                }
            }
        }
    }

    // --- Prefix-like forms ---

    pub(super) fn inout_expression(&mut self, node: &Node, value: Option<&Node>, scope: CompositeId) -> Flow {
        match self.eval_child(value, scope)? {
            Some(Value::Pointer(id) | Value::Reference(id)) => Ok(Some(Value::Pointer(id))),
            value => {
                let primitive = value.as_ref().map_or("nil", Value::primitive_type);
                self.report(
                    Level::Error,
                    Some(node),
                    &format!("Non-reference value (\"{primitive}\") can't be used as a pointer."),
                );
                Ok(None)
            }
        }
    }

    /// `try?` turns a throw into nil; plain `try` lets it propagate.
    pub(super) fn try_expression(&mut self, nillable: bool, value: Option<&Node>, scope: CompositeId) -> Flow {
        match self.eval_child(value, scope) {
            Err(Unwind) if nillable && self.control.kind() == Some(&TransferKind::Throw) => {
                self.reset_transfer();
                Ok(None)
            }
            flow => flow,
        }
    }

    pub(super) fn delete_expression(&mut self, node: &Node, value: Option<&Node>, scope: CompositeId) -> Flow {
        let place = match value {
            Some(value) => self.place_of(value, scope)?,
            None => None,
        };
        let deleted = match &place {
            Some(Place::Member {
                composite,
                identifier,
                internal,
            }) => {
                let owner = self
                    .find_member_overload(*composite, identifier, &Matching::Property, *internal)
                    .filter(|resolved| resolved.index.is_some())
                    .map(|resolved| resolved.owner);
                if let Some(owner) = owner {
                    self.remove_member(owner, identifier);
                }
                owner.is_some()
            }
            Some(Place::Entry { base, key }) => match self.read_place(base) {
                Some(Value::Dictionary(mut dictionary)) => {
                    dictionary.remove(key) && self.write_place(node, base, Some(Value::Dictionary(dictionary)))?
                }
                _ => false,
            },
            None => false,
        };
        if !deleted {
            self.report(
                Level::Warning,
                Some(node),
                "Cannot delete anything but a valid identifier, chain or subscript expression.",
            );
        }
        Ok(None)
    }

    // --- Places ---

    /// Assignable location named by an expression, if it names one.
    pub(crate) fn place_of(&mut self, node: &Node, scope: CompositeId) -> Flow<Option<Place>> {
        match &node.kind {
            NodeKind::Identifier { value } => Ok(Some(Place::Member {
                composite: scope,
                identifier: value.clone(),
                internal: false,
            })),
            NodeKind::ChainExpression { composite, member } => {
                let base = match composite {
                    Some(composite) => self.postfix(composite, scope)?,
                    None => None,
                };
                let Some(composite) = self.value_composite(base.as_ref()) else {
                    return Ok(None);
                };
                Ok(self
                    .member_name(member.as_deref(), scope)?
                    .map(|identifier| Place::Member {
                        composite,
                        identifier,
                        internal: true,
                    }))
            }
            NodeKind::SubscriptExpression {
                composite: Some(composite),
                arguments,
                ..
            } => {
                let Some(base) = self.place_of(composite, scope)? else {
                    return Ok(None);
                };
                let key = match arguments.first() {
                    Some(argument) => self.eval(argument, scope)?,
                    None => None,
                };
                Ok(key.map(|key| Place::Entry {
                    base: Box::new(base),
                    key,
                }))
            }
            NodeKind::ParenthesizedExpression { value: Some(value) } => self.place_of(value, scope),
            _ => Ok(None),
        }
    }

    /// True when writing to the place would update an existing member.
    pub(crate) fn place_exists(&self, place: &Place) -> bool {
        match place {
            Place::Member {
                composite,
                identifier,
                internal,
            } => self
                .find_member_overload(*composite, identifier, &Matching::Property, *internal)
                .is_some_and(|resolved| resolved.index.is_some()),
            Place::Entry { base, .. } => matches!(self.read_place(base), Some(Value::Dictionary(_))),
        }
    }

    pub(crate) fn read_place(&self, place: &Place) -> Option<Value> {
        match place {
            Place::Member {
                composite,
                identifier,
                internal,
            } => self
                .find_member_overload(*composite, identifier, &Matching::Property, *internal)
                .and_then(|resolved| resolved.overload.value),
            Place::Entry { base, key } => match self.read_place(base)? {
                Value::Dictionary(dictionary) => dictionary.get(key).cloned(),
                _ => None,
            },
        }
    }

    /// Replaces the value at a place, running `willSet`/`didSet` observers
    /// of the member around the write. Returns false when there is nothing
    /// to write to.
    pub(crate) fn write_place(&mut self, node: &Node, place: &Place, value: Option<Value>) -> Flow<bool> {
        match place {
            Place::Member {
                composite,
                identifier,
                internal,
            } => {
                let Some(resolved) = self.find_member_overload(*composite, identifier, &Matching::Property, *internal)
                else {
                    return Ok(false);
                };
                let Some(index) = resolved.index else {
                    return Ok(false);
                };
                let observers = resolved.overload.observers.clone();
                let old = resolved.overload.value.clone();

                self.run_observers(node, &observers, "willSet", value.clone())?;
                let overload = Overload {
                    value,
                    ..resolved.overload
                };
                self.set_member_overload(
                    resolved.owner,
                    identifier,
                    overload,
                    Placement::Replace {
                        owner: resolved.owner,
                        index: Some(index),
                    },
                );
                self.run_observers(node, &observers, "didSet", old)?;
                Ok(true)
            }
            Place::Entry { base, key } => match self.read_place(base) {
                Some(Value::Dictionary(mut dictionary)) => {
                    dictionary.insert(key.clone(), value);
                    self.write_place(node, base, Some(Value::Dictionary(dictionary)))
                }
                _ => Ok(false),
            },
        }
    }

    fn run_observers(&mut self, node: &Node, observers: &[Observer], identifier: &str, value: Option<Value>) -> Flow<()> {
        for observer in observers.iter().filter(|observer| observer.identifier == identifier) {
            self.call_function(
                Some(node),
                observer.value,
                &[Argument::positional(value.clone())],
                None,
                None,
            )?;
        }
        Ok(())
    }

    /// Assigns through a place, reporting targets that can't be written.
    pub(crate) fn assign(&mut self, node: &Node, place: Option<Place>, value: Option<Value>) -> Flow {
        let written = match &place {
            Some(place) => self.write_place(node, place, value.clone())?,
            None => false,
        };
        if !written {
            self.report(Level::Warning, Some(node), NOT_ASSIGNABLE);
            return Ok(None);
        }
        Ok(value)
    }

    pub(crate) fn report_not_assignable(&mut self, node: &Node) {
        self.report(Level::Warning, Some(node), NOT_ASSIGNABLE);
    }
}
