//! Function invocation.
//!
//! A call runs in a fresh `Call<title>` namespace whose level slots come from
//! the object being initialized or from the function itself. Calls to
//! initializers first find or build the object chain they initialize.

use rustc_hash::FxHashSet;

use crate::ast::Node;
use crate::composite::{CompositeId, Kind, Life, Overload, Statements};
use crate::context::{Interpreter, ScopeEntry};
use crate::control::{ControlTransfer, Flow, TransferKind, Unwind};
use crate::graph::Levels;
use crate::report::Level;
use crate::resolve::{Argument, Matching, Placement};
use crate::types::{Predefined, Requirement, Type};
use crate::value::{Dictionary, Value};

/// Where a call expression looks its function up.
#[derive(Debug, Clone)]
pub(crate) enum Callee {
    /// A member searched by name (identifiers and chains).
    Member {
        composite: Option<CompositeId>,
        identifier: String,
        internal: bool,
    },
    /// Any other expression, already evaluated.
    Value(Option<Value>),
}

/// Outcome of matching a call against its callee.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CallPlan {
    pub function: Option<CompositeId>,
    /// Type-level composite the function belongs to.
    pub self_composite: Option<CompositeId>,
    pub initializer: bool,
}

impl Interpreter {
    /// Invokes `function` with already evaluated arguments.
    ///
    /// `levels` supplies the level slots of the call namespace (an object for
    /// initializers and deinitializers); `caller` is bound as `caller`.
    pub fn call_function(
        &mut self,
        node: Option<&Node>,
        function: CompositeId,
        arguments: &[Argument],
        levels: Option<CompositeId>,
        caller: Option<CompositeId>,
    ) -> Flow {
        if self.call_depth() >= self.preferences.call_stack_size {
            let calls = self.calls_string();
            self.report(
                Level::Error,
                None,
                &format!("Maximum call stack size exceeded.\n{calls}"),
            );
            self.set_transfer(None, Some(TransferKind::Abort));
            return Err(Unwind);
        }

        let Some(composite) = self.store.get(function) else {
            return Ok(None);
        };
        let statements = composite.statements.clone();
        let type_ = composite.type_.clone();
        let title = match &composite.title {
            Some(title) => title.clone(),
            None => function.to_string(),
        };
        if let Statements::Native(native) = statements {
            return self.call_native(native, arguments);
        }

        let initializing = levels.filter(|levels| {
            self.store
                .get(*levels)
                .is_some_and(|object| object.is(Kind::Object) && object.life == Life::Creating)
        });
        let namespace = self.create_namespace(
            Some(&format!("Call<{title}>")),
            Some(function),
            Levels::From(levels.unwrap_or(function)),
        );
        let location = node.map(|node| self.location_of(node));

        self.push_scope(ScopeEntry {
            namespace,
            function: Some(function),
            location,
        });
        self.control.push();

        // The outcome is read from the frame's transfer below.
        let _ = self.enter_function(namespace, &type_, &statements, arguments, initializing, caller);

        if let Some(object) = initializing
            && let Some(object) = self.store.get_mut(object)
            && object.life == Life::Creating
        {
            object.life = Life::Idle;
        }
        self.pop_scope(true);

        match self.control.pop() {
            Some(ControlTransfer {
                kind: Some(TransferKind::Throw),
                value,
            }) => {
                if type_.throws() == Requirement::Absent {
                    self.report(
                        Level::Warning,
                        node,
                        &format!("Function \"{title}\" threw without being declared as throwing."),
                    );
                }
                self.set_transfer(value, Some(TransferKind::Throw));
                Err(Unwind)
            }
            Some(ControlTransfer {
                kind: Some(TransferKind::Abort),
                ..
            }) => {
                self.set_transfer(None, Some(TransferKind::Abort));
                Err(Unwind)
            }
            Some(transfer) => Ok(transfer.value),
            None => Ok(None),
        }
    }

    fn enter_function(
        &mut self,
        namespace: CompositeId,
        type_: &Type,
        statements: &Statements,
        arguments: &[Argument],
        initializing: Option<CompositeId>,
        caller: Option<CompositeId>,
    ) -> Flow {
        if let Some(caller) = caller {
            let mut caller_type = Type::predefined(Predefined::Any);
            if let Some(root) = caller_type.part_mut(0) {
                root.nillable = true;
            }
            self.set_member_overload(
                namespace,
                "caller",
                Overload::new(caller_type, Some(Value::Reference(caller))),
                Placement::Append,
            );
        }
        self.bind_parameters(namespace, type_, arguments)?;

        if let Some(object) = initializing {
            let class_statements = self
                .store
                .get(object)
                .and_then(|object| object.ids.current_type)
                .and_then(|class| self.store.get(class))
                .map(|class| class.statements.nodes());
            if let Some(class_statements) = class_statements {
                self.with_scope(ScopeEntry::namespace(object), false, |this| {
                    this.execute_statements(&class_statements, object)
                })?;
            }
        }

        self.execute_statements(&statements.nodes(), namespace)
    }

    /// Binds arguments to parameters. Omitted parameters take their default,
    /// a variadic parameter collects the rest into an array and arguments
    /// without a parameter bind as `$index`.
    fn bind_parameters(&mut self, namespace: CompositeId, type_: &Type, arguments: &[Argument]) -> Flow<()> {
        let parameters = type_.function_parameters();
        let mut bound = 0;

        for (position, index) in parameters.iter().enumerate() {
            let Some(part) = type_.part(*index) else {
                continue;
            };
            let identifier = match &part.identifier {
                Some(identifier) => identifier.clone(),
                None => format!("${position}"),
            };
            let default = part.value.clone();
            let value = if part.variadic {
                let rest = arguments.get(position..).unwrap_or_default();
                bound = arguments.len();
                Some(Value::Dictionary(Dictionary::array(
                    rest.iter().map(|argument| argument.value.clone()),
                )))
            } else if let Some(argument) = arguments.get(position) {
                bound = position + 1;
                argument.value.clone()
            } else if let Some(default) = default {
                self.eval(&default, namespace)?
            } else {
                None
            };
            self.set_member_overload(
                namespace,
                &identifier,
                Overload::new(type_.subtype(*index), value),
                Placement::Append,
            );
        }

        for (position, argument) in arguments.iter().enumerate().skip(bound) {
            self.set_member_overload(
                namespace,
                &format!("${position}"),
                Overload::new(Type::anything(), argument.value.clone()),
                Placement::Append,
            );
        }
        Ok(())
    }

    // --- Call expressions ---

    /// Finds the function a call targets. A callee without a matching
    /// function falls back to an `init` of the callee composite (objects use
    /// their type).
    pub(crate) fn plan_call(&self, callee: &Callee, arguments: &[Argument]) -> CallPlan {
        let resolver = self.resolver();
        let matching = Matching::Call(arguments);

        let plan = match callee {
            Callee::Member {
                composite,
                identifier,
                internal,
            } => {
                let function = composite
                    .and_then(|composite| resolver.find_member_overload(composite, identifier, &matching, *internal))
                    .and_then(|resolved| resolved.matching);
                self.call_plan(function, *composite, identifier == "init")
            }
            Callee::Value(value) => {
                let function = resolver.find_value_function(value.as_ref(), arguments);
                self.call_plan(function, None, false)
            }
        };
        if plan.function.is_some() || plan.initializer {
            return plan;
        }

        let composite = match callee {
            Callee::Member {
                composite,
                identifier,
                internal,
            } => composite
                .and_then(|composite| {
                    resolver.find_member_overload(composite, identifier, &Matching::Composite, *internal)
                })
                .and_then(|resolved| resolved.matching),
            Callee::Value(value) => value.as_ref().and_then(Value::composite),
        };
        let composite = composite.map(|composite| match self.store.get(composite) {
            Some(object) if object.is(Kind::Object) => object.ids.current_type.unwrap_or(composite),
            _ => composite,
        });
        let function = composite
            .and_then(|composite| resolver.find_member_overload(composite, "init", &matching, true))
            .and_then(|resolved| resolved.matching);
        self.call_plan(function, composite, true)
    }

    fn call_plan(&self, function: Option<CompositeId>, base: Option<CompositeId>, named_init: bool) -> CallPlan {
        let function_composite = function.and_then(|function| self.store.get(function));
        let self_composite = function_composite
            .and_then(|function| function.ids.current_type)
            .or(base);
        let initializing = named_init || function_composite.is_some_and(|function| function.title() == "init");
        let instantiable = self_composite
            .and_then(|composite| self.store.kind_of(composite))
            .is_some_and(Kind::is_instantiable);
        CallPlan {
            function,
            self_composite,
            initializer: initializing && instantiable,
        }
    }

    /// Runs a planned call from `scope`, preparing the object an initializer
    /// works on.
    pub(crate) fn invoke(
        &mut self,
        node: &Node,
        scope: CompositeId,
        plan: CallPlan,
        arguments: &[Argument],
        generic_arguments: &[Type],
    ) -> Flow {
        let Some(function) = plan.function else {
            let kind = if plan.initializer { "Initializer" } else { "Function" };
            self.report(
                Level::Error,
                Some(node),
                &format!("{kind} with specified signature wasn't found."),
            );
            return Ok(None);
        };

        let caller = self.store.get(scope).and_then(|scope| scope.ids.current_type);
        let levels = match (plan.initializer, plan.self_composite) {
            (true, Some(class)) => self.initializer_object(scope, class, generic_arguments),
            _ => None,
        };
        self.call_function(Some(node), function, arguments, levels, caller)
    }

    /// Object an initializer of `class` works on: a creating object of that
    /// class up the calling scope's `self` chain (delegation), or a fresh
    /// chain of one object per inheritance level.
    fn initializer_object(
        &mut self,
        scope: CompositeId,
        class: CompositeId,
        generic_arguments: &[Type],
    ) -> Option<CompositeId> {
        if generic_arguments.is_empty() {
            let mut object = self
                .store
                .get(scope)
                .and_then(|scope| scope.ids.current)
                .filter(|current| self.store.is_kind(Some(*current), Kind::Object));
            let mut visited = FxHashSet::default();
            while let Some(current) = object {
                if !visited.insert(current) {
                    break;
                }
                let Some(composite) = self.store.get(current) else {
                    break;
                };
                if composite.ids.current_type == Some(class) {
                    if composite.life == Life::Creating {
                        return Some(current);
                    }
                    break;
                }
                object = composite.ids.super_;
            }
        }

        let mut objects: Vec<CompositeId> = Vec::new();
        let mut level = Some(class);
        let mut visited = FxHashSet::default();
        while let Some(current) = level.filter(|level| self.store.kind_of(*level).is_some_and(Kind::is_instantiable)) {
            if !visited.insert(current) {
                break;
            }
            let object = self.create_object(None, current, objects.last().copied());
            match objects.last() {
                Some(derived) => self.set_super_levels(*derived, Some(object)),
                None => self.bind_generic_arguments(object, current, generic_arguments),
            }
            objects.push(object);
            level = self.store.get(current).and_then(|class| class.type_.inherited_reference());
        }
        objects.first().copied()
    }

    fn bind_generic_arguments(&mut self, object: CompositeId, class: CompositeId, generic_arguments: &[Type]) {
        let identifiers: Vec<Option<String>> = self
            .store
            .get(class)
            .map(|class| {
                class
                    .type_
                    .generic_parameters()
                    .into_iter()
                    .map(|parameter| parameter.identifier.clone())
                    .collect()
            })
            .unwrap_or_default();

        for (identifier, argument) in identifiers.iter().zip(generic_arguments) {
            let Some(identifier) = identifier else {
                continue;
            };
            self.set_member_overload(
                object,
                identifier,
                Overload::new(Type::predefined(Predefined::Type), Some(Value::Type(argument.clone()))),
                Placement::Append,
            );
        }
    }

    /// Up to eight innermost calls, innermost first:
    /// `index: Type.function:line:column`.
    pub fn calls_string(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        for entry in self.scopes.iter().rev() {
            if lines.len() == 8 {
                break;
            }
            let Some(function) = entry.function else {
                continue;
            };
            let mut line = format!("{}: ", lines.len());
            let composite = self.store.get(function);
            let title = composite.and_then(|function| function.title.clone());

            if title.is_some()
                && let Some(owner) = composite.and_then(|function| function.ids.current_type)
                && let Some(owner_composite) = self.store.get(owner)
            {
                match &owner_composite.title {
                    Some(owner_title) => line.push_str(owner_title),
                    None => line.push_str(&owner.to_string()),
                }
                line.push('.');
            }
            match title {
                Some(title) => line.push_str(&title),
                None => line.push_str(&function.to_string()),
            }
            if let Some(location) = entry.location {
                line.push_str(&format!(":{}:{}", location.line + 1, location.column + 1));
            }
            lines.push(line);
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Collection;

    fn setup() -> (Interpreter, CompositeId) {
        let mut interpreter = Interpreter::default();
        let global = interpreter.create_namespace(Some("Global"), None, Levels::Own);
        interpreter.push_scope(ScopeEntry::namespace(global));
        interpreter.control.push();
        (interpreter, global)
    }

    fn parameters(interpreter: &mut Interpreter, function: CompositeId, names: &[&str], variadic_last: bool) {
        let mut type_ = Type::predefined(Predefined::Function);
        let parameters = type_.collection_part(None, Some(0), Collection::Parameters);
        for (position, name) in names.iter().enumerate() {
            let part = type_.push(Some(parameters));
            let part = type_.part_mut(part).unwrap();
            part.identifier = Some(name.to_string());
            part.variadic = variadic_last && position + 1 == names.len();
        }
        interpreter.set_type(function, type_);
    }

    fn member(interpreter: &Interpreter, composite: CompositeId, name: &str) -> Option<Value> {
        interpreter
            .find_member_overload(composite, name, &Matching::Property, true)
            .and_then(|resolved| resolved.overload.value)
    }

    #[test]
    fn parameters_bind_positionally_and_variadically() {
        let (mut interpreter, global) = setup();
        let function = interpreter.create_function(Some("f"), Statements::None, Some(global));
        parameters(&mut interpreter, function, &["first", "rest"], true);
        let namespace = interpreter.create_namespace(Some("Call<f>"), Some(function), Levels::From(function));
        let type_ = interpreter.store().get(function).unwrap().type_.clone();
        let arguments: Vec<Argument> = (1..=3).map(|i| Argument::positional(Some(Value::Integer(i)))).collect();

        interpreter.bind_parameters(namespace, &type_, &arguments).unwrap();

        assert_eq!(member(&interpreter, namespace, "first"), Some(Value::Integer(1)));
        assert_eq!(
            member(&interpreter, namespace, "rest"),
            Some(Value::Dictionary(Dictionary::array([Some(Value::Integer(2)), Some(Value::Integer(3))])))
        );
    }

    #[test]
    fn extra_arguments_bind_by_position() {
        let (mut interpreter, global) = setup();
        let function = interpreter.create_function(Some("f"), Statements::None, Some(global));
        let namespace = interpreter.create_namespace(Some("Call<f>"), Some(function), Levels::From(function));
        let type_ = Type::predefined(Predefined::Function);

        interpreter
            .bind_parameters(namespace, &type_, &[Argument::positional(Some(Value::Boolean(true)))])
            .unwrap();

        assert_eq!(member(&interpreter, namespace, "$0"), Some(Value::Boolean(true)));
    }

    #[test]
    fn overflow_reports_once_and_aborts() {
        let (mut interpreter, global) = setup();
        interpreter.preferences.call_stack_size = 0;
        let function = interpreter.create_function(Some("f"), Statements::None, Some(global));

        let result = interpreter.call_function(None, function, &[], None, None);

        assert_eq!(result, Err(Unwind));
        assert_eq!(interpreter.control().kind(), Some(&TransferKind::Abort));
        assert_eq!(interpreter.reports().len(), 1);
        assert!(interpreter.reports()[0].string.starts_with("Maximum call stack size exceeded."));
        assert_eq!(interpreter.scopes().len(), 1);
    }

    #[test]
    fn call_namespaces_are_released_after_return() {
        let (mut interpreter, global) = setup();
        let function = interpreter.create_function(Some("f"), Statements::None, Some(global));
        interpreter.set_member_overload(
            global,
            "f",
            Overload::new(Type::predefined(Predefined::Function), Some(Value::Reference(function))),
            Placement::Append,
        );
        let live = interpreter.store().live_count();

        let result = interpreter.call_function(None, function, &[], None, Some(global));

        assert_eq!(result, Ok(None));
        assert_eq!(interpreter.store().live_count(), live);
        assert_eq!(interpreter.scopes().len(), 1);
        assert_eq!(interpreter.control().depth(), 1);
    }

    #[test]
    fn initializers_build_one_object_per_level() {
        let (mut interpreter, global) = setup();
        let base = interpreter.create_class(Some("Base"), Some(global));
        let derived = interpreter.create_class(Some("Derived"), Some(global));
        let mut type_ = Type::predefined(Predefined::Class);
        let inherited = type_.collection_part(None, Some(0), Collection::InheritedTypes);
        let part = type_.push(Some(inherited));
        type_.part_mut(part).unwrap().reference = Some(base);
        interpreter.set_type(derived, type_);
        interpreter.set_super_levels(derived, Some(base));

        let object = interpreter.initializer_object(global, derived, &[]).unwrap();

        let composite = interpreter.store().get(object).unwrap();
        assert_eq!(composite.ids.current_type, Some(derived));
        let super_object = composite.ids.super_.unwrap();
        let super_composite = interpreter.store().get(super_object).unwrap();
        assert_eq!(super_composite.ids.current_type, Some(base));
        assert_eq!(super_composite.ids.sub, Some(object));
    }

    #[test]
    fn calls_string_lists_innermost_first() {
        let (mut interpreter, global) = setup();
        let function = interpreter.create_function(Some("run"), Statements::None, Some(global));
        for line in 0..2 {
            interpreter.push_scope(ScopeEntry {
                namespace: global,
                function: Some(function),
                location: Some(crate::report::Location { line, column: 0 }),
            });
        }

        assert_eq!(interpreter.calls_string(), "0: Global.run:2:1\n1: Global.run:1:1");
    }
}
