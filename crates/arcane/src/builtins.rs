//! Host functions of the global namespace.

use crate::composite::{CompositeId, Native, Overload, Statements};
use crate::context::Interpreter;
use crate::control::Flow;
use crate::resolve::{Argument, Placement};
use crate::types::{Collection, Predefined, Requirement, Type};
use crate::value::Value;

impl Native {
    pub const ALL: [Native; 3] = [Native::Print, Native::GetComposite, Native::GetCallsString];

    pub fn title(self) -> &'static str {
        match self {
            Native::Print => "print",
            Native::GetComposite => "getComposite",
            Native::GetCallsString => "getCallsString",
        }
    }

    /// `print(value: _?) -> _?`, `getComposite(value: integer) -> Any?`,
    /// `getCallsString() -> string`.
    pub fn signature(self) -> Type {
        let mut type_ = Type::predefined(Predefined::Function);
        if let Some(root) = type_.part_mut(0) {
            root.awaits = Some(Requirement::Absent);
            root.throws = Some(Requirement::Absent);
        }

        let (parameter, result) = match self {
            Native::Print => (Some((Predefined::Wildcard, true)), (Predefined::Wildcard, true)),
            Native::GetComposite => (Some((Predefined::Integer, false)), (Predefined::Any, true)),
            Native::GetCallsString => (None, (Predefined::String, false)),
        };
        if let Some((predefined, nillable)) = parameter {
            let parameters = type_.collection_part(Some(0), None, Collection::Parameters);
            let part = type_.push(Some(parameters));
            if let Some(part) = type_.part_mut(part) {
                part.predefined = Some(predefined);
                part.nillable = nillable;
                part.identifier = Some("value".to_string());
            }
        }
        let (predefined, nillable) = result;
        let part = type_.push(Some(0));
        if let Some(part) = type_.part_mut(part) {
            part.predefined = Some(predefined);
            part.nillable = nillable;
        }
        type_
    }
}

impl Interpreter {
    /// Declares the host functions in `global`, replacing those of a seeded
    /// store.
    pub(crate) fn register_builtins(&mut self, global: CompositeId) {
        for native in Native::ALL {
            let function = self.create_function(Some(native.title()), Statements::Native(native), Some(global));
            self.set_type(function, native.signature());
            self.set_member_overload(
                global,
                native.title(),
                Overload::new(Type::predefined(Predefined::Function), Some(Value::Reference(function))),
                Placement::Local,
            );
        }
    }

    pub(crate) fn call_native(&mut self, native: Native, arguments: &[Argument]) -> Flow {
        let argument = arguments.first().and_then(|argument| argument.value.as_ref());
        match native {
            Native::Print => {
                let string = self.value_string(argument);
                self.reports.print(string);
                Ok(None)
            }
            Native::GetComposite => Ok(match argument {
                Some(Value::Integer(index)) => u32::try_from(*index)
                    .ok()
                    .and_then(|index| self.store.id_at(index))
                    .map(Value::Reference),
                _ => None,
            }),
            Native::GetCallsString => Ok(Some(Value::String(self.calls_string()))),
        }
    }

    /// Text of a value as `print` shows it: primitives as text, composites
    /// as their JSON.
    pub fn value_string(&self, value: Option<&Value>) -> String {
        match value {
            None => "nil".to_string(),
            Some(value @ (Value::Boolean(_) | Value::Integer(_) | Value::Float(_) | Value::String(_))) => {
                value.to_string()
            }
            Some(value) => {
                match self.value_composite(Some(value)).and_then(|id| self.store.get(id)) {
                    Some(composite) => json_or_debug(composite, value),
                    None => json_or_debug(value, value),
                }
            }
        }
    }
}

/// JSON text of `json`, or the `Debug` form of `value` if serialization fails.
fn json_or_debug(json: &impl serde::Serialize, value: &Value) -> String {
    serde_json::to_string(json).unwrap_or_else(|error| {
        log::warn!("Failed to serialize {value:?}: {error}");
        format!("{value:?}")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ScopeEntry;
    use crate::graph::Levels;
    use crate::report::Level;
    use crate::resolve::Matching;

    fn setup() -> (Interpreter, CompositeId) {
        let mut interpreter = Interpreter::default();
        let global = interpreter.create_namespace(Some("Global"), None, Levels::Own);
        interpreter.push_scope(ScopeEntry::namespace(global));
        interpreter.control.push();
        interpreter.register_builtins(global);
        (interpreter, global)
    }

    fn builtin(interpreter: &Interpreter, global: CompositeId, name: &str, arguments: &[Argument]) -> CompositeId {
        interpreter
            .find_member_overload(global, name, &Matching::Call(arguments), true)
            .and_then(|resolved| resolved.matching)
            .unwrap()
    }

    #[test]
    fn print_records_output() {
        let (mut interpreter, global) = setup();
        let arguments = [Argument::positional(Some(Value::Integer(7)))];
        let print = builtin(&interpreter, global, "print", &arguments);

        interpreter.call_function(None, print, &arguments, None, None).unwrap();
        interpreter.call_function(None, print, &[Argument::positional(None)], None, None).unwrap();

        let output: Vec<&str> = interpreter.reports().iter().map(|report| report.string.as_str()).collect();
        assert_eq!(output, ["7", "nil"]);
        assert!(interpreter.reports().iter().all(|report| report.level == Level::Info));
    }

    #[test]
    fn get_composite_resolves_slots() {
        let (mut interpreter, global) = setup();
        let arguments = [Argument::positional(Some(Value::Integer(0)))];
        let get_composite = builtin(&interpreter, global, "getComposite", &arguments);

        let value = interpreter.call_function(None, get_composite, &arguments, None, None).unwrap();
        assert_eq!(value, Some(Value::Reference(global)));

        let missing = [Argument::positional(Some(Value::Integer(-1)))];
        assert_eq!(interpreter.call_function(None, get_composite, &missing, None, None).unwrap(), None);
    }

    #[test]
    fn registering_twice_replaces_builtins() {
        let (mut interpreter, global) = setup();
        let before = interpreter.store().live_count();
        interpreter.register_builtins(global);

        assert_eq!(interpreter.store().live_count(), before);
        let members = &interpreter.store().get(global).unwrap().members;
        assert_eq!(members["print"].len(), 1);
    }

    #[test]
    fn signatures_expose_one_value_parameter() {
        let type_ = Native::Print.signature();
        assert_eq!(type_.function_parameters().len(), 1);
        assert!(Native::GetCallsString.signature().function_parameters().is_empty());
        let result = type_.function_return().and_then(|index| type_.part(index)).unwrap();
        assert!(result.nillable);
    }

    #[test]
    fn unserializable_values_fall_back_to_debug() {
        let keyed_by_pairs = std::collections::HashMap::from([((1, 2), 3)]);
        assert_eq!(json_or_debug(&keyed_by_pairs, &Value::Integer(1)), "Integer(1)");
        assert_eq!(json_or_debug(&[1, 2], &Value::Integer(1)), "[1,2]");
    }
}
