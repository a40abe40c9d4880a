//! Type expressions and function signatures.
//!
//! Type nodes are flattened into [`Type`] parts. Modifier nodes (nillable,
//! default, inout, variadic, parenthesized) decorate the part of the type
//! they wrap instead of adding one.

use std::sync::Arc;

use crate::ast::{Node, NodeKind};
use crate::composite::{CompositeId, Kind};
use crate::context::Interpreter;
use crate::report::Level;
use crate::resolve::Matching;
use crate::types::{Collection, Predefined, Requirement, Type, TypePart};

impl Interpreter {
    pub(crate) fn type_of(&mut self, node: Option<&Node>, scope: CompositeId) -> Type {
        let mut type_ = Type::new();
        self.type_part(&mut type_, None, node, scope, true);
        type_
    }

    /// Appends the part described by `node` under `parent`. With `fallback`
    /// a part left blank becomes `_?`.
    pub(crate) fn type_part(
        &mut self,
        type_: &mut Type,
        parent: Option<usize>,
        node: Option<&Node>,
        scope: CompositeId,
        fallback: bool,
    ) -> usize {
        let index = type_.push(parent);
        if let Some(node) = node {
            self.fill(type_, index, node, scope);
        }
        if fallback
            && let Some(part) = type_.part_mut(index)
            && part.is_blank()
        {
            part.predefined = Some(Predefined::Wildcard);
            part.nillable = true;
        }
        index
    }

    fn fill(&mut self, type_: &mut Type, index: usize, node: &Node, scope: CompositeId) {
        match &node.kind {
            NodeKind::PredefinedType { value } => {
                let predefined = Predefined::parse(value);
                if predefined.is_none() {
                    log::trace!("Unknown predefined type {value}");
                }
                if let Some(part) = type_.part_mut(index) {
                    part.predefined = predefined;
                }
            }
            NodeKind::ProtocolType => {
                if let Some(part) = type_.part_mut(index) {
                    part.predefined = Some(Predefined::Protocol);
                }
            }
            NodeKind::TypeIdentifier {
                identifier,
                generic_arguments,
            } => {
                let name = identifier.as_deref().and_then(Node::identifier_value);
                let composite = name.and_then(|name| self.type_composite(name, scope));
                match composite {
                    Some(composite) => {
                        if let Some(part) = type_.part_mut(index) {
                            part.reference = Some(composite);
                        }
                    }
                    None => {
                        if let Some(part) = type_.part_mut(index) {
                            part.predefined = Some(Predefined::Any);
                        }
                        self.report(Level::Error, Some(node), "Composite is an object or wasn't found.");
                    }
                }
                if !generic_arguments.is_empty() {
                    let arguments = type_.collection_part(None, Some(index), Collection::GenericArguments);
                    for argument in generic_arguments {
                        self.type_part(type_, Some(arguments), Some(argument), scope, true);
                    }
                }
            }
            NodeKind::ArrayType { value } => {
                self.collection_type(type_, index, "Array", &[value.as_deref()], Collection::Array, scope);
            }
            NodeKind::DictionaryType { key, value } => self.collection_type(
                type_,
                index,
                "Dictionary",
                &[key.as_deref(), value.as_deref()],
                Collection::Dictionary,
                scope,
            ),
            NodeKind::UnionType { subtypes } | NodeKind::IntersectionType { subtypes } => {
                let collection = match node.kind {
                    NodeKind::UnionType { .. } => Collection::Union,
                    _ => Collection::Intersection,
                };
                let collection = type_.collection_part(None, Some(index), collection);
                for subtype in subtypes {
                    self.type_part(type_, Some(collection), Some(subtype), scope, true);
                }
            }
            NodeKind::FunctionType {
                generic_parameter_types,
                parameter_types,
                awaits,
                throws,
                return_type,
            } => {
                let function = match type_.part(index) {
                    Some(part) if part.is_collection() => type_.push(Some(index)),
                    _ => index,
                };
                if let Some(part) = type_.part_mut(function) {
                    part.predefined = Some(Predefined::Function);
                    part.awaits = Some(*awaits);
                    part.throws = Some(*throws);
                }
                let generic = type_.collection_part(Some(function), None, Collection::GenericParameters);
                for parameter in generic_parameter_types {
                    self.type_part(type_, Some(generic), Some(parameter), scope, true);
                }
                let parameters = type_.collection_part(Some(function), None, Collection::Parameters);
                for parameter in parameter_types {
                    self.type_part(type_, Some(parameters), Some(parameter), scope, true);
                }
                self.type_part(type_, Some(function), return_type.as_deref(), scope, true);
            }
            NodeKind::NillableType { value } | NodeKind::DefaultType { value } => {
                if let Some(part) = type_.part_mut(index)
                    && !part.nillable
                    && !part.default
                {
                    match node.kind {
                        NodeKind::NillableType { .. } => part.nillable = true,
                        _ => part.default = true,
                    }
                }
                if let Some(value) = value {
                    self.fill(type_, index, value, scope);
                }
            }
            NodeKind::InoutType { value } | NodeKind::VariadicType { value } => {
                if let Some(part) = type_.part_mut(index) {
                    match node.kind {
                        NodeKind::InoutType { .. } => part.inout = true,
                        _ => part.variadic = true,
                    }
                }
                if let Some(value) = value {
                    self.fill(type_, index, value, scope);
                }
            }
            NodeKind::ParenthesizedType { value } => {
                if let Some(value) = value {
                    self.fill(type_, index, value, scope);
                }
            }
            _ => log::trace!("{} is not a type", node.type_name()),
        }
    }

    /// Non-object composite named `name`, visible from `scope`.
    fn type_composite(&self, name: &str, scope: CompositeId) -> Option<CompositeId> {
        self.find_member_overload(scope, name, &Matching::Composite, false)
            .and_then(|resolved| resolved.matching)
            .filter(|composite| !self.store.is_kind(Some(*composite), Kind::Object))
    }

    /// `[T]` and `[K: V]` reference an in-scope `Array`/`Dictionary`
    /// composite when one exists, else carry the collection flag.
    fn collection_type(
        &mut self,
        type_: &mut Type,
        index: usize,
        title: &str,
        elements: &[Option<&Node>],
        collection: Collection,
        scope: CompositeId,
    ) {
        let parent = match self.type_composite(title, scope) {
            Some(composite) => {
                if let Some(part) = type_.part_mut(index) {
                    part.reference = Some(composite);
                }
                type_.collection_part(None, Some(index), Collection::GenericArguments)
            }
            None => type_.collection_part(None, Some(index), collection),
        };
        for element in elements {
            self.type_part(type_, Some(parent), *element, scope, true);
        }
    }

    /// Function type of a declaration: root requirements, generic
    /// parameters, parameters and the return type, in that part order.
    pub(crate) fn function_signature(&mut self, node: Option<&Node>, scope: CompositeId) -> Type {
        let mut type_ = Type::predefined(Predefined::Function);
        let (generic_parameters, parameters, requirements, return_type) = match node.map(|node| &node.kind) {
            Some(NodeKind::FunctionSignature {
                generic_parameters,
                parameters,
                inits,
                deinits,
                awaits,
                throws,
                return_type,
            }) => (
                generic_parameters.as_slice(),
                parameters.as_slice(),
                [*inits, *deinits, *awaits, *throws],
                return_type.as_deref(),
            ),
            _ => (&[][..], &[][..], [Requirement::Absent; 4], None),
        };
        if let Some(root) = type_.part_mut(0) {
            let [inits, deinits, awaits, throws] = requirements;
            root.inits = Some(inits);
            root.deinits = Some(deinits);
            root.awaits = Some(awaits);
            root.throws = Some(throws);
        }

        let generic = type_.collection_part(Some(0), None, Collection::GenericParameters);
        for parameter in generic_parameters {
            self.generic_parameter(&mut type_, generic, parameter, scope);
        }
        let parameters_part = type_.collection_part(Some(0), None, Collection::Parameters);
        for parameter in parameters {
            self.parameter(&mut type_, parameters_part, parameter, scope);
        }
        self.type_part(&mut type_, Some(0), return_type, scope, true);
        type_
    }

    fn parameter(&mut self, type_: &mut Type, parent: usize, node: &Node, scope: CompositeId) {
        let NodeKind::Parameter {
            label,
            identifier,
            type_: parameter_type,
            value,
        } = &node.kind
        else {
            return;
        };
        let index = type_.push(Some(parent));
        match parameter_type {
            Some(parameter_type) => self.fill(type_, index, parameter_type, scope),
            None => wildcard(type_.part_mut(index)),
        }
        if let Some(part) = type_.part_mut(index) {
            part.label = label
                .as_deref()
                .and_then(Node::identifier_value)
                .filter(|label| *label != "_")
                .map(str::to_string);
            part.identifier = identifier.as_deref().and_then(Node::identifier_value).map(str::to_string);
            part.value = value.as_deref().cloned().map(Arc::new);
        }
    }

    pub(super) fn generic_parameter(&mut self, type_: &mut Type, parent: usize, node: &Node, scope: CompositeId) {
        let NodeKind::GenericParameter {
            identifier,
            type_: constraint,
        } = &node.kind
        else {
            return;
        };
        let index = type_.push(Some(parent));
        match constraint {
            Some(constraint) => self.fill(type_, index, constraint, scope),
            None => wildcard(type_.part_mut(index)),
        }
        if let Some(part) = type_.part_mut(index) {
            part.identifier = identifier.as_deref().and_then(Node::identifier_value).map(str::to_string);
        }
    }
}

fn wildcard(part: Option<&mut TypePart>) {
    if let Some(part) = part {
        part.predefined = Some(Predefined::Wildcard);
        part.nillable = true;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::context::ScopeEntry;
    use crate::graph::Levels;

    fn node(value: serde_json::Value) -> Node {
        serde_json::from_value(value).unwrap()
    }

    fn setup() -> (Interpreter, CompositeId) {
        let mut interpreter = Interpreter::default();
        let global = interpreter.create_namespace(Some("Global"), None, Levels::Own);
        interpreter.push_scope(ScopeEntry::namespace(global));
        (interpreter, global)
    }

    #[test]
    fn modifiers_decorate_the_wrapped_part() {
        let (mut interpreter, global) = setup();
        let type_ = interpreter.type_of(
            Some(&node(json!({
                "type": "nillableType",
                "value": {"type": "predefinedType", "value": "int"}
            }))),
            global,
        );

        assert_eq!(type_.parts().len(), 1);
        let root = type_.root().unwrap();
        assert_eq!(root.predefined, Some(Predefined::Integer));
        assert!(root.nillable);
    }

    #[test]
    fn missing_type_identifiers_fall_back_to_any() {
        let (mut interpreter, global) = setup();
        let type_ = interpreter.type_of(
            Some(&node(json!({
                "type": "typeIdentifier",
                "identifier": {"type": "identifier", "value": "Missing"}
            }))),
            global,
        );

        assert_eq!(type_.root_predefined(), Some(Predefined::Any));
        assert_eq!(interpreter.reports()[0].level, Level::Error);
    }

    #[test]
    fn type_identifiers_reference_declared_composites() {
        let (mut interpreter, global) = setup();
        let class = interpreter.create_class(Some("Point"), Some(global));
        interpreter.set_member_overload(
            global,
            "Point",
            crate::composite::Overload::new(
                Type::composite_self(Predefined::Class),
                Some(crate::value::Value::Reference(class)),
            ),
            crate::resolve::Placement::Local,
        );

        let type_ = interpreter.type_of(
            Some(&node(json!({
                "type": "unionType",
                "subtypes": [
                    {"type": "typeIdentifier", "identifier": {"type": "identifier", "value": "Point"}},
                    {"type": "predefinedType", "value": "string"}
                ]
            }))),
            global,
        );

        assert!(type_.root().unwrap().union);
        let children: Vec<usize> = type_.children(0).collect();
        assert_eq!(type_.part(children[0]).unwrap().reference, Some(class));
        assert_eq!(type_.part(children[1]).unwrap().predefined, Some(Predefined::String));
    }

    #[test]
    fn signatures_lay_out_parameters_before_the_return_type() {
        let (mut interpreter, global) = setup();
        let signature = node(json!({
            "type": "functionSignature",
            "throws": 1,
            "parameters": [
                {
                    "type": "parameter",
                    "label": {"type": "identifier", "value": "_"},
                    "identifier": {"type": "identifier", "value": "values"},
                    "type_": {"type": "variadicType", "value": {"type": "predefinedType", "value": "int"}}
                },
                {
                    "type": "parameter",
                    "identifier": {"type": "identifier", "value": "scale"},
                    "value": {"type": "integerLiteral", "value": "2"}
                }
            ],
            "returnType": {"type": "predefinedType", "value": "float"}
        }));

        let type_ = interpreter.function_signature(Some(&signature), global);

        assert_eq!(type_.throws(), Requirement::Present);
        let parameters = type_.function_parameters();
        assert_eq!(parameters.len(), 2);
        let values = type_.part(parameters[0]).unwrap();
        assert!(values.variadic);
        assert_eq!(values.label, None);
        assert_eq!(values.identifier.as_deref(), Some("values"));
        assert!(type_.part(parameters[1]).unwrap().value.is_some());
        let result = type_.function_return().and_then(|index| type_.part(index)).unwrap();
        assert_eq!(result.predefined, Some(Predefined::Float));
    }
}
