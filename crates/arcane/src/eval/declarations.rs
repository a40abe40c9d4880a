//! Declarations.
//!
//! Class and structure bodies are split when declared: static statements,
//! initializers and deinitializers run in the composite itself, everything
//! else is kept as the object statements every new object runs. Function
//! declarations belong to both lists.

use crate::ast::{CompositeDeclaration, FunctionDeclaration, Node, NodeKind};
use crate::composite::{Associativity, CompositeId, Kind, Observer, Overload, Statements};
use crate::context::{Interpreter, ScopeEntry};
use crate::control::Flow;
use crate::report::Level;
use crate::resolve::Placement;
use crate::types::{Collection, Predefined, Requirement, Type};
use crate::value::Value;

use super::integer_literal;

/// Splits a body into the statements run at declaration and the statements
/// kept for objects.
pub(crate) fn separate_statements(statements: &[Node]) -> (Vec<Node>, Vec<Node>) {
    let mut statics = Vec::new();
    let mut objects = Vec::new();
    for statement in statements {
        match &statement.kind {
            NodeKind::InitializerDeclaration { .. } | NodeKind::DeinitializerDeclaration { .. } => {
                statics.push(statement.clone());
            }
            _ if statement.modifiers().iter().any(|modifier| modifier == "static") => {
                statics.push(statement.clone());
            }
            NodeKind::FunctionDeclaration(_) => {
                objects.push(statement.clone());
                statics.push(statement.clone());
            }
            _ => objects.push(statement.clone()),
        }
    }
    (statics, objects)
}

fn body_statements(body: Option<&Node>) -> &[Node] {
    body.map(Node::statements).unwrap_or_default()
}

/// Signature of a `willSet`/`didSet` observer.
fn observer_signature(parameter: &str) -> Type {
    let mut type_ = Type::predefined(Predefined::Function);
    let parameters = type_.collection_part(Some(0), None, Collection::Parameters);
    let part = type_.push(Some(parameters));
    if let Some(part) = type_.part_mut(part) {
        part.predefined = Some(Predefined::Wildcard);
        part.nillable = true;
        part.identifier = Some(parameter.to_string());
    }
    type_
}

fn function_member(function: CompositeId, modifiers: &[String]) -> Overload {
    Overload::new(Type::predefined(Predefined::Function), Some(Value::Reference(function))).with_modifiers(modifiers)
}

impl Interpreter {
    pub(super) fn variable_declaration(&mut self, modifiers: &[String], declarators: &[Node], scope: CompositeId) -> Flow {
        for declarator in declarators {
            let NodeKind::Declarator {
                identifier,
                type_,
                value,
                body,
            } = &declarator.kind
            else {
                continue;
            };
            let Some(identifier) = identifier.as_deref().and_then(Node::identifier_value) else {
                continue;
            };

            let type_ = self.type_of(type_.as_deref(), scope);
            let value = self.eval_child(value.as_deref(), scope)?;
            let observers = self.observers(body.as_deref(), scope);
            let overload = Overload {
                modifiers: modifiers.to_vec(),
                type_,
                value,
                observers,
            };
            self.set_member_overload(scope, identifier, overload, Placement::Local);
        }
        Ok(None)
    }

    fn observers(&mut self, body: Option<&Node>, scope: CompositeId) -> Vec<Observer> {
        let mut observers = Vec::new();
        for statement in body_statements(body) {
            let NodeKind::ObserverDeclaration { identifier, body } = &statement.kind else {
                continue;
            };
            let (identifier, parameter) = match identifier.as_deref().and_then(Node::identifier_value) {
                Some("willSet") => ("willSet", "newValue"),
                Some("didSet") => ("didSet", "oldValue"),
                _ => continue,
            };
            let function = self.create_function(
                Some(identifier),
                Statements::block(body_statements(body.as_deref()).to_vec()),
                Some(scope),
            );
            self.set_type(function, observer_signature(parameter));
            observers.push(Observer {
                identifier: identifier.to_string(),
                value: function,
            });
        }
        observers
    }

    /// A function declared in a class body is a placeholder holding the
    /// static part of its body; objects redeclare it with the instance part.
    pub(super) fn function_declaration(&mut self, declaration: &FunctionDeclaration, scope: CompositeId) -> Flow {
        let Some(identifier) = declaration.identifier.as_deref().and_then(Node::identifier_value) else {
            return Ok(None);
        };
        let modifiers = &declaration.modifiers;
        let (statics, objects) = separate_statements(body_statements(declaration.body.as_deref()));
        let object = self.store.is_kind(Some(scope), Kind::Object);
        let instantiable = self.store.kind_of(scope).is_some_and(Kind::is_instantiable);
        let static_declaration = modifiers.iter().any(|modifier| modifier == "static") || (!object && !instantiable);

        let (body, signature, statics) = match (static_declaration, object) {
            (true, false) => (objects, declaration.signature.as_deref(), statics),
            (true, true) => return Ok(None),
            (false, true) => (objects, declaration.signature.as_deref(), Vec::new()),
            (false, false) if statics.is_empty() => return Ok(None),
            (false, false) => (Vec::new(), None, statics),
        };

        let function = self.create_function(Some(identifier), Statements::block(body), Some(scope));
        let signature = self.function_signature(signature, scope);
        self.set_type(function, signature);
        self.set_member_overload(scope, identifier, function_member(function, modifiers), Placement::Append);
        self.execute_statements(&statics, function)?;
        Ok(None)
    }

    pub(super) fn function_expression(&mut self, declaration: &FunctionDeclaration, scope: CompositeId) -> Flow {
        let title = declaration.identifier.as_deref().and_then(Node::identifier_value);
        let statements = body_statements(declaration.body.as_deref()).to_vec();
        let function = self.create_function(title, Statements::block(statements), Some(scope));
        let signature = self.function_signature(declaration.signature.as_deref(), scope);
        self.set_type(function, signature);
        Ok(Some(Value::Reference(function)))
    }

    /// `init` returns `Self` (optionally nillable) and yields `self` unless
    /// its body ends with an explicit return.
    pub(super) fn initializer_declaration(
        &mut self,
        modifiers: &[String],
        nillable: bool,
        signature: Option<&Node>,
        body: Option<&Node>,
        scope: CompositeId,
    ) -> Flow {
        let mut return_type = Node::new(NodeKind::TypeIdentifier {
            identifier: Some(Box::new(Node::identifier("Self"))),
            generic_arguments: Vec::new(),
        });
        if nillable {
            return_type = Node::new(NodeKind::NillableType {
                value: Some(Box::new(return_type)),
            });
        }
        let mut signature = match signature {
            Some(signature @ Node {
                kind: NodeKind::FunctionSignature { .. },
                ..
            }) => signature.clone(),
            _ => empty_signature(),
        };
        if let NodeKind::FunctionSignature { return_type: slot, .. } = &mut signature.kind {
            *slot = Some(Box::new(return_type));
        }
        let mut type_ = self.function_signature(Some(&signature), scope);
        if let Some(root) = type_.part_mut(0) {
            root.inits = Some(Requirement::Present);
        }

        let mut statements = body_statements(body).to_vec();
        if !matches!(statements.last().map(|node| &node.kind), Some(NodeKind::ReturnStatement { .. })) {
            statements.push(Node::new(NodeKind::ReturnStatement {
                value: Some(Box::new(Node::identifier("self"))),
            }));
        }

        let function = self.create_function(Some("init"), Statements::block(statements), Some(scope));
        self.set_type(function, type_);
        self.set_member_overload(scope, "init", function_member(function, modifiers), Placement::Append);
        Ok(None)
    }

    pub(super) fn deinitializer_declaration(&mut self, body: Option<&Node>, scope: CompositeId) -> Flow {
        let mut type_ = self.function_signature(None, scope);
        if let Some(root) = type_.part_mut(0) {
            root.deinits = Some(Requirement::Present);
        }
        let statements = body_statements(body).to_vec();
        let function = self.create_function(Some("deinit"), Statements::block(statements), Some(scope));
        self.set_type(function, type_);
        self.set_member_overload(scope, "deinit", function_member(function, &[]), Placement::Append);
        Ok(None)
    }

    /// Declares a class, structure, enumeration, protocol or namespace and
    /// runs its static statements inside it. Anonymous forms evaluate to a
    /// reference instead of declaring a member.
    pub(super) fn composite_declaration(
        &mut self,
        declaration: &CompositeDeclaration,
        kind: Kind,
        scope: CompositeId,
        anonymous: bool,
    ) -> Flow {
        let identifier = declaration.identifier.as_deref().and_then(Node::identifier_value);
        if !anonymous && identifier.is_none() {
            return Ok(None);
        }

        let composite = self.create_self_leveled(identifier, kind, Some(scope));
        let mut type_ = self
            .store
            .get(composite)
            .map(|composite| composite.type_.clone())
            .unwrap_or_default();
        if !declaration.generic_parameters.is_empty() {
            let generic = type_.collection_part(None, Some(0), Collection::GenericParameters);
            for parameter in &declaration.generic_parameters {
                self.generic_parameter(&mut type_, generic, parameter, scope);
            }
        }
        if !declaration.inherited_types.is_empty() {
            let inherited = type_.collection_part(None, Some(0), Collection::InheritedTypes);
            for inherited_type in &declaration.inherited_types {
                self.type_part(&mut type_, Some(inherited), Some(inherited_type), scope, false);
            }
        }
        let super_type = type_.inherited_reference();
        self.set_type(composite, type_);
        if kind == Kind::Class && super_type.is_some() {
            self.set_super_levels(composite, super_type);
        }

        let mut statics = body_statements(declaration.body.as_deref()).to_vec();
        if kind.is_instantiable() {
            let (separated, objects) = separate_statements(&statics);
            statics = separated;
            if let Some(target) = self.store.get_mut(composite) {
                target.statements = Statements::block(objects);
            }
        }

        let value = Value::Reference(composite);
        if let Some(identifier) = identifier.filter(|_| !anonymous) {
            let overload = Overload::new(Type::composite_self(kind.predefined()), Some(value.clone()))
                .with_modifiers(&declaration.modifiers);
            self.set_member_overload(scope, identifier, overload, Placement::Local);
        }

        self.with_scope(ScopeEntry::namespace(composite), false, |this| {
            this.execute_statements(&statics, composite)
        })?;

        Ok(anonymous.then_some(value))
    }

    /// Records `precedence` and `associativity` of an operator; both entries
    /// are required.
    pub(super) fn operator_declaration(
        &mut self,
        modifiers: &[String],
        operator: Option<&Node>,
        body: Option<&Node>,
        scope: CompositeId,
    ) -> Flow {
        let Some(operator) = operator.and_then(|operator| operator.operator_value().or(operator.identifier_value()))
        else {
            return Ok(None);
        };

        let mut precedence = None;
        let mut associativity = None;
        for statement in body_statements(body) {
            let NodeKind::Entry { key, value } = &statement.kind else {
                continue;
            };
            let (Some(key), Some(value)) = (key.as_deref().and_then(Node::identifier_value), value.as_deref()) else {
                continue;
            };
            match (key, &value.kind) {
                ("precedence", NodeKind::IntegerLiteral { value }) => {
                    if let Some(Value::Integer(value)) = integer_literal(value) {
                        precedence = Some(value);
                    }
                }
                ("associativity", NodeKind::Identifier { value }) => {
                    associativity = match value.as_str() {
                        "left" => Some(Associativity::Left),
                        "right" => Some(Associativity::Right),
                        "none" => Some(Associativity::None),
                        _ => associativity,
                    };
                }
                _ => {}
            }
        }

        let (Some(precedence), Some(associativity)) = (precedence, associativity) else {
            log::debug!("Operator {operator} declared without precedence or associativity");
            return Ok(None);
        };
        self.set_operator_overload(scope, operator, modifiers, precedence, associativity);
        Ok(None)
    }

    /// `import X` records `X` under its name in the current namespace.
    pub(super) fn import_declaration(&mut self, node: &Node, value: Option<&Node>, scope: CompositeId) -> Flow {
        let imported = self.eval_child(value, scope)?;
        let Some(composite) = self.value_composite(imported.as_ref()) else {
            self.report(Level::Error, Some(node), "Composite wasn't found.");
            return Ok(None);
        };

        let alias = match value.map(|value| &value.kind) {
            Some(NodeKind::Identifier { value }) => value.clone(),
            Some(NodeKind::ChainExpression { member, .. }) => match member.as_deref().and_then(Node::identifier_value) {
                Some(member) => member.to_string(),
                None => self.title_of(composite),
            },
            _ => self.title_of(composite),
        };
        self.set_import(scope, &alias, composite);
        Ok(None)
    }
}

fn empty_signature() -> Node {
    Node::new(NodeKind::FunctionSignature {
        generic_parameters: Vec::new(),
        parameters: Vec::new(),
        inits: Requirement::Absent,
        deinits: Requirement::Absent,
        awaits: Requirement::Absent,
        throws: Requirement::Absent,
        return_type: None,
    })
}
