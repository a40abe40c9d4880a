//! Rule dispatch.
//!
//! Every node kind is evaluated by one arm of [`Interpreter::eval`]. Rules
//! return [`Flow`]: a value, or `Err(Unwind)` while an explicit control
//! transfer is active in the current frame.

mod declarations;
mod expressions;
mod operators;
mod statements;
mod types;

pub(crate) use expressions::Place;

use crate::ast::{Literal, Node, NodeKind};
use crate::composite::{CompositeId, Kind};
use crate::context::{Interpreter, ScopeEntry};
use crate::control::{Flow, TransferKind, Unwind};
use crate::graph::Levels;
use crate::report::Level;
use crate::value::Value;

impl Interpreter {
    pub fn eval(&mut self, node: &Node, scope: CompositeId) -> Flow {
        log::trace!("Evaluating {} in {scope}", node.type_name());

        match &node.kind {
            NodeKind::Module { statements } | NodeKind::Body { statements } => {
                self.execute_statements(statements, scope)
            }

            NodeKind::Identifier { value } => self.identifier(node, value, scope),
            NodeKind::BooleanLiteral { value } => Ok(Some(Value::Boolean(value.text() == "true"))),
            NodeKind::IntegerLiteral { value } => Ok(integer_literal(value)),
            NodeKind::FloatLiteral { value } => Ok(float_literal(value)),
            NodeKind::NilLiteral => Ok(None),
            NodeKind::StringLiteral { segments } => self.string_literal(segments, scope),
            NodeKind::StringSegment { value } => Ok(Some(Value::String(value.clone()))),
            NodeKind::StringExpression { value }
            | NodeKind::ParenthesizedExpression { value }
            | NodeKind::Entry { value, .. }
            | NodeKind::Argument { value, .. } => self.eval_child(value.as_deref(), scope),
            NodeKind::ArrayLiteral { values } => self.array_literal(node, values, scope),
            NodeKind::DictionaryLiteral { entries } => self.dictionary_literal(node, entries, scope),

            NodeKind::ExpressionsSequence { values } => self.expressions_sequence(node, values, scope),
            NodeKind::PrefixExpression { operator, value } => {
                self.prefix_expression(node, operator.as_deref(), value.as_deref(), scope)
            }
            NodeKind::PostfixExpression { operator, value } => {
                self.postfix_expression(node, operator.as_deref(), value.as_deref(), scope)
            }
            NodeKind::CallExpression { .. }
            | NodeKind::ChainExpression { .. }
            | NodeKind::SubscriptExpression { .. }
            | NodeKind::NillableExpression { .. } => {
                let flow = self.postfix(node, scope);
                self.absorb_nil_unwrap(flow)
            }
            NodeKind::InoutExpression { value } => self.inout_expression(node, value.as_deref(), scope),
            NodeKind::TryExpression { nillable, value } => self.try_expression(*nillable, value.as_deref(), scope),
            NodeKind::DeleteExpression { value } => self.delete_expression(node, value.as_deref(), scope),
            NodeKind::TypeExpression { type_ } => Ok(Some(Value::Type(self.type_of(type_.as_deref(), scope)))),
            NodeKind::FunctionExpression(declaration) => self.function_expression(declaration, scope),
            NodeKind::ClassExpression(declaration) => {
                self.composite_declaration(declaration, Kind::Class, scope, true)
            }
            NodeKind::StructureExpression(declaration) => {
                self.composite_declaration(declaration, Kind::Structure, scope, true)
            }
            NodeKind::EnumerationExpression(declaration) => {
                self.composite_declaration(declaration, Kind::Enumeration, scope, true)
            }
            NodeKind::ProtocolExpression(declaration) => {
                self.composite_declaration(declaration, Kind::Protocol, scope, true)
            }
            NodeKind::NamespaceExpression(declaration) => {
                self.composite_declaration(declaration, Kind::Namespace, scope, true)
            }

            NodeKind::VariableDeclaration { modifiers, declarators } => {
                self.variable_declaration(modifiers, declarators, scope)
            }
            NodeKind::FunctionDeclaration(declaration) => self.function_declaration(declaration, scope),
            NodeKind::InitializerDeclaration {
                modifiers,
                nillable,
                signature,
                body,
            } => self.initializer_declaration(modifiers, *nillable, signature.as_deref(), body.as_deref(), scope),
            NodeKind::DeinitializerDeclaration { body } => self.deinitializer_declaration(body.as_deref(), scope),
            NodeKind::ClassDeclaration(declaration) => {
                self.composite_declaration(declaration, Kind::Class, scope, false)
            }
            NodeKind::StructureDeclaration(declaration) => {
                self.composite_declaration(declaration, Kind::Structure, scope, false)
            }
            NodeKind::EnumerationDeclaration(declaration) => {
                self.composite_declaration(declaration, Kind::Enumeration, scope, false)
            }
            NodeKind::ProtocolDeclaration(declaration) => {
                self.composite_declaration(declaration, Kind::Protocol, scope, false)
            }
            NodeKind::NamespaceDeclaration(declaration) => {
                self.composite_declaration(declaration, Kind::Namespace, scope, false)
            }
            NodeKind::OperatorDeclaration {
                modifiers,
                operator,
                body,
            } => self.operator_declaration(modifiers, operator.as_deref(), body.as_deref(), scope),
            NodeKind::ImportDeclaration { value } => self.import_declaration(node, value.as_deref(), scope),

            NodeKind::IfStatement { condition, then, else_ } => {
                self.if_statement(condition.as_deref(), then.as_deref(), else_.as_deref(), scope)
            }
            NodeKind::WhileStatement { condition, value } => {
                self.while_statement(condition.as_deref(), value.as_deref(), scope)
            }
            NodeKind::ReturnStatement { value } => self.transfer(value.as_deref(), TransferKind::Return, scope),
            NodeKind::ThrowStatement { value } => self.transfer(value.as_deref(), TransferKind::Throw, scope),
            // Labels are kept in the tree only; loops are unlabeled.
            NodeKind::BreakStatement { .. } => self.transfer(None, TransferKind::Break, scope),
            NodeKind::ContinueStatement { .. } => self.transfer(None, TransferKind::Continue, scope),

            // Operators, signatures and types are read by their parent rules.
            NodeKind::InfixOperator { .. }
            | NodeKind::PrefixOperator { .. }
            | NodeKind::PostfixOperator { .. }
            | NodeKind::Declarator { .. }
            | NodeKind::ObserverDeclaration { .. }
            | NodeKind::FunctionSignature { .. }
            | NodeKind::Parameter { .. }
            | NodeKind::GenericParameter { .. }
            | NodeKind::PredefinedType { .. }
            | NodeKind::TypeIdentifier { .. }
            | NodeKind::ArrayType { .. }
            | NodeKind::DictionaryType { .. }
            | NodeKind::UnionType { .. }
            | NodeKind::IntersectionType { .. }
            | NodeKind::FunctionType { .. }
            | NodeKind::NillableType { .. }
            | NodeKind::DefaultType { .. }
            | NodeKind::InoutType { .. }
            | NodeKind::VariadicType { .. }
            | NodeKind::ParenthesizedType { .. }
            | NodeKind::ProtocolType => Ok(None),

            NodeKind::Unsupported => {
                log::trace!("Skipping unsupported node at token {}", node.range.start);
                Ok(None)
            }
        }
    }

    pub(crate) fn eval_child(&mut self, node: Option<&Node>, scope: CompositeId) -> Flow {
        match node {
            Some(node) => self.eval(node, scope),
            None => Ok(None),
        }
    }

    /// Runs a statement list. The value of the last statement becomes the
    /// implicit transfer of the frame and is returned.
    ///
    /// Only the tail statement's value stays in the frame: a value left there
    /// by a nested list (an `if` branch, say) is dropped once the enclosing
    /// statement completes.
    pub(crate) fn execute_statements(&mut self, nodes: &[Node], scope: CompositeId) -> Flow {
        let mut value = None;
        for (position, node) in nodes.iter().enumerate() {
            value = self.execute_statement(node, scope, position + 1 == nodes.len())?;
        }
        Ok(value)
    }

    /// Evaluates one statement, then collects every composite it allocated
    /// that nothing retains.
    fn execute_statement(&mut self, node: &Node, scope: CompositeId, tail: bool) -> Flow {
        let start = self.store.len();
        let result = self.eval(node, scope);
        let displaced = match &result {
            Ok(value) if tail => self.control.set(value.clone(), None),
            Ok(_) => self.control.take(),
            Err(Unwind) => None,
        };
        self.collect_allocated(start);
        self.collect_transfer(displaced);
        result
    }

    fn collect_allocated(&mut self, start: usize) {
        let end = self.store.len();
        for index in start..end {
            if let Some(id) = u32::try_from(index).ok().and_then(|index| self.store.id_at(index)) {
                self.destroy_if_released(id);
            }
        }
    }

    /// Turns a pending nil-unwrap back into absence.
    pub(crate) fn absorb_nil_unwrap(&mut self, flow: Flow) -> Flow {
        match flow {
            Err(Unwind) if self.control.kind() == Some(&TransferKind::NilUnwrap) => {
                self.reset_transfer();
                Ok(None)
            }
            flow => flow,
        }
    }

    /// Evaluates the postfix forms without absorbing a nil-unwrap, so that
    /// `a?.b.c` stops at the first nil and yields nil as a whole.
    pub(crate) fn postfix(&mut self, node: &Node, scope: CompositeId) -> Flow {
        match &node.kind {
            NodeKind::ChainExpression { composite, member } => {
                self.chain_expression(node, composite.as_deref(), member.as_deref(), scope)
            }
            NodeKind::CallExpression {
                callee,
                generic_arguments,
                arguments,
                closure,
            } => self.call_expression(
                node,
                callee.as_deref(),
                generic_arguments,
                arguments,
                closure.as_deref(),
                scope,
            ),
            NodeKind::SubscriptExpression {
                composite,
                arguments,
                closure,
                ..
            } => self.subscript_expression(node, composite.as_deref(), arguments, closure.as_deref(), scope),
            NodeKind::NillableExpression { value } => {
                let value = match value {
                    Some(value) => self.postfix(value, scope)?,
                    None => None,
                };
                if value.is_none() {
                    self.set_transfer(None, Some(TransferKind::NilUnwrap));
                    return Err(Unwind);
                }
                Ok(value)
            }
            _ => self.eval(node, scope),
        }
    }

    /// Runs a module in the global namespace (slot 0, reused when the store
    /// was seeded by an earlier run).
    pub fn run_module(&mut self, tree: &Node) {
        let global = match self.global() {
            Some(global) => global,
            None => self.create_namespace(Some("Global"), None, Levels::Own),
        };
        self.register_builtins(global);
        log::debug!("Running module of {} statements", tree.statements().len());

        self.push_scope(ScopeEntry::namespace(global));
        self.control.push();

        for node in tree.statements() {
            if self.execute_statement(node, global, false).is_ok() {
                continue;
            }
            let transfer = self.control.take();
            let stop = match transfer.as_ref().and_then(|transfer| transfer.kind.as_ref()) {
                Some(TransferKind::Throw) => {
                    let value = self.value_string(transfer.as_ref().and_then(|transfer| transfer.value.as_ref()));
                    self.report(Level::Error, Some(node), &format!("Uncaught throw of {value}."));
                    true
                }
                Some(TransferKind::Return) => true,
                Some(TransferKind::Abort) => {
                    log::warn!("Statement at token {} was abandoned", node.range.start);
                    false
                }
                _ => false,
            };
            self.collect_transfer(transfer);
            if stop {
                break;
            }
        }

        self.control.pop();
        self.pop_scope(true);
    }

    /// Title used in generated namespace titles.
    pub(crate) fn title_of(&self, id: CompositeId) -> String {
        match self.store.get(id).and_then(|composite| composite.title.clone()) {
            Some(title) => title,
            None => id.to_string(),
        }
    }

    pub(crate) fn value_composite(&self, value: Option<&Value>) -> Option<CompositeId> {
        value
            .and_then(Value::composite)
            .filter(|id| self.store.is_valid(*id))
    }
}

fn integer_literal(literal: &Literal) -> Option<Value> {
    match literal {
        Literal::Integer(value) => Some(Value::Integer(*value)),
        Literal::Float(value) => Some(Value::Float(*value)),
        Literal::Boolean(value) => Some(Value::Integer(i64::from(*value))),
        Literal::Text(text) => {
            let text = text.replace('_', "");
            text.parse::<i64>()
                .map(Value::Integer)
                .or_else(|_| text.parse::<f64>().map(Value::Float))
                .ok()
        }
    }
}

fn float_literal(literal: &Literal) -> Option<Value> {
    match literal {
        Literal::Integer(value) => Some(Value::Float(*value as f64)),
        Literal::Float(value) => Some(Value::Float(*value)),
        Literal::Boolean(value) => Some(Value::Float(f64::from(u8::from(*value)))),
        Literal::Text(text) => text.replace('_', "").parse::<f64>().map(Value::Float).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_parse_source_text() {
        assert_eq!(integer_literal(&Literal::Text("1_000".into())), Some(Value::Integer(1000)));
        assert_eq!(integer_literal(&Literal::Text("x".into())), None);
        assert_eq!(float_literal(&Literal::Text("2.5".into())), Some(Value::Float(2.5)));
        assert_eq!(float_literal(&Literal::Integer(2)), Some(Value::Float(2.0)));
    }
}
