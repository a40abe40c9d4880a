use crate::ast::{Node, NodeKind};
use crate::composite::CompositeId;
use crate::context::{Interpreter, ScopeEntry};
use crate::control::{Flow, TransferKind, Unwind};
use crate::graph::Levels;
use crate::value::is_truthy;

impl Interpreter {
    /// Transient namespace of an `if` or `while` body.
    fn local_namespace(&mut self, scope: CompositeId, statement: &str) -> CompositeId {
        let title = format!("Local<{}, {statement}>", self.title_of(scope));
        self.create_namespace(Some(&title), Some(scope), Levels::Missing)
    }

    /// Runs a branch: bodies as statement lists, anything else as an
    /// expression.
    fn branch(&mut self, branch: Option<&Node>, namespace: CompositeId) -> Flow {
        match branch {
            Some(node @ Node {
                kind: NodeKind::Body { .. },
                ..
            }) => self.execute_statements(node.statements(), namespace),
            branch => self.eval_child(branch, namespace),
        }
    }

    pub(super) fn if_statement(
        &mut self,
        condition: Option<&Node>,
        then: Option<&Node>,
        else_: Option<&Node>,
        scope: CompositeId,
    ) -> Flow {
        let namespace = self.local_namespace(scope, "If");
        let outcome = self.with_scope(ScopeEntry::namespace(namespace), true, |this| {
            let condition = this.eval_child(condition, namespace)?;
            if is_truthy(condition.as_ref()) {
                return this.branch(then, namespace).map(Some);
            }
            match else_ {
                Some(Node {
                    kind: NodeKind::IfStatement { .. },
                    ..
                }) => Ok(None),
                else_ => this.branch(else_, namespace).map(Some),
            }
        })?;

        match outcome {
            Some(value) => Ok(value),
            // `else if` chains continue in the enclosing scope.
            None => self.eval_child(else_, scope),
        }
    }

    pub(super) fn while_statement(&mut self, condition: Option<&Node>, body: Option<&Node>, scope: CompositeId) -> Flow {
        loop {
            let namespace = self.local_namespace(scope, "While");
            let result = self.with_scope(ScopeEntry::namespace(namespace), true, |this| {
                let condition = this.eval_child(condition, namespace)?;
                if !is_truthy(condition.as_ref()) {
                    return Ok(false);
                }
                this.branch(body, namespace)?;
                Ok(true)
            });

            match result {
                Ok(true) => self.reset_transfer(),
                Ok(false) => return Ok(None),
                Err(Unwind) => match self.control.kind() {
                    Some(TransferKind::Break) => {
                        self.reset_transfer();
                        return Ok(None);
                    }
                    Some(TransferKind::Continue) => self.reset_transfer(),
                    _ => return Err(Unwind),
                },
            }
        }
    }

    /// `return`, `throw`, `break` and `continue`.
    pub(super) fn transfer(&mut self, value: Option<&Node>, kind: TransferKind, scope: CompositeId) -> Flow {
        let value = self.eval_child(value, scope)?;
        log::trace!("Transfer {kind:?}");
        self.set_transfer(value, Some(kind));
        Err(Unwind)
    }
}
