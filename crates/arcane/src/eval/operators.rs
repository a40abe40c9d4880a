//! Operator expressions.
//!
//! An expressions sequence alternates operands and infix operators. It is
//! arranged into a tree by precedence climbing: declared operators found
//! through the scope chain take precedence over the built-in table.

use crate::ast::{Node, NodeKind};
use crate::composite::{Associativity, CompositeId};
use crate::context::Interpreter;
use crate::control::Flow;
use crate::report::Level;
use crate::resolve::{Argument, Matching};
use crate::value::{Value, is_truthy};

const DEFAULT_PRECEDENCE: i64 = 128;

#[derive(Debug)]
enum Operation<'a> {
    Operand(&'a Node),
    Infix {
        operator: &'a str,
        lhs: Box<Operation<'a>>,
        rhs: Box<Operation<'a>>,
    },
}

/// Built-in precedence and associativity of infix operators.
fn builtin_precedence(operator: &str) -> (i64, Associativity) {
    match operator {
        "=" | "+=" | "-=" | "*=" | "/=" | "%=" => (8, Associativity::Right),
        "||" => (16, Associativity::Left),
        "&&" => (24, Associativity::Left),
        "==" | "!=" | "<" | "<=" | ">" | ">=" => (32, Associativity::None),
        "+" | "-" => (64, Associativity::Left),
        "*" | "/" | "%" => (96, Associativity::Left),
        _ => (DEFAULT_PRECEDENCE, Associativity::Left),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    fn of(value: Option<&Value>) -> Option<Self> {
        match value? {
            Value::Integer(value) => Some(Number::Integer(*value)),
            Value::Float(value) => Some(Number::Float(*value)),
            _ => None,
        }
    }

    fn float(self) -> f64 {
        match self {
            Number::Integer(value) => value as f64,
            Number::Float(value) => value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperatorError {
    DivisionByZero,
    Overflow,
    Operands,
    Unknown,
}

impl OperatorError {
    fn report(self, operator: &str) -> (Level, String) {
        match self {
            OperatorError::DivisionByZero => (Level::Error, "Division by zero.".to_string()),
            OperatorError::Overflow => (Level::Error, "Integer overflow.".to_string()),
            OperatorError::Operands => (
                Level::Warning,
                format!("Operator \"{operator}\" can't be applied to these operands."),
            ),
            OperatorError::Unknown => (Level::Warning, format!("Operator \"{operator}\" wasn't found.")),
        }
    }
}

/// Built-in meaning of a binary operator over host values.
fn binary(operator: &str, lhs: Option<&Value>, rhs: Option<&Value>) -> Result<Option<Value>, OperatorError> {
    match operator {
        "==" => return Ok(Some(Value::Boolean(lhs == rhs))),
        "!=" => return Ok(Some(Value::Boolean(lhs != rhs))),
        "+" if matches!(lhs, Some(Value::String(_))) || matches!(rhs, Some(Value::String(_))) => {
            let text = |value: Option<&Value>| value.map_or_else(|| "nil".to_string(), Value::to_string);
            return Ok(Some(Value::String(text(lhs) + &text(rhs))));
        }
        "<" | "<=" | ">" | ">=" => return compare(operator, lhs, rhs).map(|result| Some(Value::Boolean(result))),
        "+" | "-" | "*" | "/" | "%" => {}
        _ => return Err(OperatorError::Unknown),
    }

    let (Some(lhs), Some(rhs)) = (Number::of(lhs), Number::of(rhs)) else {
        return Err(OperatorError::Operands);
    };
    if let (Number::Integer(lhs), Number::Integer(rhs)) = (lhs, rhs) {
        let result = match operator {
            "+" => lhs.checked_add(rhs),
            "-" => lhs.checked_sub(rhs),
            "*" => lhs.checked_mul(rhs),
            _ if rhs == 0 => return Err(OperatorError::DivisionByZero),
            "/" => lhs.checked_div(rhs),
            _ => lhs.checked_rem(rhs),
        };
        return result.map(|value| Some(Value::Integer(value))).ok_or(OperatorError::Overflow);
    }

    let (lhs, rhs) = (lhs.float(), rhs.float());
    let result = match operator {
        "+" => lhs + rhs,
        "-" => lhs - rhs,
        "*" => lhs * rhs,
        "/" => lhs / rhs,
        _ => lhs % rhs,
    };
    Ok(Some(Value::Float(result)))
}

fn compare(operator: &str, lhs: Option<&Value>, rhs: Option<&Value>) -> Result<bool, OperatorError> {
    let ordering = match (lhs, rhs) {
        (Some(Value::String(lhs)), Some(Value::String(rhs))) => lhs.partial_cmp(rhs),
        _ => match (Number::of(lhs), Number::of(rhs)) {
            (Some(Number::Integer(lhs)), Some(Number::Integer(rhs))) => lhs.partial_cmp(&rhs),
            (Some(lhs), Some(rhs)) => lhs.float().partial_cmp(&rhs.float()),
            _ => return Err(OperatorError::Operands),
        },
    };
    let Some(ordering) = ordering else {
        return Ok(false);
    };
    Ok(match operator {
        "<" => ordering.is_lt(),
        "<=" => ordering.is_le(),
        ">" => ordering.is_gt(),
        _ => ordering.is_ge(),
    })
}

/// `value` moved by `delta`, for `++` and `--`.
fn step(value: Option<&Value>, delta: i64) -> Result<Option<Value>, OperatorError> {
    match value {
        Some(Value::Integer(value)) => value
            .checked_add(delta)
            .map(|value| Some(Value::Integer(value)))
            .ok_or(OperatorError::Overflow),
        Some(Value::Float(value)) => Ok(Some(Value::Float(value + delta as f64))),
        _ => Err(OperatorError::Operands),
    }
}

impl Interpreter {
    pub(super) fn expressions_sequence(&mut self, node: &Node, values: &[Node], scope: CompositeId) -> Flow {
        let mut position = 0;
        let operation = match self.climb(values, &mut position, i64::MIN, scope) {
            Ok(Some(operation)) => operation,
            Ok(None) => return Ok(None),
            Err(operator) => {
                self.report(
                    Level::Error,
                    Some(node),
                    &format!("Operator \"{operator}\" is non-associative and can't be chained."),
                );
                return Ok(None);
            }
        };
        if position < values.len() {
            log::trace!("Ignoring {} trailing sequence values", values.len() - position);
        }
        self.operate(node, &operation, scope)
    }

    /// Fails with the operator when a non-associative operator would take
    /// an operand of its own precedence level.
    fn climb<'a>(
        &self,
        values: &'a [Node],
        position: &mut usize,
        minimum: i64,
        scope: CompositeId,
    ) -> Result<Option<Operation<'a>>, &'a str> {
        let Some(operand) = values.get(*position) else {
            return Ok(None);
        };
        let mut lhs = Operation::Operand(operand);
        *position += 1;
        let mut non_associative: Option<(i64, &'a str)> = None;

        while let Some(NodeKind::InfixOperator { value: operator }) = values.get(*position).map(|node| &node.kind) {
            let (precedence, associativity) = self.infix_precedence(operator, scope);
            if precedence < minimum {
                break;
            }
            if let Some((previous, previous_operator)) = non_associative
                && previous == precedence
            {
                return Err(previous_operator);
            }
            *position += 1;
            let next = match associativity {
                Associativity::Right => precedence,
                Associativity::Left | Associativity::None => precedence.saturating_add(1),
            };
            let Some(rhs) = self.climb(values, position, next, scope)? else {
                break;
            };
            lhs = Operation::Infix {
                operator,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
            non_associative = (associativity == Associativity::None).then_some((precedence, operator.as_str()));
        }
        Ok(Some(lhs))
    }

    fn infix_precedence(&self, operator: &str, scope: CompositeId) -> (i64, Associativity) {
        match self.resolver().find_operator_overload(scope, operator, "infix") {
            Some(overload) => (overload.precedence, overload.associativity),
            None => builtin_precedence(operator),
        }
    }

    fn operate(&mut self, node: &Node, operation: &Operation, scope: CompositeId) -> Flow {
        let (operator, lhs, rhs) = match operation {
            Operation::Operand(operand) => return self.eval(operand, scope),
            Operation::Infix { operator, lhs, rhs } => (*operator, lhs, rhs),
        };

        match operator {
            "=" | "+=" | "-=" | "*=" | "/=" | "%=" => {
                let place = match lhs.as_ref() {
                    Operation::Operand(target) => self.place_of(target, scope)?,
                    Operation::Infix { .. } => None,
                };
                let Some(place) = place.filter(|place| self.place_exists(place)) else {
                    self.report_not_assignable(node);
                    return Ok(None);
                };
                let mut value = self.operate(node, rhs, scope)?;
                if let Some(arithmetic) = operator.strip_suffix('=').filter(|arithmetic| !arithmetic.is_empty()) {
                    let current = self.read_place(&place);
                    value = self.apply_binary(node, arithmetic, current, value, scope)?;
                }
                self.assign(node, Some(place), value)
            }
            "&&" => {
                let lhs = self.operate(node, lhs, scope)?;
                if !is_truthy(lhs.as_ref()) {
                    return Ok(Some(Value::Boolean(false)));
                }
                let rhs = self.operate(node, rhs, scope)?;
                Ok(Some(Value::Boolean(is_truthy(rhs.as_ref()))))
            }
            "||" => {
                let lhs = self.operate(node, lhs, scope)?;
                if is_truthy(lhs.as_ref()) {
                    return Ok(Some(Value::Boolean(true)));
                }
                let rhs = self.operate(node, rhs, scope)?;
                Ok(Some(Value::Boolean(is_truthy(rhs.as_ref()))))
            }
            _ => {
                let lhs = self.operate(node, lhs, scope)?;
                let rhs = self.operate(node, rhs, scope)?;
                self.apply_binary(node, operator, lhs, rhs, scope)
            }
        }
    }

    /// A function named by the operator wins over the built-in meaning.
    fn apply_binary(
        &mut self,
        node: &Node,
        operator: &str,
        lhs: Option<Value>,
        rhs: Option<Value>,
        scope: CompositeId,
    ) -> Flow {
        let arguments = [Argument::positional(lhs), Argument::positional(rhs)];
        if let Some(result) = self.call_operator_function(node, operator, &arguments, scope) {
            return result;
        }
        match binary(operator, arguments[0].value.as_ref(), arguments[1].value.as_ref()) {
            Ok(value) => Ok(value),
            Err(error) => {
                let (level, message) = error.report(operator);
                self.report(level, Some(node), &message);
                Ok(None)
            }
        }
    }

    fn call_operator_function(
        &mut self,
        node: &Node,
        operator: &str,
        arguments: &[Argument],
        scope: CompositeId,
    ) -> Option<Flow> {
        let function = self
            .find_member_overload(scope, operator, &Matching::Call(arguments), false)
            .and_then(|resolved| resolved.matching)?;
        let caller = self.store.get(scope).and_then(|scope| scope.ids.current_type);
        Some(self.call_function(Some(node), function, arguments, None, caller))
    }

    pub(super) fn prefix_expression(
        &mut self,
        node: &Node,
        operator: Option<&Node>,
        operand: Option<&Node>,
        scope: CompositeId,
    ) -> Flow {
        let operator = operator.and_then(Node::operator_value).unwrap_or_default();
        let value = self.eval_child(operand, scope)?;

        match operator {
            "!" => Ok(Some(Value::Boolean(!is_truthy(value.as_ref())))),
            "+" if value.is_some() => Ok(value),
            "-" => match value {
                Some(Value::Integer(integer)) => match integer.checked_neg() {
                    Some(negated) => Ok(Some(Value::Integer(negated))),
                    None => {
                        self.report(Level::Error, Some(node), "Integer overflow.");
                        Ok(None)
                    }
                },
                Some(Value::Float(float)) => Ok(Some(Value::Float(-float))),
                value => self.apply_unary(node, operator, value, scope),
            },
            "++" | "--" => {
                let delta = if operator == "++" { 1 } else { -1 };
                let stepped = self.step_operand(node, operator, value.as_ref(), delta, scope)?;
                self.write_back(node, operand, stepped.clone(), scope)?;
                Ok(stepped)
            }
            _ => self.apply_unary(node, operator, value, scope),
        }
    }

    pub(super) fn postfix_expression(
        &mut self,
        node: &Node,
        operator: Option<&Node>,
        operand: Option<&Node>,
        scope: CompositeId,
    ) -> Flow {
        let operator = operator.and_then(Node::operator_value).unwrap_or_default();
        let value = self.eval_child(operand, scope)?;

        match operator {
            "++" | "--" => {
                let delta = if operator == "++" { 1 } else { -1 };
                let stepped = self.step_operand(node, operator, value.as_ref(), delta, scope)?;
                self.write_back(node, operand, stepped, scope)?;
                Ok(value)
            }
            _ => self.apply_unary(node, operator, value, scope),
        }
    }

    fn step_operand(
        &mut self,
        node: &Node,
        operator: &str,
        value: Option<&Value>,
        delta: i64,
        scope: CompositeId,
    ) -> Flow {
        match step(value, delta) {
            Ok(value) => Ok(value),
            Err(OperatorError::Operands) => self.apply_unary(node, operator, value.cloned(), scope),
            Err(error) => {
                let (level, message) = error.report(operator);
                self.report(level, Some(node), &message);
                Ok(None)
            }
        }
    }

    fn write_back(&mut self, node: &Node, operand: Option<&Node>, value: Option<Value>, scope: CompositeId) -> Flow<()> {
        let place = match operand {
            Some(operand) => self.place_of(operand, scope)?,
            None => None,
        };
        if let Some(place) = place {
            self.write_place(node, &place, value)?;
        }
        Ok(())
    }

    /// Prefix and postfix operators without a built-in meaning call a
    /// function named by the operator; without one the operand passes through.
    fn apply_unary(&mut self, node: &Node, operator: &str, value: Option<Value>, scope: CompositeId) -> Flow {
        if value.is_none() {
            return Ok(None);
        }
        let arguments = [Argument::positional(value.clone())];
        match self.call_operator_function(node, operator, &arguments, scope) {
            Some(result) => result,
            None => Ok(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn integer(value: i64) -> Option<Value> {
        Some(Value::Integer(value))
    }

    #[test]
    fn integer_arithmetic_is_checked() {
        assert_eq!(binary("+", integer(2).as_ref(), integer(3).as_ref()), Ok(integer(5)));
        assert_eq!(
            binary("/", integer(1).as_ref(), integer(0).as_ref()),
            Err(OperatorError::DivisionByZero)
        );
        assert_eq!(
            binary("*", integer(i64::MAX).as_ref(), integer(2).as_ref()),
            Err(OperatorError::Overflow)
        );
    }

    #[test]
    fn mixed_numbers_become_floats() {
        assert_eq!(
            binary("/", integer(3).as_ref(), Some(Value::Float(2.0)).as_ref()),
            Ok(Some(Value::Float(1.5)))
        );
        assert_eq!(compare("<", integer(1).as_ref(), Some(Value::Float(1.5)).as_ref()), Ok(true));
    }

    #[test]
    fn strings_concatenate_and_compare() {
        let a = Some(Value::String("a".into()));
        assert_eq!(
            binary("+", a.as_ref(), integer(1).as_ref()),
            Ok(Some(Value::String("a1".into())))
        );
        assert_eq!(compare(">=", a.as_ref(), a.as_ref()), Ok(true));
        assert_eq!(binary("==", None, None), Ok(Some(Value::Boolean(true))));
    }

    #[test]
    fn unknown_operators_and_operands_are_errors() {
        assert_eq!(binary("<>", None, None), Err(OperatorError::Unknown));
        assert_eq!(binary("-", Some(Value::Boolean(true)).as_ref(), integer(1).as_ref()), Err(OperatorError::Operands));
        assert_eq!(step(Some(&Value::Integer(i64::MAX)), 1), Err(OperatorError::Overflow));
    }

    #[test]
    fn assignment_binds_loosest_and_right() {
        assert!(builtin_precedence("=").0 < builtin_precedence("||").0);
        assert_eq!(builtin_precedence("=").1, Associativity::Right);
        assert!(builtin_precedence("*").0 > builtin_precedence("+").0);
    }
}
