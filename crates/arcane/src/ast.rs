//! Syntax tree consumed by the interpreter.
//!
//! Nodes arrive as JSON produced by the parser: every node carries a `type`
//! tag and a `range` of token positions. Unknown node types deserialize into
//! [`NodeKind::Unsupported`] and evaluate to nil.

use serde::{Deserialize, Serialize};

use crate::types::Requirement;

/// Token position span of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    #[serde(default)]
    pub start: usize,
    #[serde(default)]
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub range: Range,
    #[serde(flatten)]
    pub kind: NodeKind,
}

/// Literal payload as the parser emits it (usually the raw token text).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Text(String),
    Boolean(bool),
    Integer(i64),
    Float(f64),
}

impl Literal {
    pub fn text(&self) -> String {
        match self {
            Literal::Text(text) => text.clone(),
            Literal::Boolean(value) => value.to_string(),
            Literal::Integer(value) => value.to_string(),
            Literal::Float(value) => value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeDeclaration {
    #[serde(default)]
    pub modifiers: Vec<String>,
    pub identifier: Option<Box<Node>>,
    #[serde(default)]
    pub generic_parameters: Vec<Node>,
    #[serde(default)]
    pub inherited_types: Vec<Node>,
    pub body: Option<Box<Node>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    #[serde(default)]
    pub modifiers: Vec<String>,
    pub identifier: Option<Box<Node>>,
    pub signature: Option<Box<Node>>,
    pub body: Option<Box<Node>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodeKind {
    Module {
        #[serde(default)]
        statements: Vec<Node>,
    },
    #[serde(
        rename = "functionBody",
        alias = "classBody",
        alias = "structureBody",
        alias = "enumerationBody",
        alias = "protocolBody",
        alias = "namespaceBody",
        alias = "observersBody",
        alias = "operatorBody"
    )]
    Body {
        #[serde(default)]
        statements: Vec<Node>,
    },

    // --- Literals ---
    Identifier {
        value: String,
    },
    BooleanLiteral {
        value: Literal,
    },
    IntegerLiteral {
        value: Literal,
    },
    FloatLiteral {
        value: Literal,
    },
    NilLiteral,
    StringLiteral {
        #[serde(default)]
        segments: Vec<Node>,
    },
    StringSegment {
        value: String,
    },
    StringExpression {
        value: Option<Box<Node>>,
    },
    ArrayLiteral {
        #[serde(default)]
        values: Vec<Node>,
    },
    DictionaryLiteral {
        #[serde(default)]
        entries: Vec<Node>,
    },
    Entry {
        key: Option<Box<Node>>,
        value: Option<Box<Node>>,
    },

    // --- Expressions ---
    ParenthesizedExpression {
        value: Option<Box<Node>>,
    },
    ExpressionsSequence {
        #[serde(default)]
        values: Vec<Node>,
    },
    InfixOperator {
        value: String,
    },
    PrefixOperator {
        value: String,
    },
    PostfixOperator {
        value: String,
    },
    PrefixExpression {
        operator: Option<Box<Node>>,
        value: Option<Box<Node>>,
    },
    PostfixExpression {
        operator: Option<Box<Node>>,
        value: Option<Box<Node>>,
    },
    #[serde(rename_all = "camelCase")]
    CallExpression {
        callee: Option<Box<Node>>,
        #[serde(default)]
        generic_arguments: Vec<Node>,
        #[serde(default)]
        arguments: Vec<Node>,
        closure: Option<Box<Node>>,
    },
    Argument {
        label: Option<Box<Node>>,
        value: Option<Box<Node>>,
    },
    ChainExpression {
        composite: Option<Box<Node>>,
        member: Option<Box<Node>>,
    },
    #[serde(rename_all = "camelCase")]
    SubscriptExpression {
        composite: Option<Box<Node>>,
        #[serde(default)]
        generic_arguments: Vec<Node>,
        #[serde(default)]
        arguments: Vec<Node>,
        closure: Option<Box<Node>>,
    },
    InoutExpression {
        value: Option<Box<Node>>,
    },
    NillableExpression {
        value: Option<Box<Node>>,
    },
    TryExpression {
        #[serde(default)]
        nillable: bool,
        value: Option<Box<Node>>,
    },
    DeleteExpression {
        value: Option<Box<Node>>,
    },
    TypeExpression {
        type_: Option<Box<Node>>,
    },
    FunctionExpression(FunctionDeclaration),
    ClassExpression(CompositeDeclaration),
    StructureExpression(CompositeDeclaration),
    EnumerationExpression(CompositeDeclaration),
    ProtocolExpression(CompositeDeclaration),
    NamespaceExpression(CompositeDeclaration),

    // --- Declarations ---
    VariableDeclaration {
        #[serde(default)]
        modifiers: Vec<String>,
        #[serde(default)]
        declarators: Vec<Node>,
    },
    Declarator {
        identifier: Option<Box<Node>>,
        type_: Option<Box<Node>>,
        value: Option<Box<Node>>,
        body: Option<Box<Node>>,
    },
    ObserverDeclaration {
        identifier: Option<Box<Node>>,
        body: Option<Box<Node>>,
    },
    FunctionDeclaration(FunctionDeclaration),
    InitializerDeclaration {
        #[serde(default)]
        modifiers: Vec<String>,
        #[serde(default)]
        nillable: bool,
        signature: Option<Box<Node>>,
        body: Option<Box<Node>>,
    },
    DeinitializerDeclaration {
        body: Option<Box<Node>>,
    },
    #[serde(rename_all = "camelCase")]
    FunctionSignature {
        #[serde(default)]
        generic_parameters: Vec<Node>,
        #[serde(default)]
        parameters: Vec<Node>,
        #[serde(default)]
        inits: Requirement,
        #[serde(default)]
        deinits: Requirement,
        #[serde(default)]
        awaits: Requirement,
        #[serde(default)]
        throws: Requirement,
        return_type: Option<Box<Node>>,
    },
    Parameter {
        label: Option<Box<Node>>,
        identifier: Option<Box<Node>>,
        type_: Option<Box<Node>>,
        value: Option<Box<Node>>,
    },
    GenericParameter {
        identifier: Option<Box<Node>>,
        type_: Option<Box<Node>>,
    },
    ClassDeclaration(CompositeDeclaration),
    StructureDeclaration(CompositeDeclaration),
    EnumerationDeclaration(CompositeDeclaration),
    ProtocolDeclaration(CompositeDeclaration),
    NamespaceDeclaration(CompositeDeclaration),
    OperatorDeclaration {
        #[serde(default)]
        modifiers: Vec<String>,
        operator: Option<Box<Node>>,
        body: Option<Box<Node>>,
    },
    ImportDeclaration {
        value: Option<Box<Node>>,
    },

    // --- Statements ---
    IfStatement {
        condition: Option<Box<Node>>,
        then: Option<Box<Node>>,
        #[serde(rename = "else")]
        else_: Option<Box<Node>>,
    },
    WhileStatement {
        condition: Option<Box<Node>>,
        value: Option<Box<Node>>,
    },
    ReturnStatement {
        value: Option<Box<Node>>,
    },
    ThrowStatement {
        value: Option<Box<Node>>,
    },
    BreakStatement {
        label: Option<Box<Node>>,
    },
    ContinueStatement {
        label: Option<Box<Node>>,
    },

    // --- Types ---
    PredefinedType {
        value: String,
    },
    #[serde(rename_all = "camelCase")]
    TypeIdentifier {
        identifier: Option<Box<Node>>,
        #[serde(default)]
        generic_arguments: Vec<Node>,
    },
    ArrayType {
        value: Option<Box<Node>>,
    },
    DictionaryType {
        key: Option<Box<Node>>,
        value: Option<Box<Node>>,
    },
    UnionType {
        #[serde(default)]
        subtypes: Vec<Node>,
    },
    IntersectionType {
        #[serde(default)]
        subtypes: Vec<Node>,
    },
    #[serde(rename_all = "camelCase")]
    FunctionType {
        #[serde(default)]
        generic_parameter_types: Vec<Node>,
        #[serde(default)]
        parameter_types: Vec<Node>,
        #[serde(default)]
        awaits: Requirement,
        #[serde(default)]
        throws: Requirement,
        return_type: Option<Box<Node>>,
    },
    NillableType {
        value: Option<Box<Node>>,
    },
    DefaultType {
        value: Option<Box<Node>>,
    },
    InoutType {
        value: Option<Box<Node>>,
    },
    VariadicType {
        value: Option<Box<Node>>,
    },
    ParenthesizedType {
        value: Option<Box<Node>>,
    },
    ProtocolType,

    #[serde(other)]
    Unsupported,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self { range: Range::default(), kind }
    }

    pub fn identifier(value: &str) -> Self {
        Self::new(NodeKind::Identifier { value: value.to_string() })
    }

    /// Text of an identifier node.
    pub fn identifier_value(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Identifier { value } => Some(value),
            _ => None,
        }
    }

    /// Text of an operator node of any fixity.
    pub fn operator_value(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::InfixOperator { value }
            | NodeKind::PrefixOperator { value }
            | NodeKind::PostfixOperator { value } => Some(value),
            _ => None,
        }
    }

    /// Statements of a body node.
    pub fn statements(&self) -> &[Node] {
        match &self.kind {
            NodeKind::Body { statements } | NodeKind::Module { statements } => statements,
            _ => &[],
        }
    }

    /// Declaration modifiers, empty for nodes that carry none.
    pub fn modifiers(&self) -> &[String] {
        match &self.kind {
            NodeKind::VariableDeclaration { modifiers, .. }
            | NodeKind::InitializerDeclaration { modifiers, .. }
            | NodeKind::OperatorDeclaration { modifiers, .. } => modifiers,
            NodeKind::FunctionDeclaration(declaration) => &declaration.modifiers,
            NodeKind::ClassDeclaration(declaration)
            | NodeKind::StructureDeclaration(declaration)
            | NodeKind::EnumerationDeclaration(declaration)
            | NodeKind::ProtocolDeclaration(declaration)
            | NodeKind::NamespaceDeclaration(declaration) => &declaration.modifiers,
            _ => &[],
        }
    }

    /// The `type` tag the node was parsed with.
    pub fn type_name(&self) -> &'static str {
        self.kind.name()
    }
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Module { .. } => "module",
            NodeKind::Body { .. } => "functionBody",
            NodeKind::Identifier { .. } => "identifier",
            NodeKind::BooleanLiteral { .. } => "booleanLiteral",
            NodeKind::IntegerLiteral { .. } => "integerLiteral",
            NodeKind::FloatLiteral { .. } => "floatLiteral",
            NodeKind::NilLiteral => "nilLiteral",
            NodeKind::StringLiteral { .. } => "stringLiteral",
            NodeKind::StringSegment { .. } => "stringSegment",
            NodeKind::StringExpression { .. } => "stringExpression",
            NodeKind::ArrayLiteral { .. } => "arrayLiteral",
            NodeKind::DictionaryLiteral { .. } => "dictionaryLiteral",
            NodeKind::Entry { .. } => "entry",
            NodeKind::ParenthesizedExpression { .. } => "parenthesizedExpression",
            NodeKind::ExpressionsSequence { .. } => "expressionsSequence",
            NodeKind::InfixOperator { .. } => "infixOperator",
            NodeKind::PrefixOperator { .. } => "prefixOperator",
            NodeKind::PostfixOperator { .. } => "postfixOperator",
            NodeKind::PrefixExpression { .. } => "prefixExpression",
            NodeKind::PostfixExpression { .. } => "postfixExpression",
            NodeKind::CallExpression { .. } => "callExpression",
            NodeKind::Argument { .. } => "argument",
            NodeKind::ChainExpression { .. } => "chainExpression",
            NodeKind::SubscriptExpression { .. } => "subscriptExpression",
            NodeKind::InoutExpression { .. } => "inoutExpression",
            NodeKind::NillableExpression { .. } => "nillableExpression",
            NodeKind::TryExpression { .. } => "tryExpression",
            NodeKind::DeleteExpression { .. } => "deleteExpression",
            NodeKind::TypeExpression { .. } => "typeExpression",
            NodeKind::FunctionExpression(_) => "functionExpression",
            NodeKind::ClassExpression(_) => "classExpression",
            NodeKind::StructureExpression(_) => "structureExpression",
            NodeKind::EnumerationExpression(_) => "enumerationExpression",
            NodeKind::ProtocolExpression(_) => "protocolExpression",
            NodeKind::NamespaceExpression(_) => "namespaceExpression",
            NodeKind::VariableDeclaration { .. } => "variableDeclaration",
            NodeKind::Declarator { .. } => "declarator",
            NodeKind::ObserverDeclaration { .. } => "observerDeclaration",
            NodeKind::FunctionDeclaration(_) => "functionDeclaration",
            NodeKind::InitializerDeclaration { .. } => "initializerDeclaration",
            NodeKind::DeinitializerDeclaration { .. } => "deinitializerDeclaration",
            NodeKind::FunctionSignature { .. } => "functionSignature",
            NodeKind::Parameter { .. } => "parameter",
            NodeKind::GenericParameter { .. } => "genericParameter",
            NodeKind::ClassDeclaration(_) => "classDeclaration",
            NodeKind::StructureDeclaration(_) => "structureDeclaration",
            NodeKind::EnumerationDeclaration(_) => "enumerationDeclaration",
            NodeKind::ProtocolDeclaration(_) => "protocolDeclaration",
            NodeKind::NamespaceDeclaration(_) => "namespaceDeclaration",
            NodeKind::OperatorDeclaration { .. } => "operatorDeclaration",
            NodeKind::ImportDeclaration { .. } => "importDeclaration",
            NodeKind::IfStatement { .. } => "ifStatement",
            NodeKind::WhileStatement { .. } => "whileStatement",
            NodeKind::ReturnStatement { .. } => "returnStatement",
            NodeKind::ThrowStatement { .. } => "throwStatement",
            NodeKind::BreakStatement { .. } => "breakStatement",
            NodeKind::ContinueStatement { .. } => "continueStatement",
            NodeKind::PredefinedType { .. } => "predefinedType",
            NodeKind::TypeIdentifier { .. } => "typeIdentifier",
            NodeKind::ArrayType { .. } => "arrayType",
            NodeKind::DictionaryType { .. } => "dictionaryType",
            NodeKind::UnionType { .. } => "unionType",
            NodeKind::IntersectionType { .. } => "intersectionType",
            NodeKind::FunctionType { .. } => "functionType",
            NodeKind::NillableType { .. } => "nillableType",
            NodeKind::DefaultType { .. } => "defaultType",
            NodeKind::InoutType { .. } => "inoutType",
            NodeKind::VariadicType { .. } => "variadicType",
            NodeKind::ParenthesizedType { .. } => "parenthesizedType",
            NodeKind::ProtocolType => "protocolType",
            NodeKind::Unsupported => "unsupported",
        }
    }
}
