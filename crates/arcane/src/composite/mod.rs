//! Composites: the runtime entities behind classes, enumerations, functions,
//! namespaces, objects, protocols and structures.

mod store;

pub use store::Store;

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::ast::Node;
use crate::types::{Predefined, Type};
use crate::value::Value;

/// Generational handle into the [`Store`].
/// Indices are never reused within a run; the generation catches stale handles
/// across snapshot restores.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompositeId {
    pub index: u32,
    pub generation: u32,
}

impl std::fmt::Display for CompositeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Life {
    /// Object whose initializer statements have not run yet.
    Creating,
    Idle,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Class,
    Enumeration,
    Function,
    Namespace,
    Object,
    Protocol,
    Structure,
}

impl Kind {
    pub fn predefined(self) -> Predefined {
        match self {
            Kind::Class => Predefined::Class,
            Kind::Enumeration => Predefined::Enumeration,
            Kind::Function => Predefined::Function,
            Kind::Namespace => Predefined::Namespace,
            Kind::Object => Predefined::Object,
            Kind::Protocol => Predefined::Protocol,
            Kind::Structure => Predefined::Structure,
        }
    }

    pub fn from_predefined(predefined: Predefined) -> Option<Self> {
        Some(match predefined {
            Predefined::Class => Kind::Class,
            Predefined::Enumeration => Kind::Enumeration,
            Predefined::Function => Kind::Function,
            Predefined::Namespace => Kind::Namespace,
            Predefined::Object => Kind::Object,
            Predefined::Protocol => Kind::Protocol,
            Predefined::Structure => Kind::Structure,
            _ => return None,
        })
    }

    /// Kinds that produce objects when initialized.
    pub fn is_instantiable(self) -> bool {
        matches!(self, Kind::Class | Kind::Structure)
    }
}

/// Identity slots other than `own` and `retainers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// `super`: the composite one level up an instantiation chain.
    Super,
    /// `Super`: the type one level up.
    SuperType,
    /// `self`: own-level identity.
    Current,
    /// `Self`: type-level identity.
    CurrentType,
    /// `sub`: the object one level down.
    Sub,
    /// `Sub`: the type one level down.
    SubType,
    Scope,
}

impl Slot {
    pub const ALL: [Slot; 7] = [
        Slot::Super,
        Slot::SuperType,
        Slot::Current,
        Slot::CurrentType,
        Slot::Sub,
        Slot::SubType,
        Slot::Scope,
    ];

    /// Slots inherited by functions and namespaces from their level composite.
    pub const LEVELS: [Slot; 6] = [
        Slot::Super,
        Slot::SuperType,
        Slot::Current,
        Slot::CurrentType,
        Slot::Sub,
        Slot::SubType,
    ];

    /// Pseudo-identifier naming the slot in source code.
    pub fn pseudo_identifier(identifier: &str) -> Option<Slot> {
        Some(match identifier {
            "super" => Slot::Super,
            "Super" => Slot::SuperType,
            "self" => Slot::Current,
            "Self" => Slot::CurrentType,
            "sub" => Slot::Sub,
            "Sub" => Slot::SubType,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ids {
    #[serde(rename = "super")]
    pub super_: Option<CompositeId>,
    #[serde(rename = "Super")]
    pub super_type: Option<CompositeId>,
    #[serde(rename = "self")]
    pub current: Option<CompositeId>,
    #[serde(rename = "Self")]
    pub current_type: Option<CompositeId>,
    pub sub: Option<CompositeId>,
    #[serde(rename = "Sub")]
    pub sub_type: Option<CompositeId>,
    pub scope: Option<CompositeId>,
    pub retainers: SmallVec<[CompositeId; 4]>,
}

impl Ids {
    pub fn get(&self, slot: Slot) -> Option<CompositeId> {
        match slot {
            Slot::Super => self.super_,
            Slot::SuperType => self.super_type,
            Slot::Current => self.current,
            Slot::CurrentType => self.current_type,
            Slot::Sub => self.sub,
            Slot::SubType => self.sub_type,
            Slot::Scope => self.scope,
        }
    }

    pub fn set(&mut self, slot: Slot, id: Option<CompositeId>) {
        let target = match slot {
            Slot::Super => &mut self.super_,
            Slot::SuperType => &mut self.super_type,
            Slot::Current => &mut self.current,
            Slot::CurrentType => &mut self.current_type,
            Slot::Sub => &mut self.sub,
            Slot::SubType => &mut self.sub_type,
            Slot::Scope => &mut self.scope,
        };
        *target = id;
    }
}

/// Property observers (`willSet`, `didSet`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observer {
    pub identifier: String,
    /// Function composite run by the observer.
    pub value: CompositeId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overload {
    pub modifiers: Vec<String>,
    #[serde(rename = "type")]
    pub type_: Type,
    pub value: Option<Value>,
    pub observers: Vec<Observer>,
}

impl Overload {
    pub fn new(type_: Type, value: Option<Value>) -> Self {
        Self {
            modifiers: Vec::new(),
            type_,
            value,
            observers: Vec::new(),
        }
    }

    pub fn with_modifiers(mut self, modifiers: &[String]) -> Self {
        self.modifiers = modifiers.to_vec();
        self
    }

    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }

    /// Composites referenced by the overload's type, value and observers.
    pub fn references(&self) -> Vec<CompositeId> {
        let mut references: Vec<CompositeId> = self.type_.references().collect();
        if let Some(value) = &self.value {
            value.collect_composites(&mut references);
        }
        references.extend(self.observers.iter().map(|observer| observer.value));
        references
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Associativity {
    Left,
    Right,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorOverload {
    pub modifiers: Vec<String>,
    pub associativity: Associativity,
    pub precedence: i64,
}

/// Host functions available to programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Native {
    Print,
    GetComposite,
    GetCallsString,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Statements {
    #[default]
    None,
    Block(Arc<[Node]>),
    Native(Native),
}

impl Statements {
    pub fn block(nodes: Vec<Node>) -> Self {
        Statements::Block(Arc::from(nodes))
    }

    pub fn nodes(&self) -> Arc<[Node]> {
        match self {
            Statements::Block(nodes) => nodes.clone(),
            _ => Arc::from(Vec::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composite {
    pub title: Option<String>,
    #[serde(rename = "IDs")]
    pub ids: Ids,
    pub life: Life,
    #[serde(rename = "type")]
    pub type_: Type,
    pub statements: Statements,
    pub imports: IndexMap<String, CompositeId>,
    pub operators: IndexMap<String, Vec<OperatorOverload>>,
    pub members: IndexMap<String, Vec<Overload>>,
    pub observers: Vec<Observer>,
}

impl Composite {
    pub fn new(title: Option<String>, type_: Type) -> Self {
        let life = if type_.root_predefined() == Some(Predefined::Object) {
            Life::Creating
        } else {
            Life::Idle
        };
        Self {
            title,
            ids: Ids::default(),
            life,
            type_,
            statements: Statements::None,
            imports: IndexMap::new(),
            operators: IndexMap::new(),
            members: IndexMap::new(),
            observers: Vec::new(),
        }
    }

    pub fn kind(&self) -> Option<Kind> {
        self.type_.root_predefined().and_then(Kind::from_predefined)
    }

    pub fn is(&self, kind: Kind) -> bool {
        self.kind() == Some(kind)
    }

    pub fn is_alive(&self) -> bool {
        self.life != Life::Destroyed
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }

    /// Every composite this one references, except through `own` and `retainers`.
    /// `Self` is excluded: it names the composite's type, never an ownership edge.
    pub fn references(&self) -> Vec<CompositeId> {
        let mut references: Vec<CompositeId> = Slot::ALL
            .iter()
            .filter(|slot| **slot != Slot::CurrentType)
            .filter_map(|slot| self.ids.get(*slot))
            .collect();
        references.extend(self.type_.references());
        references.extend(self.imports.values().copied());
        for overloads in self.members.values() {
            for overload in overloads {
                references.extend(overload.references());
            }
        }
        references.extend(self.observers.iter().map(|observer| observer.value));
        references
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn objects_start_creating() {
        let object = Composite::new(None, Type::predefined(Predefined::Object));
        let class = Composite::new(Some("A".into()), Type::predefined(Predefined::Class));

        assert_eq!(object.life, Life::Creating);
        assert_eq!(class.life, Life::Idle);
        assert!(class.kind().is_some_and(Kind::is_instantiable));
    }

    #[test]
    fn references_skip_self_type() {
        let helper = CompositeId { index: 7, generation: 0 };
        let class = CompositeId { index: 2, generation: 0 };
        let mut object = Composite::new(None, Type::predefined(Predefined::Object));
        object.ids.current_type = Some(class);
        object.members.insert(
            "helper".into(),
            vec![Overload::new(Type::new(), Some(Value::Reference(helper)))],
        );

        let references = object.references();
        assert!(references.contains(&helper));
        assert!(!references.contains(&class));
    }
}
