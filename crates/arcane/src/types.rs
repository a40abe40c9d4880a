//! Flattened type trees.
//!
//! A [`Type`] is a list of parts where part 0 is the root and every other
//! part names its parent index. Children are located by scanning, never by
//! offset. A part carries at most one collection aspect; adding a second one
//! creates a child part.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ast::Node;
use crate::composite::CompositeId;

/// Tri-state function property (`-1` absent, `0` optional, `1` present).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i8", into = "i8")]
pub enum Requirement {
    #[default]
    Absent,
    Optional,
    Present,
}

impl From<i8> for Requirement {
    fn from(value: i8) -> Self {
        match value {
            0 => Requirement::Optional,
            1.. => Requirement::Present,
            _ => Requirement::Absent,
        }
    }
}

impl From<Requirement> for i8 {
    fn from(value: Requirement) -> Self {
        match value {
            Requirement::Absent => -1,
            Requirement::Optional => 0,
            Requirement::Present => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Predefined {
    #[serde(rename = "Any", alias = "any")]
    Any,
    #[serde(rename = "_")]
    Wildcard,
    Void,
    #[serde(rename = "boolean", alias = "bool")]
    Boolean,
    #[serde(rename = "integer", alias = "int")]
    Integer,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "string")]
    String,
    #[serde(rename = "dictionary", alias = "dict")]
    Dictionary,
    #[serde(rename = "type")]
    Type,
    Class,
    Enumeration,
    Function,
    Namespace,
    Object,
    Protocol,
    Structure,
}

impl Predefined {
    pub fn parse(text: &str) -> Option<Self> {
        Some(match text {
            "Any" | "any" => Predefined::Any,
            "_" => Predefined::Wildcard,
            "Void" => Predefined::Void,
            "bool" | "boolean" => Predefined::Boolean,
            "int" | "integer" => Predefined::Integer,
            "float" => Predefined::Float,
            "string" => Predefined::String,
            "dict" | "dictionary" => Predefined::Dictionary,
            "type" => Predefined::Type,
            "Class" => Predefined::Class,
            "Enumeration" => Predefined::Enumeration,
            "Function" => Predefined::Function,
            "Namespace" => Predefined::Namespace,
            "Object" => Predefined::Object,
            "Protocol" => Predefined::Protocol,
            "Structure" => Predefined::Structure,
            _ => return None,
        })
    }

    pub fn is_composite(self) -> bool {
        matches!(
            self,
            Predefined::Class
                | Predefined::Enumeration
                | Predefined::Function
                | Predefined::Namespace
                | Predefined::Object
                | Predefined::Protocol
                | Predefined::Structure
        )
    }
}

/// Collection aspects of a part. A part holds at most one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Union,
    Intersection,
    Array,
    Dictionary,
    GenericArguments,
    GenericParameters,
    Parameters,
    InheritedTypes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TypePart {
    #[serde(rename = "super", skip_serializing_if = "Option::is_none")]
    pub parent: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predefined: Option<Predefined>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<CompositeId>,
    #[serde(skip_serializing_if = "is_false")]
    pub nillable: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub default: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub variadic: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub inout: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub union: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub intersection: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub array: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub dictionary: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub generic_parameters: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub parameters: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub generic_arguments: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub inherited_types: bool,
    /// The part stands for the referenced composite itself, not its instances.
    #[serde(rename = "self", skip_serializing_if = "is_false")]
    pub is_self: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throws: Option<Requirement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub awaits: Option<Requirement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inits: Option<Requirement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deinits: Option<Requirement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    /// Default-value expression of a parameter part.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Arc<Node>>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl TypePart {
    pub fn collection(&self) -> Option<Collection> {
        if self.union {
            Some(Collection::Union)
        } else if self.intersection {
            Some(Collection::Intersection)
        } else if self.array {
            Some(Collection::Array)
        } else if self.dictionary {
            Some(Collection::Dictionary)
        } else if self.generic_arguments {
            Some(Collection::GenericArguments)
        } else if self.generic_parameters {
            Some(Collection::GenericParameters)
        } else if self.parameters {
            Some(Collection::Parameters)
        } else if self.inherited_types {
            Some(Collection::InheritedTypes)
        } else {
            None
        }
    }

    pub fn is_collection(&self) -> bool {
        self.collection().is_some() || self.predefined == Some(Predefined::Function)
    }

    fn set_collection(&mut self, collection: Collection) {
        match collection {
            Collection::Union => self.union = true,
            Collection::Intersection => self.intersection = true,
            Collection::Array => self.array = true,
            Collection::Dictionary => self.dictionary = true,
            Collection::GenericArguments => self.generic_arguments = true,
            Collection::GenericParameters => self.generic_parameters = true,
            Collection::Parameters => self.parameters = true,
            Collection::InheritedTypes => self.inherited_types = true,
        }
    }

    /// True when the part carries nothing but its parent link.
    pub fn is_blank(&self) -> bool {
        *self
            == TypePart {
                parent: self.parent,
                ..TypePart::default()
            }
    }
}

/// Type-level facts about composites, needed for nominal acceptance.
pub trait Lineage {
    /// `Super` of a composite.
    fn super_type(&self, id: CompositeId) -> Option<CompositeId>;
    /// Kind of a composite, from its own type root.
    fn kind(&self, id: CompositeId) -> Option<Predefined>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Type {
    parts: Vec<TypePart>,
}

impl Type {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn predefined(predefined: Predefined) -> Self {
        Self {
            parts: vec![TypePart {
                predefined: Some(predefined),
                ..TypePart::default()
            }],
        }
    }

    /// `_?`, the type of anything including nil.
    pub fn anything() -> Self {
        let mut ty = Self::predefined(Predefined::Wildcard);
        ty.parts[0].nillable = true;
        ty
    }

    /// Type of a member holding a composite itself (`{predefined: kind, self: true}`).
    pub fn composite_self(kind: Predefined) -> Self {
        let mut ty = Self::predefined(kind);
        ty.parts[0].is_self = true;
        ty
    }

    pub fn from_parts(parts: Vec<TypePart>) -> Self {
        Self { parts }
    }

    pub fn parts(&self) -> &[TypePart] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn root(&self) -> Option<&TypePart> {
        self.parts.first()
    }

    pub fn part(&self, index: usize) -> Option<&TypePart> {
        self.parts.get(index)
    }

    pub fn part_mut(&mut self, index: usize) -> Option<&mut TypePart> {
        self.parts.get_mut(index)
    }

    /// Appends an empty part under `parent`.
    pub fn push(&mut self, parent: Option<usize>) -> usize {
        self.parts.push(TypePart {
            parent,
            ..TypePart::default()
        });
        self.parts.len() - 1
    }

    pub fn children(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.parts
            .iter()
            .enumerate()
            .filter(move |(_, part)| part.parent == Some(index))
            .map(|(child, _)| child)
    }

    /// Sets `collection` on `index`, or on a new child of it when the part
    /// already carries a collection aspect. Without `index` a new part is
    /// created under `parent`.
    pub fn collection_part(
        &mut self,
        parent: Option<usize>,
        index: Option<usize>,
        collection: Collection,
    ) -> usize {
        let index = match index {
            Some(index) if self.parts.get(index).is_some_and(TypePart::is_collection) => {
                self.push(Some(index))
            }
            Some(index) if index < self.parts.len() => index,
            _ => self.push(parent),
        };
        self.parts[index].set_collection(collection);
        index
    }

    /// Copy of the subtree rooted at `index`, re-rooted at 0.
    pub fn subtype(&self, index: usize) -> Type {
        let mut ty = Type::new();
        if index < self.parts.len() {
            self.copy_subtree(index, None, &mut ty);
        }
        ty
    }

    fn copy_subtree(&self, index: usize, parent: Option<usize>, into: &mut Type) {
        let mut part = self.parts[index].clone();
        part.parent = parent;
        into.parts.push(part);
        let copied = into.parts.len() - 1;
        let children: Vec<usize> = self.children(index).collect();
        for child in children {
            self.copy_subtree(child, Some(copied), into);
        }
    }

    /// Composites referenced by any part.
    pub fn references(&self) -> impl Iterator<Item = CompositeId> + '_ {
        self.parts.iter().filter_map(|part| part.reference)
    }

    /// First inherited type of a composite type (its `Super`).
    pub fn inherited_reference(&self) -> Option<CompositeId> {
        let index = self.parts.iter().position(|part| part.inherited_types)?;
        self.children(index).find_map(|child| self.parts[child].reference)
    }

    fn flagged_children(&self, flag: impl Fn(&TypePart) -> bool) -> Vec<usize> {
        match self.parts.iter().position(flag) {
            Some(index) => self.children(index).collect(),
            None => Vec::new(),
        }
    }

    /// Parts of declared generic parameters.
    pub fn generic_parameters(&self) -> Vec<&TypePart> {
        self.flagged_children(|part| part.generic_parameters)
            .into_iter()
            .map(|index| &self.parts[index])
            .collect()
    }

    /// Indices of the top-level parameter parts of a function type.
    pub fn function_parameters(&self) -> Vec<usize> {
        self.flagged_children(|part| part.parameters)
    }

    /// Index of the return type part of a function type.
    pub fn function_return(&self) -> Option<usize> {
        self.children(0).find(|&child| {
            let part = &self.parts[child];
            !part.parameters && !part.generic_parameters
        })
    }

    fn root_requirement(&self, get: impl Fn(&TypePart) -> Option<Requirement>) -> Requirement {
        self.root().and_then(get).unwrap_or_default()
    }

    pub fn inits(&self) -> Requirement {
        self.root_requirement(|part| part.inits)
    }

    pub fn deinits(&self) -> Requirement {
        self.root_requirement(|part| part.deinits)
    }

    pub fn awaits(&self) -> Requirement {
        self.root_requirement(|part| part.awaits)
    }

    pub fn throws(&self) -> Requirement {
        self.root_requirement(|part| part.throws)
    }

    pub fn root_predefined(&self) -> Option<Predefined> {
        self.root().and_then(|part| part.predefined)
    }

    // --- Acceptance ---

    /// Structural acceptance of `provided` by `self`.
    pub fn accepts(&self, provided: &Type, lineage: &impl Lineage) -> bool {
        let Some(root) = self.root() else {
            return true;
        };
        if provided.is_empty() {
            return root.nillable || root.predefined == Some(Predefined::Wildcard);
        }
        self.part_accepts(0, provided, 0, lineage)
    }

    fn part_accepts(&self, e: usize, provided: &Type, p: usize, lineage: &impl Lineage) -> bool {
        let expected = &self.parts[e];
        let given = &provided.parts[p];

        if given.union {
            return provided
                .children(p)
                .all(|child| self.part_accepts(e, provided, child, lineage));
        }
        if expected.union {
            return self
                .children(e)
                .any(|child| self.part_accepts(child, provided, p, lineage));
        }
        if expected.intersection {
            return self
                .children(e)
                .all(|child| self.part_accepts(child, provided, p, lineage));
        }
        if expected.inout && !given.inout {
            return false;
        }

        if expected.predefined == Some(Predefined::Function) {
            return self.function_accepts(e, provided, p, lineage);
        }
        if expected.array || expected.dictionary {
            if expected.array != given.array || expected.dictionary != given.dictionary {
                return false;
            }
            let expected_children: Vec<usize> = self.children(e).collect();
            let given_children: Vec<usize> = provided.children(p).collect();
            return self.lockstep(&expected_children, provided, &given_children, lineage);
        }

        if !self.leaf_accepts(expected, given, lineage) {
            return false;
        }
        if expected.generic_arguments {
            let expected_children: Vec<usize> = self.children(e).collect();
            let given_children: Vec<usize> = provided.children(p).collect();
            return self.lockstep(&expected_children, provided, &given_children, lineage);
        }
        true
    }

    fn leaf_accepts(&self, expected: &TypePart, given: &TypePart, lineage: &impl Lineage) -> bool {
        if let Some(reference) = expected.reference {
            let Some(mut current) = given.reference else {
                return false;
            };
            if expected.is_self != given.is_self {
                return false;
            }
            let mut steps = 0;
            loop {
                if current == reference {
                    return true;
                }
                match lineage.super_type(current) {
                    Some(next) if steps < 1024 => {
                        current = next;
                        steps += 1;
                    }
                    _ => return false,
                }
            }
        }

        match expected.predefined {
            None | Some(Predefined::Any) | Some(Predefined::Wildcard) => true,
            Some(kind) if kind.is_composite() => match given.reference {
                Some(id) => {
                    let actual = lineage.kind(id);
                    if kind == Predefined::Object {
                        !given.is_self
                    } else {
                        given.is_self && actual == Some(kind)
                    }
                }
                None => given.predefined == Some(kind),
            },
            Some(kind) => given.predefined == Some(kind),
        }
    }

    fn function_accepts(&self, e: usize, provided: &Type, p: usize, lineage: &impl Lineage) -> bool {
        let expected = &self.parts[e];
        let given = &provided.parts[p];
        if given.predefined != Some(Predefined::Function) {
            return false;
        }
        let flags_match = |a: Option<Requirement>, b: Option<Requirement>| match (a, b) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        if !flags_match(expected.inits, given.inits)
            || !flags_match(expected.deinits, given.deinits)
            || !flags_match(expected.awaits, given.awaits)
            || !flags_match(expected.throws, given.throws)
        {
            return false;
        }

        let expected_sub = self.subtype(e);
        let given_sub = provided.subtype(p);
        let expected_parameters = expected_sub.function_parameters();
        let given_parameters = given_sub.function_parameters();
        if !expected_sub.lockstep(&expected_parameters, &given_sub, &given_parameters, lineage) {
            return false;
        }

        match (expected_sub.function_return(), given_sub.function_return()) {
            (Some(expected_return), Some(given_return)) => {
                expected_sub.part_accepts(expected_return, &given_sub, given_return, lineage)
            }
            _ => true,
        }
    }

    /// Pairs children in order; a variadic expected part absorbs zero or more
    /// provided parts.
    fn lockstep(
        &self,
        expected: &[usize],
        provided: &Type,
        given: &[usize],
        lineage: &impl Lineage,
    ) -> bool {
        let mut g = 0;
        for (i, &e) in expected.iter().enumerate() {
            if self.parts[e].variadic {
                let rest = expected.len() - i - 1;
                if given.len() < g + rest {
                    return false;
                }
                let take = given.len() - g - rest;
                for &part in &given[g..g + take] {
                    if !self.part_accepts(e, provided, part, lineage) {
                        return false;
                    }
                }
                g += take;
                continue;
            }
            let Some(&part) = given.get(g) else {
                return false;
            };
            if !self.part_accepts(e, provided, part, lineage) {
                return false;
            }
            g += 1;
        }
        g == given.len()
    }
}
