//! Composite creation and identity-slot wiring.

use crate::composite::{Composite, CompositeId, Kind, Slot, Statements};
use crate::context::Interpreter;
use crate::types::{Collection, Predefined, Type};

/// Where a namespace takes its level slots (`self`, `super`, ...) from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Levels {
    /// The namespace is its own `self`.
    Own,
    /// Copied from another composite.
    From(CompositeId),
    /// Intentionally left empty.
    Missing,
}

impl Interpreter {
    /// Allocates a composite that retains its scope and type references.
    pub fn create_composite(
        &mut self,
        title: Option<&str>,
        type_: Type,
        scope: Option<CompositeId>,
    ) -> CompositeId {
        let references: Vec<CompositeId> = type_.references().collect();
        let id = self
            .store
            .alloc(Composite::new(title.map(str::to_string), type_));
        log::debug!("Created composite {id} {}", title.unwrap_or("<anonymous>"));

        if scope.is_some() {
            self.set_slot(id, Slot::Scope, scope);
        }
        for reference in references {
            self.retain_or_release(id, reference);
        }
        id
    }

    /// Composite that is its own `self`, as declared types and namespaces are.
    pub(crate) fn create_self_leveled(
        &mut self,
        title: Option<&str>,
        kind: Kind,
        scope: Option<CompositeId>,
    ) -> CompositeId {
        let id = self.create_composite(title, Type::predefined(kind.predefined()), scope);
        self.set_self_levels(id, id);
        id
    }

    pub fn create_class(&mut self, title: Option<&str>, scope: Option<CompositeId>) -> CompositeId {
        self.create_self_leveled(title, Kind::Class, scope)
    }

    pub fn create_enumeration(&mut self, title: Option<&str>, scope: Option<CompositeId>) -> CompositeId {
        self.create_self_leveled(title, Kind::Enumeration, scope)
    }

    pub fn create_protocol(&mut self, title: Option<&str>, scope: Option<CompositeId>) -> CompositeId {
        self.create_self_leveled(title, Kind::Protocol, scope)
    }

    pub fn create_structure(&mut self, title: Option<&str>, scope: Option<CompositeId>) -> CompositeId {
        self.create_self_leveled(title, Kind::Structure, scope)
    }

    /// Function inheriting its level slots from `scope`.
    pub fn create_function(
        &mut self,
        title: Option<&str>,
        statements: Statements,
        scope: Option<CompositeId>,
    ) -> CompositeId {
        let id = self.create_composite(title, Type::predefined(Predefined::Function), scope);
        if let Some(composite) = self.store.get_mut(id) {
            composite.statements = statements;
        }
        if let Some(scope) = scope {
            self.set_inherited_levels(id, scope);
        }
        id
    }

    pub fn create_namespace(
        &mut self,
        title: Option<&str>,
        scope: Option<CompositeId>,
        levels: Levels,
    ) -> CompositeId {
        let id = self.create_composite(title, Type::predefined(Predefined::Namespace), scope);
        match levels {
            Levels::Own => self.set_self_levels(id, id),
            Levels::From(levels) => self.set_inherited_levels(id, levels),
            Levels::Missing => {}
        }
        id
    }

    /// Object instance of `class`, linked into an instantiation chain.
    pub fn create_object(
        &mut self,
        super_object: Option<CompositeId>,
        class: CompositeId,
        sub_object: Option<CompositeId>,
    ) -> CompositeId {
        let mut type_ = Type::predefined(Predefined::Object);
        let inherited = type_.collection_part(None, Some(0), Collection::InheritedTypes);
        let part = type_.push(Some(inherited));
        if let Some(part) = type_.part_mut(part) {
            part.reference = Some(class);
        }

        let title = match self.store.get(class).and_then(|class| class.title.as_deref()) {
            Some(title) => format!("Object<{title}>"),
            None => format!("Object<{class}>"),
        };
        let id = self.create_composite(Some(&title), type_, Some(class));
        if super_object.is_some() {
            self.set_super_levels(id, super_object);
        }
        self.set_self_levels(id, id);
        self.set_sub_levels(id, sub_object);
        id
    }

    // --- Level slots ---

    /// Type-level identity: the composite itself, or an object's class.
    pub fn self_composite(&self, id: CompositeId) -> Option<CompositeId> {
        let composite = self.store.get(id)?;
        if composite.is(Kind::Object) {
            composite.type_.inherited_reference()
        } else {
            Some(id)
        }
    }

    pub fn set_super_levels(&mut self, id: CompositeId, super_composite: Option<CompositeId>) {
        let super_type = super_composite.and_then(|s| self.self_composite(s));
        self.set_slot(id, Slot::Super, super_composite);
        self.set_slot(id, Slot::SuperType, super_type);
    }

    pub fn set_self_levels(&mut self, id: CompositeId, self_composite: CompositeId) {
        let self_type = self.self_composite(self_composite);
        self.set_slot(id, Slot::Current, Some(self_composite));
        self.set_slot(id, Slot::CurrentType, self_type);
    }

    pub fn set_sub_levels(&mut self, object: CompositeId, sub_object: Option<CompositeId>) {
        if !self.store.is_kind(Some(object), Kind::Object) {
            return;
        }
        let Some(sub_object) = sub_object.filter(|sub| self.store.is_kind(Some(*sub), Kind::Object)) else {
            return;
        };
        let sub_type = self
            .store
            .get(sub_object)
            .and_then(|sub| sub.type_.inherited_reference());
        self.set_slot(object, Slot::Sub, Some(sub_object));
        self.set_slot(object, Slot::SubType, sub_type);
    }

    /// Copies every level slot of `from` into `id`.
    pub fn set_inherited_levels(&mut self, id: CompositeId, from: CompositeId) {
        if id == from {
            return;
        }
        for slot in Slot::LEVELS {
            let value = self.store.get(from).and_then(|from| from.ids.get(slot));
            self.set_slot(id, slot, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::Life;

    #[test]
    fn objects_link_to_their_class() {
        let mut interpreter = Interpreter::default();
        let global = interpreter.create_namespace(Some("Global"), None, Levels::Own);
        let class = interpreter.create_class(Some("A"), Some(global));
        let object = interpreter.create_object(None, class, None);

        let composite = interpreter.store().get(object).unwrap();
        assert_eq!(composite.life, Life::Creating);
        assert_eq!(composite.ids.current, Some(object));
        assert_eq!(composite.ids.current_type, Some(class));
        assert_eq!(composite.ids.scope, Some(class));
        assert!(interpreter.store().get(class).unwrap().ids.retainers.contains(&object));
    }

    #[test]
    fn functions_inherit_levels_from_scope() {
        let mut interpreter = Interpreter::default();
        let global = interpreter.create_namespace(Some("Global"), None, Levels::Own);
        let class = interpreter.create_class(Some("A"), Some(global));
        let function = interpreter.create_function(Some("f"), Statements::None, Some(class));

        let composite = interpreter.store().get(function).unwrap();
        assert_eq!(composite.ids.current, Some(class));
        assert_eq!(composite.ids.current_type, Some(class));
        assert_eq!(composite.ids.scope, Some(class));
    }

    #[test]
    fn missing_levels_stay_empty() {
        let mut interpreter = Interpreter::default();
        let global = interpreter.create_namespace(Some("Global"), None, Levels::Own);
        let local = interpreter.create_namespace(Some("Local"), Some(global), Levels::Missing);

        let composite = interpreter.store().get(local).unwrap();
        assert_eq!(composite.ids.current, None);
        assert_eq!(composite.ids.scope, Some(global));
    }
}
