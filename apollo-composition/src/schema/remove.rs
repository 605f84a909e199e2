//! Removal of schema elements and the cascading removal policy.
use tracing::debug;

use super::ArgumentId;
use super::ArgumentParent;
use super::Directive;
use super::DirectiveDefinitionId;
use super::DirectiveId;
use super::DirectiveTarget;
use super::EnumValueId;
use super::FieldId;
use super::InputFieldId;
use super::Referencer;
use super::Schema;
use super::SchemaRootKind;
use super::TypeDefinitionKind;
use super::TypeId;
use crate::error::FederationError;
use crate::link::database::links_metadata;

impl Schema {
    /// Removes a type and everything it owns.
    ///
    /// Each element that referenced the type drops its now-dangling reference; those still in
    /// the schema are returned so the caller can decide whether to remove them as well.
    pub fn remove_type(&mut self, id: TypeId) -> Result<Vec<Referencer>, FederationError> {
        self.check_type_modifiable(id)?;
        let ty = self.get(id)?;
        let name = ty.name.clone();
        let is_built_in = ty.is_built_in;
        let directives = ty.directives.clone();
        let extensions: Vec<_> = ty.extensions.iter().copied().collect();
        match ty.kind.clone() {
            TypeDefinitionKind::Scalar => {}
            TypeDefinitionKind::Object(composite) | TypeDefinitionKind::Interface(composite) => {
                for field in composite.fields.into_values() {
                    self.drop_field(field, false);
                }
                for interface in composite.interfaces.keys() {
                    self.unregister_type_reference(interface, Referencer::ImplementingType(id));
                }
            }
            TypeDefinitionKind::Union(members) => {
                for member in members.keys() {
                    self.unregister_type_reference(member, Referencer::UnionType(id));
                }
            }
            TypeDefinitionKind::Enum(values) => {
                for value in values.into_values() {
                    self.drop_enum_value(value, false);
                }
            }
            TypeDefinitionKind::InputObject(fields) => {
                for field in fields.into_values() {
                    self.drop_input_field(field, false);
                }
            }
        }
        self.drop_directives(directives);
        for extension in extensions {
            self.extensions.remove(extension);
        }

        let referencers: Vec<Referencer> = self.get(id)?.referencers.iter().copied().collect();
        let remaining = referencers
            .into_iter()
            .filter(|referencer| self.drop_dangling_reference(*referencer, id))
            .collect();

        let by_name = if is_built_in {
            &mut self.built_in_types
        } else {
            &mut self.types_by_name
        };
        if by_name.get(&name) == Some(&id) {
            by_name.shift_remove(&name);
        }
        self.types.remove(id);
        self.mark_modified();
        Ok(remaining)
    }

    /// Removes a type, then applies the removal policy to every element that referenced it:
    ///
    /// * fields are removed, and so is their parent type if it is left without fields;
    /// * arguments are removed;
    /// * input fields are removed, and so is their parent input object if left empty;
    /// * unions are removed only if they are left without members;
    /// * implementing types and schema roots have already dropped the reference.
    pub fn remove_type_recursive(&mut self, id: TypeId) -> Result<(), FederationError> {
        for referencer in self.remove_type(id)? {
            self.remove_referencer_recursive(referencer)?;
        }
        Ok(())
    }

    fn remove_referencer_recursive(&mut self, referencer: Referencer) -> Result<(), FederationError> {
        let cascades = match referencer {
            Referencer::Field(id) => self.contains(id),
            Referencer::Argument(id) => self.contains(id),
            Referencer::InputField(id) => self.contains(id),
            Referencer::UnionType(id) => self.try_get(id).is_some_and(|union| union.is_empty()),
            Referencer::ImplementingType(_) | Referencer::SchemaRoot(_) => false,
        };
        if !cascades {
            return Ok(());
        }
        let coordinate = self.referencer_coordinate(referencer)?;
        debug!("Removing {coordinate} after the type it referenced was removed");
        match referencer {
            Referencer::Field(id) => self.remove_field_recursive(id),
            Referencer::Argument(id) => self.remove_argument(id),
            Referencer::InputField(id) => self.remove_input_field_recursive(id),
            Referencer::UnionType(id) => self.remove_type_recursive(id),
            Referencer::ImplementingType(_) | Referencer::SchemaRoot(_) => Ok(()),
        }
    }

    /// Clears the reference `referencer` holds on `removed`. Returns whether the referencer
    /// is still part of the schema.
    fn drop_dangling_reference(&mut self, referencer: Referencer, removed: TypeId) -> bool {
        match referencer {
            Referencer::Field(id) => self.fields.get_mut(id).map(|f| f.ty = None).is_some(),
            Referencer::Argument(id) => self.arguments.get_mut(id).map(|a| a.ty = None).is_some(),
            Referencer::InputField(id) => {
                self.input_fields.get_mut(id).map(|f| f.ty = None).is_some()
            }
            Referencer::ImplementingType(id) => {
                let Some(implementer) = self.types.get_mut(id) else {
                    return false;
                };
                if let Some(composite) = implementer.composite_fields_mut() {
                    composite.interfaces.retain(|_, reference| reference.ty != removed);
                }
                true
            }
            Referencer::UnionType(id) => {
                let Some(union) = self.types.get_mut(id) else {
                    return false;
                };
                if let TypeDefinitionKind::Union(members) = &mut union.kind {
                    members.retain(|_, reference| reference.ty != removed);
                }
                true
            }
            Referencer::SchemaRoot(kind) => {
                if self.root_type(kind) == Some(removed) {
                    self.schema_definition.roots.shift_remove(&kind);
                }
                true
            }
        }
    }

    pub fn remove_field(&mut self, id: FieldId) -> Result<(), FederationError> {
        self.check_type_modifiable(self.get(id)?.parent)?;
        self.drop_field(id, true);
        self.mark_modified();
        Ok(())
    }

    /// Removes a field, and its parent type if that leaves the type without fields.
    pub fn remove_field_recursive(&mut self, id: FieldId) -> Result<(), FederationError> {
        let parent = self.get(id)?.parent;
        self.remove_field(id)?;
        if let Some(parent_type) = self.try_get(parent).filter(|parent| parent.is_empty()) {
            debug!("Removing type {} left without fields", parent_type.name);
            self.remove_type_recursive(parent)?;
        }
        Ok(())
    }

    pub fn remove_argument(&mut self, id: ArgumentId) -> Result<(), FederationError> {
        self.check_target_modifiable(DirectiveTarget::Argument(id))?;
        self.drop_argument(id, true);
        self.mark_modified();
        Ok(())
    }

    pub fn remove_input_field(&mut self, id: InputFieldId) -> Result<(), FederationError> {
        self.check_type_modifiable(self.get(id)?.parent)?;
        self.drop_input_field(id, true);
        self.mark_modified();
        Ok(())
    }

    /// Removes an input field, and its parent input object if that leaves it empty.
    pub fn remove_input_field_recursive(&mut self, id: InputFieldId) -> Result<(), FederationError> {
        let parent = self.get(id)?.parent;
        self.remove_input_field(id)?;
        if let Some(parent_type) = self.try_get(parent).filter(|parent| parent.is_empty()) {
            debug!("Removing input type {} left without fields", parent_type.name);
            self.remove_type_recursive(parent)?;
        }
        Ok(())
    }

    pub fn remove_enum_value(&mut self, id: EnumValueId) -> Result<(), FederationError> {
        self.check_type_modifiable(self.get(id)?.parent)?;
        self.drop_enum_value(id, true);
        self.mark_modified();
        Ok(())
    }

    pub fn remove_union_member(&mut self, union: TypeId, member: &str) -> Result<(), FederationError> {
        self.check_type_modifiable(union)?;
        let removed = match &mut self.get_mut(union)?.kind {
            TypeDefinitionKind::Union(members) => members.shift_remove(member).is_some(),
            _ => false,
        };
        if removed {
            self.unregister_type_reference(member, Referencer::UnionType(union));
            self.mark_modified();
        }
        Ok(())
    }

    pub fn remove_implemented_interface(
        &mut self,
        ty: TypeId,
        interface: &str,
    ) -> Result<(), FederationError> {
        self.check_type_modifiable(ty)?;
        let removed = self
            .get_mut(ty)?
            .composite_fields_mut()
            .is_some_and(|composite| composite.interfaces.shift_remove(interface).is_some());
        if removed {
            self.unregister_type_reference(interface, Referencer::ImplementingType(ty));
            self.mark_modified();
        }
        Ok(())
    }

    pub fn remove_root_type(&mut self, kind: SchemaRootKind) -> Result<(), FederationError> {
        if let Some(root) = self.schema_definition.roots.shift_remove(&kind) {
            if let Some(ty) = self.types.get_mut(root.ty) {
                ty.referencers.shift_remove(&Referencer::SchemaRoot(kind));
            }
            self.mark_modified();
        }
        Ok(())
    }

    /// Removes a directive definition, returning the applications that referenced it.
    ///
    /// The applications are left in place; they stop resolving to a definition.
    pub fn remove_directive_definition(
        &mut self,
        id: DirectiveDefinitionId,
    ) -> Result<Vec<DirectiveId>, FederationError> {
        let definition = self.get(id)?;
        self.check_built_in_modification(definition.is_built_in, || {
            format!("directive \"@{}\"", definition.name)
        })?;
        let Some(definition) = self.directive_definitions.remove(id) else {
            return Ok(Vec::new());
        };
        for argument in definition.arguments.into_values() {
            self.drop_argument(argument, false);
        }
        let by_name = if definition.is_built_in {
            &mut self.built_in_directive_definitions
        } else {
            &mut self.directive_definitions_by_name
        };
        if by_name.get(&definition.name) == Some(&id) {
            by_name.shift_remove(&definition.name);
        }
        let applications: Vec<DirectiveId> = definition
            .referencers
            .into_iter()
            .filter(|application| self.directives.contains(*application))
            .collect();
        // A shadowed built-in takes over the applications.
        if let Some(shadowed) = self.directive_definition_id(&definition.name) {
            if let Some(shadowed) = self.directive_definitions.get_mut(shadowed) {
                shadowed.referencers.extend(applications.iter().copied());
            }
        }
        self.mark_modified();
        Ok(applications)
    }

    /// Removes a directive definition together with all its applications.
    pub fn remove_directive_definition_recursive(
        &mut self,
        id: DirectiveDefinitionId,
    ) -> Result<(), FederationError> {
        let name = self.get(id)?.name.clone();
        self.remove_directive_definition(id)?;
        let applications: Vec<DirectiveId> = self
            .directives
            .iter()
            .filter(|(_, directive)| directive.name == name)
            .map(|(id, _)| id)
            .collect();
        for application in applications {
            self.remove_directive(application)?;
        }
        Ok(())
    }

    /// Removes a single directive application from its target.
    pub fn remove_directive(&mut self, id: DirectiveId) -> Result<(), FederationError> {
        let target = self.get(id)?.target;
        self.check_target_modifiable(target)?;
        self.directives_on_mut(target)?
            .retain(|application| *application != id);
        self.drop_directives(vec![id]);
        if target == DirectiveTarget::SchemaDefinition {
            let schema_directives: Vec<&Directive> = self
                .schema_definition
                .directives
                .iter()
                .filter_map(|id| self.directives.get(*id))
                .collect();
            self.links = links_metadata(&schema_directives)?;
        }
        self.mark_modified();
        Ok(())
    }

    fn drop_directives(&mut self, ids: Vec<DirectiveId>) {
        for id in ids {
            let Some(directive) = self.directives.remove(id) else {
                continue;
            };
            if let Some(definition) = self
                .directive_definition_id(&directive.name)
                .and_then(|definition| self.directive_definitions.get_mut(definition))
            {
                definition.referencers.shift_remove(&id);
            }
        }
    }

    fn drop_field(&mut self, id: FieldId, detach: bool) {
        let Some(field) = self.fields.remove(id) else {
            return;
        };
        for argument in field.arguments.into_values() {
            self.drop_argument(argument, false);
        }
        self.drop_directives(field.directives);
        if let Some(ty) = &field.ty {
            self.unregister_type_reference(ty.inner_named_type(), Referencer::Field(id));
        }
        if detach {
            if let Some(composite) = self
                .types
                .get_mut(field.parent)
                .and_then(|parent| parent.composite_fields_mut())
            {
                composite.fields.shift_remove(&field.name);
            }
        }
    }

    fn drop_argument(&mut self, id: ArgumentId, detach: bool) {
        let Some(argument) = self.arguments.remove(id) else {
            return;
        };
        self.drop_directives(argument.directives);
        if let Some(ty) = &argument.ty {
            self.unregister_type_reference(ty.inner_named_type(), Referencer::Argument(id));
        }
        if detach {
            match argument.parent {
                ArgumentParent::Field(field) => {
                    if let Some(field) = self.fields.get_mut(field) {
                        field.arguments.shift_remove(&argument.name);
                    }
                }
                ArgumentParent::Directive(directive) => {
                    if let Some(directive) = self.directive_definitions.get_mut(directive) {
                        directive.arguments.shift_remove(&argument.name);
                    }
                }
            }
        }
    }

    fn drop_input_field(&mut self, id: InputFieldId, detach: bool) {
        let Some(field) = self.input_fields.remove(id) else {
            return;
        };
        self.drop_directives(field.directives);
        if let Some(ty) = &field.ty {
            self.unregister_type_reference(ty.inner_named_type(), Referencer::InputField(id));
        }
        if detach {
            if let Some(TypeDefinitionKind::InputObject(fields)) =
                self.types.get_mut(field.parent).map(|parent| &mut parent.kind)
            {
                fields.shift_remove(&field.name);
            }
        }
    }

    fn drop_enum_value(&mut self, id: EnumValueId, detach: bool) {
        let Some(value) = self.enum_values.remove(id) else {
            return;
        };
        self.drop_directives(value.directives);
        if detach {
            if let Some(TypeDefinitionKind::Enum(values)) =
                self.types.get_mut(value.parent).map(|parent| &mut parent.kind)
            {
                values.shift_remove(&value.name);
            }
        }
    }
}
