//! Element creation and in-place edits of the schema graph.
use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast;
use apollo_compiler::ast::DirectiveLocation;
use indexmap::IndexMap;

use super::ArgumentDefinition;
use super::ArgumentId;
use super::ArgumentParent;
use super::Directive;
use super::DirectiveDefinition;
use super::DirectiveDefinitionId;
use super::DirectiveId;
use super::DirectiveTarget;
use super::EnumValue;
use super::EnumValueId;
use super::Extension;
use super::ExtensionId;
use super::ExtensionOwner;
use super::FieldDefinition;
use super::FieldId;
use super::InputFieldDefinition;
use super::InputFieldId;
use super::NamedType;
use super::Referencer;
use super::RootOperation;
use super::Schema;
use super::SchemaRootKind;
use super::TypeDefinitionKind;
use super::TypeId;
use super::TypeKind;
use super::TypeReference;
use super::TypedElement;
use crate::error::FederationError;
use crate::error::SingleFederationError;
use crate::link::database::links_metadata;

/// An element that can be tagged as coming from an `extend` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionMember {
    Field(FieldId),
    InputField(InputFieldId),
    EnumValue(EnumValueId),
    Directive(DirectiveId),
    ImplementedInterface { ty: TypeId, interface: Name },
    UnionMember { union: TypeId, member: Name },
    RootType(SchemaRootKind),
}

fn duplicate(message: String) -> FederationError {
    SingleFederationError::DuplicateName { message }.into()
}

impl Schema {
    pub fn add_type(&mut self, name: Name, kind: TypeKind) -> Result<TypeId, FederationError> {
        self.insert_type(name, kind, false)
    }

    /// Adds a built-in type. After construction this needs [`Schema::with_built_in_modification`].
    pub fn add_built_in_type(
        &mut self,
        name: Name,
        kind: TypeKind,
    ) -> Result<TypeId, FederationError> {
        self.insert_type(name, kind, true)
    }

    fn insert_type(
        &mut self,
        name: Name,
        kind: TypeKind,
        is_built_in: bool,
    ) -> Result<TypeId, FederationError> {
        self.check_built_in_modification(is_built_in, || format!("type \"{name}\""))?;
        let existing = if is_built_in {
            self.built_in_types.get(&name)
        } else {
            self.types_by_name.get(&name).or_else(|| {
                // Built-ins can only be shadowed once the schema is constructed.
                self.built_in_types
                    .get(&name)
                    .filter(|_| !self.is_constructed)
            })
        };
        if existing.is_some() {
            return Err(SingleFederationError::TypeAlreadyExists {
                message: format!("Type \"{name}\" already exists in this schema"),
            }
            .into());
        }
        let id = self.types.insert(NamedType {
            name: name.clone(),
            description: None,
            is_built_in,
            has_definition: true,
            kind: TypeDefinitionKind::empty(kind),
            directives: Vec::new(),
            extensions: Default::default(),
            referencers: Default::default(),
        });
        if is_built_in {
            self.built_in_types.insert(name, id);
        } else {
            self.types_by_name.insert(name, id);
        }
        self.mark_modified();
        Ok(id)
    }

    pub fn add_field(
        &mut self,
        parent: TypeId,
        name: Name,
        ty: ast::Type,
    ) -> Result<FieldId, FederationError> {
        self.check_type_modifiable(parent)?;
        let parent_type = self.get(parent)?;
        let Some(composite) = parent_type.composite_fields() else {
            return Err(SingleFederationError::TypeDefinitionInvalid {
                message: format!(
                    "Cannot add field \"{name}\" to {} \"{}\": only object and interface types have fields",
                    parent_type.type_kind(),
                    parent_type.name
                ),
            }
            .into());
        };
        if composite.fields.contains_key(&name) {
            return Err(duplicate(format!(
                "Field \"{}.{name}\" already exists",
                parent_type.name
            )));
        }
        self.ensure_type_exists(&ty)?;
        let id = self.fields.insert(FieldDefinition {
            name: name.clone(),
            parent,
            description: None,
            ty: Some(ty.clone()),
            arguments: Default::default(),
            directives: Vec::new(),
            extension: None,
        });
        self.register_type_reference(&ty, Referencer::Field(id))?;
        if let Some(composite) = self.get_mut(parent)?.composite_fields_mut() {
            composite.fields.insert(name, id);
        }
        self.mark_modified();
        Ok(id)
    }

    pub fn add_field_argument(
        &mut self,
        field: FieldId,
        name: Name,
        ty: ast::Type,
    ) -> Result<ArgumentId, FederationError> {
        let field_def = self.get(field)?;
        self.check_type_modifiable(field_def.parent)?;
        if field_def.arguments.contains_key(&name) {
            return Err(duplicate(format!(
                "Argument \"{name}\" already exists on field \"{}\"",
                field_def.name
            )));
        }
        self.insert_argument(ArgumentParent::Field(field), name, ty)
    }

    pub fn add_directive_argument(
        &mut self,
        directive: DirectiveDefinitionId,
        name: Name,
        ty: ast::Type,
    ) -> Result<ArgumentId, FederationError> {
        let definition = self.get(directive)?;
        self.check_built_in_modification(definition.is_built_in, || {
            format!("directive \"@{}\"", definition.name)
        })?;
        if definition.arguments.contains_key(&name) {
            return Err(duplicate(format!(
                "Argument \"{name}\" already exists on directive \"@{}\"",
                definition.name
            )));
        }
        self.insert_argument(ArgumentParent::Directive(directive), name, ty)
    }

    fn insert_argument(
        &mut self,
        parent: ArgumentParent,
        name: Name,
        ty: ast::Type,
    ) -> Result<ArgumentId, FederationError> {
        self.ensure_type_exists(&ty)?;
        let id = self.arguments.insert(ArgumentDefinition {
            name: name.clone(),
            parent,
            description: None,
            ty: Some(ty.clone()),
            default_value: None,
            directives: Vec::new(),
        });
        self.register_type_reference(&ty, Referencer::Argument(id))?;
        match parent {
            ArgumentParent::Field(field) => {
                self.get_mut(field)?.arguments.insert(name, id);
            }
            ArgumentParent::Directive(directive) => {
                self.get_mut(directive)?.arguments.insert(name, id);
            }
        }
        self.mark_modified();
        Ok(id)
    }

    pub fn add_input_field(
        &mut self,
        parent: TypeId,
        name: Name,
        ty: ast::Type,
    ) -> Result<InputFieldId, FederationError> {
        self.check_type_modifiable(parent)?;
        let parent_type = self.get(parent)?;
        let TypeDefinitionKind::InputObject(fields) = &parent_type.kind else {
            return Err(SingleFederationError::TypeDefinitionInvalid {
                message: format!(
                    "Cannot add input field \"{name}\" to non-input-object type \"{}\"",
                    parent_type.name
                ),
            }
            .into());
        };
        if fields.contains_key(&name) {
            return Err(duplicate(format!(
                "Input field \"{}.{name}\" already exists",
                parent_type.name
            )));
        }
        self.ensure_type_exists(&ty)?;
        let id = self.input_fields.insert(InputFieldDefinition {
            name: name.clone(),
            parent,
            description: None,
            ty: Some(ty.clone()),
            default_value: None,
            directives: Vec::new(),
            extension: None,
        });
        self.register_type_reference(&ty, Referencer::InputField(id))?;
        if let TypeDefinitionKind::InputObject(fields) = &mut self.get_mut(parent)?.kind {
            fields.insert(name, id);
        }
        self.mark_modified();
        Ok(id)
    }

    pub fn add_enum_value(
        &mut self,
        parent: TypeId,
        name: Name,
    ) -> Result<EnumValueId, FederationError> {
        self.check_type_modifiable(parent)?;
        let parent_type = self.get(parent)?;
        let TypeDefinitionKind::Enum(values) = &parent_type.kind else {
            return Err(SingleFederationError::TypeDefinitionInvalid {
                message: format!(
                    "Cannot add enum value \"{name}\" to non-enum type \"{}\"",
                    parent_type.name
                ),
            }
            .into());
        };
        if values.contains_key(&name) {
            return Err(duplicate(format!(
                "Enum value \"{}.{name}\" already exists",
                parent_type.name
            )));
        }
        let id = self.enum_values.insert(EnumValue {
            name: name.clone(),
            parent,
            description: None,
            directives: Vec::new(),
            extension: None,
        });
        if let TypeDefinitionKind::Enum(values) = &mut self.get_mut(parent)?.kind {
            values.insert(name, id);
        }
        self.mark_modified();
        Ok(id)
    }

    pub fn add_union_member(&mut self, union: TypeId, member: &str) -> Result<(), FederationError> {
        self.check_type_modifiable(union)?;
        let union_type = self.get(union)?;
        let TypeDefinitionKind::Union(members) = &union_type.kind else {
            return Err(SingleFederationError::TypeDefinitionInvalid {
                message: format!(
                    "Cannot add member \"{member}\" to non-union type \"{}\"",
                    union_type.name
                ),
            }
            .into());
        };
        if members.contains_key(member) {
            return Err(duplicate(format!(
                "Union \"{}\" already has member \"{member}\"",
                union_type.name
            )));
        }
        let member_id = self.register_type_reference(
            &ast::Type::Named(Name::new(member)?),
            Referencer::UnionType(union),
        )?;
        let member_name = self.get(member_id)?.name.clone();
        if let TypeDefinitionKind::Union(members) = &mut self.get_mut(union)?.kind {
            members.insert(
                member_name,
                TypeReference {
                    ty: member_id,
                    extension: None,
                },
            );
        }
        self.mark_modified();
        Ok(())
    }

    pub fn add_implemented_interface(
        &mut self,
        ty: TypeId,
        interface: &str,
    ) -> Result<(), FederationError> {
        self.check_type_modifiable(ty)?;
        let implementer = self.get(ty)?;
        let Some(composite) = implementer.composite_fields() else {
            return Err(SingleFederationError::TypeDefinitionInvalid {
                message: format!(
                    "Type \"{}\" cannot implement interfaces: it is not an object or interface type",
                    implementer.name
                ),
            }
            .into());
        };
        if composite.interfaces.contains_key(interface) {
            return Err(duplicate(format!(
                "Type \"{}\" already implements \"{interface}\"",
                implementer.name
            )));
        }
        match self.get_type(interface) {
            Some(target) if target.type_kind() == TypeKind::Interface => {}
            Some(target) => {
                return Err(SingleFederationError::TypeDefinitionInvalid {
                    message: format!(
                        "Type \"{}\" cannot implement non-interface type \"{interface}\" ({})",
                        implementer.name,
                        target.type_kind()
                    ),
                }
                .into());
            }
            None => {
                return Err(SingleFederationError::UndefinedType {
                    message: format!("Cannot implement unknown interface \"{interface}\""),
                }
                .into());
            }
        }
        let interface_id = self.register_type_reference(
            &ast::Type::Named(Name::new(interface)?),
            Referencer::ImplementingType(ty),
        )?;
        let interface_name = self.get(interface_id)?.name.clone();
        if let Some(composite) = self.get_mut(ty)?.composite_fields_mut() {
            composite.interfaces.insert(
                interface_name,
                TypeReference {
                    ty: interface_id,
                    extension: None,
                },
            );
        }
        self.mark_modified();
        Ok(())
    }

    pub fn set_root_type(&mut self, kind: SchemaRootKind, ty: TypeId) -> Result<(), FederationError> {
        let name = self.get(ty)?.name.clone();
        if let Some(previous) = self.schema_definition.roots.get(&kind).map(|root| root.ty) {
            if let Some(previous) = self.types.get_mut(previous) {
                previous.referencers.shift_remove(&Referencer::SchemaRoot(kind));
            }
        }
        self.register_type_reference(&ast::Type::Named(name), Referencer::SchemaRoot(kind))?;
        let extension = self
            .schema_definition
            .roots
            .get(&kind)
            .and_then(|root| root.extension);
        self.schema_definition
            .roots
            .insert(kind, RootOperation { ty, extension });
        self.mark_modified();
        Ok(())
    }

    /// Re-points the type annotation of `element`, moving its referencer registration.
    pub fn set_type(&mut self, element: TypedElement, ty: ast::Type) -> Result<(), FederationError> {
        self.check_typed_element_modifiable(element)?;
        self.ensure_type_exists(&ty)?;
        let previous = self.type_of(element)?.cloned();
        if let Some(previous) = previous {
            self.unregister_type_reference(previous.inner_named_type(), element.into());
        }
        self.register_type_reference(&ty, element.into())?;
        match element {
            TypedElement::Field(id) => self.get_mut(id)?.ty = Some(ty),
            TypedElement::Argument(id) => self.get_mut(id)?.ty = Some(ty),
            TypedElement::InputField(id) => self.get_mut(id)?.ty = Some(ty),
        }
        self.mark_modified();
        Ok(())
    }

    /// Sets the default value of an argument or input field.
    pub fn set_default_value(
        &mut self,
        element: TypedElement,
        value: Option<Node<ast::Value>>,
    ) -> Result<(), FederationError> {
        self.check_typed_element_modifiable(element)?;
        match element {
            TypedElement::Argument(id) => self.get_mut(id)?.default_value = value,
            TypedElement::InputField(id) => self.get_mut(id)?.default_value = value,
            TypedElement::Field(id) => {
                let coordinate = self.target_coordinate(DirectiveTarget::Field(id))?;
                return Err(SingleFederationError::TypeDefinitionInvalid {
                    message: format!("Output field \"{coordinate}\" cannot have a default value"),
                }
                .into());
            }
        }
        self.mark_modified();
        Ok(())
    }

    pub fn set_description(
        &mut self,
        target: DirectiveTarget,
        description: Option<Node<str>>,
    ) -> Result<(), FederationError> {
        self.check_target_modifiable(target)?;
        match target {
            DirectiveTarget::SchemaDefinition => self.schema_definition.description = description,
            DirectiveTarget::Type(id) => self.get_mut(id)?.description = description,
            DirectiveTarget::Field(id) => self.get_mut(id)?.description = description,
            DirectiveTarget::Argument(id) => self.get_mut(id)?.description = description,
            DirectiveTarget::InputField(id) => self.get_mut(id)?.description = description,
            DirectiveTarget::EnumValue(id) => self.get_mut(id)?.description = description,
        }
        self.mark_modified();
        Ok(())
    }

    pub fn set_directive_definition_description(
        &mut self,
        directive: DirectiveDefinitionId,
        description: Option<Node<str>>,
    ) -> Result<(), FederationError> {
        let definition = self.get(directive)?;
        self.check_built_in_modification(definition.is_built_in, || {
            format!("directive \"@{}\"", definition.name)
        })?;
        self.get_mut(directive)?.description = description;
        self.mark_modified();
        Ok(())
    }

    pub fn add_directive_definition(
        &mut self,
        name: Name,
        repeatable: bool,
        locations: Vec<DirectiveLocation>,
    ) -> Result<DirectiveDefinitionId, FederationError> {
        self.insert_directive_definition(name, repeatable, locations, false)
    }

    pub fn add_built_in_directive_definition(
        &mut self,
        name: Name,
        repeatable: bool,
        locations: Vec<DirectiveLocation>,
    ) -> Result<DirectiveDefinitionId, FederationError> {
        self.insert_directive_definition(name, repeatable, locations, true)
    }

    fn insert_directive_definition(
        &mut self,
        name: Name,
        repeatable: bool,
        locations: Vec<DirectiveLocation>,
        is_built_in: bool,
    ) -> Result<DirectiveDefinitionId, FederationError> {
        self.check_built_in_modification(is_built_in, || format!("directive \"@{name}\""))?;
        let existing = if is_built_in {
            self.built_in_directive_definitions.get(&name)
        } else {
            self.directive_definitions_by_name.get(&name).or_else(|| {
                self.built_in_directive_definitions
                    .get(&name)
                    .filter(|_| !self.is_constructed)
            })
        };
        if existing.is_some() {
            return Err(SingleFederationError::DirectiveDefinitionAlreadyExists {
                message: format!("Directive \"@{name}\" already exists in this schema"),
            }
            .into());
        }
        let id = self.directive_definitions.insert(DirectiveDefinition {
            name: name.clone(),
            description: None,
            repeatable,
            locations,
            arguments: Default::default(),
            is_built_in,
            referencers: Default::default(),
        });
        if is_built_in {
            self.built_in_directive_definitions.insert(name.clone(), id);
        } else {
            self.directive_definitions_by_name.insert(name.clone(), id);
        }
        // Applications are resolved by name, so existing ones now point at this definition.
        if self.directive_definition_id(&name) == Some(id) {
            let applications: Vec<DirectiveId> = self
                .directives
                .iter()
                .filter(|(_, directive)| directive.name == name)
                .map(|(id, _)| id)
                .collect();
            if let Some(shadowed) = self.built_in_directive_definitions.get(&name).copied() {
                if shadowed != id {
                    if let Some(shadowed) = self.directive_definitions.get_mut(shadowed) {
                        shadowed.referencers.clear();
                    }
                }
            }
            self.get_mut(id)?.referencers.extend(applications);
        }
        self.mark_modified();
        Ok(id)
    }

    /// Applies `directive` on `target`.
    ///
    /// Applying `@link` (or its `@core` predecessor) on the schema definition registers the
    /// linked feature, and fails if that feature is already linked.
    pub fn apply_directive(
        &mut self,
        target: DirectiveTarget,
        directive: &ast::Directive,
    ) -> Result<DirectiveId, FederationError> {
        let mut arguments = IndexMap::with_capacity(directive.arguments.len());
        for argument in &directive.arguments {
            if arguments
                .insert(argument.name.clone(), argument.value.clone())
                .is_some()
            {
                return Err(SingleFederationError::InvalidGraphQL {
                    message: format!(
                        "Argument \"{}\" is given twice in application of \"@{}\"",
                        argument.name, directive.name
                    ),
                }
                .into());
            }
        }
        self.apply_directive_with_arguments(target, directive.name.clone(), arguments)
    }

    pub fn apply_directive_with_arguments(
        &mut self,
        target: DirectiveTarget,
        name: Name,
        arguments: IndexMap<Name, Node<ast::Value>>,
    ) -> Result<DirectiveId, FederationError> {
        self.check_target_modifiable(target)?;
        // Fails on detached targets.
        self.directives_on(target)?;
        let application = Directive {
            name,
            arguments,
            target,
            extension: None,
        };
        if target == DirectiveTarget::SchemaDefinition {
            let mut schema_directives: Vec<&Directive> = self
                .schema_definition
                .directives
                .iter()
                .filter_map(|id| self.directives.get(*id))
                .collect();
            schema_directives.push(&application);
            self.links = links_metadata(&schema_directives)?;
        }
        let definition = self.directive_definition_id(&application.name);
        let id = self.directives.insert(application);
        self.directives_on_mut(target)?.push(id);
        if let Some(definition) = definition {
            self.get_mut(definition)?.referencers.insert(id);
        }
        self.mark_modified();
        Ok(id)
    }

    pub fn add_extension(&mut self, owner: ExtensionOwner) -> Result<ExtensionId, FederationError> {
        if let ExtensionOwner::Type(ty) = owner {
            self.check_type_modifiable(ty)?;
        }
        let id = self.extensions.insert(Extension { owner });
        match owner {
            ExtensionOwner::SchemaDefinition => {
                self.schema_definition.extensions.insert(id);
            }
            ExtensionOwner::Type(ty) => {
                self.get_mut(ty)?.extensions.insert(id);
            }
        }
        self.mark_modified();
        Ok(id)
    }

    /// Tags `member` as coming from `extension` (or from the main definition, with `None`).
    ///
    /// The extension must belong to the element owning `member`.
    pub fn set_extension(
        &mut self,
        member: ExtensionMember,
        extension: Option<ExtensionId>,
    ) -> Result<(), FederationError> {
        let owner = match &member {
            ExtensionMember::Field(id) => Some(ExtensionOwner::Type(self.get(*id)?.parent)),
            ExtensionMember::InputField(id) => Some(ExtensionOwner::Type(self.get(*id)?.parent)),
            ExtensionMember::EnumValue(id) => Some(ExtensionOwner::Type(self.get(*id)?.parent)),
            ExtensionMember::Directive(id) => match self.get(*id)?.target {
                DirectiveTarget::SchemaDefinition => Some(ExtensionOwner::SchemaDefinition),
                DirectiveTarget::Type(ty) => Some(ExtensionOwner::Type(ty)),
                _ => None,
            },
            ExtensionMember::ImplementedInterface { ty, .. } => Some(ExtensionOwner::Type(*ty)),
            ExtensionMember::UnionMember { union, .. } => Some(ExtensionOwner::Type(*union)),
            ExtensionMember::RootType(_) => Some(ExtensionOwner::SchemaDefinition),
        };
        if let Some(extension) = extension {
            let extension_owner = self.get(extension)?.owner;
            if owner != Some(extension_owner) {
                return Err(SingleFederationError::InvalidGraphQL {
                    message: format!(
                        "Cannot tag {member:?} with an extension of a different element"
                    ),
                }
                .into());
            }
        }
        if let Some(ExtensionOwner::Type(ty)) = owner {
            self.check_type_modifiable(ty)?;
        }
        match member {
            ExtensionMember::Field(id) => self.get_mut(id)?.extension = extension,
            ExtensionMember::InputField(id) => self.get_mut(id)?.extension = extension,
            ExtensionMember::EnumValue(id) => self.get_mut(id)?.extension = extension,
            ExtensionMember::Directive(id) => self.get_mut(id)?.extension = extension,
            ExtensionMember::ImplementedInterface { ty, interface } => {
                let reference = self
                    .get_mut(ty)?
                    .composite_fields_mut()
                    .and_then(|composite| composite.interfaces.get_mut(&interface));
                let Some(reference) = reference else {
                    return Err(unknown_member(&interface));
                };
                reference.extension = extension;
            }
            ExtensionMember::UnionMember { union, member } => {
                let reference = match &mut self.get_mut(union)?.kind {
                    TypeDefinitionKind::Union(members) => members.get_mut(&member),
                    _ => None,
                };
                let Some(reference) = reference else {
                    return Err(unknown_member(&member));
                };
                reference.extension = extension;
            }
            ExtensionMember::RootType(kind) => {
                let Some(root) = self.schema_definition.roots.get_mut(&kind) else {
                    return Err(unknown_member(&kind.to_string()));
                };
                root.extension = extension;
            }
        }
        self.mark_modified();
        Ok(())
    }

    fn ensure_type_exists(&self, ty: &ast::Type) -> Result<(), FederationError> {
        let name = ty.inner_named_type();
        if self.type_id(name).is_none() {
            return Err(SingleFederationError::UndefinedType {
                message: format!("Cannot reference unknown type \"{name}\""),
            }
            .into());
        }
        Ok(())
    }

    fn check_typed_element_modifiable(&self, element: TypedElement) -> Result<(), FederationError> {
        self.check_target_modifiable(match element {
            TypedElement::Field(id) => DirectiveTarget::Field(id),
            TypedElement::Argument(id) => DirectiveTarget::Argument(id),
            TypedElement::InputField(id) => DirectiveTarget::InputField(id),
        })
    }
}

fn unknown_member(name: &str) -> FederationError {
    SingleFederationError::InvalidGraphQL {
        message: format!("Cannot tag unknown member \"{name}\" with an extension"),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use apollo_compiler::name;
    use apollo_compiler::ty;

    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn user_types_shadow_built_ins_after_construction() {
        let mut schema = Schema::new();
        let built_in = schema.type_id("String").unwrap();
        let shadow = schema.add_type(name!("String"), TypeKind::Scalar).unwrap();
        assert_ne!(built_in, shadow);
        assert_eq!(schema.type_id("String"), Some(shadow));

        let err = schema.add_type(name!("String"), TypeKind::Scalar).unwrap_err();
        assert_eq!(err.codes(), vec![ErrorCode::TypeAlreadyExists]);
    }

    #[test]
    fn adding_built_ins_requires_the_modification_scope() {
        let mut schema = Schema::new();
        let err = schema
            .add_built_in_directive_definition(name!("oneOf"), false, vec![DirectiveLocation::InputObject])
            .unwrap_err();
        assert_eq!(err.codes(), vec![ErrorCode::BuiltInModification]);

        let id = schema
            .with_built_in_modification(|schema| {
                schema.add_built_in_directive_definition(
                    name!("oneOf"),
                    false,
                    vec![DirectiveLocation::InputObject],
                )
            })
            .unwrap();
        assert!(schema.get(id).unwrap().is_built_in);
    }

    #[test]
    fn fields_register_as_referencers() {
        let mut schema = Schema::new();
        let user = schema.add_type(name!("User"), TypeKind::Object).unwrap();
        let query = schema.add_type(name!("Query"), TypeKind::Object).unwrap();
        let me = schema.add_field(query, name!("me"), ty!(User)).unwrap();
        let id = schema.add_field(user, name!("id"), ty!(ID!)).unwrap();

        assert!(schema.get(user).unwrap().referencers.contains(&Referencer::Field(me)));
        let id_type = schema.type_id("ID").unwrap();
        assert!(schema.get(id_type).unwrap().referencers.contains(&Referencer::Field(id)));

        schema.set_type(TypedElement::Field(me), ty!([User!]!)).unwrap();
        schema.set_type(TypedElement::Field(id), ty!(String)).unwrap();
        assert!(!schema.get(id_type).unwrap().referencers.contains(&Referencer::Field(id)));
        assert!(schema.get(user).unwrap().referencers.contains(&Referencer::Field(me)));

        let err = schema.add_field(query, name!("other"), ty!(Missing)).unwrap_err();
        assert_eq!(err.codes(), vec![ErrorCode::UndefinedType]);
        let err = schema.add_field(query, name!("me"), ty!(User)).unwrap_err();
        assert_eq!(err.codes(), vec![ErrorCode::DuplicateName]);
    }

    #[test]
    fn directive_definitions_pick_up_existing_applications() {
        let mut schema = Schema::new();
        let query = schema.add_type(name!("Query"), TypeKind::Object).unwrap();
        let application = schema
            .apply_directive(
                DirectiveTarget::Type(query),
                &ast::Directive {
                    name: name!("tag"),
                    arguments: Vec::new(),
                },
            )
            .unwrap();
        assert_eq!(schema.definition_of(application), None);

        let tag = schema
            .add_directive_definition(name!("tag"), true, vec![DirectiveLocation::Object])
            .unwrap();
        assert_eq!(schema.definition_of(application), Some(tag));
        assert!(schema.get(tag).unwrap().referencers.contains(&application));
    }

    #[test]
    fn extensions_must_belong_to_the_member_owner() {
        let mut schema = Schema::new();
        let a = schema.add_type(name!("A"), TypeKind::Object).unwrap();
        let b = schema.add_type(name!("B"), TypeKind::Object).unwrap();
        let field = schema.add_field(a, name!("x"), ty!(Int)).unwrap();
        let b_extension = schema.add_extension(ExtensionOwner::Type(b)).unwrap();
        assert!(
            schema
                .set_extension(ExtensionMember::Field(field), Some(b_extension))
                .is_err()
        );
        let a_extension = schema.add_extension(ExtensionOwner::Type(a)).unwrap();
        schema
            .set_extension(ExtensionMember::Field(field), Some(a_extension))
            .unwrap();
        assert_eq!(schema.get(field).unwrap().extension, Some(a_extension));
    }
}
