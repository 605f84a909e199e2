//! The mutable schema graph.
//!
//! A [`Schema`] owns one arena per element kind. Elements refer to each other through typed
//! [`Id`]s, and named types track their referencers so removals can report dependents.
use std::fmt;
use std::sync::OnceLock;

use apollo_compiler::Name;
use apollo_compiler::ast;
use indexmap::IndexMap;

use crate::error::FederationError;
use crate::error::SingleFederationError;
use crate::link::LinksMetadata;

pub mod argument_composition_strategies;
pub mod arena;
mod build;
mod builtins;
pub mod coordinate;
pub mod definitions;
mod mutation;
mod print;
pub mod referencer;
mod remove;
pub mod type_algebra;
pub mod type_and_directive_specification;
mod validate;

pub use arena::Arena;
pub use arena::Id;
pub use coordinate::SchemaCoordinate;
pub use definitions::*;
pub use mutation::ExtensionMember;
pub use referencer::Referencer;
pub use referencer::TypedElement;

pub type TypeId = Id<NamedType>;
pub type FieldId = Id<FieldDefinition>;
pub type ArgumentId = Id<ArgumentDefinition>;
pub type InputFieldId = Id<InputFieldDefinition>;
pub type EnumValueId = Id<EnumValue>;
pub type DirectiveDefinitionId = Id<DirectiveDefinition>;
pub type DirectiveId = Id<Directive>;
pub type ExtensionId = Id<Extension>;

mod sealed {
    pub trait Sealed {}
}

/// An element kind stored in the schema arenas.
pub trait SchemaElement: sealed::Sealed + Sized {
    const KIND: &'static str;

    #[doc(hidden)]
    fn arena(schema: &Schema) -> &Arena<Self>;
}

pub(crate) trait SchemaElementMut: SchemaElement {
    fn arena_mut(schema: &mut Schema) -> &mut Arena<Self>;
}

macro_rules! schema_element {
    ($ty:ty, $field:ident, $kind:literal) => {
        impl sealed::Sealed for $ty {}

        impl SchemaElement for $ty {
            const KIND: &'static str = $kind;

            fn arena(schema: &Schema) -> &Arena<Self> {
                &schema.$field
            }
        }

        impl SchemaElementMut for $ty {
            fn arena_mut(schema: &mut Schema) -> &mut Arena<Self> {
                &mut schema.$field
            }
        }
    };
}

schema_element!(NamedType, types, "type");
schema_element!(FieldDefinition, fields, "field");
schema_element!(ArgumentDefinition, arguments, "argument");
schema_element!(InputFieldDefinition, input_fields, "input field");
schema_element!(EnumValue, enum_values, "enum value");
schema_element!(DirectiveDefinition, directive_definitions, "directive definition");
schema_element!(Directive, directives, "directive application");
schema_element!(Extension, extensions, "extension");

/// Derived artifacts, recomputed lazily after any mutation.
#[derive(Default)]
struct SchemaCache {
    ast: OnceLock<ast::Document>,
    api_schema: OnceLock<Box<Schema>>,
}

impl Clone for SchemaCache {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaCache")
            .field("ast", &self.ast.get().is_some())
            .field("api_schema", &self.api_schema.get().is_some())
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct Schema {
    types: Arena<NamedType>,
    fields: Arena<FieldDefinition>,
    arguments: Arena<ArgumentDefinition>,
    input_fields: Arena<InputFieldDefinition>,
    enum_values: Arena<EnumValue>,
    directive_definitions: Arena<DirectiveDefinition>,
    directives: Arena<Directive>,
    extensions: Arena<Extension>,
    built_in_types: IndexMap<Name, TypeId>,
    types_by_name: IndexMap<Name, TypeId>,
    built_in_directive_definitions: IndexMap<Name, DirectiveDefinitionId>,
    directive_definitions_by_name: IndexMap<Name, DirectiveDefinitionId>,
    schema_definition: SchemaDefinition,
    is_constructed: bool,
    allow_built_in_modification: bool,
    links: Option<LinksMetadata>,
    cache: SchemaCache,
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

impl Schema {
    /// An empty schema holding only the built-in scalars and directives.
    pub fn new() -> Self {
        let mut schema = Self {
            types: Default::default(),
            fields: Default::default(),
            arguments: Default::default(),
            input_fields: Default::default(),
            enum_values: Default::default(),
            directive_definitions: Default::default(),
            directives: Default::default(),
            extensions: Default::default(),
            built_in_types: Default::default(),
            types_by_name: Default::default(),
            built_in_directive_definitions: Default::default(),
            directive_definitions_by_name: Default::default(),
            schema_definition: Default::default(),
            is_constructed: false,
            allow_built_in_modification: false,
            links: None,
            cache: Default::default(),
        };
        builtins::install(&mut schema);
        schema.is_constructed = true;
        schema
    }

    pub fn get<T: SchemaElement>(&self, id: Id<T>) -> Result<&T, FederationError> {
        T::arena(self).get(id).ok_or_else(|| detached::<T>(id))
    }

    pub fn try_get<T: SchemaElement>(&self, id: Id<T>) -> Option<&T> {
        T::arena(self).get(id)
    }

    pub fn contains<T: SchemaElement>(&self, id: Id<T>) -> bool {
        T::arena(self).contains(id)
    }

    fn get_mut<T: SchemaElementMut>(&mut self, id: Id<T>) -> Result<&mut T, FederationError> {
        T::arena_mut(self)
            .get_mut(id)
            .ok_or_else(|| detached::<T>(id))
    }

    /// Resolves a type name, preferring a user-defined type over a shadowed built-in.
    pub fn type_id(&self, name: &str) -> Option<TypeId> {
        self.types_by_name
            .get(name)
            .or_else(|| self.built_in_types.get(name))
            .copied()
    }

    pub fn get_type(&self, name: &str) -> Option<&NamedType> {
        self.type_id(name).and_then(|id| self.types.get(id))
    }

    /// User-defined types, in insertion order.
    pub fn types(&self) -> impl Iterator<Item = (TypeId, &NamedType)> {
        self.types_by_name
            .values()
            .filter_map(|id| self.types.get(*id).map(|ty| (*id, ty)))
    }

    pub fn built_in_types(&self) -> impl Iterator<Item = (TypeId, &NamedType)> {
        self.built_in_types
            .values()
            .filter_map(|id| self.types.get(*id).map(|ty| (*id, ty)))
    }

    /// Resolves a directive name, preferring a user-defined definition over a shadowed built-in.
    pub fn directive_definition_id(&self, name: &str) -> Option<DirectiveDefinitionId> {
        self.directive_definitions_by_name
            .get(name)
            .or_else(|| self.built_in_directive_definitions.get(name))
            .copied()
    }

    pub fn directive_definition(&self, name: &str) -> Option<&DirectiveDefinition> {
        self.directive_definition_id(name)
            .and_then(|id| self.directive_definitions.get(id))
    }

    pub fn directive_definitions(
        &self,
    ) -> impl Iterator<Item = (DirectiveDefinitionId, &DirectiveDefinition)> {
        self.directive_definitions_by_name
            .values()
            .filter_map(|id| self.directive_definitions.get(*id).map(|def| (*id, def)))
    }

    pub fn built_in_directive_definitions(
        &self,
    ) -> impl Iterator<Item = (DirectiveDefinitionId, &DirectiveDefinition)> {
        self.built_in_directive_definitions
            .values()
            .filter_map(|id| self.directive_definitions.get(*id).map(|def| (*id, def)))
    }

    pub fn schema_definition(&self) -> &SchemaDefinition {
        &self.schema_definition
    }

    pub fn root_type(&self, kind: SchemaRootKind) -> Option<TypeId> {
        self.schema_definition.roots.get(&kind).map(|root| root.ty)
    }

    pub fn field_id(&self, ty: TypeId, name: &str) -> Option<FieldId> {
        self.types.get(ty).and_then(|ty| ty.field(name))
    }

    pub fn field_argument_id(&self, field: FieldId, name: &str) -> Option<ArgumentId> {
        self.fields
            .get(field)
            .and_then(|field| field.arguments.get(name).copied())
    }

    pub fn directive_argument_id(
        &self,
        directive: DirectiveDefinitionId,
        name: &str,
    ) -> Option<ArgumentId> {
        self.directive_definitions
            .get(directive)
            .and_then(|def| def.argument(name))
    }

    pub fn input_field_id(&self, ty: TypeId, name: &str) -> Option<InputFieldId> {
        match &self.types.get(ty)?.kind {
            TypeDefinitionKind::InputObject(fields) => fields.get(name).copied(),
            _ => None,
        }
    }

    pub fn enum_value_id(&self, ty: TypeId, name: &str) -> Option<EnumValueId> {
        match &self.types.get(ty)?.kind {
            TypeDefinitionKind::Enum(values) => values.get(name).copied(),
            _ => None,
        }
    }

    /// The directive applications on `target`, in application order.
    pub fn directives_on(&self, target: DirectiveTarget) -> Result<&[DirectiveId], FederationError> {
        let directives: &Vec<DirectiveId> = match target {
            DirectiveTarget::SchemaDefinition => &self.schema_definition.directives,
            DirectiveTarget::Type(id) => &self.get(id)?.directives,
            DirectiveTarget::Field(id) => &self.get(id)?.directives,
            DirectiveTarget::Argument(id) => &self.get(id)?.directives,
            DirectiveTarget::InputField(id) => &self.get(id)?.directives,
            DirectiveTarget::EnumValue(id) => &self.get(id)?.directives,
        };
        Ok(directives.as_slice())
    }

    /// The applications on `target` named `name`.
    pub fn directive_applications(
        &self,
        target: DirectiveTarget,
        name: &str,
    ) -> Result<Vec<&Directive>, FederationError> {
        Ok(self
            .directives_on(target)?
            .iter()
            .filter_map(|id| self.directives.get(*id))
            .filter(|directive| directive.name == name)
            .collect())
    }

    /// The definition an application currently resolves to.
    pub fn definition_of(&self, directive: DirectiveId) -> Option<DirectiveDefinitionId> {
        self.directives
            .get(directive)
            .and_then(|directive| self.directive_definition_id(&directive.name))
    }

    /// The `@link`/`@core` features of this schema, if it is a core schema.
    pub fn links(&self) -> Option<&LinksMetadata> {
        self.links.as_ref()
    }

    pub fn is_core_schema(&self) -> bool {
        self.links.is_some()
    }

    /// Runs `f` with built-in elements unlocked for modification.
    pub fn with_built_in_modification<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, FederationError>,
    ) -> Result<T, FederationError> {
        let previous = std::mem::replace(&mut self.allow_built_in_modification, true);
        let result = f(self);
        self.allow_built_in_modification = previous;
        result
    }

    pub fn target_coordinate(
        &self,
        target: DirectiveTarget,
    ) -> Result<SchemaCoordinate, FederationError> {
        Ok(match target {
            DirectiveTarget::SchemaDefinition => SchemaCoordinate::Schema,
            DirectiveTarget::Type(id) => SchemaCoordinate::Type(self.get(id)?.name.clone()),
            DirectiveTarget::Field(id) => {
                let field = self.get(id)?;
                SchemaCoordinate::Field {
                    ty: self.get(field.parent)?.name.clone(),
                    field: field.name.clone(),
                }
            }
            DirectiveTarget::Argument(id) => {
                let argument = self.get(id)?;
                match argument.parent {
                    ArgumentParent::Field(field_id) => {
                        let field = self.get(field_id)?;
                        SchemaCoordinate::FieldArgument {
                            ty: self.get(field.parent)?.name.clone(),
                            field: field.name.clone(),
                            argument: argument.name.clone(),
                        }
                    }
                    ArgumentParent::Directive(directive_id) => {
                        SchemaCoordinate::DirectiveArgument {
                            directive: self.get(directive_id)?.name.clone(),
                            argument: argument.name.clone(),
                        }
                    }
                }
            }
            DirectiveTarget::InputField(id) => {
                let field = self.get(id)?;
                SchemaCoordinate::InputField {
                    ty: self.get(field.parent)?.name.clone(),
                    field: field.name.clone(),
                }
            }
            DirectiveTarget::EnumValue(id) => {
                let value = self.get(id)?;
                SchemaCoordinate::EnumValue {
                    ty: self.get(value.parent)?.name.clone(),
                    value: value.name.clone(),
                }
            }
        })
    }

    pub fn referencer_coordinate(
        &self,
        referencer: Referencer,
    ) -> Result<SchemaCoordinate, FederationError> {
        match referencer {
            Referencer::Field(id) => self.target_coordinate(DirectiveTarget::Field(id)),
            Referencer::Argument(id) => self.target_coordinate(DirectiveTarget::Argument(id)),
            Referencer::InputField(id) => self.target_coordinate(DirectiveTarget::InputField(id)),
            Referencer::ImplementingType(id) | Referencer::UnionType(id) => {
                self.target_coordinate(DirectiveTarget::Type(id))
            }
            Referencer::SchemaRoot(kind) => Ok(SchemaCoordinate::SchemaRoot(kind)),
        }
    }

    pub fn type_of(&self, element: TypedElement) -> Result<Option<&ast::Type>, FederationError> {
        Ok(match element {
            TypedElement::Field(id) => self.get(id)?.ty.as_ref(),
            TypedElement::Argument(id) => self.get(id)?.ty.as_ref(),
            TypedElement::InputField(id) => self.get(id)?.ty.as_ref(),
        })
    }

    pub(crate) fn api_schema_cache(&self) -> &OnceLock<Box<Schema>> {
        &self.cache.api_schema
    }

    fn mark_modified(&mut self) {
        self.cache = SchemaCache::default();
    }

    fn check_built_in_modification(
        &self,
        is_built_in: bool,
        what: impl FnOnce() -> String,
    ) -> Result<(), FederationError> {
        if is_built_in && self.is_constructed && !self.allow_built_in_modification {
            return Err(SingleFederationError::BuiltInModification {
                message: format!("Cannot modify built-in {}", what()),
            }
            .into());
        }
        Ok(())
    }

    fn check_type_modifiable(&self, id: TypeId) -> Result<(), FederationError> {
        let ty = self.get(id)?;
        self.check_built_in_modification(ty.is_built_in, || format!("type \"{}\"", ty.name))
    }

    fn check_target_modifiable(&self, target: DirectiveTarget) -> Result<(), FederationError> {
        match target {
            DirectiveTarget::SchemaDefinition => Ok(()),
            DirectiveTarget::Type(id) => self.check_type_modifiable(id),
            DirectiveTarget::Field(id) => self.check_type_modifiable(self.get(id)?.parent),
            DirectiveTarget::InputField(id) => self.check_type_modifiable(self.get(id)?.parent),
            DirectiveTarget::EnumValue(id) => self.check_type_modifiable(self.get(id)?.parent),
            DirectiveTarget::Argument(id) => match self.get(id)?.parent {
                ArgumentParent::Field(field) => self.check_type_modifiable(self.get(field)?.parent),
                ArgumentParent::Directive(directive) => {
                    let definition = self.get(directive)?;
                    self.check_built_in_modification(definition.is_built_in, || {
                        format!("directive \"@{}\"", definition.name)
                    })
                }
            },
        }
    }

    fn directives_on_mut(
        &mut self,
        target: DirectiveTarget,
    ) -> Result<&mut Vec<DirectiveId>, FederationError> {
        Ok(match target {
            DirectiveTarget::SchemaDefinition => &mut self.schema_definition.directives,
            DirectiveTarget::Type(id) => &mut self.get_mut(id)?.directives,
            DirectiveTarget::Field(id) => &mut self.get_mut(id)?.directives,
            DirectiveTarget::Argument(id) => &mut self.get_mut(id)?.directives,
            DirectiveTarget::InputField(id) => &mut self.get_mut(id)?.directives,
            DirectiveTarget::EnumValue(id) => &mut self.get_mut(id)?.directives,
        })
    }

    /// Records `referencer` on the type named by `ty`.
    fn register_type_reference(
        &mut self,
        ty: &ast::Type,
        referencer: Referencer,
    ) -> Result<TypeId, FederationError> {
        let name = ty.inner_named_type();
        let Some(id) = self.type_id(name) else {
            return Err(SingleFederationError::UndefinedType {
                message: format!("Cannot reference unknown type \"{name}\""),
            }
            .into());
        };
        self.get_mut(id)?.referencers.insert(referencer);
        Ok(id)
    }

    /// Drops `referencer` from every type (user or built-in) named `name`.
    fn unregister_type_reference(&mut self, name: &str, referencer: Referencer) {
        let ids = [self.types_by_name.get(name), self.built_in_types.get(name)];
        for id in ids.into_iter().flatten().copied() {
            if let Some(ty) = self.types.get_mut(id) {
                ty.referencers.shift_remove(&referencer);
            }
        }
    }
}

fn detached<T: SchemaElement>(id: Id<T>) -> FederationError {
    SingleFederationError::DetachedElement {
        message: format!(
            "Cannot operate on detached {} {id:?}: it is not (or no longer) attached to this schema",
            T::KIND
        ),
    }
    .into()
}
