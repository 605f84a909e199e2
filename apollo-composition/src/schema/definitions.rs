//! The nodes stored in the schema graph arenas.
//!
//! Nodes are only handed out by shared reference; every mutation goes through
//! [`Schema`](super::Schema) so referencer bookkeeping stays consistent.
use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast;
use apollo_compiler::ast::DirectiveLocation;
use apollo_compiler::ast::OperationType;
use indexmap::IndexMap;
use indexmap::IndexSet;

use super::ArgumentId;
use super::DirectiveDefinitionId;
use super::DirectiveId;
use super::EnumValueId;
use super::ExtensionId;
use super::FieldId;
use super::InputFieldId;
use super::TypeId;
use super::referencer::Referencer;

/// The closed set of named type kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum TypeKind {
    #[display(fmt = "ScalarType")]
    Scalar,
    #[display(fmt = "ObjectType")]
    Object,
    #[display(fmt = "InterfaceType")]
    Interface,
    #[display(fmt = "UnionType")]
    Union,
    #[display(fmt = "EnumType")]
    Enum,
    #[display(fmt = "InputObjectType")]
    InputObject,
}

impl TypeKind {
    pub fn is_composite(self) -> bool {
        matches!(self, Self::Object | Self::Interface | Self::Union)
    }

    pub fn is_input_type(self) -> bool {
        matches!(self, Self::Scalar | Self::Enum | Self::InputObject)
    }

    pub fn is_output_type(self) -> bool {
        !matches!(self, Self::InputObject)
    }

    pub(crate) fn directive_location(self) -> DirectiveLocation {
        match self {
            Self::Scalar => DirectiveLocation::Scalar,
            Self::Object => DirectiveLocation::Object,
            Self::Interface => DirectiveLocation::Interface,
            Self::Union => DirectiveLocation::Union,
            Self::Enum => DirectiveLocation::Enum,
            Self::InputObject => DirectiveLocation::InputObject,
        }
    }
}

/// Root operation kinds of the schema definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum SchemaRootKind {
    #[display(fmt = "query")]
    Query,
    #[display(fmt = "mutation")]
    Mutation,
    #[display(fmt = "subscription")]
    Subscription,
}

impl SchemaRootKind {
    pub const ALL: [Self; 3] = [Self::Query, Self::Mutation, Self::Subscription];

    /// The type name used for this root when no schema definition says otherwise.
    pub fn default_type_name(self) -> &'static str {
        match self {
            Self::Query => "Query",
            Self::Mutation => "Mutation",
            Self::Subscription => "Subscription",
        }
    }
}

impl From<OperationType> for SchemaRootKind {
    fn from(value: OperationType) -> Self {
        match value {
            OperationType::Query => Self::Query,
            OperationType::Mutation => Self::Mutation,
            OperationType::Subscription => Self::Subscription,
        }
    }
}

impl From<SchemaRootKind> for OperationType {
    fn from(value: SchemaRootKind) -> Self {
        match value {
            SchemaRootKind::Query => Self::Query,
            SchemaRootKind::Mutation => Self::Mutation,
            SchemaRootKind::Subscription => Self::Subscription,
        }
    }
}

/// A reference from a type to another named type (implemented interface or union member).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeReference {
    pub ty: TypeId,
    pub extension: Option<ExtensionId>,
}

#[derive(Debug, Clone, Default)]
pub struct CompositeFields {
    pub fields: IndexMap<Name, FieldId>,
    pub interfaces: IndexMap<Name, TypeReference>,
}

#[derive(Debug, Clone)]
pub enum TypeDefinitionKind {
    Scalar,
    Object(CompositeFields),
    Interface(CompositeFields),
    Union(IndexMap<Name, TypeReference>),
    Enum(IndexMap<Name, EnumValueId>),
    InputObject(IndexMap<Name, InputFieldId>),
}

impl TypeDefinitionKind {
    pub(crate) fn empty(kind: TypeKind) -> Self {
        match kind {
            TypeKind::Scalar => Self::Scalar,
            TypeKind::Object => Self::Object(Default::default()),
            TypeKind::Interface => Self::Interface(Default::default()),
            TypeKind::Union => Self::Union(Default::default()),
            TypeKind::Enum => Self::Enum(Default::default()),
            TypeKind::InputObject => Self::InputObject(Default::default()),
        }
    }

    pub fn kind(&self) -> TypeKind {
        match self {
            Self::Scalar => TypeKind::Scalar,
            Self::Object(_) => TypeKind::Object,
            Self::Interface(_) => TypeKind::Interface,
            Self::Union(_) => TypeKind::Union,
            Self::Enum(_) => TypeKind::Enum,
            Self::InputObject(_) => TypeKind::InputObject,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NamedType {
    pub name: Name,
    pub description: Option<Node<str>>,
    pub is_built_in: bool,
    /// Whether a non-`extend` definition of the type exists.
    pub has_definition: bool,
    pub kind: TypeDefinitionKind,
    pub directives: Vec<DirectiveId>,
    pub extensions: IndexSet<ExtensionId>,
    pub referencers: IndexSet<Referencer>,
}

impl NamedType {
    pub fn type_kind(&self) -> TypeKind {
        self.kind.kind()
    }

    pub fn composite_fields(&self) -> Option<&CompositeFields> {
        match &self.kind {
            TypeDefinitionKind::Object(fields) | TypeDefinitionKind::Interface(fields) => {
                Some(fields)
            }
            _ => None,
        }
    }

    pub(crate) fn composite_fields_mut(&mut self) -> Option<&mut CompositeFields> {
        match &mut self.kind {
            TypeDefinitionKind::Object(fields) | TypeDefinitionKind::Interface(fields) => {
                Some(fields)
            }
            _ => None,
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&Name, FieldId)> {
        self.composite_fields()
            .into_iter()
            .flat_map(|composite| composite.fields.iter().map(|(name, id)| (name, *id)))
    }

    pub fn field(&self, name: &str) -> Option<FieldId> {
        self.composite_fields()
            .and_then(|composite| composite.fields.get(name).copied())
    }

    pub fn interfaces(&self) -> impl Iterator<Item = (&Name, &TypeReference)> {
        self.composite_fields()
            .into_iter()
            .flat_map(|composite| composite.interfaces.iter())
    }

    pub fn union_members(&self) -> impl Iterator<Item = (&Name, &TypeReference)> {
        match &self.kind {
            TypeDefinitionKind::Union(members) => Some(members.iter()),
            _ => None,
        }
        .into_iter()
        .flatten()
    }

    pub fn enum_values(&self) -> impl Iterator<Item = (&Name, EnumValueId)> {
        match &self.kind {
            TypeDefinitionKind::Enum(values) => Some(values.iter().map(|(n, id)| (n, *id))),
            _ => None,
        }
        .into_iter()
        .flatten()
    }

    pub fn input_fields(&self) -> impl Iterator<Item = (&Name, InputFieldId)> {
        match &self.kind {
            TypeDefinitionKind::InputObject(fields) => Some(fields.iter().map(|(n, id)| (n, *id))),
            _ => None,
        }
        .into_iter()
        .flatten()
    }

    /// Whether the type has no child element. Scalars are never considered empty.
    pub fn is_empty(&self) -> bool {
        match &self.kind {
            TypeDefinitionKind::Scalar => false,
            TypeDefinitionKind::Object(composite) | TypeDefinitionKind::Interface(composite) => {
                composite.fields.is_empty()
            }
            TypeDefinitionKind::Union(members) => members.is_empty(),
            TypeDefinitionKind::Enum(values) => values.is_empty(),
            TypeDefinitionKind::InputObject(fields) => fields.is_empty(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub name: Name,
    pub parent: TypeId,
    pub description: Option<Node<str>>,
    /// `None` once the referenced type has been removed from the schema.
    pub ty: Option<ast::Type>,
    pub arguments: IndexMap<Name, ArgumentId>,
    pub directives: Vec<DirectiveId>,
    pub extension: Option<ExtensionId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgumentParent {
    Field(FieldId),
    Directive(DirectiveDefinitionId),
}

#[derive(Debug, Clone)]
pub struct ArgumentDefinition {
    pub name: Name,
    pub parent: ArgumentParent,
    pub description: Option<Node<str>>,
    pub ty: Option<ast::Type>,
    pub default_value: Option<Node<ast::Value>>,
    pub directives: Vec<DirectiveId>,
}

#[derive(Debug, Clone)]
pub struct InputFieldDefinition {
    pub name: Name,
    pub parent: TypeId,
    pub description: Option<Node<str>>,
    pub ty: Option<ast::Type>,
    pub default_value: Option<Node<ast::Value>>,
    pub directives: Vec<DirectiveId>,
    pub extension: Option<ExtensionId>,
}

#[derive(Debug, Clone)]
pub struct EnumValue {
    pub name: Name,
    pub parent: TypeId,
    pub description: Option<Node<str>>,
    pub directives: Vec<DirectiveId>,
    pub extension: Option<ExtensionId>,
}

#[derive(Debug, Clone)]
pub struct DirectiveDefinition {
    pub name: Name,
    pub description: Option<Node<str>>,
    pub repeatable: bool,
    pub locations: Vec<DirectiveLocation>,
    pub arguments: IndexMap<Name, ArgumentId>,
    pub is_built_in: bool,
    /// Applications currently resolving to this definition.
    pub referencers: IndexSet<DirectiveId>,
}

impl DirectiveDefinition {
    pub fn argument(&self, name: &str) -> Option<ArgumentId> {
        self.arguments.get(name).copied()
    }
}

/// Where a directive is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveTarget {
    SchemaDefinition,
    Type(TypeId),
    Field(FieldId),
    Argument(ArgumentId),
    InputField(InputFieldId),
    EnumValue(EnumValueId),
}

/// A directive application. The definition is resolved by name through the owning schema.
#[derive(Debug, Clone)]
pub struct Directive {
    pub name: Name,
    pub arguments: IndexMap<Name, Node<ast::Value>>,
    pub target: DirectiveTarget,
    pub extension: Option<ExtensionId>,
}

impl Directive {
    pub fn argument(&self, name: &str) -> Option<&Node<ast::Value>> {
        self.arguments.get(name)
    }

    pub fn to_ast(&self) -> ast::Directive {
        ast::Directive {
            name: self.name.clone(),
            arguments: self
                .arguments
                .iter()
                .map(|(name, value)| {
                    Node::new(ast::Argument {
                        name: name.clone(),
                        value: value.clone(),
                    })
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionOwner {
    SchemaDefinition,
    Type(TypeId),
}

/// Provenance marker for elements declared in an `extend` block.
#[derive(Debug, Clone)]
pub struct Extension {
    pub owner: ExtensionOwner,
}

#[derive(Debug, Clone)]
pub struct RootOperation {
    pub ty: TypeId,
    pub extension: Option<ExtensionId>,
}

#[derive(Debug, Clone, Default)]
pub struct SchemaDefinition {
    pub description: Option<Node<str>>,
    pub roots: IndexMap<SchemaRootKind, RootOperation>,
    pub directives: Vec<DirectiveId>,
    pub extensions: IndexSet<ExtensionId>,
    /// Whether a non-`extend` `schema` block was given.
    pub has_definition: bool,
}
