use super::ArgumentId;
use super::FieldId;
use super::InputFieldId;
use super::TypeId;
use super::definitions::SchemaRootKind;

/// A schema element whose type annotation (or membership) points at a named type.
///
/// Every [`NamedType`](super::NamedType) records its referencers, so that removing the type can
/// report each element that just lost a valid reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Referencer {
    Field(FieldId),
    Argument(ArgumentId),
    InputField(InputFieldId),
    /// An object or interface type implementing the referenced interface.
    ImplementingType(TypeId),
    /// A union having the referenced type as a member.
    UnionType(TypeId),
    SchemaRoot(SchemaRootKind),
}

/// An element carrying a type annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypedElement {
    Field(FieldId),
    Argument(ArgumentId),
    InputField(InputFieldId),
}

impl From<TypedElement> for Referencer {
    fn from(value: TypedElement) -> Self {
        match value {
            TypedElement::Field(id) => Self::Field(id),
            TypedElement::Argument(id) => Self::Argument(id),
            TypedElement::InputField(id) => Self::InputField(id),
        }
    }
}
