//! Building a [`Schema`] from a parsed GraphQL document.
//!
//! Types and directive definitions are created first, so members can reference any of them
//! regardless of document order. `extend` blocks create [`Extension`](super::Extension) records
//! and tag the members they declare.
use std::path::Path;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast;
use apollo_compiler::ast::Definition;
use tracing::trace;

use super::DirectiveDefinitionId;
use super::DirectiveTarget;
use super::ExtensionId;
use super::ExtensionMember;
use super::ExtensionOwner;
use super::Schema;
use super::SchemaRootKind;
use super::TypeId;
use super::TypeKind;
use super::TypedElement;
use super::coordinate::SchemaCoordinate;
use crate::error::FederationError;
use crate::error::MultipleFederationErrors;
use crate::error::SingleFederationError;
use crate::link::link_spec_definition::add_bootstrap_definitions;

enum Members<'a> {
    None,
    Composite {
        interfaces: &'a [Name],
        fields: &'a [Node<ast::FieldDefinition>],
    },
    Union(&'a [Name]),
    Enum(&'a [Node<ast::EnumValueDefinition>]),
    InputObject(&'a [Node<ast::InputValueDefinition>]),
}

/// A type definition or extension, seen through its common parts.
struct TypeFragment<'a> {
    name: &'a Name,
    kind: TypeKind,
    is_extension: bool,
    description: Option<&'a Node<str>>,
    directives: &'a ast::DirectiveList,
    members: Members<'a>,
}

impl<'a> TypeFragment<'a> {
    fn new(
        name: &'a Name,
        kind: TypeKind,
        is_extension: bool,
        description: Option<&'a Node<str>>,
        directives: &'a ast::DirectiveList,
        members: Members<'a>,
    ) -> Self {
        Self {
            name,
            kind,
            is_extension,
            description,
            directives,
            members,
        }
    }
}

fn type_fragment(definition: &Definition) -> Option<TypeFragment<'_>> {
    let fragment = TypeFragment::new;
    Some(match definition {
        Definition::ScalarTypeDefinition(def) => fragment(
            &def.name,
            TypeKind::Scalar,
            false,
            def.description.as_ref(),
            &def.directives,
            Members::None,
        ),
        Definition::ObjectTypeDefinition(def) => fragment(
            &def.name,
            TypeKind::Object,
            false,
            def.description.as_ref(),
            &def.directives,
            Members::Composite {
                interfaces: &def.implements_interfaces,
                fields: &def.fields,
            },
        ),
        Definition::InterfaceTypeDefinition(def) => fragment(
            &def.name,
            TypeKind::Interface,
            false,
            def.description.as_ref(),
            &def.directives,
            Members::Composite {
                interfaces: &def.implements_interfaces,
                fields: &def.fields,
            },
        ),
        Definition::UnionTypeDefinition(def) => fragment(
            &def.name,
            TypeKind::Union,
            false,
            def.description.as_ref(),
            &def.directives,
            Members::Union(&def.members),
        ),
        Definition::EnumTypeDefinition(def) => fragment(
            &def.name,
            TypeKind::Enum,
            false,
            def.description.as_ref(),
            &def.directives,
            Members::Enum(&def.values),
        ),
        Definition::InputObjectTypeDefinition(def) => fragment(
            &def.name,
            TypeKind::InputObject,
            false,
            def.description.as_ref(),
            &def.directives,
            Members::InputObject(&def.fields),
        ),
        Definition::ScalarTypeExtension(ext) => fragment(
            &ext.name,
            TypeKind::Scalar,
            true,
            None,
            &ext.directives,
            Members::None,
        ),
        Definition::ObjectTypeExtension(ext) => fragment(
            &ext.name,
            TypeKind::Object,
            true,
            None,
            &ext.directives,
            Members::Composite {
                interfaces: &ext.implements_interfaces,
                fields: &ext.fields,
            },
        ),
        Definition::InterfaceTypeExtension(ext) => fragment(
            &ext.name,
            TypeKind::Interface,
            true,
            None,
            &ext.directives,
            Members::Composite {
                interfaces: &ext.implements_interfaces,
                fields: &ext.fields,
            },
        ),
        Definition::UnionTypeExtension(ext) => fragment(
            &ext.name,
            TypeKind::Union,
            true,
            None,
            &ext.directives,
            Members::Union(&ext.members),
        ),
        Definition::EnumTypeExtension(ext) => fragment(
            &ext.name,
            TypeKind::Enum,
            true,
            None,
            &ext.directives,
            Members::Enum(&ext.values),
        ),
        Definition::InputObjectTypeExtension(ext) => fragment(
            &ext.name,
            TypeKind::InputObject,
            true,
            None,
            &ext.directives,
            Members::InputObject(&ext.fields),
        ),
        _ => return None,
    })
}

/// Keeps the value of a successful step, recording the error of a failed one.
fn record<T>(errors: &mut MultipleFederationErrors, result: Result<T, FederationError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            errors.push(error);
            None
        }
    }
}

fn undefined_type(ty: &ast::Type, coordinate: SchemaCoordinate) -> SingleFederationError {
    SingleFederationError::UndefinedType {
        message: format!(
            "Unknown type \"{}\" referenced by \"{coordinate}\"",
            ty.inner_named_type()
        ),
    }
}

struct SchemaBuilder {
    schema: Schema,
    errors: MultipleFederationErrors,
    /// The type created for each type fragment of the document, indexed like its definitions.
    /// `None` for definitions that are not type fragments or were rejected.
    types: Vec<Option<TypeId>>,
    directive_definitions: Vec<Option<DirectiveDefinitionId>>,
}

impl SchemaBuilder {
    fn new(document: &ast::Document) -> Self {
        Self {
            schema: Schema::new(),
            errors: MultipleFederationErrors::new(),
            types: vec![None; document.definitions.len()],
            directive_definitions: vec![None; document.definitions.len()],
        }
    }

    fn add_shallow_definitions(&mut self, document: &ast::Document) {
        for (index, definition) in document.definitions.iter().enumerate() {
            if let Some(fragment) = type_fragment(definition) {
                self.types[index] = self.add_shallow_type(&fragment);
                continue;
            }
            match definition {
                Definition::DirectiveDefinition(def) => {
                    if self
                        .schema
                        .directive_definitions_by_name
                        .contains_key(&def.name)
                    {
                        self.errors.push(SingleFederationError::DuplicateName {
                            message: format!(
                                "There can be only one directive named \"@{}\"",
                                def.name
                            ),
                        });
                        continue;
                    }
                    self.directive_definitions[index] = record(
                        &mut self.errors,
                        self.schema.add_directive_definition(
                            def.name.clone(),
                            def.repeatable,
                            def.locations.clone(),
                        ),
                    );
                }
                Definition::OperationDefinition(_) | Definition::FragmentDefinition(_) => {
                    self.errors.push(SingleFederationError::InvalidGraphQL {
                        message: "Executable definitions are not allowed in a schema document"
                            .to_string(),
                    });
                }
                _ => {}
            }
        }
    }

    fn add_shallow_type(&mut self, fragment: &TypeFragment<'_>) -> Option<TypeId> {
        let name = fragment.name;
        let Some(id) = self.schema.types_by_name.get(name).copied() else {
            let id = record(
                &mut self.errors,
                self.schema.add_type(name.clone(), fragment.kind),
            )?;
            if fragment.is_extension {
                if let Some(ty) = self.schema.types.get_mut(id) {
                    ty.has_definition = false;
                }
            }
            return Some(id);
        };
        let existing = self.schema.types.get_mut(id)?;
        let existing_kind = existing.type_kind();
        if existing_kind != fragment.kind {
            self.errors.push(SingleFederationError::TypeDefinitionInvalid {
                message: format!(
                    "Type \"{name}\" is declared both as a {existing_kind} and as a {}",
                    fragment.kind
                ),
            });
            return None;
        }
        if !fragment.is_extension {
            if existing.has_definition {
                self.errors.push(SingleFederationError::DuplicateName {
                    message: format!("There can be only one type named \"{name}\""),
                });
                return None;
            }
            existing.has_definition = true;
        }
        Some(id)
    }

    fn add_members(&mut self, document: &ast::Document) {
        for (index, definition) in document.definitions.iter().enumerate() {
            if let Some(fragment) = type_fragment(definition) {
                if let Some(id) = self.types[index] {
                    self.add_type_members(id, &fragment);
                }
                continue;
            }
            match definition {
                Definition::SchemaDefinition(def) => {
                    if self.schema.schema_definition.has_definition {
                        self.errors.push(SingleFederationError::DuplicateName {
                            message: "There can be only one schema definition".to_string(),
                        });
                        continue;
                    }
                    self.schema.schema_definition.has_definition = true;
                    self.schema.schema_definition.description = def.description.clone();
                    self.add_schema_members(&def.directives, &def.root_operations, None);
                }
                Definition::SchemaExtension(ext) => {
                    let extension = record(
                        &mut self.errors,
                        self.schema.add_extension(ExtensionOwner::SchemaDefinition),
                    );
                    self.add_schema_members(&ext.directives, &ext.root_operations, extension);
                }
                Definition::DirectiveDefinition(def) => {
                    if let Some(id) = self.directive_definitions[index] {
                        self.add_directive_definition_members(id, def);
                    }
                }
                _ => {}
            }
        }
    }

    fn add_schema_members(
        &mut self,
        directives: &ast::DirectiveList,
        root_operations: &[Node<(ast::OperationType, Name)>],
        extension: Option<ExtensionId>,
    ) {
        self.apply_directives(DirectiveTarget::SchemaDefinition, directives, extension);
        for root in root_operations {
            let (operation_type, type_name) = &**root;
            let kind = SchemaRootKind::from(*operation_type);
            if self.schema.schema_definition.roots.contains_key(&kind) {
                self.errors.push(SingleFederationError::DuplicateName {
                    message: format!("There can be only one {kind} root type"),
                });
                continue;
            }
            let Some(ty) = self.schema.type_id(type_name) else {
                self.errors.push(undefined_type(
                    &ast::Type::Named(type_name.clone()),
                    SchemaCoordinate::SchemaRoot(kind),
                ));
                continue;
            };
            if record(&mut self.errors, self.schema.set_root_type(kind, ty)).is_some()
                && extension.is_some()
            {
                record(
                    &mut self.errors,
                    self.schema
                        .set_extension(ExtensionMember::RootType(kind), extension),
                );
            }
        }
    }

    fn add_directive_definition_members(
        &mut self,
        id: DirectiveDefinitionId,
        def: &ast::DirectiveDefinition,
    ) {
        if def.description.is_some() {
            record(
                &mut self.errors,
                self.schema
                    .set_directive_definition_description(id, def.description.clone()),
            );
        }
        for argument in &def.arguments {
            let ty: &ast::Type = &argument.ty;
            if self.schema.type_id(ty.inner_named_type()).is_none() {
                self.errors.push(undefined_type(
                    ty,
                    SchemaCoordinate::DirectiveArgument {
                        directive: def.name.clone(),
                        argument: argument.name.clone(),
                    },
                ));
                continue;
            }
            let Some(argument_id) = record(
                &mut self.errors,
                self.schema
                    .add_directive_argument(id, argument.name.clone(), ty.clone()),
            ) else {
                continue;
            };
            self.add_input_value_details(TypedElement::Argument(argument_id), argument);
        }
    }

    fn add_type_members(&mut self, id: TypeId, fragment: &TypeFragment<'_>) {
        let extension = if fragment.is_extension {
            let Some(extension) = record(
                &mut self.errors,
                self.schema.add_extension(ExtensionOwner::Type(id)),
            ) else {
                return;
            };
            Some(extension)
        } else {
            if fragment.description.is_some() {
                record(
                    &mut self.errors,
                    self.schema
                        .set_description(DirectiveTarget::Type(id), fragment.description.cloned()),
                );
            }
            None
        };
        self.apply_directives(DirectiveTarget::Type(id), fragment.directives, extension);

        let type_name = fragment.name;
        match &fragment.members {
            Members::None => {}
            Members::Composite { interfaces, fields } => {
                for interface in *interfaces {
                    if record(
                        &mut self.errors,
                        self.schema.add_implemented_interface(id, interface),
                    )
                    .is_some()
                        && extension.is_some()
                    {
                        record(
                            &mut self.errors,
                            self.schema.set_extension(
                                ExtensionMember::ImplementedInterface {
                                    ty: id,
                                    interface: interface.clone(),
                                },
                                extension,
                            ),
                        );
                    }
                }
                for field in *fields {
                    self.add_field(id, type_name, field, extension);
                }
            }
            Members::Union(members) => {
                for member in *members {
                    if record(&mut self.errors, self.schema.add_union_member(id, member))
                        .is_some()
                        && extension.is_some()
                    {
                        record(
                            &mut self.errors,
                            self.schema.set_extension(
                                ExtensionMember::UnionMember {
                                    union: id,
                                    member: member.clone(),
                                },
                                extension,
                            ),
                        );
                    }
                }
            }
            Members::Enum(values) => {
                for value in *values {
                    let Some(value_id) = record(
                        &mut self.errors,
                        self.schema.add_enum_value(id, value.value.clone()),
                    ) else {
                        continue;
                    };
                    self.tag(ExtensionMember::EnumValue(value_id), extension);
                    let target = DirectiveTarget::EnumValue(value_id);
                    if value.description.is_some() {
                        record(
                            &mut self.errors,
                            self.schema.set_description(target, value.description.clone()),
                        );
                    }
                    self.apply_directives(target, &value.directives, None);
                }
            }
            Members::InputObject(fields) => {
                for field in *fields {
                    let ty: &ast::Type = &field.ty;
                    if self.schema.type_id(ty.inner_named_type()).is_none() {
                        self.errors.push(undefined_type(
                            ty,
                            SchemaCoordinate::InputField {
                                ty: type_name.clone(),
                                field: field.name.clone(),
                            },
                        ));
                        continue;
                    }
                    let Some(field_id) = record(
                        &mut self.errors,
                        self.schema.add_input_field(id, field.name.clone(), ty.clone()),
                    ) else {
                        continue;
                    };
                    self.tag(ExtensionMember::InputField(field_id), extension);
                    self.add_input_value_details(TypedElement::InputField(field_id), field);
                }
            }
        }
    }

    fn add_field(
        &mut self,
        parent: TypeId,
        type_name: &Name,
        field: &ast::FieldDefinition,
        extension: Option<ExtensionId>,
    ) {
        if self.schema.type_id(field.ty.inner_named_type()).is_none() {
            self.errors.push(undefined_type(
                &field.ty,
                SchemaCoordinate::Field {
                    ty: type_name.clone(),
                    field: field.name.clone(),
                },
            ));
            return;
        }
        let Some(field_id) = record(
            &mut self.errors,
            self.schema
                .add_field(parent, field.name.clone(), field.ty.clone()),
        ) else {
            return;
        };
        self.tag(ExtensionMember::Field(field_id), extension);
        let target = DirectiveTarget::Field(field_id);
        if field.description.is_some() {
            record(
                &mut self.errors,
                self.schema.set_description(target, field.description.clone()),
            );
        }
        self.apply_directives(target, &field.directives, None);

        for argument in &field.arguments {
            let ty: &ast::Type = &argument.ty;
            if self.schema.type_id(ty.inner_named_type()).is_none() {
                self.errors.push(undefined_type(
                    ty,
                    SchemaCoordinate::FieldArgument {
                        ty: type_name.clone(),
                        field: field.name.clone(),
                        argument: argument.name.clone(),
                    },
                ));
                continue;
            }
            let Some(argument_id) = record(
                &mut self.errors,
                self.schema
                    .add_field_argument(field_id, argument.name.clone(), ty.clone()),
            ) else {
                continue;
            };
            self.add_input_value_details(TypedElement::Argument(argument_id), argument);
        }
    }

    /// Description, default value and directives of an argument or input field.
    fn add_input_value_details(&mut self, element: TypedElement, value: &ast::InputValueDefinition) {
        let target = match element {
            TypedElement::Field(id) => DirectiveTarget::Field(id),
            TypedElement::Argument(id) => DirectiveTarget::Argument(id),
            TypedElement::InputField(id) => DirectiveTarget::InputField(id),
        };
        if value.description.is_some() {
            record(
                &mut self.errors,
                self.schema.set_description(target, value.description.clone()),
            );
        }
        if value.default_value.is_some() {
            record(
                &mut self.errors,
                self.schema
                    .set_default_value(element, value.default_value.clone()),
            );
        }
        self.apply_directives(target, &value.directives, None);
    }

    fn apply_directives(
        &mut self,
        target: DirectiveTarget,
        directives: &ast::DirectiveList,
        extension: Option<ExtensionId>,
    ) {
        for directive in directives.iter() {
            if let Some(id) = record(&mut self.errors, self.schema.apply_directive(target, directive))
            {
                self.tag(ExtensionMember::Directive(id), extension);
            }
        }
    }

    fn tag(&mut self, member: ExtensionMember, extension: Option<ExtensionId>) {
        if extension.is_some() {
            record(&mut self.errors, self.schema.set_extension(member, extension));
        }
    }

    /// Without explicit root operations, object types named `Query`, `Mutation` and
    /// `Subscription` are the roots.
    fn add_default_roots(&mut self) {
        if !self.schema.schema_definition.roots.is_empty() {
            return;
        }
        for kind in SchemaRootKind::ALL {
            let Some(id) = self.schema.type_id(kind.default_type_name()) else {
                continue;
            };
            let is_object = self
                .schema
                .types
                .get(id)
                .is_some_and(|ty| ty.type_kind() == TypeKind::Object);
            if is_object {
                record(&mut self.errors, self.schema.set_root_type(kind, id));
            }
        }
    }
}

impl Schema {
    /// Parses `source_text` with the GraphQL parser, then builds it with [`Schema::from_ast`].
    pub fn parse(
        source_text: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> Result<Self, FederationError> {
        let document = ast::Document::parse(source_text, path).map_err(|with_errors| {
            SingleFederationError::InvalidGraphQL {
                message: with_errors.errors.to_string(),
            }
        })?;
        Self::from_ast(&document)
    }

    /// Builds a schema graph from a type system document.
    ///
    /// Problems are accumulated: the error holds every duplicate definition and unknown type
    /// reference of the document. The result is not validated, see [`Schema::validate`].
    pub fn from_ast(document: &ast::Document) -> Result<Self, FederationError> {
        let mut builder = SchemaBuilder::new(document);
        builder.add_shallow_definitions(document);
        builder.add_members(document);
        builder.add_default_roots();
        let SchemaBuilder {
            mut schema,
            mut errors,
            ..
        } = builder;
        if errors.is_empty() {
            record(&mut errors, add_bootstrap_definitions(&mut schema));
        }
        errors.into_result()?;
        trace!(
            "Built schema with {} types and {} directive definitions",
            schema.types_by_name.len(),
            schema.directive_definitions_by_name.len()
        );
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use apollo_compiler::name;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn extensions_keep_their_provenance() {
        let schema = Schema::parse(
            r#"
            type Query { a: Int }
            extend type Query @deprecated { b: Int }
            extend type Other { x: Int }
            "#,
            "schema.graphql",
        )
        .unwrap();
        let query = schema.type_id("Query").unwrap();
        let query_type = schema.get(query).unwrap();
        assert!(query_type.has_definition);
        assert_eq!(query_type.extensions.len(), 1);
        let extension = query_type.extensions.first().copied();

        let a = schema.field_id(query, "a").unwrap();
        let b = schema.field_id(query, "b").unwrap();
        assert_eq!(schema.get(a).unwrap().extension, None);
        assert_eq!(schema.get(b).unwrap().extension, extension);
        let directive = schema.directives_on(DirectiveTarget::Type(query)).unwrap()[0];
        assert_eq!(schema.get(directive).unwrap().extension, extension);

        assert!(!schema.get_type("Other").unwrap().has_definition);
    }

    #[test]
    fn members_may_reference_later_definitions() {
        let schema = Schema::parse(
            r#"
            type Query @cost(weight: 1) { u: U }
            union U = A | B
            type A { x: Int }
            type B { y: Int }
            directive @cost(weight: Int!) on OBJECT
            "#,
            "schema.graphql",
        )
        .unwrap();
        assert_eq!(
            schema
                .get_type("U")
                .unwrap()
                .union_members()
                .map(|(name, _)| name.as_str())
                .collect::<Vec<_>>(),
            vec!["A", "B"]
        );
        let cost = schema.directive_definition("cost").unwrap();
        assert_eq!(cost.referencers.len(), 1);
    }

    #[test]
    fn accumulates_every_problem() {
        let err = Schema::parse(
            r#"
            type Query { a: Int, a: String, b: Missing }
            type Query { c: Int }
            directive @foo on OBJECT
            directive @foo on FIELD_DEFINITION
            input Point { x: Unknown }
            enum Query { A }
            "#,
            "schema.graphql",
        )
        .unwrap_err();
        assert_eq!(
            err.codes(),
            vec![
                ErrorCode::DuplicateName,
                ErrorCode::DuplicateName,
                ErrorCode::TypeDefinitionInvalid,
                ErrorCode::DuplicateName,
                ErrorCode::UndefinedType,
                ErrorCode::UndefinedType,
            ],
            "{err}"
        );
        assert!(err.to_string().contains("\"Query.b\""), "{err}");
        assert!(err.to_string().contains("\"Point.x\""), "{err}");
    }

    #[test]
    fn roots_default_to_conventional_names() {
        let schema = Schema::parse(
            "type Query { a: Int } type Mutation { b: Int } scalar Subscription",
            "schema.graphql",
        )
        .unwrap();
        let query = schema.type_id("Query");
        assert_eq!(schema.root_type(SchemaRootKind::Query), query);
        assert!(schema.root_type(SchemaRootKind::Mutation).is_some());
        assert_eq!(schema.root_type(SchemaRootKind::Subscription), None);

        let schema = Schema::parse(
            "schema { query: Root } type Root { a: Int } type Mutation { b: Int }",
            "schema.graphql",
        )
        .unwrap();
        assert_eq!(schema.root_type(SchemaRootKind::Query), schema.type_id("Root"));
        assert_eq!(schema.root_type(SchemaRootKind::Mutation), None);
    }

    #[test]
    fn core_schemas_are_detected() {
        let schema = Schema::parse(
            r#"
            extend schema
              @link(url: "https://specs.apollo.dev/link/v1.0")
              @link(url: "https://specs.apollo.dev/inaccessible/v0.2", import: ["@inaccessible"])
            type Query { a: Int }
            "#,
            "schema.graphql",
        )
        .unwrap();
        assert!(schema.is_core_schema());
        let links = schema.links().unwrap();
        assert_eq!(links.all_links().len(), 2);
        assert!(
            links
                .source_link_of_directive(&name!("inaccessible"))
                .is_some()
        );
    }

    #[test]
    fn syntax_errors_are_invalid_graphql() {
        let err = Schema::parse("type Query {", "schema.graphql").unwrap_err();
        assert_eq!(err.codes(), vec![ErrorCode::InvalidGraphql]);
    }
}
