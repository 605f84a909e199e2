//! Serializing a [`Schema`] back to a GraphQL document.
//!
//! Each definition is followed by one `extend` fragment per extension it owns. A fragment
//! holds exactly the members tagged with its extension, so extensions survive a round-trip.
use std::fmt;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast;
use apollo_compiler::ast::Definition;

use super::ArgumentId;
use super::DirectiveDefinition;
use super::DirectiveId;
use super::ExtensionId;
use super::FieldId;
use super::InputFieldId;
use super::NamedType;
use super::Schema;
use super::SchemaRootKind;
use super::TypeDefinitionKind;

impl Schema {
    /// The document describing this schema, built-ins excluded.
    ///
    /// The document is cached until the next mutation. Its `Display` prints SDL.
    pub fn to_ast(&self) -> &ast::Document {
        self.cache.ast.get_or_init(|| self.build_ast())
    }

    fn build_ast(&self) -> ast::Document {
        let mut document = ast::Document::new();
        self.push_schema_definition(&mut document.definitions);
        for (_, definition) in self.directive_definitions() {
            document
                .definitions
                .push(Definition::DirectiveDefinition(Node::new(
                    self.directive_definition_ast(definition),
                )));
        }
        for (_, ty) in self.types() {
            self.push_type(&mut document.definitions, ty);
        }
        document
    }

    fn directive_list(&self, ids: &[DirectiveId], extension: Option<ExtensionId>) -> ast::DirectiveList {
        ast::DirectiveList(
            ids.iter()
                .filter_map(|id| self.directives.get(*id))
                .filter(|directive| directive.extension == extension)
                .map(|directive| Node::new(directive.to_ast()))
                .collect(),
        )
    }

    fn push_schema_definition(&self, definitions: &mut Vec<Definition>) {
        let schema_definition = &self.schema_definition;
        let root_operations = |extension: Option<ExtensionId>| -> Vec<Node<(ast::OperationType, Name)>> {
            schema_definition
                .roots
                .iter()
                .filter(|(_, root)| root.extension == extension)
                .filter_map(|(kind, root)| {
                    let name = self.types.get(root.ty)?.name.clone();
                    Some(Node::new((ast::OperationType::from(*kind), name)))
                })
                .collect()
        };

        let directives = self.directive_list(&schema_definition.directives, None);
        let roots = root_operations(None);
        // Roots named by convention need no schema definition.
        let has_custom_roots = roots
            .iter()
            .any(|root| root.1.as_str() != SchemaRootKind::from(root.0).default_type_name());
        if schema_definition.has_definition
            || schema_definition.description.is_some()
            || !directives.is_empty()
            || has_custom_roots
        {
            definitions.push(Definition::SchemaDefinition(Node::new(ast::SchemaDefinition {
                description: schema_definition.description.clone(),
                directives,
                root_operations: roots,
            })));
        }
        for extension in &schema_definition.extensions {
            let extension = Some(*extension);
            let directives = self.directive_list(&schema_definition.directives, extension);
            let root_operations = root_operations(extension);
            // Removals may leave an extension with nothing to carry.
            if directives.is_empty() && root_operations.is_empty() {
                continue;
            }
            definitions.push(Definition::SchemaExtension(Node::new(ast::SchemaExtension {
                directives,
                root_operations,
            })));
        }
    }

    fn directive_definition_ast(&self, definition: &DirectiveDefinition) -> ast::DirectiveDefinition {
        ast::DirectiveDefinition {
            description: definition.description.clone(),
            name: definition.name.clone(),
            arguments: self.arguments_ast(definition.arguments.values()),
            repeatable: definition.repeatable,
            locations: definition.locations.clone(),
        }
    }

    fn arguments_ast<'a>(
        &self,
        ids: impl Iterator<Item = &'a ArgumentId>,
    ) -> Vec<Node<ast::InputValueDefinition>> {
        ids.filter_map(|id| {
            let argument = self.arguments.get(*id)?;
            Some(Node::new(ast::InputValueDefinition {
                description: argument.description.clone(),
                name: argument.name.clone(),
                ty: Node::new(argument.ty.clone()?),
                default_value: argument.default_value.clone(),
                directives: self.directive_list(&argument.directives, None),
            }))
        })
        .collect()
    }

    fn fields_ast(
        &self,
        ids: impl Iterator<Item = FieldId>,
        extension: Option<ExtensionId>,
    ) -> Vec<Node<ast::FieldDefinition>> {
        ids.filter_map(|id| self.fields.get(id))
            .filter(|field| field.extension == extension)
            .filter_map(|field| {
                Some(Node::new(ast::FieldDefinition {
                    description: field.description.clone(),
                    name: field.name.clone(),
                    arguments: self.arguments_ast(field.arguments.values()),
                    ty: field.ty.clone()?,
                    directives: self.directive_list(&field.directives, None),
                }))
            })
            .collect()
    }

    fn input_fields_ast(
        &self,
        ids: impl Iterator<Item = InputFieldId>,
        extension: Option<ExtensionId>,
    ) -> Vec<Node<ast::InputValueDefinition>> {
        ids.filter_map(|id| self.input_fields.get(id))
            .filter(|field| field.extension == extension)
            .filter_map(|field| {
                Some(Node::new(ast::InputValueDefinition {
                    description: field.description.clone(),
                    name: field.name.clone(),
                    ty: Node::new(field.ty.clone()?),
                    default_value: field.default_value.clone(),
                    directives: self.directive_list(&field.directives, None),
                }))
            })
            .collect()
    }

    fn enum_values_ast(
        &self,
        ty: &NamedType,
        extension: Option<ExtensionId>,
    ) -> Vec<Node<ast::EnumValueDefinition>> {
        ty.enum_values()
            .filter_map(|(_, id)| self.enum_values.get(id))
            .filter(|value| value.extension == extension)
            .map(|value| {
                Node::new(ast::EnumValueDefinition {
                    description: value.description.clone(),
                    value: value.name.clone(),
                    directives: self.directive_list(&value.directives, None),
                })
            })
            .collect()
    }

    fn push_type(&self, definitions: &mut Vec<Definition>, ty: &NamedType) {
        let name = ty.name.clone();
        let interfaces = |extension: Option<ExtensionId>| -> Vec<Name> {
            ty.interfaces()
                .filter(|(_, reference)| reference.extension == extension)
                .map(|(name, _)| name.clone())
                .collect()
        };
        let members = |extension: Option<ExtensionId>| -> Vec<Name> {
            ty.union_members()
                .filter(|(_, reference)| reference.extension == extension)
                .map(|(name, _)| name.clone())
                .collect()
        };
        let fields = |extension| self.fields_ast(ty.fields().map(|(_, id)| id), extension);
        let input_fields =
            |extension| self.input_fields_ast(ty.input_fields().map(|(_, id)| id), extension);

        let directives = self.directive_list(&ty.directives, None);
        let definition = match &ty.kind {
            TypeDefinitionKind::Scalar => Definition::ScalarTypeDefinition(Node::new(
                ast::ScalarTypeDefinition {
                    description: ty.description.clone(),
                    name: name.clone(),
                    directives,
                },
            )),
            TypeDefinitionKind::Object(_) => Definition::ObjectTypeDefinition(Node::new(
                ast::ObjectTypeDefinition {
                    description: ty.description.clone(),
                    name: name.clone(),
                    implements_interfaces: interfaces(None),
                    directives,
                    fields: fields(None),
                },
            )),
            TypeDefinitionKind::Interface(_) => Definition::InterfaceTypeDefinition(Node::new(
                ast::InterfaceTypeDefinition {
                    description: ty.description.clone(),
                    name: name.clone(),
                    implements_interfaces: interfaces(None),
                    directives,
                    fields: fields(None),
                },
            )),
            TypeDefinitionKind::Union(_) => Definition::UnionTypeDefinition(Node::new(
                ast::UnionTypeDefinition {
                    description: ty.description.clone(),
                    name: name.clone(),
                    directives,
                    members: members(None),
                },
            )),
            TypeDefinitionKind::Enum(_) => Definition::EnumTypeDefinition(Node::new(
                ast::EnumTypeDefinition {
                    description: ty.description.clone(),
                    name: name.clone(),
                    directives,
                    values: self.enum_values_ast(ty, None),
                },
            )),
            TypeDefinitionKind::InputObject(_) => Definition::InputObjectTypeDefinition(
                Node::new(ast::InputObjectTypeDefinition {
                    description: ty.description.clone(),
                    name: name.clone(),
                    directives,
                    fields: input_fields(None),
                }),
            ),
        };
        // A type only declared through `extend` blocks has no main definition, unless members
        // were since added to it directly.
        if ty.has_definition || !is_empty_definition(&definition) {
            definitions.push(definition);
        }

        for extension in &ty.extensions {
            let extension = Some(*extension);
            let directives = self.directive_list(&ty.directives, extension);
            let extension_definition = match &ty.kind {
                TypeDefinitionKind::Scalar => Definition::ScalarTypeExtension(Node::new(
                    ast::ScalarTypeExtension {
                        name: name.clone(),
                        directives,
                    },
                )),
                TypeDefinitionKind::Object(_) => Definition::ObjectTypeExtension(Node::new(
                    ast::ObjectTypeExtension {
                        name: name.clone(),
                        implements_interfaces: interfaces(extension),
                        directives,
                        fields: fields(extension),
                    },
                )),
                TypeDefinitionKind::Interface(_) => Definition::InterfaceTypeExtension(
                    Node::new(ast::InterfaceTypeExtension {
                        name: name.clone(),
                        implements_interfaces: interfaces(extension),
                        directives,
                        fields: fields(extension),
                    }),
                ),
                TypeDefinitionKind::Union(_) => Definition::UnionTypeExtension(Node::new(
                    ast::UnionTypeExtension {
                        name: name.clone(),
                        directives,
                        members: members(extension),
                    },
                )),
                TypeDefinitionKind::Enum(_) => Definition::EnumTypeExtension(Node::new(
                    ast::EnumTypeExtension {
                        name: name.clone(),
                        directives,
                        values: self.enum_values_ast(ty, extension),
                    },
                )),
                TypeDefinitionKind::InputObject(_) => Definition::InputObjectTypeExtension(
                    Node::new(ast::InputObjectTypeExtension {
                        name: name.clone(),
                        directives,
                        fields: input_fields(extension),
                    }),
                ),
            };
            if !is_empty_definition(&extension_definition) {
                definitions.push(extension_definition);
            }
        }
    }
}

/// Whether a definition or extension fragment carries nothing worth printing.
fn is_empty_definition(definition: &Definition) -> bool {
    match definition {
        Definition::ScalarTypeDefinition(def) => {
            def.description.is_none() && def.directives.is_empty()
        }
        Definition::ObjectTypeDefinition(def) => {
            def.description.is_none()
                && def.directives.is_empty()
                && def.implements_interfaces.is_empty()
                && def.fields.is_empty()
        }
        Definition::InterfaceTypeDefinition(def) => {
            def.description.is_none()
                && def.directives.is_empty()
                && def.implements_interfaces.is_empty()
                && def.fields.is_empty()
        }
        Definition::UnionTypeDefinition(def) => {
            def.description.is_none() && def.directives.is_empty() && def.members.is_empty()
        }
        Definition::EnumTypeDefinition(def) => {
            def.description.is_none() && def.directives.is_empty() && def.values.is_empty()
        }
        Definition::InputObjectTypeDefinition(def) => {
            def.description.is_none() && def.directives.is_empty() && def.fields.is_empty()
        }
        Definition::ScalarTypeExtension(def) => def.directives.is_empty(),
        Definition::ObjectTypeExtension(def) => {
            def.directives.is_empty() && def.implements_interfaces.is_empty() && def.fields.is_empty()
        }
        Definition::InterfaceTypeExtension(def) => {
            def.directives.is_empty() && def.implements_interfaces.is_empty() && def.fields.is_empty()
        }
        Definition::UnionTypeExtension(def) => def.directives.is_empty() && def.members.is_empty(),
        Definition::EnumTypeExtension(def) => def.directives.is_empty() && def.values.is_empty(),
        Definition::InputObjectTypeExtension(def) => {
            def.directives.is_empty() && def.fields.is_empty()
        }
        _ => false,
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_ast().fmt(f)
    }
}
