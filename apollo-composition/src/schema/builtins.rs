use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast;
use apollo_compiler::ast::DirectiveLocation;
use apollo_compiler::name;
use apollo_compiler::ty;

use super::ArgumentDefinition;
use super::ArgumentParent;
use super::DirectiveDefinition;
use super::NamedType;
use super::Referencer;
use super::Schema;
use super::TypeDefinitionKind;

const BUILT_IN_SCALARS: [Name; 5] = [
    name!("Int"),
    name!("Float"),
    name!("String"),
    name!("Boolean"),
    name!("ID"),
];

struct BuiltInArgument {
    name: Name,
    ty: ast::Type,
    default_value: Option<Node<ast::Value>>,
}

/// Installs the GraphQL built-in scalars and directives. Runs once, before the schema is
/// marked as constructed.
pub(super) fn install(schema: &mut Schema) {
    for name in BUILT_IN_SCALARS {
        let id = schema.types.insert(NamedType {
            name: name.clone(),
            description: None,
            is_built_in: true,
            has_definition: true,
            kind: TypeDefinitionKind::Scalar,
            directives: Vec::new(),
            extensions: Default::default(),
            referencers: Default::default(),
        });
        schema.built_in_types.insert(name, id);
    }

    let conditional = |name: Name| {
        (
            name,
            false,
            vec![
                DirectiveLocation::Field,
                DirectiveLocation::FragmentSpread,
                DirectiveLocation::InlineFragment,
            ],
            vec![BuiltInArgument {
                name: name!("if"),
                ty: ty!(Boolean!),
                default_value: None,
            }],
        )
    };
    let definitions = [
        conditional(name!("include")),
        conditional(name!("skip")),
        (
            name!("deprecated"),
            false,
            vec![
                DirectiveLocation::FieldDefinition,
                DirectiveLocation::ArgumentDefinition,
                DirectiveLocation::InputFieldDefinition,
                DirectiveLocation::EnumValue,
            ],
            vec![BuiltInArgument {
                name: name!("reason"),
                ty: ty!(String),
                default_value: Some(Node::new(ast::Value::String(
                    "No longer supported".into(),
                ))),
            }],
        ),
        (
            name!("specifiedBy"),
            false,
            vec![DirectiveLocation::Scalar],
            vec![BuiltInArgument {
                name: name!("url"),
                ty: ty!(String!),
                default_value: None,
            }],
        ),
        (
            name!("defer"),
            false,
            vec![
                DirectiveLocation::FragmentSpread,
                DirectiveLocation::InlineFragment,
            ],
            vec![
                BuiltInArgument {
                    name: name!("label"),
                    ty: ty!(String),
                    default_value: None,
                },
                BuiltInArgument {
                    name: name!("if"),
                    ty: ty!(Boolean!),
                    default_value: Some(true.into()),
                },
            ],
        ),
        (
            name!("stream"),
            false,
            vec![DirectiveLocation::Field],
            vec![
                BuiltInArgument {
                    name: name!("label"),
                    ty: ty!(String),
                    default_value: None,
                },
                BuiltInArgument {
                    name: name!("if"),
                    ty: ty!(Boolean!),
                    default_value: Some(true.into()),
                },
                BuiltInArgument {
                    name: name!("initialCount"),
                    ty: ty!(Int),
                    default_value: Some(0.into()),
                },
            ],
        ),
    ];

    for (name, repeatable, locations, arguments) in definitions {
        install_directive(schema, name, repeatable, locations, arguments);
    }
}

fn install_directive(
    schema: &mut Schema,
    name: Name,
    repeatable: bool,
    locations: Vec<DirectiveLocation>,
    arguments: Vec<BuiltInArgument>,
) {
    let id = schema.directive_definitions.insert(DirectiveDefinition {
        name: name.clone(),
        description: None,
        repeatable,
        locations,
        arguments: Default::default(),
        is_built_in: true,
        referencers: Default::default(),
    });
    schema.built_in_directive_definitions.insert(name, id);

    for argument in arguments {
        let argument_id = schema.arguments.insert(ArgumentDefinition {
            name: argument.name.clone(),
            parent: ArgumentParent::Directive(id),
            description: None,
            ty: Some(argument.ty.clone()),
            default_value: argument.default_value,
            directives: Vec::new(),
        });
        if let Some(ty) = schema
            .built_in_types
            .get(argument.ty.inner_named_type())
            .and_then(|ty| schema.types.get_mut(*ty))
        {
            ty.referencers.insert(Referencer::Argument(argument_id));
        }
        if let Some(definition) = schema.directive_definitions.get_mut(id) {
            definition.arguments.insert(argument.name, argument_id);
        }
    }
}
