use apollo_compiler::Name;
use apollo_compiler::ast::DirectiveLocation;
use apollo_compiler::ast::Type;
use apollo_compiler::name;
use apollo_compiler::ty;

use crate::error::FederationError;
use crate::error::SingleFederationError;
use crate::link::DEFAULT_IMPORT_SCALAR_NAME;
use crate::link::DEFAULT_PURPOSE_ENUM_NAME;
use crate::link::Link;
use crate::link::spec::Identity;
use crate::link::spec::Url;
use crate::link::spec::Version;
use crate::schema::Schema;
use crate::schema::type_and_directive_specification::ArgumentSpecification;
use crate::schema::type_and_directive_specification::DirectiveArgumentSpecification;
use crate::schema::type_and_directive_specification::DirectiveSpecification;
use crate::schema::type_and_directive_specification::EnumTypeSpecification;
use crate::schema::type_and_directive_specification::EnumValueSpecification;
use crate::schema::type_and_directive_specification::ScalarTypeSpecification;
use crate::schema::type_and_directive_specification::TypeAndDirectiveSpecification;

const CORE_VERSIONS: [Version; 2] = [
    Version { major: 0, minor: 1 },
    Version { major: 0, minor: 2 },
];
const LINK_VERSIONS: [Version; 1] = [Version { major: 1, minor: 0 }];

/// The bootstrap feature of a core schema: `@link`, or its legacy `@core` predecessor.
pub(crate) struct LinkSpecDefinition {
    url: Url,
}

impl LinkSpecDefinition {
    /// Looks up the definition of a known bootstrap version.
    pub(crate) fn from_url(url: &Url) -> Result<Self, FederationError> {
        let known_versions: &[Version] = if url.identity == Identity::link_identity() {
            &LINK_VERSIONS
        } else if url.identity == Identity::core_identity() {
            &CORE_VERSIONS
        } else {
            &[]
        };
        if !known_versions.contains(&url.version) {
            return Err(SingleFederationError::InvalidLinkIdentifier {
                message: format!("Schema uses unknown version {} of {}", url.version, url.identity),
            }
            .into());
        }
        Ok(Self { url: url.clone() })
    }

    fn is_legacy_core(&self) -> bool {
        self.url.identity == Identity::core_identity()
    }

    fn url_argument_name(&self) -> Name {
        if self.is_legacy_core() {
            name!("feature")
        } else {
            name!("url")
        }
    }

    fn purpose_enum_specification(&self) -> EnumTypeSpecification {
        EnumTypeSpecification {
            name: DEFAULT_PURPOSE_ENUM_NAME,
            values: vec![
                EnumValueSpecification {
                    name: name!("SECURITY"),
                    description: Some(
                        "`SECURITY` features provide metadata necessary to securely resolve fields."
                            .to_string(),
                    ),
                },
                EnumValueSpecification {
                    name: name!("EXECUTION"),
                    description: Some(
                        "`EXECUTION` features provide metadata necessary for operation execution."
                            .to_string(),
                    ),
                },
            ],
        }
    }

    fn has_purpose(&self) -> bool {
        !(self.is_legacy_core() && self.url.version == Version { major: 0, minor: 1 })
    }

    fn directive_specification(&self, link: &Link) -> Result<DirectiveSpecification, FederationError> {
        let argument = |name: Name, ty: Type| DirectiveArgumentSpecification {
            base_spec: ArgumentSpecification {
                name,
                ty,
                default_value: None,
            },
            composition_strategy: None,
        };
        // `@link(url:)` is nullable so that `@link(feature:)` can be rewritten in place.
        let url_type = if self.is_legacy_core() {
            ty!(String!)
        } else {
            ty!(String)
        };
        let mut args = vec![
            argument(self.url_argument_name(), url_type),
            argument(name!("as"), ty!(String)),
        ];
        if self.has_purpose() {
            let purpose = link.type_name_in_schema(&DEFAULT_PURPOSE_ENUM_NAME);
            args.push(argument(name!("for"), Type::Named(purpose)));
        }
        if !self.is_legacy_core() {
            let import = link.type_name_in_schema(&DEFAULT_IMPORT_SCALAR_NAME);
            args.push(argument(
                name!("import"),
                Type::List(Box::new(Type::Named(import))),
            ));
        }
        DirectiveSpecification::new(
            link.spec_name_in_schema().clone(),
            &args,
            true,
            &[DirectiveLocation::Schema],
        )
    }

    /// Adds the bootstrap definitions `link` needs and the schema lacks, and checks the existing
    /// ones.
    pub(crate) fn add_elements_to_schema(
        &self,
        schema: &mut Schema,
        link: &Link,
    ) -> Result<(), FederationError> {
        if self.has_purpose() {
            let purpose = link.type_name_in_schema(&DEFAULT_PURPOSE_ENUM_NAME);
            self.purpose_enum_specification()
                .check_or_add(schema, Some(&purpose), false)?;
        }
        if !self.is_legacy_core() {
            let import = link.type_name_in_schema(&DEFAULT_IMPORT_SCALAR_NAME);
            ScalarTypeSpecification {
                name: DEFAULT_IMPORT_SCALAR_NAME,
            }
            .check_or_add(schema, Some(&import), false)?;
        }
        let directive = self.directive_specification(link)?;
        directive.check_or_add(schema, None, false)
    }
}

/// Completes a core schema with the definitions of its bootstrap feature.
pub(crate) fn add_bootstrap_definitions(schema: &mut Schema) -> Result<(), FederationError> {
    let Some(link) = schema.links().and_then(|links| links.bootstrap_link()) else {
        return Ok(());
    };
    LinkSpecDefinition::from_url(&link.url)?.add_elements_to_schema(schema, &link)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::ErrorCode;
    use crate::schema::TypeKind;

    #[test]
    fn adds_missing_link_definitions() {
        let schema = Schema::parse(
            r#"
            extend schema @link(url: "https://specs.apollo.dev/link/v1.0")
            type Query { x: Int }
            "#,
            "schema.graphql",
        )
        .unwrap();
        let link = schema.directive_definition("link").unwrap();
        assert!(link.repeatable);
        assert_eq!(
            link.arguments.keys().map(|name| name.as_str()).collect::<Vec<_>>(),
            vec!["url", "as", "for", "import"]
        );
        assert_eq!(
            schema.get_type("link__Purpose").unwrap().type_kind(),
            TypeKind::Enum
        );
        assert_eq!(
            schema.get_type("link__Import").unwrap().type_kind(),
            TypeKind::Scalar
        );
    }

    #[test]
    fn follows_aliases_and_imports() {
        let schema = Schema::parse(
            r#"
            extend schema @mylink(url: "https://specs.apollo.dev/link/v1.0", as: "mylink", import: ["Import"])
            type Query { x: Int }
            "#,
            "schema.graphql",
        )
        .unwrap();
        assert!(schema.directive_definition("mylink").is_some());
        assert!(schema.directive_definition("link").is_none());
        assert!(schema.get_type("mylink__Purpose").is_some());
        assert!(schema.get_type("Import").is_some());
    }

    #[test]
    fn legacy_core_has_its_own_shape() {
        let schema = Schema::parse(
            r#"
            schema @core(feature: "https://specs.apollo.dev/core/v0.1") { query: Query }
            type Query { x: Int }
            "#,
            "schema.graphql",
        )
        .unwrap();
        let core = schema.directive_definition("core").unwrap();
        assert_eq!(
            core.arguments.keys().map(|name| name.as_str()).collect::<Vec<_>>(),
            vec!["feature", "as"]
        );
        assert!(schema.get_type("core__Purpose").is_none());
    }

    #[test]
    fn rejects_unknown_bootstrap_versions() {
        let err = LinkSpecDefinition::from_url(
            &"https://specs.apollo.dev/link/v2.0".parse().unwrap(),
        )
        .err()
        .unwrap();
        assert_eq!(err.codes(), vec![ErrorCode::InvalidLinkIdentifier]);
    }
}
