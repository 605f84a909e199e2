use crate::error::FederationError;
use crate::link::Link;
use crate::link::LinkError;
use crate::link::LinksMetadata;
use crate::link::spec::Url;
use crate::schema::Directive;

/// Computes the link metadata of a schema from the directives applied on its schema
/// definition.
///
/// Returns `None` if none of the directives bootstraps a core schema, that is, if no
/// application of `@link(url: ".../link/vX.Y")` (or `@core(feature: ".../core/vX.Y")`) is found
/// under its own name or its `as:` alias.
pub fn links_metadata(directives: &[&Directive]) -> Result<Option<LinksMetadata>, FederationError> {
    let mut bootstrap_directives = directives
        .iter()
        .copied()
        .filter(|directive| is_bootstrap_directive(directive));
    let Some(bootstrap_directive) = bootstrap_directives.next() else {
        return Ok(None);
    };
    if let Some(other) = bootstrap_directives.next() {
        return Err(LinkError::BootstrapError(format!(
            "the bootstrap specification is applied multiple times (\"@{}\" and \"@{}\")",
            bootstrap_directive.name, other.name
        ))
        .into());
    }

    // Every application under the bootstrap name is a link, including the bootstrap itself.
    let link_name_in_schema = &bootstrap_directive.name;
    let mut metadata = LinksMetadata::default();
    for application in directives
        .iter()
        .filter(|directive| directive.name == *link_name_in_schema)
    {
        metadata.add_link(Link::from_directive_application(application)?)?;
    }
    Ok(Some(metadata))
}

fn is_bootstrap_directive(directive: &Directive) -> bool {
    let Some(url) = directive
        .argument("url")
        .or_else(|| directive.argument("feature"))
        .and_then(|value| value.as_str())
        .and_then(|url| url.parse::<Url>().ok())
    else {
        return false;
    };
    if !url.identity.is_bootstrap() {
        return false;
    }
    let expected_name = directive
        .argument("as")
        .and_then(|value| value.as_str())
        .unwrap_or(url.identity.name.as_str());
    directive.name == expected_name
}

#[cfg(test)]
mod tests {
    use apollo_compiler::Name;
    use apollo_compiler::Node;
    use apollo_compiler::ast::Value;
    use apollo_compiler::name;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::ErrorCode;
    use crate::link::Purpose;
    use crate::link::spec::Identity;
    use crate::link::spec::Version;
    use crate::schema::DirectiveTarget;

    fn application(name: &str, arguments: &[(&str, Value)]) -> Directive {
        Directive {
            name: Name::new(name).unwrap(),
            arguments: arguments
                .iter()
                .map(|(name, value)| (Name::new(name).unwrap(), Node::new(value.clone())))
                .collect(),
            target: DirectiveTarget::SchemaDefinition,
            extension: None,
        }
    }

    fn string(value: &str) -> Value {
        Value::String(value.into())
    }

    #[test]
    fn schemas_without_bootstrap_are_not_core_schemas() {
        let directives = [application(
            "link",
            &[("url", string("https://specs.apollo.dev/inaccessible/v0.2"))],
        )];
        let directives: Vec<&Directive> = directives.iter().collect();
        assert_eq!(links_metadata(&directives).unwrap(), None);
    }

    #[test]
    fn computes_link_metadata() {
        let directives = [
            application("link", &[("url", string("https://specs.apollo.dev/link/v1.0"))]),
            application(
                "link",
                &[
                    ("url", string("https://specs.apollo.dev/join/v0.3")),
                    ("for", Value::Enum(name!("EXECUTION"))),
                ],
            ),
            application(
                "link",
                &[
                    ("url", string("https://example.com/my-directive/v1.0")),
                    ("import", Value::List(vec![Node::new(string("@myDirective"))])),
                ],
            ),
        ];
        let directives: Vec<&Directive> = directives.iter().collect();
        let metadata = links_metadata(&directives).unwrap().unwrap();

        assert_eq!(metadata.all_links().len(), 3);
        assert_eq!(metadata.link_directive_name(), Some(name!("link")));
        let join = metadata
            .for_identity(&Identity::apollo(name!("join")))
            .unwrap();
        assert_eq!(join.url.version, Version { major: 0, minor: 3 });
        assert_eq!(join.purpose, Some(Purpose::EXECUTION));
        let my_directive = metadata
            .source_link_of_directive(&name!("myDirective"))
            .unwrap();
        assert_eq!(my_directive.link.url.identity.domain, "https://example.com");
        assert!(
            metadata
                .source_link_of_directive(&name!("join__field"))
                .is_some()
        );
        assert!(metadata.source_link_of_type(&name!("join__Graph")).is_some());
        assert!(metadata.source_link_of_type(&name!("Unrelated")).is_none());
    }

    #[test]
    fn aliased_bootstrap_links_under_its_alias() {
        let directives = [
            application(
                "mylink",
                &[
                    ("url", string("https://specs.apollo.dev/link/v1.0")),
                    ("as", string("mylink")),
                ],
            ),
            application(
                "mylink",
                &[("url", string("https://specs.apollo.dev/inaccessible/v0.2"))],
            ),
            // Not a link: the bootstrap is aliased.
            application(
                "link",
                &[("url", string("https://specs.apollo.dev/tag/v0.2"))],
            ),
        ];
        let directives: Vec<&Directive> = directives.iter().collect();
        let metadata = links_metadata(&directives).unwrap().unwrap();
        assert_eq!(metadata.link_directive_name(), Some(name!("mylink")));
        assert_eq!(metadata.all_links().len(), 2);
        assert!(
            metadata
                .for_identity(&Identity::apollo(name!("tag")))
                .is_none()
        );
    }

    #[test]
    fn legacy_core_schemas_are_recognized() {
        let directives = [
            application("core", &[("feature", string("https://specs.apollo.dev/core/v0.2"))]),
            application(
                "core",
                &[("feature", string("https://specs.apollo.dev/inaccessible/v0.1"))],
            ),
        ];
        let directives: Vec<&Directive> = directives.iter().collect();
        let metadata = links_metadata(&directives).unwrap().unwrap();
        assert_eq!(metadata.link_directive_name(), Some(name!("core")));
        assert_eq!(
            metadata.directive_name_in_schema(&Identity::inaccessible_identity(), &name!("inaccessible")),
            Some(name!("inaccessible"))
        );
        assert_eq!(
            metadata.bootstrap_link().unwrap().url.identity,
            Identity::core_identity()
        );
    }

    #[test]
    fn duplicate_inclusions_are_rejected() {
        let directives = [
            application("link", &[("url", string("https://specs.apollo.dev/link/v1.0"))]),
            application("link", &[("url", string("https://specs.apollo.dev/tag/v0.1"))]),
            application("link", &[("url", string("https://specs.apollo.dev/tag/v0.2"))]),
        ];
        let directives: Vec<&Directive> = directives.iter().collect();
        let err = links_metadata(&directives).unwrap_err();
        assert_eq!(err.codes(), vec![ErrorCode::DuplicateFeatureInclusion]);
    }

    #[test]
    fn errors_on_conflicting_imports() {
        let directives = [
            application("link", &[("url", string("https://specs.apollo.dev/link/v1.0"))]),
            application(
                "link",
                &[
                    ("url", string("https://example.com/a/v1.0")),
                    ("import", Value::List(vec![Node::new(string("@foo"))])),
                ],
            ),
            application(
                "link",
                &[
                    ("url", string("https://example.com/b/v1.0")),
                    ("import", Value::List(vec![Node::new(string("@foo"))])),
                ],
            ),
        ];
        let directives: Vec<&Directive> = directives.iter().collect();
        let err = links_metadata(&directives).unwrap_err();
        assert_eq!(err.codes(), vec![ErrorCode::InvalidLinkDirectiveUsage]);
        assert!(err.to_string().contains("both"), "{err}");
    }
}
