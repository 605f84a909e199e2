//! `@link`/`@core` feature tracking.
//!
//! A schema applying `@link(url: "https://specs.apollo.dev/link/v1.0")` (or the legacy
//! `@core(feature: ...)`) on its schema definition is a *core schema*. Every link it applies
//! names a feature; the feature's directives and types appear in the schema either under an
//! imported (possibly aliased) name or prefixed by the feature's name in the schema, as in
//! `inaccessible__hidden`.
use std::collections::HashMap;
use std::fmt;
use std::str;
use std::sync::Arc;

use apollo_compiler::InvalidNameError;
use apollo_compiler::Name;
use apollo_compiler::ast::Value;
use apollo_compiler::name;
use thiserror::Error;

use crate::error::FederationError;
use crate::error::SingleFederationError;
use crate::link::spec::Identity;
use crate::link::spec::Url;
use crate::schema::Directive;

pub mod database;
pub(crate) mod link_spec_definition;
pub mod spec;

pub const DEFAULT_LINK_NAME: Name = name!("link");
pub const DEFAULT_IMPORT_SCALAR_NAME: Name = name!("Import");
pub const DEFAULT_PURPOSE_ENUM_NAME: Name = name!("Purpose");

#[derive(Error, Debug, PartialEq)]
pub enum LinkError {
    #[error(transparent)]
    InvalidName(#[from] InvalidNameError),
    #[error("Invalid use of @link in schema: {0}")]
    BootstrapError(String),
}

impl From<LinkError> for FederationError {
    fn from(value: LinkError) -> Self {
        SingleFederationError::InvalidLinkDirectiveUsage {
            message: value.to_string(),
        }
        .into()
    }
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum Purpose {
    SECURITY,
    EXECUTION,
}

impl Purpose {
    pub fn from_value(value: &Value) -> Result<Purpose, LinkError> {
        match value {
            Value::Enum(value) => value.parse::<Purpose>(),
            _ => Err(LinkError::BootstrapError(
                "invalid `for` value, should be an enum".to_string(),
            )),
        }
    }
}

impl str::FromStr for Purpose {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SECURITY" => Ok(Purpose::SECURITY),
            "EXECUTION" => Ok(Purpose::EXECUTION),
            _ => Err(LinkError::BootstrapError(format!(
                "invalid/unrecognized `for` value '{s}'"
            ))),
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Purpose::SECURITY => f.write_str("SECURITY"),
            Purpose::EXECUTION => f.write_str("EXECUTION"),
        }
    }
}

/// One entry of `@link(import:)`.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Import {
    /// The imported element's name in its feature, without any leading `@`.
    pub element: Name,
    pub is_directive: bool,
    pub alias: Option<Name>,
}

impl Import {
    pub fn from_value(value: &Value) -> Result<Import, LinkError> {
        match value {
            Value::String(element) => {
                let (element, is_directive) = split_directive_name(element);
                Ok(Import {
                    element: Name::new(element)?,
                    is_directive,
                    alias: None,
                })
            }
            Value::Object(fields) => {
                let mut name = None;
                let mut alias = None;
                for (key, value) in fields {
                    let slot = match key.as_str() {
                        "name" => &mut name,
                        "as" => &mut alias,
                        _ => {
                            return Err(LinkError::BootstrapError(format!(
                                "unknown field `{key}` in @link(import:) argument"
                            )));
                        }
                    };
                    *slot = Some(value.as_str().ok_or_else(|| {
                        LinkError::BootstrapError(format!(
                            "invalid value for `{key}` field in @link(import:) argument: must be a string"
                        ))
                    })?);
                }
                let Some(element) = name else {
                    return Err(LinkError::BootstrapError(
                        "invalid entry in @link(import:) argument, missing mandatory `name` field"
                            .to_string(),
                    ));
                };
                let (element_name, is_directive) = split_directive_name(element);
                let alias = match alias {
                    Some(alias) => {
                        let (alias_name, alias_is_directive) = split_directive_name(alias);
                        if alias_is_directive != is_directive {
                            return Err(LinkError::BootstrapError(format!(
                                "invalid alias '{alias}' for import name '{element}': a directive must be aliased to a directive and a type to a type"
                            )));
                        }
                        Some(Name::new(alias_name)?)
                    }
                    None => None,
                };
                Ok(Import {
                    element: Name::new(element_name)?,
                    is_directive,
                    alias,
                })
            }
            _ => Err(LinkError::BootstrapError(
                "invalid sub-value for @link(import:) argument: values should be either strings or input object values of the form { name: \"<importedElement>\", as: \"<alias>\" }."
                    .to_string(),
            )),
        }
    }

    pub fn imported_name(&self) -> &Name {
        self.alias.as_ref().unwrap_or(&self.element)
    }

    pub fn imported_display_name(&self) -> impl fmt::Display + '_ {
        DisplayName {
            name: self.imported_name(),
            is_directive: self.is_directive,
        }
    }
}

fn split_directive_name(name: &str) -> (&str, bool) {
    match name.strip_prefix('@') {
        Some(name) => (name, true),
        None => (name, false),
    }
}

/// Prints a name with a leading `@` for directives.
struct DisplayName<'s> {
    name: &'s str,
    is_directive: bool,
}

impl fmt::Display for DisplayName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_directive {
            f.write_str("@")?;
        }
        f.write_str(self.name)
    }
}

impl fmt::Display for Import {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let element = DisplayName {
            name: &self.element,
            is_directive: self.is_directive,
        };
        if self.alias.is_some() {
            write!(
                f,
                r#"{{ name: "{element}", as: "{}" }}"#,
                self.imported_display_name()
            )
        } else {
            write!(f, r#""{element}""#)
        }
    }
}

/// A parsed `@link` (or `@core`) application.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Link {
    pub url: Url,
    pub spec_alias: Option<Name>,
    pub imports: Vec<Arc<Import>>,
    pub purpose: Option<Purpose>,
}

impl Link {
    pub fn spec_name_in_schema(&self) -> &Name {
        self.spec_alias.as_ref().unwrap_or(&self.url.identity.name)
    }

    /// The name under which the feature's directive `name` appears in the schema.
    pub fn directive_name_in_schema(&self, name: &Name) -> Name {
        if let Some(import) = self
            .imports
            .iter()
            .find(|import| import.is_directive && import.element == *name)
        {
            import.imported_name().clone()
        } else if *name == self.url.identity.name {
            // A directive named like its feature is implicitly imported.
            self.spec_name_in_schema().clone()
        } else {
            Name::new_unchecked(&format!("{}__{name}", self.spec_name_in_schema()))
        }
    }

    /// The name under which the feature's type `name` appears in the schema.
    pub fn type_name_in_schema(&self, name: &Name) -> Name {
        if let Some(import) = self
            .imports
            .iter()
            .find(|import| !import.is_directive && import.element == *name)
        {
            import.imported_name().clone()
        } else {
            Name::new_unchecked(&format!("{}__{name}", self.spec_name_in_schema()))
        }
    }

    pub fn from_directive_application(directive: &Directive) -> Result<Link, LinkError> {
        let (url, arg_name) = if let Some(value) = directive.argument("url") {
            (value, "url")
        } else if let Some(value) = directive.argument("feature") {
            (value, "feature")
        } else {
            return Err(LinkError::BootstrapError(format!(
                "the `url` argument for @{} is mandatory",
                directive.name
            )));
        };
        let is_link = arg_name == "url";
        let url = url.as_str().ok_or_else(|| {
            LinkError::BootstrapError(format!(
                "the `{arg_name}` argument for @{} must be a String",
                directive.name
            ))
        })?;
        let url = url.parse::<Url>().map_err(|e| {
            LinkError::BootstrapError(format!("invalid `{arg_name}` argument (reason: {e})"))
        })?;

        let spec_alias = directive
            .argument("as")
            .and_then(|value| value.as_str())
            .map(Name::new)
            .transpose()?;
        let purpose = directive
            .argument("for")
            .filter(|value| !value.is_null())
            .map(|value| Purpose::from_value(value))
            .transpose()?;
        let imports = if is_link {
            directive
                .argument("import")
                .and_then(|value| value.as_list())
                .unwrap_or(&[])
                .iter()
                .map(|value| Ok(Arc::new(Import::from_value(value)?)))
                .collect::<Result<Vec<_>, LinkError>>()?
        } else {
            Vec::new()
        };

        Ok(Link {
            url,
            spec_alias,
            imports,
            purpose,
        })
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, r#"@link(url: "{}""#, self.url)?;
        if let Some(alias) = &self.spec_alias {
            write!(f, r#", as: "{alias}""#)?;
        }
        if !self.imports.is_empty() {
            f.write_str(", import: [")?;
            for (i, import) in self.imports.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{import}")?;
            }
            f.write_str("]")?;
        }
        if let Some(purpose) = &self.purpose {
            write!(f, ", for: {purpose}")?;
        }
        f.write_str(")")
    }
}

#[derive(Clone, Debug)]
pub struct LinkedElement {
    pub link: Arc<Link>,
    pub import: Option<Arc<Import>>,
}

/// The features linked by a core schema, indexed for name resolution.
#[derive(Clone, Default, Eq, PartialEq, Debug)]
pub struct LinksMetadata {
    pub(crate) links: Vec<Arc<Link>>,
    pub(crate) by_identity: HashMap<Identity, Arc<Link>>,
    pub(crate) by_name_in_schema: HashMap<Name, Arc<Link>>,
    pub(crate) types_by_imported_name: HashMap<Name, (Arc<Link>, Arc<Import>)>,
    pub(crate) directives_by_imported_name: HashMap<Name, (Arc<Link>, Arc<Import>)>,
}

impl LinksMetadata {
    /// Registers one more link, rejecting a second inclusion of the same feature.
    pub fn add_link(&mut self, link: Link) -> Result<(), FederationError> {
        let link = Arc::new(link);
        if self.by_identity.contains_key(&link.url.identity) {
            return Err(SingleFederationError::DuplicateFeatureInclusion {
                message: format!(
                    "Duplicate inclusion of feature \"{}\"",
                    link.url.identity
                ),
            }
            .into());
        }
        let name_in_schema = link.spec_name_in_schema();
        if let Some(other) = self.by_name_in_schema.get(name_in_schema) {
            return Err(LinkError::BootstrapError(format!(
                "name conflict: {} and {} are imported under the same name (consider using the `@link(as:)` argument to disambiguate)",
                other.url, link.url,
            ))
            .into());
        }
        for import in &link.imports {
            let imported_name = import.imported_name();
            let by_imported_name = if import.is_directive {
                // The name of each feature acts as an implicit import of a directive of the
                // same name.
                if let Some(other) = self.by_name_in_schema.get(imported_name) {
                    return Err(LinkError::BootstrapError(format!(
                        "import for '{}' of {} conflicts with spec {}",
                        import.imported_display_name(),
                        link.url,
                        other.url
                    ))
                    .into());
                }
                &self.directives_by_imported_name
            } else {
                &self.types_by_imported_name
            };
            if let Some((other, _)) = by_imported_name.get(imported_name) {
                return Err(LinkError::BootstrapError(format!(
                    "name conflict: both {} and {} import {}",
                    other.url,
                    link.url,
                    import.imported_display_name()
                ))
                .into());
            }
        }
        if let Some((import, _)) = self
            .directives_by_imported_name
            .get_key_value(name_in_schema)
        {
            return Err(LinkError::BootstrapError(format!(
                "{} conflicts with the import of @{import}",
                link.url
            ))
            .into());
        }

        for import in &link.imports {
            let by_imported_name = if import.is_directive {
                &mut self.directives_by_imported_name
            } else {
                &mut self.types_by_imported_name
            };
            by_imported_name.insert(
                import.imported_name().clone(),
                (Arc::clone(&link), Arc::clone(import)),
            );
        }
        self.by_identity
            .insert(link.url.identity.clone(), Arc::clone(&link));
        self.by_name_in_schema
            .insert(name_in_schema.clone(), Arc::clone(&link));
        self.links.push(link);
        Ok(())
    }

    pub fn all_links(&self) -> &[Arc<Link>] {
        self.links.as_ref()
    }

    pub fn for_identity(&self, identity: &Identity) -> Option<Arc<Link>> {
        self.by_identity.get(identity).cloned()
    }

    /// The link bootstrapping the core schema: `@link` itself, or `@core`.
    pub fn bootstrap_link(&self) -> Option<Arc<Link>> {
        self.for_identity(&Identity::link_identity())
            .or_else(|| self.for_identity(&Identity::core_identity()))
    }

    /// The name of `@link` (or `@core`) in this schema.
    pub fn link_directive_name(&self) -> Option<Name> {
        self.bootstrap_link()
            .map(|link| link.spec_name_in_schema().clone())
    }

    /// The name of the directive `name` of the feature `identity` in this schema, if that
    /// feature is linked.
    pub fn directive_name_in_schema(&self, identity: &Identity, name: &Name) -> Option<Name> {
        self.for_identity(identity)
            .map(|link| link.directive_name_in_schema(name))
    }

    pub fn source_link_of_type(&self, type_name: &Name) -> Option<LinkedElement> {
        // Types are either imported or fully qualified.
        if let Some((link, import)) = self.types_by_imported_name.get(type_name) {
            return Some(LinkedElement {
                link: Arc::clone(link),
                import: Some(Arc::clone(import)),
            });
        }
        self.qualified_source(type_name)
    }

    pub fn source_link_of_directive(&self, directive_name: &Name) -> Option<LinkedElement> {
        // Directives are either imported, named like their feature, or fully qualified.
        if let Some((link, import)) = self.directives_by_imported_name.get(directive_name) {
            return Some(LinkedElement {
                link: Arc::clone(link),
                import: Some(Arc::clone(import)),
            });
        }
        if let Some(link) = self.by_name_in_schema.get(directive_name) {
            return Some(LinkedElement {
                link: Arc::clone(link),
                import: None,
            });
        }
        self.qualified_source(directive_name)
    }

    fn qualified_source(&self, name: &Name) -> Option<LinkedElement> {
        name.split_once("__").and_then(|(spec_name, _)| {
            self.by_name_in_schema
                .get(spec_name)
                .map(|link| LinkedElement {
                    link: Arc::clone(link),
                    import: None,
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use apollo_compiler::Node;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::ErrorCode;
    use crate::schema::DirectiveTarget;

    fn link_application(arguments: Vec<(&str, Value)>) -> Directive {
        Directive {
            name: name!("link"),
            arguments: arguments
                .into_iter()
                .map(|(name, value)| (Name::new(name).unwrap(), Node::new(value)))
                .collect::<IndexMap<_, _>>(),
            target: DirectiveTarget::SchemaDefinition,
            extension: None,
        }
    }

    fn string(value: &str) -> Value {
        Value::String(value.into())
    }

    #[test]
    fn resolves_imported_aliased_and_qualified_names() {
        let link = Link::from_directive_application(&link_application(vec![
            ("url", string("https://specs.apollo.dev/federation/v2.3")),
            ("as", string("fed")),
            (
                "import",
                Value::List(vec![
                    Node::new(string("@key")),
                    Node::new(Value::Object(vec![
                        (name!("name"), Node::new(string("@shareable"))),
                        (name!("as"), Node::new(string("@share"))),
                    ])),
                    Node::new(string("FieldSet")),
                ]),
            ),
        ]))
        .unwrap();

        assert_eq!(link.directive_name_in_schema(&name!("key")), "key");
        assert_eq!(link.directive_name_in_schema(&name!("shareable")), "share");
        assert_eq!(link.directive_name_in_schema(&name!("external")), "fed__external");
        assert_eq!(link.directive_name_in_schema(&name!("federation")), "fed");
        assert_eq!(link.type_name_in_schema(&name!("FieldSet")), "FieldSet");
        assert_eq!(link.type_name_in_schema(&name!("Scope")), "fed__Scope");
        assert_eq!(
            link.to_string(),
            r#"@link(url: "https://specs.apollo.dev/federation/v2.3", as: "fed", import: ["@key", { name: "@shareable", as: "@share" }, "FieldSet"])"#
        );
    }

    #[test]
    fn rejects_mismatched_import_aliases() {
        let err = Import::from_value(&Value::Object(vec![
            (name!("name"), Node::new(string("@key"))),
            (name!("as"), Node::new(string("Key"))),
        ]))
        .unwrap_err();
        assert!(matches!(err, LinkError::BootstrapError(_)));
    }

    #[test]
    fn duplicate_feature_inclusion_is_fatal() {
        let mut links = LinksMetadata::default();
        let inaccessible = || {
            Link::from_directive_application(&link_application(vec![(
                "url",
                string("https://specs.apollo.dev/inaccessible/v0.2"),
            )]))
            .unwrap()
        };
        links.add_link(inaccessible()).unwrap();
        let err = links.add_link(inaccessible()).unwrap_err();
        assert_eq!(err.codes(), vec![ErrorCode::DuplicateFeatureInclusion]);
    }

    #[test]
    fn legacy_core_applications_use_the_feature_argument() {
        let mut application = link_application(vec![(
            "feature",
            string("https://specs.apollo.dev/core/v0.2"),
        )]);
        application.name = name!("core");
        let link = Link::from_directive_application(&application).unwrap();
        assert_eq!(link.url.identity, Identity::core_identity());
        assert!(link.imports.is_empty());
    }
}
