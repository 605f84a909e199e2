//! Composition entries: how the applications of one directive, collected across subgraphs,
//! are combined into the applications of the supergraph.
use std::str::FromStr;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast::DirectiveLocation;
use apollo_compiler::ast::Type;
use apollo_compiler::ast::Value;
use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use tracing::trace;

use crate::ensure;
use crate::error::FederationError;
use crate::error::SingleFederationError;
use crate::link::spec::Identity;
use crate::link::spec::Url;
use crate::schema::Directive;
use crate::schema::Schema;
use crate::schema::argument_composition_strategies::ArgumentCompositionStrategy;
use crate::schema::type_algebra::values_equal;

/// The arguments of one directive application, keyed by argument name.
pub type DirectiveArguments = IndexMap<Name, Node<Value>>;

/// How many applications of a directive the supergraph element ends up with.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DirectiveCompositionStrategy {
    /// One application per bucket of applications agreeing on their `EXACT` arguments.
    Collapse,
    /// Like `COLLAPSE`, but every subgraph defining the element must apply the directive.
    CollapseFromAll,
    /// Every distinct application is kept.
    Repeat,
}

/// Whether applications on an object type also count for its fields.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PropagationStrategy {
    #[default]
    None,
    InheritFromObject,
}

/// How one argument is treated when applications are combined.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldPropagationStrategy {
    /// Applications only combine if they agree on this argument.
    Exact,
    Max,
    Min,
    Sum,
    Average,
    And,
    Or,
    Intersection,
    Union,
}

impl FieldPropagationStrategy {
    /// The strategy reducing the values of a bucket. `EXACT` delimits buckets instead.
    pub fn reducer(self) -> Option<ArgumentCompositionStrategy> {
        Some(match self {
            Self::Exact => return None,
            Self::Max => ArgumentCompositionStrategy::Max,
            Self::Min => ArgumentCompositionStrategy::Min,
            Self::Sum => ArgumentCompositionStrategy::Sum,
            Self::Average => ArgumentCompositionStrategy::Average,
            Self::And => ArgumentCompositionStrategy::And,
            Self::Or => ArgumentCompositionStrategy::Or,
            Self::Intersection => ArgumentCompositionStrategy::Intersection,
            Self::Union => ArgumentCompositionStrategy::Union,
        })
    }
}

/// The unvalidated form of a [`DirectiveCompositionEntry`], as loaded from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectiveCompositionEntryConfig {
    /// The directive name in the supergraph, which is also its name in the feature.
    pub directive: String,
    /// The url of the feature defining the directive, used to find the directive in
    /// subgraphs that link it under another name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
    pub composition_strategy: DirectiveCompositionStrategy,
    #[serde(default)]
    pub propagation_strategy: PropagationStrategy,
    pub field_strategies: IndexMap<String, FieldPropagationStrategy>,
}

#[derive(Debug, Clone)]
pub(crate) struct EntryArgument {
    pub(crate) default_value: Option<Node<Value>>,
    pub(crate) strategy: FieldPropagationStrategy,
}

/// A directive known to be composable with its declared strategies.
#[derive(Debug, Clone)]
pub struct DirectiveCompositionEntry {
    directive: Name,
    feature: Option<Identity>,
    composition_strategy: DirectiveCompositionStrategy,
    propagation_strategy: PropagationStrategy,
    locations: Vec<DirectiveLocation>,
    arguments: IndexMap<Name, EntryArgument>,
}

fn invalid(message: String) -> FederationError {
    SingleFederationError::DirectiveCompositionInvalid { message }.into()
}

impl DirectiveCompositionEntry {
    /// Validates `config` against the directive definition of `schema`.
    pub fn new(
        schema: &Schema,
        config: &DirectiveCompositionEntryConfig,
    ) -> Result<Self, FederationError> {
        let directive = Name::new(&config.directive)?;
        let feature = config
            .feature
            .as_deref()
            .map(Url::from_str)
            .transpose()?
            .map(|url| url.identity);
        let Some(definition) = schema.directive_definition(&directive) else {
            return Err(invalid(format!(
                "Directive \"@{directive}\" cannot be composed: it is not defined"
            )));
        };

        if let Some(location) = definition.locations.iter().find(|location| {
            !matches!(
                location,
                DirectiveLocation::FieldDefinition | DirectiveLocation::Object
            )
        }) {
            return Err(invalid(format!(
                "Directive \"@{directive}\" cannot be composed: location {location} is not supported, only FIELD_DEFINITION and OBJECT are"
            )));
        }
        if definition.repeatable
            && config.composition_strategy != DirectiveCompositionStrategy::Repeat
        {
            return Err(invalid(format!(
                "Directive \"@{directive}\" is repeatable and cannot use the {} composition strategy",
                config.composition_strategy
            )));
        }
        if !definition.repeatable
            && config.composition_strategy == DirectiveCompositionStrategy::Repeat
        {
            return Err(invalid(format!(
                "Directive \"@{directive}\" is not repeatable and cannot use the REPEAT composition strategy"
            )));
        }
        if config.propagation_strategy == PropagationStrategy::InheritFromObject {
            if definition.repeatable {
                return Err(invalid(format!(
                    "Directive \"@{directive}\" is repeatable and cannot use the INHERIT_FROM_OBJECT propagation strategy"
                )));
            }
            if !definition
                .locations
                .contains(&DirectiveLocation::FieldDefinition)
            {
                return Err(invalid(format!(
                    "Directive \"@{directive}\" uses the INHERIT_FROM_OBJECT propagation strategy but cannot be applied to FIELD_DEFINITION"
                )));
            }
        }

        if let Some(unknown) = config
            .field_strategies
            .keys()
            .find(|name| definition.argument(name).is_none())
        {
            return Err(invalid(format!(
                "A field propagation strategy is given for \"@{directive}({unknown}:)\", which is not an argument of \"@{directive}\""
            )));
        }
        let mut arguments = IndexMap::with_capacity(definition.arguments.len());
        for (name, id) in &definition.arguments {
            let argument = schema.get(*id)?;
            let Some(strategy) = config.field_strategies.get(name.as_str()).copied() else {
                return Err(invalid(format!(
                    "Argument \"@{directive}({name}:)\" has no field propagation strategy"
                )));
            };
            let Some(ty) = &argument.ty else {
                return Err(invalid(format!(
                    "Argument \"@{directive}({name}:)\" has no type"
                )));
            };
            if !ty.is_non_null() {
                return Err(invalid(format!(
                    "Argument \"@{directive}({name}:)\" is optional (of type {ty}), which directive composition does not support"
                )));
            }
            check_strategy_type(schema, &directive, name, ty, strategy)?;
            arguments.insert(
                name.clone(),
                EntryArgument {
                    default_value: argument.default_value.clone(),
                    strategy,
                },
            );
        }

        let entry = Self {
            directive,
            feature,
            composition_strategy: config.composition_strategy,
            propagation_strategy: config.propagation_strategy,
            locations: definition.locations.clone(),
            arguments,
        };
        trace!(
            "Validated composition entry for \"@{}\" ({}, {})",
            entry.directive, entry.composition_strategy, entry.propagation_strategy
        );
        Ok(entry)
    }

    pub fn directive(&self) -> &Name {
        &self.directive
    }

    pub fn feature(&self) -> Option<&Identity> {
        self.feature.as_ref()
    }

    pub fn composition_strategy(&self) -> DirectiveCompositionStrategy {
        self.composition_strategy
    }

    pub fn propagation_strategy(&self) -> PropagationStrategy {
        self.propagation_strategy
    }

    pub fn applies_to(&self, location: DirectiveLocation) -> bool {
        self.locations.contains(&location)
    }

    /// The name of the directive in `schema`, or `None` if `schema` links other features but
    /// not the one defining the directive.
    pub fn name_in_schema(&self, schema: &Schema) -> Option<Name> {
        match (&self.feature, schema.links()) {
            (Some(identity), Some(links)) => {
                links.directive_name_in_schema(identity, &self.directive)
            }
            _ => Some(self.directive.clone()),
        }
    }

    /// Every declared argument of `application`, defaulted where omitted.
    fn materialize(&self, application: &Directive) -> Result<DirectiveArguments, FederationError> {
        self.arguments
            .iter()
            .map(|(name, argument)| {
                let value = application
                    .argument(name)
                    .or(argument.default_value.as_ref())
                    .cloned()
                    .ok_or_else(|| SingleFederationError::DirectiveMergeFailed {
                        message: format!(
                            "Application of \"@{}\" has no value for its required argument \"{name}\"",
                            application.name
                        ),
                    })?;
                Ok((name.clone(), value))
            })
            .collect()
    }

    fn agree_on_exact_arguments(&self, a: &DirectiveArguments, b: &DirectiveArguments) -> bool {
        self.arguments
            .iter()
            .filter(|(_, argument)| argument.strategy == FieldPropagationStrategy::Exact)
            .all(|(name, _)| match (a.get(name), b.get(name)) {
                (Some(a), Some(b)) => values_equal(a, b),
                (a, b) => a.is_none() && b.is_none(),
            })
    }

    /// Combines applications gathered for one element into the arguments of the applications
    /// the supergraph element receives.
    ///
    /// With `REPEAT`, every distinct application is kept. Otherwise applications are grouped in
    /// buckets agreeing on every `EXACT` argument, in order of first appearance, and each
    /// bucket is reduced to one application.
    pub fn process_field_directives(
        &self,
        applications: &[&Directive],
    ) -> Result<Vec<DirectiveArguments>, FederationError> {
        let applications: Vec<DirectiveArguments> = applications
            .iter()
            .map(|application| self.materialize(application))
            .collect::<Result<_, _>>()?;

        if self.composition_strategy == DirectiveCompositionStrategy::Repeat {
            let mut distinct: Vec<DirectiveArguments> = Vec::new();
            for application in applications {
                let is_duplicate = distinct.iter().any(|kept| {
                    kept.iter().all(|(name, value)| {
                        application
                            .get(name)
                            .is_some_and(|other| values_equal(value, other))
                    })
                });
                if !is_duplicate {
                    distinct.push(application);
                }
            }
            return Ok(distinct);
        }

        let mut buckets: Vec<Vec<DirectiveArguments>> = Vec::new();
        for application in applications {
            match buckets
                .iter_mut()
                .find(|bucket| self.agree_on_exact_arguments(&bucket[0], &application))
            {
                Some(bucket) => bucket.push(application),
                None => buckets.push(vec![application]),
            }
        }
        trace!(
            "Formed {} bucket(s) for \"@{}\"",
            buckets.len(),
            self.directive
        );
        buckets
            .into_iter()
            .map(|bucket| self.reduce_bucket(bucket))
            .collect()
    }

    fn reduce_bucket(
        &self,
        bucket: Vec<DirectiveArguments>,
    ) -> Result<DirectiveArguments, FederationError> {
        ensure!(
            !bucket.is_empty(),
            "Empty bucket for \"@{}\"",
            self.directive
        );
        let mut merged = DirectiveArguments::with_capacity(self.arguments.len());
        for (name, argument) in &self.arguments {
            let Some(reducer) = argument.strategy.reducer() else {
                if let Some(value) = bucket.first().and_then(|first| first.get(name)) {
                    merged.insert(name.clone(), value.clone());
                }
                continue;
            };
            let values: Vec<Value> = bucket
                .iter()
                .filter_map(|application| application.get(name))
                .map(|value| (**value).clone())
                .collect();
            if let Some(value) = reducer.merge_values(&values)? {
                merged.insert(name.clone(), Node::new(value));
            }
        }
        Ok(merged)
    }
}

fn check_strategy_type(
    schema: &Schema,
    directive: &Name,
    argument: &Name,
    ty: &Type,
    strategy: FieldPropagationStrategy,
) -> Result<(), FederationError> {
    let Some(reducer) = strategy.reducer() else {
        return Ok(());
    };
    reducer.is_type_supported(schema, ty).map_err(|supported| {
        invalid(format!(
            "Invalid field propagation strategy {strategy} for argument \"@{directive}({argument}:)\" of type {ty}; {strategy} only supports {supported}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use apollo_compiler::name;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use strum::IntoEnumIterator;

    use super::*;
    use crate::error::ErrorCode;
    use crate::schema::DirectiveTarget;

    fn config(
        directive: &str,
        composition_strategy: DirectiveCompositionStrategy,
        propagation_strategy: PropagationStrategy,
        field_strategies: &[(&str, FieldPropagationStrategy)],
    ) -> DirectiveCompositionEntryConfig {
        DirectiveCompositionEntryConfig {
            directive: directive.to_string(),
            feature: None,
            composition_strategy,
            propagation_strategy,
            field_strategies: field_strategies
                .iter()
                .map(|(name, strategy)| (name.to_string(), *strategy))
                .collect(),
        }
    }

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

    const DIRECTIVES: &str = r#"
        directive @cost(weight: Int!) on FIELD_DEFINITION | OBJECT
        directive @tagged(label: String!, value: Int! = 1, otherValue: Int!) on FIELD_DEFINITION
        directive @optional(weight: Int) on FIELD_DEFINITION
        directive @onInterface(weight: Int!) on FIELD_DEFINITION | INTERFACE
        directive @many(name: String!) repeatable on FIELD_DEFINITION | OBJECT
        directive @objectOnly(weight: Int!) on OBJECT
        directive @named(name: String!) on FIELD_DEFINITION
        type Query { a: Int }
    "#;

    fn schema() -> Schema {
        Schema::parse(DIRECTIVES, "schema.graphql").unwrap()
    }

    #[rstest]
    #[case::unsupported_location(
        config("onInterface", DirectiveCompositionStrategy::Collapse, PropagationStrategy::None, &[("weight", FieldPropagationStrategy::Max)]),
        "location INTERFACE is not supported"
    )]
    #[case::repeatable_collapse(
        config("many", DirectiveCompositionStrategy::Collapse, PropagationStrategy::None, &[("name", FieldPropagationStrategy::Exact)]),
        "is repeatable and cannot use the COLLAPSE composition strategy"
    )]
    #[case::repeatable_collapse_from_all(
        config("many", DirectiveCompositionStrategy::CollapseFromAll, PropagationStrategy::None, &[("name", FieldPropagationStrategy::Exact)]),
        "cannot use the COLLAPSE_FROM_ALL composition strategy"
    )]
    #[case::non_repeatable_repeat(
        config("cost", DirectiveCompositionStrategy::Repeat, PropagationStrategy::None, &[("weight", FieldPropagationStrategy::Max)]),
        "is not repeatable and cannot use the REPEAT composition strategy"
    )]
    #[case::repeatable_inherit(
        config("many", DirectiveCompositionStrategy::Repeat, PropagationStrategy::InheritFromObject, &[("name", FieldPropagationStrategy::Exact)]),
        "cannot use the INHERIT_FROM_OBJECT propagation strategy"
    )]
    #[case::inherit_without_field_location(
        config("objectOnly", DirectiveCompositionStrategy::Collapse, PropagationStrategy::InheritFromObject, &[("weight", FieldPropagationStrategy::Max)]),
        "cannot be applied to FIELD_DEFINITION"
    )]
    #[case::missing_field_strategy(
        config("tagged", DirectiveCompositionStrategy::Collapse, PropagationStrategy::None, &[("label", FieldPropagationStrategy::Exact), ("value", FieldPropagationStrategy::Sum)]),
        "\"@tagged(otherValue:)\" has no field propagation strategy"
    )]
    #[case::unknown_field_strategy(
        config("cost", DirectiveCompositionStrategy::Collapse, PropagationStrategy::None, &[("weight", FieldPropagationStrategy::Max), ("extra", FieldPropagationStrategy::Max)]),
        "\"@cost(extra:)\", which is not an argument"
    )]
    #[case::optional_argument(
        config("optional", DirectiveCompositionStrategy::Collapse, PropagationStrategy::None, &[("weight", FieldPropagationStrategy::Max)]),
        "\"@optional(weight:)\" is optional"
    )]
    #[case::wrong_strategy_type(
        config("named", DirectiveCompositionStrategy::Collapse, PropagationStrategy::None, &[("name", FieldPropagationStrategy::Max)]),
        "Invalid field propagation strategy MAX for argument \"@named(name:)\" of type String!; MAX only supports type(s) Int!"
    )]
    #[case::undefined_directive(
        config("nope", DirectiveCompositionStrategy::Collapse, PropagationStrategy::None, &[]),
        "it is not defined"
    )]
    fn rejects_invalid_entries(#[case] config: DirectiveCompositionEntryConfig, #[case] message: &str) {
        let err = DirectiveCompositionEntry::new(&schema(), &config).unwrap_err();
        assert_eq!(err.codes(), vec![ErrorCode::DirectiveCompositionInvalid]);
        let err = err.to_string();
        assert!(err.contains(message), "{err}");
    }

    #[test]
    fn accepts_valid_entries() {
        let schema = schema();
        let entry = DirectiveCompositionEntry::new(
            &schema,
            &config(
                "cost",
                DirectiveCompositionStrategy::CollapseFromAll,
                PropagationStrategy::InheritFromObject,
                &[("weight", FieldPropagationStrategy::Max)],
            ),
        )
        .unwrap();
        assert_eq!(entry.directive(), &name!("cost"));
        assert!(entry.applies_to(DirectiveLocation::Object));
        assert_eq!(entry.name_in_schema(&schema), Some(name!("cost")));

        DirectiveCompositionEntry::new(
            &schema,
            &config(
                "many",
                DirectiveCompositionStrategy::Repeat,
                PropagationStrategy::None,
                &[("name", FieldPropagationStrategy::Exact)],
            ),
        )
        .unwrap();
    }

    #[test]
    fn nine_applications_reduce_to_three_buckets() {
        let entry = DirectiveCompositionEntry::new(
            &schema(),
            &config(
                "tagged",
                DirectiveCompositionStrategy::Collapse,
                PropagationStrategy::None,
                &[
                    ("label", FieldPropagationStrategy::Exact),
                    ("value", FieldPropagationStrategy::Sum),
                    ("otherValue", FieldPropagationStrategy::Max),
                ],
            ),
        )
        .unwrap();
        let tagged = |label: &str, value: i32, other_value: i32| {
            application(
                "tagged",
                &[
                    ("label", Value::String(label.to_string())),
                    ("value", Value::from(value)),
                    ("otherValue", Value::from(other_value)),
                ],
            )
        };
        let applications = [
            tagged("a", 1, 5),
            tagged("b", 2, 1),
            tagged("a", 3, 2),
            tagged("c", 4, 9),
            tagged("b", 5, 3),
            tagged("c", 6, 4),
            tagged("a", 7, 8),
            tagged("b", 8, 7),
            tagged("c", 9, 6),
        ];
        let merged = entry
            .process_field_directives(&applications.iter().collect::<Vec<_>>())
            .unwrap();
        let summary: Vec<(String, String, String)> = merged
            .iter()
            .map(|arguments| {
                (
                    arguments["label"].to_string(),
                    arguments["value"].to_string(),
                    arguments["otherValue"].to_string(),
                )
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                ("\"a\"".to_string(), "11".to_string(), "8".to_string()),
                ("\"b\"".to_string(), "15".to_string(), "7".to_string()),
                ("\"c\"".to_string(), "19".to_string(), "9".to_string()),
            ]
        );
    }

    #[test]
    fn exact_arguments_compare_values_with_defaults() {
        let entry = DirectiveCompositionEntry::new(
            &schema(),
            &config(
                "tagged",
                DirectiveCompositionStrategy::Collapse,
                PropagationStrategy::None,
                &[
                    ("label", FieldPropagationStrategy::Sum),
                    ("value", FieldPropagationStrategy::Exact),
                    ("otherValue", FieldPropagationStrategy::Min),
                ],
            ),
        );
        // SUM needs an Int! argument.
        assert!(entry.is_err());

        let entry = DirectiveCompositionEntry::new(
            &schema(),
            &config(
                "tagged",
                DirectiveCompositionStrategy::Collapse,
                PropagationStrategy::None,
                &[
                    ("label", FieldPropagationStrategy::Exact),
                    ("value", FieldPropagationStrategy::Exact),
                    ("otherValue", FieldPropagationStrategy::Min),
                ],
            ),
        )
        .unwrap();
        let applications = [
            application(
                "tagged",
                &[
                    ("label", Value::String("a".to_string())),
                    ("otherValue", Value::from(4)),
                ],
            ),
            application(
                "tagged",
                &[
                    ("label", Value::String("a".to_string())),
                    ("value", Value::from(1)),
                    ("otherValue", Value::from(2)),
                ],
            ),
            application(
                "tagged",
                &[
                    ("label", Value::String("a".to_string())),
                    ("value", Value::from(2)),
                    ("otherValue", Value::from(3)),
                ],
            ),
        ];
        let merged = entry
            .process_field_directives(&applications.iter().collect::<Vec<_>>())
            .unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0]["value"].to_string(), "1");
        assert_eq!(merged[0]["otherValue"].to_string(), "2");
        assert_eq!(merged[1]["value"].to_string(), "2");
    }

    #[test]
    fn repeat_keeps_distinct_applications() {
        let entry = DirectiveCompositionEntry::new(
            &schema(),
            &config(
                "many",
                DirectiveCompositionStrategy::Repeat,
                PropagationStrategy::None,
                &[("name", FieldPropagationStrategy::Exact)],
            ),
        )
        .unwrap();
        let many = |name: &str| application("many", &[("name", Value::String(name.to_string()))]);
        let applications = [many("x"), many("y"), many("x")];
        let merged = entry
            .process_field_directives(&applications.iter().collect::<Vec<_>>())
            .unwrap();
        assert_eq!(
            merged
                .iter()
                .map(|arguments| arguments["name"].to_string())
                .collect::<Vec<_>>(),
            vec!["\"x\"", "\"y\""]
        );
    }

    #[test]
    fn strategies_load_from_configuration() {
        let config: DirectiveCompositionEntryConfig = serde_json::from_value(serde_json::json!({
            "directive": "cost",
            "feature": "https://specs.apollo.dev/cost/v0.1",
            "compositionStrategy": "COLLAPSE_FROM_ALL",
            "propagationStrategy": "INHERIT_FROM_OBJECT",
            "fieldStrategies": { "weight": "MAX" }
        }))
        .unwrap();
        assert_eq!(config.propagation_strategy, PropagationStrategy::InheritFromObject);
        let entry = DirectiveCompositionEntry::new(&schema(), &config).unwrap();
        assert_eq!(entry.feature(), Some(&Identity::apollo(name!("cost"))));

        assert_eq!(
            FieldPropagationStrategy::iter()
                .filter(|strategy| strategy.reducer().is_none())
                .collect::<Vec<_>>(),
            vec![FieldPropagationStrategy::Exact]
        );
        assert_eq!(DirectiveCompositionStrategy::CollapseFromAll.to_string(), "COLLAPSE_FROM_ALL");
    }
}
