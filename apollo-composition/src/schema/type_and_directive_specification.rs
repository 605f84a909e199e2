//! Declarative descriptions of the types and directives a feature needs in a schema.
//!
//! `check_or_add` makes sure a schema has a definition matching the specification: an existing
//! definition is checked for compatibility, and a missing one is added.
use std::fmt;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast::DirectiveLocation;
use apollo_compiler::ast::Type;
use apollo_compiler::ast::Value;
use indexmap::IndexMap;
use itertools::Itertools;
use tracing::trace;

use crate::bail;
use crate::error::FederationError;
use crate::error::MultipleFederationErrors;
use crate::error::SingleFederationError;
use crate::schema::DirectiveDefinition;
use crate::schema::DirectiveDefinitionId;
use crate::schema::DirectiveTarget;
use crate::schema::NamedType;
use crate::schema::Schema;
use crate::schema::TypeKind;
use crate::schema::TypedElement;
use crate::schema::argument_composition_strategies::ArgumentCompositionStrategy;
use crate::schema::type_algebra::same_type;
use crate::schema::type_algebra::values_equal;

//////////////////////////////////////////////////////////////////////////////
// Argument Specifications

#[derive(Debug, Clone)]
pub struct ArgumentSpecification {
    pub name: Name,
    pub ty: Type,
    pub default_value: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct DirectiveArgumentSpecification {
    pub base_spec: ArgumentSpecification,
    pub composition_strategy: Option<ArgumentCompositionStrategy>,
}

//////////////////////////////////////////////////////////////////////////////
// Type Specifications

pub trait TypeAndDirectiveSpecification {
    /// Returns the spec name (not the name in the schema).
    fn name(&self) -> &Name;

    /// Checks that the schema has a compatible definition under `name_in_schema` (the spec name
    /// by default), or adds one. With `as_built_in`, an added definition is a built-in one.
    fn check_or_add(
        &self,
        schema: &mut Schema,
        name_in_schema: Option<&Name>,
        as_built_in: bool,
    ) -> Result<(), FederationError>;
}

fn with_scope<T>(
    schema: &mut Schema,
    as_built_in: bool,
    f: impl FnOnce(&mut Schema) -> Result<T, FederationError>,
) -> Result<T, FederationError> {
    if as_built_in {
        schema.with_built_in_modification(f)
    } else {
        f(schema)
    }
}

fn add_type(
    schema: &mut Schema,
    name: Name,
    kind: TypeKind,
    as_built_in: bool,
) -> Result<crate::schema::TypeId, FederationError> {
    if as_built_in {
        schema.add_built_in_type(name, kind)
    } else {
        schema.add_type(name, kind)
    }
}

#[derive(Debug, Clone)]
pub struct ScalarTypeSpecification {
    pub name: Name,
}

impl TypeAndDirectiveSpecification for ScalarTypeSpecification {
    fn name(&self) -> &Name {
        &self.name
    }

    fn check_or_add(
        &self,
        schema: &mut Schema,
        name_in_schema: Option<&Name>,
        as_built_in: bool,
    ) -> Result<(), FederationError> {
        let actual_name = name_in_schema.unwrap_or(&self.name);
        if let Some(existing) = schema.get_type(actual_name) {
            // Redundant scalar specifications are fine.
            return ensure_expected_type_kind(TypeKind::Scalar, existing);
        }
        with_scope(schema, as_built_in, |schema| {
            add_type(schema, actual_name.clone(), TypeKind::Scalar, as_built_in).map(drop)
        })
    }
}

#[derive(Debug, Clone)]
pub struct EnumValueSpecification {
    pub name: Name,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EnumTypeSpecification {
    pub name: Name,
    pub values: Vec<EnumValueSpecification>,
}

impl TypeAndDirectiveSpecification for EnumTypeSpecification {
    fn name(&self) -> &Name {
        &self.name
    }

    fn check_or_add(
        &self,
        schema: &mut Schema,
        name_in_schema: Option<&Name>,
        as_built_in: bool,
    ) -> Result<(), FederationError> {
        let actual_name = name_in_schema.unwrap_or(&self.name);
        if let Some(existing) = schema.get_type(actual_name) {
            ensure_expected_type_kind(TypeKind::Enum, existing)?;
            let existing_values: Vec<&Name> = existing
                .enum_values()
                .map(|(name, _)| name)
                .sorted()
                .collect();
            let expected_values: Vec<&Name> =
                self.values.iter().map(|value| &value.name).sorted().collect();
            if existing_values != expected_values {
                return Err(SingleFederationError::TypeDefinitionInvalid {
                    message: format!(
                        r#"Invalid definition for type "{actual_name}": expected values [{}] but found [{}]."#,
                        expected_values.iter().join(", "),
                        existing_values.iter().join(", "),
                    ),
                }
                .into());
            }
            return Ok(());
        }

        with_scope(schema, as_built_in, |schema| {
            let ty = add_type(schema, actual_name.clone(), TypeKind::Enum, as_built_in)?;
            for value in &self.values {
                let id = schema.add_enum_value(ty, value.name.clone())?;
                if let Some(description) = &value.description {
                    schema.set_description(
                        DirectiveTarget::EnumValue(id),
                        Some(Node::from(description.as_str())),
                    )?;
                }
            }
            Ok(())
        })
    }
}

//////////////////////////////////////////////////////////////////////////////
// DirectiveSpecification

/// Merges the values of directive arguments with the strategies declared by a
/// [`DirectiveSpecification`].
#[derive(Debug, Clone)]
pub struct ArgumentMerger {
    strategies: IndexMap<Name, ArgumentCompositionStrategy>,
}

impl ArgumentMerger {
    /// `None` means the merged value is undefined and the argument should be omitted.
    pub fn merge(&self, arg_name: &str, values: &[Value]) -> Result<Option<Value>, FederationError> {
        let Some(strategy) = self.strategies.get(arg_name) else {
            bail!("Should have a strategy for {arg_name}");
        };
        strategy.merge_values(values)
    }
}

impl fmt::Display for ArgumentMerger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.strategies.is_empty() {
            return f.write_str("<none>");
        }
        write!(
            f,
            "{{ {} }}",
            self.strategies
                .iter()
                .format_with(", ", |(name, strategy), f| f(&format_args!(
                    "{name}: {}",
                    strategy.name()
                )))
        )
    }
}

#[derive(Debug, Clone)]
pub struct DirectiveSpecification {
    pub name: Name,
    args: Vec<DirectiveArgumentSpecification>,
    repeatable: bool,
    locations: Vec<DirectiveLocation>,
}

impl DirectiveSpecification {
    /// Creates a directive specification. Arguments either all declare a composition strategy
    /// or none does, and a repeatable directive cannot declare any.
    pub fn new(
        name: Name,
        args: &[DirectiveArgumentSpecification],
        repeatable: bool,
        locations: &[DirectiveLocation],
    ) -> Result<Self, FederationError> {
        let with_strategy = args
            .iter()
            .filter(|arg| arg.composition_strategy.is_some())
            .count();
        if with_strategy > 0 {
            if repeatable {
                return Err(SingleFederationError::DirectiveDefinitionInvalid {
                    message: format!(
                        "Invalid directive specification for @{name}: @{name} is repeatable and should not define composition strategy for its arguments"
                    ),
                }
                .into());
            }
            if with_strategy != args.len() {
                return Err(SingleFederationError::DirectiveDefinitionInvalid {
                    message: format!(
                        "Invalid directive specification for @{name}: not all arguments define a composition strategy"
                    ),
                }
                .into());
            }
        }
        Ok(Self {
            name,
            args: args.to_vec(),
            repeatable,
            locations: locations.to_vec(),
        })
    }

    pub fn args(&self) -> &[DirectiveArgumentSpecification] {
        &self.args
    }

    pub fn repeatable(&self) -> bool {
        self.repeatable
    }

    pub fn locations(&self) -> &[DirectiveLocation] {
        &self.locations
    }

    /// The merger for the arguments of this directive, if they declare composition strategies.
    ///
    /// Fails if a strategy does not support the type of its argument.
    pub fn argument_merger(&self, schema: &Schema) -> Result<Option<ArgumentMerger>, FederationError> {
        let mut strategies = IndexMap::with_capacity(self.args.len());
        for arg in &self.args {
            let Some(strategy) = arg.composition_strategy else {
                continue;
            };
            let arg_name = &arg.base_spec.name;
            let arg_type = &arg.base_spec.ty;
            strategy
                .is_type_supported(schema, arg_type)
                .map_err(|support_msg| {
                    let strategy_name = strategy.name();
                    SingleFederationError::DirectiveDefinitionInvalid {
                        message: format!(
                            "Invalid composition strategy {strategy_name} for argument @{}({arg_name}:) of type {arg_type}; {strategy_name} only supports {support_msg}",
                            self.name
                        ),
                    }
                })?;
            strategies.insert(arg_name.clone(), strategy);
        }
        if strategies.is_empty() {
            return Ok(None);
        }
        let merger = ArgumentMerger { strategies };
        trace!("Created argument merger for directive @{}: {merger}", self.name);
        Ok(Some(merger))
    }
}

impl TypeAndDirectiveSpecification for DirectiveSpecification {
    fn name(&self) -> &Name {
        &self.name
    }

    fn check_or_add(
        &self,
        schema: &mut Schema,
        name_in_schema: Option<&Name>,
        as_built_in: bool,
    ) -> Result<(), FederationError> {
        let actual_name = name_in_schema.unwrap_or(&self.name);
        if let Some(existing) = schema.directive_definition(actual_name) {
            return ensure_same_directive_structure(
                schema,
                existing,
                &self.args,
                self.repeatable,
                &self.locations,
            );
        }

        with_scope(schema, as_built_in, |schema| {
            let id: DirectiveDefinitionId = if as_built_in {
                schema.add_built_in_directive_definition(
                    actual_name.clone(),
                    self.repeatable,
                    self.locations.clone(),
                )?
            } else {
                schema.add_directive_definition(
                    actual_name.clone(),
                    self.repeatable,
                    self.locations.clone(),
                )?
            };
            for arg in &self.args {
                let spec = &arg.base_spec;
                let argument = schema.add_directive_argument(id, spec.name.clone(), spec.ty.clone())?;
                if let Some(default_value) = &spec.default_value {
                    schema.set_default_value(
                        TypedElement::Argument(argument),
                        Some(Node::new(default_value.clone())),
                    )?;
                }
            }
            Ok(())
        })
    }
}

//////////////////////////////////////////////////////////////////////////////
// Helper functions for TypeSpecification implementations
// Argument naming conventions:
// - `existing` or `actual`: the existing definition as defined in the schema.
// - `expected`: the expected definition from the TypeAndDirectiveSpecification.

fn ensure_expected_type_kind(expected: TypeKind, actual: &NamedType) -> Result<(), FederationError> {
    let actual_kind = actual.type_kind();
    if expected == actual_kind {
        Ok(())
    } else {
        let actual_type_name = &actual.name;
        Err(SingleFederationError::TypeDefinitionInvalid {
            message: format!(
                "Invalid definition for type {actual_type_name}: {actual_type_name} should be a {expected} but is defined as a {actual_kind}"
            ),
        }
        .into())
    }
}

/// Note: Non-null/list wrappers are ignored.
fn is_custom_scalar(ty: &Type, schema: &Schema) -> bool {
    schema
        .get_type(ty.inner_named_type())
        .is_some_and(|ty| ty.type_kind() == TypeKind::Scalar && !ty.is_built_in)
}

fn is_valid_input_type_redefinition(expected_type: &Type, actual_type: &Type, schema: &Schema) -> bool {
    // A custom scalar accepts values of any shape, so code consuming it validates values
    // manually anyway: it can be redefined to any type that isn't another custom scalar.
    match (expected_type, actual_type) {
        (Type::List(expected), Type::List(actual))
        | (Type::NonNullList(expected), Type::NonNullList(actual)) => {
            is_valid_input_type_redefinition(expected, actual, schema)
        }
        (Type::List(_) | Type::NonNullList(_), _) => false,
        (Type::NonNullNamed(_), actual) if !actual.is_non_null() => false,
        (Type::Named(_), actual) if actual.is_non_null() => false,
        (expected, actual) => {
            is_custom_scalar(expected, schema) && !is_custom_scalar(actual, schema)
        }
    }
}

fn default_value_message(value: Option<&Value>) -> String {
    match value {
        None => "no default value".to_string(),
        Some(value) => format!("default value {value}"),
    }
}

fn ensure_same_arguments(
    schema: &Schema,
    expected: &[DirectiveArgumentSpecification],
    actual: &DirectiveDefinition,
    what: &str,
) -> Vec<SingleFederationError> {
    let generate_error = |message: String| SingleFederationError::DirectiveDefinitionInvalid { message };
    let mut errors = vec![];

    // Expected arguments must be declared, unless optional.
    for expected_arg in expected.iter().map(|arg| &arg.base_spec) {
        let Some(actual_arg) = actual
            .argument(&expected_arg.name)
            .and_then(|id| schema.try_get(id))
        else {
            // Not declaring an optional argument is ok: it can't be given a non-default value.
            if expected_arg.ty.is_non_null() && expected_arg.default_value.is_none() {
                errors.push(generate_error(format!(
                    r#"Invalid definition for {what}: missing required argument "{}""#,
                    expected_arg.name
                )));
            }
            continue;
        };

        let arg_name = &expected_arg.name;
        let expected_type = &expected_arg.ty;
        let Some(mut actual_type) = actual_arg.ty.clone() else {
            errors.push(generate_error(format!(
                r#"Invalid definition for {what}: argument "{arg_name}" should have type "{expected_type}" but its type was removed"#
            )));
            continue;
        };
        // Redefining an optional argument as mandatory is allowed.
        if actual_type.is_non_null() && !expected_type.is_non_null() {
            actual_type = actual_type.nullable();
        }
        if !same_type(expected_type, &actual_type)
            && !is_valid_input_type_redefinition(expected_type, &actual_type, schema)
        {
            errors.push(generate_error(format!(
                r#"Invalid definition for {what}: argument "{arg_name}" should have type "{expected_type}" but found type "{actual_type}""#
            )));
        } else if !actual_arg.ty.as_ref().is_some_and(|ty| ty.is_non_null()) {
            let expected_default = expected_arg.default_value.as_ref();
            let actual_default = actual_arg.default_value.as_deref();
            let same_default = match (expected_default, actual_default) {
                (Some(expected), Some(actual)) => values_equal(expected, actual),
                (None, None) => true,
                _ => false,
            };
            if !same_default {
                errors.push(generate_error(format!(
                    r#"Invalid definition for {what}: argument "{arg_name}" should have {} but found {}"#,
                    default_value_message(expected_default),
                    default_value_message(actual_default),
                )));
            }
        }
    }

    // Actual arguments must all be expected.
    for actual_name in actual.arguments.keys() {
        if !expected.iter().any(|arg| arg.base_spec.name == *actual_name) {
            errors.push(generate_error(format!(
                r#"Invalid definition for {what}: unknown/unsupported argument "{actual_name}""#
            )));
        }
    }

    errors
}

/// The existing definition must be compatible with the expected one: it may narrow the
/// locations and drop repeatability, but never widen them.
fn ensure_same_directive_structure(
    schema: &Schema,
    existing_directive: &DirectiveDefinition,
    args: &[DirectiveArgumentSpecification],
    repeatable: bool,
    locations: &[DirectiveLocation],
) -> Result<(), FederationError> {
    let directive_name = format!("@{}", existing_directive.name);
    let mut errors = ensure_same_arguments(
        schema,
        args,
        existing_directive,
        &format!(r#"directive "{directive_name}""#),
    );

    if existing_directive.repeatable && !repeatable {
        errors.push(SingleFederationError::DirectiveDefinitionInvalid {
            message: format!(
                r#"Invalid definition for directive "{directive_name}": "{directive_name}" should not be repeatable"#
            ),
        });
    }

    if !existing_directive
        .locations
        .iter()
        .all(|loc| locations.contains(loc))
    {
        errors.push(SingleFederationError::DirectiveDefinitionInvalid {
            message: format!(
                r#"Invalid definition for directive "{directive_name}": "{directive_name}" should have locations {}, but found (non-subset) {}"#,
                locations.iter().join(", "),
                existing_directive.locations.iter().join(", "),
            ),
        });
    }
    MultipleFederationErrors::from_iter(errors)
        .into_result()
        .map_err(FederationError::from)
}

#[cfg(test)]
mod tests {
    use apollo_compiler::name;
    use apollo_compiler::ty;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::ErrorCode;

    fn arg(
        name: Name,
        ty: Type,
        composition_strategy: Option<ArgumentCompositionStrategy>,
    ) -> DirectiveArgumentSpecification {
        DirectiveArgumentSpecification {
            base_spec: ArgumentSpecification {
                name,
                ty,
                default_value: None,
            },
            composition_strategy,
        }
    }

    fn cost_spec() -> DirectiveSpecification {
        DirectiveSpecification::new(
            name!("cost"),
            &[arg(
                name!("weight"),
                ty!(Int!),
                Some(ArgumentCompositionStrategy::Max),
            )],
            false,
            &[DirectiveLocation::FieldDefinition, DirectiveLocation::Object],
        )
        .unwrap()
    }

    #[test]
    fn must_have_a_merge_strategy_on_all_arguments_if_any() {
        let err = DirectiveSpecification::new(
            name!("foo"),
            &[
                arg(name!("v1"), ty!(Int!), Some(ArgumentCompositionStrategy::Max)),
                arg(name!("v2"), ty!(Int!), None),
            ],
            false,
            &[DirectiveLocation::Object],
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid directive specification for @foo: not all arguments define a composition strategy"
        );
    }

    #[test]
    fn must_not_be_repeatable_if_it_has_a_merge_strategy() {
        let err = DirectiveSpecification::new(
            name!("foo"),
            &[arg(name!("v"), ty!(Int!), Some(ArgumentCompositionStrategy::Max))],
            true,
            &[DirectiveLocation::Object],
        )
        .unwrap_err();
        assert_eq!(err.codes(), vec![ErrorCode::DirectiveDefinitionInvalid]);
    }

    #[test]
    fn argument_merger_checks_strategy_types() {
        let schema = Schema::new();
        let merger = cost_spec().argument_merger(&schema).unwrap().unwrap();
        assert_eq!(merger.to_string(), "{ weight: MAX }");
        assert_eq!(
            merger
                .merge("weight", &[Value::from(3), Value::from(7)])
                .unwrap(),
            Some(Value::from(7))
        );

        let invalid = DirectiveSpecification::new(
            name!("foo"),
            &[arg(name!("v"), ty!(String!), Some(ArgumentCompositionStrategy::Sum))],
            false,
            &[DirectiveLocation::Object],
        )
        .unwrap();
        let err = invalid.argument_merger(&schema).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid composition strategy SUM for argument @foo(v:) of type String!; SUM only supports type(s) Int!"
        );
    }

    #[test]
    fn adds_missing_directive_definitions() {
        let mut schema = Schema::new();
        cost_spec().check_or_add(&mut schema, None, false).unwrap();
        let definition = schema.directive_definition("cost").unwrap();
        assert!(!definition.is_built_in);
        assert_eq!(definition.arguments.len(), 1);
        // Idempotent.
        cost_spec().check_or_add(&mut schema, None, false).unwrap();

        cost_spec()
            .check_or_add(&mut schema, Some(&name!("myCost")), true)
            .unwrap();
        assert!(schema.directive_definition("myCost").unwrap().is_built_in);
    }

    #[test]
    fn accepts_narrower_existing_definitions() {
        let mut schema = Schema::parse(
            "directive @cost(weight: Int!) on FIELD_DEFINITION
             type Query { x: Int }",
            "schema.graphql",
        )
        .unwrap();
        cost_spec().check_or_add(&mut schema, None, false).unwrap();
    }

    #[test]
    fn rejects_wider_existing_definitions() {
        let mut schema = Schema::parse(
            "directive @cost(weight: String!, extra: Int) repeatable on FIELD_DEFINITION | SCALAR
             type Query { x: Int }",
            "schema.graphql",
        )
        .unwrap();
        let err = cost_spec().check_or_add(&mut schema, None, false).unwrap_err();
        assert_eq!(err.errors().len(), 4, "{err}");
        assert!(
            err.codes()
                .iter()
                .all(|code| *code == ErrorCode::DirectiveDefinitionInvalid)
        );
    }

    #[test]
    fn checks_enum_values() {
        let spec = EnumTypeSpecification {
            name: name!("Purpose"),
            values: vec![
                EnumValueSpecification {
                    name: name!("SECURITY"),
                    description: Some("Security purpose".to_string()),
                },
                EnumValueSpecification {
                    name: name!("EXECUTION"),
                    description: None,
                },
            ],
        };
        let mut schema = Schema::new();
        spec.check_or_add(&mut schema, Some(&name!("link__Purpose")), false)
            .unwrap();
        spec.check_or_add(&mut schema, Some(&name!("link__Purpose")), false)
            .unwrap();

        let mut schema = Schema::parse("enum Purpose { SECURITY }", "schema.graphql").unwrap();
        let err = spec.check_or_add(&mut schema, None, false).unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"Invalid definition for type "Purpose": expected values [EXECUTION, SECURITY] but found [SECURITY]."#
        );

        let scalar = ScalarTypeSpecification { name: name!("Purpose") };
        assert_eq!(
            scalar.check_or_add(&mut schema, None, false).unwrap_err().codes(),
            vec![ErrorCode::TypeDefinitionInvalid]
        );
    }
}
