use std::cmp::Ordering;

use apollo_compiler::Node;
use apollo_compiler::ast::Type;
use apollo_compiler::ast::Value;
use serde::Deserialize;
use serde::Serialize;

use crate::error::FederationError;
use crate::error::SingleFederationError;
use crate::schema::Schema;
use crate::schema::type_algebra::values_equal;
use crate::utils::dnf::dnf_conjunction;

/// How the values of one directive argument, collected across subgraphs, are merged into one.
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
pub enum ArgumentCompositionStrategy {
    Max,
    Min,
    Sum,
    Average,
    And,
    Or,
    Intersection,
    Union,
    NullableAnd,
    NullableMax,
    NullableUnion,
    DnfConjunction,
}

pub static MAX_STRATEGY: MaxArgumentCompositionStrategy = MaxArgumentCompositionStrategy;
pub static MIN_STRATEGY: MinArgumentCompositionStrategy = MinArgumentCompositionStrategy;
pub static SUM_STRATEGY: SumArgumentCompositionStrategy = SumArgumentCompositionStrategy;
pub static AVERAGE_STRATEGY: AverageArgumentCompositionStrategy =
    AverageArgumentCompositionStrategy;
pub static AND_STRATEGY: AndArgumentCompositionStrategy = AndArgumentCompositionStrategy;
pub static OR_STRATEGY: OrArgumentCompositionStrategy = OrArgumentCompositionStrategy;
pub static INTERSECTION_STRATEGY: IntersectionArgumentCompositionStrategy =
    IntersectionArgumentCompositionStrategy;
pub static UNION_STRATEGY: UnionArgumentCompositionStrategy = UnionArgumentCompositionStrategy;
pub static NULLABLE_AND_STRATEGY: NullableArgumentCompositionStrategy<
    AndArgumentCompositionStrategy,
> = NullableArgumentCompositionStrategy {
    name: "NULLABLE_AND",
    support: TypeSupport::Fixed {
        type_name: "Boolean",
        allow_nullable: true,
    },
    inner: &AND_STRATEGY,
};
pub static NULLABLE_MAX_STRATEGY: NullableArgumentCompositionStrategy<
    MaxArgumentCompositionStrategy,
> = NullableArgumentCompositionStrategy {
    name: "NULLABLE_MAX",
    support: TypeSupport::Fixed {
        type_name: "Int",
        allow_nullable: true,
    },
    inner: &MAX_STRATEGY,
};
pub static NULLABLE_UNION_STRATEGY: NullableArgumentCompositionStrategy<
    UnionArgumentCompositionStrategy,
> = NullableArgumentCompositionStrategy {
    name: "NULLABLE_UNION",
    support: TypeSupport::AnyList,
    inner: &UNION_STRATEGY,
};
pub static DNF_CONJUNCTION_STRATEGY: DnfConjunctionArgumentCompositionStrategy =
    DnfConjunctionArgumentCompositionStrategy;

impl ArgumentCompositionStrategy {
    pub fn composition(&self) -> &'static dyn ArgumentComposition {
        match self {
            Self::Max => &MAX_STRATEGY,
            Self::Min => &MIN_STRATEGY,
            Self::Sum => &SUM_STRATEGY,
            Self::Average => &AVERAGE_STRATEGY,
            Self::And => &AND_STRATEGY,
            Self::Or => &OR_STRATEGY,
            Self::Intersection => &INTERSECTION_STRATEGY,
            Self::Union => &UNION_STRATEGY,
            Self::NullableAnd => &NULLABLE_AND_STRATEGY,
            Self::NullableMax => &NULLABLE_MAX_STRATEGY,
            Self::NullableUnion => &NULLABLE_UNION_STRATEGY,
            Self::DnfConjunction => &DNF_CONJUNCTION_STRATEGY,
        }
    }

    pub fn name(&self) -> &'static str {
        self.composition().name()
    }

    pub fn is_type_supported(&self, schema: &Schema, ty: &Type) -> Result<(), String> {
        self.composition().is_type_supported(schema, ty)
    }

    pub fn merge_values(&self, values: &[Value]) -> Result<Option<Value>, FederationError> {
        self.composition().merge_values(values)
    }
}

//////////////////////////////////////////////////////////////////////////////
// Implementation of ArgumentCompositionStrategy's

/// Argument composition strategy for directives.
///
/// Determines how to compose the merged argument value from directive
/// applications across subgraph schemas.
pub trait ArgumentComposition: Sync {
    /// The name of the strategy, as used in configuration.
    fn name(&self) -> &'static str;
    /// Is the type `ty` supported by this strategy? On error, describes the supported types.
    fn is_type_supported(&self, schema: &Schema, ty: &Type) -> Result<(), String>;
    /// Merges the values, assuming their type passed `is_type_supported`.
    ///
    /// `None` means the merged value is undefined and the argument should be omitted.
    fn merge_values(&self, values: &[Value]) -> Result<Option<Value>, FederationError>;
}

/// The argument types a strategy accepts.
#[derive(Debug, Clone, Copy)]
pub enum TypeSupport {
    /// Exactly the named type, non-null (or also nullable).
    Fixed {
        type_name: &'static str,
        allow_nullable: bool,
    },
    /// `[T]!` for any `T`.
    NonNullList,
    /// `[T]` or `[T]!` for any `T`.
    AnyList,
    /// `[[T]!]!` for any `T`.
    NonNullNestedList,
}

impl TypeSupport {
    fn check(&self, ty: &Type) -> Result<(), String> {
        let supported = match self {
            Self::Fixed {
                type_name,
                allow_nullable,
            } => match ty {
                Type::NonNullNamed(name) => name == type_name,
                Type::Named(name) => *allow_nullable && name == type_name,
                _ => false,
            },
            Self::NonNullList => matches!(ty, Type::NonNullList(_)),
            Self::AnyList => ty.is_list(),
            Self::NonNullNestedList => {
                matches!(ty, Type::NonNullList(item) if matches!(**item, Type::NonNullList(_)))
            }
        };
        if supported {
            return Ok(());
        }
        Err(match self {
            Self::Fixed {
                type_name,
                allow_nullable: false,
            } => format!("type(s) {type_name}!"),
            Self::Fixed {
                type_name,
                allow_nullable: true,
            } => format!("type(s) {type_name}, {type_name}!"),
            Self::NonNullList => "non-nullable list types of any type".to_string(),
            Self::AnyList => "list types of any type".to_string(),
            Self::NonNullNestedList => {
                "non-nullable list types of non-nullable lists of any type".to_string()
            }
        })
    }
}

fn unexpected_value(strategy: &str, value: &Value) -> FederationError {
    SingleFederationError::DirectiveMergeFailed {
        message: format!("Unexpected value {value} for the {strategy} composition strategy"),
    }
    .into()
}

fn int_values(strategy: &str, values: &[Value]) -> Result<Vec<i32>, FederationError> {
    values
        .iter()
        .map(|value| match value {
            Value::Int(i) => i
                .try_to_i32()
                .map_err(|_| unexpected_value(strategy, value)),
            _ => Err(unexpected_value(strategy, value)),
        })
        .collect()
}

fn bool_values(strategy: &str, values: &[Value]) -> Result<Vec<bool>, FederationError> {
    values
        .iter()
        .map(|value| match value {
            Value::Boolean(b) => Ok(*b),
            _ => Err(unexpected_value(strategy, value)),
        })
        .collect()
}

fn list_values<'a>(
    strategy: &str,
    values: &'a [Value],
) -> Result<Vec<&'a [Node<Value>]>, FederationError> {
    values
        .iter()
        .map(|value| {
            value
                .as_list()
                .ok_or_else(|| unexpected_value(strategy, value))
        })
        .collect()
}

// MAX
pub struct MaxArgumentCompositionStrategy;

impl ArgumentComposition for MaxArgumentCompositionStrategy {
    fn name(&self) -> &'static str {
        "MAX"
    }

    fn is_type_supported(&self, _schema: &Schema, ty: &Type) -> Result<(), String> {
        TypeSupport::Fixed {
            type_name: "Int",
            allow_nullable: false,
        }
        .check(ty)
    }

    fn merge_values(&self, values: &[Value]) -> Result<Option<Value>, FederationError> {
        Ok(int_values(self.name(), values)?
            .into_iter()
            .max()
            .map(Value::from))
    }
}

// MIN
pub struct MinArgumentCompositionStrategy;

impl ArgumentComposition for MinArgumentCompositionStrategy {
    fn name(&self) -> &'static str {
        "MIN"
    }

    fn is_type_supported(&self, _schema: &Schema, ty: &Type) -> Result<(), String> {
        TypeSupport::Fixed {
            type_name: "Int",
            allow_nullable: false,
        }
        .check(ty)
    }

    fn merge_values(&self, values: &[Value]) -> Result<Option<Value>, FederationError> {
        Ok(int_values(self.name(), values)?
            .into_iter()
            .min()
            .map(Value::from))
    }
}

// SUM
pub struct SumArgumentCompositionStrategy;

impl ArgumentComposition for SumArgumentCompositionStrategy {
    fn name(&self) -> &'static str {
        "SUM"
    }

    fn is_type_supported(&self, _schema: &Schema, ty: &Type) -> Result<(), String> {
        TypeSupport::Fixed {
            type_name: "Int",
            allow_nullable: false,
        }
        .check(ty)
    }

    fn merge_values(&self, values: &[Value]) -> Result<Option<Value>, FederationError> {
        let values = int_values(self.name(), values)?;
        if values.is_empty() {
            return Ok(None);
        }
        let sum: i64 = values.iter().map(|v| i64::from(*v)).sum();
        let sum = i32::try_from(sum).map_err(|_| SingleFederationError::DirectiveMergeFailed {
            message: format!("The sum of {values:?} overflows the Int type"),
        })?;
        Ok(Some(Value::from(sum)))
    }
}

// AVERAGE
pub struct AverageArgumentCompositionStrategy;

impl ArgumentComposition for AverageArgumentCompositionStrategy {
    fn name(&self) -> &'static str {
        "AVERAGE"
    }

    fn is_type_supported(&self, _schema: &Schema, ty: &Type) -> Result<(), String> {
        TypeSupport::Fixed {
            type_name: "Int",
            allow_nullable: false,
        }
        .check(ty)
    }

    /// The arithmetic mean, rounded half away from zero.
    fn merge_values(&self, values: &[Value]) -> Result<Option<Value>, FederationError> {
        let values = int_values(self.name(), values)?;
        if values.is_empty() {
            return Ok(None);
        }
        let sum: i64 = values.iter().map(|v| i64::from(*v)).sum();
        let average = (sum as f64 / values.len() as f64).round();
        // The mean of `i32`s is within `i32` bounds.
        Ok(Some(Value::from(average as i32)))
    }
}

// AND
pub struct AndArgumentCompositionStrategy;

impl ArgumentComposition for AndArgumentCompositionStrategy {
    fn name(&self) -> &'static str {
        "AND"
    }

    fn is_type_supported(&self, _schema: &Schema, ty: &Type) -> Result<(), String> {
        TypeSupport::Fixed {
            type_name: "Boolean",
            allow_nullable: false,
        }
        .check(ty)
    }

    fn merge_values(&self, values: &[Value]) -> Result<Option<Value>, FederationError> {
        let values = bool_values(self.name(), values)?;
        Ok((!values.is_empty()).then(|| Value::Boolean(values.into_iter().all(|b| b))))
    }
}

// OR
pub struct OrArgumentCompositionStrategy;

impl ArgumentComposition for OrArgumentCompositionStrategy {
    fn name(&self) -> &'static str {
        "OR"
    }

    fn is_type_supported(&self, _schema: &Schema, ty: &Type) -> Result<(), String> {
        TypeSupport::Fixed {
            type_name: "Boolean",
            allow_nullable: false,
        }
        .check(ty)
    }

    fn merge_values(&self, values: &[Value]) -> Result<Option<Value>, FederationError> {
        let values = bool_values(self.name(), values)?;
        Ok((!values.is_empty()).then(|| Value::Boolean(values.into_iter().any(|b| b))))
    }
}

// INTERSECTION
pub struct IntersectionArgumentCompositionStrategy;

impl ArgumentComposition for IntersectionArgumentCompositionStrategy {
    fn name(&self) -> &'static str {
        "INTERSECTION"
    }

    fn is_type_supported(&self, _schema: &Schema, ty: &Type) -> Result<(), String> {
        TypeSupport::NonNullList.check(ty)
    }

    /// Keeps the items of the first list present in every other list, in their first order.
    fn merge_values(&self, values: &[Value]) -> Result<Option<Value>, FederationError> {
        let lists = list_values(self.name(), values)?;
        let Some((first, rest)) = lists.split_first() else {
            return Ok(None);
        };
        let mut result: Vec<Node<Value>> = Vec::with_capacity(first.len());
        for item in first.iter() {
            let in_all = rest
                .iter()
                .all(|list| list.iter().any(|other| values_equal(item, other)));
            if in_all && !result.iter().any(|kept| values_equal(kept, item)) {
                result.push(item.clone());
            }
        }
        Ok(Some(Value::List(result)))
    }
}

// UNION
pub struct UnionArgumentCompositionStrategy;

impl ArgumentComposition for UnionArgumentCompositionStrategy {
    fn name(&self) -> &'static str {
        "UNION"
    }

    fn is_type_supported(&self, _schema: &Schema, ty: &Type) -> Result<(), String> {
        TypeSupport::NonNullList.check(ty)
    }

    /// Every distinct item, in the order it is first seen.
    fn merge_values(&self, values: &[Value]) -> Result<Option<Value>, FederationError> {
        let lists = list_values(self.name(), values)?;
        if lists.is_empty() {
            return Ok(None);
        }
        let mut result: Vec<Node<Value>> = Vec::new();
        for item in lists.into_iter().flatten() {
            if !result.iter().any(|kept| values_equal(kept, item)) {
                result.push(item.clone());
            }
        }
        Ok(Some(Value::List(result)))
    }
}

// NULLABLE_AND, NULLABLE_MAX, NULLABLE_UNION
/// Wraps a strategy so that `null` values are ignored: the merged value is undefined if only
/// `null`s are given.
pub struct NullableArgumentCompositionStrategy<S: 'static> {
    name: &'static str,
    support: TypeSupport,
    inner: &'static S,
}

impl<S: ArgumentComposition> ArgumentComposition for NullableArgumentCompositionStrategy<S> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_type_supported(&self, _schema: &Schema, ty: &Type) -> Result<(), String> {
        self.support.check(ty)
    }

    fn merge_values(&self, values: &[Value]) -> Result<Option<Value>, FederationError> {
        let values: Vec<Value> = values
            .iter()
            .filter(|value| !value.is_null())
            .cloned()
            .collect();
        if values.is_empty() {
            return Ok(None);
        }
        self.inner.merge_values(&values)
    }
}

// DNF_CONJUNCTION
pub struct DnfConjunctionArgumentCompositionStrategy;

/// A value ordered by its serialization, so that conditions can be canonicalized.
#[derive(Clone)]
struct DnfAtom {
    key: String,
    value: Node<Value>,
}

impl PartialEq for DnfAtom {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for DnfAtom {}

impl PartialOrd for DnfAtom {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DnfAtom {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl ArgumentComposition for DnfConjunctionArgumentCompositionStrategy {
    fn name(&self) -> &'static str {
        "DNF_CONJUNCTION"
    }

    fn is_type_supported(&self, _schema: &Schema, ty: &Type) -> Result<(), String> {
        TypeSupport::NonNullNestedList.check(ty)
    }

    fn merge_values(&self, values: &[Value]) -> Result<Option<Value>, FederationError> {
        if values.is_empty() {
            return Ok(None);
        }
        let operands = values
            .iter()
            .map(|value| {
                let clauses = value
                    .as_list()
                    .ok_or_else(|| unexpected_value(self.name(), value))?;
                clauses
                    .iter()
                    .map(|clause| {
                        let atoms = clause
                            .as_list()
                            .ok_or_else(|| unexpected_value(self.name(), clause))?;
                        Ok(atoms
                            .iter()
                            .map(|atom| DnfAtom {
                                key: atom.to_string(),
                                value: atom.clone(),
                            })
                            .collect::<Vec<_>>())
                    })
                    .collect::<Result<Vec<_>, FederationError>>()
            })
            .collect::<Result<Vec<_>, FederationError>>()?;
        let result = dnf_conjunction(&operands)
            .into_iter()
            .map(|clause| {
                Node::new(Value::List(
                    clause.into_iter().map(|atom| atom.value).collect(),
                ))
            })
            .collect();
        Ok(Some(Value::List(result)))
    }
}
