use std::fmt;

use apollo_compiler::Name;

use super::definitions::SchemaRootKind;

/// A printable path to a schema element, e.g. `Query.user(id:)` or `@key(fields:)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SchemaCoordinate {
    Schema,
    SchemaRoot(SchemaRootKind),
    Type(Name),
    Field {
        ty: Name,
        field: Name,
    },
    FieldArgument {
        ty: Name,
        field: Name,
        argument: Name,
    },
    InputField {
        ty: Name,
        field: Name,
    },
    EnumValue {
        ty: Name,
        value: Name,
    },
    Directive(Name),
    DirectiveArgument {
        directive: Name,
        argument: Name,
    },
}

impl fmt::Display for SchemaCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema => f.write_str("schema"),
            Self::SchemaRoot(kind) => write!(f, "schema.{kind}"),
            Self::Type(name) => write!(f, "{name}"),
            Self::Field { ty, field } | Self::InputField { ty, field } => {
                write!(f, "{ty}.{field}")
            }
            Self::FieldArgument {
                ty,
                field,
                argument,
            } => write!(f, "{ty}.{field}({argument}:)"),
            Self::EnumValue { ty, value } => write!(f, "{ty}.{value}"),
            Self::Directive(name) => write!(f, "@{name}"),
            Self::DirectiveArgument {
                directive,
                argument,
            } => write!(f, "@{directive}({argument}:)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use apollo_compiler::name;

    use super::*;

    #[test]
    fn displays_coordinates() {
        assert_eq!(
            SchemaCoordinate::FieldArgument {
                ty: name!("Query"),
                field: name!("user"),
                argument: name!("id"),
            }
            .to_string(),
            "Query.user(id:)"
        );
        assert_eq!(
            SchemaCoordinate::DirectiveArgument {
                directive: name!("cost"),
                argument: name!("weight"),
            }
            .to_string(),
            "@cost(weight:)"
        );
        assert_eq!(
            SchemaCoordinate::SchemaRoot(SchemaRootKind::Query).to_string(),
            "schema.query"
        );
    }
}
