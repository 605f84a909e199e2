//! Structural comparisons of type references and values.
use apollo_compiler::ast::Type;
use apollo_compiler::ast::Value;

use super::Schema;
use super::TypeDefinitionKind;
use super::TypeKind;

/// Whether two type references have the same wrappers around the same named type.
pub fn same_type(a: &Type, b: &Type) -> bool {
    match (a, b) {
        (Type::Named(a), Type::Named(b)) => a == b,
        (Type::NonNullNamed(a), Type::NonNullNamed(b)) => a == b,
        (Type::List(a), Type::List(b)) => same_type(a, b),
        (Type::NonNullList(a), Type::NonNullList(b)) => same_type(a, b),
        _ => false,
    }
}

/// Whether a value of type `subtype` is always a valid value of type `supertype`.
///
/// `T!` is a subtype of `T`, lists are covariant, objects are subtypes of the interfaces they
/// implement, and union members are subtypes of their unions. A list is never a subtype of a
/// non-list type, nor the reverse.
pub fn is_subtype(schema: &Schema, supertype: &Type, subtype: &Type) -> bool {
    match (supertype, subtype) {
        (Type::Named(sup), Type::Named(sub) | Type::NonNullNamed(sub))
        | (Type::NonNullNamed(sup), Type::NonNullNamed(sub)) => {
            is_named_subtype(schema, sup, sub)
        }
        (Type::List(sup), Type::List(sub) | Type::NonNullList(sub))
        | (Type::NonNullList(sup), Type::NonNullList(sub)) => is_subtype(schema, sup, sub),
        _ => false,
    }
}

/// Like [`is_subtype`], but `false` for the same type.
pub fn is_strict_subtype(schema: &Schema, supertype: &Type, subtype: &Type) -> bool {
    !same_type(supertype, subtype) && is_subtype(schema, supertype, subtype)
}

fn is_named_subtype(schema: &Schema, supertype: &str, subtype: &str) -> bool {
    if supertype == subtype {
        return true;
    }
    let (Some(sup), Some(sub)) = (schema.get_type(supertype), schema.get_type(subtype)) else {
        return false;
    };
    match sup.type_kind() {
        TypeKind::Interface => sub.interfaces().any(|(name, _)| name == supertype),
        TypeKind::Union => sup.union_members().any(|(name, _)| name == subtype),
        _ => false,
    }
}

/// Value equality as GraphQL sees it: input object fields are unordered, and an `Int` equals
/// the `Float` with the same numeric value.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Enum(a), Value::Enum(b)) => a == b,
        (Value::Variable(a), Value::Variable(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Boolean(a), Value::Boolean(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => {
            a.as_str() == b.as_str() || numbers_equal(a.try_to_f64().ok(), b.try_to_f64().ok())
        }
        (Value::Float(a), Value::Float(b)) => {
            a.as_str() == b.as_str() || numbers_equal(a.try_to_f64().ok(), b.try_to_f64().ok())
        }
        (Value::Int(i), Value::Float(f)) | (Value::Float(f), Value::Int(i)) => {
            numbers_equal(i.try_to_f64().ok(), f.try_to_f64().ok())
        }
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter().all(|(name, a)| {
                    b.iter()
                        .find(|(other, _)| other == name)
                        .is_some_and(|(_, b)| values_equal(a, b))
                })
        }
        _ => false,
    }
}

fn numbers_equal(a: Option<f64>, b: Option<f64>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}

/// Whether `value` is accepted as an input value of type `ty`, following the input coercion
/// rules: a single item is accepted where a list is expected, and `null` only for nullable
/// types. Variables are never accepted since this is used for constant default values.
pub fn value_conforms_to_type(schema: &Schema, value: &Value, ty: &Type) -> bool {
    if value.is_null() {
        return !ty.is_non_null();
    }
    match ty {
        Type::List(item) | Type::NonNullList(item) => match value {
            Value::List(items) => items
                .iter()
                .all(|value| value_conforms_to_type(schema, value, item)),
            value => value_conforms_to_type(schema, value, item),
        },
        Type::Named(name) | Type::NonNullNamed(name) => {
            let Some(named) = schema.get_type(name) else {
                return false;
            };
            match &named.kind {
                TypeDefinitionKind::Scalar if named.is_built_in => {
                    built_in_scalar_accepts(name, value)
                }
                // Custom scalars do their own coercion.
                TypeDefinitionKind::Scalar => !matches!(value, Value::Variable(_)),
                TypeDefinitionKind::Enum(values) => {
                    matches!(value, Value::Enum(value) if values.contains_key(value))
                }
                TypeDefinitionKind::InputObject(fields) => {
                    let Value::Object(entries) = value else {
                        return false;
                    };
                    let known_entries = entries.iter().all(|(name, value)| {
                        fields
                            .get(name)
                            .and_then(|field| schema.try_get(*field))
                            .is_some_and(|field| {
                                field.ty.as_ref().is_none_or(|ty| {
                                    value_conforms_to_type(schema, value, ty)
                                })
                            })
                    });
                    let required_present = fields
                        .iter()
                        .filter_map(|(name, field)| Some((name, schema.try_get(*field)?)))
                        .filter(|(_, field)| {
                            field.default_value.is_none()
                                && field.ty.as_ref().is_some_and(|ty| ty.is_non_null())
                        })
                        .all(|(name, _)| entries.iter().any(|(entry, _)| entry == name));
                    known_entries && required_present
                }
                TypeDefinitionKind::Object(_)
                | TypeDefinitionKind::Interface(_)
                | TypeDefinitionKind::Union(_) => false,
            }
        }
    }
}

fn built_in_scalar_accepts(name: &str, value: &Value) -> bool {
    match (name, value) {
        ("Int", Value::Int(value)) => value.try_to_i32().is_ok(),
        ("Float", Value::Int(_) | Value::Float(_)) => true,
        ("String", Value::String(_)) => true,
        ("Boolean", Value::Boolean(_)) => true,
        ("ID", Value::String(_)) => true,
        ("ID", Value::Int(value)) => value.try_to_i32().is_ok(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use apollo_compiler::Node;
    use apollo_compiler::name;
    use apollo_compiler::ty;

    use super::*;

    fn schema() -> Schema {
        Schema::parse(
            r#"
            type Query { i: I, u: U }
            interface I { x: Int }
            type A implements I { x: Int }
            type B { y: Int }
            union U = B
            enum Color { RED GREEN }
            input Point { x: Int!, y: Int! = 0, label: String }
            scalar Json
            "#,
            "schema.graphql",
        )
        .unwrap()
    }

    fn int(value: i32) -> Node<Value> {
        Node::new(Value::from(value))
    }

    #[test]
    fn subtyping_follows_wrappers_and_abstract_types() {
        let schema = schema();
        assert!(same_type(&ty!([Int!]), &ty!([Int!])));
        assert!(!same_type(&ty!([Int!]), &ty!([Int])));
        assert!(is_subtype(&schema, &ty!(Int), &ty!(Int!)));
        assert!(!is_subtype(&schema, &ty!(Int!), &ty!(Int)));
        assert!(is_subtype(&schema, &ty!([I]), &ty!([A!]!)));
        assert!(is_subtype(&schema, &ty!(U), &ty!(B)));
        assert!(!is_subtype(&schema, &ty!(U), &ty!(A)));
        assert!(!is_subtype(&schema, &ty!([Int]), &ty!(Int)));
        assert!(is_strict_subtype(&schema, &ty!(I), &ty!(A)));
        assert!(!is_strict_subtype(&schema, &ty!(I), &ty!(I)));
    }

    #[test]
    fn values_compare_structurally() {
        let a = Value::Object(vec![(name!("x"), int(1)), (name!("y"), int(2))]);
        let b = Value::Object(vec![(name!("y"), int(2)), (name!("x"), int(1))]);
        assert!(values_equal(&a, &b));
        assert!(values_equal(&Value::from(1), &Value::from(1.0)));
        assert!(!values_equal(
            &Value::List(vec![int(1), int(2)]),
            &Value::List(vec![int(2), int(1)])
        ));
        assert!(!values_equal(&Value::Null, &Value::from(0)));
    }

    #[test]
    fn default_values_are_coerced_like_inputs() {
        let schema = schema();
        assert!(value_conforms_to_type(&schema, &Value::from(1), &ty!([Int!])));
        assert!(value_conforms_to_type(&schema, &Value::Null, &ty!([Int])));
        assert!(!value_conforms_to_type(&schema, &Value::Null, &ty!(Int!)));
        assert!(!value_conforms_to_type(
            &schema,
            &Value::List(vec![int(1), Node::new(Value::Null)]),
            &ty!([Int!])
        ));
        assert!(value_conforms_to_type(&schema, &Value::from(1), &ty!(Float)));
        assert!(!value_conforms_to_type(&schema, &Value::from(1.5), &ty!(Int)));
        assert!(value_conforms_to_type(
            &schema,
            &Value::Enum(name!("RED")),
            &ty!(Color)
        ));
        assert!(!value_conforms_to_type(
            &schema,
            &Value::Enum(name!("BLUE")),
            &ty!(Color)
        ));
        assert!(value_conforms_to_type(
            &schema,
            &Value::Object(vec![(name!("x"), int(1))]),
            &ty!(Point)
        ));
        assert!(!value_conforms_to_type(
            &schema,
            &Value::Object(vec![(name!("y"), int(1))]),
            &ty!(Point)
        ));
        assert!(!value_conforms_to_type(
            &schema,
            &Value::Object(vec![(name!("x"), int(1)), (name!("z"), int(1))]),
            &ty!(Point)
        ));
        assert!(value_conforms_to_type(
            &schema,
            &Value::String("anything".into()),
            &ty!(Json)
        ));
        assert!(!value_conforms_to_type(&schema, &Value::from(1), &ty!(Query)));
    }
}
