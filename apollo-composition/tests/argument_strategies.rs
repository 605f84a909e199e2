use apollo_compiler::Node;
use apollo_compiler::ast::Value;
use apollo_compiler::ty;
use apollo_composition::schema::argument_composition_strategies::ArgumentCompositionStrategy;
use apollo_composition::utils::dnf::dnf_conjunction;
use itertools::Itertools;
use pretty_assertions::assert_eq;
use rstest::rstest;

use super::parse_schema;

fn int_list(values: &[i32]) -> Value {
    Value::List(values.iter().map(|v| Node::new(Value::from(*v))).collect())
}

fn condition(clauses: &[&[&'static str]]) -> Vec<Vec<&'static str>> {
    clauses.iter().map(|clause| clause.to_vec()).collect()
}

#[test]
fn numeric_strategies_reduce_the_same_inputs_differently() {
    let values = [Value::from(1), Value::from(3)];
    let merged: Vec<(String, Option<Value>)> = [
        ArgumentCompositionStrategy::Sum,
        ArgumentCompositionStrategy::Max,
        ArgumentCompositionStrategy::Min,
        ArgumentCompositionStrategy::Average,
    ]
    .into_iter()
    .map(|strategy| (strategy.to_string(), strategy.merge_values(&values).unwrap()))
    .collect();
    assert_eq!(
        merged,
        vec![
            ("SUM".to_string(), Some(Value::from(4))),
            ("MAX".to_string(), Some(Value::from(3))),
            ("MIN".to_string(), Some(Value::from(1))),
            ("AVERAGE".to_string(), Some(Value::from(2))),
        ]
    );
}

#[test]
fn set_strategies_ignore_input_order() {
    let union = ArgumentCompositionStrategy::Union;
    let intersection = ArgumentCompositionStrategy::Intersection;
    assert_eq!(
        union
            .merge_values(&[int_list(&[1, 2]), int_list(&[2]), int_list(&[3])])
            .unwrap(),
        Some(int_list(&[1, 2, 3]))
    );
    assert_eq!(
        intersection
            .merge_values(&[int_list(&[1, 2, 4]), int_list(&[2, 4, 7]), int_list(&[2, 3, 4, 9])])
            .unwrap(),
        Some(int_list(&[2, 4]))
    );

    let lists = [int_list(&[4, 2, 1]), int_list(&[7, 4, 2]), int_list(&[9, 4, 3, 2])];
    let Some(Value::List(items)) = intersection.merge_values(&lists).unwrap() else {
        panic!("expected a list");
    };
    let mut items: Vec<String> = items.iter().map(|item| item.to_string()).collect();
    items.sort();
    assert_eq!(items, vec!["2", "4"]);
}

#[rstest]
#[case("MAX", ArgumentCompositionStrategy::Max)]
#[case("NULLABLE_UNION", ArgumentCompositionStrategy::NullableUnion)]
#[case("DNF_CONJUNCTION", ArgumentCompositionStrategy::DnfConjunction)]
fn strategies_are_named_in_configuration(
    #[case] name: &str,
    #[case] strategy: ArgumentCompositionStrategy,
) {
    let loaded: ArgumentCompositionStrategy = serde_json::from_value(name.into()).unwrap();
    assert_eq!(loaded, strategy);
    assert_eq!(strategy.name(), name);
}

#[test]
fn type_support_is_checked_against_the_schema() {
    let schema = parse_schema("type Query { a: Int }");
    let sum = ArgumentCompositionStrategy::Sum;
    assert!(sum.is_type_supported(&schema, &ty!(Int!)).is_ok());
    assert!(sum.is_type_supported(&schema, &ty!(String!)).is_err());
    let union = ArgumentCompositionStrategy::Union;
    assert!(union.is_type_supported(&schema, &ty!([String]!)).is_ok());
    assert!(union.is_type_supported(&schema, &ty!([String])).is_err());
}

#[test]
fn dnf_conjunction_is_commutative_and_associative() {
    let operands = [
        condition(&[&["a"], &["b", "c"]]),
        condition(&[&["c"], &["d"]]),
        condition(&[&["a", "d"]]),
    ];
    let expected = dnf_conjunction(&operands);
    for permutation in operands.iter().cloned().permutations(operands.len()) {
        assert_eq!(dnf_conjunction(&permutation), expected);
    }

    let left = dnf_conjunction(&[
        dnf_conjunction(&[operands[0].clone(), operands[1].clone()]),
        operands[2].clone(),
    ]);
    let right = dnf_conjunction(&[
        operands[0].clone(),
        dnf_conjunction(&[operands[1].clone(), operands[2].clone()]),
    ]);
    assert_eq!(left, expected);
    assert_eq!(right, expected);
}

#[test]
fn dnf_conjunction_keeps_no_subsumed_clause() {
    let result = dnf_conjunction(&[
        condition(&[&["a"], &["b"]]),
        condition(&[&["a"], &["c"]]),
    ]);
    assert_eq!(result, condition(&[&["a"], &["b", "c"]]));
    for (i, clause) in result.iter().enumerate() {
        for (j, other) in result.iter().enumerate() {
            let strict_superset =
                clause.len() > other.len() && other.iter().all(|atom| clause.contains(atom));
            assert!(i == j || !strict_superset, "{clause:?} subsumes {other:?}");
        }
    }
}

#[test]
fn dnf_conjunction_treats_empty_conditions_as_true() {
    let operand = condition(&[&["a", "b"]]);
    assert_eq!(dnf_conjunction(&[condition(&[]), operand.clone()]), operand);
    assert_eq!(dnf_conjunction(&[operand.clone(), condition(&[&[]])]), operand);
    assert_eq!(dnf_conjunction::<&str>(&[]), condition(&[&[]]));
}
