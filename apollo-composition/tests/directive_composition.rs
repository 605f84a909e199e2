use apollo_composition::FederationDirectiveCompositionManager;
use apollo_composition::Schema;
use apollo_composition::error::ErrorCode;
use apollo_composition::merger::DirectiveCompositionEntryConfig;
use apollo_composition::merger::Source;
use apollo_composition::schema::DirectiveTarget;
use apollo_composition::schema::TypeId;
use pretty_assertions::assert_eq;

use super::parse_schema;

const COST: &str = "directive @cost(weight: Int!) on FIELD_DEFINITION | OBJECT";

fn manager(
    supergraph: &Schema,
    config: serde_json::Value,
) -> FederationDirectiveCompositionManager {
    let configs: Vec<DirectiveCompositionEntryConfig> = serde_json::from_value(config).unwrap();
    FederationDirectiveCompositionManager::new(supergraph, &configs).unwrap()
}

fn inherited_cost() -> serde_json::Value {
    serde_json::json!([{
        "directive": "cost",
        "compositionStrategy": "COLLAPSE",
        "propagationStrategy": "INHERIT_FROM_OBJECT",
        "fieldStrategies": { "weight": "MAX" }
    }])
}

fn object_sources<'a>(subgraphs: &'a [(&'a str, Schema)]) -> Vec<Option<Source<'a, TypeId>>> {
    subgraphs
        .iter()
        .map(|(name, schema)| {
            Some(Source {
                subgraph: *name,
                schema,
                element: schema.type_id("T")?,
            })
        })
        .collect()
}

fn field_weights(supergraph: &Schema, field: &str) -> Vec<String> {
    let t = supergraph.type_id("T").unwrap();
    let field = supergraph.field_id(t, field).unwrap();
    supergraph
        .directive_applications(DirectiveTarget::Field(field), "cost")
        .unwrap()
        .iter()
        .map(|directive| directive.argument("weight").unwrap().to_string())
        .collect()
}

#[test]
fn annotated_fields_keep_their_own_application() {
    let mut supergraph = parse_schema(&format!("{COST} type T {{ x: Int, y: Int }}"));
    let manager = manager(&supergraph, inherited_cost());
    let subgraphs = [(
        "one",
        parse_schema(&format!(
            "{COST} type T @cost(weight: 10) {{ x: Int, y: Int @cost(weight: 1) }}"
        )),
    )];
    let t = supergraph.type_id("T").unwrap();
    manager
        .merge_object(&mut supergraph, t, &object_sources(&subgraphs))
        .unwrap();

    assert_eq!(field_weights(&supergraph, "x"), vec!["10"]);
    assert_eq!(field_weights(&supergraph, "y"), vec!["1"]);
}

#[test]
fn objects_without_a_single_application_propagate_nothing() {
    let mut supergraph = parse_schema(&format!("{COST} type T {{ x: Int }}"));
    let manager = manager(&supergraph, inherited_cost());
    let subgraphs = [
        ("bare", parse_schema(&format!("{COST} type T {{ x: Int }}"))),
        (
            "doubled",
            parse_schema(
                r#"
                directive @cost(weight: Int!) repeatable on FIELD_DEFINITION | OBJECT
                type T @cost(weight: 4) @cost(weight: 6) { x: Int }
                "#,
            ),
        ),
    ];
    let t = supergraph.type_id("T").unwrap();
    manager
        .merge_object(&mut supergraph, t, &object_sources(&subgraphs))
        .unwrap();

    assert_eq!(field_weights(&supergraph, "x"), Vec::<String>::new());
}

#[test]
fn exact_arguments_split_applications_into_buckets() {
    let tagged = "directive @tagged(label: String!, value: Int! = 0) on FIELD_DEFINITION";
    let mut supergraph = parse_schema(&format!("{tagged} type Query {{ a: Int }}"));
    let manager = manager(
        &supergraph,
        serde_json::json!([{
            "directive": "tagged",
            "compositionStrategy": "COLLAPSE",
            "fieldStrategies": { "label": "EXACT", "value": "SUM" }
        }]),
    );
    let subgraphs: Vec<(String, Schema)> = [
        r#"@tagged(label: "x", value: 1)"#,
        r#"@tagged(label: "y", value: 4)"#,
        r#"@tagged(label: "x", value: 2)"#,
        r#"@tagged(label: "y")"#,
    ]
    .into_iter()
    .enumerate()
    .map(|(i, application)| {
        (
            format!("subgraph{i}"),
            parse_schema(&format!("{tagged} type Query {{ a: Int {application} }}")),
        )
    })
    .collect();
    let query = supergraph.type_id("Query").unwrap();
    let a = supergraph.field_id(query, "a").unwrap();
    let sources: Vec<_> = subgraphs
        .iter()
        .map(|(name, schema)| {
            let query = schema.type_id("Query")?;
            Some(Source {
                subgraph: name.as_str(),
                schema,
                element: schema.field_id(query, "a")?,
            })
        })
        .collect();
    manager.merge_field(&mut supergraph, a, &sources).unwrap();

    let merged: Vec<(String, String)> = supergraph
        .directive_applications(DirectiveTarget::Field(a), "tagged")
        .unwrap()
        .iter()
        .map(|directive| {
            (
                directive.argument("label").unwrap().to_string(),
                directive.argument("value").unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(
        merged,
        vec![
            ("\"x\"".to_string(), "3".to_string()),
            ("\"y\"".to_string(), "4".to_string()),
        ]
    );
}

#[test]
fn invalid_configuration_is_rejected() {
    let supergraph = parse_schema(&format!("{COST} type Query {{ a: Int }}"));
    let config = serde_json::json!([{
        "directive": "cost",
        "compositionStrategy": "COLLAPSE",
        "fieldStrategies": { "weight": "UNION" }
    }]);
    let configs: Vec<DirectiveCompositionEntryConfig> = serde_json::from_value(config).unwrap();
    let err = FederationDirectiveCompositionManager::new(&supergraph, &configs).unwrap_err();
    assert_eq!(err.codes(), vec![ErrorCode::DirectiveCompositionInvalid]);
}
