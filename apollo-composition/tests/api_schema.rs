use apollo_composition::ApiSchemaOptions;
use apollo_composition::error::ErrorCode;

use super::parse_schema;

const SUPERGRAPH: &str = r#"
    extend schema
      @link(url: "https://specs.apollo.dev/link/v1.0")
      @link(url: "https://specs.apollo.dev/inaccessible/v0.2", import: ["@inaccessible"])

    directive @inaccessible on FIELD_DEFINITION | OBJECT | INTERFACE | UNION | ARGUMENT_DEFINITION | SCALAR | ENUM | ENUM_VALUE | INPUT_OBJECT | INPUT_FIELD_DEFINITION

    type Query {
      products(filter: ProductFilter): [Product!]!
    }

    type Product {
      id: ID!
      status: Status
      cost: Int @inaccessible
    }

    enum Status { AVAILABLE, DISCONTINUED @inaccessible }

    input ProductFilter {
      status: Status
      internalCode: String @inaccessible
    }
"#;

#[test]
fn inaccessible_members_are_removed() {
    let schema = parse_schema(SUPERGRAPH);
    let api_schema = schema.to_api_schema().unwrap();

    let product = api_schema.type_id("Product").unwrap();
    assert!(api_schema.field_id(product, "id").is_some());
    assert!(api_schema.field_id(product, "cost").is_none());

    let status = api_schema.type_id("Status").unwrap();
    assert!(api_schema.enum_value_id(status, "AVAILABLE").is_some());
    assert!(api_schema.enum_value_id(status, "DISCONTINUED").is_none());

    let filter = api_schema.type_id("ProductFilter").unwrap();
    assert!(api_schema.input_field_id(filter, "status").is_some());
    assert!(api_schema.input_field_id(filter, "internalCode").is_none());

    assert!(api_schema.directive_definition("inaccessible").is_none());
    assert!(api_schema.links().is_none());
    assert!(api_schema.validate().is_ok());
}

#[test]
fn options_keep_incremental_delivery_directives() {
    let schema = parse_schema(SUPERGRAPH);
    let options: ApiSchemaOptions = serde_json::from_value(serde_json::json!({
        "include_defer": true
    }))
    .unwrap();
    let api_schema = schema.to_api_schema_with_options(options).unwrap();
    assert!(api_schema.directive_definition("defer").is_some());
    assert!(api_schema.directive_definition("stream").is_none());
}

#[test]
fn source_schema_problems_prevent_an_api_schema() {
    let schema = parse_schema(&format!(
        "{SUPERGRAPH}\ntype Orphan {{ field: String @deprecated(why: 1) }}"
    ));
    let err = schema.to_api_schema().unwrap_err();
    assert!(err.codes().contains(&ErrorCode::UnknownDirectiveArgument));
}
