//! Implements API schema generation.
use apollo_compiler::Name;
use apollo_compiler::name;
use indexmap::IndexSet;
use serde::Deserialize;
use tracing::debug;

use crate::error::FederationError;
use crate::error::MultipleFederationErrors;
use crate::error::SingleFederationError;
use crate::link::spec::Identity;
use crate::schema::ArgumentId;
use crate::schema::ArgumentParent;
use crate::schema::DirectiveTarget;
use crate::schema::EnumValueId;
use crate::schema::FieldId;
use crate::schema::InputFieldId;
use crate::schema::Referencer;
use crate::schema::Schema;
use crate::schema::TypeId;

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ApiSchemaOptions {
    pub include_defer: bool,
    pub include_stream: bool,
}

impl Schema {
    /// The API schema of this schema, computed with the default options and cached until the
    /// next mutation.
    pub fn to_api_schema(&self) -> Result<&Schema, FederationError> {
        let cache = self.api_schema_cache();
        if let Some(api_schema) = cache.get() {
            return Ok(api_schema);
        }
        debug!("Computing the API schema");
        let api_schema = self.to_api_schema_with_options(ApiSchemaOptions::default())?;
        Ok(cache.get_or_init(|| Box::new(api_schema)))
    }

    /// Computes the API schema: the schema clients see, stripped of `@inaccessible` elements
    /// and of every element belonging to a linked feature.
    pub fn to_api_schema_with_options(
        &self,
        options: ApiSchemaOptions,
    ) -> Result<Schema, FederationError> {
        self.validate()?;
        let mut api_schema = self.clone();

        // Explicit `@defer` and `@stream` definitions describe what the source schema was
        // written against, not what its API supports.
        remove_explicit_directive_definition(&mut api_schema, &name!("defer"))?;
        remove_explicit_directive_definition(&mut api_schema, &name!("stream"))?;

        if let Some(inaccessible) = inaccessible_directive_name(&api_schema) {
            let elements = InaccessibleElements::collect(&api_schema, &inaccessible)?;
            elements.validate(&api_schema)?;
            elements.remove(&mut api_schema)?;
        }
        remove_core_feature_elements(&mut api_schema)?;

        if !options.include_defer {
            remove_built_in_directive_definition(&mut api_schema, &name!("defer"))?;
        }
        if !options.include_stream {
            remove_built_in_directive_definition(&mut api_schema, &name!("stream"))?;
        }

        api_schema.validate()?;
        Ok(api_schema)
    }
}

fn remove_explicit_directive_definition(
    schema: &mut Schema,
    name: &Name,
) -> Result<(), FederationError> {
    let id = schema
        .directive_definitions()
        .find(|(_, definition)| definition.name == *name)
        .map(|(id, _)| id);
    if let Some(id) = id {
        schema.remove_directive_definition_recursive(id)?;
    }
    Ok(())
}

fn remove_built_in_directive_definition(
    schema: &mut Schema,
    name: &Name,
) -> Result<(), FederationError> {
    let id = schema
        .built_in_directive_definitions()
        .find(|(_, definition)| definition.name == *name)
        .map(|(id, _)| id);
    if let Some(id) = id {
        schema.with_built_in_modification(|schema| {
            schema.remove_directive_definition(id)?;
            Ok(())
        })?;
    }
    Ok(())
}

fn inaccessible_directive_name(schema: &Schema) -> Option<Name> {
    schema
        .links()?
        .directive_name_in_schema(&Identity::inaccessible_identity(), &name!("inaccessible"))
}

/// Remove types and directives imported by `@link`.
fn remove_core_feature_elements(schema: &mut Schema) -> Result<(), FederationError> {
    let Some(links) = schema.links() else {
        return Ok(());
    };

    // Collect first: removing the `@link` applications resets the link metadata.
    let types_for_removal: Vec<TypeId> = schema
        .types()
        .filter(|(_, ty)| links.source_link_of_type(&ty.name).is_some())
        .map(|(id, _)| id)
        .collect();
    let directives_for_removal: Vec<_> = schema
        .directive_definitions()
        .filter(|(_, definition)| links.source_link_of_directive(&definition.name).is_some())
        .map(|(id, _)| id)
        .collect();

    for id in directives_for_removal {
        schema.remove_directive_definition_recursive(id)?;
    }
    for id in types_for_removal {
        if schema.contains(id) {
            schema.remove_type_recursive(id)?;
        }
    }
    Ok(())
}

#[derive(Default)]
struct InaccessibleElements {
    types: IndexSet<TypeId>,
    fields: IndexSet<FieldId>,
    arguments: IndexSet<ArgumentId>,
    input_fields: IndexSet<InputFieldId>,
    enum_values: IndexSet<EnumValueId>,
}

impl InaccessibleElements {
    fn collect(schema: &Schema, inaccessible: &Name) -> Result<Self, FederationError> {
        let is_inaccessible = |target: DirectiveTarget| -> Result<bool, FederationError> {
            Ok(!schema.directive_applications(target, inaccessible)?.is_empty())
        };
        let mut elements = Self::default();
        let collect_arguments =
            |elements: &mut Self, arguments: Vec<ArgumentId>| -> Result<(), FederationError> {
                for argument in arguments {
                    if is_inaccessible(DirectiveTarget::Argument(argument))? {
                        elements.arguments.insert(argument);
                    }
                }
                Ok(())
            };

        for (id, ty) in schema.types() {
            if is_inaccessible(DirectiveTarget::Type(id))? {
                elements.types.insert(id);
            }
            for (_, field) in ty.fields() {
                if is_inaccessible(DirectiveTarget::Field(field))? {
                    elements.fields.insert(field);
                }
                let arguments = schema.get(field)?.arguments.values().copied().collect();
                collect_arguments(&mut elements, arguments)?;
            }
            for (_, field) in ty.input_fields() {
                if is_inaccessible(DirectiveTarget::InputField(field))? {
                    elements.input_fields.insert(field);
                }
            }
            for (_, value) in ty.enum_values() {
                if is_inaccessible(DirectiveTarget::EnumValue(value))? {
                    elements.enum_values.insert(value);
                }
            }
        }
        for (_, definition) in schema.directive_definitions() {
            collect_arguments(&mut elements, definition.arguments.values().copied().collect())?;
        }
        Ok(elements)
    }

    /// Whether `referencer` stays in the API schema.
    fn keeps(&self, schema: &Schema, referencer: Referencer) -> Result<bool, FederationError> {
        Ok(match referencer {
            Referencer::Field(id) => {
                !self.fields.contains(&id) && !self.types.contains(&schema.get(id)?.parent)
            }
            Referencer::Argument(id) => {
                if self.arguments.contains(&id) {
                    return Ok(false);
                }
                match schema.get(id)?.parent {
                    ArgumentParent::Field(field) => self.keeps(schema, Referencer::Field(field))?,
                    ArgumentParent::Directive(_) => true,
                }
            }
            Referencer::InputField(id) => {
                !self.input_fields.contains(&id)
                    && !self.types.contains(&schema.get(id)?.parent)
            }
            // Implementations and memberships are dropped along with the hidden type.
            Referencer::ImplementingType(_) | Referencer::UnionType(_) => false,
            Referencer::SchemaRoot(_) => true,
        })
    }

    /// Every element the API schema keeps must only reference types it keeps as well.
    fn validate(&self, schema: &Schema) -> Result<(), FederationError> {
        let mut errors = MultipleFederationErrors::new();
        for id in &self.types {
            let ty = schema.get(*id)?;
            for referencer in &ty.referencers {
                if self.keeps(schema, *referencer)? {
                    errors.push(SingleFederationError::InaccessibleReference {
                        message: format!(
                            "Type \"{}\" is @inaccessible but is referenced by \"{}\", which is in the API schema.",
                            ty.name,
                            schema.referencer_coordinate(*referencer)?
                        ),
                    });
                }
            }
        }
        errors.into_result()?;
        Ok(())
    }

    fn remove(self, schema: &mut Schema) -> Result<(), FederationError> {
        for id in self.arguments {
            if schema.contains(id) {
                schema.remove_argument(id)?;
            }
        }
        for id in self.fields {
            if schema.contains(id) {
                schema.remove_field(id)?;
            }
        }
        for id in self.input_fields {
            if schema.contains(id) {
                schema.remove_input_field(id)?;
            }
        }
        for id in self.enum_values {
            if schema.contains(id) {
                schema.remove_enum_value(id)?;
            }
        }
        for id in self.types {
            if schema.contains(id) {
                schema.remove_type(id)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::ErrorCode;
    use crate::schema::TypeKind;

    const LINKS: &str = r#"
        extend schema
          @link(url: "https://specs.apollo.dev/link/v1.0")
          @link(url: "https://specs.apollo.dev/inaccessible/v0.2", import: ["@inaccessible"])

        directive @inaccessible on FIELD_DEFINITION | OBJECT | INTERFACE | UNION | ARGUMENT_DEFINITION | SCALAR | ENUM | ENUM_VALUE | INPUT_OBJECT | INPUT_FIELD_DEFINITION
    "#;

    fn schema(sdl: &str) -> Schema {
        Schema::parse(format!("{LINKS}\n{sdl}"), "schema.graphql").unwrap()
    }

    #[test]
    fn strips_inaccessible_and_feature_elements() {
        let schema = schema(
            r#"
            type Query {
              me: User
              secret: Secret @inaccessible
              users(first: Int, debug: Boolean @inaccessible): [User!]!
            }
            type User { id: ID! email: String @inaccessible }
            type Secret @inaccessible { code: String }
            enum Role { ADMIN @inaccessible USER }
            input Filter { role: Role, internal: Boolean @inaccessible }
            "#,
        );
        let api_schema = schema.to_api_schema().unwrap();
        assert!(!api_schema.is_core_schema());
        assert!(api_schema.directive_definition("link").is_none());
        assert!(api_schema.directive_definition("inaccessible").is_none());
        assert!(api_schema.get_type("link__Import").is_none());
        insta::assert_snapshot!(api_schema.to_string(), @r###"
        type Query {
          me: User
          users(first: Int): [User!]!
        }

        type User {
          id: ID!
        }

        enum Role {
          USER
        }

        input Filter {
          role: Role
        }
        "###);
    }

    #[test]
    fn rejects_references_to_inaccessible_types() {
        let schema = schema(
            r#"
            type Query { a: A, b(filter: F): Int, hidden: A @inaccessible }
            type A @inaccessible { x: Int }
            input F @inaccessible { x: Int }
            "#,
        );
        let err = schema.to_api_schema().unwrap_err();
        assert_eq!(
            err.codes(),
            vec![
                ErrorCode::InaccessibleReference,
                ErrorCode::InaccessibleReference
            ]
        );
        let report = err.to_report();
        assert!(
            report.contains(
                "Type \"A\" is @inaccessible but is referenced by \"Query.a\", which is in the API schema."
            ),
            "{report}"
        );
        assert!(report.contains("\"Query.b(filter:)\""), "{report}");
    }

    #[test]
    fn defer_and_stream_follow_options() {
        let schema = Schema::parse(
            r#"
            directive @defer(label: String, if: Boolean! = true) on FRAGMENT_SPREAD | INLINE_FRAGMENT
            type Query { a: Int }
            "#,
            "schema.graphql",
        )
        .unwrap();
        let api_schema = schema.to_api_schema().unwrap();
        assert!(api_schema.directive_definition("defer").is_none());
        assert!(api_schema.directive_definition("stream").is_none());

        let options: ApiSchemaOptions =
            serde_json::from_value(serde_json::json!({ "include_defer": true })).unwrap();
        let api_schema = schema.to_api_schema_with_options(options).unwrap();
        assert!(api_schema.directive_definition("defer").unwrap().is_built_in);
        assert!(api_schema.directive_definition("stream").is_none());
    }

    #[test]
    fn cached_until_the_schema_changes() {
        let mut schema = Schema::parse("type Query { a: Int }", "schema.graphql").unwrap();
        let first: *const Schema = schema.to_api_schema().unwrap();
        let second: *const Schema = schema.to_api_schema().unwrap();
        assert!(std::ptr::eq(first, second));

        let query = schema.type_id("Query").unwrap();
        schema
            .add_field(query, name!("b"), apollo_compiler::ty!(String))
            .unwrap();
        let api_schema = schema.to_api_schema().unwrap();
        assert!(api_schema.get_type("Query").unwrap().field("b").is_some());
        assert_eq!(
            api_schema.get_type("Query").unwrap().type_kind(),
            TypeKind::Object
        );
    }

    #[test]
    fn invalid_schemas_have_no_api_schema() {
        let schema = Schema::parse("type Query { a: Int @nope }", "schema.graphql").unwrap();
        let err = schema.to_api_schema().unwrap_err();
        assert_eq!(err.codes(), vec![ErrorCode::UnknownDirective]);
    }
}
