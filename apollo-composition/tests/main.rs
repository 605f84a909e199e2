mod api_schema;
mod argument_strategies;
mod directive_composition;

use apollo_composition::Schema;

fn parse_schema(sdl: &str) -> Schema {
    Schema::parse(sdl, "schema.graphql").unwrap()
}
