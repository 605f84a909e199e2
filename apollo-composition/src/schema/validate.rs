//! Structural validation of a [`Schema`].
//!
//! Every independent problem is reported, each error naming the schema coordinate at fault.
use apollo_compiler::ast::DirectiveLocation;
use apollo_compiler::ast::Type;
use indexmap::IndexMap;

use super::ArgumentId;
use super::DirectiveId;
use super::DirectiveTarget;
use super::FieldId;
use super::NamedType;
use super::Schema;
use super::TypeDefinitionKind;
use super::TypeId;
use super::TypeKind;
use super::coordinate::SchemaCoordinate;
use super::type_algebra::is_subtype;
use super::type_algebra::same_type;
use super::type_algebra::value_conforms_to_type;
use crate::error::MultipleFederationErrors;
use crate::error::SingleFederationError;

impl Schema {
    /// Checks the invariants a well-formed schema holds beyond what the graph enforces on
    /// construction: type references, default values, interface implementations, non-empty
    /// types, root types and directive applications.
    pub fn validate(&self) -> Result<(), MultipleFederationErrors> {
        let mut validator = Validator {
            schema: self,
            errors: MultipleFederationErrors::new(),
        };
        validator.validate_schema_definition();
        for (_, definition) in self.directive_definitions() {
            for (name, argument) in &definition.arguments {
                validator.validate_argument(
                    *argument,
                    SchemaCoordinate::DirectiveArgument {
                        directive: definition.name.clone(),
                        argument: name.clone(),
                    },
                );
            }
        }
        for (id, ty) in self.types() {
            validator.validate_type(id, ty);
        }
        validator.errors.into_result()
    }
}

struct Validator<'schema> {
    schema: &'schema Schema,
    errors: MultipleFederationErrors,
}

impl Validator<'_> {
    fn coordinate(&self, target: DirectiveTarget) -> Option<SchemaCoordinate> {
        self.schema.target_coordinate(target).ok()
    }

    fn validate_schema_definition(&mut self) {
        let schema = self.schema;
        for (kind, root) in &schema.schema_definition.roots {
            let Some(ty) = schema.types.get(root.ty) else {
                continue;
            };
            if ty.type_kind() != TypeKind::Object {
                self.errors.push(SingleFederationError::InvalidRootType {
                    message: format!(
                        "The {kind} root type must be an object type, but \"{}\" is a {}",
                        ty.name,
                        ty.type_kind()
                    ),
                });
            }
        }
        self.validate_directives(DirectiveTarget::SchemaDefinition);
    }

    fn validate_type(&mut self, id: TypeId, ty: &NamedType) {
        let type_name = &ty.name;
        self.validate_directives(DirectiveTarget::Type(id));
        if ty.is_empty() {
            let message = match &ty.kind {
                TypeDefinitionKind::Union(_) => {
                    format!("Union type \"{type_name}\" must define one or more member types")
                }
                TypeDefinitionKind::Enum(_) => {
                    format!("Enum type \"{type_name}\" must define one or more values")
                }
                _ => format!("Type \"{type_name}\" must define one or more fields"),
            };
            self.errors.push(SingleFederationError::EmptyType { message });
        }

        match &ty.kind {
            TypeDefinitionKind::Scalar | TypeDefinitionKind::Union(_) => {}
            TypeDefinitionKind::Object(composite) | TypeDefinitionKind::Interface(composite) => {
                for field in composite.fields.values() {
                    self.validate_field(*field);
                }
                for interface in composite.interfaces.values() {
                    self.validate_implementation(ty, interface.ty);
                }
            }
            TypeDefinitionKind::Enum(values) => {
                for value in values.values() {
                    self.validate_directives(DirectiveTarget::EnumValue(*value));
                }
            }
            TypeDefinitionKind::InputObject(fields) => {
                for field_id in fields.values() {
                    let Some(field) = self.schema.input_fields.get(*field_id) else {
                        continue;
                    };
                    let Some(coordinate) = self.coordinate(DirectiveTarget::InputField(*field_id))
                    else {
                        continue;
                    };
                    self.validate_directives(DirectiveTarget::InputField(*field_id));
                    self.validate_input_value(
                        field.ty.as_ref(),
                        field.default_value.as_deref(),
                        coordinate,
                    );
                }
            }
        }
    }

    fn validate_field(&mut self, id: FieldId) {
        let Some(field) = self.schema.fields.get(id) else {
            return;
        };
        let Some(coordinate) = self.coordinate(DirectiveTarget::Field(id)) else {
            return;
        };
        self.validate_directives(DirectiveTarget::Field(id));
        match &field.ty {
            None => self.errors.push(dangling(&coordinate)),
            Some(ty) => {
                if let Some(named) = self.schema.get_type(ty.inner_named_type()) {
                    if !named.type_kind().is_output_type() {
                        self.errors.push(SingleFederationError::InvalidOutputType {
                            message: format!(
                                "The type of \"{coordinate}\" must be an output type but got \"{ty}\", an {}",
                                named.type_kind()
                            ),
                        });
                    }
                }
            }
        }
        let SchemaCoordinate::Field {
            ty: type_name,
            field: field_name,
        } = &coordinate
        else {
            return;
        };
        for (name, argument) in &field.arguments {
            self.validate_argument(
                *argument,
                SchemaCoordinate::FieldArgument {
                    ty: type_name.clone(),
                    field: field_name.clone(),
                    argument: name.clone(),
                },
            );
        }
    }

    fn validate_argument(&mut self, id: ArgumentId, coordinate: SchemaCoordinate) {
        let Some(argument) = self.schema.arguments.get(id) else {
            return;
        };
        self.validate_directives(DirectiveTarget::Argument(id));
        self.validate_input_value(
            argument.ty.as_ref(),
            argument.default_value.as_deref(),
            coordinate,
        );
    }

    fn validate_input_value(
        &mut self,
        ty: Option<&Type>,
        default_value: Option<&apollo_compiler::ast::Value>,
        coordinate: SchemaCoordinate,
    ) {
        let Some(ty) = ty else {
            self.errors.push(dangling(&coordinate));
            return;
        };
        let Some(named) = self.schema.get_type(ty.inner_named_type()) else {
            return;
        };
        if !named.type_kind().is_input_type() {
            self.errors.push(SingleFederationError::InvalidInputType {
                message: format!(
                    "The type of \"{coordinate}\" must be an input type but got \"{ty}\", an {}",
                    named.type_kind()
                ),
            });
            return;
        }
        if let Some(default_value) = default_value {
            if !value_conforms_to_type(self.schema, default_value, ty) {
                self.errors.push(SingleFederationError::InvalidDefaultValue {
                    message: format!(
                        "Invalid default value (got: {default_value}) provided for \"{coordinate}\" of type \"{ty}\""
                    ),
                });
            }
        }
    }

    /// An implementation provides every interface field, with a subtype of its type and the
    /// same arguments, any extra argument being optional.
    fn validate_implementation(&mut self, implementer: &NamedType, interface: TypeId) {
        let schema = self.schema;
        let Some(interface) = schema.types.get(interface) else {
            return;
        };
        let type_name = &implementer.name;
        let interface_name = &interface.name;
        for (field_name, interface_field_id) in interface.fields() {
            let Some(interface_field) = schema.fields.get(interface_field_id) else {
                continue;
            };
            let Some(field) = implementer
                .field(field_name)
                .and_then(|id| schema.fields.get(id))
            else {
                self.errors.push(SingleFederationError::InterfaceFieldMissing {
                    message: format!(
                        "Interface field \"{interface_name}.{field_name}\" is expected but type \"{type_name}\" does not provide it"
                    ),
                });
                continue;
            };
            if let (Some(expected), Some(actual)) = (&interface_field.ty, &field.ty) {
                if !is_subtype(schema, expected, actual) {
                    self.errors.push(SingleFederationError::InterfaceFieldTypeMismatch {
                        message: format!(
                            "Interface field \"{interface_name}.{field_name}\" expects type \"{expected}\" but \"{type_name}.{field_name}\" is of type \"{actual}\""
                        ),
                    });
                }
            }

            for (argument_name, interface_argument) in &interface_field.arguments {
                let expected = schema
                    .arguments
                    .get(*interface_argument)
                    .and_then(|argument| argument.ty.as_ref());
                let actual = field
                    .arguments
                    .get(argument_name)
                    .and_then(|id| schema.arguments.get(*id));
                match (expected, actual) {
                    (_, None) => {
                        self.errors.push(SingleFederationError::InterfaceFieldArgumentMismatch {
                            message: format!(
                                "Interface field argument \"{interface_name}.{field_name}({argument_name}:)\" is expected but \"{type_name}.{field_name}\" does not provide it"
                            ),
                        });
                    }
                    (Some(expected), Some(actual)) => {
                        if let Some(actual) = &actual.ty {
                            if !same_type(expected, actual) {
                                self.errors.push(SingleFederationError::InterfaceFieldArgumentMismatch {
                                    message: format!(
                                        "Interface field argument \"{interface_name}.{field_name}({argument_name}:)\" expects type \"{expected}\" but \"{type_name}.{field_name}({argument_name}:)\" is of type \"{actual}\""
                                    ),
                                });
                            }
                        }
                    }
                    (None, Some(_)) => {}
                }
            }
            for (argument_name, argument) in &field.arguments {
                if interface_field.arguments.contains_key(argument_name) {
                    continue;
                }
                let Some(argument) = schema.arguments.get(*argument) else {
                    continue;
                };
                let is_required = argument.default_value.is_none()
                    && argument.ty.as_ref().is_some_and(|ty| ty.is_non_null());
                if is_required {
                    self.errors.push(SingleFederationError::InterfaceFieldArgumentMismatch {
                        message: format!(
                            "Argument \"{type_name}.{field_name}({argument_name}:)\" must not be required since it is not provided by the interface field \"{interface_name}.{field_name}\""
                        ),
                    });
                }
            }
        }
    }

    fn validate_directives(&mut self, target: DirectiveTarget) {
        let schema = self.schema;
        let Ok(ids) = schema.directives_on(target) else {
            return;
        };
        let Some(coordinate) = self.coordinate(target) else {
            return;
        };
        let location = self.location(target);
        let mut counts: IndexMap<&str, usize> = IndexMap::new();
        for id in ids {
            let Some(directive) = schema.directives.get(*id) else {
                continue;
            };
            *counts.entry(directive.name.as_str()).or_default() += 1;
            self.validate_directive(*id, &coordinate, location);
        }
        for (name, count) in counts {
            let repeatable = schema
                .directive_definition(name)
                .is_none_or(|definition| definition.repeatable);
            if count > 1 && !repeatable {
                self.errors.push(SingleFederationError::NonRepeatableDirectiveRepeated {
                    message: format!(
                        "The directive \"@{name}\" can only be used once at \"{coordinate}\""
                    ),
                });
            }
        }
    }

    fn location(&self, target: DirectiveTarget) -> Option<DirectiveLocation> {
        Some(match target {
            DirectiveTarget::SchemaDefinition => DirectiveLocation::Schema,
            DirectiveTarget::Type(id) => self.schema.types.get(id)?.type_kind().directive_location(),
            DirectiveTarget::Field(_) => DirectiveLocation::FieldDefinition,
            DirectiveTarget::Argument(_) => DirectiveLocation::ArgumentDefinition,
            DirectiveTarget::InputField(_) => DirectiveLocation::InputFieldDefinition,
            DirectiveTarget::EnumValue(_) => DirectiveLocation::EnumValue,
        })
    }

    fn validate_directive(
        &mut self,
        id: DirectiveId,
        coordinate: &SchemaCoordinate,
        location: Option<DirectiveLocation>,
    ) {
        let schema = self.schema;
        let Some(directive) = schema.directives.get(id) else {
            return;
        };
        let name = &directive.name;
        let Some(definition) = schema.directive_definition(name) else {
            self.errors.push(SingleFederationError::UnknownDirective {
                message: format!("Unknown directive \"@{name}\" applied to \"{coordinate}\""),
            });
            return;
        };
        if let Some(location) = location {
            if !definition.locations.contains(&location) {
                self.errors.push(SingleFederationError::InvalidDirectiveLocation {
                    message: format!(
                        "Directive \"@{name}\" may not be used on {location} (applied to \"{coordinate}\")"
                    ),
                });
            }
        }
        for (argument_name, value) in &directive.arguments {
            let Some(argument) = definition
                .argument(argument_name)
                .and_then(|id| schema.arguments.get(id))
            else {
                self.errors.push(SingleFederationError::UnknownDirectiveArgument {
                    message: format!(
                        "Unknown argument \"{argument_name}\" in application of \"@{name}\" on \"{coordinate}\""
                    ),
                });
                continue;
            };
            let Some(ty) = &argument.ty else {
                continue;
            };
            if !value_conforms_to_type(schema, value, ty) {
                self.errors.push(SingleFederationError::InvalidArgumentValue {
                    message: format!(
                        "Invalid value {value} for argument \"@{name}({argument_name}:)\" of type \"{ty}\" on \"{coordinate}\""
                    ),
                });
            }
        }
        for (argument_name, argument) in &definition.arguments {
            if directive.arguments.contains_key(argument_name) {
                continue;
            }
            let Some(argument) = schema.arguments.get(*argument) else {
                continue;
            };
            let is_required = argument.default_value.is_none()
                && argument.ty.as_ref().is_some_and(|ty| ty.is_non_null());
            if is_required {
                let ty = argument.ty.as_ref().map(ToString::to_string).unwrap_or_default();
                self.errors.push(SingleFederationError::MissingRequiredArgument {
                    message: format!(
                        "Directive \"@{name}\" argument \"{argument_name}\" of type \"{ty}\" is required, but it was not provided on \"{coordinate}\""
                    ),
                });
            }
        }
    }
}

fn dangling(coordinate: &SchemaCoordinate) -> SingleFederationError {
    SingleFederationError::DanglingTypeReference {
        message: format!("\"{coordinate}\" has no type: the type it referenced was removed"),
    }
}
