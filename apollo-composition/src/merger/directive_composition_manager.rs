use apollo_compiler::Name;
use apollo_compiler::ast::DirectiveLocation;
use tracing::debug;
use tracing::instrument;
use tracing::trace;

use crate::error::FederationError;
use crate::error::SingleFederationError;
use crate::merger::directive_composition::DirectiveCompositionEntry;
use crate::merger::directive_composition::DirectiveCompositionEntryConfig;
use crate::merger::directive_composition::DirectiveCompositionStrategy;
use crate::merger::directive_composition::PropagationStrategy;
use crate::schema::Directive;
use crate::schema::DirectiveTarget;
use crate::schema::FieldId;
use crate::schema::Schema;
use crate::schema::TypeId;

/// The counterpart, in one subgraph, of the supergraph element being merged.
#[derive(Debug, Clone, Copy)]
pub struct Source<'a, T> {
    pub subgraph: &'a str,
    pub schema: &'a Schema,
    pub element: T,
}

/// The applications one subgraph brings for an entry. `applications` is `None` when the
/// subgraph does not link the feature defining the directive.
struct Contribution<'a> {
    subgraph: &'a str,
    applications: Option<Vec<Directive>>,
}

/// Merges the applications of composed directives from subgraph elements into their
/// supergraph counterparts.
#[derive(Debug, Clone, Default)]
pub struct FederationDirectiveCompositionManager {
    entries: Vec<DirectiveCompositionEntry>,
}

impl FederationDirectiveCompositionManager {
    /// Validates every entry of `configs` against the directive definitions of `supergraph`.
    pub fn new(
        supergraph: &Schema,
        configs: &[DirectiveCompositionEntryConfig],
    ) -> Result<Self, FederationError> {
        let entries = configs
            .iter()
            .map(|config| DirectiveCompositionEntry::new(supergraph, config))
            .collect::<Result<_, _>>()?;
        Ok(Self { entries })
    }

    pub fn from_entries(entries: Vec<DirectiveCompositionEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[DirectiveCompositionEntry] {
        &self.entries
    }

    pub fn entry(&self, directive: &str) -> Option<&DirectiveCompositionEntry> {
        self.entries
            .iter()
            .find(|entry| entry.directive().as_str() == directive)
    }

    fn entries_on(
        &self,
        location: DirectiveLocation,
    ) -> impl Iterator<Item = &DirectiveCompositionEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.applies_to(location))
    }

    /// Merges the applications found on the `sources` fields onto the supergraph field
    /// `target`. A `None` source is a subgraph without that field.
    #[instrument(skip_all, level = "trace")]
    pub fn merge_field(
        &self,
        supergraph: &mut Schema,
        target: FieldId,
        sources: &[Option<Source<'_, FieldId>>],
    ) -> Result<(), FederationError> {
        for entry in self.entries_on(DirectiveLocation::FieldDefinition) {
            let contributions = gather(entry, sources, DirectiveTarget::Field)?;
            merge_contributions(entry, supergraph, DirectiveTarget::Field(target), contributions)?;
        }
        Ok(())
    }

    /// Merges the applications found on the `sources` objects onto the supergraph object
    /// `target`, then does the same for each of its fields.
    ///
    /// For entries inheriting from objects, a subgraph field without its own application gets
    /// the one of its object, if the object has exactly one.
    #[instrument(skip_all, level = "trace")]
    pub fn merge_object(
        &self,
        supergraph: &mut Schema,
        target: TypeId,
        sources: &[Option<Source<'_, TypeId>>],
    ) -> Result<(), FederationError> {
        for entry in self.entries_on(DirectiveLocation::Object) {
            let contributions = gather(entry, sources, DirectiveTarget::Type)?;
            merge_contributions(entry, supergraph, DirectiveTarget::Type(target), contributions)?;
        }

        let fields: Vec<(Name, FieldId)> = supergraph
            .get(target)?
            .fields()
            .map(|(name, id)| (name.clone(), id))
            .collect();
        for (field_name, field) in fields {
            let field_sources: Vec<Option<Source<'_, FieldId>>> = sources
                .iter()
                .map(|source| {
                    source.and_then(|source| {
                        Some(Source {
                            subgraph: source.subgraph,
                            schema: source.schema,
                            element: source.schema.field_id(source.element, &field_name)?,
                        })
                    })
                })
                .collect();
            for entry in self.entries_on(DirectiveLocation::FieldDefinition) {
                let mut contributions = gather(entry, &field_sources, DirectiveTarget::Field)?;
                if entry.propagation_strategy() == PropagationStrategy::InheritFromObject {
                    for (contribution, object) in contributions.iter_mut().zip(sources) {
                        let (Some(contribution), Some(object)) = (contribution, object) else {
                            continue;
                        };
                        inherit_from_object(entry, contribution, object, &field_name)?;
                    }
                }
                merge_contributions(
                    entry,
                    supergraph,
                    DirectiveTarget::Field(field),
                    contributions,
                )?;
            }
        }
        Ok(())
    }
}

fn gather<'a, T: Copy>(
    entry: &DirectiveCompositionEntry,
    sources: &[Option<Source<'a, T>>],
    target: impl Fn(T) -> DirectiveTarget,
) -> Result<Vec<Option<Contribution<'a>>>, FederationError> {
    sources
        .iter()
        .map(|source| {
            let Some(source) = source else {
                return Ok(None);
            };
            let applications = match entry.name_in_schema(source.schema) {
                Some(name) => Some(
                    source
                        .schema
                        .directive_applications(target(source.element), &name)?
                        .into_iter()
                        .cloned()
                        .collect(),
                ),
                None => None,
            };
            Ok(Some(Contribution {
                subgraph: source.subgraph,
                applications,
            }))
        })
        .collect()
}

fn inherit_from_object(
    entry: &DirectiveCompositionEntry,
    contribution: &mut Contribution<'_>,
    object: &Source<'_, TypeId>,
    field_name: &Name,
) -> Result<(), FederationError> {
    let Some(applications) = &mut contribution.applications else {
        return Ok(());
    };
    if !applications.is_empty() {
        return Ok(());
    }
    let Some(name) = entry.name_in_schema(object.schema) else {
        return Ok(());
    };
    let inherited = object
        .schema
        .directive_applications(DirectiveTarget::Type(object.element), &name)?;
    if let [application] = inherited.as_slice() {
        trace!(
            "Field \"{field_name}\" of subgraph \"{}\" inherits \"@{name}\" from its object",
            contribution.subgraph
        );
        applications.push((*application).clone());
    }
    Ok(())
}

fn merge_contributions(
    entry: &DirectiveCompositionEntry,
    supergraph: &mut Schema,
    target: DirectiveTarget,
    contributions: Vec<Option<Contribution<'_>>>,
) -> Result<(), FederationError> {
    let present: Vec<&Contribution> = contributions
        .iter()
        .flatten()
        .filter(|contribution| contribution.applications.is_some())
        .collect();
    if entry.composition_strategy() == DirectiveCompositionStrategy::CollapseFromAll {
        let applied = present.iter().find(|contribution| {
            contribution
                .applications
                .as_ref()
                .is_some_and(|applications| !applications.is_empty())
        });
        let missing = present.iter().find(|contribution| {
            contribution
                .applications
                .as_ref()
                .is_some_and(Vec::is_empty)
        });
        if let (Some(applied), Some(missing)) = (applied, missing) {
            return Err(SingleFederationError::DirectiveMergeFailed {
                message: format!(
                    "Directive \"@{}\" is applied to \"{}\" in subgraph \"{}\" but not in subgraph \"{}\", which the COLLAPSE_FROM_ALL composition strategy does not allow",
                    entry.directive(),
                    supergraph.target_coordinate(target)?,
                    applied.subgraph,
                    missing.subgraph
                ),
            }
            .into());
        }
    }

    let applications: Vec<&Directive> = present
        .iter()
        .filter_map(|contribution| contribution.applications.as_ref())
        .flatten()
        .collect();
    if applications.is_empty() {
        return Ok(());
    }
    let merged = entry.process_field_directives(&applications)?;
    debug!(
        "Applying {} merged \"@{}\" application(s) to \"{}\"",
        merged.len(),
        entry.directive(),
        supergraph.target_coordinate(target)?
    );
    for arguments in merged {
        supergraph.apply_directive_with_arguments(target, entry.directive().clone(), arguments)?;
    }
    Ok(())
}
