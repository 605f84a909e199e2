//! Feature urls of `@link`/`@core` applications.
use std::fmt;
use std::str;

use apollo_compiler::Name;
use apollo_compiler::name;
use thiserror::Error;

use crate::error::FederationError;
use crate::error::SingleFederationError;

pub const APOLLO_SPEC_DOMAIN: &str = "https://specs.apollo.dev";

#[derive(Error, Debug, PartialEq)]
pub enum SpecError {
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<SpecError> for FederationError {
    fn from(value: SpecError) -> Self {
        SingleFederationError::InvalidLinkIdentifier {
            message: value.to_string(),
        }
        .into()
    }
}

/// What a feature url points at, independently of the version.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Identity {
    /// Everything before the feature name, e.g. `"https://specs.apollo.dev"`.
    pub domain: String,
    /// The feature name, e.g. `inaccessible`.
    pub name: Name,
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.domain, self.name)
    }
}

impl Identity {
    pub fn apollo(name: Name) -> Self {
        Self {
            domain: APOLLO_SPEC_DOMAIN.to_string(),
            name,
        }
    }

    pub fn core_identity() -> Self {
        Self::apollo(name!("core"))
    }

    pub fn link_identity() -> Self {
        Self::apollo(name!("link"))
    }

    pub fn federation_identity() -> Self {
        Self::apollo(name!("federation"))
    }

    pub fn inaccessible_identity() -> Self {
        Self::apollo(name!("inaccessible"))
    }

    /// Whether this identifies the feature that bootstraps a core schema.
    pub fn is_bootstrap(&self) -> bool {
        *self == Self::link_identity() || *self == Self::core_identity()
    }
}

/// A `major.minor` feature version.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl str::FromStr for Version {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s.split_once('.').ok_or_else(|| {
            SpecError::ParseError("version number is missing a dot (.)".to_string())
        })?;
        let major = major.parse::<u32>().map_err(|_| {
            SpecError::ParseError(format!("invalid major version number '{major}'"))
        })?;
        let minor = minor.parse::<u32>().map_err(|_| {
            SpecError::ParseError(format!("invalid minor version number '{minor}'"))
        })?;
        Ok(Version { major, minor })
    }
}

impl Version {
    /// Whether a feature at this version can be used where `required` is expected.
    ///
    ///     # use apollo_composition::link::spec::Version;
    ///     assert!(Version { major: 2, minor: 3 }.satisfies(&Version { major: 2, minor: 1 }));
    ///     assert!(!Version { major: 0, minor: 2 }.satisfies(&Version { major: 0, minor: 1 }));
    pub fn satisfies(&self, required: &Version) -> bool {
        if self.major == 0 {
            self == required
        } else {
            self.major == required.major && self.minor >= required.minor
        }
    }
}

/// A feature url: an identity at a given version.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Url {
    pub identity: Identity,
    pub version: Version,
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/v{}", self.identity, self.version)
    }
}

impl str::FromStr for Url {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| {
            SpecError::ParseError(format!("invalid `@link` specification url: {reason}"))
        };
        let url = url::Url::parse(s)
            .map_err(|e| SpecError::ParseError(format!("invalid specification url: {e}")))?;
        if !url.scheme().starts_with("http") {
            return Err(invalid("only http(s) urls are supported currently"));
        }
        let mut segments = url
            .path_segments()
            .ok_or_else(|| invalid("the url has no path"))?;
        let version = segments
            .next_back()
            .and_then(|segment| segment.strip_prefix('v'))
            .ok_or_else(|| {
                invalid("the last element of the path should be the version starting with a 'v'")
            })?
            .parse::<Version>()?;
        // Feature names are not validated as GraphQL names: urls with dashes are in use, and
        // only the `as:` alias (or imports) ever needs to be a valid name.
        let name = segments
            .next_back()
            .filter(|segment| !segment.is_empty())
            .map(|segment| Name::new_unchecked(segment))
            .ok_or_else(|| invalid("missing specification name"))?;
        let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
        let rest = segments.collect::<Vec<_>>();
        let domain = if rest.is_empty() {
            format!("{}://{host}", url.scheme())
        } else {
            format!("{}://{host}/{}", url.scheme(), rest.join("/"))
        };
        Ok(Url {
            identity: Identity { domain, name },
            version,
        })
    }
}

#[cfg(test)]
mod tests {
    use apollo_compiler::name;
    use rstest::rstest;

    use super::*;

    #[test]
    fn versions_order_by_major_then_minor() {
        assert!(Version { major: 0, minor: 1 } < Version { major: 0, minor: 2 });
        assert!(Version { major: 1, minor: 9 } < Version { major: 2, minor: 0 });
        assert!(Version { major: 1, minor: 4 }.satisfies(&Version { major: 1, minor: 0 }));
        assert!(!Version { major: 1, minor: 4 }.satisfies(&Version { major: 2, minor: 0 }));
    }

    #[rstest]
    #[case("foo", "version number is missing a dot (.)")]
    #[case("x.1", "invalid major version number 'x'")]
    #[case("1.2.3", "invalid minor version number '2.3'")]
    fn invalid_versions_are_explained(#[case] input: &str, #[case] message: &str) {
        assert_eq!(
            input.parse::<Version>(),
            Err(SpecError::ParseError(message.to_string()))
        );
    }

    #[test]
    fn parses_feature_urls() {
        assert_eq!(
            "https://specs.apollo.dev/inaccessible/v0.2"
                .parse::<Url>()
                .unwrap(),
            Url {
                identity: Identity::inaccessible_identity(),
                version: Version { major: 0, minor: 2 },
            }
        );
        let url = "http://example.com/nested/path/my-feature/v1.3?x=1"
            .parse::<Url>()
            .unwrap();
        assert_eq!(url.identity.domain, "http://example.com/nested/path");
        assert_eq!(url.identity.name.as_str(), "my-feature");
        assert_eq!(url.to_string(), "http://example.com/nested/path/my-feature/v1.3");
        assert!(Identity::apollo(name!("link")).is_bootstrap());
    }

    #[test]
    fn rejects_urls_without_a_version() {
        assert!("https://specs.apollo.dev/link".parse::<Url>().is_err());
        assert!("ftp://specs.apollo.dev/link/v1.0".parse::<Url>().is_err());
    }
}
