use std::fmt;
use std::fmt::Write;

use apollo_compiler::InvalidNameError;

/// Create an internal error.
///
/// # Example
/// ```rust,ignore
/// use crate::internal_error;
/// use crate::error::FederationError;
/// # fn may_be_none() -> Option<()> { None }
///
/// const NAME: &str = "the thing";
/// let result: Result<(), FederationError> = may_be_none()
///     .ok_or_else(|| internal_error!("Expected {NAME} to be Some"));
/// ```
#[macro_export]
macro_rules! internal_error {
    ( $( $arg:tt )+ ) => {
        $crate::error::FederationError::internal(format!( $( $arg )+ ))
    }
}

/// Break out of the current function, returning an internal error.
#[macro_export]
macro_rules! bail {
    ( $( $arg:tt )+ ) => {
        return Err($crate::internal_error!( $( $arg )+ ).into())
    }
}

/// A safe assertion: in debug mode, it panicks on failure, and in production, it returns an
/// internal error.
///
/// Treat this as an assertion. It must only be used for conditions that *should never happen*
/// in normal operation.
#[macro_export]
macro_rules! ensure {
    ( $expr:expr, $( $arg:tt )+ ) => {
        #[cfg(debug_assertions)]
        {
            if false {
                return Err($crate::error::FederationError::internal("ensure!() must be used in a function that returns a Result").into());
            }
            assert!($expr, $( $arg )+);
        }

        #[cfg(not(debug_assertions))]
        if !$expr {
            $crate::bail!( $( $arg )+ );
        }
    }
}

/// Stable identifiers for every error this crate reports.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumIter,
    strum_macros::IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Internal,
    InvalidGraphql,
    DirectiveCompositionInvalid,
    DirectiveMergeFailed,
    DuplicateFeatureInclusion,
    InvalidLinkDirectiveUsage,
    InvalidLinkIdentifier,
    TypeAlreadyExists,
    DirectiveDefinitionAlreadyExists,
    BuiltInModification,
    DetachedElement,
    DirectiveDefinitionInvalid,
    TypeDefinitionInvalid,
    DuplicateName,
    UndefinedType,
    DanglingTypeReference,
    InvalidDefaultValue,
    InterfaceFieldMissing,
    InterfaceFieldTypeMismatch,
    InterfaceFieldArgumentMismatch,
    EmptyType,
    InvalidRootType,
    UnknownDirective,
    InvalidDirectiveLocation,
    NonRepeatableDirectiveRepeated,
    UnknownDirectiveArgument,
    MissingRequiredArgument,
    InvalidArgumentValue,
    InvalidInputType,
    InvalidOutputType,
    InaccessibleReference,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SingleFederationError {
    #[error("An internal error has occurred, please report this bug to Apollo.\n\nDetails: {message}")]
    Internal { message: String },
    #[error("{message}")]
    InvalidGraphQL { message: String },
    #[error("{message}")]
    DirectiveCompositionInvalid { message: String },
    #[error("{message}")]
    DirectiveMergeFailed { message: String },
    #[error("{message}")]
    DuplicateFeatureInclusion { message: String },
    #[error("{message}")]
    InvalidLinkDirectiveUsage { message: String },
    #[error("{message}")]
    InvalidLinkIdentifier { message: String },
    #[error("{message}")]
    TypeAlreadyExists { message: String },
    #[error("{message}")]
    DirectiveDefinitionAlreadyExists { message: String },
    #[error("{message}")]
    BuiltInModification { message: String },
    #[error("{message}")]
    DetachedElement { message: String },
    #[error("{message}")]
    DirectiveDefinitionInvalid { message: String },
    #[error("{message}")]
    TypeDefinitionInvalid { message: String },
    #[error("{message}")]
    DuplicateName { message: String },
    #[error("{message}")]
    UndefinedType { message: String },
    #[error("{message}")]
    DanglingTypeReference { message: String },
    #[error("{message}")]
    InvalidDefaultValue { message: String },
    #[error("{message}")]
    InterfaceFieldMissing { message: String },
    #[error("{message}")]
    InterfaceFieldTypeMismatch { message: String },
    #[error("{message}")]
    InterfaceFieldArgumentMismatch { message: String },
    #[error("{message}")]
    EmptyType { message: String },
    #[error("{message}")]
    InvalidRootType { message: String },
    #[error("{message}")]
    UnknownDirective { message: String },
    #[error("{message}")]
    InvalidDirectiveLocation { message: String },
    #[error("{message}")]
    NonRepeatableDirectiveRepeated { message: String },
    #[error("{message}")]
    UnknownDirectiveArgument { message: String },
    #[error("{message}")]
    MissingRequiredArgument { message: String },
    #[error("{message}")]
    InvalidArgumentValue { message: String },
    #[error("{message}")]
    InvalidInputType { message: String },
    #[error("{message}")]
    InvalidOutputType { message: String },
    #[error("{message}")]
    InaccessibleReference { message: String },
}

impl SingleFederationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Internal { .. } => ErrorCode::Internal,
            Self::InvalidGraphQL { .. } => ErrorCode::InvalidGraphql,
            Self::DirectiveCompositionInvalid { .. } => ErrorCode::DirectiveCompositionInvalid,
            Self::DirectiveMergeFailed { .. } => ErrorCode::DirectiveMergeFailed,
            Self::DuplicateFeatureInclusion { .. } => ErrorCode::DuplicateFeatureInclusion,
            Self::InvalidLinkDirectiveUsage { .. } => ErrorCode::InvalidLinkDirectiveUsage,
            Self::InvalidLinkIdentifier { .. } => ErrorCode::InvalidLinkIdentifier,
            Self::TypeAlreadyExists { .. } => ErrorCode::TypeAlreadyExists,
            Self::DirectiveDefinitionAlreadyExists { .. } => {
                ErrorCode::DirectiveDefinitionAlreadyExists
            }
            Self::BuiltInModification { .. } => ErrorCode::BuiltInModification,
            Self::DetachedElement { .. } => ErrorCode::DetachedElement,
            Self::DirectiveDefinitionInvalid { .. } => ErrorCode::DirectiveDefinitionInvalid,
            Self::TypeDefinitionInvalid { .. } => ErrorCode::TypeDefinitionInvalid,
            Self::DuplicateName { .. } => ErrorCode::DuplicateName,
            Self::UndefinedType { .. } => ErrorCode::UndefinedType,
            Self::DanglingTypeReference { .. } => ErrorCode::DanglingTypeReference,
            Self::InvalidDefaultValue { .. } => ErrorCode::InvalidDefaultValue,
            Self::InterfaceFieldMissing { .. } => ErrorCode::InterfaceFieldMissing,
            Self::InterfaceFieldTypeMismatch { .. } => ErrorCode::InterfaceFieldTypeMismatch,
            Self::InterfaceFieldArgumentMismatch { .. } => {
                ErrorCode::InterfaceFieldArgumentMismatch
            }
            Self::EmptyType { .. } => ErrorCode::EmptyType,
            Self::InvalidRootType { .. } => ErrorCode::InvalidRootType,
            Self::UnknownDirective { .. } => ErrorCode::UnknownDirective,
            Self::InvalidDirectiveLocation { .. } => ErrorCode::InvalidDirectiveLocation,
            Self::NonRepeatableDirectiveRepeated { .. } => {
                ErrorCode::NonRepeatableDirectiveRepeated
            }
            Self::UnknownDirectiveArgument { .. } => ErrorCode::UnknownDirectiveArgument,
            Self::MissingRequiredArgument { .. } => ErrorCode::MissingRequiredArgument,
            Self::InvalidArgumentValue { .. } => ErrorCode::InvalidArgumentValue,
            Self::InvalidInputType { .. } => ErrorCode::InvalidInputType,
            Self::InvalidOutputType { .. } => ErrorCode::InvalidOutputType,
            Self::InaccessibleReference { .. } => ErrorCode::InaccessibleReference,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipleFederationErrors {
    pub errors: Vec<SingleFederationError>,
}

impl MultipleFederationErrors {
    pub fn new() -> Self {
        Self { errors: vec![] }
    }

    pub fn push(&mut self, error: impl Into<FederationError>) {
        match error.into() {
            FederationError::SingleFederationError(error) => {
                self.errors.push(error);
            }
            FederationError::MultipleFederationErrors(errors) => {
                self.errors.extend(errors.errors);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn codes(&self) -> impl Iterator<Item = ErrorCode> + '_ {
        self.errors.iter().map(|error| error.code())
    }

    pub fn into_result(self) -> Result<(), Self> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for MultipleFederationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "The following errors occurred:")?;
        for error in &self.errors {
            let code = error.code();
            let error = error.to_string();
            let mut lines = error.lines();
            if let Some(first) = lines.next() {
                write!(f, "\n  - [{code}] {first}")?;
            }
            for line in lines {
                write!(f, "\n    {line}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for MultipleFederationErrors {}

impl FromIterator<SingleFederationError> for MultipleFederationErrors {
    fn from_iter<T: IntoIterator<Item = SingleFederationError>>(iter: T) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

impl From<SingleFederationError> for MultipleFederationErrors {
    fn from(value: SingleFederationError) -> Self {
        Self {
            errors: vec![value],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FederationError {
    #[error(transparent)]
    SingleFederationError(#[from] SingleFederationError),
    #[error(transparent)]
    MultipleFederationErrors(#[from] MultipleFederationErrors),
}

impl FederationError {
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        SingleFederationError::Internal {
            message: message.into(),
        }
        .into()
    }

    /// All the individual errors, flattened.
    pub fn errors(&self) -> Vec<&SingleFederationError> {
        match self {
            Self::SingleFederationError(error) => vec![error],
            Self::MultipleFederationErrors(errors) => errors.errors.iter().collect(),
        }
    }

    pub fn codes(&self) -> Vec<ErrorCode> {
        self.errors().into_iter().map(|error| error.code()).collect()
    }

    /// Renders each error on its own line, prefixed with its code.
    pub fn to_report(&self) -> String {
        let mut report = String::new();
        for error in self.errors() {
            let _ = writeln!(report, "[{}] {}", error.code(), error);
        }
        report
    }
}

impl From<InvalidNameError> for FederationError {
    fn from(err: InvalidNameError) -> Self {
        SingleFederationError::InvalidGraphQL {
            message: format!("Invalid GraphQL name \"{}\"", err.name),
        }
        .into()
    }
}
