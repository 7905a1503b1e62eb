//! Error types for registry operations

use crate::key::TypeKey;

/// Errors that can occur while resolving dependencies
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiError {
    #[error("Dependency not registered: {key}")]
    NotFound { key: String },

    #[error("Failed to construct {key}: {reason}")]
    ConstructionFailed { key: String, reason: String },

    #[error("Circular dependency detected: {}", chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    #[error("Resolution of {key} exceeded the maximum depth of {depth}")]
    DepthExceeded { key: String, depth: usize },

    #[error("{key} has an async factory and must be resolved asynchronously")]
    AsyncFactoryRequired { key: String },

    #[error("Type mismatch while resolving {key}")]
    TypeMismatch { key: String },

    #[error("Module {module} is invalid: {reason}")]
    InvalidModule { module: String, reason: String },
}

pub type DiResult<T> = Result<T, DiError>;

impl DiError {
    pub(crate) fn not_found(key: &TypeKey) -> Self {
        DiError::NotFound {
            key: key.to_string(),
        }
    }

    pub(crate) fn circular(chain: &[TypeKey], repeated: &TypeKey) -> Self {
        let mut names: Vec<String> = chain
            .iter()
            .skip_while(|k| *k != repeated)
            .map(ToString::to_string)
            .collect();
        names.push(repeated.to_string());
        DiError::CircularDependency { chain: names }
    }

    /// Convert an error returned by a factory into a registry error.
    ///
    /// Errors raised by nested resolutions keep their identity when they must
    /// abort the whole chain.
    pub(crate) fn from_factory(key: &TypeKey, err: anyhow::Error) -> Self {
        match err.downcast::<DiError>() {
            Ok(inner) if inner.is_fatal() => inner,
            Ok(inner) => DiError::ConstructionFailed {
                key: key.to_string(),
                reason: inner.to_string(),
            },
            Err(err) => DiError::ConstructionFailed {
                key: key.to_string(),
                reason: format!("{err:#}"),
            },
        }
    }

    /// Whether this error aborts the entire resolution chain, bypassing fallbacks
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DiError::CircularDependency { .. } | DiError::DepthExceeded { .. }
        )
    }

    /// Whether this error only means "nothing is registered"
    pub fn is_not_found(&self) -> bool {
        matches!(self, DiError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A;
    struct B;

    #[test]
    fn test_circular_display() {
        let a = TypeKey::of::<A>();
        let b = TypeKey::of::<B>();
        let err = DiError::circular(&[a.clone(), b], &a);

        let text = err.to_string();
        assert!(text.starts_with("Circular dependency detected: "));
        assert_eq!(text.matches(" -> ").count(), 2);
        assert!(err.is_fatal());
    }

    #[test]
    fn test_circular_trims_unrelated_prefix() {
        let a = TypeKey::of::<A>();
        let b = TypeKey::of::<B>();
        let root = TypeKey::named::<A>("root");
        let err = DiError::circular(&[root, a, b.clone()], &b);

        match err {
            DiError::CircularDependency { chain } => assert_eq!(chain.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_factory_error_is_wrapped() {
        let key = TypeKey::of::<A>();
        let err = DiError::from_factory(&key, anyhow::anyhow!("connection refused"));
        assert!(matches!(
            err,
            DiError::ConstructionFailed { ref reason, .. } if reason == "connection refused"
        ));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_fatal_error_passes_through() {
        let key = TypeKey::of::<A>();
        let cycle = DiError::CircularDependency {
            chain: vec!["A".into(), "B".into(), "A".into()],
        };
        let err = DiError::from_factory(&key, anyhow::Error::new(cycle.clone()));
        assert_eq!(err, cycle);
    }

    #[test]
    fn test_nested_not_found_becomes_construction_failure() {
        let key = TypeKey::of::<A>();
        let nested = DiError::not_found(&TypeKey::of::<B>());
        let err = DiError::from_factory(&key, anyhow::Error::new(nested));
        assert!(matches!(err, DiError::ConstructionFailed { .. }));
    }
}
