//! Error types for the evaluator

use serde::{Deserialize, Serialize};

/// What kind of named thing a [`EvalError::Resource`] failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Cell,
    Animation,
    Part,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Cell => "cell",
            Self::Animation => "animation",
            Self::Part => "part",
        })
    }
}

/// Error type for evaluation and playback control
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum EvalError {
    /// Self-referential instance nesting or invalid loop/clock parameters
    #[error("Configuration error in {animation}: {reason}")]
    Configuration { animation: String, reason: String },

    /// Malformed part graph or keyframe ordering
    #[error("Structure error in {animation}: {reason}")]
    Structure { animation: String, reason: String },

    /// Unknown cell, animation or part reference
    #[error("Unknown {kind}: {name}")]
    Resource { kind: ResourceKind, name: String },

    /// Frame number outside the animation
    #[error("Frame {frame} is out of range [0, {last}]")]
    Range { frame: i32, last: i32 },

    /// Project JSON could not be parsed
    #[error("Format error: {reason}")]
    Format { reason: String },
}

impl EvalError {
    pub fn configuration(animation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            animation: animation.into(),
            reason: reason.into(),
        }
    }

    pub fn structure(animation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Structure {
            animation: animation.into(),
            reason: reason.into(),
        }
    }

    pub fn resource(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::Resource {
            kind,
            name: name.into(),
        }
    }

    /// Resource errors only affect the part that raised them; evaluation continues.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Resource { .. } | Self::Range { .. })
    }

    /// Get error category for logging
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::Structure { .. } => "structure",
            Self::Resource { .. } => "resource",
            Self::Range { .. } => "range",
            Self::Format { .. } => "format",
        }
    }
}

impl From<serde_json::Error> for EvalError {
    fn from(err: serde_json::Error) -> Self {
        Self::Format {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_recoverability() {
        let recoverable = EvalError::resource(ResourceKind::Cell, "arm");
        assert!(recoverable.is_recoverable());

        let fatal = EvalError::structure("pack/anim", "parent after child");
        assert!(!fatal.is_recoverable());
        assert!(!EvalError::configuration("pack/anim", "cycle").is_recoverable());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            EvalError::Range { frame: 12, last: 9 }.category(),
            "range"
        );
        assert_eq!(
            EvalError::resource(ResourceKind::Part, "x").category(),
            "resource"
        );
    }

    #[test]
    fn test_display() {
        let e = EvalError::resource(ResourceKind::Animation, "pack/missing");
        assert_eq!(e.to_string(), "Unknown animation: pack/missing");
        let r = EvalError::Range { frame: -1, last: 9 };
        assert_eq!(r.to_string(), "Frame -1 is out of range [0, 9]");
    }

    #[test]
    fn test_serialization() {
        let error = EvalError::configuration("a/b", "nested in itself");
        let serialized = serde_json::to_string(&error).unwrap();
        let deserialized: EvalError = serde_json::from_str(&serialized).unwrap();
        assert_eq!(error, deserialized);
    }
}
