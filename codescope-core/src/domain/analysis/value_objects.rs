//! Analysis domain value objects
//!
//! Identifiers, closed enumerations, and the status state machines shared by
//! codebases, repositories, analyses, and findings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Wrap an existing UUID
            pub fn new(id: Uuid) -> Self {
                Self(id)
            }

            /// Generate a new random identifier
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            /// Get the inner UUID
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_identifier!(
    /// Codebase ID value object
    CodebaseId
);
uuid_identifier!(
    /// Repository ID value object
    RepositoryId
);
uuid_identifier!(
    /// Analysis ID value object
    AnalysisId
);
uuid_identifier!(
    /// Finding ID value object
    FindingId
);

/// Error returned when a status token cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind} value: {value}")]
pub struct UnknownTokenError {
    pub kind: &'static str,
    pub value: String,
}

/// Error returned when an invalid status transition is attempted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {entity} transition from {from} to {to}")]
pub struct TransitionError {
    pub entity: &'static str,
    pub from: String,
    pub to: String,
}

/// Implements `as_str`, `Display` and `FromStr` over the snake_case wire tokens.
macro_rules! token_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $token:literal),+ $(,)? }) => {
        impl $name {
            /// Every variant, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Canonical snake_case token
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $token),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownTokenError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($token => Ok($name::$variant),)+
                    other => Err(UnknownTokenError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

/// Codebase lifecycle status
///
/// ```text
/// pending ──► ingesting ──► analyzing ──► ready
///    │            │            ▲   │        │
///    └────────────┴────────────┘   │        │
///                 ready ───────────┘◄───────┘
///   (any) ──► error ──► analyzing | ingesting | ready
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodebaseStatus {
    Pending,
    Ingesting,
    Analyzing,
    Ready,
    Error,
}

token_enum!(CodebaseStatus, "codebase status", {
    Pending => "pending",
    Ingesting => "ingesting",
    Analyzing => "analyzing",
    Ready => "ready",
    Error => "error",
});

impl CodebaseStatus {
    /// Returns the set of valid target states from the current state.
    ///
    /// `analyzing → analyzing` is deliberately absent: a codebase hosts at most
    /// one in-flight analysis.
    pub fn valid_transitions(&self) -> &'static [CodebaseStatus] {
        match self {
            Self::Pending => &[Self::Ingesting, Self::Analyzing, Self::Error],
            Self::Ingesting => &[Self::Analyzing, Self::Ready, Self::Error],
            Self::Analyzing => &[Self::Ready, Self::Error],
            Self::Ready => &[Self::Ingesting, Self::Analyzing, Self::Error],
            Self::Error => &[Self::Ingesting, Self::Analyzing, Self::Ready],
        }
    }

    /// Check whether transitioning to `target` is allowed from the current state.
    pub fn can_transition_to(&self, target: CodebaseStatus) -> bool {
        self.valid_transitions().contains(&target)
    }
}

/// Repository lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepositoryStatus {
    Pending,
    Cloning,
    Ready,
    Error,
    Stale,
}

token_enum!(RepositoryStatus, "repository status", {
    Pending => "pending",
    Cloning => "cloning",
    Ready => "ready",
    Error => "error",
    Stale => "stale",
});

impl RepositoryStatus {
    /// Returns the set of valid target states from the current state.
    ///
    /// Every state may re-enter `cloning` at the start of a run, including
    /// `cloning` itself when a previous worker died mid-acquisition.
    pub fn valid_transitions(&self) -> &'static [RepositoryStatus] {
        match self {
            Self::Pending => &[Self::Cloning],
            Self::Cloning => &[Self::Cloning, Self::Ready, Self::Error],
            Self::Ready => &[Self::Cloning, Self::Stale, Self::Error],
            Self::Error => &[Self::Cloning],
            Self::Stale => &[Self::Cloning],
        }
    }

    pub fn can_transition_to(&self, target: RepositoryStatus) -> bool {
        self.valid_transitions().contains(&target)
    }
}

/// Analysis execution status
///
/// ```text
/// queued ──► running ──► completed
///   │           ├──────► failed
///   └───────────┴──────► cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

token_enum!(AnalysisStatus, "analysis status", {
    Queued => "queued",
    Running => "running",
    Completed => "completed",
    Failed => "failed",
    Cancelled => "cancelled",
});

impl AnalysisStatus {
    pub fn valid_transitions(&self) -> &'static [AnalysisStatus] {
        match self {
            Self::Queued => &[Self::Running, Self::Cancelled],
            Self::Running => &[Self::Completed, Self::Failed, Self::Cancelled],
            Self::Completed | Self::Failed | Self::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, target: AnalysisStatus) -> bool {
        self.valid_transitions().contains(&target)
    }

    /// Whether this status represents a terminal (final) state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Kind of analysis requested; selects the reviewer instruction block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    Full,
    Incremental,
    Security,
    Dependencies,
    DeadCode,
    Architecture,
}

token_enum!(AnalysisType, "analysis type", {
    Full => "full",
    Incremental => "incremental",
    Security => "security",
    Dependencies => "dependencies",
    DeadCode => "dead_code",
    Architecture => "architecture",
});

/// Source-control provider hosting a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepositoryProvider {
    Github,
    Gitlab,
    Bitbucket,
    AzureDevops,
    /// Already on local disk; scanned in place
    Local,
}

token_enum!(RepositoryProvider, "repository provider", {
    Github => "github",
    Gitlab => "gitlab",
    Bitbucket => "bitbucket",
    AzureDevops => "azure_devops",
    Local => "local",
});

/// Finding severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingSeverity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

token_enum!(FindingSeverity, "finding severity", {
    Critical => "critical",
    High => "high",
    Medium => "medium",
    Low => "low",
    Info => "info",
});

impl FindingSeverity {
    /// Points a finding of this severity deducts from a health score.
    pub fn weight(&self) -> u32 {
        match self {
            Self::Critical => 15,
            Self::High => 10,
            Self::Medium => 5,
            Self::Low => 2,
            Self::Info => 1,
        }
    }

    /// Map a free-text severity token onto the closed enumeration.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace;
    /// anything unrecognised becomes [`FindingSeverity::Info`].
    pub fn from_token(token: &str) -> Self {
        normalize_token(token).parse().unwrap_or(Self::Info)
    }
}

/// Finding category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingCategory {
    Security,
    TechnicalDebt,
    DeadCode,
    Dependency,
    Architecture,
    Performance,
    Maintainability,
    Consolidation,
    Compliance,
}

token_enum!(FindingCategory, "finding category", {
    Security => "security",
    TechnicalDebt => "technical_debt",
    DeadCode => "dead_code",
    Dependency => "dependency",
    Architecture => "architecture",
    Performance => "performance",
    Maintainability => "maintainability",
    Consolidation => "consolidation",
    Compliance => "compliance",
});

impl FindingCategory {
    /// Map a free-text category token onto the closed enumeration.
    ///
    /// `Technical-Debt`, `technical debt` and `TECHNICAL_DEBT` all map to
    /// [`FindingCategory::TechnicalDebt`]; unknown tokens default to it too.
    pub fn from_token(token: &str) -> Self {
        normalize_token(token)
            .parse()
            .unwrap_or(Self::TechnicalDebt)
    }
}

/// Triage status of a finding; only ever set to `open` by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Ignored,
    FalsePositive,
}

token_enum!(FindingStatus, "finding status", {
    Open => "open",
    InProgress => "in_progress",
    Resolved => "resolved",
    Ignored => "ignored",
    FalsePositive => "false_positive",
});

fn normalize_token(token: &str) -> String {
    token
        .trim()
        .to_ascii_lowercase()
        .replace(['-', ' '], "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_terminal_states_have_no_exits() {
        for status in [
            AnalysisStatus::Completed,
            AnalysisStatus::Failed,
            AnalysisStatus::Cancelled,
        ] {
            assert!(status.is_terminal());
            assert!(status.valid_transitions().is_empty());
        }
        assert!(AnalysisStatus::Queued.can_transition_to(AnalysisStatus::Running));
        assert!(!AnalysisStatus::Queued.can_transition_to(AnalysisStatus::Completed));
    }

    #[test]
    fn test_codebase_rejects_second_analysis() {
        assert!(!CodebaseStatus::Analyzing.can_transition_to(CodebaseStatus::Analyzing));
        assert!(CodebaseStatus::Ready.can_transition_to(CodebaseStatus::Analyzing));
        assert!(CodebaseStatus::Error.can_transition_to(CodebaseStatus::Analyzing));
        assert!(CodebaseStatus::Analyzing.can_transition_to(CodebaseStatus::Ready));
    }

    #[test]
    fn test_repository_can_always_reenter_cloning() {
        for status in RepositoryStatus::ALL {
            assert!(status.can_transition_to(RepositoryStatus::Cloning));
        }
        assert!(!RepositoryStatus::Pending.can_transition_to(RepositoryStatus::Ready));
    }

    #[test]
    fn test_token_round_trip_through_display() {
        assert_eq!(AnalysisType::DeadCode.to_string(), "dead_code");
        assert_eq!("dead_code".parse::<AnalysisType>(), Ok(AnalysisType::DeadCode));
        assert!("unknown".parse::<AnalysisStatus>().is_err());
    }

    #[test]
    fn test_severity_weights() {
        assert_eq!(FindingSeverity::Critical.weight(), 15);
        assert_eq!(FindingSeverity::High.weight(), 10);
        assert_eq!(FindingSeverity::Medium.weight(), 5);
        assert_eq!(FindingSeverity::Low.weight(), 2);
        assert_eq!(FindingSeverity::Info.weight(), 1);
    }

    #[test]
    fn test_free_text_mapping() {
        assert_eq!(FindingSeverity::from_token(" CRITICAL "), FindingSeverity::Critical);
        assert_eq!(FindingSeverity::from_token("severe"), FindingSeverity::Info);
        assert_eq!(
            FindingCategory::from_token("Technical-Debt"),
            FindingCategory::TechnicalDebt
        );
        assert_eq!(FindingCategory::from_token("dead code"), FindingCategory::DeadCode);
        assert_eq!(FindingCategory::from_token("style"), FindingCategory::TechnicalDebt);
    }
}
