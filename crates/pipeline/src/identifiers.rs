//! Newtype domain identifiers.
//!
//! Every domain concept that has an identity is represented as a distinct newtype
//! wrapping a `String`. This prevents accidentally interchanging, say, a
//! [`CommitSha`] with a [`Fingerprint`] even though both are hex strings under
//! the hood.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id! {
    /// Identifies a source-control repository in `"owner/repo"` format.
    RepositoryId
}

string_id! {
    /// Path of a workflow definition file relative to the repository root
    /// (e.g. `".github/workflows/ci.yml"`).
    WorkflowPath
}

string_id! {
    /// A Git reference: a branch ref (`"refs/heads/main"`), a synthesized
    /// pull-request head ref (`"refs/pull/42/head"`), a tag, or a commit SHA.
    GitRef
}

string_id! {
    /// A Git commit SHA (40-character lowercase hex string).
    CommitSha
}

string_id! {
    /// Deterministic SHA-256 digest (lowercase hex) of the exact bytes of a
    /// fetched workflow file. Used for change/duplicate detection independent
    /// of commit metadata.
    Fingerprint
}

string_id! {
    /// The ordering partition key for the dispatch queue:
    /// `"{repository.full_name}/{workflow.path}"`.
    ///
    /// All events sharing a group key are delivered and processed strictly in
    /// publish order; distinct group keys carry no ordering relationship.
    GroupKey
}

string_id! {
    /// The name component of a dependency reference, without its version:
    /// `"actions/checkout"`, `"ubuntu-latest"`, `"node"`.
    DependencyName
}
