use std::sync::LazyLock;

use regex::Regex;
use tablesmith_common::SchemaError;

/// Longest identifier MySQL accepts for tables, columns, indexes and constraints.
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Sequences that would let a free-form column definition escape its statement.
const FORBIDDEN_SEQUENCES: [&str; 3] = [";", "--", "/*"];

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// Guard rules applied to every name and definition accepted from callers.
pub struct IdentifierGuard;

impl IdentifierGuard {
    /// Check that `name` is a plain identifier no longer than 64 characters.
    pub fn check(name: &str) -> Result<(), SchemaError> {
        if name.len() > MAX_IDENTIFIER_LEN || !IDENTIFIER.is_match(name) {
            return Err(SchemaError::InvalidIdentifier(name.to_string()));
        }
        Ok(())
    }

    /// Check every name in `names`, reporting the first offender.
    pub fn check_all<S: AsRef<str>>(names: &[S]) -> Result<(), SchemaError> {
        names.iter().try_for_each(|n| Self::check(n.as_ref()))
    }

    /// Reject column definitions containing statement terminators or comments.
    ///
    /// This does not validate the SQL itself; the database does that when the
    /// statement runs.
    pub fn check_definition(column: &str, definition: &str) -> Result<(), SchemaError> {
        if FORBIDDEN_SEQUENCES.iter().any(|s| definition.contains(s)) {
            return Err(SchemaError::ForbiddenSyntax {
                column: column.to_string(),
                definition: definition.to_string(),
            });
        }
        Ok(())
    }
}
