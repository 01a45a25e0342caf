//! Admission errors.

/// Why a function file was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The filename is unusable.
    #[error("invalid filename '{filename}': {reason}")]
    InvalidFilename {
        /// Filename as submitted.
        filename: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Content exceeds the size limit.
    #[error("file is {size} bytes, limit is {max}")]
    TooLarge {
        /// Actual size.
        size: usize,
        /// Configured limit.
        max: usize,
    },

    /// Content is not UTF-8.
    #[error("file is not valid UTF-8 (first bad byte at offset {valid_up_to})")]
    InvalidEncoding {
        /// Length of the valid prefix.
        valid_up_to: usize,
    },

    /// Content does not parse as a TypeScript module.
    #[error("syntax error at {line}:{column}: {message}")]
    Syntax {
        /// 1-based line.
        line: usize,
        /// 1-based column.
        column: usize,
        /// Parser message.
        message: String,
    },

    /// No import of the SDK module.
    #[error("function must import from \"@nimbus/sdk\"")]
    MissingSdkImport,

    /// No `register(...)` call.
    #[error("function must call register({{ name: ... }}) once")]
    MissingRegistration,

    /// More than one `register(...)` call.
    #[error("register(...) is called {} times (lines {}), expected once", .lines.len(), join_lines(.lines))]
    DuplicateRegistration {
        /// Line of each call.
        lines: Vec<usize>,
    },

    /// The `register(...)` call is not of the accepted shape.
    #[error("invalid register(...) call at line {line}: {reason}")]
    InvalidRegistration {
        /// Line of the call.
        line: usize,
        /// What is wrong with it.
        reason: String,
    },

    /// Registered name differs from the filename stem.
    #[error("registered name '{found}' does not match filename '{expected}.ts'")]
    NameMismatch {
        /// Filename stem.
        expected: String,
        /// Name passed to `register`.
        found: String,
    },
}

fn join_lines(lines: &[usize]) -> String {
    lines
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl ValidationError {
    /// Convenience constructor for [`ValidationError::InvalidFilename`].
    pub fn filename(filename: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFilename {
            filename: filename.into(),
            reason: reason.into(),
        }
    }
}
