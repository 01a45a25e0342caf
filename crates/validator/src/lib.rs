//! # Nimbus Validator
//!
//! Admission checks for submitted function source, plus content-addressed
//! versioning.
//!
//! [`validate`] runs a short-circuiting pipeline:
//!
//! 1. filename shape and stem ([`filename`])
//! 2. size and UTF-8 encoding
//! 3. TypeScript parse, SDK import, single `register({ name })` call ([`source`])
//! 4. advisory denylist scan, reported as [`Warning`]s
//!
//! ```rust
//! let src = br#"
//! import { register } from "@nimbus/sdk";
//! register({ name: "double", handler: (p) => ({ value: p.value * 2 }) });
//! "#;
//! let ok = nimbus_validator::validate("double.ts", src, 1024 * 1024).unwrap();
//! assert_eq!(ok.function_name, "double");
//! assert!(ok.warnings.is_empty());
//! ```

pub mod error;
pub mod filename;
pub mod hash;
pub mod source;
pub mod versioning;

pub use error::ValidationError;
pub use hash::content_hash;
pub use source::{Warning, WarningKind};
pub use versioning::get_or_create_version;

/// Default upper bound on source size.
pub const DEFAULT_MAX_SIZE_BYTES: usize = 1024 * 1024;

/// Module specifier every function must import from.
pub const SDK_MODULE: &str = "@nimbus/sdk";

/// Outcome of a successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validated {
    /// Name passed to `register`, equal to the filename stem.
    pub function_name: String,
    /// Advisory findings. Never cause rejection.
    pub warnings: Vec<Warning>,
}

/// Validate a submitted function file.
pub fn validate(
    filename: &str,
    content: &[u8],
    max_size_bytes: usize,
) -> Result<Validated, ValidationError> {
    let stem = filename::validate_filename(filename)?;

    if content.len() > max_size_bytes {
        return Err(ValidationError::TooLarge {
            size: content.len(),
            max: max_size_bytes,
        });
    }
    let text = std::str::from_utf8(content).map_err(|e| ValidationError::InvalidEncoding {
        valid_up_to: e.valid_up_to(),
    })?;

    let analysis = source::analyze(filename, text)?;

    if !analysis.imports_sdk {
        return Err(ValidationError::MissingSdkImport);
    }

    let registration = match analysis.registrations.as_slice() {
        [] => return Err(ValidationError::MissingRegistration),
        [only] => only,
        many => {
            return Err(ValidationError::DuplicateRegistration {
                lines: many.iter().map(|r| r.line).collect(),
            });
        }
    };

    let name = registration
        .name
        .as_ref()
        .map_err(|reason| ValidationError::InvalidRegistration {
            line: registration.line,
            reason: reason.clone(),
        })?;

    if name != stem {
        return Err(ValidationError::NameMismatch {
            expected: stem.to_owned(),
            found: name.clone(),
        });
    }

    for w in &analysis.warnings {
        tracing::debug!(file = filename, line = w.line, kind = ?w.kind, "{}", w.message);
    }

    Ok(Validated {
        function_name: name.clone(),
        warnings: analysis.warnings,
    })
}
