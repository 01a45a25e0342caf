//! Filename rules.

use crate::error::ValidationError;

/// Words that cannot be a function name.
const RESERVED: &[&str] = &[
    // ECMAScript keywords and strict-mode reserved words
    "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default",
    "delete", "do", "else", "enum", "export", "extends", "false", "finally", "for", "function",
    "if", "implements", "import", "in", "instanceof", "interface", "let", "new", "null",
    "package", "private", "protected", "public", "return", "static", "super", "switch", "this",
    "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield",
    // Restricted identifiers
    "arguments", "eval", "undefined", "NaN", "Infinity",
    // TypeScript contextual keywords that break declarations
    "abstract", "any", "as", "async", "boolean", "constructor", "declare", "keyof", "module",
    "namespace", "never", "number", "readonly", "require", "string", "symbol", "type", "unknown",
];

/// Check `filename` and return its stem.
pub fn validate_filename(filename: &str) -> Result<&str, ValidationError> {
    if filename.contains('\0') {
        return Err(ValidationError::filename(filename, "contains a NUL byte"));
    }
    if filename.contains('/') || filename.contains('\\') {
        return Err(ValidationError::filename(filename, "must not contain path separators"));
    }
    if filename.contains("..") {
        return Err(ValidationError::filename(filename, "must not contain '..'"));
    }
    let Some(stem) = filename.strip_suffix(".ts") else {
        return Err(ValidationError::filename(filename, "must end in .ts"));
    };
    if stem.is_empty() {
        return Err(ValidationError::filename(filename, "name is empty"));
    }
    if !is_identifier(stem) {
        return Err(ValidationError::filename(
            filename,
            "name must match [A-Za-z_][A-Za-z0-9_]*",
        ));
    }
    if is_reserved(stem) {
        return Err(ValidationError::filename(
            filename,
            format!("'{stem}' is a reserved word"),
        ));
    }
    Ok(stem)
}

/// `[A-Za-z_][A-Za-z0-9_]*`
#[must_use]
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Reserved JavaScript/TypeScript word.
#[must_use]
pub fn is_reserved(s: &str) -> bool {
    RESERVED.contains(&s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("double.ts", "double")]
    #[case("_private.ts", "_private")]
    #[case("sendEmail2.ts", "sendEmail2")]
    fn accepts(#[case] filename: &str, #[case] stem: &str) {
        assert_eq!(validate_filename(filename).unwrap(), stem);
    }

    #[rstest]
    #[case("double.js")]
    #[case("double")]
    #[case(".ts")]
    #[case("../double.ts")]
    #[case("dir/double.ts")]
    #[case("dir\\double.ts")]
    #[case("dou\0ble.ts")]
    #[case("2fast.ts")]
    #[case("my-func.ts")]
    #[case("types.d.ts")]
    #[case("class.ts")]
    #[case("eval.ts")]
    #[case("ünï.ts")]
    fn rejects(#[case] filename: &str) {
        assert!(
            matches!(
                validate_filename(filename),
                Err(ValidationError::InvalidFilename { .. })
            ),
            "{filename:?} should be rejected"
        );
    }
}
