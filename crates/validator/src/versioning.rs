//! Idempotent version rows.

use nimbus_core::FunctionVersion;
use nimbus_ports::{PortsError, VersionStore};

/// Return the version row for `(function_name, content_hash)`, creating it on
/// first sight.
///
/// The flag is `true` when a new row was inserted. A concurrent insert of the
/// same pair is resolved by re-reading the winner's row.
pub async fn get_or_create_version(
    store: &dyn VersionStore,
    function_name: &str,
    content_hash: &str,
    size_bytes: u64,
    deployed_by: Option<String>,
    notes: Option<String>,
) -> Result<(FunctionVersion, bool), PortsError> {
    if let Some(existing) = store.find(function_name, content_hash).await? {
        return Ok((existing, false));
    }

    let version = FunctionVersion::new(
        function_name,
        content_hash,
        size_bytes,
        deployed_by,
        notes,
    );
    match store.insert(&version).await {
        Ok(()) => {
            tracing::info!(
                function = function_name,
                version = %version.id,
                hash = version.short_hash(),
                "recorded new function version"
            );
            Ok((version, true))
        }
        Err(PortsError::AlreadyExists { .. }) => store
            .find(function_name, content_hash)
            .await?
            .map(|v| (v, false))
            .ok_or_else(|| PortsError::not_found("FunctionVersion", content_hash)),
        Err(e) => Err(e),
    }
}
