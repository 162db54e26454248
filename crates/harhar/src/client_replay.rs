//! Replay of archived requests against a live server.

use crate::config::TransformOptions;
use crate::error::HarError;
use crate::har::{Archive, Entry};
use crate::proxy::{send_for_record, HttpClient};
use crate::transform::transform_request;
use tracing::{debug, info};

/// Send every archived request in order and record what came back.
///
/// Each request is first rewritten with `options` (typically hostname, port
/// and protocol replacement). A request that cannot be delivered is recorded
/// with the transport failure sentinel and does not stop the run.
pub async fn client_replay(
    archive: &Archive,
    options: &TransformOptions,
    client: &HttpClient,
) -> Result<Archive, HarError> {
    let mut entries = Vec::with_capacity(archive.entries().len());
    for (i, entry) in archive.entries().iter().enumerate() {
        let request = transform_request(&entry.request, options)?;
        debug!("Replaying request {}: {} {}", i, request.method, request.url);
        let response = send_for_record(client, &request).await;
        debug!("Request {} answered with {}", i, response.status);
        entries.push(Entry::new(request, response));
    }
    info!("Replayed {} requests", entries.len());
    Ok(Archive::new(entries))
}
