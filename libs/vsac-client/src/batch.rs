//! Windowed batch retrieval

use crate::client::{normalize_identifier, VsacClient};
use crate::credentials::Credentials;
use crate::models::ValueSetResult;
use crate::source::ValueSetSource;
use futures::future::join_all;
use std::collections::HashMap;

/// Number of single-OID requests in flight at once.
pub const BATCH_WINDOW: usize = 3;

/// One entry per distinct input identifier, keyed exactly as given.
pub type BatchResult = HashMap<String, ValueSetResult>;

impl<S: ValueSetSource> VsacClient<S> {
    /// Retrieve the latest version of every identifier.
    ///
    /// Requests run [`BATCH_WINDOW`] at a time and a window starts only after
    /// the previous one has settled. A failing OID becomes an entry whose
    /// content is `RetrievalFailed`; the batch itself never fails.
    /// Identifiers that normalize to the same OID share one request.
    pub async fn retrieve_many<I: AsRef<str>>(
        &self,
        identifiers: &[I],
        credentials: &Credentials,
    ) -> BatchResult {
        let groups = group_by_oid(identifiers);
        let mut results = BatchResult::with_capacity(identifiers.len());

        tracing::info!(
            requested = identifiers.len(),
            distinct = groups.len(),
            "Starting batch value set retrieval"
        );

        for window in groups.chunks(BATCH_WINDOW) {
            let settled = join_all(window.iter().map(|(oid, _)| async move {
                self.retrieve(oid, None, credentials).await
            }))
            .await;

            for ((oid, aliases), outcome) in window.iter().zip(settled) {
                let entry = match outcome {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::warn!(
                            %oid,
                            kind = %e.kind(),
                            error = %e,
                            "Value set retrieval failed"
                        );
                        ValueSetResult::retrieval_failed(oid, &e)
                    }
                };
                for alias in aliases {
                    results.insert(alias.to_string(), entry.clone());
                }
            }
        }

        results
    }
}

/// Distinct OIDs in first-seen order, each with the raw inputs that name it.
fn group_by_oid<I: AsRef<str>>(identifiers: &[I]) -> Vec<(&str, Vec<&str>)> {
    let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
    for raw in identifiers.iter().map(AsRef::as_ref) {
        let oid = normalize_identifier(raw);
        match groups.iter_mut().find(|(existing, _)| *existing == oid) {
            Some((_, aliases)) => {
                if !aliases.contains(&raw) {
                    aliases.push(raw);
                }
            }
            None => groups.push((oid, vec![raw])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_duplicates_and_aliases() {
        let input = ["1.2.3", "urn:oid:1.2.3", "1.2.4", "1.2.3"];
        let groups = group_by_oid(&input);
        assert_eq!(
            groups,
            vec![
                ("1.2.3", vec!["1.2.3", "urn:oid:1.2.3"]),
                ("1.2.4", vec!["1.2.4"]),
            ]
        );
    }
}
