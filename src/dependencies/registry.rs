//! Dependency Registry (C6, `spec.md` §4.5).
//!
//! Promotes a confirmed candidate — or a manually constructed mapping not
//! derived from any candidate — into an `ApiDependency`. Grounded on the
//! teacher's confirm flow in `examples/kioku-aperture/src/interactive/mod.rs`,
//! which accepts a proposed change and writes it only after validating it
//! against the live catalog rather than trusting the proposal blindly.

use crate::error::Error;
use crate::model::{ApiDependency, DependencyCandidate, Id, Mapping};
use crate::store::Store;

/// Confirms `candidate` as a dependency, rejecting self-dependencies before
/// the store is touched (`Store::upsert_dependency` would also reject it,
/// but failing here keeps the error symmetric with `confirm_manual`'s check).
pub async fn confirm_candidate(
    store: &dyn Store,
    candidate: &DependencyCandidate,
    is_required: bool,
) -> Result<ApiDependency, Error> {
    confirm_manual(
        store,
        candidate.project_ref,
        candidate.source_api_ref,
        candidate.target_api_ref,
        candidate.mapping.clone(),
        is_required,
    )
    .await
}

/// Confirms a dependency assembled by hand — e.g. from the interactive
/// workflow's manual-mapping path — rather than from an analyzer candidate.
pub async fn confirm_manual(
    store: &dyn Store,
    project_ref: Id,
    source_api_ref: Id,
    target_api_ref: Id,
    mapping: Mapping,
    is_required: bool,
) -> Result<ApiDependency, Error> {
    if source_api_ref == target_api_ref {
        return Err(Error::self_dependency(source_api_ref.to_string()));
    }
    if mapping.is_empty() {
        return Err(Error::validation_error("a dependency must map at least one variable"));
    }

    // Confirm the endpoints are still live before writing the edge; a
    // candidate can outlive the Api it was generated against (re-ingest).
    store.get_api(source_api_ref).await?;
    store.get_api(target_api_ref).await?;

    let dependency = ApiDependency {
        id: Id::new_v4(),
        project_ref,
        source_api_ref,
        target_api_ref,
        mapping,
        is_required,
    };
    store.upsert_dependency(dependency).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CandidateOrigin, HttpMethod};
    use crate::store::InMemoryStore;

    async fn seeded_store() -> (InMemoryStore, Id, Id, Id) {
        let store = InMemoryStore::new();
        let project = store
            .create_project(crate::model::Project {
                id: Id::new_v4(),
                name: "p".to_string(),
                owner_ref: None,
            })
            .await
            .unwrap();
        let spec = crate::model::ApiSpec {
            id: Id::new_v4(),
            project_ref: project.id,
            version: "1".to_string(),
            spec_hash: "h".to_string(),
            src_ref: "s".to_string(),
        };
        let ops = vec![
            crate::store::IngestedOperation {
                method: HttpMethod::Post,
                path: "/orders".to_string(),
                op_id: None,
                summary: None,
                auth_scheme: None,
                request: crate::model::ApiRequest::default(),
                responses: vec![],
                variables: vec![],
            },
            crate::store::IngestedOperation {
                method: HttpMethod::Get,
                path: "/orders/{id}".to_string(),
                op_id: None,
                summary: None,
                auth_scheme: None,
                request: crate::model::ApiRequest::default(),
                responses: vec![],
                variables: vec![],
            },
        ];
        let apis = store.ingest_spec(spec, ops).await.unwrap();
        let producer = apis.iter().find(|a| a.path == "/orders").unwrap().id;
        let consumer = apis.iter().find(|a| a.path == "/orders/{id}").unwrap().id;
        (store, project.id, producer, consumer)
    }

    #[tokio::test]
    async fn confirming_self_reference_candidate_is_rejected() {
        let (store, project_ref, producer, _consumer) = seeded_store().await;
        let mut mapping = Mapping::new();
        mapping.insert("id".to_string(), "id".to_string());
        let candidate = DependencyCandidate {
            id: Id::new_v4(),
            project_ref,
            source_api_ref: producer,
            target_api_ref: producer,
            mapping,
            confidence: 0.9,
            reason: "test".to_string(),
            origin: CandidateOrigin::Deterministic,
        };
        let result = confirm_candidate(&store, &candidate, true).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn confirming_candidate_writes_dependency_and_retags_variable() {
        let (store, project_ref, producer, consumer) = seeded_store().await;
        store
            .set_variable_type(
                consumer,
                "id",
                crate::model::VariableLocation::Path,
                crate::model::VariableType::UserInput,
            )
            .await
            .ok();
        let mut mapping = Mapping::new();
        mapping.insert("id".to_string(), "id".to_string());
        let candidate = DependencyCandidate {
            id: Id::new_v4(),
            project_ref,
            source_api_ref: producer,
            target_api_ref: consumer,
            mapping,
            confidence: 0.6,
            reason: "test".to_string(),
            origin: CandidateOrigin::Deterministic,
        };
        let dependency = confirm_candidate(&store, &candidate, true).await.unwrap();
        assert_eq!(dependency.source_api_ref, producer);
        assert_eq!(dependency.target_api_ref, consumer);

        let deps = store.list_dependencies(project_ref).await.unwrap();
        assert_eq!(deps.len(), 1);
    }
}
