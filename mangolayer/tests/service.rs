use async_trait::async_trait;
use mangolayer::{memory::InMemoryStore, prelude::*, write::WriteResponse};
use serde_json::{Value, json};
use tokio::sync::Barrier;

fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

fn params(query: Value) -> Params {
    Params::with_query(doc(query))
}

fn id_of(document: &Document) -> String {
    document["_id"].as_str().unwrap().to_string()
}

fn names(documents: &[Document]) -> Vec<&str> {
    documents
        .iter()
        .map(|document| document["name"].as_str().unwrap())
        .collect()
}

async fn people() -> DocumentService<InMemoryStore> {
    let service = DocumentService::new(InMemoryStore::new());

    service
        .create(
            OneOrMany::Many(vec![
                doc(json!({ "name": "Alice", "age": 20, "team": "red" })),
                doc(json!({ "name": "Bob", "age": 25, "team": "blue" })),
                doc(json!({ "name": "Carol", "age": 30, "team": "red" })),
                doc(json!({ "name": "Dave", "age": 35, "team": "blue" })),
            ]),
            Params::new(),
        )
        .await
        .unwrap();

    service
}

async fn find_plain(service: &impl Service, query: Value) -> Vec<Document> {
    match service.find(params(query)).await.unwrap() {
        FindResult::Plain(documents) => documents,
        other => panic!("expected a plain result, got {other:?}"),
    }
}

#[test]
fn test_build_requires_model() {
    let err = DocumentService::<InMemoryStore>::builder().build().unwrap_err();

    assert_eq!(
        err,
        ServiceError::Initialization("Store `model` needs to be provided".to_string())
    );
}

#[test]
fn test_build_rejects_empty_id_field() {
    let err = DocumentService::builder()
        .model(InMemoryStore::new())
        .id("")
        .build()
        .unwrap_err();

    assert!(matches!(err, ServiceError::Initialization(_)));
}

#[test]
fn test_build_from_serialized_config() {
    let config: ServiceConfig = serde_json::from_value(json!({
        "id": "uuid",
        "events": ["testing"],
        "paginate": { "default": 10, "max": 50 },
    }))
    .unwrap();

    let service = DocumentService::builder()
        .model(InMemoryStore::new())
        .config(config)
        .build()
        .unwrap();

    assert_eq!(service.id_field(), "uuid");
    assert_eq!(service.events(), ["testing".to_string()]);
    assert_eq!(service.paginate(), Some(Paginate::new(10).with_max(50)));
    assert_eq!(service.default_query(), &doc(json!({ "uuid": { "$exists": true } })));
}

#[tokio::test]
async fn test_create_single_document() {
    let service = DocumentService::new(InMemoryStore::new());

    let created = service
        .create(doc(json!({ "text": "hi" })).into(), Params::new())
        .await
        .unwrap()
        .into_one()
        .unwrap();

    assert_eq!(created["text"], json!("hi"));
    assert!(created.native_id().is_some());
    assert!(created.revision().unwrap().starts_with("1-"));
}

#[tokio::test]
async fn test_create_many_documents_in_order() {
    let service = DocumentService::new(InMemoryStore::new());

    let created = service
        .create(
            OneOrMany::Many(vec![doc(json!({ "a": 1 })), doc(json!({ "a": 2 }))]),
            Params::new(),
        )
        .await
        .unwrap()
        .into_many()
        .unwrap();

    assert_eq!(created.len(), 2);
    assert_eq!(created[0]["a"], json!(1));
    assert_eq!(created[1]["a"], json!(2));
    assert_ne!(id_of(&created[0]), id_of(&created[1]));
}

#[tokio::test]
async fn test_create_nothing_skips_the_store() {
    let service = DocumentService::new(InMemoryStore::new());

    let created = service
        .create(OneOrMany::Many(Vec::new()), Params::new())
        .await
        .unwrap();

    assert_eq!(created, OneOrMany::Many(Vec::new()));
    assert_eq!(service.model().doc_count().await, 0);
}

#[tokio::test]
async fn test_create_with_select() {
    let service = DocumentService::new(InMemoryStore::new());

    let created = service
        .create(
            doc(json!({ "text": "hi", "extra": true })).into(),
            params(json!({ "$select": ["text"] })),
        )
        .await
        .unwrap()
        .into_one()
        .unwrap();

    let keys: Vec<&str> = created.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["text", "_id"]);
}

#[tokio::test]
async fn test_create_duplicate_id_is_bad_request() {
    let service = DocumentService::new(InMemoryStore::new());
    service
        .create(doc(json!({ "_id": "dup" })).into(), Params::new())
        .await
        .unwrap();

    let err = service
        .create(doc(json!({ "_id": "dup" })).into(), Params::new())
        .await
        .unwrap_err();

    assert_eq!(err, ServiceError::BadRequest("Document update conflict".to_string()));
}

#[tokio::test]
async fn test_custom_id_field_is_minted_and_resolvable() {
    let service = DocumentService::builder()
        .model(InMemoryStore::new())
        .id("uuid")
        .build()
        .unwrap();

    let created = service
        .create(doc(json!({ "name": "Alice" })).into(), Params::new())
        .await
        .unwrap()
        .into_one()
        .unwrap();

    let uuid = created["uuid"].as_str().unwrap().to_string();
    assert_eq!(uuid.len(), 48);
    assert!(uuid.chars().all(|c| c.is_ascii_hexdigit()));
    assert!(created.native_id().is_some());

    let fetched = service.get(&uuid, Params::new()).await.unwrap();
    assert_eq!(fetched, created);

    let updated = service
        .update(Some(&uuid), doc(json!({ "name": "Alicia", "uuid": "forged" })), Params::new())
        .await
        .unwrap()
        .into_one()
        .unwrap();

    assert_eq!(updated["uuid"], json!(uuid));
    assert_eq!(updated["_id"], created["_id"]);
    assert!(updated.revision().unwrap().starts_with("2-"));
}

#[tokio::test]
async fn test_custom_id_field_keeps_caller_value() {
    let service = DocumentService::builder()
        .model(InMemoryStore::new())
        .id("slug")
        .build()
        .unwrap();

    service
        .create(doc(json!({ "slug": "hello-world" })).into(), Params::new())
        .await
        .unwrap();

    let fetched = service.get("hello-world", Params::new()).await.unwrap();
    assert_eq!(fetched["slug"], json!("hello-world"));
}

#[tokio::test]
async fn test_get_missing_is_not_found() {
    let service = DocumentService::new(InMemoryStore::new());

    let err = service.get("nonexistent", Params::new()).await.unwrap_err();

    assert_eq!(
        err,
        ServiceError::NotFound("No record found for id 'nonexistent'".to_string())
    );
}

#[tokio::test]
async fn test_get_with_select_and_index_hint() {
    let service = people().await;
    let alice = find_plain(&service, json!({ "name": "Alice" })).await.remove(0);

    let fetched = service
        .get(&id_of(&alice), params(json!({ "$select": ["age"], "$index": "by-name" })))
        .await
        .unwrap();

    assert_eq!(fetched, doc(json!({ "_id": id_of(&alice), "age": 20 })));
}

#[tokio::test]
async fn test_find_defaults_to_every_document() {
    let service = people().await;

    assert_eq!(find_plain(&service, json!({})).await.len(), 4);
}

#[tokio::test]
async fn test_find_sorts_skips_and_limits() {
    let service = people().await;

    let by_age_desc = find_plain(&service, json!({ "$sort": { "age": -1 } })).await;
    assert_eq!(names(&by_age_desc), vec!["Dave", "Carol", "Bob", "Alice"]);

    let window = find_plain(
        &service,
        json!({ "$sort": { "age": 1 }, "$skip": 1, "$limit": "2" }),
    )
    .await;
    assert_eq!(names(&window), vec!["Bob", "Carol"]);

    let grouped = find_plain(&service, json!({ "$sort": { "team": 1, "name": -1 } })).await;
    assert_eq!(names(&grouped), vec!["Dave", "Bob", "Carol", "Alice"]);
}

#[tokio::test]
async fn test_find_with_operators() {
    let service = people().await;

    let cases = [
        (json!({ "name": { "$in": ["Alice", "Bob"] } }), vec!["Alice", "Bob"]),
        (json!({ "name": { "$nin": ["Alice"] } }), vec!["Bob", "Carol", "Dave"]),
        (json!({ "age": { "$lt": 30 } }), vec!["Alice", "Bob"]),
        (json!({ "age": { "$gt": 30 } }), vec!["Dave"]),
        (json!({ "name": { "$ne": "Alice" } }), vec!["Bob", "Carol", "Dave"]),
        (json!({ "$or": [{ "name": "Alice" }, { "age": 35 }] }), vec!["Alice", "Dave"]),
        (json!({ "team": "red", "age": { "$gte": 25 } }), vec!["Carol"]),
    ];

    for (query, expected) in cases {
        let mut query = doc(query);
        query.insert("$sort".to_string(), json!({ "name": 1 }));

        let found = find_plain(&service, Value::Object(query.clone())).await;
        assert_eq!(names(&found), expected, "query {}", Value::Object(query));
    }
}

#[tokio::test]
async fn test_find_with_select_keeps_identity() {
    let service = people().await;

    let found = find_plain(&service, json!({ "name": "Bob", "$select": ["age"] })).await;

    assert_eq!(found.len(), 1);
    let keys: Vec<&str> = found[0].keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["_id", "age"]);
}

#[tokio::test]
async fn test_find_rejects_malformed_queries() {
    let service = people().await;

    let bad_sort = service.find(params(json!({ "$sort": "name" }))).await.unwrap_err();
    let bad_limit = service.find(params(json!({ "$limit": -1 }))).await.unwrap_err();
    let bad_operator = service
        .find(params(json!({ "name": { "$regex": "^A" } })))
        .await
        .unwrap_err();

    assert!(matches!(bad_sort, ServiceError::BadRequest(_)));
    assert!(matches!(bad_limit, ServiceError::BadRequest(_)));
    assert!(matches!(bad_operator, ServiceError::BadRequest(_)));
}

#[tokio::test]
async fn test_find_with_default_query() {
    let service = DocumentService::builder()
        .model(InMemoryStore::new())
        .query(doc(json!({ "kind": "todo" })))
        .build()
        .unwrap();

    service
        .create(
            OneOrMany::Many(vec![doc(json!({ "kind": "todo" })), doc(json!({ "kind": "note" }))]),
            Params::new(),
        )
        .await
        .unwrap();

    assert_eq!(find_plain(&service, json!({})).await.len(), 1);
    assert_eq!(find_plain(&service, json!({ "kind": "note" })).await.len(), 1);
}

async fn paginated_five() -> DocumentService<InMemoryStore> {
    let service = DocumentService::builder()
        .model(InMemoryStore::new())
        .paginate(Paginate::new(2).with_max(4))
        .build()
        .unwrap();

    let todos = (0..5).map(|n| doc(json!({ "n": n }))).collect::<Vec<_>>();
    service.create(OneOrMany::Many(todos), Params::new()).await.unwrap();

    service
}

#[tokio::test]
async fn test_paginated_find() {
    let service = paginated_five().await;

    let page = service.find(Params::new()).await.unwrap().into_page().unwrap();

    assert_eq!(page.total, 5);
    assert_eq!(page.limit, 2);
    assert_eq!(page.skip, 0);
    assert_eq!(page.data.len(), 2);
}

#[tokio::test]
async fn test_paginated_find_clamps_to_max() {
    let service = paginated_five().await;

    let page = service
        .find(params(json!({ "$limit": 10, "$skip": 2, "$sort": { "n": 1 } })))
        .await
        .unwrap()
        .into_page()
        .unwrap();

    assert_eq!(page.total, 5);
    assert_eq!(page.limit, 4);
    assert_eq!(page.skip, 2);
    assert_eq!(
        page.data.iter().map(|d| d["n"].clone()).collect::<Vec<_>>(),
        vec![json!(2), json!(3), json!(4)]
    );
}

#[tokio::test]
async fn test_zero_limit() {
    let service = paginated_five().await;

    let page = service
        .find(params(json!({ "$limit": 0 })))
        .await
        .unwrap()
        .into_page()
        .unwrap();

    assert_eq!(page.total, 5);
    assert_eq!(page.limit, 0);
    assert!(page.data.is_empty());

    let plain = service
        .find(params(json!({ "$limit": 0 })).paginate(PaginateOverride::Disabled))
        .await
        .unwrap();

    assert_eq!(plain, FindResult::Plain(Vec::new()));
}

#[tokio::test]
async fn test_paginate_override() {
    let service = paginated_five().await;

    let plain = service
        .find(Params::new().paginate(PaginateOverride::Disabled))
        .await
        .unwrap();
    assert!(matches!(&plain, FindResult::Plain(documents) if documents.len() == 5));

    let replaced = service
        .find(Params::new().paginate(PaginateOverride::Replace(Paginate::new(3))))
        .await
        .unwrap()
        .into_page()
        .unwrap();
    assert_eq!(replaced.limit, 3);
    assert_eq!(replaced.data.len(), 3);
}

#[tokio::test]
async fn test_update_replaces_document() {
    let service = DocumentService::new(InMemoryStore::new());
    let created = service
        .create(doc(json!({ "a": 1, "b": 2 })).into(), Params::new())
        .await
        .unwrap()
        .into_one()
        .unwrap();
    let id = id_of(&created);

    let updated = service
        .update(Some(&id), doc(json!({ "a": 3, "_deleted": true })), Params::new())
        .await
        .unwrap()
        .into_one()
        .unwrap();

    assert_eq!(updated["a"], json!(3));
    assert!(!updated.contains_key("b"));
    assert!(!updated.contains_key("_deleted"));
    assert!(updated.revision().unwrap().starts_with("2-"));
    assert_eq!(service.get(&id, Params::new()).await.unwrap(), updated);
}

#[tokio::test]
async fn test_patch_merges_document() {
    let service = DocumentService::new(InMemoryStore::new());
    let created = service
        .create(doc(json!({ "a": 1, "b": 2 })).into(), Params::new())
        .await
        .unwrap()
        .into_one()
        .unwrap();
    let id = id_of(&created);

    let patched = service
        .patch(Some(&id), doc(json!({ "a": 3, "_id": "other" })), Params::new())
        .await
        .unwrap()
        .into_one()
        .unwrap();

    assert_eq!(patched["a"], json!(3));
    assert_eq!(patched["b"], json!(2));
    assert_eq!(id_of(&patched), id);
    assert_ne!(patched.revision(), created.revision());
}

#[tokio::test]
async fn test_mutations_by_query() {
    let service = people().await;

    let patched = service
        .patch(None, doc(json!({ "active": true })), params(json!({ "team": "red", "$limit": 1 })))
        .await
        .unwrap()
        .into_many()
        .unwrap();
    assert_eq!(patched.len(), 2);

    let updated = service
        .update(None, doc(json!({ "name": "Robert" })), params(json!({ "name": "Bob" })))
        .await
        .unwrap()
        .into_one()
        .unwrap();
    assert_eq!(updated["name"], json!("Robert"));
    assert!(!updated.contains_key("age"));

    let active = find_plain(&service, json!({ "active": true, "$sort": { "name": 1 } })).await;
    assert_eq!(names(&active), vec!["Alice", "Carol"]);
}

#[tokio::test]
async fn test_mutation_without_match_is_not_found() {
    let service = people().await;

    let by_id = service
        .patch(Some("missing"), doc(json!({ "x": 1 })), Params::new())
        .await
        .unwrap_err();
    let by_query = service
        .remove(None, params(json!({ "name": "Zed" })))
        .await
        .unwrap_err();

    assert_eq!(by_id, ServiceError::NotFound("No record found for id 'missing'".to_string()));
    assert_eq!(
        by_query,
        ServiceError::NotFound(r#"No record found for query {"name":"Zed"}"#.to_string())
    );
}

#[tokio::test]
async fn test_remove_by_id() {
    let service = people().await;
    let alice = find_plain(&service, json!({ "name": "Alice" })).await.remove(0);
    let id = id_of(&alice);

    let removed = service.remove(Some(&id), Params::new()).await.unwrap().into_one().unwrap();

    assert_eq!(removed["name"], json!("Alice"));
    assert!(removed.revision().unwrap().starts_with("2-"));
    assert!(!removed.contains_key("_deleted"));
    assert!(service.get(&id, Params::new()).await.unwrap_err().is_not_found());
    assert_eq!(service.model().doc_count().await, 3);

    let again = service.remove(Some(&id), Params::new()).await.unwrap_err();
    assert!(again.is_not_found());
}

#[tokio::test]
async fn test_remove_by_query() {
    let service = people().await;

    let removed = service
        .remove(None, params(json!({ "team": "blue" })))
        .await
        .unwrap()
        .into_many()
        .unwrap();

    let mut removed_names = names(&removed);
    removed_names.sort();
    assert_eq!(removed_names, vec!["Bob", "Dave"]);
    let remaining = find_plain(&service, json!({ "$sort": { "name": 1 } })).await;
    assert_eq!(names(&remaining), vec!["Alice", "Carol"]);
}

/// Holds every `find` until two callers have resolved, forcing both to read the
/// same revision before either writes.
#[derive(Debug)]
struct Rendezvous {
    inner: InMemoryStore,
    barrier: Barrier,
}

#[async_trait]
impl StoreBackend for Rendezvous {
    async fn post(&self, document: Document) -> ServiceResult<mangolayer::write::WriteSuccess> {
        self.inner.post(document).await
    }

    async fn bulk_docs(&self, documents: Vec<Document>) -> ServiceResult<Vec<WriteResponse>> {
        self.inner.bulk_docs(documents).await
    }

    async fn find(&self, query: NativeQuery) -> ServiceResult<FindResponse> {
        let found = self.inner.find(query).await?;
        self.barrier.wait().await;
        Ok(found)
    }
}

#[tokio::test]
async fn test_concurrent_patches_conflict() {
    let store = InMemoryStore::new();
    let created = DocumentService::new(store.clone())
        .create(doc(json!({ "x": 0 })).into(), Params::new())
        .await
        .unwrap()
        .into_one()
        .unwrap();
    let id = id_of(&created);

    let racy = DocumentService::new(Rendezvous { inner: store.clone(), barrier: Barrier::new(2) });

    let (first, second) = futures::future::join(
        racy.patch(Some(&id), doc(json!({ "x": 1 })), Params::new()),
        racy.patch(Some(&id), doc(json!({ "x": 2 })), Params::new()),
    )
    .await;

    let outcomes = [first, second];
    let winners: Vec<_> = outcomes.iter().filter_map(|outcome| outcome.as_ref().ok()).collect();
    let conflicts = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, Err(err) if err.is_conflict()))
        .count();

    assert_eq!(winners.len(), 1);
    assert_eq!(conflicts, 1);

    let stored = DocumentService::new(store).get(&id, Params::new()).await.unwrap();
    let winner = winners[0].clone().into_one().unwrap();
    assert_eq!(stored["x"], winner["x"]);
    assert!(stored.revision().unwrap().starts_with("2-"));
}

/// Drops every bulk write response, as a faulty store might.
#[derive(Debug)]
struct Misaligned {
    inner: InMemoryStore,
}

#[async_trait]
impl StoreBackend for Misaligned {
    async fn post(&self, document: Document) -> ServiceResult<mangolayer::write::WriteSuccess> {
        self.inner.post(document).await
    }

    async fn bulk_docs(&self, documents: Vec<Document>) -> ServiceResult<Vec<WriteResponse>> {
        let mut responses = self.inner.bulk_docs(documents).await?;
        responses.pop();
        Ok(responses)
    }

    async fn find(&self, query: NativeQuery) -> ServiceResult<FindResponse> {
        self.inner.find(query).await
    }
}

#[tokio::test]
async fn test_misaligned_bulk_response_is_backend_error() {
    let service = DocumentService::new(Misaligned { inner: InMemoryStore::new() });

    let err = service
        .create(
            OneOrMany::Many(vec![doc(json!({ "a": 1 })), doc(json!({ "a": 2 }))]),
            Params::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ServiceError::Backend("Store returned 1 responses for 2 documents".to_string())
    );
}

/// Remembers every native query it is asked to find.
#[derive(Debug, Default)]
struct Recording {
    inner: InMemoryStore,
    queries: tokio::sync::Mutex<Vec<NativeQuery>>,
}

#[async_trait]
impl StoreBackend for Recording {
    async fn post(&self, document: Document) -> ServiceResult<mangolayer::write::WriteSuccess> {
        self.inner.post(document).await
    }

    async fn bulk_docs(&self, documents: Vec<Document>) -> ServiceResult<Vec<WriteResponse>> {
        self.inner.bulk_docs(documents).await
    }

    async fn find(&self, query: NativeQuery) -> ServiceResult<FindResponse> {
        self.queries.lock().await.push(query.clone());
        self.inner.find(query).await
    }
}

#[tokio::test]
async fn test_index_hint_reaches_the_store_on_mutations_by_id() {
    let service = DocumentService::new(Recording::default());
    let created = service
        .create(doc(json!({ "name": "Alice" })).into(), Params::new())
        .await
        .unwrap()
        .into_one()
        .unwrap();
    let id = id_of(&created);

    service
        .patch(
            Some(&id),
            doc(json!({ "age": 21 })),
            params(json!({ "$index": ["people", "by-id"], "$limit": 0 })),
        )
        .await
        .unwrap();
    service
        .remove(Some(&id), params(json!({ "$index": "by-id" })))
        .await
        .unwrap();

    let queries = service.model().queries.lock().await;
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[0].selector, doc(json!({ "_id": id })));
    assert_eq!(queries[0].use_index, Some(json!(["people", "by-id"])));
    assert_eq!(queries[0].limit, None);
    assert_eq!(queries[1].use_index, Some(json!("by-id")));
}

#[tokio::test]
async fn test_mutations_apply_select() {
    let service = people().await;
    let bob = find_plain(&service, json!({ "name": "Bob" })).await.remove(0);
    let id = id_of(&bob);

    let keys = |document: &Document| {
        let mut keys: Vec<String> = document.keys().cloned().collect();
        keys.sort();
        keys
    };

    let patched = service
        .patch(Some(&id), doc(json!({ "age": 26 })), params(json!({ "$select": ["age"] })))
        .await
        .unwrap()
        .into_one()
        .unwrap();
    assert_eq!(keys(&patched), vec!["_id", "age"]);
    assert_eq!(patched["age"], json!(26));

    let updated = service
        .update(
            Some(&id),
            doc(json!({ "name": "Robert", "age": 27 })),
            params(json!({ "$select": "name" })),
        )
        .await
        .unwrap()
        .into_one()
        .unwrap();
    assert_eq!(keys(&updated), vec!["_id", "name"]);

    let removed = service
        .remove(None, params(json!({ "team": "red", "$select": ["team"] })))
        .await
        .unwrap()
        .into_many()
        .unwrap();
    assert_eq!(removed.len(), 2);
    assert!(removed.iter().all(|document| keys(document) == vec!["_id", "team"]));
}
