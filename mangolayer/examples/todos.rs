//! A paginated todo service over the in-memory store.
//!
//! Run with `RUST_LOG=debug` to see the service and store logs.

use mangolayer::{memory::InMemoryStore, prelude::*};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let store = InMemoryStore::builder().name("todos").build().await?;
    let todos = DocumentService::builder()
        .model(store)
        .events(["testing"])
        .paginate(Paginate::new(2).with_max(4))
        .build()?;

    let created = todos
        .create(
            OneOrMany::Many(
                ["Buy milk", "Write docs", "Walk the dog", "Fix the bike", "Call home"]
                    .into_iter()
                    .map(|text| to_document(&json!({ "text": text, "done": false })))
                    .collect::<ServiceResult<Vec<_>>>()?,
            ),
            Params::new(),
        )
        .await?;
    info!(count = created.len(), "created todos");

    let first_page = todos
        .find(Params::with_query(to_document(&json!({ "$sort": { "text": 1 } }))?))
        .await?;
    info!(page = %serde_json::to_string(&first_page)?, "first page");

    let Some(page) = first_page.into_page() else {
        return Err("expected a paginated result".into());
    };
    let Some(id) = page.data.first().and_then(|todo| todo.native_id()).map(str::to_string) else {
        return Err("expected at least one todo".into());
    };

    let done = todos
        .patch(Some(&id), to_document(&json!({ "done": true }))?, Params::new())
        .await?;
    info!(todo = %serde_json::to_string(&done)?, "completed todo");

    let open = todos
        .find(
            Params::with_query(to_document(&json!({ "done": false }))?)
                .paginate(PaginateOverride::Disabled),
        )
        .await?;
    info!(open = open.documents().len(), total = page.total, "open todos");

    let removed = todos
        .remove(None, Params::with_query(to_document(&json!({ "done": true }))?))
        .await?;
    let remaining = todos.model().doc_count().await;
    info!(removed = removed.len(), remaining, "cleared completed todos");

    Ok(())
}
