//! Integration tests for the in-memory backend.
//!
//! One test binary:
//! - backend: Revision rules, bulk writes and database management over raw JSON bodies
//! - views: View registration, key selection, ordering and paging
//! - attachments: Attachment storage and `_attachments` stubs
//! - database: Schema documents persisted through `DocumentStore`

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("couchlayer_memory=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

mod attachments;
mod helpers;
mod views;
