//! Unit tests for the layer boundary lint.

use rstest::rstest;

use super::*;

fn lint_one(file: &str, contents: &str) -> Result<(), ArchitectureLintError> {
    lint_sources(&[LintSource::new(file, contents)])
}

#[rstest]
#[case("inbound/cli.rs", "use crate::domain::Collection; fn f() { let _ = Collection::Users; }", true)]
#[case("outbound/mongo/document_store.rs", "use crate::domain::ports::DocumentStore; use mongodb::Database;", true)]
#[case("domain/seed_engine.rs", "use bson::Document; use mockable::Clock; use tracing::info;", true)]
#[case("inbound/cli.rs", "use clap::Parser; use mockable::Env;", true)]
#[case("inbound/cli.rs", "use crate::outbound::mongo::MongoConfig;", false)]
#[case("inbound/cli.rs", "use outbound::memory::InMemoryDocumentStore;", false)]
#[case("inbound/cli.rs", "use delivery_store::outbound::mongo::MongoDocumentStore;", false)]
#[case("inbound/cli.rs", "fn f() { let _ = mongodb::options::ClientOptions::default(); }", false)]
#[case("domain/provisioner.rs", "use crate::inbound::cli::CliArgs;", false)]
#[case("domain/provisioner.rs", "use super::super::outbound::memory;", false)]
#[case("domain/find_or_create.rs", "use mongodb::error::Error;", false)]
#[case("domain/find_or_create.rs", "use futures_util::TryStreamExt;", false)]
#[case("domain/find_or_create.rs", "async fn f() { tokio::task::yield_now().await; }", false)]
#[case("outbound/memory/mod.rs", "use crate::inbound::cli::StoreTarget;", false)]
fn detects_boundary_violations(#[case] file: &str, #[case] contents: &str, #[case] ok: bool) {
    let result = lint_one(file, contents);
    assert_eq!(result.is_ok(), ok, "result: {result:?}");
}

#[rstest]
fn test_only_items_are_not_inspected() {
    let contents = r"
        pub fn ensure() {}

        #[cfg(test)]
        mod tests {
            use crate::outbound::memory::InMemoryDocumentStore;

            #[tokio::test]
            async fn runs() {}
        }
    ";
    assert!(lint_one("domain/collection_ensurer.rs", contents).is_ok());
}

#[rstest]
fn test_only_import_is_not_inspected() {
    let contents = "#[cfg(test)] use tokio::sync::Mutex; pub struct Store;";
    assert!(lint_one("domain/audit.rs", contents).is_ok());
}

#[rstest]
fn violations_name_the_file_and_rule() {
    let Err(ArchitectureLintError::Violations(violations)) = lint_one(
        "domain/audit.rs",
        "use mongodb::Database; use crate::outbound::mongo::MongoConfig;",
    ) else {
        panic!("expected violations");
    };

    let messages: Vec<&str> = violations.iter().map(|v| v.message.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "domain must not depend on crate::outbound",
            "domain must not depend on external crate `mongodb`",
        ]
    );
    assert!(violations
        .iter()
        .all(|v| v.file == PathBuf::from("domain/audit.rs")));
}

#[rstest]
fn file_outside_a_layer_is_rejected() {
    let result = lint_one("main.rs", "fn main() {}");
    assert!(matches!(result, Err(ArchitectureLintError::Parse { .. })));
}

#[rstest]
fn unparsable_source_is_rejected() {
    let result = lint_one("domain/broken.rs", "fn {");
    assert!(matches!(result, Err(ArchitectureLintError::Parse { .. })));
}
