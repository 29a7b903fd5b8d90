//! CLI entry point for the layer boundary lint.
//!
//! Lints `backend/` under the workspace root, or the backend directory given
//! as the first argument.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn main() -> ExitCode {
    let backend_dir = match std::env::args_os().nth(1) {
        Some(dir) => PathBuf::from(dir),
        None => match workspace_root() {
            Some(root) => root.join("backend"),
            None => {
                let _ = writeln!(
                    io::stderr().lock(),
                    "unable to locate the workspace root; pass the backend directory explicitly"
                );
                return ExitCode::FAILURE;
            }
        },
    };

    match architecture_lint::lint_backend_sources(&backend_dir) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let _ = write!(io::stderr().lock(), "{err}");
            ExitCode::FAILURE
        }
    }
}

fn workspace_root() -> Option<PathBuf> {
    [
        std::env::var_os("CARGO_WORKSPACE_DIR").map(PathBuf::from),
        std::env::current_dir().ok(),
        Some(PathBuf::from(env!("CARGO_MANIFEST_DIR"))),
    ]
    .into_iter()
    .flatten()
    .find_map(|start| enclosing_workspace(&start))
}

fn enclosing_workspace(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| {
            fs::read_to_string(dir.join("Cargo.toml"))
                .is_ok_and(|manifest| manifest.contains("[workspace]"))
        })
        .map(Path::to_path_buf)
}
