use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

/// Prefix every bundled asset name starts with
const ASSET_PREFIX: &str = "src/build";

fn main() {
    embed_ui_assets();
    export_provenance();
}

/// Generate `$OUT_DIR/bundled_assets.rs` from the UI build directory
///
/// A missing directory yields an empty table so the crate still builds
/// without a UI bundle.
fn embed_ui_assets() {
    println!("cargo:rerun-if-env-changed=SPA_UI_BUILD_DIR");

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_default());
    let ui_dir = env::var("SPA_UI_BUILD_DIR")
        .map_or_else(|_| manifest_dir.join("web/build"), PathBuf::from);
    println!("cargo:rerun-if-changed={}", ui_dir.display());

    let mut files = Vec::new();
    if ui_dir.is_dir() {
        collect_files(&ui_dir, &ui_dir, &mut files);
    }
    files.sort();

    let mut out = String::from("pub static BUNDLED_FILES: &[(&str, &[u8])] = &[\n");
    for (name, path) in &files {
        let _ = writeln!(
            out,
            "    ({:?}, include_bytes!({:?})),",
            format!("{ASSET_PREFIX}/{name}"),
            path.display().to_string()
        );
    }
    out.push_str("];\n");

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    fs::write(out_dir.join("bundled_assets.rs"), out).expect("Failed to write bundled_assets.rs");
}

fn collect_files(base: &Path, dir: &Path, files: &mut Vec<(String, PathBuf)>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(base, &path, files);
            continue;
        }
        let Ok(rel) = path.strip_prefix(base) else {
            continue;
        };
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let abs = path.canonicalize().unwrap_or(path);
        files.push((name, abs));
    }
}

/// Export version, commit, tree state and build time as compile-time env vars
///
/// Values already present in the environment (e.g. set by CI) win over `git`.
fn export_provenance() {
    for key in [
        "SPA_GIT_VERSION",
        "SPA_GIT_COMMIT",
        "SPA_GIT_TREE_STATE",
        "SPA_BUILD_TIMESTAMP",
    ] {
        println!("cargo:rerun-if-env-changed={key}");
    }

    let version = env::var("SPA_GIT_VERSION").ok().or_else(|| {
        git(&["describe", "--tags", "--always", "--dirty"])
    });
    let commit = env::var("SPA_GIT_COMMIT")
        .ok()
        .or_else(|| git(&["rev-parse", "HEAD"]));
    let tree_state = env::var("SPA_GIT_TREE_STATE").ok().or_else(|| {
        git(&["status", "--porcelain"]).map(|s| {
            if s.is_empty() { "clean" } else { "dirty" }.to_string()
        })
    });
    let timestamp = env::var("SPA_BUILD_TIMESTAMP").ok().unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
            .to_string()
    });

    println!(
        "cargo:rustc-env=SPA_GIT_VERSION={}",
        version.unwrap_or_else(|| "dev".to_string())
    );
    println!(
        "cargo:rustc-env=SPA_GIT_COMMIT={}",
        commit.unwrap_or_else(|| "unknown".to_string())
    );
    println!(
        "cargo:rustc-env=SPA_GIT_TREE_STATE={}",
        tree_state.unwrap_or_else(|| "unknown".to_string())
    );
    println!("cargo:rustc-env=SPA_BUILD_TIMESTAMP={timestamp}");
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
