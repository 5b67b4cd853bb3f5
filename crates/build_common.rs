// Shared build script utilities for README-to-rustdoc transformation.
// Include this in build.rs files with: include!("../build_common.rs");
//
// Required imports in the including file:
//   use std::env;
//   use std::fs;
//   use std::path::Path;

/// Copy a crate's README.md into `OUT_DIR` so `lib.rs` can use it as crate docs.
///
/// Transformations:
/// 1. Strip 'src/' prefix from links so rustdoc can resolve modules
/// 2. Strip '.rs' extension so links go to modules, not files
/// 3. Drop links to sibling crate READMEs, keeping the link text
///
/// A crate without a README still gets an (empty) generated file so the
/// `include_str!` in `lib.rs` always resolves.
fn process_readme_for_rustdoc(crate_dir: &str) {
    println!("cargo:rerun-if-changed=README.md");

    let readme_path = Path::new(crate_dir).join("README.md");
    let content = fs::read_to_string(&readme_path).unwrap_or_default();

    let rustdoc_content = strip_sibling_links(
        &content.replace("](src/", "](").replace(".rs)", ")"),
    );

    let Ok(out_dir) = env::var("OUT_DIR") else {
        return;
    };
    let dest_path = Path::new(&out_dir).join("README_GENERATED.md");
    if let Err(e) = fs::write(&dest_path, rustdoc_content) {
        println!("cargo:warning=failed to write {}: {e}", dest_path.display());
    }
}

/// Replace `[text](../other-crate/README.md)` with plain `text`.
///
/// Those targets only exist on disk, rustdoc has nothing to point them at.
fn strip_sibling_links(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("](../") {
        let (before, after) = rest.split_at(start);
        let Some(close) = after.find(')') else {
            break;
        };
        let Some(open) = before.rfind('[') else {
            out.push_str(&rest[..start + close + 1]);
            rest = &rest[start + close + 1..];
            continue;
        };
        out.push_str(&before[..open]);
        out.push_str(&before[open + 1..]);
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}
