//! Generates `include/uap3a.h` from the `agora_ap_*` exports of `uap3a`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Sources whose items end up in the header.
const FFI_SOURCES: &[&str] = &[
    "src/lib.rs",
    "../uap3a/src/ffi.rs",
    "../uap3a/src/ffi/functions.rs",
    "../uap3a/src/ffi/types.rs",
];

fn preamble(version: &str) -> String {
    format!(
        "/*
 * uap3a {version}: C API of the uplink 3A processing shim.
 *
 * Status codes: 0 success, -1 null or unknown handle, -2 released or not
 * initialized, -3 invalid frame, -4 unknown reference mode, -99 internal
 * panic. Any other negative value is the engine's own status.
 *
 * Handles are opaque tokens and are never reused.
 */"
    )
}

fn main() {
    let crate_dir = env::var("CARGO_MANIFEST_DIR").map(PathBuf::from).unwrap();
    let version = env::var("CARGO_PKG_VERSION").unwrap();
    let output_dir = crate_dir.join("include");

    for source in FFI_SOURCES {
        println!("cargo::rerun-if-changed={source}");
    }
    println!("cargo::rerun-if-changed=cbindgen.toml");

    fs::create_dir_all(&output_dir).expect("Failed to create include/ directory");

    let config = cbindgen::Config::from_file(crate_dir.join("cbindgen.toml"))
        .expect("Failed to read cbindgen.toml");

    write_header(&crate_dir, config, &version, &output_dir.join("uap3a.h"));
}

fn write_header(crate_dir: &Path, config: cbindgen::Config, version: &str, output: &Path) {
    match cbindgen::Builder::new()
        .with_crate(crate_dir)
        .with_config(config)
        .with_header(preamble(version))
        .generate()
    {
        Ok(bindings) => {
            bindings.write_to_file(output);
        }
        Err(e) => {
            // The checked-in header stays valid when `uap3a` cannot be
            // parsed, e.g. when packaged outside the workspace.
            println!("cargo::warning=uap3a.h not regenerated: {e}");
        }
    }
}
