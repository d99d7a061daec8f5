use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=LIBCUE_LIB_DIR");

    if env::var_os("CARGO_FEATURE_LIBCUE").is_none() {
        return;
    }

    // A locally built (possibly coverage-instrumented) static libcue.
    if let Some(dir) = env::var_os("LIBCUE_LIB_DIR") {
        println!("cargo:rustc-link-search=native={}", dir.to_string_lossy());
    }
}
