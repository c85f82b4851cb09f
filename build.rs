fn main() {
    // Precompiled modules resolve `prime_*` against the running host binary,
    // so the binary has to export its symbols dynamically.
    let family = std::env::var("CARGO_CFG_TARGET_FAMILY").unwrap_or_default();
    if family.split(',').any(|f| f == "unix") {
        println!("cargo:rustc-link-arg-bins=-rdynamic");
    }
    println!("cargo:rerun-if-changed=build.rs");
}
