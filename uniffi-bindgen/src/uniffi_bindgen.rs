//! Generates Swift and Kotlin bindings for the token cache.

fn main() {
    uniffi::uniffi_bindgen_main();
}
