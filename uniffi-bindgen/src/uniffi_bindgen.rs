//! Generates Swift and Kotlin bindings for `loginkit-core`.

fn main() {
    uniffi::uniffi_bindgen_main();
}
