use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-env-changed=VIDEO_CLIENT_API_DIR");

    // Linking only matters for the real client; the loopback backend builds anywhere.
    if env::var_os("CARGO_FEATURE_NATIVE").is_none() {
        return;
    }

    let Some(sdk_dir) = env::var_os("VIDEO_CLIENT_API_DIR") else {
        println!(
            "cargo:warning=VIDEO_CLIENT_API_DIR is not set; relying on the system library path"
        );
        return;
    };

    let lib_dir = PathBuf::from(sdk_dir).join("lib");
    if !lib_dir.exists() {
        println!(
            "cargo:warning=VideoClientAPI lib path does not exist: {}",
            lib_dir.display()
        );
    }

    println!("cargo:rustc-link-search=native={}", lib_dir.display());
    println!("cargo:rustc-link-arg=-Wl,-rpath,{}", lib_dir.display());
}
