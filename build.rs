use std::process::Command;

/// Stamp `PAYFLOW_BUILD` as `<version>+<short git hash>` for the startup log
fn main() {
    let version = std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string());

    let hash = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string());

    let build = match hash {
        Some(hash) => format!("{}+{}", version, hash),
        None => version,
    };

    println!("cargo:rustc-env=PAYFLOW_BUILD={}", build);
    println!("cargo:rerun-if-changed=.git/HEAD");
}
