// Build script exposing the CLI version as FUNCTRACE_VERSION
//
// Tagged builds report the tag ("v0.2.0" -> "0.2.0"); untagged builds report
// the crate version with the abbreviated commit appended. Without git the
// crate version is used unchanged.

use std::process::Command;

fn main() {
    let version = git_version().unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

    println!("cargo:rustc-env=FUNCTRACE_VERSION={}", version);
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/tags");
}

fn git_version() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }

    let described = String::from_utf8(output.stdout).ok()?;
    let described = described.trim();

    match described.strip_prefix('v') {
        // "v0.2.0" or "v0.2.0-5-gabc123[-dirty]": keep the tag's version only
        Some(tagged) => Some(tagged.split('-').next().unwrap_or(tagged).to_string()),
        // bare commit id, possibly "-dirty"
        None => Some(format!("{}-{}", env!("CARGO_PKG_VERSION"), described)),
    }
}
