use std::process::Command;

fn main() {
    let version = git(&["describe", "--tags", "--abbrev=0"])
        .map(|tag| tag.trim_start_matches('v').to_string())
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

    let version = match git(&["rev-parse", "--short", "HEAD"]) {
        Some(commit) => format!("{} ({})", version, commit),
        None => version,
    };

    println!("cargo:rustc-env=ARBOR_FEEDS_VERSION={}", version);
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/tags");
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?.trim().to_string();
    (!text.is_empty()).then_some(text)
}
