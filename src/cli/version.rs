/// First line of `sigorg version`.
pub fn version_line() -> String {
    format!("sigorg {}", env!("CARGO_PKG_VERSION"))
}

/// Display version information
pub fn execute() {
    println!("{}", version_line());
    println!("Operator CLI for sigorg organization governance");
    println!(
        "Records: CBOR, {} commit attempts per operation",
        sigorg::MAX_COMMIT_ATTEMPTS
    );
}
