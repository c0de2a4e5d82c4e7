pub const APTANEXUS_DISPLAY_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn version_cli_text() -> String {
    format!("AptaNexus {APTANEXUS_DISPLAY_VERSION}\nAptamer database lookup service")
}
