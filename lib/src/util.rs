//! Process/build metadata, exposed for operational status reporting.

pub struct EngineMetadata {
    pub name: String,
    pub version: String,
    pub os: String,
    pub arch: String,
}

impl EngineMetadata {
    pub fn new() -> Self {
        EngineMetadata {
            name: env!("CARGO_PKG_NAME").to_owned(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }
}

impl Default for EngineMetadata {
    fn default() -> Self {
        Self::new()
    }
}
