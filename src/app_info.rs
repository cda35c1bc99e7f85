/// Identifies a binary built on this crate and its version metadata.
///
/// Lets `version` print the embedding binary (the one wiring in a real
/// checker) alongside `healthcron` itself.
#[derive(Clone, Copy, Debug)]
pub struct AppInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
}

impl AppInfo {
    #[must_use]
    pub const fn new(name: &'static str, version: &'static str, description: &'static str) -> Self {
        Self {
            name,
            version,
            description,
        }
    }

    /// `name vX.Y.Z`, as shown in logs and version output.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} v{}", self.name, self.version)
    }

    /// Whether this describes the healthcron crate itself rather than a host.
    #[must_use]
    pub fn is_healthcron(&self) -> bool {
        self.name == env!("CARGO_PKG_NAME")
    }

    #[must_use]
    pub const fn healthcron() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            description: env!("CARGO_PKG_DESCRIPTION"),
        }
    }
}
