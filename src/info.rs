//! Plugin identity metadata.

use serde::{Deserialize, Serialize};

/// One mime type the plugin registers for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MimeEntry {
    /// Mime type string, e.g. `application/x-example`.
    pub mime_type: String,

    /// Description shown for this mime type.
    #[serde(default)]
    pub description: String,

    /// File extensions claimed for this mime type.
    #[serde(default)]
    pub extensions: Vec<String>,
}

/// Identity of a plugin: what registration tooling and host UIs show.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Plugin name.
    pub name: String,

    /// Human-readable description.
    #[serde(default)]
    pub description: String,

    /// Plugin version.
    #[serde(default = "default_version")]
    pub version: String,

    /// Mime types the plugin handles.
    #[serde(default)]
    pub mime_types: Vec<MimeEntry>,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

impl PluginInfo {
    /// Create an info record with no mime types yet.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            version: version.into(),
            mime_types: vec![],
        }
    }

    /// Add a handled mime type.
    pub fn with_mime_type(
        mut self,
        mime_type: impl Into<String>,
        description: impl Into<String>,
        extensions: &[&str],
    ) -> Self {
        self.mime_types.push(MimeEntry {
            mime_type: mime_type.into(),
            description: description.into(),
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
        });
        self
    }

    /// Whether the plugin registers for a mime type.
    pub fn supports(&self, mime_type: &str) -> bool {
        self.mime_types.iter().any(|m| m.mime_type == mime_type)
    }

    /// Description for a mime type, falling back to the plugin
    /// description.
    pub fn description_for(&self, mime_type: &str) -> &str {
        self.mime_types
            .iter()
            .find(|m| m.mime_type == mime_type && !m.description.is_empty())
            .map(|m| m.description.as_str())
            .unwrap_or(&self.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_per_mime_type() {
        let info = PluginInfo::new("example", "an example plugin", "1.2.0")
            .with_mime_type("application/x-example", "example media", &["exm"])
            .with_mime_type("application/x-other", "", &[]);

        assert!(info.supports("application/x-example"));
        assert!(!info.supports("application/x-unknown"));
        assert_eq!(info.description_for("application/x-example"), "example media");
        // Empty and unknown mime descriptions fall back to the plugin's.
        assert_eq!(info.description_for("application/x-other"), "an example plugin");
        assert_eq!(info.description_for("application/x-unknown"), "an example plugin");
    }

    #[test]
    fn test_serde_round_trip() {
        let info = PluginInfo::new("example", "an example plugin", "1.2.0")
            .with_mime_type("application/x-example", "example media", &["exm"]);
        let json = serde_json::to_string(&info).unwrap();
        let back: PluginInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, info.name);
        assert_eq!(back.mime_types.len(), 1);
        assert_eq!(back.mime_types[0].extensions, vec!["exm"]);
    }
}
