//! Outcome of a publish run.

use std::fmt;

use crate::release::CorrelatedArtifact;

/// One platform binary that reached the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPlatform {
    pub filename: String,
    pub os: String,
    pub arch: String,
}

impl From<&CorrelatedArtifact> for PublishedPlatform {
    fn from(artifact: &CorrelatedArtifact) -> Self {
        let entry = artifact.entry();
        Self {
            filename: entry.filename().to_string(),
            os: entry.os().to_string(),
            arch: entry.arch().to_string(),
        }
    }
}

impl fmt::Display for PublishedPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({})", self.os, self.arch, self.filename)
    }
}

/// Summary of a fully successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    /// Registry identifier of the created version.
    pub version_id: String,
    pub version: String,
    /// Published platforms, in manifest order.
    pub platforms: Vec<PublishedPlatform>,
}

impl fmt::Display for PublishReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Published version {} ({}) with {} platform(s):",
            self.version,
            self.version_id,
            self.platforms.len()
        )?;
        for platform in &self.platforms {
            writeln!(f, "  {}", platform)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_display_lists_platforms() {
        let report = PublishReport {
            version_id: "provver-1".to_string(),
            version: "1.2.0".to_string(),
            platforms: vec![
                PublishedPlatform {
                    filename: "acme_1.2.0_linux_amd64.zip".to_string(),
                    os: "linux".to_string(),
                    arch: "amd64".to_string(),
                },
                PublishedPlatform {
                    filename: "acme_1.2.0_darwin_arm64.zip".to_string(),
                    os: "darwin".to_string(),
                    arch: "arm64".to_string(),
                },
            ],
        };

        let text = report.to_string();
        assert!(text.starts_with("Published version 1.2.0 (provver-1) with 2 platform(s):\n"));
        assert!(text.contains("  linux/amd64 (acme_1.2.0_linux_amd64.zip)\n"));
        assert!(text.contains("  darwin/arm64 (acme_1.2.0_darwin_arm64.zip)\n"));
    }
}
