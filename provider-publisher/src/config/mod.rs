//! Publish configuration, read from CI environment variables.
//!
//! Every value is trimmed and a blank value counts as unset. All missing
//! required variables are reported together, before anything touches the
//! network.
//!
//! # Example
//!
//! ```ignore
//! let config = PublishConfig::from_env()?;
//! let publisher = Publisher::new(source, registry, config.publish_target());
//! publisher.publish(&config.release_ref(), &scope).await?;
//! ```

mod duration;
mod error;

pub use duration::parse_duration;
pub use error::{ConfigError, ConfigResult};

use std::fmt;
use std::time::Duration;

use crate::deadline::PhaseTimeouts;
use crate::publish::PublishTarget;
use crate::registry::{ProviderAddress, DEFAULT_ADDRESS};
use crate::release::{ReleaseRef, DEFAULT_API_URL};

pub const GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const GITHUB_REF_NAME: &str = "GITHUB_REF_NAME";
pub const GITHUB_REPOSITORY: &str = "GITHUB_REPOSITORY";
pub const GITHUB_REPOSITORY_OWNER: &str = "GITHUB_REPOSITORY_OWNER";
pub const GITHUB_API_URL: &str = "GITHUB_API_URL";
pub const GITHUB_REQUEST_TTL: &str = "GITHUB_REQUEST_TTL";
pub const GITHUB_DOWNLOAD_TTL: &str = "GITHUB_DOWNLOAD_TTL";
pub const TF_ADDRESS: &str = "TF_ADDRESS";
pub const TF_TOKEN: &str = "TF_TOKEN";
pub const TF_GPG_KEY_ID: &str = "TF_GPG_KEY_ID";
pub const TF_ORGANIZATION_NAME: &str = "TF_ORGANIZATION_NAME";
pub const TF_REGISTRY_NAME: &str = "TF_REGISTRY_NAME";
pub const TF_NAMESPACE: &str = "TF_NAMESPACE";
pub const TF_PROVIDER_NAME: &str = "TF_PROVIDER_NAME";
pub const TF_PROVIDER_PLATFORMS: &str = "TF_PROVIDER_PLATFORMS";
pub const TF_REQUEST_TTL: &str = "TF_REQUEST_TTL";
pub const TF_UPLOAD_TTL: &str = "TF_UPLOAD_TTL";

pub const DEFAULT_REGISTRY_NAME: &str = "private";
pub const DEFAULT_PROTOCOLS: &str = "6.0";

/// Everything a publish run needs.
#[derive(Clone)]
pub struct PublishConfig {
    pub github_token: String,
    pub github_api_url: String,
    pub ref_name: String,
    pub repository_owner: String,
    /// Repository name without the owner prefix.
    pub repository_name: String,
    pub registry_address: String,
    pub registry_token: String,
    pub gpg_key_id: String,
    pub provider: ProviderAddress,
    /// Version derived from the ref name.
    pub version: semver::Version,
    pub protocols: Vec<String>,
    pub timeouts: PhaseTimeouts,
}

impl fmt::Debug for PublishConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishConfig")
            .field("github_token", &"<redacted>")
            .field("github_api_url", &self.github_api_url)
            .field("ref_name", &self.ref_name)
            .field("repository_owner", &self.repository_owner)
            .field("repository_name", &self.repository_name)
            .field("registry_address", &self.registry_address)
            .field("registry_token", &"<redacted>")
            .field("gpg_key_id", &self.gpg_key_id)
            .field("provider", &self.provider)
            .field("version", &self.version.to_string())
            .field("protocols", &self.protocols)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

/// Reads variables and remembers which required ones were absent.
struct Lookup<F> {
    lookup: F,
    missing: Vec<String>,
}

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, var: &str) -> Option<String> {
        (self.lookup)(var)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&mut self, var: &str) -> String {
        self.optional(var).unwrap_or_else(|| {
            self.missing.push(var.to_string());
            String::new()
        })
    }

    fn or_default(&self, var: &str, default: &str) -> String {
        self.optional(var).unwrap_or_else(|| default.to_string())
    }

    fn duration(&self, var: &'static str, default: Duration) -> ConfigResult<Duration> {
        match self.optional(var) {
            None => Ok(default),
            Some(value) => parse_duration(&value)
                .map_err(|reason| ConfigError::InvalidDuration { var, value, reason }),
        }
    }
}

impl PublishConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Missing`] names every required variable that is unset
    /// or blank. Other variants report the first malformed value.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut env = Lookup {
            lookup,
            missing: Vec::new(),
        };

        let github_token = env.required(GITHUB_TOKEN);
        let ref_name = env.required(GITHUB_REF_NAME);
        let repository = env.required(GITHUB_REPOSITORY);
        let repository_owner = env.required(GITHUB_REPOSITORY_OWNER);
        let registry_token = env.required(TF_TOKEN);
        let gpg_key_id = env.required(TF_GPG_KEY_ID);
        let organization = env.required(TF_ORGANIZATION_NAME);
        let namespace = env.required(TF_NAMESPACE);
        let provider_name = env.required(TF_PROVIDER_NAME);

        if !env.missing.is_empty() {
            return Err(ConfigError::Missing(env.missing));
        }

        let defaults = PhaseTimeouts::default();
        let timeouts = PhaseTimeouts {
            discovery: env.duration(GITHUB_REQUEST_TTL, defaults.discovery)?,
            download: env.duration(GITHUB_DOWNLOAD_TTL, defaults.download)?,
            request: env.duration(TF_REQUEST_TTL, defaults.request)?,
            upload: env.duration(TF_UPLOAD_TTL, defaults.upload)?,
        };

        let version = parse_version(&ref_name)?;
        let repository_name = repository_name(&repository, &repository_owner)?;

        let raw_protocols = env.or_default(TF_PROVIDER_PLATFORMS, DEFAULT_PROTOCOLS);
        let protocols = split_list(&raw_protocols);
        if protocols.is_empty() {
            return Err(ConfigError::Invalid {
                var: TF_PROVIDER_PLATFORMS,
                value: raw_protocols,
                reason: "no protocol versions listed".to_string(),
            });
        }

        Ok(Self {
            github_token,
            github_api_url: env.or_default(GITHUB_API_URL, DEFAULT_API_URL),
            ref_name,
            repository_owner,
            repository_name,
            registry_address: env.or_default(TF_ADDRESS, DEFAULT_ADDRESS),
            registry_token,
            gpg_key_id,
            provider: ProviderAddress {
                organization,
                registry: env.or_default(TF_REGISTRY_NAME, DEFAULT_REGISTRY_NAME),
                namespace,
                provider: provider_name,
            },
            version,
            protocols,
            timeouts,
        })
    }

    /// The release to publish.
    pub fn release_ref(&self) -> ReleaseRef {
        ReleaseRef::new(&self.repository_owner, &self.repository_name, &self.ref_name)
    }

    /// Where and what to publish.
    pub fn publish_target(&self) -> PublishTarget {
        PublishTarget {
            provider: self.provider.clone(),
            version: self.version.to_string(),
            key_id: self.gpg_key_id.clone(),
            protocols: self.protocols.clone(),
        }
    }
}

/// Strip one leading `v` from a tag and parse the rest as semver.
///
/// Archive names only carry `MAJOR.MINOR.PATCH`, so prerelease and build
/// suffixes are rejected here rather than at manifest parsing.
fn parse_version(ref_name: &str) -> ConfigResult<semver::Version> {
    let bare = ref_name.strip_prefix('v').unwrap_or(ref_name);
    let version = semver::Version::parse(bare).map_err(|source| ConfigError::InvalidVersion {
        var: GITHUB_REF_NAME,
        value: ref_name.to_string(),
        source,
    })?;
    if !version.pre.is_empty() || !version.build.is_empty() {
        return Err(ConfigError::Invalid {
            var: GITHUB_REF_NAME,
            value: ref_name.to_string(),
            reason: "prerelease and build suffixes are not supported".to_string(),
        });
    }
    Ok(version)
}

/// `owner/name` to `name`.
fn repository_name(repository: &str, owner: &str) -> ConfigResult<String> {
    let invalid = |reason: String| ConfigError::Invalid {
        var: GITHUB_REPOSITORY,
        value: repository.to_string(),
        reason,
    };

    let name = repository
        .strip_prefix(owner)
        .and_then(|rest| rest.strip_prefix('/'))
        .ok_or_else(|| invalid(format!("expected \"{}/<name>\"", owner)))?;
    if name.is_empty() || name.contains('/') {
        return Err(invalid(format!("expected \"{}/<name>\"", owner)));
    }
    Ok(name.to_string())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deadline::{DeadlineScope, Phase};
    use std::collections::HashMap;
    use tokio_util::sync::CancellationToken;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            (GITHUB_TOKEN, "gh-secret"),
            (GITHUB_REF_NAME, "v1.2.0"),
            (GITHUB_REPOSITORY, "acme/terraform-provider-acme"),
            (GITHUB_REPOSITORY_OWNER, "acme"),
            (TF_TOKEN, "tf-secret"),
            (TF_GPG_KEY_ID, "34365D9472D7468F"),
            (TF_ORGANIZATION_NAME, "acme-org"),
            (TF_NAMESPACE, "acme"),
            (TF_PROVIDER_NAME, "acme"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> ConfigResult<PublishConfig> {
        PublishConfig::from_lookup(|var| env.get(var).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults_applied() {
        let config = load(&base_env()).unwrap();

        assert_eq!(config.github_api_url, DEFAULT_API_URL);
        assert_eq!(config.registry_address, DEFAULT_ADDRESS);
        assert_eq!(config.provider.registry, "private");
        assert_eq!(config.protocols, vec!["6.0".to_string()]);
        assert_eq!(config.timeouts, PhaseTimeouts::default());
    }

    #[test]
    fn test_derived_values() {
        let config = load(&base_env()).unwrap();

        assert_eq!(config.repository_name, "terraform-provider-acme");
        assert_eq!(config.version, semver::Version::new(1, 2, 0));

        let release = config.release_ref();
        assert_eq!(release.to_string(), "acme/terraform-provider-acme@v1.2.0");

        let target = config.publish_target();
        assert_eq!(target.version, "1.2.0");
        assert_eq!(target.key_id, "34365D9472D7468F");
        assert_eq!(target.provider.organization, "acme-org");
    }

    #[test]
    fn test_all_missing_variables_reported_together() {
        let mut env = base_env();
        env.remove(GITHUB_TOKEN);
        env.remove(TF_NAMESPACE);
        env.insert(TF_TOKEN, "   ");

        match load(&env) {
            Err(ConfigError::Missing(vars)) => {
                assert_eq!(vars, vec![GITHUB_TOKEN, TF_TOKEN, TF_NAMESPACE]);
            }
            other => panic!("Expected Missing, got {:?}", other),
        }
    }

    #[test]
    fn test_values_are_trimmed() {
        let mut env = base_env();
        env.insert(TF_PROVIDER_NAME, "  acme \n");
        env.insert(TF_PROVIDER_PLATFORMS, " 5.0, ,6.0 ,");

        let config = load(&env).unwrap();
        assert_eq!(config.provider.provider, "acme");
        assert_eq!(config.protocols, vec!["5.0".to_string(), "6.0".to_string()]);
    }

    #[test]
    fn test_blank_protocol_list_rejected() {
        let mut env = base_env();
        env.insert(TF_PROVIDER_PLATFORMS, " , ,");

        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid { var: TF_PROVIDER_PLATFORMS, .. })
        ));
    }

    #[test]
    fn test_custom_timeouts() {
        let mut env = base_env();
        env.insert(GITHUB_REQUEST_TTL, "10s");
        env.insert(GITHUB_DOWNLOAD_TTL, "1m30s");
        env.insert(TF_REQUEST_TTL, "750ms");
        env.insert(TF_UPLOAD_TTL, "1h");

        let timeouts = load(&env).unwrap().timeouts;
        assert_eq!(timeouts.discovery, Duration::from_secs(10));
        assert_eq!(timeouts.download, Duration::from_secs(90));
        assert_eq!(timeouts.request, Duration::from_millis(750));
        assert_eq!(timeouts.upload, Duration::from_secs(3600));
    }

    #[test]
    fn test_invalid_duration() {
        let mut env = base_env();
        env.insert(TF_UPLOAD_TTL, "0s");

        match load(&env) {
            Err(ConfigError::InvalidDuration { var, value, .. }) => {
                assert_eq!(var, TF_UPLOAD_TTL);
                assert_eq!(value, "0s");
            }
            other => panic!("Expected InvalidDuration, got {:?}", other),
        }
    }

    #[test]
    fn test_version_without_prefix_accepted() {
        let mut env = base_env();
        env.insert(GITHUB_REF_NAME, "2.0.0");

        let config = load(&env).unwrap();
        assert_eq!(config.version.to_string(), "2.0.0");
        assert_eq!(config.release_ref().tag, "2.0.0");
    }

    #[test]
    fn test_prerelease_and_build_tags_rejected() {
        for tag in ["v2.0.0-rc.1", "2.0.0+build.5"] {
            let mut env = base_env();
            env.insert(GITHUB_REF_NAME, tag);
            match load(&env) {
                Err(ConfigError::Invalid { var, value, .. }) => {
                    assert_eq!(var, GITHUB_REF_NAME);
                    assert_eq!(value, tag);
                }
                other => panic!("Expected Invalid for {:?}, got {:?}", tag, other),
            }
        }
    }

    #[tokio::test]
    async fn test_huge_timeout_yields_usable_scope() {
        let mut env = base_env();
        env.insert(TF_UPLOAD_TTL, "18446744073709551615s");

        let config = load(&env).unwrap();
        assert_eq!(config.timeouts.upload, Duration::from_secs(u64::MAX));

        let root = DeadlineScope::root(CancellationToken::new(), config.timeouts);
        let upload = root.child(Phase::Upload);
        assert_eq!(upload.run(async { "uploaded" }).await, Ok("uploaded"));
    }

    #[test]
    fn test_non_semver_ref_rejected() {
        for tag in ["main", "v1.2", "vv1.2.0"] {
            let mut env = base_env();
            env.insert(GITHUB_REF_NAME, tag);
            assert!(
                matches!(load(&env), Err(ConfigError::InvalidVersion { .. })),
                "{:?} should be rejected",
                tag
            );
        }
    }

    #[test]
    fn test_repository_must_belong_to_owner() {
        let mut env = base_env();
        env.insert(GITHUB_REPOSITORY, "someone-else/terraform-provider-acme");

        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid { var: GITHUB_REPOSITORY, .. })
        ));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let config = load(&base_env()).unwrap();
        let text = format!("{:?}", config);

        assert!(!text.contains("gh-secret"));
        assert!(!text.contains("tf-secret"));
        assert!(text.contains("<redacted>"));
    }
}
