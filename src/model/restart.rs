//! Container restart policy: `{name, maximum_retry_count}`, with YAML-friendly parsing.

use serde::{Deserialize, Serialize};

/// A container's restart policy, as understood by the Docker daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartPolicy {
    /// The policy name: `no`, `always`, `unless-stopped`, or `on-failure`.
    pub name: RestartPolicyName,
    /// Maximum retry count, only meaningful for `on-failure`.
    pub maximum_retry_count: u32,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            name: RestartPolicyName::No,
            maximum_retry_count: 0,
        }
    }
}

/// The restart policy name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicyName {
    /// Never restart.
    No,
    /// Always restart.
    Always,
    /// Restart unless the container was explicitly stopped.
    UnlessStopped,
    /// Restart up to `maximum_retry_count` times on non-zero exit.
    OnFailure,
}

impl std::fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name {
            RestartPolicyName::No => write!(f, "no"),
            RestartPolicyName::Always => write!(f, "always"),
            RestartPolicyName::UnlessStopped => write!(f, "unless-stopped"),
            RestartPolicyName::OnFailure if self.maximum_retry_count > 0 => {
                write!(f, "on-failure:{}", self.maximum_retry_count)
            }
            RestartPolicyName::OnFailure => write!(f, "on-failure"),
        }
    }
}

/// Raw YAML shape for a restart policy: either a bare string name, a
/// `{name, maximum_retry_count}` mapping, or (invalidly) a list — any
/// unrecognized shape or unknown name falls back to the default policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawRestartPolicy {
    /// `restart_policy: always`
    Name(String),
    /// `restart_policy: {name: on-failure, maximum_retry_count: 3}`
    Full {
        /// Policy name.
        name: String,
        /// Optional retry count, defaults to 0.
        #[serde(default)]
        maximum_retry_count: u32,
    },
    /// Anything else (e.g. a list) is accepted syntactically and discarded.
    #[serde(other)]
    Other,
}

impl From<RawRestartPolicy> for RestartPolicy {
    fn from(raw: RawRestartPolicy) -> Self {
        match raw {
            RawRestartPolicy::Name(name) => policy_from_name(&name, 0),
            RawRestartPolicy::Full {
                name,
                maximum_retry_count,
            } => policy_from_name(&name, maximum_retry_count),
            RawRestartPolicy::Other => RestartPolicy::default(),
        }
    }
}

fn policy_from_name(name: &str, maximum_retry_count: u32) -> RestartPolicy {
    let name = match name {
        "no" => RestartPolicyName::No,
        "always" => RestartPolicyName::Always,
        "unless-stopped" => RestartPolicyName::UnlessStopped,
        "on-failure" => RestartPolicyName::OnFailure,
        _ => return RestartPolicy::default(),
    };
    RestartPolicy {
        name,
        maximum_retry_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_name() {
        let raw: RawRestartPolicy = serde_yaml::from_str("always").unwrap();
        let policy: RestartPolicy = raw.into();
        assert_eq!(policy.name, RestartPolicyName::Always);
        assert_eq!(policy.maximum_retry_count, 0);
    }

    #[test]
    fn full_with_retries() {
        let raw: RawRestartPolicy =
            serde_yaml::from_str("name: on-failure\nmaximum_retry_count: 5").unwrap();
        let policy: RestartPolicy = raw.into();
        assert_eq!(policy.name, RestartPolicyName::OnFailure);
        assert_eq!(policy.maximum_retry_count, 5);
        assert_eq!(policy.to_string(), "on-failure:5");
    }

    #[test]
    fn unknown_name_defaults() {
        let raw: RawRestartPolicy = serde_yaml::from_str("bogus").unwrap();
        let policy: RestartPolicy = raw.into();
        assert_eq!(policy, RestartPolicy::default());
    }

    #[test]
    fn list_input_defaults() {
        let raw: RawRestartPolicy = serde_yaml::from_str("[a, b]").unwrap();
        let policy: RestartPolicy = raw.into();
        assert_eq!(policy, RestartPolicy::default());
    }

    #[test]
    fn display_no() {
        assert_eq!(RestartPolicy::default().to_string(), "no");
    }
}
