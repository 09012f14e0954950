//! Webhook routes: which path delivers to which session and channel

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{ConfigError, ConfigErrors};

/// Paths served by the relay itself; targets may not claim them.
pub const RESERVED_PATHS: &[&str] = &["/status"];

/// One configured webhook route
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Target {
    pub path: String,
    /// Empty disables payload verification.
    #[serde(default)]
    pub secret: String,
    /// Id of the chat session to deliver to.
    pub destination: String,
    pub channel: String,
}

impl Target {
    pub fn new(path: &str, secret: &str, destination: &str, channel: &str) -> Self {
        Self {
            path: path.to_string(),
            secret: secret.to_string(),
            destination: destination.to_string(),
            channel: channel.to_string(),
        }
    }
}

/// Immutable set of targets, keyed by path.
#[derive(Debug, Clone, Default)]
pub struct TargetRegistry {
    targets: Vec<Arc<Target>>,
}

impl TargetRegistry {
    pub fn new(targets: Vec<Target>) -> Self {
        Self {
            targets: targets.into_iter().map(Arc::new).collect(),
        }
    }

    /// Checks the listener address and every target against the known
    /// sessions, collecting all violations.
    ///
    /// `channels_by_destination` maps each configured session id to the
    /// rooms it is configured to join.
    pub fn validate(
        &self,
        listen_addr: &str,
        channels_by_destination: &HashMap<String, HashSet<String>>,
    ) -> Result<(), ConfigErrors> {
        let mut errors = ConfigErrors::default();
        self.collect_errors(listen_addr, channels_by_destination, &mut errors);
        errors.into_result()
    }

    pub(crate) fn collect_errors(
        &self,
        listen_addr: &str,
        channels_by_destination: &HashMap<String, HashSet<String>>,
        errors: &mut ConfigErrors,
    ) {
        if listen_addr.trim().is_empty() {
            errors.push(ConfigError::MissingListenAddress);
        }
        if self.targets.is_empty() {
            errors.push(ConfigError::NoTargets);
        }

        let mut seen_paths = HashSet::new();
        for target in &self.targets {
            let path = &target.path;
            if !is_valid_path(path) {
                errors.push(ConfigError::InvalidPath { path: path.clone() });
            } else if RESERVED_PATHS.contains(&path.as_str()) {
                errors.push(ConfigError::ReservedPath { path: path.clone() });
            }
            if !seen_paths.insert(path.as_str()) {
                errors.push(ConfigError::DuplicatePath { path: path.clone() });
            }

            match channels_by_destination.get(&target.destination) {
                None => errors.push(ConfigError::UnknownDestination {
                    path: path.clone(),
                    destination: target.destination.clone(),
                }),
                Some(channels) if !channels.contains(&target.channel) => {
                    errors.push(ConfigError::UnknownChannel {
                        path: path.clone(),
                        destination: target.destination.clone(),
                        channel: target.channel.clone(),
                    })
                }
                Some(_) => {}
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Target>> {
        self.targets.iter()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

fn is_valid_path(path: &str) -> bool {
    path.starts_with('/') && !path.contains(['{', '}', '*', ':'])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known() -> HashMap<String, HashSet<String>> {
        let mut map = HashMap::new();
        map.insert(
            "net1".to_string(),
            ["#dev", "#ops"].iter().map(|c| c.to_string()).collect(),
        );
        map
    }

    #[test]
    fn accepts_valid_targets() {
        let registry = TargetRegistry::new(vec![
            Target::new("/hooks/a", "s3cret", "net1", "#dev"),
            Target::new("/hooks/b", "", "net1", "#ops"),
        ]);
        assert!(registry.validate("127.0.0.1:8080", &known()).is_ok());
        let paths: Vec<&str> = registry.iter().map(|t| t.path.as_str()).collect();
        assert_eq!(paths, vec!["/hooks/a", "/hooks/b"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn rejects_missing_listen_address_and_targets() {
        let registry = TargetRegistry::new(vec![]);
        let errors = registry.validate("", &known()).unwrap_err();
        assert_eq!(
            errors.0,
            vec![ConfigError::MissingListenAddress, ConfigError::NoTargets]
        );
    }

    #[test]
    fn rejects_unknown_destination() {
        let registry = TargetRegistry::new(vec![Target::new("/hooks/a", "", "net2", "#dev")]);
        let errors = registry.validate("0.0.0.0:80", &known()).unwrap_err();
        assert_eq!(
            errors.0,
            vec![ConfigError::UnknownDestination {
                path: "/hooks/a".into(),
                destination: "net2".into(),
            }]
        );
    }

    #[test]
    fn rejects_channel_not_configured_for_destination() {
        let registry = TargetRegistry::new(vec![Target::new("/hooks/a", "", "net1", "#random")]);
        let errors = registry.validate("0.0.0.0:80", &known()).unwrap_err();
        assert_eq!(
            errors.0,
            vec![ConfigError::UnknownChannel {
                path: "/hooks/a".into(),
                destination: "net1".into(),
                channel: "#random".into(),
            }]
        );
    }

    #[test]
    fn collects_every_violation() {
        let registry = TargetRegistry::new(vec![
            Target::new("/hooks/a", "", "net1", "#dev"),
            Target::new("/hooks/a", "", "net1", "#dev"),
            Target::new("hooks/{id}", "", "nope", "#dev"),
            Target::new("/status", "", "net1", "#nope"),
        ]);
        let errors = registry.validate("0.0.0.0:80", &known()).unwrap_err();
        assert_eq!(errors.0.len(), 5);
        assert!(errors.contains(&ConfigError::DuplicatePath { path: "/hooks/a".into() }));
        assert!(errors.contains(&ConfigError::InvalidPath { path: "hooks/{id}".into() }));
        assert!(errors.contains(&ConfigError::ReservedPath { path: "/status".into() }));
        assert!(errors.contains(&ConfigError::UnknownDestination {
            path: "hooks/{id}".into(),
            destination: "nope".into(),
        }));
        assert!(errors.contains(&ConfigError::UnknownChannel {
            path: "/status".into(),
            destination: "net1".into(),
            channel: "#nope".into(),
        }));
    }
}
