//! Concurrent multi-profile aggregation
//!
//! The [`Aggregator`] runs one [`ProfileOperation`] per profile, all at once,
//! and hands back exactly one [`ProfileOutcome`] per profile in input order.
//! A failing or panicking profile only ever affects its own outcome.

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::gh::{is_auth_diagnostic, CommandFailure};
use crate::profile::Profile;

/// Primary per-profile operation (list remote repositories, scan local clones, ...)
#[async_trait]
pub trait ProfileOperation: Send + Sync {
    type Output: Send + 'static;

    async fn run(&self, profile: &Profile) -> Result<Self::Output>;
}

/// Resolves the account name behind a profile's credential directory
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, gh_config_dir: &Path) -> Result<String>;
}

/// A recorded per-profile failure.
///
/// Carries the exit code and diagnostic text of a failed `gh` process when
/// there was one, so callers can propagate the code and decide whether the
/// failure looks like an authentication problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    message: String,
    exit_code: Option<i32>,
    diagnostic: String,
}

impl Failure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            exit_code: None,
            diagnostic: String::new(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Only changes how the failure is presented, never control flow
    pub fn is_auth_error(&self) -> bool {
        is_auth_diagnostic(&self.diagnostic)
    }
}

impl From<anyhow::Error> for Failure {
    fn from(err: anyhow::Error) -> Self {
        let message = format!("{:#}", err);
        match err.downcast_ref::<CommandFailure>() {
            Some(command) => Self {
                message,
                exit_code: Some(command.code),
                diagnostic: command.stderr.clone(),
            },
            None => Self::new(message),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Failure {}

/// Result slot for a single profile
#[derive(Debug, Clone)]
pub struct ProfileOutcome<T> {
    pub profile: Profile,
    /// `None` when no identity resolver was configured
    pub identity: Option<Result<String, Failure>>,
    pub result: Result<T, Failure>,
}

impl<T> ProfileOutcome<T> {
    /// Resolved account name, when identity resolution ran and succeeded
    pub fn identity(&self) -> Option<&str> {
        match &self.identity {
            Some(Ok(user)) => Some(user),
            _ => None,
        }
    }

    pub fn identity_failure(&self) -> Option<&Failure> {
        match &self.identity {
            Some(Err(failure)) => Some(failure),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Fans an operation out across profiles and joins the results
#[derive(Clone, Default)]
pub struct Aggregator {
    identity: Option<Arc<dyn IdentityResolver>>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also resolve each profile's identity alongside the primary operation
    pub fn with_identity(resolver: Arc<dyn IdentityResolver>) -> Self {
        Self {
            identity: Some(resolver),
        }
    }

    /// Run `operation` for every profile concurrently.
    ///
    /// Returns only once every profile has finished. `outcomes[i]` always
    /// belongs to `profiles[i]`, whatever order the tasks complete in.
    pub async fn run<O>(&self, profiles: &[Profile], operation: Arc<O>) -> Vec<ProfileOutcome<O::Output>>
    where
        O: ProfileOperation + 'static,
    {
        if profiles.is_empty() {
            return Vec::new();
        }

        debug!("Fanning out across {} profiles", profiles.len());

        let handles: Vec<_> = profiles
            .iter()
            .cloned()
            .map(|profile| {
                let operation = Arc::clone(&operation);
                let identity = self.identity.clone();
                tokio::spawn(async move { run_profile(profile, operation, identity).await })
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .zip(profiles)
            .map(|(joined, profile)| match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Task for profile {} did not complete: {}", profile.name(), e);
                    ProfileOutcome {
                        profile: profile.clone(),
                        identity: None,
                        result: Err(Failure::new(format!("profile task aborted: {}", e))),
                    }
                }
            })
            .collect()
    }
}

async fn run_profile<O>(
    profile: Profile,
    operation: Arc<O>,
    identity: Option<Arc<dyn IdentityResolver>>,
) -> ProfileOutcome<O::Output>
where
    O: ProfileOperation,
{
    let resolve_identity = async {
        match &identity {
            Some(resolver) => Some(resolver.resolve(profile.gh_config_dir()).await.map_err(Failure::from)),
            None => None,
        }
    };

    let (identity, result) = tokio::join!(resolve_identity, operation.run(&profile));

    if let Some(Err(failure)) = &identity {
        debug!("Identity resolution failed for {}: {}", profile.name(), failure);
    }
    let result = result.map_err(Failure::from);
    if let Err(failure) = &result {
        debug!("Operation failed for {}: {}", profile.name(), failure);
    }

    ProfileOutcome {
        profile,
        identity,
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use quickcheck_macros::quickcheck;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn profiles(names: &[&str]) -> Vec<Profile> {
        names
            .iter()
            .map(|n| Profile::new(*n, format!("/cfg/{}", n), None).unwrap())
            .collect()
    }

    /// Echoes the profile name after an optional per-profile delay
    #[derive(Default)]
    struct ScriptedOperation {
        delays_ms: HashMap<String, u64>,
        failing: Vec<String>,
        panicking: Vec<String>,
        calls: AtomicUsize,
        finished: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ProfileOperation for ScriptedOperation {
        type Output = String;

        async fn run(&self, profile: &Profile) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(ms) = self.delays_ms.get(profile.name()) {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            self.finished.lock().unwrap().push(profile.name().to_string());

            if self.panicking.iter().any(|n| n == profile.name()) {
                panic!("scripted panic for {}", profile.name());
            }
            if self.failing.iter().any(|n| n == profile.name()) {
                return Err(anyhow!("gh command failed for {}", profile.name()));
            }
            Ok(format!("repos of {}", profile.name()))
        }
    }

    struct MapResolver {
        users: HashMap<PathBuf, String>,
    }

    #[async_trait]
    impl IdentityResolver for MapResolver {
        async fn resolve(&self, gh_config_dir: &Path) -> Result<String> {
            self.users
                .get(gh_config_dir)
                .cloned()
                .ok_or_else(|| anyhow!("hosts.yml not found in {}", gh_config_dir.display()))
        }
    }

    #[tokio::test]
    async fn test_empty_input_spawns_nothing() {
        let operation = Arc::new(ScriptedOperation::default());
        let outcomes = Aggregator::new().run(&[], Arc::clone(&operation)).await;

        assert!(outcomes.is_empty());
        assert_eq!(operation.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_slowest_profile_keeps_its_index() {
        let input = profiles(&["alpha", "bravo", "charlie", "delta"]);
        let operation = Arc::new(ScriptedOperation {
            delays_ms: HashMap::from([("bravo".to_string(), 150)]),
            ..Default::default()
        });

        let outcomes = Aggregator::new().run(&input, Arc::clone(&operation)).await;

        assert_eq!(operation.finished.lock().unwrap().last().unwrap(), "bravo");
        assert_eq!(outcomes.len(), input.len());
        for (outcome, profile) in outcomes.iter().zip(&input) {
            assert_eq!(&outcome.profile, profile);
            assert_eq!(
                outcome.result.as_deref().unwrap(),
                format!("repos of {}", profile.name())
            );
        }
    }

    #[tokio::test]
    async fn test_failure_is_isolated_to_its_profile() {
        let input = profiles(&["work", "broken", "personal"]);
        let operation = Arc::new(ScriptedOperation {
            failing: vec!["broken".to_string()],
            ..Default::default()
        });

        let outcomes = Aggregator::new().run(&input, operation).await;

        assert!(outcomes[0].is_success());
        assert_eq!(
            outcomes[1].result.as_ref().unwrap_err().message(),
            "gh command failed for broken"
        );
        assert!(outcomes[2].is_success());
    }

    #[tokio::test]
    async fn test_panic_is_isolated_to_its_profile() {
        let input = profiles(&["work", "explodes", "personal"]);
        let operation = Arc::new(ScriptedOperation {
            panicking: vec!["explodes".to_string()],
            ..Default::default()
        });

        let outcomes = Aggregator::new().run(&input, operation).await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[1].profile.name(), "explodes");
        assert!(outcomes[1]
            .result
            .as_ref()
            .unwrap_err()
            .message()
            .starts_with("profile task aborted"));
        assert!(outcomes[0].is_success());
        assert!(outcomes[2].is_success());
    }

    #[tokio::test]
    async fn test_identity_and_operation_are_independent() {
        let input = profiles(&["work", "personal"]);
        let resolver = Arc::new(MapResolver {
            users: HashMap::from([(PathBuf::from("/cfg/personal"), "octocat".to_string())]),
        });
        let operation = Arc::new(ScriptedOperation {
            failing: vec!["personal".to_string()],
            ..Default::default()
        });

        let outcomes = Aggregator::with_identity(resolver).run(&input, operation).await;

        // identity failed, operation still succeeded
        assert_eq!(outcomes[0].identity(), None);
        assert!(outcomes[0]
            .identity_failure()
            .unwrap()
            .message()
            .contains("hosts.yml not found"));
        assert_eq!(outcomes[0].result.as_deref().unwrap(), "repos of work");

        // identity resolved, operation failed
        assert_eq!(outcomes[1].identity(), Some("octocat"));
        assert!(outcomes[1].result.is_err());
    }

    #[tokio::test]
    async fn test_without_resolver_identity_is_absent() {
        let input = profiles(&["work"]);
        let outcomes = Aggregator::new()
            .run(&input, Arc::new(ScriptedOperation::default()))
            .await;

        assert!(outcomes[0].identity.is_none());
        assert!(outcomes[0].identity_failure().is_none());
    }

    #[test]
    fn test_failure_from_command_failure_keeps_code() {
        let err = anyhow::Error::new(CommandFailure {
            code: 4,
            stderr: "HTTP 401: Bad credentials\n".to_string(),
        });
        let failure = Failure::from(err);

        assert_eq!(failure.exit_code(), Some(4));
        assert_eq!(failure.message(), "HTTP 401: Bad credentials");
        assert!(failure.is_auth_error());

        let plain = Failure::from(anyhow!("authentication required"));
        assert_eq!(plain.exit_code(), None);
        assert!(!plain.is_auth_error());
    }

    #[quickcheck]
    fn prop_outcomes_follow_input_order(delays: Vec<u8>) -> bool {
        let delays: Vec<u64> = delays.into_iter().take(12).map(|d| u64::from(d % 20)).collect();
        let names: Vec<String> = (0..delays.len()).map(|i| format!("p{}", i)).collect();
        let input: Vec<Profile> = names
            .iter()
            .map(|n| Profile::new(n.as_str(), format!("/cfg/{}", n), None).unwrap())
            .collect();
        let operation = Arc::new(ScriptedOperation {
            delays_ms: names.iter().cloned().zip(delays).collect(),
            ..Default::default()
        });

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let outcomes = runtime.block_on(Aggregator::new().run(&input, operation));

        outcomes.len() == input.len()
            && outcomes.iter().zip(&input).all(|(o, p)| &o.profile == p)
    }
}
