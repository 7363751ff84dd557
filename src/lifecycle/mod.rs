//! Command lifecycle run inside the child process
//!
//! Every command package runs the same four phases, in order, once:
//!
//! | Phase | Owner | Purpose |
//! |-------|-------|---------|
//! | environment check | lifecycle | host version and bundle protocol |
//! | argument normalization | lifecycle | split positionals from options |
//! | initialize | command | parse options into typed fields |
//! | execute | command | do the work |
//!
//! The first failing phase stops the chain and is reported as
//! [`TrellisError::PhaseFailure`].

use crate::error::{TrellisError, TrellisResult};
use async_trait::async_trait;
use semver::Version;
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, error};

/// Oldest host able to launch commands built on this lifecycle
pub const MIN_HOST_VERSION: Version = Version::new(0, 3, 0);

/// Env var carrying the launching host's version
pub const HOST_VERSION_ENV: &str = "TRELLIS_HOST_VERSION";

/// Env var carrying the argument bundle protocol revision
pub const BUNDLE_PROTOCOL_ENV: &str = "TRELLIS_BUNDLE_PROTOCOL";

/// Current argument bundle protocol revision
pub const BUNDLE_PROTOCOL: &str = "1";

/// Lifecycle phases in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    EnvironmentCheck,
    ArgumentNormalization,
    Initialize,
    Execute,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::EnvironmentCheck => "environment check",
            Self::ArgumentNormalization => "argument normalization",
            Self::Initialize => "initialize",
            Self::Execute => "execute",
        };
        write!(f, "{}", name)
    }
}

/// What the launching host told the child about itself
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostInfo {
    pub version: Option<String>,
    pub protocol: Option<String>,
}

impl HostInfo {
    /// Read host details from the process environment
    pub fn from_env() -> Self {
        Self {
            version: std::env::var(HOST_VERSION_ENV).ok(),
            protocol: std::env::var(BUNDLE_PROTOCOL_ENV).ok(),
        }
    }

    /// Details describing this build as the host
    pub fn current() -> Self {
        Self {
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
            protocol: Some(BUNDLE_PROTOCOL.to_string()),
        }
    }
}

/// Arguments after normalization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandArgs {
    pub positional: Vec<Value>,
    pub options: Map<String, Value>,
}

impl CommandArgs {
    /// Positional argument `index` as a string
    pub fn positional_str(&self, index: usize) -> Option<&str> {
        self.positional.get(index).and_then(Value::as_str)
    }

    /// Boolean option, false when absent or not a boolean
    pub fn flag(&self, name: &str) -> bool {
        self.options.get(name).and_then(Value::as_bool).unwrap_or(false)
    }
}

/// Behavior a concrete command supplies
#[async_trait]
pub trait Command: Send {
    /// Set up from normalized arguments
    fn init(&mut self, args: &CommandArgs) -> TrellisResult<()>;

    /// Run the command
    async fn exec(&mut self) -> TrellisResult<()>;
}

/// Driver for one command invocation
#[derive(Debug, Clone)]
pub struct Lifecycle {
    raw: Vec<Value>,
    host: HostInfo,
    min_host: Version,
}

impl Lifecycle {
    pub fn new(raw: Vec<Value>, host: HostInfo) -> Self {
        Self {
            raw,
            host,
            min_host: MIN_HOST_VERSION,
        }
    }

    /// Override the oldest acceptable host version
    pub fn with_min_host_version(mut self, version: Version) -> Self {
        self.min_host = version;
        self
    }

    /// Run all phases, stopping at the first failure
    pub async fn run<C: Command + ?Sized>(self, command: &mut C) -> TrellisResult<()> {
        debug!("Lifecycle phase: {}", Phase::EnvironmentCheck);
        self.check_environment()
            .map_err(|e| fail(Phase::EnvironmentCheck, e))?;

        debug!("Lifecycle phase: {}", Phase::ArgumentNormalization);
        let args = self
            .normalize()
            .map_err(|e| fail(Phase::ArgumentNormalization, e))?;

        debug!("Lifecycle phase: {}", Phase::Initialize);
        command
            .init(&args)
            .map_err(|e| fail(Phase::Initialize, e))?;

        debug!("Lifecycle phase: {}", Phase::Execute);
        command.exec().await.map_err(|e| fail(Phase::Execute, e))
    }

    fn check_environment(&self) -> TrellisResult<()> {
        let raw = self.host.version.as_deref().ok_or_else(|| {
            TrellisError::Environment(format!(
                "not launched by a trellis host ({} is unset)",
                HOST_VERSION_ENV
            ))
        })?;

        let version = Version::parse(raw.trim_start_matches('v')).map_err(|e| {
            TrellisError::Environment(format!("unreadable host version {:?}: {}", raw, e))
        })?;

        if version < self.min_host {
            return Err(TrellisError::Environment(format!(
                "host version {} is too old, v{} or newer is required",
                version, self.min_host
            )));
        }

        match self.host.protocol.as_deref() {
            Some(p) if p != BUNDLE_PROTOCOL => Err(TrellisError::Environment(format!(
                "unsupported bundle protocol {}, expected {}",
                p, BUNDLE_PROTOCOL
            ))),
            _ => Ok(()),
        }
    }

    fn normalize(&self) -> TrellisResult<CommandArgs> {
        let Some((last, positional)) = self.raw.split_last() else {
            return Err(TrellisError::InvalidArguments(
                "argument list cannot be empty".to_string(),
            ));
        };

        let Value::Object(options) = last else {
            return Err(TrellisError::InvalidArguments(
                "last argument must be an options object".to_string(),
            ));
        };

        Ok(CommandArgs {
            positional: positional.to_vec(),
            options: options.clone(),
        })
    }
}

fn fail(phase: Phase, source: TrellisError) -> TrellisError {
    TrellisError::PhaseFailure {
        phase,
        source: Box::new(source),
    }
}

/// Run the lifecycle and map its outcome to a process exit code.
///
/// Failures are logged here and become exit code 1.
pub async fn run_to_exit_code<C: Command + ?Sized>(lifecycle: Lifecycle, command: &mut C) -> i32 {
    match lifecycle.run(command).await {
        Ok(()) => 0,
        Err(e) => {
            error!("{}", e);
            e.exit_code()
        }
    }
}

/// Child-side entry point for native command packages.
///
/// Reads the serialized bundle from the first process argument and host
/// details from the environment.
pub async fn run_from_env<C: Command + ?Sized>(command: &mut C) -> i32 {
    let bundle = std::env::args().nth(1);
    run_with_bundle(bundle.as_deref(), HostInfo::from_env(), command).await
}

/// Decode a serialized bundle and run the lifecycle on it.
///
/// A missing bundle runs with no arguments and fails normalization.
pub async fn run_with_bundle<C: Command + ?Sized>(
    bundle: Option<&str>,
    host: HostInfo,
    command: &mut C,
) -> i32 {
    let raw = match bundle {
        Some(bundle) => match serde_json::from_str::<Vec<Value>>(bundle) {
            Ok(raw) => raw,
            Err(e) => {
                error!("Unreadable argument bundle: {}", e);
                return 1;
            }
        },
        None => Vec::new(),
    };

    run_to_exit_code(Lifecycle::new(raw, host), command).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<&'static str>,
        project: String,
        force: bool,
        fail_init: bool,
        fail_exec: bool,
    }

    #[async_trait]
    impl Command for Recorder {
        fn init(&mut self, args: &CommandArgs) -> TrellisResult<()> {
            self.calls.push("init");
            if self.fail_init {
                return Err(TrellisError::User("bad project name".to_string()));
            }
            self.project = args.positional_str(0).unwrap_or_default().to_string();
            self.force = args.flag("force");
            Ok(())
        }

        async fn exec(&mut self) -> TrellisResult<()> {
            self.calls.push("exec");
            if self.fail_exec {
                return Err(TrellisError::User("template missing".to_string()));
            }
            Ok(())
        }
    }

    fn host(version: &str) -> HostInfo {
        HostInfo {
            version: Some(version.to_string()),
            protocol: Some(BUNDLE_PROTOCOL.to_string()),
        }
    }

    fn bundle() -> Vec<Value> {
        vec![json!("my-app"), json!({"force": true, "debug": false})]
    }

    fn phase_of(err: &TrellisError) -> Phase {
        match err {
            TrellisError::PhaseFailure { phase, .. } => *phase,
            other => panic!("expected phase failure, got {other}"),
        }
    }

    #[tokio::test]
    async fn runs_all_phases_in_order() {
        let mut cmd = Recorder::default();
        Lifecycle::new(bundle(), host("0.3.0"))
            .run(&mut cmd)
            .await
            .unwrap();

        assert_eq!(cmd.calls, vec!["init", "exec"]);
        assert_eq!(cmd.project, "my-app");
        assert!(cmd.force);
    }

    #[tokio::test]
    async fn old_host_stops_before_init() {
        let mut cmd = Recorder::default();
        let err = Lifecycle::new(bundle(), host("0.2.9"))
            .run(&mut cmd)
            .await
            .unwrap_err();

        assert_eq!(phase_of(&err), Phase::EnvironmentCheck);
        assert!(err.to_string().contains("too old"));
        assert!(cmd.calls.is_empty());
    }

    #[tokio::test]
    async fn missing_host_version_fails() {
        let mut cmd = Recorder::default();
        let err = Lifecycle::new(bundle(), HostInfo::default())
            .run(&mut cmd)
            .await
            .unwrap_err();
        assert_eq!(phase_of(&err), Phase::EnvironmentCheck);
    }

    #[tokio::test]
    async fn protocol_mismatch_fails() {
        let mut cmd = Recorder::default();
        let info = HostInfo {
            version: Some("1.0.0".to_string()),
            protocol: Some("2".to_string()),
        };
        let err = Lifecycle::new(bundle(), info).run(&mut cmd).await.unwrap_err();
        assert_eq!(phase_of(&err), Phase::EnvironmentCheck);
    }

    #[tokio::test]
    async fn custom_minimum_host_version() {
        let mut cmd = Recorder::default();
        let result = Lifecycle::new(bundle(), host("0.1.0"))
            .with_min_host_version(Version::new(0, 1, 0))
            .run(&mut cmd)
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn empty_bundle_fails_normalization() {
        let mut cmd = Recorder::default();
        let err = Lifecycle::new(vec![], host("0.3.0"))
            .run(&mut cmd)
            .await
            .unwrap_err();
        assert_eq!(phase_of(&err), Phase::ArgumentNormalization);
        assert!(cmd.calls.is_empty());
    }

    #[tokio::test]
    async fn non_object_trailer_fails_normalization() {
        let mut cmd = Recorder::default();
        let err = Lifecycle::new(vec![json!("a"), json!("b")], host("0.3.0"))
            .run(&mut cmd)
            .await
            .unwrap_err();
        assert_eq!(phase_of(&err), Phase::ArgumentNormalization);
    }

    #[tokio::test]
    async fn init_failure_skips_exec() {
        let mut cmd = Recorder {
            fail_init: true,
            ..Default::default()
        };
        let err = Lifecycle::new(bundle(), host("0.3.0"))
            .run(&mut cmd)
            .await
            .unwrap_err();
        assert_eq!(phase_of(&err), Phase::Initialize);
        assert_eq!(cmd.calls, vec!["init"]);
    }

    #[tokio::test]
    async fn exit_code_reflects_outcome() {
        let mut ok = Recorder::default();
        assert_eq!(run_to_exit_code(Lifecycle::new(bundle(), host("0.3.0")), &mut ok).await, 0);

        let mut failing = Recorder {
            fail_exec: true,
            ..Default::default()
        };
        let code = run_to_exit_code(Lifecycle::new(bundle(), host("0.3.0")), &mut failing).await;
        assert_eq!(code, 1);
        assert_eq!(failing.calls, vec!["init", "exec"]);
    }

    #[tokio::test]
    async fn serialized_bundle_drives_the_command() {
        let mut cmd = Recorder::default();
        let code =
            run_with_bundle(Some(r#"["my-app",{"force":true}]"#), host("0.3.0"), &mut cmd).await;
        assert_eq!(code, 0);
        assert_eq!(cmd.project, "my-app");
        assert!(cmd.force);
    }

    #[tokio::test]
    async fn unreadable_or_missing_bundle_exits_one() {
        let mut cmd = Recorder::default();
        assert_eq!(run_with_bundle(Some("{ nope"), host("0.3.0"), &mut cmd).await, 1);
        assert_eq!(run_with_bundle(None, host("0.3.0"), &mut cmd).await, 1);
        assert!(cmd.calls.is_empty());
    }

    #[test]
    fn options_only_bundle() {
        let args = Lifecycle::new(vec![json!({})], host("0.3.0"))
            .normalize()
            .unwrap();
        assert!(args.positional.is_empty());
        assert!(args.options.is_empty());
        assert!(!args.flag("force"));
    }

    #[test]
    #[serial]
    fn host_info_from_env() {
        std::env::set_var(HOST_VERSION_ENV, "0.4.1");
        std::env::set_var(BUNDLE_PROTOCOL_ENV, BUNDLE_PROTOCOL);
        let info = HostInfo::from_env();
        std::env::remove_var(HOST_VERSION_ENV);
        std::env::remove_var(BUNDLE_PROTOCOL_ENV);

        assert_eq!(info.version.as_deref(), Some("0.4.1"));
        assert_eq!(info.protocol.as_deref(), Some(BUNDLE_PROTOCOL));
    }

    #[test]
    fn current_host_satisfies_minimum() {
        let info = HostInfo::current();
        let version = Version::parse(info.version.as_deref().unwrap()).unwrap();
        assert!(version >= MIN_HOST_VERSION);
    }
}
