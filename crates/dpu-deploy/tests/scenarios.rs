//! End-to-end deployer runs against in-memory collaborators.
//!
//! Every collaborator appends to a shared event log so the tests can
//! assert which phases and strategies ran, and in what order. Time is
//! paused, so simulated install durations cost nothing. Tests that check
//! operator-facing messages capture the formatted log output.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dpu_core::{BmcConfig, ClusterConfig, ImageSource, Step, StepSet};
use dpu_deploy::{
    AlternateBoot, Collaborators, DeployError, DeployResult, HardwareClass, HardwareProbe, InstallTask,
    InstallTaskFactory, IsoDeployer, NetworkContext, NodeIdentity, PhaseHook,
};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

const INSTALL_TIME: Duration = Duration::from_secs(95);

const CLUSTER: &str = r#"
name = "dpu-cluster"
install_iso = "https://mirror.example.com/rhcos-live.iso"
external_port = "eno1"
network_api_port = "eno2"

[[masters]]
name = "acc"
kind = "dpu"
mac = "00:00:00:00:aa:01"
ip = "192.168.0.2"

[masters.bmc]
url = "https://192.168.0.1"
user = "root"
password = "secret"
"#;

type Events = Arc<Mutex<Vec<String>>>;

fn record(events: &Events, event: impl Into<String>) {
    events.lock().unwrap().push(event.into());
}

struct FixedProbe {
    class: HardwareClass,
    events: Events,
}

#[async_trait]
impl HardwareProbe for FixedProbe {
    async fn classify(&self, bmc: &BmcConfig) -> DeployResult<HardwareClass> {
        record(&self.events, format!("classify {}", bmc.host()));
        Ok(self.class)
    }
}

struct SlowInstall {
    events: Events,
    fail: bool,
}

#[async_trait]
impl InstallTask for SlowInstall {
    async fn start(&self, image: &ImageSource) -> DeployResult<()> {
        record(&self.events, format!("start {}", image.file_name()));
        tokio::time::sleep(INSTALL_TIME).await;
        if self.fail {
            record(&self.events, "start failed");
            return Err(DeployError::Install {
                node: "acc".to_string(),
                reason: "connection dropped during install".to_string(),
            });
        }
        record(&self.events, "start done");
        Ok(())
    }

    async fn post_boot(&self) -> DeployResult<()> {
        record(&self.events, "post_boot");
        Ok(())
    }
}

struct SlowInstalls {
    events: Events,
    fail: bool,
}

impl InstallTaskFactory for SlowInstalls {
    fn create(&self, node: &NodeIdentity, network: &NetworkContext) -> Arc<dyn InstallTask> {
        record(
            &self.events,
            format!("create {} {} {}", node.name, network.external_port, network.api_port),
        );
        Arc::new(SlowInstall {
            events: Arc::clone(&self.events),
            fail: self.fail,
        })
    }
}

struct RecordingAlternate {
    events: Events,
}

#[async_trait]
impl AlternateBoot for RecordingAlternate {
    async fn boot(&self, cluster: &ClusterConfig, node: &NodeIdentity, image: &ImageSource) -> DeployResult<()> {
        record(&self.events, format!("alternate {} {} {image}", cluster.name, node.mac));
        Ok(())
    }
}

struct RecordingHook {
    step: Step,
    events: Events,
    fail: bool,
}

#[async_trait]
impl PhaseHook for RecordingHook {
    async fn run(&self, _cluster: &ClusterConfig) -> DeployResult<()> {
        record(&self.events, self.step.as_str());
        if self.fail {
            return Err(DeployError::Hook {
                step: self.step,
                command: "./prepare.sh".to_string(),
                status: 1,
            });
        }
        Ok(())
    }
}

struct Harness {
    class: HardwareClass,
    fail_install: bool,
    fail_pre: bool,
    events: Events,
}

impl Harness {
    fn new(class: HardwareClass) -> Self {
        Self {
            class,
            fail_install: false,
            fail_pre: false,
            events: Events::default(),
        }
    }

    fn collaborators(&self) -> Collaborators {
        let hook = |step, fail| {
            Arc::new(RecordingHook {
                step,
                events: Arc::clone(&self.events),
                fail,
            })
        };
        Collaborators {
            probe: Arc::new(FixedProbe {
                class: self.class,
                events: Arc::clone(&self.events),
            }),
            installs: Arc::new(SlowInstalls {
                events: Arc::clone(&self.events),
                fail: self.fail_install,
            }),
            alternate: Arc::new(RecordingAlternate {
                events: Arc::clone(&self.events),
            }),
            preconfig: hook(Step::Pre, self.fail_pre),
            postconfig: hook(Step::Post, false),
        }
    }

    fn deployer(&self, cluster: ClusterConfig, steps: &str) -> DeployResult<IsoDeployer> {
        IsoDeployer::new(cluster, steps.parse().unwrap(), self.collaborators())
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

fn cluster() -> ClusterConfig {
    CLUSTER.parse().unwrap()
}

/// Formatted log output of the current thread's events.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Capture until the returned guard is dropped.
    fn install(&self) -> DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn has(&self, level: &str, message: &str) -> bool {
        self.lines()
            .iter()
            .any(|line| line.contains(level) && line.contains(message))
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[tokio::test(start_paused = true)]
async fn scenario_a_full_run_with_image_boot() {
    let harness = Harness::new(HardwareClass::ImageBoot);
    let report = harness
        .deployer(cluster(), "pre,masters,post")
        .unwrap()
        .deploy()
        .await
        .unwrap();

    assert_eq!(
        harness.events(),
        vec![
            "pre",
            "classify 192.168.0.1",
            "create acc eno1 eno2",
            "start rhcos-live.iso",
            "start done",
            "post_boot",
            "post",
        ]
    );
    assert_eq!(report.steps(), vec![Step::Pre, Step::Masters, Step::Post]);
    assert!(report.duration(Step::Masters).unwrap() >= INSTALL_TIME);
}

#[tokio::test(start_paused = true)]
async fn scenario_b_unknown_hardware_is_fatal() {
    let logs = CapturedLogs::default();
    let _guard = logs.install();
    let harness = Harness::new(HardwareClass::Unknown);
    let err = harness
        .deployer(cluster(), "masters")
        .unwrap()
        .deploy()
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::UnknownHardware { ref node, .. } if node == "acc"));
    assert_ne!(err.exit_code(), 0);
    assert_eq!(harness.events(), vec!["classify 192.168.0.1"]);
    assert!(logs.has("ERROR", "Unknown DPU"), "{:#?}", logs.lines());
}

#[tokio::test(start_paused = true)]
async fn unknown_hardware_never_reaches_post() {
    let harness = Harness::new(HardwareClass::Unknown);
    let result = harness.deployer(cluster(), "pre,masters,post").unwrap().deploy().await;

    assert!(matches!(result, Err(DeployError::UnknownHardware { .. })));
    assert_eq!(harness.events(), vec!["pre", "classify 192.168.0.1"]);
}

#[test]
fn scenario_c_two_masters_rejected_at_construction() {
    let harness = Harness::new(HardwareClass::ImageBoot);
    let mut cluster = cluster();
    let mut second = cluster.masters[0].clone();
    second.name = Some("acc-2".to_string());
    cluster.masters.push(second);

    let err = harness.deployer(cluster, "pre,masters,post").unwrap_err();
    assert!(matches!(err, DeployError::MasterCount { count: 2, .. }));
    assert_eq!(err.exit_code(), 2);
    assert!(harness.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn scenario_d_post_only() {
    let harness = Harness::new(HardwareClass::ImageBoot);
    let report = harness.deployer(cluster(), "post").unwrap().deploy().await.unwrap();

    assert_eq!(harness.events(), vec!["post"]);
    assert_eq!(report.steps(), vec![Step::Post]);
    assert_eq!(report.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn skipped_phases_are_logged() {
    let logs = CapturedLogs::default();
    let _guard = logs.install();
    let harness = Harness::new(HardwareClass::ImageBoot);
    harness.deployer(cluster(), "post").unwrap().deploy().await.unwrap();

    assert!(logs.has("INFO", "Skipping pre configuration."), "{:#?}", logs.lines());
    assert!(logs.has("INFO", "Skipping master creation."), "{:#?}", logs.lines());
    assert!(!logs.has("INFO", "Skipping post configuration."));
}

#[tokio::test(start_paused = true)]
async fn unresolvable_external_port_is_logged_and_fatal() {
    let logs = CapturedLogs::default();
    let _guard = logs.install();
    let dir = tempfile::tempdir().unwrap();
    let mut cluster = cluster();
    cluster.external_port = "auto".to_string();
    cluster.deploy.route_table = dir.path().join("route").display().to_string();

    let harness = Harness::new(HardwareClass::ImageBoot);
    let err = harness.deployer(cluster, "masters,post").unwrap().deploy().await.unwrap_err();

    assert!(matches!(err, DeployError::Config(_)));
    assert_eq!(err.exit_code(), 2);
    assert_eq!(harness.events(), vec!["classify 192.168.0.1"]);
    assert!(logs.has("ERROR", "cannot resolve external port"), "{:#?}", logs.lines());
}

#[tokio::test(start_paused = true)]
async fn only_selected_phases_run_and_are_timed() {
    let subsets = ["", "pre", "masters", "post", "pre,masters", "pre,post", "masters,post", "pre,masters,post"];

    for subset in subsets {
        let harness = Harness::new(HardwareClass::ImageBoot);
        let steps: StepSet = subset.parse().unwrap();
        let report = harness.deployer(cluster(), subset).unwrap().deploy().await.unwrap();
        let events = harness.events();

        assert_eq!(report.steps(), steps.iter().collect::<Vec<_>>(), "steps {subset:?}");
        assert_eq!(events.contains(&"pre".to_string()), steps.contains(Step::Pre), "steps {subset:?}");
        assert_eq!(events.contains(&"post".to_string()), steps.contains(Step::Post), "steps {subset:?}");
        assert_eq!(
            events.iter().any(|e| e.starts_with("classify")),
            steps.contains(Step::Masters),
            "steps {subset:?}"
        );
    }
}

#[test]
fn missing_identity_fails_before_any_phase() {
    let cases: [(&str, fn(&mut ClusterConfig)); 5] = [
        ("mac", |c| c.masters[0].mac = None),
        ("ip", |c| c.masters[0].ip = None),
        ("name", |c| c.masters[0].name = None),
        ("network_api_port", |c| c.network_api_port = None),
        ("network_api_port", |c| c.network_api_port = Some("auto".to_string())),
    ];

    for (expected, break_it) in cases {
        let harness = Harness::new(HardwareClass::ImageBoot);
        let mut cluster = cluster();
        break_it(&mut cluster);

        match harness.deployer(cluster, "pre,masters,post") {
            Err(DeployError::MissingField { field, cluster }) => {
                assert_eq!(field, expected);
                assert_eq!(cluster, "dpu-cluster");
            }
            other => panic!("expected missing {expected}, got {other:?}"),
        }
        assert!(harness.events().is_empty());
    }
}

#[test]
fn missing_identity_is_logged() {
    let logs = CapturedLogs::default();
    let _guard = logs.install();
    let mut cluster = cluster();
    cluster.masters[0].mac = None;

    let harness = Harness::new(HardwareClass::ImageBoot);
    assert!(harness.deployer(cluster, "masters").is_err());
    assert!(logs.has("ERROR", "missing required field"), "{:#?}", logs.lines());
    assert!(logs.has("missing required field", "mac"), "{:#?}", logs.lines());
}

#[tokio::test(start_paused = true)]
async fn failed_install_skips_post_boot_and_post() {
    let mut harness = Harness::new(HardwareClass::ImageBoot);
    harness.fail_install = true;
    let err = harness
        .deployer(cluster(), "pre,masters,post")
        .unwrap()
        .deploy()
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::Install { .. }));
    assert_eq!(err.exit_code(), 4);
    let events = harness.events();
    assert_eq!(events.last().map(String::as_str), Some("start failed"));
    assert!(!events.contains(&"post_boot".to_string()));
    assert!(!events.contains(&"post".to_string()));
}

#[tokio::test(start_paused = true)]
async fn alternate_vendor_boots_without_install_task() {
    let harness = Harness::new(HardwareClass::AlternateVendor);
    let report = harness
        .deployer(cluster(), "masters,post")
        .unwrap()
        .deploy()
        .await
        .unwrap();

    assert_eq!(
        harness.events(),
        vec![
            "classify 192.168.0.1",
            "alternate dpu-cluster 00:00:00:00:aa:01 https://mirror.example.com/rhcos-live.iso",
            "post",
        ]
    );
    assert_eq!(report.steps(), vec![Step::Masters, Step::Post]);
}

#[tokio::test(start_paused = true)]
async fn failing_pre_hook_aborts_the_run() {
    let mut harness = Harness::new(HardwareClass::ImageBoot);
    harness.fail_pre = true;
    let err = harness
        .deployer(cluster(), "pre,masters,post")
        .unwrap()
        .deploy()
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::Hook { step: Step::Pre, .. }));
    assert_eq!(err.exit_code(), 5);
    assert_eq!(harness.events(), vec!["pre"]);
}
