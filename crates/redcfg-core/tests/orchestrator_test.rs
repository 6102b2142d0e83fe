#![allow(clippy::unwrap_used)]
// End-to-end reconciliation tests against an in-memory BMC.

mod support;

use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use futures_util::future::join_all;
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::time::Instant;

use redcfg_core::{
    ApplySettings, ApplyTimePolicy, AttributeGroup, AttributeValue, DesiredAttributes,
    EndpointLocks, ErrorKind, MaintenanceWindow, Orchestrator, PowerState, ReconcileOptions,
    ReconcilePhase, ResetType, SecurityKeyRequest, StorageController, StorageDesired,
};
use secrecy::SecretString;

use support::{
    BIOS_SETTINGS_URI, BIOS_URI, CONTROLLER_ID, FakeConnector, FakeDevice, JOB_URI,
    MANAGER_ATTRS_URI, MANAGER_ID, RESET_URI, SYSTEM_ID, endpoint,
};

// ── Helpers ─────────────────────────────────────────────────────────

const BMC: &str = "https://10.0.0.12";

fn orchestrator(device: &Arc<FakeDevice>) -> Orchestrator {
    Orchestrator::with_locks(
        Arc::new(FakeConnector(device.clone())),
        EndpointLocks::new(),
    )
}

fn desired(pairs: &[(&str, AttributeValue)]) -> DesiredAttributes {
    pairs
        .iter()
        .map(|(name, value)| ((*name).to_owned(), value.clone()))
        .collect()
}

fn options(apply: ApplySettings) -> ReconcileOptions {
    ReconcileOptions {
        poll_interval: Duration::from_secs(1),
        ..ReconcileOptions::default()
    }
    .with_apply(apply)
}

fn bios() -> AttributeGroup {
    AttributeGroup::bios(SYSTEM_ID)
}

fn is_released(orch: &Orchestrator) -> bool {
    orch.locks().try_acquire(&endpoint(BMC).key()).is_some()
}

const SET_KEY_URI: &str =
    "/redfish/v1/Dell/Systems/System.Embedded.1/DellRaidService/Actions/DellRaidService.SetControllerKey";

fn set_key() -> Option<SecurityKeyRequest> {
    Some(SecurityKeyRequest::set(
        SecretString::from("Passphrase-1".to_string()),
        "key-1",
    ))
}

// ── No-op and coercion ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn matching_state_submits_nothing() {
    let device = Arc::new(FakeDevice::dell());
    let orch = orchestrator(&device);

    let want = desired(&[
        ("LogicalProc", "Enabled".into()),
        ("AcPwrRcvryUserDelay", "120".into()),
    ]);
    let report = orch
        .reconcile(&endpoint(BMC), &bios(), &want, &options(ApplySettings::on_reset()))
        .await
        .unwrap();

    assert!(!report.changed());
    assert!(!report.power_cycled);
    assert!(device.submissions().is_empty());
    assert_eq!(device.resets(), 0);
    assert_eq!(device.reads(), 2);
    assert_eq!(device.registry_lists(), 1);
    assert_eq!(report.state.attributes["AcPwrRcvryUserDelay"], json!(120));
}

#[tokio::test(start_paused = true)]
async fn integer_given_as_number_or_string_is_the_same() {
    let device = Arc::new(FakeDevice::dell());
    let orch = orchestrator(&device);

    let want = desired(&[("AcPwrRcvryUserDelay", 120.into())]);
    let report = orch
        .reconcile(&endpoint(BMC), &bios(), &want, &options(ApplySettings::immediate()))
        .await
        .unwrap();
    assert!(!report.changed());

    let want = desired(&[("AcPwrRcvryUserDelay", "240".into())]);
    let report = orch
        .reconcile(&endpoint(BMC), &bios(), &want, &options(ApplySettings::immediate()))
        .await
        .unwrap();
    assert_eq!(report.changes, vec!["AcPwrRcvryUserDelay".to_string()]);
    assert_eq!(
        device.submissions()[0].body["Attributes"],
        json!({"AcPwrRcvryUserDelay": 240})
    );
}

#[tokio::test]
async fn unknown_attribute_fails_before_submitting() {
    let device = Arc::new(FakeDevice::dell());
    let orch = orchestrator(&device);

    let want = desired(&[("NoSuchKnob", "On".into())]);
    let err = orch
        .reconcile(&endpoint(BMC), &bios(), &want, &options(ApplySettings::on_reset()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnknownAttribute);
    assert!(device.submissions().is_empty());
    assert!(orch.locks().try_acquire(&endpoint(BMC).key()).is_some());
}

#[tokio::test]
async fn non_numeric_integer_is_a_coercion_error() {
    let device = Arc::new(FakeDevice::dell());
    let orch = orchestrator(&device);

    let want = desired(&[("AcPwrRcvryUserDelay", "soon".into())]);
    let err = orch
        .reconcile(&endpoint(BMC), &bios(), &want, &options(ApplySettings::on_reset()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TypeCoercionError);
    assert!(device.submissions().is_empty());
}

// ── Registry ────────────────────────────────────────────────────────

#[tokio::test]
async fn registry_missing_from_collection() {
    let device = Arc::new(FakeDevice::dell().with_document(
        BIOS_URI,
        json!({
            "Id": "Bios",
            "AttributeRegistry": "OemBiosAttributeRegistry.v2_1_0",
            "Attributes": {"LogicalProc": "Enabled"}
        }),
    ));
    let orch = orchestrator(&device);

    let want = desired(&[("LogicalProc", "Disabled".into())]);
    let err = orch
        .reconcile(&endpoint(BMC), &bios(), &want, &options(ApplySettings::on_reset()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RegistryNotFound);
    assert!(err.to_string().contains("OemBiosAttributeRegistry.v2_1_0"));
    assert!(device.submissions().is_empty());
    assert!(is_released(&orch));
}

#[tokio::test]
async fn registry_download_failure() {
    let device = Arc::new(FakeDevice::dell().failing_registry_fetches());
    let orch = orchestrator(&device);

    let want = desired(&[("LogicalProc", "Disabled".into())]);
    let err = orch
        .reconcile(&endpoint(BMC), &bios(), &want, &options(ApplySettings::on_reset()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RegistryFetchError);
    assert!(err.api_error().is_some_and(redcfg_api::Error::is_transient));
    assert_eq!(device.registry_lists(), 1);
    assert!(device.submissions().is_empty());
    assert!(is_released(&orch));
}

// ── Apply-time gating ───────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn on_reset_submits_reboots_then_polls() {
    let device = Arc::new(
        FakeDevice::dell()
            .with_location(JOB_URI)
            .with_job_states(&["Scheduled", "Running", "Completed"]),
    );
    let orch = orchestrator(&device);

    let want = desired(&[("LogicalProc", "Disabled".into())]);
    let report = orch
        .reconcile(&endpoint(BMC), &bios(), &want, &options(ApplySettings::on_reset()))
        .await
        .unwrap();

    let submissions = device.submissions();
    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[0].method, "PATCH");
    assert_eq!(submissions[0].uri, BIOS_SETTINGS_URI);
    assert_eq!(
        submissions[0].body,
        json!({"Attributes": {"LogicalProc": "Disabled"}})
    );
    assert_eq!(submissions[1].uri, RESET_URI);
    assert_eq!(submissions[1].body, json!({"ResetType": "ForceRestart"}));

    assert_eq!(device.job_polls(), 3);
    assert!(report.power_cycled);
    assert_eq!(report.jobs, vec![JOB_URI.to_string()]);
    assert_eq!(report.state.attributes["LogicalProc"], json!("Disabled"));
}

#[tokio::test(start_paused = true)]
async fn host_that_is_off_is_powered_on_to_apply() {
    let device = Arc::new(FakeDevice::dell().with_power("Off"));
    let orch = orchestrator(&device);

    let want = desired(&[("LogicalProc", "Disabled".into())]);
    orch.reconcile(&endpoint(BMC), &bios(), &want, &options(ApplySettings::on_reset()))
        .await
        .unwrap();

    let reset = device.submissions().pop().unwrap();
    assert_eq!(reset.body, json!({"ResetType": "On"}));
    assert_eq!(device.power(), "On");
}

#[tokio::test(start_paused = true)]
async fn immediate_manager_change_neither_reboots_nor_polls() {
    let device = Arc::new(FakeDevice::dell());
    let orch = orchestrator(&device);

    let group = AttributeGroup::manager(MANAGER_ID);
    let want = desired(&[("IPMILan.1.Enable", "Enabled".into())]);
    let report = orch
        .reconcile(&endpoint(BMC), &group, &want, &options(ApplySettings::immediate()))
        .await
        .unwrap();

    assert_eq!(device.submissions().len(), 1);
    assert_eq!(device.submissions()[0].uri, MANAGER_ATTRS_URI);
    assert_eq!(device.resets(), 0);
    assert_eq!(device.job_polls(), 0);
    assert_eq!(report.state.attributes["IPMILan.1.Enable"], json!("Enabled"));
}

#[tokio::test(start_paused = true)]
async fn manager_rejects_deferred_apply_time() {
    let device = Arc::new(FakeDevice::dell());
    let orch = orchestrator(&device);

    let group = AttributeGroup::manager(MANAGER_ID);
    let want = desired(&[("IPMILan.1.Enable", "Enabled".into())]);
    let err = orch
        .reconcile(&endpoint(BMC), &group, &want, &options(ApplySettings::on_reset()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnsupportedApplyTime);
    assert!(device.submissions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn maintenance_window_schedules_without_waiting() {
    let device = Arc::new(FakeDevice::dell().with_location(JOB_URI));
    let orch = orchestrator(&device);

    let window = MaintenanceWindow::new(
        DateTime::parse_from_rfc3339("2026-11-01T02:00:00+00:00").unwrap(),
        Duration::from_secs(3600),
    );
    let apply = ApplySettings::in_window(ApplyTimePolicy::AtMaintenanceWindowStart, window);
    let want = desired(&[("LogicalProc", "Disabled".into())]);
    let report = orch
        .reconcile(&endpoint(BMC), &bios(), &want, &options(apply))
        .await
        .unwrap();

    assert_eq!(
        device.submissions()[0].body["@Redfish.SettingsApplyTime"],
        json!({
            "ApplyTime": "AtMaintenanceWindowStart",
            "MaintenanceWindowStartTime": "2026-11-01T02:00:00+00:00",
            "MaintenanceWindowDurationInSeconds": 3600
        })
    );
    assert_eq!(device.job_polls(), 0);
    assert_eq!(device.resets(), 0);
    assert!(report.jobs.is_empty());
    assert_eq!(report.deferred_jobs, vec![JOB_URI.to_string()]);
}

#[tokio::test]
async fn maintenance_policy_without_window_is_rejected() {
    let device = Arc::new(FakeDevice::dell());
    let orch = orchestrator(&device);

    let apply = ApplySettings {
        policy: ApplyTimePolicy::InMaintenanceWindowOnReset,
        window: None,
    };
    let want = desired(&[("LogicalProc", "Disabled".into())]);
    let err = orch
        .reconcile(&endpoint(BMC), &bios(), &want, &options(apply))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MissingMaintenanceWindow);
    assert!(device.submissions().is_empty());
}

#[tokio::test]
async fn zero_length_window_is_rejected() {
    let device = Arc::new(FakeDevice::dell());
    let orch = orchestrator(&device);

    let window = MaintenanceWindow::new(
        DateTime::parse_from_rfc3339("2026-11-01T02:00:00+00:00").unwrap(),
        Duration::ZERO,
    );
    let apply = ApplySettings::in_window(ApplyTimePolicy::AtMaintenanceWindowStart, window);
    let want = desired(&[("LogicalProc", "Disabled".into())]);
    let err = orch
        .reconcile(&endpoint(BMC), &bios(), &want, &options(apply))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MissingMaintenanceWindow);
    assert!(device.submissions().is_empty());
    assert!(is_released(&orch));
}

// ── Storage rules ───────────────────────────────────────────────────

#[tokio::test]
async fn controller_mode_cannot_be_combined() {
    let device = Arc::new(FakeDevice::dell());
    let orch = orchestrator(&device);

    let controller = StorageController::new(SYSTEM_ID, MANAGER_ID, CONTROLLER_ID);
    let want = StorageDesired {
        attributes: desired(&[
            ("ControllerMode", "HBA".into()),
            ("PatrolReadMode", "Manual".into()),
        ]),
        key_action: None,
    };
    let err = orch
        .reconcile(&endpoint(BMC), &controller, &want, &options(ApplySettings::on_reset()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValidationRuleViolation);
    assert!(device.submissions().is_empty());
    assert_eq!(device.resets(), 0);
    assert!(is_released(&orch));
}

#[tokio::test]
async fn key_action_is_never_combined_with_settings() {
    let device = Arc::new(FakeDevice::dell().accepting_only(SET_KEY_URI, JOB_URI));
    let orch = orchestrator(&device);

    let controller = StorageController::new(SYSTEM_ID, MANAGER_ID, CONTROLLER_ID);
    let want = StorageDesired {
        attributes: desired(&[("PatrolReadMode", "Manual".into())]),
        key_action: set_key(),
    };
    let err = orch
        .reconcile(&endpoint(BMC), &controller, &want, &options(ApplySettings::on_reset()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValidationRuleViolation);
    assert!(device.submissions().is_empty());
    assert!(is_released(&orch));
}

#[tokio::test(start_paused = true)]
async fn key_action_alone_runs_as_a_job() {
    let device = Arc::new(
        FakeDevice::dell()
            .accepting_only(SET_KEY_URI, JOB_URI)
            .with_job_states(&["Running", "Completed"]),
    );
    let orch = orchestrator(&device);

    let controller = StorageController::new(SYSTEM_ID, MANAGER_ID, CONTROLLER_ID);
    let want = StorageDesired {
        attributes: DesiredAttributes::new(),
        key_action: set_key(),
    };
    let report = orch
        .reconcile(&endpoint(BMC), &controller, &want, &options(ApplySettings::on_reset()))
        .await
        .unwrap();

    let submissions = device.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].method, "POST");
    assert_eq!(submissions[0].uri, SET_KEY_URI);
    assert_eq!(submissions[0].body["TargetFQDD"], json!(CONTROLLER_ID));
    assert_eq!(device.job_polls(), 2);
    assert_eq!(device.resets(), 0);
    assert_eq!(report.jobs, vec![JOB_URI.to_string()]);
    assert_eq!(report.changes, vec!["SetControllerKey".to_string()]);
}

// ── Failures ────────────────────────────────────────────────────────

#[tokio::test]
async fn rejected_submission_releases_the_lock() {
    let device = Arc::new(FakeDevice::dell().failing_submissions());
    let orch = orchestrator(&device);
    let mut events = orch.subscribe();

    let want = desired(&[("LogicalProc", "Disabled".into())]);
    let err = orch
        .reconcile(&endpoint(BMC), &bios(), &want, &options(ApplySettings::on_reset()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SubmissionError);
    assert_eq!(err.api_error().and_then(|e| e.message_id()), Some("Base.1.12.PropertyValueNotInList"));
    assert_eq!(device.reads(), 1);
    assert_eq!(device.resets(), 0);
    assert!(orch.locks().try_acquire(&endpoint(BMC).key()).is_some());

    let mut last = None;
    while let Ok(event) = events.try_recv() {
        last = Some(event.phase);
    }
    assert_eq!(last, Some(ReconcilePhase::Failed));
}

#[tokio::test(start_paused = true)]
async fn empty_location_is_an_error() {
    let device = Arc::new(FakeDevice::dell().with_location(""));
    let orch = orchestrator(&device);

    let want = desired(&[("LogicalProc", "Disabled".into())]);
    let err = orch
        .reconcile(&endpoint(BMC), &bios(), &want, &options(ApplySettings::immediate()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MissingJobLocation);
    assert_eq!(device.job_polls(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_job_carries_the_device_message() {
    let device = Arc::new(
        FakeDevice::dell()
            .with_location(JOB_URI)
            .with_job_states(&["Running", "Failed"]),
    );
    let orch = orchestrator(&device);

    let want = desired(&[("LogicalProc", "Disabled".into())]);
    let err = orch
        .reconcile(&endpoint(BMC), &bios(), &want, &options(ApplySettings::immediate()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::JobFailed);
    assert!(err.to_string().contains("Unable to apply the configuration changes"));
    assert_eq!(device.reads(), 1);
}

#[tokio::test(start_paused = true)]
async fn job_timeout_stops_polling_and_skips_reread() {
    let device = Arc::new(
        FakeDevice::dell()
            .with_location(JOB_URI)
            .with_job_states(&["Running"]),
    );
    let orch = orchestrator(&device);

    let opts = ReconcileOptions {
        job_timeout: Duration::from_secs(5),
        ..options(ApplySettings::immediate())
    };
    let started = Instant::now();
    let want = desired(&[("LogicalProc", "Disabled".into())]);
    let err = orch
        .reconcile(&endpoint(BMC), &bios(), &want, &opts)
        .await
        .unwrap_err();

    match err {
        redcfg_core::CoreError::JobTimedOut {
            job,
            timeout_secs,
            interval_secs,
        } => {
            assert_eq!(job, JOB_URI);
            assert_eq!(timeout_secs, 5);
            assert_eq!(interval_secs, 1);
        }
        other => panic!("expected a job timeout, got {other}"),
    }
    assert_eq!(device.job_polls(), 5);
    assert_eq!(Instant::now() - started, Duration::from_secs(5));
    assert_eq!(device.reads(), 1);
    assert!(is_released(&orch));
}

#[tokio::test(start_paused = true)]
async fn caller_deadline_cuts_job_wait_short() {
    let device = Arc::new(
        FakeDevice::dell()
            .with_location(JOB_URI)
            .with_job_states(&["Running"]),
    );
    let orch = orchestrator(&device);

    let opts = ReconcileOptions {
        job_timeout: Duration::from_secs(60),
        deadline: Some(Instant::now() + Duration::from_secs(3)),
        ..options(ApplySettings::immediate())
    };
    let want = desired(&[("LogicalProc", "Disabled".into())]);
    let err = orch
        .reconcile(&endpoint(BMC), &bios(), &want, &opts)
        .await
        .unwrap_err();

    match err {
        redcfg_core::CoreError::JobTimedOut { timeout_secs, .. } => assert_eq!(timeout_secs, 3),
        other => panic!("expected a job timeout, got {other}"),
    }
    assert_eq!(device.job_polls(), 3);
    assert!(is_released(&orch));
}

#[tokio::test(start_paused = true)]
async fn reboot_that_never_completes_fails_before_polling() {
    let device = Arc::new(
        FakeDevice::dell()
            .with_location(JOB_URI)
            .with_power_after_reset(&["PoweringOff", "Off"]),
    );
    let orch = orchestrator(&device);

    let opts = ReconcileOptions {
        reset_timeout: Duration::from_secs(3),
        ..options(ApplySettings::on_reset())
    };
    let want = desired(&[("LogicalProc", "Disabled".into())]);
    let err = orch
        .reconcile(&endpoint(BMC), &bios(), &want, &opts)
        .await
        .unwrap_err();

    match err {
        redcfg_core::CoreError::PowerTimeout { target, last, timeout_secs } => {
            assert_eq!(target, PowerState::On);
            assert_eq!(last, PowerState::Off);
            assert_eq!(timeout_secs, 3);
        }
        other => panic!("expected a power timeout, got {other}"),
    }
    assert_eq!(device.resets(), 1);
    assert_eq!(device.job_polls(), 0);
    assert_eq!(device.reads(), 1);
    assert!(is_released(&orch));
}

#[tokio::test(start_paused = true)]
async fn reread_failure_is_reported_separately() {
    let device = Arc::new(FakeDevice::dell().failing_reads_after(1));
    let orch = orchestrator(&device);

    let want = desired(&[("LogicalProc", "Disabled".into())]);
    let err = orch
        .reconcile(&endpoint(BMC), &bios(), &want, &options(ApplySettings::immediate()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RereadError);
    assert_eq!(device.submissions().len(), 1);
}

// ── Locking ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn same_endpoint_calls_never_overlap() {
    let device = Arc::new(FakeDevice::dell().with_submit_delay(Duration::from_millis(200)));
    let orch = orchestrator(&device);
    let opts = options(ApplySettings::immediate());

    let first = desired(&[("LogicalProc", "Disabled".into())]);
    let second = desired(&[("WorkloadProfile", "VtOptimizedProfile".into())]);
    let group = bios();
    let target = endpoint(BMC);
    let (a, b) = tokio::join!(
        orch.reconcile(&target, &group, &first, &opts),
        orch.reconcile(&target, &group, &second, &opts),
    );

    a.unwrap();
    let b = b.unwrap();
    assert_eq!(device.max_in_flight(), 1);
    assert_eq!(b.state.attributes["LogicalProc"], json!("Disabled"));
    assert_eq!(b.state.attributes["WorkloadProfile"], json!("VtOptimizedProfile"));
    for submission in device.submissions() {
        assert_eq!(submission.body["Attributes"].as_object().unwrap().len(), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn many_callers_queue_on_one_endpoint() {
    let device = Arc::new(FakeDevice::dell().with_submit_delay(Duration::from_millis(50)));
    let orch = orchestrator(&device);
    let opts = options(ApplySettings::immediate());
    let group = bios();
    let target = endpoint(BMC);

    let wants: Vec<DesiredAttributes> = [60, 90, 180, 300]
        .into_iter()
        .map(|delay| desired(&[("AcPwrRcvryUserDelay", delay.into())]))
        .collect();
    let results = join_all(
        wants
            .iter()
            .map(|want| orch.reconcile(&target, &group, want, &opts)),
    )
    .await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(device.max_in_flight(), 1);
    assert_eq!(device.submissions().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn different_endpoints_run_concurrently() {
    let device = Arc::new(FakeDevice::dell().with_submit_delay(Duration::from_millis(200)));
    let orch = orchestrator(&device);
    let opts = options(ApplySettings::immediate());

    let first = desired(&[("LogicalProc", "Disabled".into())]);
    let second = desired(&[("WorkloadProfile", "VtOptimizedProfile".into())]);
    let group = bios();
    let (left, right) = (endpoint("https://10.0.0.12"), endpoint("https://10.0.0.13"));
    let (a, b) = tokio::join!(
        orch.reconcile(&left, &group, &first, &opts),
        orch.reconcile(&right, &group, &second, &opts),
    );

    a.unwrap();
    b.unwrap();
    assert_eq!(device.max_in_flight(), 2);
}

#[tokio::test(start_paused = true)]
async fn deadline_while_waiting_for_lock() {
    let device = Arc::new(FakeDevice::dell());
    let orch = orchestrator(&device);
    let target = endpoint(BMC);
    let _held = orch.locks().try_acquire(&target.key()).unwrap();

    let opts = ReconcileOptions {
        deadline: Some(Instant::now() + Duration::from_secs(2)),
        ..options(ApplySettings::immediate())
    };
    let want = desired(&[("LogicalProc", "Disabled".into())]);
    let err = orch
        .reconcile(&target, &bios(), &want, &opts)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::LockUnavailable);
    assert_eq!(device.reads(), 0);
}

#[tokio::test]
async fn cancellation_while_waiting_for_lock() {
    let device = Arc::new(FakeDevice::dell());
    let orch = orchestrator(&device);
    let target = endpoint(BMC);
    let _held = orch.locks().try_acquire(&target.key()).unwrap();

    let opts = options(ApplySettings::immediate());
    opts.cancel.cancel();
    let want = desired(&[("LogicalProc", "Disabled".into())]);
    let err = orch
        .reconcile(&target, &bios(), &want, &opts)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn no_op_emits_phases_in_order() {
    let device = Arc::new(FakeDevice::dell());
    let orch = orchestrator(&device);
    let mut events = orch.subscribe();

    let want = desired(&[("LogicalProc", "Enabled".into())]);
    orch.reconcile(&endpoint(BMC), &bios(), &want, &options(ApplySettings::on_reset()))
        .await
        .unwrap();

    let mut phases = Vec::new();
    while let Ok(event) = events.try_recv() {
        assert_eq!(event.resource, "BIOS");
        phases.push(event.phase);
    }
    assert_eq!(
        phases,
        vec![
            ReconcilePhase::Locked,
            ReconcilePhase::Read,
            ReconcilePhase::Diffed,
            ReconcilePhase::Reread,
            ReconcilePhase::Released,
        ]
    );
}

// ── Power ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn power_off_then_noop_when_already_off() {
    let device = Arc::new(FakeDevice::dell());
    let orch = orchestrator(&device);
    let opts = ReconcileOptions::default();

    let state = orch
        .power(&endpoint(BMC), ResetType::ForceOff, &opts)
        .await
        .unwrap();
    assert_eq!(state, PowerState::Off);
    assert_eq!(device.resets(), 1);

    let state = orch
        .power(&endpoint(BMC), ResetType::ForceOff, &opts)
        .await
        .unwrap();
    assert_eq!(state, PowerState::Off);
    assert_eq!(device.resets(), 1);
}

#[tokio::test(start_paused = true)]
async fn transitional_state_counts_as_done() {
    let device = Arc::new(FakeDevice::dell().with_power_after_reset(&["On", "PoweringOff"]));
    let orch = orchestrator(&device);

    let state = orch
        .power(&endpoint(BMC), ResetType::GracefulShutdown, &ReconcileOptions::default())
        .await
        .unwrap();
    assert_eq!(state, PowerState::PoweringOff);
    assert_eq!(device.resets(), 1);
}

#[tokio::test(start_paused = true)]
async fn power_timeout_reports_last_state() {
    let device = Arc::new(FakeDevice::dell().with_power_after_reset(&["On"]));
    let orch = orchestrator(&device);

    let opts = ReconcileOptions {
        reset_timeout: Duration::from_secs(3),
        poll_interval: Duration::from_secs(1),
        ..ReconcileOptions::default()
    };
    let err = orch
        .power(&endpoint(BMC), ResetType::ForceOff, &opts)
        .await
        .unwrap_err();

    match err {
        redcfg_core::CoreError::PowerTimeout { target, last, timeout_secs } => {
            assert_eq!(target, PowerState::Off);
            assert_eq!(last, PowerState::On);
            assert_eq!(timeout_secs, 3);
        }
        other => panic!("expected a power timeout, got {other}"),
    }
    assert_eq!(device.resets(), 1);
    assert!(orch.locks().try_acquire(&endpoint(BMC).key()).is_some());
}
