mod common;

use std::path::Path;

use hangar_core::cancel::CancellationFlag;
use hangar_core::error::{DeployError, ErrorKind};
use hangar_core::identity::ServiceIdentity;
use hangar_core::installer::{DeploymentTarget, ServiceOptions, SettingsUpdateOutcome};
use hangar_core::platform::{OwnershipSpec, ServiceRegistrar, ServiceRegistrationDescriptor};
use hangar_core::settings::SettingsPayload;

use common::{settings_json, write_file, write_program_archive, FakeHost, RecordingProgress, Sandbox};

const ARCHIVE: &str = "host-staging-app1-linux-x64-2024_01_01_000000.zip";

fn target(project: &str) -> DeploymentTarget {
    DeploymentTarget::new(
        ServiceIdentity::new(project, "staging"),
        OwnershipSpec::new(Some("svc-app".to_string()), Some("svc".to_string())),
    )
}

fn service_options() -> ServiceOptions {
    ServiceOptions {
        run_as_user: Some("svc-app".to_string()),
        description_signature: Some("[hangar]".to_string()),
        project_description: Some("App One".to_string()),
    }
}

fn stage_archive(sandbox: &Sandbox, target: &DeploymentTarget, version: &str) {
    write_program_archive(
        &sandbox.work(),
        ARCHIVE,
        &target.identity.main_binary_file_name(),
        version,
        &[("wwwroot/index.html", "<html></html>")],
    );
}

fn expected_descriptor(sandbox: &Sandbox, target: &DeploymentTarget) -> ServiceRegistrationDescriptor {
    let installer = sandbox.installer(FakeHost::default());
    let o = service_options();
    ServiceRegistrationDescriptor::new(
        &target.identity,
        installer.layout(),
        o.run_as_user.as_deref(),
        o.description_signature.as_deref(),
        o.project_description.as_deref(),
    )
}

#[test]
fn fresh_install_registers_and_starts_service() {
    let sandbox = Sandbox::new("hangar-fresh-install");
    let target = target("app1");
    stage_archive(&sandbox, &target, "1.4.2.0");

    let host = FakeHost::default();
    let installer = sandbox.installer(host.clone());
    let settings = SettingsPayload::new("appsettings.json", settings_json("1"));

    let version = installer
        .run_update_service(&target, &service_options(), ARCHIVE, Some(&settings))
        .expect("fresh install");
    assert_eq!(version, "1.4.2.0");

    // 服务原本不存在：不应有 stop/remove
    assert_eq!(host.calls(), vec!["register", "start"]);

    let install_path = installer.layout().versioned_install_path(&target.identity);
    assert!(install_path.join(target.identity.main_binary_file_name()).is_file());
    assert!(install_path.join("wwwroot").join("index.html").is_file());
    assert_eq!(
        std::fs::read_to_string(install_path.join("appsettings.json")).unwrap(),
        settings_json("1")
    );
    assert!(!sandbox.work().join(ARCHIVE).exists(), "archive should be removed");
    assert!(
        !sandbox.work().join(ARCHIVE.trim_end_matches(".zip")).exists(),
        "extraction folder should be moved away"
    );
    assert_eq!(host.owned(), vec![install_path.clone()]);

    let registration = host.registration().expect("registered");
    assert_eq!(registration.service_env_name, "app1staging");
    assert_eq!(registration.working_directory, install_path);
    assert_eq!(registration.description, "[hangar] App One");
}

#[test]
fn update_of_own_program_is_refused_without_side_effects() {
    let sandbox = Sandbox::new("hangar-self-guard");
    let target = target(common::OWN_PROGRAM_NAME);
    stage_archive(&sandbox, &target, "9.9.9.9");

    let host = FakeHost::default();
    let installer = sandbox.installer(host.clone());
    let settings = SettingsPayload::new("appsettings.json", settings_json("1"));

    let chains = [
        installer.run_update_application(&target, ARCHIVE).unwrap_err(),
        installer
            .run_update_service(&target, &service_options(), ARCHIVE, None)
            .unwrap_err(),
        installer.run_update_settings(&target, true, &settings).unwrap_err(),
    ];
    for chain in chains {
        assert!(matches!(chain.outermost(), DeployError::CannotUpdateSelf(_)), "{chain}");
        assert!(chain.has_kind(ErrorKind::Precondition));
    }

    assert!(host.calls().is_empty());
    assert!(sandbox.work().join(ARCHIVE).is_file(), "archive must stay untouched");
    assert!(!sandbox.install_root().exists());
}

#[test]
fn mismatched_registration_is_removed_and_recreated() {
    let sandbox = Sandbox::new("hangar-mismatch");
    let target = target("app1");
    stage_archive(&sandbox, &target, "2.0.0.0");

    let mut stale = expected_descriptor(&sandbox, &target);
    stale.description = "old description".to_string();
    stale.binary_path = Path::new("/somewhere/else/app1.dll").to_path_buf();
    let host = FakeHost::with_running_service(stale.clone());

    let installer = sandbox.installer(host.clone());
    assert!(!host.is_registered_properly(&expected_descriptor(&sandbox, &target)).unwrap());

    let version = installer
        .run_update_service(&target, &service_options(), ARCHIVE, None)
        .expect("update with stale registration");
    assert_eq!(version, "2.0.0.0");
    assert_eq!(host.calls(), vec!["stop", "remove", "register", "start"]);
    assert!(host.is_registered_properly(&expected_descriptor(&sandbox, &target)).unwrap());
}

#[test]
fn correct_registration_is_kept() {
    let sandbox = Sandbox::new("hangar-keep-registration");
    let target = target("app1");
    stage_archive(&sandbox, &target, "2.0.0.1");

    let host = FakeHost::with_running_service(expected_descriptor(&sandbox, &target));
    let installer = sandbox.installer(host.clone());

    installer
        .run_update_service(&target, &service_options(), ARCHIVE, None)
        .expect("update");
    assert_eq!(host.calls(), vec!["stop", "start"]);
}

#[test]
fn update_replaces_previous_deployment() {
    let sandbox = Sandbox::new("hangar-replace");
    let target = target("app1");
    let installer = sandbox.installer(FakeHost::default());
    let install_path = installer.layout().versioned_install_path(&target.identity);
    write_file(&install_path.join("obsolete.txt"), "old");

    stage_archive(&sandbox, &target, "3.1.0.0");
    let version = installer.run_update_application(&target, ARCHIVE).expect("update");

    assert_eq!(version, "3.1.0.0");
    assert!(!install_path.join("obsolete.txt").exists());
    assert!(install_path.join(target.identity.main_binary_file_name()).is_file());
}

/// 在线部署目录被同名普通文件占据时，目录删除每次都失败，直到用完重试次数。
#[cfg(unix)]
#[test]
fn undeletable_install_path_exhausts_delete_retries() {
    let sandbox = Sandbox::new("hangar-undeletable");
    let target = target("app1");
    let progress = RecordingProgress::default();
    let installer = sandbox
        .installer(FakeHost::default())
        .with_progress(progress.clone());
    let install_path = installer.layout().versioned_install_path(&target.identity);
    write_file(&install_path, "not a directory");

    stage_archive(&sandbox, &target, "3.2.0.0");
    let chain = installer.run_update_application(&target, ARCHIVE).unwrap_err();

    assert_eq!(chain.errors().len(), 2, "{chain}");
    assert!(matches!(chain.errors()[0], DeployError::Io { .. }), "{chain}");
    match chain.outermost() {
        DeployError::DeleteFailed { path, attempts } => {
            assert_eq!(path, &install_path);
            assert_eq!(*attempts, 2, "sandbox retry policy allows two attempts");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(chain.has_kind(ErrorKind::Os));
    assert!(install_path.is_file(), "blocking file must be left in place");
    assert_eq!(progress.errors.lock().unwrap().len(), 1);
}

#[test]
fn live_process_aborts_before_touching_install_path() {
    let sandbox = Sandbox::new("hangar-live-process");
    let target = target("app1");
    stage_archive(&sandbox, &target, "4.0.0.0");

    let host = FakeHost::default();
    host.update(|s| s.process_running = true);
    let progress = RecordingProgress::default();
    let installer = sandbox.installer(host.clone()).with_progress(progress.clone());
    let install_path = installer.layout().versioned_install_path(&target.identity);
    write_file(&install_path.join("live.txt"), "in use");

    let chain = installer
        .run_update_service(&target, &service_options(), ARCHIVE, None)
        .unwrap_err();
    assert!(matches!(chain.outermost(), DeployError::ProcessStillRunning(_)), "{chain}");
    assert!(install_path.join("live.txt").is_file());
    assert!(host.calls().is_empty());
    assert_eq!(progress.errors.lock().unwrap().len(), 1);
}

#[test]
fn process_surviving_stop_is_fatal() {
    let sandbox = Sandbox::new("hangar-survivor");
    let target = target("app1");
    stage_archive(&sandbox, &target, "4.0.0.1");

    let host = FakeHost::with_running_service(expected_descriptor(&sandbox, &target));
    host.update(|s| s.stop_leaves_process = true);
    let installer = sandbox.installer(host.clone());

    let chain = installer
        .run_update_service(&target, &service_options(), ARCHIVE, None)
        .unwrap_err();
    assert!(matches!(chain.outermost(), DeployError::ProcessStillRunning(_)));
    assert_eq!(host.calls(), vec!["stop"]);
}

#[test]
fn stop_failure_is_fatal() {
    let sandbox = Sandbox::new("hangar-stop-fails");
    let target = target("app1");
    stage_archive(&sandbox, &target, "4.0.0.2");

    let host = FakeHost::with_running_service(expected_descriptor(&sandbox, &target));
    host.update(|s| s.stop_fails = true);
    let installer = sandbox.installer(host.clone());

    let chain = installer
        .run_update_service(&target, &service_options(), ARCHIVE, None)
        .unwrap_err();
    assert!(matches!(chain.outermost(), DeployError::ServiceStopFailed(_)));
    assert!(matches!(chain.errors()[0], DeployError::Platform(_)));
    assert!(!installer.layout().versioned_install_path(&target.identity).exists());
}

#[test]
fn start_failure_wraps_platform_error() {
    let sandbox = Sandbox::new("hangar-start-fails");
    let target = target("app1");
    stage_archive(&sandbox, &target, "5.0.0.0");

    let host = FakeHost::default();
    host.update(|s| s.start_fails = true);
    let installer = sandbox.installer(host.clone());

    let chain = installer
        .run_update_service(&target, &service_options(), ARCHIVE, None)
        .unwrap_err();
    assert_eq!(chain.errors().len(), 2);
    assert!(matches!(chain.errors()[0], DeployError::Platform(_)));
    assert!(matches!(chain.outermost(), DeployError::ServiceStartFailed(_)));
    assert!(chain.has_kind(ErrorKind::Safety));
}

#[test]
fn missing_archive_is_a_precondition_error() {
    let sandbox = Sandbox::new("hangar-no-archive");
    let installer = sandbox.installer(FakeHost::default());

    let chain = installer
        .run_update_application(&target("app1"), ARCHIVE)
        .unwrap_err();
    assert!(matches!(chain.outermost(), DeployError::ArtifactNotFound { .. }));
}

#[test]
fn archive_without_version_is_an_integrity_error() {
    let sandbox = Sandbox::new("hangar-no-version");
    let target = target("app1");
    write_program_archive(&sandbox.work(), ARCHIVE, "unrelated.dll", "1.0.0.0", &[]);
    let installer = sandbox.installer(FakeHost::default());

    let chain = installer.run_update_application(&target, ARCHIVE).unwrap_err();
    assert!(matches!(chain.outermost(), DeployError::VersionUnavailable(_)));
    assert!(chain.has_kind(ErrorKind::Integrity));
}

#[test]
fn cancelled_run_stops_before_extraction() {
    let sandbox = Sandbox::new("hangar-cancel");
    let target = target("app1");
    stage_archive(&sandbox, &target, "6.0.0.0");

    let cancel = CancellationFlag::new();
    cancel.cancel();
    let host = FakeHost::default();
    let installer = sandbox.installer(host.clone()).with_cancellation(cancel);

    let chain = installer
        .run_update_service(&target, &service_options(), ARCHIVE, None)
        .unwrap_err();
    assert!(chain.has_kind(ErrorKind::Cancelled));
    assert!(host.calls().is_empty());
    assert!(sandbox.work().join(ARCHIVE).is_file());
}

fn install_settings(sandbox: &Sandbox, target: &DeploymentTarget, content: &str) {
    let installer = sandbox.installer(FakeHost::default());
    let install_path = installer.layout().versioned_install_path(&target.identity);
    write_file(&install_path.join("appsettings.json"), content);
}

#[test]
fn settings_update_is_idempotent() {
    let sandbox = Sandbox::new("hangar-settings-idempotent");
    let target = target("app1");
    install_settings(&sandbox, &target, &settings_json("1"));

    let host = FakeHost::with_running_service(expected_descriptor(&sandbox, &target));
    let installer = sandbox.installer(host.clone());
    let payload = SettingsPayload::new("appsettings.json", settings_json("2"));

    let first = installer.run_update_settings(&target, true, &payload).expect("first");
    assert_eq!(first, SettingsUpdateOutcome::Updated);
    assert_eq!(host.calls(), vec!["stop", "start"]);

    let second = installer.run_update_settings(&target, true, &payload).expect("second");
    assert_eq!(
        second,
        SettingsUpdateOutcome::AlreadyCurrent {
            version: "2".to_string()
        }
    );
    assert_eq!(host.calls(), vec!["stop", "start"], "second call must not touch the service");

    let settings_path = installer
        .layout()
        .versioned_install_path(&target.identity)
        .join("appsettings.json");
    assert_eq!(std::fs::read_to_string(&settings_path).unwrap(), settings_json("2"));
    assert_eq!(host.owned(), vec![settings_path]);
}

#[test]
fn settings_without_version_token_are_always_written() {
    let sandbox = Sandbox::new("hangar-settings-untagged");
    let target = target("app1");
    install_settings(&sandbox, &target, "{}");

    let host = FakeHost::default();
    let installer = sandbox.installer(host.clone());
    let payload = SettingsPayload::new("appsettings.json", r#"{ "Feature": true }"#);

    for _ in 0..2 {
        let outcome = installer.run_update_settings(&target, false, &payload).expect("update");
        assert_eq!(outcome, SettingsUpdateOutcome::Updated);
    }
    assert!(host.calls().is_empty(), "non-service update never touches the service");
}

#[test]
fn settings_update_requires_registered_service() {
    let sandbox = Sandbox::new("hangar-settings-unregistered");
    let target = target("app1");
    install_settings(&sandbox, &target, &settings_json("1"));

    let installer = sandbox.installer(FakeHost::default());
    let payload = SettingsPayload::new("appsettings.json", settings_json("2"));

    let chain = installer.run_update_settings(&target, true, &payload).unwrap_err();
    assert!(matches!(chain.outermost(), DeployError::ServiceNotRegistered(_)));
}

#[test]
fn settings_update_checks_install_folders() {
    let sandbox = Sandbox::new("hangar-settings-folders");
    let target = target("app1");
    let installer = sandbox.installer(FakeHost::default());
    let payload = SettingsPayload::new("appsettings.json", settings_json("2"));

    let chain = installer.run_update_settings(&target, false, &payload).unwrap_err();
    assert!(matches!(chain.outermost(), DeployError::InstallRootMissing(_)));

    std::fs::create_dir_all(sandbox.install_root()).unwrap();
    let chain = installer.run_update_settings(&target, false, &payload).unwrap_err();
    assert!(matches!(chain.outermost(), DeployError::ProjectFolderMissing(_)));
}

#[test]
fn settings_written_but_service_down_is_distinct() {
    let sandbox = Sandbox::new("hangar-settings-down");
    let target = target("app1");
    install_settings(&sandbox, &target, &settings_json("1"));

    let host = FakeHost::with_running_service(expected_descriptor(&sandbox, &target));
    host.update(|s| s.start_fails = true);
    let installer = sandbox.installer(host.clone());
    let payload = SettingsPayload::new("appsettings.json", settings_json("2"));

    let chain = installer.run_update_settings(&target, true, &payload).unwrap_err();
    assert!(matches!(chain.outermost(), DeployError::SettingsAppliedServiceDown(_)), "{chain}");

    let written = installer
        .layout()
        .versioned_install_path(&target.identity)
        .join("appsettings.json");
    assert_eq!(std::fs::read_to_string(written).unwrap(), settings_json("2"));
}

#[test]
fn remove_when_absent_is_success() {
    let sandbox = Sandbox::new("hangar-remove-absent");
    let host = FakeHost::default();
    let installer = sandbox.installer(host.clone());

    installer
        .remove_project_and_service(&ServiceIdentity::new("ghost", "prod"), true)
        .expect("remove absent service");
    installer
        .remove_project_and_service(&ServiceIdentity::new("ghost", "prod"), false)
        .expect("remove absent folder");
    assert!(host.calls().is_empty());
}

#[test]
fn remove_stops_unregisters_and_deletes() {
    let sandbox = Sandbox::new("hangar-remove");
    let target = target("app1");
    let host = FakeHost::with_running_service(expected_descriptor(&sandbox, &target));
    let installer = sandbox.installer(host.clone());

    let install_path = installer.layout().versioned_install_path(&target.identity);
    write_file(&install_path.join("app1.dll"), "bin");

    installer
        .remove_project_and_service(&target.identity, true)
        .expect("remove");
    assert_eq!(host.calls(), vec!["stop", "remove"]);
    assert!(host.registration().is_none());
    assert!(!install_path.exists());
    assert!(!installer.layout().project_install_path(&target.identity).exists());
}

#[test]
fn remove_keeps_sibling_environments() {
    let sandbox = Sandbox::new("hangar-remove-sibling");
    let installer = sandbox.installer(FakeHost::default());
    let staging = ServiceIdentity::new("app1", "staging");
    let prod = ServiceIdentity::new("app1", "prod");
    write_file(&installer.layout().versioned_install_path(&staging).join("a.txt"), "a");
    write_file(&installer.layout().versioned_install_path(&prod).join("b.txt"), "b");

    installer.remove_project_and_service(&staging, false).expect("remove");
    assert!(!installer.layout().versioned_install_path(&staging).exists());
    assert!(installer.layout().versioned_install_path(&prod).join("b.txt").is_file());
}

#[test]
fn start_and_stop_delegate_to_registrar() {
    let sandbox = Sandbox::new("hangar-start-stop");
    let target = target("app1");
    let host = FakeHost::with_running_service(expected_descriptor(&sandbox, &target));
    let installer = sandbox.installer(host.clone());

    installer.stop_service(&target.identity).expect("stop");
    installer.start_service(&target.identity).expect("start");
    assert_eq!(host.calls(), vec!["stop", "start"]);

    host.update(|s| s.stop_fails = true);
    let chain = installer.stop_service(&target.identity).unwrap_err();
    assert!(matches!(chain.outermost(), DeployError::ServiceStopFailed(_)));
}
