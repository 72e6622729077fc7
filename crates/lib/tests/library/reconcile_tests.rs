//! Probe, plan and execute cycles against the simulated host.

use clawup_lib::consts::keys;
use clawup_lib::engine::{Engine, HealthCheck};
use clawup_lib::plan::{Action, OptionalService, Plan};
use clawup_lib::probe::{Resource, ResourceState, ServiceState};
use clawup_lib::service::{ServiceRegistrar, ServiceStatus};
use clawup_lib::service::units::{agent_unit, bridge_unit, discovery_unit};

use super::common::{REPO_URL, TestHost};

fn changes(plan: &Plan) -> Vec<Action> {
  plan.changes().cloned().collect()
}

#[test]
fn empty_host_installs_then_plans_nothing() {
  let host = TestHost::new();
  let engine = Engine::new(&host.profile, &host.runner, &host.registrar);
  let desired = host.minimal_desired();

  let state = engine.probe(&desired);
  assert_eq!(state.resource(&Resource::Runtime), &ResourceState::Missing);
  assert_eq!(state.resource(&Resource::Repository), &ResourceState::Missing);
  assert_eq!(state.service("clawup-bridge"), ServiceState::Unregistered);

  let report = engine.reconcile(&desired);
  assert!(report.is_success(), "{:?}", report.execution.failed);
  assert_eq!(
    changes(&report.plan),
    vec![
      Action::InstallRuntime { major: 20 },
      Action::CloneOrUpdateRepo {
        url: REPO_URL.to_string(),
        dest: host.install_dir().to_path_buf(),
      },
      Action::InstallDependencies,
      Action::SetConfigValue {
        key: "AGENTS".to_string(),
        value: "mini:Mini,m5:M5".to_string(),
      },
      Action::RegisterService(bridge_unit(&host.profile)),
      Action::StartService("clawup-bridge".to_string()),
    ]
  );

  let after = engine.probe(&desired);
  assert!(after.is_present(&Resource::Runtime));
  assert!(after.is_present(&Resource::Repository));
  assert!(after.is_present(&Resource::Dependencies));
  assert_eq!(after.service("clawup-bridge"), ServiceState::Running { drifted: false });

  let second = engine.reconcile(&desired);
  assert!(second.plan.is_empty(), "{:?}", changes(&second.plan));
  assert!(second.execution.applied.is_empty());
}

#[test]
fn full_install_is_idempotent() {
  let host = TestHost::new();
  let engine = Engine::new(&host.profile, &host.runner, &host.registrar);
  let mut desired = host.minimal_desired();
  desired.set_value(keys::PORT, "3000");
  desired.set_value(keys::BRIDGE_PASSWORD, "s3cret");
  desired.select(OptionalService::Slack, "good-slack");
  desired.packages = vec!["avahi-utils".to_string()];
  desired.units.push(agent_unit(&host.profile));
  desired.units.push(discovery_unit(&host.profile, 3000));

  let first = engine.reconcile(&desired);
  assert!(first.is_success());
  assert!(first.plan.changes().any(|a| *a == Action::InstallPackages(vec!["avahi-utils".to_string()])));

  let commands_before = host.runner.mutating_commands().len();
  host.registrar.clear_calls();

  let second = engine.reconcile(&desired);
  assert!(second.plan.is_empty(), "{:?}", changes(&second.plan));
  assert_eq!(host.runner.mutating_commands().len(), commands_before);
  assert!(host.registrar.calls().is_empty());

  for unit in ["clawup-bridge", "clawup-agent", "clawup-discovery"] {
    assert_eq!(
      host.registrar.status(unit),
      ServiceStatus::Running
    );
  }
  assert!(engine.health_check() == HealthCheck::Passed {
    entry: host.install_dir().join("index.js")
  });
}

#[test]
fn partial_install_converges_in_one_cycle() {
  let host = TestHost::new();
  host.runner.with_node("v22.3.0");
  host.seed_checkout("AGENTS=old:Old\n");
  host
    .registrar
    .install(&bridge_unit(&host.profile), ServiceStatus::Stopped);
  let engine = Engine::new(&host.profile, &host.runner, &host.registrar);
  let desired = host.minimal_desired();

  let first = engine.reconcile(&desired);
  assert_eq!(
    changes(&first.plan),
    vec![
      Action::SetConfigValue {
        key: "AGENTS".to_string(),
        value: "mini:Mini,m5:M5".to_string(),
      },
      Action::StartService("clawup-bridge".to_string()),
    ]
  );
  assert!(first.is_success());
  assert!(engine.reconcile(&desired).plan.is_empty());
}

#[test]
fn outdated_runtime_is_reinstalled() {
  let host = TestHost::new();
  host.runner.with_node("v16.20.2");
  host.seed_checkout("AGENTS=mini:Mini,m5:M5\n");
  let engine = Engine::new(&host.profile, &host.runner, &host.registrar);
  let desired = host.minimal_desired();

  let report = engine.reconcile(&desired);

  assert_eq!(changes(&report.plan)[0], Action::InstallRuntime { major: 20 });
  assert!(engine.probe(&desired).is_present(&Resource::Runtime));
}

#[test]
fn config_updates_are_non_destructive() {
  let host = TestHost::new();
  host.runner.with_node("v20.11.1");
  host.seed_checkout("# local tweaks\nCUSTOM=keep me\n\nAGENTS=old:Old\nEXTRA=1\n");
  let engine = Engine::new(&host.profile, &host.runner, &host.registrar);
  let mut desired = host.minimal_desired();
  desired.set_value(keys::PORT, "4100");

  for _ in 0..3 {
    assert!(engine.reconcile(&desired).is_success());
  }

  assert_eq!(
    host.config_text(),
    "# local tweaks\nCUSTOM=keep me\n\nAGENTS=mini:Mini,m5:M5\nEXTRA=1\nPORT=4100\n"
  );
}

#[test]
fn fresh_config_starts_from_template() {
  let host = TestHost::new();
  let engine = Engine::new(&host.profile, &host.runner, &host.registrar);

  assert!(engine.reconcile(&host.minimal_desired()).is_success());

  assert_eq!(host.config_text(), "# CarClaw bridge\nAGENTS=mini:Mini,m5:M5\nLOG_LEVEL=info\n");
}

#[test]
fn unselected_integrations_and_units_are_untouched() {
  let host = TestHost::new();
  host.runner.with_node("v20.11.1");
  host.seed_checkout("AGENTS=mini:Mini,m5:M5\nTELEGRAM_BOT_TOKEN=123:abc\n");
  let agent = agent_unit(&host.profile);
  host.registrar.install(&bridge_unit(&host.profile), ServiceStatus::Running);
  host.registrar.install(&agent, ServiceStatus::Running);
  let engine = Engine::new(&host.profile, &host.runner, &host.registrar);

  let mut desired = host.minimal_desired();
  desired.set_value(keys::PORT, "3000");

  let report = engine.reconcile(&desired);

  assert!(report.is_success());
  assert!(
    !report
      .plan
      .actions
      .iter()
      .any(|a| a.resource() == Resource::ConfigKey(keys::TELEGRAM_BOT_TOKEN.to_string())
        || a.resource() == Resource::Service("clawup-agent".to_string()))
  );
  assert!(host.config_text().contains("TELEGRAM_BOT_TOKEN=123:abc\n"));
  assert!(!host.registrar.calls().iter().any(|c| c.ends_with("clawup-agent")));
  assert_eq!(
    host.registrar.status("clawup-agent"),
    ServiceStatus::Running
  );
}

#[test]
fn drifted_unit_is_replaced_only_on_request() {
  let host = TestHost::new();
  host.runner.with_node("v20.11.1");
  host.seed_checkout("AGENTS=mini:Mini,m5:M5\n");
  let mut stale = bridge_unit(&host.profile);
  stale.args = vec!["run".to_string(), "legacy".to_string()];
  host.registrar.install(&stale, ServiceStatus::Running);
  let engine = Engine::new(&host.profile, &host.runner, &host.registrar);
  let mut desired = host.minimal_desired();

  assert!(engine.reconcile(&desired).plan.is_empty());
  assert!(host.registrar.calls().is_empty());

  desired.recreate_services = true;
  let report = engine.reconcile(&desired);
  assert!(report.is_success());
  assert_eq!(
    host.registrar.calls(),
    vec![
      "stop clawup-bridge",
      "remove clawup-bridge",
      "create clawup-bridge",
      "start clawup-bridge"
    ]
  );
  assert!(engine.reconcile(&desired).plan.is_empty());
}

#[test]
fn hard_failure_stops_run_and_rerun_recovers() {
  let host = TestHost::new();
  host.runner.fail_on("git clone");
  let engine = Engine::new(&host.profile, &host.runner, &host.registrar);
  let desired = host.minimal_desired();

  let failed = engine.reconcile(&desired);
  let (action, _) = failed.execution.failed.as_ref().unwrap();
  assert!(matches!(action, Action::CloneOrUpdateRepo { .. }));
  assert_eq!(failed.execution.applied, vec![Action::InstallRuntime { major: 20 }]);
  assert!(host.registrar.calls().is_empty());

  host.runner.heal();
  let retry = engine.reconcile(&desired);
  assert!(retry.is_success());
  assert!(!retry.plan.changes().any(|a| matches!(a, Action::InstallRuntime { .. })));
  assert!(engine.reconcile(&desired).plan.is_empty());
}

#[test]
fn package_failure_is_only_a_warning() {
  let host = TestHost::new();
  host.runner.fail_on("avahi-utils");
  let engine = Engine::new(&host.profile, &host.runner, &host.registrar);
  let mut desired = host.minimal_desired();
  desired.packages = vec!["avahi-utils".to_string()];

  let report = engine.reconcile(&desired);

  assert!(report.is_success());
  assert_eq!(report.execution.warnings.len(), 1);
  assert_eq!(
    host.registrar.status("clawup-bridge"),
    ServiceStatus::Running
  );

  host.runner.heal();
  let retry = engine.reconcile(&desired);
  assert_eq!(
    changes(&retry.plan),
    vec![Action::InstallPackages(vec!["avahi-utils".to_string()])]
  );
}
