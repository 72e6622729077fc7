//! Reversing an install.

use clawup_lib::engine::Engine;
use clawup_lib::plan::Action;
use clawup_lib::service::units::{agent_unit, discovery_unit};
use clawup_lib::service::{ServiceRegistrar, ServiceStatus};

use super::common::TestHost;

#[test]
fn uninstall_stops_then_removes_every_managed_unit() {
  let host = TestHost::new();
  let engine = Engine::new(&host.profile, &host.runner, &host.registrar);
  let mut desired = host.minimal_desired();
  desired.units.push(agent_unit(&host.profile));
  assert!(engine.reconcile(&desired).is_success());
  host.registrar.install(&discovery_unit(&host.profile, 3000), ServiceStatus::Stopped);
  host.registrar.clear_calls();

  let report = engine.uninstall();

  assert!(report.is_success());
  assert_eq!(
    host.registrar.calls(),
    vec![
      "stop clawup-bridge",
      "remove clawup-bridge",
      "stop clawup-agent",
      "remove clawup-agent",
      "remove clawup-discovery",
    ]
  );
  for name in ["clawup-bridge", "clawup-agent", "clawup-discovery"] {
    assert!(!host.registrar.is_registered(name).unwrap());
  }
  assert!(host.install_dir().join(".env").is_file(), "files stay until confirmed");
}

#[test]
fn uninstall_twice_is_a_no_op() {
  let host = TestHost::new();
  let engine = Engine::new(&host.profile, &host.runner, &host.registrar);
  assert!(engine.reconcile(&host.minimal_desired()).is_success());

  assert!(engine.uninstall().is_success());
  let second = engine.uninstall();

  assert!(second.plan.is_empty());
  assert!(second.plan.actions.iter().all(Action::is_noop));
}

#[test]
fn install_dir_removal_after_uninstall() {
  let host = TestHost::new();
  let engine = Engine::new(&host.profile, &host.runner, &host.registrar);
  assert!(engine.reconcile(&host.minimal_desired()).is_success());
  assert!(engine.uninstall().is_success());

  assert!(engine.remove_install_dir().unwrap());
  assert!(!host.install_dir().exists());
  assert!(!engine.remove_install_dir().unwrap());
}
