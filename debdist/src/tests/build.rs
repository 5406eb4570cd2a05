use super::mock::*;

use crate::build::{fake::FakeRunner, plan_steps, run_all, BuildStep};
use crate::errors::DistError;

#[test]
fn builds_every_target_in_order() {
    let (_tmp, out) = scratch();
    let cfg = build_config(&out);
    let mut runner = ScriptedRunner::default();

    let report = run_all(&cfg, &mut runner).unwrap();

    assert_eq!(
        runner.ran,
        vec![
            "clean",
            "build for armel",
            "build for armhf",
            "build for arm64",
            "build for amd64",
        ]
    );
    let built = report
        .targets
        .iter()
        .map(|t| t.friendly_name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(built, vec!["armel", "armhf", "arm64", "amd64"]);
    assert_eq!(report.tag, TAG);
    assert_eq!(report.version, "1.2.3");
    assert_eq!(report.release, "4");

    let manifest = std::fs::read_to_string(out.join("targets.txt")).unwrap();
    assert_eq!(manifest, "armel,armhf,arm64,amd64");
}

#[test]
fn fail_fast_on_second_target() {
    let (_tmp, out) = scratch();
    let cfg = build_config(&out);
    let mut runner = ScriptedRunner::failing("build for armhf", 7);

    let err = run_all(&cfg, &mut runner).unwrap_err();

    // targets 3 and 4 never ran
    assert_eq!(runner.ran, vec!["clean", "build for armel", "build for armhf"]);
    assert!(matches!(err, DistError::ToolFailed { code: 7, .. }));
    assert_eq!(err.exit_code(), 7);
    // nothing recorded for the publisher
    assert!(!out.join("targets.txt").exists());
}

#[test]
fn clean_failure_stops_everything() {
    let (_tmp, out) = scratch();
    let cfg = build_config(&out);
    let mut runner = ScriptedRunner::failing("clean", 2);

    let err = run_all(&cfg, &mut runner).unwrap_err();

    assert_eq!(runner.ran, vec!["clean"]);
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn no_clean_skips_the_clean_step() {
    let (_tmp, out) = scratch();
    let mut cfg = build_config(&out);
    cfg.clean_command = None;
    let steps = plan_steps(&cfg);
    assert_eq!(steps.len(), 4);
    assert!(steps.iter().all(|s| matches!(s, BuildStep::Target(_))));
}

#[test]
fn subset_of_targets() {
    let (_tmp, out) = scratch();
    let mut cfg = build_config(&out);
    cfg.targets = crate::targets::select_targets(&["arm64".to_owned()]).unwrap();
    let mut runner = ScriptedRunner::default();

    run_all(&cfg, &mut runner).unwrap();

    assert_eq!(runner.ran, vec!["clean", "build for arm64"]);
    let manifest = std::fs::read_to_string(out.join("targets.txt")).unwrap();
    assert_eq!(manifest, "arm64");
}

#[test]
fn steps_carry_their_own_environment() {
    let (_tmp, out) = scratch();
    let cfg = build_config(&out);
    let steps = plan_steps(&cfg);

    let BuildStep::Target(armel) = &steps[1] else {
        panic!("expected a target step after clean");
    };
    assert_eq!(armel.env.get("GOARM"), Some("6"));
    assert_eq!(armel.env.get("DEB_ARCH"), Some("armel"));
    assert_eq!(steps[1].command(), ["make", "release"]);

    let BuildStep::Target(amd64) = &steps[4] else {
        panic!("expected a target step");
    };
    assert_eq!(amd64.env.get("GOARM"), None);
    assert_eq!(
        amd64.env.get("PREFIX"),
        Some(out.join("zramd_amd64_root").as_str())
    );
}

#[test]
fn dry_run_records_nothing() {
    let (_tmp, out) = scratch();
    let mut cfg = build_config(&out);
    cfg.dry_run = true;
    let mut runner = FakeRunner::default();

    let report = run_all(&cfg, &mut runner).unwrap();

    assert_eq!(runner.seen.len(), 5);
    assert_eq!(report.targets.len(), 4);
    assert!(!out.join("targets.txt").exists());
}
