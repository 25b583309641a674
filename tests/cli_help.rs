mod common;

#[test]
fn test_help_exits_zero_without_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let out = common::run(common::hoist(dir.path()).arg("--help"));
    assert!(out.status.success(), "{}", common::describe(&out));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("--cleanup"), "help lacks --cleanup: {stdout}");
    assert!(stdout.contains("HOIST_REPO_URL"), "help lacks env presets: {stdout}");
    assert!(common::run_logs(dir.path()).is_empty(), "--help must not create a run log");
}

#[test]
fn test_short_help_and_version() {
    let dir = tempfile::tempdir().unwrap();
    let out = common::run(common::hoist(dir.path()).arg("-h"));
    assert_eq!(out.status.code(), Some(0), "{}", common::describe(&out));

    let out = common::run(common::hoist(dir.path()).arg("--version"));
    assert_eq!(out.status.code(), Some(0), "{}", common::describe(&out));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")), "{stdout}");
    assert!(common::run_logs(dir.path()).is_empty());
}
