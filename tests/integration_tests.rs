mod common;

use common::{mock_dirs, CommandOutput, TestContext};

fn mock_os_listing(server: &mut mockito::Server) -> mockito::Mock {
    mock_dirs(
        server,
        "/online/qtsdkrepository/",
        &["linux_x64/", "mac_x64/", "windows_x86/", "qnx/", "all_os/"],
    )
}

#[test]
fn test_help_and_version() {
    let ctx = TestContext::new();

    let output: CommandOutput = ctx
        .cmd()
        .arg("--help")
        .output()
        .expect("Failed to run qtdl")
        .into();

    output
        .assert_success()
        .assert_stdout_contains("Discover and install Qt kits")
        .assert_stdout_contains("Usage: qtdl");

    let output: CommandOutput = ctx
        .cmd()
        .arg("--version")
        .output()
        .expect("Failed to run qtdl")
        .into();

    output.assert_success().assert_stdout_contains("qtdl");
}

#[test]
fn test_discover_operating_systems() {
    let ctx = TestContext::new();
    let mut server = mockito::Server::new();
    let listing = mock_os_listing(&mut server);

    let output: CommandOutput = ctx
        .cmd_against(&server.url())
        .output()
        .expect("Failed to run qtdl")
        .into();

    output.assert_success();
    assert_eq!(output.stdout, "linux\nmac\nwindows\n");
    listing.assert();
}

#[test]
fn test_discovery_as_json() {
    let ctx = TestContext::new();
    let mut server = mockito::Server::new();
    let _os = mock_os_listing(&mut server);
    let _targets = mock_dirs(
        &mut server,
        "/online/qtsdkrepository/linux_x64/",
        &["android/", "desktop/", "root/"],
    );

    let output: CommandOutput = ctx
        .cmd_against(&server.url())
        .args(["linux", "--format", "json"])
        .output()
        .expect("Failed to run qtdl")
        .into();

    output.assert_success();
    let value: serde_json::Value =
        serde_json::from_str(&output.stdout).expect("Output was not valid JSON");
    let linux = &value["oses"]["linux"];
    assert!(linux["desktop"].is_null());
    assert!(linux["android"].is_null());
    assert!(linux.get("root").is_none());
    assert!(value["oses"]["mac"].is_null());
}

#[test]
fn test_unknown_os_lists_alternatives() {
    let ctx = TestContext::new();
    let mut server = mockito::Server::new();
    let _os = mock_os_listing(&mut server);

    let output: CommandOutput = ctx
        .cmd_against(&server.url())
        .arg("solaris")
        .output()
        .expect("Failed to run qtdl")
        .into();

    output
        .assert_exit_code(1)
        .assert_stderr_contains("Unknown OS 'solaris'")
        .assert_stderr_contains("linux, mac, windows");
}

#[test]
fn test_malformed_version_prints_usage() {
    let ctx = TestContext::new();

    let output: CommandOutput = ctx
        .cmd()
        .args(["linux", "desktop", "5.15"])
        .output()
        .expect("Failed to run qtdl")
        .into();

    output
        .assert_exit_code(1)
        .assert_stderr_contains("Malformed version '5.15'")
        .assert_stdout_contains("Usage: qtdl");
}

#[test]
fn test_compact_version_gets_a_hint() {
    let ctx = TestContext::new();

    let output: CommandOutput = ctx
        .cmd()
        .args(["linux", "desktop", "5152", "gcc_64"])
        .output()
        .expect("Failed to run qtdl")
        .into();

    output
        .assert_exit_code(1)
        .assert_stderr_contains("did you mean '5.15.2'?");
}

#[test]
fn test_unreachable_repository_exit_code_follows_strict_setting() {
    let ctx = TestContext::new();
    let mut server = mockito::Server::new();
    let _down = server
        .mock("GET", "/online/qtsdkrepository/")
        .with_status(503)
        .create();

    let strict: CommandOutput = ctx
        .cmd_against(&server.url())
        .output()
        .expect("Failed to run qtdl")
        .into();
    strict.assert_exit_code(1).assert_stderr_contains("503");

    std::fs::write(&ctx.config_path, r#"{"strict_exit": false}"#).unwrap();
    let lenient: CommandOutput = ctx
        .cmd_against(&server.url())
        .output()
        .expect("Failed to run qtdl")
        .into();
    lenient.assert_exit_code(0).assert_stderr_contains("503");
}
