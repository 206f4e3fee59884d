use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

// Each test binary only uses some of these helpers.
#[allow(dead_code)]
pub struct TestContext {
    pub temp_dir: TempDir,
    pub config_path: PathBuf,
    pub bin_path: PathBuf,
}

#[allow(dead_code)]
impl TestContext {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("config.json");
        let bin_path = PathBuf::from(env!("CARGO_BIN_EXE_qtdl"));

        Self {
            temp_dir,
            config_path,
            bin_path,
        }
    }

    /// A command isolated from the user's settings, run inside the temp dir
    /// so staged archives land there.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::new(&self.bin_path);
        cmd.current_dir(self.temp_dir.path());
        cmd.env("QTDL_CONFIG", &self.config_path);
        cmd.env_remove("RUST_LOG");
        cmd
    }

    /// Same as `cmd`, but pointed at a mock repository.
    pub fn cmd_against(&self, server_url: &str) -> Command {
        let mut cmd = self.cmd();
        cmd.env("QTDL_BASE_URL", format!("{}/online/qtsdkrepository/", server_url));
        cmd.env("QTDL_VERSION_INDEX_URL", format!("{}/official_releases/qt/", server_url));
        cmd
    }
}

#[allow(dead_code)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: std::process::ExitStatus,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            status: output.status,
        }
    }
}

#[allow(dead_code)]
impl CommandOutput {
    pub fn assert_success(&self) -> &Self {
        if !self.status.success() {
            panic!(
                "Command failed with status {:?}\nstdout: {}\nstderr: {}",
                self.status.code(),
                self.stdout,
                self.stderr
            );
        }
        self
    }

    pub fn assert_exit_code(&self, code: i32) -> &Self {
        assert_eq!(
            self.status.code(),
            Some(code),
            "Unexpected exit status\nstdout: {}\nstderr: {}",
            self.stdout,
            self.stderr
        );
        self
    }

    pub fn assert_stdout_contains(&self, text: &str) -> &Self {
        assert!(
            self.stdout.contains(text),
            "Stdout did not contain '{}'\nActual stdout: {}",
            text,
            self.stdout
        );
        self
    }

    pub fn assert_stderr_contains(&self, text: &str) -> &Self {
        assert!(
            self.stderr.contains(text),
            "Stderr did not contain '{}'\nActual stderr: {}",
            text,
            self.stderr
        );
        self
    }
}

/// Directory index in the layout download.qt.io serves.
#[allow(dead_code)]
pub fn index_page(children: &[&str]) -> String {
    let mut html = String::from(
        "<html><body><table>\n\
         <tr><th valign=\"top\">&nbsp;</th><th><a href=\"?C=N;O=D\">Name</a></th><th>Last modified</th></tr>\n\
         <tr><th colspan=\"5\"><hr></th></tr>\n\
         <tr><td valign=\"top\">&nbsp;</td><td><a href=\"/online/\">Parent Directory</a></td><td>&nbsp;</td></tr>\n",
    );
    for child in children {
        html.push_str(&format!(
            "<tr><td valign=\"top\">&nbsp;</td><td><a href=\"{0}\">{0}</a></td><td align=\"right\">2021-01-01 00:00</td></tr>\n",
            child
        ));
    }
    html.push_str("</table></body></html>\n");
    html
}

/// Serve `children` as the index page at `path`.
#[allow(dead_code)]
pub fn mock_dirs(server: &mut mockito::Server, path: &str, children: &[&str]) -> mockito::Mock {
    server
        .mock("GET", path)
        .with_status(200)
        .with_body(index_page(children))
        .create()
}
