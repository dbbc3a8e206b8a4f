//! Process-backed implementations of the doctor ports.

use serde_json::{json, Value};
use std::io;
use std::path::Path;
use std::process::{Command, Output};
use town_doctor::{
    AgentRole, IssueRecord, IssueStore, IssueUpdate, ListFilter, PortError, SessionManager,
    TemplateRenderer, VcsInspector,
};

fn spawn(tool: &str, cmd: &mut Command) -> Result<Output, PortError> {
    cmd.output().map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => PortError::NotFound(tool.to_string()),
        _ => PortError::IoError(err),
    })
}

fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

/// The `bd` issue tracker, run inside the work directory whose store it should use.
pub struct BdCliStore {
    binary: String,
}

impl BdCliStore {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn run(&self, work_dir: &Path, args: &[String]) -> Result<Vec<u8>, PortError> {
        log::debug!("{} {} (in {})", self.binary, args.join(" "), work_dir.display());
        let output = spawn(
            &self.binary,
            Command::new(&self.binary).args(args).current_dir(work_dir),
        )?;
        if !output.status.success() {
            return Err(PortError::Command {
                tool: self.binary.clone(),
                message: stderr_text(&output),
            });
        }
        Ok(output.stdout)
    }

    fn parse<T: serde::de::DeserializeOwned>(&self, raw: &[u8]) -> Result<T, PortError> {
        serde_json::from_slice(raw).map_err(|err| PortError::Parse {
            tool: self.binary.clone(),
            message: err.to_string(),
        })
    }
}

impl IssueStore for BdCliStore {
    fn list(&self, work_dir: &Path, filter: &ListFilter) -> Result<Vec<IssueRecord>, PortError> {
        let mut args = vec!["list".to_string(), "--json".to_string()];
        if let Some(status) = filter.status {
            args.push(format!("--status={status}"));
        }
        if let Some(label) = &filter.label {
            args.push(format!("--label={label}"));
        }
        let stdout = self.run(work_dir, &args)?;
        if stdout.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        let records: Option<Vec<IssueRecord>> = self.parse(&stdout)?;
        Ok(records.unwrap_or_default())
    }

    fn show(&self, work_dir: &Path, id: &str) -> Result<IssueRecord, PortError> {
        let args = ["show".to_string(), id.to_string(), "--json".to_string()];
        let stdout = match self.run(work_dir, &args) {
            Ok(stdout) => stdout,
            Err(PortError::Command { message, .. }) if message.contains("not found") => {
                return Err(PortError::NotFound(id.to_string()));
            }
            Err(err) => return Err(err),
        };
        // `bd show --json` prints an array even for one id.
        let value: Value = self.parse(&stdout)?;
        let record = match value {
            Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
            Value::Array(_) | Value::Null => return Err(PortError::NotFound(id.to_string())),
            other => other,
        };
        serde_json::from_value(record).map_err(|err| PortError::Parse {
            tool: self.binary.clone(),
            message: err.to_string(),
        })
    }

    fn update(&self, work_dir: &Path, id: &str, update: &IssueUpdate) -> Result<(), PortError> {
        let mut args = vec!["update".to_string(), id.to_string()];
        if let Some(description) = &update.description {
            args.push(format!("--description={description}"));
        }
        if let Some(status) = update.status {
            args.push(format!("--status={status}"));
        }
        self.run(work_dir, &args).map(|_| ())
    }

    fn close(&self, work_dir: &Path, ids: &[String], reason: &str) -> Result<(), PortError> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut args = vec!["close".to_string()];
        args.extend(ids.iter().cloned());
        args.push(format!("--reason={reason}"));
        self.run(work_dir, &args).map(|_| ())
    }
}

/// Agent sessions hosted by tmux.
pub struct TmuxSessions {
    binary: String,
}

impl TmuxSessions {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn target(name: &str) -> String {
        format!("={name}")
    }

    fn pane_pids(&self, name: &str) -> Result<Vec<u32>, PortError> {
        let output = spawn(
            &self.binary,
            Command::new(&self.binary).args([
                "list-panes",
                "-s",
                "-t",
                Self::target(name).as_str(),
                "-F",
                "#{pane_pid}",
            ]),
        )?;
        if !output.status.success() {
            return Ok(Vec::new());
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(|line| line.trim().parse().ok())
            .collect())
    }
}

impl SessionManager for TmuxSessions {
    fn has_session(&self, name: &str) -> Result<bool, PortError> {
        let result = spawn(
            &self.binary,
            Command::new(&self.binary).args(["has-session", "-t", Self::target(name).as_str()]),
        );
        match result {
            Ok(output) => Ok(output.status.success()),
            Err(PortError::NotFound(_)) => {
                log::debug!("{} not installed; no sessions", self.binary);
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Terminate pane processes and their children before removing the
    /// session, so agents do not linger detached.
    fn kill_session_with_processes(&self, name: &str) -> Result<(), PortError> {
        for pid in self.pane_pids(name)? {
            let pid = pid.to_string();
            if let Err(err) = Command::new("pkill").args(["-TERM", "-P", &pid]).status() {
                log::debug!("pkill for {pid} failed: {err}");
            }
            if let Err(err) = Command::new("kill").args(["-TERM", &pid]).status() {
                log::debug!("kill {pid} failed: {err}");
            }
        }
        let output = spawn(
            &self.binary,
            Command::new(&self.binary).args(["kill-session", "-t", Self::target(name).as_str()]),
        )?;
        if !output.status.success() {
            return Err(PortError::Command {
                tool: self.binary.clone(),
                message: stderr_text(&output),
            });
        }
        log::info!("Killed session {name}");
        Ok(())
    }
}

/// Git status of single files, asked from the file's own directory.
pub struct GitCli {
    binary: String,
}

impl GitCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn run_in(&self, file: &Path, args: &[&str]) -> Result<Option<i32>, PortError> {
        let dir = file.parent().unwrap_or_else(|| Path::new("."));
        let name = file.file_name().map(Path::new).unwrap_or(file);
        let output = spawn(
            &self.binary,
            Command::new(&self.binary)
                .arg("-C")
                .arg(dir)
                .args(args)
                .arg("--")
                .arg(name),
        )?;
        Ok(output.status.code())
    }
}

impl VcsInspector for GitCli {
    fn is_tracked(&self, file: &Path) -> Result<bool, PortError> {
        match self.run_in(file, &["ls-files", "--error-unmatch"])? {
            Some(0) => Ok(true),
            // 1: not tracked, 128: not inside a repository.
            Some(1) | Some(128) => Ok(false),
            code => Err(PortError::Command {
                tool: self.binary.clone(),
                message: format!("ls-files exited with {code:?}"),
            }),
        }
    }

    fn has_local_modifications(&self, file: &Path) -> Result<bool, PortError> {
        for args in [&["diff", "--quiet"][..], &["diff", "--cached", "--quiet"][..]] {
            match self.run_in(file, args)? {
                Some(0) => {}
                Some(1) => return Ok(true),
                code => {
                    return Err(PortError::Command {
                        tool: self.binary.clone(),
                        message: format!("{} exited with {code:?}", args.join(" ")),
                    })
                }
            }
        }
        Ok(false)
    }
}

/// Settings content generated in-process.
#[derive(Debug, Default)]
pub struct BuiltinTemplates;

const PATH_EXPORT: &str = "export PATH=\"$HOME/go/bin:$HOME/.local/bin:$PATH\"";

fn command_hook(command: String) -> Value {
    json!([{ "matcher": "", "hooks": [{ "type": "command", "command": command }] }])
}

impl TemplateRenderer for BuiltinTemplates {
    fn render_settings(&self, role: AgentRole) -> Result<String, PortError> {
        let mut startup = format!("{PATH_EXPORT} && gt prime");
        if role.is_patrol() {
            startup.push_str(" && gt mail check --inject");
        }
        startup.push_str(" && gt nudge deacon session-started");

        let settings = json!({
            "enabledPlugins": {},
            "hooks": {
                "SessionStart": command_hook(startup),
                "PreCompact": command_hook(format!("{PATH_EXPORT} && gt prime")),
                "UserPromptSubmit": command_hook(format!("{PATH_EXPORT} && gt mail check --inject")),
                "Stop": command_hook(format!("{PATH_EXPORT} && gt costs record")),
            }
        });
        let mut out = serde_json::to_string_pretty(&settings).map_err(|err| PortError::Parse {
            tool: "templates".to_string(),
            message: err.to_string(),
        })?;
        out.push('\n');
        Ok(out)
    }

    fn render_mayor_instructions(&self, town_root: &Path) -> Result<String, PortError> {
        let town = town_root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "town".to_string());
        Ok(format!(
            "# Mayor\n\n\
             You are the Mayor of the `{town}` town: the coordinator for every rig.\n\n\
             Run `gt prime` at session start to load your context and `gt mail inbox` \
             to see pending work.\n"
        ))
    }
}
