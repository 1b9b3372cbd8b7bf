// src/phase.rs

//! Recipe phase execution.
//!
//! Each phase runs in the source directory under the toolchain environment
//! contract, with stdout and stderr appended to the per-build log. The
//! `prepare` and `check` phases are soft (a non-zero exit is logged and
//! ignored); `build` and `package` are hard and abort the pipeline.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use chrono::Local;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// The four pipeline phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    Prepare,
    Build,
    Check,
    Package,
}

impl PhaseKind {
    pub const ALL: [PhaseKind; 4] = [Self::Prepare, Self::Build, Self::Check, Self::Package];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Prepare => "prepare",
            Self::Build => "build",
            Self::Check => "check",
            Self::Package => "package",
        }
    }

    /// Hard phases abort the pipeline on a non-zero exit.
    pub fn is_hard(&self) -> bool {
        matches!(self, Self::Build | Self::Package)
    }
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// What a phase executes: a recipe-supplied shell action or the built-in
/// default for that phase.
#[derive(Debug, Clone)]
pub enum PhaseAction {
    Default,
    Script(String),
}

/// Everything a phase needs to run.
pub struct PhaseContext<'a> {
    pub source_dir: &'a Path,
    pub stage_dir: &'a Path,
    pub prefix: &'a str,
    pub jobs: u32,
    /// The exported environment contract (CC, CXX, AR, RANLIB, CFLAGS,
    /// LDFLAGS, JOBS, PREFIX, STAGEDIR).
    pub env: &'a [(String, String)],
    pub log: &'a mut BuildLog,
}

/// Run one phase to completion.
pub fn run(kind: PhaseKind, action: &PhaseAction, ctx: &mut PhaseContext) -> Result<()> {
    info!("running {} phase", kind);
    ctx.log.section(kind.name())?;

    let code = match action {
        PhaseAction::Script(script) => {
            debug!("{} action: {}", kind, script);
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(script);
            exec(ctx, cmd)?
        }
        PhaseAction::Default => run_default(kind, ctx)?,
    };

    if code != 0 {
        if kind.is_hard() {
            return Err(Error::Phase {
                phase: kind.name(),
                code,
            });
        }
        warn!("{} phase exited {}, continuing", kind, code);
        ctx.log.line(&format!("({} exited {}, ignored)", kind, code))?;
    }
    Ok(())
}

fn run_default(kind: PhaseKind, ctx: &mut PhaseContext) -> Result<i32> {
    match kind {
        PhaseKind::Prepare => Ok(0),
        PhaseKind::Build => {
            let configure = ctx.source_dir.join("configure");
            if is_executable(&configure) {
                let mut cmd = Command::new(&configure);
                cmd.arg(format!("--prefix={}", ctx.prefix));
                let code = exec(ctx, cmd)?;
                if code != 0 {
                    return Ok(code);
                }
            }
            let mut cmd = Command::new("make");
            cmd.arg(format!("-j{}", ctx.jobs));
            exec(ctx, cmd)
        }
        PhaseKind::Check => {
            let mut cmd = Command::new("make");
            cmd.args(["-k", "check"]);
            exec(ctx, cmd)
        }
        PhaseKind::Package => {
            let mut cmd = Command::new("make");
            cmd.arg(format!("DESTDIR={}", ctx.stage_dir.display()));
            cmd.arg("install");
            exec(ctx, cmd)
        }
    }
}

/// Spawn a command in the source directory with the phase environment,
/// streaming output into the build log.
fn exec(ctx: &mut PhaseContext, mut cmd: Command) -> Result<i32> {
    let status = cmd
        .current_dir(ctx.source_dir)
        .envs(ctx.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(ctx.log.stdio()?)
        .stderr(ctx.log.stdio()?)
        .status()?;
    Ok(status.code().unwrap_or(-1))
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Append-only log file for one build, timestamped per invocation.
pub struct BuildLog {
    path: PathBuf,
    file: File,
}

impl BuildLog {
    /// Open `<logs>/<name>-run-<timestamp>.log` for appending.
    pub fn create(logs_dir: &Path, name: &str) -> Result<Self> {
        std::fs::create_dir_all(logs_dir)?;
        let stamp = Local::now().format("%Y%m%d-%H%M%S");
        let path = logs_dir.join(format!("{name}-run-{stamp}.log"));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn section(&mut self, title: &str) -> Result<()> {
        writeln!(self.file, "=== {title} ===")?;
        Ok(())
    }

    pub fn line(&mut self, text: &str) -> Result<()> {
        writeln!(self.file, "{text}")?;
        Ok(())
    }

    /// A handle for a subprocess to write directly into the log.
    fn stdio(&self) -> Result<Stdio> {
        Ok(Stdio::from(self.file.try_clone()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn context<'a>(dir: &'a Path, log: &'a mut BuildLog) -> PhaseContext<'a> {
        PhaseContext {
            source_dir: dir,
            stage_dir: dir,
            prefix: "/usr",
            jobs: 1,
            env: &[],
            log,
        }
    }

    #[test]
    fn test_phase_kinds() {
        assert!(!PhaseKind::Prepare.is_hard());
        assert!(PhaseKind::Build.is_hard());
        assert!(!PhaseKind::Check.is_hard());
        assert!(PhaseKind::Package.is_hard());
        assert_eq!(PhaseKind::ALL.len(), 4);
    }

    #[test]
    fn test_soft_phase_swallows_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = BuildLog::create(&dir.path().join("logs"), "t").unwrap();
        let mut ctx = context(dir.path(), &mut log);
        run(
            PhaseKind::Check,
            &PhaseAction::Script("exit 3".into()),
            &mut ctx,
        )
        .unwrap();
    }

    #[test]
    fn test_hard_phase_propagates_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = BuildLog::create(&dir.path().join("logs"), "t").unwrap();
        let mut ctx = context(dir.path(), &mut log);
        let err = run(
            PhaseKind::Build,
            &PhaseAction::Script("exit 7".into()),
            &mut ctx,
        )
        .unwrap_err();
        match err {
            Error::Phase { phase, code } => {
                assert_eq!(phase, "build");
                assert_eq!(code, 7);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_output_lands_in_log() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = BuildLog::create(&dir.path().join("logs"), "t").unwrap();
        let log_path = log.path().to_path_buf();
        let mut ctx = context(dir.path(), &mut log);
        run(
            PhaseKind::Prepare,
            &PhaseAction::Script("echo from-the-phase; echo on-stderr >&2".into()),
            &mut ctx,
        )
        .unwrap();

        let contents = fs::read_to_string(log_path).unwrap();
        assert!(contents.contains("=== prepare ==="));
        assert!(contents.contains("from-the-phase"));
        assert!(contents.contains("on-stderr"));
    }

    #[test]
    fn test_environment_contract_reaches_phase() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = BuildLog::create(&dir.path().join("logs"), "t").unwrap();
        let out = dir.path().join("seen");
        let env = vec![("STAGEDIR".to_string(), "/stage/here".to_string())];
        let mut ctx = PhaseContext {
            source_dir: dir.path(),
            stage_dir: dir.path(),
            prefix: "/usr",
            jobs: 2,
            env: &env,
            log: &mut log,
        };
        run(
            PhaseKind::Prepare,
            &PhaseAction::Script(format!("printf %s \"$STAGEDIR\" > {}", out.display())),
            &mut ctx,
        )
        .unwrap();
        assert_eq!(fs::read_to_string(out).unwrap(), "/stage/here");
    }

    #[test]
    fn test_default_prepare_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = BuildLog::create(&dir.path().join("logs"), "t").unwrap();
        let mut ctx = context(dir.path(), &mut log);
        run(PhaseKind::Prepare, &PhaseAction::Default, &mut ctx).unwrap();
    }
}
