//! Platform command implementations of [`ActionHandler`]

use super::{ActionError, ActionHandler};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// A program invocation, kept as data so the platform table is testable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: &'static str,
    pub args: &'static [&'static str],
}

#[cfg(target_os = "linux")]
const SUSPEND: Option<Invocation> = Some(Invocation {
    program: "systemctl",
    args: &["suspend"],
});

#[cfg(target_os = "linux")]
const DISPLAY_OFF: Option<Invocation> = Some(Invocation {
    program: "xset",
    args: &["dpms", "force", "off"],
});

#[cfg(target_os = "macos")]
const SUSPEND: Option<Invocation> = Some(Invocation {
    program: "pmset",
    args: &["sleepnow"],
});

#[cfg(target_os = "macos")]
const DISPLAY_OFF: Option<Invocation> = Some(Invocation {
    program: "pmset",
    args: &["displaysleepnow"],
});

#[cfg(windows)]
const SUSPEND: Option<Invocation> = Some(Invocation {
    program: "rundll32.exe",
    args: &["powrprof.dll,SetSuspendState", "0,1,0"],
});

#[cfg(windows)]
const DISPLAY_OFF: Option<Invocation> = Some(Invocation {
    program: "powershell.exe",
    args: &[
        "-NoProfile",
        "-Command",
        "(Add-Type '[DllImport(\"user32.dll\")] public static extern int SendMessage(int hWnd, int hMsg, int wParam, int lParam);' -Name a -PassThru)::SendMessage(-1, 0x0112, 0xF170, 2)",
    ],
});

#[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
const SUSPEND: Option<Invocation> = None;

#[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
const DISPLAY_OFF: Option<Invocation> = None;

/// Executes actions through the platform's power-management tools
#[derive(Debug, Clone)]
pub struct SystemActions {
    suspend: Option<Invocation>,
    display_off: Option<Invocation>,
}

impl Default for SystemActions {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemActions {
    pub fn new() -> Self {
        Self {
            suspend: SUSPEND,
            display_off: DISPLAY_OFF,
        }
    }

    /// Override the invocations, mostly useful for tests
    pub fn with_invocations(suspend: Option<Invocation>, display_off: Option<Invocation>) -> Self {
        Self {
            suspend,
            display_off,
        }
    }

    async fn run(invocation: &Invocation) -> Result<(), ActionError> {
        debug!(program = invocation.program, args = ?invocation.args, "Running action");

        let output = Command::new(invocation.program)
            .args(invocation.args)
            .output()
            .await
            .map_err(|source| ActionError::Spawn {
                program: invocation.program.to_string(),
                source,
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(ActionError::NonZeroExit {
                program: invocation.program.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl ActionHandler for SystemActions {
    async fn suspend_machine(&self) -> Result<(), ActionError> {
        match &self.suspend {
            Some(invocation) => Self::run(invocation).await,
            None => Err(ActionError::Unsupported("suspend")),
        }
    }

    async fn turn_off_display(&self) -> Result<(), ActionError> {
        match &self.display_off {
            Some(invocation) => Self::run(invocation).await,
            None => Err(ActionError::Unsupported("display off")),
        }
    }
}
