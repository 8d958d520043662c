//! systemd user timers as the Timer Backend.
//!
//! Each armed key is one `sunshift-<key>.timer` unit in the user unit
//! directory. Every timer triggers an instance of the `sunshift-fire@.service`
//! template, which runs `sunshift fire <key>`. The unit files themselves are
//! the persisted schedule state: `list_armed` reads them back, so nothing about
//! the armed set is kept anywhere else.
//!
//! Timers are enabled into `timers.target` so they come back after a reboot or
//! a new login. `arm` and `disarm` only touch unit files; [`TimerBackend::commit`]
//! reloads the user manager once and activates the new timers. A timer that
//! cannot be activated has its file removed again, so it is never listed as
//! armed.
//!
//! Two session hooks run `sunshift reconcile` at login and after resume.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::{ArmedEntry, TimerBackend};
use crate::error::{BackendError, KeyFailure};
use crate::schedule::TransitionKind;

pub const UNIT_PREFIX: &str = "sunshift-";
pub const FIRE_SERVICE_TEMPLATE: &str = "sunshift-fire@.service";
pub const LOGIN_SERVICE: &str = "sunshift-login.service";
pub const RESUME_SERVICE: &str = "sunshift-resume.service";
const SLEEP_TARGETS: &str = "suspend.target hibernate.target hybrid-sleep.target suspend-then-hibernate.target";
const TIMER_SUFFIX: &str = ".timer";
const ON_CALENDAR_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct SystemdTimerBackend {
    unit_dir: PathBuf,
    executable: PathBuf,
    /// Program run as `systemctl`; `None` manages unit files only.
    systemctl: Option<PathBuf>,
    /// Keys written by `arm` and not yet activated.
    pending: Vec<String>,
    /// Unit files were removed since the last reload.
    reload_needed: bool,
}

impl SystemdTimerBackend {
    pub fn new(unit_dir: impl Into<PathBuf>, executable: impl Into<PathBuf>) -> Self {
        Self {
            unit_dir: unit_dir.into(),
            executable: executable.into(),
            systemctl: Some(PathBuf::from("systemctl")),
            pending: Vec::new(),
            reload_needed: false,
        }
    }

    /// Backend writing to `~/.config/systemd/user`, firing the running executable.
    pub fn user_default() -> Result<Self, BackendError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| BackendError::Unavailable("cannot determine the user config directory".to_string()))?;
        let executable = std::env::current_exe()?;
        Ok(Self::new(config_dir.join("systemd").join("user"), executable))
    }

    /// Only manage unit files, never call `systemctl`.
    pub fn without_systemctl(mut self) -> Self {
        self.systemctl = None;
        self
    }

    /// Run `program` in place of `systemctl`.
    pub fn with_systemctl(mut self, program: impl Into<PathBuf>) -> Self {
        self.systemctl = Some(program.into());
        self
    }

    pub fn unit_dir(&self) -> &Path {
        &self.unit_dir
    }

    fn timer_name(key: &str) -> String {
        format!("{UNIT_PREFIX}{key}{TIMER_SUFFIX}")
    }

    fn timer_path(&self, key: &str) -> PathBuf {
        self.unit_dir.join(Self::timer_name(key))
    }

    /// Write the fire service template if it is missing or stale.
    fn ensure_fire_service(&self) -> Result<bool, BackendError> {
        let path = self.unit_dir.join(FIRE_SERVICE_TEMPLATE);
        let content = render_fire_service(&self.executable);
        if fs::read_to_string(&path).is_ok_and(|existing| existing == content) {
            return Ok(false);
        }
        fs::create_dir_all(&self.unit_dir)?;
        fs::write(&path, content)?;
        log_debug!("Wrote {}", path.display());
        Ok(true)
    }

    fn systemctl(&self, args: &[&str]) -> Result<(), BackendError> {
        let Some(program) = &self.systemctl else {
            return Ok(());
        };

        let output = Command::new(program)
            .arg("--user")
            .args(args)
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => BackendError::Unavailable("systemctl not found in PATH".to_string()),
                _ => BackendError::Io(e),
            })?;

        if output.status.success() {
            return Ok(());
        }
        Err(BackendError::Command {
            command: format!("systemctl --user {}", args.join(" ")),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

impl SystemdTimerBackend {
    /// Remove a timer file written by `arm`, ignoring one that is already gone.
    fn remove_timer_file(&self, key: &str) -> Result<bool, BackendError> {
        match fs::remove_file(self.timer_path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Activate one written timer, removing its file again on failure.
    fn activate(&self, key: &str) -> Result<(), BackendError> {
        let timer = Self::timer_name(key);
        let Err(error) = self.systemctl(&["enable", "--now", "--no-reload", &timer]) else {
            return Ok(());
        };

        if let Err(e) = self.systemctl(&["disable", "--now", "--no-reload", &timer]) {
            log_debug!("Disabling {timer}: {e}");
        }
        if let Err(e) = self.remove_timer_file(key) {
            log_warning!("Cannot remove {}: {e}", self.timer_path(key).display());
        }
        Err(error)
    }

    /// Install and enable the login and resume services that run `sunshift reconcile`.
    pub fn install_session_hooks(&self) -> Result<(), BackendError> {
        fs::create_dir_all(&self.unit_dir)?;
        fs::write(self.unit_dir.join(LOGIN_SERVICE), render_login_service(&self.executable))?;
        fs::write(self.unit_dir.join(RESUME_SERVICE), render_resume_service(&self.executable))?;
        log_debug!("Wrote {LOGIN_SERVICE} and {RESUME_SERVICE}");

        self.systemctl(&["daemon-reload"])?;
        self.systemctl(&["enable", "--no-reload", LOGIN_SERVICE, RESUME_SERVICE])
    }

    /// Disable and remove the session hooks. Missing hooks are not an error.
    pub fn remove_session_hooks(&self) -> Result<(), BackendError> {
        if let Err(e) = self.systemctl(&["disable", "--no-reload", LOGIN_SERVICE, RESUME_SERVICE]) {
            log_debug!("Disabling session hooks: {e}");
        }

        let mut removed = false;
        for name in [LOGIN_SERVICE, RESUME_SERVICE] {
            match fs::remove_file(self.unit_dir.join(name)) {
                Ok(()) => removed = true,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        if removed {
            self.systemctl(&["daemon-reload"])?;
        }
        Ok(())
    }
}

/// Keys become unit and instance names, so they are restricted to a safe alphabet.
fn validate_key(key: &str) -> Result<(), BackendError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(BackendError::Rejected {
            key: key.to_string(),
            reason: "keys may only contain lowercase letters, digits and '-'".to_string(),
        })
    }
}

fn render_fire_service(executable: &Path) -> String {
    format!(
        "[Unit]\n\
         Description=sunshift: handle fired transition %i\n\
         \n\
         [Service]\n\
         Type=oneshot\n\
         ExecStart={} fire %i\n",
        executable.display()
    )
}

fn render_timer(key: &str, fire_at: DateTime<Utc>, kind: TransitionKind) -> String {
    let what = match kind {
        TransitionKind::EventTransition => "mode transition",
        TransitionKind::DailyReplan => "daily replan",
    };
    format!(
        "[Unit]\n\
         Description=sunshift: {what} {key}\n\
         \n\
         [Timer]\n\
         Unit=sunshift-fire@{key}.service\n\
         OnCalendar={} UTC\n\
         Persistent=true\n\
         AccuracySec=1s\n\
         WakeSystem=false\n\
         \n\
         [Install]\n\
         WantedBy=timers.target\n",
        fire_at.format(ON_CALENDAR_FORMAT)
    )
}

fn render_login_service(executable: &Path) -> String {
    format!(
        "[Unit]\n\
         Description=sunshift: apply the current mode at login\n\
         \n\
         [Service]\n\
         Type=oneshot\n\
         ExecStart={} reconcile\n\
         \n\
         [Install]\n\
         WantedBy=default.target\n",
        executable.display()
    )
}

fn render_resume_service(executable: &Path) -> String {
    format!(
        "[Unit]\n\
         Description=sunshift: apply the current mode after resume\n\
         After={SLEEP_TARGETS}\n\
         \n\
         [Service]\n\
         Type=oneshot\n\
         ExecStart={} reconcile\n\
         \n\
         [Install]\n\
         WantedBy={SLEEP_TARGETS}\n",
        executable.display()
    )
}

fn parse_on_calendar(content: &str) -> Option<DateTime<Utc>> {
    let value = content
        .lines()
        .find_map(|line| line.trim().strip_prefix("OnCalendar="))?;
    let value = value.trim().strip_suffix("UTC")?.trim();
    NaiveDateTime::parse_from_str(value, ON_CALENDAR_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

impl TimerBackend for SystemdTimerBackend {
    fn backend_name(&self) -> &'static str {
        "systemd"
    }

    fn list_armed(&self) -> Result<Vec<ArmedEntry>, BackendError> {
        let entries = match fs::read_dir(&self.unit_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut armed = Vec::new();
        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(key) = file_name
                .to_str()
                .and_then(|name| name.strip_prefix(UNIT_PREFIX))
                .and_then(|name| name.strip_suffix(TIMER_SUFFIX))
            else {
                continue;
            };

            let content = fs::read_to_string(entry.path())?;
            match parse_on_calendar(&content) {
                Some(fire_at) => armed.push(ArmedEntry {
                    key: key.to_string(),
                    fire_at,
                }),
                None => log_warning!("Ignoring {}: no usable OnCalendar line", entry.path().display()),
            }
        }
        Ok(armed)
    }

    fn arm(&mut self, key: &str, fire_at: DateTime<Utc>, kind: TransitionKind) -> Result<(), BackendError> {
        validate_key(key)?;
        self.ensure_fire_service()?;

        fs::write(self.timer_path(key), render_timer(key, fire_at, kind))?;
        if !self.pending.iter().any(|pending| pending == key) {
            self.pending.push(key.to_string());
        }
        Ok(())
    }

    fn disarm(&mut self, key: &str) -> Result<(), BackendError> {
        validate_key(key)?;
        let timer = Self::timer_name(key);

        // A timer that already elapsed may no longer be loaded
        if let Err(e) = self.systemctl(&["disable", "--now", "--no-reload", &timer]) {
            log_debug!("Disabling {timer}: {e}");
        }

        self.pending.retain(|pending| pending != key);
        if self.remove_timer_file(key)? {
            self.reload_needed = true;
        }
        Ok(())
    }

    fn commit(&mut self) -> Vec<KeyFailure> {
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() && !self.reload_needed {
            return Vec::new();
        }
        self.reload_needed = false;

        if let Err(error) = self.systemctl(&["daemon-reload"]) {
            log_warning!("Reloading the systemd user manager failed: {error}");
            return pending
                .into_iter()
                .map(|key| {
                    if let Err(e) = self.remove_timer_file(&key) {
                        log_warning!("Cannot remove {}: {e}", self.timer_path(&key).display());
                    }
                    KeyFailure {
                        key,
                        error: BackendError::Unavailable(format!("daemon-reload failed: {error}")),
                    }
                })
                .collect();
        }

        pending
            .into_iter()
            .filter_map(|key| {
                self.activate(&key)
                    .err()
                    .map(|error| KeyFailure { key, error })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingSink;
    use crate::schedule::{ScheduleSettings, TransitionScheduler};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn backend(dir: &TempDir) -> SystemdTimerBackend {
        SystemdTimerBackend::new(dir.path().join("user"), "/usr/bin/sunshift").without_systemctl()
    }

    #[test]
    fn test_arm_writes_units_that_list_back() {
        let dir = TempDir::new().unwrap();
        let mut backend = backend(&dir);
        let at = Utc.with_ymd_and_hms(2024, 6, 21, 9, 35, 12).unwrap();

        backend.arm("sunrise-2024-06-21", at, TransitionKind::EventTransition).unwrap();

        let timer = fs::read_to_string(dir.path().join("user/sunshift-sunrise-2024-06-21.timer")).unwrap();
        assert!(timer.contains("OnCalendar=2024-06-21 09:35:12 UTC"));
        assert!(timer.contains("Unit=sunshift-fire@sunrise-2024-06-21.service"));
        assert!(timer.contains("Persistent=true"));
        assert!(timer.contains("[Install]\nWantedBy=timers.target\n"));

        let service = fs::read_to_string(dir.path().join("user").join(FIRE_SERVICE_TEMPLATE)).unwrap();
        assert!(service.contains("ExecStart=/usr/bin/sunshift fire %i"));

        assert!(backend.commit().is_empty());
        let armed = backend.list_armed().unwrap();
        assert_eq!(
            armed,
            vec![ArmedEntry {
                key: "sunrise-2024-06-21".to_string(),
                fire_at: at
            }]
        );
    }

    #[test]
    fn test_disarm_removes_unit_and_tolerates_missing() {
        let dir = TempDir::new().unwrap();
        let mut backend = backend(&dir);
        let at = Utc.with_ymd_and_hms(2024, 6, 22, 4, 5, 0).unwrap();

        backend.arm("replan-2024-06-22", at, TransitionKind::DailyReplan).unwrap();
        backend.disarm("replan-2024-06-22").unwrap();
        backend.disarm("replan-2024-06-22").unwrap();
        assert!(backend.list_armed().unwrap().is_empty());
    }

    #[test]
    fn test_failed_activation_is_not_listed() {
        let dir = TempDir::new().unwrap();
        let mut backend = SystemdTimerBackend::new(dir.path().join("user"), "/usr/bin/sunshift")
            .with_systemctl("false");
        let at = Utc.with_ymd_and_hms(2024, 6, 21, 9, 35, 12).unwrap();

        backend.arm("sunrise-2024-06-21", at, TransitionKind::EventTransition).unwrap();
        let failed = backend.commit();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].key, "sunrise-2024-06-21");
        assert!(backend.list_armed().unwrap().is_empty());
        assert!(backend.commit().is_empty());
    }

    #[test]
    fn test_failing_systemctl_is_retried_on_every_replan() {
        crate::logger::Log::set_enabled(false);
        let dir = TempDir::new().unwrap();
        let backend = SystemdTimerBackend::new(dir.path().join("user"), "/usr/bin/sunshift")
            .with_systemctl("false");
        let location = crate::geo::Location::from_names(43.65, -79.38, "America/Toronto").unwrap();
        let mut scheduler = TransitionScheduler::new(
            location,
            ScheduleSettings::default(),
            backend,
            RecordingSink::new(),
        );
        let now = Utc.with_ymd_and_hms(2024, 6, 21, 16, 0, 0).unwrap();

        for _ in 0..2 {
            let err = scheduler.replan(now).unwrap_err();
            assert_eq!(err.failed_keys().len(), 16);
            assert!(scheduler.backend().list_armed().unwrap().is_empty());
        }
    }

    #[test]
    fn test_one_reload_per_batch_and_timers_are_enabled() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let calls = dir.path().join("calls");
        let script = dir.path().join("systemctl");
        fs::write(&script, format!("#!/bin/sh\necho \"$*\" >> {}\n", calls.display())).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let mut backend =
            SystemdTimerBackend::new(dir.path().join("user"), "/usr/bin/sunshift").with_systemctl(&script);
        let at = Utc.with_ymd_and_hms(2024, 6, 21, 9, 35, 12).unwrap();
        for key in ["sunrise-2024-06-21", "sunset-2024-06-21", "replan-2024-06-22"] {
            backend.arm(key, at, TransitionKind::EventTransition).unwrap();
        }
        assert!(backend.commit().is_empty());

        let log = fs::read_to_string(&calls).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.iter().filter(|l| **l == "--user daemon-reload").count(), 1);
        assert_eq!(lines[0], "--user daemon-reload");
        assert!(lines.contains(&"--user enable --now --no-reload sunshift-sunset-2024-06-21.timer"));
        assert_eq!(lines.len(), 4);
        assert_eq!(backend.list_armed().unwrap().len(), 3);
    }

    #[test]
    fn test_session_hooks_install_and_remove() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);

        backend.install_session_hooks().unwrap();
        let login = fs::read_to_string(backend.unit_dir().join(LOGIN_SERVICE)).unwrap();
        assert!(login.contains("ExecStart=/usr/bin/sunshift reconcile"));
        assert!(login.contains("WantedBy=default.target"));

        let resume = fs::read_to_string(backend.unit_dir().join(RESUME_SERVICE)).unwrap();
        assert!(resume.contains("ExecStart=/usr/bin/sunshift reconcile"));
        assert!(resume.contains("After=suspend.target hibernate.target"));
        assert!(resume.contains("WantedBy=suspend.target hibernate.target"));

        // Hooks are services, never mistaken for armed timers
        assert!(backend.list_armed().unwrap().is_empty());

        backend.remove_session_hooks().unwrap();
        assert!(!backend.unit_dir().join(LOGIN_SERVICE).exists());
        assert!(!backend.unit_dir().join(RESUME_SERVICE).exists());
        backend.remove_session_hooks().unwrap();
    }

    #[test]
    fn test_list_ignores_unrelated_files_and_missing_dir() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        assert!(backend.list_armed().unwrap().is_empty());

        fs::create_dir_all(backend.unit_dir()).unwrap();
        fs::write(backend.unit_dir().join("other.timer"), "OnCalendar=daily\n").unwrap();
        fs::write(backend.unit_dir().join(FIRE_SERVICE_TEMPLATE), "").unwrap();
        assert!(backend.list_armed().unwrap().is_empty());
    }

    #[test]
    fn test_unsafe_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let mut backend = backend(&dir);
        let at = Utc.with_ymd_and_hms(2024, 6, 21, 0, 0, 0).unwrap();
        assert!(matches!(
            backend.arm("../escape", at, TransitionKind::EventTransition),
            Err(BackendError::Rejected { .. })
        ));
    }

    #[test]
    fn test_parse_on_calendar() {
        assert_eq!(
            parse_on_calendar("[Timer]\nOnCalendar=2024-11-03 11:55:01 UTC\n"),
            Some(Utc.with_ymd_and_hms(2024, 11, 3, 11, 55, 1).unwrap())
        );
        assert_eq!(parse_on_calendar("OnCalendar=daily\n"), None);
        assert_eq!(parse_on_calendar("[Timer]\n"), None);
    }
}
