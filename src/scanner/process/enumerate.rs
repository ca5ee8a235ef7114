//! Process enumeration functionality.
//!
//! Provides cross-platform process listing with the metadata discovery needs.

use super::ProcessSource;
use crate::core::error::Result;
use std::path::PathBuf;

/// Information about a running process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    /// Process ID
    pub pid: u32,
    /// Process name
    pub name: String,
    /// Full path to executable, if readable
    pub path: Option<PathBuf>,
    /// Parent process ID
    pub parent_pid: Option<u32>,
}

impl ProcessInfo {
    /// Create a new process info entry.
    pub fn new(pid: u32, name: impl Into<String>) -> Self {
        Self {
            pid,
            name: name.into(),
            path: None,
            parent_pid: None,
        }
    }

    /// Set the executable path.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the parent PID.
    pub fn with_parent_pid(mut self, ppid: u32) -> Self {
        self.parent_pid = Some(ppid);
        self
    }

    /// Executable path as record text, empty when unknown.
    pub fn path_string(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// System process enumerator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnumerator;

impl ProcessEnumerator {
    /// Create a new process enumerator.
    pub fn new() -> Self {
        Self
    }

    /// Enumerate processes on Windows.
    #[cfg(target_os = "windows")]
    fn enumerate_windows(&self) -> Result<Vec<ProcessInfo>> {
        use crate::core::error::Error;
        use std::mem;
        use windows::Win32::Foundation::CloseHandle;
        use windows::Win32::System::Diagnostics::ToolHelp::{
            CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
            TH32CS_SNAPPROCESS,
        };

        let mut processes = Vec::new();

        unsafe {
            let snapshot = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0)
                .map_err(|e| Error::ProcessEnumeration(format!("Failed to create snapshot: {}", e)))?;

            let mut entry: PROCESSENTRY32W = mem::zeroed();
            entry.dwSize = mem::size_of::<PROCESSENTRY32W>() as u32;

            if Process32FirstW(snapshot, &mut entry).is_ok() {
                loop {
                    let pid = entry.th32ProcessID;
                    let name = wide_to_string(&entry.szExeFile);

                    let mut info = ProcessInfo::new(pid, name)
                        .with_parent_pid(entry.th32ParentProcessID);
                    info.path = image_path_windows(pid);
                    processes.push(info);

                    if Process32NextW(snapshot, &mut entry).is_err() {
                        break;
                    }
                }
            }

            let _ = CloseHandle(snapshot);
        }

        Ok(processes)
    }

    /// Get process info on Windows.
    #[cfg(target_os = "windows")]
    fn get_process_windows(&self, pid: u32) -> Option<ProcessInfo> {
        use windows::Win32::Foundation::CloseHandle;
        use windows::Win32::System::Threading::{
            GetExitCodeProcess, OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION,
        };

        const STILL_ACTIVE: u32 = 259;

        unsafe {
            let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid).ok()?;
            let mut exit_code = 0u32;
            let running = GetExitCodeProcess(handle, &mut exit_code).is_ok()
                && exit_code == STILL_ACTIVE;
            let _ = CloseHandle(handle);

            if !running {
                return None;
            }
        }

        let path = image_path_windows(pid);
        let name = path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut info = ProcessInfo::new(pid, name);
        info.path = path;
        Some(info)
    }

    /// Enumerate processes on Linux.
    #[cfg(target_os = "linux")]
    fn enumerate_linux(&self) -> Result<Vec<ProcessInfo>> {
        use crate::core::error::Error;
        use std::fs;

        let entries = fs::read_dir("/proc")
            .map_err(|e| Error::ProcessEnumeration(format!("Failed to read /proc: {}", e)))?;

        let mut processes = Vec::new();
        for entry in entries.filter_map(|e| e.ok()) {
            let file_name = entry.file_name();
            let name_str = file_name.to_string_lossy();

            // Only numeric directories are processes
            if let Ok(pid) = name_str.parse::<u32>() {
                if let Some(info) = read_proc_info(pid) {
                    processes.push(info);
                }
            }
        }

        processes.sort_by_key(|p| p.pid);
        Ok(processes)
    }

    /// Enumerate processes on macOS.
    #[cfg(target_os = "macos")]
    fn enumerate_macos(&self) -> Result<Vec<ProcessInfo>> {
        use crate::core::error::Error;
        use std::process::Command;

        let output = Command::new("ps")
            .args(["-axo", "pid=,ppid=,comm="])
            .output()
            .map_err(|e| Error::ProcessEnumeration(format!("Failed to run ps: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().filter_map(parse_ps_line).collect())
    }
}

impl ProcessSource for ProcessEnumerator {
    fn processes(&self) -> Result<Vec<ProcessInfo>> {
        #[cfg(target_os = "windows")]
        {
            self.enumerate_windows()
        }

        #[cfg(target_os = "linux")]
        {
            self.enumerate_linux()
        }

        #[cfg(target_os = "macos")]
        {
            self.enumerate_macos()
        }

        #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
        {
            Err(crate::core::error::Error::NotSupported(
                "Process enumeration not supported on this platform".to_string(),
            ))
        }
    }

    fn process(&self, pid: u32) -> Option<ProcessInfo> {
        #[cfg(target_os = "windows")]
        {
            self.get_process_windows(pid)
        }

        #[cfg(target_os = "linux")]
        {
            read_proc_info(pid)
        }

        #[cfg(target_os = "macos")]
        {
            use std::process::Command;

            let output = Command::new("ps")
                .args(["-p", &pid.to_string(), "-o", "pid=,ppid=,comm="])
                .output()
                .ok()?;
            let stdout = String::from_utf8_lossy(&output.stdout);
            let line = stdout.lines().next()?;
            parse_ps_line(line)
        }

        #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
        {
            let _ = pid;
            None
        }
    }

    fn modules(&self, pid: u32) -> Result<Vec<PathBuf>> {
        super::modules::list_modules(pid)
    }
}

/// Decode a NUL-terminated UTF-16 buffer.
#[cfg(target_os = "windows")]
pub(crate) fn wide_to_string(buffer: &[u16]) -> String {
    let len = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
    String::from_utf16_lossy(&buffer[..len])
}

/// Read the full image path of a process, `None` when access is denied.
#[cfg(target_os = "windows")]
fn image_path_windows(pid: u32) -> Option<PathBuf> {
    use std::ffi::OsString;
    use std::os::windows::ffi::OsStringExt;
    use windows::core::PWSTR;
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::System::Threading::{
        OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32,
        PROCESS_QUERY_LIMITED_INFORMATION,
    };

    // Long-path aware buffer; MAX_PATH truncates deep install trees.
    let mut buffer = vec![0u16; 32_768];
    let mut size = buffer.len() as u32;

    unsafe {
        let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid).ok()?;
        let queried = QueryFullProcessImageNameW(
            handle,
            PROCESS_NAME_WIN32,
            PWSTR::from_raw(buffer.as_mut_ptr()),
            &mut size,
        );
        let _ = CloseHandle(handle);
        queried.ok()?;
    }

    let path = OsString::from_wide(&buffer[..size as usize]);
    Some(PathBuf::from(path))
}

/// Read process info from /proc on Linux.
///
/// Zombies are treated as gone: they hold no files and cannot be killed again.
#[cfg(target_os = "linux")]
fn read_proc_info(pid: u32) -> Option<ProcessInfo> {
    use std::fs;

    let proc_dir = format!("/proc/{}", pid);

    let stat = fs::read_to_string(format!("{}/stat", proc_dir)).ok()?;
    // Format: pid (comm) state ppid ...
    let after_comm = stat.rsplit_once(')').map(|(_, rest)| rest)?;
    let mut fields = after_comm.split_whitespace();
    let state = fields.next()?;
    if state == "Z" || state == "X" {
        return None;
    }
    let ppid = fields.next().and_then(|s| s.parse::<u32>().ok());

    let name = fs::read_to_string(format!("{}/comm", proc_dir))
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    let mut info = ProcessInfo::new(pid, name);
    info.parent_pid = ppid;

    // exe is unreadable for other users' processes without privilege
    if let Ok(exe_path) = fs::read_link(format!("{}/exe", proc_dir)) {
        info.path = Some(strip_deleted_suffix(exe_path));
    }

    Some(info)
}

/// Remove the ` (deleted)` marker the kernel appends to unlinked files.
#[cfg(target_os = "linux")]
pub(crate) fn strip_deleted_suffix(path: PathBuf) -> PathBuf {
    let text = path.to_string_lossy();
    match text.strip_suffix(" (deleted)") {
        Some(stripped) => PathBuf::from(stripped),
        None => path,
    }
}

/// Parse one `pid ppid comm` line of `ps` output.
#[cfg(any(target_os = "macos", test))]
fn parse_ps_line(line: &str) -> Option<ProcessInfo> {
    let mut parts = line.split_whitespace();
    let pid = parts.next()?.parse::<u32>().ok()?;
    let ppid = parts.next()?.parse::<u32>().ok();
    let comm = parts.collect::<Vec<_>>().join(" ");
    if comm.is_empty() {
        return None;
    }

    let name = std::path::Path::new(&comm)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| comm.clone());

    let mut info = ProcessInfo::new(pid, name);
    info.parent_pid = ppid;
    if comm.starts_with('/') {
        info.path = Some(PathBuf::from(comm));
    }
    Some(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_info_new() {
        let info = ProcessInfo::new(1234, "test.exe");
        assert_eq!(info.pid, 1234);
        assert_eq!(info.name, "test.exe");
        assert!(info.path.is_none());
        assert_eq!(info.path_string(), "");
    }

    #[test]
    fn test_process_info_with_path() {
        let info = ProcessInfo::new(1234, "test").with_path("/usr/bin/test");
        assert_eq!(info.path_string(), "/usr/bin/test");
    }

    #[test]
    fn test_process_info_with_parent() {
        let info = ProcessInfo::new(1234, "test.exe").with_parent_pid(1);
        assert_eq!(info.parent_pid, Some(1));
    }

    #[test]
    fn test_parse_ps_line() {
        let info = parse_ps_line("  412   1 /usr/sbin/cupsd").unwrap();
        assert_eq!(info.pid, 412);
        assert_eq!(info.parent_pid, Some(1));
        assert_eq!(info.name, "cupsd");
        assert_eq!(info.path, Some(PathBuf::from("/usr/sbin/cupsd")));

        let info = parse_ps_line("9 1 kernel_task").unwrap();
        assert!(info.path.is_none());

        assert!(parse_ps_line("garbage").is_none());
    }

    #[cfg(any(target_os = "windows", target_os = "linux", target_os = "macos"))]
    #[test]
    fn test_enumerate_processes() {
        let enumerator = ProcessEnumerator::new();
        let processes = enumerator.processes().unwrap();

        assert!(!processes.is_empty());

        let current_pid = std::process::id();
        assert!(
            processes.iter().any(|p| p.pid == current_pid),
            "Should find current process in list"
        );
    }

    #[cfg(any(target_os = "windows", target_os = "linux"))]
    #[test]
    fn test_get_own_process() {
        let enumerator = ProcessEnumerator::new();
        let current_pid = std::process::id();

        let info = enumerator.process(current_pid).unwrap();
        assert_eq!(info.pid, current_pid);
        assert!(info.path.is_some());
        assert!(enumerator.is_alive(current_pid));
    }

    #[test]
    fn test_get_nonexistent_process() {
        let enumerator = ProcessEnumerator::new();
        assert!(enumerator.process(999_999_999).is_none());
        assert!(!enumerator.is_alive(999_999_999));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_strip_deleted_suffix() {
        assert_eq!(
            strip_deleted_suffix(PathBuf::from("/tmp/app (deleted)")),
            PathBuf::from("/tmp/app")
        );
        assert_eq!(
            strip_deleted_suffix(PathBuf::from("/usr/bin/app")),
            PathBuf::from("/usr/bin/app")
        );
    }
}
