//! Loaded module listing.

use crate::core::error::{Error, Result};
use std::path::PathBuf;

/// List the module paths mapped into a process.
///
/// Errors mean the process could not be inspected (access denied, exited,
/// or a 32/64-bit mismatch) and should be skipped by the caller.
pub fn list_modules(pid: u32) -> Result<Vec<PathBuf>> {
    #[cfg(target_os = "windows")]
    {
        list_modules_windows(pid)
    }

    #[cfg(target_os = "linux")]
    {
        list_modules_linux(pid)
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux")))]
    {
        let _ = pid;
        Err(Error::NotSupported(
            "Module enumeration not supported on this platform".to_string(),
        ))
    }
}

#[cfg(target_os = "windows")]
fn list_modules_windows(pid: u32) -> Result<Vec<PathBuf>> {
    use super::enumerate::wide_to_string;
    use std::mem;
    use windows::Win32::Foundation::{CloseHandle, ERROR_BAD_LENGTH};
    use windows::Win32::System::Diagnostics::ToolHelp::{
        CreateToolhelp32Snapshot, Module32FirstW, Module32NextW, MODULEENTRY32W,
        TH32CS_SNAPMODULE, TH32CS_SNAPMODULE32,
    };

    // The snapshot can fail transiently with ERROR_BAD_LENGTH while the
    // target is loading or unloading modules.
    const SNAPSHOT_ATTEMPTS: usize = 3;

    let mut modules = Vec::new();

    unsafe {
        let mut snapshot = None;
        for _ in 0..SNAPSHOT_ATTEMPTS {
            match CreateToolhelp32Snapshot(TH32CS_SNAPMODULE | TH32CS_SNAPMODULE32, pid) {
                Ok(handle) => {
                    snapshot = Some(handle);
                    break;
                }
                Err(e) if e.code() == ERROR_BAD_LENGTH.to_hresult() => continue,
                Err(e) => return Err(Error::process_access(pid, e.to_string())),
            }
        }
        let snapshot = snapshot
            .ok_or_else(|| Error::process_access(pid, "module snapshot kept changing"))?;

        let mut entry: MODULEENTRY32W = mem::zeroed();
        entry.dwSize = mem::size_of::<MODULEENTRY32W>() as u32;

        if Module32FirstW(snapshot, &mut entry).is_ok() {
            loop {
                let path = wide_to_string(&entry.szExePath);
                if !path.is_empty() {
                    modules.push(PathBuf::from(path));
                }

                if Module32NextW(snapshot, &mut entry).is_err() {
                    break;
                }
            }
        }

        let _ = CloseHandle(snapshot);
    }

    Ok(modules)
}

#[cfg(target_os = "linux")]
fn list_modules_linux(pid: u32) -> Result<Vec<PathBuf>> {
    let maps = std::fs::read_to_string(format!("/proc/{}/maps", pid))
        .map_err(|e| Error::process_access(pid, e.to_string()))?;
    Ok(parse_maps(&maps))
}

/// Extract distinct file-backed mappings from `/proc/<pid>/maps`, in first-seen order.
#[cfg(any(target_os = "linux", test))]
fn parse_maps(maps: &str) -> Vec<PathBuf> {
    let mut seen = std::collections::HashSet::new();
    let mut modules = Vec::new();

    for line in maps.lines() {
        // address perms offset dev inode pathname
        let pathname = line.splitn(6, char::is_whitespace).nth(5).map(str::trim);
        let Some(pathname) = pathname else {
            continue;
        };
        if !pathname.starts_with('/') {
            continue;
        }

        let pathname = pathname.strip_suffix(" (deleted)").unwrap_or(pathname);
        if seen.insert(pathname.to_string()) {
            modules.push(PathBuf::from(pathname));
        }
    }

    modules
}
