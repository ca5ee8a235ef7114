//! Windows Restart Manager lock registry.

use super::{HolderList, LockHolder, LockRegistry, SessionHandle};
use crate::core::error::{Error, Result};
use crate::scanner::process::enumerate::wide_to_string;
use std::os::windows::ffi::OsStrExt;
use std::path::PathBuf;
use windows::core::{PCWSTR, PWSTR};
use windows::Win32::Foundation::{ERROR_MORE_DATA, ERROR_SUCCESS};
use windows::Win32::System::RestartManager::{
    RmEndSession, RmGetList, RmRegisterResources, RmStartSession, CCH_RM_SESSION_KEY,
    RM_PROCESS_INFO,
};

/// Restart Manager session API.
#[derive(Debug, Default, Clone, Copy)]
pub struct RestartManager;

impl RestartManager {
    pub fn new() -> Self {
        Self
    }
}

impl LockRegistry for RestartManager {
    fn start_session(&self) -> Result<SessionHandle> {
        let mut handle = 0u32;
        let mut key = [0u16; CCH_RM_SESSION_KEY as usize + 1];

        let rc = unsafe { RmStartSession(&mut handle, 0, PWSTR(key.as_mut_ptr())) };
        if rc != ERROR_SUCCESS {
            return Err(Error::LockSession { code: rc.0 });
        }
        Ok(handle)
    }

    fn register_resources(&self, session: SessionHandle, paths: &[PathBuf]) -> Result<()> {
        // The wide buffers must outlive the call; the PCWSTRs borrow them.
        let wide: Vec<Vec<u16>> = paths
            .iter()
            .map(|p| p.as_os_str().encode_wide().chain(std::iter::once(0)).collect())
            .collect();
        let names: Vec<PCWSTR> = wide.iter().map(|w| PCWSTR(w.as_ptr())).collect();

        let rc = unsafe { RmRegisterResources(session, Some(&names), None, None) };
        if rc != ERROR_SUCCESS {
            return Err(Error::LockRegistration {
                count: paths.len(),
                code: rc.0,
            });
        }
        Ok(())
    }

    fn required_capacity(&self, session: SessionHandle) -> Result<usize> {
        let mut needed = 0u32;
        let mut count = 0u32;
        let mut reasons = 0u32;

        let rc = unsafe { RmGetList(session, &mut needed, &mut count, None, &mut reasons) };
        if rc == ERROR_SUCCESS || rc == ERROR_MORE_DATA {
            Ok(needed as usize)
        } else {
            Err(Error::lock_query(format!("RmGetList size query returned {}", rc.0)))
        }
    }

    fn fill_holders(&self, session: SessionHandle, capacity: usize) -> Result<HolderList> {
        let mut infos = vec![RM_PROCESS_INFO::default(); capacity];
        let mut needed = 0u32;
        let mut count = capacity as u32;
        let mut reasons = 0u32;

        let rc = unsafe {
            RmGetList(
                session,
                &mut needed,
                &mut count,
                Some(infos.as_mut_ptr()),
                &mut reasons,
            )
        };

        if rc == ERROR_MORE_DATA {
            return Ok(HolderList::NeedsCapacity(needed as usize));
        }
        if rc != ERROR_SUCCESS {
            return Err(Error::lock_query(format!("RmGetList fill returned {}", rc.0)));
        }

        let filled = (count as usize).min(infos.len());
        let holders = infos[..filled]
            .iter()
            .map(|info| {
                LockHolder::new(info.Process.dwProcessId, wide_to_string(&info.strAppName))
            })
            .collect();
        Ok(HolderList::Complete(holders))
    }

    fn end_session(&self, session: SessionHandle) -> Result<()> {
        let rc = unsafe { RmEndSession(session) };
        if rc != ERROR_SUCCESS {
            return Err(Error::lock_query(format!("RmEndSession returned {}", rc.0)));
        }
        Ok(())
    }
}
