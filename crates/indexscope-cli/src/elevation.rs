//! Privilege detection for the current process.
#![allow(unsafe_code)]

/// Whether the process runs with an elevated (administrator) token.
#[cfg(windows)]
pub fn is_elevated() -> bool {
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::Security::{GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY};
    use windows::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

    let mut token = HANDLE::default();
    // SAFETY: GetCurrentProcess returns a pseudo handle that needs no cleanup,
    // and `token` is a valid out pointer for the duration of the call.
    if unsafe { OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token) }.is_err() {
        return false;
    }

    let mut elevation = TOKEN_ELEVATION::default();
    let mut size = std::mem::size_of::<TOKEN_ELEVATION>() as u32;
    // SAFETY: the buffer points at a live TOKEN_ELEVATION and `size` matches
    // its layout; `token` was opened above with TOKEN_QUERY.
    let queried = unsafe {
        GetTokenInformation(
            token,
            TokenElevation,
            Some(&mut elevation as *mut TOKEN_ELEVATION as *mut _),
            size,
            &mut size,
        )
    };
    // SAFETY: `token` is an owned handle from OpenProcessToken and is not used afterwards.
    let _ = unsafe { CloseHandle(token) };

    queried.is_ok() && elevation.TokenIsElevated != 0
}

/// Whether the process runs as root.
#[cfg(unix)]
pub fn is_elevated() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(any(unix, windows)))]
pub fn is_elevated() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_matches_effective_uid() {
        // SAFETY: see `is_elevated`.
        let root = unsafe { libc::geteuid() } == 0;
        assert_eq!(is_elevated(), root);
    }
}
