//! Atomic whole-tree clone through the platform's `clonefile(2)`.
//!
//! The symbol is looked up at runtime so the binary still starts on systems
//! that lack it; those simply report the level as unavailable.

use std::path::Path;

/// Whether the atomic clone primitive exists on this system.
pub fn available() -> bool {
    imp::available()
}

/// Clone `source` to `dest` in one call. `dest` must not exist.
pub fn clone_tree(source: &Path, dest: &Path) -> bool {
    imp::clone_tree(source, dest)
}

#[cfg(target_os = "macos")]
#[allow(unsafe_code)]
mod imp {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;

    use once_cell::sync::Lazy;

    type CloneFileFn =
        unsafe extern "C" fn(*const libc::c_char, *const libc::c_char, u32) -> libc::c_int;

    static CLONEFILE: Lazy<Option<CloneFileFn>> = Lazy::new(|| {
        // SAFETY: RTLD_DEFAULT with a NUL-terminated symbol name.
        let sym = unsafe { libc::dlsym(libc::RTLD_DEFAULT, c"clonefile".as_ptr()) };
        if sym.is_null() {
            tracing::debug!("clonefile not available");
            return None;
        }
        // SAFETY: libSystem exports clonefile with exactly this signature.
        Some(unsafe { std::mem::transmute::<*mut libc::c_void, CloneFileFn>(sym) })
    });

    pub fn available() -> bool {
        CLONEFILE.is_some()
    }

    pub fn clone_tree(source: &Path, dest: &Path) -> bool {
        let Some(clonefile) = *CLONEFILE else {
            return false;
        };
        let (Ok(src), Ok(dst)) = (
            CString::new(source.as_os_str().as_bytes()),
            CString::new(dest.as_os_str().as_bytes()),
        ) else {
            return false;
        };
        // SAFETY: both pointers are valid C strings that outlive the call.
        let rc = unsafe { clonefile(src.as_ptr(), dst.as_ptr(), 0) };
        if rc != 0 {
            tracing::debug!(error = %std::io::Error::last_os_error(), "clonefile failed");
        }
        rc == 0
    }
}

#[cfg(not(target_os = "macos"))]
mod imp {
    use std::path::Path;

    pub const fn available() -> bool {
        false
    }

    pub const fn clone_tree(_source: &Path, _dest: &Path) -> bool {
        false
    }
}
