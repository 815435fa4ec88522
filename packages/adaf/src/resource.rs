//! Process resource probing: the open-file budget for linked handles and the
//! login name recorded in file attributes.

// ── Constants ───────────────────────────────────────────────────────

/// Linked-handle capacity floor.
const CAPACITY_MIN: usize = 16;

/// Linked-handle capacity ceiling.
const CAPACITY_MAX: usize = 1024;

/// Capacity used when the limit can't be read.
const CAPACITY_FALLBACK: usize = 128;

/// Share of the descriptor limit handed to the link cache.
const CAPACITY_DIVISOR: u64 = 4;

// ── HandleBudget ────────────────────────────────────────────────────

/// Snapshot of the process open-file limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleBudget {
    /// Soft `RLIMIT_NOFILE`, if it could be read and is finite.
    pub soft_limit: Option<u64>,
}

impl HandleBudget {
    /// Probe the current process.
    pub fn detect() -> Self {
        Self {
            soft_limit: soft_nofile_limit(),
        }
    }

    /// Linked-handle capacity for this budget: a quarter of the soft limit,
    /// clamped to 16..=1024.
    pub fn link_cache_capacity(&self) -> usize {
        match self.soft_limit {
            Some(limit) => {
                let share = usize::try_from(limit / CAPACITY_DIVISOR).unwrap_or(CAPACITY_MAX);
                share.clamp(CAPACITY_MIN, CAPACITY_MAX)
            }
            None => CAPACITY_FALLBACK,
        }
    }
}

#[cfg(unix)]
fn soft_nofile_limit() -> Option<u64> {
    let mut limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: getrlimit only writes into the struct we pass.
    let rc = unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut limit) };
    if rc != 0 || limit.rlim_cur == libc::RLIM_INFINITY {
        return None;
    }
    Some(limit.rlim_cur as u64)
}

#[cfg(not(unix))]
fn soft_nofile_limit() -> Option<u64> {
    None
}

// ── Login name ──────────────────────────────────────────────────────

/// Name of the user running the process, or an empty string.
pub fn login_name() -> String {
    ["USER", "USERNAME", "LOGNAME"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|name| !name.is_empty())
        .or_else(passwd_name)
        .unwrap_or_default()
}

#[cfg(unix)]
fn passwd_name() -> Option<String> {
    // SAFETY: getpwuid returns a pointer into static storage or null; the
    // name is copied out before any other call can overwrite it.
    unsafe {
        let entry = libc::getpwuid(libc::getuid());
        if entry.is_null() || (*entry).pw_name.is_null() {
            return None;
        }
        std::ffi::CStr::from_ptr((*entry).pw_name)
            .to_str()
            .ok()
            .map(str::to_string)
    }
}

#[cfg(not(unix))]
fn passwd_name() -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_from_limit() {
        let budget = |soft_limit| HandleBudget { soft_limit };
        assert_eq!(budget(Some(1024)).link_cache_capacity(), 256);
        assert_eq!(budget(Some(20)).link_cache_capacity(), CAPACITY_MIN);
        assert_eq!(budget(Some(1 << 20)).link_cache_capacity(), CAPACITY_MAX);
        assert_eq!(budget(None).link_cache_capacity(), CAPACITY_FALLBACK);
    }

    #[test]
    fn test_detect_in_range() {
        let capacity = HandleBudget::detect().link_cache_capacity();
        assert!((CAPACITY_MIN..=CAPACITY_MAX).contains(&capacity));
    }
}
