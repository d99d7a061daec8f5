//! Link-time safety net for builds that carry no real target library.
//!
//! Configure probes and smoke builds still need a trial entry point to link
//! against. If that entry point ever runs, the binary was built without a
//! target and the only sensible outcome is a loud abort.

use crate::feeder::InputFeeder;
use crate::target::Target;
use std::ffi::CStr;
use std::io::Write;

pub const UNLINKED_DIAGNOSTIC: &str =
    "sluice - no target library linked into this build, linker error?";

/// Target used when no real library was selected at build time.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnlinkedTarget;

impl Target for UnlinkedTarget {
    type Handle = std::convert::Infallible;

    fn parse(&self, _text: &CStr) -> Option<Self::Handle> {
        abort_unlinked()
    }

    fn release(&self, handle: Self::Handle) {
        match handle {}
    }
}

/// Writes the misconfiguration diagnostic to stderr and aborts.
pub fn abort_unlinked() -> ! {
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "{UNLINKED_DIAGNOSTIC}");
    let _ = stderr.flush();
    std::process::abort()
}

/// The target this build was configured with.
#[cfg(feature = "libcue")]
pub type LinkedTarget = crate::libcue::LibCue;

#[cfg(not(feature = "libcue"))]
pub type LinkedTarget = UnlinkedTarget;

pub fn linked_feeder() -> InputFeeder<LinkedTarget> {
    InputFeeder::new(LinkedTarget::default())
}

/// C ABI trial entry for engines that link against `LLVMFuzzerTestOneInput`.
///
/// Only exported with the `entry-symbol` feature; builds that define their
/// own entry (for example through `libfuzzer_sys::fuzz_target!`) leave it off.
///
/// # Safety
/// `data` must point at `size` readable bytes for the duration of the call,
/// or be null.
#[cfg(feature = "entry-symbol")]
#[unsafe(no_mangle)]
#[allow(non_snake_case)]
pub unsafe extern "C" fn LLVMFuzzerTestOneInput(data: *const u8, size: usize) -> std::ffi::c_int {
    let bytes: &[u8] = if data.is_null() || size == 0 {
        &[]
    } else {
        // SAFETY: upheld by the caller, see above.
        unsafe { std::slice::from_raw_parts(data, size) }
    };
    linked_feeder().test_one_input(bytes).as_raw()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlinked_build_skips_empty_input_without_aborting() {
        // Empty input never reaches the target, so even the unlinked shim is safe here.
        let feeder = InputFeeder::new(UnlinkedTarget);
        assert_eq!(feeder.test_one_input(b""), crate::feeder::TrialStatus::Skip);
    }

    #[test]
    fn diagnostic_names_the_link_problem() {
        assert!(UNLINKED_DIAGNOSTIC.contains("linker error"));
    }

    const ABORT_CHILD_ENV: &str = "SLUICE_SHIM_ABORT_CHILD";

    /// Re-runs this test in a child process, where the unlinked target is
    /// actually reached and must take the whole process down.
    #[test]
    fn unlinked_target_aborts_with_diagnostic() {
        if std::env::var_os(ABORT_CHILD_ENV).is_some() {
            let feeder = InputFeeder::new(UnlinkedTarget);
            feeder.test_one_input(b"FILE x\n");
            unreachable!("unlinked target returned");
        }

        let exe = std::env::current_exe().unwrap();
        let output = std::process::Command::new(exe)
            .args([
                "--exact",
                "shim::tests::unlinked_target_aborts_with_diagnostic",
                "--nocapture",
                "--test-threads=1",
            ])
            .env(ABORT_CHILD_ENV, "1")
            .output()
            .unwrap();

        assert!(!output.status.success(), "child should abort: {output:?}");
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            assert_eq!(output.status.signal(), Some(6), "expected SIGABRT");
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(
            stderr.contains(UNLINKED_DIAGNOSTIC),
            "missing diagnostic in stderr: {stderr}"
        );
    }

    #[cfg(feature = "entry-symbol")]
    #[test]
    fn entry_symbol_skips_null_and_empty_buffers() {
        use crate::feeder::TrialStatus;

        // A null pointer with a non-zero size is read as empty, never dereferenced.
        let null = unsafe { LLVMFuzzerTestOneInput(std::ptr::null(), 16) };
        assert_eq!(null, TrialStatus::Skip.as_raw());

        let data = [b'A'];
        let empty = unsafe { LLVMFuzzerTestOneInput(data.as_ptr(), 0) };
        assert_eq!(empty, TrialStatus::Skip.as_raw());
    }

    #[cfg(all(feature = "entry-symbol", not(feature = "libcue")))]
    #[test]
    fn entry_symbol_reaches_unlinked_target_in_child() {
        if std::env::var_os(ABORT_CHILD_ENV).is_some() {
            let data = b"TITLE x\n";
            unsafe { LLVMFuzzerTestOneInput(data.as_ptr(), data.len()) };
            unreachable!("unlinked target returned");
        }

        let exe = std::env::current_exe().unwrap();
        let output = std::process::Command::new(exe)
            .args([
                "--exact",
                "shim::tests::entry_symbol_reaches_unlinked_target_in_child",
                "--nocapture",
            ])
            .env(ABORT_CHILD_ENV, "1")
            .output()
            .unwrap();

        assert!(!output.status.success());
        assert!(String::from_utf8_lossy(&output.stderr).contains(UNLINKED_DIAGNOSTIC));
    }
}
