//! libFuzzer owns `main` here and supplies the trial entry point, so the
//! default dispatcher and the unlinked shim are both out of the picture.
//!
//! Build libcue with coverage instrumentation and point `LIBCUE_LIB_DIR` at it.

#![no_main]

use libfuzzer_sys::{Corpus, fuzz_target};
use sluice_core::libcue::LibCue;
use sluice_core::{InputFeeder, TrialStatus};

fuzz_target!(|data: &[u8]| -> Corpus {
    match InputFeeder::new(LibCue).test_one_input(data) {
        TrialStatus::Completed => Corpus::Keep,
        TrialStatus::Skip => Corpus::Reject,
    }
});
