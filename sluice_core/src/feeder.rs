use crate::target::{HandleGuard, Target, TerminatedCopy};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::{trace, warn};

/// Result of one trial, as reported back to the fuzzing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialStatus {
    /// The target ran on the input; the engine should continue.
    Completed,
    /// The input was not run (empty buffer) and should not enter the corpus.
    Skip,
}

impl TrialStatus {
    /// The integer code expected by libFuzzer-style engines.
    pub fn as_raw(self) -> i32 {
        match self {
            TrialStatus::Completed => 0,
            TrialStatus::Skip => -1,
        }
    }
}

/// Turns raw engine buffers into single parse/release calls against a target.
///
/// Holds no per-trial state: every working copy and handle lives only for the
/// duration of one `test_one_input` call.
pub struct InputFeeder<T: Target> {
    target: T,
}

impl<T: Target> InputFeeder<T> {
    pub fn new(target: T) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    /// Runs one trial.
    ///
    /// A panic raised by the target is not recovered: the working copy and any
    /// handle are released first, then the original payload is resumed so the
    /// engine's crash reporting sees it.
    pub fn test_one_input(&self, data: &[u8]) -> TrialStatus {
        let Some(copy) = TerminatedCopy::truncating(data) else {
            trace!("empty input, skipping trial");
            return TrialStatus::Skip;
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let guard = HandleGuard::new(&self.target, self.target.parse(copy.as_c_str()));
            guard.release()
        }));

        match result {
            Ok(released) => {
                trace!(len = data.len(), released, "trial completed");
                drop(copy);
                TrialStatus::Completed
            }
            Err(payload) => {
                warn!(
                    len = data.len(),
                    fault = %panic_message(payload.as_ref()),
                    "target faulted, resources released, re-raising"
                );
                drop(copy);
                panic::resume_unwind(payload)
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic type".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::ffi::CStr;

    /// Records every call; returns a handle unless the text starts with `!`,
    /// and panics when it starts with `PANIC`.
    #[derive(Default)]
    struct RecordingTarget {
        parsed: RefCell<Vec<Vec<u8>>>,
        released: RefCell<Vec<usize>>,
        next_id: RefCell<usize>,
    }

    impl Target for RecordingTarget {
        type Handle = usize;

        fn parse(&self, text: &CStr) -> Option<usize> {
            let bytes = text.to_bytes().to_vec();
            self.parsed.borrow_mut().push(bytes.clone());
            if bytes.starts_with(b"PANIC") {
                panic!("Boom!");
            }
            if bytes.starts_with(b"!") {
                return None;
            }
            let mut next = self.next_id.borrow_mut();
            *next += 1;
            Some(*next)
        }

        fn release(&self, handle: usize) {
            self.released.borrow_mut().push(handle);
        }
    }

    /// Panics after handing out a handle, from inside `release`.
    struct FaultOnReleaseTarget {
        released: RefCell<usize>,
    }

    impl Target for FaultOnReleaseTarget {
        type Handle = ();

        fn parse(&self, _text: &CStr) -> Option<()> {
            Some(())
        }

        fn release(&self, _handle: ()) {
            *self.released.borrow_mut() += 1;
            panic!("release fault");
        }
    }

    #[test]
    fn empty_input_is_skipped_without_parsing() {
        let feeder = InputFeeder::new(RecordingTarget::default());
        assert_eq!(feeder.test_one_input(b""), TrialStatus::Skip);
        assert!(feeder.target().parsed.borrow().is_empty());
        assert!(feeder.target().released.borrow().is_empty());
    }

    #[test]
    fn single_byte_input_reaches_parser_as_empty_string() {
        let feeder = InputFeeder::new(RecordingTarget::default());
        assert_eq!(feeder.test_one_input(b"A"), TrialStatus::Completed);
        assert_eq!(*feeder.target().parsed.borrow(), vec![Vec::<u8>::new()]);
    }

    #[test]
    fn last_byte_is_overwritten_by_terminator() {
        let feeder = InputFeeder::new(RecordingTarget::default());
        feeder.test_one_input(b"a,b,c");
        assert_eq!(*feeder.target().parsed.borrow(), vec![b"a,b,".to_vec()]);
    }

    #[test]
    fn non_null_handle_is_released_once() {
        let feeder = InputFeeder::new(RecordingTarget::default());
        feeder.test_one_input(b"track\n");
        feeder.test_one_input(b"track\n");
        assert_eq!(*feeder.target().released.borrow(), vec![1, 2]);
    }

    #[test]
    fn null_handle_is_not_released() {
        let feeder = InputFeeder::new(RecordingTarget::default());
        assert_eq!(feeder.test_one_input(b"!bad\n"), TrialStatus::Completed);
        assert_eq!(feeder.target().parsed.borrow().len(), 1);
        assert!(feeder.target().released.borrow().is_empty());
    }

    #[test]
    fn target_panic_is_re_raised_unchanged() {
        let target = RecordingTarget::default();
        let feeder = InputFeeder::new(&target);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| feeder.test_one_input(b"PANIC!")));
        let payload = outcome.expect_err("fault must propagate");
        assert_eq!(panic_message(payload.as_ref()), "Boom!");
        assert_eq!(target.parsed.borrow().len(), 1);
        assert!(target.released.borrow().is_empty());
    }

    #[test]
    fn fault_during_release_does_not_release_twice() {
        let target = FaultOnReleaseTarget {
            released: RefCell::new(0),
        };
        let feeder = InputFeeder::new(&target);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| feeder.test_one_input(b"xy")));
        assert!(outcome.is_err());
        assert_eq!(*target.released.borrow(), 1);
    }

    #[test]
    fn trial_status_raw_codes() {
        assert_eq!(TrialStatus::Completed.as_raw(), 0);
        assert_eq!(TrialStatus::Skip.as_raw(), -1);
    }

    proptest! {
        #[test]
        fn parse_and_release_counts_hold_for_any_input(
            inputs in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..64), 1..16)
        ) {
            let feeder = InputFeeder::new(RecordingTarget::default());
            let mut expected_parses = 0usize;
            for input in &inputs {
                let before = feeder.target().parsed.borrow().len();
                let status = feeder.test_one_input(input);
                let after = feeder.target().parsed.borrow().len();
                if input.is_empty() {
                    prop_assert_eq!(status, TrialStatus::Skip);
                    prop_assert_eq!(after, before);
                } else {
                    prop_assert_eq!(status, TrialStatus::Completed);
                    prop_assert_eq!(after, before + 1);
                    expected_parses += 1;
                }
            }
            let parsed = feeder.target().parsed.borrow();
            let released = feeder.target().released.borrow();
            prop_assert_eq!(parsed.len(), expected_parses);
            let non_null = parsed.iter().filter(|p| !p.starts_with(b"!")).count();
            prop_assert_eq!(released.len(), non_null);
            let mut unique = released.clone();
            unique.dedup();
            prop_assert_eq!(unique.len(), released.len());
        }

        #[test]
        fn parser_sees_input_minus_last_byte_up_to_first_nul(
            input in proptest::collection::vec(any::<u8>(), 1..64)
        ) {
            let feeder = InputFeeder::new(RecordingTarget::default());
            feeder.test_one_input(&input);
            let head = &input[..input.len() - 1];
            let expected: Vec<u8> = head.iter().copied().take_while(|b| *b != 0).collect();
            prop_assert_eq!(&feeder.target().parsed.borrow()[0], &expected);
        }
    }
}
