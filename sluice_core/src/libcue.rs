//! Binding to the system libcue cue sheet parser.

use crate::target::Target;
use std::ffi::{CStr, c_char};
use std::ptr::NonNull;

/// Opaque `Cd` from libcue.
#[repr(C)]
pub struct Cd {
    _private: [u8; 0],
}

#[link(name = "cue")]
unsafe extern "C" {
    fn cue_parse_string(string: *const c_char) -> *mut Cd;
    fn cd_delete(cd: *mut Cd);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LibCue;

impl Target for LibCue {
    type Handle = NonNull<Cd>;

    fn parse(&self, text: &CStr) -> Option<NonNull<Cd>> {
        // SAFETY: `text` is NUL-terminated and outlives the call; libcue does
        // not keep the pointer.
        NonNull::new(unsafe { cue_parse_string(text.as_ptr()) })
    }

    fn release(&self, handle: NonNull<Cd>) {
        // SAFETY: `handle` came from `cue_parse_string` and `Target::release`
        // receives each handle once, by value.
        unsafe { cd_delete(handle.as_ptr()) }
    }
}
