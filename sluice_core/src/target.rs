use std::ffi::CStr;

/// The library under test, reached only through its parse and release entry points.
///
/// `parse` returning `None` is the null-handle case: the target rejected the
/// input and there is nothing to release.
pub trait Target {
    /// Opaque object produced by a successful parse.
    type Handle;

    fn parse(&self, text: &CStr) -> Option<Self::Handle>;

    /// Releases a handle previously returned by `parse`. Called exactly once per handle.
    fn release(&self, handle: Self::Handle);
}

impl<T: Target + ?Sized> Target for &T {
    type Handle = T::Handle;

    fn parse(&self, text: &CStr) -> Option<Self::Handle> {
        (**self).parse(text)
    }

    fn release(&self, handle: Self::Handle) {
        (**self).release(handle)
    }
}

/// Owns a parse result until it is released.
///
/// The handle is released on drop, so the unwinding path of a target fault
/// frees it the same way a normal return does. `release` consumes the guard,
/// which makes a second release unrepresentable.
pub struct HandleGuard<'t, T: Target + ?Sized> {
    target: &'t T,
    handle: Option<T::Handle>,
}

impl<'t, T: Target + ?Sized> HandleGuard<'t, T> {
    pub fn new(target: &'t T, handle: Option<T::Handle>) -> Self {
        Self { target, handle }
    }

    /// Releases the handle now; returns whether there was one.
    pub fn release(mut self) -> bool {
        self.release_inner()
    }

    fn release_inner(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                self.target.release(handle);
                true
            }
            None => false,
        }
    }
}

impl<T: Target + ?Sized> Drop for HandleGuard<'_, T> {
    fn drop(&mut self) {
        self.release_inner();
    }
}

/// Working copy of a trial buffer handed to the target's string entry point.
///
/// The copy is `len + 1` bytes and the byte at `len - 1` is overwritten with
/// NUL, so the last input byte never reaches the parser. Downstream corpora
/// depend on this exact truncation; do not switch it to appending.
#[derive(Debug)]
pub struct TerminatedCopy {
    bytes: Vec<u8>,
}

impl TerminatedCopy {
    /// Returns `None` for an empty buffer, which has no last byte to overwrite.
    pub fn truncating(data: &[u8]) -> Option<Self> {
        let last = data.len().checked_sub(1)?;
        let mut bytes = vec![0u8; data.len() + 1];
        bytes[..data.len()].copy_from_slice(data);
        bytes[last] = 0;
        Some(Self { bytes })
    }

    /// The string the parser sees: everything up to the first NUL.
    pub fn as_c_str(&self) -> &CStr {
        // Byte `len - 1` is always NUL, so this cannot fail.
        CStr::from_bytes_until_nul(&self.bytes).unwrap_or_default()
    }
}
