use crate::Error;

/// An owned wrapper giving a component the explicit release lifecycle a
/// binding layer expects.
///
/// Releasing drops the inner value, which zeroizes whatever secret
/// material it held. Every access after release fails with
/// [`Error::AlreadyReleased`] instead of aborting, so a caller holding a
/// stale reference gets an error rather than undefined behaviour.
pub struct Handle<T> {
    inner: Option<T>,
}

impl<T> Handle<T> {
    pub fn new(value: T) -> Self {
        Self { inner: Some(value) }
    }

    /// Shared access to the wrapped component.
    pub fn get(&self) -> Result<&T, Error> {
        self.inner.as_ref().ok_or(Error::AlreadyReleased)
    }

    /// Exclusive access to the wrapped component.
    pub fn get_mut(&mut self) -> Result<&mut T, Error> {
        self.inner.as_mut().ok_or(Error::AlreadyReleased)
    }

    /// Drops the wrapped component, zeroizing its secrets.
    ///
    /// Releasing an already-released handle is a no-op.
    pub fn release(&mut self) {
        self.inner = None;
    }

    /// Whether the component has been released.
    pub fn is_released(&self) -> bool {
        self.inner.is_none()
    }
}

impl<T> From<T> for Handle<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}
