use std::ffi::OsString;

/// Sets an environment variable for the lifetime of the guard, restoring the previous value on drop.
///
/// Intended for tests; mutating the environment is not thread safe.
pub struct EnvVarGuard {
    name: String,
    previous: Option<OsString>,
}

impl EnvVarGuard {
    pub fn set(name: impl Into<String>, value: impl AsRef<str>) -> Self {
        let name = name.into();
        let previous = std::env::var_os(&name);
        // SAFETY: only used from tests that own the variable name.
        unsafe { std::env::set_var(&name, value.as_ref()) };
        Self { name, previous }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        // SAFETY: see `EnvVarGuard::set`.
        unsafe {
            match self.previous.take() {
                Some(v) => std::env::set_var(&self.name, v),
                None => std::env::remove_var(&self.name),
            }
        }
    }
}
