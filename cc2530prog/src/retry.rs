//! Bounded busy polling.
//!
//! Every wait in the debug protocol is an iteration budget rather than a
//! wall clock timeout: the condition is checked once, and up to `budget`
//! more times while it does not hold.

/// An iteration budget for busy polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget(u32);

/// The outcome of a successful poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Polled {
    /// How many checks failed before the condition held.
    pub retries: u32,
}

impl Polled {
    /// The condition already held on the first check.
    pub fn immediate(&self) -> bool {
        self.retries == 0
    }
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self(1000)
    }
}

impl RetryBudget {
    pub const fn new(retries: u32) -> Self {
        Self(retries)
    }

    pub const fn retries(self) -> u32 {
        self.0
    }

    /// Check `condition` until it returns `true`.
    ///
    /// `condition` receives the number of the check, starting at 0. Returns
    /// `None` once the budget is exhausted.
    pub fn poll<E>(
        self,
        mut condition: impl FnMut(u32) -> Result<bool, E>,
    ) -> Result<Option<Polled>, E> {
        for attempt in 0..=self.0 {
            if condition(attempt)? {
                return Ok(Some(Polled { retries: attempt }));
            }
        }

        Ok(None)
    }

    /// Like [`RetryBudget::poll`], but run `between` before every check after
    /// the first one.
    pub fn poll_with<E>(
        self,
        mut condition: impl FnMut() -> Result<bool, E>,
        mut between: impl FnMut() -> Result<(), E>,
    ) -> Result<Option<Polled>, E> {
        self.poll(|attempt| {
            if attempt > 0 {
                between()?;
            }
            condition()
        })
    }
}

/// Run `operation` on `state` up to `attempts` times, calling `recover` after
/// every failure that is followed by another attempt.
///
/// The last error is returned if no attempt succeeds.
pub fn with_attempts<S: ?Sized, T, E>(
    state: &mut S,
    attempts: u32,
    mut operation: impl FnMut(&mut S, u32) -> Result<T, E>,
    mut recover: impl FnMut(&mut S, &E) -> Result<(), E>,
) -> Result<T, E> {
    let attempts = attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation(state, attempt) {
            Ok(value) => return Ok(value),
            Err(error) if attempt + 1 < attempts => {
                recover(state, &error)?;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
