//! Bounded retry: a pure decision function plus a loop that drives it.
//!
//! `RetryPolicy::decide` looks only at the attempt number and the error, so it
//! can be tested without a transport or a clock. `RetryPolicy::run` composes it
//! with an operation and a `Sleeper`.

use std::time::Duration;

/// Errors that know whether another attempt could help.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

/// Why `RetryPolicy::run` gave up.
#[derive(Debug)]
pub enum RetryFailure<E> {
    /// The error was not retryable; no budget was spent on it.
    Fatal(E),
    /// Every attempt failed with a retryable error.
    Exhausted { attempts: u32, last: E },
}

impl<E> RetryFailure<E> {
    pub fn into_last(self) -> E {
        match self {
            Self::Fatal(err) => err,
            Self::Exhausted { last, .. } => last,
        }
    }
}

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Blocks the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// `attempt` is 1-based: the number of attempts made so far, including
    /// the one that produced `err`.
    pub fn decide<E: Retryable>(&self, attempt: u32, err: &E) -> RetryDecision {
        if !err.is_retryable() || attempt >= self.max_attempts {
            RetryDecision::Fail
        } else {
            RetryDecision::RetryAfter(self.delay)
        }
    }

    pub fn run<T, E, F>(&self, sleeper: &dyn Sleeper, mut op: F) -> Result<T, RetryFailure<E>>
    where
        E: Retryable,
        F: FnMut(u32) -> Result<T, E>,
    {
        let mut attempt = 1;
        loop {
            let err = match op(attempt) {
                Ok(v) => return Ok(v),
                Err(err) => err,
            };
            match self.decide(attempt, &err) {
                RetryDecision::RetryAfter(delay) => {
                    sleeper.sleep(delay);
                    attempt += 1;
                }
                RetryDecision::Fail if err.is_retryable() => {
                    return Err(RetryFailure::Exhausted {
                        attempts: attempt,
                        last: err,
                    });
                }
                RetryDecision::Fail => return Err(RetryFailure::Fatal(err)),
            }
        }
    }
}
