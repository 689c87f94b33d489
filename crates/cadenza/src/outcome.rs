//! Conversion of uncontrolled failures into `Result`s.
//!
//! Everything fallible in this crate returns `std::result::Result`. The one
//! thing a `Result` cannot carry on its own is a panic, so operations that cross
//! into foreign code (host transports, command handlers) are run through
//! [`capture`] / [`capture_async`], which fold returned errors *and* panics into
//! a single [`Raised`] value before handing it to a translator.

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

/// Whatever an operation "threw".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Raised<R> {
    /// The operation returned an error value
    Error(R),
    /// The operation panicked; carries the panic message
    Panic(String),
    /// The task running the operation was aborted before it finished
    Aborted,
}

impl<R> Raised<R> {
    /// The returned error, if the failure was an ordinary one.
    pub fn into_error(self) -> Option<R> {
        match self {
            Raised::Error(e) => Some(e),
            Raised::Panic(_) | Raised::Aborted => None,
        }
    }
}

/// Run `op`, passing any failure through unchanged as a [`Raised`].
pub fn capture_raw<T, R>(op: impl FnOnce() -> Result<T, R>) -> Result<T, Raised<R>> {
    match panic::catch_unwind(AssertUnwindSafe(op)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(Raised::Error(error)),
        Err(payload) => Err(Raised::Panic(panic_message(payload.as_ref()))),
    }
}

/// Run `op` and translate any failure with `translate`.
pub fn capture<T, R, E>(
    op: impl FnOnce() -> Result<T, R>,
    translate: impl FnOnce(Raised<R>) -> E,
) -> Result<T, E> {
    capture_raw(op).map_err(translate)
}

/// Async form of [`capture_raw`].
///
/// The future runs on its own tokio task so a panic is contained there. Must be
/// called from within a tokio runtime.
pub async fn capture_async_raw<T, R, F>(op: F) -> Result<T, Raised<R>>
where
    F: Future<Output = Result<T, R>> + Send + 'static,
    T: Send + 'static,
    R: Send + 'static,
{
    match tokio::spawn(op).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(Raised::Error(error)),
        Err(join_err) if join_err.is_panic() => {
            let payload = join_err.into_panic();
            Err(Raised::Panic(panic_message(payload.as_ref())))
        }
        Err(_) => Err(Raised::Aborted),
    }
}

/// Async form of [`capture`].
pub async fn capture_async<T, R, E, F>(op: F, translate: impl FnOnce(Raised<R>) -> E) -> Result<T, E>
where
    F: Future<Output = Result<T, R>> + Send + 'static,
    T: Send + 'static,
    R: Send + 'static,
{
    capture_async_raw(op).await.map_err(translate)
}

pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_sides_are_exclusive() {
        let ok: Result<u32, String> = Ok(7);
        let err: Result<u32, String> = Err("e".to_string());

        assert!(ok.is_ok() && !ok.is_err());
        assert!(err.is_err() && !err.is_ok());
        assert_eq!(ok.unwrap(), 7);
        assert_eq!(err.unwrap_err(), "e");
    }

    #[test]
    #[should_panic]
    fn test_unwrap_on_failure_is_a_fault() {
        let err: Result<u32, String> = Err("nope".to_string());
        err.unwrap();
    }

    #[test]
    fn test_capture_translates_returned_error() {
        let result: Result<u32, String> = capture(
            || Err::<u32, i32>(42),
            |raised| format!("{:?}", raised),
        );
        assert_eq!(result.unwrap_err(), "Error(42)");
    }

    #[test]
    fn test_capture_contains_panic() {
        let result = capture_raw(|| -> Result<u32, ()> { panic!("exploded") });
        assert_eq!(result.unwrap_err(), Raised::Panic("exploded".to_string()));
    }

    #[test]
    fn test_capture_passes_success_through() {
        let result = capture(|| Ok::<_, ()>("value"), |_| "translated");
        assert_eq!(result, Ok("value"));
    }

    #[tokio::test]
    async fn test_capture_async_contains_panic() {
        let result = capture_async_raw(async {
            if true {
                panic!("async {}", "boom");
            }
            Ok::<u32, ()>(1)
        })
        .await;
        assert_eq!(result.unwrap_err(), Raised::Panic("async boom".to_string()));
    }

    #[tokio::test]
    async fn test_capture_async_translates_error() {
        let result = capture_async(async { Err::<(), _>("raw") }, |raised| {
            raised.into_error().map(str::len).unwrap_or_default()
        })
        .await;
        assert_eq!(result, Err(3));
    }
}
