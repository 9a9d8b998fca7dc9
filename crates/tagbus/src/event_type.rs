//! Type descriptors and the narrowing check applied by the type filter.

use std::any::{Any, type_name};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::envelope::Payload;

type Narrow<T> = dyn Fn(&Payload) -> Option<Arc<T>> + Send + Sync;

/// Describes the payload type a subscription expects and how to view an
/// erased payload as that type.
///
/// Narrowing is a checked view, never a coercion: a payload that does not
/// narrow is filtered out of the subscription.
///
/// ```rust
/// use std::sync::Arc;
/// use tagbus::{EventType, Payload};
///
/// let strings = EventType::<String>::exact();
/// let payload: Payload = Arc::new(String::from("hello"));
/// assert_eq!(strings.narrow(&payload).as_deref().map(String::as_str), Some("hello"));
///
/// let number: Payload = Arc::new(42_i32);
/// assert!(strings.narrow(&number).is_none());
/// ```
///
/// A custom narrowing can present several concrete payloads as one view:
///
/// ```rust
/// use std::fmt::Display;
/// use std::sync::Arc;
/// use tagbus::{EventType, Payload};
///
/// let displayable = EventType::<dyn Display + Send + Sync>::narrowing("display", |p: &Payload| {
///     if let Ok(s) = Arc::clone(p).downcast::<String>() {
///         return Some(s as Arc<dyn Display + Send + Sync>);
///     }
///     Arc::clone(p).downcast::<i32>().ok().map(|n| n as Arc<dyn Display + Send + Sync>)
/// });
///
/// let payload: Payload = Arc::new(7_i32);
/// assert_eq!(displayable.narrow(&payload).unwrap().to_string(), "7");
/// ```
pub struct EventType<T: ?Sized> {
    name: Cow<'static, str>,
    narrow: Arc<Narrow<T>>,
}

impl<T: Any + Send + Sync> EventType<T> {
    /// Accept payloads whose concrete type is exactly `T`.
    #[must_use]
    pub fn exact() -> Self {
        Self {
            name: Cow::Borrowed(type_name::<T>()),
            narrow: Arc::new(|payload: &Payload| Arc::clone(payload).downcast::<T>().ok()),
        }
    }
}

impl<T: ?Sized> EventType<T> {
    /// Accept payloads for which `narrow` returns a view.
    pub fn narrowing<F>(name: impl Into<Cow<'static, str>>, narrow: F) -> Self
    where
        F: Fn(&Payload) -> Option<Arc<T>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            narrow: Arc::new(narrow),
        }
    }

    /// Human-readable name used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// View `payload` as `T`, or `None` on a type mismatch.
    #[must_use]
    pub fn narrow(&self, payload: &Payload) -> Option<Arc<T>> {
        (self.narrow)(payload)
    }

    /// Whether `payload` narrows to `T`.
    #[must_use]
    pub fn accepts(&self, payload: &Payload) -> bool {
        self.narrow(payload).is_some()
    }
}

impl<T: ?Sized> Clone for EventType<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            narrow: Arc::clone(&self.narrow),
        }
    }
}

impl<T: ?Sized> fmt::Debug for EventType<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventType").field(&self.name).finish()
    }
}
