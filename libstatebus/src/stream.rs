//! Streams handed out by the bus and by stores
//!
//! A [`Feed`] is the receiving end of one listener registration: dropping
//! it unregisters the listener. [`Distinct`] suppresses consecutive values
//! that are [`ShallowEq`]-equal and can wrap any `Unpin` stream through
//! [`DistinctExt::distinct_until_changed`].

use std::pin::Pin;
use std::task::{ready, Context, Poll};

use futures::channel::mpsc::UnboundedReceiver;
use futures::{Stream, StreamExt};

use crate::compare::ShallowEq;
use crate::subscription::Subscription;

/// Values delivered to one listener registration
///
/// The stream ends when the source closes (for a store, on dispose).
pub struct Feed<T> {
    rx: UnboundedReceiver<T>,
    _subscription: Subscription,
}

impl<T> Feed<T> {
    pub(crate) fn new(rx: UnboundedReceiver<T>, subscription: Subscription) -> Self {
        Self {
            rx,
            _subscription: subscription,
        }
    }
}

impl<T> Stream for Feed<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_next_unpin(cx)
    }
}

/// Change-filtered wrapper around a stream
pub struct Distinct<St: Stream> {
    inner: St,
    last: Option<St::Item>,
}

// `last` is never pinned, so only the inner stream decides.
impl<St: Stream + Unpin> Unpin for Distinct<St> {}

impl<St> Stream for Distinct<St>
where
    St: Stream + Unpin,
    St::Item: ShallowEq + Clone,
{
    type Item = St::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match ready!(this.inner.poll_next_unpin(cx)) {
                Some(value) => {
                    let repeated = this
                        .last
                        .as_ref()
                        .is_some_and(|previous| previous.shallow_eq(&value));
                    if repeated {
                        continue;
                    }
                    this.last = Some(value.clone());
                    return Poll::Ready(Some(value));
                }
                None => return Poll::Ready(None),
            }
        }
    }
}

pub trait DistinctExt: Stream + Sized {
    /// Skip values shallow-equal to the last one yielded
    fn distinct_until_changed(self) -> Distinct<Self> {
        Distinct {
            inner: self,
            last: None,
        }
    }
}

impl<St: Stream> DistinctExt for St {}
