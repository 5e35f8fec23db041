//! Demo controllers
//!
//! - [`TodoController`]: the to-do list, its transient messages and the
//!   simulated save pipeline
//! - [`CounterController`]: an `i64` counter that reacts to `"inc"` and
//!   `"dec"` and mirrors the number of to-dos through a remote lookup

pub mod counter;
pub mod todo;

pub use counter::CounterController;
pub use todo::{
    HasMessage, Message, MessageKind, Todo, TodoController, TodoPatch, TodoState, Visibility,
};

use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::time::{sleep_until, Instant};

/// Delay every item by `by`, measured from its arrival
///
/// Items keep their order and their delays overlap, so two items that
/// arrive 10ms apart are released 10ms apart.
pub(crate) fn delay_each<St>(items: St, by: Duration) -> impl Stream<Item = St::Item> + Send
where
    St: Stream + Send,
    St::Item: Send + 'static,
{
    items
        .map(move |item| {
            let deadline = Instant::now() + by;
            async move {
                sleep_until(deadline).await;
                item
            }
        })
        .buffered(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[tokio::test(start_paused = true)]
    async fn test_delay_each_keeps_order() {
        let start = Instant::now();
        let delayed: Vec<u8> = delay_each(stream::iter(vec![1, 2, 3]), Duration::from_millis(100))
            .collect()
            .await;

        assert_eq!(delayed, vec![1, 2, 3]);
        // The three delays overlap rather than add up.
        assert!(start.elapsed() < Duration::from_millis(200));
    }
}
