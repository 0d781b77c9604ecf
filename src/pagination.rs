// SPDX-License-Identifier: GPL-3.0-or-later

//! A combinator for paginated endpoints: repeatedly issue a request for
//! the next page, flattening the pages into a single stream of items,
//! until the server reports there is nothing left to fetch.

use std::collections::VecDeque;
use std::future::Future;

use futures::stream::unfold;
use futures::Stream;

use crate::error::Error;


struct State<T, F> {
  fetch: F,
  cursor: Option<String>,
  buffer: VecDeque<T>,
  done: bool,
}

/// Turn a page-fetching closure into a flat [`Stream`] of items.
///
/// `fetch` is called with `None` for the first page and with the
/// previous page's cursor (its second return component) afterwards; it
/// returns the page's items together with the cursor for the next page,
/// or `None` once there is nothing left to fetch.
///
/// If the server ever reports the same cursor twice in a row the
/// sequence is treated as malformed (it would otherwise loop forever):
/// the stream yields one [`Kind::InvalidRequest`][crate::error::Kind::InvalidRequest]
/// error and then terminates.
pub(crate) fn send_paginating<T, F, Fut>(fetch: F) -> impl Stream<Item = Result<T, Error>>
where
  T: Unpin,
  F: FnMut(Option<String>) -> Fut + Unpin,
  Fut: Future<Output = Result<(Vec<T>, Option<String>), Error>>,
{
  let state = State {
    fetch,
    cursor: None,
    buffer: VecDeque::new(),
    done: false,
  };

  unfold(state, |mut state| async move {
    loop {
      if let Some(item) = state.buffer.pop_front() {
        return Some((Ok(item), state))
      }
      if state.done {
        return None
      }

      match (state.fetch)(state.cursor.clone()).await {
        Ok((items, next)) => {
          if next.is_some() && next == state.cursor {
            state.done = true;
            let err = Error::invalid_request("malformed paginated request")
              .with_recovery("the server returned the same page cursor twice in a row");
            return Some((Err(err), state))
          }

          state.done = next.is_none();
          state.cursor = next;
          if items.is_empty() {
            if state.done {
              return None
            }
            continue
          }
          state.buffer.extend(items);
        },
        Err(err) => {
          state.done = true;
          return Some((Err(err), state))
        },
      }
    }
  })
}


#[cfg(test)]
mod tests {
  use super::*;

  use futures::pin_mut;
  use futures::StreamExt;

  #[tokio::test]
  async fn flattens_pages_in_order() {
    let mut pages = vec![
      (vec![1, 2], Some("page-2".to_string())),
      (vec![3], Some("page-3".to_string())),
      (vec![4, 5], None),
    ]
    .into_iter();

    let stream = send_paginating(move |_cursor| {
      let page = pages.next().unwrap();
      async move { Ok(page) }
    });
    pin_mut!(stream);

    let items: Vec<i32> = stream.map(Result::unwrap).collect().await;
    assert_eq!(items, vec![1, 2, 3, 4, 5]);
  }

  #[tokio::test]
  async fn empty_first_page_with_no_cursor_terminates_immediately() {
    let stream = send_paginating(|_cursor| async move { Ok((Vec::<i32>::new(), None)) });
    pin_mut!(stream);
    assert!(stream.next().await.is_none());
  }

  #[tokio::test]
  async fn repeated_cursor_yields_single_error_then_stops() {
    let stream = send_paginating(|_cursor| async move {
      Ok((vec![1], Some("same".to_string())))
    });
    pin_mut!(stream);

    let first = stream.next().await.unwrap();
    assert_eq!(first.unwrap(), 1);

    let second = stream.next().await.unwrap();
    let err = second.unwrap_err();
    assert_eq!(err.kind(), crate::error::Kind::InvalidRequest);

    assert!(stream.next().await.is_none());
  }

  #[tokio::test]
  async fn fetch_error_is_propagated_and_terminal() {
    let stream =
      send_paginating(|_cursor| async move { Err(Error::call_failed("boom")) });
    pin_mut!(stream);

    let err = stream.next().await.unwrap().unwrap_err();
    assert_eq!(err.kind(), crate::error::Kind::CallFailed);
    assert!(stream.next().await.is_none());
  }
}
