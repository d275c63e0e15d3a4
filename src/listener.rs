use std::io;

use log::warn;
use tokio_stream::{Stream, StreamExt};

use crate::config::ACCEPT_RETRY_DELAY;

/// Next accepted connection from `incoming`, or `None` once it ends.
///
/// Accept errors such as running out of file descriptors are logged and
/// retried after [`ACCEPT_RETRY_DELAY`].
pub async fn next_connection<S, T>(incoming: &mut S, label: &str) -> Option<T>
where
    S: Stream<Item = io::Result<T>> + Unpin,
{
    loop {
        match incoming.next().await? {
            Ok(conn) => return Some(conn),
            Err(err) => {
                warn!("{}: accept failed: {}", label, err);
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn emfile() -> io::Error {
        io::Error::new(io::ErrorKind::Other, "too many open files")
    }

    #[tokio::test]
    async fn test_accept_errors_back_off() {
        let mut incoming = tokio_stream::iter(vec![Err(emfile()), Err(emfile()), Ok(7u32)]);

        let started = Instant::now();
        let conn = next_connection(&mut incoming, "test").await;

        assert_eq!(conn, Some(7));
        assert!(started.elapsed() >= ACCEPT_RETRY_DELAY * 2);
    }

    #[tokio::test]
    async fn test_end_of_stream() {
        let mut incoming = tokio_stream::iter(vec![Err::<u32, _>(emfile())]);
        assert_eq!(next_connection(&mut incoming, "test").await, None);
    }
}
