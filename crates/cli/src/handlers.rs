//! Built-in message handlers for the `run` command.
//!
//! - default: log every message
//! - `PING`: answer `PONG <rest>` over the transport write path

use std::sync::Arc;

use contracts::{is_whitespace, Transport};
use dispatcher::{handler_fn, HandlerError, HandlerRegistry, MessageHandler};
use tracing::{debug, info};

/// Registry with the built-in handlers; replies end with `delimiter`
pub fn builtin_registry<T>(transport: Arc<T>, delimiter: u8) -> HandlerRegistry
where
    T: Transport + Sync + 'static,
{
    HandlerRegistry::builder()
        .register("PING", ping_handler(transport, delimiter))
        .set_default(log_handler())
        .build()
}

/// Logs each message it receives
pub fn log_handler() -> MessageHandler {
    handler_fn(|message: String| async move {
        info!(message = %message, "Message received");
        Ok::<(), HandlerError>(())
    })
}

/// Answers `PING <rest>` with `PONG <rest>`
pub fn ping_handler<T>(transport: Arc<T>, delimiter: u8) -> MessageHandler
where
    T: Transport + Sync + 'static,
{
    handler_fn(move |message: String| {
        let transport = transport.clone();
        async move {
            let reply = pong_reply(&message, delimiter);
            transport.write(&reply).await?;
            debug!(port = %transport.id(), len = reply.len(), "PONG sent");
            Ok::<(), HandlerError>(())
        }
    })
}

/// `PONG`, the text after the first whitespace (if any) and the delimiter
fn pong_reply(message: &str, delimiter: u8) -> Vec<u8> {
    let rest = message
        .split_once(|c: char| c.is_ascii() && is_whitespace(c as u8))
        .map(|(_, rest)| rest);

    let mut reply = b"PONG".to_vec();
    if let Some(rest) = rest {
        reply.push(b' ');
        reply.extend_from_slice(rest.as_bytes());
    }
    reply.push(delimiter);
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Frame;
    use framing::MockTransport;

    #[test]
    fn test_pong_reply() {
        assert_eq!(pong_reply("PING 123", b'\n'), b"PONG 123\n");
        assert_eq!(pong_reply("PING", b'\n'), b"PONG\n");
        assert_eq!(pong_reply("PING a b\tc", b';'), b"PONG a b\tc;");
        assert_eq!(pong_reply("PING\tx", b'\n'), b"PONG x\n");
    }

    #[tokio::test]
    async fn test_ping_writes_pong() {
        let (transport, handle) = MockTransport::new("mock0");
        let registry = builtin_registry(Arc::new(transport), b'\n');

        let frame = Frame::new(0, &b"PING 42"[..]);
        let handler = registry.resolve(&frame.payload).unwrap();
        handler(frame.text().into_owned()).await.unwrap();

        assert_eq!(handle.stats().written(), b"PONG 42\n");
    }

    #[tokio::test]
    async fn test_other_prefixes_go_to_log_handler() {
        let (transport, handle) = MockTransport::new("mock0");
        let registry = builtin_registry(Arc::new(transport), b'\n');

        assert!(registry.has_default());
        let handler = registry.resolve(b"STATUS ok").unwrap();
        handler("STATUS ok".to_string()).await.unwrap();
        assert!(handle.stats().written().is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_is_handler_error() {
        let (transport, _handle) = MockTransport::new("mock0");
        let transport = Arc::new(transport);
        transport.close().await.unwrap();

        let handler = ping_handler(transport, b'\n');
        let err = handler("PING 1".to_string()).await.unwrap_err();
        assert!(matches!(err, HandlerError::Transport(_)));
    }
}
