use crate::broker::Broker;
use anyhow::Result;
use burrow_client::{handler_fn, Channel, ClientError, Connection, ConsumerHandler, IncomingMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[allow(dead_code)]
pub async fn connect() -> Result<(Broker, Connection, Channel)> {
    burrow_client::setup_logger();

    let broker = Broker::new();
    let connection = broker.connect().await?;
    let channel = connection.channel().await?;

    Ok((broker, connection, channel))
}

#[allow(dead_code)]
pub(crate) fn to_client_error<T: std::fmt::Debug>(result: Result<T>) -> ClientError {
    result.unwrap_err().downcast::<ClientError>().unwrap()
}

#[allow(dead_code)]
pub fn unique_name(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
}

/// Handler which passes every delivered message to the returned receiver.
#[allow(dead_code)]
pub fn collector() -> (Arc<dyn ConsumerHandler>, mpsc::UnboundedReceiver<IncomingMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();

    let handler = handler_fn(move |message| {
        let _ = tx.send(message);
    });

    (handler, rx)
}

#[allow(dead_code)]
pub async fn recv(rx: &mut mpsc::UnboundedReceiver<IncomingMessage>) -> IncomingMessage {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("No message in 2 seconds")
        .unwrap()
}

/// Checks that nothing arrives in a short while. A receiver closed without a message counts as
/// silent, that is what a cancelled consumer leaves behind.
#[allow(dead_code)]
pub async fn assert_silent(rx: &mut mpsc::UnboundedReceiver<IncomingMessage>) {
    let outcome = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;

    assert!(
        matches!(outcome, Err(_) | Ok(None)),
        "Unexpected message {:?}",
        outcome
    );
}

/// Polls `f` until it returns true or a second is elapsed.
#[allow(dead_code)]
pub async fn eventually<F: Fn() -> bool>(f: F) -> bool {
    for _ in 0..50 {
        if f() {
            return true;
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    f()
}
