use crate::broker::Broker;
use crate::helper;
use anyhow::anyhow;
use burrow_client::*;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;

async fn setup(body: &str) -> (Broker, Connection, Queue) {
    let (broker, connection, channel) = helper::connect().await.unwrap();
    let queue = channel
        .declare_queue(&helper::unique_name("process"), QueueDeclareOpts::default())
        .await
        .unwrap();

    channel
        .default_exchange()
        .publish(&Message::new(body), &queue.name)
        .await
        .unwrap();

    (broker, connection, queue)
}

#[tokio::test]
async fn test_second_disposition_fails_locally() {
    let (broker, _connection, queue) = setup("once").await;
    let message = queue.get(false, None).await.unwrap();

    assert!(!message.locked());
    assert!(message.ack().await.unwrap());
    assert!(message.locked());

    let err = helper::to_client_error(message.ack().await);

    assert_eq!(err.kind, ErrorKind::MessageProcess);

    let err = helper::to_client_error(message.reject(true).await);

    assert_eq!(err.kind, ErrorKind::MessageProcess);

    let err = helper::to_client_error(message.nack(false).await);

    assert_eq!(err.kind, ErrorKind::MessageProcess);

    // a round trip on the channel makes sure every frame reached the broker
    queue.purge().await.unwrap();

    assert_eq!(broker.dispositions(), 1);
}

#[tokio::test]
async fn test_reject_then_ack_fails() {
    let (broker, _connection, queue) = setup("rejected").await;
    let message = queue.get(false, None).await.unwrap();

    message.reject(false).await.unwrap();

    let err = helper::to_client_error(message.ack().await);

    assert_eq!(err.kind, ErrorKind::MessageProcess);

    queue.purge().await.unwrap();

    assert_eq!(broker.dispositions(), 1);
    assert_eq!(broker.queue_len(&queue.name), Some(0));
}

#[tokio::test]
async fn test_no_ack_message_cannot_be_rejected() {
    let (broker, _connection, queue) = setup("settled").await;
    let message = queue.get(true, None).await.unwrap();

    assert!(!message.ack().await.unwrap());
    assert!(!message.locked());

    let err = helper::to_client_error(message.reject(false).await);

    assert_eq!(err.kind, ErrorKind::NotAckable);

    let err = helper::to_client_error(message.nack(true).await);

    assert_eq!(err.kind, ErrorKind::NotAckable);

    let outcome = message
        .process(ProcessOptions::default(), async { Err::<(), _>(anyhow!("ignored")) })
        .await;

    assert!(outcome.is_err());

    queue.purge().await.unwrap();

    assert_eq!(broker.dispositions(), 0);
}

#[tokio::test]
async fn test_copy_is_not_locked() {
    let (_broker, _connection, queue) = setup("copied").await;
    let message = queue.get(false, None).await.unwrap();

    message.ack().await.unwrap();

    let copy = message.to_message();

    assert!(message.locked());
    assert!(!copy.locked());
    assert_eq!(copy.body, message.body);

    let outbound = Message::new("outbound");

    outbound.lock();

    let cloned = outbound.clone();

    assert!(outbound.locked());
    assert!(!cloned.locked());
}

#[tokio::test]
async fn test_process_acks_on_success() {
    let (broker, _connection, queue) = setup("work").await;
    let message = queue.get(false, None).await.unwrap();

    let value = message
        .process(ProcessOptions::default(), async { Ok(42) })
        .await
        .unwrap();

    assert_eq!(value, 42);
    assert!(message.locked());

    queue.purge().await.unwrap();

    assert_eq!(broker.dispositions(), 1);
    assert_eq!(broker.unacked(), 0);
}

#[tokio::test]
async fn test_process_failure_requeues() {
    let (broker, _connection, queue) = setup("retry me").await;
    let message = queue.get(false, None).await.unwrap();

    let err = message
        .process(ProcessOptions::default().requeue(true), async {
            Err::<(), _>(anyhow!("database is down"))
        })
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "database is down");
    assert!(message.locked());

    let message = queue.get(false, None).await.unwrap();

    assert_eq!(message.body, b"retry me");
    assert!(message.redelivered);
    assert_eq!(broker.dispositions(), 1);
}

#[tokio::test]
async fn test_process_failure_without_requeue_drops() {
    let (broker, _connection, queue) = setup("drop me").await;
    let message = queue.get(false, None).await.unwrap();

    let outcome = message
        .process(ProcessOptions::default(), async { Err::<(), _>(anyhow!("bad input")) })
        .await;

    assert!(outcome.is_err());

    queue.purge().await.unwrap();

    assert_eq!(broker.queue_len(&queue.name), Some(0));
    assert_eq!(broker.unacked(), 0);
}

#[tokio::test]
async fn test_redelivered_failure_is_left_to_the_broker() {
    let (broker, _connection, queue) = setup("poison").await;
    let options = ProcessOptions::default()
        .requeue(true)
        .reject_on_redelivered(true);

    // the first failure requeues as usual
    let message = queue.get(false, None).await.unwrap();

    assert!(!message.redelivered);
    assert!(message
        .process(options, async { Err::<(), _>(anyhow!("first failure")) })
        .await
        .is_err());

    // the second one leaves the message unsettled
    let message = queue.get(false, None).await.unwrap();

    assert!(message.redelivered);

    let err = message
        .process(options, async { Err::<(), _>(anyhow!("second failure")) })
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "second failure");
    assert!(!message.locked());

    queue.purge().await.unwrap();

    assert_eq!(broker.dispositions(), 1);
    assert_eq!(broker.unacked(), 1);
}

#[tokio::test]
async fn test_process_panic_rejects_and_resumes() {
    let (broker, _connection, queue) = setup("panicky").await;
    let message = queue.get(false, None).await.unwrap();

    let outcome = AssertUnwindSafe(message.process(ProcessOptions::default().requeue(true), async {
        if message.body.len() > 1 {
            panic!("handler bug");
        }

        Ok(())
    }))
    .catch_unwind()
    .await;

    assert!(outcome.is_err());
    assert!(message.locked());

    assert!(helper::eventually(|| broker.queue_len(&queue.name) == Some(1)).await);
    assert_eq!(broker.dispositions(), 1);
}

#[tokio::test]
async fn test_process_with_manual_disposition() {
    let (broker, _connection, queue) = setup("manual").await;

    queue
        .channel()
        .default_exchange()
        .publish(&Message::new("manual twice"), &queue.name)
        .await
        .unwrap();

    let message = queue.get(false, None).await.unwrap();

    message
        .process(ProcessOptions::default().ignore_processed(true), async {
            message.ack().await?;

            Ok(())
        })
        .await
        .unwrap();

    let other = queue.get(false, None).await.unwrap();

    let err = helper::to_client_error(
        other
            .process(ProcessOptions::default(), async {
                other.ack().await?;

                Ok(())
            })
            .await,
    );

    assert_eq!(err.kind, ErrorKind::MessageProcess);

    queue.purge().await.unwrap();

    assert_eq!(broker.dispositions(), 2);
}
