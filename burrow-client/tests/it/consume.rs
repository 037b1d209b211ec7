use crate::helper;
use crate::{body_str, message_from_string};
use burrow_client::*;
use std::time::Duration;
use tokio::sync::mpsc;

#[tokio::test]
async fn test_consume_and_ack() {
    let (broker, _connection, channel) = helper::connect().await.unwrap();
    let queue = channel
        .declare_queue(&helper::unique_name("consume"), QueueDeclareOpts::default())
        .await
        .unwrap();
    let (handler, mut rx) = helper::collector();

    let tag = queue.consume(handler, ConsumeOpts::default()).await.unwrap();

    assert!(tag.starts_with("burrow-"));

    for i in 0..3 {
        channel
            .default_exchange()
            .publish(&message_from_string(&format!("task {}", i)), &queue.name)
            .await
            .unwrap();
    }

    for i in 0..3 {
        let message = helper::recv(&mut rx).await;

        assert_eq!(body_str(&message), format!("task {}", i));
        assert_eq!(message.consumer_tag.as_deref(), Some(tag.as_str()));
        assert!(!message.synchronous);
        assert!(message.ack().await.unwrap());
    }

    assert!(helper::eventually(|| broker.unacked() == 0).await);
}

#[tokio::test]
async fn test_async_handler() {
    let (broker, _connection, channel) = helper::connect().await.unwrap();
    let queue = channel
        .declare_queue(&helper::unique_name("async"), QueueDeclareOpts::default())
        .await
        .unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handler = async_handler_fn(move |message| {
        let tx = tx.clone();

        async move {
            tokio::time::sleep(Duration::from_millis(10)).await;

            let acked = message.ack().await.unwrap();
            let _ = tx.send((body_str(&message), acked));
        }
    });

    queue.consume(handler, ConsumeOpts::default()).await.unwrap();

    channel
        .default_exchange()
        .publish(&Message::new("async work"), &queue.name)
        .await
        .unwrap();

    let (body, acked) = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(body, "async work");
    assert!(acked);
    assert!(helper::eventually(|| broker.unacked() == 0).await);
}

#[tokio::test]
async fn test_no_ack_consumer() {
    let (broker, _connection, channel) = helper::connect().await.unwrap();
    let queue = channel
        .declare_queue(&helper::unique_name("noack"), QueueDeclareOpts::default())
        .await
        .unwrap();
    let (handler, mut rx) = helper::collector();

    queue
        .consume(handler, ConsumeOpts::default().no_ack(true))
        .await
        .unwrap();

    channel
        .default_exchange()
        .publish(&Message::new("settled"), &queue.name)
        .await
        .unwrap();

    let message = helper::recv(&mut rx).await;

    assert!(message.no_ack());
    assert!(!message.ack().await.unwrap());

    let err = helper::to_client_error(message.reject(true).await);

    assert_eq!(err.kind, ErrorKind::NotAckable);
    assert_eq!(broker.unacked(), 0);
    assert_eq!(broker.dispositions(), 0);
}

#[tokio::test]
async fn test_round_robin_between_consumers() {
    let (_broker, _connection, channel) = helper::connect().await.unwrap();
    let queue = channel
        .declare_queue(&helper::unique_name("rr"), QueueDeclareOpts::default())
        .await
        .unwrap();
    let (first, mut first_rx) = helper::collector();
    let (second, mut second_rx) = helper::collector();

    let first_tag = queue.consume(first, ConsumeOpts::default().no_ack(true)).await.unwrap();
    let second_tag = queue.consume(second, ConsumeOpts::default().no_ack(true)).await.unwrap();

    assert_ne!(first_tag, second_tag);

    for i in 0..4 {
        channel
            .default_exchange()
            .publish(&Message::new(format!("{}", i)), &queue.name)
            .await
            .unwrap();
    }

    for _ in 0..2 {
        assert_eq!(helper::recv(&mut first_rx).await.consumer_tag, Some(first_tag.clone()));
        assert_eq!(helper::recv(&mut second_rx).await.consumer_tag, Some(second_tag.clone()));
    }
}

#[tokio::test]
async fn test_slow_handler_does_not_block_other_consumers() {
    let (_broker, connection, channel) = helper::connect().await.unwrap();
    let other = connection.channel().await.unwrap();
    let slow_queue = channel
        .declare_queue(&helper::unique_name("slow"), QueueDeclareOpts::default())
        .await
        .unwrap();
    let fast_queue = other
        .declare_queue(&helper::unique_name("fast"), QueueDeclareOpts::default())
        .await
        .unwrap();

    let slow = async_handler_fn(|message| async move {
        tokio::time::sleep(Duration::from_secs(10)).await;

        let _ = message.ack().await;
    });
    let (fast, mut fast_rx) = helper::collector();

    slow_queue.consume(slow, ConsumeOpts::default()).await.unwrap();
    fast_queue.consume(fast, ConsumeOpts::default()).await.unwrap();

    for i in 0..3 {
        channel
            .default_exchange()
            .publish(&Message::new(format!("slow {}", i)), &slow_queue.name)
            .await
            .unwrap();
    }

    other
        .default_exchange()
        .publish(&Message::new("fast"), &fast_queue.name)
        .await
        .unwrap();

    let message = helper::recv(&mut fast_rx).await;

    assert_eq!(message.body, b"fast");

    // commands on the busy channel are answered too
    assert_eq!(slow_queue.purge().await.unwrap(), 0);
}

#[tokio::test]
async fn test_prefetch_limits_unacked_deliveries() {
    let (_broker, _connection, channel) = helper::connect().await.unwrap();
    let queue = channel
        .declare_queue(&helper::unique_name("prefetch"), QueueDeclareOpts::default())
        .await
        .unwrap();
    let (handler, mut rx) = helper::collector();

    channel.set_qos(1, false).await.unwrap();

    for i in 0..3 {
        channel
            .default_exchange()
            .publish(&Message::new(format!("{}", i)), &queue.name)
            .await
            .unwrap();
    }

    queue.consume(handler, ConsumeOpts::default()).await.unwrap();

    let first = helper::recv(&mut rx).await;

    helper::assert_silent(&mut rx).await;

    first.ack().await.unwrap();

    let second = helper::recv(&mut rx).await;

    assert_eq!(second.body, b"1");

    helper::assert_silent(&mut rx).await;

    second.ack().await.unwrap();

    assert_eq!(helper::recv(&mut rx).await.body, b"2");
}

#[tokio::test]
async fn test_cancel_stops_deliveries() {
    let (broker, _connection, channel) = helper::connect().await.unwrap();
    let queue = channel
        .declare_queue(&helper::unique_name("cancel"), QueueDeclareOpts::default())
        .await
        .unwrap();
    let (handler, mut rx) = helper::collector();

    let tag = queue.consume(handler, ConsumeOpts::default().no_ack(true)).await.unwrap();

    assert_eq!(broker.consumer_count(&queue.name), 1);

    queue.cancel(&tag).await.unwrap();

    assert_eq!(broker.consumer_count(&queue.name), 0);

    channel
        .default_exchange()
        .publish(&Message::new("after cancel"), &queue.name)
        .await
        .unwrap();

    helper::assert_silent(&mut rx).await;

    assert_eq!(broker.queue_len(&queue.name), Some(1));
}

#[tokio::test]
async fn test_delivery_for_unknown_consumer_is_dropped() {
    let (broker, _connection, channel) = helper::connect().await.unwrap();
    let queue = channel
        .declare_queue(&helper::unique_name("ghost"), QueueDeclareOpts::default())
        .await
        .unwrap();
    let (handler, mut rx) = helper::collector();

    queue.consume(handler, ConsumeOpts::default().no_ack(true)).await.unwrap();

    broker.deliver_raw("amq.ctag-ghost", b"boo");

    helper::assert_silent(&mut rx).await;

    // the channel is fine afterwards
    channel
        .default_exchange()
        .publish(&Message::new("real"), &queue.name)
        .await
        .unwrap();

    assert_eq!(helper::recv(&mut rx).await.body, b"real");
}
