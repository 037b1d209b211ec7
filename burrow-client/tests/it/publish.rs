use crate::broker::Broker;
use crate::helper;
use burrow_client::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[tokio::test]
async fn test_properties_round_trip() {
    let (_broker, _connection, channel) = helper::connect().await.unwrap();
    let queue = channel
        .declare_queue(&helper::unique_name("props"), QueueDeclareOpts::default())
        .await
        .unwrap();

    let mut nested = FieldTable::new();

    nested.insert("depth".to_string(), AMQPFieldValue::LongInt(2));

    let message = Message::new("{\"id\":42}")
        .content_type("application/json")
        .content_encoding("identity")
        .header("foo", "bar")
        .header("attempt", 3)
        .header("retry", true)
        .header("nested", nested)
        .persistent()
        .priority(5)
        .correlation_id("corr-1")
        .reply_to("replies")
        .expiration(Duration::from_secs(60))
        .message_id("msg-1")
        .timestamp(1_700_000_000)
        .message_type("order.created")
        .user_id("guest")
        .app_id("billing");

    channel
        .default_exchange()
        .publish(&message, &queue.name)
        .await
        .unwrap();

    let received = queue.get(false, None).await.unwrap();
    let info = received.info();

    assert_eq!(info.message, message.info());
    assert_eq!(info.message.body_size, 9);
    assert_eq!(info.message.delivery_mode, Some(DELIVERY_MODE_PERSISTENT));
    assert_eq!(info.message.expiration.as_deref(), Some("60000"));
    assert_eq!(
        info.message.headers.as_ref().unwrap().get("foo"),
        Some(&AMQPFieldValue::LongString("bar".to_string()))
    );
    assert_eq!(info.routing_key, queue.name);
    assert_eq!(info.exchange, "");
    assert!(info.synchronous);
    assert!(!info.redelivered);
    assert_eq!(info.consumer_tag, None);
    assert_eq!(info.cluster_id, None);
    assert_eq!(info.delivery_tag, received.delivery_tag);

    received.ack().await.unwrap();
}

#[tokio::test]
async fn test_large_body_is_split_into_frames() {
    let (_broker, connection, channel) = helper::connect().await.unwrap();
    let queue = channel
        .declare_queue(&helper::unique_name("large"), QueueDeclareOpts::default())
        .await
        .unwrap();

    let body = (0..20_000u32).map(|i| (i % 251) as u8).collect::<Vec<_>>();

    assert!(body.len() > connection.tune().frame_max as usize);

    channel
        .default_exchange()
        .publish(&Message::new(body.clone()), &queue.name)
        .await
        .unwrap();

    let received = queue.get(true, None).await.unwrap();

    assert_eq!(received.body, body);
}

#[tokio::test]
async fn test_empty_body() {
    let (_broker, _connection, channel) = helper::connect().await.unwrap();
    let queue = channel
        .declare_queue(&helper::unique_name("empty-body"), QueueDeclareOpts::default())
        .await
        .unwrap();

    channel
        .default_exchange()
        .publish(&Message::new(Vec::<u8>::new()).message_id("nothing"), &queue.name)
        .await
        .unwrap();

    let received = queue.get(true, None).await.unwrap();

    assert!(received.body.is_empty());
    assert_eq!(received.properties.message_id.as_deref(), Some("nothing"));
}

#[tokio::test]
async fn test_unroutable_mandatory_message_is_returned() {
    let (_broker, _connection, channel) = helper::connect().await.unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();

    channel.add_return_callback(move |returned| {
        let _ = tx.send(returned.clone());
    });

    channel
        .default_exchange()
        .publish_mandatory(&Message::new("nobody listens").app_id("returns"), "no-such-queue")
        .await
        .unwrap();

    let returned = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(returned.reply_code, 312);
    assert_eq!(returned.routing_key, "no-such-queue");
    assert_eq!(returned.exchange, "");
    assert_eq!(returned.message.body, b"nobody listens");
    assert_eq!(returned.message.properties.app_id.as_deref(), Some("returns"));

    // without mandatory the message is silently dropped
    channel
        .default_exchange()
        .publish(&Message::new("dropped"), "no-such-queue")
        .await
        .unwrap();

    assert!(tokio::time::timeout(Duration::from_millis(200), rx.recv()).await.is_err());
}

#[tokio::test]
async fn test_nacked_publish_is_delivery_error() {
    let (broker, _connection, channel) = helper::connect().await.unwrap();
    let queue = channel
        .declare_queue(&helper::unique_name("nack"), QueueDeclareOpts::default())
        .await
        .unwrap();

    broker.nack_publishes(true);

    let err = helper::to_client_error(
        channel
            .default_exchange()
            .publish(&Message::new("refused"), &queue.name)
            .await,
    );

    assert_eq!(err.kind, ErrorKind::Delivery);
    assert_eq!(channel.state(), ChannelState::Open);

    broker.nack_publishes(false);

    channel
        .default_exchange()
        .publish(&Message::new("accepted"), &queue.name)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_invalid_delivery_mode_closes_the_channel() {
    let (broker, connection, channel) = helper::connect().await.unwrap();
    let queue = channel
        .declare_queue(&helper::unique_name("mode"), QueueDeclareOpts::default())
        .await
        .unwrap();
    let closed = Arc::new(AtomicUsize::new(0));

    let counter = closed.clone();

    channel.add_close_callback(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let err = helper::to_client_error(
        channel
            .default_exchange()
            .publish(&Message::new("bad").delivery_mode(8), &queue.name)
            .await,
    );

    assert_eq!(err.kind, ErrorKind::ChannelClosed);
    assert_eq!(err.code, 406);
    assert!(channel.is_closed());
    assert_eq!(closed.load(Ordering::SeqCst), 1);

    let err = helper::to_client_error(
        channel
            .default_exchange()
            .publish(&Message::new("good"), &queue.name)
            .await,
    );

    assert_eq!(err.kind, ErrorKind::ChannelClosed);

    // a new channel is needed
    let channel = connection.channel().await.unwrap();

    channel
        .default_exchange()
        .publish(&Message::new("good").delivery_mode(DELIVERY_MODE_TRANSIENT), &queue.name)
        .await
        .unwrap();

    assert_eq!(broker.queue_len(&queue.name), Some(1));
}

#[tokio::test]
async fn test_publish_without_confirms() {
    let broker = Broker::new();
    let config = ClientConfig {
        publisher_confirms: false,
        rpc_timeout: Some(2_000),
        ..Default::default()
    };
    let connection = broker.connect_with(Credentials::default(), config).await.unwrap();
    let channel = connection.channel().await.unwrap();
    let queue = channel
        .declare_queue(&helper::unique_name("unconfirmed"), QueueDeclareOpts::default())
        .await
        .unwrap();

    for i in 0..5 {
        channel
            .default_exchange()
            .publish(&Message::new(format!("{}", i)), &queue.name)
            .await
            .unwrap();
    }

    // the get is behind the publishes on the same channel
    let message = queue.get(true, None).await.unwrap();

    assert_eq!(message.body, b"0");
    assert_eq!(message.message_count, Some(4));
}

#[tokio::test]
async fn test_concurrent_publishes_are_all_confirmed() {
    let (broker, _connection, channel) = helper::connect().await.unwrap();
    let queue = channel
        .declare_queue(&helper::unique_name("burst"), QueueDeclareOpts::default())
        .await
        .unwrap();
    let mut tasks = vec![];

    for i in 0..50 {
        let exchange = channel.default_exchange();
        let name = queue.name.clone();

        tasks.push(tokio::spawn(async move {
            exchange
                .publish(&Message::new(format!("burst {}", i)), &name)
                .await
        }));
    }

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(broker.queue_len(&queue.name), Some(50));
}
