use crate::helper;
use burrow_client::*;
use burrow_codec::frame;
use std::time::Duration;

#[tokio::test]
async fn test_direct_exchange_routes_by_key() {
    let (broker, _connection, channel) = helper::connect().await.unwrap();
    let exchange = channel
        .declare_exchange(
            &helper::unique_name("orders"),
            ExchangeType::Direct,
            ExchangeDeclareOpts::default().durable(true),
        )
        .await
        .unwrap();
    let created = channel
        .declare_queue(&helper::unique_name("created"), QueueDeclareOpts::default())
        .await
        .unwrap();
    let shipped = channel
        .declare_queue(&helper::unique_name("shipped"), QueueDeclareOpts::default())
        .await
        .unwrap();

    created.bind(&exchange, "order.created").await.unwrap();
    shipped.bind(&exchange, "order.shipped").await.unwrap();

    exchange
        .publish(&Message::new("new order"), "order.created")
        .await
        .unwrap();
    exchange
        .publish(&Message::new("unrouted"), "order.cancelled")
        .await
        .unwrap();

    assert_eq!(broker.queue_len(&created.name), Some(1));
    assert_eq!(broker.queue_len(&shipped.name), Some(0));

    let message = created.get(true, None).await.unwrap();

    assert_eq!(message.exchange, exchange.name);
    assert_eq!(message.routing_key, "order.created");
}

#[tokio::test]
async fn test_fanout_exchange_copies_to_every_queue() {
    let (broker, _connection, channel) = helper::connect().await.unwrap();
    let exchange = channel
        .declare_exchange(
            &helper::unique_name("broadcast"),
            ExchangeType::Fanout,
            ExchangeDeclareOpts::default(),
        )
        .await
        .unwrap();
    let mut queues = vec![];

    for _ in 0..3 {
        let queue = channel
            .declare_queue("", QueueDeclareOpts::default().exclusive(true))
            .await
            .unwrap();

        assert!(queue.name.starts_with("amq.gen-"));

        queue.bind(&exchange, "").await.unwrap();
        queues.push(queue);
    }

    exchange
        .publish(&Message::new("to everyone"), "ignored")
        .await
        .unwrap();

    for queue in &queues {
        assert_eq!(broker.queue_len(&queue.name), Some(1));
    }
}

#[tokio::test]
async fn test_topic_exchange_matches_patterns() {
    let (broker, _connection, channel) = helper::connect().await.unwrap();
    let exchange = channel
        .declare_exchange(
            &helper::unique_name("logs"),
            ExchangeType::Topic,
            ExchangeDeclareOpts::default(),
        )
        .await
        .unwrap();
    let errors = channel
        .declare_queue(&helper::unique_name("errors"), QueueDeclareOpts::default())
        .await
        .unwrap();
    let billing = channel
        .declare_queue(&helper::unique_name("billing"), QueueDeclareOpts::default())
        .await
        .unwrap();

    errors.bind(&exchange, "*.error").await.unwrap();
    billing.bind(&exchange, "billing.#").await.unwrap();

    for key in ["billing.error", "shipping.error", "billing.invoice.sent", "shipping.info"] {
        exchange.publish(&Message::new(key), key).await.unwrap();
    }

    assert_eq!(broker.queue_len(&errors.name), Some(2));
    assert_eq!(broker.queue_len(&billing.name), Some(2));
}

#[tokio::test]
async fn test_headers_exchange() {
    let (broker, _connection, channel) = helper::connect().await.unwrap();
    let exchange = channel
        .declare_exchange(
            &helper::unique_name("by-format"),
            ExchangeType::Headers,
            ExchangeDeclareOpts::default(),
        )
        .await
        .unwrap();
    let pdf = channel
        .declare_queue(&helper::unique_name("pdf"), QueueDeclareOpts::default())
        .await
        .unwrap();

    let mut args = FieldTable::new();

    args.insert("x-match".to_string(), "all".into());
    args.insert("format".to_string(), "pdf".into());

    pdf.bind_with_arguments(&exchange, "", args).await.unwrap();

    exchange
        .publish(&Message::new("report").header("format", "pdf"), "")
        .await
        .unwrap();
    exchange
        .publish(&Message::new("sheet").header("format", "xlsx"), "")
        .await
        .unwrap();

    assert_eq!(broker.queue_len(&pdf.name), Some(1));
    assert_eq!(pdf.get(true, None).await.unwrap().body, b"report");
}

#[tokio::test]
async fn test_unbind_stops_routing() {
    let (broker, _connection, channel) = helper::connect().await.unwrap();
    let queue = channel
        .declare_queue(&helper::unique_name("unbind"), QueueDeclareOpts::default())
        .await
        .unwrap();

    queue.bind("amq.direct", "key").await.unwrap();

    channel
        .publish(&Message::new("one"), "amq.direct", "key", false)
        .await
        .unwrap();

    queue.unbind("amq.direct", "key").await.unwrap();

    channel
        .publish(&Message::new("two"), "amq.direct", "key", false)
        .await
        .unwrap();

    assert_eq!(broker.queue_len(&queue.name), Some(1));
}

#[tokio::test]
async fn test_passive_declare_of_missing_exchange() {
    let (broker, _connection, channel) = helper::connect().await.unwrap();

    let err = helper::to_client_error(
        channel
            .declare_exchange(
                "no-such-exchange",
                ExchangeType::Direct,
                ExchangeDeclareOpts::default().passive(true),
            )
            .await,
    );

    assert_eq!(err.kind, ErrorKind::ChannelClosed);
    assert_eq!(err.code, 404);
    assert_eq!(err.class_method, frame::EXCHANGE_DECLARE);
    assert!(!broker.exchange_exists("no-such-exchange"));
}

#[tokio::test]
async fn test_redeclare_with_other_type_fails() {
    let (_broker, connection, channel) = helper::connect().await.unwrap();
    let name = helper::unique_name("typed");

    channel
        .declare_exchange(&name, ExchangeType::Fanout, ExchangeDeclareOpts::default())
        .await
        .unwrap();

    let err = helper::to_client_error(
        channel
            .declare_exchange(&name, ExchangeType::Topic, ExchangeDeclareOpts::default())
            .await,
    );

    assert_eq!(err.kind, ErrorKind::ChannelClosed);
    assert_eq!(err.code, 406);

    // passive declare doesn't care about the type
    let channel = connection.channel().await.unwrap();

    channel
        .declare_exchange(&name, ExchangeType::Topic, ExchangeDeclareOpts::default().passive(true))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_exchange() {
    let (broker, connection, channel) = helper::connect().await.unwrap();
    let exchange = channel
        .declare_exchange(
            &helper::unique_name("temporary"),
            ExchangeType::Direct,
            ExchangeDeclareOpts::default(),
        )
        .await
        .unwrap();
    let queue = channel
        .declare_queue(&helper::unique_name("bound"), QueueDeclareOpts::default())
        .await
        .unwrap();

    queue.bind(&exchange, "k").await.unwrap();

    let err = helper::to_client_error(exchange.delete(true).await);

    assert_eq!(err.code, 406);
    assert!(broker.exchange_exists(&exchange.name));

    let channel = connection.channel().await.unwrap();

    channel.exchange_delete(&exchange.name, false).await.unwrap();

    assert!(!broker.exchange_exists(&exchange.name));

    let err = helper::to_client_error(
        channel
            .publish(&Message::new("lost"), &exchange.name, "k", false)
            .await,
    );

    assert_eq!(err.kind, ErrorKind::ChannelClosed);
    assert_eq!(err.code, 404);
}

#[tokio::test]
async fn test_exchange_delete_with_deadline() {
    let (broker, _connection, channel) = helper::connect().await.unwrap();
    let exchange = channel
        .declare_exchange(
            &helper::unique_name("slow-delete"),
            ExchangeType::Fanout,
            ExchangeDeclareOpts::default(),
        )
        .await
        .unwrap();

    broker.delay_next(frame::EXCHANGE_DELETE, Duration::from_millis(600));

    let err = helper::to_client_error(
        exchange
            .with_timeout(Duration::from_millis(100))
            .delete(false)
            .await,
    );

    assert_eq!(err.kind, ErrorKind::Timeout);
    assert_eq!(err.class_method, frame::EXCHANGE_DELETE);
    assert_eq!(channel.state(), ChannelState::Open);

    tokio::time::sleep(Duration::from_millis(700)).await;

    assert!(!broker.exchange_exists(&exchange.name));
}
