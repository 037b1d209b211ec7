use super::{split_class_method, AMQPFieldValue, AMQPFrame, ClassId, ClassMethod, FieldTable, MethodFrameArgs};

/// RabbitMQ extensions both sides announce in their `capabilities` table.
const CAPABILITIES: [&str; 5] = [
    "publisher_confirms",
    "basic.nack",
    "consumer_cancel_notify",
    "connection.blocked",
    "authentication_failure_close",
];

fn capabilities() -> AMQPFieldValue {
    CAPABILITIES
        .iter()
        .map(|name| (name.to_string(), AMQPFieldValue::Bool(true)))
        .collect::<FieldTable>()
        .into()
}

/// First method of the handshake, sent by the broker.
#[derive(Debug, Default)]
pub struct ConnectionStartArgs {
    pub version_major: u8,
    pub version_minor: u8,
    pub properties: Option<FieldTable>,
    pub mechanisms: String,
    pub locales: String,
}

impl ConnectionStartArgs {
    /// Start as a RabbitMQ broker sends it: protocol 0-9, PLAIN and AMQPLAIN authentication.
    pub fn new() -> Self {
        let properties = FieldTable::from([
            ("product".to_string(), "RabbitMQ".into()),
            ("capabilities".to_string(), capabilities()),
        ]);

        Self {
            version_major: 0,
            version_minor: 9,
            properties: Some(properties),
            mechanisms: "PLAIN AMQPLAIN".to_string(),
            locales: "en_US".to_string(),
        }
    }

    pub fn supports_mechanism(&self, mechanism: &str) -> bool {
        self.mechanisms.split_whitespace().any(|offered| offered == mechanism)
    }
}

method_frame!(connection ConnectionStartArgs => ConnectionStart, CONNECTION_START);

/// The client's answer to start: its properties and the authentication response.
#[derive(Debug, Default)]
pub struct ConnectionStartOkArgs {
    pub properties: Option<FieldTable>,
    pub mechanism: String,
    pub response: String,
    pub locale: String,
}

impl ConnectionStartOkArgs {
    /// PLAIN authentication with the client properties of this library.
    pub fn new(username: &str, password: &str) -> Self {
        let properties = FieldTable::from([
            ("product".to_string(), "burrow".into()),
            ("platform".to_string(), "Rust".into()),
            ("version".to_string(), env!("CARGO_PKG_VERSION").into()),
            ("capabilities".to_string(), capabilities()),
        ]);

        Self {
            properties: Some(properties),
            mechanism: "PLAIN".to_string(),
            response: format!("\0{}\0{}", username, password),
            locale: "en_US".to_string(),
        }
    }

    /// Adds or overrides a client property, like `connection_name`.
    pub fn property(mut self, name: &str, value: AMQPFieldValue) -> Self {
        self.properties
            .get_or_insert_with(FieldTable::new)
            .insert(name.to_string(), value);
        self
    }

    /// Username and password of a PLAIN response.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let (username, password) = self.response.strip_prefix('\0')?.split_once('\0')?;

        Some((username, password))
    }
}

method_frame!(connection ConnectionStartOkArgs => ConnectionStartOk, CONNECTION_START_OK);

/// Limits proposed by the broker. Zero stands for no limit.
#[derive(Debug, Default)]
pub struct ConnectionTuneArgs {
    pub channel_max: u16,
    pub frame_max: u32,
    pub heartbeat: u16,
}

impl ConnectionTuneArgs {
    pub fn new(channel_max: u16, frame_max: u32, heartbeat: u16) -> Self {
        Self {
            channel_max,
            frame_max,
            heartbeat,
        }
    }
}

method_frame!(connection ConnectionTuneArgs => ConnectionTune, CONNECTION_TUNE);

/// Limits the client settled on, they cannot exceed what the broker proposed.
#[derive(Debug, Default)]
pub struct ConnectionTuneOkArgs {
    pub channel_max: u16,
    pub frame_max: u32,
    pub heartbeat: u16,
}

impl ConnectionTuneOkArgs {
    pub fn new(channel_max: u16, frame_max: u32, heartbeat: u16) -> Self {
        Self {
            channel_max,
            frame_max,
            heartbeat,
        }
    }
}

method_frame!(connection ConnectionTuneOkArgs => ConnectionTuneOk, CONNECTION_TUNE_OK);

#[derive(Debug, Default)]
pub struct ConnectionOpenArgs {
    pub virtual_host: String,
    pub insist: bool,
}

setters!(ConnectionOpenArgs { virtual_host(str) });

method_frame!(connection ConnectionOpenArgs => ConnectionOpen, CONNECTION_OPEN);

/// Closing the connection. When a method caused the close, `class_id` and `method_id` point to it.
#[derive(Debug, Default)]
pub struct ConnectionCloseArgs {
    pub code: u16,
    pub text: String,
    pub class_id: ClassId,
    pub method_id: u16,
}

impl ConnectionCloseArgs {
    pub fn new(code: u16, text: &str, class_method: ClassMethod) -> Self {
        let (class_id, method_id) = split_class_method(class_method);

        Self {
            code,
            text: text.to_string(),
            class_id,
            method_id,
        }
    }
}

method_frame!(connection ConnectionCloseArgs => ConnectionClose, CONNECTION_CLOSE);

/// The broker stopped reading from the connection, usually because of a resource alarm.
#[derive(Debug, Default)]
pub struct ConnectionBlockedArgs {
    pub reason: String,
}

impl ConnectionBlockedArgs {
    pub fn new(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

method_frame!(connection ConnectionBlockedArgs => ConnectionBlocked, CONNECTION_BLOCKED);

pub fn connection_open_ok() -> AMQPFrame {
    AMQPFrame::Method(0, super::CONNECTION_OPEN_OK, MethodFrameArgs::ConnectionOpenOk)
}

pub fn connection_close(code: u16, text: &str, class_method: ClassMethod) -> AMQPFrame {
    ConnectionCloseArgs::new(code, text, class_method).frame()
}

pub fn connection_close_ok() -> AMQPFrame {
    AMQPFrame::Method(0, super::CONNECTION_CLOSE_OK, MethodFrameArgs::ConnectionCloseOk)
}
