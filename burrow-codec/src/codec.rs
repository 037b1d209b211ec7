use crate::frame::*;
use crate::{frame_error, FrameError};
use bytes::{Buf, BufMut, BytesMut};
use log::trace;
use tokio_util::codec::{Decoder, Encoder};

const FRAME_METHOD_FRAME: u8 = 0x01;
const FRAME_CONTENT_HEADER: u8 = 0x02;
const FRAME_CONTENT_BODY: u8 = 0x03;
const FRAME_HEARTBEAT: u8 = 0x08;
const FRAME_AMQP_VERSION: u8 = 0x41;
const FRAME_END: u8 = 0xCE;

/// Reply code of malformed frames.
const FRAME_ERROR: u16 = 501;
/// Reply code of frames which are well-formed but carry unknown methods or values.
const SYNTAX_ERROR: u16 = 502;
const NOT_IMPLEMENTED: u16 = 540;

type CodecResult<T> = std::result::Result<T, FrameError>;

/// Placeholder for AMQP encoder and decoder functions.
#[derive(Debug, Default)]
pub struct AMQPCodec {}

/// Unit of writing. `Frames` are written out as one contiguous batch so the frames of a published
/// message are never interleaved with frames of other channels.
#[derive(Debug)]
pub enum Frame {
    Frame(AMQPFrame),
    Frames(Vec<AMQPFrame>),
}

impl From<AMQPFrame> for Frame {
    fn from(frame: AMQPFrame) -> Self {
        Frame::Frame(frame)
    }
}

impl Encoder<Frame> for AMQPCodec {
    type Error = std::io::Error;

    fn encode(&mut self, event: Frame, buf: &mut BytesMut) -> Result<(), Self::Error> {
        match event {
            Frame::Frame(frame) => encode_amqp_frame(buf, frame)?,
            Frame::Frames(frames) => {
                let mut batch = BytesMut::new();

                for frame in frames {
                    encode_amqp_frame(&mut batch, frame)?;
                }

                buf.put(batch);
            }
        }

        Ok(())
    }
}

impl Decoder for AMQPCodec {
    type Item = Frame;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        if src[0] == FRAME_AMQP_VERSION {
            if src.len() < 8 {
                return Ok(None);
            }

            let head = src.split_to(8);

            if &head[..] != b"AMQP\x00\x00\x09\x01" {
                return Err(FrameError {
                    code: FRAME_ERROR,
                    message: format!("Unsupported protocol header {:?}", &head[..]),
                }
                .into());
            }

            return Ok(Some(Frame::Frame(AMQPFrame::Header)));
        }

        if src.len() < 7 {
            return Ok(None);
        }

        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&src[3..7]);
        let frame_len = u32::from_be_bytes(len_bytes) as usize;

        if src.len() < frame_len + 8 {
            src.reserve(frame_len + 8 - src.len());

            return Ok(None);
        }

        let mut frame_buf = src.split_to(frame_len + 8);

        if frame_buf[frame_len + 7] != FRAME_END {
            return Err(FrameError {
                code: FRAME_ERROR,
                message: "Frame end octet is missing".into(),
            }
            .into());
        }

        let frame_type = frame_buf.get_u8();
        let channel = frame_buf.get_u16();
        frame_buf.advance(4);
        frame_buf.truncate(frame_len);

        let frame = match frame_type {
            FRAME_METHOD_FRAME => decode_method_frame(&mut frame_buf, channel)?,
            FRAME_CONTENT_HEADER => decode_content_header_frame(&mut frame_buf, channel)?,
            FRAME_CONTENT_BODY => AMQPFrame::ContentBody(ContentBodyFrame {
                channel,
                body: frame_buf.to_vec(),
            }),
            FRAME_HEARTBEAT => AMQPFrame::Heartbeat(channel),
            f => {
                return Err(FrameError {
                    code: FRAME_ERROR,
                    message: format!("Unknown frame type {}", f),
                }
                .into())
            }
        };

        trace!("Decoded {:?}", frame);

        Ok(Some(Frame::Frame(frame)))
    }
}

/// Reads a fixed size value from the buffer, failing with a frame error if the buffer is shorter.
macro_rules! checked_get {
    ($buf:expr, $getter:ident, $size:expr) => {{
        if $buf.remaining() < $size {
            return frame_error!(FRAME_ERROR, "Frame is shorter than its content");
        }

        $buf.$getter()
    }};
}

fn decode_method_frame(src: &mut BytesMut, channel: u16) -> CodecResult<AMQPFrame> {
    let class_method = checked_get!(src, get_u32, 4);

    let method_frame_args = match class_method {
        CONNECTION_START => decode_connection_start(src)?,
        CONNECTION_START_OK => decode_connection_start_ok(src)?,
        CONNECTION_TUNE => MethodFrameArgs::ConnectionTune(ConnectionTuneArgs {
            channel_max: checked_get!(src, get_u16, 2),
            frame_max: checked_get!(src, get_u32, 4),
            heartbeat: checked_get!(src, get_u16, 2),
        }),
        CONNECTION_TUNE_OK => MethodFrameArgs::ConnectionTuneOk(ConnectionTuneOkArgs {
            channel_max: checked_get!(src, get_u16, 2),
            frame_max: checked_get!(src, get_u32, 4),
            heartbeat: checked_get!(src, get_u16, 2),
        }),
        CONNECTION_OPEN => decode_connection_open(src)?,
        CONNECTION_OPEN_OK => {
            let _known_hosts = decode_short_string(src)?;

            MethodFrameArgs::ConnectionOpenOk
        }
        CONNECTION_CLOSE => MethodFrameArgs::ConnectionClose(ConnectionCloseArgs {
            code: checked_get!(src, get_u16, 2),
            text: decode_short_string(src)?,
            class_id: checked_get!(src, get_u16, 2),
            method_id: checked_get!(src, get_u16, 2),
        }),
        CONNECTION_CLOSE_OK => MethodFrameArgs::ConnectionCloseOk,
        CONNECTION_BLOCKED => MethodFrameArgs::ConnectionBlocked(ConnectionBlockedArgs {
            reason: decode_short_string(src)?,
        }),
        CONNECTION_UNBLOCKED => MethodFrameArgs::ConnectionUnblocked,
        CHANNEL_OPEN => {
            let _out_of_band = decode_short_string(src)?;

            MethodFrameArgs::ChannelOpen
        }
        CHANNEL_OPEN_OK => {
            let _channel_id = decode_long_string(src)?;

            MethodFrameArgs::ChannelOpenOk
        }
        CHANNEL_FLOW => MethodFrameArgs::ChannelFlow(ChannelFlowArgs {
            active: checked_get!(src, get_u8, 1) != 0,
        }),
        CHANNEL_FLOW_OK => MethodFrameArgs::ChannelFlowOk(ChannelFlowArgs {
            active: checked_get!(src, get_u8, 1) != 0,
        }),
        CHANNEL_CLOSE => MethodFrameArgs::ChannelClose(ChannelCloseArgs {
            code: checked_get!(src, get_u16, 2),
            text: decode_short_string(src)?,
            class_id: checked_get!(src, get_u16, 2),
            method_id: checked_get!(src, get_u16, 2),
        }),
        CHANNEL_CLOSE_OK => MethodFrameArgs::ChannelCloseOk,
        EXCHANGE_DECLARE => decode_exchange_declare(src)?,
        EXCHANGE_DECLARE_OK => MethodFrameArgs::ExchangeDeclareOk,
        EXCHANGE_DELETE => decode_exchange_delete(src)?,
        EXCHANGE_DELETE_OK => MethodFrameArgs::ExchangeDeleteOk,
        QUEUE_DECLARE => decode_queue_declare(src)?,
        QUEUE_DECLARE_OK => MethodFrameArgs::QueueDeclareOk(QueueDeclareOkArgs {
            name: decode_short_string(src)?,
            message_count: checked_get!(src, get_u32, 4),
            consumer_count: checked_get!(src, get_u32, 4),
        }),
        QUEUE_BIND => decode_queue_bind(src)?,
        QUEUE_BIND_OK => MethodFrameArgs::QueueBindOk,
        QUEUE_PURGE => decode_queue_purge(src)?,
        QUEUE_PURGE_OK => MethodFrameArgs::QueuePurgeOk(QueuePurgeOkArgs {
            message_count: checked_get!(src, get_u32, 4),
        }),
        QUEUE_DELETE => decode_queue_delete(src)?,
        QUEUE_DELETE_OK => MethodFrameArgs::QueueDeleteOk(QueueDeleteOkArgs {
            message_count: checked_get!(src, get_u32, 4),
        }),
        QUEUE_UNBIND => decode_queue_unbind(src)?,
        QUEUE_UNBIND_OK => MethodFrameArgs::QueueUnbindOk,
        BASIC_QOS => MethodFrameArgs::BasicQos(BasicQosArgs {
            prefetch_size: checked_get!(src, get_u32, 4),
            prefetch_count: checked_get!(src, get_u16, 2),
            global: checked_get!(src, get_u8, 1) != 0,
        }),
        BASIC_QOS_OK => MethodFrameArgs::BasicQosOk,
        BASIC_CONSUME => decode_basic_consume(src)?,
        BASIC_CONSUME_OK => MethodFrameArgs::BasicConsumeOk(BasicConsumeOkArgs {
            consumer_tag: decode_short_string(src)?,
        }),
        BASIC_CANCEL => MethodFrameArgs::BasicCancel(BasicCancelArgs {
            consumer_tag: decode_short_string(src)?,
            no_wait: checked_get!(src, get_u8, 1) != 0,
        }),
        BASIC_CANCEL_OK => MethodFrameArgs::BasicCancelOk(BasicCancelOkArgs {
            consumer_tag: decode_short_string(src)?,
        }),
        BASIC_PUBLISH => decode_basic_publish(src)?,
        BASIC_RETURN => MethodFrameArgs::BasicReturn(BasicReturnArgs {
            reply_code: checked_get!(src, get_u16, 2),
            reply_text: decode_short_string(src)?,
            exchange_name: decode_short_string(src)?,
            routing_key: decode_short_string(src)?,
        }),
        BASIC_DELIVER => MethodFrameArgs::BasicDeliver(BasicDeliverArgs {
            consumer_tag: decode_short_string(src)?,
            delivery_tag: checked_get!(src, get_u64, 8),
            redelivered: checked_get!(src, get_u8, 1) != 0,
            exchange_name: decode_short_string(src)?,
            routing_key: decode_short_string(src)?,
        }),
        BASIC_GET => decode_basic_get(src)?,
        BASIC_GET_OK => MethodFrameArgs::BasicGetOk(BasicGetOkArgs {
            delivery_tag: checked_get!(src, get_u64, 8),
            redelivered: checked_get!(src, get_u8, 1) != 0,
            exchange_name: decode_short_string(src)?,
            routing_key: decode_short_string(src)?,
            message_count: checked_get!(src, get_u32, 4),
        }),
        BASIC_GET_EMPTY => {
            let _cluster_id = decode_short_string(src)?;

            MethodFrameArgs::BasicGetEmpty
        }
        BASIC_ACK => MethodFrameArgs::BasicAck(BasicAckArgs {
            delivery_tag: checked_get!(src, get_u64, 8),
            multiple: checked_get!(src, get_u8, 1) != 0,
        }),
        BASIC_REJECT => MethodFrameArgs::BasicReject(BasicRejectArgs {
            delivery_tag: checked_get!(src, get_u64, 8),
            requeue: checked_get!(src, get_u8, 1) != 0,
        }),
        BASIC_NACK => MethodFrameArgs::BasicNack(BasicNackArgs {
            delivery_tag: checked_get!(src, get_u64, 8),
            flags: BasicNackFlags::from_bits_truncate(checked_get!(src, get_u8, 1)),
        }),
        BASIC_RECOVER => MethodFrameArgs::BasicRecover(BasicRecoverArgs {
            requeue: checked_get!(src, get_u8, 1) != 0,
        }),
        BASIC_RECOVER_OK => MethodFrameArgs::BasicRecoverOk,
        CONFIRM_SELECT => MethodFrameArgs::ConfirmSelect(ConfirmSelectArgs {
            no_wait: checked_get!(src, get_u8, 1) != 0,
        }),
        CONFIRM_SELECT_OK => MethodFrameArgs::ConfirmSelectOk,
        _ => {
            return Err(FrameError {
                code: NOT_IMPLEMENTED,
                message: format!("Unknown class method {:08X}", class_method),
            })
        }
    };

    Ok(AMQPFrame::Method(channel, class_method, method_frame_args))
}

fn decode_connection_start(src: &mut BytesMut) -> CodecResult<MethodFrameArgs> {
    let args = ConnectionStartArgs {
        version_major: checked_get!(src, get_u8, 1),
        version_minor: checked_get!(src, get_u8, 1),
        properties: decode_field_table(src)?,
        mechanisms: decode_long_string(src)?,
        locales: decode_long_string(src)?,
    };

    Ok(MethodFrameArgs::ConnectionStart(args))
}

fn decode_connection_start_ok(src: &mut BytesMut) -> CodecResult<MethodFrameArgs> {
    let args = ConnectionStartOkArgs {
        properties: decode_field_table(src)?,
        mechanism: decode_short_string(src)?,
        response: decode_long_string(src)?,
        locale: decode_short_string(src)?,
    };

    Ok(MethodFrameArgs::ConnectionStartOk(args))
}

fn decode_connection_open(src: &mut BytesMut) -> CodecResult<MethodFrameArgs> {
    let virtual_host = decode_short_string(src)?;
    let _reserved = decode_short_string(src)?;
    let flags = checked_get!(src, get_u8, 1);

    Ok(MethodFrameArgs::ConnectionOpen(ConnectionOpenArgs {
        virtual_host,
        insist: flags & 0x01 != 0,
    }))
}

fn decode_exchange_declare(src: &mut BytesMut) -> CodecResult<MethodFrameArgs> {
    let mut args = ExchangeDeclareArgs::default();
    let _ = checked_get!(src, get_u16, 2);
    args.exchange_name = decode_short_string(src)?;
    args.exchange_type = decode_short_string(src)?;
    args.flags = ExchangeDeclareFlags::from_bits_truncate(checked_get!(src, get_u8, 1));
    args.args = decode_field_table(src)?;

    Ok(MethodFrameArgs::ExchangeDeclare(args))
}

fn decode_exchange_delete(src: &mut BytesMut) -> CodecResult<MethodFrameArgs> {
    let mut args = ExchangeDeleteArgs::default();
    let _ = checked_get!(src, get_u16, 2);
    args.exchange_name = decode_short_string(src)?;
    args.flags = ExchangeDeleteFlags::from_bits_truncate(checked_get!(src, get_u8, 1));

    Ok(MethodFrameArgs::ExchangeDelete(args))
}

fn decode_queue_declare(src: &mut BytesMut) -> CodecResult<MethodFrameArgs> {
    let mut args = QueueDeclareArgs::default();
    let _ = checked_get!(src, get_u16, 2);
    args.name = decode_short_string(src)?;
    args.flags = QueueDeclareFlags::from_bits_truncate(checked_get!(src, get_u8, 1));
    args.args = decode_field_table(src)?;

    Ok(MethodFrameArgs::QueueDeclare(args))
}

fn decode_queue_bind(src: &mut BytesMut) -> CodecResult<MethodFrameArgs> {
    let mut args = QueueBindArgs::default();
    let _ = checked_get!(src, get_u16, 2);
    args.queue_name = decode_short_string(src)?;
    args.exchange_name = decode_short_string(src)?;
    args.routing_key = decode_short_string(src)?;
    args.no_wait = checked_get!(src, get_u8, 1) != 0;
    args.args = decode_field_table(src)?;

    Ok(MethodFrameArgs::QueueBind(args))
}

fn decode_queue_purge(src: &mut BytesMut) -> CodecResult<MethodFrameArgs> {
    let mut args = QueuePurgeArgs::default();
    let _ = checked_get!(src, get_u16, 2);
    args.queue_name = decode_short_string(src)?;
    args.no_wait = checked_get!(src, get_u8, 1) != 0;

    Ok(MethodFrameArgs::QueuePurge(args))
}

fn decode_queue_delete(src: &mut BytesMut) -> CodecResult<MethodFrameArgs> {
    let mut args = QueueDeleteArgs::default();
    let _ = checked_get!(src, get_u16, 2);
    args.queue_name = decode_short_string(src)?;
    args.flags = QueueDeleteFlags::from_bits_truncate(checked_get!(src, get_u8, 1));

    Ok(MethodFrameArgs::QueueDelete(args))
}

fn decode_queue_unbind(src: &mut BytesMut) -> CodecResult<MethodFrameArgs> {
    let mut args = QueueUnbindArgs::default();
    let _ = checked_get!(src, get_u16, 2);
    args.queue_name = decode_short_string(src)?;
    args.exchange_name = decode_short_string(src)?;
    args.routing_key = decode_short_string(src)?;
    args.args = decode_field_table(src)?;

    Ok(MethodFrameArgs::QueueUnbind(args))
}

fn decode_basic_consume(src: &mut BytesMut) -> CodecResult<MethodFrameArgs> {
    let mut args = BasicConsumeArgs::default();
    let _ = checked_get!(src, get_u16, 2);
    args.queue = decode_short_string(src)?;
    args.consumer_tag = decode_short_string(src)?;
    args.flags = BasicConsumeFlags::from_bits_truncate(checked_get!(src, get_u8, 1));
    args.args = decode_field_table(src)?;

    Ok(MethodFrameArgs::BasicConsume(args))
}

fn decode_basic_publish(src: &mut BytesMut) -> CodecResult<MethodFrameArgs> {
    let mut args = BasicPublishArgs::default();
    let _ = checked_get!(src, get_u16, 2);
    args.exchange_name = decode_short_string(src)?;
    args.routing_key = decode_short_string(src)?;
    args.flags = BasicPublishFlags::from_bits_truncate(checked_get!(src, get_u8, 1));

    Ok(MethodFrameArgs::BasicPublish(args))
}

fn decode_basic_get(src: &mut BytesMut) -> CodecResult<MethodFrameArgs> {
    let _ = checked_get!(src, get_u16, 2);
    let queue = decode_short_string(src)?;
    let no_ack = checked_get!(src, get_u8, 1) != 0;

    Ok(MethodFrameArgs::BasicGet(BasicGetArgs { queue, no_ack }))
}

fn decode_content_header_frame(src: &mut BytesMut, channel: u16) -> CodecResult<AMQPFrame> {
    let class_id = checked_get!(src, get_u16, 2);
    let weight = checked_get!(src, get_u16, 2);
    let body_size = checked_get!(src, get_u64, 8);
    let flags = HeaderPropertyFlags::from_bits_truncate(checked_get!(src, get_u16, 2));

    let mut hf = ContentHeaderFrame {
        channel,
        class_id,
        weight,
        body_size,
        ..Default::default()
    };

    if flags.contains(HeaderPropertyFlags::CONTENT_TYPE) {
        hf.content_type = Some(decode_short_string(src)?);
    }
    if flags.contains(HeaderPropertyFlags::CONTENT_ENCODING) {
        hf.content_encoding = Some(decode_short_string(src)?);
    }
    if flags.contains(HeaderPropertyFlags::HEADERS) {
        hf.headers = Some(decode_field_table(src)?.unwrap_or_default());
    }
    if flags.contains(HeaderPropertyFlags::DELIVERY_MODE) {
        hf.delivery_mode = Some(checked_get!(src, get_u8, 1));
    }
    if flags.contains(HeaderPropertyFlags::PRIORITY) {
        hf.priority = Some(checked_get!(src, get_u8, 1));
    }
    if flags.contains(HeaderPropertyFlags::CORRELATION_ID) {
        hf.correlation_id = Some(decode_short_string(src)?);
    }
    if flags.contains(HeaderPropertyFlags::REPLY_TO) {
        hf.reply_to = Some(decode_short_string(src)?);
    }
    if flags.contains(HeaderPropertyFlags::EXPIRATION) {
        hf.expiration = Some(decode_short_string(src)?);
    }
    if flags.contains(HeaderPropertyFlags::MESSAGE_ID) {
        hf.message_id = Some(decode_short_string(src)?);
    }
    if flags.contains(HeaderPropertyFlags::TIMESTAMP) {
        hf.timestamp = Some(checked_get!(src, get_u64, 8));
    }
    if flags.contains(HeaderPropertyFlags::MESSAGE_TYPE) {
        hf.message_type = Some(decode_short_string(src)?);
    }
    if flags.contains(HeaderPropertyFlags::USER_ID) {
        hf.user_id = Some(decode_short_string(src)?);
    }
    if flags.contains(HeaderPropertyFlags::APP_ID) {
        hf.app_id = Some(decode_short_string(src)?);
    }
    if flags.contains(HeaderPropertyFlags::CLUSTER_ID) {
        hf.cluster_id = Some(decode_short_string(src)?);
    }

    Ok(AMQPFrame::ContentHeader(hf))
}

fn decode_value(buf: &mut BytesMut) -> CodecResult<AMQPFieldValue> {
    let value = match checked_get!(buf, get_u8, 1) {
        b't' => AMQPFieldValue::Bool(checked_get!(buf, get_u8, 1) != 0),
        b'b' => AMQPFieldValue::ShortShortInt(checked_get!(buf, get_i8, 1)),
        b'B' => AMQPFieldValue::ShortShortUInt(checked_get!(buf, get_u8, 1)),
        b's' => AMQPFieldValue::ShortInt(checked_get!(buf, get_i16, 2)),
        b'u' => AMQPFieldValue::ShortUInt(checked_get!(buf, get_u16, 2)),
        b'I' => AMQPFieldValue::LongInt(checked_get!(buf, get_i32, 4)),
        b'i' => AMQPFieldValue::LongUInt(checked_get!(buf, get_u32, 4)),
        b'l' => AMQPFieldValue::LongLongInt(checked_get!(buf, get_i64, 8)),
        b'f' => AMQPFieldValue::Float(checked_get!(buf, get_f32, 4)),
        b'd' => AMQPFieldValue::Double(checked_get!(buf, get_f64, 8)),
        b'D' => {
            let scale = checked_get!(buf, get_u8, 1);
            let value = checked_get!(buf, get_u32, 4);

            AMQPFieldValue::Decimal(scale, value)
        }
        b'S' => {
            let bytes = decode_long_bytes(buf)?;

            match String::from_utf8(bytes) {
                Ok(s) => AMQPFieldValue::LongString(s),
                Err(e) => AMQPFieldValue::ByteArray(e.into_bytes()),
            }
        }
        b'x' => AMQPFieldValue::ByteArray(decode_long_bytes(buf)?),
        b'A' => {
            let len = checked_get!(buf, get_u32, 4) as usize;

            if buf.remaining() < len {
                return frame_error!(FRAME_ERROR, "Field array is longer than the frame");
            }

            let mut array_buf = buf.split_to(len);
            let mut values = vec![];

            while array_buf.has_remaining() {
                values.push(decode_value(&mut array_buf)?);
            }

            AMQPFieldValue::FieldArray(values)
        }
        b'T' => AMQPFieldValue::Timestamp(checked_get!(buf, get_u64, 8)),
        b'F' => AMQPFieldValue::FieldTable(Box::new(decode_field_table(buf)?.unwrap_or_default())),
        b'V' => AMQPFieldValue::Void,
        t => {
            return Err(FrameError {
                code: SYNTAX_ERROR,
                message: format!("Unknown field value type {}", t),
            })
        }
    };

    Ok(value)
}

fn decode_short_string(buf: &mut BytesMut) -> CodecResult<String> {
    let len = checked_get!(buf, get_u8, 1) as usize;

    if buf.remaining() < len {
        return frame_error!(FRAME_ERROR, "Short string is longer than the frame");
    }

    let sb = buf.split_to(len);

    String::from_utf8(sb.to_vec()).or_else(|_| frame_error!(SYNTAX_ERROR, "Short string is not valid UTF-8"))
}

fn decode_long_bytes(buf: &mut BytesMut) -> CodecResult<Vec<u8>> {
    let len = checked_get!(buf, get_u32, 4) as usize;

    if buf.remaining() < len {
        return frame_error!(FRAME_ERROR, "Long string is longer than the frame");
    }

    Ok(buf.split_to(len).to_vec())
}

fn decode_long_string(buf: &mut BytesMut) -> CodecResult<String> {
    let bytes = decode_long_bytes(buf)?;

    String::from_utf8(bytes).or_else(|_| frame_error!(SYNTAX_ERROR, "Long string is not valid UTF-8"))
}

/// Decode a field table
///
/// The buffer points to the beginning of the field table which is a `u32` length
/// information. An empty table is decoded as `None`.
fn decode_field_table(buf: &mut BytesMut) -> CodecResult<Option<FieldTable>> {
    let ft_len = checked_get!(buf, get_u32, 4) as usize;

    if ft_len == 0 {
        return Ok(None);
    }

    if buf.remaining() < ft_len {
        return frame_error!(FRAME_ERROR, "Field table is longer than the frame");
    }

    let mut ft_buf = buf.split_to(ft_len);
    let mut table = FieldTable::new();

    while ft_buf.has_remaining() {
        let field_name = decode_short_string(&mut ft_buf)?;
        let field_value = decode_value(&mut ft_buf)?;

        table.insert(field_name, field_value);
    }

    Ok(Some(table))
}

fn encode_amqp_frame(buf: &mut BytesMut, frame: AMQPFrame) -> CodecResult<()> {
    match frame {
        AMQPFrame::Header => buf.put(&b"AMQP\x00\x00\x09\x01"[..]),
        AMQPFrame::Method(ch, cm, args) => encode_method_frame(buf, ch, cm, &args)?,
        AMQPFrame::ContentHeader(header_frame) => encode_content_header_frame(buf, &header_frame)?,
        AMQPFrame::ContentBody(body_frame) => encode_content_body_frame(buf, &body_frame),
        AMQPFrame::Heartbeat(channel) => encode_heartbeat_frame(buf, channel),
    }

    Ok(())
}

fn encode_method_frame(
    buf: &mut BytesMut,
    channel: Channel,
    cm: ClassMethod,
    args: &MethodFrameArgs,
) -> CodecResult<()> {
    let mut fr = BytesMut::with_capacity(256);
    fr.put_u32(cm);

    match args {
        MethodFrameArgs::ConnectionStart(args) => {
            fr.put_u8(args.version_major);
            fr.put_u8(args.version_minor);
            encode_field_table(&mut fr, args.properties.as_ref())?;
            encode_long_string(&mut fr, &args.mechanisms);
            encode_long_string(&mut fr, &args.locales);
        }
        MethodFrameArgs::ConnectionStartOk(args) => {
            encode_field_table(&mut fr, args.properties.as_ref())?;
            encode_short_string(&mut fr, &args.mechanism)?;
            encode_long_string(&mut fr, &args.response);
            encode_short_string(&mut fr, &args.locale)?;
        }
        MethodFrameArgs::ConnectionTune(args) => {
            fr.put_u16(args.channel_max);
            fr.put_u32(args.frame_max);
            fr.put_u16(args.heartbeat);
        }
        MethodFrameArgs::ConnectionTuneOk(args) => {
            fr.put_u16(args.channel_max);
            fr.put_u32(args.frame_max);
            fr.put_u16(args.heartbeat);
        }
        MethodFrameArgs::ConnectionOpen(args) => {
            encode_short_string(&mut fr, &args.virtual_host)?;
            encode_short_string(&mut fr, "")?;
            fr.put_u8(if args.insist { 1 } else { 0 });
        }
        // empty known hosts short string
        MethodFrameArgs::ConnectionOpenOk => fr.put_u8(0),
        MethodFrameArgs::ConnectionClose(args) => {
            fr.put_u16(args.code);
            encode_short_string(&mut fr, &args.text)?;
            fr.put_u16(args.class_id);
            fr.put_u16(args.method_id);
        }
        MethodFrameArgs::ConnectionCloseOk => (),
        MethodFrameArgs::ConnectionBlocked(args) => encode_short_string(&mut fr, &args.reason)?,
        MethodFrameArgs::ConnectionUnblocked => (),
        MethodFrameArgs::ChannelOpen => fr.put_u8(0),
        MethodFrameArgs::ChannelOpenOk => fr.put_u32(0),
        MethodFrameArgs::ChannelFlow(args) | MethodFrameArgs::ChannelFlowOk(args) => {
            fr.put_u8(if args.active { 1 } else { 0 })
        }
        MethodFrameArgs::ChannelClose(args) => {
            fr.put_u16(args.code);
            encode_short_string(&mut fr, &args.text)?;
            fr.put_u16(args.class_id);
            fr.put_u16(args.method_id);
        }
        MethodFrameArgs::ChannelCloseOk => (),
        MethodFrameArgs::ExchangeDeclare(args) => {
            fr.put_u16(0);
            encode_short_string(&mut fr, &args.exchange_name)?;
            encode_short_string(&mut fr, &args.exchange_type)?;
            fr.put_u8(args.flags.bits());
            encode_field_table(&mut fr, args.args.as_ref())?;
        }
        MethodFrameArgs::ExchangeDeclareOk => (),
        MethodFrameArgs::ExchangeDelete(args) => {
            fr.put_u16(0);
            encode_short_string(&mut fr, &args.exchange_name)?;
            fr.put_u8(args.flags.bits());
        }
        MethodFrameArgs::ExchangeDeleteOk => (),
        MethodFrameArgs::QueueDeclare(args) => {
            fr.put_u16(0);
            encode_short_string(&mut fr, &args.name)?;
            fr.put_u8(args.flags.bits());
            encode_field_table(&mut fr, args.args.as_ref())?;
        }
        MethodFrameArgs::QueueDeclareOk(args) => {
            encode_short_string(&mut fr, &args.name)?;
            fr.put_u32(args.message_count);
            fr.put_u32(args.consumer_count);
        }
        MethodFrameArgs::QueueBind(args) => {
            fr.put_u16(0);
            encode_short_string(&mut fr, &args.queue_name)?;
            encode_short_string(&mut fr, &args.exchange_name)?;
            encode_short_string(&mut fr, &args.routing_key)?;
            fr.put_u8(if args.no_wait { 1 } else { 0 });
            encode_field_table(&mut fr, args.args.as_ref())?;
        }
        MethodFrameArgs::QueueBindOk => (),
        MethodFrameArgs::QueuePurge(args) => {
            fr.put_u16(0);
            encode_short_string(&mut fr, &args.queue_name)?;
            fr.put_u8(if args.no_wait { 1 } else { 0 });
        }
        MethodFrameArgs::QueuePurgeOk(args) => fr.put_u32(args.message_count),
        MethodFrameArgs::QueueDelete(args) => {
            fr.put_u16(0);
            encode_short_string(&mut fr, &args.queue_name)?;
            fr.put_u8(args.flags.bits());
        }
        MethodFrameArgs::QueueDeleteOk(args) => fr.put_u32(args.message_count),
        MethodFrameArgs::QueueUnbind(args) => {
            fr.put_u16(0);
            encode_short_string(&mut fr, &args.queue_name)?;
            encode_short_string(&mut fr, &args.exchange_name)?;
            encode_short_string(&mut fr, &args.routing_key)?;
            encode_field_table(&mut fr, args.args.as_ref())?;
        }
        MethodFrameArgs::QueueUnbindOk => (),
        MethodFrameArgs::BasicQos(args) => {
            fr.put_u32(args.prefetch_size);
            fr.put_u16(args.prefetch_count);
            fr.put_u8(if args.global { 1 } else { 0 });
        }
        MethodFrameArgs::BasicQosOk => (),
        MethodFrameArgs::BasicConsume(args) => {
            fr.put_u16(0);
            encode_short_string(&mut fr, &args.queue)?;
            encode_short_string(&mut fr, &args.consumer_tag)?;
            fr.put_u8(args.flags.bits());
            encode_field_table(&mut fr, args.args.as_ref())?;
        }
        MethodFrameArgs::BasicConsumeOk(args) => encode_short_string(&mut fr, &args.consumer_tag)?,
        MethodFrameArgs::BasicCancel(args) => {
            encode_short_string(&mut fr, &args.consumer_tag)?;
            fr.put_u8(if args.no_wait { 1 } else { 0 });
        }
        MethodFrameArgs::BasicCancelOk(args) => encode_short_string(&mut fr, &args.consumer_tag)?,
        MethodFrameArgs::BasicGet(args) => {
            fr.put_u16(0);
            encode_short_string(&mut fr, &args.queue)?;
            fr.put_u8(if args.no_ack { 1 } else { 0 });
        }
        MethodFrameArgs::BasicGetOk(args) => {
            fr.put_u64(args.delivery_tag);
            fr.put_u8(if args.redelivered { 1 } else { 0 });
            encode_short_string(&mut fr, &args.exchange_name)?;
            encode_short_string(&mut fr, &args.routing_key)?;
            fr.put_u32(args.message_count);
        }
        // empty cluster id short string
        MethodFrameArgs::BasicGetEmpty => fr.put_u8(0),
        MethodFrameArgs::BasicPublish(args) => {
            fr.put_u16(0);
            encode_short_string(&mut fr, &args.exchange_name)?;
            encode_short_string(&mut fr, &args.routing_key)?;
            fr.put_u8(args.flags.bits());
        }
        MethodFrameArgs::BasicReturn(args) => {
            fr.put_u16(args.reply_code);
            encode_short_string(&mut fr, &args.reply_text)?;
            encode_short_string(&mut fr, &args.exchange_name)?;
            encode_short_string(&mut fr, &args.routing_key)?;
        }
        MethodFrameArgs::BasicDeliver(args) => {
            encode_short_string(&mut fr, &args.consumer_tag)?;
            fr.put_u64(args.delivery_tag);
            fr.put_u8(if args.redelivered { 1 } else { 0 });
            encode_short_string(&mut fr, &args.exchange_name)?;
            encode_short_string(&mut fr, &args.routing_key)?;
        }
        MethodFrameArgs::BasicAck(args) => {
            fr.put_u64(args.delivery_tag);
            fr.put_u8(if args.multiple { 1 } else { 0 });
        }
        MethodFrameArgs::BasicReject(args) => {
            fr.put_u64(args.delivery_tag);
            fr.put_u8(if args.requeue { 1 } else { 0 });
        }
        MethodFrameArgs::BasicNack(args) => {
            fr.put_u64(args.delivery_tag);
            fr.put_u8(args.flags.bits());
        }
        MethodFrameArgs::BasicRecover(args) => fr.put_u8(if args.requeue { 1 } else { 0 }),
        MethodFrameArgs::BasicRecoverOk => (),
        MethodFrameArgs::ConfirmSelect(args) => fr.put_u8(if args.no_wait { 1 } else { 0 }),
        MethodFrameArgs::ConfirmSelectOk => (),
    }

    buf.reserve(fr.len() + 8);
    buf.put_u8(FRAME_METHOD_FRAME);
    buf.put_u16(channel);
    buf.put_u32(fr.len() as u32);
    buf.put(fr);
    buf.put_u8(FRAME_END);

    Ok(())
}

fn encode_content_header_frame(buf: &mut BytesMut, hf: &ContentHeaderFrame) -> CodecResult<()> {
    let mut fr_buf = BytesMut::with_capacity(128);
    fr_buf.put_u16(hf.class_id);
    fr_buf.put_u16(hf.weight);
    fr_buf.put_u64(hf.body_size);
    fr_buf.put_u16(hf.property_flags().bits());

    if let Some(s) = &hf.content_type {
        encode_short_string(&mut fr_buf, s)?;
    }
    if let Some(s) = &hf.content_encoding {
        encode_short_string(&mut fr_buf, s)?;
    }
    if let Some(headers) = &hf.headers {
        encode_field_table(&mut fr_buf, Some(headers))?;
    }
    if let Some(v) = hf.delivery_mode {
        fr_buf.put_u8(v);
    }
    if let Some(v) = hf.priority {
        fr_buf.put_u8(v);
    }
    if let Some(s) = &hf.correlation_id {
        encode_short_string(&mut fr_buf, s)?;
    }
    if let Some(s) = &hf.reply_to {
        encode_short_string(&mut fr_buf, s)?;
    }
    if let Some(s) = &hf.expiration {
        encode_short_string(&mut fr_buf, s)?;
    }
    if let Some(s) = &hf.message_id {
        encode_short_string(&mut fr_buf, s)?;
    }
    if let Some(v) = hf.timestamp {
        fr_buf.put_u64(v);
    }
    if let Some(s) = &hf.message_type {
        encode_short_string(&mut fr_buf, s)?;
    }
    if let Some(s) = &hf.user_id {
        encode_short_string(&mut fr_buf, s)?;
    }
    if let Some(s) = &hf.app_id {
        encode_short_string(&mut fr_buf, s)?;
    }
    if let Some(s) = &hf.cluster_id {
        encode_short_string(&mut fr_buf, s)?;
    }

    buf.reserve(fr_buf.len() + 8);
    buf.put_u8(FRAME_CONTENT_HEADER);
    buf.put_u16(hf.channel);
    buf.put_u32(fr_buf.len() as u32);
    buf.put(fr_buf);
    buf.put_u8(FRAME_END);

    Ok(())
}

fn encode_content_body_frame(buf: &mut BytesMut, bf: &ContentBodyFrame) {
    buf.reserve(bf.body.len() + 8);
    buf.put_u8(FRAME_CONTENT_BODY);
    buf.put_u16(bf.channel);
    buf.put_u32(bf.body.len() as u32);
    buf.put(bf.body.as_slice());
    buf.put_u8(FRAME_END);
}

fn encode_heartbeat_frame(buf: &mut BytesMut, channel: Channel) {
    buf.put_u8(FRAME_HEARTBEAT);
    buf.put_u16(channel);
    buf.put_u32(0);
    buf.put_u8(FRAME_END);
}

fn encode_short_string(buf: &mut BytesMut, s: &str) -> CodecResult<()> {
    if s.len() > u8::MAX as usize {
        return Err(FrameError {
            code: SYNTAX_ERROR,
            message: format!("Short string is longer than 255 bytes ({} bytes)", s.len()),
        });
    }

    buf.put_u8(s.len() as u8);
    buf.put(s.as_bytes());

    Ok(())
}

fn encode_long_string(buf: &mut BytesMut, s: &str) {
    buf.put_u32(s.len() as u32);
    buf.put(s.as_bytes());
}

fn encode_field_table(buf: &mut BytesMut, ft: Option<&FieldTable>) -> CodecResult<()> {
    match ft {
        None => buf.put_u32(0),
        Some(t) => {
            let mut ft_buf = BytesMut::with_capacity(256);

            for (name, value) in t {
                encode_short_string(&mut ft_buf, name)?;
                encode_value(&mut ft_buf, value)?;
            }

            buf.put_u32(ft_buf.len() as u32);
            buf.put(ft_buf);
        }
    }

    Ok(())
}

fn encode_value(buf: &mut BytesMut, value: &AMQPFieldValue) -> CodecResult<()> {
    match value {
        AMQPFieldValue::Bool(v) => {
            buf.put_u8(b't');
            buf.put_u8(if *v { 1 } else { 0 });
        }
        AMQPFieldValue::ShortShortInt(v) => {
            buf.put_u8(b'b');
            buf.put_i8(*v);
        }
        AMQPFieldValue::ShortShortUInt(v) => {
            buf.put_u8(b'B');
            buf.put_u8(*v);
        }
        AMQPFieldValue::ShortInt(v) => {
            buf.put_u8(b's');
            buf.put_i16(*v);
        }
        AMQPFieldValue::ShortUInt(v) => {
            buf.put_u8(b'u');
            buf.put_u16(*v);
        }
        AMQPFieldValue::LongInt(v) => {
            buf.put_u8(b'I');
            buf.put_i32(*v);
        }
        AMQPFieldValue::LongUInt(v) => {
            buf.put_u8(b'i');
            buf.put_u32(*v);
        }
        AMQPFieldValue::LongLongInt(v) => {
            buf.put_u8(b'l');
            buf.put_i64(*v);
        }
        AMQPFieldValue::Float(v) => {
            buf.put_u8(b'f');
            buf.put_f32(*v);
        }
        AMQPFieldValue::Double(v) => {
            buf.put_u8(b'd');
            buf.put_f64(*v);
        }
        AMQPFieldValue::Decimal(scale, v) => {
            buf.put_u8(b'D');
            buf.put_u8(*scale);
            buf.put_u32(*v);
        }
        AMQPFieldValue::LongString(v) => {
            buf.put_u8(b'S');
            encode_long_string(buf, v);
        }
        AMQPFieldValue::ByteArray(v) => {
            buf.put_u8(b'x');
            buf.put_u32(v.len() as u32);
            buf.put(v.as_slice());
        }
        AMQPFieldValue::FieldArray(values) => {
            let mut array_buf = BytesMut::with_capacity(64);

            for v in values {
                encode_value(&mut array_buf, v)?;
            }

            buf.put_u8(b'A');
            buf.put_u32(array_buf.len() as u32);
            buf.put(array_buf);
        }
        AMQPFieldValue::Timestamp(v) => {
            buf.put_u8(b'T');
            buf.put_u64(*v);
        }
        AMQPFieldValue::FieldTable(v) => {
            buf.put_u8(b'F');
            encode_field_table(buf, Some(v))?;
        }
        AMQPFieldValue::Void => buf.put_u8(b'V'),
    }

    Ok(())
}
