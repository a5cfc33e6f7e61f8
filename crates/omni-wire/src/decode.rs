//! Broker payload decoding.

use prost::Message;
use thiserror::Error;

use crate::schema::EventFrame;

/// Why a broker payload could not be turned into an [`EventFrame`].
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The bytes are not a valid protobuf encoding of `EventFrame`.
    #[error("malformed event frame: {0}")]
    Malformed(#[from] prost::DecodeError),
    /// The frame parsed but carries no payload variant.
    #[error("event frame has no payload")]
    MissingPayload,
}

/// Decode one broker message body.
///
/// Never returns a partially populated frame: truncated or garbage input is
/// [`DecodeError::Malformed`], and a frame without a payload variant (which
/// is what an empty body decodes to) is [`DecodeError::MissingPayload`].
pub fn decode(raw: &[u8]) -> Result<EventFrame, DecodeError> {
    let frame = EventFrame::decode(raw)?;
    if frame.payload.is_none() {
        return Err(DecodeError::MissingPayload);
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AccountUpdate, MarketData, event_frame::Payload};

    fn tick_frame() -> EventFrame {
        EventFrame {
            timestamp_ns: 1_700_000_000_000_000_000,
            source_id: "ctp_real_01".into(),
            payload: Some(Payload::Tick(MarketData {
                symbol: "rb2405".into(),
                exchange: "SHFE".into(),
                last_price: 3_650.0,
                volume: 120,
                open_interest: 88_000.0,
            })),
        }
    }

    #[test]
    fn decodes_valid_frame() {
        let bytes = tick_frame().encode_to_vec();
        let frame = decode(&bytes).unwrap();
        assert_eq!(frame, tick_frame());
    }

    #[test]
    fn empty_body_is_missing_payload() {
        let err = decode(&[]).unwrap_err();
        assert!(matches!(err, DecodeError::MissingPayload));
    }

    #[test]
    fn header_only_frame_is_missing_payload() {
        let frame = EventFrame {
            timestamp_ns: 5,
            source_id: "gw".into(),
            payload: None,
        };
        let err = decode(&frame.encode_to_vec()).unwrap_err();
        assert!(matches!(err, DecodeError::MissingPayload));
    }

    #[test]
    fn truncated_frame_is_malformed() {
        let bytes = tick_frame().encode_to_vec();
        let err = decode(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn garbage_is_malformed() {
        // 0xFF... is an unterminated varint key
        let err = decode(&[0xFF; 11]).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn wrong_wire_type_is_malformed() {
        // field 2 (source_id) sent as varint instead of length-delimited
        let err = decode(&[0x10, 0x01]).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn unknown_fields_are_skipped() {
        let mut bytes = EventFrame {
            timestamp_ns: 9,
            source_id: "acct".into(),
            payload: Some(Payload::Account(AccountUpdate {
                account_id: "A1".into(),
                balance: 10.0,
                available: 5.0,
                frozen: 1.0,
            })),
        }
        .encode_to_vec();
        // field 99, varint 7
        bytes.extend_from_slice(&[0x98, 0x06, 0x07]);
        let frame = decode(&bytes).unwrap();
        assert_eq!(frame.kind(), Some("account"));
    }

    #[test]
    fn error_display() {
        assert_eq!(
            DecodeError::MissingPayload.to_string(),
            "event frame has no payload"
        );
        let err = decode(&[0xFF; 11]).unwrap_err();
        assert!(err.to_string().starts_with("malformed event frame"));
    }
}
