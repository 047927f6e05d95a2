//! UDS frame codec: typed bodies <-> raw bytes.
//!
//! A frame is one reassembled ISO-TP payload. The first byte is the
//! service id: `0x7F` introduces a negative response (rejected sid +
//! reason code), a sid carrying the `0x40` positive-response offset is a
//! positive response to the sid below it, anything else is a request.
//! Body layouts are the vendor's fixed forms (4-byte addresses, 2-byte
//! lengths, big-endian).

use super::service_id::{NEGATIVE_RESPONSE, POSITIVE_OFFSET};
use super::{CodecError, NegativeResponseCode, ServiceKind, ServiceRegistry};

/// Which way a frame travels on the bus, from the tester's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outbound,
    Inbound,
}

/// A decoded frame: where it was seen, which way it was going, and what
/// it carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub address: u32,
    pub direction: Direction,
    pub body: FrameBody,
}

/// The tagged union of everything a frame can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameBody {
    Request(Request),
    Response(Response),
    Negative(NegativeResponse),
    /// Registered sid seen in a direction that makes no sense for it
    /// (another tester's request, an echo). Kept for bus debugging,
    /// dropped by the dispatch loop.
    Unknown(Vec<u8>),
}

/// Service rejection: the sid the ECU refused plus its reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegativeResponse {
    pub rejected_sid: u8,
    pub code: NegativeResponseCode,
}

/// A typed UDS request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    SessionControl { session: u8 },
    EcuReset { reset_type: u8 },
    ReadDataById { dids: Vec<u16> },
    ReadMemory { address: u32, length: u16 },
    SecuritySeed { level: u8 },
    SecurityKey { level: u8, key: Vec<u8> },
    WriteMemory { address: u32, data: Vec<u8> },
    TesterPresent { suppress_response: bool },
}

impl Request {
    pub fn kind(&self) -> ServiceKind {
        match self {
            Request::SessionControl { .. } => ServiceKind::SessionControl,
            Request::EcuReset { .. } => ServiceKind::EcuReset,
            Request::ReadDataById { .. } => ServiceKind::ReadDataById,
            Request::ReadMemory { .. } => ServiceKind::ReadMemory,
            Request::SecuritySeed { .. } | Request::SecurityKey { .. } => {
                ServiceKind::SecurityAccess
            }
            Request::WriteMemory { .. } => ServiceKind::WriteMemory,
            Request::TesterPresent { .. } => ServiceKind::TesterPresent,
        }
    }

    /// False for requests that suppress their positive response
    /// (broadcast keep-alive); the transaction completes immediately.
    pub fn expects_response(&self) -> bool {
        !matches!(
            self,
            Request::TesterPresent {
                suppress_response: true
            }
        )
    }

    fn encode_body(&self, out: &mut Vec<u8>) {
        match self {
            Request::SessionControl { session } => out.push(*session),
            Request::EcuReset { reset_type } => out.push(*reset_type),
            Request::ReadDataById { dids } => {
                for did in dids {
                    out.extend_from_slice(&did.to_be_bytes());
                }
            }
            Request::ReadMemory { address, length } => {
                out.extend_from_slice(&address.to_be_bytes());
                out.extend_from_slice(&length.to_be_bytes());
            }
            Request::SecuritySeed { level } => out.push(*level),
            Request::SecurityKey { level, key } => {
                out.push(*level);
                out.extend_from_slice(key);
            }
            Request::WriteMemory { address, data } => {
                out.extend_from_slice(&address.to_be_bytes());
                out.extend_from_slice(&(data.len() as u16).to_be_bytes());
                out.extend_from_slice(data);
            }
            Request::TesterPresent { suppress_response } => {
                out.push(if *suppress_response { 0x80 } else { 0x00 });
            }
        }
    }

    fn decode_body(kind: ServiceKind, frame: &[u8], body: &[u8]) -> Result<Self, CodecError> {
        let malformed = |reason| CodecError::malformed("request", frame, reason);
        match kind {
            ServiceKind::SessionControl => match body {
                [session] => Ok(Request::SessionControl { session: *session }),
                _ => Err(malformed("expected one session byte")),
            },
            ServiceKind::EcuReset => match body {
                [reset_type] => Ok(Request::EcuReset {
                    reset_type: *reset_type,
                }),
                _ => Err(malformed("expected one reset-type byte")),
            },
            ServiceKind::ReadDataById => {
                if body.is_empty() || body.len() % 2 != 0 {
                    return Err(malformed("expected a list of 2-byte identifiers"));
                }
                let dids = body
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                Ok(Request::ReadDataById { dids })
            }
            ServiceKind::ReadMemory => match body {
                [a0, a1, a2, a3, l0, l1] => Ok(Request::ReadMemory {
                    address: u32::from_be_bytes([*a0, *a1, *a2, *a3]),
                    length: u16::from_be_bytes([*l0, *l1]),
                }),
                _ => Err(malformed("expected 4-byte address + 2-byte length")),
            },
            ServiceKind::SecurityAccess => match body {
                [] => Err(malformed("expected a security level byte")),
                [level] if level % 2 == 1 => Ok(Request::SecuritySeed { level: *level }),
                [level, key @ ..] if level % 2 == 0 => Ok(Request::SecurityKey {
                    level: *level,
                    key: key.to_vec(),
                }),
                _ => Err(malformed("seed requests carry no key bytes")),
            },
            ServiceKind::WriteMemory => {
                if body.len() < 6 {
                    return Err(malformed("expected 4-byte address + 2-byte length + data"));
                }
                let address = u32::from_be_bytes([body[0], body[1], body[2], body[3]]);
                let length = u16::from_be_bytes([body[4], body[5]]) as usize;
                let data = &body[6..];
                if data.len() != length {
                    return Err(malformed("declared length disagrees with payload"));
                }
                Ok(Request::WriteMemory {
                    address,
                    data: data.to_vec(),
                })
            }
            ServiceKind::TesterPresent => match body {
                [sub] => Ok(Request::TesterPresent {
                    suppress_response: sub & 0x80 != 0,
                }),
                _ => Err(malformed("expected one sub-function byte")),
            },
        }
    }
}

/// A typed UDS positive-response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    SessionControl { session: u8, parameters: Vec<u8> },
    EcuReset { reset_type: u8 },
    ReadDataById { did: u16, data: Vec<u8> },
    ReadMemory { data: Vec<u8> },
    SecuritySeed { level: u8, seed: Vec<u8> },
    SecurityKey { level: u8 },
    WriteMemory { address: u32, length: u16 },
    TesterPresent,
}

impl Response {
    /// The kind of the request this response answers; this is the
    /// response -> request mapping the dispatch loop matches with.
    pub fn kind(&self) -> ServiceKind {
        match self {
            Response::SessionControl { .. } => ServiceKind::SessionControl,
            Response::EcuReset { .. } => ServiceKind::EcuReset,
            Response::ReadDataById { .. } => ServiceKind::ReadDataById,
            Response::ReadMemory { .. } => ServiceKind::ReadMemory,
            Response::SecuritySeed { .. } | Response::SecurityKey { .. } => {
                ServiceKind::SecurityAccess
            }
            Response::WriteMemory { .. } => ServiceKind::WriteMemory,
            Response::TesterPresent => ServiceKind::TesterPresent,
        }
    }

    fn encode_body(&self, out: &mut Vec<u8>) {
        match self {
            Response::SessionControl {
                session,
                parameters,
            } => {
                out.push(*session);
                out.extend_from_slice(parameters);
            }
            Response::EcuReset { reset_type } => out.push(*reset_type),
            Response::ReadDataById { did, data } => {
                out.extend_from_slice(&did.to_be_bytes());
                out.extend_from_slice(data);
            }
            Response::ReadMemory { data } => out.extend_from_slice(data),
            Response::SecuritySeed { level, seed } => {
                out.push(*level);
                out.extend_from_slice(seed);
            }
            Response::SecurityKey { level } => out.push(*level),
            Response::WriteMemory { address, length } => {
                out.extend_from_slice(&address.to_be_bytes());
                out.extend_from_slice(&length.to_be_bytes());
            }
            Response::TesterPresent => out.push(0x00),
        }
    }

    fn decode_body(kind: ServiceKind, frame: &[u8], body: &[u8]) -> Result<Self, CodecError> {
        let malformed = |reason| CodecError::malformed("response", frame, reason);
        match kind {
            ServiceKind::SessionControl => match body {
                [session, parameters @ ..] => Ok(Response::SessionControl {
                    session: *session,
                    parameters: parameters.to_vec(),
                }),
                _ => Err(malformed("expected a session byte")),
            },
            ServiceKind::EcuReset => match body {
                [reset_type] => Ok(Response::EcuReset {
                    reset_type: *reset_type,
                }),
                _ => Err(malformed("expected one reset-type byte")),
            },
            ServiceKind::ReadDataById => {
                if body.len() < 2 {
                    return Err(malformed("expected a 2-byte identifier"));
                }
                Ok(Response::ReadDataById {
                    did: u16::from_be_bytes([body[0], body[1]]),
                    data: body[2..].to_vec(),
                })
            }
            ServiceKind::ReadMemory => Ok(Response::ReadMemory {
                data: body.to_vec(),
            }),
            ServiceKind::SecurityAccess => match body {
                [] => Err(malformed("expected a security level byte")),
                [level, seed @ ..] if level % 2 == 1 => Ok(Response::SecuritySeed {
                    level: *level,
                    seed: seed.to_vec(),
                }),
                [level] => Ok(Response::SecurityKey { level: *level }),
                _ => Err(malformed("key acknowledgement carries no data")),
            },
            ServiceKind::WriteMemory => match body {
                [a0, a1, a2, a3, l0, l1] => Ok(Response::WriteMemory {
                    address: u32::from_be_bytes([*a0, *a1, *a2, *a3]),
                    length: u16::from_be_bytes([*l0, *l1]),
                }),
                _ => Err(malformed("expected echoed address + length")),
            },
            ServiceKind::TesterPresent => match body {
                [] | [0x00] => Ok(Response::TesterPresent),
                _ => Err(malformed("unexpected sub-function echo")),
            },
        }
    }
}

/// Serialize a request for the wire.
pub fn encode_request(registry: &ServiceRegistry, request: &Request) -> Result<Vec<u8>, CodecError> {
    let sid = registry.sid(request.kind())?;
    let mut out = vec![sid];
    request.encode_body(&mut out);
    Ok(out)
}

/// Serialize a positive response for the wire (used by ECU simulators and
/// test fixtures; the tester side only decodes these).
pub fn encode_response(
    registry: &ServiceRegistry,
    response: &Response,
) -> Result<Vec<u8>, CodecError> {
    let sid = registry.sid(response.kind())?;
    let mut out = vec![sid.wrapping_add(POSITIVE_OFFSET)];
    response.encode_body(&mut out);
    Ok(out)
}

/// Serialize a negative response for the wire (ECU simulators).
pub fn encode_negative(negative: &NegativeResponse) -> Vec<u8> {
    vec![
        NEGATIVE_RESPONSE,
        negative.rejected_sid,
        negative.code.into(),
    ]
}

/// Decode one raw frame into its typed body.
pub fn decode(
    registry: &ServiceRegistry,
    address: u32,
    direction: Direction,
    data: &[u8],
) -> Result<Frame, CodecError> {
    let first = *data
        .first()
        .ok_or_else(|| CodecError::malformed("empty", data, "zero-length frame"))?;

    let body = if first == NEGATIVE_RESPONSE {
        match data {
            [_, rejected_sid, code] => FrameBody::Negative(NegativeResponse {
                rejected_sid: *rejected_sid,
                code: NegativeResponseCode::from(*code),
            }),
            _ => {
                return Err(CodecError::malformed(
                    "negative response",
                    data,
                    "expected rejected sid + reason byte",
                ))
            }
        }
    } else if let Some(kind) = first
        .checked_sub(POSITIVE_OFFSET)
        .and_then(|sid| registry.kind_of(sid))
    {
        FrameBody::Response(Response::decode_body(kind, data, &data[1..])?)
    } else if let Some(kind) = registry.kind_of(first) {
        match direction {
            Direction::Outbound => {
                FrameBody::Request(Request::decode_body(kind, data, &data[1..])?)
            }
            // A request sid arriving at the tester is someone else's
            // traffic; keep the bytes but don't interpret them.
            Direction::Inbound => FrameBody::Unknown(data.to_vec()),
        }
    } else {
        return Err(CodecError::UnknownService {
            sid: first,
            frame: hex::encode_upper(data),
        });
    };

    Ok(Frame {
        address,
        direction,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ServiceRegistry {
        ServiceRegistry::standard()
    }

    fn roundtrip(request: Request) {
        let bytes = encode_request(&registry(), &request).unwrap();
        let frame = decode(&registry(), 0x7E0, Direction::Outbound, &bytes).unwrap();
        assert_eq!(frame.body, FrameBody::Request(request));
    }

    #[test]
    fn requests_roundtrip_for_every_service() {
        roundtrip(Request::SessionControl { session: 0x03 });
        roundtrip(Request::EcuReset { reset_type: 0x01 });
        roundtrip(Request::ReadDataById {
            dids: vec![0xF190, 0xF40C],
        });
        roundtrip(Request::ReadMemory {
            address: 0xFFFF_6000,
            length: 0x80,
        });
        roundtrip(Request::SecuritySeed { level: 0x01 });
        roundtrip(Request::SecurityKey {
            level: 0x02,
            key: vec![0x98, 0xA4, 0x9D, 0xE7],
        });
        roundtrip(Request::WriteMemory {
            address: 0x0002_0000,
            data: vec![1, 2, 3],
        });
        roundtrip(Request::TesterPresent {
            suppress_response: false,
        });
        roundtrip(Request::TesterPresent {
            suppress_response: true,
        });
    }

    #[test]
    fn positive_responses_decode_by_offset() {
        let bytes = [0x63, 0xAA, 0xBB];
        let frame = decode(&registry(), 0x7E8, Direction::Inbound, &bytes).unwrap();
        assert_eq!(
            frame.body,
            FrameBody::Response(Response::ReadMemory {
                data: vec![0xAA, 0xBB]
            })
        );
    }

    #[test]
    fn seed_and_key_responses_split_on_level_parity() {
        let seed = decode(&registry(), 0, Direction::Inbound, &[0x67, 0x01, 1, 2, 3, 4]).unwrap();
        assert_eq!(
            seed.body,
            FrameBody::Response(Response::SecuritySeed {
                level: 0x01,
                seed: vec![1, 2, 3, 4]
            })
        );

        let ack = decode(&registry(), 0, Direction::Inbound, &[0x67, 0x02]).unwrap();
        assert_eq!(
            ack.body,
            FrameBody::Response(Response::SecurityKey { level: 0x02 })
        );
    }

    #[test]
    fn negative_response_frames() {
        let frame = decode(&registry(), 0, Direction::Inbound, &[0x7F, 0x27, 0x35]).unwrap();
        assert_eq!(
            frame.body,
            FrameBody::Negative(NegativeResponse {
                rejected_sid: 0x27,
                code: NegativeResponseCode::InvalidKey,
            })
        );

        assert!(decode(&registry(), 0, Direction::Inbound, &[0x7F, 0x27]).is_err());
    }

    #[test]
    fn unknown_sid_is_a_loud_decode_error() {
        let err = decode(&registry(), 0, Direction::Inbound, &[0x99, 0x00]).unwrap_err();
        assert!(matches!(err, CodecError::UnknownService { sid: 0x99, .. }));
    }

    #[test]
    fn malformed_bodies_identify_the_frame_in_hex() {
        let err = decode(&registry(), 0, Direction::Outbound, &[0x23, 0x01]).unwrap_err();
        match err {
            CodecError::Malformed { frame, .. } => assert_eq!(frame, "2301"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn inbound_request_sids_fall_back_to_unknown() {
        let frame = decode(&registry(), 0, Direction::Inbound, &[0x10, 0x03]).unwrap();
        assert_eq!(frame.body, FrameBody::Unknown(vec![0x10, 0x03]));
    }

    #[test]
    fn write_memory_length_must_match_payload() {
        // Declares 3 bytes, carries 2.
        let bytes = [0x3D, 0, 0, 0, 0, 0, 3, 0xAA, 0xBB];
        assert!(decode(&registry(), 0, Direction::Outbound, &bytes).is_err());
    }

    #[test]
    fn remapped_variant_encodes_with_the_oem_sid() {
        let variant = registry().remap(ServiceKind::ReadMemory, 0x3C).unwrap();
        let bytes = encode_request(
            &variant,
            &Request::ReadMemory {
                address: 0x1000,
                length: 4,
            },
        )
        .unwrap();
        assert_eq!(bytes[0], 0x3C);
        // The standard sid no longer decodes in this variant.
        assert!(decode(&variant, 0, Direction::Outbound, &[0x23, 0, 0, 0, 0, 0, 4]).is_err());
    }
}
