//! Server-list status ping.
//!
//! Packets are framed as `VarInt length ++ VarInt packet id ++ payload`.
//! A probe sends a handshake announcing the status state followed by an
//! empty status request, then reads one status response carrying a JSON
//! document.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;

use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use super::{LivenessProbe, ProbeReport};
use crate::{AppError, Result};

/// Packet id shared by the handshake, status request and status response.
pub const STATUS_PACKET_ID: i32 = 0x00;

/// Handshake `next state` value selecting the status exchange.
const NEXT_STATE_STATUS: i32 = 1;

/// Protocol version announced by the probe; servers answer status pings
/// for any version.
const PROBE_PROTOCOL_VERSION: i32 = -1;

/// Upper bound on an accepted status response frame.
pub const MAX_FRAME_LEN: usize = 256 * 1024;

/// VarInts never exceed five bytes for 32-bit values.
const MAX_VARINT_LEN: usize = 5;

/// Status-ping liveness probe over TCP.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatusPing;

impl LivenessProbe for StatusPing {
    fn probe(
        &self,
        endpoint: SocketAddr,
    ) -> Pin<Box<dyn Future<Output = Result<ProbeReport>> + Send + '_>> {
        Box::pin(async move {
            let mut stream = TcpStream::connect(endpoint)
                .await
                .map_err(|err| AppError::Probe(format!("connect {endpoint}: {err}")))?;

            let mut request = handshake_frame(endpoint)?;
            request.extend_from_slice(&frame_packet(STATUS_PACKET_ID, &[]));
            stream
                .write_all(&request)
                .await
                .map_err(|err| AppError::Probe(format!("write {endpoint}: {err}")))?;

            let body = read_frame(&mut stream).await?;
            let report = parse_status_response(&body)?;
            debug!(%endpoint, online = report.online_players, "status ping answered");
            Ok(report)
        })
    }
}

/// Append the VarInt encoding of `value` to `buf`.
#[allow(clippy::cast_possible_truncation)] // Masked to 7 bits before narrowing.
pub fn encode_varint(value: i32, buf: &mut Vec<u8>) {
    let mut remaining = u32::from_ne_bytes(value.to_ne_bytes());
    loop {
        if remaining & !0x7F == 0 {
            buf.push(remaining as u8);
            return;
        }
        buf.push(((remaining & 0x7F) | 0x80) as u8);
        remaining >>= 7;
    }
}

/// Decode a VarInt from the start of `buf`.
///
/// Returns the value and the number of bytes consumed.
///
/// # Errors
///
/// Returns `AppError::Probe` if `buf` ends mid-value or the value is longer
/// than five bytes.
pub fn decode_varint(buf: &[u8]) -> Result<(i32, usize)> {
    let mut value: u32 = 0;
    for (position, byte) in buf.iter().take(MAX_VARINT_LEN).enumerate() {
        value |= u32::from(byte & 0x7F) << (7 * position);
        if byte & 0x80 == 0 {
            return Ok((i32::from_ne_bytes(value.to_ne_bytes()), position + 1));
        }
    }

    if buf.len() >= MAX_VARINT_LEN {
        Err(AppError::Probe("varint is too long".into()))
    } else {
        Err(AppError::Probe("truncated varint".into()))
    }
}

/// Append a length-prefixed UTF-8 string to `buf`.
///
/// # Errors
///
/// Returns `AppError::Probe` if the string is too long to encode.
pub fn encode_string(value: &str, buf: &mut Vec<u8>) -> Result<()> {
    let len = i32::try_from(value.len())
        .map_err(|_| AppError::Probe("string too long to encode".into()))?;
    encode_varint(len, buf);
    buf.extend_from_slice(value.as_bytes());
    Ok(())
}

/// Frame `payload` as a packet with id `packet_id`.
#[must_use]
pub fn frame_packet(packet_id: i32, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(payload.len() + MAX_VARINT_LEN);
    encode_varint(packet_id, &mut body);
    body.extend_from_slice(payload);

    let mut frame = Vec::with_capacity(body.len() + MAX_VARINT_LEN);
    // Frame bodies built here are far below i32::MAX.
    encode_varint(i32::try_from(body.len()).unwrap_or(i32::MAX), &mut frame);
    frame.extend_from_slice(&body);
    frame
}

fn handshake_frame(endpoint: SocketAddr) -> Result<Vec<u8>> {
    let mut payload = Vec::new();
    encode_varint(PROBE_PROTOCOL_VERSION, &mut payload);
    encode_string(&endpoint.ip().to_string(), &mut payload)?;
    payload.extend_from_slice(&endpoint.port().to_be_bytes());
    encode_varint(NEXT_STATE_STATUS, &mut payload);
    Ok(frame_packet(STATUS_PACKET_ID, &payload))
}

/// Read one length-prefixed frame body from `reader`.
///
/// # Errors
///
/// Returns `AppError::Probe` on I/O failure, a non-positive length, or a
/// length above [`MAX_FRAME_LEN`].
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>> {
    let len = read_varint(reader).await?;
    let len = usize::try_from(len)
        .ok()
        .filter(|len| (1..=MAX_FRAME_LEN).contains(len))
        .ok_or_else(|| AppError::Probe(format!("invalid frame length {len}")))?;

    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|err| AppError::Probe(format!("short frame: {err}")))?;
    Ok(body)
}

async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> Result<i32> {
    let mut raw = Vec::with_capacity(MAX_VARINT_LEN);
    loop {
        let byte = reader
            .read_u8()
            .await
            .map_err(|err| AppError::Probe(format!("read varint: {err}")))?;
        raw.push(byte);
        if byte & 0x80 == 0 || raw.len() == MAX_VARINT_LEN {
            return decode_varint(&raw).map(|(value, _)| value);
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatusDocument {
    #[serde(default)]
    players: Option<StatusPlayers>,
    #[serde(default)]
    version: Option<StatusVersion>,
}

#[derive(Debug, Deserialize)]
struct StatusPlayers {
    online: u32,
    max: u32,
}

#[derive(Debug, Deserialize)]
struct StatusVersion {
    name: String,
}

/// Parse a status response frame body into a report.
///
/// # Errors
///
/// Returns `AppError::Probe` if the packet id is unexpected or the JSON
/// document is malformed.
pub fn parse_status_response(body: &[u8]) -> Result<ProbeReport> {
    let (packet_id, id_len) = decode_varint(body)?;
    if packet_id != STATUS_PACKET_ID {
        return Err(AppError::Probe(format!(
            "unexpected packet id {packet_id:#04x}"
        )));
    }

    let rest = &body[id_len..];
    let (json_len, len_len) = decode_varint(rest)?;
    let json_len = usize::try_from(json_len)
        .map_err(|_| AppError::Probe("negative status length".into()))?;
    let json = rest
        .get(len_len..len_len + json_len)
        .ok_or_else(|| AppError::Probe("truncated status document".into()))?;

    let document: StatusDocument = serde_json::from_slice(json)
        .map_err(|err| AppError::Probe(format!("malformed status document: {err}")))?;

    let (online_players, max_players) = document
        .players
        .map_or((0, None), |players| (players.online, Some(players.max)));

    Ok(ProbeReport {
        online_players,
        max_players,
        version: document.version.map(|version| version.name),
    })
}
