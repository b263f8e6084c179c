use sha2::Digest;
use sha2::Sha256;

pub const GENESIS_HASH: &str = "genesis";

#[derive(Debug, Clone)]
pub struct TotalOrderEvent {
    pub order_position: u64,
    pub event_envelope: Vec<u8>,
    pub committed_at_nanos: i64,
    pub commit_hash: String,
    pub previous_hash: String,
    pub loop_id: Option<String>,
}

impl TotalOrderEvent {
    /// `commit_hash = H(position ‖ previous_hash ‖ envelope ‖ committed_at ‖ loop_id)`.
    pub fn compute_hash(
        position: u64,
        previous_hash: &str,
        envelope: &[u8],
        committed_at_nanos: i64,
        loop_id: Option<&str>,
    ) -> String {
        let mut buf = Vec::new();
        buf.extend_from_slice(&position.to_be_bytes());
        buf.extend_from_slice(previous_hash.as_bytes());
        buf.extend_from_slice(envelope);
        buf.extend_from_slice(&committed_at_nanos.to_be_bytes());
        buf.extend_from_slice(loop_id.unwrap_or("").as_bytes());
        format!("sha256:{}", hex::encode(Sha256::digest(&buf)))
    }

    pub fn recomputed_hash(&self) -> String {
        Self::compute_hash(
            self.order_position,
            &self.previous_hash,
            &self.event_envelope,
            self.committed_at_nanos,
            self.loop_id.as_deref(),
        )
    }
}

/// Self-framed durable record: a 4-byte big-endian length prefix
/// followed by `(position | prev_hash | envelope_bytes | committed_at_nanos
/// | loop_id | commit_hash)`.
pub fn encode_record(event: &TotalOrderEvent) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&event.order_position.to_be_bytes());
    write_lp_string(&mut body, &event.previous_hash);
    write_lp_bytes(&mut body, &event.event_envelope);
    body.extend_from_slice(&event.committed_at_nanos.to_be_bytes());
    write_lp_string(&mut body, event.loop_id.as_deref().unwrap_or(""));
    write_lp_string(&mut body, &event.commit_hash);

    let mut framed = Vec::with_capacity(body.len() + 4);
    framed.extend_from_slice(&(body.len() as u32).to_be_bytes());
    framed.extend_from_slice(&body);
    framed
}

pub fn decode_record(bytes: &[u8]) -> Option<(TotalOrderEvent, usize)> {
    if bytes.len() < 4 {
        return None;
    }
    let len = u32::from_be_bytes(bytes[0..4].try_into().ok()?) as usize;
    let body = bytes.get(4..4 + len)?;
    let mut cursor = 0usize;

    let order_position = u64::from_be_bytes(body.get(cursor..cursor + 8)?.try_into().ok()?);
    cursor += 8;
    let (previous_hash, consumed) = read_lp_string(body, cursor)?;
    cursor = consumed;
    let (event_envelope, consumed) = read_lp_bytes(body, cursor)?;
    cursor = consumed;
    let committed_at_nanos = i64::from_be_bytes(body.get(cursor..cursor + 8)?.try_into().ok()?);
    cursor += 8;
    let (loop_id_raw, consumed) = read_lp_string(body, cursor)?;
    cursor = consumed;
    let (commit_hash, _) = read_lp_string(body, cursor)?;

    let loop_id = if loop_id_raw.is_empty() {
        None
    } else {
        Some(loop_id_raw)
    };

    Some((
        TotalOrderEvent {
            order_position,
            event_envelope,
            committed_at_nanos,
            commit_hash,
            previous_hash,
            loop_id,
        },
        4 + len,
    ))
}

fn write_lp_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

fn write_lp_string(out: &mut Vec<u8>, s: &str) {
    write_lp_bytes(out, s.as_bytes());
}

fn read_lp_bytes(body: &[u8], at: usize) -> Option<(Vec<u8>, usize)> {
    let len = u32::from_be_bytes(body.get(at..at + 4)?.try_into().ok()?) as usize;
    let start = at + 4;
    let data = body.get(start..start + len)?.to_vec();
    Some((data, start + len))
}

fn read_lp_string(body: &[u8], at: usize) -> Option<(String, usize)> {
    let (bytes, next) = read_lp_bytes(body, at)?;
    Some((String::from_utf8(bytes).ok()?, next))
}
