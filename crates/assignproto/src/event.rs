use bytes::BufMut;
use bytes::Bytes;
use bytes::BytesMut;

use crate::ProtoError;
use crate::Reader;
use crate::tags;

/// Host tells every peer that `player_id` now holds assignment `uid`.
///
/// Encoding (`EA-Allocation`):
/// - round id: `u8`
/// - player id: `u64` big-endian
/// - uid: `u8` length + utf-8
/// - reward: `i32` big-endian
/// - target count: `u8`, then that many `u64` big-endian target ids
/// - target name: remaining bytes (utf-8)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub round_id: u8,
    pub player_id: u64,
    pub uid: String,
    pub target_ids: Vec<u64>,
    pub reward: i32,
    pub target_name: String,
}

/// Encoding (`EA-Complete`): same as [`Allocation`] without the trailing
/// target name; the target list must end the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Complete {
    pub round_id: u8,
    pub player_id: u64,
    pub uid: String,
    pub target_ids: Vec<u64>,
    pub reward: i32,
}

/// Encoding (`EA-Failed`): round id `u8`, player id `u64`, reason as the
/// remaining utf-8 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failed {
    pub round_id: u8,
    pub player_id: u64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Empty payload.
    Reset,
    Allocation(Allocation),
    Complete(Complete),
    Failed(Failed),
}

impl Event {
    pub fn tag(&self) -> &'static str {
        match self {
            Event::Reset => tags::RESET,
            Event::Allocation(_) => tags::ALLOCATION,
            Event::Complete(_) => tags::COMPLETE,
            Event::Failed(_) => tags::FAILED,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut out = BytesMut::new();
        match self {
            Event::Reset => {}
            Event::Allocation(a) => {
                out.put_u8(a.round_id);
                out.put_u64(a.player_id);
                crate::put_str8(&mut out, &a.uid);
                out.put_i32(a.reward);
                put_targets(&mut out, &a.target_ids);
                out.put_slice(a.target_name.as_bytes());
            }
            Event::Complete(c) => {
                out.put_u8(c.round_id);
                out.put_u64(c.player_id);
                crate::put_str8(&mut out, &c.uid);
                out.put_i32(c.reward);
                put_targets(&mut out, &c.target_ids);
            }
            Event::Failed(f) => {
                out.put_u8(f.round_id);
                out.put_u64(f.player_id);
                out.put_slice(f.reason.as_bytes());
            }
        }
        out.freeze()
    }
}

fn put_targets(out: &mut BytesMut, ids: &[u64]) {
    let n = ids.len().min(u8::MAX as usize);
    out.put_u8(n as u8);
    for id in &ids[..n] {
        out.put_u64(*id);
    }
}

fn read_targets(r: &mut Reader) -> Result<Vec<u64>, ProtoError> {
    let n = r.u8()? as usize;
    let mut ids = Vec::with_capacity(n);
    for _ in 0..n {
        ids.push(r.u64()?);
    }
    Ok(ids)
}

pub fn parse_event(tag: &str, p: Bytes) -> Result<Event, ProtoError> {
    let mut r = Reader::new(p);
    match tag {
        tags::RESET => {
            if !r.is_empty() {
                return Err(ProtoError::Malformed("reset must be empty"));
            }
            Ok(Event::Reset)
        }
        tags::ALLOCATION => {
            let round_id = r.u8()?;
            let player_id = r.u64()?;
            let uid = r.str8()?;
            let reward = r.i32()?;
            let target_ids = read_targets(&mut r)?;
            let target_name = r.rest_str()?;
            Ok(Event::Allocation(Allocation {
                round_id,
                player_id,
                uid,
                target_ids,
                reward,
                target_name,
            }))
        }
        tags::COMPLETE => {
            let round_id = r.u8()?;
            let player_id = r.u64()?;
            let uid = r.str8()?;
            let reward = r.i32()?;
            let target_ids = read_targets(&mut r)?;
            if !r.is_empty() {
                return Err(ProtoError::Malformed("trailing bytes after complete"));
            }
            Ok(Event::Complete(Complete {
                round_id,
                player_id,
                uid,
                target_ids,
                reward,
            }))
        }
        tags::FAILED => {
            let round_id = r.u8()?;
            let player_id = r.u64()?;
            let reason = r.rest_str()?;
            Ok(Event::Failed(Failed {
                round_id,
                player_id,
                reason,
            }))
        }
        _ => Err(ProtoError::UnknownTag(tag.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alloc() -> Allocation {
        Allocation {
            round_id: 3,
            player_id: 42,
            uid: "hunt_kill".to_string(),
            target_ids: vec![9001],
            reward: 200,
            target_name: "BUNKER SPIDER".to_string(),
        }
    }

    #[test]
    fn allocation_layout_is_big_endian() {
        let b = Event::Allocation(alloc()).encode();
        assert_eq!(b[0], 3);
        assert_eq!(&b[1..9], &42u64.to_be_bytes());
        assert_eq!(b[9] as usize, "hunt_kill".len());
        assert_eq!(&b[10..19], b"hunt_kill");
        assert_eq!(&b[19..23], &200i32.to_be_bytes());
        assert_eq!(b[23], 1);
        assert_eq!(&b[24..32], &9001u64.to_be_bytes());
        assert_eq!(&b[32..], b"BUNKER SPIDER");
    }

    #[test]
    fn parses_what_it_encodes() {
        let ev = Event::Allocation(alloc());
        assert_eq!(parse_event(ev.tag(), ev.encode()).unwrap(), ev);

        let ev = Event::Failed(Failed {
            round_id: 1,
            player_id: 2,
            reason: "THE ENEMY WAS NOT KILLED".to_string(),
        });
        assert_eq!(parse_event(tags::FAILED, ev.encode()).unwrap(), ev);
    }

    #[test]
    fn reset_rejects_payload() {
        assert_eq!(
            parse_event(tags::RESET, Bytes::new()).unwrap(),
            Event::Reset
        );
        assert!(matches!(
            parse_event(tags::RESET, Bytes::from_static(b"x")),
            Err(ProtoError::Malformed(_))
        ));
    }

    #[test]
    fn complete_rejects_trailing_bytes() {
        let mut raw = Event::Complete(Complete {
            round_id: 1,
            player_id: 5,
            uid: "collect_scrap".to_string(),
            target_ids: vec![],
            reward: 100,
        })
        .encode()
        .to_vec();
        raw.push(0);
        assert!(matches!(
            parse_event(tags::COMPLETE, Bytes::from(raw)),
            Err(ProtoError::Malformed(_))
        ));
    }

    #[test]
    fn truncated_targets_are_too_short() {
        let b = Event::Allocation(alloc()).encode();
        let cut = b.slice(..28);
        assert!(matches!(
            parse_event(tags::ALLOCATION, cut),
            Err(ProtoError::TooShort { need: 32, got: 28 })
        ));
    }

    #[test]
    fn unknown_tag_is_reported() {
        assert_eq!(
            parse_event("EA-Bonus", Bytes::new()),
            Err(ProtoError::UnknownTag("EA-Bonus".to_string()))
        );
    }
}
