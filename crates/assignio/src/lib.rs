//! `assignio`: frame IO for assignment peers.
//!
//! One frame carries one encoded `assignproto::envelope::Envelope`:
//! `u32` big-endian length + envelope bytes. Writers send the envelope header
//! and payload as separate parts so payloads are never concatenated.

pub mod frame;
