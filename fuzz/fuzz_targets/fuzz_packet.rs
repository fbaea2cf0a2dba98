#![no_main]

use gamercon::core::packet::{Packet, PacketKind};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Frame decoding must never panic, whichever kind was sent last
    let _ = Packet::from_bytes(data, PacketKind::Command);
    let _ = Packet::from_bytes(data, PacketKind::Auth);
    let _ = Packet::from_body(data, PacketKind::Command);
});
