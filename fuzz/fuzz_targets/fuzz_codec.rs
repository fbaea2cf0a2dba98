#![no_main]

use bytes::BytesMut;
use gamercon::core::codec::PacketCodec;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Drain the stream codec until it needs more bytes or rejects the input
    let mut codec = PacketCodec::with_max_frame_size(64 * 1024);
    let mut buf = BytesMut::from(data);
    while let Ok(Some(_)) = codec.decode(&mut buf) {}
});
