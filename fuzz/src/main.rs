//! AFL fuzz target for the wire frame reader.
//!
//! Feeds arbitrary byte strings to the attribute-walk parser used by the
//! dispatcher, by way of a `CmdHeader` parsed straight off the front of the
//! input, so both header decoding and attribute walking are exercised.
unsafe extern "C" {
    fn __AFL_LOOP(cnt: u32) -> i32;
}
use std::io::{self, Read};

use dnode::wire::header::{CMD_HEADER_LEN, CmdHeader};
use dnode::wire::AttrWalk;

const MAX_INPUT: usize = CMD_HEADER_LEN + 16 * 1024;

fn main() {
    let mut data = Vec::with_capacity(MAX_INPUT);
    loop {
        if unsafe { __AFL_LOOP(1000) } == 0 {
            break;
        }
        data.clear();
        if io::stdin().take(MAX_INPUT as u64).read_to_end(&mut data).is_err() {
            return;
        }
        let Some(header_bytes) = data.get(..CMD_HEADER_LEN) else { continue };
        let Ok(header_array) = header_bytes.try_into() else { continue };
        let _header = CmdHeader::from_bytes(&header_array);
        let payload = data.get(CMD_HEADER_LEN..).unwrap_or(&[]);

        // Walking must never panic regardless of payload contents; a
        // truncated or oversized declared attribute size is reported as an
        // error, not a crash.
        for attr in AttrWalk::new(payload) {
            let _ = attr;
        }
    }
}
