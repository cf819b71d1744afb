//! Edge cases for the attribute-walk stage of dispatch (spec §8 "Parse
//! rejects truncation", "empty payload", "single attribute exactly fills
//! the declared size").

use dnode::attr_cmd::AttrCommand;
use dnode::flags::CmdFlags;
use dnode::oid::Oid;
use dnode::wire::header::{AttrHeader, CmdHeader};
use rstest::rstest;
use test_util::{round_trip, spawn_node};

fn header(size: u64) -> CmdHeader {
    CmdHeader { id: Oid::ZERO, flags: CmdFlags::NEED_ACK, status: 0, size, trans: 1 }
}

#[rstest]
#[case::empty_payload(Vec::new(), true)]
#[case::truncated_attr_header(vec![0u8; 3], false)]
#[case::unknown_attr_command({
    let h = AttrHeader { cmd: AttrCommand::Other(999), size: 0, flags: 0 };
    h.to_bytes().to_vec()
}, false)]
#[tokio::test]
async fn malformed_or_trivial_payloads_never_hang(#[case] payload: Vec<u8>, #[case] expect_ok: bool) {
    let node = spawn_node().await.expect("spawn node");
    let mut client = node.connect().await.expect("connect");

    let req = header(u64::try_from(payload.len()).unwrap());
    let (reply, _) = round_trip(&mut client, &req, &payload).await.expect("ack frame");
    assert_eq!(reply.status == 0, expect_ok);

    node.shutdown().await;
}

#[tokio::test]
async fn single_attribute_exactly_filling_payload_is_accepted() {
    let node = spawn_node().await.expect("spawn node");
    let mut client = node.connect().await.expect("connect");

    let attr_header = AttrHeader { cmd: AttrCommand::Lookup, size: 0, flags: 0 };
    let payload = attr_header.to_bytes().to_vec();
    let req = header(u64::try_from(payload.len()).unwrap());

    let (reply, _) = round_trip(&mut client, &req, &payload).await.expect("lookup reply");
    assert_eq!(reply.status, 0);

    node.shutdown().await;
}
