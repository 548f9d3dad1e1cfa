//! Request handlers

use std::net::SocketAddrV4;

use tracing::debug;

use crate::common::{FindValue, Message, RequestSpecific, ResponseSpecific};

use super::RpcInner;

/// Answer a request from another node, synchronously on the receiver thread.
pub(crate) fn handle_request(
    rpc: &RpcInner,
    from: SocketAddrV4,
    token: u64,
    request: RequestSpecific,
) {
    let node = &rpc.node;

    let response = match request {
        RequestSpecific::Ping => ResponseSpecific::Ping,
        RequestSpecific::Store(value) => {
            let digest = node.store(value);
            debug!(?digest, ?from, "Stored value");

            ResponseSpecific::Store
        }
        RequestSpecific::FindNode(target) => {
            ResponseSpecific::FindNode(node.closest_contacts(&target))
        }
        RequestSpecific::FindValue(digest) => match node.lookup_data(&digest) {
            Some(value) => ResponseSpecific::FindValue(FindValue::Value(value)),
            None => ResponseSpecific::FindValue(FindValue::Contacts(
                node.closest_contacts(&digest),
            )),
        },
    };

    rpc.socket
        .send(from, &Message::response(token, *node.id(), response));
}
