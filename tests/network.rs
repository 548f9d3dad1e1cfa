//! Lookups and replication across a testnet of loopback nodes.

use std::net::Ipv4Addr;
use std::thread;
use std::time::{Duration, Instant};

use kadnode::{Bytes, Contact, Dht, Id, Testnet, ID_SIZE};

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }

    condition()
}

#[test]
fn lookup_contact_returns_closest_sorted() {
    let testnet = Testnet::new(10).unwrap();
    let target = Id::random();

    let contacts = testnet.nodes[3].lookup_contact(target, 5);

    assert_eq!(contacts.len(), 5);
    for pair in contacts.windows(2) {
        assert!(pair[0].distance(&target) <= pair[1].distance(&target));
    }

    let closest = testnet
        .nodes
        .iter()
        .map(|node| node.id())
        .min_by_key(|id| id.xor(&target))
        .unwrap();

    assert_eq!(contacts[0].id, closest);
}

#[test]
fn lookup_contact_truncates_to_max_count() {
    let testnet = Testnet::new(4).unwrap();

    assert!(testnet.nodes[1].lookup_contact(Id::random(), 2).len() <= 2);
    assert!(testnet.nodes[1].lookup_contact(Id::random(), 0).is_empty());
}

#[test]
fn store_data_replicates_to_other_nodes() {
    let testnet = Testnet::new(8).unwrap();

    let digest = testnet.nodes[1].store_data(&b"Hello World!"[..], 3);
    assert_eq!(digest, Id::digest(b"Hello World!"));

    let stored = wait_until(Duration::from_secs(3), || {
        testnet
            .nodes
            .iter()
            .filter(|node| node.lookup_data_local(digest).is_some())
            .count()
            >= 3
    });
    assert!(stored);

    let value = testnet.nodes[6].lookup_data(digest);
    assert_eq!(value, Some(Bytes::from_static(b"Hello World!")));
}

#[test]
fn lookup_missing_value() {
    let testnet = Testnet::with_request_timeout(5, Duration::from_millis(500)).unwrap();

    assert_eq!(testnet.nodes[2].lookup_data(Id::digest(b"missing")), None);
}

#[test]
fn value_lookup_does_not_wait_for_unreachable_nodes() {
    let timeout = Duration::from_secs(3);
    let port = std::net::UdpSocket::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let node = |address: Ipv4Addr| {
        Dht::builder()
            .bind_address(address)
            .port(port)
            .request_timeout(timeout)
            .build()
            .unwrap()
    };

    let holder = node(Ipv4Addr::new(127, 0, 0, 2));
    let seeker = node(Ipv4Addr::new(127, 0, 0, 1));

    let digest = holder.store_local(&b"straggle"[..]);

    // Two silent contacts closer to the digest than the holder, queried first.
    for (distance, last_octet) in [(1, 50), (2, 51)] {
        let mut xor = [0; ID_SIZE];
        xor[ID_SIZE - 1] = distance;

        seeker.add_contact(Contact::new(
            digest.xor(&Id(xor)),
            Ipv4Addr::new(127, 0, 0, last_octet),
        ));
    }
    seeker.add_contact(Contact::new(holder.id(), Ipv4Addr::new(127, 0, 0, 2)));

    let start = Instant::now();
    let value = seeker.lookup_data(digest);

    assert_eq!(value, Some(Bytes::from_static(b"straggle")));
    assert!(start.elapsed() < timeout);

    holder.shutdown();
    seeker.shutdown();
}

#[test]
fn late_node_joins_testnet() {
    let testnet = Testnet::new(5).unwrap();

    let late = testnet.node(5).unwrap();
    assert!(late.bootstrap(&testnet.bootstrap));
    assert!(late.routing_table_size() >= 4);

    let digest = testnet.nodes[4].store_local(&b"late"[..]);
    assert_eq!(late.lookup_data(digest), Some(Bytes::from_static(b"late")));

    late.shutdown();
}

#[test]
fn ping_unreachable_node_times_out() {
    let timeout = Duration::from_millis(300);
    let dht = Dht::builder()
        .bind_address(Ipv4Addr::LOCALHOST)
        .port(0)
        .request_timeout(timeout)
        .build()
        .unwrap();

    let start = Instant::now();
    assert!(!dht.ping(Ipv4Addr::new(127, 0, 0, 250)));
    assert!(start.elapsed() >= timeout);

    dht.shutdown();
}
