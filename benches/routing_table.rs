//! Micro-benchmarks for RoutingTable operations: add, closest, and remove
//! at varying table sizes. Reports nanoseconds-per-operation.
//!
//! Run: `cargo bench --bench routing_table`

use std::net::Ipv4Addr;
use std::time::Instant;

use kadnode::{Contact, Id, RoutingTable, MAX_BUCKET_SIZE_K};

fn main() {
    println!("routing_table\n");

    bench_add();
    bench_closest();
    bench_remove();
}

fn contacts(count: usize) -> Vec<Contact> {
    (0..count)
        .map(|i| Contact::new(Id::random(), Ipv4Addr::from(i as u32)))
        .collect()
}

fn bench_add() {
    println!("add");

    let fresh = contacts(1000);

    for prefill in [0, 100, 400] {
        let mut table = RoutingTable::new(Id::random());
        for contact in contacts(prefill) {
            table.add(contact);
        }

        let start = Instant::now();
        for contact in fresh.iter().copied() {
            table.add(contact);
        }
        let per_op = start.elapsed().as_nanos() / fresh.len() as u128;
        println!(
            "{prefill:>3} contacts: {per_op}ns/op (final size: {})",
            table.size()
        );
    }

    // Re-adding known contacts moves them to the tail of their bucket.
    {
        let known = contacts(200);
        let mut table = RoutingTable::new(Id::random());
        for contact in known.iter().copied() {
            table.add(contact);
        }

        let start = Instant::now();
        for contact in known.iter().copied() {
            table.add(contact);
        }
        let per_op = start.elapsed().as_nanos() / known.len() as u128;
        println!("refresh:      {per_op}ns/op");
    }

    println!();
}

fn bench_closest() {
    println!("closest");

    let targets: Vec<_> = (0..1000).map(|_| Id::random()).collect();

    for size in [50, 100, 200, 400] {
        let mut table = RoutingTable::new(Id::random());
        for contact in contacts(size) {
            table.add(contact);
        }

        let start = Instant::now();
        for target in &targets {
            let _ = table.closest(target, MAX_BUCKET_SIZE_K);
        }
        let per_op = start.elapsed().as_nanos() / targets.len() as u128;
        println!("{size:>3} contacts: {per_op}ns/op");
    }

    println!();
}

fn bench_remove() {
    println!("remove");

    let mut table = RoutingTable::new(Id::random());
    let known = contacts(200);
    for contact in known.iter().copied() {
        table.add(contact);
    }

    let n = known.len();
    let start = Instant::now();
    for contact in &known {
        table.remove(&contact.id);
    }
    let per_op = start.elapsed().as_nanos() / n as u128;
    println!("{per_op}ns/op ({n} removals)");
    println!();
}
