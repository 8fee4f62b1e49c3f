//! Fuzz multi-peer convergence against the reference model.

#![no_main]

use etch_harness::{Operation, run_operations};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (u64, u8, Vec<Operation>)| {
    let (seed, peers, operations) = input;
    let peers = usize::from(peers % 4) + 1;
    if let Err(divergence) = run_operations(seed, peers, &operations) {
        panic!("{divergence}");
    }
});
