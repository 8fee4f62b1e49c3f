//! Fuzz the receive path with arbitrary payloads from arbitrary senders.
//!
//! The controller must never panic, and a completed stroke must never also be
//! listed as in progress.

#![no_main]

use etch_core::SyncController;
use etch_harness::SimEnv;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (u8, Vec<(bool, Vec<u8>)>)| {
    let (seed, payloads) = input;
    let env = SimEnv::with_seed(u64::from(seed));
    let mut controller = SyncController::new(env.clone(), "local");
    controller.activate_surface(1);

    for (from_self, payload) in payloads {
        let sender = if from_self { "local" } else { "remote" };
        controller.handle_payload(&payload, sender);
        env.advance(std::time::Duration::from_millis(50));
        controller.tick();

        for active in controller.store().active_strokes() {
            assert!(controller.store().completed_stroke(&active.id).is_none());
        }
    }
});
