//! Allocation audit for the processing path.
//!
//! The contract: between workspace initialisation and teardown, no core
//! operation may touch the heap. A counting allocator wrapping the system
//! allocator enforces it - any encode/modulate/demodulate/decode call that
//! allocates fails this suite.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU64, Ordering};

use lora_phy::prelude::*;

struct CountingAllocator;

static ALLOCATIONS: AtomicU64 = AtomicU64::new(0);

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        ALLOCATIONS.fetch_add(1, Ordering::SeqCst);
        System.alloc(layout)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout)
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        ALLOCATIONS.fetch_add(1, Ordering::SeqCst);
        System.realloc(ptr, layout, new_size)
    }
}

#[global_allocator]
static ALLOCATOR: CountingAllocator = CountingAllocator;

fn allocation_count() -> u64 {
    ALLOCATIONS.load(Ordering::SeqCst)
}

#[test]
fn processing_path_does_not_allocate() {
    let params = LoraParams::builder()
        .spreading_factor(7)
        .bandwidth(125_000)
        .oversample(1)
        .build();
    let n = params.chips_per_symbol();
    let step = params.samples_per_symbol();

    // Setup allocates freely: buffers, workspace, payload.
    let payload = [0xDEu8, 0xAD, 0xBE, 0xEF];
    let mut fft_in = vec![IQSample::new(0.0, 0.0); n];
    let mut fft_out = vec![IQSample::new(0.0, 0.0); n];
    let mut scratch = vec![IQSample::new(0.0, 0.0); 10 * step];
    let mut symbols = [0u16; 8];
    let mut recovered = [0u16; 8];
    let mut bytes = [0u8; 4];
    let mut iq = vec![IQSample::new(0.0, 0.0); 10 * step];

    let mut ws = Workspace::init(
        WorkspaceBuffers {
            fft_in: &mut fft_in,
            fft_out: &mut fft_out,
            window: None,
            scratch: Some(&mut scratch),
        },
        &params,
    )
    .expect("workspace init");

    // From here on the core path must stay off the heap.
    let before = allocation_count();

    let count = ws.encode(&payload, &mut symbols).expect("encode");
    let samples = ws.modulate(&symbols[..count], &mut iq).expect("modulate");
    let produced = ws
        .demodulate(&iq[..samples], &mut recovered)
        .expect("demodulate");
    let decoded = ws
        .decode(&recovered[..produced], &mut bytes)
        .expect("decode");

    let after = allocation_count();
    assert_eq!(
        after - before,
        0,
        "core processing path must not allocate"
    );

    // The work itself really happened.
    assert_eq!(decoded, 4);
    assert_eq!(bytes, payload);
}

#[test]
fn normalizing_demodulate_does_not_allocate() {
    let params = LoraParams::builder().spreading_factor(7).build();
    let n = params.chips_per_symbol();
    let step = params.samples_per_symbol();

    let mut fft_in = vec![IQSample::new(0.0, 0.0); n];
    let mut fft_out = vec![IQSample::new(0.0, 0.0); n];
    let mut scratch = vec![IQSample::new(0.0, 0.0); 4 * step];
    let mut iq = vec![IQSample::new(0.0, 0.0); 4 * step];
    let symbols = [17u16, 101];
    let mut recovered = [0u16; 2];

    let mut ws = Workspace::init(
        WorkspaceBuffers {
            fft_in: &mut fft_in,
            fft_out: &mut fft_out,
            window: None,
            scratch: Some(&mut scratch),
        },
        &params,
    )
    .expect("workspace init");

    ws.modulate(&symbols, &mut iq).expect("modulate");
    for samp in iq.iter_mut() {
        *samp *= 4.0; // force the renormalisation path through scratch
    }

    let before = allocation_count();
    let produced = ws.demodulate(&iq, &mut recovered).expect("demodulate");
    assert_eq!(allocation_count() - before, 0);

    assert_eq!(produced, 2);
    assert_eq!(recovered, symbols);
}
