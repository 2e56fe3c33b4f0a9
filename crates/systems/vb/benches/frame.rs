use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use emu_core::{Cpu, System};
use emu_vb::bus::VbBus;
use emu_vb::cartridge::Cartridge;
use emu_vb::cpu::V810;
use emu_vb::VbSystem;

/// 64 KiB image: the reset vector jumps into a small arithmetic loop.
fn loop_rom() -> Vec<u8> {
    let mut rom = vec![0u8; 0x10000];

    let put = |rom: &mut Vec<u8>, offset: usize, words: &[u16]| {
        for (i, w) in words.iter().enumerate() {
            rom[offset + i * 2..offset + i * 2 + 2].copy_from_slice(&w.to_le_bytes());
        }
    };

    // Reset vector at offset 0xFFF0: JR back to 0x8000.
    // disp26 = -0x7FF0
    put(&mut rom, 0xFFF0, &[0xABFF, 0x8010]);

    // Loop body at 0x8000:
    //   MOVHI 0x0500, r0, r1   (r1 -> WRAM)
    //   ADD 1, r2
    //   ST.H r2, 0[r1]
    //   LD.H 0[r1], r3
    //   BR -12
    put(
        &mut rom,
        0x8000,
        &[
            0xBC20, 0x0500, // MOVHI
            0x4441, // ADD 1, r2
            0xD441, 0x0000, // ST.H r2, 0[r1]
            0xC461, 0x0000, // LD.H 0[r1], r3
            0x8BF4, // BR -12
        ],
    );
    rom
}

/// Image whose reset vector halts immediately; frames run on the
/// scheduler alone.
fn halt_rom() -> Vec<u8> {
    let mut rom = vec![0u8; 0x10000];
    let halt: u16 = 0x1A << 10;
    rom[0xFFF0..0xFFF2].copy_from_slice(&halt.to_le_bytes());
    rom
}

fn bench_bus_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("bus_dispatch");

    let mut bus = VbBus::new();
    bus.set_cartridge(Some(Cartridge::load(&loop_rom()).unwrap()));

    group.bench_function("wram_read16", |b| {
        let mut ts = 0;
        b.iter(|| black_box(bus.read16(&mut ts, black_box(0x0500_1234))));
    });

    group.bench_function("rom_read16", |b| {
        let mut ts = 0;
        b.iter(|| black_box(bus.read16(&mut ts, black_box(0x0700_8000))));
    });

    group.bench_function("hwctrl_read8", |b| {
        let mut ts = 0;
        b.iter(|| black_box(bus.read8(&mut ts, black_box(0x0200_0024))));
    });

    group.finish();
}

fn bench_cpu_steps(c: &mut Criterion) {
    let mut group = c.benchmark_group("v810_steps");

    for step_count in [100, 1000, 10000].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(step_count),
            step_count,
            |b, &count| {
                let mut bus = VbBus::new();
                bus.set_cartridge(Some(Cartridge::load(&loop_rom()).unwrap()));
                let mut cpu = V810::new(bus);
                b.iter(|| {
                    cpu.reset();
                    for _ in 0..count {
                        cpu.step();
                    }
                    black_box(cpu.step());
                });
            },
        );
    }

    group.finish();
}

fn bench_step_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("step_frame");
    group.sample_size(20);

    group.bench_function("idle_frame", |b| {
        let mut sys = VbSystem::new();
        sys.mount("Cartridge", &halt_rom()).unwrap();
        b.iter(|| {
            let frame = sys.step_frame().unwrap();
            black_box(frame.pixels[0]);
            black_box(sys.take_audio());
        });
    });

    group.bench_function("busy_frame", |b| {
        let mut sys = VbSystem::new();
        sys.mount("Cartridge", &loop_rom()).unwrap();
        b.iter(|| {
            let frame = sys.step_frame().unwrap();
            black_box(frame.pixels[0]);
            black_box(sys.take_audio());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_bus_dispatch, bench_cpu_steps, bench_step_frame);
criterion_main!(benches);
