use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hs_bytecode::{decode, Instruction, Opcode};

fn bench_decode(c: &mut Criterion) {
    let words: Vec<u32> = (0..4096u32)
        .map(|i| ((i % 256) << 24) | (i.wrapping_mul(2654435761) & 0x00FF_FFFF))
        .collect();
    c.bench_function("decode_4096_words", |b| {
        b.iter(|| {
            let mut assigned = 0usize;
            for &word in black_box(&words) {
                if decode(word).op().is_some() {
                    assigned += 1;
                }
            }
            assigned
        })
    });
}

fn bench_encode(c: &mut Criterion) {
    let instrs: Vec<Instruction> = (0..4096u32).map(|i| decode((i % 256) << 24 | i)).collect();
    c.bench_function("encode_4096_words", |b| {
        b.iter(|| black_box(&instrs).iter().map(Instruction::encode).fold(0u32, u32::wrapping_add))
    });
}

fn bench_opcode_lookup(c: &mut Criterion) {
    c.bench_function("opcode_from_u8", |b| {
        b.iter(|| (0..=255u8).filter_map(|byte| Opcode::from_u8(black_box(byte))).count())
    });
}

criterion_group!(benches, bench_decode, bench_encode, bench_opcode_lookup);
criterion_main!(benches);
