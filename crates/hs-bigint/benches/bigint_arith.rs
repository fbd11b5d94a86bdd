use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hs_bigint::BigInt;

fn operand(len: usize, seed: u32) -> BigInt {
    let limbs: Vec<u32> = (0..len as u32)
        .map(|i| i.wrapping_mul(0x9E37_79B9).wrapping_add(seed))
        .collect();
    BigInt::from_limbs(&limbs, false)
}

fn bench_mul(c: &mut Criterion) {
    let a = operand(64, 1);
    let b = operand(64, 7);
    c.bench_function("mul_64x64_limbs", |bench| {
        bench.iter(|| black_box(&a).checked_mul(black_box(&b)))
    });
}

fn bench_divrem(c: &mut Criterion) {
    let a = operand(64, 3);
    let b = operand(17, 5);
    c.bench_function("divrem_64_by_17_limbs", |bench| {
        bench.iter(|| black_box(&a).divrem(black_box(&b)))
    });
}

fn bench_display(c: &mut Criterion) {
    let a = operand(32, 11);
    c.bench_function("display_32_limbs", |bench| bench.iter(|| black_box(&a).to_string()));
}

criterion_group!(benches, bench_mul, bench_divrem, bench_display);
criterion_main!(benches);
