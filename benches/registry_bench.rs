//! 目录查询与金额转换基准测试
//!
//! 测试场景:
//! 1. 代币解析（命中 / 未部署）
//! 2. 链环境判断
//! 3. 最小单位 → 显示金额

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ethers::types::U256;
use ironbridge::{
    domain::{ChainRegistry, TokenRegistry},
    utils::amount::format_minor_units,
};

// ============ 基准测试函数 ============

fn bench_resolve_token(c: &mut Criterion) {
    let tokens = TokenRegistry::new();

    let mut group = c.benchmark_group("resolve_token");
    group.throughput(Throughput::Elements(1));

    for (symbol, chain_id) in [("USDC", 84532u64), ("usdt", 56), ("DAI", 11155111)] {
        group.bench_with_input(
            BenchmarkId::new(symbol, chain_id),
            &(symbol, chain_id),
            |b, &(symbol, chain_id)| {
                b.iter(|| tokens.resolve_token(black_box(symbol), black_box(chain_id)))
            },
        );
    }
    group.finish();
}

fn bench_chain_environment(c: &mut Criterion) {
    let chains = ChainRegistry::new();

    c.bench_function("chain_environment", |b| {
        b.iter(|| {
            for chain_id in [1u64, 56, 84532, 11155111, 999_999] {
                black_box(chains.chain_environment(black_box(chain_id)));
            }
        })
    });
}

fn bench_format_minor_units(c: &mut Criterion) {
    let mut group = c.benchmark_group("format_minor_units");

    let cases = [
        ("usdc", U256::from(10_000u64), 6u8),
        ("bsc_usdt", U256::exp10(18), 18),
        ("large", U256::from_dec_str("123456789012345678901234567890").unwrap_or_default(), 18),
    ];
    for (name, amount, decimals) in cases {
        group.bench_with_input(BenchmarkId::from_parameter(name), &(amount, decimals), |b, &(amount, decimals)| {
            b.iter(|| format_minor_units(black_box(amount), black_box(decimals)))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_resolve_token,
    bench_chain_environment,
    bench_format_minor_units
);
criterion_main!(benches);
