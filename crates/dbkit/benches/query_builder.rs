use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use dbkit::qb::table;
use dbkit::{MYSQL, POSTGRES, QueryBuilder, SqlDialect, raw};

/// SELECT with `n` equality filters and `n` HAVING terms:
/// SELECT * FROM t WHERE col0 = $1 AND ... GROUP BY col0 HAVING SUM(col0) > $n+1 ...
fn build_query(n: usize, dialect: &'static dyn SqlDialect) -> QueryBuilder {
    let mut qb = table("t", dialect).group_by(["col0"]);
    for i in 0..n {
        qb = qb
            .having(raw(format!("SUM(col{i})")), ">", i as i64)
            .where_eq(format!("col{i}"), i as i64);
    }
    qb.order_by("col0", "desc").limit(10)
}

fn bench_to_sql(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_builder/to_sql");

    for n in [1, 5, 10, 50, 100] {
        let qb = build_query(n, &POSTGRES);
        group.bench_with_input(BenchmarkId::from_parameter(n), &qb, |b, qb| {
            b.iter(|| black_box(qb.to_sql()));
        });
    }

    group.finish();
}

fn bench_build_and_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_builder/build_and_render");

    for n in [1, 5, 10, 50, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let qb = build_query(n, &MYSQL);
                black_box(qb.to_sql())
            });
        });
    }

    group.finish();
}

fn bench_where_in(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_builder/where_in");

    for n in [5, 20, 100, 500] {
        let values: Vec<i64> = (0..n).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &values, |b, values| {
            b.iter(|| {
                let qb = table("t", &POSTGRES).where_in("id", values.clone());
                black_box(qb.to_sql())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_to_sql, bench_build_and_render, bench_where_in);
criterion_main!(benches);
