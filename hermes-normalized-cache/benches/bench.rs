use criterion::{
    criterion_group, criterion_main, measurement::WallTime, BenchmarkGroup, BenchmarkId, Criterion,
    Throughput
};
use hermes_normalized_cache::{QueryDocument, Store, Variables};
use rand::Rng;
use serde_json::{json, Value};

criterion_group!(benches, read, write);
criterion_main!(benches);

const TODOS: &str = "query Todos { todos { __typename id text complete due } }";
const RECIPES: &str = "query Recipes {
    recipes {
        __typename id title servings
        author { __typename id name }
        ingredients { name amount }
    }
}";

pub fn read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");

    benchmark_reads(&mut group, "one entity", TODOS, make_todos, 100);
    benchmark_reads(&mut group, "one entity", TODOS, make_todos, 1000);
    benchmark_reads(&mut group, "one entity", TODOS, make_todos, 10000);

    benchmark_reads(&mut group, "nested", RECIPES, make_recipes, 100);
    benchmark_reads(&mut group, "nested", RECIPES, make_recipes, 1000);

    group.finish();
}

pub fn write(c: &mut Criterion) {
    let mut group = c.benchmark_group("write");

    benchmark_writes(&mut group, "one entity", TODOS, make_todos, 100);
    benchmark_writes(&mut group, "one entity", TODOS, make_todos, 1000);
    benchmark_writes(&mut group, "one entity", TODOS, make_todos, 10000);

    benchmark_writes(&mut group, "nested", RECIPES, make_recipes, 100);
    benchmark_writes(&mut group, "nested", RECIPES, make_recipes, 1000);

    group.finish();
}

fn make_todos(n: usize) -> Value {
    let mut rand = rand::thread_rng();
    let todos: Vec<Value> = (0..n)
        .map(|i| {
            json!({
                "__typename": "Todo",
                "id": i.to_string(),
                "text": format!("Todo {}", i),
                "complete": i % 2 == 0,
                "due": rand.gen::<u32>()
            })
        })
        .collect();
    json!({ "todos": todos })
}

fn make_recipes(n: usize) -> Value {
    let mut rand = rand::thread_rng();
    let recipes: Vec<Value> = (0..n)
        .map(|i| {
            json!({
                "__typename": "Recipe",
                "id": i.to_string(),
                "title": format!("recipe {}", i),
                "servings": rand.gen_range(1..8),
                "author": {
                    "__typename": "Author",
                    "id": (i % 10).to_string(),
                    "name": format!("author {}", i % 10)
                },
                "ingredients": [
                    { "name": "salt", "amount": rand.gen_range(0..100) },
                    { "name": "water", "amount": rand.gen_range(0..100) }
                ]
            })
        })
        .collect();
    json!({ "recipes": recipes })
}

fn benchmark_reads(
    group: &mut BenchmarkGroup<WallTime>,
    name: &str,
    query: &str,
    make_data: fn(usize) -> Value,
    n: usize
) {
    let document = QueryDocument::parse(query).unwrap();
    let variables = Variables::new();
    let mut store = Store::default();
    store
        .write_query(&document, &variables, &make_data(n))
        .unwrap();

    group.throughput(Throughput::Elements(n as u64));
    group.sample_size(usize::max(10, 10000 / n));
    group.bench_with_input(
        BenchmarkId::new(name, format!("{} entries", n)),
        &document,
        |b, document| {
            b.iter(|| store.read_query(document, &variables).unwrap());
        }
    );
}

fn benchmark_writes(
    group: &mut BenchmarkGroup<WallTime>,
    name: &str,
    query: &str,
    make_data: fn(usize) -> Value,
    n: usize
) {
    let document = QueryDocument::parse(query).unwrap();
    let variables = Variables::new();
    let mut store = Store::default();
    let data = make_data(n);

    group.throughput(Throughput::Elements(n as u64));
    group.sample_size(usize::max(10, 10000 / n));
    group.bench_with_input(
        BenchmarkId::new(name, format!("{} entries", n)),
        &data,
        |b, data| {
            b.iter(|| store.write_query(&document, &variables, data).unwrap());
        }
    );
}
