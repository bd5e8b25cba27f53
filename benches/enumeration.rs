use criterion::{black_box, criterion_group, criterion_main, Criterion};
use reg_access::{MemoryRegistry, RegistryAccess};

const KEY: &str = "SOFTWARE\\Vendor\\Bench";

fn populated(values: u32) -> RegistryAccess<MemoryRegistry> {
    let reg = RegistryAccess::new(MemoryRegistry::new());
    reg.ensure_key_exists(KEY).expect("create bench key");
    for i in 0..values {
        let name = format!("value{:04}", i);
        let written = match i % 3 {
            0 => reg.write_string(KEY, &name, "some configuration text"),
            1 => reg.write_dword(KEY, &name, i),
            _ => reg.write_binary(KEY, &name, &[0xab; 64]),
        };
        written.expect("write bench value");
    }
    reg
}

fn bench_enumeration(c: &mut Criterion) {
    let reg = populated(256);

    c.bench_function("enum_all_values", |b| {
        b.iter(|| {
            let mut bytes = 0usize;
            reg.enum_all_values(KEY, |item| {
                bytes += item.data.len();
                Ok(())
            })
            .expect("enumerate");
            black_box(bytes)
        })
    });

    c.bench_function("read_all_values_into_map", |b| {
        b.iter(|| black_box(reg.read_all_values_into_map(KEY).expect("materialize")))
    });

    c.bench_function("read_value_obfuscated", |b| {
        b.iter(|| black_box(reg.read_value_obfuscated(KEY, "VALUE0255").expect("find")))
    });
}

criterion_group!(benches, bench_enumeration);
criterion_main!(benches);
