use chronoplan::facade::{CreateAtomicArgs, CreateContainerArgs, Facade, SegmentSpec};
use chronoplan::ids::{RelationshipId, TemplateId};
use chronoplan::model::ledger_from;

criterion::criterion_main!(benches);
criterion::criterion_group! {
    name = benches;
    config = criterion::Criterion::default()
        .without_plots()
        .noise_threshold(3.0)
        .significance_level(0.01)
        .sample_size(20)
        .measurement_time(std::time::Duration::from_secs(1));
    targets =
        validating_a_chain_of_atomics,
        flattening_nested_containers,
        packing_a_wide_container,
}

/// Builds a container chaining `n` atomics end to end, each consuming
/// the previous one's output, so the ledger walk has real work to do.
fn chained_pipeline(n: usize) -> (Facade, TemplateId) {
    let facade = Facade::new();
    for i in 0..n {
        facade
            .create_atomic(CreateAtomicArgs {
                id: TemplateId::from(format!("atomic-{i}")),
                intent: format!("step {i}"),
                duration: 100,
                will_consume: if i == 0 {
                    Default::default()
                } else {
                    ledger_from([("unit_count", 1.0)])
                },
                will_produce: ledger_from([("unit_count", 1.0)]),
                author_id: None,
                version: None,
            })
            .unwrap();
    }
    let container_id = TemplateId::from("pipeline");
    facade
        .create_container(CreateContainerArgs {
            id: container_id.clone(),
            intent: "chained pipeline".into(),
            duration: (n as u64) * 100,
            segments: (0..n)
                .map(|i| SegmentSpec {
                    child_id: TemplateId::from(format!("atomic-{i}")),
                    relationship_id: RelationshipId::from(format!("r{i}")),
                    offset: (i as u64) * 100,
                })
                .collect(),
            author_id: None,
            version: None,
        })
        .unwrap();
    (facade, container_id)
}

fn validating_a_chain_of_atomics(c: &mut criterion::Criterion) {
    let (facade, container_id) = chained_pipeline(64);
    c.bench_function("validate a 64-atomic chained container", |b| {
        b.iter(|| facade.validate_container(&container_id))
    });
}

fn flattening_nested_containers(c: &mut criterion::Criterion) {
    let facade = Facade::new();
    facade
        .create_atomic(CreateAtomicArgs {
            id: TemplateId::from("leaf"),
            intent: "leaf step".into(),
            duration: 100,
            will_consume: Default::default(),
            will_produce: Default::default(),
            author_id: None,
            version: None,
        })
        .unwrap();

    let mut previous = TemplateId::from("leaf");
    for depth in 0..8 {
        let id = TemplateId::from(format!("container-{depth}"));
        facade
            .create_container(CreateContainerArgs {
                id: id.clone(),
                intent: format!("wrapper {depth}"),
                duration: 100 * 2u64.pow(depth as u32 + 1),
                segments: vec![SegmentSpec {
                    child_id: previous,
                    relationship_id: RelationshipId::from(format!("wrap-{depth}")),
                    offset: 0,
                }],
                author_id: None,
                version: None,
            })
            .unwrap();
        previous = id;
    }

    c.bench_function("flatten an 8-deep nested container", |b| {
        b.iter(|| facade.validate_container(&previous))
    });
}

fn packing_a_wide_container(c: &mut criterion::Criterion) {
    let (facade, container_id) = chained_pipeline(128);
    c.bench_function("pack a 128-segment container", |b| {
        b.iter(|| facade.pack(&container_id))
    });
}
