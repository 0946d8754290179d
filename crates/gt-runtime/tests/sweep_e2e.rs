use gt_core::{InitialCondition, NetworkRef, Quantity, SimulationConfig};
use gt_runtime::{launch, RunError};
use persistence::{dataset_path, StoreReader};
use rust_decimal::Decimal;
use std::fs;
use std::path::Path;

fn write_network(root: &Path, name: &str, nodes: &[&str], edges: &[(&str, &str)]) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    let mut n = String::from("id\n");
    for node in nodes {
        n.push_str(node);
        n.push('\n');
    }
    fs::write(dir.join("nodes.csv"), n).unwrap();
    let mut e = String::from("source,target\n");
    for (s, t) in edges {
        e.push_str(&format!("{s},{t}\n"));
    }
    fs::write(dir.join("edges.csv"), e).unwrap();
}

fn triangle(root: &Path) -> NetworkRef {
    write_network(
        root,
        "tri",
        &["a", "b", "c"],
        &[("a", "b"), ("b", "c"), ("c", "a")],
    );
    NetworkRef::new(root, "tri")
}

#[test]
fn epoch_zero_holds_the_initial_condition() {
    let dir = tempfile::tempdir().unwrap();
    let network = triangle(dir.path());
    let config = SimulationConfig {
        epochs: 2,
        epochs_chunk_size: 2,
        alpha_mu_interval: 500,
        alpha_mu_chunk_size: 1,
        result_folder: dir.path().join("results"),
        ..Default::default()
    };

    let report = launch(&network, &config, "test").unwrap();
    assert_eq!(report.parameter_chunks, 1);
    assert_eq!(report.windows_computed, 1);
    let path = dataset_path(&config, "tri");
    assert_eq!(report.output.as_deref(), Some(path.as_path()));
    assert!(path.ends_with("tri_s500_e2_is10000/dataset_0.gtds"));

    let mut reader = StoreReader::open(&path).unwrap();
    assert_eq!(reader.header().shape(), [3, 1, 2]);
    assert_eq!(reader.header().agent_labels, vec!["a", "b", "c"]);
    assert_eq!(reader.header().generator, "test");
    for agent in 0..3 {
        assert_eq!(reader.read_raw(Quantity::Cash, agent, 0, 0).unwrap(), 3_000_000);
        assert_eq!(reader.read_raw(Quantity::Goods, agent, 0, 0).unwrap(), 400_000);
        assert_eq!(reader.read_raw(Quantity::Price, agent, 0, 0).unwrap(), 100_000);
    }
}

#[test]
fn symmetric_ring_stays_balanced_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let network = triangle(dir.path());
    let config = SimulationConfig {
        epochs: 6,
        epochs_chunk_size: 4,
        alpha_mu_interval: 200,
        alpha_mu_chunk_size: 5,
        result_folder: dir.path().join("results"),
        n_processors: 2,
        simulation_index: 7,
        ..Default::default()
    };
    let report = launch(&network, &config, "test").unwrap();
    assert_eq!(report.parameter_chunks, 4);
    assert_eq!(report.windows_persisted, 8);

    let mut reader = StoreReader::open(dataset_path(&config, "tri")).unwrap();
    for pair in [0, 7, 15] {
        let cash = reader.read_series(Quantity::Cash, 0, pair).unwrap();
        assert_eq!(cash.len(), 6);
        // Every agent spends and earns the same amount on a symmetric ring.
        assert!(cash.iter().all(|c| *c == Decimal::from(300)));
        let total: Decimal = (0..3)
            .map(|a| reader.read_value(Quantity::Goods, a, pair, 5).unwrap())
            .sum();
        assert_eq!(total, Decimal::from(120));
    }
}

#[test]
fn random_initial_condition_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let network = triangle(dir.path());
    let base = SimulationConfig {
        epochs: 2,
        epochs_chunk_size: 1,
        alpha_mu_interval: 500,
        alpha_mu_chunk_size: 1,
        result_folder: dir.path().join("results"),
        initial_condition: InitialCondition::RandomUniform {
            c_tot: Decimal::from(900),
            g_tot: Decimal::from(120),
            c_min_lim: Decimal::from(10),
            g_min_lim: Decimal::from(1),
            p0: Decimal::from(10),
            seed: 7,
        },
        ..Default::default()
    };
    let second = SimulationConfig {
        simulation_index: 1,
        ..base.clone()
    };
    launch(&network, &base, "test").unwrap();
    launch(&network, &second, "test").unwrap();
    let mut a = StoreReader::open(dataset_path(&base, "tri")).unwrap();
    let mut b = StoreReader::open(dataset_path(&second, "tri")).unwrap();
    for q in Quantity::ALL {
        for agent in 0..3 {
            assert_eq!(
                a.read_series(q, agent, 0).unwrap(),
                b.read_series(q, agent, 0).unwrap()
            );
        }
    }
}

#[test]
fn missing_network_is_a_resource_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = SimulationConfig {
        result_folder: dir.path().join("results"),
        ..Default::default()
    };
    let err = launch(&NetworkRef::new(dir.path(), "absent"), &config, "test").unwrap_err();
    assert!(matches!(err, RunError::Resource(_)));
    assert!(!dataset_path(&config, "absent").exists());
}
