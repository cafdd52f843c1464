use rnn_time_step::{
    RnnErr, RnnTimeStep,
    configs::{RnnConfig, TrainingConfig},
};

fn network(hidden_sizes: Vec<usize>, seed: u64) -> RnnTimeStep {
    RnnTimeStep::new(RnnConfig {
        input_size: 1,
        hidden_sizes,
        output_size: 1,
        seed: Some(seed),
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn learns_a_short_counting_sequence() {
    let mut net = network(vec![5], 1);
    let options = TrainingConfig {
        iterations: 2000,
        ..Default::default()
    };

    let summary = net.train(&[vec![0, 1, 2, 3, 0]], &options).unwrap();

    assert!(summary.error.is_finite());
    assert!(summary.error <= 0.01 || summary.iterations == options.iterations);
    assert!(net.is_runnable());
    assert!(net.ratio_clipped() >= 0. && net.ratio_clipped() <= 1.);
}

#[test]
fn huge_learning_rates_diverge() {
    let mut net = network(vec![5], 2);
    let options = TrainingConfig {
        iterations: 50,
        learning_rate: Some(1e38),
        ..Default::default()
    };

    assert!(matches!(
        net.train(&[vec![0, 1, 2, 3, 0]], &options),
        Err(RnnErr::Divergence { .. })
    ));
}

#[test]
fn generation_needs_a_bound_graph() {
    let mut net = network(vec![3], 3);

    assert!(matches!(net.run(&[], 5, false, 1.), Err(RnnErr::NotReady)));
    assert!(matches!(net.compile(), Err(RnnErr::NotReady)));

    net.grow_graphs(1).unwrap();
    assert!(net.run(&[], 5, false, 1.).is_ok());
}

#[test]
fn graphs_grow_only_when_needed() {
    let mut net = network(vec![4, 3], 4);

    net.grow_graphs(4).unwrap();
    let arena_len = net.model().arena().len();
    net.grow_graphs(4).unwrap();
    net.grow_graphs(2).unwrap();
    assert_eq!(net.model().equation_count(), 4);
    assert_eq!(net.model().arena().len(), arena_len);

    net.run_input(&[0, 1, 2, 3, 4, 5, 6]).unwrap();
    assert_eq!(net.model().equation_count(), 6);
    assert_eq!(net.model().all_matrices().len(), 1 + 2 * 3 + 2);
}

#[test]
fn reset_drops_the_graphs_but_keeps_the_weights() {
    let mut net = network(vec![4], 5);
    net.grow_graphs(3).unwrap();
    let before = net.to_json_string().unwrap();

    net.reset_graphs();

    assert!(!net.is_runnable());
    assert_eq!(net.to_json_string().unwrap(), before);
}

#[test]
fn the_graph_limit_bounds_training_sequences() {
    let mut net = RnnTimeStep::new(RnnConfig {
        hidden_sizes: vec![3],
        max_graphs: Some(3),
        seed: Some(6),
        ..Default::default()
    })
    .unwrap();

    assert!(net.run_input(&[0, 1, 2, 3]).is_ok());
    assert!(matches!(
        net.run_input(&[0, 1, 2, 3, 4]),
        Err(RnnErr::GraphLimitExceeded {
            requested: 4,
            max: 3
        })
    ));
}

#[test]
fn kept_networks_continue_from_their_weights() {
    let mut net = network(vec![4], 7);
    let data = [vec![0, 2, 1, 0]];
    net.train(
        &data,
        &TrainingConfig {
            iterations: 10,
            ..Default::default()
        },
    )
    .unwrap();
    let trained = net.to_json_string().unwrap();

    net.train(
        &data,
        &TrainingConfig {
            iterations: 0,
            keep_network_intact: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(net.to_json_string().unwrap(), trained);

    net.train(
        &data,
        &TrainingConfig {
            iterations: 0,
            ..Default::default()
        },
    )
    .unwrap();
    assert_ne!(net.to_json_string().unwrap(), trained);
}

#[test]
fn continues_a_periodic_sequence() {
    let mut net = network(vec![10], 0);
    let options = TrainingConfig {
        iterations: 3000,
        ..Default::default()
    };
    net.train(&[[1, 2, 3].repeat(4)], &options).unwrap();

    assert_eq!(net.run(&[1, 2, 3, 1], 10, false, 1.).unwrap(), [2, 3, 1, 2, 3, 1]);
}
