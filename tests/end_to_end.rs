use cylinder_pinn::geometry::SamplingConfig;
use cylinder_pinn::inference::{self, InferBackend};
use cylinder_pinn::model::FcNetConfig;
use cylinder_pinn::training::{self, TrainBackend};
use cylinder_pinn::{
    CONFIG_FILENAME, ExperimentConfig, LOSS_HISTORY_FILENAME, MODEL_FILENAME, PinnError,
};
use std::fs;

fn tiny_config() -> ExperimentConfig {
    let mut config = ExperimentConfig::default();
    config.sampling = SamplingConfig {
        time_nsteps: 3,
        space_point_size: 40,
        space_nsteps: [8, 5],
        cylinder_nsteps: 8,
    };
    config.model = FcNetConfig {
        num_layers: 3,
        hidden_size: 8,
        ..Default::default()
    };
    config.solver.num_epoch = 3;
    config.solver.log_interval = 1;
    config.solver.plot_loss = false;
    config
}

#[test]
fn train_then_infer_writes_last_moment() {
    let dir = tempfile::tempdir().unwrap();
    let config = tiny_config();

    let report = training::run::<TrainBackend>(&config, dir.path(), &Default::default()).unwrap();
    assert_eq!(report.history.len(), 3);
    assert_eq!(report.history.iter().map(|r| r.epoch).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(report.history.iter().all(|r| r.total.is_finite()));
    assert!(dir.path().join(MODEL_FILENAME).exists());
    assert!(dir.path().join(LOSS_HISTORY_FILENAME).exists());
    assert_eq!(
        ExperimentConfig::load(dir.path().join(CONFIG_FILENAME)).unwrap(),
        config
    );

    let geo = config.discretize().unwrap();
    let n = geo.space_domain_size;

    // 参照解として全点 u = v = 0 を与えると MSE は予測の二乗平均になる
    let reference_path = dir.path().join("reference.txt");
    fs::write(&reference_path, "0 0\n".repeat(n)).unwrap();

    let output =
        inference::run::<InferBackend>(dir.path(), Some(reference_path.as_path()), &Default::default())
            .unwrap();
    assert_eq!(output.last_moment.len(), n);
    assert_eq!(output.result_path, dir.path().join("result.vtk"));

    let vtk = fs::read_to_string(&output.result_path).unwrap();
    assert!(vtk.contains(&format!("POINTS {} float", n)));
    assert!(vtk.contains(&format!("POINT_DATA {}", n)));

    let error = output.reference_error.unwrap();
    let mean_u2 = output.last_moment.iter().map(|r| r[0] * r[0]).sum::<f32>() / n as f32;
    assert!((error.mse_u - mean_u2).abs() < 1e-4 * mean_u2.max(1.0));
}

#[test]
fn reference_with_wrong_length_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = tiny_config();
    config.solver.num_epoch = 1;
    training::run::<TrainBackend>(&config, dir.path(), &Default::default()).unwrap();

    let reference_path = dir.path().join("reference.txt");
    fs::write(&reference_path, "0 0\n0 0\n").unwrap();
    let err = inference::run::<InferBackend>(dir.path(), Some(reference_path.as_path()), &Default::default())
        .unwrap_err();
    assert!(matches!(err, PinnError::Reference(_)));
}

#[test]
fn invalid_config_is_rejected_before_training() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = tiny_config();
    config.sampling.time_nsteps = 1;
    let err = training::run::<TrainBackend>(&config, dir.path(), &Default::default()).unwrap_err();
    assert!(matches!(err, PinnError::InvalidConfig(_)));
    assert!(!dir.path().join(MODEL_FILENAME).exists());
}
