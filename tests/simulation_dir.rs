// tests/simulation_dir.rs
//
// Reading back a complete run directory the way the solver lays it out.

use std::fs;
use std::path::Path;

use petaspin_sweep::hysteresis::read_site_scalars;
use petaspin_sweep::mesh::Mesh;
use petaspin_sweep::simulation::Simulation;
use petaspin_sweep::site_field::SiteField;
use petaspin_sweep::site_files::{LayerSpec, SiteSetup};

fn build_run(dir: &Path) {
    let setup = SiteSetup {
        mesh: Mesh::new(5, 4, 2),
        layers: vec![
            LayerSpec::magnetic(8.0e5, [0.0, 0.0, 2.0]),
            LayerSpec::magnetic(6.0e5, [1.0, 1.0, 0.0]),
        ],
    };
    setup.write_all(dir).unwrap();

    let cfg = dir.join("file_configuration");
    fs::create_dir_all(&cfg).unwrap();
    fs::write(
        cfg.join("ferromagnet.dat"),
        "8.0e5   !Ms_const (A/m)\n2.21e5  !gama\n1.3d-11 !A(J/m) exchange\nm.dat !mfile\n",
    )
    .unwrap();
    fs::write(cfg.join("geometry.dat"), "0.05 !omega\n10 !multiply\n").unwrap();

    let out = dir.join("output");
    fs::create_dir_all(&out).unwrap();
    fs::write(
        out.join("output_layx.txt"),
        "0.0 1.0 0.0\n1e-10 0.8 0.2\n2e-10 0.6 0.4\n",
    )
    .unwrap();
    fs::write(out.join("output_layy.txt"), "0.0 0 0\n1e-10 0 0\n2e-10 0 0\n").unwrap();
    fs::write(out.join("output_layz.txt"), "0.0 0 0\n1e-10 0 0\n2e-10 0 0\n").unwrap();
}

#[test]
fn site_files_round_trip_through_the_readers() {
    let tmp = tempfile::tempdir().unwrap();
    build_run(tmp.path());

    let m = SiteField::read(&tmp.path().join("minicial.dat")).unwrap();
    assert_eq!(m.len(), 40);
    assert_eq!(m.data[0], [0.0, 0.0, 1.0]);
    let s = std::f64::consts::FRAC_1_SQRT_2;
    assert!((m.data[39][0] - s).abs() < 1e-12 && (m.data[39][1] - s).abs() < 1e-12);

    let ms = read_site_scalars(&tmp.path().join("MS_file.dat")).unwrap();
    assert_eq!(ms.len(), 40);
    assert_eq!(ms[19], 8.0e5);
    assert_eq!(ms[20], 6.0e5);
}

#[test]
fn parameters_cover_every_configuration_file() {
    let tmp = tempfile::tempdir().unwrap();
    build_run(tmp.path());

    let mut sim = Simulation::open(tmp.path()).unwrap();
    let params = sim.parameters().unwrap();
    assert_eq!(params.len(), 2);
    assert_eq!(params["ferromagnet.dat"]["A(J/m)"], 1.3e-11);
    assert!(!params["ferromagnet.dat"].contains_key("mfile"));

    let dt = sim.timestep().unwrap();
    assert!(dt > 0.0 && dt.is_finite());
}

#[test]
fn convergence_trace_reads_layer_outputs() {
    let tmp = tempfile::tempdir().unwrap();
    build_run(tmp.path());

    let sim = Simulation::open(tmp.path()).unwrap();
    assert!(sim.output_files().contains_key("output_layx.txt"));

    let trace = sim.convergence().unwrap();
    assert_eq!(trace.time.len(), 3);
    // Layer means stay at 0.5: the stack average has settled.
    assert!(trace.m.iter().all(|m| (m - 0.5).abs() < 1e-12));
    assert!(trace.is_converged(1.0));

    let csv = tmp.path().join("convergence.csv");
    trace.write_csv(&csv).unwrap();
    let text = fs::read_to_string(&csv).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "t,mx,my,mz,m,dm_dt");
    assert!(lines[1].ends_with(','));
    assert_eq!(lines.len(), 4);
}
