use clap::{CommandFactory, Parser};

use cloudphinder::CloudConfig;
use cloudphinder::particles::RankMode;

use crate::Cli;

#[test]
fn test_command_definition() {
    Cli::command().debug_assert();
}

#[test]
fn test_fuzz_help_describes_coordinate_scaling() {
    let command = Cli::command();
    let fuzz = command
        .get_arguments()
        .find(|arg| arg.get_id() == "fuzz")
        .unwrap();
    let help = fuzz.get_help().unwrap().to_string();

    assert!(help.contains("scale each coordinate"));
    assert!(!help.contains("smoothing length"));
}

#[test]
fn test_flags_override_config() {
    let cli = Cli::try_parse_from([
        "cloudphinder",
        "snap.json",
        "--G",
        "1",
        "--cluster_ngb",
        "16",
        "--alpha-crit",
        "1.5",
        "--fuzz",
        "1e-6",
        "--potential-mode",
    ])
    .unwrap();
    let mut config = CloudConfig::default();
    cli.apply_overrides(&mut config);

    assert_eq!(config.gravitational_constant, 1.0);
    assert_eq!(config.neighbor_count, 16);
    assert_eq!(config.alpha_crit, 1.5);
    assert_eq!(config.fuzz, 1e-6);
    assert_eq!(config.rank_mode, RankMode::Potential);
    assert_eq!(config.ntree, CloudConfig::default().ntree);
}
