use super::*;

#[test]
fn parses_db_migrate_command() {
    let cli = Cli::try_parse_from(["quakes-cli", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["quakes-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn fetch_major_defaults_to_page_zero() {
    let cli = Cli::try_parse_from(["quakes-cli", "fetch", "major"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Fetch {
            command: FetchCommands::Major { page: 0 }
        })
    ));

    let cli = Cli::try_parse_from(["quakes-cli", "fetch", "major", "--page", "3"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Fetch {
            command: FetchCommands::Major { page: 3 }
        })
    ));
}

#[test]
fn fetch_near_accepts_negative_coordinates() {
    let cli = Cli::try_parse_from([
        "quakes-cli",
        "fetch",
        "near",
        "--lat",
        "-33.45",
        "--lon",
        "-70.66",
    ])
    .unwrap();
    match cli.command {
        Some(Commands::Fetch {
            command: FetchCommands::Near { lat, lon },
        }) => {
            assert!((lat + 33.45).abs() < f64::EPSILON);
            assert!((lon + 70.66).abs() < f64::EPSILON);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn detail_defaults_to_usgs() {
    let cli = Cli::try_parse_from(["quakes-cli", "detail", "--id", "ci40000001"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Detail {
            provider: Provider::Usgs,
            ref id,
        }) if id == "ci40000001"
    ));
}

#[test]
fn settings_fetch_size_parses_tier_names() {
    let cli = Cli::try_parse_from(["quakes-cli", "settings", "fetch-size", "extra-large"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Settings {
            command: SettingsCommands::FetchSize {
                size: FetchSize::ExtraLarge
            }
        })
    ));
}

#[test]
fn settings_fetch_size_rejects_unknown_tier() {
    assert!(Cli::try_parse_from(["quakes-cli", "settings", "fetch-size", "huge"]).is_err());
}

#[test]
fn settings_providers_splits_on_commas() {
    let cli = Cli::try_parse_from(["quakes-cli", "settings", "providers", "emsc,usgs"]).unwrap();
    match cli.command {
        Some(Commands::Settings {
            command: SettingsCommands::Providers { providers },
        }) => assert_eq!(providers, [Provider::Emsc, Provider::Usgs]),
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn schedule_has_default_cron() {
    let cli = Cli::try_parse_from(["quakes-cli", "schedule"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Schedule { ref cron }) if cron == "0 */15 * * * *"
    ));
}

#[test]
fn list_defaults() {
    let cli = Cli::try_parse_from(["quakes-cli", "list", "--min-magnitude", "4.5"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::List {
            min_magnitude: Some(m),
            provider: None,
            days: None,
            limit: 25,
        }) if (m - 4.5).abs() < f64::EPSILON
    ));
}

#[test]
fn coordinate_rejects_out_of_range_values() {
    assert!(fetch::coordinate(91.0, 0.0).is_err());
    assert!(fetch::coordinate(0.0, -181.0).is_err());
    assert!(fetch::coordinate(-33.45, -70.66).is_ok());
}

#[test]
fn settings_commands_update_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = SettingsStore::open(dir.path().join("settings.yaml")).unwrap();
    let config = quakes_core::config::build_app_config(|key| match key {
        "QUAKES_LOW_POWER" => Ok("off".to_owned()),
        _ => Err(std::env::VarError::NotPresent),
    })
    .unwrap();

    settings::run_settings(
        &store,
        &config,
        SettingsCommands::Radius {
            radius: SearchRadius::Large,
        },
    )
    .unwrap();
    settings::run_settings(&store, &config, SettingsCommands::Notifications { enabled: true })
        .unwrap();

    let reopened = SettingsStore::open(dir.path().join("settings.yaml")).unwrap();
    let current = reopened.current();
    assert_eq!(current.search_radius, SearchRadius::Large);
    assert!(current.has_attempted_notification_permission);
    assert!(current.notifications_enabled);
}
