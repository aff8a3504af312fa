use quakes_core::{detect_low_power, AppConfig, SettingsStore};

use crate::fetch::coordinate;
use crate::SettingsCommands;

pub(crate) fn run_settings(
    store: &SettingsStore,
    config: &AppConfig,
    command: SettingsCommands,
) -> anyhow::Result<()> {
    let updated = match command {
        SettingsCommands::Show => {
            let snapshot = store.snapshot(detect_low_power(config.low_power));
            print!("{}", serde_yaml::to_string(&snapshot.settings)?);
            println!(
                "# effective: low_power={} limit={} radius_km={}",
                snapshot.low_power,
                snapshot.fetch_size().limit(),
                snapshot.search_radius().km(),
            );
            return Ok(());
        }
        SettingsCommands::FetchSize { size } => store.update(|s| s.fetch_size = size)?,
        SettingsCommands::Radius { radius } => store.update(|s| s.search_radius = radius)?,
        SettingsCommands::Providers { mut providers } => {
            providers.dedup();
            store.update(|s| s.providers = providers)?
        }
        SettingsCommands::LocationOption { option } => {
            store.update(|s| s.last_option = Some(option))?
        }
        SettingsCommands::Place { lat, lon } => {
            let place = coordinate(lat, lon)?;
            store.update(|s| s.last_searched_place = Some(place))?
        }
        SettingsCommands::ClearPlace => store.update(|s| s.last_searched_place = None)?,
        SettingsCommands::CachedPlace { lat, lon } => {
            let place = coordinate(lat, lon)?;
            store.update(|s| s.cached_place = Some(place))?
        }
        SettingsCommands::Notifications { enabled } => store.update(|s| {
            s.has_attempted_notification_permission = true;
            s.notifications_enabled = enabled;
        })?,
    };

    tracing::debug!(path = %store.path().display(), "settings saved");
    print!("{}", serde_yaml::to_string(&updated)?);
    Ok(())
}
