#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use screentime::agent::config::AgentConfig;
    use screentime::libs::config::{AppTimezone, Config};
    use std::fs;
    use tempfile::TempDir;
    use test_context::{test_context, TestContext};

    struct ConfigTestContext {
        temp_dir: TempDir,
    }

    impl TestContext for ConfigTestContext {
        fn setup() -> Self {
            ConfigTestContext {
                temp_dir: tempfile::tempdir().unwrap(),
            }
        }
    }

    fn write_config(ctx: &ConfigTestContext, json: &str) -> std::path::PathBuf {
        let path = ctx.temp_dir.path().join("config.json");
        fs::write(&path, json).unwrap();
        path
    }

    const MINIMAL: &str = r#"{
        "database_path": "/tmp/screentime.db",
        "devices": [{"id": "tv", "base_url": "http://tv.local:8060", "poll_interval_seconds": 30}]
    }"#;

    #[test_context(ConfigTestContext)]
    #[test]
    fn test_defaults_applied(ctx: &mut ConfigTestContext) {
        let config = Config::load(write_config(ctx, MINIMAL)).unwrap();
        assert_eq!(config.http_listen, ":8080");
        assert_eq!(config.day_start_hour, 7);
        assert!(config.timezone.is_none());
        assert_eq!(config.devices.len(), 1);
        assert_eq!(config.devices[0].poll_interval_seconds, 30);
    }

    #[test_context(ConfigTestContext)]
    #[test]
    fn test_day_start_hour_zero_is_allowed(ctx: &mut ConfigTestContext) {
        let json = MINIMAL.replace("\"database_path\"", "\"day_start_hour\": 0, \"database_path\"");
        let config = Config::load(write_config(ctx, &json)).unwrap();
        assert_eq!(config.day_start_hour, 0);
    }

    #[test_context(ConfigTestContext)]
    #[test]
    fn test_validation_failures(ctx: &mut ConfigTestContext) {
        // No devices.
        let path = write_config(ctx, r#"{"database_path": "/tmp/db", "devices": []}"#);
        assert!(Config::load(path).is_err());

        // Empty database path.
        let path = write_config(
            ctx,
            r#"{"database_path": "", "devices": [{"id": "tv", "base_url": "http://x", "poll_interval_seconds": 1}]}"#,
        );
        assert!(Config::load(path).is_err());

        // Zero poll interval.
        let path = write_config(
            ctx,
            r#"{"database_path": "/tmp/db", "devices": [{"id": "tv", "base_url": "http://x", "poll_interval_seconds": 0}]}"#,
        );
        assert!(Config::load(path).is_err());

        // Out-of-range day start hour.
        let path = write_config(
            ctx,
            r#"{"database_path": "/tmp/db", "day_start_hour": 24,
                "devices": [{"id": "tv", "base_url": "http://x", "poll_interval_seconds": 1}]}"#,
        );
        assert!(Config::load(path).is_err());

        // Device without an id.
        let path = write_config(
            ctx,
            r#"{"database_path": "/tmp/db", "devices": [{"id": "", "base_url": "http://x", "poll_interval_seconds": 1}]}"#,
        );
        assert!(Config::load(path).is_err());
    }

    #[test_context(ConfigTestContext)]
    #[test]
    fn test_unknown_timezone_is_rejected(ctx: &mut ConfigTestContext) {
        let json = MINIMAL.replace("\"database_path\"", "\"timezone\": \"Not/AZone\", \"database_path\"");
        let config = Config::load(write_config(ctx, &json)).unwrap();
        assert!(config.resolve_timezone().is_err());
    }

    #[test]
    fn test_day_window_in_utc() {
        let tz = AppTimezone::Named(chrono_tz::Tz::UTC);

        // Past today's day start: window begins today at 07:00.
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let (start, end) = tz.day_window(7, now);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 1, 1, 7, 0, 0).unwrap());
        assert_eq!(end, now);

        // Before today's day start: the window rolls back a day.
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 3, 0, 0).unwrap();
        let (start, _) = tz.day_window(7, now);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 12, 31, 7, 0, 0).unwrap());

        // Midnight anchor.
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let (start, _) = tz.day_window(0, now);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_day_window_respects_named_timezone() {
        // 03:00 UTC on Jan 1 is 22:00 on Dec 31 in New York (UTC-5), so
        // the day anchored at 07:00 local began at 12:00 UTC on Dec 31.
        let tz = AppTimezone::Named(chrono_tz::Tz::America__New_York);
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 3, 0, 0).unwrap();
        let (start, _) = tz.day_window(7, now);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 12, 31, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_agent_config_defaults_and_missing_file() {
        let config = AgentConfig::load("/definitely/not/a/real/path/agent.json").unwrap();
        assert_eq!(config.listen, ":8060");
        assert!(config.categories.contains_key("homework"));
        assert!(config.idle_window_patterns.iter().any(|p| p == "screensaver"));
    }

    #[test]
    fn test_agent_config_parses_overrides() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("agent.json");
        fs::write(
            &path,
            r#"{
                "listen": ":9000",
                "categories": {"news": {"domains": ["nytimes.com"]}},
                "ignored_windows": ["1password"],
                "firefox_profile": "/tmp/recovery.jsonlz4"
            }"#,
        )
        .unwrap();

        let config = AgentConfig::load(&path).unwrap();
        assert_eq!(config.listen, ":9000");
        assert!(config.categories.contains_key("news"));
        assert!(!config.categories.contains_key("homework"));
        assert_eq!(config.ignored_windows, vec!["1password".to_string()]);
        assert_eq!(config.firefox_profile, "/tmp/recovery.jsonlz4");
    }
}
