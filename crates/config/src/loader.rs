use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{Error, Result, env_subst::substitute_env, schema::BotConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["tmibot.toml", "tmibot.yaml", "tmibot.yml", "tmibot.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<BotConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&substitute_env(&raw), path)?;
    debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Parse a config string; the format is chosen by the extension of `path`.
pub fn parse_config(raw: &str, path: &Path) -> Result<BotConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| Error::parse("toml", e)),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| Error::parse("yaml", e)),
        "json" => serde_json::from_str(raw).map_err(|e| Error::parse("json", e)),
        other => Err(Error::UnsupportedFormat {
            extension: other.to_string(),
        }),
    }
}

/// Find the first config file in standard locations.
///
/// Search order:
/// 1. `./tmibot.{toml,yaml,yml,json}`
/// 2. `<user config dir>/tmibot/tmibot.{toml,yaml,yml,json}`
pub fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES.iter().map(PathBuf::from);
    let global = config_dir()
        .into_iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)));
    local.chain(global).find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/tmibot/` on Linux).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "tmibot").map(|d| d.config_dir().to_path_buf())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret};

    #[test]
    fn loads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tmibot.toml");
        std::fs::write(
            &path,
            r#"
[auth]
client_id = "abc"
grant_type = "client_credentials"

[chat]
channel = "testchannel"
bot_name = "helperbot"
message_interval_ms = 250

[supervisor]
max_restarts = 3
"#,
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.auth.client_id, "abc");
        assert_eq!(cfg.chat.channel, "testchannel");
        assert_eq!(cfg.chat.message_interval_ms, 250);
        assert_eq!(cfg.chat.port, 6667);
        assert_eq!(cfg.supervisor.max_restarts, Some(3));
    }

    #[test]
    fn loads_json_credential_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tmibot.json");
        std::fs::write(
            &path,
            r#"{"auth": {"Secret": "xyz", "ClientID": "id", "ListenPort": 4000},
                "chat": {"channel": "c", "bot_name": "b"}}"#,
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.auth.listen_port, 4000);
        assert_eq!(
            cfg.auth.client_secret.as_ref().map(|s| s.expose_secret().as_str()),
            Some("xyz")
        );
    }

    #[test]
    fn loads_yaml() {
        let cfg = parse_config(
            "chat:\n  channel: yamlchan\n  bot_name: b\n",
            Path::new("tmibot.yaml"),
        )
        .unwrap();
        assert_eq!(cfg.chat.channel, "yamlchan");
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let err = parse_config("[chat\nchannel = ", Path::new("x.toml")).unwrap_err();
        assert!(matches!(err, Error::Parse { format: "toml", .. }));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = parse_config("", Path::new("x.ini")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { .. }));
    }
}
