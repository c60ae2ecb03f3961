use viewmark_core::config::Config;

const DOCUMENTATION: &str = r#"# Viewmark preferences. You may edit this file, but be aware that formatting and comments will not
# be preserved. Out of range values are clamped when loaded.

# max_history_size: history entries kept, 5 to 100.
# settle_delay_ms: quiet time before a viewport change becomes a history entry, 100 to 2000.
# navigation_grace_ms: after navigating, viewport changes are ignored for this long.
# max_thumbnail_size: longest thumbnail edge in pixels, 50 to 256.
# default_remember_mask: categories new views remember, such as "PERSPECTIVE | SHADING".
#   Any of PERSPECTIVE, SHADING, OVERLAYS, COMPOSITION.
# default_lens_unit: "FieldOfView" or "FocalLength".

"#;

#[must_use]
pub fn preferences_dir() -> Option<std::path::PathBuf> {
    let mut base_dir = dirs::preference_dir()?;
    base_dir.push(env!("CARGO_PKG_NAME"));
    Some(base_dir)
}

pub struct Preferences {
    failed_to_load: bool,
    pub config: Config,
}
impl Preferences {
    const FILENAME: &'static str = "preferences.toml";
    /// Shared global preferences, saved and loaded from the user's preference directory.
    /// (Or defaulted, if unavailable for some reason)
    #[must_use]
    pub fn get() -> &'static Self {
        static GLOBAL_PREFERENCES: std::sync::OnceLock<Preferences> = std::sync::OnceLock::new();

        GLOBAL_PREFERENCES.get_or_init(|| {
            let mut dir = preferences_dir();
            match dir.as_mut() {
                None => Self::no_path(),
                Some(dir) => {
                    dir.push(Self::FILENAME);
                    Self::load_or_default(dir)
                }
            }
        })
    }
    #[must_use]
    pub fn no_path() -> Self {
        log::warn!("Preferences weren't available, defaulting.");
        Self {
            failed_to_load: true,
            config: Config::default(),
        }
    }
    #[must_use]
    fn load_or_default(path: &std::path::Path) -> Self {
        let config = || -> anyhow::Result<Config> {
            let string = std::fs::read_to_string(path)?;
            Ok(parse(&string)?)
        };

        match config() {
            Ok(config) => Self {
                failed_to_load: false,
                config,
            },
            Err(e) => {
                log::debug!("Reading {path:?}: {e:#}");
                Self::no_path()
            }
        }
    }
    /// Return true if loading user's settings failed. This can be useful for
    /// displaying a warning.
    #[must_use]
    pub fn did_fail_to_load(&self) -> bool {
        self.failed_to_load
    }
    pub fn save(&self) -> anyhow::Result<()> {
        let mut preferences =
            preferences_dir().ok_or_else(|| anyhow::anyhow!("No preferences dir found"))?;
        // Explicity do *not* create recursively. If not found, the user probably has a good reason.
        // Ignore errors (could already exist). Any real errors will be emitted by file access below.
        let _ = std::fs::DirBuilder::new().create(&preferences);

        preferences.push(Self::FILENAME);
        std::fs::write(preferences, render(&self.config)?)?;
        Ok(())
    }
}

fn parse(string: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(string).map(Config::sanitized)
}

fn render(config: &Config) -> Result<String, toml::ser::Error> {
    let string = toml::ser::to_string_pretty(config)?;
    // Prefix some documentation.
    Ok(DOCUMENTATION.to_owned() + &string)
}
