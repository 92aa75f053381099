use std::fmt;

/// Top-level state of the worker. Names match the `typeRequest` tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EngineState {
    #[default]
    Uninitialized,
    Initializing,
    Idle,
    Analysis,
    Filter,
    RCode,
    ComputeColumn,
    ModuleRequest,
    PauseRequested,
    Paused,
    Resuming,
    StopRequested,
    Stopped,
    LogCfg,
    Settings,
}

impl EngineState {
    pub const ALL: [EngineState; 15] = [
        EngineState::Uninitialized,
        EngineState::Initializing,
        EngineState::Idle,
        EngineState::Analysis,
        EngineState::Filter,
        EngineState::RCode,
        EngineState::ComputeColumn,
        EngineState::ModuleRequest,
        EngineState::PauseRequested,
        EngineState::Paused,
        EngineState::Resuming,
        EngineState::StopRequested,
        EngineState::Stopped,
        EngineState::LogCfg,
        EngineState::Settings,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            EngineState::Uninitialized => "uninitialized",
            EngineState::Initializing => "initializing",
            EngineState::Idle => "idle",
            EngineState::Analysis => "analysis",
            EngineState::Filter => "filter",
            EngineState::RCode => "rCode",
            EngineState::ComputeColumn => "computeColumn",
            EngineState::ModuleRequest => "moduleRequest",
            EngineState::PauseRequested => "pauseRequested",
            EngineState::Paused => "paused",
            EngineState::Resuming => "resuming",
            EngineState::StopRequested => "stopRequested",
            EngineState::Stopped => "stopped",
            EngineState::LogCfg => "logCfg",
            EngineState::Settings => "settings",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|state| state.as_str() == name)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide settings that survive pause/resume cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub ppi: u32,
    pub developer_mode: bool,
    pub image_background: String,
    pub language_code: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ppi: 96,
            developer_mode: false,
            image_background: "transparent".to_string(),
            language_code: "en".to_string(),
        }
    }
}

/// Fields of a `settings` or `resuming` message; absent fields keep their value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SettingsUpdate {
    pub ppi: Option<u32>,
    pub developer_mode: Option<bool>,
    pub image_background: Option<String>,
    pub language_code: Option<String>,
}

impl Settings {
    pub fn absorb(&mut self, update: SettingsUpdate) {
        if let Some(ppi) = update.ppi {
            self.ppi = ppi;
        }
        if let Some(developer_mode) = update.developer_mode {
            self.developer_mode = developer_mode;
        }
        if let Some(background) = update.image_background {
            self.image_background = background;
        }
        if let Some(language) = update.language_code {
            self.language_code = language;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for state in EngineState::ALL {
            assert_eq!(EngineState::from_name(state.as_str()), Some(state));
        }
        assert_eq!(EngineState::from_name("rcode"), None);
    }

    #[test]
    fn absorb_keeps_missing_fields() {
        let mut settings = Settings::default();
        settings.absorb(SettingsUpdate {
            ppi: Some(192),
            language_code: Some("nl".into()),
            ..Default::default()
        });
        assert_eq!(settings.ppi, 192);
        assert_eq!(settings.language_code, "nl");
        assert_eq!(settings.image_background, "transparent");
        assert!(!settings.developer_mode);
    }
}
