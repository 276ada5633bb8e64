#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    fn from_env() -> Self {
        match std::env::var("LOG_LEVEL")
            .unwrap_or_else(|_| "info".to_string())
            .trim()
            .to_lowercase()
            .as_str()
        {
            "error" => LogLevel::Error,
            "warn" => LogLevel::Warn,
            "debug" => LogLevel::Debug,
            _ => LogLevel::Info,
        }
    }

    fn label(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }
}

/// Leveled stderr logger with hierarchical contexts. Stdout belongs to the
/// JSON-RPC framing and must never see log output.
#[derive(Debug, Clone)]
pub struct Logger {
    context: String,
    level: LogLevel,
}

impl Logger {
    pub fn new(context: &str) -> Self {
        Self {
            context: context.to_string(),
            level: LogLevel::from_env(),
        }
    }

    pub fn child(&self, suffix: &str) -> Self {
        let context = if suffix.is_empty() {
            self.context.clone()
        } else {
            format!("{}:{}", self.context, suffix)
        };
        Self {
            context,
            level: self.level,
        }
    }

    fn log(&self, level: LogLevel, message: &str, meta: Option<&serde_json::Value>) {
        if level > self.level {
            return;
        }
        let meta_suffix = meta
            .filter(|m| !m.is_null())
            .map(|m| format!(" {}", m))
            .unwrap_or_default();
        eprintln!(
            "[{}] {} [{}] {}{}",
            chrono::Utc::now().to_rfc3339(),
            level.label(),
            self.context,
            message,
            meta_suffix
        );
    }

    pub fn error(&self, message: &str, meta: Option<&serde_json::Value>) {
        self.log(LogLevel::Error, message, meta);
    }

    pub fn warn(&self, message: &str, meta: Option<&serde_json::Value>) {
        self.log(LogLevel::Warn, message, meta);
    }

    pub fn info(&self, message: &str, meta: Option<&serde_json::Value>) {
        self.log(LogLevel::Info, message, meta);
    }

    pub fn debug(&self, message: &str, meta: Option<&serde_json::Value>) {
        self.log(LogLevel::Debug, message, meta);
    }
}
