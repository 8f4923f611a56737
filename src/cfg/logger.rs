// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{Event, Subscriber, field::Field};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    EnvFilter,
    fmt::{
        self, FmtContext, FormatEvent, FormatFields, FormattedFields,
        format::{FmtSpan, JsonFields, Writer},
    },
    layer::SubscriberExt,
    registry::LookupSpan,
};

#[derive(Debug, Deserialize)]
struct LoggerFile {
    logger: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
struct LogConfig {
    level: String,
    output: LogOutput,
    #[serde(default)]
    is_show_line: bool,
    #[serde(default)]
    is_show_module_path: bool,
    #[serde(default)]
    is_show_target: bool,
    file: Option<LogFileConfig>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum LogOutput {
    Stdout,
    Stderr,
    File,
}

#[derive(Debug, Deserialize, Clone)]
struct LogFileConfig {
    path: String,
    #[serde(default)]
    rotation_frequency: RotationFrequency,
}

#[derive(Debug, Deserialize, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
enum RotationFrequency {
    Minutely,
    Hourly,
    Daily,
    #[default]
    Never,
}

impl From<RotationFrequency> for Rotation {
    fn from(r: RotationFrequency) -> Self {
        match r {
            RotationFrequency::Minutely => Rotation::MINUTELY,
            RotationFrequency::Hourly => Rotation::HOURLY,
            RotationFrequency::Daily => Rotation::DAILY,
            RotationFrequency::Never => Rotation::NEVER,
        }
    }
}

/// One JSON line per event; span fields are merged into `fields`.
struct JsonFormatter {
    config: LogConfig,
}

#[derive(Serialize)]
struct LogLine<'a> {
    timestamp: String,
    level: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    module_path: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    spans: Vec<String>,
    fields: Map<String, Value>,
}

impl<S, N> FormatEvent<S, N> for JsonFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        let mut fields = visitor.0;

        let mut spans = Vec::new();
        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                spans.push(span.name().to_string());
                let ext = span.extensions();
                if let Some(recorded) = ext.get::<FormattedFields<JsonFields>>()
                    && let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&recorded.fields)
                {
                    // event fields win over span fields
                    for (k, v) in map {
                        fields.entry(k).or_insert(v);
                    }
                }
            }
        }

        let meta = event.metadata();
        let line = LogLine {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level: meta.level().as_str(),
            target: self.config.is_show_target.then(|| meta.target()),
            module_path: self
                .config
                .is_show_module_path
                .then(|| meta.module_path())
                .flatten(),
            line: self.config.is_show_line.then(|| meta.line()).flatten(),
            spans,
            fields,
        };
        let text = serde_json::to_string(&line).map_err(|_| std::fmt::Error)?;
        writeln!(writer, "{text}")
    }
}

#[derive(Default)]
struct FieldVisitor(Map<String, Value>);

impl tracing::field::Visit for FieldVisitor {
    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0.insert(field.name().to_string(), json!(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.0.insert(field.name().to_string(), json!(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.0.insert(field.name().to_string(), json!(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), json!(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0
            .insert(field.name().to_string(), json!(format!("{value:?}")));
    }
}

fn file_appender(cfg: &LogFileConfig) -> RollingFileAppender {
    let path = Path::new(&cfg.path);
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "iscsi-target.log".to_string());
    RollingFileAppender::new(cfg.rotation_frequency.into(), dir, name)
}

/// Installs the global JSON subscriber described by the YAML file at
/// `config_path`. Keep the returned guard alive to flush buffered lines.
pub fn init_logger(config_path: &str) -> Result<WorkerGuard> {
    let text = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read logger config {config_path}"))?;
    let LoggerFile { logger } = serde_yaml::from_str(&text)
        .with_context(|| format!("failed to parse logger config {config_path}"))?;

    let (writer, guard) = match logger.output {
        LogOutput::Stdout => tracing_appender::non_blocking(std::io::stdout()),
        LogOutput::Stderr => tracing_appender::non_blocking(std::io::stderr()),
        LogOutput::File => {
            let file = logger
                .file
                .as_ref()
                .context("logger output is `file` but no `file` section is given")?;
            tracing_appender::non_blocking(file_appender(file))
        },
    };

    let filter = EnvFilter::try_new(&logger.level).context("invalid log level")?;
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_span_events(FmtSpan::NONE)
        .fmt_fields(JsonFields::default())
        .event_format(JsonFormatter { config: logger });

    tracing::subscriber::set_global_default(tracing_subscriber::registry().with(filter).with(layer))
        .context("failed to install global subscriber")?;
    Ok(guard)
}
