//! An event formatter for `tracing-subscriber` that prefixes each log line
//! with entries from the logging thread's mapped diagnostic context.
//!
//! ```
//! use tracing_mdc::MdcFormat;
//!
//! let format = MdcFormat::builder()
//!     .with_key("traceId")
//!     .build(tracing_subscriber::fmt::format());
//!
//! let subscriber = tracing_subscriber::fmt().event_format(format).finish();
//! # drop(subscriber);
//! ```

use std::fmt::{Result as FmtResult, Write};

use tracing_core::{Event, Subscriber};
use tracing_subscriber::fmt::format::{Format, Writer};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Keys printed when none are configured: the legacy B3 trace id and the
/// name of the calling service.
pub const DEFAULT_KEYS: [&str; 2] = ["X-B3-TraceId", "X-B3-ParentName"];

pub struct MdcFormatBuilder {
    keys: Vec<String>,
    all_keys: bool,
    open: String,
    close: String,
}

impl MdcFormatBuilder {
    pub fn with_key<K: Into<String>>(mut self, key: K) -> MdcFormatBuilder {
        self.keys.push(key.into());
        self
    }

    pub fn with_keys<I, K>(mut self, keys: I) -> MdcFormatBuilder
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.keys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Prints every entry in the context, ordered by key, instead of a fixed
    /// set of keys.
    pub fn with_all_keys(mut self) -> MdcFormatBuilder {
        self.all_keys = true;
        self
    }

    pub fn with_delimiters<O: Into<String>, C: Into<String>>(
        mut self,
        open: O,
        close: C,
    ) -> MdcFormatBuilder {
        self.open = open.into();
        self.close = close.into();
        self
    }

    pub fn build<F>(self, inner: F) -> MdcFormat<F> {
        let selection = if self.all_keys {
            Selection::All
        } else if self.keys.is_empty() {
            Selection::Keys(DEFAULT_KEYS.iter().map(|key| key.to_string()).collect())
        } else {
            Selection::Keys(self.keys)
        };

        MdcFormat {
            inner,
            selection,
            open: self.open,
            close: self.close,
        }
    }
}

enum Selection {
    Keys(Vec<String>),
    All,
}

/// Wraps another event formatter, writing `[key=value ...] ` before it.
///
/// Keys missing from the context are skipped and keys stored with a null
/// value are written as `key=-`. If none of the keys are present nothing is
/// written. Reading the context here does not disturb its copy-on-write
/// state.
pub struct MdcFormat<F = Format> {
    inner: F,
    selection: Selection,
    open: String,
    close: String,
}

impl MdcFormat {
    pub fn builder() -> MdcFormatBuilder {
        MdcFormatBuilder {
            keys: Vec::new(),
            all_keys: false,
            open: "[".to_owned(),
            close: "]".to_owned(),
        }
    }
}

impl Default for MdcFormat {
    fn default() -> MdcFormat {
        MdcFormat::builder().build(Format::default())
    }
}

impl<F> MdcFormat<F> {
    fn entries(&self) -> Vec<(String, Option<String>)> {
        match &self.selection {
            Selection::Keys(keys) => {
                let mut found = vec![None; keys.len()];

                mdc::for_each(|key, value| {
                    if let Some(idx) = keys.iter().position(|k| k == key) {
                        found[idx] = Some(value.map(str::to_owned));
                    }
                });

                keys.iter()
                    .zip(found)
                    .filter_map(|(key, value)| Some((key.clone(), value?)))
                    .collect()
            }
            Selection::All => {
                let mut entries = Vec::new();

                mdc::for_each(|key, value| {
                    entries.push((key.to_owned(), value.map(str::to_owned)));
                });

                entries.sort();
                entries
            }
        }
    }

    fn write_context(&self, writer: &mut Writer<'_>) -> FmtResult {
        let entries = self.entries();
        if entries.is_empty() {
            return Ok(());
        }

        writer.write_str(&self.open)?;
        for (idx, (key, value)) in entries.iter().enumerate() {
            if idx != 0 {
                writer.write_char(' ')?;
            }

            write!(writer, "{key}={}", value.as_deref().unwrap_or("-"))?;
        }
        writer.write_str(&self.close)?;
        writer.write_char(' ')
    }
}

impl<S, N, F> FormatEvent<S, N> for MdcFormat<F>
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    N: for<'writer> FormatFields<'writer> + 'static,
    F: FormatEvent<S, N>,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> FmtResult {
        self.write_context(&mut writer)?;
        self.inner.format_event(ctx, writer, event)
    }
}
