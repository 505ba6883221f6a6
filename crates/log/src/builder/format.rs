//! Format layer creation macros

/// Text format layer (`pretty` or `compact`) with the common display options
macro_rules! create_fmt_layer {
    ($format:ident, $config:expr) => {{
        tracing_subscriber::fmt::layer()
            .$format()
            .with_writer(std::io::stderr)
            .with_ansi($config.ansi)
            .with_target($config.with_target)
    }};
}

/// JSON layer; one flattened object per event
macro_rules! create_json_layer {
    ($config:expr) => {{
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .flatten_event(true)
            .with_target($config.with_target)
    }};
}
