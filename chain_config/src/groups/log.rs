crate::config_group!({

    /// Default log filter directive, used when `RUST_LOG` is not set.
    ref level: String = "info".to_string();

    /// Output format, `pretty` or `json`.
    ref format: String = "pretty".to_string();
});
