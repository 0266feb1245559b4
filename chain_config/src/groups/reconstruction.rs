crate::config_group!({

    /// The inner record type marking an aggregate as carrying payload fragments.
    ///
    /// Use the environment variable `CHAINFETCH_RECONSTRUCTION_TRANSFER_TYPE` to set this value.
    ref transfer_type: u16 = 16724;

    /// Whether to compute the sequence gap report after reassembly.
    ref analyze_gaps: bool = true;

    /// Upper bound on the number of missing sequence keys listed in a report.
    /// The total count of missing keys is always reported.
    ref max_reported_missing_keys: usize = 10_000;

    /// Number of decoded characters kept from a discarded duplicate for auditing.
    ref duplicate_preview_chars: usize = 50;
});
